use crate::{
    common::{Error, Position},
    token::{Token, TokenKind, TokenValue},
};

use unicode_xid::UnicodeXID;

/// Symbols accepted as identifier characters so that `μ`, `σ` and `Σ` can
/// name the statistics aliases.
pub const ALIAS_CHARS: [char; 3] = ['μ', 'σ', 'Σ'];

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_xid_start() || ALIAS_CHARS.contains(&c)
}

fn is_ident_continue(c: char) -> bool {
    c.is_xid_continue() || ALIAS_CHARS.contains(&c)
}

#[derive(Debug, Clone)]
pub struct Lexer {
    source: Vec<char>,

    start: usize,
    current: usize,
    line: usize,
    line_begin: usize,
    start_pos: Position,
}

impl Lexer {
    pub fn from_str(source: &str) -> Self {
        Self::from_chars(source.chars().collect())
    }

    pub fn from_chars(chars: Vec<char>) -> Self {
        Lexer {
            source: chars,
            start: 0,
            current: 0,
            line: 1,
            line_begin: 0,
            start_pos: Position::new(1, 1),
        }
    }

    fn at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.source.get(self.current + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.line_begin = self.current;
        }
        Some(c)
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.current - self.line_begin + 1)
    }

    fn lexeme(&self) -> String {
        self.source[self.start..self.current].iter().collect()
    }

    fn create_token(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            value: TokenValue::Lexeme(self.lexeme()),
            pos: self.start_pos,
        }
    }

    fn create_literal(&self, kind: TokenKind, value: TokenValue) -> Token {
        Token {
            kind,
            value,
            pos: self.start_pos,
        }
    }

    fn lex_string(&mut self, quote: char) -> Token {
        let mut string = String::new();

        while let Some(c) = self.advance() {
            if c == quote {
                break;
            }

            if c == '\\' {
                match self.advance() {
                    Some('n') => string.push('\n'),
                    Some('t') => string.push('\t'),
                    Some(escaped) => string.push(escaped),
                    None => break,
                }
            } else {
                string.push(c);
            }
        }

        self.create_literal(TokenKind::String, TokenValue::Str(string))
    }

    fn lex_number(&mut self) -> Result<Token, Error> {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        // one dot belongs to the number unless it starts a `..`, so `3.` is a
        // float while `1..5` stays INT RANGE INT
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_next() != Some('.') {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        let lexeme = self.lexeme();
        if is_float {
            let number = lexeme
                .parse::<f64>()
                .map_err(|_| Error::syntax(format!("invalid float literal '{}'", lexeme), self.start_pos))?;
            Ok(self.create_literal(TokenKind::Float, TokenValue::Float(number)))
        } else {
            let number = lexeme.parse::<i64>().map_err(|_| {
                Error::syntax(format!("integer literal '{}' is too large", lexeme), self.start_pos)
            })?;
            Ok(self.create_literal(TokenKind::Int, TokenValue::Int(number)))
        }
    }

    fn lex_ident(&mut self) -> Token {
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.advance();
        }

        let lexeme = self.lexeme();
        match lexeme.as_str() {
            "true" => self.create_literal(TokenKind::Bool, TokenValue::Bool(true)),
            "false" => self.create_literal(TokenKind::Bool, TokenValue::Bool(false)),
            keyword_str => {
                let kind = TokenKind::from_keyword_str(keyword_str).unwrap_or(TokenKind::Ident);
                self.create_token(kind)
            }
        }
    }

    pub fn lex(&mut self) -> Result<Vec<Token>, Error> {
        let mut tokens = Vec::new();

        while !self.at_end() {
            self.start = self.current;
            self.start_pos = self.position();

            let c = match self.advance() {
                Some(c) => c,
                None => break,
            };

            match c {
                '(' => tokens.push(self.create_token(TokenKind::LeftParen)),
                ')' => tokens.push(self.create_token(TokenKind::RightParen)),
                '{' => tokens.push(self.create_token(TokenKind::LeftBrace)),
                '}' => tokens.push(self.create_token(TokenKind::RightBrace)),
                '[' => tokens.push(self.create_token(TokenKind::LeftBracket)),
                ']' => tokens.push(self.create_token(TokenKind::RightBracket)),
                ',' => tokens.push(self.create_token(TokenKind::Comma)),
                ':' => tokens.push(self.create_token(TokenKind::Colon)),
                ';' => tokens.push(self.create_token(TokenKind::Semicolon)),
                '?' => tokens.push(self.create_token(TokenKind::Question)),
                '+' => tokens.push(self.create_token(TokenKind::Plus)),
                '-' => tokens.push(self.create_token(TokenKind::Minus)),
                '%' => tokens.push(self.create_token(TokenKind::Percent)),
                '*' => {
                    if self.matches('*') {
                        tokens.push(self.create_token(TokenKind::StarStar));
                    } else {
                        tokens.push(self.create_token(TokenKind::Star));
                    }
                }
                '=' => {
                    if self.matches('=') {
                        tokens.push(self.create_token(TokenKind::EqualEqual));
                    } else if self.matches('>') {
                        tokens.push(self.create_token(TokenKind::Arrow));
                    } else {
                        tokens.push(self.create_token(TokenKind::Equal));
                    }
                }
                '!' => {
                    // a bare `!` produces nothing
                    if self.matches('=') {
                        tokens.push(self.create_token(TokenKind::BangEqual));
                    }
                }
                '<' => {
                    if self.matches('=') {
                        tokens.push(self.create_token(TokenKind::LesserEqual));
                    } else {
                        tokens.push(self.create_token(TokenKind::Lesser));
                    }
                }
                '>' => {
                    if self.matches('=') {
                        tokens.push(self.create_token(TokenKind::GreaterEqual));
                    } else {
                        tokens.push(self.create_token(TokenKind::Greater));
                    }
                }
                '.' => {
                    // a bare `.` produces nothing
                    if self.matches('.') {
                        tokens.push(self.create_token(TokenKind::DotDot));
                    }
                }

                '/' => {
                    if self.matches('/') {
                        while !self.at_end() && self.peek() != Some('\n') {
                            self.advance();
                        }
                    } else {
                        tokens.push(self.create_token(TokenKind::Slash))
                    }
                }

                '"' | '\'' => tokens.push(self.lex_string(c)),

                ' ' | '\t' | '\n' | '\r' => {
                    // do nothing
                }

                _ if c.is_ascii_digit() => tokens.push(self.lex_number()?),
                _ if is_ident_start(c) => tokens.push(self.lex_ident()),
                _ => {
                    return Err(Error::syntax(
                        format!("unexpected character '{}'", c),
                        self.start_pos,
                    ));
                }
            };
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            value: TokenValue::None,
            pos: self.position(),
        });

        tracing::debug!(count = tokens.len(), "tokenized source");

        Ok(tokens)
    }
}

/// Converts `source` into tokens, always terminated by exactly one EOF token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Error> {
    Lexer::from_str(source).lex()
}

use derive_more::Display;

use crate::common::{Error, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TokenKind {
    #[display(fmt = "integer")]
    Int,
    #[display(fmt = "float")]
    Float,
    #[display(fmt = "string")]
    String,
    #[display(fmt = "boolean")]
    Bool,
    #[display(fmt = "identifier")]
    Ident,
    #[display(fmt = "end of file")]
    Eof,

    // keywords
    #[display(fmt = "'var'")]
    Var,
    #[display(fmt = "'for'")]
    For,
    #[display(fmt = "'in'")]
    In,
    #[display(fmt = "'while'")]
    While,
    #[display(fmt = "'?'")]
    Question,
    #[display(fmt = "'otherwise'")]
    Otherwise,
    #[display(fmt = "'return'")]
    Return,

    // type names
    #[display(fmt = "'int'")]
    TypeInt,
    #[display(fmt = "'float'")]
    TypeFloat,
    #[display(fmt = "'string'")]
    TypeString,
    #[display(fmt = "'bool'")]
    TypeBool,
    #[display(fmt = "'array'")]
    TypeArray,

    // symbols
    #[display(fmt = "'('")]
    LeftParen,
    #[display(fmt = "')'")]
    RightParen,
    #[display(fmt = "'{{'")]
    LeftBrace,
    #[display(fmt = "'}}'")]
    RightBrace,
    #[display(fmt = "'['")]
    LeftBracket,
    #[display(fmt = "']'")]
    RightBracket,
    #[display(fmt = "','")]
    Comma,
    #[display(fmt = "':'")]
    Colon,
    #[display(fmt = "';'")]
    Semicolon,
    #[display(fmt = "'=>'")]
    Arrow,
    #[display(fmt = "'='")]
    Equal,

    // binary operators
    #[display(fmt = "'+'")]
    Plus,
    #[display(fmt = "'-'")]
    Minus,
    #[display(fmt = "'*'")]
    Star,
    #[display(fmt = "'/'")]
    Slash,
    #[display(fmt = "'%'")]
    Percent,
    #[display(fmt = "'**'")]
    StarStar,
    #[display(fmt = "'..'")]
    DotDot,

    #[display(fmt = "'<'")]
    Lesser,
    #[display(fmt = "'>'")]
    Greater,
    #[display(fmt = "'<='")]
    LesserEqual,
    #[display(fmt = "'>='")]
    GreaterEqual,
    #[display(fmt = "'=='")]
    EqualEqual,
    #[display(fmt = "'!='")]
    BangEqual,

    #[display(fmt = "'and'")]
    And,
    #[display(fmt = "'or'")]
    Or,
    #[display(fmt = "'not'")]
    Not,
}

impl TokenKind {
    pub fn from_keyword_str(name: &str) -> Option<TokenKind> {
        match name {
            "var" => Some(TokenKind::Var),
            "for" => Some(TokenKind::For),
            "in" => Some(TokenKind::In),
            "while" => Some(TokenKind::While),
            "otherwise" => Some(TokenKind::Otherwise),
            "return" => Some(TokenKind::Return),
            "and" => Some(TokenKind::And),
            "or" => Some(TokenKind::Or),
            "not" => Some(TokenKind::Not),
            "int" => Some(TokenKind::TypeInt),
            "float" => Some(TokenKind::TypeFloat),
            "string" => Some(TokenKind::TypeString),
            "bool" => Some(TokenKind::TypeBool),
            "array" => Some(TokenKind::TypeArray),
            _ => None,
        }
    }

    pub fn is_prefix_op(&self) -> bool {
        matches!(*self, Self::Minus | Self::Not)
    }

    pub fn is_type_name(&self) -> bool {
        matches!(
            *self,
            Self::TypeInt | Self::TypeFloat | Self::TypeString | Self::TypeBool | Self::TypeArray
        )
    }
}

/// Payload carried by a token: the decoded literal, or the raw lexeme for
/// identifiers, keywords and symbols.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum TokenValue {
    Int(i64),
    Float(f64),
    #[display(fmt = "{:?}", _0)]
    Str(String),
    Bool(bool),
    Lexeme(String),
    #[display(fmt = "<eof>")]
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    pub pos: Position,
}

impl Token {
    pub fn error_at(&self, message: &str) -> Error {
        Error::syntax(message, self.pos)
    }

    /// The identifier or lexeme text, empty for literal and EOF tokens.
    pub fn lexeme(&self) -> &str {
        match &self.value {
            TokenValue::Lexeme(lexeme) => lexeme,
            _ => "",
        }
    }
}

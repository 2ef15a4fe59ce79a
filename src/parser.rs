use std::rc::Rc;

use crate::{
    ast::{self, BinaryOperator, Expr, Literal, Stmt, UnaryOperator},
    common::{Error, Position},
    stack::with_headroom,
    token::{Token, TokenKind, TokenValue},
};

static EOF: Token = Token {
    kind: TokenKind::Eof,
    value: TokenValue::None,
    pos: Position { line: 0, column: 0 },
};

#[derive(Debug, Clone)]
struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    function_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Assoc {
    Ltr,
    Rtl,
    /// At most one operator of this precedence per operand chain.
    Non,
}

#[derive(Debug, Clone, Copy)]
struct OpInfo {
    prec: u8,
    assoc: Assoc,
}

impl TokenKind {
    fn op_info(&self) -> Option<OpInfo> {
        let (prec, assoc) = match self {
            Self::Or => (1, Assoc::Ltr),
            Self::And => (2, Assoc::Ltr),

            Self::EqualEqual | Self::BangEqual => (3, Assoc::Ltr),

            Self::Lesser | Self::LesserEqual | Self::Greater | Self::GreaterEqual => {
                (4, Assoc::Ltr)
            }

            Self::DotDot => (5, Assoc::Non),

            Self::Plus | Self::Minus => (6, Assoc::Ltr),
            Self::Star | Self::Slash | Self::Percent => (7, Assoc::Ltr),
            Self::StarStar => (8, Assoc::Rtl),

            _ => return None,
        };

        Some(OpInfo { prec, assoc })
    }

    fn binary_operator(&self) -> Option<BinaryOperator> {
        Some(match self {
            Self::Plus => BinaryOperator::Add,
            Self::Minus => BinaryOperator::Sub,
            Self::Star => BinaryOperator::Mul,
            Self::Slash => BinaryOperator::Div,
            Self::Percent => BinaryOperator::Mod,
            Self::StarStar => BinaryOperator::Pow,
            Self::EqualEqual => BinaryOperator::Eq,
            Self::BangEqual => BinaryOperator::NotEq,
            Self::Lesser => BinaryOperator::Lt,
            Self::Greater => BinaryOperator::Gt,
            Self::LesserEqual => BinaryOperator::LtEq,
            Self::GreaterEqual => BinaryOperator::GtEq,
            Self::And => BinaryOperator::And,
            Self::Or => BinaryOperator::Or,
            _ => return None,
        })
    }
}

fn describe(token: &Token) -> String {
    match (&token.kind, &token.value) {
        (TokenKind::Ident, TokenValue::Lexeme(name)) => format!("identifier '{}'", name),
        (TokenKind::Int | TokenKind::Float | TokenKind::String | TokenKind::Bool, value) => {
            format!("{} {}", token.kind, value)
        }
        (kind, _) => kind.to_string(),
    }
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Parser {
            tokens,
            current: 0,
            function_depth: 0,
        }
    }

    /// The token under the cursor. Reading past the end yields the EOF token.
    fn peek(&self) -> &'a Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &'a Token {
        let tokens = self.tokens;
        tokens
            .get(self.current + offset)
            .or_else(|| tokens.last().filter(|token| token.kind == TokenKind::Eof))
            .unwrap_or(&EOF)
    }

    fn advance(&mut self) -> &'a Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<&'a Token, Error> {
        let token = self.peek();
        if token.kind == kind {
            self.advance();
            Ok(token)
        } else {
            Err(token.error_at(&format!(
                "expected {} {}, found {}",
                kind,
                context,
                describe(token)
            )))
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<String, Error> {
        Ok(self.expect(TokenKind::Ident, context)?.lexeme().to_string())
    }

    fn parse_type_annotation(&mut self) -> Result<Option<String>, Error> {
        if !self.check(TokenKind::Colon) {
            return Ok(None);
        }
        self.advance();

        let token = self.peek();
        if token.kind.is_type_name() || token.kind == TokenKind::Ident {
            self.advance();
            Ok(Some(token.lexeme().to_string()))
        } else {
            Err(token.error_at(&format!("expected type name, found {}", describe(token))))
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, Error> {
        with_headroom(|| self.parse_statement_inner())
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt, Error> {
        match self.peek().kind {
            TokenKind::Var => self.parse_var_decl(),
            TokenKind::Question => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Ident => match self.peek_at(1).kind {
                TokenKind::LeftParen if self.is_func_decl() => self.parse_func_decl(),
                TokenKind::Equal => self.parse_assignment(),
                _ => self.parse_expr_stmt(),
            },
            _ => self.parse_expr_stmt(),
        }
    }

    /// Looks past one balanced `name( ... )` group for `=>` and rewinds the
    /// cursor either way.
    fn is_func_decl(&mut self) -> bool {
        let saved = self.current;

        self.advance();
        let mut depth = 0usize;
        loop {
            match self.advance().kind {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Eof => break,
                _ => {}
            }
        }
        // an optional `: ReturnType` sits between the parameters and `=>`
        if self.check(TokenKind::Colon) {
            self.advance();
            self.advance();
        }
        let is_decl = self.check(TokenKind::Arrow);

        self.current = saved;
        is_decl
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, Error> {
        self.expect(TokenKind::LeftBrace, "to open block")?;

        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            stmts.push(self.parse_statement()?);
        }

        self.expect(TokenKind::RightBrace, "to close block")?;

        Ok(stmts)
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, Error> {
        self.advance();

        let name = self.expect_ident("after 'var'")?;
        let type_annotation = self.parse_type_annotation()?;
        self.expect(TokenKind::Equal, "in variable declaration")?;
        let init = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "after variable declaration")?;

        Ok(ast::VarDecl {
            name,
            type_annotation,
            init,
        }
        .into())
    }

    fn parse_func_decl(&mut self) -> Result<Stmt, Error> {
        let name = self.expect_ident("as function name")?;

        self.expect(TokenKind::LeftParen, "after function name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let name = self.expect_ident("as parameter name")?;
                let type_annotation = self.parse_type_annotation()?;
                params.push(ast::Param {
                    name,
                    type_annotation,
                });

                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "after parameters")?;

        let return_type = self.parse_type_annotation()?;
        self.expect(TokenKind::Arrow, "before function body")?;

        self.function_depth += 1;
        let body = if self.check(TokenKind::LeftBrace) {
            self.parse_block()
        } else {
            // `f(x) => expr;` is shorthand for `f(x) => { return expr; }`
            self.parse_expr().and_then(|value| {
                self.expect(TokenKind::Semicolon, "after function body")?;
                Ok(vec![ast::ReturnStmt { value }.into()])
            })
        };
        self.function_depth -= 1;

        Ok(ast::FuncDecl {
            name,
            params,
            return_type,
            body: Rc::new(body?),
        }
        .into())
    }

    fn parse_if(&mut self) -> Result<Stmt, Error> {
        self.advance();

        let condition = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let else_block = if self.check(TokenKind::Otherwise) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(ast::IfStmt {
            condition,
            then_block,
            else_block,
        }
        .into())
    }

    fn parse_for(&mut self) -> Result<Stmt, Error> {
        self.advance();

        let var_name = self.expect_ident("after 'for'")?;
        self.expect(TokenKind::In, "after loop variable")?;
        let iterable = self.parse_expr()?;
        let body = self.parse_block()?;

        Ok(ast::ForStmt {
            var_name,
            iterable,
            body,
        }
        .into())
    }

    fn parse_while(&mut self) -> Result<Stmt, Error> {
        self.advance();

        let condition = self.parse_expr()?;
        let body = self.parse_block()?;

        Ok(ast::WhileStmt { condition, body }.into())
    }

    fn parse_return(&mut self) -> Result<Stmt, Error> {
        let token = self.advance();
        if self.function_depth == 0 {
            return Err(token.error_at("'return' outside function"));
        }

        let value = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "after return value")?;

        Ok(ast::ReturnStmt { value }.into())
    }

    fn parse_assignment(&mut self) -> Result<Stmt, Error> {
        let name = self.expect_ident("as assignment target")?;
        self.expect(TokenKind::Equal, "in assignment")?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "after assignment")?;

        Ok(ast::Assignment { name, value }.into())
    }

    fn parse_expr_stmt(&mut self) -> Result<Stmt, Error> {
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "after expression")?;
        Ok(expr.into())
    }

    fn parse_expr(&mut self) -> Result<Expr, Error> {
        with_headroom(|| self.parse_prec_expr(0))
    }

    fn parse_prec_expr(&mut self, min_prec: u8) -> Result<Expr, Error> {
        let mut lhs = self.parse_unary()?;

        while let Some(info) = self.peek().kind.op_info() {
            if info.prec < min_prec {
                break;
            }

            let op = self.advance();
            let next_min = match info.assoc {
                Assoc::Rtl => info.prec,
                Assoc::Ltr | Assoc::Non => info.prec + 1,
            };
            let rhs = with_headroom(|| self.parse_prec_expr(next_min))?;

            let pos = lhs.pos;
            lhs = match op.kind.binary_operator() {
                Some(op) => Expr::new(
                    ast::BinaryExpr {
                        op,
                        left: Box::new(lhs),
                        right: Box::new(rhs),
                    },
                    pos,
                ),
                None => Expr::new(
                    ast::RangeExpr {
                        start: Box::new(lhs),
                        end: Box::new(rhs),
                    },
                    pos,
                ),
            };

            if info.assoc == Assoc::Non {
                let next = self.peek();
                if next.kind.op_info().map(|next_info| next_info.prec) == Some(info.prec) {
                    return Err(next.error_at(&format!("{} cannot be chained", op.kind)));
                }
            }
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        let token = self.peek();
        if !token.kind.is_prefix_op() {
            return self.parse_postfix();
        }

        self.advance();
        let operand = with_headroom(|| self.parse_unary())?;
        let op = if token.kind == TokenKind::Minus {
            UnaryOperator::Neg
        } else {
            UnaryOperator::Not
        };

        Ok(Expr::new(
            ast::UnaryExpr {
                op,
                operand: Box::new(operand),
            },
            token.pos,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expr, Error> {
        let mut expr = self.parse_primary()?;

        while self.check(TokenKind::LeftParen) {
            let callee = match &expr.kind {
                ast::ExprKind::Var(var_expr) => var_expr.name.clone(),
                _ => return Err(self.peek().error_at("only named functions can be called")),
            };

            self.advance();
            let mut args = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    args.push(self.parse_expr()?);

                    if self.check(TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RightParen, "to close argument list")?;

            expr = Expr::new(ast::CallExpr { callee, args }, expr.pos);
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, Error> {
        let token = self.peek();

        match &token.kind {
            TokenKind::Int | TokenKind::Float | TokenKind::String | TokenKind::Bool => {
                self.advance();
                let literal = match &token.value {
                    TokenValue::Int(number) => Literal::Int(*number),
                    TokenValue::Float(number) => Literal::Float(*number),
                    TokenValue::Str(string) => Literal::Str(string.clone()),
                    TokenValue::Bool(boolean) => Literal::Bool(*boolean),
                    _ => return Err(token.error_at("malformed literal token")),
                };
                Ok(Expr::new(literal, token.pos))
            }
            TokenKind::Ident => {
                self.advance();
                Ok(Expr::new(
                    ast::VarExpr {
                        name: token.lexeme().to_string(),
                    },
                    token.pos,
                ))
            }
            TokenKind::LeftBracket => {
                self.advance();

                let mut elements = Vec::new();
                while !self.check(TokenKind::RightBracket) {
                    elements.push(self.parse_expr()?);

                    if self.check(TokenKind::Comma) {
                        self.advance(); // allows a trailing comma
                    } else {
                        break;
                    }
                }
                self.expect(TokenKind::RightBracket, "to close array literal")?;

                Ok(Expr::new(ast::ArrLit { elements }, token.pos))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RightParen, "to close grouping")?;
                Ok(expr)
            }
            _ => Err(token.error_at(&format!("expected expression, found {}", describe(token)))),
        }
    }
}

/// Parses a full token stream into a program. The first error aborts parsing.
pub fn parse(tokens: &[Token]) -> Result<ast::Program, Error> {
    let mut parser = Parser::new(tokens);

    let mut statements = Vec::new();
    while !parser.check(TokenKind::Eof) {
        statements.push(parser.parse_statement()?);
    }

    tracing::debug!(count = statements.len(), "parsed program");

    Ok(ast::Program { statements })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{ExprKind, FuncDecl},
        common::ErrorKind,
        lexer::tokenize,
    };
    use pretty_assertions::assert_eq;

    fn parse_source(source: &str) -> Result<ast::Program, Error> {
        parse(&tokenize(source)?)
    }

    fn single_expr(source: &str) -> Expr {
        let program = parse_source(source).expect("source should parse");
        assert_eq!(program.statements.len(), 1);
        match program.statements.into_iter().next() {
            Some(Stmt::Expr(expr)) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    /// Renders an expression fully parenthesised so tree shape is easy to assert.
    fn sexpr(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Binary(binary) => {
                format!("({} {} {})", binary.op, sexpr(&binary.left), sexpr(&binary.right))
            }
            ExprKind::Unary(unary) => format!("({} {})", unary.op, sexpr(&unary.operand)),
            ExprKind::Call(call) => format!(
                "{}({})",
                call.callee,
                call.args.iter().map(sexpr).collect::<Vec<_>>().join(", ")
            ),
            ExprKind::ArrLit(arr) => format!(
                "[{}]",
                arr.elements.iter().map(sexpr).collect::<Vec<_>>().join(", ")
            ),
            ExprKind::Range(range) => format!("(.. {} {})", sexpr(&range.start), sexpr(&range.end)),
            ExprKind::Var(var) => var.name.clone(),
            ExprKind::Lit(Literal::Int(number)) => number.to_string(),
            ExprKind::Lit(Literal::Float(number)) => format!("{:?}", number),
            ExprKind::Lit(Literal::Str(string)) => format!("{:?}", string),
            ExprKind::Lit(Literal::Bool(boolean)) => boolean.to_string(),
        }
    }

    #[test]
    fn precedence_levels() {
        assert_eq!(sexpr(&single_expr("1 + 2 * 3;")), "(+ 1 (* 2 3))");
        assert_eq!(sexpr(&single_expr("1 - 2 - 3;")), "(- (- 1 2) 3)");
        assert_eq!(sexpr(&single_expr("2 ** 3 ** 2;")), "(** 2 (** 3 2))");
        assert_eq!(sexpr(&single_expr("-2 ** 2;")), "(** (- 2) 2)");
        assert_eq!(sexpr(&single_expr("not a and b or c;")), "(or (and (not a) b) c)");
        assert_eq!(
            sexpr(&single_expr("a + 1 < b * 2 == c >= d;")),
            "(== (< (+ a 1) (* b 2)) (>= c d))"
        );
        assert_eq!(sexpr(&single_expr("x % 2 == 0;")), "(== (% x 2) 0)");
        assert_eq!(sexpr(&single_expr("(1 + 2) * 3;")), "(* (+ 1 2) 3)");
        assert_eq!(sexpr(&single_expr("- - 4;")), "(- (- 4))");
    }

    #[test]
    fn ranges_bind_looser_than_arithmetic() {
        assert_eq!(sexpr(&single_expr("1..n + 1;")), "(.. 1 (+ n 1))");
        assert_eq!(sexpr(&single_expr("0..3 == r;")), "(== (.. 0 3) r)");
    }

    #[test]
    fn chained_range_is_rejected() {
        let err = parse_source("1..2..3;").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(err.message.contains("'..' cannot be chained"), "{}", err.message);
    }

    #[test]
    fn calls_and_arrays() {
        assert_eq!(
            sexpr(&single_expr("print(\"x\", [1, 2.5, true,], f(g(1)));")),
            "print(\"x\", [1, 2.5, true], f(g(1)))"
        );
        assert_eq!(sexpr(&single_expr("(f)(1);")), "f(1)");
        assert_eq!(sexpr(&single_expr("mean([]);")), "mean([])");
    }

    #[test]
    fn calling_a_non_identifier_is_an_error() {
        for source in ["(1 + 2)(3);", "f(1)(2);", "[f](1);"] {
            let err = parse_source(source).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Syntax, "{}", source);
            assert!(err.message.contains("only named functions"), "{}", source);
        }
    }

    #[test]
    fn function_declaration_versus_call_statement() {
        let program = parse_source("f(x, y) => x * y;\nf((1 + 2), 3);").unwrap();
        assert_eq!(program.statements.len(), 2);

        let decl: FuncDecl = program.statements[0].clone().try_into().unwrap();
        assert_eq!(decl.name, "f");
        assert_eq!(
            decl.params.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["x", "y"]
        );
        match decl.body.as_slice() {
            [Stmt::Return(ret)] => assert_eq!(sexpr(&ret.value), "(* x y)"),
            other => panic!("expected a single return, got {:?}", other),
        }

        let call: Expr = program.statements[1].clone().try_into().unwrap();
        assert_eq!(sexpr(&call), "f((+ 1 2), 3)");
    }

    #[test]
    fn typed_function_with_block_body() {
        let program =
            parse_source("area(w: float, h: int): float => {\n  var a: float = w * h;\n  return a;\n}")
                .unwrap();
        let decl: FuncDecl = program.statements[0].clone().try_into().unwrap();
        assert_eq!(decl.params[0].type_annotation.as_deref(), Some("float"));
        assert_eq!(decl.params[1].type_annotation.as_deref(), Some("int"));
        assert_eq!(decl.return_type.as_deref(), Some("float"));
        assert_eq!(decl.body.len(), 2);
        assert!(matches!(&decl.body[0], Stmt::VarDecl(var) if var.type_annotation.as_deref() == Some("float")));
    }

    #[test]
    fn statements() {
        let program = parse_source(
            "var x = 1;\n\
             x = x + 1;\n\
             ? x > 1 { print(x); } otherwise { print(0); }\n\
             for i in 0..3 { total = total + i; }\n\
             while x < 10 { x = x * 2; }",
        )
        .unwrap();

        let statements = &program.statements;
        assert_eq!(statements.len(), 5);
        assert!(matches!(&statements[0], Stmt::VarDecl(var) if var.name == "x" && var.type_annotation.is_none()));
        assert!(matches!(&statements[1], Stmt::Assignment(assign) if assign.name == "x"));
        match &statements[2] {
            Stmt::If(if_stmt) => {
                assert_eq!(sexpr(&if_stmt.condition), "(> x 1)");
                assert_eq!(if_stmt.then_block.len(), 1);
                assert_eq!(if_stmt.else_block.as_ref().map(Vec::len), Some(1));
            }
            other => panic!("expected if, got {:?}", other),
        }
        match &statements[3] {
            Stmt::For(for_stmt) => {
                assert_eq!(for_stmt.var_name, "i");
                assert_eq!(sexpr(&for_stmt.iterable), "(.. 0 3)");
            }
            other => panic!("expected for, got {:?}", other),
        }
        assert!(matches!(&statements[4], Stmt::While(while_stmt) if while_stmt.body.len() == 1));
    }

    #[test]
    fn missing_semicolon_reports_expected_and_found() {
        let err = parse_source("var x = 1\nvar y = 2;").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(
            err.message,
            "expected ';' after variable declaration, found 'var'"
        );
        assert_eq!(err.position, Some(Position::new(2, 1)));
    }

    #[test]
    fn return_outside_function_is_rejected() {
        let err = parse_source("return 1;").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.message, "'return' outside function");

        assert!(parse_source("f() => { for i in [1] { return i; } }").is_ok());
    }

    #[test]
    fn unterminated_block_and_call_hit_eof() {
        let err = parse_source("? true { print(1);").unwrap_err();
        assert_eq!(err.message, "expected '}' to close block, found end of file");

        let err = parse_source("print(1, 2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn parser_never_reads_past_eof() {
        assert_eq!(parse(&[]).unwrap(), ast::Program::default());
        let err = parse_source("f(").unwrap_err();
        assert_eq!(err.message, "expected expression, found end of file");
    }
}

//=============================================
// tidescript/parser.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: TideScript recursive descent parser implementation
// Objective: Transform token streams into AST nodes consumed by the interpreter
//            and act as the syntax gate for fetched module source
//=============================================

use crate::ast::{BinaryOp, Expr, FunctionDecl, Literal, Program, Stmt, UnaryOp};
use crate::tokenizer::{Position, ScanError, Token, TokenKind, Tokenizer};

//=============================================
//            Section 1: Parse Errors
//=============================================

/// Parser error types
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Scan {
        message: String,
        position: Position,
    },
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        position: Position,
    },
    UnexpectedEndOfInput {
        expected: String,
        position: Position,
    },
    InvalidSyntax {
        message: String,
        position: Position,
    },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Scan { message, position } => {
                write!(f, "{} at {}", message, position)
            }
            ParseError::UnexpectedToken {
                expected,
                found,
                position,
            } => {
                write!(f, "Expected {} but found {:?} at {}", expected, found, position)
            }
            ParseError::UnexpectedEndOfInput { expected, position } => {
                write!(f, "Unexpected end of input, expected {} at {}", expected, position)
            }
            ParseError::InvalidSyntax { message, position } => {
                write!(f, "Invalid syntax: {} at {}", message, position)
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ScanError> for ParseError {
    fn from(error: ScanError) -> Self {
        ParseError::Scan {
            message: error.message,
            position: error.position,
        }
    }
}

//=============================================
//            Section 2: Parser State
//=============================================

/// Recursive descent parser for TideScript
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    expr_depth: usize,
}

const MAX_EXPRESSION_DEPTH: usize = 256;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            expr_depth: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    //=============================================
    //            Section 3: Token Navigation
    //=============================================

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
        token
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let token = self.peek();
            if token.kind == TokenKind::Eof {
                Err(ParseError::UnexpectedEndOfInput {
                    expected: expected.to_string(),
                    position: token.position.clone(),
                })
            } else {
                Err(ParseError::UnexpectedToken {
                    expected: expected.to_string(),
                    found: token.kind.clone(),
                    position: token.position.clone(),
                })
            }
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<(String, Position), ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok((name, token.position))
            }
            TokenKind::Eof => Err(ParseError::UnexpectedEndOfInput {
                expected: expected.to_string(),
                position: token.position,
            }),
            found => Err(ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found,
                position: token.position,
            }),
        }
    }

    //=============================================
    //            Section 4: Statements
    //=============================================

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek().kind {
            TokenKind::Let => self.parse_let(),
            TokenKind::Fn => self.parse_function(),
            TokenKind::Return => self.parse_return(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            _ => {
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::Semicolon, "';' after expression")?;
                Ok(Stmt::Expression { expr })
            }
        }
    }

    fn parse_let(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.advance();
        let (name, _) = self.expect_identifier("variable name after 'let'")?;
        self.expect(&TokenKind::Equal, "'=' after variable name")?;
        let initializer = self.parse_expression()?;
        self.expect(&TokenKind::Semicolon, "';' after variable declaration")?;
        Ok(Stmt::Let {
            name,
            initializer,
            position: keyword.position,
        })
    }

    fn parse_function(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.advance();
        let (name, _) = self.expect_identifier("function name after 'fn'")?;
        self.expect(&TokenKind::LeftParen, "'(' after function name")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                let (param, _) = self.expect_identifier("parameter name")?;
                params.push(param);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "')' after parameters")?;

        let body = self.parse_block()?;
        Ok(Stmt::FunctionDecl {
            decl: FunctionDecl {
                name,
                params,
                body,
                position: keyword.position,
            },
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.advance();
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon, "';' after return value")?;
        Ok(Stmt::Return {
            value,
            position: keyword.position,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let condition = self.parse_expression()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.matches(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { condition, body })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::LeftBrace, "'{' to open block")?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.check(&TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RightBrace, "'}' to close block")?;
        Ok(statements)
    }

    //=============================================
    //            Section 5: Expressions
    //=============================================

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.expr_depth += 1;
        if self.expr_depth > MAX_EXPRESSION_DEPTH {
            self.expr_depth -= 1;
            return Err(ParseError::InvalidSyntax {
                message: "expression nesting too deep".to_string(),
                position: self.peek().position.clone(),
            });
        }
        let result = self.parse_assignment();
        self.expr_depth -= 1;
        result
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        // Lookahead for `name = value` without consuming a comparison's `==`
        if let TokenKind::Identifier(name) = self.peek().kind.clone() {
            if self.current + 1 < self.tokens.len()
                && self.tokens[self.current + 1].kind == TokenKind::Equal
            {
                let position = self.advance().position; // identifier
                self.advance(); // '='
                let value = self.parse_assignment()?;
                return Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                    position,
                });
            }
        }
        self.parse_logic_or()
    }

    fn parse_logic_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_logic_and()?;
        while self.check(&TokenKind::Or) {
            let token = self.advance();
            let right = self.parse_logic_and()?;
            expr = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(expr),
                right: Box::new(right),
                position: token.position,
            };
        }
        Ok(expr)
    }

    fn parse_logic_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_equality()?;
        while self.check(&TokenKind::And) {
            let token = self.advance();
            let right = self.parse_equality()?;
            expr = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(expr),
                right: Box::new(right),
                position: token.position,
            };
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqualEqual => BinaryOp::Equal,
                TokenKind::NotEqual => BinaryOp::NotEqual,
                _ => break,
            };
            let token = self.advance();
            let right = self.parse_comparison()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                position: token.position,
            };
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                _ => break,
            };
            let token = self.advance();
            let right = self.parse_term()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                position: token.position,
            };
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => break,
            };
            let token = self.advance();
            let right = self.parse_factor()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                position: token.position,
            };
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ => break,
            };
            let token = self.advance();
            let right = self.parse_unary()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                position: token.position,
            };
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek().kind {
            TokenKind::Minus => Some(UnaryOp::Negate),
            TokenKind::Not => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let token = self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                position: token.position,
            });
        }
        self.parse_call()
    }

    fn parse_call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.check(&TokenKind::LeftParen) {
            let token = self.advance();
            let mut args = Vec::new();
            if !self.check(&TokenKind::RightParen) {
                loop {
                    args.push(self.parse_expression()?);
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RightParen, "')' after arguments")?;
            expr = Expr::Call {
                callee: Box::new(expr),
                args,
                position: token.position,
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        let expr = match token.kind {
            TokenKind::Integer(value) => Expr::Literal {
                value: Literal::Integer(value),
                position: token.position,
            },
            TokenKind::Float(value) => Expr::Literal {
                value: Literal::Float(value),
                position: token.position,
            },
            TokenKind::String(ref value) => Expr::Literal {
                value: Literal::String(value.clone()),
                position: token.position,
            },
            TokenKind::Boolean(value) => Expr::Literal {
                value: Literal::Boolean(value),
                position: token.position,
            },
            TokenKind::Null => Expr::Literal {
                value: Literal::Null,
                position: token.position,
            },
            TokenKind::Identifier(ref name) => Expr::Identifier {
                name: name.clone(),
                position: token.position,
            },
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RightParen, "')' after expression")?;
                return Ok(inner);
            }
            TokenKind::Eof => {
                return Err(ParseError::UnexpectedEndOfInput {
                    expected: "expression".to_string(),
                    position: token.position,
                });
            }
            found => {
                return Err(ParseError::UnexpectedToken {
                    expected: "expression".to_string(),
                    found,
                    position: token.position,
                });
            }
        };
        self.advance();
        Ok(expr)
    }
}

//=============================================
//            Section 6: Source Validation
//=============================================

/// Parse a source text under the TideScript grammar without executing it.
///
/// This is the gate fetched module bodies must pass before a module object
/// may be created from them. The returned `Program` is the success marker;
/// callers that only need the yes/no answer can discard it.
pub fn validate_module(source: &str, display_name: &str) -> Result<Program, ParseError> {
    tracing::debug!("parsing module source: {display_name}");
    let tokens = Tokenizer::new(source).tokenize()?;
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Stmt};

    fn parse(source: &str) -> Program {
        validate_module(source, "<test>").expect("parse")
    }

    #[test]
    fn parses_function_with_arithmetic_body() {
        let program = parse("fn main(a, b, c, d) { return a * b + (c + d); }");
        let decl = match &program.statements[0] {
            Stmt::FunctionDecl { decl } => decl,
            other => panic!("expected function declaration, found {other:?}"),
        };
        assert_eq!(decl.name, "main");
        assert_eq!(decl.params, vec!["a", "b", "c", "d"]);
        assert_eq!(decl.body.len(), 1);
    }

    #[test]
    fn parses_let_and_call() {
        let program = parse("let x = add(1, 2);");
        let initializer = match &program.statements[0] {
            Stmt::Let { initializer, .. } => initializer,
            other => panic!("expected let statement, found {other:?}"),
        };
        match initializer {
            Expr::Call { args, .. } => assert_eq!(args.len(), 2),
            other => panic!("expected call initializer, found {other:?}"),
        }
    }

    #[test]
    fn parses_else_if_chain() {
        let program = parse("fn pick(n) { if n < 0 { return -1; } else if n == 0 { return 0; } else { return 1; } }");
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn assignment_is_distinguished_from_equality() {
        let program = parse("fn bump(x) { x = x + 1; return x == 2; }");
        let decl = match &program.statements[0] {
            Stmt::FunctionDecl { decl } => decl,
            other => panic!("expected function declaration, found {other:?}"),
        };
        assert!(matches!(
            decl.body[0],
            Stmt::Expression {
                expr: Expr::Assign { .. }
            }
        ));
    }

    #[test]
    fn rejects_html_as_module_source() {
        // A remote origin answering 200 with an error page must not validate.
        let result = validate_module("<html><body>404</body></html>", "data_app");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_missing_semicolon() {
        let result = validate_module("let x = 1", "<test>");
        assert!(matches!(
            result,
            Err(ParseError::UnexpectedEndOfInput { .. })
        ));
    }

    #[test]
    fn validation_does_not_require_a_full_program() {
        assert!(validate_module("", "<empty>").is_ok());
    }
}

use std::collections::HashMap;
use std::fmt;

/// Represents the position of a token in the source code
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// All possible token types in TideScript
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,

    // Identifiers and keywords
    Identifier(String),
    Let,
    Fn,
    If,
    Else,
    While,
    Return,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    EqualEqual,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    And,
    Or,
    Not,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Semicolon,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{}", n),
            TokenKind::String(s) => write!(f, "\"{}\"", s),
            TokenKind::Boolean(b) => write!(f, "{}", b),
            TokenKind::Null => write!(f, "null"),
            TokenKind::Identifier(s) => write!(f, "{}", s),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// A token with its kind and position information
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self { kind, position }
    }
}

/// Scan failure with the position it was detected at.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanError {
    pub message: String,
    pub position: Position,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.position)
    }
}

impl std::error::Error for ScanError {}

/// Tokenizer for TideScript
pub struct Tokenizer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    keywords: HashMap<String, TokenKind>,
    tokens: Vec<Token>,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        let mut keywords = HashMap::new();
        keywords.insert("let".to_string(), TokenKind::Let);
        keywords.insert("fn".to_string(), TokenKind::Fn);
        keywords.insert("if".to_string(), TokenKind::If);
        keywords.insert("else".to_string(), TokenKind::Else);
        keywords.insert("while".to_string(), TokenKind::While);
        keywords.insert("return".to_string(), TokenKind::Return);
        keywords.insert("null".to_string(), TokenKind::Null);
        keywords.insert("true".to_string(), TokenKind::Boolean(true));
        keywords.insert("false".to_string(), TokenKind::Boolean(false));

        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            keywords,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, ScanError> {
        while !self.is_at_end() {
            self.skip_whitespace();

            if self.is_at_end() {
                break;
            }

            // Comments run to the end of the line
            if self.current_char() == '/' && self.peek_char() == Some('/') {
                self.skip_comment();
                continue;
            }

            if self.current_char() == '"' {
                self.handle_string()?;
                continue;
            }

            if self.current_char().is_ascii_digit() {
                self.handle_number()?;
                continue;
            }

            if self.current_char().is_alphabetic() || self.current_char() == '_' {
                self.handle_identifier();
                continue;
            }

            self.handle_operator_or_delimiter()?;
        }

        self.emit_token(TokenKind::Eof);
        Ok(self.tokens.clone())
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_char(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek_char(&self) -> Option<char> {
        if self.position + 1 >= self.input.len() {
            None
        } else {
            Some(self.input[self.position + 1])
        }
    }

    fn advance(&mut self) -> char {
        let ch = self.current_char();
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    fn current_position(&self) -> Position {
        Position::new(self.line, self.column, self.position)
    }

    fn emit_token(&mut self, kind: TokenKind) {
        let token = Token::new(kind, self.current_position());
        self.tokens.push(token);
    }

    fn emit_token_at(&mut self, kind: TokenKind, position: Position) {
        self.tokens.push(Token::new(kind, position));
    }

    fn error(&self, message: impl Into<String>) -> ScanError {
        ScanError {
            message: message.into(),
            position: self.current_position(),
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn skip_comment(&mut self) {
        while !self.is_at_end() && self.current_char() != '\n' {
            self.advance();
        }
    }

    fn handle_string(&mut self) -> Result<(), ScanError> {
        let start = self.current_position();
        self.advance(); // opening quote

        let mut value = String::new();
        while !self.is_at_end() && self.current_char() != '"' {
            let ch = self.advance();
            if ch == '\\' {
                match self.advance() {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    other => {
                        return Err(self.error(format!("unknown escape sequence '\\{}'", other)));
                    }
                }
            } else {
                value.push(ch);
            }
        }

        if self.is_at_end() {
            return Err(ScanError {
                message: "unterminated string literal".to_string(),
                position: start,
            });
        }

        self.advance(); // closing quote
        self.emit_token_at(TokenKind::String(value), start);
        Ok(())
    }

    fn handle_number(&mut self) -> Result<(), ScanError> {
        let start = self.current_position();
        let mut text = String::new();
        let mut is_float = false;

        while !self.is_at_end() && self.current_char().is_ascii_digit() {
            text.push(self.advance());
        }

        if self.current_char() == '.'
            && self
                .peek_char()
                .map(|ch| ch.is_ascii_digit())
                .unwrap_or(false)
        {
            is_float = true;
            text.push(self.advance());
            while !self.is_at_end() && self.current_char().is_ascii_digit() {
                text.push(self.advance());
            }
        }

        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.error(format!("invalid float literal '{}'", text)))?;
            self.emit_token_at(TokenKind::Float(value), start);
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.error(format!("integer literal '{}' out of range", text)))?;
            self.emit_token_at(TokenKind::Integer(value), start);
        }
        Ok(())
    }

    fn handle_identifier(&mut self) {
        let start = self.current_position();
        let mut text = String::new();
        while !self.is_at_end()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            text.push(self.advance());
        }

        let kind = self
            .keywords
            .get(&text)
            .cloned()
            .unwrap_or(TokenKind::Identifier(text));
        self.emit_token_at(kind, start);
    }

    fn handle_operator_or_delimiter(&mut self) -> Result<(), ScanError> {
        let start = self.current_position();
        let ch = self.advance();
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '=' => {
                if self.current_char() == '=' {
                    self.advance();
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                }
            }
            '!' => {
                if self.current_char() == '=' {
                    self.advance();
                    TokenKind::NotEqual
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.current_char() == '=' {
                    self.advance();
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.current_char() == '=' {
                    self.advance();
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            '&' => {
                if self.current_char() == '&' {
                    self.advance();
                    TokenKind::And
                } else {
                    return Err(ScanError {
                        message: "unexpected character '&'".to_string(),
                        position: start,
                    });
                }
            }
            '|' => {
                if self.current_char() == '|' {
                    self.advance();
                    TokenKind::Or
                } else {
                    return Err(ScanError {
                        message: "unexpected character '|'".to_string(),
                        position: start,
                    });
                }
            }
            other => {
                return Err(ScanError {
                    message: format!("unexpected character '{}'", other),
                    position: start,
                });
            }
        };
        self.emit_token_at(kind, start);
        Ok(())
    }
}

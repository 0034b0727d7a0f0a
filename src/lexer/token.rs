use crate::{ast::Literal, core::SourceLocation};

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    ty: TokenType,
    lexeme: String,
    literal: Option<Literal>,
    line: usize,
    column: usize,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "'{}' (line {}, column {})", self.lexeme, self.line, self.column)
    }
}

impl Token {
    pub fn new<S: Into<String>>(ty: TokenType, lexeme: S, line: usize, column: usize) -> Self {
        Self {
            ty,
            lexeme: lexeme.into(),
            literal: None,
            line,
            column,
        }
    }

    /// A token which does not originate from source code, used to attribute errors raised
    /// by host-provided functions.
    pub fn native<S: Into<String>>(name: S) -> Self {
        Self::new(TokenType::Identifier, name, 0, 0)
    }

    pub fn with_literal(self, literal: Literal) -> Self {
        Self {
            literal: Some(literal),
            ..self
        }
    }

    pub fn is(&self, ty: TokenType) -> bool {
        self.ty == ty
    }

    pub fn is_one_of(&self, ty: &[TokenType]) -> bool {
        ty.contains(&self.ty)
    }

    pub fn token_type(&self) -> TokenType {
        self.ty
    }

    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    pub fn literal(&self) -> Option<&Literal> {
        self.literal.as_ref()
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.lexeme.clone(), self.line, self.column)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TokenType {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,
    Percent,
    Question,
    Colon,

    Ampersand,
    Pipe,
    Caret,
    LessLess,
    GreaterGreater,

    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    Identifier,
    String,
    Number,

    And,
    Break,
    Class,
    Else,
    False,
    Fun,
    For,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,
}

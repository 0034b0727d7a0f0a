use crate::{ast::Literal, core::SourceLocation, errors, LoxError};

use super::{Token, TokenType};

#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    line_start: usize,
    has_err: bool,
}

#[allow(clippy::while_let_on_iterator)]
impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            line_start: 0,
            has_err: false,
        }
    }

    pub fn has_error(&self) -> bool {
        self.has_err
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map(|(idx, _)| *idx).unwrap_or(self.source.len())
    }

    fn newline(&mut self, at: usize) {
        self.line += 1;
        self.line_start = at + 1;
    }

    fn match_char(&mut self, next: char) -> bool {
        self.chars.next_if(|(_, c)| *c == next).is_some()
    }

    fn advance_while_fn<F: Fn(char) -> bool>(&mut self, f: F) {
        while let Some((idx, c)) = self.chars.next_if(|(_, c)| f(*c)) {
            if c == '\n' {
                self.newline(idx);
            }
        }
    }

    fn emit(&mut self, ty: TokenType, start: usize, line: usize, column: usize) -> Token {
        let end = self.offset();
        Token::new(ty, &self.source[start..end], line, column)
    }

    fn read_token(&mut self) -> Option<Result<Token, LoxError>> {
        use TokenType::*;

        while let Some((start, char)) = self.chars.next() {
            let line = self.line;
            let column = start - self.line_start + 1;

            let ty = match char {
                ' ' | '\r' | '\t' => continue,
                '\n' => {
                    self.newline(start);
                    continue;
                },
                '(' => LeftParen,
                ')' => RightParen,
                '{' => LeftBrace,
                '}' => RightBrace,
                ',' => Comma,
                '.' => Dot,
                '-' => Minus,
                '+' => Plus,
                ';' => Semicolon,
                '*' => Star,
                '%' => Percent,
                '?' => Question,
                ':' => Colon,
                '&' => Ampersand,
                '|' => Pipe,
                '^' => Caret,

                '!' if self.match_char('=') => BangEqual,
                '!' => Bang,
                '=' if self.match_char('=') => EqualEqual,
                '=' => Equal,
                '>' if self.match_char('=') => GreaterEqual,
                '>' if self.match_char('>') => GreaterGreater,
                '>' => Greater,
                '<' if self.match_char('=') => LessEqual,
                '<' if self.match_char('<') => LessLess,
                '<' => Less,

                '/' if self.match_char('/') => {
                    self.advance_while_fn(|c| c != '\n');
                    continue;
                },
                '/' if self.match_char('*') => {
                    self.skip_block_comment();
                    continue;
                },
                '/' => Slash,

                '"' => return Some(self.read_string(start, line, column)),

                c if c.is_ascii_digit() => return Some(self.read_number(start, line, column)),
                c if c.is_alphabetic() || c == '_' => return Some(Ok(self.read_identifier(start, line, column))),

                c => {
                    self.has_err = true;
                    return Some(Err(errors::language(
                        SourceLocation::new(c.to_string(), line, column),
                        format!("We found an unexpected character '{}' where we were expecting one of: [whitespace, parenthesis, brace, operator, identifier, number, string, comment]", c),
                        "Make sure you have entered valid Lox code and have not accidentally closed a string.",
                    )))
                }
            };

            return Some(Ok(self.emit(ty, start, line, column)));
        }

        None
    }

    fn skip_block_comment(&mut self) {
        let mut depth = 1;
        while let Some((idx, c)) = self.chars.next() {
            match c {
                '\n' => self.newline(idx),
                '/' if self.match_char('*') => depth += 1,
                '*' if self.match_char('/') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                },
                _ => {}
            }
        }
    }

    fn read_string(&mut self, start: usize, line: usize, column: usize) -> Result<Token, LoxError> {
        while let Some((idx, c)) = self.chars.next() {
            match c {
                '\n' => self.newline(idx),
                '"' => {
                    let value = self.source[start + 1..idx].to_string();
                    return Ok(self.emit(TokenType::String, start, line, column).with_literal(Literal::String(value)));
                },
                _ => {}
            }
        }

        self.has_err = true;
        Err(errors::language(
            SourceLocation::new(self.source[start..].chars().take(20).collect::<String>(), line, column),
            "Reached the end of the file without finding the closing quote for a string.",
            "Make sure that you have terminated your string with a '\"' character.",
        ))
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> Result<Token, LoxError> {
        self.advance_while_fn(|c| c.is_ascii_digit());

        let mut ahead = self.chars.clone();
        if let (Some((_, '.')), Some((_, next))) = (ahead.next(), ahead.next()) {
            if next.is_ascii_digit() {
                self.chars.next();
                self.advance_while_fn(|c| c.is_ascii_digit());
            }
        }

        let token = self.emit(TokenType::Number, start, line, column);
        let value = token.lexeme().parse::<f64>().map_err(|e| errors::language(
            token.location(),
            format!("Unable to parse number '{}' ({}).", token.lexeme(), e),
            "Make sure you have provided a valid number within the bounds of a 64-bit floating point number.",
        ))?;

        Ok(token.with_literal(Literal::Number(value)))
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token {
        use TokenType::*;

        self.advance_while_fn(|c| c.is_alphanumeric() || c == '_');
        let end = self.offset();

        let ty = match &self.source[start..end] {
            "and" => And,
            "break" => Break,
            "class" => Class,
            "else" => Else,
            "false" => False,
            "for" => For,
            "fun" => Fun,
            "if" => If,
            "nil" => Nil,
            "or" => Or,
            "print" => Print,
            "return" => Return,
            "super" => Super,
            "this" => This,
            "true" => True,
            "var" => Var,
            "while" => While,
            _ => Identifier,
        };

        self.emit(ty, start, line, column)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token, LoxError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_types(source: &str) -> Vec<TokenType> {
        Scanner::new(source)
            .map(|t| t.expect("without an error").token_type())
            .collect()
    }

    #[test]
    fn test_basic_operators() {
        let mut lexer = Scanner::new("+ - * /");

        assert_eq!(lexer.next().expect("a token").expect("without an error"), Token::new(TokenType::Plus, "+", 1, 1));
        assert_eq!(lexer.next().expect("a token").expect("without an error"), Token::new(TokenType::Minus, "-", 1, 3));
        assert_eq!(lexer.next().expect("a token").expect("without an error"), Token::new(TokenType::Star, "*", 1, 5));
        assert_eq!(lexer.next().expect("a token").expect("without an error"), Token::new(TokenType::Slash, "/", 1, 7));
        assert!(lexer.next().is_none(), "no more tokens");
    }

    #[test]
    fn test_basic_symbols() {
        let mut lexer = Scanner::new(r#"
// this is a comment
(( )){} // grouping stuff
!*+-/=<> <= == // operators
& | ^ << >> ? : %
"#);

        let tokens = [
            "(", "(", ")", ")", "{", "}",
            "!", "*", "+", "-", "/", "=", "<", ">", "<=", "==",
            "&", "|", "^", "<<", ">>", "?", ":", "%",
        ];

        for token in tokens {
            assert_eq!(lexer.next().expect("a token").expect("without an error").lexeme(), token);
        }

        assert!(lexer.next().is_none(), "no more tokens");
    }

    #[test]
    fn test_comments() {
        let mut lexer = Scanner::new(r#"
// single line comment
/* multi-line comment on a single line */
/*
* multi-line comment
* on multiple lines
*/
/*/* Nested multi-line comment! */*/
        "#);

        assert!(lexer.next().is_none(), "no more tokens");
    }

    #[test]
    fn test_strings() {
        let mut lexer = Scanner::new(r#" "test" "#);

        let token = lexer.next().expect("a token").expect("without an error");
        assert!(token.is(TokenType::String));
        assert_eq!(token.lexeme(), "\"test\"");
        assert_eq!(token.literal(), Some(&Literal::String("test".into())));

        assert!(lexer.next().is_none(), "no more tokens");
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Scanner::new("\"never closed");

        let err = lexer.next().expect("a token").expect_err("an error");
        assert_eq!(err.message(), "Reached the end of the file without finding the closing quote for a string.");
        assert!(lexer.has_error());
    }

    #[test]
    fn test_numbers() {
        let mut lexer = Scanner::new(r#" 123 12.34 12. "#);

        let numbers = [("123", 123.0), ("12.34", 12.34), ("12", 12.0)];
        for (lexeme, value) in numbers {
            let token = lexer.next().expect("a token").expect("without an error");
            assert!(token.is(TokenType::Number));
            assert_eq!(token.lexeme(), lexeme);
            assert_eq!(token.literal(), Some(&Literal::Number(value)));
        }

        assert!(lexer.next().expect("a token").expect("without an error").is(TokenType::Dot));
        assert!(lexer.next().is_none(), "no more tokens");
    }

    #[test]
    fn test_identifiers_and_keywords() {
        let mut lexer = Scanner::new(r#"
identifier _id a_b_c
and break class else false for fun if nil or print return super this true var while
"#);

        let identifiers = ["identifier", "_id", "a_b_c"];
        for identifier in identifiers {
            let token = lexer.next().expect("a token").expect("without an error");
            assert!(token.is(TokenType::Identifier));
            assert_eq!(token.lexeme(), identifier);
        }

        let keywords = ["and", "break", "class", "else", "false", "for", "fun", "if", "nil", "or", "print", "return", "super", "this", "true", "var", "while"];
        for keyword in keywords {
            let token = lexer.next().expect("a token").expect("without an error");
            assert!(!token.is(TokenType::Identifier));
            assert_eq!(token.lexeme(), keyword);
        }
    }

    #[test]
    fn test_line_and_column_tracking() {
        let tokens: Vec<Token> = Scanner::new("var a;\n  a = \"x\ny\";\nb").map(|t| t.expect("without an error")).collect();

        assert_eq!((tokens[0].line(), tokens[0].column()), (1, 1));
        assert_eq!((tokens[3].line(), tokens[3].column()), (2, 3));
        assert_eq!((tokens[5].line(), tokens[5].column()), (2, 7));
        assert_eq!((tokens[7].line(), tokens[7].column()), (4, 1));
    }

    #[test]
    fn test_unexpected_character() {
        let results: Vec<_> = Scanner::new("a # b").collect();

        assert_eq!(results.len(), 3);
        assert!(results[1].is_err());
        assert_eq!(token_types("a b"), vec![TokenType::Identifier, TokenType::Identifier]);
    }
}

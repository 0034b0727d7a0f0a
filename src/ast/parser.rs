use std::{iter::Peekable, rc::Rc};

use crate::{core::SourceLocation, errors, lexer::{Token, TokenType}, LoxError};

use super::{ClassDecl, Expr, ExprId, FunDecl, Literal, Stmt};

const MAX_ARGS: usize = 255;

pub struct Parser;

/// A peekable token stream which remembers where the last token it produced was found, so
/// that errors at the end of the input can still point somewhere useful.
struct Cursor<I: Iterator<Item = Token>> {
    tokens: Peekable<I>,
    line: usize,
}

impl<I: Iterator<Item = Token>> Cursor<I> {
    fn new(tokens: I) -> Self {
        Self { tokens: tokens.peekable(), line: 1 }
    }

    fn peek(&mut self) -> Option<&Token> {
        self.tokens.peek()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.next();
        if let Some(token) = &token {
            self.line = token.line();
        }
        token
    }

    fn next_if(&mut self, types: &[TokenType]) -> Option<Token> {
        let token = self.tokens.next_if(|t| t.is_one_of(types));
        if let Some(token) = &token {
            self.line = token.line();
        }
        token
    }

    fn check(&mut self, types: &[TokenType]) -> bool {
        matches!(self.tokens.peek(), Some(t) if t.is_one_of(types))
    }

    fn end_of_file(&self) -> SourceLocation {
        SourceLocation::new("end of file", self.line, 0)
    }
}

// Macros which make it easier to implement certain common parts of the parser.
macro_rules! rd_term {
    ($name:ident := $token_id:ident => $ret:ty : $body:expr) => {
        fn $name<I: Iterator<Item = Token>>(
            $token_id: &mut Cursor<I>,
        ) -> Result<$ret, LoxError> {
            $body
        }
    };

    ($name:ident := $next:ident ( $($token:ident)|+ ) => binary) => {
        rd_term!($name := tokens => Expr : {
            let mut left = Self::$next(tokens)?;

            while let Some(op) = rd_matches!(tokens, $($token)|+) {
                let right = Self::$next(tokens)?;
                left = Expr::Binary(Box::new(left), op, Box::new(right));
            }

            Ok(left)
        });
    };

    ($name:ident := $next:ident ( $($token:ident)|+ ) => logical) => {
        rd_term!($name := tokens => Expr : {
            let mut left = Self::$next(tokens)?;

            while let Some(op) = rd_matches!(tokens, $($token)|+) {
                let right = Self::$next(tokens)?;
                left = Expr::Logical(Box::new(left), op, Box::new(right));
            }

            Ok(left)
        });
    };
}

macro_rules! rd_matches {
    ($tokens:ident, $($token:ident)|+) => {
        $tokens.next_if(&[$(TokenType::$token),+])
    };
}

macro_rules! rd_check {
    ($tokens:ident, $($token:ident)|+) => {
        $tokens.check(&[$(TokenType::$token),+])
    };
}

macro_rules! rd_consume {
    ($tokens:ident, $($token:ident)|+, $msg:expr, $advice:expr) => {
        match $tokens.next() {
            Some(token) if token.is_one_of(&[$(TokenType::$token),+]) => token,
            Some(token) => return Err(errors::language(
                token.location(),
                format!("{}, but got {} instead.", $msg, token),
                $advice
            )),
            None => return Err(errors::language(
                $tokens.end_of_file(),
                format!("{}, but reached the end of the file instead.", $msg),
                $advice
            )),
        }
    };
}

impl Parser {
    pub fn parse<T: Iterator<Item = Token>>(
        tokens: &mut T,
    ) -> (Vec<Stmt>, Vec<LoxError>) {
        let mut tokens = Cursor::new(tokens);
        let mut stmts = Vec::new();
        let mut errs = Vec::new();

        while tokens.peek().is_some() {
            match Self::declaration(&mut tokens) {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    Self::synchronize(&mut tokens);
                    errs.push(err);
                },
            }
        }

        (stmts, errs)
    }

    pub fn parse_expr<T: Iterator<Item = Token>>(
        tokens: &mut T,
    ) -> Result<Expr, LoxError> {
        let mut tokens = Cursor::new(tokens);
        let expr = Self::expression(&mut tokens)?;

        match tokens.next() {
            None => Ok(expr),
            Some(token) => Err(errors::language(
                token.location(),
                format!("Expected the end of the expression, but got {} instead.", token),
                "Make sure that you have provided a single expression.",
            )),
        }
    }

    rd_term!(declaration := tokens => Stmt : {
        if rd_matches!(tokens, Class).is_some() {
            return Self::class_declaration(tokens);
        }

        if let Some(keyword) = rd_matches!(tokens, Fun) {
            if rd_check!(tokens, Identifier) {
                return Ok(Stmt::Fun(Self::function(tokens, "function")?));
            }

            // An anonymous function used as an expression statement.
            let lambda = Self::lambda(tokens, keyword)?;
            let expr = Self::postfix(tokens, lambda)?;
            rd_consume!(tokens, Semicolon, "Expected ';' after expression", "Make sure that you have a semicolon at the end of your previous expression.");
            return Ok(Stmt::Expression(expr));
        }

        if rd_matches!(tokens, Var).is_some() {
            return Self::var_declaration(tokens);
        }

        Self::statement(tokens)
    });

    rd_term!(var_declaration := tokens => Stmt : {
        let ident = rd_consume!(tokens, Identifier, "Expected an identifier to be provided after 'var'", "Provide a variable name after the `var` keyword.");

        let init = if rd_matches!(tokens, Equal).is_some() {
            Some(Self::expression(tokens)?)
        } else {
            None
        };

        rd_consume!(tokens, Semicolon, "Expected ';' after variable declaration", "Make sure that you have a semicolon after the variable declaration.");
        Ok(Stmt::Var(ident, init))
    });

    rd_term!(class_declaration := tokens => Stmt : {
        let name = rd_consume!(tokens, Identifier, "Expected a class name after the `class` keyword", "Provide a name for your class after the `class` keyword.");

        let superclass = if rd_matches!(tokens, Less).is_some() {
            let superclass = rd_consume!(tokens, Identifier, "Expected a superclass name after '<'", "Provide the name of the class you wish to inherit from after the '<'.");
            Some(Expr::Var(ExprId::next(), superclass))
        } else {
            None
        };

        rd_consume!(tokens, LeftBrace, "Expected an opening brace `{` before the class body", "Make sure you have an opening brace `{` after the class name.");

        let mut class = ClassDecl {
            name,
            superclass,
            methods: Vec::new(),
            getters: Vec::new(),
            statics: Vec::new(),
            static_getters: Vec::new(),
        };

        while !rd_check!(tokens, RightBrace) && tokens.peek().is_some() {
            let is_static = rd_matches!(tokens, Class).is_some();
            let name = rd_consume!(tokens, Identifier, "Expected a method name within the class body", "Class bodies may only contain methods, getters and `class` (static) members.");

            if rd_check!(tokens, LeftParen) {
                let method = Self::function_rest(tokens, name, if is_static { "static method" } else { "method" })?;
                if is_static { class.statics.push(method) } else { class.methods.push(method) }
            } else if rd_matches!(tokens, LeftBrace).is_some() {
                let getter = FunDecl { name, params: Vec::new(), body: Rc::from(Self::block(tokens)?) };
                if is_static { class.static_getters.push(getter) } else { class.getters.push(getter) }
            } else {
                return Err(match tokens.next() {
                    Some(token) => errors::language(
                        token.location(),
                        format!("Expected '(' for a method or '{{' for a getter after '{}', but got {} instead.", name.lexeme(), token),
                        "Methods take a parameter list in parentheses, getters are followed directly by their body.",
                    ),
                    None => errors::language(
                        tokens.end_of_file(),
                        "Expected '(' for a method or '{' for a getter, but reached the end of the file instead.",
                        "Make sure you have closed your class body with a `}`.",
                    ),
                });
            }
        }

        rd_consume!(tokens, RightBrace, "Expected a closing brace `}` after the class body", "Make sure you have a closing brace `}` after the class body.");
        Ok(Stmt::Class(class))
    });

    fn function<I: Iterator<Item = Token>>(tokens: &mut Cursor<I>, kind: &str) -> Result<FunDecl, LoxError> {
        let name = rd_consume!(tokens, Identifier, format!("Expected a {} name", kind), "Provide a name after the `fun` keyword.");
        Self::function_rest(tokens, name, kind)
    }

    fn function_rest<I: Iterator<Item = Token>>(tokens: &mut Cursor<I>, name: Token, kind: &str) -> Result<FunDecl, LoxError> {
        let params = Self::parameters(tokens, kind)?;
        rd_consume!(tokens, LeftBrace, format!("Expected an opening brace `{{` before the {} body", kind), "Function bodies must be wrapped in braces.");
        let body = Self::block(tokens)?;

        Ok(FunDecl { name, params, body: Rc::from(body) })
    }

    fn lambda<I: Iterator<Item = Token>>(tokens: &mut Cursor<I>, keyword: Token) -> Result<Expr, LoxError> {
        let params = Self::parameters(tokens, "anonymous function")?;
        rd_consume!(tokens, LeftBrace, "Expected an opening brace `{` before the anonymous function body", "Function bodies must be wrapped in braces.");
        let body = Self::block(tokens)?;

        Ok(Expr::Fun(keyword, params, Rc::from(body)))
    }

    fn parameters<I: Iterator<Item = Token>>(tokens: &mut Cursor<I>, kind: &str) -> Result<Vec<Token>, LoxError> {
        rd_consume!(tokens, LeftParen, format!("Expected an opening parenthesis `(` after the {} name", kind), "Provide the list of parameters in parentheses.");

        let mut params = Vec::new();
        if !rd_check!(tokens, RightParen) {
            loop {
                let param = rd_consume!(tokens, Identifier, "Expected a parameter name", "Parameters must be plain identifiers separated by commas.");
                if params.len() >= MAX_ARGS {
                    return Err(errors::language(
                        param.location(),
                        format!("Cannot have more than {} parameters.", MAX_ARGS),
                        "Try grouping some of your parameters into an object.",
                    ));
                }
                params.push(param);

                if rd_matches!(tokens, Comma).is_none() {
                    break;
                }
            }
        }

        rd_consume!(tokens, RightParen, "Expected a closing parenthesis `)` after the parameters", "Make sure you have closed the parameter list.");
        Ok(params)
    }

    rd_term!(statement := tokens => Stmt : {
        if rd_matches!(tokens, For).is_some() {
            return Self::for_statement(tokens);
        }

        if rd_matches!(tokens, If).is_some() {
            return Self::if_statement(tokens);
        }

        if rd_matches!(tokens, LeftBrace).is_some() {
            return Ok(Stmt::Block(Self::block(tokens)?));
        }

        if rd_matches!(tokens, While).is_some() {
            return Self::while_statement(tokens);
        }

        if let Some(keyword) = rd_matches!(tokens, Return) {
            let value = if rd_check!(tokens, Semicolon) {
                None
            } else {
                Some(Self::expression(tokens)?)
            };

            rd_consume!(tokens, Semicolon, "Expected ';' after the return value", "Make sure that you have a semicolon at the end of your return statement.");
            return Ok(Stmt::Return(keyword, value));
        }

        if let Some(keyword) = rd_matches!(tokens, Break) {
            rd_consume!(tokens, Semicolon, "Expected ';' after 'break'", "Make sure that you have a semicolon after the `break` keyword.");
            return Ok(Stmt::Break(keyword));
        }

        let stmt = if rd_matches!(tokens, Print).is_some() {
            Stmt::Print(Self::expression(tokens)?)
        } else {
            Stmt::Expression(Self::expression(tokens)?)
        };

        rd_consume!(tokens, Semicolon, "Expected ';' after expression", "Make sure that you have a semicolon at the end of your previous expression.");
        Ok(stmt)
    });

    rd_term!(if_statement := tokens => Stmt : {
        rd_consume!(tokens, LeftParen, "Expected an opening parenthesis `(` after the `if` keyword", "Make sure you have an opening parenthesis `(` after the `if` keyword.");

        let condition = Self::expression(tokens)?;

        rd_consume!(tokens, RightParen, "Expected a closing parenthesis `)` after the `if` keyword's condition", "Make sure you have a closing parenthesis `)` after the `if` keyword's condition.");

        let then_branch = Self::statement(tokens)?;

        let else_branch = if rd_matches!(tokens, Else).is_some() {
            Some(Box::new(Self::statement(tokens)?))
        } else {
            None
        };

        Ok(Stmt::If(condition, Box::new(then_branch), else_branch))
    });

    rd_term!(for_statement := tokens => Stmt : {
        rd_consume!(tokens, LeftParen, "Expected an opening parenthesis `(` after the `for` keyword", "Make sure you have an opening parenthesis `(` after the `for` keyword.");

        let init = if rd_matches!(tokens, Semicolon).is_some() {
            None
        } else if rd_matches!(tokens, Var).is_some() {
            Some(Self::var_declaration(tokens)?)
        } else {
            let expr = Stmt::Expression(Self::expression(tokens)?);
            rd_consume!(tokens, Semicolon, "Expected a semicolon after the initializer", "Make sure you have a semicolon after the initializer.");
            Some(expr)
        };

        let cond = if rd_check!(tokens, Semicolon) {
            None
        } else {
            Some(Self::expression(tokens)?)
        };
        rd_consume!(tokens, Semicolon, "Expected a semicolon after the condition", "Make sure you have a semicolon after the condition.");

        let incr = if rd_check!(tokens, RightParen) {
            None
        } else {
            Some(Self::expression(tokens)?)
        };
        rd_consume!(tokens, RightParen, "Expected a closing parenthesis `)` after the `for` keyword's clauses", "Make sure you have a closing parenthesis `)` after the `for` keyword's clauses.");

        let mut body = Self::statement(tokens)?;

        if let Some(incr) = incr {
            body = Stmt::Block(vec![body, Stmt::Expression(incr)]);
        }

        body = Stmt::While(cond.unwrap_or(Expr::Literal(Literal::Bool(true))), Box::new(body));

        if let Some(init) = init {
            body = Stmt::Block(vec![init, body]);
        }

        Ok(body)
    });

    rd_term!(while_statement := tokens => Stmt : {
        rd_consume!(tokens, LeftParen, "Expected an opening parenthesis `(` after the `while` keyword", "Make sure you have an opening parenthesis `(` after the `while` keyword.");

        let condition = Self::expression(tokens)?;

        rd_consume!(tokens, RightParen, "Expected a closing parenthesis `)` after the `while` keyword's condition", "Make sure you have a closing parenthesis `)` after the `while` keyword's condition.");

        let body = Self::statement(tokens)?;

        Ok(Stmt::While(condition, Box::new(body)))
    });

    rd_term!(block := tokens => Vec<Stmt> : {
        let mut stmts = Vec::new();

        while !rd_check!(tokens, RightBrace) && tokens.peek().is_some() {
            stmts.push(Self::declaration(tokens)?);
        }

        rd_consume!(tokens, RightBrace, "Expected a closing brace `}` after the block", "Make sure you have a closing brace `}` after the block.");
        Ok(stmts)
    });

    rd_term!(expression := tokens => Expr : Self::assignment(tokens));

    rd_term!(assignment := tokens => Expr : {
        let expr = Self::ternary(tokens)?;

        if let Some(equals) = rd_matches!(tokens, Equal) {
            let value = Self::assignment(tokens)?;

            match expr {
                Expr::Var(_, name) => Ok(Expr::Assign(ExprId::next(), name, Box::new(value))),
                Expr::Get(object, name) => Ok(Expr::Set(object, name, Box::new(value))),
                _ => Err(errors::language(
                    equals.location(),
                    "Invalid assignment target.",
                    "Make sure that you provide the name of a variable or property to assign to."
                )),
            }
        } else {
            Ok(expr)
        }
    });

    rd_term!(ternary := tokens => Expr : {
        let cond = Self::or(tokens)?;

        if let Some(op) = rd_matches!(tokens, Question) {
            let then_branch = Self::expression(tokens)?;
            rd_consume!(tokens, Colon, "Expected ':' after the first branch of the conditional expression", "Conditional expressions take the form `condition ? a : b`.");
            let else_branch = Self::ternary(tokens)?;

            Ok(Expr::Ternary(Box::new(cond), op, Box::new(then_branch), Box::new(else_branch)))
        } else {
            Ok(cond)
        }
    });

    rd_term!(or := and (Or) => logical);

    rd_term!(and := bit_or (And) => logical);

    rd_term!(bit_or := bit_xor (Pipe) => binary);

    rd_term!(bit_xor := bit_and (Caret) => binary);

    rd_term!(bit_and := equality (Ampersand) => binary);

    rd_term!(equality := comparison (BangEqual | EqualEqual) => binary);

    rd_term!(comparison := shift (Greater | GreaterEqual | Less | LessEqual) => binary);

    rd_term!(shift := term (LessLess | GreaterGreater) => binary);

    rd_term!(term := factor (Minus | Plus) => binary);

    rd_term!(factor := unary (Star | Slash | Percent) => binary);

    rd_term!(unary := tokens => Expr : {
        if let Some(op) = rd_matches!(tokens, Bang | Minus) {
            let right = Self::unary(tokens)?;
            return Ok(Expr::Unary(op, Box::new(right)));
        }

        Self::call(tokens)
    });

    rd_term!(call := tokens => Expr : {
        let expr = Self::primary(tokens)?;
        Self::postfix(tokens, expr)
    });

    fn postfix<I: Iterator<Item = Token>>(tokens: &mut Cursor<I>, mut expr: Expr) -> Result<Expr, LoxError> {
        loop {
            if rd_matches!(tokens, LeftParen).is_some() {
                expr = Self::finish_call(tokens, expr)?;
            } else if rd_matches!(tokens, Dot).is_some() {
                let name = rd_consume!(tokens, Identifier, "Expected a property name after '.'", "Provide the name of the property you wish to access.");
                expr = Expr::Get(Box::new(expr), name);
            } else {
                return Ok(expr);
            }
        }
    }

    fn finish_call<I: Iterator<Item = Token>>(tokens: &mut Cursor<I>, callee: Expr) -> Result<Expr, LoxError> {
        let mut args = Vec::new();

        if !rd_check!(tokens, RightParen) {
            loop {
                let arg = Self::expression(tokens)?;
                if args.len() >= MAX_ARGS {
                    return Err(errors::language(
                        tokens.end_of_file(),
                        format!("Cannot have more than {} arguments.", MAX_ARGS),
                        "Try grouping some of your arguments into an object.",
                    ));
                }
                args.push(arg);

                if rd_matches!(tokens, Comma).is_none() {
                    break;
                }
            }
        }

        let paren = rd_consume!(tokens, RightParen, "Expected a closing parenthesis `)` after the call arguments", "Make sure you have closed the argument list.");
        Ok(Expr::Call(Box::new(callee), paren, args))
    }

    rd_term!(primary := tokens => Expr : {
        match tokens.next() {
            Some(token) => match token.token_type() {
                TokenType::False => Ok(Expr::Literal(Literal::Bool(false))),
                TokenType::True => Ok(Expr::Literal(Literal::Bool(true))),
                TokenType::Nil => Ok(Expr::Literal(Literal::Nil)),
                TokenType::Number | TokenType::String => Ok(Expr::Literal(token.literal().cloned().unwrap_or(Literal::Nil))),
                TokenType::LeftParen => {
                    let expr = Self::expression(tokens)?;
                    rd_consume!(tokens, RightParen, "Expected a closing parenthesis `)` after the expression", "Make sure you have a closing parenthesis `)` after the expression.");
                    Ok(Expr::Grouping(Box::new(expr)))
                },
                TokenType::Identifier => Ok(Expr::Var(ExprId::next(), token)),
                TokenType::This => Ok(Expr::This(ExprId::next(), token)),
                TokenType::Super => {
                    rd_consume!(tokens, Dot, "Expected '.' after 'super'", "You can only access a superclass member through `super.name`.");
                    let method = rd_consume!(tokens, Identifier, "Expected a superclass method name after 'super.'", "Provide the name of the superclass member you wish to access.");
                    Ok(Expr::Super(ExprId::next(), token, method))
                },
                TokenType::Fun => Self::lambda(tokens, token),
                _ => Err(errors::language(
                    token.location(),
                    format!("Encountered an unexpected {} while waiting for one of ['true', 'false', 'nil', number, string, identifier, 'this', 'super', 'fun', '('].", token),
                    "Make sure that you are providing a primary value at this location.",
                )),
            },
            None => Err(errors::language(
                tokens.end_of_file(),
                "Reached the end of the input while waiting for one of ['true', 'false', 'nil', number, string, identifier, 'this', 'super', 'fun', '('].",
                "Make sure that you have provided a valid expression.")),
        }
    });

    fn synchronize<I: Iterator<Item = Token>>(tokens: &mut Cursor<I>) {
        while let Some(token) = tokens.next() {
            // If we reach a semicolon, we can stop because the next token will be the start of a new statement
            if token.is(TokenType::Semicolon) {
                break;
            }

            // If the next token is the start of a new statement, we can stop
            if rd_check!(tokens, Class | Fun | Var | For | If | While | Print | Return) {
                break;
            }
        }
    }
}

use thiserror::Error;

use crate::lexer::Token;

use super::SourceLocation;

/// The single error type raised anywhere in the crate.
///
/// `Language` errors are raised before execution (scanning, parsing and scope resolution),
/// `Runtime` errors carry the token at which evaluation failed, and `System` errors indicate
/// a problem with the interpreter itself or its host.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoxError {
    #[error("Error at {0}: {1}")]
    Language(SourceLocation, String, String),

    #[error("{1}\n[line {}]", .0.line())]
    Runtime(Token, String, String),

    #[error("{0}")]
    System(String, String),
}

impl LoxError {
    pub fn message(&self) -> &str {
        match self {
            LoxError::Language(_, message, _) => message,
            LoxError::Runtime(_, message, _) => message,
            LoxError::System(message, _) => message,
        }
    }

    pub fn advice(&self) -> &str {
        match self {
            LoxError::Language(_, _, advice) => advice,
            LoxError::Runtime(_, _, advice) => advice,
            LoxError::System(_, advice) => advice,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::Language(location, ..) => Some(location.line()),
            LoxError::Runtime(token, ..) => Some(token.line()),
            LoxError::System(..) => None,
        }
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, LoxError::Runtime(..))
    }
}

pub fn language<M: Into<String>, A: Into<String>>(location: SourceLocation, message: M, advice: A) -> LoxError {
    LoxError::Language(location, message.into(), advice.into())
}

pub fn runtime<M: Into<String>, A: Into<String>>(token: &Token, message: M, advice: A) -> LoxError {
    LoxError::Runtime(token.clone(), message.into(), advice.into())
}

pub fn system<M: Into<String>, A: Into<String>>(message: M, advice: A) -> LoxError {
    LoxError::System(message.into(), advice.into())
}

impl From<std::io::Error> for LoxError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::BrokenPipe => system(
                "The output stream was closed while the program was still writing to it.",
                "Make sure that whatever is reading the program's output stays open until it completes.",
            ),
            kind => system(
                format!("We were unable to write the program's output due to a {} error.", kind),
                "Check the internal error message and try searching for a solution online.",
            ),
        }
    }
}

use std::fmt;

/// A location within the source text, along with the fragment of source found there.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    sample: String,
    line: usize,
    column: usize,
}

impl SourceLocation {
    pub fn new<S: Into<String>>(sample: S, line: usize, column: usize) -> Self {
        Self { sample: sample.into(), line, column }
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.sample.is_empty() {
            write!(f, "line {}, column {}", self.line, self.column)
        } else {
            write!(f, "'{}' at line {}, column {}", &self.sample, self.line, self.column)
        }
    }
}

use derive_more::Display;

/// Line and column of a token or expression, both starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[display(fmt = "line {}, column {}", line, column)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    #[display(fmt = "SyntaxError")]
    Syntax,
    #[display(fmt = "NameError")]
    Name,
    #[display(fmt = "TypeError")]
    Type,
    #[display(fmt = "ValueError")]
    Value,
    #[display(fmt = "AggregationError")]
    Aggregation,
    #[display(fmt = "RecursionError")]
    Recursion,
    #[display(fmt = "IOError")]
    Io,
}

/// Every failure the lexer, parser or interpreter can report.
///
/// Errors are never recovered inside the core: the first one aborts the run
/// and is handed back to the caller untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}{}", at(.position))]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub position: Option<Position>,
}

fn at(position: &Option<Position>) -> String {
    match position {
        Some(position) => format!(" ({})", position),
        None => String::new(),
    }
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            position: None,
        }
    }

    pub fn syntax(message: impl Into<String>, position: Position) -> Self {
        Error {
            kind: ErrorKind::Syntax,
            message: message.into(),
            position: Some(position),
        }
    }

    pub fn name(name: &str) -> Self {
        Self::new(ErrorKind::Name, format!("name '{}' is not defined", name))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, message)
    }

    pub fn aggregation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Aggregation, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Attaches `position` unless a more precise one is already recorded.
    pub fn or_position(mut self, position: Position) -> Self {
        if self.position.is_none() {
            self.position = Some(position);
        }
        self
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err.to_string())
    }
}

use thiserror::Error;

/// Errors surfaced by the toolchain. Each variant is a distinct kind so
/// callers can match on what failed, not just on the message text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("parse error{}: {message}", fmt_offset(.offset))]
    Parse {
        message: String,
        offset: Option<usize>,
    },

    #[error("semantic error{}: {message}", fmt_offset(.offset))]
    Semantic {
        message: String,
        offset: Option<usize>,
    },

    #[error("codegen error: {message}")]
    Codegen { message: String },

    #[error("builder error: {message}")]
    Builder { message: String },

    #[error("serialize error: {message}")]
    Serialize { message: String },

    #[error("CLVM compile error: {message}")]
    Compile { message: String },

    #[error("simulation error: {message}")]
    Simulation { message: String },
}

impl Error {
    pub fn parse(message: impl Into<String>, offset: usize) -> Self {
        Self::Parse {
            message: message.into(),
            offset: Some(offset),
        }
    }

    pub fn parse_eof(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            offset: None,
        }
    }

    pub fn semantic(message: impl Into<String>, offset: usize) -> Self {
        Self::Semantic {
            message: message.into(),
            offset: Some(offset),
        }
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        Self::Codegen {
            message: message.into(),
        }
    }

    pub fn builder(message: impl Into<String>) -> Self {
        Self::Builder {
            message: message.into(),
        }
    }

    pub fn serialize(message: impl Into<String>) -> Self {
        Self::Serialize {
            message: message.into(),
        }
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile {
            message: message.into(),
        }
    }

    pub fn simulation(message: impl Into<String>) -> Self {
        Self::Simulation {
            message: message.into(),
        }
    }

    /// Source offset the error points at, when one is known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Parse { offset, .. } | Self::Semantic { offset, .. } => *offset,
            _ => None,
        }
    }
}

fn fmt_offset(offset: &Option<usize>) -> String {
    match offset {
        Some(at) => format!(" at offset {at}"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_offset() {
        let err = Error::parse("unexpected `)`", 12);
        assert_eq!(err.to_string(), "parse error at offset 12: unexpected `)`");
        assert_eq!(err.offset(), Some(12));
    }

    #[test]
    fn kinds_are_distinct() {
        let a = Error::builder("then without if");
        let b = Error::compile("then without if");
        assert!(matches!(a, Error::Builder { .. }));
        assert!(matches!(b, Error::Compile { .. }));
        assert_ne!(a, b);
    }
}

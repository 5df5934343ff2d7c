use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, MfErr>;

/// The matrix factorization crate's error type.
#[derive(Debug)]
pub enum MfErr {
    /// The sparse interaction matrix is malformed.
    Construction {
        reason: String,
    },
    /// A hyperparameter is out of its valid range.
    InvalidConfig {
        field: &'static str,
        reason: String,
    },
    /// A training session was driven from the wrong state.
    InvalidState {
        expected: &'static str,
        got: &'static str,
    },
    ShapeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    Parse {
        line: usize,
        reason: String,
    },
    Io(io::Error),
    Json(serde_json::Error),
}

impl MfErr {
    pub(crate) fn construction(reason: impl Into<String>) -> Self {
        Self::Construction {
            reason: reason.into(),
        }
    }

    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

impl Display for MfErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MfErr::Construction { reason } => write!(f, "malformed interaction matrix: {reason}"),
            MfErr::InvalidConfig { field, reason } => {
                write!(f, "invalid config field `{field}`: {reason}")
            }
            MfErr::InvalidState { expected, got } => {
                write!(f, "training session is {got}, expected it to be {expected}")
            }
            MfErr::ShapeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            MfErr::Parse { line, reason } => write!(f, "line {line}: {reason}"),
            MfErr::Io(e) => write!(f, "io error: {e}"),
            MfErr::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl Error for MfErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MfErr::Io(e) => Some(e),
            MfErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MfErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for MfErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

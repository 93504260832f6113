use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use crate::model::Phase;

/// The result type used across the learner.
pub type Result<T> = std::result::Result<T, ModelErr>;

/// The learner's error type.
#[derive(Debug)]
pub enum ModelErr {
    /// The configuration can't describe a usable model.
    InvalidConfig(String),
    /// An update names a class outside of `[0, nr_class)`.
    ClassOutOfRange { class: usize, nr_class: usize },
    /// The arena or the score cache couldn't reserve more memory.
    Allocation { what: &'static str },
    /// A persisted record couldn't be parsed.
    Format { line: usize, reason: String },
    /// The model is past the phase in which it accepts training calls.
    NotTrainable { phase: Phase },
    /// A buffer doesn't have the expected length.
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    Io(io::Error),
}

impl Display for ModelErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            ModelErr::ClassOutOfRange { class, nr_class } => {
                write!(f, "class {class} is out of range for a model with {nr_class} classes")
            }
            ModelErr::Allocation { what } => write!(f, "failed to allocate {what}"),
            ModelErr::Format { line, reason } => {
                write!(f, "malformed record at line {line}: {reason}")
            }
            ModelErr::NotTrainable { phase } => {
                write!(f, "the model can't be trained in the {phase} phase")
            }
            ModelErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch for {what}: got {got}, expected {expected}"),
            ModelErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ModelErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ModelErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ModelErr {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidConfig(value.to_string())
    }
}

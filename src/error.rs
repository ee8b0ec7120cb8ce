use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    InvalidConfig(String),
    InvalidShape(String),
    InvalidState(String),
    /// The training loss became NaN.
    Diverged {
        loss: f32,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Error::InvalidShape(msg) => write!(f, "invalid shape: {msg}"),
            Error::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            Error::Diverged { loss } => write!(f, "training diverged: loss is {loss}"),
        }
    }
}

impl std::error::Error for Error {}

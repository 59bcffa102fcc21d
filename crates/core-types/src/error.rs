use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid signal: {reason}")]
    InvalidSignal { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

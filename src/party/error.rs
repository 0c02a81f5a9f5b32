use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

pub type MpcResult<T> = Result<T, MpcError>;

#[derive(Debug)]
pub enum MpcError {
    InvalidParameter(String),
    LengthMismatch { expected: usize, actual: usize },
    TransportFailure(io::Error),
    ProtocolDesync(String),
    ParseError(String),
    IoError(io::Error),
}

impl Display for MpcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MpcError::InvalidParameter(msg) => write!(f, "InvalidParameter({})", msg),
            MpcError::LengthMismatch { expected, actual } => {
                write!(f, "LengthMismatch(expected {}, got {})", expected, actual)
            }
            MpcError::TransportFailure(io_err) => write!(f, "TransportFailure({})", io_err),
            MpcError::ProtocolDesync(msg) => write!(f, "ProtocolDesync({})", msg),
            MpcError::ParseError(msg) => write!(f, "ParseError({})", msg),
            MpcError::IoError(io_err) => write!(f, "IoError({})", io_err),
        }
    }
}

impl Error for MpcError {}

impl From<io::Error> for MpcError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

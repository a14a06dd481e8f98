use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed {0} header")]
    MalformedHeader(&'static str),

    #[error("truncated {layer} header: needed {needed} bytes, available {available}")]
    Truncated {
        layer: &'static str,
        needed: usize,
        available: usize,
    },
}

pub type Result<T> = std::result::Result<T, DecodeError>;

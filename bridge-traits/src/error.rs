use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    #[error("Malformed server payload: {0}")]
    MalformedPayload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether this error came back as an HTTP status from the sync service.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            BridgeError::Http { status } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

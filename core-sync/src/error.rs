use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Invalid server data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

use thiserror::Error;

/// Failures surfaced by the indexing core.
///
/// Empty documents, empty queries and removal of an unknown source are not
/// errors: they produce empty results or zero counts.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sled::Error),

    #[error("store transaction aborted")]
    Transaction,

    #[error("corrupt record: {0}")]
    Codec(#[from] bincode::Error),

    #[error("corrupt metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<sled::transaction::TransactionError<()>> for Error {
    fn from(err: sled::transaction::TransactionError<()>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(()) => Error::Transaction,
            sled::transaction::TransactionError::Storage(e) => Error::StoreUnavailable(e),
        }
    }
}

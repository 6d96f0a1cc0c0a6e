//! Error taxonomy shared by every storage backend.

/// Errors surfaced by the durable stores.
///
/// `DoesNotExist` and `DataNotAvailable` are expected outcomes callers
/// branch on; the rest are fatal to the single operation and the backing
/// transaction is rolled back before they propagate.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("does not exist")]
    DoesNotExist,

    #[error("swap data not available")]
    DataNotAvailable,

    #[error("failed to decode {what} '{input}'")]
    Decode {
        what: &'static str,
        input: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("record codec: {0}")]
    Codec(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Kv(#[from] redb::Error),
}

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        StoreError::Kv(e.into())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        StoreError::Kv(e.into())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        StoreError::Kv(e.into())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        StoreError::Kv(e.into())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        StoreError::Kv(e.into())
    }
}

/// Decodes a hex identifier, tagging failures with the field they came
/// from. Malformed identifiers are never truncated or zero-filled.
pub fn decode_hex(what: &'static str, input: &str) -> Result<Vec<u8>, StoreError> {
    hex::decode(input).map_err(|source| StoreError::Decode {
        what,
        input: input.to_string(),
        source,
    })
}

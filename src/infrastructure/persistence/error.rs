use std::error::Error;
use std::fmt;

use crate::domain::models::{BlockHeight, FailureKind};

/// Error type for index storage
#[derive(Debug)]
pub enum DbError {
    /// Error from SeaORM
    SeaOrm(sea_orm::DbErr),
    /// The pool could not be opened
    Connection { chain_id: String, message: String },
    /// A value could not be encoded for its JSON column
    Encode { column: &'static str, message: String },
    /// The write of one height was rolled back
    BlockWrite {
        chain_id: String,
        height: BlockHeight,
        kind: FailureKind,
        source: Box<DbError>,
    },
    /// A failed-block row could not be upserted
    FailedBlockUpsert {
        chain_id: String,
        height: BlockHeight,
        kind: FailureKind,
        source: sea_orm::DbErr,
    },
}

impl DbError {
    /// Height the error belongs to, when it concerns a single block
    pub fn height(&self) -> Option<BlockHeight> {
        match self {
            DbError::BlockWrite { height, .. } | DbError::FailedBlockUpsert { height, .. } => {
                Some(*height)
            }
            _ => None,
        }
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::SeaOrm(e) => write!(f, "Database error: {}", e),
            DbError::Connection { chain_id, message } => {
                write!(f, "[{}] Database connection failed: {}", chain_id, message)
            }
            DbError::Encode { column, message } => {
                write!(f, "Failed to encode {}: {}", column, message)
            }
            DbError::BlockWrite {
                chain_id,
                height,
                kind,
                source,
            } => write!(
                f,
                "[{}] Writing {} for height {} rolled back: {}",
                chain_id,
                kind.as_str(),
                height,
                source
            ),
            DbError::FailedBlockUpsert {
                chain_id,
                height,
                kind,
                source,
            } => write!(
                f,
                "[{}] Recording {} failure for height {} failed: {}",
                chain_id,
                kind.as_str(),
                height,
                source
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DbError::SeaOrm(e) => Some(e),
            DbError::BlockWrite { source, .. } => Some(source.as_ref()),
            DbError::FailedBlockUpsert { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<sea_orm::DbErr> for DbError {
    fn from(err: sea_orm::DbErr) -> Self {
        DbError::SeaOrm(err)
    }
}

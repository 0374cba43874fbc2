use super::SchemaVersion;
use thiserror::Error;

/// Coarse classification of a [`BindError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Programming mistake in the calling code. Never retried.
    Usage,
    /// Stored bytes could not be decoded; the store file is damaged.
    CorruptData,
    /// Declared and stored schemas disagree.
    SchemaMismatch,
    /// The store could not be brought to the declared schema version.
    Migration,
    /// Failure reported by the storage engine or the host environment.
    Engine,
}

#[derive(Error, Debug)]
pub enum BindError {
    #[error("Cannot modify managed objects outside of a write transaction")]
    NotInTransaction,

    #[error("Object is not managed, but managed access was attempted")]
    NotManaged,

    #[error("Object is already managed by a store")]
    AlreadyManaged,

    #[error("Object identifiers cannot be null")]
    NullIdentifier,

    #[error("Corrupted string UTF-8 in property '{property}'")]
    CorruptData { property: String },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Property '{property}' of '{object_type}' has no column in the stored schema")]
    MissingColumn {
        object_type: String,
        property: String,
    },

    #[error("Object type '{0}' is not part of this store's schema")]
    UnknownObjectType(String),

    #[error("Store schema version {stored} is newer than declared version {declared}")]
    Downgrade {
        stored: SchemaVersion,
        declared: SchemaVersion,
    },

    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] Box<BindError>),

    #[error("Migration required: {0}")]
    MigrationRequired(String),

    #[error("Migration callback error: {0}")]
    Migration(String),

    #[error("Handle has already been released")]
    HandleReleased,

    #[error("Store has been closed")]
    StoreClosed,

    #[error("Store is read-only: {0}")]
    ReadOnly(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Native error: {0}")]
    Native(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl BindError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInTransaction
            | Self::NotManaged
            | Self::AlreadyManaged
            | Self::NullIdentifier
            | Self::HandleReleased
            | Self::StoreClosed
            | Self::UnknownObjectType(_)
            | Self::InvalidConfig(_)
            | Self::TypeMismatch(_) => ErrorKind::Usage,
            Self::CorruptData { .. } => ErrorKind::CorruptData,
            Self::SchemaMismatch(_) | Self::MissingColumn { .. } => ErrorKind::SchemaMismatch,
            Self::Downgrade { .. }
            | Self::MigrationFailed(_)
            | Self::MigrationRequired(_)
            | Self::Migration(_) => ErrorKind::Migration,
            Self::ReadOnly(_)
            | Self::ConstraintViolation(_)
            | Self::Native(_)
            | Self::LockError(_)
            | Self::IoError(_) => ErrorKind::Engine,
        }
    }

    pub fn is_usage_error(&self) -> bool {
        self.kind() == ErrorKind::Usage
    }
}

pub type Result<T> = std::result::Result<T, BindError>;

impl<T> From<std::sync::PoisonError<T>> for BindError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for BindError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("navigation failed for {url}: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("migration failed: {0}")]
    MigrationFailed(String),

    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

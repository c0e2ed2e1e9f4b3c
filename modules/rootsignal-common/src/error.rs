use thiserror::Error;

/// Errors surfaced at the domain layer: configuration loading, per-source
/// profile parsing, and date/text normalization. Propagated with `?`;
/// call-site glue (the CLI entrypoint, top-level run loops) collects these
/// into `anyhow::Result` rather than matching on every variant.
#[derive(Error, Debug)]
pub enum RootSignalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse source profile '{slug}': {reason}")]
    SourceProfile { slug: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub mod config;
pub mod date;
pub mod dead_link;
pub mod error;
pub mod source;
pub mod text;
pub mod types;

pub use config::Config;
pub use error::RootSignalError;
pub use source::{SourceProfile, SourcesDocument};
pub use types::*;

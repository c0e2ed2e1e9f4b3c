pub mod discovery;
pub mod error;
pub mod extract;
pub mod fetch;
mod fetchers;
pub mod links;
pub mod scrape;
pub mod store;

pub use error::{ArchiveError, Result};
pub use fetch::{FetchContext, PageBackend};
pub use store::ArchiveStore;

//! Web search providers returning ranked, bounded snippet lists.

pub mod any;
pub mod duckduckgo;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod provider;
pub mod serpapi;

pub use any::AnySearchProvider;
pub use error::SearchError;
pub use provider::{SearchProvider, WebSnippet};

//! Core traits for the edgesync system
//!
//! - [`EdgeProvider`]: Fetch, create, update and delete provider resources

pub mod edge_provider;

pub use edge_provider::EdgeProvider;

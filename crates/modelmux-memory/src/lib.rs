//! modelmux-memory - context store collaborators
//!
//! The coordinator enriches prompts with context retrieved from a memory
//! service and submits finished exchanges back to it. This crate defines
//! that contract ([`ContextStore`]) and two implementations:
//!
//! - [`InMemoryContextStore`]: bounded, keyword-overlap scored, in process
//! - [`HttpContextStore`]: client for a remote memory service

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod memory;
pub mod scorer;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use http::HttpContextStore;
pub use memory::InMemoryContextStore;
pub use store::ContextStore;
pub use types::{ContextRecord, ContextSnippet, Exchange};

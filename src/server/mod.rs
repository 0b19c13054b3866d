//! Server module for modelmux
//!
//! # Module Structure
//!
//! - `config`: Server and coordinator configuration
//! - `loader`: Configuration loading from files and environment
//! - `init`: Coordinator construction and the HTTP run loop

pub mod config;
mod init;
mod loader;

pub use init::{build_coordinator, run};
pub use loader::load_config;

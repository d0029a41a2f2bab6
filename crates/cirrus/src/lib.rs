//! # Cirrus Node
//!
//! Assembly of the Cirrus cluster node: configuration loading, component
//! wiring (log store, proof oracle, consensus engine, RPC surface) and
//! graceful shutdown.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod node;

pub use config::{Config, ConfigError};
pub use node::Node;

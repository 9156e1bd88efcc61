//! Core types and shared functionality for offcache.
//!
//! This crate provides:
//! - Cache store with SQLite backend, organized in named partitions
//! - Request descriptors and owned responses
//! - Control message protocol
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod message;
pub mod request;
pub mod response;

pub use cache::{CacheDb, Partition, PartitionStats};
pub use config::{AgentConfig, ConfigError};
pub use error::Error;
pub use message::{ControlMessage, VersionReply};
pub use request::{Destination, RequestDescriptor};
pub use response::{Response, ResponseKind};

//! SQLite-backed cache store organized in named partitions.
//!
//! This module provides a persistent request/response store using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named partitions with creation-order unified lookup
//! - Insertion-ordered keys for FIFO trimming
//! - Atomic batch writes for install-time priming
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod partition;

pub use crate::Error;

pub use connection::CacheDb;
pub use partition::{Partition, PartitionStats};

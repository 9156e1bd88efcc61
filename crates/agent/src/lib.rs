//! Offline-first caching agent for a single web site.
//!
//! This crate provides the request classifier, the cache-first fetch policy,
//! the install/activate lifecycle and the maintenance channel, plus the
//! network seam they share.

pub mod agent;
pub mod classify;
pub mod fetch;
pub mod lifecycle;
pub mod maintenance;
pub mod policy;

pub use agent::{Agent, FetchOutcome};
pub use classify::{BypassReason, Eligibility, RequestClassifier};
pub use fetch::{FetchClient, FetchConfig, Network};
pub use lifecycle::{LifecycleController, LifecycleState};
pub use maintenance::trim_partition;
pub use policy::{FetchPolicy, Intercepted, ResponseSource};

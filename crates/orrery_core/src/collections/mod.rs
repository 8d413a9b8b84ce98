//! # Collections
//!
//! Dense, mutation-safe containers shared by the dispatcher, the service
//! registry and the event bus.

mod dense_set;

pub use dense_set::DenseSet;

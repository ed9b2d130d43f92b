//! # autowire — Autowiring Service Container for Rust
//!
//! A string-keyed service container that builds objects from declared class
//! metadata: constructor parameters are matched against caller-supplied
//! values, defaults and registry entries, and every new object runs through
//! a prioritized post-construction pipeline.

pub use autowire_container::*;
pub use autowire_support::*;

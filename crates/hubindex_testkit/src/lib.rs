//! # hubindex Testkit
//!
//! Test utilities for hubindex.
//!
//! This crate provides:
//! - Corpus builders and a harness wiring engine, store, manager, rebuild
//!   engine and live indexer together
//! - A recording element store for checking pagination
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use hubindex_testkit::prelude::*;
//!
//! let harness = TestHarness::new(CorpusBuilder::new().assets(10..20, 1).build());
//! let report = harness.rebuild.run(&asset_endpoint("catalog")).unwrap();
//! assert_eq!(report.indexed(), 10);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;

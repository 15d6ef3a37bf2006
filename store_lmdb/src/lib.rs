//! LMDB storage backend for liquid-democracy voting.
//!
//! Implements all storage traits from `liquid-store` using the `heed` LMDB
//! bindings. Each logical store maps to one or more named databases within a
//! single environment, so multi-store writes share one transaction.

pub mod action;
pub mod codec;
pub mod environment;
pub mod error;
pub mod meta;
pub mod participant;
pub mod proposal;
pub mod resolution;
pub mod snapshot;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;

//! A two-updater, one-checker race on a pair of Fibonacci cells.
//!
//! Two updaters repeatedly read `x` and `y` and write the sum back into their
//! own cell; a checker asserts that neither cell grew past [`BOUND`]. The
//! fixture runs on real atomics ([`fixture::Native`]), under loom
//! ([`fixture::Loom`]), or inside the interleaving simulator in [`model`],
//! which explores every execution a memory-model relaxation policy allows.

pub mod config;
pub mod error;
pub mod fence;
pub mod fixture;
pub mod model;

pub use config::Config;
pub use error::BoundViolation;
pub use error::ConfigError;
pub use error::ReplayError;
pub use fixture::fibonacci_bound;
pub use fixture::Loc;
pub use fixture::BOUND;
pub use fixture::DEFAULT_ITERATIONS;
pub use fixture::INITIAL;
pub use fixture::MAX_ITERATIONS;

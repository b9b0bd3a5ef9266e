//! rom-core: stable foundation for the reduction workspace.
//!
//! Contains:
//! - numeric (Real, PSD tolerance, finiteness and rank-cutoff helpers)
//! - naming (record keys of the form `<strategy>_rank_<r>`)
//! - timing (wall-clock timer for basis compute times)
//! - error (shared error types)

pub mod error;
pub mod naming;
pub mod numeric;
pub mod timing;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use naming::BasisKey;
pub use numeric::*;
pub use timing::Timer;

//! Filter and aggregation engine.
//!
//! Pure, synchronous functions over a borrowed [`Dataset`](crate::models::Dataset):
//! filter records, group and reduce them, and optionally reshape the result
//! into a wide table.

pub mod aggregator;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod pivot;
pub mod summary;

pub use aggregator::*;
pub use error::EngineError;
pub use filter::*;
pub use pipeline::*;
pub use pivot::*;
pub use summary::*;

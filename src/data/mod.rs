//! Dataset loading.
//!
//! Turns a CSV file or URL into a read-only [`Dataset`](crate::models::Dataset).

pub mod loader;

pub use loader::{
    load_source, parse_csv, DataSource, LoadOptions, LoadedDataset, DEFAULT_DATA_URL,
};

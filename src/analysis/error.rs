//! Engine error types.
//!
//! Every variant is a caller contract violation. Empty results are
//! never reported through this type.

use crate::models::Dimension;
use thiserror::Error;

/// Errors raised by the filter/aggregation engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A filter or group-by referenced a name that is not a dimension.
    #[error("unknown dimension '{0}'")]
    UnknownDimension(String),

    /// Group-by lists must name between one and three dimensions.
    #[error("group-by needs 1 to {max} dimensions, got {got}")]
    InvalidGroupArity { got: usize, max: usize },

    /// The same dimension was named twice where distinct ones are required.
    #[error("dimension '{0}' is listed more than once")]
    DuplicateDimension(Dimension),

    /// Sum aggregation over a measure the dataset does not carry.
    #[error("unknown measure '{0}'")]
    UnknownMeasure(String),

    /// A pivot axis is not one of the table's group-by dimensions.
    #[error("dimension '{0}' is not part of the aggregate's group-by")]
    DimensionNotGrouped(Dimension),
}

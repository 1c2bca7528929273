//! The filter -> group -> (pivot) pipeline behind every chart.

use crate::analysis::{
    aggregate, apply_filters, pivot_wide, AggregateTable, Aggregation, EngineError, FilterSpec,
    FilteredView, GroupSpec, PivotTable,
};
use crate::models::{Dataset, Dimension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Row and column dimensions for a wide-format result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotSpec {
    pub rows: Dimension,
    pub columns: Dimension,
}

impl FromStr for PivotSpec {
    type Err = EngineError;

    /// Parses `rows:columns`, e.g. `country:medal_type`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rows, columns) = s
            .split_once(':')
            .ok_or_else(|| EngineError::UnknownDimension(s.trim().to_string()))?;
        Ok(Self {
            rows: rows.parse()?,
            columns: columns.parse()?,
        })
    }
}

impl fmt::Display for PivotSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rows, self.columns)
    }
}

/// Everything one filter interaction asks of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub filters: FilterSpec,
    pub group: GroupSpec,
    pub aggregation: Aggregation,
    pub pivot: Option<PivotSpec>,
}

impl Query {
    /// Count records grouped by `group`, with no filters.
    pub fn new(group: GroupSpec) -> Self {
        Self {
            filters: FilterSpec::new(),
            group,
            aggregation: Aggregation::Count,
            pivot: None,
        }
    }

    pub fn with_filters(mut self, filters: FilterSpec) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_pivot(mut self, pivot: PivotSpec) -> Self {
        self.pivot = Some(pivot);
        self
    }
}

/// Chart-ready result, long or wide.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum ChartData {
    Long(AggregateTable),
    Wide(PivotTable),
}

impl ChartData {
    /// True when the renderer should show its "no data" state.
    pub fn is_empty(&self) -> bool {
        match self {
            ChartData::Long(table) => table.is_empty(),
            ChartData::Wide(pivot) => pivot.is_empty(),
        }
    }
}

/// Aggregate (and optionally pivot) an already filtered view.
pub fn chart_for_view(view: &FilteredView<'_>, query: &Query) -> Result<ChartData, EngineError> {
    let table = aggregate(view, &query.group, &query.aggregation)?;

    match query.pivot {
        Some(pivot) => Ok(ChartData::Wide(pivot_wide(&table, pivot.rows, pivot.columns)?)),
        None => Ok(ChartData::Long(table)),
    }
}

/// Run the full pipeline over a dataset.
pub fn run_query(dataset: &Dataset, query: &Query) -> Result<ChartData, EngineError> {
    let view = apply_filters(dataset, &query.filters);
    chart_for_view(&view, query)
}

//! Per-dimension record filtering.

use crate::analysis::EngineError;
use crate::models::{Dataset, Dimension, Record};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Selection value that UI controls use to mean "every value".
pub const ALL_SELECTION: &str = "All";

/// Constraint on a single dimension.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Restriction {
    #[default]
    Unrestricted,
    RestrictedTo(BTreeSet<String>),
}

impl Restriction {
    /// Build a restriction from a UI selection.
    ///
    /// An empty selection, or one containing [`ALL_SELECTION`], is
    /// unrestricted. This is the only place the sentinel is recognised.
    pub fn from_selection<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for value in values {
            let value = value.into();
            let trimmed = value.trim();
            if trimmed == ALL_SELECTION {
                return Restriction::Unrestricted;
            }
            if !trimmed.is_empty() {
                set.insert(trimmed.to_string());
            }
        }
        Self::restricted_to(set)
    }

    /// Restrict to exactly these values. An empty set restricts nothing.
    pub fn restricted_to(values: BTreeSet<String>) -> Self {
        if values.is_empty() {
            Restriction::Unrestricted
        } else {
            Restriction::RestrictedTo(values)
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        match self {
            Restriction::Unrestricted => true,
            Restriction::RestrictedTo(values) => values.is_empty(),
        }
    }

    fn admits(&self, record: &Record, dimension: Dimension) -> bool {
        match self {
            Restriction::Unrestricted => true,
            Restriction::RestrictedTo(values) if values.is_empty() => true,
            Restriction::RestrictedTo(values) => values
                .iter()
                .any(|value| record.dimension_matches(dimension, value)),
        }
    }
}

/// Inclusive date window; either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Active filters for one interaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    restrictions: BTreeMap<Dimension, Restriction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_range: Option<DateRange>,
}

impl FilterSpec {
    /// A spec that admits every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a spec from named UI selections, e.g. `("country", ["USA", "FRA"])`.
    pub fn from_selections<'a, I, V>(selections: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let mut spec = Self::new();
        for (name, values) in selections {
            let dimension: Dimension = name.parse()?;
            spec.set(dimension, Restriction::from_selection(values));
        }
        Ok(spec)
    }

    /// Replace the restriction on one dimension.
    ///
    /// Gender and medal values are stored in canonical spelling.
    pub fn set(&mut self, dimension: Dimension, restriction: Restriction) {
        let restriction = match restriction {
            Restriction::RestrictedTo(values) => Restriction::restricted_to(
                values.iter().map(|v| dimension.canonical_value(v)).collect(),
            ),
            Restriction::Unrestricted => Restriction::Unrestricted,
        };

        if restriction.is_unrestricted() {
            self.restrictions.remove(&dimension);
        } else {
            self.restrictions.insert(dimension, restriction);
        }
    }

    /// Builder form of [`FilterSpec::set`] for concrete values.
    pub fn restrict<I, S>(mut self, dimension: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = values.into_iter().map(Into::into).collect();
        self.set(dimension, Restriction::restricted_to(set));
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn set_date_range(&mut self, range: Option<DateRange>) {
        self.date_range = range;
    }

    pub fn restriction(&self, dimension: Dimension) -> &Restriction {
        static UNRESTRICTED: Restriction = Restriction::Unrestricted;
        self.restrictions.get(&dimension).unwrap_or(&UNRESTRICTED)
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    /// True when no dimension and no date window restricts anything.
    pub fn is_unrestricted(&self) -> bool {
        self.restrictions.values().all(Restriction::is_unrestricted) && self.date_range.is_none()
    }

    /// Active restrictions, in dimension order.
    pub fn active(&self) -> impl Iterator<Item = (Dimension, &BTreeSet<String>)> {
        self.restrictions.iter().filter_map(|(dim, r)| match r {
            Restriction::RestrictedTo(values) if !values.is_empty() => Some((*dim, values)),
            _ => None,
        })
    }

    /// Whether a record passes every active constraint.
    pub fn admits(&self, record: &Record) -> bool {
        self.restrictions
            .iter()
            .all(|(dimension, restriction)| restriction.admits(record, *dimension))
            && self
                .date_range
                .map_or(true, |range| range.contains(record.medal_date))
    }

    /// Human-readable description for report headers.
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self
            .active()
            .map(|(dim, values)| {
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                format!("{} = {}", dim, values.join(" | "))
            })
            .collect();

        if let Some(range) = self.date_range {
            let from = range.from.map(|d| d.to_string()).unwrap_or_else(|| "..".into());
            let to = range.to.map(|d| d.to_string()).unwrap_or_else(|| "..".into());
            parts.push(format!("date in [{}, {}]", from, to));
        }

        if parts.is_empty() {
            ALL_SELECTION.to_string()
        } else {
            parts.join("; ")
        }
    }
}

/// Records that passed a filter, borrowed from their dataset in original order.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    dataset: &'a Dataset,
    records: Vec<&'a Record>,
}

impl<'a> FilteredView<'a> {
    /// A view over every record of the dataset.
    pub fn all(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            records: dataset.records().iter().collect(),
        }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Record> + '_ {
        self.records.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Keep the records that satisfy every active restriction.
///
/// Never fails: a filter that matches nothing yields an empty view.
pub fn apply_filters<'a>(dataset: &'a Dataset, spec: &FilterSpec) -> FilteredView<'a> {
    if spec.is_unrestricted() {
        debug!("No active filters, keeping all {} records", dataset.len());
        return FilteredView::all(dataset);
    }

    let records: Vec<&Record> = dataset.records().iter().filter(|r| spec.admits(r)).collect();

    debug!(
        "Filters [{}] kept {} of {} records",
        spec.describe(),
        records.len(),
        dataset.len()
    );

    FilteredView { dataset, records }
}

//! Group-by aggregation over filtered records.
//!
//! This module partitions a [`FilteredView`] by a tuple of dimension values
//! and computes a count or a sum per group, producing rows in a
//! deterministic order.

use crate::analysis::{EngineError, FilteredView};
use crate::models::{Dimension, Record};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

/// Maximum number of dimensions in one group-by.
pub const MAX_GROUP_DIMENSIONS: usize = 3;

/// How each group is reduced to a single value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Number of records in the group.
    #[default]
    Count,
    /// Sum of the named numeric measure over the group.
    Sum(String),
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Count => write!(f, "Count"),
            Aggregation::Sum(measure) => write!(f, "Sum of {}", measure),
        }
    }
}

/// Result of aggregating one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateValue {
    Count(u64),
    Sum(f64),
}

impl AggregateValue {
    /// The additive identity for an aggregation mode.
    pub fn zero(aggregation: &Aggregation) -> Self {
        match aggregation {
            Aggregation::Count => AggregateValue::Count(0),
            Aggregation::Sum(_) => AggregateValue::Sum(0.0),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            AggregateValue::Count(n) => *n as f64,
            AggregateValue::Sum(v) => *v,
        }
    }

    /// Add two values of the same kind. Mixed kinds fall back to a sum.
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (AggregateValue::Count(a), AggregateValue::Count(b)) => AggregateValue::Count(a + b),
            (a, b) => AggregateValue::Sum(a.as_f64() + b.as_f64()),
        }
    }

    fn accumulate(&mut self, record: &Record, aggregation: &Aggregation) {
        match (self, aggregation) {
            (AggregateValue::Count(n), _) => *n += 1,
            (AggregateValue::Sum(total), Aggregation::Sum(measure)) => {
                *total += record.measures.get(measure).copied().unwrap_or_default();
            }
            (AggregateValue::Sum(_), Aggregation::Count) => {}
        }
    }
}

impl fmt::Display for AggregateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateValue::Count(n) => write!(f, "{}", n),
            AggregateValue::Sum(v) => write!(f, "{}", v),
        }
    }
}

/// Ordered list of group-by dimensions with optional explicit key orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    dimensions: Vec<Dimension>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    orders: BTreeMap<Dimension, Vec<String>>,
}

impl GroupSpec {
    /// Create a group spec, checking arity and duplicates.
    pub fn new<I>(dimensions: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = Dimension>,
    {
        let spec = Self {
            dimensions: dimensions.into_iter().collect(),
            orders: BTreeMap::new(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Create a group spec from dimension names.
    pub fn from_names<I, S>(names: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let dimensions = names
            .into_iter()
            .map(|name| name.as_ref().parse::<Dimension>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(dimensions)
    }

    /// Rank keys of `dimension` by their position in `keys`.
    pub fn with_order<I, S>(mut self, dimension: Dimension, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_order(dimension, keys);
        self
    }

    pub fn set_order<I, S>(&mut self, dimension: Dimension, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            self.orders.remove(&dimension);
        } else {
            self.orders.insert(dimension, keys);
        }
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn order(&self, dimension: Dimension) -> Option<&[String]> {
        self.orders.get(&dimension).map(Vec::as_slice)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let got = self.dimensions.len();
        if got == 0 || got > MAX_GROUP_DIMENSIONS {
            return Err(EngineError::InvalidGroupArity {
                got,
                max: MAX_GROUP_DIMENSIONS,
            });
        }

        for (i, dimension) in self.dimensions.iter().enumerate() {
            if self.dimensions[..i].contains(dimension) {
                return Err(EngineError::DuplicateDimension(*dimension));
            }
        }

        Ok(())
    }
}

/// One output group: key values in group-by order plus the aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: Vec<String>,
    pub value: AggregateValue,
}

/// Long-format aggregation result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateTable {
    group_by: Vec<Dimension>,
    aggregation: Aggregation,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    orders: BTreeMap<Dimension, Vec<String>>,
    rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn group_by(&self) -> &[Dimension] {
        &self.group_by
    }

    pub fn aggregation(&self) -> &Aggregation {
        &self.aggregation
    }

    pub fn rows(&self) -> &[AggregateRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a dimension within each row key.
    pub fn position(&self, dimension: Dimension) -> Option<usize> {
        self.group_by.iter().position(|d| *d == dimension)
    }

    /// Sum of all row values.
    pub fn total(&self) -> AggregateValue {
        self.rows
            .iter()
            .fold(AggregateValue::zero(&self.aggregation), |acc, row| {
                acc.combine(row.value)
            })
    }

    /// Compare two keys of one dimension using this table's ordering rules.
    pub fn compare_keys(&self, dimension: Dimension, a: &str, b: &str) -> Ordering {
        compare_keys(self.orders.get(&dimension).map(Vec::as_slice), a, b)
    }
}

/// Explicitly ranked keys first, by rank; the rest lexicographically.
pub(crate) fn compare_keys(order: Option<&[String]>, a: &str, b: &str) -> Ordering {
    let rank = |key: &str| order.and_then(|keys| keys.iter().position(|k| k == key));

    match (rank(a), rank(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Group the view by `group` and reduce each group with `aggregation`.
///
/// An empty view produces an empty table, not an error.
pub fn aggregate(
    view: &FilteredView<'_>,
    group: &GroupSpec,
    aggregation: &Aggregation,
) -> Result<AggregateTable, EngineError> {
    group.validate()?;

    // An empty dataset carries no measures to check against.
    if let Aggregation::Sum(measure) = aggregation {
        let dataset = view.dataset();
        if !dataset.is_empty() && !dataset.has_measure(measure) {
            return Err(EngineError::UnknownMeasure(measure.clone()));
        }
    }

    let mut grouped: HashMap<Vec<String>, AggregateValue> = HashMap::new();

    for record in view.iter() {
        let key: Vec<String> = group
            .dimensions
            .iter()
            .map(|d| record.dimension_value(*d))
            .collect();

        grouped
            .entry(key)
            .or_insert_with(|| AggregateValue::zero(aggregation))
            .accumulate(record, aggregation);
    }

    let mut rows: Vec<AggregateRow> = grouped
        .into_iter()
        .map(|(key, value)| AggregateRow { key, value })
        .collect();

    rows.sort_by(|a, b| {
        group
            .dimensions
            .iter()
            .enumerate()
            .map(|(i, dim)| compare_keys(group.order(*dim), &a.key[i], &b.key[i]))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    debug!(
        "Aggregated {} records into {} groups by [{}]",
        view.len(),
        rows.len(),
        group
            .dimensions
            .iter()
            .map(Dimension::name)
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(AggregateTable {
        group_by: group.dimensions.clone(),
        aggregation: aggregation.clone(),
        orders: group.orders.clone(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{apply_filters, FilterSpec};
    use crate::models::{Dataset, Gender, MedalType};
    use chrono::NaiveDate;

    fn record(country: &str, gender: Gender, medal: MedalType) -> Record {
        Record::new(
            "Athlete",
            country,
            gender,
            "Judo",
            medal,
            NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
        )
    }

    fn three_records() -> Dataset {
        Dataset::new(vec![
            record("USA", Gender::M, MedalType::Gold),
            record("USA", Gender::F, MedalType::Silver),
            record("FRA", Gender::M, MedalType::Gold),
        ])
    }

    fn keys(table: &AggregateTable) -> Vec<Vec<&str>> {
        table
            .rows()
            .iter()
            .map(|r| r.key.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn test_group_by_country_and_medal_is_lexicographic() {
        let dataset = three_records();
        let filters = FilterSpec::from_selections([("country", vec!["All"])]).unwrap();
        let view = apply_filters(&dataset, &filters);
        let group = GroupSpec::new([Dimension::Country, Dimension::MedalType]).unwrap();

        let table = aggregate(&view, &group, &Aggregation::Count).unwrap();

        assert_eq!(
            keys(&table),
            vec![
                vec!["FRA", "Gold"],
                vec!["USA", "Gold"],
                vec!["USA", "Silver"],
            ]
        );
        assert!(table.rows().iter().all(|r| r.value == AggregateValue::Count(1)));
    }

    #[test]
    fn test_single_country_filter() {
        let dataset = three_records();
        let filters = FilterSpec::new().restrict(Dimension::Country, ["FRA"]);
        let view = apply_filters(&dataset, &filters);
        assert_eq!(view.len(), 1);

        let group = GroupSpec::new([Dimension::MedalType]).unwrap();
        let table = aggregate(&view, &group, &Aggregation::Count).unwrap();

        assert_eq!(keys(&table), vec![vec!["Gold"]]);
        assert_eq!(table.rows()[0].value, AggregateValue::Count(1));
    }

    #[test]
    fn test_empty_view_aggregates_to_empty_table() {
        let dataset = three_records();
        let filters = FilterSpec::new().restrict(Dimension::Country, ["GER"]);
        let view = apply_filters(&dataset, &filters);
        assert!(view.is_empty());

        let group = GroupSpec::new([Dimension::MedalType]).unwrap();
        let table = aggregate(&view, &group, &Aggregation::Count).unwrap();

        assert!(table.is_empty());
        assert_eq!(table.total(), AggregateValue::Count(0));
    }

    #[test]
    fn test_explicit_order_keeps_present_keys_only() {
        let dataset = Dataset::new(vec![
            record("USA", Gender::M, MedalType::Bronze),
            record("FRA", Gender::F, MedalType::Silver),
            record("GBR", Gender::F, MedalType::Bronze),
        ]);
        let view = apply_filters(&dataset, &FilterSpec::new());
        let group = GroupSpec::new([Dimension::MedalType])
            .unwrap()
            .with_order(Dimension::MedalType, ["Gold", "Silver", "Bronze"]);

        let table = aggregate(&view, &group, &Aggregation::Count).unwrap();

        assert_eq!(keys(&table), vec![vec!["Silver"], vec!["Bronze"]]);
        assert_eq!(table.rows()[1].value, AggregateValue::Count(2));
    }

    #[test]
    fn test_unlisted_keys_follow_ranked_keys() {
        let order = vec!["Silver".to_string()];
        assert_eq!(compare_keys(Some(&order[..]), "Silver", "Bronze"), Ordering::Less);
        assert_eq!(compare_keys(Some(&order[..]), "Gold", "Bronze"), Ordering::Greater);
        assert_eq!(compare_keys(None, "USA", "FRA"), Ordering::Greater);
        assert_eq!(compare_keys(None, "usa", "USA"), Ordering::Greater);
    }

    #[test]
    fn test_counts_partition_filtered_view() {
        let dataset = Dataset::new(vec![
            record("USA", Gender::M, MedalType::Gold),
            record("USA", Gender::M, MedalType::Gold),
            record("USA", Gender::F, MedalType::Bronze),
            record("FRA", Gender::M, MedalType::Silver),
            record("JPN", Gender::F, MedalType::Gold),
            record("JPN", Gender::F, MedalType::Gold),
        ]);
        let filters = FilterSpec::new().restrict(Dimension::Country, ["USA", "JPN"]);
        let view = apply_filters(&dataset, &filters);

        for dims in [
            vec![Dimension::Country],
            vec![Dimension::Gender, Dimension::MedalType],
            vec![Dimension::Country, Dimension::Gender, Dimension::MedalType],
        ] {
            let group = GroupSpec::new(dims).unwrap();
            let table = aggregate(&view, &group, &Aggregation::Count).unwrap();
            assert_eq!(table.total(), AggregateValue::Count(view.len() as u64));
        }
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let dataset = three_records();
        let view = apply_filters(&dataset, &FilterSpec::new());
        let group = GroupSpec::new([Dimension::Gender, Dimension::Country]).unwrap();

        let first = aggregate(&view, &group, &Aggregation::Count).unwrap();
        let second = aggregate(&view, &group, &Aggregation::Count).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sum_mode() {
        let dataset = Dataset::new(vec![
            record("USA", Gender::M, MedalType::Gold).with_measure("GDP", 2.5),
            record("USA", Gender::F, MedalType::Gold).with_measure("GDP", 1.5),
            record("FRA", Gender::M, MedalType::Gold).with_measure("GDP", 4.0),
        ]);
        let view = apply_filters(&dataset, &FilterSpec::new());
        let group = GroupSpec::new([Dimension::Country]).unwrap();

        let table = aggregate(&view, &group, &Aggregation::Sum("GDP".to_string())).unwrap();

        assert_eq!(keys(&table), vec![vec!["FRA"], vec!["USA"]]);
        assert_eq!(table.rows()[1].value, AggregateValue::Sum(4.0));
        assert_eq!(table.total(), AggregateValue::Sum(8.0));
    }

    #[test]
    fn test_unknown_measure_is_rejected_even_when_empty() {
        let dataset = three_records();
        let filters = FilterSpec::new().restrict(Dimension::Country, ["GER"]);
        let view = apply_filters(&dataset, &filters);
        let group = GroupSpec::new([Dimension::Country]).unwrap();

        let err = aggregate(&view, &group, &Aggregation::Sum("Total Medals".into())).unwrap_err();
        assert_eq!(err, EngineError::UnknownMeasure("Total Medals".into()));
    }

    #[test]
    fn test_sum_over_empty_dataset_is_empty_table() {
        let dataset = Dataset::default();
        let view = apply_filters(&dataset, &FilterSpec::new());
        let group = GroupSpec::new([Dimension::Country]).unwrap();

        let table = aggregate(&view, &group, &Aggregation::Sum("GDP".to_string())).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.total(), AggregateValue::Sum(0.0));
    }

    #[test]
    fn test_group_spec_validation() {
        assert_eq!(
            GroupSpec::new(Vec::new()).unwrap_err(),
            EngineError::InvalidGroupArity { got: 0, max: 3 }
        );
        assert_eq!(
            GroupSpec::new(Dimension::ALL[..4].to_vec()).unwrap_err(),
            EngineError::InvalidGroupArity { got: 4, max: 3 }
        );
        assert_eq!(
            GroupSpec::new([Dimension::Sport, Dimension::Sport]).unwrap_err(),
            EngineError::DuplicateDimension(Dimension::Sport)
        );
        assert!(matches!(
            GroupSpec::from_names(["country", "Count"]).unwrap_err(),
            EngineError::UnknownDimension(_)
        ));
    }
}

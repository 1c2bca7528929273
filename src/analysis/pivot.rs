//! Long-to-wide reshaping of aggregate tables.

use crate::analysis::{AggregateTable, AggregateValue, Aggregation, EngineError};
use crate::models::Dimension;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Wide-format table: one row per row key, one column per column key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    pub row_dimension: Dimension,
    pub column_dimension: Dimension,
    pub aggregation: Aggregation,
    pub row_keys: Vec<String>,
    pub column_keys: Vec<String>,
    /// `values[row][column]`, dense.
    pub values: Vec<Vec<AggregateValue>>,
}

impl PivotTable {
    pub fn is_empty(&self) -> bool {
        self.row_keys.is_empty()
    }

    /// Value at a named cell, if both keys exist.
    pub fn get(&self, row_key: &str, column_key: &str) -> Option<AggregateValue> {
        let r = self.row_keys.iter().position(|k| k == row_key)?;
        let c = self.column_keys.iter().position(|k| k == column_key)?;
        Some(self.values[r][c])
    }

    /// Per-row totals across all columns (stacked bar heights).
    pub fn row_totals(&self) -> Vec<AggregateValue> {
        self.values
            .iter()
            .map(|row| {
                row.iter()
                    .fold(AggregateValue::zero(&self.aggregation), |acc, v| acc.combine(*v))
            })
            .collect()
    }
}

/// Reshape `table` so each `row_dim` key is a row and each `column_dim`
/// key is a column.
///
/// Every row/column combination is present; combinations with no
/// records hold zero. A third group-by dimension, if any, is summed out.
pub fn pivot_wide(
    table: &AggregateTable,
    row_dim: Dimension,
    column_dim: Dimension,
) -> Result<PivotTable, EngineError> {
    if row_dim == column_dim {
        return Err(EngineError::DuplicateDimension(row_dim));
    }
    let r = table
        .position(row_dim)
        .ok_or(EngineError::DimensionNotGrouped(row_dim))?;
    let c = table
        .position(column_dim)
        .ok_or(EngineError::DimensionNotGrouped(column_dim))?;

    let mut row_keys: Vec<String> = table
        .rows()
        .iter()
        .map(|row| row.key[r].clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    row_keys.sort_by(|a, b| table.compare_keys(row_dim, a, b));

    let mut column_keys: Vec<String> = table
        .rows()
        .iter()
        .map(|row| row.key[c].clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    column_keys.sort_by(|a, b| table.compare_keys(column_dim, a, b));

    let row_index: HashMap<&str, usize> = row_keys
        .iter()
        .enumerate()
        .map(|(i, k)| (k.as_str(), i))
        .collect();
    let column_index: HashMap<&str, usize> = column_keys
        .iter()
        .enumerate()
        .map(|(i, k)| (k.as_str(), i))
        .collect();

    let zero = AggregateValue::zero(table.aggregation());
    let mut values = vec![vec![zero; column_keys.len()]; row_keys.len()];

    for row in table.rows() {
        let i = row_index[row.key[r].as_str()];
        let j = column_index[row.key[c].as_str()];
        values[i][j] = values[i][j].combine(row.value);
    }

    Ok(PivotTable {
        row_dimension: row_dim,
        column_dimension: column_dim,
        aggregation: table.aggregation().clone(),
        row_keys,
        column_keys,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{aggregate, apply_filters, FilterSpec, GroupSpec};
    use crate::models::{Dataset, Gender, MedalType, Record};
    use chrono::NaiveDate;

    fn record(country: &str, gender: Gender, medal: MedalType) -> Record {
        Record::new(
            "Athlete",
            country,
            gender,
            "Fencing",
            medal,
            NaiveDate::from_ymd_opt(2024, 7, 30).unwrap(),
        )
    }

    fn medal_table(group: GroupSpec) -> AggregateTable {
        let dataset = Dataset::new(vec![
            record("USA", Gender::M, MedalType::Gold),
            record("USA", Gender::F, MedalType::Gold),
            record("USA", Gender::F, MedalType::Silver),
            record("FRA", Gender::M, MedalType::Bronze),
        ]);
        let view = apply_filters(&dataset, &FilterSpec::new());
        aggregate(&view, &group, &Aggregation::Count).unwrap()
    }

    #[test]
    fn test_missing_combinations_are_zero_filled() {
        let group = GroupSpec::new([Dimension::Country, Dimension::MedalType])
            .unwrap()
            .with_order(Dimension::MedalType, ["Gold", "Silver", "Bronze"]);
        let table = medal_table(group);

        let pivot = pivot_wide(&table, Dimension::Country, Dimension::MedalType).unwrap();

        assert_eq!(pivot.row_keys, vec!["FRA", "USA"]);
        assert_eq!(pivot.column_keys, vec!["Gold", "Silver", "Bronze"]);
        assert_eq!(
            pivot.values,
            vec![
                vec![
                    AggregateValue::Count(0),
                    AggregateValue::Count(0),
                    AggregateValue::Count(1)
                ],
                vec![
                    AggregateValue::Count(2),
                    AggregateValue::Count(1),
                    AggregateValue::Count(0)
                ],
            ]
        );
        assert_eq!(pivot.get("FRA", "Gold"), Some(AggregateValue::Count(0)));
    }

    #[test]
    fn test_every_declared_combination_present() {
        let group = GroupSpec::new([Dimension::Gender, Dimension::Country]).unwrap();
        let table = medal_table(group);
        let pivot = pivot_wide(&table, Dimension::Country, Dimension::Gender).unwrap();

        for row in table.rows() {
            assert_eq!(pivot.get(&row.key[1], &row.key[0]), Some(row.value));
        }
        assert_eq!(pivot.values.len(), pivot.row_keys.len());
        assert!(pivot
            .values
            .iter()
            .all(|cells| cells.len() == pivot.column_keys.len()));
    }

    #[test]
    fn test_third_dimension_is_summed_out() {
        let group =
            GroupSpec::new([Dimension::Country, Dimension::Gender, Dimension::MedalType]).unwrap();
        let table = medal_table(group);

        let pivot = pivot_wide(&table, Dimension::Country, Dimension::Gender).unwrap();

        assert_eq!(pivot.get("USA", "F"), Some(AggregateValue::Count(2)));
        assert_eq!(
            pivot.row_totals(),
            vec![AggregateValue::Count(1), AggregateValue::Count(3)]
        );
    }

    #[test]
    fn test_sum_mode_pivot_fills_zero_and_sums_out() {
        let dataset = Dataset::new(vec![
            record("USA", Gender::M, MedalType::Gold).with_measure("GDP", 1.5),
            record("USA", Gender::F, MedalType::Gold).with_measure("GDP", 2.0),
            record("USA", Gender::F, MedalType::Silver).with_measure("GDP", 0.5),
            record("FRA", Gender::M, MedalType::Bronze).with_measure("GDP", 4.0),
        ]);
        let view = apply_filters(&dataset, &FilterSpec::new());
        let group = GroupSpec::new([Dimension::Country, Dimension::Gender, Dimension::MedalType])
            .unwrap()
            .with_order(Dimension::MedalType, ["Gold", "Silver", "Bronze"]);
        let table = aggregate(&view, &group, &Aggregation::Sum("GDP".to_string())).unwrap();

        let pivot = pivot_wide(&table, Dimension::Country, Dimension::MedalType).unwrap();

        assert_eq!(pivot.column_keys, vec!["Gold", "Silver", "Bronze"]);
        assert_eq!(pivot.get("USA", "Gold"), Some(AggregateValue::Sum(3.5)));
        assert_eq!(pivot.get("USA", "Bronze"), Some(AggregateValue::Sum(0.0)));
        assert_eq!(pivot.get("FRA", "Gold"), Some(AggregateValue::Sum(0.0)));
        assert_eq!(
            pivot.row_totals(),
            vec![AggregateValue::Sum(4.0), AggregateValue::Sum(4.0)]
        );
    }

    #[test]
    fn test_empty_table_pivots_to_empty() {
        let dataset = Dataset::default();
        let view = apply_filters(&dataset, &FilterSpec::new());
        let group = GroupSpec::new([Dimension::Country, Dimension::MedalType]).unwrap();
        let table = aggregate(&view, &group, &Aggregation::Count).unwrap();

        let pivot = pivot_wide(&table, Dimension::Country, Dimension::MedalType).unwrap();
        assert!(pivot.is_empty());
        assert!(pivot.column_keys.is_empty());
    }

    #[test]
    fn test_pivot_contract_violations() {
        let group = GroupSpec::new([Dimension::Country, Dimension::MedalType]).unwrap();
        let table = medal_table(group);

        assert_eq!(
            pivot_wide(&table, Dimension::Country, Dimension::Sport).unwrap_err(),
            EngineError::DimensionNotGrouped(Dimension::Sport)
        );
        assert_eq!(
            pivot_wide(&table, Dimension::Country, Dimension::Country).unwrap_err(),
            EngineError::DuplicateDimension(Dimension::Country)
        );
    }
}

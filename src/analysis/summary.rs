//! Medal tallies and option lists over filtered records.

use crate::analysis::FilteredView;
use crate::models::{Dataset, Dimension, MedalType, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Medal counts for a set of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedalSummary {
    /// Total number of medals.
    pub total: usize,
    pub gold: usize,
    pub silver: usize,
    pub bronze: usize,
    /// Medals per country code.
    pub by_country: HashMap<String, usize>,
}

impl MedalSummary {
    /// Tally the given records.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut summary = Self::default();

        for record in records {
            summary.total += 1;
            match record.medal_type {
                MedalType::Gold => summary.gold += 1,
                MedalType::Silver => summary.silver += 1,
                MedalType::Bronze => summary.bronze += 1,
            }

            *summary
                .by_country
                .entry(record.country_code.clone())
                .or_insert(0) += 1;
        }

        summary
    }

    pub fn from_view(view: &FilteredView<'_>) -> Self {
        Self::from_records(view.iter())
    }

    pub fn count(&self, medal: MedalType) -> usize {
        match medal {
            MedalType::Gold => self.gold,
            MedalType::Silver => self.silver,
            MedalType::Bronze => self.bronze,
        }
    }

    /// The `n` countries with most medals; ties broken by country code.
    pub fn leaders(&self, n: usize) -> Vec<(&str, usize)> {
        let mut countries: Vec<(&str, usize)> = self
            .by_country
            .iter()
            .map(|(country, count)| (country.as_str(), *count))
            .collect();

        countries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        countries.truncate(n);
        countries
    }
}

/// Sorted distinct values of a dimension, as offered in a dropdown.
pub fn distinct_values(dataset: &Dataset, dimension: Dimension) -> Vec<String> {
    dataset
        .records()
        .iter()
        .map(|r| r.dimension_value(dimension))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

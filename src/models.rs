//! Data models for medal datasets.
//!
//! This module contains the record and dataset types shared by the
//! loader, the filter/aggregation engine and the report renderer.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::analysis::{ChartData, EngineError, MedalSummary};

/// Athlete gender as recorded in the medals table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Men's events
    M,
    /// Women's events
    F,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Gender {
    /// Canonical single-letter code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::F => "F",
        }
    }

    /// Parse the spellings found in published medal tables.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "m" | "male" | "men" | "man" => Some(Gender::M),
            "f" | "w" | "female" | "women" | "woman" => Some(Gender::F),
            _ => None,
        }
    }
}

/// Medal colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MedalType {
    Gold,
    Silver,
    Bronze,
}

impl fmt::Display for MedalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MedalType {
    /// All medal types, podium order.
    pub const ALL: [MedalType; 3] = [MedalType::Gold, MedalType::Silver, MedalType::Bronze];

    pub fn as_str(&self) -> &'static str {
        match self {
            MedalType::Gold => "Gold",
            MedalType::Silver => "Silver",
            MedalType::Bronze => "Bronze",
        }
    }

    /// Returns an emoji representation of the medal.
    pub fn emoji(&self) -> &'static str {
        match self {
            MedalType::Gold => "🥇",
            MedalType::Silver => "🥈",
            MedalType::Bronze => "🥉",
        }
    }

    /// Parse "Gold", "Gold Medal", "G" and similar, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        let word = lower.strip_suffix("medal").unwrap_or(&lower).trim();
        match word {
            "gold" | "g" => Some(MedalType::Gold),
            "silver" | "s" => Some(MedalType::Silver),
            "bronze" | "b" => Some(MedalType::Bronze),
            _ => None,
        }
    }
}

/// A categorical field usable for filtering or grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Country,
    Gender,
    MedalType,
    Sport,
    Date,
    Year,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Country,
        Dimension::Gender,
        Dimension::MedalType,
        Dimension::Sport,
        Dimension::Date,
        Dimension::Year,
    ];

    /// Machine name used in config files and CLI flags.
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Country => "country",
            Dimension::Gender => "gender",
            Dimension::MedalType => "medal_type",
            Dimension::Sport => "sport",
            Dimension::Date => "date",
            Dimension::Year => "year",
        }
    }

    /// Column heading used in rendered tables.
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Country => "Country Code",
            Dimension::Gender => "Gender",
            Dimension::MedalType => "Medal Type",
            Dimension::Sport => "Sport Discipline",
            Dimension::Date => "Medal Date",
            Dimension::Year => "Year",
        }
    }

    /// Spell a user-supplied value the way records store it, so that
    /// "Gold Medal" or "Women" match `Gold` and `F`. Other values pass through.
    pub fn canonical_value(&self, raw: &str) -> String {
        let canonical = match self {
            Dimension::Gender => Gender::parse(raw).map(|g| g.as_str()),
            Dimension::MedalType => MedalType::parse(raw).map(|m| m.as_str()),
            _ => None,
        };
        canonical.map_or_else(|| raw.to_string(), String::from)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "country" | "country_code" | "noc" => Ok(Dimension::Country),
            "gender" | "sex" => Ok(Dimension::Gender),
            "medal" | "medal_type" | "medaltype" => Ok(Dimension::MedalType),
            "sport" | "sport_discipline" | "discipline" => Ok(Dimension::Sport),
            "date" | "medal_date" | "day" => Ok(Dimension::Date),
            "year" => Ok(Dimension::Year),
            _ => Err(EngineError::UnknownDimension(s.trim().to_string())),
        }
    }
}

/// One medal awarded to one athlete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub athlete_name: String,
    pub country_code: String,
    pub gender: Gender,
    pub sport: String,
    pub medal_type: MedalType,
    pub medal_date: NaiveDate,
    /// Optional numeric columns (e.g. GDP), keyed by column name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub measures: BTreeMap<String, f64>,
}

impl Record {
    /// Creates a record without numeric measures.
    pub fn new(
        athlete_name: impl Into<String>,
        country_code: impl Into<String>,
        gender: Gender,
        sport: impl Into<String>,
        medal_type: MedalType,
        medal_date: NaiveDate,
    ) -> Self {
        Self {
            athlete_name: athlete_name.into(),
            country_code: country_code.into(),
            gender,
            sport: sport.into(),
            medal_type,
            medal_date,
            measures: BTreeMap::new(),
        }
    }

    /// Attach a numeric measure.
    pub fn with_measure(mut self, name: impl Into<String>, value: f64) -> Self {
        self.measures.insert(name.into(), value);
        self
    }

    /// Canonical string value of a dimension, as used for matching and grouping.
    pub fn dimension_value(&self, dimension: Dimension) -> String {
        match dimension {
            Dimension::Country => self.country_code.clone(),
            Dimension::Gender => self.gender.as_str().to_string(),
            Dimension::MedalType => self.medal_type.as_str().to_string(),
            Dimension::Sport => self.sport.clone(),
            Dimension::Date => self.medal_date.format("%Y-%m-%d").to_string(),
            Dimension::Year => self.medal_date.year().to_string(),
        }
    }

    /// Compare a dimension against a candidate value without allocating
    /// for the string-backed fields.
    pub fn dimension_matches(&self, dimension: Dimension, value: &str) -> bool {
        match dimension {
            Dimension::Country => self.country_code == value,
            Dimension::Gender => self.gender.as_str() == value,
            Dimension::MedalType => self.medal_type.as_str() == value,
            Dimension::Sport => self.sport == value,
            Dimension::Date | Dimension::Year => self.dimension_value(dimension) == value,
        }
    }
}

/// Read-only collection of records, loaded once and borrowed everywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    records: Vec<Record>,
    /// Measure names carried by every record.
    measure_names: BTreeSet<String>,
}

impl Dataset {
    /// Build a dataset. Only measures present on every record are
    /// available for summing.
    pub fn new(records: Vec<Record>) -> Self {
        let mut iter = records.iter();
        let mut measure_names: BTreeSet<String> = iter
            .next()
            .map(|r| r.measures.keys().cloned().collect())
            .unwrap_or_default();

        for record in iter {
            measure_names.retain(|name| record.measures.contains_key(name));
        }

        Self {
            records,
            measure_names,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_measure(&self, name: &str) -> bool {
        self.measure_names.contains(name)
    }
}

/// Metadata about a rendered report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Where the dataset was loaded from.
    pub source: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Named view preset, if one was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    /// Human-readable active filters.
    pub filters: String,
    /// Group-by dimensions, in order.
    pub group_by: Vec<Dimension>,
    /// Aggregation label ("Count", "Sum of GDP").
    pub aggregation: String,
    /// Records in the loaded dataset.
    pub records_loaded: usize,
    /// Source rows dropped while loading.
    pub rows_skipped: usize,
    /// Records that passed the filters.
    pub records_matched: usize,
}

/// A complete rendered query result.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Medal tally over the filtered records.
    pub summary: MedalSummary,
    /// Chart-ready aggregate.
    pub chart: ChartData,
}

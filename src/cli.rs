//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and turning flags into an engine [`Query`].

use crate::analysis::{
    Aggregation, DateRange, EngineError, FilterSpec, GroupSpec, PivotSpec, Query, Restriction,
};
use crate::config::Config;
use crate::models::Dimension;
use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Medalboard - filter and aggregate Olympic medal tables
///
/// Each run is one dashboard interaction: pick filters, pick a grouping,
/// get a chart-ready table. Multi-valued filters are comma-separated and
/// `All` means no restriction.
///
/// Examples:
///   medalboard --view gender-medals --country USA,FRA
///   medalboard --data medals.csv --group-by sport,medal_type --medal Gold
///   medalboard --group-by country --pivot country:medal_type --format csv
///   medalboard --list country
///   medalboard --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Medal CSV to load (file path or http(s) URL)
    ///
    /// Defaults to the `[data] source` config value.
    #[arg(short, long, value_name = "SOURCE", env = "MEDALBOARD_DATA")]
    pub data: Option<String>,

    /// Named view preset from the config file
    #[arg(long, value_name = "NAME")]
    pub view: Option<String>,

    /// Country codes to include (comma-separated)
    #[arg(long, value_name = "CODES", value_delimiter = ',')]
    pub country: Option<Vec<String>>,

    /// Genders to include: M, F
    #[arg(long, value_name = "GENDERS", value_delimiter = ',')]
    pub gender: Option<Vec<String>>,

    /// Medal types to include: Gold, Silver, Bronze
    #[arg(long, value_name = "MEDALS", value_delimiter = ',')]
    pub medal: Option<Vec<String>>,

    /// Sport disciplines to include
    #[arg(long, value_name = "SPORTS", value_delimiter = ',')]
    pub sport: Option<Vec<String>>,

    /// Medal dates to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATES", value_delimiter = ',')]
    pub date: Option<Vec<String>>,

    /// Years to include
    #[arg(long, value_name = "YEARS", value_delimiter = ',')]
    pub year: Option<Vec<String>>,

    /// Earliest medal date, inclusive
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub from: Option<NaiveDate>,

    /// Latest medal date, inclusive
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub to: Option<NaiveDate>,

    /// Dimensions to group by, 1 to 3 (comma-separated)
    ///
    /// Dimensions: country, gender, medal_type, sport, date, year
    #[arg(short, long, value_name = "DIMS", value_delimiter = ',')]
    pub group_by: Option<Vec<String>>,

    /// Explicit key order for a dimension, e.g. medal_type=Gold,Silver,Bronze
    ///
    /// May be repeated. Listed keys come first in the given order.
    #[arg(long, value_name = "DIM=KEYS")]
    pub order: Vec<String>,

    /// Sum this numeric column instead of counting medals
    #[arg(long, value_name = "MEASURE")]
    pub sum: Option<String>,

    /// Reshape to one row per ROW key and one column per COL key
    #[arg(long, value_name = "ROW:COL")]
    pub pivot: Option<String>,

    /// Numeric columns to load from the CSV (comma-separated)
    #[arg(long, value_name = "COLUMNS", value_delimiter = ',')]
    pub measures: Option<Vec<String>>,

    /// Print the distinct values of a dimension (or `views`) and exit
    #[arg(long, value_name = "DIM")]
    pub list: Option<String>,

    /// Output format (markdown, json, csv)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .medalboard.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Download timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .medalboard.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// CSV of the result table only
    Csv,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(format!("--from {} is after --to {}", from, to));
            }
        }

        if let Some(ref group_by) = self.group_by {
            GroupSpec::from_names(group_by).map_err(|e| e.to_string())?;
        }

        for entry in &self.order {
            parse_order(entry).map_err(|e| e.to_string())?;
        }

        if let Some(ref pivot) = self.pivot {
            pivot.parse::<PivotSpec>().map_err(|e| e.to_string())?;
        }

        if let Some(ref list) = self.list {
            if list != "views" {
                list.parse::<Dimension>().map_err(|e| e.to_string())?;
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the `[general] verbose` setting; `--quiet` still wins.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Filters given on the command line. Dimensions without a flag are absent.
    pub fn filter_spec(&self) -> FilterSpec {
        let mut spec = FilterSpec::new();
        self.apply_filters_to(&mut spec);
        spec
    }

    /// Overlay CLI selections on `spec`. An explicit `All` clears that dimension.
    fn apply_filters_to(&self, spec: &mut FilterSpec) {
        let selections = [
            (Dimension::Country, &self.country),
            (Dimension::Gender, &self.gender),
            (Dimension::MedalType, &self.medal),
            (Dimension::Sport, &self.sport),
            (Dimension::Date, &self.date),
            (Dimension::Year, &self.year),
        ];

        for (dimension, values) in selections {
            if let Some(values) = values {
                spec.set(dimension, Restriction::from_selection(values.iter().cloned()));
            }
        }

        if self.from.is_some() || self.to.is_some() {
            spec.set_date_range(Some(DateRange {
                from: self.from,
                to: self.to,
            }));
        }
    }

    /// Build the engine query: view preset first, then CLI overrides.
    pub fn build_query(&self, config: &Config) -> anyhow::Result<Query> {
        let view = match self.view {
            Some(ref name) => Some(config.view(name)?),
            None => None,
        };

        let mut group = match self.group_by {
            Some(ref names) => GroupSpec::from_names(names)?,
            None => match view.map(|v| v.group_spec()).transpose()?.flatten() {
                Some(spec) => spec,
                None => GroupSpec::from_names(&config.report.default_group_by)?,
            },
        };

        // A view's key orders still apply when --group-by overrides its dimensions.
        if let Some(view) = view {
            for (name, keys) in &view.order {
                group.set_order(name.parse()?, keys.iter().cloned());
            }
        }
        for entry in &self.order {
            let (dimension, keys) = parse_order(entry)?;
            group.set_order(dimension, keys);
        }
        if group.dimensions().contains(&Dimension::MedalType)
            && group.order(Dimension::MedalType).is_none()
        {
            group.set_order(
                Dimension::MedalType,
                config.report.medal_order.iter().cloned(),
            );
        }

        let mut filters = match view {
            Some(view) => view.filter_spec()?,
            None => FilterSpec::new(),
        };
        self.apply_filters_to(&mut filters);

        let aggregation = match (&self.sum, view) {
            (Some(measure), _) => Aggregation::Sum(measure.clone()),
            (None, Some(view)) => view.aggregation(),
            (None, None) => Aggregation::Count,
        };

        let pivot = match (&self.pivot, view) {
            (Some(pivot), _) => Some(pivot.parse::<PivotSpec>()?),
            (None, Some(view)) => view.pivot_spec()?,
            (None, None) => None,
        };

        let mut query = Query::new(group)
            .with_filters(filters)
            .with_aggregation(aggregation);
        query.pivot = pivot;
        Ok(query)
    }
}

/// Parse `dim=key1,key2,...`.
fn parse_order(entry: &str) -> Result<(Dimension, Vec<String>), EngineError> {
    let (name, keys) = entry
        .split_once('=')
        .ok_or_else(|| EngineError::UnknownDimension(entry.trim().to_string()))?;
    let dimension: Dimension = name.parse()?;
    let keys = keys
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect();
    Ok((dimension, keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewConfig;

    fn make_args() -> Args {
        Args {
            data: Some("medals.csv".to_string()),
            view: None,
            country: None,
            gender: None,
            medal: None,
            sport: None,
            date: None,
            year: None,
            from: None,
            to: None,
            group_by: None,
            order: Vec::new(),
            sum: None,
            pivot: None,
            measures: None,
            list: None,
            format: None,
            output: None,
            config: None,
            timeout: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "medalboard",
            "--country",
            "USA,FRA",
            "--group-by",
            "country,medal_type",
            "--order",
            "medal_type=Bronze,Silver,Gold",
            "--format",
            "csv",
        ])
        .unwrap();

        assert_eq!(
            args.country,
            Some(vec!["USA".to_string(), "FRA".to_string()])
        );
        assert_eq!(args.format, Some(OutputFormat::Csv));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_unknown_dimension() {
        let mut args = make_args();
        args.group_by = Some(vec!["country".to_string(), "Total Medals".to_string()]);
        let err = args.validate().unwrap_err();
        assert!(err.contains("unknown dimension 'Total Medals'"));
    }

    #[test]
    fn test_validation_date_range() {
        let mut args = make_args();
        args.from = NaiveDate::from_ymd_opt(2024, 8, 10);
        args.to = NaiveDate::from_ymd_opt(2024, 8, 1);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
    }

    #[test]
    fn test_config_verbose_raises_log_level() {
        let mut config: Config = toml::from_str("[general]\nverbose = true\n").unwrap();
        let mut args = make_args();
        config.merge_with_args(&args);
        assert_eq!(args.log_level(config.general.verbose), tracing::Level::DEBUG);

        args.quiet = true;
        assert_eq!(args.log_level(config.general.verbose), tracing::Level::ERROR);
    }

    #[test]
    fn test_all_selection_is_unrestricted() {
        let mut args = make_args();
        args.country = Some(vec!["All".to_string()]);
        args.medal = Some(vec!["Gold".to_string()]);

        let spec = args.filter_spec();
        assert_eq!(*spec.restriction(Dimension::Country), Restriction::Unrestricted);
        assert_eq!(spec.describe(), "medal_type = Gold");
    }

    #[test]
    fn test_medal_flag_accepts_source_spelling() {
        let args = Args::try_parse_from(["medalboard", "--medal", "Gold Medal,silver"]).unwrap();
        let spec = args.filter_spec();
        assert_eq!(spec.describe(), "medal_type = Gold | Silver");
    }

    #[test]
    fn test_build_query_defaults() {
        let args = make_args();
        let query = args.build_query(&Config::default()).unwrap();

        assert_eq!(
            query.group.dimensions(),
            &[Dimension::Country, Dimension::MedalType]
        );
        assert_eq!(
            query.group.order(Dimension::MedalType).map(|o| o.len()),
            Some(3)
        );
        assert_eq!(query.aggregation, Aggregation::Count);
        assert!(query.pivot.is_none());
        assert!(query.filters.is_unrestricted());
    }

    #[test]
    fn test_build_query_view_with_overrides() {
        let mut config = Config::default();
        let mut filters = std::collections::BTreeMap::new();
        filters.insert("gender".to_string(), vec!["F".to_string()]);
        config.views.insert(
            "women".to_string(),
            ViewConfig {
                group_by: vec!["sport".to_string()],
                filters,
                sum: Some("GDP".to_string()),
                ..ViewConfig::default()
            },
        );

        let mut args = make_args();
        args.view = Some("women".to_string());
        args.country = Some(vec!["KEN".to_string()]);
        args.pivot = Some("sport:medal_type".to_string());
        args.group_by = Some(vec!["sport".to_string(), "medal_type".to_string()]);

        let query = args.build_query(&config).unwrap();

        assert_eq!(query.filters.describe(), "country = KEN; gender = F");
        assert_eq!(query.aggregation, Aggregation::Sum("GDP".to_string()));
        assert_eq!(
            query.pivot,
            Some(PivotSpec {
                rows: Dimension::Sport,
                columns: Dimension::MedalType
            })
        );
    }

    #[test]
    fn test_all_clears_view_filter() {
        let mut config = Config::default();
        let mut filters = std::collections::BTreeMap::new();
        filters.insert("country".to_string(), vec!["USA".to_string()]);
        config.views.insert(
            "usa".to_string(),
            ViewConfig {
                group_by: vec!["sport".to_string()],
                filters,
                ..ViewConfig::default()
            },
        );

        let mut args = make_args();
        args.view = Some("usa".to_string());
        args.country = Some(vec!["All".to_string()]);

        let query = args.build_query(&config).unwrap();
        assert!(query.filters.is_unrestricted());
        assert_eq!(query.group.dimensions(), &[Dimension::Sport]);
    }

    #[test]
    fn test_build_query_unknown_view() {
        let mut args = make_args();
        args.view = Some("missing".to_string());
        assert!(args.build_query(&Config::default()).is_err());
    }

    #[test]
    fn test_parse_order() {
        let (dimension, keys) = parse_order("medal=Gold, Silver").unwrap();
        assert_eq!(dimension, Dimension::MedalType);
        assert_eq!(keys, vec!["Gold", "Silver"]);
        assert!(parse_order("medal").is_err());
    }
}

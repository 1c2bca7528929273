//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.medalboard.toml` files.

use crate::analysis::{Aggregation, EngineError, FilterSpec, GroupSpec, PivotSpec};
use crate::cli::OutputFormat;
use crate::data::{LoadOptions, DEFAULT_DATA_URL};
use crate::models::Dimension;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".medalboard.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Dataset settings.
    #[serde(default)]
    pub data: DataConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Named query presets.
    #[serde(default = "default_views")]
    pub views: BTreeMap<String, ViewConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            data: DataConfig::default(),
            report: ReportConfig::default(),
            views: default_views(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Where and how to load the medal table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV path or http(s) URL.
    #[serde(default = "default_source")]
    pub source: String,

    /// Download timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Numeric columns to load as summable measures.
    #[serde(default)]
    pub measures: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            timeout_seconds: default_timeout(),
            measures: Vec::new(),
        }
    }
}

fn default_source() -> String {
    DEFAULT_DATA_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Report rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format when `--format` is not given.
    #[serde(default)]
    pub format: OutputFormat,

    /// Group-by used when neither a view nor `--group-by` names one.
    #[serde(default = "default_group_by")]
    pub default_group_by: Vec<String>,

    /// Display order for medal types unless a query sets its own.
    #[serde(default = "default_medal_order")]
    pub medal_order: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            default_group_by: default_group_by(),
            medal_order: default_medal_order(),
        }
    }
}

fn default_group_by() -> Vec<String> {
    vec!["country".to_string(), "medal_type".to_string()]
}

fn default_medal_order() -> Vec<String> {
    vec!["Gold", "Silver", "Bronze"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// A named query preset: one dashboard's worth of grouping and filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Short description shown by `--list views`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Group-by dimension names.
    #[serde(default)]
    pub group_by: Vec<String>,

    /// Pivot as `rows:columns`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivot: Option<String>,

    /// Measure to sum instead of counting rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<String>,

    /// Dimension name to selected values ("All" allowed).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, Vec<String>>,

    /// Dimension name to explicit key order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub order: BTreeMap<String, Vec<String>>,
}

impl ViewConfig {
    /// Group spec for this view, or `None` if it leaves grouping to the caller.
    pub fn group_spec(&self) -> Result<Option<GroupSpec>, EngineError> {
        if self.group_by.is_empty() {
            return Ok(None);
        }

        let mut spec = GroupSpec::from_names(&self.group_by)?;
        for (name, keys) in &self.order {
            let dimension: Dimension = name.parse()?;
            spec.set_order(dimension, keys.iter().cloned());
        }
        Ok(Some(spec))
    }

    pub fn filter_spec(&self) -> Result<FilterSpec, EngineError> {
        FilterSpec::from_selections(
            self.filters
                .iter()
                .map(|(name, values)| (name.as_str(), values.iter().cloned())),
        )
    }

    pub fn pivot_spec(&self) -> Result<Option<PivotSpec>, EngineError> {
        self.pivot.as_deref().map(str::parse::<PivotSpec>).transpose()
    }

    pub fn aggregation(&self) -> Aggregation {
        match self.sum {
            Some(ref measure) => Aggregation::Sum(measure.clone()),
            None => Aggregation::Count,
        }
    }
}

/// Built-in presets, one per standard dashboard page.
fn default_views() -> BTreeMap<String, ViewConfig> {
    let view = |description: &str, group_by: &[&str], pivot: Option<&str>| ViewConfig {
        description: Some(description.to_string()),
        group_by: group_by.iter().map(|s| s.to_string()).collect(),
        pivot: pivot.map(String::from),
        ..ViewConfig::default()
    };

    let mut views = BTreeMap::new();
    views.insert(
        "gender-medals".to_string(),
        view(
            "Comparison of genders and medals",
            &["medal_type", "gender"],
            Some("medal_type:gender"),
        ),
    );
    views.insert(
        "country-medals".to_string(),
        view(
            "Medal table by country",
            &["country", "medal_type"],
            Some("country:medal_type"),
        ),
    );
    views.insert(
        "sport-medals".to_string(),
        view(
            "Medals per sport discipline",
            &["sport", "medal_type"],
            Some("sport:medal_type"),
        ),
    );
    views.insert(
        "medals-by-day".to_string(),
        view("Medals awarded per day", &["date", "medal_type"], None),
    );
    views
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref source) = args.data {
            self.data.source = source.clone();
        }
        if let Some(timeout) = args.timeout {
            self.data.timeout_seconds = timeout;
        }
        if let Some(ref measures) = args.measures {
            self.data.measures = measures.clone();
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Options for the dataset loader.
    pub fn load_options(&self, show_progress: bool) -> LoadOptions {
        LoadOptions {
            measures: self.data.measures.clone(),
            timeout_seconds: self.data.timeout_seconds,
            show_progress,
        }
    }

    /// Look up a named view.
    pub fn view(&self, name: &str) -> Result<&ViewConfig> {
        self.views.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.views.keys().map(String::as_str).collect();
            anyhow::anyhow!("Unknown view '{}' (available: {})", name, known.join(", "))
        })
    }

    /// One `name<TAB>description` line per view, for `--list views`.
    pub fn view_listing(&self) -> Vec<String> {
        self.views
            .iter()
            .map(|(name, view)| match view.description {
                Some(ref description) => format!("{}\t{}", name, description),
                None => name.clone(),
            })
            .collect()
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.source, DEFAULT_DATA_URL);
        assert_eq!(config.data.timeout_seconds, 30);
        assert_eq!(config.report.format, OutputFormat::Markdown);
        assert_eq!(config.report.medal_order, vec!["Gold", "Silver", "Bronze"]);
        assert!(config.views.contains_key("gender-medals"));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true

[data]
source = "data/gdp.csv"
measures = ["GDP"]

[report]
format = "json"

[views.gdp]
group_by = ["country"]
sum = "GDP"
order = { country = ["USA", "CHN"] }

[views.gdp.filters]
medal_type = ["Gold"]
country = ["All"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.data.source, "data/gdp.csv");
        assert_eq!(config.data.timeout_seconds, 30);
        assert_eq!(config.data.measures, vec!["GDP"]);
        assert_eq!(config.report.format, OutputFormat::Json);
        assert_eq!(config.report.default_group_by, vec!["country", "medal_type"]);

        let view = config.view("gdp").unwrap();
        assert_eq!(view.aggregation(), Aggregation::Sum("GDP".to_string()));

        let group = view.group_spec().unwrap().unwrap();
        assert_eq!(group.dimensions(), &[Dimension::Country]);
        assert_eq!(
            group.order(Dimension::Country),
            Some(&["USA".to_string(), "CHN".to_string()][..])
        );

        let filters = view.filter_spec().unwrap();
        assert_eq!(filters.describe(), "medal_type = Gold");
    }

    #[test]
    fn test_view_listing_needs_only_config() {
        let mut config = Config::default();
        config.data.source = "/nonexistent/medals.csv".to_string();
        config.views.insert("bare".to_string(), ViewConfig::default());

        let lines = config.view_listing();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "bare");
        assert!(lines.contains(&"gender-medals\tComparison of genders and medals".to_string()));
    }

    #[test]
    fn test_unknown_view() {
        let config = Config::default();
        let err = config.view("nope").unwrap_err();
        assert!(err.to_string().contains("Unknown view 'nope'"));
    }

    #[test]
    fn test_view_with_bad_dimension() {
        let view = ViewConfig {
            group_by: vec!["Total Medals".to_string()],
            ..ViewConfig::default()
        };
        assert!(matches!(
            view.group_spec(),
            Err(EngineError::UnknownDimension(_))
        ));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[data]"));
        assert!(toml_str.contains("[report]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.views.len(), Config::default().views.len());
    }
}

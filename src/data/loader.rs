//! Medal CSV loading.
//!
//! Fetches the source table from disk or over HTTP, coerces each row into
//! a [`Record`] and drops rows whose required fields are missing or
//! unparseable.

use crate::models::{Dataset, Gender, MedalType, Record};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Published cleaned Paris 2024 medals table.
pub const DEFAULT_DATA_URL: &str =
    "https://raw.githubusercontent.com/KhalidBatran/MCM-Exercise-3/main/assets/cleaned_medals.csv";

/// Only the first few skipped rows are logged individually.
const MAX_ROW_WARNINGS: usize = 5;

const ATHLETE_COLUMN: &str = "Athlete Name";
const COUNTRY_COLUMN: &str = "Country Code";
const GENDER_COLUMN: &str = "Gender";
const SPORT_COLUMN: &str = "Sport Discipline";
const MEDAL_COLUMN: &str = "Medal Type";
const DATE_COLUMN: &str = "Medal Date";

/// Where the medal table comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Path(PathBuf),
    Url(String),
}

impl DataSource {
    /// `http://` and `https://` locations are URLs, anything else a path.
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            DataSource::Url(location.to_string())
        } else {
            DataSource::Path(PathBuf::from(location))
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Path(path) => write!(f, "{}", path.display()),
            DataSource::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Options for loading a dataset.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Numeric columns to keep as summable measures.
    pub measures: Vec<String>,
    /// HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Whether to show a spinner while downloading.
    pub show_progress: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            measures: Vec::new(),
            timeout_seconds: 30,
            show_progress: false,
        }
    }
}

/// A parsed dataset plus row accounting.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    /// Data rows read from the source (header excluded).
    pub rows_read: usize,
    /// Rows dropped because a required field was invalid.
    pub rows_skipped: usize,
}

/// Load and parse the medal table from `source`.
pub async fn load_source(source: &DataSource, options: &LoadOptions) -> Result<LoadedDataset> {
    info!("Loading medal data from: {}", source);

    let content = match source {
        DataSource::Path(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read data file: {}", path.display()))?,
        DataSource::Url(url) => fetch_url(url, options).await?,
    };

    parse_csv(content.as_bytes(), options)
        .with_context(|| format!("Failed to parse medal data from {}", source))
}

/// Download a CSV body.
async fn fetch_url(url: &str, options: &LoadOptions) -> Result<String> {
    let spinner = if options.show_progress {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Downloading {}", url));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(options.timeout_seconds))
        .build()
        .context("Failed to build HTTP client")?;

    let result = async {
        let response = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!("Request timed out after {}s", options.timeout_seconds)
            } else if e.is_connect() {
                anyhow::anyhow!("Cannot connect to {}", url)
            } else {
                anyhow::anyhow!("Failed to send request: {}", e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("Download failed with HTTP {}: {}", status, url));
        }

        response
            .text()
            .await
            .context("Failed to read response body")
    }
    .await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let body = result?;
    debug!("Downloaded {} bytes from {}", body.len(), url);
    Ok(body)
}

/// Column indices resolved from the header row.
struct Columns {
    athlete: usize,
    country: usize,
    gender: usize,
    sport: usize,
    medal: usize,
    date: usize,
    measures: Vec<(String, usize)>,
}

impl Columns {
    fn from_header(header: &StringRecord, measures: &[String]) -> Result<Self> {
        let find = |name: &str| -> Result<usize> {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "Missing column '{}' (found: {})",
                        name,
                        header.iter().collect::<Vec<_>>().join(", ")
                    )
                })
        };

        Ok(Self {
            athlete: find(ATHLETE_COLUMN)?,
            country: find(COUNTRY_COLUMN)?,
            gender: find(GENDER_COLUMN)?,
            sport: find(SPORT_COLUMN)?,
            medal: find(MEDAL_COLUMN)?,
            date: find(DATE_COLUMN)?,
            measures: measures
                .iter()
                .map(|m| find(m.as_str()).map(|index| (m.clone(), index)))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// Coerce one row, or explain why it was rejected.
    fn record(&self, row: &StringRecord) -> std::result::Result<Record, String> {
        let gender_raw = cell(row, self.gender, GENDER_COLUMN)?;
        let gender =
            Gender::parse(gender_raw).ok_or_else(|| format!("invalid gender '{}'", gender_raw))?;

        let medal_raw = cell(row, self.medal, MEDAL_COLUMN)?;
        let medal_type = MedalType::parse(medal_raw)
            .ok_or_else(|| format!("invalid medal type '{}'", medal_raw))?;

        let date_raw = cell(row, self.date, DATE_COLUMN)?;
        let medal_date =
            parse_date(date_raw).ok_or_else(|| format!("invalid date '{}'", date_raw))?;

        let mut record = Record::new(
            cell(row, self.athlete, ATHLETE_COLUMN)?,
            cell(row, self.country, COUNTRY_COLUMN)?,
            gender,
            cell(row, self.sport, SPORT_COLUMN)?,
            medal_type,
            medal_date,
        );

        for (name, index) in &self.measures {
            let raw = cell(row, *index, name)?;
            let value = raw
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("invalid {} '{}'", name, raw))?;
            record.measures.insert(name.clone(), value);
        }

        Ok(record)
    }
}

/// Trimmed, non-empty cell value.
fn cell<'r>(
    row: &'r StringRecord,
    index: usize,
    name: &str,
) -> std::result::Result<&'r str, String> {
    match row.get(index).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(format!("missing {}", name)),
    }
}

/// Parse a medal CSV with a header row.
pub fn parse_csv<R: Read>(reader: R, options: &LoadOptions) -> Result<LoadedDataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let header = csv_reader.headers().context("Failed to read CSV header")?.clone();
    let columns = Columns::from_header(&header, &options.measures)?;

    let mut records = Vec::new();
    let mut rows_read = 0;
    let mut rows_skipped = 0;

    for (i, row) in csv_reader.records().enumerate() {
        rows_read += 1;
        // Header is line 1.
        let line = i + 2;

        let outcome = row
            .map_err(|e| format!("malformed row: {}", e))
            .and_then(|row| columns.record(&row));

        match outcome {
            Ok(record) => records.push(record),
            Err(reason) => {
                rows_skipped += 1;
                if rows_skipped <= MAX_ROW_WARNINGS {
                    warn!("Skipping line {}: {}", line, reason);
                }
            }
        }
    }

    if rows_skipped > 0 {
        info!(
            "Loaded {} records ({} of {} rows skipped)",
            records.len(),
            rows_skipped,
            rows_read
        );
    } else {
        info!("Loaded {} records", records.len());
    }

    Ok(LoadedDataset {
        dataset: Dataset::new(records),
        rows_read,
        rows_skipped,
    })
}

/// Accepts ISO dates, ISO date-times, RFC 3339 and day/month/year.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok())
}

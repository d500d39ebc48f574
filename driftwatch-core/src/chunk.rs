//! Splitting timestamped tables into ordered, contiguous chunks.
//!
//! Every chunker covers all input rows exactly once, in row order. Chunks are
//! tagged with the period their rows belong to; a chunk holding rows of both
//! periods is a transition chunk and is reported as `analysis`.

use crate::data::source::DataBatch;
use crate::error::DriftError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Column that, when present, tags each row as `reference` or `analysis`.
pub const PERIOD_COLUMN_NAME: &str = "period";

/// Number of chunks produced when no chunking policy is configured.
pub const DEFAULT_CHUNK_NUMBER: usize = 10;

/// The data period a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Reference,
    Analysis,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Analysis => write!(f, "analysis"),
        }
    }
}

impl FromStr for Period {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reference" => Ok(Self::Reference),
            "analysis" => Ok(Self::Analysis),
            other => Err(DriftError::invalid_input(format!(
                "unknown period '{other}' in column '{PERIOD_COLUMN_NAME}', expected 'reference' or 'analysis'"
            ))),
        }
    }
}

/// A contiguous row range of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub key: String,
    /// First row of the chunk.
    pub start_index: usize,
    /// Last row of the chunk (inclusive).
    pub end_index: usize,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub period: Period,
    pub is_transition: bool,
}

impl Chunk {
    pub fn rows(&self) -> Range<usize> {
        self.start_index..self.end_index + 1
    }

    pub fn len(&self) -> usize {
        self.end_index + 1 - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.end_index < self.start_index
    }
}

/// Calendar period used by [`PeriodBasedChunker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkPeriod {
    #[serde(rename = "D", alias = "day")]
    Day,
    #[serde(rename = "W", alias = "week")]
    Week,
    #[serde(rename = "M", alias = "month")]
    Month,
    #[serde(rename = "Q", alias = "quarter")]
    Quarter,
    #[serde(rename = "Y", alias = "A", alias = "year")]
    Year,
}

impl ChunkPeriod {
    /// Calendar label of the period containing `ts`.
    pub fn key(self, ts: &DateTime<Utc>) -> String {
        match self {
            Self::Day => ts.format("%Y-%m-%d").to_string(),
            Self::Week => ts.format("%G-W%V").to_string(),
            Self::Month => ts.format("%Y-%m").to_string(),
            Self::Quarter => format!("{}Q{}", ts.year(), ts.month0() / 3 + 1),
            Self::Year => ts.format("%Y").to_string(),
        }
    }
}

impl FromStr for ChunkPeriod {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "D" | "day" => Ok(Self::Day),
            "W" | "week" => Ok(Self::Week),
            "M" | "month" => Ok(Self::Month),
            "Q" | "quarter" => Ok(Self::Quarter),
            "Y" | "A" | "year" => Ok(Self::Year),
            other => Err(DriftError::config(format!(
                "unknown chunk period '{other}', expected one of D, W, M, Q, Y"
            ))),
        }
    }
}

/// Minimum rows per chunk for stable reconstruction-error statistics.
pub fn minimum_chunk_size(n_features: usize) -> usize {
    (20.0 * (n_features as f64).powf(5.0 / 6.0)) as usize
}

/// Parse a timestamp cell.
///
/// Accepts RFC 3339 strings, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S`,
/// `%Y-%m-%d`, and integer epoch seconds.
pub fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        serde_json::Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

/// Splits a dataset into keyed, contiguous row ranges.
pub trait Chunker: fmt::Debug + Send + Sync {
    /// Keyed row ranges covering `0..timestamps.len()` in order.
    fn ranges(&self, timestamps: &[DateTime<Utc>])
    -> Result<Vec<(String, Range<usize>)>, DriftError>;

    /// Split `data` into chunks.
    ///
    /// `columns` must all be present. Rows are tagged by the `period` column
    /// when present, otherwise by `default_period`. Chunks smaller than
    /// `minimum_chunk_size` are reported as a warning, never an error.
    fn split(
        &self,
        data: &DataBatch,
        columns: &[String],
        minimum_chunk_size: usize,
        timestamp_column_name: &str,
        default_period: Period,
    ) -> Result<Vec<Chunk>, DriftError> {
        let mut required = columns.to_vec();
        required.push(timestamp_column_name.to_string());
        let missing = data.missing_columns(&required);
        if !missing.is_empty() {
            return Err(DriftError::missing_columns(&missing));
        }

        let timestamps = data
            .as_slice()
            .column_by_name(timestamp_column_name)?
            .enumerate()
            .map(|(row, value)| {
                parse_timestamp(value).ok_or_else(|| {
                    DriftError::invalid_input(format!(
                        "cannot parse timestamp {value} in column '{timestamp_column_name}' at row {row}"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let periods = match data.column_index(PERIOD_COLUMN_NAME) {
            Some(idx) => data
                .as_slice()
                .column(idx)
                .map(|value| match value {
                    serde_json::Value::String(s) => s.parse::<Period>(),
                    serde_json::Value::Null => Ok(default_period),
                    other => Period::from_str(&other.to_string()),
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![default_period; data.row_count()],
        };

        let chunks: Vec<Chunk> = self
            .ranges(&timestamps)?
            .into_iter()
            .filter(|(_, range)| !range.is_empty())
            .map(|(key, range)| build_chunk(key, range, &timestamps, &periods))
            .collect();

        let underpopulated = chunks
            .iter()
            .filter(|c| c.len() < minimum_chunk_size)
            .count();
        if underpopulated > 0 {
            tracing::warn!(
                underpopulated,
                minimum_chunk_size,
                total = chunks.len(),
                "chunking produced underpopulated chunks; results for these chunks may be unreliable"
            );
        }
        tracing::debug!(chunks = chunks.len(), chunker = ?self, "split data into chunks");

        Ok(chunks)
    }
}

fn build_chunk(
    key: String,
    range: Range<usize>,
    timestamps: &[DateTime<Utc>],
    periods: &[Period],
) -> Chunk {
    let ts = &timestamps[range.clone()];
    // Ranges are non-empty here, so min/max always exist.
    let start_datetime = ts.iter().min().copied().unwrap_or_default();
    let end_datetime = ts.iter().max().copied().unwrap_or_default();

    let rows = &periods[range.clone()];
    let has_reference = rows.contains(&Period::Reference);
    let has_analysis = rows.contains(&Period::Analysis);
    let is_transition = has_reference && has_analysis;
    let period = if has_analysis {
        Period::Analysis
    } else {
        Period::Reference
    };

    Chunk {
        key,
        start_index: range.start,
        end_index: range.end - 1,
        start_datetime,
        end_datetime,
        period,
        is_transition,
    }
}

fn index_key(range: &Range<usize>) -> String {
    format!("[{}:{}]", range.start, range.end - 1)
}

/// Fixed number of rows per chunk; the last chunk holds the remainder.
#[derive(Debug, Clone)]
pub struct SizeBasedChunker {
    pub chunk_size: usize,
}

impl Chunker for SizeBasedChunker {
    fn ranges(
        &self,
        timestamps: &[DateTime<Utc>],
    ) -> Result<Vec<(String, Range<usize>)>, DriftError> {
        if self.chunk_size == 0 {
            return Err(DriftError::config("chunk_size must be greater than zero"));
        }
        let n = timestamps.len();
        Ok((0..n)
            .step_by(self.chunk_size)
            .map(|start| {
                let range = start..(start + self.chunk_size).min(n);
                (index_key(&range), range)
            })
            .collect())
    }
}

/// Fixed number of chunks; sizes differ by at most one row.
#[derive(Debug, Clone)]
pub struct CountBasedChunker {
    pub chunk_number: usize,
}

impl Chunker for CountBasedChunker {
    fn ranges(
        &self,
        timestamps: &[DateTime<Utc>],
    ) -> Result<Vec<(String, Range<usize>)>, DriftError> {
        let n = timestamps.len();
        if self.chunk_number == 0 {
            return Err(DriftError::config("chunk_number must be greater than zero"));
        }
        if self.chunk_number > n {
            return Err(DriftError::invalid_input(format!(
                "cannot split {n} rows into {} chunks",
                self.chunk_number
            )));
        }
        let base = n / self.chunk_number;
        let extra = n % self.chunk_number;
        let mut start = 0;
        Ok((0..self.chunk_number)
            .map(|i| {
                let len = base + usize::from(i < extra);
                let range = start..start + len;
                start += len;
                (index_key(&range), range)
            })
            .collect())
    }
}

/// One chunk per calendar period. Requires rows sorted by timestamp.
#[derive(Debug, Clone)]
pub struct PeriodBasedChunker {
    pub period: ChunkPeriod,
}

impl Chunker for PeriodBasedChunker {
    fn ranges(
        &self,
        timestamps: &[DateTime<Utc>],
    ) -> Result<Vec<(String, Range<usize>)>, DriftError> {
        if let Some(pos) = timestamps.windows(2).position(|w| w[1] < w[0]) {
            return Err(DriftError::invalid_input(format!(
                "period-based chunking requires data sorted by timestamp; row {} precedes row {}",
                pos + 1,
                pos
            )));
        }

        let mut ranges: Vec<(String, Range<usize>)> = Vec::new();
        for (idx, ts) in timestamps.iter().enumerate() {
            let key = self.period.key(ts);
            match ranges.last_mut() {
                Some((last_key, range)) if *last_key == key => range.end = idx + 1,
                _ => ranges.push((key, idx..idx + 1)),
            }
        }
        Ok(ranges)
    }
}

/// Chunker used when no policy is given: [`DEFAULT_CHUNK_NUMBER`] count-based chunks.
#[derive(Debug, Clone, Default)]
pub struct DefaultChunker;

impl Chunker for DefaultChunker {
    fn ranges(
        &self,
        timestamps: &[DateTime<Utc>],
    ) -> Result<Vec<(String, Range<usize>)>, DriftError> {
        CountBasedChunker {
            chunk_number: DEFAULT_CHUNK_NUMBER.min(timestamps.len().max(1)),
        }
        .ranges(timestamps)
    }
}

/// The mutually exclusive chunking policies a calculator can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkingPolicy {
    Size { chunk_size: usize },
    Number { chunk_number: usize },
    Period { chunk_period: ChunkPeriod },
    Default,
}

impl ChunkingPolicy {
    /// Resolve the policy from optional settings, at most one of which may be set.
    pub fn from_options(
        chunk_size: Option<usize>,
        chunk_number: Option<usize>,
        chunk_period: Option<ChunkPeriod>,
    ) -> Result<Self, DriftError> {
        match (chunk_size, chunk_number, chunk_period) {
            (None, None, None) => Ok(Self::Default),
            (Some(0), None, None) => Err(DriftError::config("chunk_size must be greater than zero")),
            (Some(chunk_size), None, None) => Ok(Self::Size { chunk_size }),
            (None, Some(0), None) => {
                Err(DriftError::config("chunk_number must be greater than zero"))
            }
            (None, Some(chunk_number), None) => Ok(Self::Number { chunk_number }),
            (None, None, Some(chunk_period)) => Ok(Self::Period { chunk_period }),
            _ => Err(DriftError::config(
                "only one of chunk_size, chunk_number or chunk_period should be given",
            )),
        }
    }

    pub fn chunker(self) -> Box<dyn Chunker> {
        match self {
            Self::Size { chunk_size } => Box::new(SizeBasedChunker { chunk_size }),
            Self::Number { chunk_number } => Box::new(CountBasedChunker { chunk_number }),
            Self::Period { chunk_period } => Box::new(PeriodBasedChunker {
                period: chunk_period,
            }),
            Self::Default => Box::new(DefaultChunker),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn daily_batch(days: usize) -> DataBatch {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let ts = (0..days)
            .map(|d| json!((start + chrono::Days::new(d as u64)).format("%Y-%m-%d").to_string()))
            .collect();
        let values = (0..days).map(|d| json!(d as f64)).collect();
        DataBatch::from_columns(vec![("ts".into(), ts), ("f".into(), values)]).unwrap()
    }

    fn keys(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.key.as_str()).collect()
    }

    #[test]
    fn test_minimum_chunk_size() {
        assert_eq!(minimum_chunk_size(1), 20);
        assert_eq!(minimum_chunk_size(3), 49);
        assert_eq!(minimum_chunk_size(10), 136);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2021, 3, 4)
            .unwrap()
            .and_hms_opt(5, 6, 7)
            .unwrap()
            .and_utc();
        assert_eq!(parse_timestamp(&json!("2021-03-04T05:06:07Z")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2021-03-04 05:06:07")), Some(expected));
        assert_eq!(parse_timestamp(&json!(expected.timestamp())), Some(expected));
        assert!(parse_timestamp(&json!("2021-03-04")).is_some());
        assert!(parse_timestamp(&json!("yesterday")).is_none());
    }

    #[test]
    fn test_size_based_keeps_remainder() {
        let data = daily_batch(10);
        let chunks = SizeBasedChunker { chunk_size: 4 }
            .split(&data, &["f".into()], 0, "ts", Period::Analysis)
            .unwrap();
        assert_eq!(keys(&chunks), vec!["[0:3]", "[4:7]", "[8:9]"]);
        assert_eq!(chunks[2].len(), 2);
    }

    #[test]
    fn test_count_based_covers_every_row() {
        let data = daily_batch(11);
        let chunks = CountBasedChunker { chunk_number: 3 }
            .split(&data, &[], 0, "ts", Period::Analysis)
            .unwrap();
        let sizes: Vec<usize> = chunks.iter().map(Chunk::len).collect();
        assert_eq!(sizes, vec![4, 4, 3]);
        assert_eq!(chunks.last().unwrap().end_index, 10);
    }

    #[test]
    fn test_count_based_rejects_more_chunks_than_rows() {
        let data = daily_batch(2);
        let err = CountBasedChunker { chunk_number: 3 }
            .split(&data, &[], 0, "ts", Period::Analysis)
            .unwrap_err();
        assert!(matches!(err, DriftError::InvalidInput(_)));
    }

    #[test]
    fn test_period_based_groups_by_month() {
        let data = daily_batch(45);
        let chunks = PeriodBasedChunker {
            period: ChunkPeriod::Month,
        }
        .split(&data, &[], 0, "ts", Period::Analysis)
        .unwrap();
        assert_eq!(keys(&chunks), vec!["2021-01", "2021-02"]);
        assert_eq!(chunks[0].len(), 31);
        assert_eq!(
            chunks[1].end_datetime.date_naive(),
            NaiveDate::from_ymd_opt(2021, 2, 14).unwrap()
        );
    }

    #[test]
    fn test_period_based_quarter_and_week_keys() {
        let ts = NaiveDate::from_ymd_opt(2021, 5, 12)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        assert_eq!(ChunkPeriod::Quarter.key(&ts), "2021Q2");
        assert_eq!(ChunkPeriod::Week.key(&ts), "2021-W19");
    }

    #[test]
    fn test_period_based_rejects_unsorted_data() {
        let data = DataBatch::from_columns(vec![(
            "ts".into(),
            vec![json!("2021-01-02"), json!("2021-01-01")],
        )])
        .unwrap();
        let err = PeriodBasedChunker {
            period: ChunkPeriod::Day,
        }
        .split(&data, &[], 0, "ts", Period::Analysis)
        .unwrap_err();
        assert!(err.to_string().contains("sorted"));
    }

    #[test]
    fn test_transition_chunk_is_analysis() {
        let periods = (0..10)
            .map(|i| json!(if i < 5 { "reference" } else { "analysis" }))
            .collect();
        let data = daily_batch(10).with_column(PERIOD_COLUMN_NAME, periods).unwrap();
        let chunks = SizeBasedChunker { chunk_size: 4 }
            .split(&data, &[], 0, "ts", Period::Reference)
            .unwrap();
        assert_eq!(chunks[0].period, Period::Reference);
        assert!(!chunks[0].is_transition);
        assert_eq!(chunks[1].period, Period::Analysis);
        assert!(chunks[1].is_transition);
        assert_eq!(chunks[2].period, Period::Analysis);
        assert!(!chunks[2].is_transition);
    }

    #[test]
    fn test_split_requires_timestamp_column() {
        let data = daily_batch(3);
        let err = DefaultChunker
            .split(&data, &["f".into()], 0, "when", Period::Analysis)
            .unwrap_err();
        assert!(err.to_string().contains("when"));
    }

    #[test]
    fn test_default_chunker_on_small_data() {
        let data = daily_batch(4);
        let chunks = DefaultChunker
            .split(&data, &[], 0, "ts", Period::Analysis)
            .unwrap();
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_policy_is_mutually_exclusive() {
        assert_eq!(
            ChunkingPolicy::from_options(None, None, None).unwrap(),
            ChunkingPolicy::Default
        );
        assert!(matches!(
            ChunkingPolicy::from_options(Some(10), Some(2), None),
            Err(DriftError::Config(_))
        ));
        assert!(matches!(
            ChunkingPolicy::from_options(Some(0), None, None),
            Err(DriftError::Config(_))
        ));
    }

    #[test]
    fn test_chunk_period_from_str() {
        assert_eq!("W".parse::<ChunkPeriod>().unwrap(), ChunkPeriod::Week);
        assert!("fortnight".parse::<ChunkPeriod>().is_err());
    }
}

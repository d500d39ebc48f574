//! Plot specifications for drift results.
//!
//! Plots are rendered as serializable figure descriptions that any charting
//! front end can draw; nothing here depends on a display.

use crate::chunk::Period;
use crate::error::DriftError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Supported plot kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    /// Per-chunk metric with threshold band and alert markers.
    Drift,
}

impl PlotKind {
    pub const ALL: [PlotKind; 1] = [PlotKind::Drift];

    pub fn name(self) -> &'static str {
        match self {
            Self::Drift => "drift",
        }
    }
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlotKind {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|k| k.name()).collect();
                DriftError::unsupported(format!(
                    "unknown plot kind '{s}'. Please provide one of: {known:?}"
                ))
            })
    }
}

/// One step of a step plot, spanning one chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPoint {
    pub key: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub period: Period,
    pub value: f64,
    pub alert: bool,
}

/// A chunk-wise step plot with a horizontal threshold band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepPlot {
    pub title: String,
    pub y_axis_title: String,
    pub metric_name: String,
    pub lower_threshold: f64,
    pub upper_threshold: f64,
    pub points: Vec<PlotPoint>,
    /// Key of the first analysis chunk when a vertical line separates the periods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_separator: Option<String>,
}

impl StepPlot {
    /// Build a plot from reference points (possibly empty) followed by analysis points.
    ///
    /// Points are relabeled with the period they are drawn in. The separator is
    /// placed only when reference points are shown.
    pub fn new(
        title: impl Into<String>,
        y_axis_title: impl Into<String>,
        metric_name: impl Into<String>,
        thresholds: (f64, f64),
        reference: Vec<PlotPoint>,
        analysis: Vec<PlotPoint>,
    ) -> Self {
        let period_separator = if reference.is_empty() {
            None
        } else {
            analysis.first().map(|p| p.key.clone())
        };
        let points = reference
            .into_iter()
            .map(|p| PlotPoint {
                period: Period::Reference,
                ..p
            })
            .chain(analysis.into_iter().map(|p| PlotPoint {
                period: Period::Analysis,
                ..p
            }))
            .collect();

        Self {
            title: title.into(),
            y_axis_title: y_axis_title.into(),
            metric_name: metric_name.into(),
            lower_threshold: thresholds.0,
            upper_threshold: thresholds.1,
            points,
            period_separator,
        }
    }

    /// Points flagged as alerts, in plot order.
    pub fn alerts(&self) -> impl Iterator<Item = &PlotPoint> {
        self.points.iter().filter(|p| p.alert)
    }

    pub fn to_json_pretty(&self) -> Result<String, DriftError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

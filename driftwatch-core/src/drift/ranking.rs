//! Ranking features by how often they drifted.

use crate::drift::univariate::UnivariateDriftResult;
use crate::error::DriftError;
use serde::Serialize;

/// Position of a feature in a ranking; rank 1 drifted the most.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureRank {
    pub rank: usize,
    pub feature: String,
    pub number_of_alerts: usize,
}

/// Ranks features by their number of alerting chunks.
///
/// Ties keep the features' configuration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertCountRanking;

impl AlertCountRanking {
    pub fn rank(&self, result: &UnivariateDriftResult) -> Result<Vec<FeatureRank>, DriftError> {
        if result.rows().is_empty() {
            return Err(DriftError::invalid_input(
                "drift results contain no data to use for ranking",
            ));
        }

        let mut counts: Vec<(String, usize)> = result
            .feature_names()
            .iter()
            .map(|name| {
                let alerts = result
                    .rows()
                    .iter()
                    .filter(|row| row.feature(name).is_some_and(|f| f.alert))
                    .count();
                (name.clone(), alerts)
            })
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(counts
            .into_iter()
            .enumerate()
            .map(|(i, (feature, number_of_alerts))| FeatureRank {
                rank: i + 1,
                feature,
                number_of_alerts,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Period;
    use crate::drift::ChunkSummary;
    use crate::drift::univariate::{FeatureDrift, StatisticalTest, UnivariateDriftRow};
    use chrono::{DateTime, Utc};

    fn result(alerts: &[(&str, [bool; 6])]) -> UnivariateDriftResult {
        let rows = (0..6)
            .map(|i| UnivariateDriftRow {
                chunk: ChunkSummary {
                    key: format!("[{i}:{i}]"),
                    start_index: i,
                    end_index: i,
                    start_date: DateTime::<Utc>::default(),
                    end_date: DateTime::<Utc>::default(),
                    period: Period::Analysis,
                },
                features: alerts
                    .iter()
                    .map(|(name, flags)| FeatureDrift {
                        feature: name.to_string(),
                        test: StatisticalTest::KolmogorovSmirnov,
                        statistic: 0.0,
                        p_value: 1.0,
                        alert: flags[i],
                    })
                    .collect(),
            })
            .collect();
        let names = alerts.iter().map(|(name, _)| name.to_string()).collect();
        UnivariateDriftResult::new(names, rows)
    }

    #[test]
    fn test_ranks_by_alert_count() {
        let ranked = AlertCountRanking
            .rank(&result(&[
                ("f1", [false, false, false, false, true, true]),
                ("f2", [false, false, false, true, true, true]),
                ("f3", [false, false, false, true, false, true]),
                ("f4", [false; 6]),
            ]))
            .unwrap();
        let order: Vec<(usize, &str, usize)> = ranked
            .iter()
            .map(|r| (r.rank, r.feature.as_str(), r.number_of_alerts))
            .collect();
        assert_eq!(order, vec![(1, "f2", 3), (2, "f1", 2), (3, "f3", 2), (4, "f4", 0)]);
    }

    #[test]
    fn test_empty_result_is_rejected() {
        let empty = UnivariateDriftResult::new(vec!["f1".into()], vec![]);
        let err = AlertCountRanking.rank(&empty).unwrap_err();
        assert!(err.to_string().contains("drift results contain no data to use for ranking"));
    }
}

//! Missing-value imputation.

use crate::data::source::BatchSlice;
use crate::error::DriftError;
use crate::features::encoder::category_key;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// How missing values are filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "fill_value", rename_all = "snake_case")]
pub enum ImputeStrategy {
    Mean,
    Median,
    MostFrequent,
    Constant(serde_json::Value),
}

impl ImputeStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::MostFrequent => "most_frequent",
            Self::Constant(_) => "constant",
        }
    }
}

/// Per-column imputer: learns one fill value per column at fit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleImputer {
    strategy: ImputeStrategy,
    statistics: HashMap<String, serde_json::Value>,
}

impl SimpleImputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            statistics: HashMap::new(),
        }
    }

    /// Imputer for categorical features; defaults to most-frequent.
    ///
    /// Only `most_frequent` and `constant` make sense for labels, anything
    /// else is a configuration error.
    pub fn for_categorical(strategy: Option<ImputeStrategy>) -> Result<Self, DriftError> {
        let strategy = strategy.unwrap_or(ImputeStrategy::MostFrequent);
        match strategy {
            ImputeStrategy::MostFrequent | ImputeStrategy::Constant(_) => Ok(Self::new(strategy)),
            other => Err(DriftError::config(format!(
                "imputer strategy '{}' is not appropriate for categorical features, use 'most_frequent' or 'constant'",
                other.name()
            ))),
        }
    }

    /// Imputer for continuous features; defaults to the mean.
    pub fn for_continuous(strategy: Option<ImputeStrategy>) -> Self {
        Self::new(strategy.unwrap_or(ImputeStrategy::Mean))
    }

    pub fn strategy(&self) -> &ImputeStrategy {
        &self.strategy
    }

    /// Learn fill values for `columns` of `data`, replacing earlier statistics.
    pub fn fit(&mut self, data: BatchSlice<'_>, columns: &[String]) -> Result<(), DriftError> {
        self.statistics.clear();
        for column in columns {
            let present: Vec<&serde_json::Value> = data
                .column_by_name(column)?
                .filter(|v| !v.is_null())
                .collect();

            let statistic = match &self.strategy {
                ImputeStrategy::Constant(value) => value.clone(),
                _ if present.is_empty() => {
                    return Err(DriftError::invalid_input(format!(
                        "column '{column}' contains only missing values, cannot impute with strategy '{}'",
                        self.strategy.name()
                    )));
                }
                ImputeStrategy::Mean => {
                    let values = numeric_values(column, &present)?;
                    json_number(values.iter().sum::<f64>() / values.len() as f64)
                }
                ImputeStrategy::Median => {
                    let mut values = numeric_values(column, &present)?;
                    values.sort_by(f64::total_cmp);
                    let mid = values.len() / 2;
                    let median = if values.len() % 2 == 0 {
                        (values[mid - 1] + values[mid]) / 2.0
                    } else {
                        values[mid]
                    };
                    json_number(median)
                }
                ImputeStrategy::MostFrequent => most_frequent(&present),
            };
            self.statistics.insert(column.clone(), statistic);
        }
        Ok(())
    }

    /// The value to use for `value` in `column`: the learned fill if missing, else itself.
    pub fn impute<'a>(
        &'a self,
        column: &str,
        value: &'a serde_json::Value,
    ) -> Result<&'a serde_json::Value, DriftError> {
        if !value.is_null() {
            return Ok(value);
        }
        self.statistics.get(column).ok_or_else(|| {
            DriftError::not_fitted(format!("imputer has no statistic for column '{column}'"))
        })
    }

    pub fn statistic(&self, column: &str) -> Option<&serde_json::Value> {
        self.statistics.get(column)
    }
}

fn json_number(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn numeric_values(column: &str, values: &[&serde_json::Value]) -> Result<Vec<f64>, DriftError> {
    values
        .iter()
        .map(|v| {
            v.as_f64().ok_or_else(|| {
                DriftError::invalid_input(format!(
                    "column '{column}' holds non-numeric value {v}, cannot compute a numeric fill"
                ))
            })
        })
        .collect()
}

/// Most common value; ties go to the smallest value.
fn most_frequent(values: &[&serde_json::Value]) -> serde_json::Value {
    let mut counts: HashMap<String, (usize, &serde_json::Value)> = HashMap::new();
    for &v in values {
        counts.entry(category_key(v)).or_insert((0, v)).0 += 1;
    }
    counts
        .into_values()
        .max_by(|(ca, va), (cb, vb)| ca.cmp(cb).then_with(|| compare_values(vb, va)))
        .map(|(_, v)| v.clone())
        .unwrap_or(serde_json::Value::Null)
}

/// Numbers order numerically and before everything else; other values order by key.
fn compare_values(a: &serde_json::Value, b: &serde_json::Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => category_key(a).cmp(&category_key(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::DataBatch;
    use serde_json::{Value, json};

    fn batch() -> DataBatch {
        DataBatch::from_columns(vec![
            ("num".into(), vec![json!(1.0), Value::Null, json!(3.0), json!(8.0)]),
            ("cat".into(), vec![json!("b"), json!("a"), Value::Null, json!("b")]),
            ("tie".into(), vec![json!("y"), json!("x"), json!("y"), json!("x")]),
            ("none".into(), vec![Value::Null, Value::Null, Value::Null, Value::Null]),
        ])
        .unwrap()
    }

    #[test]
    fn test_mean_imputation() {
        let data = batch();
        let mut imputer = SimpleImputer::for_continuous(None);
        imputer.fit(data.as_slice(), &["num".into()]).unwrap();
        assert_eq!(imputer.statistic("num"), Some(&json!(4.0)));
        assert_eq!(imputer.impute("num", &Value::Null).unwrap(), &json!(4.0));
        assert_eq!(imputer.impute("num", &json!(9.0)).unwrap(), &json!(9.0));
    }

    #[test]
    fn test_median_imputation() {
        let data = batch();
        let mut imputer = SimpleImputer::for_continuous(Some(ImputeStrategy::Median));
        imputer.fit(data.as_slice(), &["num".into()]).unwrap();
        assert_eq!(imputer.statistic("num"), Some(&json!(3.0)));
    }

    #[test]
    fn test_most_frequent_imputation_breaks_ties_by_smallest() {
        let data = batch();
        let mut imputer = SimpleImputer::for_categorical(None).unwrap();
        imputer
            .fit(data.as_slice(), &["cat".into(), "tie".into()])
            .unwrap();
        assert_eq!(imputer.statistic("cat"), Some(&json!("b")));
        assert_eq!(imputer.statistic("tie"), Some(&json!("x")));
    }

    #[test]
    fn test_constant_imputation_needs_no_data() {
        let data = batch();
        let mut imputer =
            SimpleImputer::for_categorical(Some(ImputeStrategy::Constant(json!("missing"))))
                .unwrap();
        imputer.fit(data.as_slice(), &["none".into()]).unwrap();
        assert_eq!(imputer.impute("none", &Value::Null).unwrap(), &json!("missing"));
    }

    #[test]
    fn test_categorical_imputer_rejects_mean() {
        let err = SimpleImputer::for_categorical(Some(ImputeStrategy::Mean)).unwrap_err();
        assert!(matches!(err, DriftError::Config(_)));
        assert!(err.to_string().contains("mean"));
    }

    #[test]
    fn test_all_missing_column_cannot_be_imputed() {
        let data = batch();
        let mut imputer = SimpleImputer::for_continuous(None);
        let err = imputer.fit(data.as_slice(), &["none".into()]).unwrap_err();
        assert!(err.to_string().contains("'none'"));
    }

    #[test]
    fn test_unfitted_column_is_reported() {
        let imputer = SimpleImputer::for_continuous(None);
        let err = imputer.impute("num", &Value::Null).unwrap_err();
        assert!(matches!(err, DriftError::NotFitted(_)));
    }

    #[test]
    fn test_strategy_deserialization() {
        let constant: ImputeStrategy =
            serde_json::from_str(r#"{"strategy": "constant", "fill_value": 0}"#).unwrap();
        assert_eq!(constant, ImputeStrategy::Constant(json!(0)));
        let mean: ImputeStrategy = serde_json::from_str(r#"{"strategy": "mean"}"#).unwrap();
        assert_eq!(mean, ImputeStrategy::Mean);
    }
}

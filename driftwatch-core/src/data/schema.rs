//! Column type inference and the continuous/categorical feature split.

use crate::data::source::BatchSlice;
use crate::error::DriftError;
use serde::{Deserialize, Serialize};

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Boolean,
    Null,
    Unknown,
}

/// How a feature is treated during imputation and drift testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Continuous,
    Categorical,
}

impl ColumnType {
    /// Numeric columns are continuous; everything else is categorical.
    ///
    /// All-null columns carry no type information and return `None`.
    pub fn feature_kind(self) -> Option<FeatureKind> {
        match self {
            Self::Integer | Self::Float => Some(FeatureKind::Continuous),
            Self::String | Self::Boolean | Self::Unknown => Some(FeatureKind::Categorical),
            Self::Null => None,
        }
    }
}

/// A feature column with its frozen kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
}

/// Infer column type from a sample of values.
pub fn infer_column_type<'a>(values: impl IntoIterator<Item = &'a serde_json::Value>) -> ColumnType {
    let mut has_int = false;
    let mut has_float = false;
    let mut has_bool = false;
    let mut has_string = false;
    let mut has_other = false;

    for v in values {
        match v {
            serde_json::Value::Null => {}
            serde_json::Value::Number(n) => {
                if n.is_f64() {
                    has_float = true;
                } else {
                    has_int = true;
                }
            }
            serde_json::Value::Bool(_) => has_bool = true,
            serde_json::Value::String(_) => has_string = true,
            _ => has_other = true,
        }
    }

    if has_string {
        return ColumnType::String;
    }
    if has_other {
        return ColumnType::Unknown;
    }
    if has_bool {
        // Mixed bools and numbers behave like labels, not magnitudes.
        return ColumnType::Boolean;
    }
    if has_float {
        return ColumnType::Float;
    }
    if has_int {
        return ColumnType::Integer;
    }
    ColumnType::Null
}

/// Classify each feature column of `data` as continuous or categorical from its values.
///
/// All-null columns default to categorical. Fails naming the columns absent from `data`.
pub fn split_features_by_type(
    data: BatchSlice<'_>,
    feature_column_names: &[String],
) -> Result<Vec<FeatureSpec>, DriftError> {
    let missing: Vec<String> = feature_column_names
        .iter()
        .filter(|name| data.column_index(name).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(DriftError::missing_columns(&missing));
    }

    feature_column_names
        .iter()
        .map(|name| {
            let dtype = infer_column_type(data.column_by_name(name)?);
            Ok(FeatureSpec {
                name: name.clone(),
                kind: dtype.feature_kind().unwrap_or(FeatureKind::Categorical),
            })
        })
        .collect()
}

/// Check that `data` presents each feature with the kind frozen at fit time.
///
/// Columns holding only nulls are accepted for either kind.
pub fn validate_feature_kinds(
    data: BatchSlice<'_>,
    features: &[FeatureSpec],
) -> Result<(), DriftError> {
    let mut mismatches = Vec::new();
    for feature in features {
        let dtype = infer_column_type(data.column_by_name(&feature.name)?);
        if let Some(kind) = dtype.feature_kind()
            && kind != feature.kind
        {
            mismatches.push(format!(
                "'{}' (fitted as {:?}, found {:?})",
                feature.name, feature.kind, dtype
            ));
        }
    }
    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(DriftError::invalid_input(format!(
            "feature types differ from reference data: {}",
            mismatches.join(", ")
        )))
    }
}

/// Names of the features of the given kind, in feature order.
pub fn names_of_kind(features: &[FeatureSpec], kind: FeatureKind) -> Vec<String> {
    features
        .iter()
        .filter(|f| f.kind == kind)
        .map(|f| f.name.clone())
        .collect()
}

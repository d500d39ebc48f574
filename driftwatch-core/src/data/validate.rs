//! Input validation shared by every calculator.

use crate::data::source::DataBatch;
use crate::error::DriftError;

/// Reject empty datasets and datasets lacking any of `required` columns.
///
/// The error names every missing column.
pub fn validate_batch(data: &DataBatch, required: &[String]) -> Result<(), DriftError> {
    if data.is_empty() {
        return Err(DriftError::empty_data());
    }
    let missing = data.missing_columns(required);
    if !missing.is_empty() {
        return Err(DriftError::missing_columns(&missing));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_empty_batch() {
        let batch = DataBatch::new(vec!["a".into()], vec![]).unwrap();
        let err = validate_batch(&batch, &["a".into()]).unwrap_err();
        assert!(err.to_string().contains("no rows"));
    }

    #[test]
    fn test_validate_missing_columns() {
        let batch = DataBatch::new(vec!["a".into()], vec![vec![json!(1)]]).unwrap();
        let err = validate_batch(&batch, &["a".into(), "b".into(), "c".into()]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"b\"") && msg.contains("\"c\""));
    }

    #[test]
    fn test_validate_ok() {
        let batch = DataBatch::new(vec!["a".into()], vec![vec![json!(1)]]).unwrap();
        assert!(validate_batch(&batch, &["a".into()]).is_ok());
    }
}

//! JSON Schema validation for pipeline configuration files.
//!
//! The schema is embedded at compile time from
//! `schemas/pipeline-config.json` (Draft 7). Validation runs before the JSON
//! is deserialized, so a typo in a key is reported instead of being ignored.

use once_cell::sync::Lazy;
use serde_json::Value;

static CONFIG_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/pipeline-config.json"))
        .expect("Invalid embedded schema")
});

/// Validate `data` against `schema`.
///
/// Returns every violation as a readable message.
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick yes/no check.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate a configuration document against the embedded schema.
pub fn validate_config(data: &Value) -> Result<(), Vec<String>> {
    validate(&CONFIG_SCHEMA, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_config_is_valid() {
        assert!(validate_config(&json!({})).is_ok());
    }

    #[test]
    fn test_full_config_is_valid() {
        let config = json!({
            "input": "data/customer_data.csv",
            "cleaned_output": "out/clean.csv",
            "sort": "descending",
            "columns": { "amount": "amount" },
            "regression": { "test_fraction": 0.25, "seed": 7 },
            "sink": { "database": "purchases.db", "table": "customer_purchases" }
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let errors = validate_config(&json!({ "inptu": "x.csv" })).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_bad_values_reported() {
        let config = json!({
            "regression": { "test_fraction": 1.5 },
            "sort": "sideways"
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("1.5")));
    }

    #[test]
    fn test_generic_validate() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": { "type": "string" } }
        });
        assert!(is_valid(&schema, &json!({ "name": "test" })));
        assert!(validate(&schema, &json!({ "age": 42 })).is_err());
    }
}

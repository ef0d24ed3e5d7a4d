//! Request body validation against the model's declared fields and per-field rules.

use crate::config::{Field, FieldType, Model, ValidationRule};
use crate::error::AppError;
use crate::store::{value_eq, Row};
use regex::Regex;
use serde_json::Value;

/// Whether every required field must be present (create/replace) or only supplied fields are checked (patch).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completeness {
    Full,
    Partial,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Check the body before any mutation and return it as a row.
    pub fn verify(model: &Model, body: Option<Value>, mode: Completeness) -> Result<Row, AppError> {
        let data = match body {
            Some(Value::Object(m)) if !m.is_empty() => m,
            Some(Value::Object(_)) | None | Some(Value::Null) => {
                return Err(AppError::bad_request("No data received from request"))
            }
            Some(_) => return Err(AppError::bad_request("body must be a JSON object")),
        };

        for (key, value) in &data {
            let field = model
                .field(key)
                .ok_or_else(|| AppError::bad_request(format!("Unknown field [{}]", key)))?;
            validate_field(field, value)?;
        }

        if mode == Completeness::Full {
            for f in model.fields.iter().filter(|f| f.is_required()) {
                if !data.contains_key(&f.name) {
                    return Err(AppError::bad_request(format!("Missing field [{}]", f.name))
                        .with_details(serde_json::json!({ "field": f.name })));
                }
            }
        }
        Ok(data)
    }
}

fn validate_field(field: &Field, v: &Value) -> Result<(), AppError> {
    let col = field.name.as_str();
    if v.is_null() {
        if !field.nullable && !field.is_pk {
            return Err(AppError::bad_request(format!("Field [{}] cannot be null", col)));
        }
        return Ok(());
    }
    if !shape_matches(field.field_type, v) {
        return Err(AppError::bad_request(format!(
            "Field [{}] must be of type {}",
            col,
            field.field_type.pg_type()
        ))
        .with_details(serde_json::json!({ "field": col, "expected": field.field_type.pg_type() })));
    }
    if let Some(rule) = &field.validation {
        validate_rule(col, v, rule)?;
    }
    Ok(())
}

fn shape_matches(ty: FieldType, v: &Value) -> bool {
    match ty {
        FieldType::Integer | FieldType::BigInt => v.is_i64() || v.is_u64(),
        FieldType::Float => v.is_number(),
        FieldType::Text => v.is_string(),
        FieldType::Boolean => v.is_boolean(),
        FieldType::Uuid => v.as_str().map(|s| uuid::Uuid::parse_str(s).is_ok()).unwrap_or(false),
        FieldType::Timestamptz => v
            .as_str()
            .map(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok())
            .unwrap_or(false),
        FieldType::Timestamp => v
            .as_str()
            .map(|s| {
                chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
                    || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
            })
            .unwrap_or(false),
        FieldType::Date => v
            .as_str()
            .map(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
            .unwrap_or(false),
        FieldType::Json => true,
    }
}

fn validate_rule(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::bad_request(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(AppError::bad_request(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern).map_err(|_| AppError::server_error(format!("invalid pattern for {}", col)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(AppError::bad_request(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::bad_request(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            ))
            .with_details(serde_json::json!({ "field": col, "allowed": allowed })));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(AppError::bad_request(format!("{} must be at least {}", col, min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(AppError::bad_request(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                if !s.contains('@') || s.len() < 3 {
                    return Err(AppError::bad_request(format!("{} must be a valid email", col)));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    return Err(AppError::bad_request(format!("{} must be a valid UUID", col)));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, ModelConfig};
    use serde_json::json;

    fn model() -> Model {
        let cfg: ModelConfig = serde_json::from_value(json!({
            "name": "Account",
            "table": "accounts",
            "fields": [
                {"name": "id", "type": "integer", "nullable": false},
                {"name": "email", "type": "text", "nullable": false,
                 "validation": {"format": "email", "max_length": 20}},
                {"name": "plan", "type": "text", "validation": {"allowed": ["free", "pro"]}},
                {"name": "seats", "type": "integer", "validation": {"minimum": 1}},
                {"name": "joined", "type": "date"}
            ]
        }))
        .unwrap();
        resolve(&[cfg]).unwrap().remove(0)
    }

    fn message(err: AppError) -> String {
        match err {
            AppError::BadRequest { message, .. } => message,
            other => panic!("expected bad request, got {:?}", other),
        }
    }

    #[test]
    fn empty_or_missing_body() {
        let m = model();
        assert_eq!(message(RequestValidator::verify(&m, None, Completeness::Full).unwrap_err()), "No data received from request");
        assert_eq!(
            message(RequestValidator::verify(&m, Some(json!({})), Completeness::Partial).unwrap_err()),
            "No data received from request"
        );
        assert!(RequestValidator::verify(&m, Some(json!([1])), Completeness::Full).is_err());
    }

    #[test]
    fn unknown_field() {
        let err = RequestValidator::verify(&model(), Some(json!({"email": "a@b.c", "bogus": 1})), Completeness::Full).unwrap_err();
        assert_eq!(message(err), "Unknown field [bogus]");
    }

    #[test]
    fn required_only_for_full() {
        let m = model();
        let err = RequestValidator::verify(&m, Some(json!({"plan": "free"})), Completeness::Full).unwrap_err();
        assert_eq!(message(err), "Missing field [email]");
        assert!(RequestValidator::verify(&m, Some(json!({"plan": "free"})), Completeness::Partial).is_ok());
    }

    #[test]
    fn wrong_shape() {
        let m = model();
        assert!(RequestValidator::verify(&m, Some(json!({"email": "a@b.c", "seats": "two"})), Completeness::Full).is_err());
        assert!(RequestValidator::verify(&m, Some(json!({"email": "a@b.c", "joined": "yesterday"})), Completeness::Full).is_err());
        assert!(RequestValidator::verify(&m, Some(json!({"email": null})), Completeness::Partial).is_err());
        assert!(RequestValidator::verify(&m, Some(json!({"email": "a@b.c", "joined": "2024-02-29", "plan": null})), Completeness::Full).is_ok());
    }

    #[test]
    fn rules() {
        let m = model();
        assert!(RequestValidator::verify(&m, Some(json!({"email": "nope"})), Completeness::Full).is_err());
        assert!(RequestValidator::verify(&m, Some(json!({"email": "averyveryverylong@example.com"})), Completeness::Full).is_err());
        assert!(RequestValidator::verify(&m, Some(json!({"email": "a@b.c", "plan": "gold"})), Completeness::Full).is_err());
        assert!(RequestValidator::verify(&m, Some(json!({"email": "a@b.c", "seats": 0})), Completeness::Full).is_err());
        let row = RequestValidator::verify(&m, Some(json!({"email": "a@b.c", "plan": "pro", "seats": 3})), Completeness::Full).unwrap();
        assert_eq!(row.len(), 3);
    }
}

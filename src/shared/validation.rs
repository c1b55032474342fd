//! Validation Utilities

use validator::ValidationErrors;

use super::error::{AppError, FieldError};

/// Convert validation errors to AppError
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut field_errors: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();
    field_errors.sort_by(|a, b| a.field.cmp(&b.field));

    let message = field_errors
        .first()
        .map(|e| format!("{}: {}", e.field, e.message))
        .unwrap_or_else(|| "Validation failed".into());

    AppError::Validation {
        message,
        errors: field_errors,
    }
}

/// Parse a snowflake ID supplied by a client.
pub fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    super::snowflake::from_string(raw)
        .map_err(|_| AppError::BadRequest(format!("Invalid {} ID", what)))
}

/// Parse a list of client-supplied snowflake IDs, de-duplicating them.
pub fn parse_ids(raw: &[String], what: &str) -> Result<Vec<i64>, AppError> {
    let mut ids = Vec::with_capacity(raw.len());
    for value in raw {
        let id = parse_id(value, what)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Trim a required text field; blank input is a 422 on `field`.
pub fn required_text(value: &str, field: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::invalid_field(field, "must not be blank"));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 3, message = "too short"))]
        name: String,
    }

    #[test]
    fn test_validation_error_collects_fields() {
        let errors = Sample { name: "ab".into() }.validate().unwrap_err();
        match validation_error(errors) {
            AppError::Validation { message, errors } => {
                assert_eq!(message, "name: too short");
                assert_eq!(errors.len(), 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ids_dedupes() {
        let ids = parse_ids(&["1".into(), "2".into(), "1".into()], "user").unwrap();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        assert!(matches!(parse_id("x1", "task"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_required_text_trims_and_rejects_blank() {
        assert_eq!(required_text("  Ship it ", "title").unwrap(), "Ship it");
        match required_text(" \t ", "title") {
            Err(AppError::Validation { errors, .. }) => assert_eq!(errors[0].field, "title"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

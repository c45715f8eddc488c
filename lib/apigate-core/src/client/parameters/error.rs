use serde_json::Value;

use super::{ParameterLocation, ParameterValueType};

/// A parameter failed validation, coercion or placement into a request.
#[derive(Debug, Clone, PartialEq, derive_more::Error, derive_more::Display)]
pub enum ParameterValidationError {
    /// `null` given for a parameter that does not allow it.
    #[display("Parameter '{name}' cannot be null")]
    NullNotAllowed {
        /// Parameter name.
        name: String,
    },

    /// Value does not have the declared type.
    #[display("Parameter '{name}' must be of type {expected}, got {actual}")]
    TypeMismatch {
        /// Parameter name.
        name: String,
        /// Declared type.
        expected: ParameterValueType,
        /// JSON kind of the rejected value.
        actual: &'static str,
    },

    /// Value is not one of the allowed choices.
    #[display("Parameter '{name}' must be one of {}, got {value}", Value::Array(choices.clone()))]
    NotInEnum {
        /// Parameter name.
        name: String,
        /// Rejected value.
        value: Value,
        /// Allowed values.
        choices: Vec<Value>,
    },

    /// Number is below the minimum.
    #[display("Parameter '{name}' must be >= {minimum}, got {value}")]
    BelowMinimum {
        /// Parameter name.
        name: String,
        /// Rejected value.
        value: f64,
        /// Inclusive lower bound.
        minimum: f64,
    },

    /// Number is above the maximum.
    #[display("Parameter '{name}' must be <= {maximum}, got {value}")]
    AboveMaximum {
        /// Parameter name.
        name: String,
        /// Rejected value.
        value: f64,
        /// Inclusive upper bound.
        maximum: f64,
    },

    /// String or array is shorter than allowed.
    #[display("Parameter '{name}' must have a length >= {min_length}, got {length}")]
    TooShort {
        /// Parameter name.
        name: String,
        /// Actual length.
        length: usize,
        /// Inclusive lower bound.
        min_length: usize,
    },

    /// String or array is longer than allowed.
    #[display("Parameter '{name}' must have a length <= {max_length}, got {length}")]
    TooLong {
        /// Parameter name.
        name: String,
        /// Actual length.
        length: usize,
        /// Inclusive upper bound.
        max_length: usize,
    },

    /// Collection has fewer items than allowed.
    #[display("Parameter '{name}' must have at least {min_items} items, got {count}")]
    TooFewItems {
        /// Parameter name.
        name: String,
        /// Actual item count.
        count: usize,
        /// Inclusive lower bound.
        min_items: usize,
    },

    /// Collection has more items than allowed.
    #[display("Parameter '{name}' must have at most {max_items} items, got {count}")]
    TooManyItems {
        /// Parameter name.
        name: String,
        /// Actual item count.
        count: usize,
        /// Inclusive upper bound.
        max_items: usize,
    },

    /// Empty string, array or object for a parameter that does not allow it.
    #[display("Parameter '{name}' cannot be empty")]
    EmptyNotAllowed {
        /// Parameter name.
        name: String,
    },

    /// Whitespace-only string for a parameter that does not allow it.
    #[display("Parameter '{name}' cannot be blank")]
    BlankNotAllowed {
        /// Parameter name.
        name: String,
    },

    /// String does not match the declared pattern.
    #[display("Parameter '{name}' must match pattern '{pattern}', got {value:?}")]
    PatternMismatch {
        /// Parameter name.
        name: String,
        /// Rejected value.
        value: String,
        /// Declared pattern.
        pattern: String,
    },

    /// The declared pattern is not a valid regular expression.
    #[display("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Declared pattern.
        pattern: String,
        /// Compilation error.
        reason: String,
    },

    /// Inconsistent constraint bounds.
    #[display("Invalid constraint: {reason}")]
    InvalidConstraint {
        /// Description of the problem.
        reason: String,
    },

    /// Raw value cannot be converted to the declared type.
    #[display("Parameter '{name}' cannot be coerced to {target}: {value}")]
    Coercion {
        /// Parameter name.
        name: String,
        /// Declared type.
        target: ParameterValueType,
        /// Offending value.
        value: Value,
    },

    /// A required parameter is missing.
    #[display("Missing required parameter '{name}'")]
    MissingRequired {
        /// Parameter name.
        name: String,
    },

    /// A parameter that the endpoint does not declare.
    #[display("Unexpected parameter '{name}'")]
    Unexpected {
        /// Parameter name.
        name: String,
    },

    /// A path parameter declared as optional.
    #[display("Path parameter '{name}' must be required")]
    PathNotRequired {
        /// Parameter name.
        name: String,
    },

    /// Two parameters share a name.
    #[display("Duplicate parameter '{name}'")]
    DuplicateParameter {
        /// Parameter name.
        name: String,
    },

    /// Value has no textual form for its location.
    #[display("Parameter '{name}' cannot be rendered in the {location}: {value}")]
    UnsupportedValue {
        /// Parameter name.
        name: String,
        /// Target location.
        location: ParameterLocation,
        /// Offending value.
        value: Value,
    },

    /// The current body is not a JSON object.
    #[display("Request body is not a JSON object: {reason}")]
    BodyNotJson {
        /// Parse error or actual kind.
        reason: String,
    },

    /// The current body is not form-encoded.
    #[display("Request body is not form-encoded: {reason}")]
    BodyNotForm {
        /// Parse error.
        reason: String,
    },

    /// Header name or value is invalid.
    #[display("Invalid header '{name}': {reason}")]
    InvalidHeader {
        /// Header name.
        name: String,
        /// Description of the problem.
        reason: String,
    },

    /// Path template still contains placeholders.
    #[display("Path '{path}' is missing required arguments: {missings:?}")]
    PathUnresolved {
        /// The path template.
        path: String,
        /// Unresolved placeholder names.
        missings: Vec<String>,
    },

    /// No applier is registered for the location.
    #[display("No applier registered for {location} parameters")]
    NoApplier {
        /// The location without an applier.
        location: ParameterLocation,
    },

    /// The resolved URL is invalid.
    #[display("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Parse error.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn should_display_validation_errors() {
        let error = ParameterValidationError::Coercion {
            name: "age".to_string(),
            target: ParameterValueType::Integer,
            value: json!("abc"),
        };
        insta::assert_snapshot!(error.to_string(), @r#"Parameter 'age' cannot be coerced to integer: "abc""#);

        let error = ParameterValidationError::NotInEnum {
            name: "status".to_string(),
            value: json!("deleted"),
            choices: vec![json!("active"), json!("inactive")],
        };
        insta::assert_snapshot!(error.to_string(), @r#"Parameter 'status' must be one of ["active","inactive"], got "deleted""#);

        let error = ParameterValidationError::NoApplier {
            location: ParameterLocation::Multipart,
        };
        insta::assert_snapshot!(error.to_string(), @"No applier registered for multipart parameters");
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ParameterValidationError;
use crate::client::strategy::{CoercionError, CoercionStrategy, SimpleCoercion};

/// Declared type of a parameter value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum ParameterValueType {
    /// An object, an array, or a string holding JSON text.
    #[display("json")]
    Json,
    /// A string.
    #[display("string")]
    String,
    /// An integer.
    #[display("integer")]
    Integer,
    /// Any number.
    #[display("float")]
    Float,
    /// A boolean.
    #[display("boolean")]
    Boolean,
    /// An array.
    #[display("array")]
    Array,
    /// An object.
    #[display("object")]
    Object,
    /// Only `null`.
    #[display("none")]
    None,
}

impl ParameterValueType {
    /// `true` when `value` already has this type.
    ///
    /// For [`Json`](Self::Json) a string is accepted when it parses as JSON.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Json => match value {
                Value::Object(_) | Value::Array(_) => true,
                Value::String(text) => serde_json::from_str::<Value>(text).is_ok(),
                _ => false,
            },
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::None => value.is_null(),
        }
    }

    /// Converts `raw` to this type.
    ///
    /// # Errors
    ///
    /// Returns a [`CoercionError`] when no conversion exists.
    pub fn coerce(self, raw: &Value) -> Result<Value, CoercionError> {
        SimpleCoercion::new(self).coerce(raw)
    }
}

/// Part of the request a parameter is written to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// URL query string.
    #[display("query")]
    Query,
    /// Request header.
    #[display("header")]
    Header,
    /// URL path.
    #[display("path")]
    Path,
    /// JSON body.
    #[display("body")]
    Body,
    /// Form-encoded body.
    #[display("form")]
    Form,
    /// Multipart body.
    #[display("multipart")]
    Multipart,
}

/// Name of the JSON kind of `value`, for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Renders a value for a query, header or path slot.
///
/// Arrays of scalars are joined with commas; objects and nested arrays have no textual form.
pub(crate) fn to_param_string(
    name: &str,
    location: ParameterLocation,
    value: &Value,
) -> Result<String, ParameterValidationError> {
    let scalar = |value: &Value| match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    };

    let rendered = match value {
        Value::Array(items) => items
            .iter()
            .map(scalar)
            .collect::<Option<Vec<_>>>()
            .map(|items| items.join(",")),
        other => scalar(other),
    };

    rendered.ok_or_else(|| ParameterValidationError::UnsupportedValue {
        name: name.to_string(),
        location,
        value: value.clone(),
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case::json_object(ParameterValueType::Json, json!({"a": 1}), true)]
    #[case::json_text(ParameterValueType::Json, json!("[1, 2]"), true)]
    #[case::json_bad_text(ParameterValueType::Json, json!("{nope"), false)]
    #[case::json_number(ParameterValueType::Json, json!(1), false)]
    #[case::integer(ParameterValueType::Integer, json!(1), true)]
    #[case::integer_float(ParameterValueType::Integer, json!(1.5), false)]
    #[case::float_integer(ParameterValueType::Float, json!(1), true)]
    #[case::string(ParameterValueType::String, json!("x"), true)]
    #[case::boolean(ParameterValueType::Boolean, json!("true"), false)]
    #[case::none(ParameterValueType::None, Value::Null, true)]
    fn should_match_value_type(
        #[case] value_type: ParameterValueType,
        #[case] value: Value,
        #[case] expected: bool,
    ) {
        assert_eq!(value_type.matches(&value), expected);
    }

    #[rstest]
    #[case::string(json!("a b"), "a b")]
    #[case::number(json!(42), "42")]
    #[case::boolean(json!(true), "true")]
    #[case::null(Value::Null, "")]
    #[case::array(json!(["a", 1, false]), "a,1,false")]
    fn should_render_param_string(#[case] value: Value, #[case] expected: &str) {
        let rendered = to_param_string("p", ParameterLocation::Query, &value).expect("renderable");
        assert_eq!(rendered, expected);
    }

    #[test]
    fn should_reject_objects_in_param_string() {
        let result = to_param_string("filter", ParameterLocation::Query, &json!({"a": 1}));

        let error = result.expect_err("objects have no textual form");
        insta::assert_snapshot!(error.to_string(), @r#"Parameter 'filter' cannot be rendered in the query: {"a":1}"#);
    }
}

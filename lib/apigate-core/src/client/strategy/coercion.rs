use std::fmt::Debug;

use serde_json::{Number, Value};

use crate::client::parameters::ParameterValueType;

/// A raw value that could not be converted to the requested type.
#[derive(Debug, Clone, PartialEq, derive_more::Error, derive_more::Display)]
#[display("Cannot coerce {value} to {target}")]
pub struct CoercionError {
    /// Requested type.
    pub target: ParameterValueType,
    /// Offending value.
    pub value: Value,
}

/// Converts a raw JSON value into the shape a parameter declares.
pub trait CoercionStrategy: Debug + Send + Sync {
    /// Converts `raw`.
    ///
    /// # Errors
    ///
    /// Returns a [`CoercionError`] naming the target type and the offending value.
    fn coerce(&self, raw: &Value) -> Result<Value, CoercionError>;
}

/// Scalar conversions: string to number or boolean, number to string, and so on.
///
/// `null` passes through unchanged so that nullability stays the business of the rule chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleCoercion {
    target: ParameterValueType,
}

impl SimpleCoercion {
    /// Creates a coercion towards `target`.
    pub fn new(target: ParameterValueType) -> Self {
        Self { target }
    }

    fn fail(&self, raw: &Value) -> CoercionError {
        CoercionError {
            target: self.target,
            value: raw.clone(),
        }
    }

    fn to_integer(&self, raw: &Value) -> Result<Value, CoercionError> {
        match raw {
            Value::Number(number) if number.is_i64() || number.is_u64() => Ok(raw.clone()),
            Value::Number(number) => number
                .as_f64()
                .filter(|float| float.fract() == 0.0)
                .and_then(float_to_integer)
                .ok_or_else(|| self.fail(raw)),
            Value::String(text) => {
                let text = text.trim();
                text.parse::<i64>()
                    .map(Value::from)
                    .or_else(|_| text.parse::<u64>().map(Value::from))
                    .map_err(|_| self.fail(raw))
            }
            _ => Err(self.fail(raw)),
        }
    }

    fn to_float(&self, raw: &Value) -> Result<Value, CoercionError> {
        let float = match raw {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        float
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| self.fail(raw))
    }

    fn to_boolean(&self, raw: &Value) -> Result<Value, CoercionError> {
        match raw {
            Value::Bool(_) => Ok(raw.clone()),
            Value::Number(number) => match number.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(self.fail(raw)),
            },
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(self.fail(raw)),
            },
            _ => Err(self.fail(raw)),
        }
    }

    fn to_container(&self, raw: &Value, is_target: fn(&Value) -> bool) -> Result<Value, CoercionError> {
        if is_target(raw) {
            return Ok(raw.clone());
        }
        match raw {
            Value::String(text) => serde_json::from_str::<Value>(text)
                .ok()
                .filter(is_target)
                .ok_or_else(|| self.fail(raw)),
            _ => Err(self.fail(raw)),
        }
    }
}

fn float_to_integer(float: f64) -> Option<Value> {
    // `as` saturates, so only values that survive the round trip are exact
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let integer = float as i64;
    #[allow(clippy::cast_precision_loss)]
    let exact = (integer as f64 - float).abs() < f64::EPSILON;
    exact.then_some(Value::from(integer))
}

impl CoercionStrategy for SimpleCoercion {
    fn coerce(&self, raw: &Value) -> Result<Value, CoercionError> {
        if raw.is_null() {
            return Ok(Value::Null);
        }

        match self.target {
            ParameterValueType::Json => JsonCoercion.coerce(raw),
            ParameterValueType::String => Ok(match raw {
                Value::String(_) => raw.clone(),
                other => Value::String(other.to_string()),
            }),
            ParameterValueType::Integer => self.to_integer(raw),
            ParameterValueType::Float => self.to_float(raw),
            ParameterValueType::Boolean => self.to_boolean(raw),
            ParameterValueType::Array => self.to_container(raw, Value::is_array),
            ParameterValueType::Object => self.to_container(raw, Value::is_object),
            ParameterValueType::None => Err(self.fail(raw)),
        }
    }
}

/// Accepts objects and arrays as-is and parses strings that hold JSON text.
///
/// A string that does not look like a JSON document stays a plain string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCoercion;

impl CoercionStrategy for JsonCoercion {
    fn coerce(&self, raw: &Value) -> Result<Value, CoercionError> {
        match raw {
            Value::Null | Value::Object(_) | Value::Array(_) => Ok(raw.clone()),
            Value::String(text) => {
                let trimmed = text.trim();
                let looks_like_document = (trimmed.starts_with('{') && trimmed.ends_with('}'))
                    || (trimmed.starts_with('[') && trimmed.ends_with(']'));
                if !looks_like_document {
                    return Ok(raw.clone());
                }
                serde_json::from_str(trimmed).map_err(|_| CoercionError {
                    target: ParameterValueType::Json,
                    value: raw.clone(),
                })
            }
            Value::Bool(_) | Value::Number(_) => Err(CoercionError {
                target: ParameterValueType::Json,
                value: raw.clone(),
            }),
        }
    }
}

use std::fmt::Debug;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use super::value_type::json_kind;
use super::{ParameterValidationError, ParameterValueType};

/// One check of a [`ParameterConstraint`](super::ParameterConstraint).
///
/// Apart from [`NullRule`], rules let `null` through: nullability is decided once, first.
pub trait Rule: Debug + Send + Sync {
    /// Checks `value` for the parameter `name`.
    ///
    /// # Errors
    ///
    /// Returns the violation.
    fn validate(&self, name: &str, value: &Value) -> Result<(), ParameterValidationError>;
}

/// Rejects `null` unless allowed.
#[derive(Debug, Clone, Copy)]
pub struct NullRule {
    pub(crate) allow_null: bool,
}

impl Rule for NullRule {
    fn validate(&self, name: &str, value: &Value) -> Result<(), ParameterValidationError> {
        if value.is_null() && !self.allow_null {
            return Err(ParameterValidationError::NullNotAllowed {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// Checks the declared type.
#[derive(Debug, Clone, Copy)]
pub struct TypeRule {
    pub(crate) value_type: ParameterValueType,
}

impl Rule for TypeRule {
    fn validate(&self, name: &str, value: &Value) -> Result<(), ParameterValidationError> {
        if value.is_null() || self.value_type.matches(value) {
            return Ok(());
        }
        Err(ParameterValidationError::TypeMismatch {
            name: name.to_string(),
            expected: self.value_type,
            actual: json_kind(value),
        })
    }
}

/// Checks membership in a fixed set of values.
#[derive(Debug, Clone)]
pub struct EnumRule {
    pub(crate) choices: Vec<Value>,
}

impl Rule for EnumRule {
    fn validate(&self, name: &str, value: &Value) -> Result<(), ParameterValidationError> {
        if value.is_null() || self.choices.contains(value) {
            return Ok(());
        }
        Err(ParameterValidationError::NotInEnum {
            name: name.to_string(),
            value: value.clone(),
            choices: self.choices.clone(),
        })
    }
}

/// Inclusive numeric bounds.
#[derive(Debug, Clone, Copy)]
pub struct RangeRule {
    pub(crate) minimum: Option<f64>,
    pub(crate) maximum: Option<f64>,
}

impl Rule for RangeRule {
    fn validate(&self, name: &str, value: &Value) -> Result<(), ParameterValidationError> {
        let Some(number) = value.as_f64() else {
            return Ok(());
        };
        if let Some(minimum) = self.minimum.filter(|&minimum| number < minimum) {
            return Err(ParameterValidationError::BelowMinimum {
                name: name.to_string(),
                value: number,
                minimum,
            });
        }
        if let Some(maximum) = self.maximum.filter(|&maximum| number > maximum) {
            return Err(ParameterValidationError::AboveMaximum {
                name: name.to_string(),
                value: number,
                maximum,
            });
        }
        Ok(())
    }
}

/// Inclusive length bounds on strings (in characters) and arrays.
#[derive(Debug, Clone, Copy)]
pub struct LengthRule {
    pub(crate) min_length: Option<usize>,
    pub(crate) max_length: Option<usize>,
}

impl Rule for LengthRule {
    fn validate(&self, name: &str, value: &Value) -> Result<(), ParameterValidationError> {
        let length = match value {
            Value::String(text) => text.chars().count(),
            Value::Array(items) => items.len(),
            _ => return Ok(()),
        };
        if let Some(min_length) = self.min_length.filter(|&min| length < min) {
            return Err(ParameterValidationError::TooShort {
                name: name.to_string(),
                length,
                min_length,
            });
        }
        if let Some(max_length) = self.max_length.filter(|&max| length > max) {
            return Err(ParameterValidationError::TooLong {
                name: name.to_string(),
                length,
                max_length,
            });
        }
        Ok(())
    }
}

/// Inclusive item-count bounds on arrays and objects.
#[derive(Debug, Clone, Copy)]
pub struct ItemsRule {
    pub(crate) min_items: Option<usize>,
    pub(crate) max_items: Option<usize>,
}

impl Rule for ItemsRule {
    fn validate(&self, name: &str, value: &Value) -> Result<(), ParameterValidationError> {
        let count = match value {
            Value::Array(items) => items.len(),
            Value::Object(entries) => entries.len(),
            _ => return Ok(()),
        };
        if let Some(min_items) = self.min_items.filter(|&min| count < min) {
            return Err(ParameterValidationError::TooFewItems {
                name: name.to_string(),
                count,
                min_items,
            });
        }
        if let Some(max_items) = self.max_items.filter(|&max| count > max) {
            return Err(ParameterValidationError::TooManyItems {
                name: name.to_string(),
                count,
                max_items,
            });
        }
        Ok(())
    }
}

/// Rejects `""`, `[]` and `{}` unless allowed; numbers and booleans are never empty.
#[derive(Debug, Clone, Copy)]
pub struct EmptyRule {
    pub(crate) allow_empty: bool,
}

impl Rule for EmptyRule {
    fn validate(&self, name: &str, value: &Value) -> Result<(), ParameterValidationError> {
        let is_empty = match value {
            Value::String(text) => text.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(entries) => entries.is_empty(),
            Value::Null | Value::Bool(_) | Value::Number(_) => false,
        };
        if is_empty && !self.allow_empty {
            return Err(ParameterValidationError::EmptyNotAllowed {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// Rejects non-empty whitespace-only strings unless allowed.
#[derive(Debug, Clone, Copy)]
pub struct BlankRule {
    pub(crate) allow_blank: bool,
}

impl Rule for BlankRule {
    fn validate(&self, name: &str, value: &Value) -> Result<(), ParameterValidationError> {
        let is_blank = value
            .as_str()
            .is_some_and(|text| !text.is_empty() && text.trim().is_empty());
        if is_blank && !self.allow_blank {
            return Err(ParameterValidationError::BlankNotAllowed {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// Matches strings against a pattern anchored at the start.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub(crate) pattern: String,
    pub(crate) regex: Regex,
}

impl PatternRule {
    /// Compiles `pattern`, anchored at the start of the value.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterValidationError::InvalidPattern`] when `pattern` does not compile.
    pub fn new(pattern: &str) -> Result<Self, ParameterValidationError> {
        let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|err| {
            ParameterValidationError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: err.to_string(),
            }
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }
}

impl Rule for PatternRule {
    fn validate(&self, name: &str, value: &Value) -> Result<(), ParameterValidationError> {
        match value.as_str() {
            Some(text) if !self.regex.is_match(text) => {
                Err(ParameterValidationError::PatternMismatch {
                    name: name.to_string(),
                    value: text.to_string(),
                    pattern: self.pattern.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Logs the use of a deprecated parameter; never fails.
#[derive(Debug, Clone)]
pub struct DeprecatedRule {
    pub(crate) description: Option<String>,
}

impl Rule for DeprecatedRule {
    fn validate(&self, name: &str, value: &Value) -> Result<(), ParameterValidationError> {
        if !value.is_null() {
            match &self.description {
                Some(description) => warn!(parameter = name, "deprecated parameter: {description}"),
                None => warn!(parameter = name, "deprecated parameter"),
            }
        }
        Ok(())
    }
}

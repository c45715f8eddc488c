use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::ParameterValidationError;
use super::ParameterValueType;
use super::rules::{
    BlankRule, DeprecatedRule, EmptyRule, EnumRule, ItemsRule, LengthRule, NullRule, PatternRule,
    RangeRule, Rule, TypeRule,
};

/// Declarative validation and coercion rules bound to a parameter.
///
/// The rule chain is built once, at construction, in this order: null, type, enum,
/// range, length, items, empty, blank, pattern, deprecation.
///
/// ```rust
/// use apigate_core::{ParameterConstraint, ParameterValueType};
/// use serde_json::json;
///
/// let age = ParameterConstraint::builder(ParameterValueType::Integer)
///     .minimum(0.0)
///     .maximum(150.0)
///     .build()?;
///
/// assert_eq!(age.coerce("age", &json!("42"))?, json!(42));
/// assert!(age.coerce("age", &json!("abc")).is_err());
/// # Ok::<(), apigate_core::ParameterValidationError>(())
/// ```
#[derive(Clone)]
pub struct ParameterConstraint {
    value_type: ParameterValueType,
    choices: Option<Vec<Value>>,
    default: Option<Value>,
    example: Option<Value>,
    description: Option<String>,
    deprecated: bool,
    deprecated_description: Option<String>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min_items: Option<usize>,
    max_items: Option<usize>,
    allow_null: bool,
    allow_empty: bool,
    allow_blank: bool,
    pattern: Option<String>,
    rules: Vec<Arc<dyn Rule>>,
}

impl ParameterConstraint {
    /// A constraint that only checks the type and rejects `null`.
    pub fn new(value_type: ParameterValueType) -> Self {
        let mut constraint = Self::unchecked(value_type);
        constraint.rules = constraint.base_rules();
        constraint
    }

    /// Starts a builder.
    pub fn builder(value_type: ParameterValueType) -> ParameterConstraintBuilder {
        ParameterConstraintBuilder {
            constraint: Self::unchecked(value_type),
        }
    }

    fn unchecked(value_type: ParameterValueType) -> Self {
        Self {
            value_type,
            choices: None,
            default: None,
            example: None,
            description: None,
            deprecated: false,
            deprecated_description: None,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
            min_items: None,
            max_items: None,
            allow_null: false,
            allow_empty: true,
            allow_blank: true,
            pattern: None,
            rules: Vec::new(),
        }
    }

    fn base_rules(&self) -> Vec<Arc<dyn Rule>> {
        vec![
            Arc::new(NullRule {
                allow_null: self.allow_null,
            }),
            Arc::new(TypeRule {
                value_type: self.value_type,
            }),
        ]
    }

    fn build_rules(&self) -> Result<Vec<Arc<dyn Rule>>, ParameterValidationError> {
        let mut rules = self.base_rules();

        if let Some(choices) = &self.choices {
            rules.push(Arc::new(EnumRule {
                choices: choices.clone(),
            }));
        }
        if self.minimum.is_some() || self.maximum.is_some() {
            rules.push(Arc::new(RangeRule {
                minimum: self.minimum,
                maximum: self.maximum,
            }));
        }
        if self.min_length.is_some() || self.max_length.is_some() {
            rules.push(Arc::new(LengthRule {
                min_length: self.min_length,
                max_length: self.max_length,
            }));
        }
        if self.min_items.is_some() || self.max_items.is_some() {
            rules.push(Arc::new(ItemsRule {
                min_items: self.min_items,
                max_items: self.max_items,
            }));
        }
        rules.push(Arc::new(EmptyRule {
            allow_empty: self.allow_empty,
        }));
        rules.push(Arc::new(BlankRule {
            allow_blank: self.allow_blank,
        }));
        if let Some(pattern) = &self.pattern {
            rules.push(Arc::new(PatternRule::new(pattern)?));
        }
        if self.deprecated {
            rules.push(Arc::new(DeprecatedRule {
                description: self.deprecated_description.clone(),
            }));
        }

        Ok(rules)
    }

    /// Runs the rule chain, stopping at the first violation.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self, name: &str, value: &Value) -> Result<(), ParameterValidationError> {
        if value.is_null() && self.allow_null {
            return Ok(());
        }
        self.rules
            .iter()
            .try_for_each(|rule| rule.validate(name, value))
    }

    /// Runs every rule and collects all violations.
    pub fn validate_all(&self, name: &str, value: &Value) -> Vec<ParameterValidationError> {
        if value.is_null() && self.allow_null {
            return Vec::new();
        }
        self.rules
            .iter()
            .filter_map(|rule| rule.validate(name, value).err())
            .collect()
    }

    /// Converts `raw` to the declared type, then validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterValidationError::Coercion`] when no conversion exists,
    /// or the first rule the converted value violates.
    pub fn coerce(&self, name: &str, raw: &Value) -> Result<Value, ParameterValidationError> {
        let value = self.value_type.coerce(raw).map_err(|err| {
            ParameterValidationError::Coercion {
                name: name.to_string(),
                target: err.target,
                value: err.value,
            }
        })?;
        self.validate(name, &value)?;
        Ok(value)
    }

    /// Declared type.
    pub fn value_type(&self) -> ParameterValueType {
        self.value_type
    }

    /// Allowed values, if restricted.
    pub fn choices(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    /// Value used when the parameter is absent.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Documentation example.
    pub fn example(&self) -> Option<&Value> {
        self.example.as_ref()
    }

    /// Description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// `true` when use of the parameter is logged as deprecated.
    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    /// `true` when `null` is accepted.
    pub fn allows_null(&self) -> bool {
        self.allow_null
    }

    /// Number of rules in the chain.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl fmt::Debug for ParameterConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterConstraint")
            .field("value_type", &self.value_type)
            .field("choices", &self.choices)
            .field("minimum", &self.minimum)
            .field("maximum", &self.maximum)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("min_items", &self.min_items)
            .field("max_items", &self.max_items)
            .field("allow_null", &self.allow_null)
            .field("allow_empty", &self.allow_empty)
            .field("allow_blank", &self.allow_blank)
            .field("pattern", &self.pattern)
            .field("deprecated", &self.deprecated)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ParameterConstraint`].
#[derive(Debug, Clone)]
pub struct ParameterConstraintBuilder {
    constraint: ParameterConstraint,
}

impl ParameterConstraintBuilder {
    /// Restricts the value to `choices`.
    #[must_use]
    pub fn choices<I: IntoIterator<Item = Value>>(mut self, choices: I) -> Self {
        self.constraint.choices = Some(choices.into_iter().collect());
        self
    }

    /// Value used when the parameter is absent.
    #[must_use]
    pub fn default_value(mut self, default: Value) -> Self {
        self.constraint.default = Some(default);
        self
    }

    /// Documentation example.
    #[must_use]
    pub fn example(mut self, example: Value) -> Self {
        self.constraint.example = Some(example);
        self
    }

    /// Description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.constraint.description = Some(description.into());
        self
    }

    /// Logs a warning whenever a value is given.
    #[must_use]
    pub fn deprecated(mut self, description: Option<String>) -> Self {
        self.constraint.deprecated = true;
        self.constraint.deprecated_description = description;
        self
    }

    /// Inclusive lower bound for numbers.
    #[must_use]
    pub fn minimum(mut self, minimum: f64) -> Self {
        self.constraint.minimum = Some(minimum);
        self
    }

    /// Inclusive upper bound for numbers.
    #[must_use]
    pub fn maximum(mut self, maximum: f64) -> Self {
        self.constraint.maximum = Some(maximum);
        self
    }

    /// Inclusive lower bound on string or array length.
    #[must_use]
    pub fn min_length(mut self, min_length: usize) -> Self {
        self.constraint.min_length = Some(min_length);
        self
    }

    /// Inclusive upper bound on string or array length.
    #[must_use]
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.constraint.max_length = Some(max_length);
        self
    }

    /// Inclusive lower bound on collection items.
    #[must_use]
    pub fn min_items(mut self, min_items: usize) -> Self {
        self.constraint.min_items = Some(min_items);
        self
    }

    /// Inclusive upper bound on collection items.
    #[must_use]
    pub fn max_items(mut self, max_items: usize) -> Self {
        self.constraint.max_items = Some(max_items);
        self
    }

    /// Accepts `null` (default: rejected).
    #[must_use]
    pub fn allow_null(mut self, allow: bool) -> Self {
        self.constraint.allow_null = allow;
        self
    }

    /// Accepts empty strings and collections (default: accepted).
    #[must_use]
    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.constraint.allow_empty = allow;
        self
    }

    /// Accepts whitespace-only strings (default: accepted).
    #[must_use]
    pub fn allow_blank(mut self, allow: bool) -> Self {
        self.constraint.allow_blank = allow;
        self
    }

    /// Regular expression a string must match from its start.
    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.constraint.pattern = Some(pattern.into());
        self
    }

    /// Builds the rule chain.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterValidationError::InvalidPattern`] for a pattern that does not compile
    /// and [`ParameterValidationError::InvalidConstraint`] for inverted bounds.
    pub fn build(self) -> Result<ParameterConstraint, ParameterValidationError> {
        let mut constraint = self.constraint;

        check_bounds("minimum/maximum", constraint.minimum, constraint.maximum)?;
        check_bounds("min_length/max_length", constraint.min_length, constraint.max_length)?;
        check_bounds("min_items/max_items", constraint.min_items, constraint.max_items)?;

        constraint.rules = constraint.build_rules()?;
        Ok(constraint)
    }
}

fn check_bounds<T: PartialOrd + fmt::Display>(
    label: &str,
    lower: Option<T>,
    upper: Option<T>,
) -> Result<(), ParameterValidationError> {
    match (lower, upper) {
        (Some(lower), Some(upper)) if lower > upper => {
            Err(ParameterValidationError::InvalidConstraint {
                reason: format!("{label} bounds are inverted: {lower} > {upper}"),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn age() -> ParameterConstraint {
        ParameterConstraint::builder(ParameterValueType::Integer)
            .minimum(0.0)
            .maximum(150.0)
            .build()
            .expect("valid constraint")
    }

    #[test]
    fn should_coerce_integer_from_string() {
        let value = age().coerce("age", &json!("42")).expect("coercible");

        assert_eq!(value, json!(42));
        assert!(value.is_i64());
    }

    #[test]
    fn should_report_failed_coercion() {
        let error = age().coerce("age", &json!("abc")).expect_err("not a number");

        assert_eq!(
            error,
            ParameterValidationError::Coercion {
                name: "age".to_string(),
                target: ParameterValueType::Integer,
                value: json!("abc"),
            }
        );
    }

    #[test]
    fn should_validate_after_coercion() {
        let error = age().coerce("age", &json!("200")).expect_err("out of range");

        insta::assert_snapshot!(error.to_string(), @"Parameter 'age' must be <= 150, got 200");
    }

    #[test]
    fn should_build_rules_in_order() {
        let constraint = ParameterConstraint::builder(ParameterValueType::String)
            .choices([json!("a"), json!("bb")])
            .min_length(1)
            .allow_empty(false)
            .pattern("[a-z]+")
            .deprecated(None)
            .build()
            .expect("valid constraint");

        // null, type, enum, length, empty, blank, pattern, deprecated
        assert_eq!(constraint.rule_count(), 8);
        assert_eq!(ParameterConstraint::new(ParameterValueType::String).rule_count(), 2);
    }

    #[test]
    fn should_collect_every_violation() {
        let constraint = ParameterConstraint::builder(ParameterValueType::String)
            .choices([json!("alpha")])
            .max_length(3)
            .pattern("[0-9]+")
            .build()
            .expect("valid constraint");

        let errors = constraint.validate_all("code", &json!("beta"));

        assert_eq!(errors.len(), 3);
        assert!(matches!(errors.first(), Some(ParameterValidationError::NotInEnum { .. })));
        assert!(matches!(errors.get(1), Some(ParameterValidationError::TooLong { .. })));
        assert!(matches!(errors.get(2), Some(ParameterValidationError::PatternMismatch { .. })));

        let first = constraint.validate("code", &json!("beta")).expect_err("fail fast");
        assert!(matches!(first, ParameterValidationError::NotInEnum { .. }));
    }

    #[test]
    fn should_skip_rules_for_allowed_null() {
        let constraint = ParameterConstraint::builder(ParameterValueType::String)
            .allow_null(true)
            .allow_empty(false)
            .min_length(2)
            .build()
            .expect("valid constraint");

        assert!(constraint.validate("p", &Value::Null).is_ok());
        assert!(ParameterConstraint::new(ParameterValueType::String)
            .validate("p", &Value::Null)
            .is_err());
    }

    #[test]
    fn should_accept_json_text_for_json_type() {
        let constraint = ParameterConstraint::new(ParameterValueType::Json);

        assert_eq!(
            constraint.coerce("filter", &json!(r#"{"a":1}"#)).expect("json text"),
            json!({"a": 1})
        );
        assert!(constraint.validate("filter", &json!([1, 2])).is_ok());
        assert!(constraint.validate("filter", &json!(12)).is_err());
    }

    #[test]
    fn should_reject_inverted_bounds() {
        let result = ParameterConstraint::builder(ParameterValueType::String)
            .min_length(5)
            .max_length(2)
            .build();

        let error = result.expect_err("inverted");
        insta::assert_snapshot!(error.to_string(), @"Invalid constraint: min_length/max_length bounds are inverted: 5 > 2");
    }
}

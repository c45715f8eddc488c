use serde_json::Value;

use super::{ParameterConstraint, ParameterLocation, ParameterValidationError};

/// A named parameter of an endpoint: where it goes and how it is checked.
///
/// Frozen once built. A path parameter is always required.
#[derive(Debug, Clone)]
pub struct ParameterDefinition {
    name: String,
    location: ParameterLocation,
    required: bool,
    description: Option<String>,
    constraint: ParameterConstraint,
}

impl ParameterDefinition {
    /// Starts a builder.
    pub fn builder(
        name: impl Into<String>,
        location: ParameterLocation,
        constraint: ParameterConstraint,
    ) -> ParameterDefinitionBuilder {
        ParameterDefinitionBuilder {
            name: name.into(),
            location,
            required: location == ParameterLocation::Path,
            description: None,
            constraint,
        }
    }

    /// An optional query parameter.
    pub fn query(name: impl Into<String>, constraint: ParameterConstraint) -> Self {
        Self::unchecked(name.into(), ParameterLocation::Query, false, constraint)
    }

    /// An optional header parameter.
    pub fn header(name: impl Into<String>, constraint: ParameterConstraint) -> Self {
        Self::unchecked(name.into(), ParameterLocation::Header, false, constraint)
    }

    /// A (required) path parameter.
    pub fn path(name: impl Into<String>, constraint: ParameterConstraint) -> Self {
        Self::unchecked(name.into(), ParameterLocation::Path, true, constraint)
    }

    /// An optional JSON body field.
    pub fn body(name: impl Into<String>, constraint: ParameterConstraint) -> Self {
        Self::unchecked(name.into(), ParameterLocation::Body, false, constraint)
    }

    /// An optional form field.
    pub fn form(name: impl Into<String>, constraint: ParameterConstraint) -> Self {
        Self::unchecked(name.into(), ParameterLocation::Form, false, constraint)
    }

    fn unchecked(
        name: String,
        location: ParameterLocation,
        required: bool,
        constraint: ParameterConstraint,
    ) -> Self {
        Self {
            name,
            location,
            required,
            description: None,
            constraint,
        }
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target location.
    pub fn location(&self) -> ParameterLocation {
        self.location
    }

    /// `true` when the parameter must be supplied.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The constraint.
    pub fn constraint(&self) -> &ParameterConstraint {
        &self.constraint
    }

    /// Validates `value` against the constraint.
    ///
    /// # Errors
    ///
    /// Returns the first violation.
    pub fn validate(&self, value: &Value) -> Result<(), ParameterValidationError> {
        self.constraint.validate(&self.name, value)
    }

    /// Coerces and validates `raw`.
    ///
    /// # Errors
    ///
    /// Returns the coercion or validation error.
    pub fn coerce(&self, raw: &Value) -> Result<Value, ParameterValidationError> {
        self.constraint.coerce(&self.name, raw)
    }
}

/// Builder for [`ParameterDefinition`].
#[derive(Debug, Clone)]
pub struct ParameterDefinitionBuilder {
    name: String,
    location: ParameterLocation,
    required: bool,
    description: Option<String>,
    constraint: ParameterConstraint,
}

impl ParameterDefinitionBuilder {
    /// Marks the parameter as required or optional.
    ///
    /// A constraint default satisfies a required parameter the caller leaves out.
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Freezes the definition.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterValidationError::PathNotRequired`] for an optional path parameter.
    pub fn build(self) -> Result<ParameterDefinition, ParameterValidationError> {
        if self.location == ParameterLocation::Path && !self.required {
            return Err(ParameterValidationError::PathNotRequired { name: self.name });
        }
        Ok(ParameterDefinition {
            name: self.name,
            location: self.location,
            required: self.required,
            description: self.description,
            constraint: self.constraint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::parameters::ParameterValueType;

    #[test]
    fn should_reject_optional_path_parameter() {
        let result = ParameterDefinition::builder(
            "id",
            ParameterLocation::Path,
            ParameterConstraint::new(ParameterValueType::Integer),
        )
        .required(false)
        .build();

        let error = result.expect_err("optional path");
        insta::assert_snapshot!(error.to_string(), @"Path parameter 'id' must be required");
    }

    #[test]
    fn should_default_path_parameters_to_required() {
        let definition = ParameterDefinition::builder(
            "id",
            ParameterLocation::Path,
            ParameterConstraint::new(ParameterValueType::Integer),
        )
        .description("user id")
        .build()
        .expect("required path");

        assert!(definition.is_required());
        assert_eq!(definition.description(), Some("user id"));
        assert!(ParameterDefinition::path("id", ParameterConstraint::new(ParameterValueType::String)).is_required());
        assert!(!ParameterDefinition::query("q", ParameterConstraint::new(ParameterValueType::String)).is_required());
    }
}

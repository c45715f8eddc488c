//! Typed request parameters: definitions, validation rules and placement into requests.

mod error;
pub use self::error::ParameterValidationError;

mod value_type;
pub use self::value_type::{ParameterLocation, ParameterValueType};

mod rules;
pub use self::rules::{
    BlankRule, DeprecatedRule, EmptyRule, EnumRule, ItemsRule, LengthRule, NullRule, PatternRule,
    RangeRule, Rule, TypeRule,
};

mod constraint;
pub use self::constraint::{ParameterConstraint, ParameterConstraintBuilder};

mod definition;
pub use self::definition::{ParameterDefinition, ParameterDefinitionBuilder};

mod draft;
pub use self::draft::RequestDraft;

mod applier;
pub(crate) use self::applier::set_json_body_field;
pub use self::applier::{
    ApplierRegistry, BodyApplier, FormApplier, HeaderApplier, ParameterApplier, PathApplier,
    QueryApplier,
};

use std::fmt::Debug;
use std::sync::Arc;

use headers::{ContentType, HeaderMapExt};
use http::{HeaderName, HeaderValue};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::draft::encode_path_segment;
use super::value_type::to_param_string;
use super::{ParameterDefinition, ParameterLocation, ParameterValidationError, RequestDraft};

/// Writes a validated parameter value into one part of a [`RequestDraft`].
pub trait ParameterApplier: Debug + Send + Sync {
    /// Applies `value` for `definition`.
    ///
    /// # Errors
    ///
    /// Returns a [`ParameterValidationError`] when the value cannot be placed.
    fn apply(
        &self,
        draft: &mut RequestDraft,
        definition: &ParameterDefinition,
        value: &Value,
    ) -> Result<(), ParameterValidationError>;
}

/// Merges into the query string, last write wins per key.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryApplier;

impl ParameterApplier for QueryApplier {
    fn apply(
        &self,
        draft: &mut RequestDraft,
        definition: &ParameterDefinition,
        value: &Value,
    ) -> Result<(), ParameterValidationError> {
        let rendered = to_param_string(definition.name(), ParameterLocation::Query, value)?;
        draft.set_query_param(definition.name(), rendered);
        Ok(())
    }
}

/// Sets or overwrites a header.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderApplier;

impl ParameterApplier for HeaderApplier {
    fn apply(
        &self,
        draft: &mut RequestDraft,
        definition: &ParameterDefinition,
        value: &Value,
    ) -> Result<(), ParameterValidationError> {
        let name = definition.name();
        let invalid = |reason: String| ParameterValidationError::InvalidHeader {
            name: name.to_string(),
            reason,
        };

        let header = HeaderName::from_bytes(name.as_bytes()).map_err(|err| invalid(err.to_string()))?;
        let rendered = to_param_string(name, ParameterLocation::Header, value)?;
        let value = HeaderValue::from_str(&rendered).map_err(|err| invalid(err.to_string()))?;
        draft.headers_mut().insert(header, value);
        Ok(())
    }
}

/// Substitutes `{name}` in the path, or appends a segment when there is no placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathApplier;

impl ParameterApplier for PathApplier {
    fn apply(
        &self,
        draft: &mut RequestDraft,
        definition: &ParameterDefinition,
        value: &Value,
    ) -> Result<(), ParameterValidationError> {
        let rendered = to_param_string(definition.name(), ParameterLocation::Path, value)?;
        let encoded = encode_path_segment(&rendered);

        let placeholder = ["{", definition.name(), "}"].concat();
        let path = if draft.path().contains(&placeholder) {
            draft.path().replace(&placeholder, &encoded)
        } else {
            format!("{}/{encoded}", draft.path().trim_end_matches('/'))
        };
        draft.set_path(path);
        Ok(())
    }
}

/// Sets a key of the JSON object body, treating an empty body as `{}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyApplier;

impl ParameterApplier for BodyApplier {
    fn apply(
        &self,
        draft: &mut RequestDraft,
        definition: &ParameterDefinition,
        value: &Value,
    ) -> Result<(), ParameterValidationError> {
        set_json_body_field(draft, definition.name(), value.clone())
    }
}

/// Sets `key` in the JSON object body of `draft`.
pub(crate) fn set_json_body_field(
    draft: &mut RequestDraft,
    key: &str,
    value: Value,
) -> Result<(), ParameterValidationError> {
    let mut object = match draft.body() {
        None | Some([]) => Map::new(),
        Some(bytes) => match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(object)) => object,
            Ok(other) => {
                return Err(ParameterValidationError::BodyNotJson {
                    reason: format!("expected an object, found {other}"),
                });
            }
            Err(err) => {
                return Err(ParameterValidationError::BodyNotJson {
                    reason: err.to_string(),
                });
            }
        },
    };

    object.insert(key.to_string(), value);
    let body = serde_json::to_vec(&object).map_err(|err| ParameterValidationError::BodyNotJson {
        reason: err.to_string(),
    })?;
    draft.headers_mut().typed_insert(ContentType::json());
    draft.set_body(body);
    Ok(())
}

/// Sets a field of the `application/x-www-form-urlencoded` body.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormApplier;

impl ParameterApplier for FormApplier {
    fn apply(
        &self,
        draft: &mut RequestDraft,
        definition: &ParameterDefinition,
        value: &Value,
    ) -> Result<(), ParameterValidationError> {
        let mut fields: IndexMap<String, String> = match draft.body() {
            None | Some([]) => IndexMap::new(),
            Some(bytes) => serde_urlencoded::from_bytes::<Vec<(String, String)>>(bytes)
                .map_err(|err| ParameterValidationError::BodyNotForm {
                    reason: err.to_string(),
                })?
                .into_iter()
                .collect(),
        };

        let rendered = to_param_string(definition.name(), ParameterLocation::Form, value)?;
        fields.insert(definition.name().to_string(), rendered);

        let pairs: Vec<(&String, &String)> = fields.iter().collect();
        let body = serde_urlencoded::to_string(pairs).map_err(|err| {
            ParameterValidationError::BodyNotForm {
                reason: err.to_string(),
            }
        })?;
        draft.headers_mut().typed_insert(ContentType::form_url_encoded());
        draft.set_body(body.into_bytes());
        Ok(())
    }
}

/// Maps parameter locations to their [`ParameterApplier`].
///
/// The default registry covers query, header, path, body and form;
/// multipart has no built-in applier.
#[derive(Debug, Clone)]
pub struct ApplierRegistry {
    appliers: IndexMap<ParameterLocation, Arc<dyn ParameterApplier>>,
}

impl Default for ApplierRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ParameterLocation::Query, QueryApplier);
        registry.register(ParameterLocation::Header, HeaderApplier);
        registry.register(ParameterLocation::Path, PathApplier);
        registry.register(ParameterLocation::Body, BodyApplier);
        registry.register(ParameterLocation::Form, FormApplier);
        registry
    }
}

impl ApplierRegistry {
    /// A registry without any applier.
    pub fn empty() -> Self {
        Self {
            appliers: IndexMap::new(),
        }
    }

    /// Registers `applier` for `location`, replacing the previous one.
    pub fn register(&mut self, location: ParameterLocation, applier: impl ParameterApplier + 'static) {
        self.appliers.insert(location, Arc::new(applier));
    }

    /// The applier for `location`.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterValidationError::NoApplier`] when none is registered.
    pub fn get(&self, location: ParameterLocation) -> Result<&dyn ParameterApplier, ParameterValidationError> {
        self.appliers
            .get(&location)
            .map(|applier| &**applier)
            .ok_or(ParameterValidationError::NoApplier { location })
    }

    /// Applies `value` with the applier registered for the definition's location.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterValidationError::NoApplier`] or the applier's error.
    pub fn apply(
        &self,
        draft: &mut RequestDraft,
        definition: &ParameterDefinition,
        value: &Value,
    ) -> Result<(), ParameterValidationError> {
        self.get(definition.location())?.apply(draft, definition, value)
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::client::parameters::{ParameterConstraint, ParameterValueType};

    fn draft(path: &str) -> RequestDraft {
        let base = Url::parse("https://api.example.com/search?lang=en").expect("valid url");
        RequestDraft::new(Method::POST, &base, path)
    }

    fn string_param(name: &str, location: ParameterLocation) -> ParameterDefinition {
        ParameterDefinition::builder(name, location, ParameterConstraint::new(ParameterValueType::String))
            .required(true)
            .build()
            .expect("valid definition")
    }

    #[test]
    fn should_apply_query_with_percent_encoding() {
        let registry = ApplierRegistry::default();
        let mut draft = draft("");

        registry
            .apply(&mut draft, &string_param("q", ParameterLocation::Query), &json!("hello world"))
            .expect("applied");
        let request = draft.finish().expect("resolved");

        assert_eq!(
            request.url().as_str(),
            "https://api.example.com/search?lang=en&q=hello%20world"
        );
    }

    #[test]
    fn should_overwrite_header() {
        let registry = ApplierRegistry::default();
        let mut draft = draft("");
        let definition = string_param("X-Tenant", ParameterLocation::Header);

        registry.apply(&mut draft, &definition, &json!("a")).expect("applied");
        registry.apply(&mut draft, &definition, &json!("b")).expect("applied");

        assert_eq!(draft.headers().get("x-tenant").map(HeaderValue::as_bytes), Some(&b"b"[..]));
        assert_eq!(draft.headers().get_all("x-tenant").iter().count(), 1);
    }

    #[test]
    fn should_substitute_or_append_path() {
        let registry = ApplierRegistry::default();

        let mut with_placeholder = draft("/users/{id}/posts");
        registry
            .apply(&mut with_placeholder, &string_param("id", ParameterLocation::Path), &json!("a b"))
            .expect("applied");
        assert_eq!(with_placeholder.path(), "/users/a%20b/posts");

        let mut without_placeholder = draft("/users/");
        registry
            .apply(&mut without_placeholder, &string_param("id", ParameterLocation::Path), &json!("42"))
            .expect("applied");
        assert_eq!(without_placeholder.path(), "/users/42");
    }

    #[test]
    fn should_merge_json_body_fields() {
        let registry = ApplierRegistry::default();
        let mut draft = draft("");

        registry
            .apply(&mut draft, &string_param("name", ParameterLocation::Body), &json!("ada"))
            .expect("applied");
        registry
            .apply(&mut draft, &string_param("role", ParameterLocation::Body), &json!("admin"))
            .expect("applied");

        let body: Value = serde_json::from_slice(draft.body().expect("body")).expect("json");
        assert_eq!(body, json!({"name": "ada", "role": "admin"}));
        assert_eq!(
            draft.headers().typed_get::<ContentType>(),
            Some(ContentType::json())
        );
    }

    #[test]
    fn should_reject_non_json_body() {
        let registry = ApplierRegistry::default();
        let mut draft = draft("");
        draft.set_body(b"not json".to_vec());

        let result = registry.apply(&mut draft, &string_param("name", ParameterLocation::Body), &json!("ada"));

        assert!(matches!(result, Err(ParameterValidationError::BodyNotJson { .. })));
    }

    #[test]
    fn should_encode_form_fields() {
        let registry = ApplierRegistry::default();
        let mut draft = draft("");

        registry
            .apply(&mut draft, &string_param("grant", ParameterLocation::Form), &json!("a b&c"))
            .expect("applied");
        registry
            .apply(&mut draft, &string_param("grant", ParameterLocation::Form), &json!("final"))
            .expect("applied");

        assert_eq!(draft.body(), Some(&b"grant=final"[..]));
    }

    #[test]
    fn should_report_missing_applier() {
        let registry = ApplierRegistry::default();
        let mut draft = draft("");

        let error = registry
            .apply(&mut draft, &string_param("file", ParameterLocation::Multipart), &json!("x"))
            .expect_err("no multipart applier");

        assert_eq!(
            error,
            ParameterValidationError::NoApplier {
                location: ParameterLocation::Multipart
            }
        );
    }
}

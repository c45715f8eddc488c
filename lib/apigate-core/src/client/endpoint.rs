use http::Method;
use indexmap::IndexMap;

use super::ApiClientError;
use super::parameters::{ParameterDefinition, ParameterValidationError};

const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
];

/// A named operation of the remote API: method, path template and declared parameters.
///
/// Parameters keep their declaration order, which is the order they are applied in.
#[derive(Debug, Clone)]
pub struct EndpointDefinition {
    name: String,
    method: Method,
    path: String,
    parameters: IndexMap<String, ParameterDefinition>,
    description: Option<String>,
}

impl EndpointDefinition {
    /// Starts a builder.
    ///
    /// `method` is matched case-insensitively when the builder is built.
    pub fn builder(
        name: impl Into<String>,
        method: impl AsRef<str>,
        path: impl Into<String>,
    ) -> EndpointDefinitionBuilder {
        EndpointDefinitionBuilder {
            name: name.into(),
            method: method.as_ref().to_string(),
            path: path.into(),
            parameters: Vec::new(),
            description: None,
        }
    }

    /// Endpoint without declared parameters.
    pub(crate) fn ad_hoc(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: format!("{method} {path}"),
            method,
            path,
            parameters: IndexMap::new(),
            description: None,
        }
    }

    /// Name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path template, possibly with `{placeholder}`s.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Declared parameters, in declaration order.
    pub fn parameters(&self) -> impl Iterator<Item = &ParameterDefinition> {
        self.parameters.values()
    }

    /// The parameter named `name`.
    pub fn parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.get(name)
    }

    /// `true` when no parameter is declared.
    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// Description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Builder for [`EndpointDefinition`].
#[derive(Debug, Clone)]
pub struct EndpointDefinitionBuilder {
    name: String,
    method: String,
    path: String,
    parameters: Vec<ParameterDefinition>,
    description: Option<String>,
}

impl EndpointDefinitionBuilder {
    /// Declares a parameter.
    #[must_use]
    pub fn parameter(mut self, parameter: ParameterDefinition) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Declares several parameters.
    #[must_use]
    pub fn parameters(mut self, parameters: impl IntoIterator<Item = ParameterDefinition>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validates and freezes the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::UnsupportedMethod`] for a method outside
    /// GET, POST, PUT, PATCH, DELETE, HEAD and OPTIONS, and
    /// [`ParameterValidationError::DuplicateParameter`] when two parameters share a name.
    pub fn build(self) -> Result<EndpointDefinition, ApiClientError> {
        let method = SUPPORTED_METHODS
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(self.method.trim()))
            .ok_or(ApiClientError::UnsupportedMethod {
                method: self.method,
            })?;

        let mut parameters = IndexMap::with_capacity(self.parameters.len());
        for parameter in self.parameters {
            let name = parameter.name().to_string();
            if parameters.contains_key(&name) {
                return Err(ParameterValidationError::DuplicateParameter { name }.into());
            }
            parameters.insert(name, parameter);
        }

        Ok(EndpointDefinition {
            name: self.name,
            method,
            path: self.path,
            parameters,
            description: self.description,
        })
    }
}

use std::sync::Arc;

use headers::{ContentLength, ContentType, HeaderMapExt};
use http::header::{ACCEPT, USER_AGENT};
use http::HeaderValue;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use super::parameters::{
    ApplierRegistry, ParameterValidationError, RequestDraft, set_json_body_field,
};
use super::{
    ApiClientError, ApiRequest, ClientCredentials, EndpointDefinition, Flags, REQUEST_ID_HEADER,
    RequestIdGenerator, UuidRequestIdGenerator,
};

const DEFAULT_USER_AGENT: &str = concat!("apigate/", env!("CARGO_PKG_VERSION"));

fn is_authorization(name: &str) -> bool {
    name.eq_ignore_ascii_case(http::header::AUTHORIZATION.as_str())
}

/// Turns caller data into a validated [`ApiRequest`] for one endpoint.
///
/// Parameters are coerced, validated and applied in declaration order. A declared
/// `Authorization` parameter is left to the authentication layer.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    endpoint: Arc<EndpointDefinition>,
    base_url: Url,
    appliers: ApplierRegistry,
    request_ids: Arc<dyn RequestIdGenerator>,
    flags: Flags,
    user_agent: HeaderValue,
}

impl RequestBuilder {
    /// Builder for `endpoint` relative to `base_url`, with the default appliers.
    pub fn new(endpoint: impl Into<Arc<EndpointDefinition>>, base_url: Url) -> Self {
        Self {
            endpoint: endpoint.into(),
            base_url,
            appliers: ApplierRegistry::default(),
            request_ids: Arc::new(UuidRequestIdGenerator),
            flags: Flags::empty(),
            user_agent: HeaderValue::from_static(DEFAULT_USER_AGENT),
        }
    }

    /// Replaces the applier registry.
    #[must_use]
    pub fn with_appliers(mut self, appliers: ApplierRegistry) -> Self {
        self.appliers = appliers;
        self
    }

    /// Replaces the request identifier generator.
    #[must_use]
    pub fn with_request_ids(mut self, request_ids: Arc<dyn RequestIdGenerator>) -> Self {
        self.request_ids = request_ids;
        self
    }

    /// Sets the behavior flags.
    #[must_use]
    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the default `User-Agent`.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: HeaderValue) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Builds the request from `data`.
    ///
    /// Without declared parameters, non-empty `data` becomes the JSON body.
    /// `credentials` travel in the request metadata for token acquisition.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::Parameter`] for missing, unexpected or invalid parameters,
    /// and when the resolved URL is invalid.
    pub fn build(
        &self,
        credentials: Option<ClientCredentials>,
        data: Map<String, Value>,
    ) -> Result<ApiRequest, ApiClientError> {
        let endpoint = &self.endpoint;
        let mut draft = RequestDraft::new(endpoint.method().clone(), &self.base_url, endpoint.path());

        if endpoint.has_parameters() {
            self.apply_parameters(&mut draft, &data)?;
        } else if !data.is_empty() {
            draft.set_body(serde_json::to_vec(&data)?);
            draft.headers_mut().typed_insert(ContentType::json());
        }

        let headers = draft.headers_mut();
        headers
            .entry(USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());
        headers
            .entry(ACCEPT)
            .or_insert_with(|| HeaderValue::from_static("application/json"));
        if headers.typed_get::<ContentType>().is_none() {
            headers.typed_insert(ContentType::from(mime::APPLICATION_JSON));
        }
        let body_length = draft.body().map(<[u8]>::len);
        if let Some(length) = body_length {
            draft
                .headers_mut()
                .typed_insert(ContentLength(u64::try_from(length).unwrap_or(u64::MAX)));
        }

        let request_id = self.request_ids.generate();
        let header = HeaderValue::from_str(&request_id.to_string())?;
        draft.headers_mut().insert(REQUEST_ID_HEADER.clone(), header);

        let mut request = draft.finish()?;
        let metadata = request.metadata_mut();
        metadata.set_request_id(request_id);
        metadata.set_credentials(credentials);

        debug!(
            endpoint = endpoint.name(),
            method = %request.method(),
            url = %request.url(),
            %request_id,
            "request built"
        );
        Ok(request)
    }

    fn apply_parameters(
        &self,
        draft: &mut RequestDraft,
        data: &Map<String, Value>,
    ) -> Result<(), ParameterValidationError> {
        let endpoint = &self.endpoint;

        let mut undeclared = Vec::new();
        for (name, value) in data {
            if endpoint.parameter(name).is_some() {
                continue;
            }
            if !self.flags.contains(Flags::TRUST_UNDEFINED_PARAMETERS) {
                return Err(ParameterValidationError::Unexpected { name: name.clone() });
            }
            warn!(endpoint = endpoint.name(), parameter = %name, "undeclared parameter written to the body");
            undeclared.push((name, value));
        }

        for definition in endpoint.parameters() {
            if is_authorization(definition.name()) {
                continue;
            }
            let raw = match data.get(definition.name()) {
                Some(raw) => raw,
                None => match definition.constraint().default_value() {
                    Some(default) => default,
                    None if definition.is_required() => {
                        return Err(ParameterValidationError::MissingRequired {
                            name: definition.name().to_string(),
                        });
                    }
                    None => continue,
                },
            };
            let value = definition.coerce(raw)?;
            self.appliers.apply(draft, definition, &value)?;
        }

        for (name, value) in undeclared {
            set_json_body_field(draft, name, value.clone())?;
        }
        Ok(())
    }
}

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use http::HeaderName;
use uuid::Uuid;

/// Header carrying the per-request correlation identifier.
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Per-request correlation identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// 32 lowercase hex digits, without hyphens.
    pub fn to_hex(&self) -> String {
        self.0.simple().to_string()
    }

    /// 22 characters of URL-safe base64, without padding.
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.as_bytes())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({self})")
    }
}

/// Source of request identifiers, invoked once per built request.
pub trait RequestIdGenerator: fmt::Debug + Send + Sync {
    /// Produces a new identifier.
    fn generate(&self) -> RequestId;
}

/// Random (v4) UUID identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestIdGenerator;

impl RequestIdGenerator for UuidRequestIdGenerator {
    fn generate(&self) -> RequestId {
        RequestId(Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_encode_request_id() {
        let id = RequestId::from_uuid(Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef));

        assert_eq!(id.to_string(), "01234567-89ab-cdef-0123-456789abcdef");
        assert_eq!(id.to_hex(), "0123456789abcdef0123456789abcdef");
        assert_eq!(id.to_base64(), "ASNFZ4mrze8BI0VniavN7w");
    }

    #[test]
    fn should_generate_distinct_ids() {
        let generator = UuidRequestIdGenerator;

        let first = generator.generate();
        let second = generator.generate();

        assert_ne!(first, second);
        assert_eq!(first.as_uuid().get_version_num(), 4);
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

const REDACTED: &str = "[REDACTED]";

/// Sensitive string that is zeroed on drop and never rendered in full.
///
/// `Debug` prints `[REDACTED]`, `Display` keeps at most the first and last four characters.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecureString(String);

impl SecureString {
    /// Wraps a secret value.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Exposes the secret.
    ///
    /// Avoid holding on to the returned slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for an empty secret.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the wrapper; the caller becomes responsible for the value.
    pub fn into_string(mut self) -> String {
        std::mem::take(&mut self.0)
    }

    /// Compares with a plain string without exposing the secret.
    pub fn equals_str(&self, other: &str) -> bool {
        self.0 == other
    }

    fn mask(value: &str) -> String {
        let count = value.chars().count();
        if count <= 8 {
            return "***".to_string();
        }
        let head: String = value.chars().take(4).collect();
        let tail: String = value.chars().skip(count - 4).collect();
        format!("{head}...{tail}")
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureString")
            .field("value", &REDACTED)
            .finish()
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Self::mask(&self.0))
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl Serialize for SecureString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecureString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Set of secrets to mask out of free text before it is logged.
///
/// Typical inputs are upstream error bodies that may echo a client secret or a token.
#[derive(Clone, Default)]
pub struct RedactionContext {
    secrets: Vec<SecureString>,
}

impl RedactionContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a secret; empty values are ignored.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<SecureString>) -> Self {
        self.register(secret);
        self
    }

    /// Registers a secret in place; empty values are ignored.
    pub fn register(&mut self, secret: impl Into<SecureString>) {
        let secret = secret.into();
        if !secret.is_empty() && !self.secrets.contains(&secret) {
            self.secrets.push(secret);
        }
    }

    /// Number of registered secrets.
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Replaces every occurrence of a registered secret with `[REDACTED]`.
    pub fn redact(&self, text: &str) -> String {
        // longest first, so a secret containing another one is masked whole
        let mut secrets: Vec<&str> = self.secrets.iter().map(SecureString::as_str).collect();
        secrets.sort_by_key(|secret| std::cmp::Reverse(secret.len()));

        secrets
            .into_iter()
            .fold(text.to_string(), |text, secret| text.replace(secret, REDACTED))
    }
}

impl fmt::Debug for RedactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedactionContext")
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_mask_display() {
        assert_eq!(SecureString::from("short").to_string(), "***");
        assert_eq!(SecureString::from("12345678").to_string(), "***");
        assert_eq!(SecureString::from("123456789").to_string(), "1234...6789");
    }

    #[test]
    fn should_redact_debug() {
        let secure = SecureString::from("secret-password");

        let debug = format!("{secure:?}");

        assert_eq!(debug, r#"SecureString { value: "[REDACTED]" }"#);
    }

    #[test]
    fn should_mask_multibyte_secrets_without_panicking() {
        let secure = SecureString::from("ééééééééé");
        assert_eq!(secure.to_string(), "éééé...éééé");
    }

    #[test]
    fn should_redact_registered_secrets() {
        let context = RedactionContext::new()
            .with_secret("s3cr3t")
            .with_secret("s3cr3t-token")
            .with_secret("");

        let redacted = context.redact(r#"{"error":"bad client s3cr3t","token":"s3cr3t-token"}"#);

        assert_eq!(context.len(), 2);
        insta::assert_snapshot!(redacted, @r#"{"error":"bad client [REDACTED]","token":"[REDACTED]"}"#);
    }

    #[test]
    fn should_not_leak_secrets_in_context_debug() {
        let context = RedactionContext::new().with_secret("top-secret");

        let debug = format!("{context:?}");

        assert!(!debug.contains("top-secret"));
    }
}

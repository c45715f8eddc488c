/// Errors raised by the pluggable strategies (credential encoding, scopes, retry).
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
pub enum StrategyError {
    /// Client id or client secret is empty.
    #[display("Client ID and client secret must be provided")]
    MissingCredentials,

    /// Client id contains a colon, which Basic encoding cannot represent.
    #[display("Client ID cannot contain a colon (:) character")]
    InvalidClientId,

    /// Scope delimiter is empty or longer than one character.
    #[display("Scope delimiter must be a single character, got {delimiter:?}")]
    InvalidDelimiter {
        /// The rejected delimiter.
        delimiter: String,
    },

    /// Scope string exceeds the configured length backstop.
    #[display("Scopes string is too long: {length} > {max_length}")]
    ScopesTooLong {
        /// Length of the rejected input.
        length: usize,
        /// Configured backstop.
        max_length: usize,
    },

    /// Too many scopes were supplied for a merge.
    #[display("Too many scopes to merge: {count} > {max_scopes}")]
    TooManyScopes {
        /// Number of scopes supplied.
        count: usize,
        /// Configured maximum.
        max_scopes: usize,
    },

    /// The scope input shape does not fit the requested mode.
    #[display("Scope mode {mode} cannot process a {input} input")]
    ModeMismatch {
        /// Requested mode.
        mode: super::ScopeMode,
        /// Shape of the rejected input.
        input: &'static str,
    },

    /// Invalid retry configuration.
    #[display("Invalid retry configuration: {reason}")]
    InvalidRetry {
        /// Description of the problem.
        reason: String,
    },

    /// Invalid rate limit configuration.
    #[display("Invalid rate limit configuration: {reason}")]
    InvalidRateLimit {
        /// Description of the problem.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_scope_errors() {
        let error = StrategyError::InvalidDelimiter {
            delimiter: "::".to_string(),
        };
        insta::assert_snapshot!(error.to_string(), @r#"Scope delimiter must be a single character, got "::""#);

        let error = StrategyError::ScopesTooLong {
            length: 300,
            max_length: 255,
        };
        insta::assert_snapshot!(error.to_string(), @"Scopes string is too long: 300 > 255");
    }
}

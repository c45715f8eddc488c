use indexmap::IndexSet;
use tracing::warn;

use super::StrategyError;

/// Default delimiter between scopes, as in RFC 6749 section 3.3.
pub const DEFAULT_SCOPE_DELIMITER: char = ' ';

/// Default maximum length of a scope string accepted by [`ScopeStrategy::split`].
pub const DEFAULT_SCOPE_LENGTH_BACKSTOP: usize = 255;

/// Default maximum number of scopes accepted by [`ScopeStrategy::merge`].
pub const DEFAULT_MAXIMUM_SCOPES: usize = 16;

/// Environment variable overriding the scope length backstop.
pub const SCOPE_LENGTH_BACKSTOP_ENV: &str = "AE_SCOPE_LENGTH_BACKSTOP";

/// Environment variable overriding the maximum number of scopes.
pub const MAXIMUM_SCOPES_ENV: &str = "AE_MAXIMUM_SCOPES";

/// What [`ScopeStrategy::execute`] is allowed to do with its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, derive_more::Display)]
pub enum ScopeMode {
    /// Only split a delimited string.
    #[display("split")]
    Split,
    /// Only merge a list.
    #[display("merge")]
    Merge,
    /// Split strings and merge lists.
    #[default]
    #[display("dual")]
    Dual,
}

/// Scopes as they arrive from a caller or a token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeInput {
    /// A delimited string, e.g. `"read write"`.
    Joined(String),
    /// An ordered list of scopes.
    List(Vec<String>),
}

impl ScopeInput {
    fn shape(&self) -> &'static str {
        match self {
            Self::Joined(_) => "string",
            Self::List(_) => "list",
        }
    }
}

impl From<&str> for ScopeInput {
    fn from(value: &str) -> Self {
        Self::Joined(value.to_string())
    }
}

impl From<Vec<String>> for ScopeInput {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Result of [`ScopeStrategy::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeOutput {
    /// Merged delimited string.
    Merged(String),
    /// Split list of scopes.
    Split(Vec<String>),
}

/// Merges and splits OAuth2 scope strings.
///
/// Both directions are bounded: [`split`](Self::split) rejects strings longer than
/// the length backstop and [`merge`](Self::merge) rejects more than `max_scopes` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeStrategy {
    delimiter: char,
    max_length: usize,
    max_scopes: usize,
}

impl Default for ScopeStrategy {
    /// The default delimiter with limits read from the process environment.
    fn default() -> Self {
        Self::from_env()
    }
}

impl ScopeStrategy {
    /// Creates a strategy from a delimiter given as a string.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidDelimiter`] unless `delimiter` is exactly one character.
    pub fn new(delimiter: &str) -> Result<Self, StrategyError> {
        let mut chars = delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(delimiter), None) => Ok(Self::with_delimiter(delimiter)),
            _ => Err(StrategyError::InvalidDelimiter {
                delimiter: delimiter.to_string(),
            }),
        }
    }

    /// Creates a strategy with the default limits.
    pub fn with_delimiter(delimiter: char) -> Self {
        Self {
            delimiter,
            max_length: DEFAULT_SCOPE_LENGTH_BACKSTOP,
            max_scopes: DEFAULT_MAXIMUM_SCOPES,
        }
    }

    /// Reads the limits from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the limits through `lookup`, falling back to defaults on missing or bad values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str, default: usize| match lookup(key) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(key, value = %raw, "ignoring invalid scope limit, using {default}");
                default
            }),
        };

        Self {
            delimiter: DEFAULT_SCOPE_DELIMITER,
            max_length: read(SCOPE_LENGTH_BACKSTOP_ENV, DEFAULT_SCOPE_LENGTH_BACKSTOP),
            max_scopes: read(MAXIMUM_SCOPES_ENV, DEFAULT_MAXIMUM_SCOPES),
        }
    }

    /// Sets the length backstop for [`split`](Self::split).
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Sets the maximum number of scopes for [`merge`](Self::merge).
    #[must_use]
    pub fn with_max_scopes(mut self, max_scopes: usize) -> Self {
        self.max_scopes = max_scopes;
        self
    }

    /// The delimiter.
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// The length backstop.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// The maximum number of scopes.
    pub fn max_scopes(&self) -> usize {
        self.max_scopes
    }

    /// Joins scopes with the delimiter, keeping the first occurrence of each.
    ///
    /// Empty entries are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::TooManyScopes`] when more than `max_scopes` entries are given.
    pub fn merge<S: AsRef<str>>(&self, scopes: &[S]) -> Result<String, StrategyError> {
        if scopes.len() > self.max_scopes {
            return Err(StrategyError::TooManyScopes {
                count: scopes.len(),
                max_scopes: self.max_scopes,
            });
        }

        let unique: IndexSet<&str> = scopes
            .iter()
            .map(|scope| scope.as_ref())
            .filter(|scope| !scope.is_empty())
            .collect();

        let mut buffer = [0; 4];
        let delimiter: &str = self.delimiter.encode_utf8(&mut buffer);
        Ok(unique.into_iter().collect::<Vec<_>>().join(delimiter))
    }

    /// Splits a delimited string, dropping empty segments.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::ScopesTooLong`] when `scopes` exceeds the length backstop.
    pub fn split(&self, scopes: &str) -> Result<Vec<String>, StrategyError> {
        let length = scopes.chars().count();
        if length > self.max_length {
            return Err(StrategyError::ScopesTooLong {
                length,
                max_length: self.max_length,
            });
        }

        Ok(self.split_granted(scopes))
    }

    /// Splits scopes granted by a token endpoint, without the backstops.
    pub(crate) fn split_granted(&self, scopes: &str) -> Vec<String> {
        scopes
            .split(self.delimiter)
            .filter(|scope| !scope.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Splits or merges `input` as permitted by `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::ModeMismatch`] when the input shape is not allowed by `mode`,
    /// or the error of the underlying operation.
    pub fn execute(
        &self,
        input: ScopeInput,
        mode: ScopeMode,
    ) -> Result<ScopeOutput, StrategyError> {
        match (input, mode) {
            (ScopeInput::Joined(scopes), ScopeMode::Split | ScopeMode::Dual) => {
                self.split(&scopes).map(ScopeOutput::Split)
            }
            (ScopeInput::List(scopes), ScopeMode::Merge | ScopeMode::Dual) => {
                self.merge(&scopes).map(ScopeOutput::Merged)
            }
            (input, mode) => Err(StrategyError::ModeMismatch {
                mode,
                input: input.shape(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    #[test]
    fn should_merge_without_duplicates() {
        let strategy = ScopeStrategy::default();

        let merged = strategy.merge(&["a", "b", "a"]).expect("merge");

        assert_eq!(merged, "a b");
    }

    #[test]
    fn should_split_on_delimiter() {
        let strategy = ScopeStrategy::default();

        let scopes = strategy.split("a b").expect("split");

        assert_eq!(scopes, vec!["a", "b"]);
    }

    #[rstest]
    #[case::double_space("a  b", vec!["a", "b"])]
    #[case::trailing(" a b ", vec!["a", "b"])]
    #[case::empty("", vec![])]
    fn should_drop_empty_segments(#[case] input: &str, #[case] expected: Vec<&str>) {
        let scopes = ScopeStrategy::default().split(input).expect("split");
        assert_eq!(scopes, expected);
    }

    #[test]
    fn should_use_custom_delimiter() {
        let strategy = ScopeStrategy::new(",").expect("single char");

        assert_eq!(strategy.merge(&["read", "write"]).expect("merge"), "read,write");
        assert_eq!(strategy.split("read,write").expect("split"), vec!["read", "write"]);
    }

    #[rstest]
    #[case::empty("")]
    #[case::long("::")]
    fn should_reject_invalid_delimiter(#[case] delimiter: &str) {
        let result = ScopeStrategy::new(delimiter);
        assert!(matches!(result, Err(StrategyError::InvalidDelimiter { .. })));
    }

    #[test]
    fn should_reject_long_scope_string() {
        let strategy = ScopeStrategy::default().with_max_length(10);

        let result = strategy.split("read write admin");

        assert_eq!(
            result,
            Err(StrategyError::ScopesTooLong {
                length: 16,
                max_length: 10
            })
        );
    }

    #[test]
    fn should_reject_too_many_scopes() {
        let strategy = ScopeStrategy::default().with_max_scopes(2);

        let result = strategy.merge(&["a", "b", "c"]);

        assert!(matches!(result, Err(StrategyError::TooManyScopes { count: 3, .. })));
    }

    #[test]
    fn should_execute_by_mode() {
        let strategy = ScopeStrategy::default();

        let output = strategy
            .execute("a b".into(), ScopeMode::Dual)
            .expect("dual split");
        assert_eq!(output, ScopeOutput::Split(vec!["a".into(), "b".into()]));

        let output = strategy
            .execute(vec!["a".to_string(), "b".to_string()].into(), ScopeMode::Merge)
            .expect("merge");
        assert_eq!(output, ScopeOutput::Merged("a b".into()));

        let error = strategy
            .execute(vec!["a".to_string()].into(), ScopeMode::Split)
            .expect_err("list cannot be split");
        insta::assert_snapshot!(error.to_string(), @"Scope mode split cannot process a list input");
    }

    #[test]
    fn should_read_limits_from_lookup() {
        let env = HashMap::from([
            (SCOPE_LENGTH_BACKSTOP_ENV, "42".to_string()),
            (MAXIMUM_SCOPES_ENV, "not-a-number".to_string()),
        ]);

        let strategy = ScopeStrategy::from_lookup(|key| env.get(key).cloned());

        assert_eq!(strategy.max_length(), 42);
        assert_eq!(strategy.max_scopes(), DEFAULT_MAXIMUM_SCOPES);
    }

    #[test]
    fn should_default_to_environment_limits() {
        assert_eq!(ScopeStrategy::default(), ScopeStrategy::from_env());
    }

    #[test]
    fn should_split_granted_scopes_past_the_backstop() {
        let strategy = ScopeStrategy::default().with_max_length(10);
        let granted = (0..60).map(|n| format!("scope{n}")).collect::<Vec<_>>().join(" ");

        let scopes = strategy.split_granted(&granted);

        assert_eq!(scopes.len(), 60);
        assert_eq!(scopes.last().map(String::as_str), Some("scope59"));
        assert!(strategy.split(&granted).is_err());
    }
}

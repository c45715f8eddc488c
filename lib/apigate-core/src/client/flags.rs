bitflags::bitflags! {
    /// Behavior toggles of an [`ApiClient`](super::ApiClient).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u8 {
        /// Turn `>= 400` responses into [`ApiClientError::UnexpectedStatusCode`](super::ApiClientError::UnexpectedStatusCode).
        const USE_DEFAULT_POST_RESPONSE_HOOK = 1;
        /// Refuse plain `http` base URLs.
        const FORCE_HTTPS = 1 << 1;
        /// Accept plain `http` even when [`Flags::FORCE_HTTPS`] is set.
        const ALLOW_INSECURE = 1 << 2;
        /// Put undeclared parameters into the JSON body instead of rejecting them.
        const TRUST_UNDEFINED_PARAMETERS = 1 << 3;
    }
}

impl Flags {
    /// `true` when `scheme` is refused by these flags.
    pub fn refuses_scheme(self, scheme: &str) -> bool {
        self.contains(Self::FORCE_HTTPS)
            && !self.contains(Self::ALLOW_INSECURE)
            && !scheme.eq_ignore_ascii_case("https")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::default(Flags::empty(), "http", false)]
    #[case::forced_http(Flags::FORCE_HTTPS, "http", true)]
    #[case::forced_https(Flags::FORCE_HTTPS, "https", false)]
    #[case::insecure_allowed(Flags::FORCE_HTTPS | Flags::ALLOW_INSECURE, "http", false)]
    fn should_refuse_scheme(#[case] flags: Flags, #[case] scheme: &str, #[case] expected: bool) {
        assert_eq!(flags.refuses_scheme(scheme), expected);
    }
}

//! `${NAME}` placeholders in config files.
//!
//! Secrets such as the OAuth client secret and the location API key are
//! usually kept in `.env` and referenced from `underwood.toml`.

/// Expand `${NAME}` and `${NAME:-fallback}` from the process environment.
///
/// Unset names without a fallback are kept verbatim so the parse error (or
/// the empty value) points at the placeholder.
pub fn substitute_env(input: &str) -> String {
    expand(input, |name| std::env::var(name).ok())
}

fn expand(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };
        match (name.is_empty(), lookup(name), fallback) {
            (false, Some(value), _) => out.push_str(&value),
            (false, None, Some(fallback)) => out.push_str(fallback),
            _ => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn env(name: &str) -> Option<String> {
        match name {
            "LOCATION_API_KEY" => Some("k-123".into()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[rstest]
    #[case::known("api_key = \"${LOCATION_API_KEY}\"", "api_key = \"k-123\"")]
    #[case::unknown_kept("${UNDERWOOD_MISSING}", "${UNDERWOOD_MISSING}")]
    #[case::fallback_used("psk = \"${FACTORY_PSK:-praxis35}\"", "psk = \"praxis35\"")]
    #[case::fallback_ignored("${LOCATION_API_KEY:-other}", "k-123")]
    #[case::set_but_empty("[${EMPTY:-x}]", "[]")]
    #[case::unterminated("tail ${OPEN", "tail ${OPEN")]
    #[case::empty_name("${}", "${}")]
    #[case::several("${LOCATION_API_KEY}/${LOCATION_API_KEY}", "k-123/k-123")]
    #[case::dollar_alone("cost $5", "cost $5")]
    fn expands(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(expand(input, env), expected);
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(substitute_env("port = \"/dev/ttyACM0\""), "port = \"/dev/ttyACM0\"");
    }
}

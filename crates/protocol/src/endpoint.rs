//! Connection endpoint resolution.
//!
//! URI shape: `{base}/{identity}[/{thread_id}]`, each segment percent-encoded
//! on its own.

use std::borrow::Cow;

/// Errors from endpoint validation.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid endpoint URI: {0}")]
    Invalid(#[from] url::ParseError),

    #[error("unsupported scheme {0:?} (expected ws or wss)")]
    UnsupportedScheme(String),
}

/// Builds the socket URI for an identity and optional thread.
///
/// Exactly one trailing `/` is stripped from `base`. An empty `thread_id`
/// is treated as absent.
pub fn resolve_endpoint(base: &str, identity: &str, thread_id: Option<&str>) -> String {
    let base = base.strip_suffix('/').unwrap_or(base);
    let mut uri = format!("{base}/{}", encode_segment(identity));
    if let Some(thread) = thread_id.filter(|t| !t.is_empty()) {
        uri.push('/');
        uri.push_str(&encode_segment(thread));
    }
    uri
}

/// Percent-encodes one path segment.
pub fn encode_segment(segment: &str) -> Cow<'_, str> {
    urlencoding::encode(segment)
}

/// Checks that a resolved URI parses and uses a WebSocket scheme.
pub fn validate_endpoint(uri: &str) -> Result<url::Url, EndpointError> {
    let url = url::Url::parse(uri)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(EndpointError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(uri: &str, base: &str) -> Vec<String> {
        let rest = uri
            .strip_prefix(base.strip_suffix('/').unwrap_or(base))
            .unwrap();
        rest.trim_start_matches('/')
            .split('/')
            .map(|s| urlencoding::decode(s).unwrap().into_owned())
            .collect()
    }

    #[test]
    fn identity_only() {
        assert_eq!(
            resolve_endpoint("wss://chat.example.com/ws", "alice", None),
            "wss://chat.example.com/ws/alice"
        );
    }

    #[test]
    fn strips_exactly_one_trailing_separator() {
        assert_eq!(
            resolve_endpoint("ws://host/ws/", "u", Some("t")),
            "ws://host/ws/u/t"
        );
        assert_eq!(
            resolve_endpoint("ws://host/ws//", "u", None),
            "ws://host/ws//u"
        );
    }

    #[test]
    fn reserved_characters_round_trip() {
        let cases = [
            ("ws://host/chat", "a b/c@d", Some("x?y#z&w=1")),
            ("ws://host/chat/", "ñandú%20", Some("thread/1")),
            ("ws://host/chat", "plain", None),
        ];
        for (base, identity, thread) in cases {
            let uri = resolve_endpoint(base, identity, thread);
            let trimmed = base.strip_suffix('/').unwrap_or(base);
            assert!(!uri[trimmed.len()..].starts_with("//"), "{uri}");

            let mut expected = vec![identity.to_string()];
            if let Some(t) = thread {
                expected.push(t.to_string());
            }
            assert_eq!(segments(&uri, base), expected, "{uri}");
        }
    }

    #[test]
    fn encodes_slash_and_space() {
        assert_eq!(
            resolve_endpoint("ws://h", "a b/c@d", None),
            "ws://h/a%20b%2Fc%40d"
        );
    }

    #[test]
    fn empty_thread_is_absent() {
        assert_eq!(resolve_endpoint("ws://h", "u", Some("")), "ws://h/u");
    }

    #[test]
    fn deterministic() {
        let a = resolve_endpoint("ws://h/", "id 1", Some("t 2"));
        let b = resolve_endpoint("ws://h/", "id 1", Some("t 2"));
        assert_eq!(a, b);
    }

    #[test]
    fn validate_accepts_ws_schemes() {
        assert!(validate_endpoint("ws://localhost:8000/ws/u").is_ok());
        assert!(validate_endpoint("wss://example.com/ws/u/t").is_ok());
    }

    #[test]
    fn validate_rejects_bad_uris() {
        assert!(matches!(
            validate_endpoint("not a uri"),
            Err(EndpointError::Invalid(_))
        ));
        assert!(matches!(
            validate_endpoint("https://example.com/ws/u"),
            Err(EndpointError::UnsupportedScheme(s)) if s == "https"
        ));
    }
}

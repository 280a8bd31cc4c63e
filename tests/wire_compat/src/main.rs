fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use chatlink_protocol::{EventType, FrameCodec, RequestFrame, RequestKind, ResponseEvent};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn fixture_text(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&fixture_text(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Normalizes numbers so that `65` and `65.0` compare equal.
    ///
    /// Usage telemetry is produced by several backends, some of which write
    /// whole-number floats with a fractional part.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  ours: {reserialized}"
        );
        parsed
    }

    // --- Client → server ---

    #[test]
    fn fixture_chat_request() {
        let frame = roundtrip_test::<RequestFrame>("chat_request.json");
        assert_eq!(frame.kind, RequestKind::Chat);
        assert_eq!(
            frame.contexts.as_deref(),
            Some(&["documents".to_string(), "calendar".to_string()][..])
        );
    }

    #[test]
    fn fixture_deep_research_request() {
        let frame = roundtrip_test::<RequestFrame>("deep_research_request.json");
        assert_eq!(frame.kind, RequestKind::DeepResearch);
        assert!(frame.tool.is_none());
    }

    #[test]
    fn fixture_cancel_request() {
        let frame = roundtrip_test::<RequestFrame>("cancel_request.json");
        assert!(frame.is_cancel());
        assert!(frame.message.is_none());
    }

    #[test]
    fn codec_output_matches_cancel_fixture() {
        let encoded = FrameCodec::default()
            .encode(&RequestFrame::cancel("thread-42"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value, load_fixture("cancel_request.json"));
    }

    // --- Server → client ---

    #[test]
    fn fixture_response_start() {
        let event = roundtrip_test::<ResponseEvent>("response_start.json");
        assert_eq!(event.kind, EventType::Start);
    }

    #[test]
    fn fixture_response_chunk() {
        let event = roundtrip_test::<ResponseEvent>("response_chunk.json");
        assert_eq!(event.kind, EventType::Chunk);
        assert_eq!(event.thread_id.as_deref(), Some("thread-42"));
    }

    #[test]
    fn fixture_response_complete() {
        let event = roundtrip_test::<ResponseEvent>("response_complete.json");
        assert_eq!(event.done, Some(true));
        let usage = event.token_tracking.expect("token_tracking");
        assert_eq!(usage["output_tokens"], 96);
    }

    #[test]
    fn fixture_response_interrupted() {
        let event = roundtrip_test::<ResponseEvent>("response_interrupted.json");
        assert!(event.ends_stream());
        assert!(event.accumulated_content.is_none());
    }

    #[test]
    fn fixture_response_unknown_type() {
        let event = roundtrip_test::<ResponseEvent>("response_unknown_type.json");
        assert_eq!(event.kind, EventType::Other("research_progress".into()));
        assert_eq!(event.extra["step"], 4);
    }

    #[test]
    fn every_response_fixture_decodes_through_codec() {
        let codec = FrameCodec::default();
        let mut seen = 0;
        for entry in fs::read_dir(fixtures_dir()).unwrap() {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            if !name.starts_with("response_") {
                continue;
            }
            codec
                .decode(&fixture_text(&name))
                .unwrap_or_else(|e| panic!("codec rejected {name}: {e}"));
            seen += 1;
        }
        assert!(seen >= 5, "expected response fixtures, found {seen}");
    }
}

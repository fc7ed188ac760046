fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use vidlift_protocol::{Command, FileSource, UploadEvent};

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
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
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  ours:    {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_commands() {
        let commands: Vec<Command> = roundtrip_test("commands.json");
        let kinds: Vec<&str> = commands.iter().map(Command::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "START_UPLOAD",
                "START_UPLOAD",
                "PAUSE_UPLOAD",
                "RESUME_UPLOAD",
                "CANCEL_UPLOAD",
            ]
        );

        match &commands[1] {
            Command::StartUpload { file, .. } => {
                assert_eq!(file, &FileSource::inline(vec![0, 1, 2, 3, 4, 5, 6, 7]));
            }
            other => panic!("expected START_UPLOAD, got {other:?}"),
        }
    }

    #[test]
    fn fixture_events() {
        let events: Vec<UploadEvent> = roundtrip_test("events.json");
        assert_eq!(
            events[0],
            UploadEvent::UploadStarted {
                id: "u1".into(),
                total_size: 47_185_920,
            }
        );
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 4);
        assert!(matches!(
            &events[8],
            UploadEvent::UploadError { status: None, .. }
        ));
    }

    #[test]
    fn unknown_command_type_rejected() {
        let raw = r#"{"type":"DELETE_UPLOAD","payload":{"id":"x"}}"#;
        assert!(serde_json::from_str::<Command>(raw).is_err());
    }
}

use pretty_assertions::assert_eq;
use std::path::Path;
use v8_trace_studio::artifact::{ProfileArtifact, ProfileMeta, Tick};
use v8_trace_studio::output::{read_inlined, read_meta, read_ticks, write_artifact};
use v8_trace_studio::parser::{InliningRecord, OptimizationFrame};
use v8_trace_studio::utils::error::OutputError;

fn sample_artifact(folder: &Path) -> ProfileArtifact {
    let root = OptimizationFrame {
        function: "handle".to_string(),
        file: "/app/server.js".to_string(),
        id: 4,
        index: -1,
        start: 812,
        caller: None,
    };
    let mut inlined = InliningRecord::new();
    inlined.record(OptimizationFrame {
        function: "parse".to_string(),
        file: "/app/util.js".to_string(),
        id: 4,
        index: 0,
        start: 120,
        caller: Some(Box::new(root)),
    });

    ProfileArtifact {
        pid: 4242,
        folder: folder.to_path_buf(),
        log_path: folder.join("isolate-0x1-4242-v8.log"),
        inlined,
        ticks: vec![
            Tick {
                timestamp: 100,
                vm_state: 0,
                stack: vec![3, 1],
            },
            Tick {
                timestamp: 200,
                vm_state: 6,
                stack: vec![],
            },
        ],
    }
}

#[test]
fn test_write_and_read_artifact() {
    let temp_dir = tempfile::tempdir().unwrap();
    let folder = temp_dir.path().join("4242.v8trace");
    let artifact = sample_artifact(&folder);
    let argv = vec!["server.js".to_string(), "--port".to_string(), "0".to_string()];
    let meta = ProfileMeta::new(&artifact, Path::new("/usr/bin/node"), &argv);

    write_artifact(&artifact, &meta).unwrap();

    let read_back = read_meta(&folder).unwrap();
    assert_eq!(read_back, meta);
    assert_eq!(read_back.log_file, "isolate-0x1-4242-v8.log");
    assert_eq!(read_back.tick_count, 2);
    assert_eq!(read_back.inlined_targets, 1);
    assert_eq!(read_back.inlined_events, 1);

    assert_eq!(read_inlined(&folder).unwrap(), artifact.inlined);
    assert_eq!(read_ticks(&folder).unwrap(), artifact.ticks);
}

#[test]
fn test_inlined_json_shape() {
    let temp_dir = tempfile::tempdir().unwrap();
    let artifact = sample_artifact(temp_dir.path());
    let meta = ProfileMeta::new(&artifact, Path::new("node"), &[]);

    write_artifact(&artifact, &meta).unwrap();

    let raw = std::fs::read_to_string(temp_dir.path().join("inlined.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let frame = &value["parse /app/util.js"][0];
    assert_eq!(frame["fn"], "parse");
    assert_eq!(frame["caller"]["fn"], "handle");
    assert_eq!(frame["caller"]["index"], -1);
    assert!(frame["caller"].get("caller").is_none());
}

#[test]
fn test_read_meta_missing_folder() {
    let temp_dir = tempfile::tempdir().unwrap();
    let folder = temp_dir.path().join("missing");

    match read_meta(&folder) {
        Err(OutputError::ReadFailed { path, source }) => {
            assert_eq!(path, folder.join("meta.json"));
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_read_error_names_the_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let message = read_inlined(temp_dir.path()).unwrap_err().to_string();

    assert!(message.starts_with("Failed to read file"));
    assert!(message.contains("inlined.json"));
}

use ldm_utils::utils::{
    get_logger, load_yaml, save_json, LogLevel, LoggerConfig, LoggerError,
};
use std::fs;
use std::path::Path;

fn lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn records_use_pipe_separated_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layout.log");
    let logger = get_logger("itest-layout", &path, false, "info").unwrap();
    logger.info("epoch 1 done");
    logger.warn("lr dropped");

    let lines = lines(&path);
    assert_eq!(lines.len(), 2);
    let fields: Vec<&str> = lines[0].split(" | ").collect();
    assert_eq!(fields.len(), 4, "unexpected line {:?}", lines[0]);
    assert!(!fields[0].is_empty());
    assert_eq!(&fields[1..], ["itest-layout", "INFO", "epoch 1 done"]);
    assert!(lines[1].ends_with(" | itest-layout | WARN | lr dropped"));
}

#[test]
fn repeated_lookup_does_not_duplicate_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dup.log");
    let first = get_logger("itest-dup", &path, false, "info").unwrap();
    let second = get_logger("itest-dup", dir.path().join("other.log"), true, "debug").unwrap();

    assert_eq!(second.file_path(), path.as_path());
    assert_eq!(second.level(), LogLevel::Info);

    first.info("one");
    second.info("two");
    let lines = lines(&path);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("| one"));
    assert!(lines[1].ends_with("| two"));
    assert!(!dir.path().join("other.log").exists());
}

#[test]
fn info_level_filters_debug_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filter.log");
    let logger = get_logger("itest-filter", &path, false, "info").unwrap();
    logger.debug("hidden");
    logger.error("shown");

    let lines = lines(&path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(" | ERROR | shown"));
}

#[test]
fn debug_level_keeps_debug_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("debug.log");
    let logger = get_logger("itest-debug", &path, false, "debug").unwrap();
    logger.debug("visible");
    assert!(lines(&path)[0].ends_with(" | DEBUG | visible"));
}

#[test]
fn stream_logger_writes_each_record_once_to_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.log");
    let logger = get_logger("itest-stream", &path, true, "info").unwrap();
    logger.info("mirrored");

    let lines = lines(&path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(" | itest-stream | INFO | mirrored"));
}

#[test]
fn level_names_are_case_sensitive() {
    let dir = tempfile::tempdir().unwrap();
    let err = get_logger("itest-upper", dir.path().join("upper.log"), false, "INFO").unwrap_err();
    assert!(matches!(err, LoggerError::UnknownLevel(ref level) if level == "INFO"));
}

#[test]
fn unknown_level_is_rejected_before_anything_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.log");
    let err = get_logger("itest-bogus", &path, false, "bogus").unwrap_err();
    assert!(matches!(err, LoggerError::UnknownLevel(ref level) if level == "bogus"));
    assert!(!path.exists());
}

#[test]
fn scoped_logger_captures_library_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scope.log");
    let logger = get_logger("itest-scope", &path, false, "debug").unwrap();

    let json_path = dir.path().join("meta.json");
    logger
        .in_scope(|| save_json(&json_path, &serde_json::json!({"step": 3}), true))
        .unwrap();

    let lines = lines(&path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(" | itest-scope | DEBUG | "));
    assert!(lines[0].contains("json saved"));
}

#[test]
fn logger_config_builds_from_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("from_config.log");
    let config_path = dir.path().join("logger.yaml");
    fs::write(
        &config_path,
        format!(
            "name: itest-config\nfile_path: {}\nstream: false\nlevel: debug\n",
            log_path.display()
        ),
    )
    .unwrap();

    let config: LoggerConfig = load_yaml(&config_path).unwrap();
    assert_eq!(config.level, LogLevel::Debug);
    let logger = config.build().unwrap();
    assert_eq!(logger.name(), "itest-config");
    logger.debug("configured");
    assert!(lines(&log_path)[0].ends_with(" | itest-config | DEBUG | configured"));
}

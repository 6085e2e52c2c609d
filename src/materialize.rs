//! Per-instance configuration files.
//!
//! Each instance directory gets two files before any pane starts: a copy of
//! the digitizer's acquisition config, and a monitor document derived from a
//! shared JSON template with its `monitor.input_file` / `monitor.log_file`
//! pointed into that directory. Everything else in the template is written
//! back untouched, in its original key order.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::info;

use crate::error::{LaunchError, LaunchResult};

/// Waveform file the acquisition binary writes in its working directory.
pub const WAVEFORM_FILE: &str = "wave_0.dat";
/// Log file the monitor appends to.
pub const MONITOR_LOG_FILE: &str = "monitor.log";

/// A materialized monitor document and where it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    pub path: PathBuf,
    pub content: Value,
}

impl ConfigDocument {
    pub fn monitor_field(&self, key: &str) -> Option<&str> {
        self.content.get("monitor")?.get(key)?.as_str()
    }
}

/// Load `template`, retarget its monitor section at `instance_path`, and
/// write the result to `instance_path/document_name`.
pub fn materialize(
    template: &Path,
    instance_path: &Path,
    document_name: &str,
) -> LaunchResult<ConfigDocument> {
    let raw = fs::read_to_string(template)
        .map_err(|e| LaunchError::config_parse(template, format!("cannot read template: {e}")))?;
    let mut content: Value =
        serde_json::from_str(&raw).map_err(|e| LaunchError::config_parse(template, e))?;

    retarget_monitor(&mut content, instance_path)
        .map_err(|detail| LaunchError::config_parse(template, detail))?;

    let path = instance_path.join(document_name);
    let mut rendered = serde_json::to_string_pretty(&content)
        .map_err(|e| LaunchError::config_parse(template, e))?;
    rendered.push('\n');
    fs::write(&path, rendered)
        .map_err(|e| LaunchError::io(format!("failed to write {}", path.display()), e))?;

    info!(document = %path.display(), "monitor config materialized");
    Ok(ConfigDocument { path, content })
}

fn retarget_monitor(content: &mut Value, instance_path: &Path) -> Result<(), String> {
    let root = content
        .as_object_mut()
        .ok_or("top level must be a JSON object")?;
    let monitor = root
        .entry("monitor")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or("`monitor` must be a JSON object")?;

    monitor.insert(
        "input_file".to_string(),
        Value::String(path_string(&instance_path.join(WAVEFORM_FILE))),
    );
    monitor.insert(
        "log_file".to_string(),
        Value::String(path_string(&instance_path.join(MONITOR_LOG_FILE))),
    );
    Ok(())
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Copy an operator-supplied acquisition config into `instance_path` under
/// `file_name`.
pub fn stage_acquisition_config(
    source: &Path,
    instance_path: &Path,
    file_name: &str,
) -> LaunchResult<PathBuf> {
    let destination = instance_path.join(file_name);
    fs::copy(source, &destination).map_err(|e| {
        LaunchError::io(
            format!(
                "failed to copy {} to {}",
                source.display(),
                destination.display()
            ),
            e,
        )
    })?;
    info!(
        source = %source.display(),
        destination = %destination.display(),
        "acquisition config staged"
    );
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEMPLATE: &str = r#"{
  "monitor": {
    "input_file": "/tmp/old/wave_0.dat",
    "polling_interval_ms": 1000,
    "display_update_interval_ms": 1000,
    "rate_window_seconds": 10,
    "qa_enabled": true,
    "qa_baseline_target": 3500.0,
    "log_warnings": true,
    "log_file": "monitor.log"
  },
  "channels": [0, 1, 2, 3],
  "comment": "bench setup"
}"#;

    fn write_template(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("template.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn rewrites_monitor_paths_and_preserves_everything_else() {
        let tmp = tempfile::tempdir().unwrap();
        let template = write_template(tmp.path(), TEMPLATE);
        let instance = tmp.path().join("daq00");
        fs::create_dir_all(&instance).unwrap();

        let doc = materialize(&template, &instance, "monitor_config.json").unwrap();

        let expected_input = instance.join("wave_0.dat");
        let expected_log = instance.join("monitor.log");
        assert_eq!(
            doc.monitor_field("input_file"),
            Some(expected_input.to_str().unwrap())
        );
        assert_eq!(
            doc.monitor_field("log_file"),
            Some(expected_log.to_str().unwrap())
        );

        let written: Value =
            serde_json::from_str(&fs::read_to_string(&doc.path).unwrap()).unwrap();
        let mut original: Value = serde_json::from_str(TEMPLATE).unwrap();
        original["monitor"]["input_file"] = json!(expected_input.to_str().unwrap());
        original["monitor"]["log_file"] = json!(expected_log.to_str().unwrap());
        assert_eq!(written, original);
    }

    #[test]
    fn keeps_template_key_order() {
        let tmp = tempfile::tempdir().unwrap();
        let template = write_template(tmp.path(), r#"{"zeta": 1, "monitor": {"b": 2, "a": 1}, "alpha": 3}"#);

        let doc = materialize(&template, tmp.path(), "out.json").unwrap();
        let text = fs::read_to_string(&doc.path).unwrap();

        let zeta = text.find("\"zeta\"").unwrap();
        let monitor = text.find("\"monitor\"").unwrap();
        let alpha = text.find("\"alpha\"").unwrap();
        assert!(zeta < monitor && monitor < alpha);
        assert!(text.find("\"b\"").unwrap() < text.find("\"a\"").unwrap());
    }

    #[test]
    fn creates_monitor_section_when_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let template = write_template(tmp.path(), r#"{"other": {"x": 1}}"#);

        let doc = materialize(&template, tmp.path(), "out.json").unwrap();
        assert!(doc.monitor_field("input_file").unwrap().ends_with("wave_0.dat"));
        assert!(doc.monitor_field("log_file").unwrap().ends_with("monitor.log"));
        assert_eq!(doc.content["other"], json!({"x": 1}));
    }

    #[test]
    fn two_instances_get_independent_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let template = write_template(tmp.path(), TEMPLATE);
        let a = tmp.path().join("daq00");
        let b = tmp.path().join("daq01");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();

        let doc_a = materialize(&template, &a, "monitor_config.json").unwrap();
        let doc_b = materialize(&template, &b, "monitor_config.json").unwrap();

        assert_ne!(doc_a.path, doc_b.path);
        assert!(doc_a.monitor_field("input_file").unwrap().contains("daq00"));
        assert!(doc_b.monitor_field("input_file").unwrap().contains("daq01"));
        // The template itself is not modified.
        assert_eq!(fs::read_to_string(&template).unwrap(), TEMPLATE);
    }

    #[test]
    fn missing_template_is_a_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = materialize(&tmp.path().join("absent.json"), tmp.path(), "out.json").unwrap_err();
        assert!(matches!(err, LaunchError::ConfigParse { .. }));
    }

    #[test]
    fn malformed_template_is_a_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let template = write_template(tmp.path(), "{\"monitor\": ");
        let err = materialize(&template, tmp.path(), "out.json").unwrap_err();
        assert!(matches!(err, LaunchError::ConfigParse { .. }));
        assert!(!tmp.path().join("out.json").exists());
    }

    #[test]
    fn non_object_shapes_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let template = write_template(tmp.path(), "[1, 2, 3]");
        assert!(materialize(&template, tmp.path(), "out.json").is_err());

        let template = write_template(tmp.path(), r#"{"monitor": "disabled"}"#);
        let err = materialize(&template, tmp.path(), "out.json").unwrap_err();
        assert!(err.to_string().contains("`monitor` must be a JSON object"));
    }

    #[test]
    fn missing_instance_directory_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let template = write_template(tmp.path(), TEMPLATE);
        let err = materialize(&template, &tmp.path().join("nope"), "out.json").unwrap_err();
        assert!(matches!(err, LaunchError::Io { .. }));
    }

    #[test]
    fn stages_acquisition_config_under_fixed_name() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("usb0.txt");
        fs::write(&source, "[COMMON]\nOPEN USB 0 0\n").unwrap();
        let instance = tmp.path().join("daq00");
        fs::create_dir_all(&instance).unwrap();

        let staged = stage_acquisition_config(&source, &instance, "WaveDumpConfig_USB0.txt").unwrap();
        assert_eq!(staged, instance.join("WaveDumpConfig_USB0.txt"));
        assert_eq!(fs::read_to_string(staged).unwrap(), "[COMMON]\nOPEN USB 0 0\n");
    }

    #[test]
    fn staging_missing_source_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = stage_acquisition_config(&tmp.path().join("absent.txt"), tmp.path(), "x.txt")
            .unwrap_err();
        assert!(matches!(err, LaunchError::Io { .. }));
    }
}

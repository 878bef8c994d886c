//! Generation of a reusable workflow job declaring every produced output.

use crate::config::Settings;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// File the job stub is written to.
pub const JOB_STUB_FILE: &str = "job_load_testplan.yml";

/// Step id used by the generated job.
const STEP_ID: &str = "ltp";

/// Flattened keys and values recorded during emission, sorted by key.
pub type OutputRegistry = BTreeMap<String, String>;

/// Render the job stub for the current invocation.
pub fn render_job_stub(settings: &Settings, outputs: &OutputRegistry) -> String {
    let quoted = |s: &str| format!("'{}'", s.replace('\'', "''"));
    let path = |p: &Option<std::path::PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    };
    let sinks = &settings.sinks;

    let mut out = String::new();
    out.push_str("jobs:\n");
    out.push_str("  load_testplan:\n");
    out.push_str("    runs-on: 'ubuntu-latest'\n");
    out.push_str("    steps:\n");
    out.push_str("      - name: 'Load Testplan'\n");
    let _ = writeln!(out, "        id: {}", STEP_ID);
    out.push_str("        uses: 'joernott/load_testplan@v1'\n");
    out.push_str("        with:\n");
    let _ = writeln!(out, "          files: {}", quoted(&settings.files.join(",")));
    let _ = writeln!(out, "          input_type: {}", quoted(settings.input_type.as_str()));
    let _ = writeln!(out, "          separator: {}", quoted(&settings.separator));
    let _ = writeln!(out, "          set_output: {}", sinks.set_output);
    let _ = writeln!(out, "          set_env: {}", sinks.set_env);
    let _ = writeln!(out, "          set_print: {}", sinks.set_print);
    let _ = writeln!(out, "          yaml: {}", quoted(&path(&sinks.yaml)));
    let _ = writeln!(out, "          json: {}", quoted(&path(&sinks.json)));
    let _ = writeln!(out, "          loglevel: {}", quoted(settings.log.level.as_str()));
    let _ = writeln!(
        out,
        "          logfile: {}",
        quoted(settings.log.file.as_deref().unwrap_or_default())
    );

    if outputs.is_empty() {
        out.push_str("    outputs: {}\n");
    } else {
        out.push_str("    outputs:\n");
        for key in outputs.keys() {
            let _ = writeln!(
                out,
                "      {key}: ${{{{ steps.{STEP_ID}.outputs.{key} }}}}"
            );
        }
    }
    out
}

/// Write the job stub to `path`.
pub fn write_job_stub(path: &Path, settings: &Settings, outputs: &OutputRegistry) -> Result<()> {
    std::fs::write(path, render_job_stub(settings, outputs))
        .map_err(|e| Error::sink_io("job-stub", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ConfigValue;

    fn settings() -> Settings {
        Settings {
            files: vec!["defaults.yaml".into(), "https://h/overwrite.yaml".into()],
            separator: "__".into(),
            ..Settings::default()
        }
    }

    fn parse(src: &str) -> ConfigValue {
        ConfigValue::from(serde_yaml::from_str::<serde_yaml::Value>(src).unwrap())
    }

    #[test]
    fn test_stub_echoes_invocation() {
        let stub = parse(&render_job_stub(&settings(), &OutputRegistry::new()));
        let with = stub
            .pointer(&["jobs", "load_testplan", "steps"])
            .and_then(|steps| match steps {
                ConfigValue::Sequence(items) => items.first(),
                _ => None,
            })
            .and_then(|step| step.pointer(&["with"]))
            .cloned()
            .unwrap();

        assert_eq!(
            with.pointer(&["files"]),
            Some(&ConfigValue::from("defaults.yaml,https://h/overwrite.yaml"))
        );
        assert_eq!(with.pointer(&["separator"]), Some(&ConfigValue::from("__")));
        assert_eq!(with.pointer(&["input_type"]), Some(&ConfigValue::from("auto")));
        assert_eq!(with.pointer(&["set_output"]), Some(&ConfigValue::from(false)));
        assert_eq!(with.pointer(&["loglevel"]), Some(&ConfigValue::from("WARN")));
        assert_eq!(with.pointer(&["yaml"]), Some(&ConfigValue::from("")));
    }

    #[test]
    fn test_stub_lists_outputs_sorted() {
        let mut outputs = OutputRegistry::new();
        outputs.insert("string".into(), "String".into());
        outputs.insert("array".into(), "1\n2".into());
        let text = render_job_stub(&settings(), &outputs);

        let array_at = text.find("      array:").unwrap();
        let string_at = text.find("      string:").unwrap();
        assert!(array_at < string_at);

        let stub = parse(&text);
        assert_eq!(
            stub.pointer(&["jobs", "load_testplan", "outputs", "string"]),
            Some(&ConfigValue::from("${{ steps.ltp.outputs.string }}"))
        );
    }

    #[test]
    fn test_stub_without_outputs() {
        let stub = parse(&render_job_stub(&settings(), &OutputRegistry::new()));
        let outputs = stub.pointer(&["jobs", "load_testplan", "outputs"]).unwrap();
        assert_eq!(outputs.as_mapping().map(|m| m.len()), Some(0));
    }

    #[test]
    fn test_write_job_stub_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_job_stub(
            &dir.path().join("missing/job.yml"),
            &settings(),
            &OutputRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SinkIo { sink: "job-stub", .. }));
    }
}

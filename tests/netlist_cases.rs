//! Data-driven expansion cases.
//!
//! Every `*.yaml` file under `tests/cases/` holds a list of cases. A case
//! expands its deck (first line is the title) and checks the live output
//! lines, or the error code when the expansion is expected to fail.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use netmacro::{CacheStore, ExpandConfig, ExpansionPipeline};

#[derive(Debug, Deserialize)]
struct NetlistCase {
    name: String,
    deck: String,
    /// `name=value` configuration overrides.
    #[serde(default)]
    set: Vec<String>,
    /// Lines that must appear, verbatim, in the live output.
    #[serde(default)]
    contains: Vec<String>,
    /// Lines that must not appear.
    #[serde(default)]
    absent: Vec<String>,
    /// Expected error code of the first error.
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Option<usize>,
    #[serde(default)]
    skip: bool,
}

fn cases_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("cases")
}

fn discover_yaml_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

fn load_cases(path: &Path) -> Vec<NetlistCase> {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    serde_yaml::from_str(&content)
        .unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()))
}

fn check_case(case: &NetlistCase) -> Result<(), String> {
    let mut config = ExpandConfig::default();
    for assignment in &case.set {
        config
            .set_assignment(assignment)
            .map_err(|e| format!("bad override '{assignment}': {e}"))?;
    }
    let store = CacheStore::new();
    let result = ExpansionPipeline::new(config).with_cache(&store).run(&case.deck);

    match (result, &case.error) {
        (Ok(out), None) => {
            let lines: Vec<&str> = out.live_lines().iter().map(|l| l.text.as_str()).collect();
            for expected in &case.contains {
                if !lines.contains(&expected.as_str()) {
                    return Err(format!("missing line '{expected}' in:\n{}", lines.join("\n")));
                }
            }
            for unwanted in &case.absent {
                if lines.contains(&unwanted.as_str()) {
                    return Err(format!("unexpected line '{unwanted}'"));
                }
            }
            match case.warnings {
                Some(n) if n != out.expansion.warnings.len() => Err(format!(
                    "expected {n} warnings, got {}",
                    out.expansion.warnings.len()
                )),
                _ => Ok(()),
            }
        }
        (Ok(_), Some(code)) => Err(format!("expected error {code}, expansion succeeded")),
        (Err(err), Some(code)) => {
            let actual = err
                .first()
                .map(|e| e.diagnostic_info.error_code.clone())
                .unwrap_or_default();
            if &actual == code {
                Ok(())
            } else {
                Err(format!("expected error {code}, got {actual}"))
            }
        }
        (Err(err), None) => Err(format!("unexpected failure: {err}")),
    }
}

#[test]
fn yaml_cases() {
    let files = discover_yaml_files(&cases_dir());
    assert!(!files.is_empty(), "no case files found");

    let mut failures = Vec::new();
    let mut ran = 0;
    for file in &files {
        for case in load_cases(file) {
            if case.skip {
                continue;
            }
            ran += 1;
            if let Err(reason) = check_case(&case) {
                failures.push(format!("{} / {}: {}", file.display(), case.name, reason));
            }
        }
    }
    assert!(ran > 0);
    assert!(failures.is_empty(), "{} case(s) failed:\n{}", failures.len(), failures.join("\n\n"));
}

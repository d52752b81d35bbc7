//! Runs every `fixtures/*.json` case through the decoder.
//!
//! usage: dev-test-runner [FIXTURE_DIR] [NAME_REGEX]
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use argform::path_de::{from_str_with_path, from_value_with_path};
use argform::{ArgSpec, CodecConfig, Error, FlatForm};
use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

static FIXTURE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+\.json$").expect("fixture pattern compiles"));

#[derive(Debug, Deserialize)]
struct Fixture {
    name: String,
    #[serde(default)]
    delimiter: Option<String>,
    argspec: Value,
    form: Value,
    #[serde(default)]
    expect: Option<Value>,
    #[serde(default)]
    expect_error: Option<String>,
    #[serde(default)]
    expect_diagnostics: Option<usize>,
}

enum Outcome {
    Pass,
    Fail(String),
}

fn run_fixture(fixture: Fixture) -> Outcome {
    let config = match fixture.delimiter {
        Some(d) => CodecConfig::with_delimiter(d),
        None => CodecConfig::default(),
    };
    let result = (|| -> Result<argform::Decoded, Error> {
        let spec = ArgSpec::from_json(fixture.argspec)?;
        let form: FlatForm = from_value_with_path(fixture.form).map_err(Error::Form)?;
        Ok(argform::decode(&spec, &form, &config)?)
    })();

    match (result, fixture.expect_error) {
        (Err(error), Some(kind)) if error.kind() == kind => Outcome::Pass,
        (Err(error), Some(kind)) => {
            Outcome::Fail(format!("expected {kind} error, got {} ({error})", error.kind()))
        }
        (Err(error), None) => Outcome::Fail(format!("unexpected error: {error}")),
        (Ok(_), Some(kind)) => Outcome::Fail(format!("expected {kind} error, decoding succeeded")),
        (Ok(decoded), None) => {
            let actual = match serde_json::to_value(&decoded.arguments) {
                Ok(v) => v,
                Err(error) => return Outcome::Fail(format!("serialization failed: {error}")),
            };
            if let Some(expect) = fixture.expect {
                if actual != expect {
                    return Outcome::Fail(format!("expected {expect}\n     got {actual}"));
                }
            }
            match fixture.expect_diagnostics {
                Some(n) if n != decoded.diagnostics.len() => Outcome::Fail(format!(
                    "expected {n} diagnostics, got {:?}",
                    decoded.diagnostics
                )),
                _ => Outcome::Pass,
            }
        }
    }
}

fn fixture_paths(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_fixture = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| FIXTURE_FILE.is_match(n));
        if is_fixture {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures"));
    let filter = match args.next().map(|f| Regex::new(&f)).transpose() {
        Ok(f) => f,
        Err(error) => {
            eprintln!("invalid name filter: {error}");
            return ExitCode::FAILURE;
        }
    };

    let paths = match fixture_paths(&dir) {
        Ok(p) => p,
        Err(error) => {
            eprintln!("failed to list fixtures in {}: {error}", dir.display());
            return ExitCode::FAILURE;
        }
    };

    let (mut passed, mut failed) = (0usize, 0usize);
    for path in paths {
        let path_str = path.to_string_lossy().to_string();
        let fixture = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|src| from_str_with_path::<Fixture>(&src).map_err(|e| e.to_string()));
        let fixture = match fixture {
            Ok(x) => x,
            Err(error) => {
                failed += 1;
                eprintln!("{} {path_str}: {error}", "✗".red());
                continue;
            }
        };
        if filter.as_ref().is_some_and(|f| !f.is_match(&fixture.name)) {
            continue;
        }
        let name = fixture.name.clone();
        match run_fixture(fixture) {
            Outcome::Pass => {
                passed += 1;
                eprintln!("{} {name}", "✓".green());
            }
            Outcome::Fail(why) => {
                failed += 1;
                eprintln!("{} {name} ({path_str})\n     {why}", "✗".red());
            }
        }
    }

    eprintln!("{passed} passed, {failed} failed");
    if failed > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

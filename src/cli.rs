//! Minimal CLI: argspec → (describe | decode)
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;

use argform::sources::StaticRegistryDoc;
use argform::{ArgSpec, CodecConfig, Decoded, Describer, FlatForm};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// describe an argspec as renderable form fields, or decode flat form submissions against it
#[derive(Parser, Debug)]
#[command(name = "argform", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// log debug output (otherwise RUST_LOG decides)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the field descriptor tree for an argspec
    Describe(DescribeOut),
    /// decode one or more flat form JSON files into typed arguments
    Decode(DecodeOut),
}

#[derive(Args, Debug, Clone)]
struct SpecSettings {
    /// argspec JSON file
    #[arg(long, short)]
    spec: PathBuf,

    /// separator between a struct-dict path and its child key
    #[arg(long, default_value = argform::config::DEFAULT_DELIMITER)]
    delimiter: String,

    /// deepest schema nesting to walk
    #[arg(long, default_value_t = argform::config::DEFAULT_MAX_DEPTH)]
    max_depth: usize,
}

#[derive(clap::Parser, Debug)]
struct DescribeOut {
    #[command(flatten)]
    spec_settings: SpecSettings,

    /// JSON file mapping `cls(...)` paths to display formats and instances
    #[arg(long)]
    sources: Option<PathBuf>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct DecodeOut {
    #[command(flatten)]
    spec_settings: SpecSettings,

    /// One or more form files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    form: Vec<String>,

    /// output directory, one `<form stem>.decoded.json` per form (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SpecSettings {
    fn config(&self) -> Result<CodecConfig> {
        let config = CodecConfig { delimiter: self.delimiter.clone(), max_depth: self.max_depth };
        config.validate()?;
        Ok(config)
    }

    fn load(&self) -> Result<ArgSpec> {
        let source = std::fs::read_to_string(&self.spec)
            .with_context(|| format!("failed to read argspec {}", self.spec.display()))?;
        source
            .parse::<ArgSpec>()
            .with_context(|| format!("failed to load argspec {}", self.spec.display()))
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        init_tracing(self.verbose);
        match &self.cmd {
            Command::Describe(target) => target.run(),
            Command::Decode(target) => target.run(),
        }
    }
}

impl DescribeOut {
    fn run(&self) -> Result<()> {
        let config = self.spec_settings.config()?;
        let spec = self.spec_settings.load()?;
        let registry = match &self.sources {
            Some(path) => {
                let src = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read sources {}", path.display()))?;
                let doc: StaticRegistryDoc = argform::path_de::from_str_with_path(&src)
                    .with_context(|| format!("failed to parse sources {}", path.display()))?;
                Some(doc.into_registry()?)
            }
            None => None,
        };

        let mut describer = Describer::new(&config);
        if let Some(registry) = registry.as_ref() {
            describer = describer.with_sources(registry);
        }
        let descriptor = describer.describe_argspec(&spec)?;
        let rendered = serde_json::to_string_pretty(&descriptor)?;
        write_output(self.out.as_deref(), &rendered)
    }
}

impl DecodeOut {
    fn run(&self) -> Result<()> {
        let config = self.spec_settings.config()?;
        let spec = self.spec_settings.load()?;
        let form_paths = resolve_file_path_patterns(&self.form)?;

        // the argspec and config are shared read-only across workers
        let results: Vec<(PathBuf, Result<Decoded>)> = form_paths
            .into_par_iter()
            .map(|path| {
                let decoded = decode_file(&spec, &config, &path);
                (path, decoded)
            })
            .collect();

        let mut failures = 0usize;
        for (path, result) in results {
            let path_str = path.to_string_lossy();
            let decoded = match result {
                Ok(x) => x,
                Err(error) => {
                    failures += 1;
                    eprintln!("{} {path_str}: {error:#}", "rejected".red().bold());
                    continue;
                }
            };
            for diagnostic in &decoded.diagnostics {
                eprintln!("{} {path_str}: {diagnostic}", "warning".yellow().bold());
            }
            let rendered = serde_json::to_string_pretty(&decoded.arguments)?;
            match self.out.as_ref() {
                Some(dir) => {
                    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
                    write_output(Some(&dir.join(format!("{stem}.decoded.json"))), &rendered)?;
                }
                None => println!("{rendered}"),
            }
        }

        if failures > 0 {
            bail!("{failures} form(s) rejected");
        }
        Ok(())
    }
}

fn decode_file(spec: &ArgSpec, config: &CodecConfig, path: &Path) -> Result<Decoded> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read form {}", path.display()))?;
    let form: FlatForm = source.parse().context("failed to parse form")?;
    tracing::debug!(path = %path.display(), entries = form.len(), "decoding form");
    Ok(argform::decode(spec, &form, config)?)
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn write_output(out: Option<&Path>, contents: &str) -> Result<()> {
    let Some(out) = out else {
        println!("{contents}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // an explicit glob that matched nothing is surfaced as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decode_arguments() {
        let cli = CommandLineInterface::try_parse_from([
            "argform", "decode", "--spec", "s.json", "--form", "a.json", "b.json", "--delimiter", ".",
        ])
        .unwrap();
        let Command::Decode(d) = cli.cmd else { panic!("decode expected") };
        assert_eq!(d.form, ["a.json", "b.json"]);
        assert_eq!(d.spec_settings.config().unwrap().delimiter, ".");
    }

    #[test]
    fn rejects_bracket_delimiter() {
        let cli = CommandLineInterface::try_parse_from([
            "argform", "describe", "--spec", "s.json", "--delimiter", "[",
        ])
        .unwrap();
        let Command::Describe(d) = cli.cmd else { panic!("describe expected") };
        assert!(d.spec_settings.config().is_err());
    }

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["forms/a.json"]).unwrap();
        assert_eq!(paths, [PathBuf::from("forms/a.json")]);
        assert!(resolve_file_path_patterns(["/definitely/not/here/*.json"]).is_err());
    }
}

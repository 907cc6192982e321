//! TC-017: CLI subcommands — init, validate, translate, run-source,
//! run-target, verify, compilers.

use crate::core::orchestrator::Orchestrator;
use crate::core::parser;
use crate::core::sandbox::SourceSandbox;
use crate::core::toolchain::{self, Toolchain};
use crate::core::types::{SourceProgram, TransccConfig};
use crate::core::verify::{self, Comparator, OutputComparison, VerificationReport};
use clap::Subcommand;
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a transcc.yaml with default settings
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate transcc.yaml
    Validate {
        /// Path to transcc.yaml
        #[arg(short, long, default_value = "transcc.yaml")]
        file: PathBuf,
    },

    /// Stream a C++ translation of a Python file to stdout
    Translate {
        /// Python source file
        file: PathBuf,

        /// Backend: GPT or Claude
        #[arg(short, long, default_value = "GPT")]
        backend: String,

        /// Also write the final translation here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a Python file in the source sandbox
    RunSource {
        /// Python source file
        file: PathBuf,
    },

    /// Build and run a C++ file with the configured toolchain
    RunTarget {
        /// C++ source file
        file: PathBuf,
    },

    /// Translate, run both programs, and compare their output
    Verify {
        /// Python source file
        file: PathBuf,

        /// Backend: GPT or Claude
        #[arg(short, long, default_value = "GPT")]
        backend: String,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe the configured compiler candidates
    Compilers,
}

/// Dispatch a CLI command. `config_path` may not exist (defaults apply).
pub async fn dispatch(cmd: Commands, config_path: &Path) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Translate {
            file,
            backend,
            output,
        } => {
            let config = load_config(config_path)?;
            cmd_translate(&config, &file, &backend, output.as_deref(), &cancel_on_interrupt()).await
        }
        Commands::RunSource { file } => {
            let config = load_config(config_path)?;
            cmd_run_source(&config, &file, &cancel_on_interrupt()).await
        }
        Commands::RunTarget { file } => {
            let config = load_config(config_path)?;
            cmd_run_target(&config, &file, &cancel_on_interrupt()).await
        }
        Commands::Verify {
            file,
            backend,
            json,
        } => {
            let config = load_config(config_path)?;
            cmd_verify(&config, &file, &backend, json, &cancel_on_interrupt()).await
        }
        Commands::Compilers => {
            let config = load_config(config_path)?;
            cmd_compilers(&config).await
        }
    }
}

const TEMPLATE: &str = r#"version: "1.0"

backends:
  gpt:
    model: gpt-4o
    base_url: https://api.openai.com/v1
    api_key_env: OPENAI_API_KEY
  claude:
    model: claude-3-5-sonnet-20240620
    base_url: https://api.anthropic.com
    api_key_env: ANTHROPIC_API_KEY
    max_tokens: 2000

source:
  interpreter: python3
  # Pure-Python benchmarks can take minutes; 0 disables the limit
  timeout_secs: 600

toolchain:
  work_dir: .
  source_file: optimized.cpp
  artifact: optimized
  std: c++17
  flags: [-O3]
  compilers: [g++, clang++]
  build_timeout_secs: 120
  run_timeout_secs: 60

compare:
  ignore_lines: ["(?i)^execution time"]
"#;

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("transcc.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    std::fs::write(&config_path, TEMPLATE)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized transcc at {}", path.display());
    println!("  Created: {}", config_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);

    if errors.is_empty() {
        println!(
            "OK: {} (gpt: {}, claude: {}, compilers: {})",
            file.display(),
            config.backends.gpt.model,
            config.backends.claude.model,
            config.toolchain.compilers.join(", ")
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

/// Load (or default) and validate the config.
fn load_config(path: &Path) -> Result<TransccConfig, String> {
    let config = parser::load_or_default(path)?;
    let errors = parser::validate_config(&config);
    if errors.is_empty() {
        return Ok(config);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

fn read_program(file: &Path) -> Result<String, String> {
    std::fs::read_to_string(file).map_err(|e| format!("cannot read {}: {}", file.display(), e))
}

/// Token cancelled on Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling");
            trigger.cancel();
        }
    });
    cancel
}

/// Text to print for `snapshot` when `shown` is already on screen, or
/// `None` if the snapshot rewrote what was shown (a fence got stripped).
fn live_suffix<'a>(shown: &str, snapshot: &'a str) -> Option<&'a str> {
    snapshot.strip_prefix(shown)
}

/// Write and flush a piece of live output. A closed pipe ends the command.
fn emit(out: &mut impl Write, text: &str) -> Result<(), String> {
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|e| format!("cannot write translation: {}", e))
}

async fn cmd_translate(
    config: &TransccConfig,
    file: &Path,
    backend: &str,
    output: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let source = SourceProgram::new(read_program(file)?);
    let orchestrator = Orchestrator::from_config(&config.backends);
    let mut stream = orchestrator
        .translate(&source, backend, cancel.clone())
        .await
        .map_err(|e| e.to_string())?;

    let mut shown = String::new();
    let mut latest = String::new();
    while let Some(item) = stream.next().await {
        latest = item.map_err(|e| e.to_string())?.into_string();
        if let Some(suffix) = live_suffix(&shown, &latest) {
            emit(&mut std::io::stdout(), suffix)?;
            shown.clone_from(&latest);
        }
    }
    if cancel.is_cancelled() {
        return Err("cancelled".to_string());
    }

    if shown != latest {
        println!();
        eprintln!("-- final translation --");
        emit(&mut std::io::stdout(), &latest)?;
    }
    if !latest.ends_with('\n') {
        println!();
    }

    if let Some(path) = output {
        std::fs::write(path, &latest)
            .map_err(|e| format!("cannot write {}: {}", path.display(), e))?;
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

async fn cmd_run_source(
    config: &TransccConfig,
    file: &Path,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let source = SourceProgram::new(read_program(file)?);
    let run = SourceSandbox::from_config(&config.source)
        .run_source(&source, cancel)
        .await;
    if !run.result.is_success() {
        return Err(run.result.render());
    }
    print!("{}", run.result.render());
    Ok(())
}

async fn cmd_run_target(
    config: &TransccConfig,
    file: &Path,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let code = read_program(file)?;
    let report = Toolchain::new(config.toolchain.clone())
        .execute(&code, cancel)
        .await;
    if !report.result.is_success() {
        return Err(report.result.render());
    }
    print!("{}", report.result.render());
    Ok(())
}

async fn cmd_verify(
    config: &TransccConfig,
    file: &Path,
    backend: &str,
    json: bool,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let source = SourceProgram::new(read_program(file)?);
    let orchestrator = Orchestrator::from_config(&config.backends);
    let sandbox = SourceSandbox::from_config(&config.source);
    let toolchain = Toolchain::new(config.toolchain.clone());
    let comparator = Comparator::from_config(&config.compare).map_err(|e| e.to_string())?;

    let report = verify::verify(
        &orchestrator,
        &sandbox,
        &toolchain,
        &comparator,
        &source,
        backend,
        cancel,
    )
    .await
    .map_err(|e| e.to_string())?;

    if json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("cannot serialize report: {}", e))?;
        println!("{}", text);
    } else {
        print_report(&report);
    }

    match &report.comparison {
        OutputComparison::Match { .. } => Ok(()),
        OutputComparison::Diverged { line, .. } => Err(format!("outputs diverge at line {}", line)),
        OutputComparison::Incomparable { reason } => Err(format!("outputs not comparable: {}", reason)),
    }
}

fn print_report(report: &VerificationReport) {
    let t = &report.translation;
    println!(
        "Translated with {} ({} increments, {} bytes)",
        t.backend,
        t.increments,
        t.code.len()
    );
    println!("  Source: {}", report.source.result.label());
    match &report.target.compiler {
        Some(cc) => println!("  Target: {} (compiler {})", report.target.result.label(), cc),
        None => println!("  Target: {}", report.target.result.label()),
    }
    if !report.target.result.is_success() {
        for line in report.target.result.render().lines() {
            println!("    {}", line);
        }
    }
    println!();

    match &report.comparison {
        OutputComparison::Match { lines, digest } => {
            println!("MATCH: {} line(s), {}", lines, digest)
        }
        OutputComparison::Diverged {
            line,
            source,
            target,
        } => {
            println!("DIVERGED at line {}:", line);
            println!("  source: {}", source.as_deref().unwrap_or("<end of output>"));
            println!("  target: {}", target.as_deref().unwrap_or("<end of output>"));
        }
        OutputComparison::Incomparable { reason } => println!("INCOMPARABLE: {}", reason),
    }
}

async fn cmd_compilers(config: &TransccConfig) -> Result<(), String> {
    let cancel = CancellationToken::new();
    for candidate in &config.toolchain.compilers {
        let found = toolchain::discover_compiler(std::slice::from_ref(candidate), &cancel).await;
        println!(
            "  {:<12} {}",
            candidate,
            if found.is_ok() { "ok" } else { "not found" }
        );
    }

    match toolchain::discover_compiler(&config.toolchain.compilers, &cancel).await {
        Ok(cc) => {
            println!("Selected: {}", cc);
            Ok(())
        }
        Err(result) => Err(result.render()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ToolchainContext;

    #[test]
    fn test_tc017_init() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("project");
        cmd_init(&sub).unwrap();
        assert!(sub.join("transcc.yaml").exists());
    }

    #[test]
    fn test_tc017_init_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("transcc.yaml"), "exists").unwrap();
        assert!(cmd_init(dir.path()).is_err());
    }

    #[test]
    fn test_tc017_template_is_valid_and_matches_defaults() {
        let config = parser::parse_config(TEMPLATE).unwrap();
        assert!(parser::validate_config(&config).is_empty());
        let defaults = TransccConfig::default();
        assert_eq!(config.backends.gpt.model, defaults.backends.gpt.model);
        assert_eq!(config.backends.claude.max_tokens, defaults.backends.claude.max_tokens);
        assert_eq!(config.toolchain.compilers, defaults.toolchain.compilers);
        assert_eq!(config.toolchain.flags, defaults.toolchain.flags);
        assert_eq!(config.source.timeout_secs, defaults.source.timeout_secs);
        assert_eq!(config.compare.ignore_lines, defaults.compare.ignore_lines);
    }

    #[test]
    fn test_tc017_validate_valid() {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path()).unwrap();
        assert!(cmd_validate(&dir.path().join("transcc.yaml")).is_ok());
    }

    #[test]
    fn test_tc017_validate_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("transcc.yaml");
        std::fs::write(&file, "version: \"2.0\"\ntoolchain:\n  compilers: []\n").unwrap();
        let err = cmd_validate(&file).unwrap_err();
        assert_eq!(err, "2 validation error(s)");
    }

    #[test]
    fn test_tc017_load_config_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn test_tc017_live_suffix() {
        assert_eq!(live_suffix("", "int"), Some("int"));
        assert_eq!(live_suffix("int", "int main"), Some(" main"));
        assert_eq!(live_suffix("``", ""), None);
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tc017_emit_reports_closed_pipe() {
        let err = emit(&mut ClosedPipe, "int main").unwrap_err();
        assert!(err.starts_with("cannot write translation"));

        let mut buf = Vec::new();
        emit(&mut buf, "int main").unwrap();
        assert_eq!(buf, b"int main");
    }

    #[tokio::test]
    async fn test_tc017_translate_invalid_backend() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        std::fs::write(&file, "print(1)\n").unwrap();
        let err = cmd_translate(
            &TransccConfig::default(),
            &file,
            "Gemini",
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.contains("invalid backend selection 'Gemini'"));
    }

    #[tokio::test]
    async fn test_tc017_translate_writes_output() {
        let mut server = mockito::Server::new_async().await;
        let chunk = |text: &str| {
            format!(
                "data: {}\n\n",
                serde_json::json!({ "choices": [{ "delta": { "content": text } }] })
            )
        };
        let body = format!(
            "{}{}{}data: [DONE]\n\n",
            chunk("```cpp\n"),
            chunk("int main() { return 0; }\n"),
            chunk("```")
        );
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let mut config = TransccConfig::default();
        config.backends.gpt.base_url = server.url();
        // Any always-set variable serves as a key source for the mock
        config.backends.gpt.api_key_env = "PATH".into();

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        let out = dir.path().join("out.cpp");
        std::fs::write(&file, "print(1)\n").unwrap();
        cmd_translate(&config, &file, "gpt", Some(&out), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(out).unwrap(),
            "int main() { return 0; }\n"
        );
    }

    #[tokio::test]
    async fn test_tc017_missing_source_file() {
        let err = cmd_run_source(
            &TransccConfig::default(),
            Path::new("/nonexistent/transcc/a.py"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.starts_with("cannot read"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tc017_run_target_fake_compiler() {
        let dir = tempfile::tempdir().unwrap();
        let config = TransccConfig {
            toolchain: crate::core::toolchain::tests::fake_context(dir.path()),
            ..TransccConfig::default()
        };

        let ok = dir.path().join("ok.cpp");
        std::fs::write(&ok, "#!/bin/sh\necho 42\n").unwrap();
        cmd_run_target(&config, &ok, &CancellationToken::new())
            .await
            .unwrap();

        let bad = dir.path().join("bad.cpp");
        std::fs::write(&bad, "SYNTAX ERROR\n").unwrap();
        let err = cmd_run_target(&config, &bad, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.starts_with("Compilation failed with "));
        assert!(err.contains("expected unqualified-id"));
    }

    #[tokio::test]
    async fn test_tc017_compilers_none_found() {
        let config = TransccConfig {
            toolchain: ToolchainContext {
                compilers: vec!["/nonexistent/transcc-cc".into()],
                ..ToolchainContext::default()
            },
            ..TransccConfig::default()
        };
        let err = cmd_compilers(&config).await.unwrap_err();
        assert!(err.contains("No suitable C++ compiler found"));
    }
}

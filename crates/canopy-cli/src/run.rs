//! Analysis orchestration: configuration, processor setup and output.

use crate::formatters;
use crate::OutputFormat;
use anyhow::{Context, Result};
use canopy_config::{CanopyConfig, ConfigManager};
use canopy_core::{AnalysisEnvelope, AnalyzerRegistry};
use canopy_fs::NativeFileSystem;
use canopy_processor::{default_max_concurrency, Processor, ProcessorOptions};
use std::io::IsTerminal;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{info, warn};

/// Options for a single CLI invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub paths: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    pub max_concurrency: Option<NonZeroUsize>,
    pub config: Option<PathBuf>,
    pub compact: bool,
    pub strict: bool,
    pub list_analyzers: bool,
    pub show_config: bool,
}

pub fn run(options: RunOptions) -> Result<()> {
    let runtime = Runtime::new().context("Failed to create tokio runtime")?;
    runtime.block_on(run_async(options))
}

/// Maps a failed run to the process exit status.
///
/// Partial failures never get here: they are error nodes in a successful
/// result. Unclassifiable input exits with 2, an interrupted run with 130.
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<canopy_processor::Error>() {
        Some(e) if e.is_cancelled() => ExitCode::from(130),
        Some(e) if e.is_classification() => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

async fn run_async(options: RunOptions) -> Result<()> {
    let manager = load_config(&options).await?;

    if options.show_config {
        if let Some(path) = manager.config_path() {
            println!("# {}", path.display());
        }
        print!("{}", manager.to_toml_string().context("Failed to render configuration")?);
        return Ok(());
    }

    let config = manager.into_config();
    let registry = Arc::new(canopy_backend_csharp::registry(
        config.processing.reject_syntax_errors,
    ));

    if options.list_analyzers {
        print!("{}", describe_analyzers(&registry));
        return Ok(());
    }

    let fs = Arc::new(
        NativeFileSystem::unscoped(".").context("Failed to resolve the current directory")?,
    );
    let processor = Processor::new(fs, registry, processor_options(&config));
    info!(
        "Analyzing {} input(s) with up to {} concurrent parses",
        options.paths.len(),
        processor.max_concurrency()
    );

    let cancel = processor.cancellation_token().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding work");
            cancel.cancel();
        }
    });

    let result = analyze(&processor, &options.paths).await;
    interrupt.abort();
    let envelope = result?;

    if envelope.has_errors() {
        warn!(
            "{} input(s) could not be analyzed; see error nodes in the output",
            envelope.root_node.error_nodes().len()
        );
    }

    write_output(&envelope, &options, config.output.pretty)
}

async fn load_config(options: &RunOptions) -> Result<ConfigManager> {
    let mut manager = match &options.config {
        Some(path) => ConfigManager::load_from(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            let anchor = options
                .paths
                .first()
                .map(PathBuf::as_path)
                .unwrap_or(Path::new("."));
            ConfigManager::discover(anchor)
                .await
                .context("Failed to load configuration")?
        }
    };

    let config = manager.config_mut();
    if let Some(n) = options.max_concurrency {
        config.processing.max_concurrency = Some(n.get());
    }
    if options.compact {
        config.output.pretty = false;
    }
    if options.strict {
        config.processing.reject_syntax_errors = true;
    }
    canopy_config::validate(manager.config()).context("Invalid configuration")?;
    Ok(manager)
}

fn processor_options(config: &CanopyConfig) -> ProcessorOptions {
    ProcessorOptions {
        max_concurrency: config
            .processing
            .max_concurrency
            .unwrap_or_else(default_max_concurrency),
        normalize: config.normalize_options(),
        discovery: config.discovery_options(),
    }
}

async fn analyze(
    processor: &Processor<NativeFileSystem>,
    paths: &[PathBuf],
) -> Result<AnalysisEnvelope> {
    match paths {
        [path] => processor
            .process_path(path)
            .await
            .with_context(|| format!("Failed to analyze {}", path.display())),
        _ => processor
            .process_paths(paths)
            .await
            .context("Failed to analyze inputs"),
    }
}

fn write_output(envelope: &AnalysisEnvelope, options: &RunOptions, pretty: bool) -> Result<()> {
    let to_terminal = options.output.is_none() && std::io::stdout().is_terminal();
    colored::control::set_override(to_terminal);

    let rendered = formatters::render(options.format, envelope, pretty)?;
    match &options.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn describe_analyzers(registry: &AnalyzerRegistry) -> String {
    let mut out = String::new();
    for analyzer in registry.all_analyzers() {
        let capability = analyzer.capability();
        out.push_str(analyzer.name());
        out.push('\n');
        out.push_str(&format!("  files:    {}\n", join(capability.file_extensions())));
        out.push_str(&format!("  projects: {}\n", join(capability.project_extensions())));
    }
    out.push_str(&format!(
        "solutions: {}\n",
        canopy_manifest::SOLUTION_EXTENSIONS.join(", ")
    ));
    out
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_describe_analyzers() {
        let registry = canopy_backend_csharp::registry(false);
        let text = describe_analyzers(&registry);
        assert!(text.starts_with("csharp\n"));
        assert!(text.contains("files:    .cs, .csx"));
        assert!(text.contains("projects: .csproj"));
        assert!(text.ends_with("solutions: .sln, .slnx\n"));
    }

    #[test]
    fn test_processor_options_from_config() {
        let mut config = CanopyConfig::default();
        assert_eq!(processor_options(&config).max_concurrency, default_max_concurrency());

        config.processing.max_concurrency = Some(3);
        config.processing.parallel_child_threshold = 8;
        let options = processor_options(&config);
        assert_eq!(options.max_concurrency, 3);
        assert_eq!(options.normalize.parallel_child_threshold, 8);
    }

    #[tokio::test]
    async fn test_cli_flags_override_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("canopy.toml");
        fs::write(&config_path, "[processing]\nmax_concurrency = 2\n").unwrap();

        let options = RunOptions {
            config: Some(config_path),
            max_concurrency: NonZeroUsize::new(5),
            compact: true,
            strict: true,
            ..RunOptions::default()
        };
        let manager = load_config(&options).await.unwrap();
        assert_eq!(manager.config().processing.max_concurrency, Some(5));
        assert!(!manager.config().output.pretty);
        assert!(manager.config().processing.reject_syntax_errors);
    }

    #[tokio::test]
    async fn test_missing_config_file_is_an_error() {
        let options = RunOptions {
            config: Some(PathBuf::from("/definitely/not/here/canopy.toml")),
            ..RunOptions::default()
        };
        let err = load_config(&options).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load config"));
    }

    #[tokio::test]
    async fn test_unclassifiable_input_exit_code() {
        let temp_dir = TempDir::new().unwrap();
        let notes = temp_dir.path().join("notes.txt");
        fs::write(&notes, "hello").unwrap();

        let fs = Arc::new(NativeFileSystem::unscoped(temp_dir.path()).unwrap());
        let processor = Processor::new(
            fs,
            canopy_backend_csharp::default_registry(),
            ProcessorOptions::default(),
        );
        let err = analyze(&processor, &[notes]).await.unwrap_err();
        assert_eq!(exit_code_for(&err), ExitCode::from(2));
    }

    #[tokio::test]
    async fn test_single_file_output() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("Program.cs");
        fs::write(&source, "class Program { static void Main() {} }").unwrap();
        let output = temp_dir.path().join("out.json");

        let fs = Arc::new(NativeFileSystem::unscoped(temp_dir.path()).unwrap());
        let processor = Processor::new(
            fs,
            canopy_backend_csharp::default_registry(),
            ProcessorOptions::default(),
        );
        let envelope = analyze(&processor, &[source]).await.unwrap();
        let options = RunOptions {
            output: Some(output.clone()),
            ..RunOptions::default()
        };
        write_output(&envelope, &options, false).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["rootNode"]["kindTag"], "compilation_unit");
    }
}

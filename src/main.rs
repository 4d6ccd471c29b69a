// MecmLog - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Configuration loading and logging initialisation
// 3. Path resolution and source loading
// 4. Batch output, or the interactive session

use mecmlog::app::controller::{ControllerEvent, ControllerSettings, FilterController};
use mecmlog::app::session::{self, Session};
use mecmlog::app::worker::FilterWorker;
use mecmlog::core::export;
use mecmlog::core::filter::{self, FilterInputs, FilterSpec, SearchMode};
use mecmlog::core::model::{FacetCategory, LogEntry, LogType, RowSummary};
use mecmlog::core::timestamp;
use mecmlog::platform::config::{self, AppConfig, ColorChoice, PlatformPaths};
use mecmlog::platform::fs::FsSourceReader;
use mecmlog::ui::repl::Repl;
use mecmlog::ui::table::{self, RenderOptions};
use mecmlog::util;
use mecmlog::util::error::{ExportError, MecmLogError};

use clap::{Parser, ValueEnum};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Batch output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

/// MecmLog - Configuration Manager client log viewer.
///
/// Merges CMTrace-format logs from files and folders into one chronological
/// stream and filters it by text, regex, source, component, type and time.
#[derive(Parser, Debug)]
#[command(name = "mecmlog", version, about)]
struct Cli {
    /// Log files or folders (folders expand to their *.log files).
    paths: Vec<PathBuf>,

    /// Search text matched against source, timestamp, component, type and message.
    #[arg(short = 's', long)]
    search: Option<String>,

    /// Treat the search text as a case-insensitive regular expression.
    #[arg(short = 'r', long)]
    regex: bool,

    /// Only show entries from this source file (repeatable).
    #[arg(long = "source", value_name = "SOURCE")]
    sources: Vec<String>,

    /// Only show entries from this component (repeatable).
    #[arg(long = "component", value_name = "COMPONENT")]
    components: Vec<String>,

    /// Only show entries of this type: info, warning, error, unknown (repeatable).
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    types: Vec<String>,

    /// Only show entries within the time window around this timestamp
    /// (e.g. "01-15-2024 14:30:00.000").
    #[arg(short = 'a', long, value_name = "TIMESTAMP")]
    around: Option<String>,

    /// Output format for batch mode.
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Write batch output to this file instead of stdout.
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Start an interactive session.
    #[arg(short = 'i', long)]
    interactive: bool,

    /// Use this config file instead of the platform default.
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();

    let (app_config, config_warnings) = match &cli.config {
        Some(path) => match config::load_config_file(path) {
            Ok(loaded) => loaded,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(2);
            }
        },
        None => config::load_config(&PlatformPaths::resolve().config_dir),
    };

    if let Some(warning) = util::logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    ) {
        eprintln!("Warning: {warning}");
    }

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        interactive = cli.interactive,
        "MecmLog starting"
    );

    for warning in &config_warnings {
        eprintln!("Warning: {warning}");
    }

    if let Err(e) = run(&cli, &app_config) {
        tracing::error!(error = %e, "Fatal error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli, app_config: &AppConfig) -> Result<(), MecmLogError> {
    let inputs = initial_inputs(cli)?;

    if cli.paths.is_empty() && !cli.interactive {
        return Err(MecmLogError::InvalidArgument {
            message: "no log files or folders given (use --interactive to start empty)".to_string(),
        });
    }

    let reader = FsSourceReader;
    let discovery = app_config.discovery();
    let (paths, warnings) = session::resolve_paths(&cli.paths, &discovery);
    for warning in &warnings {
        eprintln!("Warning: {warning}");
    }

    let mut session = Session::load(&paths, &reader);
    for warning in session.take_warnings() {
        eprintln!("Warning: {warning}");
    }

    let summary = session.summary();
    tracing::info!(
        sources = summary.sources.len(),
        failed = summary.failed_sources,
        entries = summary.total_entries,
        unparsed_timestamps = summary.unparsed_timestamps,
        duration_ms = summary.duration.as_millis() as u64,
        "Load complete"
    );

    if cli.interactive {
        run_interactive(session, inputs, app_config, &reader)
    } else {
        run_batch(cli, &session, &inputs, app_config)
    }
}

/// Filter selections given on the command line.
fn initial_inputs(cli: &Cli) -> Result<FilterInputs, MecmLogError> {
    let mut inputs = FilterInputs {
        search_text: cli.search.clone().unwrap_or_default(),
        mode: if cli.regex {
            SearchMode::Regex
        } else {
            SearchMode::Literal
        },
        ..Default::default()
    };

    for source in &cli.sources {
        inputs.facets.sources.insert(source.clone());
    }
    for component in &cli.components {
        inputs.facets.components.insert(component.clone());
    }
    for name in &cli.types {
        let log_type = LogType::from_label(name).ok_or_else(|| MecmLogError::InvalidArgument {
            message: format!("unknown type '{name}' (expected info, warning, error or unknown)"),
        })?;
        inputs.facets.types.insert(log_type.label().to_string());
    }

    if let Some(around) = &cli.around {
        if timestamp::interpret(around).is_none() {
            return Err(MecmLogError::InvalidArgument {
                message: format!("cannot interpret '{around}' as a timestamp"),
            });
        }
        inputs.anchor = Some(around.clone());
    }

    Ok(inputs)
}

fn use_color(choice: ColorChoice, to_terminal: bool) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => to_terminal,
    }
}

fn run_batch(
    cli: &Cli,
    session: &Session,
    inputs: &FilterInputs,
    app_config: &AppConfig,
) -> Result<(), MecmLogError> {
    let spec = FilterSpec::build(inputs, app_config.time_window_secs)?;
    if let Some(label) = spec.anchor().and_then(|a| a.label()) {
        eprintln!("{label}");
    }

    let results = filter::execute(session.rows(), &spec);
    let summary = RowSummary::from_results(&results);

    let entries = session.entries();
    let visible: Vec<&LogEntry> = entries
        .iter()
        .zip(&results)
        .filter(|(_, r)| r.visible)
        .map(|(e, _)| e)
        .collect();

    match &cli.output {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|e| MecmLogError::Io {
                path: path.clone(),
                operation: "create output file",
                source: e,
            })?;
            let color = use_color(app_config.color, false) && cli.format == OutputFormat::Table;
            write_batch(
                cli.format,
                io::BufWriter::new(file),
                path,
                entries,
                &results,
                &visible,
                spec.mode(),
                color,
            )?;
        }
        None => {
            let stdout = io::stdout();
            let color = use_color(app_config.color, stdout.is_terminal());
            write_batch(
                cli.format,
                stdout.lock(),
                Path::new("<stdout>"),
                entries,
                &results,
                &visible,
                spec.mode(),
                color,
            )?;
        }
    }

    eprintln!("{summary}");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_batch<W: Write>(
    format: OutputFormat,
    mut writer: W,
    path: &Path,
    entries: &[LogEntry],
    results: &[mecmlog::core::model::VisibilityResult],
    visible: &[&LogEntry],
    mode: SearchMode,
    color: bool,
) -> Result<usize, MecmLogError> {
    let io_err = |e| ExportError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let written = match format {
        OutputFormat::Table => {
            let options = RenderOptions { color, limit: None };
            let n = table::render_rows(&mut writer, entries, results, mode, options)
                .map_err(io_err)?;
            writer.flush().map_err(io_err)?;
            n
        }
        OutputFormat::Csv => export::export_csv(visible, writer, path)?,
        OutputFormat::Json => export::export_json(visible, writer, path)?,
    };
    tracing::debug!(written, format = ?format, "Batch output written");
    Ok(written)
}

fn run_interactive(
    session: Session,
    inputs: FilterInputs,
    app_config: &AppConfig,
    reader: &FsSourceReader,
) -> Result<(), MecmLogError> {
    let settings = ControllerSettings {
        debounce: Duration::from_millis(app_config.debounce_ms),
        window_secs: app_config.time_window_secs,
    };
    let mut controller =
        FilterController::new(FilterWorker::spawn(), session.rows().clone(), settings);

    // Selections from the command line become the first actions.
    let now = Instant::now();
    if inputs.mode == SearchMode::Regex {
        controller.on_event(ControllerEvent::ToggleRegex, now);
    }
    for category in FacetCategory::all() {
        for value in inputs.facets.values(*category) {
            controller.on_event(
                ControllerEvent::ToggleFacet {
                    category: *category,
                    value: value.clone(),
                },
                now,
            );
        }
    }
    if let Some(anchor) = inputs.anchor {
        controller.on_event(ControllerEvent::ToggleAnchor(anchor), now);
    }
    if !inputs.search_text.is_empty() {
        controller.on_event(ControllerEvent::SearchInput(inputs.search_text), now);
    }

    let stdout = io::stdout();
    let color = use_color(app_config.color, stdout.is_terminal());
    let repl = Repl::new(session, controller, reader, app_config.discovery(), color);

    let mut out = stdout.lock();
    repl.run(io::BufReader::new(io::stdin()), &mut out)
        .map_err(|e| MecmLogError::Io {
            path: PathBuf::from("<terminal>"),
            operation: "interactive session",
            source: e,
        })
}

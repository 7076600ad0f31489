//! kuro-sense - perception capability detection for agent projects
//!
//! The entry point handles:
//! - Detecting which perception plugins can run on this machine
//! - Reconciling the agent's `agent-compose.yaml` plugin list
//! - Listing the catalog and install hints

use clap::{Args, Parser, Subcommand};
use sense_common::{Category, OutputFormat};
use sense_config::{load_settings, ConfigError, Settings};
use sense_core::catalog::Catalog;
use sense_core::compose::{ComposeDocument, ComposeFile};
use sense_core::detect::{detect_capabilities, run_detection, DetectionReport};
use sense_core::exit_codes::ExitCode;
use sense_core::logging::{generate_run_id, init_logging, LogConfig, LogFormat, LogLevel};
use sense_core::reconcile::{apply, auto_selection, ApplyOptions, ReconcileError};
use sense_core::report;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, error, info_span};

/// kuro-sense - Detect and enable the perception plugins an agent can run
#[derive(Parser)]
#[command(name = "kuro-sense")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Agent project directory holding agent-compose.yaml
    #[arg(long, global = true, env = "KURO_SENSE_AGENT_DIR")]
    agent_dir: Option<PathBuf>,

    /// Path to sense.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "human")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

impl GlobalOpts {
    /// CLI flags take precedence over the settings file.
    fn apply_overrides(&self, mut settings: Settings) -> Settings {
        if let Some(dir) = &self.agent_dir {
            settings.agent_dir = dir.clone();
        }
        settings
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check every capability against this machine (default)
    Detect(DetectArgs),

    /// Enable or disable plugins in the compose file
    Apply(ApplyArgs),

    /// Show the plugins the compose file declares
    Status,

    /// Print the install hint for a dependency
    Hint(HintArgs),

    /// List the built-in capability catalog
    Catalog(CatalogArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug, Default)]
struct DetectArgs {
    /// Only check capabilities of this category
    #[arg(long)]
    category: Option<Category>,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Plugins to enable (comma-separated)
    #[arg(long, value_delimiter = ',')]
    enable: Vec<String>,

    /// Plugins to disable (comma-separated)
    #[arg(long, value_delimiter = ',')]
    disable: Vec<String>,

    /// Derive the sets from detection; explicit names win
    #[arg(long)]
    auto: bool,

    /// Show what would change without writing
    #[arg(long)]
    dry_run: bool,

    /// Copy the compose file aside before rewriting it
    #[arg(long)]
    backup: bool,
}

#[derive(Args, Debug)]
struct HintArgs {
    /// Dependency name, e.g. `jq`
    dependency: String,
}

#[derive(Args, Debug)]
struct CatalogArgs {
    /// Only list capabilities of this category
    #[arg(long)]
    category: Option<Category>,
}

fn main() {
    let cli = Cli::parse();

    let cli_level = (cli.global.verbose > 0 || cli.global.quiet)
        .then(|| LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet));
    // Machine-readable stdout gets machine-readable stderr.
    let cli_format = cli.global.format.is_machine().then_some(LogFormat::Jsonl);
    init_logging(&LogConfig::from_env(cli_level, cli_format));

    let run_id = generate_run_id();
    let span = info_span!("run", run_id = %run_id);
    let _enter = span.enter();

    let settings = match load_settings(cli.global.config.as_deref()) {
        Ok(loaded) => {
            debug!(source = %loaded.source, path = ?loaded.path, "settings loaded");
            cli.global.apply_overrides(loaded.settings)
        }
        Err(e) => {
            let code = output_config_error(&cli.global, &e);
            std::process::exit(code.as_i32());
        }
    };

    let exit_code = match cli.command {
        None => run_detect(&cli.global, &settings, &DetectArgs::default()),
        Some(Commands::Detect(args)) => run_detect(&cli.global, &settings, &args),
        Some(Commands::Apply(args)) => run_apply(&cli.global, &settings, &args),
        Some(Commands::Status) => run_status(&cli.global, &settings),
        Some(Commands::Hint(args)) => run_hint(&cli.global, &args),
        Some(Commands::Catalog(args)) => run_catalog(&cli.global, &args),
        Some(Commands::Version) => print_version(&cli.global),
    };

    std::process::exit(exit_code.as_i32());
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ExitCode> {
    let text = serde_json::to_string_pretty(value).map_err(|e| {
        error!(error = %e, "failed to serialize output");
        ExitCode::InternalError
    })?;
    println!("{}", text);
    Ok(())
}

fn output_error(global: &GlobalOpts, code: ExitCode, context: &str, message: &str) -> ExitCode {
    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": "error",
                "error": {
                    "code": code.code_name(),
                    "exit_code": code.as_i32(),
                    "context": context,
                    "message": message,
                }
            });
            match serde_json::to_string_pretty(&response) {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("{}: {}", context, message),
            }
        }
        OutputFormat::Summary => {
            eprintln!("[{}] {}: {}", code.code_name(), context, message);
        }
        OutputFormat::Human => {
            eprintln!("Error: {}", message);
        }
    }
    code
}

fn output_config_error(global: &GlobalOpts, error: &ConfigError) -> ExitCode {
    output_error(global, ExitCode::from(error), "config error", &error.to_string())
}

fn output_reconcile_error(global: &GlobalOpts, error: &ReconcileError) -> ExitCode {
    output_error(global, ExitCode::from(error), "apply failed", &error.to_string())
}

fn detect_for(settings: &Settings, category: Option<Category>) -> DetectionReport {
    let catalog = Catalog::builtin();
    match category {
        Some(category) => run_detection(&catalog.restricted_to(category), settings),
        None => run_detection(&catalog, settings),
    }
}

fn run_detect(global: &GlobalOpts, settings: &Settings, args: &DetectArgs) -> ExitCode {
    let detection = detect_for(settings, args.category);
    match global.format {
        OutputFormat::Json => {
            if let Err(code) = print_json(&detection) {
                return code;
            }
        }
        OutputFormat::Summary => println!("{}", report::summary_line(&detection.summary)),
        OutputFormat::Human => print!("{}", report::render_detection(&detection)),
    }
    ExitCode::Clean
}

fn run_apply(global: &GlobalOpts, settings: &Settings, args: &ApplyArgs) -> ExitCode {
    let mut enable = args.enable.clone();
    let mut disable = args.disable.clone();

    if args.auto {
        let capabilities = detect_capabilities(&Catalog::builtin(), settings);
        let selection = auto_selection(&capabilities);
        debug!(
            enable = selection.enable.len(),
            disable = selection.disable.len(),
            "auto selection"
        );
        enable.extend(
            selection
                .enable
                .into_iter()
                .filter(|n| !args.disable.contains(n)),
        );
        disable.extend(
            selection
                .disable
                .into_iter()
                .filter(|n| !args.enable.contains(n)),
        );
    }

    let options = ApplyOptions {
        dry_run: args.dry_run,
        backup: args.backup || settings.backup,
        compose_file: settings.compose_file.clone(),
    };

    let outcome = match apply(&settings.agent_dir, &enable, &disable, &options) {
        Ok(outcome) => outcome,
        Err(e) => return output_reconcile_error(global, &e),
    };

    match global.format {
        OutputFormat::Json => {
            if let Err(code) = print_json(&outcome) {
                return code;
            }
        }
        OutputFormat::Summary => println!("{}", report::apply_summary(&outcome)),
        OutputFormat::Human => print!("{}", report::render_apply(&outcome)),
    }

    if outcome.pending() {
        ExitCode::ChangesPending
    } else {
        ExitCode::Clean
    }
}

fn run_status(global: &GlobalOpts, settings: &Settings) -> ExitCode {
    let path = settings.compose_path();
    let compose = match ComposeDocument::load(&path).and_then(|doc| ComposeFile::from_document(&doc)) {
        Ok(compose) => compose,
        Err(e) => return output_error(global, ExitCode::from(&e), "status failed", &e.to_string()),
    };
    let agent = compose.first_agent().map(|(name, _)| name);
    let plugins = compose.custom_perceptions();

    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "path": path,
                "agent": agent,
                "plugins": plugins,
                "enabled": compose.enabled_plugin_names(),
            });
            if let Err(code) = print_json(&response) {
                return code;
            }
        }
        OutputFormat::Summary => println!(
            "{}: {} of {} plugins enabled",
            agent.unwrap_or("-"),
            compose.enabled_plugin_names().len(),
            plugins.len()
        ),
        OutputFormat::Human => print!(
            "{}",
            report::render_status(agent, plugins, &Catalog::builtin())
        ),
    }
    ExitCode::Clean
}

fn run_hint(global: &GlobalOpts, args: &HintArgs) -> ExitCode {
    let catalog = Catalog::builtin();
    let hint = catalog.find_install_hint(&args.dependency);

    if global.format == OutputFormat::Json {
        let response = serde_json::json!({
            "dependency": args.dependency,
            "hint": hint,
            "command": hint.map(|h| h.describe()),
        });
        if let Err(code) = print_json(&response) {
            return code;
        }
    } else if let Some(hint) = hint {
        println!("{}", hint.describe());
    }

    match hint {
        Some(_) => ExitCode::Clean,
        None => output_error(
            global,
            ExitCode::ArgsError,
            "hint",
            &format!("no install hint known for `{}`", args.dependency),
        ),
    }
}

fn run_catalog(global: &GlobalOpts, args: &CatalogArgs) -> ExitCode {
    let catalog = match args.category {
        Some(category) => Catalog::builtin().restricted_to(category),
        None => Catalog::builtin(),
    };
    match global.format {
        OutputFormat::Json => {
            if let Err(code) = print_json(&catalog.capabilities()) {
                return code;
            }
        }
        OutputFormat::Summary => println!("{} capabilities", catalog.len()),
        OutputFormat::Human => print!("{}", report::render_catalog(&catalog)),
    }
    ExitCode::Clean
}

fn print_version(global: &GlobalOpts) -> ExitCode {
    let version_info = serde_json::json!({
        "kuro_sense_version": env!("CARGO_PKG_VERSION"),
        "rust_version": env!("CARGO_PKG_RUST_VERSION"),
    });

    match global.format {
        OutputFormat::Json => {
            if let Err(code) = print_json(&version_info) {
                return code;
            }
        }
        _ => println!("kuro-sense {}", env!("CARGO_PKG_VERSION")),
    }
    ExitCode::Clean
}

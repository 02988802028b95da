mod config;
mod list_cmd;
mod report;
mod run_cmd;

use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use attester_core::bridge::root_name_for;
use attester_core::{Bridge, EngineConfig, EngineKind, OutputTarget};

use config::CliOverrides;

#[derive(Parser)]
#[command(
    name = "attester-bridge",
    about = "Run attester test campaigns and report their results"
)]
struct Cli {
    /// Engine to drive
    #[arg(long, value_enum, global = true, default_value_t = Engine::Attester)]
    engine: Engine,

    /// Engine installation root (overrides ATTESTER_PATH / ATJSTESTRUNNER_PATH)
    #[arg(long, global = true)]
    engine_root: Option<PathBuf>,

    /// JavaScript runtime (overrides ATTESTER_NODE_BIN)
    #[arg(long, global = true)]
    node: Option<String>,

    /// Browser binary (overrides ATTESTER_PHANTOMJS_BIN)
    #[arg(long, global = true)]
    phantomjs: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Engine {
    Attester,
    Atjstestrunner,
}

impl From<Engine> for EngineKind {
    fn from(engine: Engine) -> Self {
        match engine {
            Engine::Attester => EngineKind::Attester,
            Engine::Atjstestrunner => EngineKind::AtJsTestRunner,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file from the current flags and environment
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Discover the tests and print the test tree
    List {
        /// Campaign configuration file (attester) or engine arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run the tests and report each result
    Run {
        /// Print a JSON summary instead of per-test lines
        #[arg(long)]
        json: bool,
        /// Campaign configuration file (attester) or engine arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// Execute the `attester-bridge init` command: write config file.
fn cmd_init(kind: EngineKind, overrides: &CliOverrides, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let mut cfg = config::load_config().unwrap_or_default();
    let resolved = config::resolve_with(kind, overrides, Some(&cfg));
    if let Some(root) = resolved.engine_root {
        cfg.set_engine_root(kind, root);
    }
    cfg.executables.node = Some(resolved.node.binary);
    cfg.executables.phantomjs = Some(resolved.phantomjs.binary);

    let path = config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    match cfg.engine_root(kind) {
        Some(root) => println!("  paths.{} = {}", kind.application(), root.display()),
        None => println!(
            "  paths.{} is not set; define {} or pass --engine-root",
            kind.application(),
            kind.root_setting()
        ),
    }
    if let Some(node) = &cfg.executables.node {
        println!("  executables.node = {node}");
    }
    if let Some(phantomjs) = &cfg.executables.phantomjs {
        println!("  executables.phantomjs = {phantomjs}");
    }
    Ok(())
}

/// Create the bridge for `config.kind` from the positional arguments.
fn open_bridge(config: EngineConfig, args: Vec<String>) -> anyhow::Result<Bridge> {
    match config.kind {
        EngineKind::Attester => {
            let [config_file] = args.as_slice() else {
                bail!("attester expects exactly one campaign configuration file");
            };
            let config_file = Path::new(config_file);
            Ok(Bridge::attester(root_name_for(config_file), config_file, config)?)
        }
        EngineKind::AtJsTestRunner => {
            let root = config.kind.application();
            Ok(Bridge::atjstestrunner(root, config, args))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let kind = EngineKind::from(cli.engine);
    let overrides = CliOverrides {
        engine_root: cli.engine_root,
        node: cli.node,
        phantomjs: cli.phantomjs,
    };

    match cli.command {
        Commands::Init { force } => {
            cmd_init(kind, &overrides, force)?;
        }
        Commands::List { args } => {
            let mut bridge = open_bridge(config::resolve(kind, &overrides), args)?;
            let result = list_cmd::run_list(&mut bridge).await;
            bridge.shutdown();
            result?;
        }
        Commands::Run { json, args } => {
            let mut engine_config = config::resolve(kind, &overrides);
            if json {
                // stdout carries only the summary
                engine_config = engine_config.with_output(OutputTarget::Stderr);
            }
            let mut bridge = open_bridge(engine_config, args)?;
            let result = run_cmd::run_campaign(&mut bridge, kind.application(), json).await;
            bridge.shutdown();
            let summary = result?;
            if !summary.is_success() {
                info!(failed = summary.failed, "campaign finished with failures");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

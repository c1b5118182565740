// Launcher: renders this instance's configuration against mocked peers.

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use autoconfigure::config::{Config, ConfigTrait};
use autoconfigure::coordinator::{ConfiguredService, Coordinator, GeneratedConfigurations, State};
use autoconfigure::ports::EphemeralPorts;
use autoconfigure::registry::LocalRegistry;
use autoconfigure::render::PlaceholderRenderer;
use autoconfigure::scenario::Scenario;

const CONFIG_PATH: &str = "cfg/autoconfigure.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/autoconfigure.cfg.local.yaml";

/// autoconfigure - discovery-gated configuration rendering
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,

    /// YAML file of mocked peers to publish before configuring
    #[arg(short, long, value_name = "FILE")]
    scenario: Option<PathBuf>,

    /// Runtime variable override, highest precedence (repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_override)]
    env: Vec<(String, String)>,

    /// Discovery timeout, e.g. `5s` or `1m` (defaults to the config value)
    #[arg(short, long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
}

fn parse_override(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", raw)),
    }
}

/// Prints where configuration was generated.
struct Reporter;

impl ConfiguredService for Reporter {
    fn succeed(&self, generated: &GeneratedConfigurations) -> Result<()> {
        for (name, path) in generated {
            println!("{}\t{}", name, path.display());
        }
        Ok(())
    }

    fn fail(&self, generated: &GeneratedConfigurations) -> Result<()> {
        warn!(
            component = "main",
            event = "configuration_failed",
            generated = generated.len(),
            "configuration failed"
        );
        Ok(())
    }
}

/// Loads the configuration struct from YAML file.
/// Tries local config first, then falls back to default config.
fn load_cfg(path: Option<PathBuf>) -> Result<Config> {
    if let Some(custom_path) = path {
        let cfg = Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        info!(component = "config", event = "load_success", path = ?custom_path, "config loaded");
        return Ok(cfg);
    }

    match Config::load(PathBuf::from(CONFIG_PATH_LOCAL)) {
        Ok(cfg) => {
            info!(component = "config", event = "load_success", path = CONFIG_PATH_LOCAL, "config loaded");
            Ok(cfg)
        }
        Err(_) => {
            let cfg = Config::load(PathBuf::from(CONFIG_PATH))
                .with_context(|| format!("failed to load config from {}", CONFIG_PATH))?;
            info!(component = "config", event = "load_success", path = CONFIG_PATH, "config loaded");
            Ok(cfg)
        }
    }
}

/// Configures structured logging based on configuration.
fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = cfg
        .logs()
        .and_then(|logs| logs.level.as_ref())
        .map(|s| s.as_str())
        .unwrap_or("info");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cfg.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let cfg = load_cfg(args.cfg)?;

    // Configure logger (must be done after config is loaded)
    configure_logger(&cfg);

    let registry = Arc::new(LocalRegistry::new());
    if let Some(path) = &args.scenario {
        let scenario = Scenario::load(path)?;
        scenario
            .publish(registry.as_ref())
            .with_context(|| format!("failed to publish scenario {:?}", path))?;
        info!(component = "main", event = "scenario_published", peers = scenario.len(), "scenario published");
    }

    let coordinator = Coordinator::new(
        &cfg,
        registry,
        Arc::new(PlaceholderRenderer::new()),
        Arc::new(EphemeralPorts),
    )
    .context("invalid autoconfigure configuration")?;

    let timeout = args.timeout.unwrap_or_else(|| cfg.timeout());
    let overrides: BTreeMap<String, String> = args.env.into_iter().collect();
    coordinator
        .configure(overrides, Arc::new(Reporter), timeout)
        .context("configuration attempt failed")?;

    let state = tokio::select! {
        state = coordinator.wait() => state,
        _ = signal::ctrl_c() => {
            info!(component = "main", event = "os_signal", signal = "SIGINT", "cancellation started");
            coordinator.shutdown();
            coordinator.wait().await
        }
    };
    coordinator.shutdown();

    if state != State::Succeeded {
        for progress in coordinator.progress().iter().filter(|p| !p.is_satisfied()) {
            error!(
                component = "main",
                event = "unsatisfied",
                variable = %progress.variable,
                expected = progress.expected,
                discovered = progress.discovered,
                "requirement not satisfied"
            );
        }
        anyhow::bail!("configuration {}", state);
    }
    Ok(())
}

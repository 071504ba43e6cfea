use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use zen_sens::config::AppConfig;
use zen_sens::output::{self, OutputFormat};
use zen_sens::UpdateManager;
use zen_sens_sources::{default_registry_for, CpuIdentity};
use zen_sens_types::LabelStyle;

/// zen-sens - Power, frequency and temperature monitor for AMD Zen CPUs
#[derive(Parser, Debug, Clone)]
#[command(name = "zen-sens")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Interval of refreshing readings
    #[arg(long = "delay", value_name = "SECONDS", value_parser = parse_delay)]
    delay: Option<Duration>,

    /// Display core_id instead of core index
    #[arg(short = 'c', long = "coreid")]
    coreid: bool,

    /// Output format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Stop after this many update cycles
    #[arg(short = 'n', long = "count", value_name = "N")]
    count: Option<u64>,

    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", value_name = "LEVEL", default_value = "0")]
    debug: u8,

    /// Configuration file to use instead of the default location
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Parse a positive number of seconds, fractions allowed
fn parse_delay(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("Invalid delay {:?}: {}", s, e))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("Delay must be a positive number of seconds, got: {}", s));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            AppConfig::default()
        }),
    };

    if let Some(delay) = cli.delay {
        config.update_interval_ms = delay.as_millis().max(1) as u64;
    }
    if cli.coreid {
        config.sources.label_style = LabelStyle::CoreId;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Level 0 (default): warn only (shows the === discovery banners)
    // Level 1: info, 2: debug, 3+: trace
    let log_level = match cli.debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Allow RUST_LOG to override CLI setting
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    warn!("Starting zen-sens v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    info!("Update interval: {} ms", config.update_interval_ms);

    let identity = CpuIdentity::detect();
    let model = if identity.model_name().is_empty() {
        "Unknown CPU"
    } else {
        identity.model_name()
    };
    eprintln!("{} ({} cores)", model, identity.physical_cores());

    let mut registry = default_registry_for(identity, &config.sources);
    let (registry, enabled) = tokio::task::spawn_blocking(move || {
        let enabled = registry.init_all();
        (registry, enabled)
    })
    .await?;

    for source in registry.sources() {
        match source.init_error() {
            None => info!(
                "{}: {} ({} sensors)",
                source.driver_name(),
                source.metadata().description,
                source.sensors().len()
            ),
            Some(e) => eprintln!("{}: not available ({})", source.driver_name(), e),
        }
    }
    if enabled == 0 {
        bail!("No sensor source is available on this system");
    }

    let update_cost = registry.update_cost();
    if config.update_interval() < update_cost {
        warn!(
            "Update interval of {:?} is shorter than one sampling cycle ({:?})",
            config.update_interval(),
            update_cost
        );
    }

    let manager = UpdateManager::new(registry);
    if cli.format == OutputFormat::Text && cli.debug > 0 {
        output::write_table(&mut std::io::stderr(), manager.sensors())?;
    }

    if cfg!(unix) {
        info!("Send SIGUSR1 to reset min/max");
    }

    let format = cli.format;
    let stdout = std::io::stdout();
    let cycles = manager
        .run(config.update_interval(), cli.count, |_, sensors| {
            let mut out = stdout.lock();
            output::write_cycle(&mut out, format, sensors)
        })
        .await?;

    std::io::stderr().flush()?;
    info!("Stopped after {} cycles", cycles);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delay() {
        assert_eq!(parse_delay("0.5").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_delay("2").unwrap(), Duration::from_secs(2));
        assert!(parse_delay("0").is_err());
        assert!(parse_delay("-1").is_err());
        assert!(parse_delay("soon").is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        AppConfig::default().save_to_path(&path).unwrap();

        let cli = Cli::parse_from([
            "zen-sens",
            "--delay",
            "1.5",
            "--coreid",
            "--config",
            path.to_str().unwrap(),
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.update_interval_ms, 1500);
        assert_eq!(config.sources.label_style, LabelStyle::CoreId);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["zen-sens", "-n", "3", "--format", "json"]);
        assert_eq!(cli.count, Some(3));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(!cli.coreid);
        assert_eq!(cli.debug, 0);
    }
}

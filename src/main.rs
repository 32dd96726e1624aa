//! Демонстрационный запуск брокера Fabric.
//!
//! Прогоняет один из сценариев на новом брокере и печатает пропускную
//! способность.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fabric::{
    config::{Settings, DEFAULT_CONFIG_FILE},
    demo::{self, Scenario},
    init_logging,
    logging::LogFormat,
};

/// Аргументы командной строки.
#[derive(Parser)]
#[command(name = "fabric-demo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fabric demo - runs a pub/sub scenario on an in-process broker", long_about = None)]
struct Cli {
    /// Сценарий для запуска
    #[arg(value_enum, help = "Сценарий: conversation, ping-pong, threaded, pipeline, bulk")]
    scenario: Scenario,
    /// Файл настроек
    #[arg(
        short,
        long,
        default_value = DEFAULT_CONFIG_FILE,
        env = "FABRIC_CONFIG",
        help = "Путь к файлу настроек (необязательный)"
    )]
    config: PathBuf,
    /// Количество раундов
    #[arg(short, long, help = "Количество раундов (переопределяет demo.rounds)")]
    rounds: Option<u32>,
    /// Формат логов
    #[arg(long, value_enum, help = "Формат консольных логов")]
    log_format: Option<CliLogFormat>,
    /// Включить подробный вывод (debug)
    #[arg(short, long, help = "Включить подробный вывод для отладки")]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliLogFormat {
    Compact,
    Pretty,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Compact => LogFormat::Compact,
            CliLogFormat::Pretty => LogFormat::Pretty,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    if let Some(rounds) = cli.rounds {
        settings.demo.rounds = rounds;
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format.into();
    }
    if cli.verbose {
        settings.logging.level = "debug".into();
    }

    let logging = init_logging(settings.logging.clone()).context("failed to initialize logging")?;

    let report = demo::run(cli.scenario, &settings)
        .with_context(|| format!("scenario '{}' failed", cli.scenario))?;

    println!(
        "{}: {} published, {} delivered, {} unhandled, {} handler failures in {:.3}s ({:.0} msg/s)",
        report.scenario,
        report.stats.published,
        report.stats.delivered,
        report.stats.unhandled,
        report.stats.handler_failures,
        report.elapsed.as_secs_f64(),
        report.throughput(),
    );

    logging.shutdown();
    Ok(())
}

//! Демонстрационные сценарии поверх брокера и воркеров.
//!
//! - `messages`: каталоги `DemoMessage` и `PipelineMessage`.
//! - `conversation`: диалог «вопрос → ответ → благодарность».
//! - `ping_pong`: повторная публикация из обработчика и пинг-понг на воркере.
//! - `pipeline`: журнал, обработчик данных и интерфейс.
//! - `bulk`: пакетный обработчик строк.

pub mod bulk;
pub mod conversation;
pub mod messages;
pub mod ping_pong;
pub mod pipeline;

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::info;

use self::{
    bulk::BulkProcessor,
    messages::{DemoMessage, PipelineMessage, PleaseStop, Text},
    ping_pong::{PingPongResponder, ThreadedPingPong},
};
use crate::{
    config::Settings,
    error::WorkerError,
    pubsub::{Broker, BrokerStats},
};

/// Максимальное ожидание пинг-понга на воркере.
const THREADED_TIMEOUT: Duration = Duration::from_secs(30);

/// Демонстрационный сценарий.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    /// Диалог участников.
    Conversation,
    /// Повторная публикация из обработчика.
    PingPong,
    /// Пинг-понг на consumer-воркере.
    Threaded,
    /// Конвейер журнал → обработка → интерфейс.
    Pipeline,
    /// Пакетная обработка строк на воркере.
    Bulk,
}

/// Итог прогона сценария.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub stats: BrokerStats,
    pub elapsed: Duration,
}

impl ScenarioReport {
    /// Публикаций в секунду.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.published as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Scenario::Conversation => "conversation",
            Scenario::PingPong => "ping-pong",
            Scenario::Threaded => "threaded",
            Scenario::Pipeline => "pipeline",
            Scenario::Bulk => "bulk",
        };
        f.write_str(name)
    }
}

/// Прогоняет сценарий на новом брокере с настройками `settings`.
pub fn run(
    scenario: Scenario,
    settings: &Settings,
) -> Result<ScenarioReport, WorkerError> {
    let rounds = settings.demo.rounds;
    let start = Instant::now();

    let stats = match scenario {
        Scenario::Conversation => {
            let broker = demo_broker(settings);
            let report = conversation::run_conversation(&broker, &settings.demo.participants);
            info!(received = report.total_received(), "conversation finished");
            broker.stats()
        }
        Scenario::PingPong => {
            let broker = demo_broker(settings);
            let responder = PingPongResponder::new(Arc::clone(&broker), "responder", rounds);
            responder.serve();
            responder.play(rounds);
            info!(received = responder.received(), "ping-pong finished");
            broker.stats()
        }
        Scenario::Threaded => {
            let broker = demo_broker(settings);
            let game = ThreadedPingPong::start(Arc::clone(&broker), "pong", rounds.max(1))?;
            game.kick();
            let report = game.wait(THREADED_TIMEOUT)?;
            info!(processed = report.processed, "threaded ping-pong finished");
            broker.stats()
        }
        Scenario::Pipeline => {
            let broker: Arc<Broker<PipelineMessage>> =
                Arc::new(Broker::with_config(settings.broker.clone()));
            let report = pipeline::run_pipeline(&broker, rounds);
            info!(shown = report.shown.len(), traced = report.traced, "pipeline finished");
            broker.stats()
        }
        Scenario::Bulk => {
            let broker = demo_broker(settings);
            let bulk = BulkProcessor::start(Arc::clone(&broker), "bulk")?;
            for i in 0..rounds {
                broker.publish(Text::new("main", format!("hello {i}")));
            }
            broker.publish(PleaseStop);
            let collected = bulk.finalize()?;
            info!(collected = collected.len(), "bulk processing finished");
            broker.stats()
        }
    };

    let report = ScenarioReport {
        scenario,
        stats,
        elapsed: start.elapsed(),
    };
    info!(
        %scenario,
        published = report.stats.published,
        delivered = report.stats.delivered,
        elapsed_ms = report.elapsed.as_millis() as u64,
        throughput = report.throughput(),
        "scenario finished"
    );
    Ok(report)
}

fn demo_broker(settings: &Settings) -> Arc<Broker<DemoMessage>> {
    Arc::new(Broker::with_config(settings.broker.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_display() {
        assert_eq!(Scenario::PingPong.to_string(), "ping-pong");
        assert_eq!(Scenario::Bulk.to_string(), "bulk");
    }

    #[test]
    fn test_throughput_zero_elapsed() {
        let report = ScenarioReport {
            scenario: Scenario::Bulk,
            stats: BrokerStats::default(),
            elapsed: Duration::ZERO,
        };
        assert_eq!(report.throughput(), 0.0);
    }
}

use std::time::{Duration, Instant};

use tracing_appender::non_blocking::WorkerGuard;

/// Handle для управления жизненным циклом логирования.
///
/// Держит `WorkerGuard` файлового слоя: пока handle жив, неблокирующий
/// writer работает; `shutdown` сбрасывает буфер на диск.
#[derive(Debug)]
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
    flush_timeout: Duration,
    shut_down: bool,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            file_guard,
            flush_timeout: Duration::from_secs(5),
            shut_down: false,
        }
    }

    /// Устанавливает порог, после которого долгий сброс считается
    /// подозрительным.
    pub fn with_flush_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Есть ли активный файловый writer.
    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Штатное завершение: сбрасывает файловый буфер.
    pub fn shutdown(mut self) {
        self.shut_down = true;
        tracing::info!(
            file_sink = self.file_guard.is_some(),
            timeout_ms = self.flush_timeout.as_millis() as u64,
            "Initiating logging shutdown"
        );

        let start = Instant::now();
        drop(self.file_guard.take());
        let elapsed = start.elapsed();

        if elapsed > self.flush_timeout {
            eprintln!(
                "WARNING: Logging shutdown took {}ms (timeout: {}ms)",
                elapsed.as_millis(),
                self.flush_timeout.as_millis()
            );
        }
    }
}

impl Drop for LoggingHandle {
    fn drop(&mut self) {
        if !self.shut_down && self.file_guard.is_some() {
            eprintln!(
                "WARNING: LoggingHandle dropped without explicit shutdown(). \
                 Call .shutdown() to flush file logs."
            )
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use mobench_core::TelemetrySample;

use crate::telemetry::TelemetryProbe;

/// In-run memory sampler. Ticks on a fixed cadence from the moment a run
/// starts (first tick immediately) until stopped at the run boundary.
/// Sampling errors are swallowed; a failed read skips the tick.
///
/// The sequencing worker only sees the samples after `stop`, so the
/// sampler task and the worker never touch the series concurrently.
pub struct PeriodicCollector {
    cancel: CancellationToken,
    join: JoinHandle<Vec<TelemetrySample>>,
}

impl PeriodicCollector {
    pub fn start(probe: Arc<dyn TelemetryProbe>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            let mut samples = Vec::new();
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Some(rss_mb) = probe.memory_rss_mb() {
                            samples.push(TelemetrySample::now(rss_mb));
                        }
                    }
                }
            }
            samples
        });

        Self { cancel, join }
    }

    /// Halts the sampler and hands back everything it collected.
    pub async fn stop(self) -> Vec<TelemetrySample> {
        self.cancel.cancel();
        match self.join.await {
            Ok(samples) => samples,
            Err(e) => {
                debug!("collector task lost: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingProbe {
        reads: AtomicU64,
    }

    impl TelemetryProbe for CountingProbe {
        fn memory_rss_mb(&self) -> Option<u64> {
            Some(self.reads.fetch_add(1, Ordering::SeqCst) + 100)
        }
        fn battery_snapshot(&self) -> Option<mobench_core::BatterySnapshot> {
            None
        }
        fn thermal_zones(&self) -> Vec<mobench_core::ThermalZone> {
            Vec::new()
        }
        fn battery_temperature_c(&self) -> Option<f32> {
            None
        }
        fn battery_level(&self) -> Option<f32> {
            None
        }
        fn total_memory_bytes(&self) -> Option<u64> {
            None
        }
    }

    struct FailingProbe;

    impl TelemetryProbe for FailingProbe {
        fn memory_rss_mb(&self) -> Option<u64> {
            None
        }
        fn battery_snapshot(&self) -> Option<mobench_core::BatterySnapshot> {
            None
        }
        fn thermal_zones(&self) -> Vec<mobench_core::ThermalZone> {
            Vec::new()
        }
        fn battery_temperature_c(&self) -> Option<f32> {
            None
        }
        fn battery_level(&self) -> Option<f32> {
            None
        }
        fn total_memory_bytes(&self) -> Option<u64> {
            None
        }
    }

    #[tokio::test(start_paused = true)]
    async fn collects_one_sample_per_tick_inside_the_window() {
        let probe = Arc::new(CountingProbe { reads: AtomicU64::new(0) });
        let collector = PeriodicCollector::start(probe, Duration::from_millis(2000));

        // Ticks land at 0ms, 2000ms, 4000ms.
        tokio::time::sleep(Duration::from_millis(5000)).await;
        let samples = collector.stop().await;

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].rss_mb, 100);
        assert_eq!(samples[2].rss_mb, 102);
    }

    #[tokio::test(start_paused = true)]
    async fn read_failures_skip_the_tick_without_stopping() {
        let collector = PeriodicCollector::start(Arc::new(FailingProbe), Duration::from_millis(2000));
        tokio::time::sleep(Duration::from_millis(7000)).await;
        let samples = collector.stop().await;
        assert!(samples.is_empty());
    }
}

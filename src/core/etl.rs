use crate::core::{Pipeline, RunReport};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        tracing::info!("🚀 Starting option price fetch");
        self.monitor.log_stats("Start");

        // Extract
        tracing::info!("📂 Reading input...");
        let extracted = self.pipeline.extract().await?;
        tracing::info!(
            "📂 Read {} rows ({} extra columns)",
            extracted.rows.len(),
            extracted.extra_columns.len()
        );
        self.monitor.log_stats("Extract");

        // Transform
        tracing::info!("📡 Fetching option prices...");
        let transformed = self.pipeline.transform(extracted).await?;
        let summary = transformed.summary.clone();
        tracing::info!(
            "📡 Priced {} rows: {} success, {} no match, {} errors",
            summary.total,
            summary.success,
            summary.no_match,
            summary.errors
        );
        self.monitor.log_stats("Transform");

        // Load
        tracing::info!("💾 Writing output...");
        let output_path = self.pipeline.load(&transformed).await?;
        tracing::info!("💾 Output saved to: {}", output_path);
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        tracing::debug!("Run finished in {:?}", started.elapsed());

        Ok(RunReport {
            output_path,
            summary,
            priced_rows: transformed.priced_rows,
        })
    }
}

use crate::core::{Pipeline, RunSummary};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

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

    pub async fn run(&mut self) -> Result<RunSummary> {
        tracing::info!("🚀 Starting sync run");
        self.monitor.log_stats("Start");

        // Extract：逐一處理每位作者
        let extracted = self.pipeline.extract().await?;
        tracing::info!(
            "📥 Processed {} authors for window {}",
            extracted.reports.len(),
            extracted.window
        );
        self.monitor.log_stats("Extract");

        // Transform：整理成固定欄位的輸出表
        let transformed = self.pipeline.transform(extracted).await?;
        tracing::info!(
            "🔧 Reconciled {} records into {} sections",
            transformed.combined.len(),
            transformed.sections.len()
        );
        self.monitor.log_stats("Transform");

        // Load：稽核檔、輸出目的地、同步狀態
        let summary = self.pipeline.load(transformed).await?;
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(summary)
    }
}

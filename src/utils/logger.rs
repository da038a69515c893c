use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn run_log_path(log_dir: &Path, started_at: DateTime<Utc>) -> PathBuf {
    log_dir.join(format!("run-{}.log", started_at.format("%Y%m%dT%H%M%SZ")))
}

/// 建立本次執行的診斷日誌檔
pub fn open_run_log(log_dir: &Path, started_at: DateTime<Utc>) -> std::io::Result<(PathBuf, File)> {
    fs::create_dir_all(log_dir)?;
    let path = run_log_path(log_dir, started_at);
    let file = File::create(&path)?;
    Ok((path, file))
}

/// 主控台輸出精簡格式；有日誌檔時另外以 JSON 逐行記錄 debug 等級的所有事件
pub fn init_cli_logger(verbose: bool, run_log: Option<File>) {
    let console_filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("pubmed_sync=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pubmed_sync=info"))
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(console_filter);

    let file_layer = run_log.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(EnvFilter::new("pubmed_sync=debug,warn"))
    });

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}

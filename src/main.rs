use chrono::Utc;
use clap::Parser;
use pubmed_sync::domain::model::RunSummary;
use pubmed_sync::utils::error::{severity_exit_code, ErrorSeverity};
use pubmed_sync::utils::{logger, validation::Validate};
use pubmed_sync::{
    CliArgs, CsvWorkbookSink, EtlEngine, EtlError, EutilsClient, LocalStorage, SyncConfig,
    SyncPipeline, SyncSettings,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let exit_code = match run(args).await {
        Ok(code) => code,
        Err(e) => report_error(&e),
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
}

async fn run(args: CliArgs) -> Result<i32, EtlError> {
    let mut config = SyncConfig::from_file(&args.config)?;
    config.apply_window_overrides(args.start.clone(), args.end.clone());

    // 初始化日誌；dry-run 不留下任何檔案
    let run_log = if args.dry_run {
        None
    } else {
        match logger::open_run_log(&config.log_dir(), Utc::now()) {
            Ok(opened) => Some(opened),
            Err(e) => {
                eprintln!("⚠️ Could not open run log: {}", e);
                None
            }
        }
    };
    let run_log_path = run_log.as_ref().map(|(path, _)| path.clone());
    logger::init_cli_logger(args.verbose, run_log.map(|(_, file)| file));

    tracing::info!("Starting pubmed-sync");
    if let Some(path) = &run_log_path {
        tracing::info!("🗒️ Run log: {}", path.display());
    }
    if args.verbose {
        tracing::debug!(
            sink = %config.run.output_sink_id,
            authors = config.authors.len(),
            "Settings loaded from {}",
            args.config.display()
        );
    }

    // 驗證配置
    config.validate()?;

    if args.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let client = Arc::new(EutilsClient::new(
        config.eutils_settings(),
        config.retry_policy(),
    )?);
    let storage = LocalStorage::new(config.base_dir());
    let sink = CsvWorkbookSink::new(LocalStorage::new(config.base_dir()), config.workbook_dir());
    let settings = SyncSettings::from_config(&config)?;
    let mut pipeline = SyncPipeline::new(settings, client.clone(), client, sink, storage);

    if args.dry_run {
        let (window, planned) = pipeline.plan().await?;
        println!("🗓️ Window: {}", window);
        for query in planned {
            println!("  {} → {}", query.author, query.query);
        }
        return Ok(0);
    }

    let mut engine = EtlEngine::new_with_monitoring(pipeline, args.monitor);
    let summary = engine.run().await?;
    print_summary(&summary);

    if summary.has_failures() {
        Ok(severity_exit_code(ErrorSeverity::Medium))
    } else {
        Ok(0)
    }
}

fn print_summary(summary: &RunSummary) {
    tracing::info!(
        accepted = summary.accepted,
        rejected = summary.rejected,
        failed = summary.failed_authors.len(),
        "✅ Sync finished for window {}",
        summary.window
    );

    println!("✅ Sync finished for window {}", summary.window);
    println!("👥 Authors processed: {}", summary.authors_processed);
    println!(
        "🔎 Candidates: {} (already seen: {}, fetched: {}, dropped by parser: {})",
        summary.candidates, summary.skipped_seen, summary.fetched, summary.dropped
    );
    println!("📚 Accepted: {}, rejected: {}", summary.accepted, summary.rejected);
    println!("🗒️ Audit CSV: {}", summary.audit_path);
    if !summary.state_committed {
        println!("ℹ️ Manual window: sync state was not updated");
    }
    for (author, reason) in &summary.failed_authors {
        println!("❌ {}: {}", author, reason);
    }
}

fn report_error(e: &EtlError) -> i32 {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Sync failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    // 輸出用戶友好的錯誤信息
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    e.exit_code()
}

use crate::adapters::sink::table_to_csv;
use crate::config::SyncConfig;
use crate::core::author_sync::{sync_author, SyncContext};
use crate::core::dedup::SeenTracker;
use crate::core::query::{build_query, QueryOptions};
use crate::core::reconcile::{metadata_table, reconcile, MASTER_SECTION, META_SECTION};
use crate::core::search_name::search_name;
use crate::core::state::{load_state, next_state, save_state};
use crate::core::window::{resolve_window, ManualWindow};
use crate::core::{
    DetailFetcher, ExtractResult, Pipeline, RunSummary, SearchClient, Storage, TableSink,
    TrackedAuthor, TransformResult, WindowSpec,
};
use crate::domain::model::SyncState;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// 單次執行所需的設定，從 SyncConfig 取出後就不再碰設定檔
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub authors: Vec<TrackedAuthor>,
    pub manual: Option<ManualWindow>,
    pub lookback_days: i64,
    pub page_cap: usize,
    pub query_options: QueryOptions,
    pub state_file: String,
    pub audit_csv: String,
}

impl SyncSettings {
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Ok(Self {
            authors: config.authors.clone(),
            manual: config.manual_window()?,
            lookback_days: config.search.lookback_days,
            page_cap: config.search.page_cap,
            query_options: config.query_options(),
            state_file: config.paths.state_file.clone(),
            audit_csv: config.paths.audit_csv.clone(),
        })
    }
}

/// 每位作者一行的查詢計畫（`--dry-run` 用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedQuery {
    pub author: String,
    pub query: String,
}

pub struct SyncPipeline<Q, F, K, S>
where
    Q: SearchClient,
    F: DetailFetcher,
    K: TableSink,
    S: Storage,
{
    settings: SyncSettings,
    search: Q,
    fetcher: F,
    sink: K,
    storage: S,
    now: DateTime<Utc>,
    previous_state: Option<SyncState>,
    tracker: SeenTracker,
}

impl<Q, F, K, S> SyncPipeline<Q, F, K, S>
where
    Q: SearchClient,
    F: DetailFetcher,
    K: TableSink,
    S: Storage,
{
    pub fn new(settings: SyncSettings, search: Q, fetcher: F, sink: K, storage: S) -> Self {
        Self {
            settings,
            search,
            fetcher,
            sink,
            storage,
            now: Utc::now(),
            previous_state: None,
            tracker: SeenTracker::default(),
        }
    }

    /// 固定執行時間（測試與重播用）
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn tracker(&self) -> &SeenTracker {
        &self.tracker
    }

    /// 讀取狀態並決定本次區間；MANUAL 模式完全不碰狀態檔
    async fn prepare(&mut self) -> Result<WindowSpec> {
        self.previous_state = match self.settings.manual {
            Some(_) => {
                tracing::info!("🗓️ Manual window requested, persisted state is ignored");
                None
            }
            None => load_state(&self.storage, &self.settings.state_file).await?,
        };

        let window = resolve_window(
            self.previous_state.as_ref().map(|s| s.last_run_utc),
            self.now,
            self.settings.manual,
            self.settings.lookback_days,
        )?;

        let seen = match (&self.previous_state, window.uses_persisted_state()) {
            (Some(state), true) => state.seen_identifiers.clone(),
            _ => BTreeSet::new(),
        };
        self.tracker = SeenTracker::new(seen);

        tracing::info!(
            seen = self.tracker.len(),
            "🗓️ Window resolved: {}",
            window
        );
        Ok(window)
    }

    /// 只解析區間並組出查詢字串，不做任何網路請求或寫入
    pub async fn plan(&mut self) -> Result<(WindowSpec, Vec<PlannedQuery>)> {
        let window = self.prepare().await?;
        let mut planned = Vec::with_capacity(self.settings.authors.len());
        for author in &self.settings.authors {
            let name = search_name(&author.full_name)?;
            planned.push(PlannedQuery {
                author: author.full_name.clone(),
                query: build_query(
                    &name,
                    &author.affiliation_keywords,
                    &window,
                    &self.settings.query_options,
                ),
            });
        }
        Ok((window, planned))
    }
}

#[async_trait::async_trait]
impl<Q, F, K, S> Pipeline for SyncPipeline<Q, F, K, S>
where
    Q: SearchClient,
    F: DetailFetcher,
    K: TableSink,
    S: Storage,
{
    async fn extract(&mut self) -> Result<ExtractResult> {
        let window = self.prepare().await?;
        let ctx = SyncContext {
            window: &window,
            query_options: &self.settings.query_options,
            page_cap: self.settings.page_cap,
        };

        // 一次處理一位作者，前面作者看過的識別碼後面就不會再抓
        let mut reports = Vec::with_capacity(self.settings.authors.len());
        for author in &self.settings.authors {
            let report =
                sync_author(author, &ctx, &self.search, &self.fetcher, &mut self.tracker).await;
            reports.push(report);
        }

        Ok(ExtractResult { window, reports })
    }

    async fn transform(&mut self, data: ExtractResult) -> Result<TransformResult> {
        let (combined, sections) = reconcile(&data.reports, &data.window);
        let placeholders = sections.iter().filter(|s| s.placeholder).count();
        tracing::debug!(
            "🧾 {} combined rows, {} placeholder sections",
            combined.len(),
            placeholders
        );

        Ok(TransformResult {
            window: data.window,
            combined,
            sections,
            reports: data.reports,
        })
    }

    async fn load(&mut self, result: TransformResult) -> Result<RunSummary> {
        // 稽核檔先寫，輸出目的地失敗時仍留有本次結果
        let audit = table_to_csv(&result.combined)?;
        self.storage
            .write_file(&self.settings.audit_csv, &audit)
            .await?;
        tracing::info!(
            "🗒️ Audit CSV written to {} ({} rows)",
            self.settings.audit_csv,
            result.combined.len()
        );

        self.sink.write_table(MASTER_SECTION, &result.combined).await?;
        for section in &result.sections {
            self.sink.write_table(&section.name, &section.table).await?;
        }
        self.sink
            .write_table(META_SECTION, &metadata_table(Utc::now()))
            .await?;
        tracing::info!("📤 Wrote {} sections to the output sink", result.sections.len() + 2);

        let failed_authors: Vec<(String, String)> = result
            .reports
            .iter()
            .filter_map(|r| r.failure.clone().map(|reason| (r.author.clone(), reason)))
            .collect();

        // 輸出成功後才提交狀態
        let state_committed = if result.window.uses_persisted_state() {
            let advance_clock = failed_authors.is_empty();
            if !advance_clock {
                tracing::warn!(
                    "⚠️ {} author(s) failed, keeping the previous window start for the next run",
                    failed_authors.len()
                );
            }
            let state = next_state(
                self.previous_state.as_ref(),
                self.now,
                self.tracker.snapshot(),
                advance_clock,
            );
            save_state(&self.storage, &self.settings.state_file, &state).await?;
            true
        } else {
            false
        };

        let reports = &result.reports;
        Ok(RunSummary {
            window: result.window,
            authors_processed: reports.len(),
            failed_authors,
            candidates: reports.iter().map(|r| r.candidates).sum(),
            skipped_seen: reports.iter().map(|r| r.skipped_seen).sum(),
            fetched: reports.iter().map(|r| r.fetched).sum(),
            accepted: reports.iter().map(|r| r.accepted.len()).sum(),
            rejected: reports.iter().map(|r| r.rejected()).sum(),
            dropped: reports.iter().map(|r| r.dropped).sum(),
            audit_path: self.settings.audit_csv.clone(),
            state_committed,
        })
    }
}

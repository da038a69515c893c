use crate::core::dedup::SeenTracker;
use crate::core::matcher::{filter_candidates, AuthorProfile};
use crate::core::query::{build_query, QueryOptions};
use crate::core::search_name::NameParts;
use crate::domain::model::{AuthorReport, TrackedAuthor, WindowSpec};
use crate::domain::ports::{DetailFetcher, SearchClient};
use std::collections::HashSet;

pub struct SyncContext<'a> {
    pub window: &'a WindowSpec,
    pub query_options: &'a QueryOptions,
    pub page_cap: usize,
}

/// 處理單一作者；抓取失敗只記在報告裡，不會中斷整次執行
pub async fn sync_author<Q, F>(
    author: &TrackedAuthor,
    ctx: &SyncContext<'_>,
    search: &Q,
    fetcher: &F,
    tracker: &mut SeenTracker,
) -> AuthorReport
where
    Q: SearchClient + ?Sized,
    F: DetailFetcher + ?Sized,
{
    let mut report = AuthorReport {
        author: author.full_name.clone(),
        ..AuthorReport::default()
    };

    let (parts, profile) = match NameParts::parse(&author.full_name)
        .and_then(|parts| AuthorProfile::from_author(author).map(|profile| (parts, profile)))
    {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(author = %author.full_name, "❌ {}", e);
            report.failure = Some(e.to_string());
            return report;
        }
    };

    report.query = build_query(
        &parts.search_name(),
        &author.affiliation_keywords,
        ctx.window,
        ctx.query_options,
    );
    tracing::info!(author = %author.full_name, "🔎 Searching: {}", report.query);

    let ids = match search.search(&report.query, ctx.page_cap).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(author = %author.full_name, "❌ Search failed: {}", e);
            report.failure = Some(e.to_string());
            return report;
        }
    };
    report.candidates = ids.len();
    if ids.len() >= ctx.page_cap {
        tracing::warn!(
            author = %author.full_name,
            "⚠️ Search hit the {} result cap; older records in the window may be missing",
            ctx.page_cap
        );
    }

    let unseen = tracker.filter_unseen(&ids);
    report.skipped_seen = ids.iter().filter(|id| tracker.contains(id)).count();
    tracing::debug!(
        author = %author.full_name,
        "📥 {} candidates, {} already seen, {} to fetch",
        ids.len(),
        report.skipped_seen,
        unseen.len()
    );

    if unseen.is_empty() {
        return report;
    }

    let batch = match fetcher.fetch(&unseen).await {
        Ok(batch) => batch,
        Err(e) => {
            tracing::error!(author = %author.full_name, "❌ Detail fetch failed: {}", e);
            report.failure = Some(e.to_string());
            return report;
        }
    };
    report.fetched = batch.records.len();
    report.dropped = batch.dropped;

    // 只有實際回傳的識別碼才算看過；沒回來的下次再抓
    let returned: HashSet<&str> = batch.returned_ids().collect();
    let (seen_now, missing): (Vec<String>, Vec<String>) = unseen
        .into_iter()
        .partition(|id| returned.contains(id.as_str()));
    if !missing.is_empty() {
        tracing::warn!(
            author = %author.full_name,
            "⚠️ {} identifiers missing from efetch response, left for next run",
            missing.len()
        );
    }

    let (accepted, decisions) = filter_candidates(batch.records, &profile);
    report.accepted = accepted;
    report.decisions = decisions;

    // 不論是否接受都記為已看過，避免下次重抓被否決的候選
    tracker.mark_seen(seen_now);

    tracing::info!(
        author = %author.full_name,
        "📊 {} accepted, {} rejected, {} dropped",
        report.accepted.len(),
        report.rejected(),
        report.dropped
    );
    report
}

use crate::core::Storage;
use crate::domain::model::SyncState;
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// 讀取上次的同步狀態；檔案不存在代表第一次執行，不算錯誤
pub async fn load_state<S: Storage>(storage: &S, path: &str) -> Result<Option<SyncState>> {
    let bytes = match storage.read_file(path).await {
        Ok(bytes) => bytes,
        Err(EtlError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("📄 No sync state at {}, starting fresh", path);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    // 狀態檔損毀時不能默默重置，否則會把所有舊記錄再送一次
    let state: SyncState =
        serde_json::from_slice(&bytes).map_err(|e| EtlError::PersistenceError {
            path: path.to_string(),
            message: format!("state file is not valid JSON: {}", e),
        })?;

    tracing::info!(
        "📄 Loaded sync state: last run {}, {} seen identifiers",
        state.last_run_utc,
        state.seen_identifiers.len()
    );
    Ok(Some(state))
}

pub async fn save_state<S: Storage>(storage: &S, path: &str, state: &SyncState) -> Result<()> {
    let json = serde_json::to_string_pretty(state).map_err(|e| EtlError::PersistenceError {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    storage
        .write_file(path, json.as_bytes())
        .await
        .map_err(|e| EtlError::PersistenceError {
            path: path.to_string(),
            message: e.to_string(),
        })?;

    tracing::info!(
        "💾 Sync state saved: {} seen identifiers",
        state.seen_identifiers.len()
    );
    Ok(())
}

/// 有作者抓取失敗時保留舊的時間點，下次重查同一個區間
pub fn next_state(
    previous: Option<&SyncState>,
    now: DateTime<Utc>,
    seen: BTreeSet<String>,
    advance_clock: bool,
) -> SyncState {
    let last_run_utc = match previous {
        Some(prev) if !advance_clock => prev.last_run_utc,
        _ => now,
    };
    SyncState {
        last_run_utc,
        seen_identifiers: seen,
    }
}

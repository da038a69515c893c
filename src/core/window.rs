use crate::domain::model::{RunMode, WindowSpec};
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};

pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// 手動指定的日期區間；沒有結束日時以今天為準
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualWindow {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

/// 接受 `YYYY-MM-DD` 或 `YYYY/MM/DD`
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y/%m/%d"))
        .map_err(|e| EtlError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: format!("expected YYYY-MM-DD or YYYY/MM/DD ({})", e),
        })
}

pub fn resolve_window(
    last_run_utc: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    manual: Option<ManualWindow>,
    lookback_days: i64,
) -> Result<WindowSpec> {
    if let Some(manual) = manual {
        let end = manual.end.unwrap_or_else(|| now.date_naive());
        if end < manual.start {
            return Err(EtlError::ConfigError {
                message: format!(
                    "manual window ends ({}) before it starts ({})",
                    end, manual.start
                ),
            });
        }
        return Ok(WindowSpec {
            start: manual.start,
            end,
            mode: RunMode::Manual,
        });
    }

    let end = now.date_naive();
    let start = match last_run_utc {
        Some(last_run) => last_run.date_naive(),
        None => {
            tracing::info!(
                "🆕 No previous sync state, looking back {} days",
                lookback_days
            );
            (now - Duration::days(lookback_days)).date_naive()
        }
    };

    // 時鐘回撥時 last_run 可能比現在還晚
    Ok(WindowSpec {
        start: start.min(end),
        end,
        mode: RunMode::Incremental,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 8, 30, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_run_looks_back_thirty_days() {
        let window = resolve_window(None, now(), None, DEFAULT_LOOKBACK_DAYS).unwrap();
        assert_eq!(window.mode, RunMode::Incremental);
        assert_eq!(window.start, date(2024, 2, 14));
        assert_eq!(window.end, date(2024, 3, 15));
    }

    #[test]
    fn test_incremental_uses_last_run_day() {
        let last = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();
        let window = resolve_window(Some(last), now(), None, DEFAULT_LOOKBACK_DAYS).unwrap();
        assert_eq!(window.start, date(2024, 3, 1));
        assert_eq!(window.end, date(2024, 3, 15));
        assert!(window.uses_persisted_state());
    }

    #[test]
    fn test_manual_window_without_end_uses_today() {
        let manual = ManualWindow {
            start: date(2024, 1, 1),
            end: None,
        };
        let last = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let window = resolve_window(Some(last), now(), Some(manual), 30).unwrap();
        assert_eq!(window.mode, RunMode::Manual);
        assert_eq!(window.start, date(2024, 1, 1));
        assert_eq!(window.end, date(2024, 3, 15));
        assert!(!window.uses_persisted_state());
    }

    #[test]
    fn test_manual_end_before_start_is_config_error() {
        let manual = ManualWindow {
            start: date(2024, 2, 1),
            end: Some(date(2024, 1, 1)),
        };
        let err = resolve_window(None, now(), Some(manual), 30).unwrap_err();
        assert!(matches!(err, EtlError::ConfigError { .. }));
    }

    #[test]
    fn test_last_run_in_future_is_clamped() {
        let last = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let window = resolve_window(Some(last), now(), None, 30).unwrap();
        assert_eq!(window.start, window.end);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("d", "2024-01-31").unwrap(), date(2024, 1, 31));
        assert_eq!(parse_date("d", "2024/01/31").unwrap(), date(2024, 1, 31));
        assert!(parse_date("d", "31.01.2024").is_err());
    }
}

use crate::adapters::eutils::{self, EutilsSettings};
use crate::adapters::sink::section_file_name;
use crate::core::detail::DEFAULT_BATCH_SIZE;
use crate::core::query::{QueryOptions, DEFAULT_DATE_FIELD};
use crate::core::reconcile::{MASTER_SECTION, META_SECTION};
use crate::core::retry::RetryPolicy;
use crate::core::search_name::search_name;
use crate::core::window::{parse_date, ManualWindow, DEFAULT_LOOKBACK_DAYS};
use crate::core::TrackedAuthor;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_email, validate_file_extensions, validate_non_empty_string, validate_path,
    validate_positive_number, validate_range, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "pubmed-sync.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub run: RunConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub authors: Vec<TrackedAuthor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_tool")]
    pub tool: String,
    pub contact_email: String,
    pub api_key: Option<String>,
    pub output_sink_id: String,
    pub manual_start_date: Option<String>,
    pub manual_end_date: Option<String>,
    /// 另外存放作者名單的 TOML 檔，相對於設定檔所在目錄
    pub authors_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub page_cap: usize,
    pub batch_size: usize,
    pub date_field: String,
    pub embed_affiliation_terms: bool,
    pub timeout_seconds: u64,
    pub request_interval_ms: Option<u64>,
    pub lookback_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub base_dir: String,
    pub state_file: String,
    pub audit_csv: String,
    pub sink_dir: String,
    pub log_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
struct AuthorRoster {
    #[serde(default)]
    authors: Vec<TrackedAuthor>,
}

fn default_tool() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: eutils::DEFAULT_BASE_URL.to_string(),
            page_cap: eutils::MAX_PAGE_CAP,
            batch_size: DEFAULT_BATCH_SIZE,
            date_field: DEFAULT_DATE_FIELD.to_string(),
            embed_affiliation_terms: false,
            timeout_seconds: eutils::DEFAULT_TIMEOUT.as_secs(),
            request_interval_ms: None,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: ".".to_string(),
            state_file: "data/state.json".to_string(),
            audit_csv: "data/last_run.csv".to_string(),
            sink_dir: "output".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

impl SyncConfig {
    /// 從 TOML 檔案載入設定；若有 authors_file 也一併載入作者名單
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(EtlError::IoError)?;
        let mut config = Self::from_toml_str(&content)?;

        if let Some(authors_file) = config.run.authors_file.clone() {
            let roster_path = path
                .parent()
                .map(|dir| dir.join(&authors_file))
                .unwrap_or_else(|| PathBuf::from(&authors_file));
            let roster = load_roster(&roster_path)?;
            tracing::debug!(
                "👥 Loaded {} authors from {}",
                roster.len(),
                roster_path.display()
            );
            config.authors.extend(roster);
        }

        Ok(config)
    }

    /// 從 TOML 字串解析設定
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 命令列指定的日期優先於設定檔
    pub fn apply_window_overrides(&mut self, start: Option<String>, end: Option<String>) {
        if start.is_some() {
            self.run.manual_start_date = start;
        }
        if end.is_some() {
            self.run.manual_end_date = end;
        }
    }

    /// 未設定或未替換的 `${VAR}` 都視為沒有金鑰
    pub fn api_key(&self) -> Option<&str> {
        self.run
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && !key.starts_with("${"))
    }

    pub fn manual_window(&self) -> Result<Option<ManualWindow>> {
        let start = non_blank(&self.run.manual_start_date);
        let end = non_blank(&self.run.manual_end_date);

        match (start, end) {
            (None, None) => Ok(None),
            (None, Some(_)) => Err(EtlError::ConfigError {
                message: "run.manual_end_date is set without run.manual_start_date".to_string(),
            }),
            (Some(start), end) => {
                let start = parse_date("run.manual_start_date", start)?;
                let end = end
                    .map(|value| parse_date("run.manual_end_date", value))
                    .transpose()?;
                if let Some(end) = end {
                    if end < start {
                        return Err(EtlError::ConfigError {
                            message: format!(
                                "manual window ends ({}) before it starts ({})",
                                end, start
                            ),
                        });
                    }
                }
                Ok(Some(ManualWindow { start, end }))
            }
        }
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            date_field: self.search.date_field.clone(),
            embed_affiliation_terms: self.search.embed_affiliation_terms,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
        )
    }

    pub fn eutils_settings(&self) -> EutilsSettings {
        let api_key = self.api_key().map(str::to_string);
        if api_key.is_none() {
            tracing::warn!("⚠️ No NCBI API key configured, using the lower anonymous rate limit");
        }

        let mut settings = EutilsSettings::new(&self.run.tool, &self.run.contact_email, api_key);
        settings.base_url = self.search.base_url.clone();
        settings.batch_size = self.search.batch_size;
        settings.timeout = Duration::from_secs(self.search.timeout_seconds);
        if let Some(ms) = self.search.request_interval_ms {
            settings.request_interval = Duration::from_millis(ms);
        }
        settings
    }

    pub fn base_dir(&self) -> &Path {
        Path::new(&self.paths.base_dir)
    }

    /// 輸出活頁簿的目錄：sink_dir 底下以 output_sink_id 命名
    pub fn workbook_dir(&self) -> String {
        format!(
            "{}/{}",
            self.paths.sink_dir.trim_end_matches('/'),
            self.run.output_sink_id
        )
    }

    pub fn log_dir(&self) -> PathBuf {
        self.base_dir().join(&self.paths.log_dir)
    }

    /// 驗證設定的合理性，任何網路請求前就要失敗
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("run.tool", &self.run.tool)?;
        validate_email("run.contact_email", &self.run.contact_email)?;
        validate_non_empty_string("run.output_sink_id", &self.run.output_sink_id)?;
        if let Some(authors_file) = &self.run.authors_file {
            validate_file_extensions("run.authors_file", std::slice::from_ref(authors_file), &["toml"])?;
        }

        validate_url("search.base_url", &self.search.base_url)?;
        validate_range("search.page_cap", self.search.page_cap, 1, eutils::MAX_PAGE_CAP)?;
        validate_range("search.batch_size", self.search.batch_size, 1, DEFAULT_BATCH_SIZE)?;
        validate_non_empty_string("search.date_field", &self.search.date_field)?;
        validate_range("search.timeout_seconds", self.search.timeout_seconds, 1, 600)?;
        validate_range("search.lookback_days", self.search.lookback_days, 1, 3650)?;

        validate_positive_number("retry.max_attempts", self.retry.max_attempts as usize, 1)?;
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(EtlError::InvalidConfigValueError {
                field: "retry.max_delay_ms".to_string(),
                value: self.retry.max_delay_ms.to_string(),
                reason: "must not be smaller than retry.base_delay_ms".to_string(),
            });
        }

        validate_path("paths.base_dir", &self.paths.base_dir)?;
        validate_path("paths.state_file", &self.paths.state_file)?;
        validate_path("paths.audit_csv", &self.paths.audit_csv)?;
        validate_path("paths.sink_dir", &self.paths.sink_dir)?;
        validate_path("paths.log_dir", &self.paths.log_dir)?;

        self.manual_window()?;

        if self.authors.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "authors".to_string(),
            });
        }
        for author in &self.authors {
            search_name(&author.full_name)?;
        }
        self.validate_section_names()?;

        Ok(())
    }

    /// 每位作者各自一個輸出分頁；清理後的檔名撞在一起會互相覆蓋
    fn validate_section_names(&self) -> Result<()> {
        let mut taken: HashMap<String, &str> = [MASTER_SECTION, META_SECTION]
            .into_iter()
            .map(|section| (section_file_name(section).to_lowercase(), section))
            .collect();

        for author in &self.authors {
            let key = section_file_name(&author.full_name).to_lowercase();
            if let Some(existing) = taken.get(key.as_str()) {
                let reason = if existing.trim() == author.full_name.trim() {
                    "author is listed more than once".to_string()
                } else {
                    format!("output section collides with '{}'", existing)
                };
                return Err(EtlError::InvalidConfigValueError {
                    field: "authors".to_string(),
                    value: author.full_name.clone(),
                    reason,
                });
            }
            taken.insert(key, &author.full_name);
        }
        Ok(())
    }
}

impl Validate for SyncConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn load_roster(path: &Path) -> Result<Vec<TrackedAuthor>> {
    let content = std::fs::read_to_string(path).map_err(|e| EtlError::ConfigError {
        message: format!("cannot read authors file {}: {}", path.display(), e),
    })?;
    let roster: AuthorRoster =
        toml::from_str(&content).map_err(|e| EtlError::ConfigValidationError {
            field: "authors_file".to_string(),
            message: format!("TOML parsing error: {}", e),
        })?;
    Ok(roster.authors)
}

/// 替換環境變數 (例如 ${NCBI_API_KEY})；找不到的變數保留原樣
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
        message: format!("invalid placeholder pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

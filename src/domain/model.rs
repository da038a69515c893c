use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// 追蹤中的研究者，整個執行期間不可變
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedAuthor {
    pub full_name: String,
    #[serde(default)]
    pub affiliation_keywords: Vec<String>,
}

impl TrackedAuthor {
    pub fn new(full_name: impl Into<String>, affiliation_keywords: Vec<String>) -> Self {
        Self {
            full_name: full_name.into(),
            affiliation_keywords,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    Incremental,
    Manual,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Incremental => write!(f, "incremental"),
            RunMode::Manual => write!(f, "manual"),
        }
    }
}

/// 本次查詢的出版日期區間
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub mode: RunMode,
}

impl WindowSpec {
    /// MANUAL 模式既不讀也不寫持久化狀態
    pub fn uses_persisted_state(&self) -> bool {
        self.mode == RunMode::Incremental
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {} ({})",
            self.start.format("%Y/%m/%d"),
            self.end.format("%Y/%m/%d"),
            self.mode
        )
    }
}

/// 跨執行保存的同步狀態，JSON 欄位名稱沿用既有的 state.json 格式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub last_run_utc: DateTime<Utc>,
    #[serde(rename = "seen_pmids", default)]
    pub seen_identifiers: BTreeSet<String>,
}

/// efetch 回應裡的單一作者欄位
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAuthor {
    pub last_name: String,
    pub fore_name: String,
    pub initials: String,
    pub affiliations: Vec<String>,
}

impl RawAuthor {
    /// 例如 "Smith JA"
    pub fn display_name(&self) -> String {
        format!("{} {}", self.last_name, self.initials)
            .trim()
            .to_string()
    }
}

/// Detail Fetcher 解析出的原始記錄，尚未經過比對
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub id: String,
    pub title: String,
    pub journal: String,
    pub pub_year: String,
    pub doi: String,
    pub authors: Vec<RawAuthor>,
}

impl RawRecord {
    pub fn affiliations(&self) -> impl Iterator<Item = &str> {
        self.authors
            .iter()
            .flat_map(|a| a.affiliations.iter())
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn author_list(&self) -> Vec<String> {
        self.authors
            .iter()
            .filter(|a| !a.last_name.is_empty())
            .map(RawAuthor::display_name)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub id: String,
    pub title: String,
    pub journal: String,
    pub pub_year: String,
    pub doi: String,
    pub author_list: Vec<String>,
    pub source_url: String,
    pub tracked_author: String,
}

impl PublicationRecord {
    pub fn source_url_for(id: &str) -> String {
        format!("https://pubmed.ncbi.nlm.nih.gov/{}/", id)
    }

    pub fn from_raw(raw: RawRecord, tracked_author: &str) -> Self {
        let author_list = raw.author_list();
        let source_url = Self::source_url_for(&raw.id);
        Self {
            id: raw.id,
            title: raw.title,
            journal: raw.journal,
            pub_year: raw.pub_year,
            doi: raw.doi,
            author_list,
            source_url,
            tracked_author: tracked_author.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    /// 機構字串命中關鍵字
    AffiliationMatched,
    /// 記錄沒有任何機構字串，交給作者姓名判斷
    AffiliationInconclusive,
    /// 該作者沒有設定機構關鍵字
    NoAffiliationKeywords,
    AffiliationMismatch,
    AuthorMismatch,
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchReason::AffiliationMatched => "AFFILIATION_MATCH",
            MatchReason::AffiliationInconclusive => "AFFILIATION_INCONCLUSIVE",
            MatchReason::NoAffiliationKeywords => "NO_AFFILIATION_KEYWORDS",
            MatchReason::AffiliationMismatch => "AFFILIATION_MISMATCH",
            MatchReason::AuthorMismatch => "AUTHOR_MISMATCH",
        }
    }
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 比對結果，只用於診斷紀錄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDecision {
    pub id: String,
    pub outcome: MatchOutcome,
    pub reason: MatchReason,
}

impl MatchDecision {
    pub fn is_accepted(&self) -> bool {
        self.outcome == MatchOutcome::Accepted
    }
}

/// 單一作者的處理結果
#[derive(Debug, Clone, Default)]
pub struct AuthorReport {
    pub author: String,
    pub query: String,
    pub candidates: usize,
    pub skipped_seen: usize,
    pub fetched: usize,
    pub dropped: usize,
    pub accepted: Vec<PublicationRecord>,
    pub decisions: Vec<MatchDecision>,
    pub failure: Option<String>,
}

impl AuthorReport {
    pub fn rejected(&self) -> usize {
        self.decisions.iter().filter(|d| !d.is_accepted()).count()
    }
}

pub const OUTPUT_COLUMNS: [&str; 8] = [
    "id",
    "title",
    "journal",
    "pub_year",
    "doi",
    "authors",
    "source_url",
    "tracked_author",
];

/// 固定欄位順序的輸出表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub table: Table,
    pub placeholder: bool,
}

#[derive(Debug, Clone)]
pub struct ExtractResult {
    pub window: WindowSpec,
    pub reports: Vec<AuthorReport>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub window: WindowSpec,
    pub combined: Table,
    pub sections: Vec<Section>,
    pub reports: Vec<AuthorReport>,
}

/// 執行結束時印給使用者看的摘要
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub window: WindowSpec,
    pub authors_processed: usize,
    pub failed_authors: Vec<(String, String)>,
    pub candidates: usize,
    pub skipped_seen: usize,
    pub fetched: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub dropped: usize,
    pub audit_path: String,
    pub state_committed: bool,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed_authors.is_empty()
    }
}

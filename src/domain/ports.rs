use crate::domain::model::{ExtractResult, RawRecord, RunSummary, Table, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 以查詢字串取得識別碼清單（新到舊），最多 `page_cap` 筆
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str, page_cap: usize) -> Result<Vec<String>>;
}

/// 依識別碼取回完整書目資料；無法解析的記錄直接略過
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    async fn fetch(&self, identifiers: &[String]) -> Result<FetchedBatch>;
}

// 搜尋與明細共用同一個用戶端時，請求間隔也一併共用
#[async_trait]
impl<T: SearchClient + ?Sized> SearchClient for Arc<T> {
    async fn search(&self, query: &str, page_cap: usize) -> Result<Vec<String>> {
        (**self).search(query, page_cap).await
    }
}

#[async_trait]
impl<T: DetailFetcher + ?Sized> DetailFetcher for Arc<T> {
    async fn fetch(&self, identifiers: &[String]) -> Result<FetchedBatch> {
        (**self).fetch(identifiers).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchedBatch {
    pub records: Vec<RawRecord>,
    pub dropped: usize,
    /// 有回傳但解析失敗的識別碼（已知 PMID 者）
    pub dropped_ids: Vec<String>,
}

impl FetchedBatch {
    /// 回應裡實際出現過的識別碼，不論解析成功與否
    pub fn returned_ids(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .map(|r| r.id.as_str())
            .chain(self.dropped_ids.iter().map(String::as_str))
    }
}

/// 輸出目的地：每次寫入都是先清空再覆寫
#[async_trait]
pub trait TableSink: Send + Sync {
    async fn write_table(&self, section: &str, table: &Table) -> Result<()>;
}

#[async_trait]
pub trait Pipeline: Send {
    async fn extract(&mut self) -> Result<ExtractResult>;
    async fn transform(&mut self, data: ExtractResult) -> Result<TransformResult>;
    async fn load(&mut self, result: TransformResult) -> Result<RunSummary>;
}

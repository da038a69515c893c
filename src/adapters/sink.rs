use crate::core::{Storage, Table, TableSink};
use crate::utils::error::{EtlError, Result};

pub fn table_to_csv(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(&table.header)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }

    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

/// 分頁名稱轉成安全的檔名：保留英數字、`-` 與 `_`，其餘換成 `_`
pub fn section_file_name(section: &str) -> String {
    let cleaned: String = section
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "section.csv".to_string()
    } else {
        format!("{}.csv", cleaned)
    }
}

/// 本機的「活頁簿」：一個目錄代表一個輸出目的地，每個分頁一個 CSV 檔
pub struct CsvWorkbookSink<S: Storage> {
    storage: S,
    workbook_dir: String,
}

impl<S: Storage> CsvWorkbookSink<S> {
    pub fn new(storage: S, workbook_dir: impl Into<String>) -> Self {
        Self {
            storage,
            workbook_dir: workbook_dir.into(),
        }
    }

    pub fn section_path(&self, section: &str) -> String {
        format!(
            "{}/{}",
            self.workbook_dir.trim_end_matches('/'),
            section_file_name(section)
        )
    }
}

#[async_trait::async_trait]
impl<S: Storage> TableSink for CsvWorkbookSink<S> {
    async fn write_table(&self, section: &str, table: &Table) -> Result<()> {
        let path = self.section_path(section);
        let data = table_to_csv(table).map_err(|e| EtlError::SinkError {
            section: section.to_string(),
            message: e.to_string(),
        })?;

        // 整個檔案覆寫，等同先清空分頁再寫入
        self.storage
            .write_file(&path, &data)
            .await
            .map_err(|e| EtlError::SinkError {
                section: section.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!("📝 Wrote {} rows to section '{}' ({})", table.len(), section, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use tempfile::TempDir;

    fn table(rows: &[&[&str]]) -> Table {
        let mut table = Table::new(vec!["id".to_string(), "title".to_string()]);
        table.rows = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        table
    }

    #[test]
    fn test_section_file_name() {
        assert_eq!(section_file_name("Master"), "Master.csv");
        assert_eq!(section_file_name("Jane A Smith"), "Jane_A_Smith.csv");
        assert_eq!(section_file_name("_meta"), "_meta.csv");
        assert_eq!(section_file_name("O'Brien/K"), "O_Brien_K.csv");
        assert_eq!(section_file_name("  "), "section.csv");
    }

    #[test]
    fn test_csv_quotes_embedded_commas() {
        let data = table_to_csv(&table(&[&["1", "Heart, lungs and more"]])).unwrap();
        let text = String::from_utf8(data).unwrap();
        assert_eq!(text, "id,title\n1,\"Heart, lungs and more\"\n");
    }

    #[tokio::test]
    async fn test_write_table_overwrites_previous_contents() {
        let dir = TempDir::new().unwrap();
        let sink = CsvWorkbookSink::new(LocalStorage::new(dir.path()), "workbook");

        sink.write_table("Master", &table(&[&["1", "a"], &["2", "b"]]))
            .await
            .unwrap();
        sink.write_table("Master", &table(&[&["3", "c"]])).await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("workbook/Master.csv")).unwrap();
        assert_eq!(text, "id,title\n3,c\n");
    }
}

use crate::domain::model::{
    AuthorReport, PublicationRecord, Section, Table, WindowSpec, OUTPUT_COLUMNS,
};
use chrono::{DateTime, SecondsFormat, Utc};

pub const MASTER_SECTION: &str = "Master";
pub const META_SECTION: &str = "_meta";

pub fn header() -> Vec<String> {
    OUTPUT_COLUMNS.iter().map(|c| c.to_string()).collect()
}

pub fn record_row(record: &PublicationRecord) -> Vec<String> {
    vec![
        record.id.clone(),
        record.title.clone(),
        record.journal.clone(),
        record.pub_year.clone(),
        record.doi.clone(),
        record.author_list.join("; "),
        record.source_url.clone(),
        record.tracked_author.clone(),
    ]
}

/// 沒有結果的作者也要有一列說明，讓下游一定看得到每位作者的分頁
pub fn placeholder_row(report: &AuthorReport, window: &WindowSpec) -> Vec<String> {
    let note = match &report.failure {
        Some(reason) => format!("Search failed for this run: {}", reason),
        None => format!(
            "No new publications between {} and {}",
            window.start.format("%Y/%m/%d"),
            window.end.format("%Y/%m/%d")
        ),
    };
    let mut row = vec![String::new(); OUTPUT_COLUMNS.len()];
    row[1] = note;
    row[OUTPUT_COLUMNS.len() - 1] = report.author.clone();
    row
}

/// 合併所有作者的結果：一張總表加上每位作者各自的分頁（依設定順序）
pub fn reconcile(reports: &[AuthorReport], window: &WindowSpec) -> (Table, Vec<Section>) {
    let mut combined = Table::new(header());
    let mut sections = Vec::with_capacity(reports.len());

    for report in reports {
        let mut table = Table::new(header());
        let placeholder = report.accepted.is_empty();

        if placeholder {
            table.rows.push(placeholder_row(report, window));
        } else {
            for record in &report.accepted {
                let row = record_row(record);
                combined.rows.push(row.clone());
                table.rows.push(row);
            }
        }

        sections.push(Section {
            name: report.author.clone(),
            table,
            placeholder,
        });
    }

    (combined, sections)
}

pub fn metadata_table(written_at: DateTime<Utc>) -> Table {
    let mut table = Table::new(vec!["key".to_string(), "value".to_string()]);
    table.rows.push(vec![
        "last_write_utc".to_string(),
        written_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::RunMode;
    use chrono::{NaiveDate, TimeZone};

    fn window() -> WindowSpec {
        WindowSpec {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            mode: RunMode::Incremental,
        }
    }

    fn publication(id: &str, author: &str) -> PublicationRecord {
        PublicationRecord {
            id: id.to_string(),
            title: format!("Paper {}", id),
            journal: "J Test".to_string(),
            pub_year: "2024".to_string(),
            doi: format!("10.1/{}", id),
            author_list: vec!["Smith JA".to_string(), "Doe J".to_string()],
            source_url: PublicationRecord::source_url_for(id),
            tracked_author: author.to_string(),
        }
    }

    fn report(author: &str, accepted: Vec<PublicationRecord>) -> AuthorReport {
        AuthorReport {
            author: author.to_string(),
            accepted,
            ..AuthorReport::default()
        }
    }

    #[test]
    fn test_column_order_is_fixed() {
        assert_eq!(
            header(),
            vec!["id", "title", "journal", "pub_year", "doi", "authors", "source_url", "tracked_author"]
        );
        let row = record_row(&publication("101", "Jane A Smith"));
        assert_eq!(row[0], "101");
        assert_eq!(row[5], "Smith JA; Doe J");
        assert_eq!(row[7], "Jane A Smith");
    }

    #[test]
    fn test_empty_author_gets_exactly_one_placeholder() {
        let reports = vec![
            report("Jane A Smith", vec![publication("101", "Jane A Smith")]),
            report("Rachel Leon", vec![]),
        ];
        let (combined, sections) = reconcile(&reports, &window());

        assert_eq!(combined.len(), 1);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "Jane A Smith");
        assert!(!sections[0].placeholder);

        let empty = &sections[1];
        assert!(empty.placeholder);
        assert_eq!(empty.table.len(), 1);
        assert_eq!(empty.table.header, header());
        assert_eq!(empty.table.rows[0][0], "");
        assert!(empty.table.rows[0][1].contains("2024/01/01"));
        assert_eq!(empty.table.rows[0][7], "Rachel Leon");
    }

    #[test]
    fn test_failed_author_placeholder_mentions_failure() {
        let mut failed = report("Rachel Leon", vec![]);
        failed.failure = Some("esearch failed after 4 attempt(s)".to_string());
        let (_, sections) = reconcile(&[failed], &window());
        assert!(sections[0].table.rows[0][1].starts_with("Search failed"));
    }

    #[test]
    fn test_metadata_table() {
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
        let table = metadata_table(at);
        assert_eq!(table.rows, vec![vec!["last_write_utc".to_string(), "2024-02-01T12:00:00Z".to_string()]]);
    }
}

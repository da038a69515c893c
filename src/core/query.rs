use crate::domain::model::WindowSpec;

pub const DEFAULT_DATE_FIELD: &str = "Date - Publication";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// 搜尋引擎的日期欄位標籤
    pub date_field: String,
    /// 是否把機構關鍵字直接放進查詢
    pub embed_affiliation_terms: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            date_field: DEFAULT_DATE_FIELD.to_string(),
            embed_affiliation_terms: false,
        }
    }
}

fn quote(term: &str) -> String {
    format!("\"{}\"", term.trim().replace('"', ""))
}

pub fn build_query(
    search_name: &str,
    affiliation_keywords: &[String],
    window: &WindowSpec,
    options: &QueryOptions,
) -> String {
    let mut parts = vec![format!("{}[Author]", quote(search_name))];

    parts.push(format!(
        "({start}[{field}] : {end}[{field}])",
        start = quote(&window.start.format("%Y/%m/%d").to_string()),
        end = quote(&window.end.format("%Y/%m/%d").to_string()),
        field = options.date_field,
    ));

    if options.embed_affiliation_terms {
        let terms: Vec<String> = affiliation_keywords
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| format!("{}[Affiliation]", quote(k)))
            .collect();
        if !terms.is_empty() {
            parts.push(format!("({})", terms.join(" OR ")));
        }
    }

    parts.join(" AND ")
}

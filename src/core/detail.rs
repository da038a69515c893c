use crate::domain::model::{RawAuthor, RawRecord};
use crate::utils::error::EtlError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// efetch 每次請求最多的識別碼數量
pub const DEFAULT_BATCH_SIZE: usize = 200;

const ARTICLE_OPEN: &str = "<PubmedArticle";
const ARTICLE_CLOSE: &str = "</PubmedArticle>";

pub fn chunk_ids(ids: &[String], batch_size: usize) -> std::slice::Chunks<'_, String> {
    ids.chunks(batch_size.max(1))
}

/// 一次 efetch 回應的解析結果；壞掉的記錄放在 `issues`，不影響其他記錄
#[derive(Debug, Default)]
pub struct ParsedArticleSet {
    pub records: Vec<RawRecord>,
    pub issues: Vec<EtlError>,
}

pub fn parse_article_set(xml: &str) -> ParsedArticleSet {
    let mut parsed = ParsedArticleSet::default();

    for (index, segment) in article_segments(xml).into_iter().enumerate() {
        match parse_article(segment) {
            Ok(record) => parsed.records.push(record),
            Err(message) => {
                let record = sniff_pmid(segment).unwrap_or_else(|| format!("#{}", index + 1));
                tracing::warn!(record = %record, "⚠️ Dropping unparseable record: {}", message);
                parsed.issues.push(EtlError::ParseError { record, message });
            }
        }
    }

    parsed
}

/// 把 `<PubmedArticle>...</PubmedArticle>` 各自切開，讓每筆記錄獨立解析
fn article_segments(xml: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut rest = xml;

    while let Some(start) = find_article_open(rest) {
        let tail = &rest[start..];
        let next_open = find_article_open(&tail[ARTICLE_OPEN.len()..])
            .map(|pos| pos + ARTICLE_OPEN.len());

        match (tail.find(ARTICLE_CLOSE), next_open) {
            // 下一筆記錄開始前就要結束，否則缺結尾標籤的記錄會連累下一筆
            (Some(end), next) if next.map_or(true, |open| end < open) => {
                let stop = end + ARTICLE_CLOSE.len();
                segments.push(&tail[..stop]);
                rest = &tail[stop..];
            }
            (_, Some(open)) => {
                segments.push(&tail[..open]);
                rest = &tail[open..];
            }
            (_, None) => {
                // 沒有結尾標籤，交給解析器報錯
                segments.push(tail);
                break;
            }
        }
    }

    segments
}

fn find_article_open(s: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(pos) = s[offset..].find(ARTICLE_OPEN) {
        let idx = offset + pos;
        let after = idx + ARTICLE_OPEN.len();
        // 排除 <PubmedArticleSet>
        match s[after..].chars().next() {
            Some(c) if c == '>' || c.is_whitespace() => return Some(idx),
            _ => offset = after,
        }
    }
    None
}

fn sniff_pmid(segment: &str) -> Option<String> {
    let open = segment.find("<PMID")?;
    let body_start = open + segment[open..].find('>')? + 1;
    let body_end = body_start + segment[body_start..].find("</PMID>")?;
    let pmid = segment[body_start..body_end].trim();
    (!pmid.is_empty()).then(|| pmid.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Pmid,
    Title,
    Journal,
    Year,
    MedlineDate,
    LastName,
    ForeName,
    Initials,
    Affiliation,
    Doi,
    ELocationDoi,
}

#[derive(Default)]
struct ArticleBuilder {
    record: RawRecord,
    author: Option<RawAuthor>,
    medline_date: String,
    elocation_doi: String,
}

impl ArticleBuilder {
    fn set(&mut self, field: Field, value: String) {
        match field {
            Field::Pmid => self.record.id = value,
            Field::Title => self.record.title = value,
            Field::Journal => self.record.journal = value,
            Field::Year => self.record.pub_year = value,
            Field::MedlineDate => self.medline_date = value,
            Field::Doi => self.record.doi = value,
            Field::ELocationDoi => self.elocation_doi = value,
            Field::LastName | Field::ForeName | Field::Initials | Field::Affiliation => {
                if let Some(author) = self.author.as_mut() {
                    match field {
                        Field::LastName => author.last_name = value,
                        Field::ForeName => author.fore_name = value,
                        Field::Initials => author.initials = value,
                        _ => {
                            if !value.is_empty() {
                                author.affiliations.push(value)
                            }
                        }
                    }
                }
            }
        }
    }

    fn finish(mut self) -> Result<RawRecord, String> {
        if self.record.id.is_empty() {
            return Err("record has no PMID".to_string());
        }
        if self.record.pub_year.is_empty() {
            self.record.pub_year = first_year(&self.medline_date).unwrap_or_default();
        }
        if self.record.doi.is_empty() {
            self.record.doi = self.elocation_doi;
        }
        Ok(self.record)
    }
}

fn first_year(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    bytes
        .windows(4)
        .position(|w| w.iter().all(u8::is_ascii_digit))
        .map(|pos| text[pos..pos + 4].to_string())
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .map(|a| String::from_utf8_lossy(a.value.as_ref()).to_string())
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn field_for(stack: &[String], name: &str, e: &BytesStart<'_>) -> Option<Field> {
    let parent = stack.last().map(String::as_str);
    let grandparent = stack.len().checked_sub(2).map(|i| stack[i].as_str());

    match (parent, name) {
        (Some("MedlineCitation"), "PMID") => Some(Field::Pmid),
        (Some("Article"), "ArticleTitle") => Some(Field::Title),
        (Some("Journal"), "Title") => Some(Field::Journal),
        (Some("PubDate"), "Year") => Some(Field::Year),
        (Some("PubDate"), "MedlineDate") => Some(Field::MedlineDate),
        (Some("Author"), "LastName") => Some(Field::LastName),
        (Some("Author"), "ForeName") => Some(Field::ForeName),
        (Some("Author"), "Initials") => Some(Field::Initials),
        (Some("AffiliationInfo"), "Affiliation") => Some(Field::Affiliation),
        // 參考文獻裡也有 ArticleIdList，只取 PubmedData 底下這一份
        (Some("ArticleIdList"), "ArticleId")
            if grandparent == Some("PubmedData")
                && attr_value(e, b"IdType").as_deref() == Some("doi") =>
        {
            Some(Field::Doi)
        }
        (Some("Article"), "ELocationID") if attr_value(e, b"EIdType").as_deref() == Some("doi") => {
            Some(Field::ELocationDoi)
        }
        _ => None,
    }
}

fn parse_article(segment: &str) -> Result<RawRecord, String> {
    let mut reader = Reader::from_str(segment);
    let mut builder = ArticleBuilder::default();
    let mut stack: Vec<String> = Vec::new();
    let mut capture: Option<(Field, usize)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

                if capture.is_none() {
                    if let Some(field) = field_for(&stack, &name, &e) {
                        capture = Some((field, stack.len()));
                        text.clear();
                    }
                }
                if name == "Author" && stack.last().map(String::as_str) == Some("AuthorList") {
                    builder.author = Some(RawAuthor::default());
                }

                stack.push(name);
            }
            Ok(Event::End(_)) => {
                let name = stack.pop().unwrap_or_default();

                if let Some((field, depth)) = capture {
                    if depth == stack.len() {
                        builder.set(field, normalize_ws(&text));
                        capture = None;
                    }
                }
                if name == "Author" && stack.last().map(String::as_str) == Some("AuthorList") {
                    if let Some(author) = builder.author.take() {
                        builder.record.authors.push(author);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if capture.is_some() {
                    let unescaped = t.unescape().map_err(|e| format!("bad text content: {}", e))?;
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(t)) => {
                if capture.is_some() {
                    text.push_str(&String::from_utf8_lossy(t.as_ref()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML error at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(format!("record ends inside <{}>", stack.join("/")));
    }

    builder.finish()
}

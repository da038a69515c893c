use crate::utils::error::{EtlError, Result};

/// 從全名拆出的比對用欄位
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameParts {
    pub last_name: String,
    pub first_given: String,
    /// 最多兩個字元：名字首字母 + 第一個中間名首字母
    pub initials: String,
}

impl NameParts {
    pub fn parse(full_name: &str) -> Result<Self> {
        let tokens: Vec<&str> = full_name.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(EtlError::ValidationError {
                message: format!(
                    "author name '{}' needs at least a given name and a surname",
                    full_name.trim()
                ),
            });
        }

        let first = tokens[0];
        let last = tokens[tokens.len() - 1];

        let mut initials = String::new();
        push_initial(&mut initials, first);
        // 只有第一個中間名會貢獻縮寫
        if tokens.len() > 2 {
            push_initial(&mut initials, tokens[1]);
        }

        Ok(Self {
            last_name: last.to_string(),
            first_given: first.to_string(),
            initials,
        })
    }

    /// PubMed 作者搜尋字串，例如 "Leon RL"
    pub fn search_name(&self) -> String {
        format!("{} {}", self.last_name, self.initials)
    }
}

fn push_initial(out: &mut String, token: &str) {
    if let Some(c) = token.chars().next() {
        out.extend(c.to_uppercase());
    }
}

pub fn search_name(full_name: &str) -> Result<String> {
    NameParts::parse(full_name).map(|parts| parts.search_name())
}

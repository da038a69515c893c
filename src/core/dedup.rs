use std::collections::{BTreeSet, HashSet};

/// 跨執行的已處理識別碼集合，只在記憶體中變動，最後由提交步驟寫回
#[derive(Debug, Clone, Default)]
pub struct SeenTracker {
    seen: BTreeSet<String>,
    added: usize,
}

impl SeenTracker {
    pub fn new(seen: BTreeSet<String>) -> Self {
        Self { seen, added: 0 }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// 保留搜尋結果的順序，去掉已看過以及重複出現的識別碼
    pub fn filter_unseen(&self, ids: &[String]) -> Vec<String> {
        let mut emitted: HashSet<&str> = HashSet::new();
        let mut unseen = Vec::new();
        for id in ids {
            if !self.seen.contains(id) && emitted.insert(id.as_str()) {
                unseen.push(id.clone());
            }
        }
        unseen
    }

    pub fn mark_seen<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        for id in ids {
            if self.seen.insert(id) {
                self.added += 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// 本次執行新增的數量
    pub fn added(&self) -> usize {
        self.added
    }

    pub fn snapshot(&self) -> BTreeSet<String> {
        self.seen.clone()
    }
}

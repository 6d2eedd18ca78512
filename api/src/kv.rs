use eyre::Result;
use scc::hash_map::Entry;
use serde_json::Value;

use crate::utils::now_ms;

const LIST_PAGE_SIZE: usize = 128;

/// TTL-aware key-value store, the only persistent shared state in the
/// service. Holds first-seen records (`item:`), cluster memory (`cluster:`)
/// and cached enrichment results (`enrich:`). Expired entries are dropped
/// lazily on read and skipped by `list`.
///
/// All writes are last-writer-wins; callers treat failures as best-effort
/// and log them rather than failing the request.
pub struct Kv {
    entries: scc::HashMap<String, KvEntry>,
}

#[derive(Clone)]
struct KvEntry {
    value: Value,
    expires_at_ms: i64,
}

pub struct KvPage {
    pub keys: Vec<String>,
    pub cursor: Option<String>,
}

impl Kv {
    pub fn new() -> Self {
        Kv {
            entries: scc::HashMap::new(),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let hit = self.entries.read_async(key, |_, e| e.clone()).await;
        match hit {
            Some(entry) if entry.expires_at_ms > now_ms() => Ok(Some(entry.value)),
            Some(_) => {
                self.entries.remove_async(key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub async fn put(&self, key: &str, value: Value, ttl_secs: u64) -> Result<()> {
        let entry = KvEntry {
            value,
            expires_at_ms: now_ms() + (ttl_secs as i64) * 1000,
        };
        match self.entries.entry_async(key.to_string()).await {
            Entry::Occupied(mut occupied) => {
                *occupied.get_mut() = entry;
            }
            Entry::Vacant(vacant) => {
                vacant.insert_entry(entry);
            }
        }
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove_async(key).await;
        Ok(())
    }

    /// One page of live keys under a prefix, ordered lexicographically.
    /// `cursor` is the last key of the previous page.
    pub async fn list_page(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<KvPage> {
        let now = now_ms();
        let mut keys = Vec::new();
        self.entries
            .iter_async(|key, entry| {
                if key.starts_with(prefix) && entry.expires_at_ms > now {
                    keys.push(key.clone());
                }
                true
            })
            .await;
        keys.sort();

        let start = match cursor {
            Some(cursor) => keys.partition_point(|k| k.as_str() <= cursor),
            None => 0,
        };
        let page: Vec<String> = keys[start..].iter().take(page_size).cloned().collect();
        let cursor = if start + page.len() < keys.len() {
            page.last().cloned()
        } else {
            None
        };

        Ok(KvPage { keys: page, cursor })
    }

    /// All live keys under a prefix, following cursors page by page.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .list_page(prefix, cursor.as_deref(), LIST_PAGE_SIZE)
                .await?;
            all.extend(page.keys);
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(all)
    }
}

impl Default for Kv {
    fn default() -> Self {
        Self::new()
    }
}

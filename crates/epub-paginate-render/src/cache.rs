use std::collections::VecDeque;
use std::sync::Mutex;

use crate::page::{ContentFingerprint, PageUnit, PaginationCacheKey};

/// Storage hooks for paginated page lists.
pub trait PageCacheStore {
    /// Load pages for `key` over `content`, if available.
    fn load_pages(
        &self,
        _key: &PaginationCacheKey,
        _content: ContentFingerprint,
    ) -> Option<Vec<PageUnit>> {
        None
    }

    /// Persist pages for `key` over `content`.
    fn store_pages(&self, _key: &PaginationCacheKey, _content: ContentFingerprint, _pages: &[PageUnit]) {
    }
}

type CacheEntry = (PaginationCacheKey, ContentFingerprint, Vec<PageUnit>);

/// In-memory page cache bounded by entry count.
///
/// The oldest entry is evicted first once `capacity` is reached. Lock
/// poisoning degrades to a miss / no-op.
#[derive(Debug)]
pub struct MemoryPageCache {
    capacity: usize,
    entries: Mutex<VecDeque<CacheEntry>>,
}

impl Default for MemoryPageCache {
    fn default() -> Self {
        Self::new(4)
    }
}

impl MemoryPageCache {
    /// Create a cache holding at most `capacity` layouts.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Number of cached layouts.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl PageCacheStore for MemoryPageCache {
    fn load_pages(
        &self,
        key: &PaginationCacheKey,
        content: ContentFingerprint,
    ) -> Option<Vec<PageUnit>> {
        let entries = self.entries.lock().ok()?;
        entries
            .iter()
            .find(|(k, c, _)| k == key && *c == content)
            .map(|(_, _, pages)| pages.clone())
    }

    fn store_pages(&self, key: &PaginationCacheKey, content: ContentFingerprint, pages: &[PageUnit]) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.retain(|(k, c, _)| !(k == key && *c == content));
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back((key.clone(), content, pages.to_vec()));
    }
}

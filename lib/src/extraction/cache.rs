//! Advisory extraction cache keyed by file content hash and strategy set.
//!
//! Write-through with optimistic updates; two workers racing on the same
//! content insert identical values, so losing a race costs nothing. A cold
//! run never consults the cache and must be correct on its own.

use std::hash::Hasher;
use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxHasher;

use crate::config::StrategyKind;
use crate::extraction::FileExtraction;

pub fn content_hash(source: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(source.as_bytes());
    hasher.finish()
}

fn strategy_bit(strategy: StrategyKind) -> u8 {
    match strategy {
        StrategyKind::Pluck => 1,
        StrategyKind::Ast => 2,
        StrategyKind::Hybrid => 3,
    }
}

#[derive(Default)]
pub struct ExtractionCache {
    entries: DashMap<(u64, u8), Arc<FileExtraction>>,
}

impl ExtractionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: &str, strategy: StrategyKind) -> Option<Arc<FileExtraction>> {
        self.entries
            .get(&(content_hash(source), strategy_bit(strategy)))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn put(
        &self,
        source: &str,
        strategy: StrategyKind,
        extraction: Arc<FileExtraction>,
    ) -> Arc<FileExtraction> {
        self.entries
            .entry((content_hash(source), strategy_bit(strategy)))
            .or_insert(extraction)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

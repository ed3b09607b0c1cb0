use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::deapi::Lora;

// 缓存上限，超出时淘汰最早写入的条目
const MAX_ENTRIES: usize = 256;

/// 提交成功后暂存的生成参数，下载时取出用于写 metadata
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub prompt: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub seed: i64,
    pub steps: u32,
    pub guidance: f64,
    pub loras: Vec<Lora>,
    pub negative_prompt: Option<String>,
}

/// 进程级 request_id -> 生成参数 缓存。
/// 写入只发生在提交成功后，下载成功后取出并删除。
#[derive(Default)]
pub struct GenerationCache {
    entries: Mutex<HashMap<String, (Instant, GenerationParams)>>,
}

impl GenerationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, request_id: String, params: GenerationParams) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !entries.contains_key(&request_id) && entries.len() >= MAX_ENTRIES {
            let oldest = entries
                .iter()
                .min_by_key(|(_, (inserted_at, _))| *inserted_at)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                entries.remove(&key);
            }
        }
        entries.insert(request_id, (Instant::now(), params));
    }

    /// 取出并删除缓存条目
    pub fn take(&self, request_id: &str) -> Option<GenerationParams> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.remove(request_id).map(|(_, params)| params)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(prompt: &str) -> GenerationParams {
        GenerationParams {
            prompt: prompt.to_string(),
            model: "Flux1schnell".to_string(),
            width: 768,
            height: 768,
            seed: -1,
            steps: 4,
            guidance: 7.5,
            loras: Vec::new(),
            negative_prompt: None,
        }
    }

    #[test]
    fn take_consumes_entry() {
        let cache = GenerationCache::new();
        cache.insert("req-1".to_string(), params("a cat"));
        let taken = cache.take("req-1").unwrap();
        assert_eq!(taken.prompt, "a cat");
        assert!(cache.take("req-1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn take_missing_returns_none() {
        let cache = GenerationCache::new();
        assert!(cache.take("unknown").is_none());
    }

    #[test]
    fn insert_evicts_oldest_when_full() {
        let cache = GenerationCache::new();
        for i in 0..MAX_ENTRIES + 1 {
            cache.insert(format!("req-{i}"), params("p"));
        }
        assert_eq!(cache.len(), MAX_ENTRIES);
        assert!(cache.take("req-0").is_none());
        assert!(cache.take(&format!("req-{MAX_ENTRIES}")).is_some());
    }

    #[test]
    fn reinsert_overwrites_without_evicting() {
        let cache = GenerationCache::new();
        cache.insert("req-1".to_string(), params("first"));
        cache.insert("req-1".to_string(), params("second"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.take("req-1").unwrap().prompt, "second");
    }
}

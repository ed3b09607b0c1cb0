use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::deapi::Lora;

const METADATA_DIR: &str = ".metadata";
const INDEX_FILE: &str = "index.json";

/// 每张已下载图片持久化的 metadata 记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub request_id: String,
    pub prompt: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub seed: i64,
    pub steps: u32,
    pub guidance: f64,
    pub loras: Vec<Lora>,
    pub negative_prompt: Option<String>,
    pub result_url: String,
    pub file_path: String,
    pub generated_at: String,
    // tags 和 description 预留给后续搜索使用
    pub tags: Vec<String>,
    pub description: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MetadataIndex {
    pub images: Vec<ImageMetadata>,
}

/// 平面文件 metadata 存储：每个 request_id 一个 JSON 文件，
/// 外加一个按 generated_at 降序排列的 index.json。
#[derive(Clone, Debug)]
pub struct MetadataStore {
    images_root: PathBuf,
}

impl MetadataStore {
    pub fn new(images_root: PathBuf) -> Self {
        Self { images_root }
    }

    pub fn images_root(&self) -> &Path {
        &self.images_root
    }

    /// 未指定 save_path 时的默认保存路径
    pub fn default_image_path(&self, request_id: &str) -> PathBuf {
        self.images_root.join(format!("{request_id}.png"))
    }

    fn metadata_dir(&self) -> PathBuf {
        self.images_root.join(METADATA_DIR)
    }

    fn index_path(&self) -> PathBuf {
        self.metadata_dir().join(INDEX_FILE)
    }

    fn record_path(&self, request_id: &str) -> PathBuf {
        self.metadata_dir().join(format!("{request_id}.json"))
    }

    /// 写入单条记录并更新索引。同一 request_id 重复保存时覆盖旧条目。
    /// 索引每次全量重写，按 generated_at 降序。
    pub async fn save(&self, record: &ImageMetadata) -> Result<()> {
        fs::create_dir_all(self.metadata_dir()).await?;
        write_json_atomic(&self.record_path(&record.request_id), record).await?;

        let mut index = self.load_index().await?.unwrap_or_default();
        match index
            .images
            .iter_mut()
            .find(|img| img.request_id == record.request_id)
        {
            Some(existing) => *existing = record.clone(),
            None => index.images.push(record.clone()),
        }
        index
            .images
            .sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        write_json_atomic(&self.index_path(), &index).await
    }

    /// 读取索引，索引文件不存在时返回 None
    pub async fn load_index(&self) -> Result<Option<MetadataIndex>> {
        match fs::read(self.index_path()).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

// 先写临时文件再重命名，索引不会被中断留成半截
async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let payload = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &payload).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(request_id: &str, prompt: &str, generated_at: &str) -> ImageMetadata {
        ImageMetadata {
            request_id: request_id.to_string(),
            prompt: prompt.to_string(),
            model: "Flux1schnell".to_string(),
            width: 768,
            height: 768,
            seed: -1,
            steps: 4,
            guidance: 7.5,
            loras: Vec::new(),
            negative_prompt: None,
            result_url: format!("https://cdn.example/{request_id}.png"),
            file_path: format!("static/images/ai-generated/{request_id}.png"),
            generated_at: generated_at.to_string(),
            tags: Vec::new(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn save_writes_record_file_and_index() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path().to_path_buf());
        store
            .save(&record("req-1", "a cat", "2026-01-01T00:00:00+00:00"))
            .await
            .unwrap();

        let raw = fs::read(dir.path().join(".metadata/req-1.json"))
            .await
            .unwrap();
        let loaded: ImageMetadata = serde_json::from_slice(&raw).unwrap();
        assert_eq!(loaded.prompt, "a cat");

        let index = store.load_index().await.unwrap().unwrap();
        assert_eq!(index.images.len(), 1);
        assert_eq!(index.images[0].request_id, "req-1");
    }

    #[tokio::test]
    async fn save_upserts_by_request_id() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path().to_path_buf());
        store
            .save(&record("req-1", "first", "2026-01-01T00:00:00+00:00"))
            .await
            .unwrap();
        store
            .save(&record("req-1", "second", "2026-01-02T00:00:00+00:00"))
            .await
            .unwrap();

        let index = store.load_index().await.unwrap().unwrap();
        assert_eq!(index.images.len(), 1);
        assert_eq!(index.images[0].prompt, "second");
    }

    #[tokio::test]
    async fn index_is_sorted_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path().to_path_buf());
        store
            .save(&record("req-old", "old", "2026-01-01T00:00:00+00:00"))
            .await
            .unwrap();
        store
            .save(&record("req-new", "new", "2026-02-01T00:00:00+00:00"))
            .await
            .unwrap();
        store
            .save(&record("req-mid", "mid", "2026-01-15T00:00:00+00:00"))
            .await
            .unwrap();

        let index = store.load_index().await.unwrap().unwrap();
        let ids: Vec<&str> = index
            .images
            .iter()
            .map(|img| img.request_id.as_str())
            .collect();
        assert_eq!(ids, vec!["req-new", "req-mid", "req-old"]);
    }

    #[tokio::test]
    async fn load_index_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path().to_path_buf());
        assert!(store.load_index().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path().to_path_buf());
        store
            .save(&record("req-1", "a cat", "2026-01-01T00:00:00+00:00"))
            .await
            .unwrap();

        let mut entries = fs::read_dir(dir.path().join(".metadata")).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name();
            assert!(!name.to_string_lossy().ends_with(".tmp"));
        }
    }
}

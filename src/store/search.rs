use crate::store::metadata::{ImageMetadata, MetadataIndex};

/// 在索引上做线性过滤，保持索引自身的排序（generated_at 降序）。
///
/// - query：在 prompt 和 description 中做不区分大小写的子串匹配
/// - model：精确匹配
/// - tags：命中任意一个标签即通过
///
/// 空字符串、空列表和缺省一律视为"不过滤"。
pub fn search_index(
    index: &MetadataIndex,
    query: Option<&str>,
    model: Option<&str>,
    tags: Option<&[String]>,
    limit: usize,
) -> Vec<ImageMetadata> {
    let query = query
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase);
    let model = model.map(str::trim).filter(|value| !value.is_empty());
    let tags = tags.filter(|values| !values.is_empty());

    let mut results = Vec::new();
    for img in &index.images {
        if results.len() >= limit {
            break;
        }
        if let Some(ref query) = query {
            let prompt_match = img.prompt.to_lowercase().contains(query.as_str());
            let desc_match = img.description.to_lowercase().contains(query.as_str());
            if !(prompt_match || desc_match) {
                continue;
            }
        }
        if let Some(model) = model {
            if img.model != model {
                continue;
            }
        }
        if let Some(tags) = tags {
            if !tags.iter().any(|tag| img.tags.contains(tag)) {
                continue;
            }
        }
        results.push(img.clone());
    }
    results
}

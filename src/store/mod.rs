pub mod generation;
pub mod metadata;
pub mod search;

pub use generation::{GenerationCache, GenerationParams};
pub use metadata::{ImageMetadata, MetadataIndex, MetadataStore};
pub use search::search_index;

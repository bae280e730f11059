// src/text/mod.rs — Document text: extraction and segmentation

pub mod extract;
pub mod segmenter;

pub use extract::{extract, DocumentInfo, DocumentKind};
pub use segmenter::{chunk_document, segment, Chunk};

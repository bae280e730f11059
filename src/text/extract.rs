// src/text/extract.rs — Document text extraction
//
// Plain text and markdown are read directly. PDFs go through `pdftotext`
// (poppler-utils) when it is installed; there is no in-process PDF parser.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::errors::VoxbookError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Text,
    Pdf,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Text => write!(f, "text"),
            DocumentKind::Pdf => write!(f, "pdf"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub text: String,
    pub character_count: usize,
    pub word_count: usize,
    pub kind: DocumentKind,
    pub page_count: Option<usize>,
}

impl DocumentInfo {
    fn new(text: String, kind: DocumentKind, page_count: Option<usize>) -> Self {
        Self {
            character_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            text,
            kind,
            page_count,
        }
    }
}

pub fn detect_kind(path: &Path) -> Result<DocumentKind, VoxbookError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "text" | "md" | "markdown" => Ok(DocumentKind::Text),
        "pdf" => Ok(DocumentKind::Pdf),
        other => Err(VoxbookError::UnsupportedFile(if other.is_empty() {
            path.display().to_string()
        } else {
            format!(".{other}")
        })),
    }
}

/// Extract text from `path`, rejecting files over `max_bytes`.
pub async fn extract(path: &Path, max_bytes: u64) -> Result<DocumentInfo, VoxbookError> {
    let kind = detect_kind(path)?;

    let meta = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(VoxbookError::SourceMissing(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    if meta.len() > max_bytes {
        return Err(VoxbookError::FileTooLarge {
            size: meta.len(),
            limit: max_bytes,
        });
    }

    let info = match kind {
        DocumentKind::Text => {
            let bytes = tokio::fs::read(path).await?;
            let text = String::from_utf8_lossy(&bytes).into_owned();
            DocumentInfo::new(normalize(&text), kind, None)
        }
        DocumentKind::Pdf => {
            let raw = run_pdftotext(path).await?;
            // pdftotext separates pages with form feeds
            let pages = raw.split('\u{c}').filter(|p| !p.trim().is_empty()).count();
            DocumentInfo::new(normalize(&raw), kind, Some(pages))
        }
    };

    if info.text.trim().is_empty() {
        return Err(VoxbookError::EmptyDocument(path.to_path_buf()));
    }

    tracing::debug!(
        "Extracted {} chars / {} words from {}",
        info.character_count,
        info.word_count,
        path.display()
    );
    Ok(info)
}

async fn run_pdftotext(path: &Path) -> Result<String, VoxbookError> {
    let bin = which::which("pdftotext").map_err(|_| {
        VoxbookError::UnsupportedFile(
            ".pdf (install poppler-utils to provide `pdftotext`)".into(),
        )
    })?;

    let output = tokio::process::Command::new(bin)
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VoxbookError::UnsupportedFile(format!(
            "unreadable pdf: {}",
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Join hyphenated line breaks, unwrap hard-wrapped lines, keep paragraph
/// breaks, drop form feeds and control characters.
pub fn normalize(raw: &str) -> String {
    let cleaned: String = raw
        .replace("\r\n", "\n")
        .chars()
        .map(|c| match c {
            '\u{c}' => '\n',
            '\t' => ' ',
            c => c,
        })
        .filter(|c| !c.is_control() || *c == '\n')
        .collect();

    let mut paragraphs = Vec::new();
    for block in cleaned.split("\n\n") {
        let mut para = String::new();
        for line in block.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if para.ends_with('-') && line.starts_with(|c: char| c.is_lowercase()) {
                para.pop();
                para.push_str(line);
            } else {
                if !para.is_empty() {
                    para.push(' ');
                }
                para.push_str(line);
            }
        }
        if !para.is_empty() {
            paragraphs.push(para);
        }
    }
    paragraphs.join("\n\n")
}

//! Loading source documents from disk.

use super::splitter::clean_text;
use crate::error::{FinqueryError, Result};
use crate::vector_store::parse_date;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File extensions `load_path` picks up.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["json", "jsonl", "txt", "md"];

/// A document ready to be split and embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub source_url: String,
    pub title: String,
    pub published_at: Option<NaiveDate>,
    pub content: String,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default, alias = "url", alias = "source_file")]
    source_url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "date")]
    published_at: Option<String>,
    #[serde(alias = "text", alias = "page_content")]
    content: String,
}

impl RawDocument {
    fn into_document(self, fallback_source: String) -> SourceDocument {
        SourceDocument {
            source_url: self
                .source_url
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(fallback_source),
            title: self.title.unwrap_or_default().trim().to_string(),
            published_at: self.published_at.as_deref().and_then(parse_date),
            content: clean_text(&self.content),
        }
    }
}

/// Load every supported document under `path` (a file or a directory).
pub fn load_path(path: &Path) -> Result<Vec<SourceDocument>> {
    let files = if path.is_dir() {
        let mut files = Vec::new();
        collect_files(path, &mut files)?;
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut documents = Vec::new();
    for file in files {
        let loaded = load_file(&file)?;
        debug!("Loaded {} documents from {:?}", loaded.len(), file);
        documents.extend(loaded);
    }

    Ok(documents
        .into_iter()
        .filter(|d| {
            if d.content.is_empty() {
                warn!("Skipping {}: no content", d.source_url);
            }
            !d.content.is_empty()
        })
        .collect())
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if extension(&path).is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str())) {
            files.push(path);
        }
    }
    Ok(())
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Load the documents in a single file.
pub fn load_file(path: &Path) -> Result<Vec<SourceDocument>> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();
    let ext = extension(path).filter(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()));
    let Some(ext) = ext else {
        return Err(FinqueryError::Ingest(format!(
            "Unsupported file type: {} (expected one of {})",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    };
    let text = std::fs::read_to_string(path)?;

    match ext.as_str() {
        "json" => {
            let value: serde_json::Value = serde_json::from_str(&text)?;
            let items = match value {
                serde_json::Value::Array(items) => items,
                other => vec![other],
            };
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| -> Result<SourceDocument> {
                    let raw: RawDocument = serde_json::from_value(item)?;
                    Ok(raw.into_document(format!("{}#{}", file_name, i)))
                })
                .collect()
        }
        "jsonl" => text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| -> Result<SourceDocument> {
                let raw: RawDocument = serde_json::from_str(line)?;
                Ok(raw.into_document(format!("{}#{}", file_name, i + 1)))
            })
            .collect(),
        _ => {
            let title = text
                .lines()
                .map(|l| l.trim().trim_start_matches('#').trim())
                .find(|l| !l.is_empty())
                .unwrap_or(file_name.as_str())
                .to_string();
            Ok(vec![SourceDocument {
                source_url: file_name.clone(),
                title,
                published_at: None,
                content: clean_text(&text),
            }])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_json_array_with_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("releases.json");
        std::fs::write(
            &path,
            r#"[
                {"url": "https://ir.example.com/pr/1", "title": "Dividend", "date": "2024-12-05", "content": "Board declared\u0000 a dividend."},
                {"text": "No URL here"}
            ]"#,
        )
        .unwrap();

        let docs = load_file(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source_url, "https://ir.example.com/pr/1");
        assert_eq!(docs[0].published_at, NaiveDate::from_ymd_opt(2024, 12, 5));
        assert_eq!(docs[0].content, "Board declared  a dividend.");
        assert_eq!(docs[1].source_url, "releases.json#1");
    }

    #[test]
    fn test_load_directory_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("a.md"), "# 2023 Annual Report\n\nRisk factors...").unwrap();
        std::fs::write(
            dir.path().join("nested").join("b.jsonl"),
            "{\"source_file\": \"10q.pdf\", \"page_content\": \"Quarterly\"}\n\n{\"content\": \"   \"}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("ignored.pdf"), "binary").unwrap();

        let docs = load_path(dir.path()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].title, "2023 Annual Report");
        assert_eq!(docs[0].source_url, "a.md");
        assert_eq!(docs[1].source_url, "10q.pdf");
    }

    #[test]
    fn test_unsupported_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(load_file(&path), Err(FinqueryError::Ingest(_))));
    }
}

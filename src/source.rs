use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

/// Extensions picked up from the drop folder.
const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md", "text", "pdf"];

pub fn scan_drop_folder(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        warn!("drop folder does not exist: {}", dir.display());
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading drop folder {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| DOCUMENT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Text-source seam. `Ok("")` means the file holds no extractable text
/// (binary formats need a conversion backend that lives outside this
/// pipeline); `Err` means the source itself was unreadable. Every caller
/// tolerates the empty case.
pub fn extract_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(_) => {
            warn!("no text backend for binary file {}", path.display());
            Ok(String::new())
        }
    }
}

/// What the mail collaborator hands over per message. Attachments are
/// already-downloaded local paths; retrieval and auth live outside.
#[derive(Debug, Clone, Deserialize)]
pub struct MailMessage {
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

impl MailMessage {
    pub fn has_pdf(&self) -> bool {
        self.attachments.iter().any(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
    }
}

/// Local mailbox dump: a JSON array of messages.
pub fn load_mailbox(path: &Path) -> Result<Vec<MailMessage>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading mailbox {}", path.display()))?;
    let messages: Vec<MailMessage> =
        serde_json::from_str(&raw).with_context(|| format!("parsing mailbox {}", path.display()))?;
    debug!("loaded {} mailbox messages", messages.len());
    Ok(messages)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailbox_parses_with_defaults() {
        let json = r#"[
            {"subject": "RFP for cable supply", "attachments": ["data/inbox/RFP-2025-0042.pdf"]},
            {"subject": "Weekly digest", "body": "unsubscribe", "sender": "news@example.org"}
        ]"#;
        let messages: Vec<MailMessage> = serde_json::from_str(json).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].has_pdf());
        assert!(messages[0].body.is_empty());
        assert!(!messages[1].has_pdf());
    }

    #[test]
    fn extract_text_tolerates_binary() {
        let path = std::env::temp_dir().join(format!("tender_src_{}.pdf", std::process::id()));
        std::fs::write(&path, [0x25, 0x50, 0x44, 0x46, 0xff, 0xfe]).unwrap();
        assert_eq!(extract_text(&path).unwrap(), "");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn extract_text_reads_plain_files() {
        let path = std::env::temp_dir().join(format!("tender_src_{}.txt", std::process::id()));
        std::fs::write(&path, "Technical Specifications\n").unwrap();
        assert!(extract_text(&path).unwrap().contains("Technical"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_drop_folder_is_empty_not_error() {
        let dir = Path::new("data/does_not_exist_for_tests");
        assert!(scan_drop_folder(dir).unwrap().is_empty());
    }
}

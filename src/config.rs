use std::path::PathBuf;

use anyhow::Result;
use chrono::Datelike;

pub const INBOX_DIR: &str = "data/inbox";
pub const LINKED_DIR: &str = "data/linked";
pub const OUTPUT_DIR: &str = "data/extracted";
pub const RAW_TEXT_DIR: &str = "data/raw_text";
pub const COUNTER_FILE: &str = "data/tender_counter.txt";

pub const TENDER_ID_PREFIX: &str = "TDR";
pub const TENDER_ID_COUNTER_START: u32 = 0;

/// Year stamped into generated tender IDs. TENDER_ID_YEAR overrides the
/// current year, which keeps fixtures stable across year boundaries.
pub fn tender_year() -> i32 {
    std::env::var("TENDER_ID_YEAR")
        .ok()
        .and_then(|y| y.parse().ok())
        .unwrap_or_else(|| chrono::Utc::now().year())
}

pub fn ensure_dirs() -> Result<()> {
    for dir in [INBOX_DIR, LINKED_DIR, OUTPUT_DIR, RAW_TEXT_DIR] {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

pub fn counter_path() -> PathBuf {
    PathBuf::from(COUNTER_FILE)
}

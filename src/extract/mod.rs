pub mod ids;
pub mod info;
pub mod section;
pub mod specs;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::llm::LlmInfo;
use crate::text;
use self::info::ImportantInfo;
use self::specs::SpecRecord;

/// Formatted specifications are capped here, with an ellipsis on truncation.
pub const TECH_SPECS_MAX_CHARS: usize = 2000;

/// Rule-based extraction output for one document. Pure: no counter, no
/// network, safe to produce in parallel across documents.
#[derive(Debug, Clone)]
pub struct DocumentExtract {
    pub cleaned_text: String,
    pub section_lines: Vec<String>,
    pub records: Vec<SpecRecord>,
    pub fallback: Vec<String>,
    pub info: ImportantInfo,
}

/// Normalize, carve out the specification (or ATC) section, run the record
/// strategies, and sweep the full text for the scalar fields. When no
/// section header exists anywhere, the keyword classifier over paragraphs
/// and sentences stands in.
pub fn extract_document(raw: &str) -> DocumentExtract {
    let cleaned = text::clean(raw);

    let mut section_lines = section::locate_spec_section(&cleaned);
    if section_lines.is_empty() {
        section_lines = section::locate_atc_section(&cleaned);
    }

    let records = specs::extract(&section_lines);
    let fallback = if section_lines.is_empty() {
        specs::fallback_spec_lines(&cleaned)
    } else {
        Vec::new()
    };
    let info = info::extract_all(&cleaned);

    DocumentExtract {
        cleaned_text: cleaned,
        section_lines,
        records,
        fallback,
        info,
    }
}

impl DocumentExtract {
    /// Concise vertical format when records exist, bulleted fallback
    /// otherwise, empty when neither produced anything.
    pub fn formatted_specs(&self) -> String {
        if !self.records.is_empty() {
            specs::format_records(&self.records)
        } else if !self.fallback.is_empty() {
            specs::format_fallback(&self.fallback)
        } else {
            String::new()
        }
    }

    pub fn raw_specs(&self) -> Vec<String> {
        if !self.records.is_empty() {
            self.records.iter().map(SpecRecord::rendered).collect()
        } else {
            self.fallback.clone()
        }
    }
}

/// Fold linked-document specs into the main document's: main records first,
/// linked records appended behind them, one dedup over the lot. When the
/// main document had none, the linked records stand alone.
pub fn merge_linked(main: Vec<SpecRecord>, linked_texts: &[String]) -> Vec<SpecRecord> {
    let mut combined = main;
    for linked in linked_texts {
        let cleaned = text::clean(linked);
        let mut section_lines = section::locate_spec_section(&cleaned);
        if section_lines.is_empty() {
            section_lines = section::locate_atc_section(&cleaned);
        }
        combined.extend(specs::extract(&section_lines));
    }
    specs::dedup(combined)
}

/// The per-document output unit, mirrored to `<tender_id>.json` and the
/// tenders table. Two documents resolving to the same ID overwrite each
/// other — last write wins.
#[derive(Debug, Clone, Serialize)]
pub struct TenderRecord {
    pub tender_id: String,
    pub source_file: String,
    pub linked_sources: usize,
    pub project_name: Option<String>,
    pub ministry: Option<String>,
    pub delivery: Option<String>,
    pub deadline: Option<String>,
    pub warranty: Option<String>,
    pub quantities: Vec<String>,
    pub voltage: Option<String>,
    pub standards: Vec<String>,
    pub item_descriptions: Vec<String>,
    pub raw_specs: Vec<String>,
    pub technical_specifications: Option<String>,
    pub spec_count: usize,
    pub processed_at: DateTime<Utc>,
}

/// Merge the rule output with the optional LLM contribution. Rule values
/// always win; the LLM only fills gaps (including project name and
/// ministry, with the same precedence).
pub fn build_record(
    tender_id: String,
    source_file: &str,
    extract: &DocumentExtract,
    raw_specs: Vec<String>,
    formatted_specs: String,
    llm: Option<LlmInfo>,
    linked_sources: usize,
) -> TenderRecord {
    let llm = llm.unwrap_or_default();
    let spec_count = raw_specs.len();

    let formatted = if formatted_specs.trim().is_empty() {
        llm.technical_specs.unwrap_or_default()
    } else {
        formatted_specs
    };

    TenderRecord {
        tender_id,
        source_file: source_file.to_string(),
        linked_sources,
        project_name: extract.info.project_name.clone().or(llm.project_name),
        ministry: extract.info.ministry.clone().or(llm.ministry),
        delivery: extract.info.delivery.clone().or(llm.delivery),
        deadline: extract.info.deadline.clone(),
        warranty: extract.info.warranty.clone(),
        quantities: extract.info.quantities.clone(),
        voltage: extract.info.voltage.clone(),
        standards: extract.info.standards.clone(),
        item_descriptions: extract.info.item_descriptions.clone(),
        raw_specs,
        technical_specifications: cap_specs(&formatted),
        spec_count,
        processed_at: Utc::now(),
    }
}

fn cap_specs(formatted: &str) -> Option<String> {
    let trimmed = formatted.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() <= TECH_SPECS_MAX_CHARS {
        return Some(trimmed.to_string());
    }
    let mut capped: String = trimmed.chars().take(TECH_SPECS_MAX_CHARS).collect();
    capped.push_str("...");
    Some(capped)
}

/// Tender IDs can carry '/' (GEM shapes); flatten for the filesystem.
pub fn output_filename(tender_id: &str) -> String {
    let safe: String = tender_id
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    format!("{}.json", safe)
}

/// Write the record under its tender-id-derived filename, silently
/// overwriting any previous document that resolved to the same ID.
pub fn write_json(record: &TenderRecord, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(output_filename(&record.tender_id));
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

// ── Tests ──

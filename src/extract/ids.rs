use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info};

use crate::config;

/// Source of generated-ID counters. Injected so tests run against an
/// in-memory fake instead of the counter file.
pub trait SequenceProvider {
    fn next(&mut self) -> Result<u32>;
}

/// The authoritative counter: a single text file holding one integer, read
/// once at construction and rewritten wholesale on every generation. There is
/// no inter-process locking — concurrent pipelines can read a stale value and
/// emit duplicate generated IDs (accepted limitation).
pub struct FileCounter {
    path: PathBuf,
    counter: u32,
}

impl FileCounter {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let counter = fs::read_to_string(&path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(config::TENDER_ID_COUNTER_START);
        FileCounter { path, counter }
    }
}

impl SequenceProvider for FileCounter {
    fn next(&mut self) -> Result<u32> {
        self.counter += 1;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, self.counter.to_string())
            .with_context(|| format!("writing counter file {}", self.path.display()))?;
        Ok(self.counter)
    }
}

// ── Pattern families ──
//
// Each family is an ordered regex list; compact shapes come first so
// "RFP-2025-0042" resolves whole instead of losing its prefix to the
// labeled pattern's capture. Labeled captures must contain a digit, which
// rules out stray prose words after the anchor ("the RFP for ...").

static RFP_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b((?:RFP|RFQ)[-/]\d{4}[-/]\d{1,6})\b",
        r"(?i)\b(?:rfp|request\s+for\s+proposal|rfq|request\s+for\s+quotation)\s*(?:no\.?|number|id|ref(?:erence)?)?\s*[:#\-]?\s*([A-Za-z0-9\-/]*\d[A-Za-z0-9\-/]*)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TENDER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(TENDER[-/]\d{4}[-/]\d{1,6})\b",
        r"(?i)\btender\s+(?:no\.?|number|id|ref(?:erence)?)\s*[:#\-]?\s*([A-Za-z0-9\-/]*\d[A-Za-z0-9\-/]*)",
        r"(?i)\btender\s*[:#]\s*([A-Za-z0-9\-/]*\d[A-Za-z0-9\-/]*)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static BID_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(BID[-/]\d{4}[-/]\d{1,6})\b",
        r"(?i)\bbid\s+(?:no\.?|number|id)\s*[:#\-]?\s*([A-Za-z0-9\-/]*\d[A-Za-z0-9\-/]*)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static GEM_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(r"(?i)\b(GEM/\d{4}/[A-Z]/\d{3,7})\b").unwrap()]
});

static GENERIC_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(r"(?i)\b([A-Za-z]{2,10}[-/]\d{4}[-/]\d{3,6})\b").unwrap()]
});

/// Named matcher stage: a pure text → Option<id> function.
pub struct IdMatcher {
    pub name: &'static str,
    find: fn(&str) -> Option<String>,
}

/// Priority order is the contract: a document containing both an RFP
/// reference and a generic-looking token resolves to the RFP reference.
pub static MATCHERS: &[IdMatcher] = &[
    IdMatcher { name: "rfp", find: |t| first_candidate(&RFP_RES, t) },
    IdMatcher { name: "tender", find: |t| first_candidate(&TENDER_RES, t) },
    IdMatcher { name: "bid", find: |t| first_candidate(&BID_RES, t) },
    IdMatcher { name: "marketplace", find: |t| first_candidate(&GEM_RES, t) },
    IdMatcher { name: "generic", find: |t| first_candidate(&GENERIC_RES, t) },
];

fn first_candidate(res: &[Regex], text: &str) -> Option<String> {
    for re in res {
        for caps in re.captures_iter(text) {
            let raw = caps.get(1).map_or("", |g| g.as_str());
            let id = raw
                .trim_matches(|c: char| {
                    c.is_whitespace() || matches!(c, '-' | '_' | '/' | '.' | ',' | ':' | ';' | '(' | ')' | '[' | ']' | '"' | '\'')
                })
                .to_uppercase();
            if id.len() > 3 {
                return Some(id);
            }
        }
    }
    None
}

/// First-success-wins combinator over the matcher cascade.
pub fn match_text(text: &str) -> Option<(&'static str, String)> {
    MATCHERS
        .iter()
        .find_map(|m| (m.find)(text).map(|id| (m.name, id)))
}

static FILENAME_STEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-_]+$").unwrap());

const TRANSIENT_PREFIXES: &[&str] = &["temp_", "downloaded_", "attachment_"];

/// A clean filename stem is the strongest identity signal: used verbatim,
/// case preserved.
pub fn filename_id(filename: &str) -> Option<String> {
    let stem = Path::new(filename).file_stem()?.to_str()?;
    let lower = stem.to_lowercase();
    if stem.len() > 5
        && FILENAME_STEM_RE.is_match(stem)
        && !TRANSIENT_PREFIXES.iter().any(|p| lower.starts_with(p))
    {
        Some(stem.to_string())
    } else {
        None
    }
}

pub struct TenderIdResolver<S: SequenceProvider> {
    prefix: String,
    year: i32,
    seq: S,
}

impl<S: SequenceProvider> TenderIdResolver<S> {
    pub fn new(prefix: impl Into<String>, year: i32, seq: S) -> Self {
        TenderIdResolver { prefix: prefix.into(), year, seq }
    }

    /// Filename → text-pattern cascade → generated, in that order.
    pub fn resolve(&mut self, filename: Option<&str>, text: &str) -> Result<String> {
        if let Some(id) = filename.and_then(filename_id) {
            debug!("tender id from filename: {}", id);
            return Ok(id);
        }
        if let Some((stage, id)) = match_text(text) {
            debug!("tender id from {} pattern: {}", stage, id);
            return Ok(id);
        }
        self.generate()
    }

    pub fn generate(&mut self) -> Result<String> {
        let n = self.seq.next()?;
        let id = format!("{}-{}-{:04}", self.prefix, self.year, n);
        info!("generated tender id: {}", id);
        Ok(id)
    }
}

// ── Tests ──

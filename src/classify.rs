use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Subject-line phrases that accept immediately. Subject is the
/// highest-signal field, so this is deliberately the most lenient gate.
const SUBJECT_KEYWORDS: &[&str] = &[
    "rfp",
    "rfq",
    "tender",
    "bid",
    "bidding",
    "procurement",
    "request for proposal",
    "request for quotation",
    "invitation to tender",
    "invitation to bid",
    "notice inviting tender",
    "expression of interest",
    "corrigendum",
];

/// Marketing / transactional language that rejects, unless the same phrase
/// also appears in the subject (subject always overrides).
const EXCLUDE_PHRASES: &[&str] = &[
    "unsubscribe",
    "newsletter",
    "verify your email",
    "verification code",
    "password reset",
    "special offer",
    "limited time",
    "flash sale",
    "webinar",
];

/// Weaker body evidence: two or more hits required.
const BODY_KEYWORDS: &[&str] = &[
    "tender",
    "bid",
    "bidding",
    "rfq",
    "rfp",
    "request for quotation",
    "request for proposal",
    "procurement",
    "supply",
    "technical specification",
    "boq",
    "bill of quantities",
    "earnest money",
    "submission date",
];

/// Narrower list consulted only when a PDF attachment is present.
const PDF_KEYWORDS: &[&str] = &["tender", "rfp", "rfq", "bid", "procurement"];

static TENDER_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[A-Z]{2,10}[-/]\d{4}[-/]\d{3,6}\b|(?i)\btender\s*[:#]\s*\S+").unwrap()
});

fn count_hits(keywords: &[&str], text: &str) -> usize {
    keywords.iter().filter(|kw| text.contains(*kw)).count()
}

/// Precision-oriented cascade: each stage is strictly weaker evidence than
/// the last.
pub fn is_tender(subject: &str, body: &str, sender: &str, has_pdf: bool) -> bool {
    let subject_lower = subject.to_lowercase();
    let body_lower = body.to_lowercase();

    // Stage 1: subject keyword short-circuits everything else.
    if SUBJECT_KEYWORDS.iter().any(|kw| subject_lower.contains(kw)) {
        debug!("accepted on subject keyword: {}", subject);
        return true;
    }

    // Stage 2: body exclusion phrases, overridden by the subject.
    for phrase in EXCLUDE_PHRASES {
        if body_lower.contains(phrase) && !subject_lower.contains(phrase) {
            debug!("rejected on exclude phrase {:?} from {}", phrase, sender);
            return false;
        }
    }

    // Stage 3: enough independent body evidence.
    if count_hits(BODY_KEYWORDS, &body_lower) >= 2 {
        return true;
    }

    // Stage 4: PDF attachment plus at least one strong keyword anywhere.
    if has_pdf {
        let combined = format!("{} {}", subject_lower, body_lower);
        if count_hits(PDF_KEYWORDS, &combined) >= 1 {
            return true;
        }
    }

    // Stage 5: subject shaped like a tender reference number.
    TENDER_REF_RE.is_match(subject)
}

// ── Tests ──

use std::sync::LazyLock;

use regex::Regex;

/// Hard cap on collected lines; tables without an end trigger stop here.
const MAX_SECTION_LINES: usize = 200;

static SPEC_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:technical\s+specifications?|tech\.?\s*specs?|technical\s+requirements?|(?:product|item)\s+specifications?|specifications?)\b",
    )
    .unwrap()
});

static ATC_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:additional\s+terms\s*(?:&|and)\s*conditions|\batc\b)").unwrap()
});

static STANDARD_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:IS|IEC|IEEE|BS|ASTM|ISO)\s*[:\-]?\s*\d").unwrap());

static HEADER_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)specification\s+name|allowed\s+values|bid\s+requirement").unwrap()
});

/// Administrative language that closes the section when it appears alone.
const END_KEYWORDS: &[&str] = &[
    "terms and conditions",
    "terms & conditions",
    "payment terms",
    "payment schedule",
    "delivery period",
    "delivery schedule",
    "delivery terms",
    "delivery at",
    "warranty",
    "guarantee",
    "evaluation",
    "bid submission",
    "submission of bid",
    "annexure",
    "appendix",
    "boq",
    "bill of quantities",
    "eligibility criteria",
    "earnest money",
    "liquidated damages",
    "penalty clause",
];

/// Product language that overrides an end keyword on the same line
/// ("payment terms" closes; "payment terms, as per IS 7098" does not).
const SPEC_INDICATORS: &[&str] = &[
    "category",
    "conductor",
    "insulation",
    "sheath",
    "armour",
    "armor",
    "core",
    "cable",
    "voltage",
    "xlpe",
    "pvc",
    "sqmm",
    "sq.mm",
    "sq. mm",
    "specification name",
    "allowed values",
    "bid requirement",
];

pub fn locate_spec_section(text: &str) -> Vec<String> {
    collect_section(text, &SPEC_HEADER_RE)
}

pub fn locate_atc_section(text: &str) -> Vec<String> {
    collect_section(text, &ATC_HEADER_RE)
}

/// Line scan with an in-section state: a header line seeds the output, an
/// end-keyword line without a spec indicator terminates (line excluded),
/// everything in between is kept if it passes the inclusion test. Returns
/// empty when no header line exists — "no technical specification present".
fn collect_section(text: &str, header: &Regex) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut in_section = false;

    for raw in text.lines() {
        let line = raw.trim();

        if !in_section {
            if header.is_match(line) {
                in_section = true;
                out.push(line.to_string());
            }
            continue;
        }

        if line.is_empty() {
            continue;
        }

        if is_end_line(line) && !has_spec_indicator(line) {
            break;
        }

        if include_line(line) {
            out.push(line.to_string());
        }

        if out.len() >= MAX_SECTION_LINES {
            break;
        }
    }

    out
}

fn is_end_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    END_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

pub(crate) fn has_spec_indicator(line: &str) -> bool {
    let lower = line.to_lowercase();
    SPEC_INDICATORS.iter().any(|kw| lower.contains(kw)) || STANDARD_REF_RE.is_match(line)
}

fn include_line(line: &str) -> bool {
    has_spec_indicator(line)
        || is_table_separator(line)
        || HEADER_ROW_RE.is_match(line)
        || line.contains(':')
        || {
            let lower = line.to_lowercase();
            lower.contains("item category") || lower.contains("product category")
        }
}

/// Table rulings and cell padding: bare runs of | - _ + =, or trivially short.
fn is_table_separator(line: &str) -> bool {
    line.len() < 3
        || line
            .chars()
            .all(|c| matches!(c, '|' | '-' | '_' | '+' | '=' | ' '))
}

// ── Tests ──

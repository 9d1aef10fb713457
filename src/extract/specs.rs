use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::text;

/// Records whose rendered form exceeds this are dropped outright.
const MAX_RECORD_CHARS: usize = 200;
/// Generic key-value strategy rejects values at or beyond this length.
const MAX_GENERIC_VALUE_CHARS: usize = 150;

#[derive(Debug, Clone, PartialEq)]
pub struct SpecRecord {
    pub key: String,
    pub value: String,
}

impl SpecRecord {
    pub fn new(key: &str, value: &str) -> Self {
        SpecRecord {
            key: tidy(key),
            value: tidy(value),
        }
    }

    pub fn rendered(&self) -> String {
        format!("{}: {}", self.key, self.value)
    }
}

/// Strip bullet markers, keep the first table cell, collapse whitespace.
fn tidy(s: &str) -> String {
    let s = s.trim_start_matches(['•', '◦', '·', '*', '-', '–', ' ', '\t']);
    let cell = s.split('|').next().unwrap_or(s);
    cell.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalized(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

// ── Shared pattern tables ──

static TABLE_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)specification\s+name|bid\s+requirement|allowed\s+values").unwrap()
});

/// Table-start / flat-table anchors. The all-caps category names stay
/// case-sensitive so prose ("applicable standards") does not anchor a table.
static FLAT_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:(?i:specification\s+name|bid\s+requirement|allowed\s+values)|\b(?:STANDARDS|GENERIC|CONSTRUCTION)\b)",
    )
    .unwrap()
});

const CATEGORY_HEADERS: &[&str] = &[
    "STANDARDS",
    "CONSTRUCTION",
    "ARMOURING",
    "GENERIC",
    "CONDUCTOR",
    "INSULATION",
    "DIMENSION",
    "DIMENSIONS",
    "OPERATION",
    "PACKING",
    "MARKING",
];

/// Curated field names seen in labeled specification tables.
static FIELD_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)nominal\s+area\s+of\s+(?:the\s+)?conductor",
        r"(?i)material\s+of\s+(?:the\s+)?conductor",
        r"(?i)material\s+of\s+armou?ring",
        r"(?i)armou?ring\s+material",
        r"(?i)type\s+of\s+(?:outer\s+)?sheath",
        r"(?i)type\s+of\s+insulation",
        r"(?i)type\s+of\s+cable",
        r"(?i)number\s+of\s+cores?",
        r"(?i)conductor\s+class",
        r"(?i)(?:rated|working)\s+voltage",
        r"(?i)voltage\s+grade",
        r"(?i)applicable\s+standards?",
        r"(?i)colou?r\s+of\s+(?:outer\s+)?sheath",
        r"(?i)overall\s+diameter",
        r"(?i)(?:drum|standard)\s+length",
        r"(?i)total\s+quantity",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Value shapes, tried in order: numeric+unit, yes/no, "as per X",
/// capitalized phrase.
static VALUE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b\d+(?:[.,]\d+)*\s*(?:sq\.?\s*mm|sqmm|kv|kgs?|km|mm|mtrs?|meters?|nos\.?|v\b|m\b)",
        r"(?i)\b(?:yes|no)\b",
        r"(?i)\bas\s+per\s+[A-Za-z0-9 :/.\-]{1,60}",
        r"[A-Z][A-Za-z0-9 ./,&()%\-]{1,60}",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static ITEM_CATEGORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(item\s+category|product\s+category|item\s+description|वस्तु\s*श्रेणी)\s*[:\-–]\s*(.+)")
        .unwrap()
});

fn is_category_header(line: &str) -> bool {
    let bare = line.trim().trim_end_matches(':').trim();
    bare.len() < 30 && CATEGORY_HEADERS.contains(&bare.to_uppercase().as_str()) && bare == bare.to_uppercase()
}

fn is_separator(line: &str) -> bool {
    line.len() < 3
        || line
            .chars()
            .all(|c| matches!(c, '|' | '-' | '_' | '+' | '=' | ' '))
}

// ── Strategy 1: labeled table rows ──

/// Walk a rendered table: start at a header row (or a category header),
/// match curated field names, and pair each with a value found on the rest
/// of the line or on the next one or two lines.
pub fn labeled_table(lines: &[String]) -> Vec<SpecRecord> {
    let start = lines
        .iter()
        .position(|l| TABLE_START_RE.is_match(l))
        .or_else(|| lines.iter().position(|l| is_category_header(l)));
    let Some(start) = start else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        if is_category_header(line) || is_separator(line) {
            continue;
        }
        let Some(m) = FIELD_RES.iter().find_map(|re| re.find(line)) else {
            continue;
        };

        let key = m.as_str();
        let remainder = &line[m.end()..];
        if let Some(value) = value_in(remainder) {
            records.push(SpecRecord::new(key, &value));
            continue;
        }

        // Two-column rendering: the value landed on one of the next lines.
        for next in lines.iter().skip(i + 1).take(2) {
            if is_category_header(next) || is_separator(next) {
                continue;
            }
            if FIELD_RES.iter().any(|re| re.is_match(next)) {
                break;
            }
            if VALUE_RES.iter().any(|re| re.is_match(next)) {
                records.push(SpecRecord::new(key, next));
                break;
            }
        }
    }
    records
}

fn value_in(remainder: &str) -> Option<String> {
    let trimmed = remainder.trim_start_matches([':', '-', '–', '|', ' ', '\t']);
    if trimmed.is_empty() {
        return None;
    }
    VALUE_RES
        .iter()
        .find_map(|re| re.find(trimmed))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

// ── Strategy 2: concatenated single-line tables ──

/// Fixed dictionary of field names with the value shape expected right after
/// each, for tables flattened into one run-on line.
static FLAT_FIELDS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("Nominal Area Of Conductor", r"(?i)\d+(?:\.\d+)?\s*(?:sq\.?\s*mm|sqmm)"),
        ("Number Of Cores", r"\d+"),
        ("Material Of Conductor", r"(?i)alumini?um|copper"),
        ("Type Of Insulation", r"(?i)xlpe|pvc|epr|rubber"),
        ("Type Of Outer Sheath", r"(?i)(?:frls|hdpe|pvc(?:\s+st\d)?)"),
        ("Material Of Armouring", r"(?i)galvani[sz]ed\s+steel\s+(?:wire|strip)|steel\s+(?:wire|strip)|unarmoured"),
        ("Rated Voltage", r"(?i)\d+(?:\.\d+)?\s*k?v\b"),
        ("Applicable Standard", r"(?i)(?:IS|IEC)\s*[:\-]?\s*\d+(?:\s*Part\s*\d+)?(?:[/-]\d+)*"),
        ("Total Quantity", r"(?i)\d+(?:,\d+)*\s*(?:mtrs?|meters?|nos\.?|km|m\b)"),
    ]
    .into_iter()
    .map(|(name, p)| (name, Regex::new(p).unwrap()))
    .collect()
});

/// How far past a field name the value shape may start.
const FLAT_VALUE_WINDOW: usize = 80;

pub fn concatenated_table(lines: &[String]) -> Vec<SpecRecord> {
    let joined = lines.join(" ");
    let Some(anchor) = FLAT_ANCHOR_RE.find(&joined) else {
        return Vec::new();
    };
    let table = &joined[anchor.start()..];

    let mut records = Vec::new();
    for (name, value_re) in FLAT_FIELDS.iter() {
        let name_re = Regex::new(&format!(r"(?i){}", regex::escape(name))).unwrap();
        let Some(m) = name_re.find(table) else {
            continue;
        };
        let mut window_end = (m.end() + FLAT_VALUE_WINDOW).min(table.len());
        while !table.is_char_boundary(window_end) {
            window_end -= 1;
        }
        let window = &table[m.end()..window_end];
        if let Some(v) = value_re.find(window) {
            records.push(SpecRecord::new(name, v.as_str()));
        }
    }

    // Quantity is mandatory downstream; emit the documented default rather
    // than omitting the field.
    if !records.iter().any(|r| r.key == "Total Quantity") {
        records.push(SpecRecord::new("Total Quantity", "As per BOQ"));
    }
    records
}

// ── Strategy 3: generic key-value lines ──

const EXCLUDE_KEYWORDS: &[&str] = &[
    "delivery",
    "warranty",
    "guarantee",
    "payment",
    "bid submission",
    "submission date",
    "earnest money",
    "emd",
    "tender fee",
    "penalty",
    "liquidated",
    "evaluation",
];

const SPEC_KEY_KEYWORDS: &[&str] = &[
    "conductor", "insulation", "sheath", "armour", "armor", "cable", "core", "voltage",
    "standard", "material", "type", "size", "area", "diameter", "length", "quantity",
    "grade", "class", "colour", "color", "rating", "capacity", "frequency",
    "temperature", "resistance", "current", "category",
];

fn is_excluded(line: &str) -> bool {
    let lower = line.to_lowercase();
    EXCLUDE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn is_caps_header(line: &str) -> bool {
    line.len() < 30
        && !line.contains(':')
        && line.chars().any(|c| c.is_alphabetic())
        && line.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase())
}

fn has_spec_keyword(s: &str) -> bool {
    let lower = s.to_lowercase();
    SPEC_KEY_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

pub fn generic_key_value(lines: &[String]) -> Vec<SpecRecord> {
    let mut records = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if is_excluded(line) || is_separator(line) || is_caps_header(line) {
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let (key, value) = (key.trim(), value.trim());
            if !key.is_empty()
                && has_spec_keyword(key)
                && !value.is_empty()
                && value.len() < MAX_GENERIC_VALUE_CHARS
            {
                records.push(SpecRecord::new(key, value));
            }
            continue;
        }

        // Keyword line without a colon: the next usable line is its value.
        // Piped rows belong to the table strategies, not this one.
        if has_spec_keyword(line) && !line.contains('|') {
            if let Some(next) = lines
                .iter()
                .skip(i + 1)
                .find(|l| !is_excluded(l) && !is_separator(l))
            {
                if !next.contains(':')
                    && !next.contains('|')
                    && !next.is_empty()
                    && !is_caps_header(next)
                    && next.len() < MAX_GENERIC_VALUE_CHARS
                {
                    records.push(SpecRecord::new(line, next));
                }
            }
        }
    }
    records
}

// ── Item-category pass ──

/// Independent of the table strategies: item/product category labels can
/// appear anywhere in the section, including the Devanagari form.
pub fn item_categories(lines: &[String]) -> Vec<SpecRecord> {
    let mut records = Vec::new();
    for line in lines {
        if let Some(caps) = ITEM_CATEGORY_RE.captures(line) {
            let label = caps[1].to_lowercase();
            let key = if label.contains("description") {
                "Item Description"
            } else {
                "Item Category"
            };
            records.push(SpecRecord::new(key, &caps[2]));
        }
    }
    records
}

// ── Merge ──

/// Run every strategy over the same section lines and merge with one global
/// dedup: case-insensitive whitespace-normalized rendered form, first
/// occurrence wins, oversized or hollow records dropped.
pub fn extract(section: &[String]) -> Vec<SpecRecord> {
    let mut all = labeled_table(section);
    all.extend(concatenated_table(section));
    all.extend(generic_key_value(section));
    all.extend(item_categories(section));
    dedup(all)
}

pub fn dedup(records: Vec<SpecRecord>) -> Vec<SpecRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            !r.key.is_empty()
                && !r.value.is_empty()
                && r.rendered().chars().count() < MAX_RECORD_CHARS
        })
        .filter(|r| seen.insert(normalized(&r.rendered())))
        .collect()
}

/// Concise vertical rendering: one record per line, no bullets.
pub fn format_records(records: &[SpecRecord]) -> String {
    records
        .iter()
        .map(SpecRecord::rendered)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Fallback path (no locatable section) ──

static STANDARD_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:IS|IEC|IEEE|BS|ASTM|ISO)\s*[:\-]?\s*\d").unwrap());

const FALLBACK_KEYWORDS: &[&str] = &[
    "specification", "technical", "standard", "grade", "voltage", "conductor",
    "insulation", "sheath", "armour", "cable", "core", "compliance", "conforms", "as per",
];

const TECHNICAL_TERMS: &[&str] = &[
    "conductor", "insulation", "sheath", "voltage", "grade", "specification",
    "compliance", "conforms", "as per",
];

/// Keyword line classifier used when no section header was ever found.
pub fn is_spec_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    let keyword_hit = FALLBACK_KEYWORDS.iter().any(|kw| lower.contains(kw));
    let technical = TECHNICAL_TERMS.iter().any(|t| lower.contains(t));
    keyword_hit || (STANDARD_REF_RE.is_match(line) && technical)
}

/// Paragraph + sentence sweep, dedup'd first-wins.
pub fn fallback_spec_lines(full_text: &str) -> Vec<String> {
    let mut candidates = text::paragraphs(full_text);
    candidates.extend(text::sentences(full_text));

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| is_spec_line(c))
        .filter(|c| seen.insert(normalized(c)))
        .collect()
}

/// Bulleted rendering, visibly distinct from the sectioned format.
pub fn format_fallback(lines: &[String]) -> String {
    lines
        .iter()
        .map(|l| format!("• {}", l))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn labeled_table_same_line_values() {
        let section = lines(&[
            "Specification Name | Bid Requirement",
            "Nominal Area Of Conductor | 300 sqmm",
            "Material Of Conductor | Aluminium",
        ]);
        let records = labeled_table(&section);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].rendered(), "Nominal Area Of Conductor: 300 sqmm");
        assert_eq!(records[1].rendered(), "Material Of Conductor: Aluminium");
    }

    #[test]
    fn labeled_table_next_line_values() {
        let section = lines(&[
            "Specification Name",
            "Material Of Conductor",
            "Aluminium",
            "Type Of Outer Sheath",
            "PVC ST2",
        ]);
        let records = labeled_table(&section);
        assert!(records.contains(&SpecRecord::new("Material Of Conductor", "Aluminium")));
        assert!(records.contains(&SpecRecord::new("Type Of Outer Sheath", "PVC ST2")));
    }

    #[test]
    fn labeled_table_adjacent_fields_yield_no_value() {
        let section = lines(&[
            "Specification Name",
            "Material Of Conductor",
            "Type Of Outer Sheath",
        ]);
        // Next line is another field row, so neither gets a value.
        assert!(labeled_table(&section).is_empty());
    }

    #[test]
    fn labeled_table_tracks_past_category_headers() {
        let section = lines(&[
            "CONSTRUCTION",
            "Material Of Armouring | Galvanized Steel Wire",
            "STANDARDS",
            "Applicable Standards | As per IS 7098",
        ]);
        let records = labeled_table(&section);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].value, "As per IS 7098");
    }

    #[test]
    fn labeled_table_without_start_is_empty() {
        let section = lines(&["Material Of Conductor | Aluminium"]);
        assert!(labeled_table(&section).is_empty());
    }

    #[test]
    fn concatenated_table_run_on_line() {
        let section = lines(&[
            "Specification Name Bid Requirement GENERIC Material Of Conductor Aluminium Number Of Cores 3 Type Of Insulation XLPE Rated Voltage 1.1 kV Total Quantity 5000 Mtrs",
        ]);
        let records = concatenated_table(&section);
        let rendered: Vec<String> = records.iter().map(SpecRecord::rendered).collect();
        assert!(rendered.contains(&"Material Of Conductor: Aluminium".to_string()));
        assert!(rendered.contains(&"Number Of Cores: 3".to_string()));
        assert!(rendered.contains(&"Type Of Insulation: XLPE".to_string()));
        assert!(rendered.contains(&"Rated Voltage: 1.1 kV".to_string()));
        assert!(rendered.contains(&"Total Quantity: 5000 Mtrs".to_string()));
    }

    #[test]
    fn concatenated_table_emits_quantity_default() {
        let section = lines(&["STANDARDS Applicable Standard IS 7098 Material Of Conductor Copper"]);
        let records = concatenated_table(&section);
        assert!(records.contains(&SpecRecord::new("Total Quantity", "As per BOQ")));
    }

    #[test]
    fn concatenated_table_needs_anchor() {
        let section = lines(&["Material Of Conductor Aluminium Number Of Cores 3"]);
        assert!(concatenated_table(&section).is_empty());
    }

    #[test]
    fn generic_key_value_basic() {
        let section = lines(&[
            "Material of conductor: Aluminium",
            "Delivery period: 90 days",
            "Note: read carefully",
        ]);
        let records = generic_key_value(&section);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rendered(), "Material of conductor: Aluminium");
    }

    #[test]
    fn generic_keyword_line_takes_next_line_value() {
        let section = lines(&["Colour of outer sheath", "Black"]);
        let records = generic_key_value(&section);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rendered(), "Colour of outer sheath: Black");
    }

    #[test]
    fn generic_skips_caps_headers_and_separators() {
        let section = lines(&["CONSTRUCTION", "-----", "Grade of cable: heavy duty"]);
        let records = generic_key_value(&section);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn item_category_variants() {
        let section = lines(&[
            "Item Category: LT Power Cable",
            "product category - Armoured Cable",
            "वस्तु श्रेणी: केबल",
        ]);
        let records = item_categories(&section);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.key == "Item Category"));
    }

    #[test]
    fn dedup_first_wins_case_insensitive() {
        let records = vec![
            SpecRecord::new("Material Of Conductor", "Aluminium"),
            SpecRecord::new("material of conductor", "ALUMINIUM"),
            SpecRecord::new("Type of cable", "XLPE"),
        ];
        let deduped = dedup(records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].key, "Material Of Conductor");
    }

    #[test]
    fn dedup_drops_oversized_and_hollow() {
        let records = vec![
            SpecRecord::new("Material", &"x".repeat(250)),
            SpecRecord::new("", "value"),
            SpecRecord::new("Type of cable", "XLPE"),
        ];
        let deduped = dedup(records);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn bullets_stripped_on_construction() {
        let rec = SpecRecord::new("• Material of conductor", "- Aluminium");
        assert_eq!(rec.rendered(), "Material of conductor: Aluminium");
    }

    #[test]
    fn extract_two_record_scenario() {
        let section = lines(&[
            "Technical Specifications",
            "Material of conductor: Aluminium",
            "Type of cable: XLPE",
        ]);
        let records = extract(&section);
        let rendered: Vec<String> = records.iter().map(SpecRecord::rendered).collect();
        assert_eq!(
            rendered,
            vec!["Material of conductor: Aluminium", "Type of cable: XLPE"]
        );
    }

    #[test]
    fn fallback_classifier_and_format() {
        let text = "The cable shall conform to IS 7098.\n\nPlease submit invoices monthly.";
        let specs = fallback_spec_lines(text);
        assert!(specs.iter().any(|s| s.contains("IS 7098")));
        assert!(!specs.iter().any(|s| s.contains("invoices")));
        let formatted = format_fallback(&specs);
        assert!(formatted.starts_with("• "));
    }

    #[test]
    fn empty_section_yields_no_records() {
        assert!(extract(&[]).is_empty());
    }
}

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Fixed-shape record, created fresh per document. Scalar fields hold the
/// full matched substring — callers needing the bare number re-parse.
#[derive(Debug, Default, Clone)]
pub struct ImportantInfo {
    pub delivery: Option<String>,
    pub deadline: Option<String>,
    pub warranty: Option<String>,
    pub quantities: Vec<String>,
    pub voltage: Option<String>,
    pub standards: Vec<String>,
    pub item_descriptions: Vec<String>,
    pub project_name: Option<String>,
    pub ministry: Option<String>,
}

pub fn extract_all(text: &str) -> ImportantInfo {
    ImportantInfo {
        delivery: extract_delivery(text),
        deadline: extract_deadline(text),
        warranty: extract_warranty(text),
        quantities: extract_quantities(text),
        voltage: extract_voltage(text),
        standards: extract_standards(text),
        item_descriptions: extract_item_descriptions(text),
        project_name: extract_project_name(text),
        ministry: extract_ministry(text),
    }
}

fn first_match(res: &[Regex], text: &str) -> Option<String> {
    res.iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().trim().to_string())
}

static DELIVERY_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)delivery(?:\s+period|\s+time)?[:\s]+within\s+\d+\s*(?:days?|weeks?|months?)",
        r"(?i)delivery(?:\s+period|\s+time)?[:\s]+\d+\s*(?:days?|weeks?|months?)",
        r"(?i)lead\s+time[:\s]+\d+\s*(?:days?|weeks?|months?)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub fn extract_delivery(text: &str) -> Option<String> {
    first_match(&DELIVERY_RES, text)
}

static DEADLINE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(?:submission|closing|last)\s+date[:\s]+\d{1,2}[/-]\d{1,2}[/-]\d{2,4}",
        r"(?i)deadline[:\s]+\d{1,2}[/-]\d{1,2}[/-]\d{2,4}",
        r"(?i)bid\s+submission[:\s]+\d{1,2}[/-]\d{1,2}[/-]\d{2,4}",
        r"(?i)\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\s+(?:is\s+)?(?:the\s+)?(?:submission|closing|deadline)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub fn extract_deadline(text: &str) -> Option<String> {
    first_match(&DEADLINE_RES, text)
}

static WARRANTY_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)warranty[:\s]+\d+\s*(?:years?|months?|days?)",
        r"(?i)guarantee[:\s]+\d+\s*(?:years?|months?|days?)",
        r"(?i)\d+\s*(?:years?|months?|days?)\s+warranty",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub fn extract_warranty(text: &str) -> Option<String> {
    first_match(&WARRANTY_RES, text)
}

static QUANTITY_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(?:quantity|qty\.?)[:\s]+\d+(?:[.,]\d+)*\s*(?:meters?|mtrs?|pieces?|units?|nos?\.?|km)",
        r"(?i)\d+(?:[.,]\d+)*\s*(?:meters?|mtrs?|pieces?|units?|nos?\.?|km)\s+(?:of|quantity)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// All matches across the pattern list, concatenated, not deduplicated.
pub fn extract_quantities(text: &str) -> Vec<String> {
    QUANTITY_RES
        .iter()
        .flat_map(|re| re.find_iter(text))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

static VOLTAGE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\d+(?:\.\d+)?\s*k?v\s*(?:grade|rating)",
        r"(?i)voltage(?:\s+grade|\s+rating)?[:\s]+\d+(?:\.\d+)?\s*k?v\b",
        r"(?i)\d+(?:\.\d+)?\s*k?v\s+voltage",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub fn extract_voltage(text: &str) -> Option<String> {
    first_match(&VOLTAGE_RES, text)
}

static STANDARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(IS|IEC|IEEE|BS|ASTM|ISO)\s*[:\-]?\s*(\d+(?:[/-]\d+)*)").unwrap()
});

/// Standard references normalized to "ORG NUMBER" before set-dedup, so
/// "IS 7098", "as per IS 7098" and "IS-7098" all collapse to one entry.
/// Returned sorted.
pub fn extract_standards(text: &str) -> Vec<String> {
    let set: BTreeSet<String> = STANDARD_RE
        .captures_iter(text)
        .map(|caps| format!("{} {}", caps[1].to_uppercase(), &caps[2]))
        .collect();
    set.into_iter().collect()
}

const DESCRIPTION_NOUNS: &[&str] = &[
    "cable", "conductor", "insulation", "sheath", "wire", "item", "description",
    "material", "product",
];

pub fn extract_item_descriptions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            let lower = line.to_lowercase();
            line.len() > 20
                && !is_all_uppercase(line)
                && DESCRIPTION_NOUNS.iter().any(|n| lower.contains(n))
        })
        .map(String::from)
        .collect()
}

fn is_all_uppercase(line: &str) -> bool {
    let mut has_alpha = false;
    for c in line.chars().filter(|c| c.is_alphabetic()) {
        has_alpha = true;
        if c.is_lowercase() {
            return false;
        }
    }
    has_alpha
}

static PROJECT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)project(?:\s+name|\s+title)?\s*[:\-]\s*([^\n]{3,100})",
        r"(?i)name\s+of\s+(?:the\s+)?(?:project|work)\s*[:\-]\s*([^\n]{3,100})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static PROJECT_HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:supply|procurement|tender|rfp|rfq)\s+(?:of|for)\b").unwrap()
});

pub fn extract_project_name(text: &str) -> Option<String> {
    if let Some(caps) = PROJECT_RES.iter().find_map(|re| re.captures(text)) {
        return Some(caps[1].trim().trim_end_matches(['.', ',']).to_string());
    }
    // Title heuristic: an early line that reads like a work description.
    text.lines()
        .take(10)
        .map(str::trim)
        .find(|l| (20..=120).contains(&l.len()) && PROJECT_HINT_RE.is_match(l))
        .map(String::from)
}

static MINISTRY_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(ministry\s+of\s+[A-Za-z][A-Za-z &]{2,60})",
        r"(?i)\b(department\s+of\s+[A-Za-z][A-Za-z &]{2,60})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Known issuing ministries, matched as plain substrings when no explicit
/// "Ministry of X" phrasing survived text extraction.
const MINISTRIES: &[&str] = &[
    "Ministry of Power",
    "Ministry of Defence",
    "Ministry of Railways",
    "Ministry of Home Affairs",
    "Ministry of Road Transport and Highways",
    "Ministry of Rural Development",
    "Ministry of Housing and Urban Affairs",
    "Ministry of Heavy Industries",
    "Ministry of Petroleum and Natural Gas",
    "Ministry of Steel",
    "Ministry of Coal",
    "Ministry of New and Renewable Energy",
    "Ministry of Jal Shakti",
    "Ministry of Communications",
];

pub fn extract_ministry(text: &str) -> Option<String> {
    if let Some(caps) = MINISTRY_RES.iter().find_map(|re| re.captures(text)) {
        return Some(caps[1].trim().to_string());
    }
    let lower = text.to_lowercase();
    MINISTRIES
        .iter()
        .find(|m| lower.contains(&m.to_lowercase()))
        .map(|m| m.to_string())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_first_match_full_substring() {
        let text = "Delivery: within 90 days of purchase order. Lead time: 30 days.";
        assert_eq!(extract_delivery(text).as_deref(), Some("Delivery: within 90 days"));
    }

    #[test]
    fn delivery_absent_in_admin_tail() {
        let text = "Technical Specifications\nMaterial of conductor: Aluminium\nType of cable: XLPE\nTerms and Conditions\nPayment within 30 days";
        assert_eq!(extract_delivery(text), None);
    }

    #[test]
    fn deadline_date_shapes() {
        assert_eq!(
            extract_deadline("Last date: 15/09/2025 for submission").as_deref(),
            Some("Last date: 15/09/2025")
        );
        assert_eq!(
            extract_deadline("note that 15-09-2025 is the closing").as_deref(),
            Some("15-09-2025 is the closing")
        );
    }

    #[test]
    fn warranty_both_orders() {
        assert_eq!(extract_warranty("Warranty: 2 years from supply").as_deref(), Some("Warranty: 2 years"));
        assert_eq!(extract_warranty("offered with 18 months warranty").as_deref(), Some("18 months warranty"));
    }

    #[test]
    fn quantities_collects_all_matches() {
        let text = "Quantity: 5000 meters. Qty: 120 nos. spare drums. 5000 meters of cable.";
        let q = extract_quantities(text);
        assert_eq!(q.len(), 3); // not deduplicated
        assert!(q[0].starts_with("Quantity: 5000"));
    }

    #[test]
    fn voltage_grade_shape() {
        assert_eq!(extract_voltage("rated 1100 V grade cable").as_deref(), Some("1100 V grade"));
        assert_eq!(extract_voltage("Voltage: 11 kV system").as_deref(), Some("Voltage: 11 kV"));
    }

    #[test]
    fn standards_normalized_and_deduped() {
        let text = "as per IS 7098 and conforms to IEC 60502; as per IS 7098 again, also IS-7098.";
        let standards = extract_standards(text);
        assert_eq!(standards, vec!["IEC 60502", "IS 7098"]);
    }

    #[test]
    fn item_descriptions_filters_headers() {
        let text = "ITEM DESCRIPTION AND SCOPE\n1.1 kV armoured aluminium power cable, 3.5 core\nshort line";
        let descs = extract_item_descriptions(text);
        assert_eq!(descs.len(), 1);
        assert!(descs[0].contains("power cable"));
    }

    #[test]
    fn project_name_explicit_and_heuristic() {
        assert_eq!(
            extract_project_name("Project Name: Rural Electrification Phase II\nmore").as_deref(),
            Some("Rural Electrification Phase II")
        );
        let heuristic = "Tender Notice\nSupply of LT power cables to district stores\nIssued today";
        assert_eq!(
            extract_project_name(heuristic).as_deref(),
            Some("Supply of LT power cables to district stores")
        );
    }

    #[test]
    fn ministry_explicit_then_known_list() {
        assert_eq!(
            extract_ministry("issued under the Ministry of Power, Govt of India").as_deref(),
            Some("Ministry of Power")
        );
        assert_eq!(extract_ministry("plain commercial mail"), None);
    }

    #[test]
    fn everything_none_on_empty_input() {
        let info = extract_all("");
        assert!(info.delivery.is_none());
        assert!(info.deadline.is_none());
        assert!(info.warranty.is_none());
        assert!(info.quantities.is_empty());
        assert!(info.standards.is_empty());
        assert!(info.project_name.is_none());
        assert!(info.ministry.is_none());
    }
}

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{anyhow, Result};
use regex::Regex;
use tracing::{debug, info, warn};

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const FETCH_TIMEOUT_SECS: u64 = 30;

static HTTP_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).unwrap());
static WWW_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bwww\.[^\s<>"{}|\\^`\[\]]+"#).unwrap());

/// URLs mentioned in the document body, fenced punctuation trimmed,
/// bare www. hosts promoted to https, first occurrence wins.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    let candidates = HTTP_URL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .chain(WWW_URL_RE.find_iter(text).map(|m| format!("https://{}", m.as_str())));

    for raw in candidates {
        let url = raw
            .trim_end_matches(['.', ',', ';', ':', ')', ']', '}', '"', '\''])
            .to_string();
        if url.starts_with("http") && seen.insert(url.clone()) {
            urls.push(url);
        }
    }
    urls
}

/// Keyword/extension filter for links plausibly pointing at specification
/// documents.
pub fn is_spec_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.ends_with(".pdf") || lower.contains("spec") || lower.contains("download")
}

fn filename_for_url(url: &str, idx: usize) -> String {
    let name: String = url
        .rsplit('/')
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if name.is_empty() {
        format!("linked_{}.dat", idx)
    } else {
        name
    }
}

/// Download every spec-plausible link, save it under `dest`, and hand back
/// the texts that came out readable. Per-URL failures degrade to "no
/// contribution" — the document still processes on its own content.
pub async fn resolve_linked_texts(text: &str, dest: &Path) -> Vec<String> {
    let urls: Vec<String> = extract_urls(text).into_iter().filter(|u| is_spec_url(u)).collect();
    if urls.is_empty() {
        return Vec::new();
    }
    info!("following {} spec-plausible links", urls.len());

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            warn!("could not build http client: {}", e);
            return Vec::new();
        }
    };

    let mut texts = Vec::new();
    for (idx, url) in urls.iter().enumerate() {
        match fetch_with_retry(&client, url).await {
            Ok(bytes) => {
                let path = dest.join(filename_for_url(url, idx));
                if let Err(e) = save_bytes(&path, &bytes) {
                    warn!("could not save {}: {}", path.display(), e);
                }
                // Text conversion for binary formats is a separate backend;
                // here only readable payloads contribute.
                match String::from_utf8(bytes) {
                    Ok(body) if !body.trim().is_empty() => texts.push(body),
                    _ => debug!("no readable text in {}", url),
                }
            }
            Err(e) => warn!("link fetch failed for {}: {}", url, e),
        }
    }
    texts
}

fn save_bytes(path: &PathBuf, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

async fn fetch_with_retry(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    for attempt in 0..=MAX_RETRIES {
        match client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Ok(resp.bytes().await?.to_vec());
                }
                let retryable = status.as_u16() == 429 || status.is_server_error();
                if !retryable || attempt == MAX_RETRIES {
                    return Err(anyhow!("{} returned {}", url, status));
                }
            }
            Err(e) => {
                if attempt == MAX_RETRIES {
                    return Err(e.into());
                }
            }
        }
        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "retrying {} (attempt {}/{}), backing off {:.1}s",
            url,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }
    Err(anyhow!("retries exhausted for {}", url))
}

// ── Tests ──

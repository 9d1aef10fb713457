mod classify;
mod config;
mod db;
mod extract;
mod links;
mod llm;
mod source;
mod text;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{error, info, warn};

use extract::ids::{FileCounter, TenderIdResolver};

#[derive(Parser)]
#[command(name = "tender_agent", about = "Tender document ingestion and extraction pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register drop-folder documents and an optional mailbox dump
    Ingest {
        /// Mailbox JSON file with messages to classify
        #[arg(short, long)]
        mailbox: Option<PathBuf>,
    },
    /// Extract registered documents into tender records
    Process {
        /// Max documents to process (default: all pending)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Follow spec-plausible links found in document text
        #[arg(long)]
        follow_links: bool,
        /// Skip the LLM refinement pass even when a key is configured
        #[arg(long)]
        no_llm: bool,
    },
    /// Ingest + process in one pipeline
    Run {
        /// Mailbox JSON file with messages to classify
        #[arg(short, long)]
        mailbox: Option<PathBuf>,
        /// Max documents to process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Follow spec-plausible links found in document text
        #[arg(long)]
        follow_links: bool,
        /// Skip the LLM refinement pass even when a key is configured
        #[arg(long)]
        no_llm: bool,
    },
    /// Ledger statistics
    Stats,
    /// Extracted tenders table
    Overview {
        /// Filter by ministry substring
        #[arg(short, long)]
        ministry: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ingest { mailbox } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            ingest(&conn, mailbox.as_deref())
        }
        Commands::Process { limit, follow_links, no_llm } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            run_process(&conn, limit, follow_links, no_llm).await
        }
        Commands::Run { mailbox, limit, follow_links, no_llm } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            ingest(&conn, mailbox.as_deref())?;
            run_process(&conn, limit, follow_links, no_llm).await
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Documents:  {}", s.total);
            println!("Pending:    {}", s.pending);
            println!("Processed:  {}", s.processed);
            println!("Tenders:    {}", s.tenders);
            println!("With specs: {}", s.with_specs);
            Ok(())
        }
        Commands::Overview { ministry, limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, ministry.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No tenders extracted yet.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<18} | {:<28} | {:<24} | {:<22} | {:>5}",
                "#", "Tender ID", "Project", "Ministry", "Delivery", "Specs"
            );
            println!("{}", "-".repeat(115));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<18} | {:<28} | {:<24} | {:<22} | {:>5}",
                    i + 1,
                    truncate(&r.tender_id, 18),
                    truncate(&r.project_name, 28),
                    truncate(&r.ministry, 24),
                    truncate(&r.delivery, 22),
                    r.spec_count,
                );
            }
            println!("\n{} tenders | output: {}/", rows.len(), config::OUTPUT_DIR);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn ingest(conn: &rusqlite::Connection, mailbox: Option<&Path>) -> Result<()> {
    config::ensure_dirs()?;

    let mut candidates: Vec<(String, &str)> =
        source::scan_drop_folder(Path::new(config::INBOX_DIR))?
            .into_iter()
            .map(|p| (p.to_string_lossy().to_string(), "folder"))
            .collect();

    if let Some(mb) = mailbox {
        let messages = source::load_mailbox(mb)?;
        let mut accepted = 0usize;
        for msg in &messages {
            if classify::is_tender(&msg.subject, &msg.body, &msg.sender, msg.has_pdf()) {
                accepted += 1;
                for att in &msg.attachments {
                    candidates.push((att.to_string_lossy().to_string(), "mail"));
                }
            }
        }
        println!("Classified {} of {} messages as tenders", accepted, messages.len());
    }

    let registered = db::register_documents(conn, &candidates)?;
    println!("Registered {} new documents ({} candidates)", registered, candidates.len());
    Ok(())
}

async fn run_process(
    conn: &rusqlite::Connection,
    limit: Option<usize>,
    follow_links: bool,
    no_llm: bool,
) -> Result<()> {
    let docs = db::fetch_pending(conn, limit)?;
    if docs.is_empty() {
        println!("No pending documents. Run 'ingest' first.");
        return Ok(());
    }
    println!("Processing {} documents...", docs.len());
    let counts = process_documents(conn, docs, follow_links, !no_llm).await?;
    counts.print();
    Ok(())
}

struct ProcessCounts {
    processed: usize,
    skipped: usize,
    with_specs: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Extracted {} tenders ({} with specifications, {} skipped).",
            self.processed, self.with_specs, self.skipped,
        );
    }
}

async fn process_documents(
    conn: &rusqlite::Connection,
    docs: Vec<db::PendingDocument>,
    follow_links: bool,
    use_llm: bool,
) -> Result<ProcessCounts> {
    let llm_client = llm::LlmClient::from_env();
    let mut resolver = TenderIdResolver::new(
        config::TENDER_ID_PREFIX,
        config::tender_year(),
        FileCounter::open(config::counter_path()),
    );

    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")?
            .progress_chars("=> "),
    );

    let mut counts = ProcessCounts { processed: 0, skipped: 0, with_specs: 0 };

    for chunk in docs.chunks(100) {
        // Phase A: pure rule extraction, parallel across documents.
        let extracts: Vec<Option<extract::DocumentExtract>> = chunk
            .par_iter()
            .map(|doc| match source::extract_text(Path::new(&doc.path)) {
                Ok(text) if !text.trim().is_empty() => Some(extract::extract_document(&text)),
                Ok(_) => {
                    warn!("no extractable text in {}", doc.path);
                    None
                }
                Err(e) => {
                    warn!("could not read {}: {}", doc.path, e);
                    None
                }
            })
            .collect();

        // Phase B: enrichment, identity, persistence. Sequential, so the
        // generated-ID counter stays serialized.
        for (doc, ex) in chunk.iter().zip(extracts) {
            let outcome =
                finish_document(conn, doc, ex, follow_links, use_llm, &llm_client, &mut resolver)
                    .await;
            match outcome {
                Ok(Some(true)) => {
                    counts.processed += 1;
                    counts.with_specs += 1;
                }
                Ok(Some(false)) => counts.processed += 1,
                Ok(None) => counts.skipped += 1,
                Err(e) => {
                    // One bad document never aborts the batch.
                    error!("failed to process {}: {}", doc.path, e);
                    counts.skipped += 1;
                }
            }
            pb.inc(1);
        }
    }

    pb.finish_and_clear();
    Ok(counts)
}

async fn finish_document(
    conn: &rusqlite::Connection,
    doc: &db::PendingDocument,
    ex: Option<extract::DocumentExtract>,
    follow_links: bool,
    use_llm: bool,
    llm_client: &llm::LlmClient,
    resolver: &mut TenderIdResolver<FileCounter>,
) -> Result<Option<bool>> {
    let Some(ex) = ex else {
        db::mark_processed(conn, doc.id)?;
        return Ok(None);
    };

    // Raw text kept next to the outputs for audit.
    let stem = Path::new(&doc.filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let raw_path = Path::new(config::RAW_TEXT_DIR).join(format!("{}_raw.txt", stem));
    if let Err(e) = std::fs::create_dir_all(config::RAW_TEXT_DIR)
        .and_then(|_| std::fs::write(&raw_path, &ex.cleaned_text))
    {
        warn!("could not save raw text {}: {}", raw_path.display(), e);
    }

    let mut records = ex.records.clone();
    let mut linked_sources = 0usize;
    if follow_links {
        let linked =
            links::resolve_linked_texts(&ex.cleaned_text, Path::new(config::LINKED_DIR)).await;
        linked_sources = linked.len();
        if !linked.is_empty() {
            records = extract::merge_linked(records, &linked);
        }
    }

    // Records win; otherwise the fallback lines, run through the LLM
    // formatter when one is configured.
    let (raw_specs, formatted) = if !records.is_empty() {
        let raw: Vec<String> = records.iter().map(|r| r.rendered()).collect();
        let formatted = extract::specs::format_records(&records);
        (raw, formatted)
    } else if !ex.fallback.is_empty() {
        let formatted = match llm_client.format_specs(&ex.fallback).await {
            Ok(Some(f)) => f,
            Ok(None) => extract::specs::format_fallback(&ex.fallback),
            Err(e) => {
                warn!("llm spec formatting unavailable: {}", e);
                extract::specs::format_fallback(&ex.fallback)
            }
        };
        (ex.fallback.clone(), formatted)
    } else {
        (Vec::new(), String::new())
    };

    let llm_info = if use_llm && llm_client.enabled() {
        match llm_client.extract_structured_info(&ex.cleaned_text).await {
            Ok(i) => i,
            Err(e) => {
                warn!("llm extraction unavailable for {}: {}", doc.filename, e);
                None
            }
        }
    } else {
        None
    };

    let tender_id = resolver.resolve(Some(&doc.filename), &ex.cleaned_text)?;
    let record = extract::build_record(
        tender_id,
        &doc.path,
        &ex,
        raw_specs,
        formatted,
        llm_info,
        linked_sources,
    );

    let output = extract::write_json(&record, Path::new(config::OUTPUT_DIR))?;
    db::save_tender(conn, &record, &output.to_string_lossy())?;
    db::mark_processed(conn, doc.id)?;
    info!("processed {} -> {}", doc.filename, record.tender_id);

    Ok(Some(record.spec_count > 0))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

use anyhow::Result;
use rusqlite::Connection;

use crate::extract::TenderRecord;

const DB_PATH: &str = "data/tenders.sqlite";

pub fn connect() -> Result<Connection> {
    if let Some(parent) = std::path::Path::new(DB_PATH).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id            INTEGER PRIMARY KEY,
            path          TEXT UNIQUE NOT NULL,
            filename      TEXT NOT NULL,
            origin        TEXT NOT NULL CHECK(origin IN ('mail','folder','linked')),
            processed     BOOLEAN NOT NULL DEFAULT 0,
            registered_at TEXT NOT NULL DEFAULT (datetime('now')),
            processed_at  TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_documents_processed ON documents(processed);

        CREATE TABLE IF NOT EXISTS tenders (
            tender_id     TEXT PRIMARY KEY,
            source_file   TEXT NOT NULL,
            project_name  TEXT,
            ministry      TEXT,
            delivery      TEXT,
            deadline      TEXT,
            warranty      TEXT,
            voltage       TEXT,
            quantities    TEXT,
            standards     TEXT,
            spec_count    INTEGER NOT NULL DEFAULT 0,
            technical_specifications TEXT,
            output_file   TEXT,
            processed_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_tenders_ministry ON tenders(ministry);
        ",
    )?;
    Ok(())
}

// ── Document ledger ──

pub struct PendingDocument {
    pub id: i64,
    pub path: String,
    pub filename: String,
}

pub fn register_documents(conn: &Connection, docs: &[(String, &str)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO documents (path, filename, origin) VALUES (?1, ?2, ?3)",
        )?;
        for (path, origin) in docs {
            let filename = std::path::Path::new(path)
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| path.clone());
            count += stmt.execute(rusqlite::params![path, filename, origin])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_pending(conn: &Connection, limit: Option<usize>) -> Result<Vec<PendingDocument>> {
    let sql = format!(
        "SELECT id, path, filename FROM documents WHERE processed = 0 ORDER BY id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PendingDocument {
                id: row.get(0)?,
                path: row.get(1)?,
                filename: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn mark_processed(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE documents SET processed = 1, processed_at = datetime('now') WHERE id = ?1",
        rusqlite::params![id],
    )?;
    Ok(())
}

// ── Extracted tenders ──

pub fn save_tender(conn: &Connection, record: &TenderRecord, output_file: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO tenders
         (tender_id, source_file, project_name, ministry, delivery, deadline, warranty,
          voltage, quantities, standards, spec_count, technical_specifications,
          output_file, processed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        rusqlite::params![
            record.tender_id,
            record.source_file,
            record.project_name,
            record.ministry,
            record.delivery,
            record.deadline,
            record.warranty,
            record.voltage,
            record.quantities.join("; "),
            record.standards.join("; "),
            record.spec_count,
            record.technical_specifications,
            output_file,
            record.processed_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub struct OverviewRow {
    pub tender_id: String,
    pub project_name: String,
    pub ministry: String,
    pub delivery: String,
    pub deadline: String,
    pub spec_count: i64,
}

pub fn fetch_overview(
    conn: &Connection,
    ministry: Option<&str>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let (where_clause, params): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match ministry {
        Some(m) => (
            " WHERE ministry LIKE ?1".to_string(),
            vec![Box::new(format!("%{}%", m)) as Box<dyn rusqlite::types::ToSql>],
        ),
        None => (String::new(), Vec::new()),
    };

    let sql = format!(
        "SELECT tender_id, COALESCE(project_name,''), COALESCE(ministry,''),
                COALESCE(delivery,''), COALESCE(deadline,''), spec_count
         FROM tenders{}
         ORDER BY processed_at DESC
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(OverviewRow {
                tender_id: row.get(0)?,
                project_name: row.get(1)?,
                ministry: row.get(2)?,
                delivery: row.get(3)?,
                deadline: row.get(4)?,
                spec_count: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub pending: usize,
    pub processed: usize,
    pub tenders: usize,
    pub with_specs: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
    let processed: usize = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE processed = 1",
        [],
        |r| r.get(0),
    )?;
    let tenders: usize = conn.query_row("SELECT COUNT(*) FROM tenders", [], |r| r.get(0))?;
    let with_specs: usize = conn.query_row(
        "SELECT COUNT(*) FROM tenders WHERE spec_count > 0",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        total,
        pending: total - processed,
        processed,
        tenders,
        with_specs,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn memory_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn sample_record(id: &str) -> TenderRecord {
        TenderRecord {
            tender_id: id.to_string(),
            source_file: "data/inbox/doc.txt".to_string(),
            linked_sources: 0,
            project_name: Some("Rural Electrification".to_string()),
            ministry: Some("Ministry of Power".to_string()),
            delivery: Some("Delivery: within 90 days".to_string()),
            deadline: None,
            warranty: None,
            quantities: vec!["5000 meters".to_string()],
            voltage: None,
            standards: vec!["IS 7098".to_string()],
            item_descriptions: Vec::new(),
            raw_specs: vec!["Material of conductor: Aluminium".to_string()],
            technical_specifications: Some("Material of conductor: Aluminium".to_string()),
            spec_count: 1,
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn ledger_roundtrip() {
        let conn = memory_conn();
        let docs = vec![
            ("data/inbox/a.txt".to_string(), "folder"),
            ("data/inbox/b.txt".to_string(), "mail"),
            ("data/inbox/a.txt".to_string(), "folder"), // duplicate path ignored
        ];
        assert_eq!(register_documents(&conn, &docs).unwrap(), 2);

        let pending = fetch_pending(&conn, None).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].filename, "a.txt");

        mark_processed(&conn, pending[0].id).unwrap();
        assert_eq!(fetch_pending(&conn, None).unwrap().len(), 1);

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.pending, 1);
    }

    #[test]
    fn tender_upsert_last_write_wins() {
        let conn = memory_conn();
        save_tender(&conn, &sample_record("TDR-2025-0001"), "out/a.json").unwrap();
        save_tender(&conn, &sample_record("TDR-2025-0001"), "out/b.json").unwrap();

        let rows = fetch_overview(&conn, None, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tender_id, "TDR-2025-0001");

        let filtered = fetch_overview(&conn, Some("Power"), 10).unwrap();
        assert_eq!(filtered.len(), 1);
        assert!(fetch_overview(&conn, Some("Railways"), 10).unwrap().is_empty());
    }
}

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, params};
use tracing::{info, warn};

use crate::cli::{StatusArgs, resolve_db_path};
use crate::model::StatusResponse;
use crate::store::{missing_tables, table_exists};
use crate::util::now_utc_string;

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.cache_root, args.db_path.as_ref());
    info!(db_path = %db_path.display(), "status requested");

    let response = collect(&db_path, args.embedding_dim)?;
    if args.json {
        let mut output = io::BufWriter::new(io::stdout().lock());
        serde_json::to_writer_pretty(&mut output, &response)
            .context("failed to serialize status json output")?;
        writeln!(output)?;
        output.flush()?;
    }
    Ok(())
}

fn collect(db_path: &Path, embedding_dim: usize) -> Result<StatusResponse> {
    let mut response = StatusResponse {
        generated_at: now_utc_string(),
        db_path: db_path.display().to_string(),
        db_exists: db_path.exists(),
        missing_tables: Vec::new(),
        issues: 0,
        pages: 0,
        pages_with_embedding: 0,
        embedding_dim,
        embedding_dim_mismatches: 0,
    };

    if !response.db_exists {
        warn!(path = %db_path.display(), "database file missing");
        return Ok(response);
    }

    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    response.missing_tables = missing_tables(&conn)
        .context("failed to inspect schema")?
        .into_iter()
        .map(str::to_string)
        .collect();
    if !response.missing_tables.is_empty() {
        warn!(
            missing = %response.missing_tables.join(","),
            "database is missing required tables"
        );
    }

    if table_exists(&conn, "issue")? {
        response.issues = query_count(&conn, "SELECT COUNT(*) FROM issue", params![])?;
    }
    if table_exists(&conn, "page")? {
        response.pages = query_count(&conn, "SELECT COUNT(*) FROM page", params![])?;
        response.pages_with_embedding = query_count(
            &conn,
            "SELECT COUNT(*) FROM page WHERE embedding IS NOT NULL",
            params![],
        )?;
        response.embedding_dim_mismatches = query_count(
            &conn,
            "
            SELECT COUNT(*)
            FROM page
            WHERE embedding IS NOT NULL
              AND (COALESCE(embedding_dim, ?1) != ?1 OR length(embedding) != ?1 * 4)
            ",
            params![embedding_dim as i64],
        )?;
    }

    info!(
        path = %db_path.display(),
        issues = response.issues,
        pages = response.pages,
        pages_with_embedding = response.pages_with_embedding,
        embedding_dim,
        embedding_dim_mismatches = response.embedding_dim_mismatches,
        "database status"
    );
    if response.embedding_dim_mismatches > 0 {
        warn!(
            mismatches = response.embedding_dim_mismatches,
            embedding_dim, "stored embeddings with another dimension are ignored by queries"
        );
    }

    Ok(response)
}

fn query_count<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<i64> {
    let count = conn
        .query_row(sql, params, |row| row.get(0))
        .with_context(|| format!("count query failed: {}", sql.trim()))?;
    Ok(count)
}

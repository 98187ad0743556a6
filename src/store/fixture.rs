use std::path::PathBuf;

use rusqlite::{Connection, params};
use tempfile::TempDir;

use crate::semantic::{embed_text_local, encode_embedding_blob};

pub(crate) const FIXTURE_DIM: usize = 32;

pub(crate) fn create_schema(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS issue (
          id TEXT PRIMARY KEY,
          filename TEXT,
          created_at TEXT,
          num_pages INTEGER,
          issue_url TEXT,
          description TEXT,
          pdf_download TEXT,
          internet_archive TEXT,
          collection TEXT,
          pub_date TEXT
        );

        CREATE TABLE IF NOT EXISTS page (
          id TEXT PRIMARY KEY,
          parent_issue_id TEXT,
          page_number TEXT NOT NULL,
          ocr_result TEXT,
          embedding BLOB,
          embedding_dim INTEGER,
          created_at TEXT,
          image_url TEXT
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS page_fts
        USING fts5(ocr_result, content='page', content_rowid='rowid', tokenize='porter unicode61');
        ",
    )
}

pub(crate) fn insert_issue(
    connection: &Connection,
    id: &str,
    collection: &str,
) -> rusqlite::Result<()> {
    connection.execute(
        "
        INSERT INTO issue(id, filename, created_at, num_pages, issue_url, description, collection, pub_date)
        VALUES(?1, ?2, '2024-01-01T00:00:00Z', 48, ?3, ?4, ?5, '1971-03')
        ",
        params![
            id,
            format!("{id}.pdf"),
            format!("https://archive.example/{id}"),
            format!("Issue {id}"),
            collection,
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_page(
    connection: &Connection,
    id: &str,
    issue_id: Option<&str>,
    page_number: &str,
    ocr_result: &str,
    embedding: Option<&[f32]>,
) -> rusqlite::Result<()> {
    connection.execute(
        "
        INSERT INTO page(id, parent_issue_id, page_number, ocr_result, embedding, embedding_dim, created_at, image_url)
        VALUES(?1, ?2, ?3, ?4, ?5, ?6, '2024-01-02T00:00:00Z', ?7)
        ",
        params![
            id,
            issue_id,
            page_number,
            ocr_result,
            embedding.map(encode_embedding_blob),
            embedding.map(|values| values.len() as i64),
            format!("https://images.example/{id}.png"),
        ],
    )?;
    Ok(())
}

pub(crate) fn rebuild_fts(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute("INSERT INTO page_fts(page_fts) VALUES('rebuild')", [])?;
    Ok(())
}

pub(crate) const SAMPLE_PAGES: &[(&str, &str)] = &[
    ("p1", "Ayn Rand discusses objectivist philosophy and the virtue of selfishness"),
    ("p2", "Letters to the editor about the fountainhead and atlas shrugged"),
    ("p3", "Garden tomatoes thrive in the long summer rain"),
    ("p4", "An interview with Ayn Rand on capitalism"),
    ("p5", "Book reviews: science fiction and philosophy of mind"),
];

/// On-disk database with [`SAMPLE_PAGES`] embedded at [`FIXTURE_DIM`]
/// dimensions. Keep the `TempDir` alive for as long as the path is used.
pub(crate) fn sample_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("fixture.sqlite");
    let connection = Connection::open(&db_path).expect("open fixture db");
    create_schema(&connection).expect("create schema");
    insert_issue(&connection, "issue-1", "libertarian-periodicals").expect("insert issue");

    for (index, (id, text)) in SAMPLE_PAGES.iter().enumerate() {
        let embedding = embed_text_local(text, FIXTURE_DIM);
        insert_page(
            &connection,
            id,
            Some("issue-1"),
            &(index + 1).to_string(),
            text,
            Some(&embedding),
        )
        .expect("insert page");
    }
    rebuild_fts(&connection).expect("rebuild fts");

    (dir, db_path)
}

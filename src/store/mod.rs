//! SQLite-backed collaborators for the hybrid ranker: an FTS5 text index,
//! an embedding-scan vector index and the page document store.
//!
//! All three open their own read-only connection per call, so the two
//! concurrent retrieval branches never share a connection.

mod pages;
mod schema;
mod text;
mod vector;

#[cfg(test)]
pub(crate) mod fixture;

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::ranking::RetrievalError;

pub use pages::SqlitePageStore;
pub use schema::{REQUIRED_TABLES, missing_tables, table_exists};
pub use text::{SqliteTextIndex, WebSearchQuery};
pub use vector::SqliteVectorIndex;

pub const DEFAULT_DB_FILENAME: &str = "pagesearch_index.sqlite";

pub(crate) fn open_read_only(db_path: &Path) -> Result<Connection, RetrievalError> {
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|err| {
        RetrievalError::Unavailable(format!(
            "failed to open database read-only: {}: {err}",
            db_path.display()
        ))
    })
}

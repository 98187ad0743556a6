use rusqlite::{Connection, OptionalExtension, params};

/// Tables the adapters read from. They are created by the ingestion
/// tooling, never by this crate.
pub const REQUIRED_TABLES: &[&str] = &["issue", "page", "page_fts"];

pub fn table_exists(connection: &Connection, table: &str) -> rusqlite::Result<bool> {
    let found = connection
        .query_row(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
            LIMIT 1
            ",
            params![table],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn missing_tables(connection: &Connection) -> rusqlite::Result<Vec<&'static str>> {
    let mut missing = Vec::new();
    for table in REQUIRED_TABLES {
        if !table_exists(connection, table)? {
            missing.push(*table);
        }
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixture;

    #[test]
    fn fixture_schema_has_every_required_table() {
        let connection = Connection::open_in_memory().expect("in-memory db");
        fixture::create_schema(&connection).expect("create schema");

        assert!(missing_tables(&connection).expect("query sqlite_master").is_empty());
    }

    #[test]
    fn missing_tables_lists_absent_tables_in_order() {
        let connection = Connection::open_in_memory().expect("in-memory db");
        connection
            .execute("CREATE TABLE page (id TEXT PRIMARY KEY)", [])
            .expect("create page");

        let missing = missing_tables(&connection).expect("query sqlite_master");
        assert_eq!(missing, vec!["issue", "page_fts"]);
    }
}

use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::{OptionalExtension, Row, params};
use tracing::debug;

use crate::model::{IssueSummary, PageRecord};
use crate::ranking::{DocumentId, DocumentStore, RetrievalError};

use super::open_read_only;

/// Page records keyed by `page.id`, with their issue metadata attached.
pub struct SqlitePageStore {
    db_path: PathBuf,
}

impl SqlitePageStore {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }
}

impl DocumentStore for SqlitePageStore {
    type Record = PageRecord;

    fn fetch_many(
        &self,
        ids: &[DocumentId],
    ) -> Result<HashMap<DocumentId, PageRecord>, RetrievalError> {
        let mut records = HashMap::with_capacity(ids.len());
        if ids.is_empty() {
            return Ok(records);
        }

        let connection = open_read_only(&self.db_path)?;
        let mut statement = connection.prepare(
            "
            SELECT
              p.id,
              p.parent_issue_id,
              p.page_number,
              p.ocr_result,
              p.image_url,
              p.created_at,
              i.id,
              i.filename,
              i.description,
              i.issue_url,
              i.collection,
              i.pub_date
            FROM page p
            LEFT JOIN issue i ON i.id = p.parent_issue_id
            WHERE p.id = ?1
            ",
        )?;

        for id in ids {
            if records.contains_key(id) {
                continue;
            }
            let record = statement
                .query_row(params![id.as_str()], page_from_row)
                .optional()?;
            match record {
                Some(record) => {
                    records.insert(id.clone(), record);
                }
                None => debug!(document_id = %id, "page not found"),
            }
        }

        Ok(records)
    }
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    let issue = match row.get::<_, Option<String>>(6)? {
        Some(issue_id) => Some(IssueSummary {
            id: issue_id,
            filename: row.get(7)?,
            description: row.get(8)?,
            issue_url: row.get(9)?,
            collection: row.get(10)?,
            pub_date: row.get(11)?,
        }),
        None => None,
    };

    Ok(PageRecord {
        id: row.get(0)?,
        parent_issue_id: row.get(1)?,
        page_number: row.get(2)?,
        ocr_result: row.get(3)?,
        image_url: row.get(4)?,
        created_at: row.get(5)?,
        issue,
    })
}

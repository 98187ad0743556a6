use std::path::PathBuf;

use tracing::debug;

use crate::ranking::{CandidateList, DocumentId, RetrievalError, SourceKind, VectorIndex};
use crate::semantic::{decode_embedding_blob, inner_product};

use super::open_read_only;

/// Exact nearest-neighbour scan over `page.embedding`, scored by inner
/// product. Rows stored at another dimension are skipped.
pub struct SqliteVectorIndex {
    db_path: PathBuf,
    dimensions: usize,
}

impl SqliteVectorIndex {
    pub fn new(db_path: PathBuf, dimensions: usize) -> Self {
        Self {
            db_path,
            dimensions,
        }
    }
}

impl VectorIndex for SqliteVectorIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn search(&self, embedding: &[f32], limit: usize) -> Result<CandidateList, RetrievalError> {
        if embedding.len() != self.dimensions {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }

        let connection = open_read_only(&self.db_path)?;
        let mut statement = connection.prepare(
            "
            SELECT id, embedding, embedding_dim
            FROM page
            WHERE embedding IS NOT NULL
            ORDER BY rowid ASC
            ",
        )?;

        let mut rows = statement.query([])?;
        let mut scored = Vec::<(DocumentId, f64)>::new();
        let mut skipped = 0_usize;
        while let Some(row) = rows.next()? {
            let id = row.get::<_, String>(0)?;
            let blob = row.get::<_, Vec<u8>>(1)?;
            let stored_dim = row.get::<_, Option<i64>>(2)?;

            if stored_dim.is_some_and(|dim| dim != self.dimensions as i64) {
                skipped += 1;
                continue;
            }
            let Some(values) = decode_embedding_blob(&blob, self.dimensions) else {
                skipped += 1;
                continue;
            };

            scored.push((DocumentId::new(id), inner_product(embedding, &values)));
        }

        // Stable: equal similarities keep rowid order.
        scored.sort_by(|left, right| right.1.total_cmp(&left.1));

        debug!(
            scanned = scored.len(),
            skipped_dimension_mismatch = skipped,
            "vector index scan"
        );
        Ok(CandidateList::from_ranked_ids(
            SourceKind::Vector,
            scored.into_iter().map(|(id, _)| id),
            limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;
    use crate::semantic::embed_text_local;
    use crate::store::fixture::{self, FIXTURE_DIM, SAMPLE_PAGES};

    #[test]
    fn identical_text_is_the_nearest_neighbour() {
        let (_dir, db_path) = fixture::sample_db();
        let index = SqliteVectorIndex::new(db_path, FIXTURE_DIM);

        let (id, text) = SAMPLE_PAGES[2];
        let query = embed_text_local(text, FIXTURE_DIM);
        let list = index.search(&query, 10).expect("search");

        assert_eq!(list.source(), SourceKind::Vector);
        assert_eq!(list.len(), SAMPLE_PAGES.len());
        assert_eq!(list.candidates()[0].document_id.as_str(), id);
        assert_eq!(list.candidates()[0].rank, 1);
    }

    #[test]
    fn search_respects_limit() {
        let (_dir, db_path) = fixture::sample_db();
        let index = SqliteVectorIndex::new(db_path, FIXTURE_DIM);

        let query = embed_text_local("philosophy", FIXTURE_DIM);
        assert_eq!(index.search(&query, 2).expect("search").len(), 2);
    }

    #[test]
    fn query_dimension_mismatch_is_an_error() {
        let (_dir, db_path) = fixture::sample_db();
        let index = SqliteVectorIndex::new(db_path, FIXTURE_DIM);

        let err = index.search(&[0.1, 0.2], 10).expect_err("wrong dimension");
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch {
                expected: FIXTURE_DIM,
                actual: 2
            }
        ));
    }

    #[test]
    fn rows_with_other_dimensions_are_skipped() {
        let (_dir, db_path) = fixture::sample_db();
        {
            let connection = Connection::open(&db_path).expect("open fixture");
            let short = embed_text_local("odd one out", 16);
            fixture::insert_page(&connection, "p6", None, "1", "odd one out", Some(&short))
                .expect("insert page");
            fixture::insert_page(&connection, "p7", None, "2", "no embedding yet", None)
                .expect("insert page");
        }
        let index = SqliteVectorIndex::new(db_path, FIXTURE_DIM);

        let query = embed_text_local("odd one out", FIXTURE_DIM);
        let list = index.search(&query, 10).expect("search");

        assert_eq!(list.len(), SAMPLE_PAGES.len());
        assert!(list.rank_of(&DocumentId::from("p6")).is_none());
        assert!(list.rank_of(&DocumentId::from("p7")).is_none());
    }
}

use std::path::PathBuf;

use regex::Regex;
use rusqlite::params;
use tracing::debug;

use crate::ranking::{CandidateList, DocumentId, RetrievalError, SourceKind, TextIndex};

use super::open_read_only;

#[derive(Debug, Clone, PartialEq, Eq)]
enum QueryItem {
    Term { fts: String, negated: bool },
    Or,
}

/// Search-engine style query syntax translated to an FTS5 MATCH expression:
/// bare words are ANDed, `"quoted text"` is a phrase, `or` between terms is
/// a disjunction and a leading `-` excludes a term.
#[derive(Debug, Clone)]
pub struct WebSearchQuery {
    token_pattern: Regex,
}

impl WebSearchQuery {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token_pattern: Regex::new(r#"(-?)"([^"]*)"?|(\S+)"#)?,
        })
    }

    /// `None` when nothing searchable is left, including queries made only
    /// of exclusions (FTS5 has no standalone NOT).
    pub fn to_fts5(&self, query_text: &str) -> Option<String> {
        let items = self.parse(query_text);

        let mut positives = Vec::<String>::new();
        let mut negatives = Vec::<String>::new();
        let mut pending_or = false;

        for item in items {
            match item {
                QueryItem::Or => pending_or = !positives.is_empty(),
                QueryItem::Term { fts, negated: true } => {
                    negatives.push(fts);
                    pending_or = false;
                }
                QueryItem::Term {
                    fts,
                    negated: false,
                } => {
                    if pending_or {
                        positives.push("OR".to_string());
                    }
                    positives.push(fts);
                    pending_or = false;
                }
            }
        }

        if positives.is_empty() {
            return None;
        }

        let positive = positives.join(" ");
        if negatives.is_empty() {
            return Some(positive);
        }
        Some(format!("({positive}) NOT ({})", negatives.join(" OR ")))
    }

    fn parse(&self, query_text: &str) -> Vec<QueryItem> {
        let mut items = Vec::new();

        for captures in self.token_pattern.captures_iter(query_text) {
            if let Some(phrase) = captures.get(2) {
                let negated = captures.get(1).is_some_and(|value| !value.as_str().is_empty());
                if let Some(fts) = fts_string(phrase.as_str()) {
                    items.push(QueryItem::Term { fts, negated });
                }
                continue;
            }

            let Some(bare) = captures.get(3) else {
                continue;
            };
            let raw = bare.as_str();
            if raw.eq_ignore_ascii_case("or") {
                items.push(QueryItem::Or);
                continue;
            }

            let (negated, word) = match raw.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            if let Some(fts) = fts_string(word) {
                items.push(QueryItem::Term { fts, negated });
            }
        }

        items
    }
}

/// Quotes text as an FTS5 string; `None` if it has nothing to match on.
fn fts_string(raw: &str) -> Option<String> {
    let words = raw
        .split_whitespace()
        .map(|word| word.replace('"', ""))
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .collect::<Vec<String>>();
    if words.is_empty() {
        return None;
    }
    Some(format!("\"{}\"", words.join(" ")))
}

/// Lexical channel over the `page_fts` FTS5 table, ranked by `bm25()`.
pub struct SqliteTextIndex {
    db_path: PathBuf,
    query: WebSearchQuery,
}

impl SqliteTextIndex {
    pub fn new(db_path: PathBuf) -> Result<Self, regex::Error> {
        Ok(Self {
            db_path,
            query: WebSearchQuery::new()?,
        })
    }
}

impl TextIndex for SqliteTextIndex {
    fn search(&self, query_text: &str, limit: usize) -> Result<CandidateList, RetrievalError> {
        let Some(fts_query) = self.query.to_fts5(query_text) else {
            debug!(query = %query_text, "text query has no searchable terms");
            return Ok(CandidateList::empty(SourceKind::Text));
        };

        let connection = open_read_only(&self.db_path)?;
        let mut statement = connection.prepare(
            "
            SELECT p.id
            FROM page_fts
            JOIN page p ON p.rowid = page_fts.rowid
            WHERE page_fts MATCH ?1
            ORDER BY bm25(page_fts) ASC, p.rowid ASC
            LIMIT ?2
            ",
        )?;

        let mut rows = statement.query(params![fts_query, limit as i64])?;
        let mut ids = Vec::<DocumentId>::new();
        while let Some(row) = rows.next()? {
            ids.push(DocumentId::new(row.get::<_, String>(0)?));
        }

        debug!(fts_query = %fts_query, matches = ids.len(), "text index search");
        Ok(CandidateList::from_ranked_ids(SourceKind::Text, ids, limit))
    }
}

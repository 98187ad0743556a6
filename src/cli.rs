use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::ranking::{
    DEFAULT_FULL_TEXT_WEIGHT, DEFAULT_MATCH_COUNT, DEFAULT_PER_SOURCE_LIMIT, DEFAULT_RRF_K,
    DEFAULT_SEMANTIC_WEIGHT,
};
use crate::semantic::DEFAULT_EMBEDDING_DIM;
use crate::store::DEFAULT_DB_FILENAME;

#[derive(Parser, Debug)]
#[command(
    name = "pagesearch",
    version,
    about = "Hybrid full-text and semantic search over OCR'd archive pages"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Query(QueryArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/pagesearch")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIM)]
    pub embedding_dim: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(long, default_value = ".cache/pagesearch")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub query: String,

    #[arg(long, default_value_t = DEFAULT_MATCH_COUNT)]
    pub match_count: usize,

    #[arg(long, default_value_t = DEFAULT_PER_SOURCE_LIMIT)]
    pub per_source_limit: usize,

    #[arg(long, default_value_t = DEFAULT_FULL_TEXT_WEIGHT)]
    pub full_text_weight: f64,

    #[arg(long, default_value_t = DEFAULT_SEMANTIC_WEIGHT)]
    pub semantic_weight: f64,

    #[arg(long, default_value_t = DEFAULT_RRF_K)]
    pub rrf_k: f64,

    /// Per-source deadline; 0 waits indefinitely.
    #[arg(long, default_value_t = 2000)]
    pub timeout_ms: u64,

    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIM)]
    pub embedding_dim: usize,

    /// JSON array holding a precomputed query embedding.
    #[arg(long, conflicts_with = "no_embed")]
    pub embedding_file: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_embed: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn resolve_db_path(cache_root: &Path, db_path: Option<&PathBuf>) -> PathBuf {
    db_path
        .cloned()
        .unwrap_or_else(|| cache_root.join(DEFAULT_DB_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_defaults_match_fusion_defaults() {
        let cli = Cli::try_parse_from(["pagesearch", "query", "--query", "ayn rand"])
            .expect("parse query");
        let Commands::Query(args) = cli.command else {
            panic!("expected query command");
        };

        assert_eq!(args.match_count, 10);
        assert_eq!(args.per_source_limit, 20);
        assert_eq!(args.full_text_weight, 1.0);
        assert_eq!(args.semantic_weight, 1.0);
        assert_eq!(args.rrf_k, 50.0);
        assert_eq!(args.timeout_ms, 2000);
        assert_eq!(args.embedding_dim, 384);
        assert!(!args.no_embed);
        assert_eq!(
            resolve_db_path(&args.cache_root, args.db_path.as_ref()),
            PathBuf::from(".cache/pagesearch/pagesearch_index.sqlite")
        );
    }

    #[test]
    fn embedding_file_conflicts_with_no_embed() {
        let parsed = Cli::try_parse_from([
            "pagesearch",
            "query",
            "--query",
            "x",
            "--no-embed",
            "--embedding-file",
            "q.json",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn explicit_db_path_wins() {
        let cli = Cli::try_parse_from(["pagesearch", "status", "--db-path", "/tmp/pages.sqlite"])
            .expect("parse status");
        let Commands::Status(args) = cli.command else {
            panic!("expected status command");
        };

        assert_eq!(
            resolve_db_path(&args.cache_root, args.db_path.as_ref()),
            PathBuf::from("/tmp/pages.sqlite")
        );
    }
}

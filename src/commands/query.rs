use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::{QueryArgs, resolve_db_path};
use crate::model::{FusionSettings, PageRecord, QueryHit, QueryResponse, RetrievalSummary};
use crate::ranking::{FusionConfig, HybridRanker, SearchReport, SourceOutcome};
use crate::semantic::LocalHashEmbedder;
use crate::store::{SqlitePageStore, SqliteTextIndex, SqliteVectorIndex};
use crate::util::{condense_whitespace, now_utc_string, read_json_file, truncate_chars};

const SNIPPET_CHARS: usize = 240;

enum QueryEmbedding {
    Precomputed(Vec<f32>),
    Local,
    Disabled,
}

impl QueryEmbedding {
    fn from_args(args: &QueryArgs) -> Result<Self> {
        if let Some(path) = &args.embedding_file {
            let values: Vec<f32> = read_json_file(path)
                .with_context(|| format!("failed to load query embedding {}", path.display()))?;
            if values.len() != args.embedding_dim {
                warn!(
                    path = %path.display(),
                    dimensions = values.len(),
                    expected = args.embedding_dim,
                    "query embedding dimension differs from index; semantic source will fail"
                );
            }
            return Ok(Self::Precomputed(values));
        }
        if args.no_embed {
            return Ok(Self::Disabled);
        }
        Ok(Self::Local)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Precomputed(_) => "file",
            Self::Local => "local-hash",
            Self::Disabled => "disabled",
        }
    }
}

pub fn run(args: QueryArgs) -> Result<()> {
    let json = args.json;
    let Some(response) = execute(&args)? else {
        warn!("query cancelled");
        return Ok(());
    };

    if json {
        write_json_response(&response)
    } else {
        write_text_response(&response)
    }
}

/// Runs one hybrid query. `None` means it was interrupted before finishing.
fn execute(args: &QueryArgs) -> Result<Option<QueryResponse>> {
    let db_path = resolve_db_path(&args.cache_root, args.db_path.as_ref());
    if !db_path.exists() {
        bail!("database not found: {}", db_path.display());
    }

    let config = FusionConfig {
        match_count: args.match_count,
        per_source_limit: args.per_source_limit,
        full_text_weight: args.full_text_weight,
        semantic_weight: args.semantic_weight,
        rrf_k: args.rrf_k,
    };
    let source_timeout = (args.timeout_ms > 0).then(|| Duration::from_millis(args.timeout_ms));
    let embedding = QueryEmbedding::from_args(args)?;

    let text_index = SqliteTextIndex::new(db_path.clone())
        .context("failed to compile web-search query pattern")?;
    let mut ranker = HybridRanker::new(
        Arc::new(text_index),
        Arc::new(SqliteVectorIndex::new(db_path.clone(), args.embedding_dim)),
        Arc::new(SqlitePageStore::new(db_path.clone())),
    )
    .with_source_timeout(source_timeout);
    if matches!(embedding, QueryEmbedding::Local) {
        ranker = ranker.with_embedder(Arc::new(LocalHashEmbedder::new(args.embedding_dim)));
    }

    info!(
        db_path = %db_path.display(),
        query = %args.query,
        embedding = embedding.label(),
        match_count = config.match_count,
        per_source_limit = config.per_source_limit,
        "running hybrid query"
    );

    let outcome = run_interruptible(async {
        match &embedding {
            QueryEmbedding::Precomputed(values) => {
                ranker
                    .hybrid_search_report(&args.query, values, &config)
                    .await
            }
            QueryEmbedding::Local => ranker.search_text(&args.query, &config).await,
            QueryEmbedding::Disabled => {
                ranker.hybrid_search_report(&args.query, &[], &config).await
            }
        }
    })?;

    let Some(report) = outcome else {
        return Ok(None);
    };
    let report = report.context("hybrid search failed")?;

    let settings = FusionSettings {
        match_count: config.match_count,
        per_source_limit: config.per_source_limit,
        full_text_weight: config.full_text_weight,
        semantic_weight: config.semantic_weight,
        rrf_k: config.rrf_k,
        timeout_ms: args.timeout_ms,
        embedding: embedding.label().to_string(),
    };
    Ok(Some(build_response(&args.query, settings, report)))
}

/// Drives `future` on a fresh runtime until it finishes or ctrl-c arrives.
/// Blocking work left behind by timed-out or cancelled sources is detached
/// rather than awaited on shutdown.
fn run_interruptible<F: Future>(future: F) -> Result<Option<F::Output>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let outcome = runtime.block_on(async {
        tokio::select! {
            output = future => Some(output),
            _ = tokio::signal::ctrl_c() => None,
        }
    });
    runtime.shutdown_background();

    Ok(outcome)
}

fn build_response(
    query_text: &str,
    settings: FusionSettings,
    report: SearchReport<PageRecord>,
) -> QueryResponse {
    let retrieval = RetrievalSummary {
        text: report.text,
        vector: report.vector,
        text_candidates: report.text_candidates,
        vector_candidates: report.vector_candidates,
        fused_candidates: report.fused_candidates,
        output_cap: report.output_cap,
        hydration_gaps: report.hydration_gaps,
        duration_ms: report.duration_ms,
    };

    let results = report
        .results
        .into_iter()
        .enumerate()
        .map(|(index, result)| QueryHit {
            rank: index + 1,
            page_id: result.document_id.to_string(),
            score: result.score,
            text_rank: result.text_rank,
            vector_rank: result.vector_rank,
            page: result.record,
        })
        .collect::<Vec<QueryHit>>();

    QueryResponse {
        generated_at: now_utc_string(),
        query: query_text.to_string(),
        settings,
        retrieval,
        returned: results.len(),
        results,
    }
}

fn write_json_response(response: &QueryResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, response)
        .context("failed to serialize query json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(response: &QueryResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    render_text(&mut output, response)?;
    output.flush()?;
    Ok(())
}

fn render_text<W: Write>(output: &mut W, response: &QueryResponse) -> io::Result<()> {
    let retrieval = &response.retrieval;
    let settings = &response.settings;

    writeln!(output, "Query: {}", response.query)?;
    writeln!(
        output,
        "Retrieval: text={} vector={} embedding={} duration_ms={:.3}",
        describe_outcome(&retrieval.text),
        describe_outcome(&retrieval.vector),
        settings.embedding,
        retrieval.duration_ms,
    )?;
    writeln!(
        output,
        "Fusion: rrf_k={} weights text={} semantic={} fused={} cap={} hydration_gaps={}",
        settings.rrf_k,
        settings.full_text_weight,
        settings.semantic_weight,
        retrieval.fused_candidates,
        retrieval.output_cap,
        retrieval.hydration_gaps,
    )?;
    writeln!(output, "Results: {}", response.returned)?;

    for hit in &response.results {
        let page = &hit.page;
        let issue = page
            .issue
            .as_ref()
            .map(|issue| match &issue.collection {
                Some(collection) => format!("{} ({collection})", issue.id),
                None => issue.id.clone(),
            })
            .unwrap_or_else(|| "(no issue)".to_string());

        writeln!(
            output,
            "{}.\t{}\t{}\tpage {}",
            hit.rank, hit.page_id, issue, page.page_number
        )?;
        writeln!(output, "\tscore={:.6}", hit.score)?;
        if let Some(text_rank) = hit.text_rank {
            writeln!(output, "\ttext_rank: {text_rank}")?;
        }
        if let Some(vector_rank) = hit.vector_rank {
            writeln!(output, "\tvector_rank: {vector_rank}")?;
        }
        if let Some(pub_date) = page.issue.as_ref().and_then(|issue| issue.pub_date.as_ref()) {
            writeln!(output, "\tpub_date: {pub_date}")?;
        }
        if let Some(image_url) = &page.image_url {
            writeln!(output, "\timage_url: {image_url}")?;
        }
        let snippet = page
            .ocr_result
            .as_deref()
            .map(|text| truncate_chars(&condense_whitespace(text), SNIPPET_CHARS))
            .unwrap_or_default();
        writeln!(output, "\tsnippet: {snippet}")?;
    }

    Ok(())
}

fn describe_outcome(outcome: &SourceOutcome) -> String {
    match outcome {
        SourceOutcome::Retrieved { candidates } => format!("retrieved({candidates})"),
        SourceOutcome::Skipped => "skipped".to_string(),
        SourceOutcome::Failed { reason } => format!("failed({reason})"),
        SourceOutcome::TimedOut { timeout_ms } => format!("timed_out({timeout_ms}ms)"),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::thread;
    use std::time::Instant;

    use super::*;
    use crate::ranking::{CandidateList, RetrievalError, SourceKind, TextIndex};
    use crate::semantic::embed_text_local;
    use crate::store::fixture::{self, FIXTURE_DIM};

    fn args(db_path: PathBuf, query: &str) -> QueryArgs {
        QueryArgs {
            cache_root: PathBuf::from(".cache/pagesearch"),
            db_path: Some(db_path),
            query: query.to_string(),
            match_count: 10,
            per_source_limit: 20,
            full_text_weight: 1.0,
            semantic_weight: 1.0,
            rrf_k: 50.0,
            timeout_ms: 2000,
            embedding_dim: FIXTURE_DIM,
            embedding_file: None,
            no_embed: false,
            json: false,
        }
    }

    fn page_ids(response: &QueryResponse) -> Vec<&str> {
        response
            .results
            .iter()
            .map(|hit| hit.page_id.as_str())
            .collect()
    }

    struct StuckTextIndex;

    impl TextIndex for StuckTextIndex {
        fn search(
            &self,
            _query_text: &str,
            _limit: usize,
        ) -> Result<CandidateList, RetrievalError> {
            thread::sleep(Duration::from_millis(1500));
            Ok(CandidateList::empty(SourceKind::Text))
        }
    }

    #[test]
    fn timed_out_source_does_not_hold_up_the_command() {
        let (_dir, db_path) = fixture::sample_db();
        let ranker = HybridRanker::new(
            Arc::new(StuckTextIndex),
            Arc::new(SqliteVectorIndex::new(db_path.clone(), FIXTURE_DIM)),
            Arc::new(SqlitePageStore::new(db_path)),
        )
        .with_source_timeout(Some(Duration::from_millis(50)));
        let embedding = embed_text_local(fixture::SAMPLE_PAGES[0].1, FIXTURE_DIM);

        let started = Instant::now();
        let report = run_interruptible(async {
            ranker
                .hybrid_search_report("ayn rand", &embedding, &FusionConfig::default())
                .await
        })
        .expect("runtime")
        .expect("not cancelled")
        .expect("vector source answers");
        let elapsed = started.elapsed();

        assert!(
            elapsed < Duration::from_millis(1000),
            "command held for {elapsed:?}"
        );
        assert_eq!(report.text, SourceOutcome::TimedOut { timeout_ms: 50 });
        assert_eq!(report.results[0].document_id.as_str(), "p1");
    }

    #[test]
    fn lexical_and_semantic_agreement_ranks_first() {
        let (_dir, db_path) = fixture::sample_db();
        let response = execute(&args(db_path, "interview with ayn rand"))
            .expect("query")
            .expect("not cancelled");

        assert_eq!(page_ids(&response)[0], "p4");
        let top = &response.results[0];
        assert_eq!(top.rank, 1);
        assert_eq!(top.text_rank, Some(1));
        assert!(top.vector_rank.is_some());
        assert_eq!(response.retrieval.hydration_gaps, 0);
        assert_eq!(response.settings.embedding, "local-hash");
    }

    #[test]
    fn no_embed_skips_the_vector_source() {
        let (_dir, db_path) = fixture::sample_db();
        let mut query_args = args(db_path, "philosophy");
        query_args.no_embed = true;

        let response = execute(&query_args).expect("query").expect("not cancelled");

        assert_eq!(response.retrieval.vector, SourceOutcome::Skipped);
        assert_eq!(response.returned, 2);
        assert!(response.results.iter().all(|hit| hit.vector_rank.is_none()));
    }

    #[test]
    fn precomputed_embedding_drives_the_vector_source() {
        let (dir, db_path) = fixture::sample_db();
        let embedding_path = dir.path().join("query.json");
        let embedding = embed_text_local(fixture::SAMPLE_PAGES[2].1, FIXTURE_DIM);
        fs::write(
            &embedding_path,
            serde_json::to_vec(&embedding).expect("serialize embedding"),
        )
        .expect("write embedding");

        let mut query_args = args(db_path, "");
        query_args.embedding_file = Some(embedding_path);
        query_args.match_count = 1;

        let response = execute(&query_args).expect("query").expect("not cancelled");

        assert_eq!(response.retrieval.text, SourceOutcome::Skipped);
        assert_eq!(page_ids(&response), vec!["p3"]);
        assert_eq!(response.settings.embedding, "file");
    }

    #[test]
    fn invalid_weights_fail_before_retrieval() {
        let (_dir, db_path) = fixture::sample_db();
        let mut query_args = args(db_path, "rand");
        query_args.rrf_k = 0.0;

        let err = execute(&query_args).expect_err("invalid rrf_k");
        assert!(format!("{err:#}").contains("rrf_k"));
    }

    #[test]
    fn missing_database_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = execute(&args(dir.path().join("absent.sqlite"), "rand")).expect_err("no db");
        assert!(err.to_string().contains("database not found"));
    }

    #[test]
    fn text_rendering_lists_rank_trace_and_snippet() {
        let (_dir, db_path) = fixture::sample_db();
        let response = execute(&args(db_path, "ayn rand"))
            .expect("query")
            .expect("not cancelled");

        let mut rendered = Vec::new();
        render_text(&mut rendered, &response).expect("render");
        let rendered = String::from_utf8(rendered).expect("utf8");

        assert!(rendered.starts_with("Query: ayn rand\n"));
        assert!(rendered.contains("text=retrieved(2)"));
        assert!(rendered.contains("issue-1 (libertarian-periodicals)"));
        assert!(rendered.contains("\ttext_rank: 1\n"));
        assert!(rendered.contains("\tsnippet: "));
    }
}

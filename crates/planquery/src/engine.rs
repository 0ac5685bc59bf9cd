//! Query-side orchestration for the `search` and `ask` commands.
//!
//! Wires the configured embedder, the SQLite index, and (for `ask`) the
//! generation provider into the core retrieval pipeline, and prints the
//! results. The pure ranking logic lives in `planquery_core::retrieve`;
//! this module owns config, connections, and output.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

use planquery_core::embedding::{embed_query, Embedder};
use planquery_core::error::IndexError;
use planquery_core::generate::{generate, CompletionProvider};
use planquery_core::models::{Query, ScoredChunk, StakeholderRole};
use planquery_core::retrieve::{rerank, retrieve, role_profile, RetrievalParams};
use planquery_core::store::{MetadataFilter, VectorIndex};

use crate::config::Config;
use crate::db;
use crate::embedder::create_embedder;
use crate::generation::create_generator;
use crate::sqlite_store::SqliteIndex;

/// Optional metadata narrowing flags shared by the search command.
#[derive(Debug, Default)]
pub struct SearchFilterArgs {
    pub category: Option<String>,
    pub land_type: Option<String>,
    pub scale: Option<String>,
    pub since: Option<String>,
    pub appeals_only: bool,
}

impl SearchFilterArgs {
    /// Build a [`MetadataFilter`], or `None` when no flag was given.
    fn to_filter(&self) -> Result<Option<MetadataFilter>> {
        let mut filter = MetadataFilter::default();
        if let Some(ref c) = self.category {
            filter.categories.push(
                planquery_core::classify::DevelopmentCategory::parse(c),
            );
        }
        if let Some(ref lt) = self.land_type {
            filter
                .land_types
                .push(planquery_core::classify::LandType::parse(lt));
        }
        if let Some(ref s) = self.scale {
            filter.scales.push(planquery_core::classify::Scale::parse(s));
        }
        if let Some(ref since) = self.since {
            let date = NaiveDate::parse_from_str(since, "%Y-%m-%d")
                .with_context(|| format!("Invalid --since date: {}", since))?;
            filter.since = Some(date);
        }
        filter.appeals_only = self.appeals_only;

        Ok(if filter.is_empty() { None } else { Some(filter) })
    }
}

fn retrieval_params(config: &Config, limit: Option<usize>) -> RetrievalParams {
    RetrievalParams {
        top_k: limit.unwrap_or(config.retrieval.top_k),
        oversample_factor: config.retrieval.oversample_factor,
        role_boost: config.retrieval.role_boost,
    }
}

async fn open_index(config: &Config, embedder: &dyn Embedder) -> Result<SqliteIndex> {
    let pool = db::connect(config).await?;
    match SqliteIndex::open(pool, embedder.model_name(), embedder.dims()).await {
        Ok(index) => Ok(index),
        Err(IndexError::Empty) => bail!("The index is empty. Run `plq build <feed.json>` first."),
        Err(e) => Err(e.into()),
    }
}

/// Retrieve ranked chunks, honoring an optional metadata filter.
///
/// The unfiltered path is the core [`retrieve`] pipeline; the filtered
/// path applies the same oversample-boost-rerank steps around a
/// filtered index search.
async fn search_chunks(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    query: &Query,
    params: &RetrievalParams,
    filter: Option<&MetadataFilter>,
) -> Result<Vec<ScoredChunk>> {
    let results = match filter {
        None => retrieve(index, embedder, query, params).await?,
        Some(f) => {
            let query_vec = embed_query(embedder, &query.text).await?;
            let oversample = params.top_k * params.oversample_factor.max(1);
            let candidates = index.search(&query_vec, oversample, Some(f)).await?;
            rerank(candidates, &role_profile(query.role), params)
        }
    };
    Ok(results)
}

/// Run the search command: print ranked chunks for a query.
pub async fn run_search(
    config: &Config,
    query_text: &str,
    role: StakeholderRole,
    limit: Option<usize>,
    filter_args: &SearchFilterArgs,
) -> Result<()> {
    if query_text.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let embedder = create_embedder(&config.embedding)?;
    let index = open_index(config, embedder.as_ref()).await?;
    let params = retrieval_params(config, limit);
    let filter = filter_args.to_filter()?;
    let query = Query::new(query_text, role);

    let results = match search_chunks(
        &index,
        embedder.as_ref(),
        &query,
        &params,
        filter.as_ref(),
    )
    .await
    {
        Ok(results) => results,
        Err(e) => {
            index.pool().close().await;
            return Err(e);
        }
    };
    index.pool().close().await;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!("Found {} results:\n", results.len());
    for (i, sc) in results.iter().enumerate() {
        let meta = &sc.chunk.metadata;
        println!(
            "{}. [{}] score {:.3} — {} / {} / {}",
            i + 1,
            sc.chunk.id,
            sc.score,
            meta.category,
            meta.land_type,
            meta.scale
        );
        println!("   {}", meta.location);
        println!("   Decision: {}", meta.decision);
        if let Some(date) = meta.submitted {
            println!("   Submitted: {}", date);
        }
        println!("   {}", snippet(&sc.chunk.text, 200));
        println!();
    }

    Ok(())
}

/// Run the ask command: retrieve context and generate a grounded answer.
pub async fn run_ask(
    config: &Config,
    question: &str,
    role: StakeholderRole,
    show_context: bool,
) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Question must not be empty");
    }

    let embedder = create_embedder(&config.embedding)?;
    let index = open_index(config, embedder.as_ref()).await?;
    let params = retrieval_params(config, None);
    let query = Query::new(question, role);

    let context = match retrieve(&index, embedder.as_ref(), &query, &params).await {
        Ok(context) => context,
        Err(e) => {
            index.pool().close().await;
            return Err(e.into());
        }
    };
    index.pool().close().await;

    if show_context {
        println!("Retrieved {} context chunks:", context.len());
        for sc in &context {
            println!("  [{}] score {:.3}", sc.chunk.id, sc.score);
        }
        println!();
    }

    let provider = create_generator(&config.generation)?;
    let provider = match provider {
        Some(p) => p,
        None => {
            if context.is_empty() {
                println!("{}", planquery_core::generate::NO_MATCH_ANSWER);
                return Ok(());
            }
            println!(
                "Generation is disabled ([generation] provider = \"disabled\"). \
                 Top retrieved records:\n"
            );
            for sc in &context {
                println!("[{}] {}", sc.chunk.id, snippet(&sc.chunk.text, 300));
                println!();
            }
            return Ok(());
        }
    };

    let answer = answer_with(provider.as_ref(), &query, &context).await?;

    println!("{}", answer.text);
    if !answer.cited.is_empty() {
        println!("\nSources: {}", answer.cited.join(", "));
    }

    Ok(())
}

/// Single entry point for front-ends: question plus optional role in,
/// grounded [`Answer`](planquery_core::models::Answer) out.
///
/// Retrieval failures (including an unbuilt index) and generation
/// failures propagate to the caller; retry and backoff policy belongs
/// there.
pub async fn answer(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    provider: &dyn CompletionProvider,
    question: &str,
    role: StakeholderRole,
    params: &RetrievalParams,
) -> Result<planquery_core::models::Answer> {
    let query = Query::new(question, role);
    let context = retrieve(index, embedder, &query, params).await?;
    answer_with(provider, &query, &context).await
}

/// Generate an answer from already-retrieved context.
///
/// Thin wrapper over the core generator; split out so library callers
/// and tests can drive it with stub providers.
pub async fn answer_with(
    provider: &dyn CompletionProvider,
    query: &Query,
    context: &[ScoredChunk],
) -> Result<planquery_core::models::Answer> {
    generate(provider, query, context)
        .await
        .context("Answer generation failed")
}

fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use planquery_core::classify::DevelopmentCategory;

    #[test]
    fn test_filter_args_empty_is_none() {
        let args = SearchFilterArgs::default();
        assert!(args.to_filter().unwrap().is_none());
    }

    #[test]
    fn test_filter_args_category() {
        let args = SearchFilterArgs {
            category: Some("demolition".to_string()),
            ..Default::default()
        };
        let filter = args.to_filter().unwrap().unwrap();
        assert_eq!(filter.categories, vec![DevelopmentCategory::Demolition]);
    }

    #[test]
    fn test_filter_args_bad_since_rejected() {
        let args = SearchFilterArgs {
            since: Some("June 2024".to_string()),
            ..Default::default()
        };
        assert!(args.to_filter().is_err());
    }

    #[test]
    fn test_snippet_truncates() {
        let text = "a".repeat(300);
        let s = snippet(&text, 200);
        assert!(s.ends_with("..."));
        assert!(s.chars().count() <= 203);
    }
}

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use tracing::info;

use crate::book::{BookContext, MetadataAnswer, MetadataQuery};
use crate::config::Config;
use crate::indexer::Pipeline;
use crate::store::SearchFilter;

/// Characters of passage content shown per search result.
const PREVIEW_CHARS: usize = 240;

pub fn build_index(config: Config, corpus_override: Option<PathBuf>) -> Result<()> {
    let mut config = config;
    if let Some(corpus) = corpus_override {
        if !corpus.is_dir() {
            bail!("Corpus directory does not exist: {}", corpus.display());
        }
        config.corpus_dir = Some(corpus);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .context("Invalid progress template")?,
    );
    spinner.set_message("Chunking and embedding corpus...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let mut pipeline = Pipeline::new(config)?;
    let report = pipeline.build()?;

    spinner.finish_and_clear();

    println!("{}", style("Index built successfully").green().bold());
    println!("  Modules:  {}", report.modules);
    println!("  Chapters: {}", report.chapters);
    println!("  Chunks:   {}", report.chunks);
    println!("  Words:    {}", report.words);
    println!("  Topics:   {}", report.topics);
    if report.placeholder_embeddings > 0 {
        println!(
            "{}",
            style(format!(
                "  Warning: {} chunks have placeholder embeddings and will rank poorly",
                report.placeholder_embeddings
            ))
            .yellow()
        );
    }
    println!(
        "  Finished: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    Ok(())
}

pub fn search(config: Config, query: &str, top_k: usize, module: Option<String>) -> Result<()> {
    let pipeline = Pipeline::new(config)?;
    if pipeline.store().count() == 0 {
        bail!("The index is empty. Run `bookrag build` first.");
    }

    let filter = module.map(SearchFilter::module);
    let passages = pipeline.search(query, top_k, filter.as_ref())?;

    if passages.is_empty() {
        println!("No relevant passages found for {query:?}");
        return Ok(());
    }

    // Citations are best-effort; a missing metadata directory downgrades
    // them to bare source paths.
    let book = pipeline.book_context().ok();

    println!(
        "{}",
        style(format!("Top {} results for {query:?}", passages.len())).bold()
    );
    for (rank, passage) in passages.iter().enumerate() {
        let citation = match &book {
            Some(book) => book.citation(&passage.source).citation,
            None => format!("Source: {}", passage.source),
        };

        println!();
        println!(
            "{} {} {}",
            style(format!("{}.", rank + 1)).bold(),
            style(&citation).cyan(),
            style(format!("(score {:.3})", passage.score)).dim()
        );
        println!("   {}", preview(&passage.content));
    }

    Ok(())
}

pub fn topic(config: Config, keyword: &str) -> Result<()> {
    let book = BookContext::load(&config.metadata_dir())
        .context("No metadata found. Run `bookrag build` first.")?;

    match book.query(&MetadataQuery::SearchTopic {
        keyword: keyword.to_string(),
    }) {
        MetadataAnswer::Topics(matches) if matches.is_empty() => {
            println!("No topics matching {keyword:?}");
        }
        MetadataAnswer::Topics(matches) => {
            println!(
                "{}",
                style(format!("{} topics matching {keyword:?}", matches.len())).bold()
            );
            for m in matches {
                println!();
                println!("{}", style(&m.topic).cyan().bold());
                println!("  {}", m.description);
                println!("  Chapters: {}", m.chapters.iter().join(", "));
            }
        }
        _ => unreachable!("topic query returns a topic answer"),
    }

    Ok(())
}

pub fn stats(config: Config) -> Result<()> {
    let pipeline = Pipeline::new(config)?;
    let book = pipeline.book_context().ok();

    println!("{}", style("Index statistics").bold());
    println!("  Indexed chunks: {}", pipeline.store().count());
    println!("  Dimension:      {}", pipeline.store().dimension());

    if let Some(book) = book {
        if let MetadataAnswer::Stats(stats) = book.query(&MetadataQuery::BookStats) {
            println!("  Modules:        {}", stats.total_modules);
            println!("  Chapters:       {}", stats.total_chapters);
            println!("  Words:          {}", stats.total_words);
            println!("  Topics:         {}", stats.total_topics);
            for module in stats.modules {
                println!(
                    "    {} ({} chapters, {} words)",
                    module.title, module.chapters, module.words
                );
            }
        }
    } else {
        println!("  No metadata found. Run `bookrag build` to generate it.");
    }

    Ok(())
}

pub fn reset(config: Config) -> Result<()> {
    let mut pipeline = Pipeline::new(config)?;
    let removed = pipeline.store().count();
    pipeline.reset()?;

    info!("Removed {removed} chunks from the index");
    println!("{}", style(format!("Index reset ({removed} chunks removed)")).green());
    Ok(())
}

pub fn show_config(config: Config) -> Result<()> {
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}

/// First `PREVIEW_CHARS` characters of a passage, on char boundaries, with
/// newlines flattened for single-line display.
fn preview(content: &str) -> String {
    let flat = content.split_whitespace().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

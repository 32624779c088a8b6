#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chunker::{chapter_files, chapter_number_from_filename};
use crate::config::ModuleDecl;

pub const SUMMARY_FILE: &str = "summary_metadata.json";
pub const TOPIC_INDEX_FILE: &str = "topic_index.json";

/// Topics kept per chapter, after deduplication and sorting.
pub const MAX_TOPICS_PER_CHAPTER: usize = 10;

/// Bold terms longer than this are unlikely to be key terms and are skipped.
const MAX_TOPIC_TERM_LEN: usize = 30;

static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("title regex is valid"));
static TOPIC_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{2,3}\s+(.+)$").expect("header regex is valid"));
static CAPITALIZED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+\b|\b[A-Z]{2,}\b").expect("capitalized-term regex is valid")
});
static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold regex is valid"));
static CODE_LANG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(\w+)").expect("code-lang regex is valid"));
static CODE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("code-block regex is valid"));

/// Structural summary of the whole book: module → chapter tree plus totals.
/// Rebuilt wholesale by re-scanning the corpus, never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryMetadata {
    pub modules: Vec<ModuleSummary>,
    pub total_chapters: usize,
    pub total_modules: usize,
    pub total_words: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub id: String,
    pub title: String,
    /// 1-based position in reading order.
    pub order: u32,
    pub description: String,
    pub chapters: Vec<ChapterSummary>,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub id: String,
    pub number: u32,
    pub title: String,
    /// Corpus-relative path, `<module_id>/<filename>`.
    pub file_path: String,
    pub topics: Vec<String>,
    pub word_count: usize,
}

/// Inverted mapping from topic keyword to the chapters mentioning it, plus a
/// per-module chapter listing. Derived entirely from `SummaryMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicIndex {
    pub topics: BTreeMap<String, TopicEntry>,
    pub module_index: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEntry {
    pub chapters: Vec<String>,
    pub description: String,
}

/// Chapter title: first level-1 header, else the title-cased file stem.
pub fn extract_title(content: &str, file_stem: &str) -> String {
    H1_RE
        .captures(content)
        .ok()
        .flatten()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| title_case(&file_stem.replace('-', " ")))
}

/// Topic keywords of a chapter: capitalized terms from level-2/3 headers,
/// short bold-emphasized terms, and fenced code-block language tags.
/// Deduplicated, sorted, capped at `MAX_TOPICS_PER_CHAPTER`.
pub fn extract_topics(content: &str) -> Vec<String> {
    let mut topics = BTreeSet::new();

    for caps in TOPIC_HEADER_RE.captures_iter(content).flatten() {
        if let Some(header) = caps.get(1) {
            for term in CAPITALIZED_RE.find_iter(header.as_str()).flatten() {
                topics.insert(term.as_str().to_string());
            }
        }
    }

    for caps in BOLD_RE.captures_iter(content).flatten() {
        if let Some(term) = caps.get(1) {
            let term = term.as_str().trim();
            if term.len() < MAX_TOPIC_TERM_LEN && !term.starts_with("http") {
                topics.insert(term.to_string());
            }
        }
    }

    for caps in CODE_LANG_RE.captures_iter(content).flatten() {
        if let Some(lang) = caps.get(1) {
            topics.insert(lang.as_str().to_string());
        }
    }

    topics.into_iter().take(MAX_TOPICS_PER_CHAPTER).collect()
}

/// Word count over the chapter text with code blocks and markdown
/// punctuation stripped.
pub fn count_words(content: &str) -> usize {
    let without_code = CODE_BLOCK_RE.replace_all(content, "");
    without_code
        .chars()
        .filter(|c| !matches!(c, '#' | '*' | '`' | '[' | ']' | '(' | ')'))
        .collect::<String>()
        .split_whitespace()
        .count()
}

/// Scan the corpus and build the module/chapter summary tree.
pub fn build_summary(corpus_root: &Path, modules: &[ModuleDecl]) -> Result<SummaryMetadata> {
    let mut summaries = Vec::new();
    let mut total_words = 0;
    let mut total_chapters = 0;

    for (index, module) in modules.iter().enumerate() {
        let module_dir = corpus_root.join(&module.id);
        if !module_dir.is_dir() {
            warn!("Module directory not found: {}", module_dir.display());
            continue;
        }

        let mut chapters = Vec::new();
        let mut module_word_count = 0;

        for (ordinal, path) in chapter_files(&module_dir)?.iter().enumerate() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read chapter: {}", path.display()))?;

            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let word_count = count_words(&content);
            chapters.push(ChapterSummary {
                id: stem.clone(),
                number: chapter_number_from_filename(&file_name)
                    .unwrap_or(ordinal as u32 + 1),
                title: extract_title(&content, &stem),
                file_path: format!("{}/{}", module.id, file_name),
                topics: extract_topics(&content),
                word_count,
            });

            module_word_count += word_count;
            total_words += word_count;
            total_chapters += 1;
        }

        summaries.push(ModuleSummary {
            id: module.id.clone(),
            title: module.title.clone(),
            order: index as u32 + 1,
            description: format!("Learn about {}", module.title.to_lowercase()),
            chapters,
            word_count: module_word_count,
        });
    }

    let total_modules = summaries.len();
    info!(
        "Built summary metadata: {total_modules} modules, {total_chapters} chapters, {total_words} words"
    );

    Ok(SummaryMetadata {
        modules: summaries,
        total_chapters,
        total_modules,
        total_words,
    })
}

/// Invert the summary into a topic → chapters mapping. Every chapter is
/// findable by its extracted topics, by its module's display title, and by
/// its own title.
pub fn build_topic_index(summary: &SummaryMetadata) -> TopicIndex {
    let mut topics: BTreeMap<String, TopicEntry> = BTreeMap::new();
    let mut module_index: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for module in &summary.modules {
        let module_chapters = module_index.entry(module.id.clone()).or_default();

        for chapter in &module.chapters {
            let chapter_path = chapter.file_path.clone();
            let file_name = chapter_path
                .rsplit('/')
                .next()
                .unwrap_or(chapter_path.as_str())
                .to_string();
            module_chapters.push(file_name);

            for topic in &chapter.topics {
                let entry = topics.entry(topic.clone()).or_insert_with(|| TopicEntry {
                    chapters: Vec::new(),
                    description: format!("Learn about {topic}"),
                });
                if !entry.chapters.contains(&chapter_path) {
                    entry.chapters.push(chapter_path.clone());
                }
            }

            let module_entry =
                topics
                    .entry(module.title.clone())
                    .or_insert_with(|| TopicEntry {
                        chapters: Vec::new(),
                        description: module.description.clone(),
                    });
            if !module_entry.chapters.contains(&chapter_path) {
                module_entry.chapters.push(chapter_path.clone());
            }

            let title_entry =
                topics
                    .entry(chapter.title.clone())
                    .or_insert_with(|| TopicEntry {
                        chapters: Vec::new(),
                        description: format!("Chapter: {}", chapter.title),
                    });
            if !title_entry.chapters.contains(&chapter_path) {
                title_entry.chapters.push(chapter_path.clone());
            }
        }
    }

    info!("Built topic index with {} topics", topics.len());
    TopicIndex {
        topics,
        module_index,
    }
}

/// Write both derived JSON documents to `dir`.
pub fn save_metadata(dir: &Path, summary: &SummaryMetadata, topics: &TopicIndex) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create metadata directory: {}", dir.display()))?;

    let summary_path = dir.join(SUMMARY_FILE);
    let summary_json =
        serde_json::to_string_pretty(summary).context("Failed to serialize summary metadata")?;
    fs::write(&summary_path, summary_json)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;

    let index_path = dir.join(TOPIC_INDEX_FILE);
    let index_json =
        serde_json::to_string_pretty(topics).context("Failed to serialize topic index")?;
    fs::write(&index_path, index_json)
        .with_context(|| format!("Failed to write {}", index_path.display()))?;

    info!("Saved metadata files to {}", dir.display());
    Ok(())
}

pub fn load_summary(dir: &Path) -> Result<SummaryMetadata> {
    let path = dir.join(SUMMARY_FILE);
    let data = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_topic_index(dir: &Path) -> Result<TopicIndex> {
    let path = dir.join(TOPIC_INDEX_FILE);
    let data = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}


use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::metadata::{SummaryMetadata, TopicIndex, load_summary, load_topic_index};

/// Topics listed per chapter in module detail answers.
const MODULE_INFO_TOPIC_CAP: usize = 5;

/// Read-only navigation context over the derived metadata documents.
///
/// Constructed explicitly (no global state) and reloaded by building a new
/// instance; a serving process loads it once at startup.
pub struct BookContext {
    summary: SummaryMetadata,
    topics: TopicIndex,
}

/// Citation record for a source path. `found` is false when the path is not
/// present in the summary; the record then carries only the bare path, since
/// citation is advisory rather than an error condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub citation: String,
    pub module_title: Option<String>,
    pub module_order: Option<u32>,
    pub chapter_number: Option<u32>,
    pub chapter_title: Option<String>,
    pub chapter_id: Option<String>,
    pub file_path: String,
    pub found: bool,
}

/// Navigation and structure queries. A closed set: adding an operation means
/// adding a variant, and every handler match is checked for exhaustiveness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataQuery {
    ListModules,
    ListChapters,
    ModuleInfo { module: String },
    SearchTopic { keyword: String },
    BookStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MetadataAnswer {
    Modules(Vec<ModuleOverview>),
    Chapters(Vec<ChapterListing>),
    /// `None` when no module matched the request.
    Module(Option<ModuleDetail>),
    Topics(Vec<TopicMatch>),
    Stats(BookStats),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleOverview {
    pub id: String,
    pub title: String,
    pub order: u32,
    pub chapter_count: usize,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterListing {
    pub module_title: String,
    pub chapter_number: u32,
    pub title: String,
    pub id: String,
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDetail {
    pub id: String,
    pub title: String,
    pub order: u32,
    pub description: String,
    pub word_count: usize,
    pub chapters: Vec<ChapterBrief>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterBrief {
    pub number: u32,
    pub title: String,
    pub id: String,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicMatch {
    pub topic: String,
    pub chapters: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookStats {
    pub total_modules: usize,
    pub total_chapters: usize,
    pub total_words: usize,
    pub total_topics: usize,
    pub modules: Vec<ModuleWordCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleWordCount {
    pub title: String,
    pub chapters: usize,
    pub words: usize,
}

impl BookContext {
    pub fn new(summary: SummaryMetadata, topics: TopicIndex) -> Self {
        Self { summary, topics }
    }

    /// Load both metadata documents from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let summary = load_summary(dir).context("Failed to load summary metadata")?;
        let topics = load_topic_index(dir).context("Failed to load topic index")?;
        debug!(
            "Loaded book context: {} modules, {} topics",
            summary.total_modules,
            topics.topics.len()
        );
        Ok(Self { summary, topics })
    }

    pub fn summary(&self) -> &SummaryMetadata {
        &self.summary
    }

    pub fn topics(&self) -> &TopicIndex {
        &self.topics
    }

    /// Format a citation for a chapter source path. A miss yields a
    /// best-effort record flagged `found: false`, never an error.
    pub fn citation(&self, source_path: &str) -> Citation {
        for module in &self.summary.modules {
            for chapter in &module.chapters {
                if source_path.contains(&chapter.file_path)
                    || chapter.file_path.contains(source_path)
                {
                    return Citation {
                        citation: format!("{} → {}", module.title, chapter.title),
                        module_title: Some(module.title.clone()),
                        module_order: Some(module.order),
                        chapter_number: Some(chapter.number),
                        chapter_title: Some(chapter.title.clone()),
                        chapter_id: Some(chapter.id.clone()),
                        file_path: chapter.file_path.clone(),
                        found: true,
                    };
                }
            }
        }

        warn!("Citation requested for path not in metadata: {source_path}");
        Citation {
            citation: format!("Source: {source_path}"),
            module_title: None,
            module_order: None,
            chapter_number: None,
            chapter_title: None,
            chapter_id: None,
            file_path: source_path.to_string(),
            found: false,
        }
    }

    pub fn query(&self, query: &MetadataQuery) -> MetadataAnswer {
        match query {
            MetadataQuery::ListModules => MetadataAnswer::Modules(
                self.summary
                    .modules
                    .iter()
                    .map(|m| ModuleOverview {
                        id: m.id.clone(),
                        title: m.title.clone(),
                        order: m.order,
                        chapter_count: m.chapters.len(),
                        word_count: m.word_count,
                    })
                    .collect(),
            ),
            MetadataQuery::ListChapters => MetadataAnswer::Chapters(
                self.summary
                    .modules
                    .iter()
                    .flat_map(|m| {
                        m.chapters.iter().map(|ch| ChapterListing {
                            module_title: m.title.clone(),
                            chapter_number: ch.number,
                            title: ch.title.clone(),
                            id: ch.id.clone(),
                            file_path: ch.file_path.clone(),
                        })
                    })
                    .collect(),
            ),
            MetadataQuery::ModuleInfo { module } => {
                let needle = module.to_lowercase();
                let found = self.summary.modules.iter().find(|m| {
                    m.id == *module || needle.contains(&m.title.to_lowercase())
                });
                MetadataAnswer::Module(found.map(|m| ModuleDetail {
                    id: m.id.clone(),
                    title: m.title.clone(),
                    order: m.order,
                    description: m.description.clone(),
                    word_count: m.word_count,
                    chapters: m
                        .chapters
                        .iter()
                        .map(|ch| ChapterBrief {
                            number: ch.number,
                            title: ch.title.clone(),
                            id: ch.id.clone(),
                            topics: ch
                                .topics
                                .iter()
                                .take(MODULE_INFO_TOPIC_CAP)
                                .cloned()
                                .collect(),
                        })
                        .collect(),
                }))
            }
            MetadataQuery::SearchTopic { keyword } => {
                let needle = keyword.to_lowercase();
                MetadataAnswer::Topics(
                    self.topics
                        .topics
                        .iter()
                        .filter(|(topic, _)| topic.to_lowercase().contains(&needle))
                        .map(|(topic, entry)| TopicMatch {
                            topic: topic.clone(),
                            chapters: entry.chapters.clone(),
                            description: entry.description.clone(),
                        })
                        .collect(),
                )
            }
            MetadataQuery::BookStats => MetadataAnswer::Stats(BookStats {
                total_modules: self.summary.total_modules,
                total_chapters: self.summary.total_chapters,
                total_words: self.summary.total_words,
                total_topics: self.topics.topics.len(),
                modules: self
                    .summary
                    .modules
                    .iter()
                    .map(|m| ModuleWordCount {
                        title: m.title.clone(),
                        chapters: m.chapters.len(),
                        words: m.word_count,
                    })
                    .collect(),
            }),
        }
    }
}

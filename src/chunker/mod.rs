pub mod tokens;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ModuleDecl;

pub use tokens::TokenCounter;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(#{1,6})\s+(.+)$").expect("header regex is valid")
});
static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("title regex is valid"));

/// Separator between prepended overlap text and a chunk's own content.
pub const OVERLAP_SEPARATOR: &str = "\n\n---\n\n";

/// A retrievable passage of one chapter, with structural metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier, `<chapter_stem>-chunk-<index>`.
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub module_name: String,
    pub chapter_number: u32,
    pub chapter_id: String,
    pub chapter_title: String,
    /// Heading of the section this chunk was cut from; empty for documents
    /// without headers.
    pub section_heading: String,
    /// Corpus-relative path of the source chapter.
    pub file_path: String,
    pub chunk_index: usize,
    pub word_count: usize,
    pub has_code_blocks: bool,
    pub has_images: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Sections above this token count are split on paragraph boundaries.
    /// Soft budget: a single oversized paragraph is emitted whole.
    pub max_section_tokens: usize,
    /// Token budget for the overlap carried from the previous chunk.
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_section_tokens: 800,
            overlap_tokens: 150,
        }
    }
}

struct Header {
    offset: usize,
    level: usize,
    text: String,
}

struct Section {
    content: String,
    heading: String,
}

/// Chunk a single chapter into ordered, overlap-carrying passages.
///
/// `file_path` is the corpus-relative path recorded in chunk metadata; its
/// stem becomes the chapter id. An empty document produces no chunks.
pub fn chunk_markdown(
    content: &str,
    module_name: &str,
    chapter_number: u32,
    file_path: &Path,
    counter: &TokenCounter,
    config: &ChunkingConfig,
) -> Vec<Chunk> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let stem = file_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let chapter_title = first_h1(content).unwrap_or_else(|| stem.clone());

    let mut sections = split_by_sections(content, counter, config.max_section_tokens);
    add_overlap(&mut sections, counter, config.overlap_tokens);

    sections
        .iter()
        .enumerate()
        .map(|(idx, section)| Chunk {
            id: format!("{stem}-chunk-{idx}"),
            metadata: ChunkMetadata {
                module_name: module_name.to_string(),
                chapter_number,
                chapter_id: stem.clone(),
                chapter_title: chapter_title.clone(),
                section_heading: section.heading.clone(),
                file_path: file_path.display().to_string(),
                chunk_index: idx,
                word_count: section.content.split_whitespace().count(),
                has_code_blocks: section.content.contains("```"),
                has_images: section.content.contains("!["),
            },
            content: section.content.clone(),
        })
        .collect()
}

/// Chunk every chapter of every declared module under `corpus_root`.
///
/// Modules are processed in declared order, chapters in filename order.
/// A missing module directory is logged and skipped; the walk continues.
pub fn chunk_corpus(
    corpus_root: &Path,
    modules: &[ModuleDecl],
    counter: &TokenCounter,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>> {
    let mut all_chunks = Vec::new();

    for module in modules {
        let module_dir = corpus_root.join(&module.id);
        if !module_dir.is_dir() {
            warn!("Module directory not found: {}", module_dir.display());
            continue;
        }

        for (ordinal, path) in chapter_files(&module_dir)?.iter().enumerate() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read chapter: {}", path.display()))?;

            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let relative = Path::new(&module.id).join(&file_name);
            let number =
                chapter_number_from_filename(&file_name).unwrap_or(ordinal as u32 + 1);

            let chunks = chunk_markdown(&content, &module.id, number, &relative, counter, config);
            debug!("Chunked {} into {} chunks", relative.display(), chunks.len());
            all_chunks.extend(chunks);
        }
    }

    info!(
        "Created {} chunks from {} modules",
        all_chunks.len(),
        modules.len()
    );
    Ok(all_chunks)
}

/// Markdown files of a module directory, in filename-lexicographic order.
/// The two-digit numeric filename prefix establishes chapter order.
pub fn chapter_files(module_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(module_dir)
        .with_context(|| format!("Failed to read module directory: {}", module_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();
    Ok(files)
}

/// Parse the numeric chapter prefix from a filename like `01-intro.md`.
pub fn chapter_number_from_filename(file_name: &str) -> Option<u32> {
    file_name.split('-').next()?.parse().ok()
}

fn first_h1(content: &str) -> Option<String> {
    H1_RE
        .captures(content)
        .ok()
        .flatten()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn extract_headers(content: &str) -> Vec<Header> {
    HEADER_RE
        .captures_iter(content)
        .flatten()
        .filter_map(|caps| {
            let hashes = caps.get(1)?;
            let text = caps.get(2)?;
            Some(Header {
                offset: hashes.start(),
                level: hashes.as_str().len(),
                text: text.as_str().trim().to_string(),
            })
        })
        .collect()
}

/// Split a document into per-header sections. Each section spans from its
/// header to the next header of equal or shallower level, so a parent
/// section absorbs the text of its subsections while the subsections are
/// still emitted on their own. Oversized sections are further split on
/// paragraph boundaries.
fn split_by_sections(content: &str, counter: &TokenCounter, max_tokens: usize) -> Vec<Section> {
    let headers = extract_headers(content);

    if headers.is_empty() {
        return vec![Section {
            content: content.to_string(),
            heading: String::new(),
        }];
    }

    let mut sections = Vec::new();
    for (i, header) in headers.iter().enumerate() {
        let mut end = content.len();
        for next in &headers[i + 1..] {
            if next.level <= header.level {
                end = next.offset;
                break;
            }
        }

        let section_content = content[header.offset..end].trim();
        if counter.count(section_content) > max_tokens {
            sections.extend(split_by_paragraphs(
                section_content,
                &header.text,
                counter,
                max_tokens,
            ));
        } else {
            sections.push(Section {
                content: section_content.to_string(),
                heading: header.text.clone(),
            });
        }
    }

    sections
}

/// Accumulate blank-line-separated paragraphs into sub-chunks, flushing
/// whenever the next paragraph would exceed the budget. Each sub-chunk is
/// seeded with `## <heading>` for continuity.
fn split_by_paragraphs(
    text: &str,
    heading: &str,
    counter: &TokenCounter,
    max_tokens: usize,
) -> Vec<Section> {
    let seed = if heading.is_empty() {
        String::new()
    } else {
        format!("## {heading}\n\n")
    };

    let mut chunks = Vec::new();
    let mut current = seed.clone();

    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        let candidate = format!("{current}{para}\n\n");
        if counter.count(&candidate) > max_tokens && !current.is_empty() {
            chunks.push(Section {
                content: current.trim().to_string(),
                heading: heading.to_string(),
            });
            current = format!("{seed}{para}\n\n");
        } else {
            current = candidate;
        }
    }

    if !current.trim().is_empty() {
        chunks.push(Section {
            content: current.trim().to_string(),
            heading: heading.to_string(),
        });
    }

    chunks
}

/// Prepend trailing paragraphs of the previous chunk to each chunk after the
/// first, greedily working backward until the overlap budget would be
/// exceeded.
fn add_overlap(sections: &mut [Section], counter: &TokenCounter, overlap_tokens: usize) {
    if sections.len() <= 1 {
        return;
    }

    for i in 1..sections.len() {
        let (left, right) = sections.split_at_mut(i);
        let prev = &left[i - 1];
        let current = &mut right[0];

        let mut overlap: Vec<&str> = Vec::new();
        let mut used = 0;
        for para in prev.content.rsplit("\n\n") {
            let para_tokens = counter.count(para);
            if used + para_tokens > overlap_tokens {
                break;
            }
            overlap.insert(0, para);
            used += para_tokens;
        }

        if !overlap.is_empty() {
            current.content = format!(
                "{}{OVERLAP_SEPARATOR}{}",
                overlap.join("\n\n"),
                current.content
            );
        }
    }
}

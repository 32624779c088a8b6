use super::*;
use tempfile::TempDir;

#[test]
fn title_comes_from_first_h1() {
    assert_eq!(
        extract_title("# Sensor Fusion\n\nBody text.", "03-sensor-fusion"),
        "Sensor Fusion"
    );
}

#[test]
fn title_falls_back_to_title_cased_stem() {
    assert_eq!(
        extract_title("No headers here.", "03-sensor-fusion"),
        "03 Sensor Fusion"
    );
}

#[test]
fn topics_come_from_headers_bold_and_code_langs() {
    let content = "# ROS2 Basics\n\n\
        ## Node Lifecycle\n\n\
        Text with **DDS middleware** in it.\n\n\
        ### Topics And Services\n\n\
        ```python\nprint(1)\n```\n";

    let topics = extract_topics(content);
    assert_eq!(
        topics,
        ["And", "DDS middleware", "Lifecycle", "Node", "Services", "Topics", "python"]
    );
}

#[test]
fn topics_skip_links_and_long_bold_terms() {
    let content = format!(
        "## Refs\n\n**https://example.com** and **{}**.",
        "very long bold term ".repeat(3)
    );
    let topics = extract_topics(&content);
    assert_eq!(topics, ["Refs"]);
}

#[test]
fn topics_are_capped() {
    let content =
        "## Alpha Bravo Charlie Delta Echo Foxtrot Golf Hotel India Juliett Kilo Lima\n\nbody";
    assert_eq!(extract_topics(content).len(), MAX_TOPICS_PER_CHAPTER);
}

#[test]
fn word_count_ignores_code_and_markup() {
    let content = "# Intro\n\nHello world again.\n\n```rust\nfn main() {}\n```";
    assert_eq!(count_words(content), 4);
}

fn write_corpus(corpus: &Path) {
    let m1 = corpus.join("module-1-physical-ai");
    fs::create_dir_all(&m1).expect("should create module dir");
    fs::write(
        m1.join("01-intro.md"),
        "# Introduction\n\nWhat physical AI is.\n\n## Key Ideas\n\nEmbodiment matters.",
    )
    .expect("should write chapter");
    fs::write(
        m1.join("02-sensors.md"),
        "# Sensors\n\nLidar and cameras.\n\n## Lidar Basics\n\nPoint clouds.",
    )
    .expect("should write chapter");

    let m2 = corpus.join("module-2-ros2");
    fs::create_dir_all(&m2).expect("should create module dir");
    fs::write(
        m2.join("01-nodes.md"),
        "# Nodes\n\nNodes exchange messages.\n\n## Topics Explained\n\nPublish and subscribe.",
    )
    .expect("should write chapter");
}

fn declared_modules() -> Vec<ModuleDecl> {
    vec![
        ModuleDecl {
            id: "module-1-physical-ai".to_string(),
            title: "Physical AI Foundations".to_string(),
        },
        ModuleDecl {
            id: "module-2-ros2".to_string(),
            title: "ROS2 Middleware".to_string(),
        },
    ]
}

#[test]
fn summary_reflects_corpus_structure() {
    let temp_dir = TempDir::new().expect("should create TempDir");
    write_corpus(temp_dir.path());

    let summary =
        build_summary(temp_dir.path(), &declared_modules()).expect("should build summary");

    assert_eq!(summary.total_modules, 2);
    assert_eq!(summary.total_chapters, 3);
    assert!(summary.total_words > 0);

    let m1 = &summary.modules[0];
    assert_eq!(m1.id, "module-1-physical-ai");
    assert_eq!(m1.title, "Physical AI Foundations");
    assert_eq!(m1.order, 1);
    assert_eq!(m1.description, "Learn about physical ai foundations");
    assert_eq!(m1.chapters.len(), 2);

    let ch = &m1.chapters[0];
    assert_eq!(ch.id, "01-intro");
    assert_eq!(ch.number, 1);
    assert_eq!(ch.title, "Introduction");
    assert_eq!(ch.file_path, "module-1-physical-ai/01-intro.md");
    assert!(ch.topics.contains(&"Ideas".to_string()));
    assert_eq!(
        m1.word_count,
        m1.chapters.iter().map(|c| c.word_count).sum::<usize>()
    );

    assert_eq!(summary.modules[1].order, 2);
}

#[test]
fn missing_module_directory_is_skipped() {
    let temp_dir = TempDir::new().expect("should create TempDir");
    write_corpus(temp_dir.path());

    let mut modules = declared_modules();
    modules.push(ModuleDecl {
        id: "module-3-missing".to_string(),
        title: "Missing".to_string(),
    });

    let summary = build_summary(temp_dir.path(), &modules).expect("should build summary");
    assert_eq!(summary.total_modules, 2);
}

#[test]
fn topic_index_makes_chapters_findable() {
    let temp_dir = TempDir::new().expect("should create TempDir");
    write_corpus(temp_dir.path());

    let summary =
        build_summary(temp_dir.path(), &declared_modules()).expect("should build summary");
    let index = build_topic_index(&summary);

    // Chapter topics point at their source chapters.
    let lidar = index.topics.get("Lidar").expect("should index Lidar");
    assert_eq!(lidar.chapters, ["module-1-physical-ai/02-sensors.md"]);
    assert_eq!(lidar.description, "Learn about Lidar");

    // Every chapter is findable through its module's display title.
    let module_entry = index
        .topics
        .get("Physical AI Foundations")
        .expect("should index module title");
    assert_eq!(module_entry.chapters.len(), 2);
    assert_eq!(module_entry.description, "Learn about physical ai foundations");

    // And through its own title.
    let chapter_entry = index.topics.get("Sensors").expect("should index chapter title");
    assert!(
        chapter_entry
            .chapters
            .contains(&"module-1-physical-ai/02-sensors.md".to_string())
    );

    assert_eq!(
        index.module_index["module-2-ros2"],
        ["01-nodes.md".to_string()]
    );
}

#[test]
fn topic_index_is_consistent_with_summary() {
    let temp_dir = TempDir::new().expect("should create TempDir");
    write_corpus(temp_dir.path());

    let summary =
        build_summary(temp_dir.path(), &declared_modules()).expect("should build summary");
    let index = build_topic_index(&summary);

    // Every chapter path referenced by a topic exists in the summary.
    let known_paths: Vec<&str> = summary
        .modules
        .iter()
        .flat_map(|m| m.chapters.iter().map(|c| c.file_path.as_str()))
        .collect();
    for entry in index.topics.values() {
        for path in &entry.chapters {
            assert!(known_paths.contains(&path.as_str()), "unknown path {path:?}");
        }
    }

    // The module listing accounts for every chapter exactly once.
    let listed: usize = index.module_index.values().map(Vec::len).sum();
    assert_eq!(listed, summary.total_chapters);
}

#[test]
fn topic_entries_are_deduplicated() {
    let summary = SummaryMetadata {
        modules: vec![ModuleSummary {
            id: "module-1".to_string(),
            title: "Module One".to_string(),
            order: 1,
            description: "Learn about module one".to_string(),
            chapters: vec![
                ChapterSummary {
                    id: "01-a".to_string(),
                    number: 1,
                    title: "A".to_string(),
                    file_path: "module-1/01-a.md".to_string(),
                    topics: vec!["Shared".to_string()],
                    word_count: 10,
                },
                ChapterSummary {
                    id: "02-b".to_string(),
                    number: 2,
                    title: "B".to_string(),
                    file_path: "module-1/02-b.md".to_string(),
                    topics: vec!["Shared".to_string()],
                    word_count: 10,
                },
            ],
            word_count: 20,
        }],
        total_chapters: 2,
        total_modules: 1,
        total_words: 20,
    };

    let index = build_topic_index(&summary);
    let shared = index.topics.get("Shared").expect("should index topic");
    assert_eq!(shared.chapters.len(), 2);
    assert_eq!(shared.chapters[0], "module-1/01-a.md");
}

#[test]
fn metadata_round_trips_through_disk() {
    let temp_dir = TempDir::new().expect("should create TempDir");
    write_corpus(temp_dir.path());

    let summary =
        build_summary(temp_dir.path(), &declared_modules()).expect("should build summary");
    let index = build_topic_index(&summary);

    let out_dir = temp_dir.path().join("metadata");
    save_metadata(&out_dir, &summary, &index).expect("should save metadata");

    assert_eq!(load_summary(&out_dir).expect("should load summary"), summary);
    assert_eq!(
        load_topic_index(&out_dir).expect("should load topic index"),
        index
    );
}

use healthmesh::{KnowledgeBase, KnowledgeSnippet};

fn corpus() -> KnowledgeBase {
    KnowledgeBase::from_snippets(vec![
        KnowledgeSnippet {
            content: "Fever often responds well to rest and fluids.".to_string(),
        },
        KnowledgeSnippet {
            content: "A high fever lasting more than three days needs a doctor.".to_string(),
        },
        KnowledgeSnippet {
            content: "Leafy greens support general wellness.".to_string(),
        },
        KnowledgeSnippet {
            content: "Fever with a stiff neck is a red-flag combination.".to_string(),
        },
    ])
}

#[test]
fn retrieve_caps_results_at_top_k_in_corpus_order() {
    let kb = corpus();
    let joined = kb.retrieve("fever", 2);
    let lines: Vec<&str> = joined.lines().collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "Fever often responds well to rest and fluids.");
    assert_eq!(
        lines[1],
        "A high fever lasting more than three days needs a doctor."
    );
    for line in lines {
        assert!(line.to_lowercase().contains("fever"));
    }
}

#[test]
fn matching_is_case_insensitive_and_token_based() {
    let kb = corpus();
    assert!(!kb.retrieve("FEVER", 4).is_empty());

    // Any token matching is enough; "greens" hits the wellness snippet.
    let joined = kb.retrieve("crunchy GREENS please", 4);
    assert_eq!(joined, "Leafy greens support general wellness.");
}

#[test]
fn no_match_or_blank_query_yields_empty_string() {
    let kb = corpus();
    assert_eq!(kb.retrieve("quantum chromodynamics", 3), "");
    assert_eq!(kb.retrieve("   ", 3), "");
}

#[test]
fn missing_corpus_file_yields_empty_results() {
    let kb = KnowledgeBase::load("/nonexistent/path/knowledge.json");
    assert!(kb.is_empty());
    assert_eq!(kb.retrieve("fever", 2), "");
}

#[test]
fn corpus_loads_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("knowledge.json");
    std::fs::write(
        &path,
        r#"[{"content": "Hydration matters for headache relief."}]"#,
    )
    .unwrap();

    let kb = KnowledgeBase::load(&path);
    assert_eq!(kb.len(), 1);
    assert_eq!(
        kb.retrieve("headache", 2),
        "Hydration matters for headache relief."
    );
}

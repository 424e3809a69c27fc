use epub_paginate::{
    flatten_document, page_for_progress, page_index_for_paragraph, parse_fragment,
    progress_for_page, split_blocks, split_sentences, ChapterSource, MarkupNode, SourceParagraph,
};
use epub_paginate_render::{Paginator, ReaderSettings};

const CHAPTER_ONE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>One</title><style>p { margin: 0 }</style></head>
<body>
  <section class="chapter">
    <h1>Chapter One</h1>
    <p>It was a bright cold day in April. The clocks were striking thirteen.</p>
    <div class="scene">
      <p>She crossed the square &amp; stopped.</p>
      <p>   </p>
      <blockquote><p>Quoted text, in a block.</p></blockquote>
    </div>
    <div><hr/></div>
    <p>Last words of the chapter&#8230; or so it seemed.</p>
  </section>
</body>
</html>"#;

const CHAPTER_TWO: &str = r#"<html><body>
  <h2>Chapter Two</h2>
  <p>A <em>second</em> chapter begins here.</p>
  <ul><li>first item</li><li>second item</li></ul>
</body></html>"#;

fn non_ws(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn chapters() -> Vec<ChapterSource> {
    vec![
        ChapterSource::from_markup(0, CHAPTER_ONE).expect("chapter one"),
        ChapterSource::from_markup(1, CHAPTER_TWO).expect("chapter two"),
    ]
}

#[test]
fn block_split_preserves_all_text() {
    for markup in [CHAPTER_ONE, CHAPTER_TWO] {
        for root in parse_fragment(markup).expect("parse") {
            let leaves = split_blocks(&root);
            let joined: String = leaves.iter().map(|l| non_ws(&l.text_content())).collect();
            assert_eq!(joined, non_ws(&root.text_content()));
        }
    }
}

#[test]
fn flattened_chapters_have_increasing_indices() {
    let flat = flatten_document(&chapters(), |_| {});
    assert_eq!(flat.skipped_fragments, 0);
    let indices: Vec<usize> = flat.paragraphs.iter().map(|p| p.index).collect();
    let expected: Vec<usize> = (0..flat.paragraphs.len()).collect();
    assert_eq!(indices, expected);

    let texts: Vec<&str> = flat.paragraphs.iter().map(|p| p.plain_text.as_str()).collect();
    assert_eq!(texts[0], "Chapter One");
    assert!(texts.contains(&"She crossed the square & stopped."));
    assert!(texts.contains(&"Quoted text, in a block."));
    assert!(!texts.iter().any(|t| t.contains("margin")), "style text leaked");

    let rule = flat
        .paragraphs
        .iter()
        .find(|p| p.html.contains("<hr"))
        .expect("rule unit");
    assert!(rule.requires_rich_content);
    assert!(rule.plain_text.is_empty());

    let chapter_two_start = flat
        .paragraphs
        .iter()
        .position(|p| p.chapter_index == 1)
        .expect("chapter two");
    assert_eq!(flat.paragraphs[chapter_two_start].plain_text, "Chapter Two");
    assert!(flat.paragraphs[..chapter_two_start]
        .iter()
        .all(|p| p.chapter_index == 0));
}

#[test]
fn malformed_paragraph_does_not_abort_load() {
    let chapter = ChapterSource::new(
        0,
        vec![
            SourceParagraph::from("<p>before</p>"),
            SourceParagraph::from("<p><b>unbalanced</p>"),
            SourceParagraph::Node(MarkupNode::text("loose text")),
            SourceParagraph::from("<p>after</p>"),
        ],
    );
    let flat = flatten_document(&[chapter], |_| {});
    assert_eq!(flat.skipped_fragments, 1);
    let texts: Vec<&str> = flat.paragraphs.iter().map(|p| p.plain_text.as_str()).collect();
    assert_eq!(texts, vec!["before", "loose text", "after"]);
}

#[test]
fn pages_map_back_to_paragraphs_and_progress() {
    let flat = flatten_document(&chapters(), |_| {});
    let settings = ReaderSettings::for_display(200.0, 260.0);
    let pages = Paginator::default()
        .paginate(&flat.paragraphs, &settings)
        .expect("paginate");
    assert!(pages.len() > 1, "expected several pages, got {}", pages.len());

    for (i, page) in pages.iter().enumerate() {
        let first = page.paragraphs[0].index;
        let found = page_index_for_paragraph(&pages, first);
        assert!(
            found >= i && pages[found].paragraphs[0].index == first,
            "page {} first paragraph {} resolved to page {}",
            i,
            first,
            found
        );
        assert_eq!(page_for_progress(progress_for_page(i, pages.len()), pages.len()), i);
    }

    let all: String = pages.iter().map(|p| non_ws(&p.plain_text())).collect();
    let source: String = flat.paragraphs.iter().map(|p| non_ws(&p.plain_text)).collect();
    assert_eq!(all, source);
}

#[test]
fn oversized_paragraph_splits_into_sentences_that_cover_it() {
    let sentence = "Every sentence here is long enough to wrap a narrow viewport line.";
    let body = vec![sentence; 30].join(" ");
    let chapter = ChapterSource::new(0, vec![SourceParagraph::Markup(format!("<p>{}</p>", body))]);
    let flat = flatten_document(&[chapter], |_| {});
    assert_eq!(flat.paragraphs.len(), 1);

    let settings = ReaderSettings::for_display(240.0, 400.0);
    let pages = Paginator::default()
        .paginate(&flat.paragraphs, &settings)
        .expect("paginate");
    assert!(pages.len() > 1);
    assert!(pages
        .iter()
        .all(|p| p.paragraphs.first().is_some_and(|u| u.index == 0)));
    let rejoined: Vec<String> = pages
        .iter()
        .flat_map(|p| p.paragraphs.iter())
        .flat_map(|p| split_sentences(&p.plain_text))
        .collect();
    assert_eq!(rejoined, split_sentences(&body));
}

#[test]
fn page_anchors_do_not_merge_a_chapter_into_one_unit() {
    let markup = r#"<html><body><h1>T</h1><p>One. Two.</p><a id="page_2"/><p>Three.</p>
<span class="pagebreak" title="3"/><p>Four.</p></body></html>"#;
    let chapter = ChapterSource::from_markup(0, markup).expect("chapter");
    let flat = flatten_document(&[chapter], |_| {});
    let texts: Vec<&str> = flat.paragraphs.iter().map(|p| p.plain_text.as_str()).collect();
    assert_eq!(texts, vec!["T", "One. Two.", "Three.", "Four."]);
    assert!(flat.paragraphs.iter().all(|p| !p.html.starts_with("<html")));
    let indices: Vec<usize> = flat.paragraphs.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
}

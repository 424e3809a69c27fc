use std::sync::Arc;

use epub_paginate::{flatten_document, ChapterSource, SourceParagraph};
use epub_paginate_render::{
    CommitOutcome, PageUnit, PaginationCacheKey, PaginationController, Paginator,
    PaginatorOptions, ReaderSettings, RequestOutcome, RunStatus, TextMeasurer, TextStyle,
};

struct FixedHeight(f32);

impl TextMeasurer for FixedHeight {
    fn measure_height(&self, text: &str, _: &TextStyle, _: f32, _: f32) -> f32 {
        if text.trim().is_empty() {
            0.0
        } else {
            self.0
        }
    }
}

fn chapter_text(chapter: usize, paragraphs: usize) -> String {
    let mut out = String::new();
    out.push_str("<section>");
    out.push_str(&format!("<h2>Chapter {}</h2>", chapter + 1));
    for i in 0..paragraphs {
        out.push_str(&format!(
            "<p>Chapter {} paragraph {}. It has <em>some</em> emphasis and a second sentence. \
             A third one closes it out!</p>",
            chapter + 1,
            i + 1
        ));
    }
    out.push_str("</section>");
    out
}

fn book(chapters: usize, paragraphs: usize) -> Vec<ChapterSource> {
    (0..chapters)
        .map(|c| ChapterSource::from_markup(c, &chapter_text(c, paragraphs)).expect("chapter"))
        .collect()
}

fn non_ws(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn fixed_paginator(height: f32) -> Paginator {
    Paginator::new(PaginatorOptions::default().with_safety_lines(0))
        .with_text_measurer(Arc::new(FixedHeight(height)))
}

#[test]
fn ten_equal_paragraphs_pack_three_per_page() {
    let chapter = ChapterSource::new(
        0,
        (0..10)
            .map(|i| SourceParagraph::Markup(format!("<p>p{}</p>", i)))
            .collect(),
    );
    let flat = flatten_document(&[chapter], |_| {});
    let settings = ReaderSettings::for_display(300.0, 200.0).with_paragraph_spacing(10);
    let pages = fixed_paginator(50.0)
        .paginate(&flat.paragraphs, &settings)
        .expect("paginate");
    let indices: Vec<Vec<usize>> = pages.iter().map(PageUnit::paragraph_indices).collect();
    assert_eq!(
        indices,
        vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8], vec![9]]
    );
}

#[test]
fn single_tall_paragraph_is_accepted_on_empty_page() {
    let chapter = ChapterSource::new(0, vec![SourceParagraph::from("<p>one block no stop</p>")]);
    let flat = flatten_document(&[chapter], |_| {});
    let settings = ReaderSettings::for_display(300.0, 200.0);
    let pages = fixed_paginator(300.0)
        .paginate(&flat.paragraphs, &settings)
        .expect("paginate");
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].paragraphs, flat.paragraphs);
}

#[test]
fn pagination_covers_every_paragraph_in_order() {
    let flat = flatten_document(&book(4, 30), |_| {});
    assert_eq!(flat.skipped_fragments, 0);
    let settings = ReaderSettings::for_display(360.0, 520.0).with_font_size(16);
    let pages = Paginator::default()
        .paginate(&flat.paragraphs, &settings)
        .expect("paginate");
    assert!(pages.iter().all(|p| !p.paragraphs.is_empty()));

    let mut seen: Vec<usize> = pages.iter().flat_map(PageUnit::paragraph_indices).collect();
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "pages out of order");
    seen.dedup();
    let expected: Vec<usize> = flat.paragraphs.iter().map(|p| p.index).collect();
    assert_eq!(seen, expected);

    let source_text: String = flat.paragraphs.iter().map(|p| non_ws(&p.plain_text)).collect();
    let paged_text: String = pages.iter().map(|p| non_ws(&p.plain_text())).collect();
    assert_eq!(paged_text, source_text);
}

#[test]
fn pages_respect_safe_height_unless_alone() {
    let flat = flatten_document(&book(3, 25), |_| {});
    let settings = ReaderSettings::for_display(300.0, 420.0);
    let paginator = Paginator::default();
    let safe = paginator.safe_usable_height(&settings);
    let style = settings.style();
    let scale = settings.effective_scale();
    let width = style.content_width(settings.viewport_width);
    let spacing = style.paragraph_spacing_px(scale);
    let measurer = epub_paginate_render::HeuristicTextMeasurer;
    let pages = paginator
        .paginate(&flat.paragraphs, &settings)
        .expect("paginate");
    for (i, page) in pages.iter().enumerate() {
        if page.paragraphs.len() == 1 {
            continue;
        }
        let mut total = 0.0f32;
        for (j, p) in page.paragraphs.iter().enumerate() {
            if j > 0 {
                total += spacing;
            }
            total += measurer.measure_height(&p.plain_text, &style, width, scale);
        }
        assert!(total <= safe + 0.01, "page {} is {} tall (safe {})", i, total, safe);
    }
}

#[test]
fn repagination_is_idempotent() {
    let flat = flatten_document(&book(2, 40), |_| {});
    let settings = ReaderSettings::for_display(320.0, 480.0).with_text_scale(1.2);
    let paginator = Paginator::default();
    let a = paginator.paginate(&flat.paragraphs, &settings).expect("a");
    let b = paginator.paginate(&flat.paragraphs, &settings).expect("b");
    assert_eq!(a, b);
    assert!(!a.is_empty());
}

#[test]
fn larger_text_never_reduces_page_count() {
    let flat = flatten_document(&book(2, 40), |_| {});
    let paginator = Paginator::default();
    let mut previous = 0usize;
    for scale in [0.8f32, 1.0, 1.3, 1.8] {
        let settings = ReaderSettings::for_display(320.0, 480.0).with_text_scale(scale);
        let count = paginator
            .paginate(&flat.paragraphs, &settings)
            .expect("paginate")
            .len();
        assert!(count >= previous, "scale {} gave {} < {}", scale, count, previous);
        previous = count;
    }
}

#[test]
fn stale_generation_never_commits() {
    let first = flatten_document(&book(3, 30), |_| {});
    let second = flatten_document(&book(1, 3), |_| {});
    let paginator = Paginator::new(PaginatorOptions::default().with_yield_progress_step(0.0));
    let mut controller = PaginationController::new(paginator);
    let settings = ReaderSettings::for_display(320.0, 480.0);

    let mut run1 = match controller.request(&first.paragraphs, &settings).expect("gen 1") {
        RequestOutcome::Started(run) => run,
        other => panic!("expected a run, got {:?}", other),
    };
    assert!(matches!(run1.step(), Some(RunStatus::Yielded { .. })));

    let smaller = settings.clone().with_font_size(14);
    let run2 = match controller.request(&second.paragraphs, &smaller).expect("gen 2") {
        RequestOutcome::Started(run) => run,
        other => panic!("expected a run, got {:?}", other),
    };
    let leftovers: Vec<RunStatus> = run1.collect();
    assert_eq!(leftovers, vec![RunStatus::Cancelled { generation: 1 }]);

    let result = run2.run_to_completion(|_| {}).expect("gen 2 finishes");
    assert_eq!(controller.commit(result), CommitOutcome::Applied);
    let committed: Vec<usize> = controller
        .pages()
        .expect("pages")
        .iter()
        .flat_map(PageUnit::paragraph_indices)
        .collect();
    let mut expected: Vec<usize> = second.paragraphs.iter().map(|p| p.index).collect();
    expected.dedup();
    let mut committed_dedup = committed.clone();
    committed_dedup.dedup();
    assert_eq!(committed_dedup, expected);
}

#[test]
fn cache_key_serializes_quantized_fields() {
    let settings = ReaderSettings::for_display(320.04, 480.0).with_text_scale(1.255);
    let key: PaginationCacheKey = settings.cache_key();
    let json = serde_json::to_value(&key).expect("json");
    assert_eq!(json["width_tenths"], 3200);
    assert_eq!(json["height_tenths"], 4800);
    assert_eq!(json["font_family"], "serif");
    assert!(json.get("paragraph_spacing").is_none());
    let back: PaginationCacheKey = serde_json::from_value(json).expect("roundtrip");
    assert_eq!(back, key);
}

#[test]
fn reanchor_keeps_reader_on_same_paragraph() {
    let flat = flatten_document(&book(2, 30), |_| {});
    let mut controller = PaginationController::new(Paginator::default());
    let small = ReaderSettings::for_display(320.0, 480.0);
    let pages = controller
        .paginate_blocking(&flat.paragraphs, &small, |_| {})
        .expect("small")
        .to_vec();
    let reading = pages.len() / 2;
    let anchor = pages[reading].paragraphs[0].index;

    let large = small.clone().with_font_size(26);
    controller
        .paginate_blocking(&flat.paragraphs, &large, |_| {})
        .expect("large");
    let position = controller.reanchor(anchor).expect("position");
    let page = &controller.pages().expect("pages")[position.page_index];
    let first = page.paragraphs[0].index;
    let last = page.paragraphs[page.paragraphs.len() - 1].index;
    assert!(first <= anchor && anchor <= last, "anchor {} not on page {}..={}", anchor, first, last);
}

use std::hint::black_box;
use std::time::Instant;

use epub_paginate::{flatten_document, ChapterSource, FlattenOutcome, SourceParagraph};
use epub_paginate_render::{Paginator, ReaderSettings};

const DISPLAY_WIDTH: f32 = 480.0;
const DISPLAY_HEIGHT: f32 = 800.0;

#[derive(Clone, Debug)]
struct CaseResult {
    case: String,
    iterations: usize,
    min_ns: u128,
    median_ns: u128,
    mean_ns: u128,
    max_ns: u128,
    output: usize,
}

fn percentile_u128(sorted: &[u128], percentile: f64) -> u128 {
    let idx = ((sorted.len().saturating_sub(1) as f64) * percentile).round() as usize;
    sorted[idx]
}

fn synthetic_book(chapters: usize, paragraphs: usize) -> Vec<ChapterSource> {
    let sentence = "The lamp burned low while the wind worried at the shutters, and nobody \
                    in the house was willing to be the first to speak.";
    (0..chapters)
        .map(|c| {
            let mut sources = Vec::with_capacity(paragraphs + 1);
            sources.push(SourceParagraph::Markup(format!("<h2>Chapter {}</h2>", c + 1)));
            for p in 0..paragraphs {
                let repeats = 1 + (c * 7 + p * 3) % 9;
                let mut body = String::from("<p>");
                for _ in 0..repeats {
                    body.push_str(sentence);
                    body.push(' ');
                }
                body.push_str("</p>");
                sources.push(SourceParagraph::Markup(body));
            }
            ChapterSource::new(c, sources)
        })
        .collect()
}

fn run_case<F>(case: &str, warmup_iters: usize, measure_iters: usize, mut op: F) -> CaseResult
where
    F: FnMut() -> usize,
{
    for _ in 0..warmup_iters {
        black_box(op());
    }
    let mut samples = Vec::with_capacity(measure_iters);
    let mut output = 0;
    for _ in 0..measure_iters {
        let start = Instant::now();
        output = black_box(op());
        samples.push(start.elapsed().as_nanos());
    }
    samples.sort_unstable();
    let sum: u128 = samples.iter().copied().sum();
    CaseResult {
        case: case.to_string(),
        iterations: measure_iters,
        min_ns: samples[0],
        median_ns: percentile_u128(&samples, 0.5),
        mean_ns: sum / samples.len() as u128,
        max_ns: samples[samples.len() - 1],
        output,
    }
}

fn main() {
    let quick = std::env::args().any(|arg| arg == "--quick");
    let warmup_iters = if quick { 1 } else { 2 };
    let measure_iters = if quick { 3 } else { 10 };
    println!("# epub-paginate benchmark");
    println!(
        "# mode={} warmup_iters={} measure_iters={}",
        if quick { "quick" } else { "full" },
        warmup_iters,
        measure_iters
    );
    println!("case,iterations,min_ns,median_ns,mean_ns,max_ns,output");

    let book = synthetic_book(24, 80);
    let flat: FlattenOutcome = flatten_document(&book, |_| {});
    let paginator = Paginator::default();
    let settings = ReaderSettings::for_display(DISPLAY_WIDTH, DISPLAY_HEIGHT);

    let results = [
        run_case("flatten_document", warmup_iters, measure_iters, || {
            flatten_document(&book, |_| {}).paragraphs.len()
        }),
        run_case("paginate_default", warmup_iters, measure_iters, || {
            paginator
                .paginate(&flat.paragraphs, &settings)
                .map(|pages| pages.len())
                .unwrap_or(0)
        }),
        run_case("paginate_large_text", warmup_iters, measure_iters, || {
            let large = settings.clone().with_text_scale(2.5);
            paginator
                .paginate(&flat.paragraphs, &large)
                .map(|pages| pages.len())
                .unwrap_or(0)
        }),
    ];

    for r in &results {
        println!(
            "{},{},{},{},{},{},{}",
            r.case, r.iterations, r.min_ns, r.median_ns, r.mean_ns, r.max_ns, r.output
        );
    }
}

//! epub-paginate – split XHTML chapters into viewport-sized pages.
//!
//! Usage:
//!   epub-paginate [OPTIONS] <chapter.xhtml>...
//!
//! Each input file is one chapter, in reading order. Set `RUST_LOG=debug` to
//! see skipped fragments, yields and timing.

use std::path::PathBuf;
use std::sync::Arc;
use std::{env, fs, process};

use epub_paginate::{flatten_document, ChapterSource};
use epub_paginate_embedded_graphics::EgTextMeasurer;
use epub_paginate_render::{
    HeuristicTextMeasurer, PageSummary, PaginationCacheKey, PaginationController, Paginator,
    PaginatorOptions, ReaderSettings, TextMeasurer,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MeasurerKind {
    Heuristic,
    Mono,
}

#[derive(Debug, PartialEq)]
struct CliArgs {
    inputs: Vec<PathBuf>,
    settings: ReaderSettings,
    measurer: MeasurerKind,
    safety_lines: u8,
    excerpt_chars: usize,
    json: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    settings: &'a ReaderSettings,
    key: PaginationCacheKey,
    paragraphs: usize,
    skipped_fragments: usize,
    pages: Vec<PageSummary>,
}

enum Parsed {
    Run(CliArgs),
    Help,
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> Result<T, String> {
    let raw = value.ok_or_else(|| format!("{flag} needs a value"))?;
    raw.parse::<T>()
        .map_err(|_| format!("invalid value for {flag}: {raw}"))
}

fn load_settings(value: &str) -> Result<ReaderSettings, String> {
    let json = if value.trim_start().starts_with('{') {
        value.to_string()
    } else {
        fs::read_to_string(value).map_err(|e| format!("reading settings '{value}': {e}"))?
    };
    ReaderSettings::from_json(&json).map_err(|e| format!("parsing settings: {e}"))
}

fn parse_args(args: &[String]) -> Result<Parsed, String> {
    let mut inputs = Vec::new();
    let mut base: Option<ReaderSettings> = None;
    let mut overrides: Vec<(String, String)> = Vec::new();
    let mut measurer = MeasurerKind::Heuristic;
    let mut safety_lines = PaginatorOptions::default().safety_lines;
    let mut excerpt_chars = 60usize;
    let mut json = false;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Parsed::Help),
            "--json" => json = true,
            "--settings" => {
                let value = iter.next().ok_or("--settings needs a value")?;
                base = Some(load_settings(value)?);
            }
            "--measurer" => {
                measurer = match iter.next().map(String::as_str) {
                    Some("heuristic") => MeasurerKind::Heuristic,
                    Some("mono") => MeasurerKind::Mono,
                    other => return Err(format!("unknown measurer: {}", other.unwrap_or(""))),
                }
            }
            "--safety-lines" => safety_lines = parse_value("--safety-lines", iter.next())?,
            "--excerpt" => excerpt_chars = parse_value("--excerpt", iter.next())?,
            "--width" | "--height" | "--font-size" | "--line-spacing" | "--margin"
            | "--paragraph-spacing" | "--scale" | "--font-family" => {
                let value = iter
                    .next()
                    .ok_or_else(|| format!("{arg} needs a value"))?;
                overrides.push((arg.clone(), value.clone()));
            }
            other if other.starts_with('-') => return Err(format!("unknown flag: {other}")),
            path => inputs.push(PathBuf::from(path)),
        }
    }

    // Flags win over --settings regardless of order.
    let mut settings = base.unwrap_or_default();
    for (flag, value) in &overrides {
        let value = Some(value);
        match flag.as_str() {
            "--width" => settings.viewport_width = parse_value(flag, value)?,
            "--height" => settings.viewport_height = parse_value(flag, value)?,
            "--font-size" => settings = settings.with_font_size(parse_value(flag, value)?),
            "--line-spacing" => settings = settings.with_line_spacing(parse_value(flag, value)?),
            "--margin" => settings = settings.with_margin(parse_value(flag, value)?),
            "--paragraph-spacing" => {
                settings = settings.with_paragraph_spacing(parse_value(flag, value)?)
            }
            "--scale" => settings = settings.with_text_scale(parse_value(flag, value)?),
            "--font-family" => {
                settings = settings.with_font_family(value.cloned().unwrap_or_default())
            }
            _ => {}
        }
    }

    if inputs.is_empty() {
        return Err("no input files specified".to_string());
    }
    Ok(Parsed::Run(CliArgs {
        inputs,
        settings,
        measurer,
        safety_lines,
        excerpt_chars,
        json,
    }))
}

/// Parse one chapter file, recovering block by block when it is malformed.
fn load_chapter(index: usize, name: &str, markup: &str) -> Option<ChapterSource> {
    match ChapterSource::from_markup_recovering(index, markup) {
        Ok(chapter) => Some(chapter),
        Err(err) => {
            log::warn!("skipping chapter '{}': {}", name, err);
            None
        }
    }
}

fn run(args: CliArgs) -> Result<(), String> {
    let mut chapters = Vec::with_capacity(args.inputs.len());
    for (index, path) in args.inputs.iter().enumerate() {
        let markup = fs::read_to_string(path)
            .map_err(|e| format!("reading '{}': {e}", path.display()))?;
        chapters.extend(load_chapter(index, &path.display().to_string(), &markup));
    }

    let flat = flatten_document(&chapters, |p| log::trace!("load progress {:.2}", p));
    let measurer: Arc<dyn TextMeasurer> = match args.measurer {
        MeasurerKind::Heuristic => HeuristicTextMeasurer::shared(),
        MeasurerKind::Mono => EgTextMeasurer::shared(),
    };
    let mut paginator = Paginator::new(
        PaginatorOptions::default().with_safety_lines(args.safety_lines),
    )
    .with_text_measurer(measurer);
    paginator.set_diagnostic_sink(|d| log::debug!("diagnostic: {:?}", d));

    let mut controller = PaginationController::new(paginator);
    let pages = controller
        .paginate_blocking(&flat.paragraphs, &args.settings, |p| {
            log::trace!("load progress {:.2}", p)
        })
        .map_err(|e| e.to_string())?;

    let summaries: Vec<PageSummary> = pages
        .iter()
        .enumerate()
        .map(|(i, page)| PageSummary::from_page(i, page, args.excerpt_chars))
        .collect();

    if args.json {
        let report = Report {
            settings: &args.settings,
            key: args.settings.cache_key(),
            paragraphs: flat.paragraphs.len(),
            skipped_fragments: flat.skipped_fragments,
            pages: summaries,
        };
        let out = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{out}");
        return Ok(());
    }

    if flat.is_empty() {
        println!("no content");
        return Ok(());
    }
    println!(
        "{} paragraphs, {} pages ({} skipped fragments)",
        flat.paragraphs.len(),
        summaries.len(),
        flat.skipped_fragments
    );
    for summary in &summaries {
        let first = summary.paragraphs.first().copied().unwrap_or(0);
        let last = summary.paragraphs.last().copied().unwrap_or(0);
        println!(
            "page {:>4}  paragraphs {:>5}..={:<5}  {}",
            summary.page_index + 1,
            first,
            last,
            summary.excerpt
        );
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("epub-paginate");
    match parse_args(&args) {
        Ok(Parsed::Help) => print_usage(prog),
        Ok(Parsed::Run(cli)) => {
            if let Err(e) = run(cli) {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            print_usage(prog);
            process::exit(1);
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!("epub-paginate – viewport pagination for XHTML chapters");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} [OPTIONS] <chapter.xhtml>...");
    eprintln!();
    eprintln!("Layout:");
    eprintln!("  --width <px>              Viewport width (default 480)");
    eprintln!("  --height <px>             Viewport height (default 800)");
    eprintln!("  --font-size <px>          Base font size (default 18)");
    eprintln!("  --line-spacing <pct>      Line height percent (default 150)");
    eprintln!("  --margin <px>             Horizontal margin (default 16)");
    eprintln!("  --paragraph-spacing <px>  Fixed paragraph gap (default 0.8 x font size)");
    eprintln!("  --scale <factor>          Text scale, 0.5-3.0 (default 1.0)");
    eprintln!("  --font-family <name>      Font family (default serif)");
    eprintln!("  --settings <json|file>    Reader settings as JSON; flags override it");
    eprintln!();
    eprintln!("Output:");
    eprintln!("  --measurer <kind>         heuristic (default) or mono");
    eprintln!("  --safety-lines <n>        Lines reserved at the page bottom (default 5)");
    eprintln!("  --excerpt <chars>         Excerpt length per page (default 60)");
    eprintln!("  --json                    Print a JSON report");
    eprintln!("  --help                    Print this message");
}

use std::io::Write;

use marginalia_core::{Category, ContextMap, ExtractionStats};
use owo_colors::OwoColorize;

use crate::pipeline::Written;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print the annotation counts after classification.
pub fn print_stats(
    w: &mut dyn Write,
    stats: &ExtractionStats,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(
        w,
        "Found {} annotations: {} to rewrite, {} missing citations, {} language remarks, {} ignored",
        stats.kept(),
        stats.llm,
        stats.quelle,
        stats.language,
        stats.ignore
    )?;

    let dropped = stats.dropped_no_text + stats.dropped_no_geometry;
    if dropped > 0 {
        let msg = format!(
            "(Dropped {} without text, {} without position)",
            stats.dropped_no_text, stats.dropped_no_geometry
        );
        if color.enabled() {
            writeln!(w, "{}", msg.dimmed())?;
        } else {
            writeln!(w, "{}", msg)?;
        }
    }
    Ok(())
}

/// Print resolved contexts for inspection.
pub fn print_contexts(
    w: &mut dyn Write,
    contexts: &ContextMap,
    color: ColorMode,
) -> std::io::Result<()> {
    for (page, items) in contexts {
        if color.enabled() {
            writeln!(w, "{}", format!("Page {}", page).bold())?;
        } else {
            writeln!(w, "Page {}", page)?;
        }
        for ctx in items {
            let line = ctx.line.map(|l| format!(", line {}", l)).unwrap_or_default();
            let category = ctx.category.as_str();
            if color.enabled() {
                let tag = match ctx.category {
                    Category::Llm => category.green().to_string(),
                    Category::Quelle | Category::Language => category.yellow().to_string(),
                    Category::Ignore => category.dimmed().to_string(),
                };
                writeln!(w, "  [{}{}] {}", tag, line, ctx.comment)?;
            } else {
                writeln!(w, "  [{}{}] {}", category, line, ctx.comment)?;
            }
            if !ctx.highlighted.is_empty() {
                writeln!(w, "      highlighted: \"{}\"", ctx.highlighted)?;
            }
            if !ctx.paragraph.is_empty() {
                writeln!(w, "      paragraph:   \"{}\"", shorten(&ctx.paragraph, 120))?;
            }
        }
    }
    Ok(())
}

/// Print where a document was written and how compilation went.
pub fn print_written(
    w: &mut dyn Write,
    written: &Written,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "Written:".green(), written.source.display())?;
    } else {
        writeln!(w, "Written: {}", written.source.display())?;
    }
    if let Some(pdf) = &written.pdf {
        if color.enabled() {
            writeln!(w, "{} {}", "Compiled:".green(), pdf.display())?;
        } else {
            writeln!(w, "Compiled: {}", pdf.display())?;
        }
    }
    if let Some(err) = &written.compile_error {
        print_warning(w, &format!("PDF compilation failed: {}", err), color)?;
    }
    Ok(())
}

pub fn print_warning(w: &mut dyn Write, message: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "WARNING:".yellow(), message)
    } else {
        writeln!(w, "WARNING: {}", message)
    }
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

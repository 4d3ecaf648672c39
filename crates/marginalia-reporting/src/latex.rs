//! LaTeX escaping and comment concatenation.

use unicode_normalization::UnicodeNormalization;

use marginalia_core::{Language, RewrittenMap};

/// Separator between concatenated comments: two LaTeX line breaks.
pub const COMMENT_SEPARATOR: &str = " \\\\\n\\\\\n";

/// Soft hyphen, zero-width space/non-joiner/joiner and the byte order mark.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}'
    )
}

/// Unicode general category Pd (dash punctuation).
fn is_dash(c: char) -> bool {
    matches!(
        c,
        '\u{002D}'
            | '\u{058A}'
            | '\u{05BE}'
            | '\u{1400}'
            | '\u{1806}'
            | '\u{2010}'..='\u{2015}'
            | '\u{2E17}'
            | '\u{2E1A}'
            | '\u{2E3A}'
            | '\u{2E3B}'
            | '\u{2E40}'
            | '\u{2E5D}'
            | '\u{301C}'
            | '\u{3030}'
            | '\u{30A0}'
            | '\u{FE31}'
            | '\u{FE32}'
            | '\u{FE58}'
            | '\u{FE63}'
            | '\u{FF0D}'
            | '\u{10EAD}'
    )
}

/// Make text safe for a LaTeX document.
///
/// Text is NFKC-normalized and invisible characters are removed. Dashes
/// become `{-}` when `preserve_latex` is set, else a plain `-`. `ß` becomes
/// `{\ss}`, German quotes become ` `` ` and `''`, and `& % $ # _ ~ ^` are
/// escaped.
///
/// With `preserve_latex` the input is assumed to contain LaTeX markup from a
/// text generator: braces and backslashes pass through, and a special
/// character already preceded by a backslash is left as is. Without it,
/// braces and backslashes are escaped too.
pub fn escape_for_latex(text: &str, preserve_latex: bool) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut prev: Option<char> = None;

    for c in text.nfkc() {
        let escaped_already = preserve_latex && prev == Some('\\');
        match c {
            c if is_invisible(c) => continue,
            c if is_dash(c) => out.push_str(if preserve_latex { "{-}" } else { "-" }),
            'ß' => out.push_str(r"{\ss}"),
            '„' => out.push_str("``"),
            '“' => out.push_str("''"),
            '&' | '%' | '$' | '#' | '_' if !escaped_already => {
                out.push('\\');
                out.push(c);
            }
            '~' if !escaped_already => out.push_str(r"\textasciitilde{}"),
            '^' if !escaped_already => out.push_str(r"\textasciicircum{}"),
            '{' | '}' if !preserve_latex => {
                out.push('\\');
                out.push(c);
            }
            '\\' if !preserve_latex => out.push_str(r"\textbackslash{}"),
            c => out.push(c),
        }
        prev = Some(c);
    }

    out
}

/// All rewritten comments as one LaTeX block, each prefixed with its page
/// ("Seite 3: ..." or "page 3: ...") and separated by two line breaks.
pub fn concatenate_comments(rewritten: &RewrittenMap, language: Language) -> String {
    let label = language.page_label();
    rewritten
        .iter()
        .flat_map(|(page, items)| {
            items.iter().map(move |c| {
                format!("{} {}: {}", label, page, escape_for_latex(&c.rewritten, true))
            })
        })
        .collect::<Vec<_>>()
        .join(COMMENT_SEPARATOR)
}

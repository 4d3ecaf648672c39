//! Colloquium evaluation letter (KOMA-Script `scrlttr2`).

use std::path::{Path, PathBuf};

use crate::ReportError;
use crate::latex::escape_for_latex;

pub const DEFAULT_PLACE: &str = "Gummersbach";
pub const DEFAULT_RECIPIENT: &str = "Prüfungsausschuss der TH Köln";
pub const MISSING_CITATIONS_REMARK: &str = "Häufig fehlen Quellenangaben.";
pub const LANGUAGE_ERRORS_REMARK: &str = "Viele sprachliche Fehler.";

pub(crate) const PREAMBLE: &str = r"\documentclass[11pt,ngerman,parskip=full]{scrlttr2}
\usepackage{fontspec}
\setmainfont{Latin Modern Roman}
\usepackage[ngerman]{babel}
\usepackage{geometry}
\geometry{a4paper, top=25mm, left=25mm, right=25mm, bottom=30mm}
";

pub(crate) const SENDER_ADDRESS: &str = r"Steinmüllerallee 1\\51643 Gummersbach";
pub(crate) const SENDER_PHONE: &str = "+49 2261-8196-6204";

pub(crate) const FOOTER: &str = r"% Footer
\setkomavar{firstfoot}{%
  \parbox[t]{\textwidth}{\footnotesize
    Technische Hochschule Köln, Campus Gummersbach \\
    Sitz des Präsidiums: Claudiusstrasse 1, 50678 Köln \\
    www.th-koeln.de \\
    Steuer-Nr.: 214/5817/3402 - USt-IdNr.: DE 122653679 \\
    Bankverbindung: Sparkasse KölnBonn \\
    IBAN: DE34 3705 0198 1900 7098 56 - BIC: COLSDE33
  }
}
";

const PROTOCOL_CHECKLIST: &str = r"\textbf{Vortrag:} xx Minuten\\

Folien waren:
\begin{itemize}
\item sehr gut
\item gut
\item befriedigend
\item ausreichend
\end{itemize}

Vortrag war:
\begin{itemize}
\item sehr gut (überzeugend, flüssig, in der Zeit)
\item gut
\item befriedigend
\item ausreichend
\end{itemize}

Demo:
\begin{itemize}
\item ja, live
\item ja, live, aber Fehlerhaft/nicht so gut
\item ja, Video
\item nein
\item nicht möglich
\end{itemize}

Fragen konnten beantwortet werden:
\begin{itemize}
\item sehr gut
\item sehr gut, manche gut
\item gut
\item gut, manche nicht so gut
\item viele nicht so gut oder gar nicht
\end{itemize}

.\\[2ex]

Dauer des Kolloquiums: 45 Minuten
";

/// `\setkomavar{name}{value}` on its own line.
pub(crate) fn push_komavar(out: &mut String, name: &str, value: &str) {
    out.push_str(&format!("\\setkomavar{{{}}}{{{}}}\n", name, value));
}

/// Institutional mail address `vorname.nachname@th-koeln.de`.
pub fn examiner_mail(christian: Option<&str>, family: Option<&str>) -> String {
    let part = |s: Option<&str>| s.unwrap_or("").trim().to_lowercase().replace(' ', "-");
    format!("{}.{}@th-koeln.de", part(christian), part(family))
}

/// Append the issue remarks to a LaTeX summary.
pub fn append_issue_remarks(
    summary: &str,
    frequent_citation_issues: bool,
    frequent_language_issues: bool,
) -> String {
    let mut out = summary.to_string();
    if frequent_citation_issues {
        out.push_str(r"\\");
        out.push_str(MISSING_CITATIONS_REMARK);
    }
    if frequent_language_issues {
        out.push_str(r"\\");
        out.push_str(LANGUAGE_ERRORS_REMARK);
    }
    out
}

/// `bewertung_brief_{matriculation}.tex`, with `unknown` when the number is missing.
pub fn colloquium_file_name(matriculation: Option<&str>) -> String {
    format!("bewertung_brief_{}.tex", file_token(matriculation))
}

/// Matriculation numbers end up in file names; keep them path-safe.
pub(crate) fn file_token(value: Option<&str>) -> String {
    let token: String = value
        .unwrap_or("")
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if token.is_empty() {
        "unknown".to_string()
    } else {
        token
    }
}

/// Content of a colloquium evaluation letter.
///
/// `summary` and `questions` are LaTeX and inserted verbatim; every other
/// field is plain text and escaped.
#[derive(Debug, Clone, PartialEq)]
pub struct ColloquiumLetter {
    pub recipient: String,
    pub subject: String,
    pub title: String,
    /// Author name and matriculation number.
    pub author: String,
    pub summary: String,
    pub first_examiner: String,
    pub second_examiner: String,
    pub first_examiner_mail: String,
    pub questions: String,
    pub place: String,
    /// LaTeX date, `\today` by default.
    pub date: String,
}

impl ColloquiumLetter {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(PREAMBLE);
        out.push('\n');

        let plain = |s: &str| escape_for_latex(s, false);
        out.push_str("% Sender info\n");
        push_komavar(&mut out, "fromname", &plain(&self.first_examiner));
        push_komavar(&mut out, "fromaddress", SENDER_ADDRESS);
        push_komavar(&mut out, "fromphone", SENDER_PHONE);
        push_komavar(&mut out, "fromemail", &plain(&self.first_examiner_mail));
        push_komavar(&mut out, "place", &plain(&self.place));
        push_komavar(&mut out, "date", &self.date);
        push_komavar(&mut out, "signature", &plain(&self.first_examiner));
        push_komavar(&mut out, "subject", &plain(&self.subject));
        out.push('\n');
        out.push_str(FOOTER);
        out.push('\n');

        out.push_str("\\begin{document}\n\n");
        out.push_str(&format!("\\begin{{letter}}{{{}}}\n\n", plain(&self.recipient)));
        out.push_str("\\opening{Sehr geehrte Damen und Herren,}\n\n");
        out.push_str("Bewertung folgender Thesis:\\\\\n\n");
        out.push_str(&format!("\\textbf{{Titel:}} {} \\\\[1ex]\n", plain(&self.title)));
        out.push_str(&format!("\\textbf{{Autor:}} {} \\\\[2ex]\n\n", plain(&self.author)));
        out.push_str("\\textbf{Zusammenfassung der Thesis:} \\\\\n\n");
        out.push_str(&self.summary);
        out.push_str("\n\n\n");
        out.push_str("\\textbf{Protokoll des Kolloquiums:}\\\\[1ex]\n\n");
        out.push_str(&format!("\\textbf{{Fragen {}:}}\\\\\n\n", plain(&self.first_examiner)));
        out.push_str(&self.questions);
        out.push_str("\\\\\n\n\n");
        out.push_str(&format!("\\textbf{{Fragen {}:}}\\\\\n\n", plain(&self.second_examiner)));
        out.push_str(PROTOCOL_CHECKLIST);
        out.push('\n');
        out.push_str("\\closing{Mit freundlichen Grü{\\ss}en}\n\n");
        out.push_str("\\end{letter}\n\n");
        out.push_str("\\end{document}\n");
        out
    }

    /// Render into `dir/file_name`, returning the path written.
    pub fn write_to(&self, dir: &Path, file_name: &str) -> Result<PathBuf, ReportError> {
        let path = dir.join(file_name);
        std::fs::write(&path, self.render())?;
        tracing::info!(path = %path.display(), "colloquium letter written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter() -> ColloquiumLetter {
        ColloquiumLetter {
            recipient: DEFAULT_RECIPIENT.to_string(),
            subject: "Bewertung Bachelor von Erika Muster_Frau".to_string(),
            title: "Graphen & Netze".to_string(),
            author: "Erika Muster, Matr.-Nr. 1234567".to_string(),
            summary: r"Die Arbeit untersucht Graphen.\\".to_string(),
            first_examiner: "Prof. Dr. Max Beispiel".to_string(),
            second_examiner: "Dr. Zweit".to_string(),
            first_examiner_mail: "max.beispiel@th-koeln.de".to_string(),
            questions: "Seite 2: Warum?".to_string(),
            place: DEFAULT_PLACE.to_string(),
            date: r"\today".to_string(),
        }
    }

    #[test]
    fn renders_escaped_fields_and_verbatim_latex() {
        let tex = letter().render();
        assert!(tex.starts_with(r"\documentclass[11pt,ngerman,parskip=full]{scrlttr2}"));
        assert!(tex.contains(r"\textbf{Titel:} Graphen \& Netze \\[1ex]"));
        assert!(tex.contains(r"\setkomavar{subject}{Bewertung Bachelor von Erika Muster\_Frau}"));
        assert!(tex.contains(r"\setkomavar{date}{\today}"));
        assert!(tex.contains(r"Die Arbeit untersucht Graphen.\\"));
        assert!(tex.contains(r"\textbf{Fragen Prof. Dr. Max Beispiel:}\\"));
        assert!(tex.contains("Seite 2: Warum?\\\\\n"));
        assert!(tex.contains(r"\textbf{Fragen Dr. Zweit:}\\"));
        assert!(tex.contains("Dauer des Kolloquiums: 45 Minuten"));
        assert!(tex.trim_end().ends_with(r"\end{document}"));
    }

    #[test]
    fn issue_remarks() {
        assert_eq!(append_issue_remarks("S", false, false), "S");
        assert_eq!(
            append_issue_remarks("S", true, true),
            r"S\\Häufig fehlen Quellenangaben.\\Viele sprachliche Fehler."
        );
        assert_eq!(
            append_issue_remarks("S", false, true),
            r"S\\Viele sprachliche Fehler."
        );
    }

    #[test]
    fn mail_from_name_parts() {
        assert_eq!(
            examiner_mail(Some("Max"), Some("Beispiel")),
            "max.beispiel@th-koeln.de"
        );
        assert_eq!(examiner_mail(None, None), ".@th-koeln.de");
    }

    #[test]
    fn file_names() {
        assert_eq!(colloquium_file_name(Some("1234567")), "bewertung_brief_1234567.tex");
        assert_eq!(colloquium_file_name(None), "bewertung_brief_unknown.tex");
        assert_eq!(colloquium_file_name(Some("../x")), "bewertung_brief_x.tex");
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = letter()
            .write_to(dir.path(), &colloquium_file_name(Some("1234567")))
            .unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("Graphen"));
    }
}

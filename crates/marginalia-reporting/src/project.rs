//! Project grading letter.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

use crate::ReportError;
use crate::latex::escape_for_latex;
use crate::letter::{FOOTER, PREAMBLE, SENDER_ADDRESS, SENDER_PHONE, file_token, push_komavar};

pub const DEFAULT_WORK_TYPE: &str = "Praxisprojekt";
pub const DEFAULT_SIGNATURE: &str = "signature.png";

/// Semester containing `date`.
///
/// March through September is the summer semester (`SoSe25`); October
/// through February is the winter semester (`WS25/26`), which starts in the
/// previous calendar year for January and February.
pub fn semester_for(date: NaiveDate) -> String {
    let yy = date.year().rem_euclid(100);
    match date.month() {
        3..=9 => format!("SoSe{:02}", yy),
        10..=12 => format!("WS{:02}/{:02}", yy, (yy + 1) % 100),
        _ => format!("WS{:02}/{:02}", (yy + 99) % 100, yy),
    }
}

pub fn current_semester() -> String {
    semester_for(chrono::Local::now().date_naive())
}

/// `projektarbeit_brief_{matriculation}.tex`, with `unknown` when the number is missing.
pub fn project_file_name(matriculation: Option<&str>) -> String {
    format!("projektarbeit_brief_{}.tex", file_token(matriculation))
}

/// Content of a project grading letter. The grade is left blank.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectLetter {
    pub student_name: String,
    pub matriculation_number: String,
    pub title: String,
    pub examiner_name: String,
    pub examiner_mail: String,
    /// `Herr`, `Frau` or `Herr/Frau`.
    pub salutation: String,
    pub work_type: String,
    pub place: String,
    pub date: String,
    pub signature_file: String,
    pub semester: String,
}

impl ProjectLetter {
    pub fn render(&self) -> String {
        let plain = |s: &str| escape_for_latex(s, false);
        let student = plain(&self.student_name);
        let work_type = plain(&self.work_type);

        let mut out = String::new();
        out.push_str(PREAMBLE);
        out.push_str("\\usepackage{graphicx}\n\n");

        out.push_str("% Sender info\n");
        push_komavar(&mut out, "fromname", &plain(&self.examiner_name));
        push_komavar(&mut out, "fromaddress", SENDER_ADDRESS);
        push_komavar(&mut out, "fromphone", SENDER_PHONE);
        push_komavar(&mut out, "fromemail", &plain(&self.examiner_mail));
        push_komavar(&mut out, "place", &plain(&self.place));
        push_komavar(&mut out, "date", &self.date);
        push_komavar(
            &mut out,
            "subject",
            &format!("{} {} {}", work_type, self.salutation, student),
        );
        out.push('\n');
        out.push_str(FOOTER);
        out.push('\n');

        out.push_str("\\begin{document}\n\n");
        out.push_str("\\begin{letter}{Prüfungsausschuss der TH Köln}\n\n");
        out.push_str("\\opening{Sehr geehrte Mitarbeiter*innen des Prüfungsservice,}\n\n");
        out.push_str(&format!("{}\n\n", self.salutation));
        out.push_str(&format!(
            "{}, Matrikelnr. {},\n\n",
            student,
            plain(&self.matriculation_number)
        ));
        out.push_str(&format!(
            "hat im {} sein/ihr {} bei mir gemacht. Er/Sie hat die Note \\underline{{\\hspace{{2cm}}}} erhalten.\n\n",
            self.semester, work_type
        ));
        out.push_str("Das Thema war:\n\n");
        out.push_str(&format!("{}\n\n", plain(&self.title)));
        out.push_str("\\closing{Danke und viele Grü{\\ss}e,}\n\n");
        out.push_str("\\iffalse\n");
        out.push_str(&format!(
            "% \\includegraphics[width=4cm]{{{}}}\n",
            self.signature_file
        ));
        out.push_str("\\fi\n\n");
        out.push_str("\\end{letter}\n\n");
        out.push_str("\\end{document}\n");
        out
    }

    pub fn write_to(&self, dir: &Path, file_name: &str) -> Result<PathBuf, ReportError> {
        let path = dir.join(file_name);
        std::fs::write(&path, self.render())?;
        tracing::info!(path = %path.display(), "project letter written");
        Ok(path)
    }
}

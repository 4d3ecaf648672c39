//! Project grading: project report in, grading letter out.

use std::path::Path;

use marginalia_core::DocumentBackend;
use marginalia_llm::tasks::METADATA_PAGES;
use marginalia_llm::{Salutation, TextGenerator, determine_salutation, extract_project_metadata};
use marginalia_reporting::{
    DEFAULT_WORK_TYPE, ProjectLetter, current_semester, examiner_mail, project_file_name,
};

use super::{OutputOptions, Written};

#[derive(Debug, Clone)]
pub struct ProjectReport {
    pub written: Written,
    pub student_name: String,
    pub salutation: Salutation,
}

pub async fn run(
    backend: &dyn DocumentBackend,
    generator: &dyn TextGenerator,
    pdf: &Path,
    options: &OutputOptions,
) -> anyhow::Result<ProjectReport> {
    let pages = backend.extract_page_text(pdf, METADATA_PAGES)?;
    let metadata = extract_project_metadata(&pages, generator).await?;

    let salutation =
        determine_salutation(metadata.student_first_name.as_deref(), generator).await?;
    tracing::info!(%salutation, first_name = ?metadata.student_first_name, "salutation");

    let student_name = metadata
        .student_name
        .clone()
        .unwrap_or_else(|| "Unknown".to_string());
    let matriculation = metadata.matriculation_number.as_deref();
    let letter = ProjectLetter {
        student_name: student_name.clone(),
        matriculation_number: matriculation.unwrap_or("unknown").to_string(),
        title: metadata.title.clone().unwrap_or_else(|| "Unknown".to_string()),
        examiner_name: metadata
            .first_examiner
            .clone()
            .unwrap_or_else(|| "Unbekannt".to_string()),
        examiner_mail: examiner_mail(
            metadata.first_examiner_christian.as_deref(),
            metadata.first_examiner_family.as_deref(),
        ),
        salutation: salutation.to_string(),
        work_type: metadata
            .work_type
            .clone()
            .unwrap_or_else(|| DEFAULT_WORK_TYPE.to_string()),
        place: options.place.clone(),
        date: r"\today".to_string(),
        signature_file: options.signature.clone(),
        semester: current_semester(),
    };

    let dir = options.dir_for(pdf);
    let tex = letter.write_to(&dir, &project_file_name(matriculation))?;

    Ok(ProjectReport {
        written: Written::compiled(tex, options, &dir),
        student_name,
        salutation,
    })
}

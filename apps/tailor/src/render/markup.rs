//! Shared structured-to-markup transform.
//!
//! Both backends route through `to_latex`: the markup-only backend writes
//! its output directly, the compiled backend writes it as the archival
//! source next to the PDF. Keeping one transform means the two paths can
//! never disagree about content.

use crate::models::resume::StructuredResume;
use crate::render::RenderError;

/// Known template ids and their page margins (in inches, for the preamble).
fn template_margin(template: &str) -> Result<&'static str, RenderError> {
    match template {
        "classic" => Ok("1in"),
        "compact" => Ok("0.75in"),
        other => Err(RenderError::UnknownTemplate(other.to_string())),
    }
}

/// Checks every field the document maps. Absent or empty content is an
/// error here — rendering never drops a section on the floor.
pub fn validate(resume: &StructuredResume) -> Result<(), RenderError> {
    if resume.candidate_name.trim().is_empty() {
        return Err(RenderError::MissingField("candidate_name"));
    }
    if resume.company.trim().is_empty() {
        return Err(RenderError::MissingField("company"));
    }
    if resume.title.trim().is_empty() {
        return Err(RenderError::MissingField("title"));
    }
    if resume.summary.trim().is_empty() {
        return Err(RenderError::MissingField("summary"));
    }
    if resume.sections.is_empty() {
        return Err(RenderError::MissingField("sections"));
    }
    if resume.matched_achievements.is_empty() {
        return Err(RenderError::MissingField("matched_achievements"));
    }
    for section in &resume.sections {
        if section.heading.trim().is_empty() || section.bullets.is_empty() {
            return Err(RenderError::MissingField("sections"));
        }
    }
    Ok(())
}

/// Deterministic file stem for a run's artifacts, derived from company and
/// title. "Acme" + "Engineer" -> "acme-engineer".
pub fn slugify(resume: &StructuredResume) -> String {
    let raw = format!("{} {}", resume.company, resume.title);
    let mut slug = String::with_capacity(raw.len());
    let mut last_dash = true; // suppress leading dash
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Escapes LaTeX special characters in user-provided text.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '{' => out.push_str(r"\{"),
            '}' => out.push_str(r"\}"),
            '$' => out.push_str(r"\$"),
            '&' => out.push_str(r"\&"),
            '#' => out.push_str(r"\#"),
            '^' => out.push_str(r"\textasciicircum{}"),
            '_' => out.push_str(r"\_"),
            '%' => out.push_str(r"\%"),
            '~' => out.push_str(r"\textasciitilde{}"),
            _ => out.push(c),
        }
    }
    out
}

/// Maps a StructuredResume into a complete LaTeX document. Deterministic:
/// the same resume and template always produce identical source bytes.
pub fn to_latex(resume: &StructuredResume, template: &str) -> Result<String, RenderError> {
    let margin = template_margin(template)?;
    validate(resume)?;

    let mut doc = String::new();
    doc.push_str("\\documentclass[11pt]{article}\n");
    doc.push_str(&format!("\\usepackage[margin={margin}]{{geometry}}\n"));
    doc.push_str("\\usepackage{enumitem}\n");
    doc.push_str("\\setlist[itemize]{leftmargin=*,nosep}\n");
    doc.push_str("\\pagestyle{empty}\n");
    doc.push_str("\\begin{document}\n\n");

    doc.push_str("\\begin{center}\n");
    doc.push_str(&format!(
        "{{\\LARGE \\textbf{{{}}}}}\\\\[2pt]\n",
        escape_latex(&resume.candidate_name)
    ));
    doc.push_str(&format!(
        "\\textit{{{} --- {}}}\n",
        escape_latex(&resume.title),
        escape_latex(&resume.company)
    ));
    doc.push_str("\\end{center}\n\n");

    doc.push_str("\\section*{Summary}\n");
    doc.push_str(&escape_latex(&resume.summary));
    doc.push_str("\n\n");

    for section in &resume.sections {
        doc.push_str(&format!("\\section*{{{}}}\n", escape_latex(&section.heading)));
        doc.push_str("\\begin{itemize}\n");
        for bullet in &section.bullets {
            doc.push_str(&format!("  \\item {}\n", escape_latex(bullet)));
        }
        doc.push_str("\\end{itemize}\n\n");
    }

    doc.push_str("\\section*{Selected Achievements}\n");
    doc.push_str("\\begin{itemize}\n");
    for ach in &resume.matched_achievements {
        doc.push_str(&format!(
            "  \\item \\textbf{{{}}}: {}\n",
            escape_latex(&ach.title),
            escape_latex(&ach.description)
        ));
    }
    doc.push_str("\\end{itemize}\n\n");

    if !resume.skill_groups.is_empty() {
        doc.push_str("\\section*{Skills}\n");
        for group in &resume.skill_groups {
            doc.push_str(&format!(
                "\\textbf{{{}}}: {}\\\\\n",
                escape_latex(&group.name),
                escape_latex(&group.skills.join(", "))
            ));
        }
        doc.push('\n');
    }

    doc.push_str("\\end{document}\n");
    Ok(doc)
}

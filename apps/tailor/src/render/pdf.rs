//! MarkupPdfBackend — compiles the resume to a PDF in-process.
//!
//! Emits two artifacts: the compiled document, plus the archival LaTeX
//! source produced by the same shared transform the markup-only backend
//! uses. No external typesetter is invoked; the PDF is laid out directly
//! with built-in Helvetica metrics.

use std::io::{BufWriter, Cursor};
use std::path::Path;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};
use tracing::debug;

use crate::models::resume::StructuredResume;
use crate::render::{
    markup, write_bytes_atomic, write_text_atomic, ArtifactKind, BackendKind, RenderArtifact,
    RenderBackend, RenderError,
};

// US letter.
const PAGE_W_MM: f64 = 215.9;
const PAGE_H_MM: f64 = 279.4;

const NAME_PT: f64 = 18.0;
const HEADING_PT: f64 = 12.0;
const BODY_PT: f64 = 10.0;
const LINE_STEP_MM: f64 = 5.0;
const HEADING_GAP_MM: f64 = 3.0;

/// Approximate average glyph width for Helvetica, as a fraction of the
/// point size. Good enough for wrapping body text; exact metrics are the
/// LaTeX path's job.
const AVG_GLYPH_WIDTH: f64 = 0.5;

pub struct MarkupPdfBackend;

impl RenderBackend for MarkupPdfBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::MarkupPdf
    }

    fn render(
        &self,
        resume: &StructuredResume,
        template: &str,
        out_dir: &Path,
    ) -> Result<Vec<RenderArtifact>, RenderError> {
        // Shared transform: validates the resume and yields the archival
        // source. Running it first means a malformed resume fails before
        // any artifact is written.
        let source = markup::to_latex(resume, template)?;
        let slug = markup::slugify(resume);

        let margin_mm = match template {
            "compact" => 19.05,
            _ => 25.4, // template validity already checked by to_latex
        };

        let tex_path = out_dir.join(format!("{slug}.tex"));
        write_text_atomic(&tex_path, &source)?;

        let pdf_bytes = compile_pdf(resume, margin_mm)?;
        let pdf_path = out_dir.join(format!("{slug}.pdf"));
        write_bytes_atomic(&pdf_path, &pdf_bytes)?;
        debug!("Compiled {} ({} bytes)", pdf_path.display(), pdf_bytes.len());

        Ok(vec![
            RenderArtifact {
                kind: ArtifactKind::SourceMarkup,
                backend: BackendKind::MarkupPdf,
                path: tex_path,
            },
            RenderArtifact {
                kind: ArtifactKind::CompiledDocument,
                backend: BackendKind::MarkupPdf,
                path: pdf_path,
            },
        ])
    }
}

/// Greedy word wrap against an approximate character budget.
fn wrap_text(text: &str, font_pt: f64, text_width_mm: f64) -> Vec<String> {
    let glyph_mm = font_pt * AVG_GLYPH_WIDTH * 25.4 / 72.0;
    let max_chars = (text_width_mm / glyph_mm).floor().max(1.0) as usize;

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Cursor-based page writer: tracks the current y position and starts a
/// fresh page when the text would run into the bottom margin.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: printpdf::PdfLayerReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    margin_mm: f64,
    y_mm: f64,
}

impl PageWriter {
    fn new(title: &str, margin_mm: f64) -> Result<Self, RenderError> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W_MM), Mm(PAGE_H_MM), "content");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| RenderError::Compile(e.to_string()))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| RenderError::Compile(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            font,
            font_bold,
            margin_mm,
            y_mm: PAGE_H_MM - margin_mm,
        })
    }

    fn text_width(&self) -> f64 {
        PAGE_W_MM - 2.0 * self.margin_mm
    }

    fn advance(&mut self, step_mm: f64) {
        self.y_mm -= step_mm;
        if self.y_mm < self.margin_mm {
            let (page, layer) = self.doc.add_page(Mm(PAGE_W_MM), Mm(PAGE_H_MM), "content");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y_mm = PAGE_H_MM - self.margin_mm;
        }
    }

    fn line(&mut self, text: &str, pt: f64, bold: bool, indent_mm: f64) {
        let font = if bold { &self.font_bold } else { &self.font };
        self.layer.use_text(
            text,
            pt,
            Mm(self.margin_mm + indent_mm),
            Mm(self.y_mm),
            font,
        );
        self.advance(LINE_STEP_MM * pt / BODY_PT);
    }

    fn paragraph(&mut self, text: &str, pt: f64, indent_mm: f64) {
        for line in wrap_text(text, pt, self.text_width() - indent_mm) {
            self.line(&line, pt, false, indent_mm);
        }
    }

    fn heading(&mut self, text: &str) {
        self.advance(HEADING_GAP_MM);
        self.line(text, HEADING_PT, true, 0.0);
    }

    fn finish(self) -> Result<Vec<u8>, RenderError> {
        let mut buf = BufWriter::new(Cursor::new(Vec::new()));
        self.doc
            .save(&mut buf)
            .map_err(|e| RenderError::Compile(e.to_string()))?;
        let cursor = buf
            .into_inner()
            .map_err(|e| RenderError::Compile(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

/// Lays the resume out as a PDF and returns the document bytes.
fn compile_pdf(resume: &StructuredResume, margin_mm: f64) -> Result<Vec<u8>, RenderError> {
    let title = format!("{} — {}", resume.candidate_name, resume.title);
    let mut page = PageWriter::new(&title, margin_mm)?;

    page.line(&resume.candidate_name, NAME_PT, true, 0.0);
    page.line(
        &format!("{} — {}", resume.title, resume.company),
        BODY_PT,
        false,
        0.0,
    );

    page.heading("Summary");
    page.paragraph(&resume.summary, BODY_PT, 0.0);

    for section in &resume.sections {
        page.heading(&section.heading);
        for bullet in &section.bullets {
            page.paragraph(&format!("• {bullet}"), BODY_PT, 2.0);
        }
    }

    page.heading("Selected Achievements");
    for ach in &resume.matched_achievements {
        page.paragraph(
            &format!("• {}: {}", ach.title, ach.description),
            BODY_PT,
            2.0,
        );
    }

    if !resume.skill_groups.is_empty() {
        page.heading("Skills");
        for group in &resume.skill_groups {
            page.paragraph(
                &format!("{}: {}", group.name, group.skills.join(", ")),
                BODY_PT,
                0.0,
            );
        }
    }

    page.finish()
}

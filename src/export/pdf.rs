//! PDF renderer: one application per document.
//!
//! Layout is built as a flat element list first, then drawn. The list
//! is what tests assert against; the drawing pass only places text and
//! link annotations and never reorders anything.

use super::{collector, file_url, json::format_export_time};
use crate::applications::{AnswerValue, Application, EntityAnswers};
use crate::program::ProgramDefinition;
use chrono::{DateTime, SecondsFormat, Utc};
use printpdf::{
    Actions, BuiltinFont, IndirectFontRef, LinkAnnotation, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Rect,
};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const LINE_HEIGHT_MM: f32 = 6.0;

/// One drawable line of the document, top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfElement {
    Title(String),
    Line(String),
    QuestionName(String),
    AnswerText(String),
    /// File answers render as a clickable URL.
    AnswerLink { target: String },
    /// Right-aligned answer timestamp.
    AnsweredOn(String),
    Spacer,
}

pub struct PdfExporter {
    base_url: String,
    status_tracking_enabled: bool,
}

impl PdfExporter {
    pub fn new(base_url: impl Into<String>, status_tracking_enabled: bool) -> Self {
        Self {
            base_url: base_url.into(),
            status_tracking_enabled,
        }
    }

    pub fn export(
        &self,
        program: &ProgramDefinition,
        application: &Application,
    ) -> Result<Vec<u8>, printpdf::Error> {
        let elements = build_elements(
            program,
            application,
            &self.base_url,
            self.status_tracking_enabled,
        );
        render(&document_title(application), &elements)
    }
}

/// `<applicant name> (<application id>)-<export instant>.pdf`
pub fn filename(application: &Application, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}.pdf",
        document_title(application),
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

fn document_title(application: &Application) -> String {
    format!("{} ({})", application.applicant_name, application.id)
}

/// Assemble the full element list for one application.
pub fn build_elements(
    program: &ProgramDefinition,
    application: &Application,
    base_url: &str,
    status_tracking_enabled: bool,
) -> Vec<PdfElement> {
    let mut elements = vec![PdfElement::Title(document_title(application))];
    elements.push(PdfElement::Line(format!(
        "Program Name : {}",
        application.program_name
    )));
    if status_tracking_enabled {
        let status = application.latest_status.as_deref().unwrap_or("none");
        elements.push(PdfElement::Line(format!("Status: {status}")));
    }
    elements.push(PdfElement::Line(format!(
        "Submit Time: {}",
        format_export_time(application.submit_time)
    )));
    elements.push(PdfElement::Spacer);

    for answer in collector::collect(program, application) {
        elements.push(PdfElement::QuestionName(answer.question_name.clone()));
        match &answer.file_key {
            Some(file_key) => elements.push(PdfElement::AnswerLink {
                target: file_url(base_url, program.id, file_key),
            }),
            None => elements.push(PdfElement::AnswerText(answer.answer_text.clone())),
        }
        if let Some(element) = answered_on(answer.answered_at_millis) {
            elements.push(element);
        }
        elements.push(PdfElement::Spacer);
        if let Some(AnswerValue::Entities { entities }) = &answer.value {
            push_entity_answers(&mut elements, program, base_url, answer.question_id, entities);
        }
    }
    elements
}

/// One label/value/date group per repeated-entity child answer, in
/// entity order. Nested enumerators recurse.
fn push_entity_answers(
    elements: &mut Vec<PdfElement>,
    program: &ProgramDefinition,
    base_url: &str,
    enumerator_id: u64,
    entities: &[EntityAnswers],
) {
    let children = program
        .block_of_question(enumerator_id)
        .map(|block| program.repeated_questions(block.id))
        .unwrap_or_default();
    for entity in entities {
        for &child in &children {
            let stored = entity
                .answers
                .get(&child.name)
                .filter(|stored| collector::shape_matches(child.question_type, &stored.value));
            elements.push(PdfElement::QuestionName(format!(
                "{} - {}",
                entity.entity_name, child.name
            )));
            match stored.map(|stored| &stored.value) {
                Some(AnswerValue::FileUpload { file_key }) => {
                    elements.push(PdfElement::AnswerLink {
                        target: file_url(base_url, program.id, file_key),
                    });
                }
                Some(value) => {
                    elements.push(PdfElement::AnswerText(collector::render_text(value)));
                }
                None => elements.push(PdfElement::AnswerText("-".to_string())),
            }
            if let Some(element) = answered_on(stored.map(|stored| stored.answered_at_millis)) {
                elements.push(element);
            }
            elements.push(PdfElement::Spacer);
            if let Some(AnswerValue::Entities { entities }) = stored.map(|stored| &stored.value) {
                push_entity_answers(elements, program, base_url, child.id, entities);
            }
        }
    }
}

fn answered_on(millis: Option<i64>) -> Option<PdfElement> {
    let answered = DateTime::from_timestamp_millis(millis?)?;
    Some(PdfElement::AnsweredOn(format!(
        "Answered on : {}",
        answered.format("%Y-%m-%d")
    )))
}

struct PageCursor<'a> {
    document: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl PageCursor<'_> {
    fn advance(&mut self) {
        self.y -= LINE_HEIGHT_MM;
        if self.y < MARGIN_MM {
            let (page, layer) =
                self.document
                    .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content");
            self.layer = self.document.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
    }

    fn text(&mut self, text: &str, size: f32, x: f32, font: &IndirectFontRef) {
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
        self.advance();
    }
}

fn render(title: &str, elements: &[PdfElement]) -> Result<Vec<u8>, printpdf::Error> {
    let (document, page, layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content");
    let regular = document.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = document.add_builtin_font(BuiltinFont::HelveticaBold)?;

    let mut cursor = PageCursor {
        document: &document,
        layer: document.get_page(page).get_layer(layer),
        y: PAGE_HEIGHT_MM - MARGIN_MM,
    };

    for element in elements {
        match element {
            PdfElement::Title(text) => cursor.text(text, 16.0, MARGIN_MM, &bold),
            PdfElement::Line(text) => cursor.text(text, 11.0, MARGIN_MM, &regular),
            PdfElement::QuestionName(text) => cursor.text(text, 12.0, MARGIN_MM, &bold),
            PdfElement::AnswerText(text) => cursor.text(text, 11.0, MARGIN_MM, &regular),
            PdfElement::AnswerLink { target } => {
                // Approximate glyph width; Helvetica at 11pt averages
                // just under 2mm per character.
                let text_width = target.chars().count() as f32 * 1.9;
                let rect = Rect::new(
                    Mm(MARGIN_MM),
                    Mm(cursor.y - 1.0),
                    Mm((MARGIN_MM + text_width).min(PAGE_WIDTH_MM - MARGIN_MM)),
                    Mm(cursor.y + 4.0),
                );
                cursor.layer.add_link_annotation(LinkAnnotation::new(
                    rect,
                    None,
                    None,
                    Actions::uri(target.clone()),
                    None,
                ));
                cursor.text(target, 11.0, MARGIN_MM, &regular);
            }
            PdfElement::AnsweredOn(text) => {
                let text_width = text.chars().count() as f32 * 1.5;
                let x = PAGE_WIDTH_MM - MARGIN_MM - text_width;
                cursor.text(text, 8.0, x, &regular);
            }
            PdfElement::Spacer => cursor.advance(),
        }
    }
    document.save_to_bytes()
}

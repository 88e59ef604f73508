//! Application export pipeline: answer collection, filter/pagination,
//! and the three format renderers behind one service facade.

pub mod collector;
pub mod csv;
pub mod json;
pub mod pdf;

use crate::applications::{
    select_applications, Application, ApplicationRepository, FilterError, PaginationResult,
    PaginationSpec, RepositoryError, SubmittedApplicationFilter,
};
use crate::config::PortalConfig;
use crate::program::ProgramDefinition;
use chrono::{DateTime, SecondsFormat, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::sync::Arc;

pub use self::collector::{collect, AnswerData};
pub use self::csv::CsvExporter;
pub use self::json::JsonExporter;
pub use self::pdf::{build_elements, PdfElement, PdfExporter};

/// Characters percent-encoded in file keys when building file-serving
/// URLs. Everything else (letters, digits, `-`, `_`, `.`) passes
/// through so typical object keys stay readable.
const FILE_KEY_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'%')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\');

/// File-serving URL for one uploaded answer.
pub fn file_url(base_url: &str, program_id: u64, file_key: &str) -> String {
    let encoded = utf8_percent_encode(file_key, FILE_KEY_ENCODE);
    format!("{base_url}/admin/programs/{program_id}/files/{encoded}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_param(raw: &str) -> Option<Self> {
        match raw {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// A finished export: the bytes plus what the HTTP layer needs to
/// serve them as a download.
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("program has no versions to export")]
    NoProgramVersions,
    #[error("unsupported export format '{0}'")]
    UnsupportedFormat(String),
    #[error("application {0} not found")]
    ApplicationNotFound(u64),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("json rendering failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv rendering failed: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("pdf rendering failed: {0}")]
    Pdf(#[from] printpdf::Error),
}

/// Facade the HTTP layer drives. Reads applications through the
/// repository, never writes.
pub struct ExportService {
    repository: Arc<dyn ApplicationRepository>,
    base_url: String,
    status_tracking_enabled: bool,
}

impl ExportService {
    pub fn new(repository: Arc<dyn ApplicationRepository>, portal: &PortalConfig) -> Self {
        Self {
            repository,
            base_url: portal.base_url.clone(),
            status_tracking_enabled: portal.status_tracking_enabled,
        }
    }

    /// Filtered, paginated listing for the review UI.
    pub fn list(
        &self,
        program: &ProgramDefinition,
        filter: &SubmittedApplicationFilter,
        pagination: &PaginationSpec,
        ignore_filters: bool,
    ) -> Result<PaginationResult<Application>, ExportError> {
        let applications = self.repository.for_program(program.id)?;
        Ok(select_applications(
            applications,
            filter,
            pagination,
            ignore_filters,
        ))
    }

    /// Export the selected batch as JSON or CSV. `versions` holds every
    /// version of the program, oldest first; the current one is last.
    pub fn export_batch(
        &self,
        versions: &[ProgramDefinition],
        filter: &SubmittedApplicationFilter,
        pagination: &PaginationSpec,
        ignore_filters: bool,
        format: ExportFormat,
        now: DateTime<Utc>,
    ) -> Result<ExportOutput, ExportError> {
        let current = versions.last().ok_or(ExportError::NoProgramVersions)?;
        let mut applications = Vec::new();
        for version in versions {
            applications.extend(self.repository.for_program(version.id)?);
        }
        let selected = select_applications(applications, filter, pagination, ignore_filters);

        match format {
            ExportFormat::Json => {
                let exporter =
                    JsonExporter::new(self.base_url.clone(), self.status_tracking_enabled);
                let payload = exporter.export(current, &selected.page_contents)?;
                Ok(ExportOutput {
                    bytes: payload.into_bytes(),
                    filename: batch_filename(current, "json", now),
                    content_type: "application/json",
                })
            }
            ExportFormat::Csv => {
                let exporter =
                    CsvExporter::new(self.base_url.clone(), self.status_tracking_enabled);
                let bytes = exporter.export(versions, &selected.page_contents)?;
                Ok(ExportOutput {
                    bytes,
                    filename: batch_filename(current, "csv", now),
                    content_type: "text/csv",
                })
            }
        }
    }

    /// Export one application as a PDF document.
    pub fn export_pdf(
        &self,
        program: &ProgramDefinition,
        application_id: u64,
        now: DateTime<Utc>,
    ) -> Result<ExportOutput, ExportError> {
        let application = self
            .repository
            .fetch(application_id)?
            .ok_or(ExportError::ApplicationNotFound(application_id))?;
        let exporter = PdfExporter::new(self.base_url.clone(), self.status_tracking_enabled);
        let bytes = exporter.export(program, &application)?;
        Ok(ExportOutput {
            bytes,
            filename: pdf::filename(&application, now),
            content_type: "application/pdf",
        })
    }
}

fn batch_filename(program: &ProgramDefinition, extension: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}-applications-{}.{extension}",
        program.admin_name,
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_url_leaves_plain_keys_untouched() {
        assert_eq!(
            file_url("https://portal.example.test", 5, "my-file-key"),
            "https://portal.example.test/admin/programs/5/files/my-file-key"
        );
    }

    #[test]
    fn file_url_encodes_reserved_characters() {
        assert_eq!(
            file_url("https://portal.example.test", 5, "tax docs/2024?.pdf"),
            "https://portal.example.test/admin/programs/5/files/tax%20docs%2F2024%3F.pdf"
        );
    }

    #[test]
    fn format_param_parses_known_values_only() {
        assert_eq!(ExportFormat::from_param("json"), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::from_param("csv"), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::from_param("xml"), None);
    }
}

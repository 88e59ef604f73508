use crate::applications::{
    parse_filter_date, FilterError, StatusFilter, SubmittedApplicationFilter,
};
use crate::export::ExportService;
use crate::program::ProgramService;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub readiness: Arc<AtomicBool>,
    pub metrics: Arc<PrometheusHandle>,
    pub programs: Arc<ProgramService>,
    pub exports: Arc<ExportService>,
}

/// Build the selection filter from raw query parameters. Empty strings
/// behave like absent parameters.
pub(crate) fn build_filter(
    search: Option<&str>,
    from_date: Option<&str>,
    until_date: Option<&str>,
    application_status: Option<&str>,
) -> Result<SubmittedApplicationFilter, FilterError> {
    let submitted_from = parse_date_param(from_date)?;
    let submitted_until = parse_date_param(until_date)?;
    Ok(SubmittedApplicationFilter {
        search: search
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string),
        submitted_from,
        submitted_until,
        status: StatusFilter::from_param(application_status),
    })
}

fn parse_date_param(raw: Option<&str>) -> Result<Option<chrono::NaiveDate>, FilterError> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(parse_filter_date)
        .transpose()
}

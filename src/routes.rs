use crate::error::AppError;
use crate::export::{ExportError, ExportFormat, ExportOutput};
use crate::infra::{build_filter, AppState};
use crate::program::{
    BlockForm, Direction, ProgramForm, QuestionDefinition, VisibilityPredicate,
};
use crate::applications::PaginationSpec;
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ApplicationListQuery {
    pub(crate) search: Option<String>,
    pub(crate) from_date: Option<String>,
    pub(crate) until_date: Option<String>,
    pub(crate) application_status: Option<String>,
    pub(crate) page: Option<usize>,
    pub(crate) page_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ExportQuery {
    pub(crate) format: Option<String>,
    pub(crate) search: Option<String>,
    pub(crate) from_date: Option<String>,
    pub(crate) until_date: Option<String>,
    pub(crate) application_status: Option<String>,
    pub(crate) ignore_filters: bool,
    pub(crate) page_size: Option<usize>,
    pub(crate) after_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApplicationSummary {
    pub(crate) application_id: u64,
    pub(crate) applicant_id: u64,
    pub(crate) applicant_name: String,
    pub(crate) submit_time: String,
    pub(crate) submitter_email: Option<String>,
    pub(crate) status: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApplicationListResponse {
    pub(crate) applications: Vec<ApplicationSummary>,
    pub(crate) num_pages: usize,
    pub(crate) has_more: bool,
    /// The caller's filter values, echoed for display.
    pub(crate) search: Option<String>,
    pub(crate) from_date: Option<String>,
    pub(crate) until_date: Option<String>,
    pub(crate) application_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AddBlockRequest {
    pub(crate) enumerator_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MoveBlockRequest {
    pub(crate) direction: Direction,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct VisibilityRequest {
    pub(crate) visibility: Option<VisibilityPredicate>,
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/admin/programs", post(create_program_endpoint))
        .route("/api/v1/admin/programs/publish", post(publish_endpoint))
        .route(
            "/api/v1/admin/programs/:program_id/blocks",
            post(add_block_endpoint),
        )
        .route(
            "/api/v1/admin/programs/:program_id/blocks/:block_id",
            post(update_block_endpoint).delete(delete_block_endpoint),
        )
        .route(
            "/api/v1/admin/programs/:program_id/blocks/:block_id/move",
            post(move_block_endpoint),
        )
        .route(
            "/api/v1/admin/programs/:program_id/blocks/:block_id/questions",
            post(add_question_endpoint),
        )
        .route(
            "/api/v1/admin/programs/:program_id/blocks/:block_id/visibility",
            post(set_visibility_endpoint),
        )
        .route(
            "/api/v1/admin/programs/:program_id/applications",
            get(list_applications_endpoint),
        )
        .route(
            "/api/v1/admin/programs/:program_id/applications/export",
            get(export_applications_endpoint),
        )
        .route(
            "/api/v1/admin/programs/:program_id/applications/:application_id/export/pdf",
            get(export_pdf_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn create_program_endpoint(
    Extension(state): Extension<AppState>,
    Json(form): Json<ProgramForm>,
) -> Result<impl IntoResponse, AppError> {
    let program = state.programs.create_program(form)?;
    Ok((StatusCode::CREATED, Json(program)))
}

pub(crate) async fn publish_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let published = state.programs.publish()?;
    Ok(Json(json!({ "published": published })))
}

pub(crate) async fn add_block_endpoint(
    Extension(state): Extension<AppState>,
    Path(program_id): Path<u64>,
    Json(request): Json<AddBlockRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (program, block_id) = match request.enumerator_id {
        Some(enumerator_id) => state.programs.add_repeated_block(program_id, enumerator_id)?,
        None => state.programs.add_block(program_id)?,
    };
    Ok((
        StatusCode::CREATED,
        Json(json!({ "block_id": block_id, "program": program })),
    ))
}

pub(crate) async fn update_block_endpoint(
    Extension(state): Extension<AppState>,
    Path((program_id, block_id)): Path<(u64, u64)>,
    Json(form): Json<BlockForm>,
) -> Result<Json<crate::program::ProgramDefinition>, AppError> {
    Ok(Json(state.programs.update_block(program_id, block_id, form)?))
}

pub(crate) async fn delete_block_endpoint(
    Extension(state): Extension<AppState>,
    Path((program_id, block_id)): Path<(u64, u64)>,
) -> Result<Json<crate::program::ProgramDefinition>, AppError> {
    Ok(Json(state.programs.delete_block(program_id, block_id)?))
}

pub(crate) async fn move_block_endpoint(
    Extension(state): Extension<AppState>,
    Path((program_id, block_id)): Path<(u64, u64)>,
    Json(request): Json<MoveBlockRequest>,
) -> Result<Json<crate::program::ProgramDefinition>, AppError> {
    Ok(Json(
        state
            .programs
            .move_block(program_id, block_id, request.direction)?,
    ))
}

pub(crate) async fn add_question_endpoint(
    Extension(state): Extension<AppState>,
    Path((program_id, block_id)): Path<(u64, u64)>,
    Json(question): Json<QuestionDefinition>,
) -> Result<Json<crate::program::ProgramDefinition>, AppError> {
    Ok(Json(
        state.programs.add_question(program_id, block_id, question)?,
    ))
}

pub(crate) async fn set_visibility_endpoint(
    Extension(state): Extension<AppState>,
    Path((program_id, block_id)): Path<(u64, u64)>,
    Json(request): Json<VisibilityRequest>,
) -> Result<Json<crate::program::ProgramDefinition>, AppError> {
    Ok(Json(state.programs.set_block_visibility(
        program_id,
        block_id,
        request.visibility,
    )?))
}

pub(crate) async fn list_applications_endpoint(
    Extension(state): Extension<AppState>,
    Path(program_id): Path<u64>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<ApplicationListResponse>, AppError> {
    let program = state.programs.get_program(program_id)?;
    let filter = build_filter(
        query.search.as_deref(),
        query.from_date.as_deref(),
        query.until_date.as_deref(),
        query.application_status.as_deref(),
    )?;
    let pagination = PaginationSpec::PageNumber {
        current_page: query.page.unwrap_or(1),
        page_size: query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    };
    let result = state.exports.list(&program, &filter, &pagination, false)?;

    let applications = result
        .page_contents
        .iter()
        .map(|application| ApplicationSummary {
            application_id: application.id,
            applicant_id: application.applicant_id,
            applicant_name: application.applicant_name.clone(),
            submit_time: crate::export::json::format_export_time(application.submit_time),
            submitter_email: application.submitter_email.clone(),
            status: application.latest_status.clone(),
        })
        .collect();

    Ok(Json(ApplicationListResponse {
        applications,
        num_pages: result.num_pages,
        has_more: result.has_more,
        search: query.search,
        from_date: query.from_date,
        until_date: query.until_date,
        application_status: query.application_status,
    }))
}

pub(crate) async fn export_applications_endpoint(
    Extension(state): Extension<AppState>,
    Path(program_id): Path<u64>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let program = state.programs.get_program(program_id)?;
    let versions = state.programs.versions_of(&program.admin_name);

    let raw_format = query.format.unwrap_or_default();
    let format = ExportFormat::from_param(&raw_format)
        .ok_or(ExportError::UnsupportedFormat(raw_format))?;
    let filter = build_filter(
        query.search.as_deref(),
        query.from_date.as_deref(),
        query.until_date.as_deref(),
        query.application_status.as_deref(),
    )?;
    let pagination = match query.page_size {
        Some(page_size) => PaginationSpec::IdentifierBased {
            page_size,
            after_id: query.after_id,
        },
        None => PaginationSpec::all(),
    };

    let output = state.exports.export_batch(
        &versions,
        &filter,
        &pagination,
        query.ignore_filters,
        format,
        Utc::now(),
    )?;
    Ok(download_response(output))
}

pub(crate) async fn export_pdf_endpoint(
    Extension(state): Extension<AppState>,
    Path((program_id, application_id)): Path<(u64, u64)>,
) -> Result<impl IntoResponse, AppError> {
    let program = state.programs.get_program(program_id)?;
    let output = state
        .exports
        .export_pdf(&program, application_id, Utc::now())?;
    Ok(download_response(output))
}

fn download_response(output: ExportOutput) -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, output.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", output.filename),
            ),
        ],
        output.bytes,
    )
}

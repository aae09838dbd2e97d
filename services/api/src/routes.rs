use crate::infra::{deserialize_optional_date, AppState, RuleState};
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use guideline_engine::error::AppError;
use guideline_engine::workflows::offense_level::{
    compare_years, views::ChecklistView, views::WizardView, Advance, Comparison, DecisionTrail,
    EngineError, Evaluation, GuidelineDraft, GuidelineSession, GuidelineYear, InvalidAnswer,
    OffenseCode, Phase, PresentationMode, ReviewProgress, SessionContext, SessionRecord,
    YearAnswers,
};
use guideline_engine::workflows::rulebook::{
    normalize_offense_code, GuidelineSummary, RejectedGuideline,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GuidelineListQuery {
    #[serde(default)]
    pub(crate) year: Option<GuidelineYear>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GuidelineListResponse {
    pub(crate) years: Vec<GuidelineYear>,
    pub(crate) guidelines: Vec<GuidelineSummary>,
    pub(crate) rejected: Vec<RejectedGuideline>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EvaluateRequest {
    pub(crate) year: GuidelineYear,
    pub(crate) offense: String,
    #[serde(default = "default_mode")]
    pub(crate) mode: PresentationMode,
    /// Phase the caller is viewing; wizard gating still applies.
    #[serde(default)]
    pub(crate) phase: Option<Phase>,
    #[serde(default)]
    pub(crate) record: SessionRecord,
    #[serde(default)]
    pub(crate) include_trail: bool,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) prepared_on: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub(crate) enum SessionView {
    Wizard(WizardView),
    Checklist(ChecklistView),
}

#[derive(Debug, Serialize)]
pub(crate) struct EvaluateResponse {
    pub(crate) context: SessionContext,
    pub(crate) evaluation: Evaluation,
    pub(crate) progress: ReviewProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) advance: Option<Advance>,
    pub(crate) view: SessionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) trail: Option<DecisionTrail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompareRequest {
    pub(crate) offense: String,
    #[serde(default)]
    pub(crate) answers: YearAnswers,
}

fn default_mode() -> PresentationMode {
    PresentationMode::Checklist
}

pub(crate) fn guideline_routes(rules: RuleState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/guidelines", get(list_guidelines_endpoint))
        .route(
            "/api/v1/guidelines/:year/:offense",
            get(guideline_endpoint),
        )
        .route("/api/v1/evaluate", post(evaluate_endpoint))
        .route("/api/v1/compare", post(compare_endpoint))
        .layer(Extension(rules))
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

pub(crate) async fn list_guidelines_endpoint(
    Extension(rules): Extension<RuleState>,
    Query(query): Query<GuidelineListQuery>,
) -> Json<GuidelineListResponse> {
    let guidelines = rules
        .book
        .summaries()
        .into_iter()
        .filter(|summary| query.year.map_or(true, |year| summary.year == year))
        .collect();
    let rejected = rules
        .book
        .rejected()
        .iter()
        .filter(|entry| query.year.map_or(true, |year| entry.year == year))
        .cloned()
        .collect();

    Json(GuidelineListResponse {
        years: rules.book.years().into_iter().collect(),
        guidelines,
        rejected,
    })
}

pub(crate) async fn guideline_endpoint(
    Extension(rules): Extension<RuleState>,
    Path((year, offense)): Path<(GuidelineYear, String)>,
) -> Result<Json<GuidelineDraft>, AppError> {
    let offense = OffenseCode::new(normalize_offense_code(&offense));
    let guideline = rules.book.guideline(year, &offense)?;
    Ok(Json(guideline.draft().clone()))
}

/// Stateless evaluation: the caller owns the session record and replays it
/// on every request.
pub(crate) async fn evaluate_endpoint(
    Extension(rules): Extension<RuleState>,
    Json(payload): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let EvaluateRequest {
        year,
        offense,
        mode,
        phase,
        record,
        include_trail,
        prepared_on,
    } = payload;

    let offense = OffenseCode::new(normalize_offense_code(&offense));
    let guideline = rules.book.guideline(year, &offense)?;
    let mut session = GuidelineSession::restore(guideline, mode, &record)?;
    let advance = phase.map(|phase| session.enter(phase));
    debug!(%offense, year, ?mode, ?advance, "evaluation requested");

    let context = session
        .context()
        .ok_or(AppError::Engine(missing_selection()))?;
    let evaluation = session
        .evaluation()
        .ok_or(AppError::Engine(missing_selection()))?;
    let view = match mode {
        PresentationMode::Wizard => session.wizard_view().map(SessionView::Wizard),
        PresentationMode::Checklist => session.checklist_view().map(SessionView::Checklist),
    }
    .ok_or(AppError::Engine(missing_selection()))?;

    let trail = include_trail
        .then(|| DecisionTrail::from_session(&session))
        .flatten()
        .map(|trail| match prepared_on {
            Some(date) => trail.with_prepared_on(date),
            None => trail,
        });

    Ok(Json(EvaluateResponse {
        context,
        evaluation,
        progress: session.review_progress(),
        advance,
        view,
        trail,
    }))
}

pub(crate) async fn compare_endpoint(
    Extension(rules): Extension<RuleState>,
    Json(payload): Json<CompareRequest>,
) -> Result<Json<Comparison>, AppError> {
    if !rules.one_book_rule {
        return Err(AppError::OneBookRuleDisabled);
    }

    let offense = OffenseCode::new(normalize_offense_code(&payload.offense));
    let editions = rules.book.editions(&offense);
    let comparison = compare_years(&offense, &editions, &payload.answers)?;
    Ok(Json(comparison))
}

fn missing_selection() -> EngineError {
    InvalidAnswer::NoGuidelineSelected.into()
}

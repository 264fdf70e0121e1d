//! REST endpoints for registration, patient onboarding and sign-in.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::orchestrator::Orchestrator;
use super::state::{HOME_ADDRESS, OnboardingStep, REGISTER_ADDRESS};
use crate::auth::{
    DatabaseSessions, SESSION_COOKIE, SessionProvider, clear_session_cookie, cookie, session_cookie,
};
use crate::error::OnboardingError;
use crate::forms::{FormController, SubmitAttempt};
use crate::submission::{FailureReason, SubmissionFailure, SubmissionOutcome, Submitter};

/// Cookie holding the OAuth `state` between redirect and callback.
pub const OAUTH_STATE_COOKIE: &str = "intake.oauth-state";

/// Shared state for the onboarding routes.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<DatabaseSessions>,
}

/// Build the router. `allowed_origin` is the browser origin allowed to call
/// the API with credentials.
pub fn onboarding_routes(state: AppState, allowed_origin: Option<&str>) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/forms/register", get(register_form))
        .route("/api/register", post(register))
        .route("/api/onboarding/{id}", get(patient_form).post(submit_patient))
        .route("/api/me", get(me))
        .route("/auth/signin/google", get(sign_in))
        .route("/auth/callback/google", get(callback))
        .route("/auth/signout", post(sign_out))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    match allowed_origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => router.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
                .allow_credentials(true),
        ),
        Some(Err(e)) => {
            warn!(error = %e, "Ignoring unusable CORS origin");
            router
        }
        None => router,
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

fn failure_response(failure: &SubmissionFailure) -> Response {
    let status = match failure.reason {
        FailureReason::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
        FailureReason::Conflict => StatusCode::CONFLICT,
        FailureReason::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({
            "error": failure.message,
            "reason": failure.reason,
            "field": failure.field,
        })),
    )
        .into_response()
}

fn onboarding_error(err: OnboardingError) -> Response {
    match err {
        OnboardingError::UnknownUser { .. } => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Account not found", "redirect": REGISTER_ADDRESS})),
        )
            .into_response(),
        other => {
            error!(error = %other, "Onboarding request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, SubmissionFailure::UNKNOWN_MESSAGE)
        }
    }
}

fn parse_id(id: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(id).map_err(|_| json_error(StatusCode::BAD_REQUEST, "Invalid account ID"))
}

/// Feed raw input through a controller and submit it. Undeclared keys are
/// rejected before anything else happens.
async fn run_form<S>(
    mut form: FormController,
    input: &BTreeMap<String, String>,
    submitter: &S,
) -> Result<S::Entity, Response>
where
    S: Submitter,
{
    let unknown: Vec<_> = input
        .keys()
        .filter(|name| !form.schema().has_field(name))
        .map(|name| serde_json::json!({"field": name, "message": "Unknown field"}))
        .collect();
    if !unknown.is_empty() {
        warn!(form = form.schema().id(), count = unknown.len(), "Request carries undeclared fields");
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"errors": unknown})),
        )
            .into_response());
    }

    for (name, raw) in input {
        form.on_field_change(name, raw);
    }

    match form.on_submit(submitter).await {
        SubmitAttempt::Settled(SubmissionOutcome::Success { entity }) => Ok(entity),
        SubmitAttempt::Settled(SubmissionOutcome::Failure(failure)) => Err(failure_response(&failure)),
        SubmitAttempt::Rejected(errors) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"errors": errors})),
        )
            .into_response()),
        SubmitAttempt::Ignored => Err(json_error(StatusCode::CONFLICT, "Form already submitted")),
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| cookie(raw, name))
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    cookie_value(headers, SESSION_COOKIE)
}

fn found(location: &str) -> (StatusCode, [(header::HeaderName, String); 1]) {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())])
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Registration ────────────────────────────────────────────────────────

async fn register_form(State(state): State<AppState>) -> impl IntoResponse {
    let form = state.orchestrator.registration_form();
    Json(serde_json::json!({
        "id": form.schema().id(),
        "title": form.schema().title(),
        "sections": form.controls(),
    }))
}

async fn register(
    State(state): State<AppState>,
    Json(input): Json<BTreeMap<String, String>>,
) -> Response {
    let orchestrator = &state.orchestrator;
    let pipeline = orchestrator.registration_pipeline();
    let account = match run_form(orchestrator.registration_form(), &input, &pipeline).await {
        Ok(account) => account,
        Err(response) => return response,
    };

    match orchestrator.advance(OnboardingStep::Account, account.user.id) {
        Ok(transition) => (
            StatusCode::CREATED,
            Json(serde_json::json!({"user": account.user, "next": transition.address})),
        )
            .into_response(),
        Err(e) => onboarding_error(e),
    }
}

// ── Patient onboarding ──────────────────────────────────────────────────

async fn patient_form(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let user_id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let orchestrator = &state.orchestrator;

    match orchestrator.step_for(user_id).await {
        Ok(OnboardingStep::Complete) => {
            Json(serde_json::json!({"complete": true, "next": HOME_ADDRESS})).into_response()
        }
        Ok(_) => match orchestrator.patient_form(user_id).await {
            Ok(form) => Json(serde_json::json!({
                "id": form.schema().id(),
                "title": form.schema().title(),
                "user_id": user_id,
                "sections": form.controls(),
            }))
            .into_response(),
            Err(e) => onboarding_error(e),
        },
        Err(e) => onboarding_error(e),
    }
}

async fn submit_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<BTreeMap<String, String>>,
) -> Response {
    let user_id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let orchestrator = &state.orchestrator;

    let form = match orchestrator.patient_form(user_id).await {
        Ok(form) => form,
        Err(e) => return onboarding_error(e),
    };
    let pipeline = orchestrator.patient_pipeline(user_id);
    let profile = match run_form(form, &input, &pipeline).await {
        Ok(profile) => profile,
        Err(response) => return response,
    };

    match orchestrator.advance(OnboardingStep::PatientDetails, user_id) {
        Ok(transition) => Json(serde_json::json!({
            "profile": profile,
            "next": transition.address,
        }))
        .into_response(),
        Err(e) => onboarding_error(e),
    }
}

// ── Sessions ────────────────────────────────────────────────────────────

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match cookie_token(&headers) {
        Some(token) => state.sessions.session(token).await,
        None => Ok(None),
    };
    let session = match session {
        Ok(Some(session)) => session,
        Ok(None) => return Redirect::to(REGISTER_ADDRESS).into_response(),
        Err(e) => {
            error!(error = %e, "Session lookup failed");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, SubmissionFailure::UNKNOWN_MESSAGE);
        }
    };

    let orchestrator = &state.orchestrator;
    let next = match orchestrator.resume_address(session.user_id).await {
        Ok(next) => next,
        Err(OnboardingError::UnknownUser { .. }) => {
            return Redirect::to(REGISTER_ADDRESS).into_response();
        }
        Err(e) => return onboarding_error(e),
    };
    Json(serde_json::json!({
        "user_id": session.user_id,
        "expires_at": session.expires_at,
        "next": next,
    }))
    .into_response()
}

async fn sign_in(State(state): State<AppState>) -> Response {
    let oauth_state = Uuid::new_v4().simple().to_string();
    match state.sessions.sign_in_redirect(&oauth_state) {
        Ok(url) => (
            AppendHeaders([(
                header::SET_COOKIE,
                format!("{OAUTH_STATE_COOKIE}={oauth_state}; Path=/auth; HttpOnly; Secure; SameSite=Lax; Max-Age=600"),
            )]),
            found(&url),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Sign-in requested without an identity provider");
            json_error(StatusCode::NOT_FOUND, "Sign-in provider is not configured")
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: String,
    state: String,
}

async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(identity) = state.sessions.identity() else {
        return json_error(StatusCode::NOT_FOUND, "Sign-in provider is not configured");
    };
    if cookie_value(&headers, OAUTH_STATE_COOKIE) != Some(params.state.as_str()) {
        warn!("OAuth callback state mismatch");
        return json_error(StatusCode::BAD_REQUEST, "Sign-in could not be verified");
    }

    let profile = match identity.exchange_code(&params.code).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!(provider = identity.name(), error = %e, "Code exchange failed");
            return json_error(StatusCode::UNAUTHORIZED, "Sign-in failed");
        }
    };

    let signed_in = async {
        let user = state.sessions.find_or_create_user(&profile).await?;
        let session = state.sessions.start_session(user.id).await?;
        Ok::<_, crate::error::AuthError>((user, session))
    };
    let (user, session) = match signed_in.await {
        Ok(pair) => pair,
        Err(e) => {
            error!(provider = identity.name(), error = %e, "Sign-in failed");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, SubmissionFailure::UNKNOWN_MESSAGE);
        }
    };

    let next = match state.orchestrator.resume_address(user.id).await {
        Ok(next) => next,
        Err(e) => return onboarding_error(e),
    };
    info!(user_id = %user.id, provider = identity.name(), "Signed in");

    (
        AppendHeaders([
            (
                header::SET_COOKIE,
                session_cookie(&session.token, state.sessions.max_age()),
            ),
            (
                header::SET_COOKIE,
                format!("{OAUTH_STATE_COOKIE}=; Path=/auth; HttpOnly; Secure; SameSite=Lax; Max-Age=0"),
            ),
        ]),
        found(&next),
    )
        .into_response()
}

async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = cookie_token(&headers) {
        if let Err(e) = state.sessions.end_session(token).await {
            error!(error = %e, "Failed to end session");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, SubmissionFailure::UNKNOWN_MESSAGE);
        }
    }
    (
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie())]),
        Json(serde_json::json!({"signed_out": true})),
    )
        .into_response()
}

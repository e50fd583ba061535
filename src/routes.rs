use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    controller::{Controller, ControllerError, SessionRecord},
    models::{Language, PostType},
    options::OptionUpdate,
    session::{Session, SessionError},
};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Controller>,
}

pub fn router(state: AppState) -> Router {
    // Bodies somewhat over the upload limit still reach the controller so the
    // session records a readable error; anything larger gets a bare 413.
    let body_limit = state.controller.max_upload_bytes().saturating_mul(2);
    Router::new()
        .route("/api/presets", get(get_presets))
        .route("/api/session", post(create_session))
        .route("/api/session/:id", get(get_session).delete(delete_session))
        .route("/api/session/:id/image", post(upload_image))
        .route("/api/session/:id/options", post(update_options))
        .route("/api/session/:id/generate", post(generate_image))
        .route("/api/session/:id/adjust", post(adjust_settings))
        .route("/api/session/:id/caption", post(generate_caption))
        .route("/api/session/:id/reset", post(reset_session))
        .route("/api/session/:id/language", post(set_language))
        .route("/api/session/:id/language/toggle", post(toggle_language))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct StrategyView {
    pub post_type: PostType,
    pub title: &'static str,
    pub use_case: &'static str,
}

/// Fallback choices shown next to the analysis suggestions.
#[derive(Debug, Serialize)]
pub struct Presets {
    pub accessory: Vec<&'static str>,
    pub clothing_color: Vec<&'static str>,
    pub caption_strategies: Vec<StrategyView>,
}

impl Presets {
    pub fn for_language(language: Language) -> Self {
        Self {
            accessory: language.accessory_presets().to_vec(),
            clothing_color: language.color_presets().to_vec(),
            caption_strategies: PostType::ALL
                .iter()
                .map(|&post_type| StrategyView { post_type, title: post_type.title(), use_case: post_type.use_case() })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ready_to_generate: bool,
    /// `data:` URL of the generated image, ready for an `<img>` tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_image_url: Option<String>,
    /// Caption as one pasteable block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_text: Option<String>,
    #[serde(flatten)]
    pub session: Session,
    pub presets: Presets,
}

impl From<SessionRecord> for SessionView {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at,
            updated_at: record.updated_at,
            ready_to_generate: record.session.ready_to_generate(),
            generated_image_url: record.session.generated_image.as_ref().map(|img| img.data_url()),
            caption_text: record.session.social_post.as_ref().map(|post| post.full_text()),
            presets: Presets::for_language(record.session.language),
            session: record.session,
        }
    }
}

fn status_for(err: ControllerError) -> StatusCode {
    match err {
        ControllerError::NotFound(_) => StatusCode::NOT_FOUND,
        ControllerError::Session(SessionError::InvalidTransition { .. }) => StatusCode::CONFLICT,
        ControllerError::Session(SessionError::NotReady) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn respond(result: Result<SessionRecord, ControllerError>) -> Result<Json<SessionView>, StatusCode> {
    result.map(|record| Json(record.into())).map_err(|err| {
        tracing::warn!("❌ {}", err);
        status_for(err)
    })
}

#[derive(Debug, Deserialize)]
pub struct LanguageBody {
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Deserialize)]
pub struct CaptionBody {
    pub post_type: PostType,
}

pub async fn get_presets(Query(query): Query<LanguageBody>) -> Json<Presets> {
    Json(Presets::for_language(query.language))
}

pub async fn create_session(State(state): State<AppState>, body: Option<Json<LanguageBody>>) -> Json<SessionView> {
    let language = body.map(|Json(b)| b.language).unwrap_or_default();
    Json(state.controller.create(language).into())
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, StatusCode> {
    respond(state.controller.get(id))
}

pub async fn delete_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> StatusCode {
    match state.controller.remove(id) {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(err) => status_for(err),
    }
}

/// Raw image upload; the request `Content-Type` is the file's mime type.
pub async fn upload_image(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SessionView>, StatusCode> {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    tracing::info!("📥 Upload for session {}: {:?}, {} bytes", id, content_type, body.len());
    respond(state.controller.upload(id, content_type, &body).await)
}

pub async fn update_options(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(update): Json<OptionUpdate>,
) -> Result<Json<SessionView>, StatusCode> {
    respond(state.controller.update_options(id, update))
}

pub async fn generate_image(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, StatusCode> {
    respond(state.controller.generate(id).await)
}

pub async fn adjust_settings(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, StatusCode> {
    respond(state.controller.adjust(id))
}

pub async fn generate_caption(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<CaptionBody>,
) -> Result<Json<SessionView>, StatusCode> {
    respond(state.controller.caption(id, body.post_type).await)
}

pub async fn reset_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, StatusCode> {
    respond(state.controller.reset(id))
}

pub async fn set_language(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<LanguageBody>,
) -> Result<Json<SessionView>, StatusCode> {
    respond(state.controller.set_language(id, body.language))
}

pub async fn toggle_language(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, StatusCode> {
    respond(state.controller.toggle_language(id))
}

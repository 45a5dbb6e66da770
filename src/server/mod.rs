//! HTTP surface.
//!
//! A thin axum router over the mapping engine; all routes follow the
//! plugin wire contract and report failures as `{"error": "<message>"}`.
//! Request bodies are capped at 1 MiB and query parameters at 1 KiB,
//! checked before anything is parsed.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::engine::cfg::valid_component;
use crate::engine::{parse_cfg, Direction, MapperError, MappingEngine, MappingOptions};

/// Maximum request body size in bytes.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;
/// Maximum length of a single query parameter value.
pub const MAX_PARAM_LEN: usize = 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MappingEngine>,
    pub config: Arc<Config>,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/query", post(cascade_query))
        .route("/response", post(cascade_response))
        .route("/{id}/query", post(list_query))
        .route("/{id}/response", post(list_response))
        .route("/", get(index_page))
        .route("/{id}", get(list_page))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

// =============================================================================
// Error payload
// =============================================================================

/// An error response: a status code plus the `{"error"}` payload.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<MapperError> for ApiError {
    fn from(err: MapperError) -> Self {
        let status = match err {
            // An unknown list is a deployment problem, not a caller one.
            MapperError::UnknownList(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MapperError::InvalidDirection(_)
            | MapperError::InvalidCfg(_)
            | MapperError::Input(_) => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// =============================================================================
// Parameters
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TransformParams {
    dir: Option<String>,
    #[serde(rename = "foundryA")]
    foundry_a: Option<String>,
    #[serde(rename = "layerA")]
    layer_a: Option<String>,
    #[serde(rename = "foundryB")]
    foundry_b: Option<String>,
    #[serde(rename = "layerB")]
    layer_b: Option<String>,
    #[serde(rename = "fieldA")]
    field_a: Option<String>,
    #[serde(rename = "fieldB")]
    field_b: Option<String>,
    rewrites: Option<bool>,
}

impl TransformParams {
    fn into_options(self) -> Result<MappingOptions, ApiError> {
        let direction = match self.dir.as_deref() {
            None | Some("") => Direction::AtoB,
            Some(dir) => Direction::parse(dir)
                .ok_or_else(|| ApiError::from(MapperError::InvalidDirection(dir.to_string())))?,
        };
        let mut options = MappingOptions::with_direction(direction);
        options.add_rewrites = self.rewrites.unwrap_or(false);
        for (name, value, slot) in [
            ("foundryA", self.foundry_a, &mut options.foundry_a),
            ("layerA", self.layer_a, &mut options.layer_a),
            ("foundryB", self.foundry_b, &mut options.foundry_b),
            ("layerB", self.layer_b, &mut options.layer_b),
            ("fieldA", self.field_a, &mut options.field_a),
            ("fieldB", self.field_b, &mut options.field_b),
        ] {
            if let Some(value) = value {
                check_param(name, &value)?;
                *slot = value.as_str().into();
            }
        }
        Ok(options)
    }
}

fn check_param(name: &str, value: &str) -> Result<(), ApiError> {
    if value.len() > MAX_PARAM_LEN {
        return Err(ApiError::bad_request(format!("parameter '{name}' too long")));
    }
    if !valid_component(value) {
        return Err(ApiError::bad_request(format!(
            "parameter '{name}' contains invalid characters"
        )));
    }
    Ok(())
}

fn check_id(id: &str) -> Result<(), ApiError> {
    if id.len() > MAX_PARAM_LEN || id.is_empty() || !valid_component(id) {
        return Err(ApiError::bad_request("invalid mapping list ID"));
    }
    Ok(())
}

fn parse_body(body: &str) -> Result<Value, ApiError> {
    serde_json::from_str(body).map_err(|err| ApiError::bad_request(format!("invalid JSON: {err}")))
}

// =============================================================================
// Handlers
// =============================================================================

async fn health() -> &'static str {
    "OK"
}

async fn list_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<TransformParams>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    check_id(&id)?;
    let options = params.into_options()?;
    let input = parse_body(&body)?;
    Ok(Json(state.engine.map_query(&id, &options, input)?))
}

async fn list_response(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<TransformParams>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    check_id(&id)?;
    let options = params.into_options()?;
    let input = parse_body(&body)?;
    Ok(Json(state.engine.map_response(&id, &options, input)?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CascadeParams {
    cfg: Option<String>,
}

impl CascadeParams {
    fn steps(&self) -> Result<Vec<crate::engine::CascadeStep>, ApiError> {
        let cfg = self.cfg.as_deref().unwrap_or("");
        if cfg.len() > MAX_PARAM_LEN {
            return Err(ApiError::bad_request("parameter 'cfg' too long"));
        }
        Ok(parse_cfg(cfg)?)
    }
}

async fn cascade_query(
    State(state): State<AppState>,
    Query(params): Query<CascadeParams>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let steps = params.steps()?;
    let input = parse_body(&body)?;
    Ok(Json(state.engine.map_query_cascade(&steps, input)?))
}

async fn cascade_response(
    State(state): State<AppState>,
    Query(params): Query<CascadeParams>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let steps = params.steps()?;
    let input = parse_body(&body)?;
    Ok(Json(state.engine.map_response_cascade(&steps, input)?))
}

// =============================================================================
// Plugin pages
// =============================================================================

async fn index_page(State(state): State<AppState>) -> Html<String> {
    let rows: String = state
        .engine
        .lists()
        .map(|list| {
            format!(
                "<li><a href=\"/{id}\">{id}</a> - {desc}</li>",
                id = list.id,
                desc = escape(&list.description)
            )
        })
        .collect();
    Html(page(
        &state.config,
        "Koral-Mapper",
        &format!("<ul>{rows}</ul>"),
    ))
}

async fn list_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    check_id(&id)?;
    let list = state.engine.list(&id)?;
    let body = format!(
        "<h2>{id}</h2><p>{desc}</p><p>{rules} rules</p>",
        id = list.id,
        desc = escape(&list.description),
        rules = list.rules.len()
    );
    Ok(Html(page(&state.config, &list.id, &body)))
}

fn page(config: &Config, title: &str, body: &str) -> String {
    let stylesheet = config
        .stylesheet
        .as_deref()
        .map(|href| format!("<link rel=\"stylesheet\" href=\"{href}\">"))
        .unwrap_or_default();
    let sdk = config
        .sdk
        .as_deref()
        .map(|src| format!("<script src=\"{src}\" data-server=\"{server}\"></script>",
            server = config.server.as_deref().unwrap_or("")))
        .unwrap_or_default();
    let service = config.service_url.as_deref().unwrap_or("");
    let cookie = config.cookie_name.as_deref().unwrap_or("");
    format!(
        "<!DOCTYPE html><html><head><title>{title}</title>{stylesheet}</head>\
         <body data-service-url=\"{service}\" data-cookie-name=\"{cookie}\">\
         <h1>{title}</h1>{body}{sdk}</body></html>"
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

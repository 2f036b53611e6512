//! HTTP API layer mapping verbs and paths onto document store operations.
//!
//! Handlers own the HTTP concerns: status codes, headers and the shape of
//! the JSON bodies. Everything else is decided by the store.

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use cms_hub_core::auth::{CredentialStore, Hs256Tokens, Principal, TokenVerifier};
use cms_hub_core::storage::{DocumentKind, DocumentStore, HistoryEntry, Notices, StoreError};

/// Principal extracted from the `Authorization: Bearer` header.
///
/// A missing or invalid token is not rejected here; the request proceeds as
/// anonymous and the store refuses whatever requires signing in.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub principal: Principal,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(|token| state.tokens.verify(token))
            .map(|claims| claims.principal())
            .unwrap_or(Principal::Anonymous);
        Ok(Self { principal })
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<DocumentStore>>,
    pub credentials: Arc<CredentialStore>,
    pub tokens: Arc<Hs256Tokens>,
}

/// Store failure rendered as a status code and `{ "error": ... }` body.
pub struct ApiError(StatusCode, String);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidName(_)
            | StoreError::InvalidContent(_)
            | StoreError::ExtensionMismatch { .. }
            | StoreError::NotEditable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::AlreadyExists(_) => StatusCode::CONFLICT,
            StoreError::Unauthorized => StatusCode::UNAUTHORIZED,
            StoreError::HistoryKeyCollision { .. }
            | StoreError::Corrupt(_)
            | StoreError::Storage(_) => {
                error!(%err, "storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorBody { error: self.1 })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Serialize, Deserialize)]
struct CreateRequest {
    name: String,
    #[serde(default)]
    content: String,
}

#[derive(Serialize, Deserialize)]
struct UpdateRequest {
    new_name: Option<String>,
    content: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct DocResponse {
    name: String,
    kind: DocumentKind,
    content: String,
}

#[derive(Serialize, Deserialize)]
struct ListResponse {
    documents: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct ChangeResponse {
    name: String,
    notices: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct CredentialsRequest {
    username: String,
    password: String,
}

#[derive(Serialize, Deserialize)]
struct TokenResponse {
    token: String,
    notices: Vec<String>,
}

pub fn router(
    store: Arc<RwLock<DocumentStore>>,
    credentials: Arc<CredentialStore>,
    tokens: Arc<Hs256Tokens>,
) -> Router {
    let app_state = AppState {
        store,
        credentials,
        tokens,
    };
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/docs", get(list_docs).post(create_doc))
        .route(
            "/docs/{name}",
            get(get_doc).put(update_doc).delete(delete_doc),
        )
        .route("/docs/{name}/duplicate", post(duplicate_doc))
        .route("/docs/{name}/versions", get(list_versions))
        .route("/docs/{name}/versions/{timestamp}", get(get_version))
        .route("/uploads/{name}", put(upload_doc))
        .route("/users/signup", post(sign_up))
        .route("/users/signin", post(sign_in))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn list_docs(State(state): State<AppState>) -> ApiResult<Json<ListResponse>> {
    let store = state.store.read().await;
    Ok(Json(ListResponse {
        documents: store.list()?,
    }))
}

async fn create_doc(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateRequest>,
) -> ApiResult<(StatusCode, Json<ChangeResponse>)> {
    let mut notices = Notices::new();
    let mut store = state.store.write().await;
    store.create(&auth.principal, &req.name, &req.content, &mut notices)?;
    let name = store.read(&req.name)?.name().to_string();
    Ok((
        StatusCode::CREATED,
        Json(ChangeResponse {
            name,
            notices: notices.into_vec(),
        }),
    ))
}

/// Text comes back as JSON; images are served raw with their MIME type.
async fn get_doc(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let store = state.store.read().await;
    let doc = store.read(&name)?;
    if doc.kind() == DocumentKind::Image {
        let mime = DocumentKind::mime_for(doc.name());
        return Ok(([(header::CONTENT_TYPE, mime)], doc.into_content()).into_response());
    }
    let content = doc
        .text()
        .ok_or_else(|| StoreError::InvalidContent(doc.name().to_string()))?
        .to_string();
    Ok(Json(DocResponse {
        name: doc.name().to_string(),
        kind: doc.kind(),
        content,
    })
    .into_response())
}

async fn update_doc(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(name): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> ApiResult<Json<ChangeResponse>> {
    let mut notices = Notices::new();
    let mut store = state.store.write().await;
    let name = store.update(
        &auth.principal,
        &name,
        req.new_name.as_deref(),
        req.content.as_deref(),
        &mut notices,
    )?;
    Ok(Json(ChangeResponse {
        name,
        notices: notices.into_vec(),
    }))
}

async fn delete_doc(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(name): Path<String>,
) -> ApiResult<Json<ChangeResponse>> {
    let mut notices = Notices::new();
    let mut store = state.store.write().await;
    store.delete(&auth.principal, &name, &mut notices)?;
    Ok(Json(ChangeResponse {
        name,
        notices: notices.into_vec(),
    }))
}

async fn duplicate_doc(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(name): Path<String>,
) -> ApiResult<(StatusCode, Json<ChangeResponse>)> {
    let mut notices = Notices::new();
    let mut store = state.store.write().await;
    let name = store.duplicate(&auth.principal, &name, &mut notices)?;
    Ok((
        StatusCode::CREATED,
        Json(ChangeResponse {
            name,
            notices: notices.into_vec(),
        }),
    ))
}

async fn upload_doc(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ChangeResponse>)> {
    let mut notices = Notices::new();
    let mut store = state.store.write().await;
    store.upload(&auth.principal, &name, &body, &mut notices)?;
    let name = store.read(&name)?.name().to_string();
    Ok((
        StatusCode::CREATED,
        Json(ChangeResponse {
            name,
            notices: notices.into_vec(),
        }),
    ))
}

async fn list_versions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    // Listing may seed a missing placeholder, which writes the sidecar.
    let store = state.store.write().await;
    Ok(Json(store.list_versions(&name)?))
}

async fn get_version(
    State(state): State<AppState>,
    Path((name, timestamp)): Path<(String, String)>,
) -> ApiResult<Json<HistoryEntry>> {
    let store = state.store.read().await;
    Ok(Json(store.read_version(&name, &timestamp)?))
}

async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let credentials = state.credentials.clone();
    let username = req.username.trim().to_string();
    let result = tokio::task::spawn_blocking({
        let username = username.clone();
        move || credentials.sign_up(&username, &req.password)
    })
    .await
    .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if let Err(e) = result {
        return Err(ApiError(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()));
    }
    let token = state
        .tokens
        .issue(&username)
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    info!(%username, "signed up");
    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            token,
            notices: vec![format!("Welcome, {}.", username)],
        }),
    ))
}

async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let credentials = state.credentials.clone();
    let username = req.username.clone();
    let principal = tokio::task::spawn_blocking(move || {
        credentials.sign_in(&req.username, &req.password)
    })
    .await
    .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let Some(principal) = principal else {
        return Err(ApiError(
            StatusCode::UNAUTHORIZED,
            "Invalid credentials.".to_string(),
        ));
    };
    let token = state
        .tokens
        .issue(principal.username().unwrap_or(&username))
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(TokenResponse {
        token,
        notices: vec!["Welcome!".to_string()],
    }))
}

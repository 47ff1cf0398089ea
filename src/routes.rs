use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    error::ApiError,
    layout::{LayoutStyle, Orientation, TextDisplay},
    models::{AnalyzeTextRequest, AnalyzeTextResponse, GenerateImageRequest, GenerateImageResponse, ImageData},
    pdf::generate_pdf,
    render::RenderedPage,
    together::{GatewayError, TogetherClient},
    wizard::{analyze_upload, InputMode, LayoutOptions, NextJob, PageLayoutOptions, Progress, Wizard, WizardError, WizardStep},
};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, Wizard>>>,
    pub together: Arc<TogetherClient>,
}

impl AppState {
    pub fn new(together: TogetherClient) -> Self {
        Self { sessions: Arc::default(), together: Arc::new(together) }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/analyze-text", post(analyze_text))
        .route("/api/generate-image", post(generate_image))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/mode", post(set_mode))
        .route("/api/sessions/:id/prompt", post(submit_prompt))
        .route("/api/sessions/:id/upload", post(submit_upload))
        .route("/api/sessions/:id/back", post(back))
        .route("/api/sessions/:id/continue", post(continue_to_layout))
        .route("/api/sessions/:id/layout", put(update_layout))
        .route("/api/sessions/:id/preview", post(confirm_layout))
        .route("/api/sessions/:id/pages/:page_id/edit", post(start_editing))
        .route("/api/sessions/:id/edit/apply", post(apply_edit))
        .route("/api/sessions/:id/edit/cancel", post(cancel_edit))
        .route("/api/sessions/:id/generate", post(start_generation))
        .route("/api/sessions/:id/generate/next", post(generate_next))
        .route("/api/sessions/:id/pages/:page_id/images/:slot/regenerate", post(regenerate_image))
        .route("/api/sessions/:id/pdf", get(export_pdf))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

// --- Gateways ---

fn non_empty_str(value: &Option<Value>) -> Option<&str> {
    value.as_ref().and_then(Value::as_str).filter(|s| !s.is_empty())
}

pub async fn analyze_text(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeTextRequest>, JsonRejection>,
) -> Result<Json<AnalyzeTextResponse>, ApiError> {
    if !state.together.is_configured() {
        return Err(GatewayError::Configuration.into());
    }
    let Ok(Json(body)) = body else {
        return Err(ApiError::internal("Failed to analyze text"));
    };
    let text = non_empty_str(&body.text).ok_or_else(|| ApiError::bad_request("Invalid text provided"))?;

    match state.together.analyze_text(text).await {
        Ok(outcome) => Ok(Json(AnalyzeTextResponse {
            analysis: outcome.analysis,
            saved_to_file: outcome.saved_to_file.display().to_string(),
        })),
        Err(e @ (GatewayError::Configuration | GatewayError::Validation(_))) => Err(e.into()),
        Err(e) => {
            error!("❌ Error in analyze-text route: {}", e);
            Err(ApiError::internal("Failed to analyze text"))
        }
    }
}

pub async fn generate_image(
    State(state): State<AppState>,
    body: Result<Json<GenerateImageRequest>, JsonRejection>,
) -> Result<Json<GenerateImageResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::internal(rejection.body_text()))?;
    if !state.together.is_configured() {
        return Err(GatewayError::Configuration.into());
    }
    let prompt = non_empty_str(&body.prompt).ok_or_else(|| ApiError::bad_request("Invalid prompt provided"))?;

    let image = state.together.generate_image(prompt).await?;
    Ok(Json(GenerateImageResponse {
        data: vec![ImageData { b64_json: image.b64_json }],
        saved_to_file: image.saved_to_file.display().to_string(),
    }))
}

// --- Wizard sessions ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub step_number: u8,
    pub state: WizardStep,
    pub rendered_pages: Vec<RenderedPage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
}

impl SessionView {
    fn of(id: Uuid, wizard: &Wizard) -> Self {
        Self {
            id,
            step_number: wizard.step().number(),
            state: wizard.step().clone(),
            rendered_pages: wizard.rendered_pages(),
            progress: None,
        }
    }
}

fn with_wizard<T>(state: &AppState, id: Uuid, f: impl FnOnce(&mut Wizard) -> Result<T, WizardError>) -> Result<T, ApiError> {
    let mut sessions = state.sessions.write();
    let wizard = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
    Ok(f(wizard)?)
}

fn session_not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("Session {id} not found"))
}

fn view(state: &AppState, id: Uuid, progress: Option<Progress>) -> Result<Json<SessionView>, ApiError> {
    let sessions = state.sessions.read();
    let wizard = sessions.get(&id).ok_or_else(|| session_not_found(id))?;
    Ok(Json(SessionView { progress, ..SessionView::of(id, wizard) }))
}

fn with_session(state: &AppState, id: Uuid, f: impl FnOnce(&mut Wizard) -> Result<(), WizardError>) -> Result<Json<SessionView>, ApiError> {
    with_wizard(state, id, f)?;
    view(state, id, None)
}

enum ImageStep {
    Next,
    Regenerate { page: usize, slot: usize },
}

/// The session lock is held only to hand out the job and to fold its result
/// back in; while the upstream call runs the view shows `loading`.
/// The call runs on its own task so a client that goes away mid-request
/// still gets its result recorded.
async fn run_image_step(state: &AppState, id: Uuid, step: ImageStep) -> Result<Json<SessionView>, ApiError> {
    let job = match step {
        ImageStep::Next => match with_wizard(state, id, Wizard::next_job)? {
            NextJob::Complete => return view(state, id, Some(Progress::Complete)),
            NextJob::AdvancedPage { page } => return view(state, id, Some(Progress::AdvancedPage { page })),
            NextJob::Request(job) => job,
        },
        ImageStep::Regenerate { page, slot } => with_wizard(state, id, |w| w.regenerate_job(page, slot))?,
    };
    info!("🎯 Session {} {:?} request for page {} image {}", id, job.kind, job.page + 1, job.slot + 1);

    let task_state = state.clone();
    let progress = tokio::spawn(async move {
        let result = task_state.together.generate_image(&job.prompt).await;
        with_wizard(&task_state, id, |w| w.finish_job(&job, result))
    })
    .await
    .map_err(|e| ApiError::internal(format!("Image job aborted: {e}")))??;

    if let Some(cursor) = with_wizard(state, id, |w| Ok(w.cursor()))? {
        debug!("Session {} cursor at page {} image {} (complete: {})", id, cursor.page, cursor.image, cursor.complete);
    }
    view(state, id, Some(progress))
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: InputMode,
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEditRequest {
    pub style: LayoutStyle,
    pub images_per_page: usize,
    #[serde(default)]
    pub text_display: TextDisplay,
    #[serde(default)]
    pub orientation: Option<Orientation>,
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let id = Uuid::new_v4();
    let wizard = Wizard::new();
    let view = SessionView::of(id, &wizard);
    state.sessions.write().insert(id, wizard);
    info!("🚀 Created wizard session {}", id);
    (StatusCode::CREATED, Json(view))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    view(&state, id, None)
}

pub async fn delete_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.sessions.write().remove(&id).ok_or_else(|| session_not_found(id))?;
    info!("🗑️ Deleted wizard session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_mode(Path(id): Path<Uuid>, State(state): State<AppState>, Json(body): Json<ModeRequest>) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, |w| w.set_mode(body.mode))
}

pub async fn submit_prompt(Path(id): Path<Uuid>, State(state): State<AppState>, Json(body): Json<PromptRequest>) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, |w| w.submit_prompt(&body.topic, &mut rand::thread_rng()))
}

pub async fn submit_upload(Path(id): Path<Uuid>, State(state): State<AppState>, Json(body): Json<UploadRequest>) -> Result<Json<SessionView>, ApiError> {
    let text = with_wizard(&state, id, |w| w.prepare_upload(&body.text))?;
    info!("📄 Analyzing uploaded text ({} chars) for session {}", text.len(), id);
    let document = analyze_upload(&text, &*state.together).await;
    with_session(&state, id, |w| w.accept_document(document))
}

pub async fn back(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, Wizard::back)
}

pub async fn continue_to_layout(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, Wizard::continue_to_layout)
}

pub async fn update_layout(Path(id): Path<Uuid>, State(state): State<AppState>, Json(body): Json<LayoutOptions>) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, |w| w.update_layout_options(body))
}

pub async fn confirm_layout(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, Wizard::confirm_layout)
}

pub async fn start_editing(Path((id, page_id)): Path<(Uuid, usize)>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, |w| w.start_editing(page_id))
}

pub async fn apply_edit(Path(id): Path<Uuid>, State(state): State<AppState>, Json(body): Json<PageEditRequest>) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, |w| {
        let current = w.editor().map(|e| e.options.orientation).unwrap_or_default();
        w.apply_edit(PageLayoutOptions {
            layout: body.style,
            images_per_page: body.images_per_page,
            text_display: body.text_display,
            orientation: body.orientation.unwrap_or(current),
        })
    })
}

pub async fn cancel_edit(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, Wizard::cancel_edit)
}

pub async fn start_generation(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, Wizard::start_generation)
}

pub async fn generate_next(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    run_image_step(&state, id, ImageStep::Next).await
}

pub async fn regenerate_image(
    Path((id, page, slot)): Path<(Uuid, usize, usize)>,
    State(state): State<AppState>,
) -> Result<Json<SessionView>, ApiError> {
    run_image_step(&state, id, ImageStep::Regenerate { page, slot }).await
}

pub async fn export_pdf(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Response, ApiError> {
    let pages = with_wizard(&state, id, |w| w.printable_pages().map(<[_]>::to_vec))?;
    let pdf_bytes = generate_pdf(&pages)?;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"document_{id}.pdf\""))
        .map_err(|e| ApiError::internal(e.to_string()))?;
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok((StatusCode::OK, headers, pdf_bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ScratchDir;
    use axum::{body::Body, http::Request};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tower::ServiceExt;

    /// Serves `upstream` on an ephemeral port and returns its base URL.
    async fn spawn_upstream(upstream: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, upstream).await.unwrap() });
        format!("http://{addr}")
    }

    fn app(key: Option<&str>, base: &str) -> Router {
        let scratch = ScratchDir::new(std::env::temp_dir().join(format!("illustrated-docs-routes-{}", Uuid::new_v4())));
        let client = TogetherClient::new(key.map(String::from), base, scratch).with_seed(1);
        router(AppState::new(client))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = send_raw(app, method, uri, body.map(|b| b.to_string())).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn send_raw(app: &Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn images_upstream(status: StatusCode, body: Value) -> Router {
        Router::new().route("/images/generation", post(move || async move { (status, Json(body)) }))
    }

    fn completion_upstream(status: StatusCode, text: &'static str) -> Router {
        Router::new().route(
            "/completions",
            post(move || async move { (status, Json(json!({ "choices": [{ "text": text }] }))) }),
        )
    }

    #[tokio::test]
    async fn analyze_rejects_empty_text() {
        let app = app(Some("key"), "http://127.0.0.1:9");
        let (status, body) = send(&app, "POST", "/api/analyze-text", Some(json!({ "text": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid text provided" }));

        let (status, _) = send(&app, "POST", "/api/analyze-text", Some(json!({ "text": 12 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analyze_requires_key() {
        let app = app(None, "http://127.0.0.1:9");
        let (status, body) = send(&app, "POST", "/api/analyze-text", Some(json!({ "text": "hello" }))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Together API key not configured" }));
    }

    #[tokio::test]
    async fn analyze_normalizes_completion() {
        let base = spawn_upstream(completion_upstream(
            StatusCode::OK,
            r##"{"enhancedText": "# Notes", "recommendedStyle": "classic", "recommendedOrientation": "landscape"}"##,
        ))
        .await;
        let app = app(Some("key"), &base);
        let (status, body) = send(&app, "POST", "/api/analyze-text", Some(json!({ "text": "notes" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enhancedText"], "# Notes");
        assert_eq!(body["imagePrompts"].as_array().unwrap().len(), 3);
        assert_eq!(body["recommendedStyle"], "classic");
        assert_eq!(body["recommendedImagesPerPage"], 1);
        assert_eq!(body["recommendedOrientation"], "landscape");
        assert!(body["savedToFile"].as_str().unwrap().ends_with(".md"));
    }

    #[tokio::test]
    async fn analyze_hides_upstream_failures() {
        let base = spawn_upstream(completion_upstream(StatusCode::BAD_GATEWAY, "")).await;
        let app = app(Some("key"), &base);
        let (status, body) = send(&app, "POST", "/api/analyze-text", Some(json!({ "text": "notes" }))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Failed to analyze text" }));
    }

    #[tokio::test]
    async fn generate_image_rejects_empty_output() {
        let base = spawn_upstream(images_upstream(StatusCode::OK, json!({ "output": [] }))).await;
        let app = app(Some("key"), &base);
        let (status, body) = send(&app, "POST", "/api/generate-image", Some(json!({ "prompt": "a heron" }))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Invalid response format from Together API" }));
    }

    #[tokio::test]
    async fn generate_image_forwards_upstream_status() {
        let base = spawn_upstream(images_upstream(StatusCode::TOO_MANY_REQUESTS, json!({ "error": "quota exceeded" }))).await;
        let app = app(Some("key"), &base);
        let (status, body) = send(&app, "POST", "/api/generate-image", Some(json!({ "prompt": "a heron" }))).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body, json!({ "error": "quota exceeded" }));
    }

    #[tokio::test]
    async fn generate_image_validates_input_and_key() {
        let app_with_key = app(Some("key"), "http://127.0.0.1:9");
        let (status, body) = send(&app_with_key, "POST", "/api/generate-image", Some(json!({}))).await;
        assert_eq!((status, body), (StatusCode::BAD_REQUEST, json!({ "error": "Invalid prompt provided" })));

        let app_without_key = app(None, "http://127.0.0.1:9");
        let (status, body) = send(&app_without_key, "POST", "/api/generate-image", Some(json!({ "prompt": "x" }))).await;
        assert_eq!((status, body), (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Together API key not configured" })));

        let (status, _) = send_raw(&app_with_key, "POST", "/api/generate-image", Some("{not json".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn generate_image_returns_b64() {
        let base = spawn_upstream(images_upstream(StatusCode::OK, json!({ "output": ["aGVsbG8="], "status": "succeeded" }))).await;
        let app = app(Some("key"), &base);
        let (status, body) = send(&app, "POST", "/api/generate-image", Some(json!({ "prompt": "a heron" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([{ "b64_json": "aGVsbG8=" }]));
        assert!(body["savedToFile"].as_str().unwrap().ends_with(".json"));
    }

    #[tokio::test]
    async fn wizard_session_end_to_end() {
        let base = spawn_upstream(images_upstream(StatusCode::OK, json!({ "output": ["aGVsbG8="] }))).await;
        let app = app(Some("key"), &base);

        let (status, created) = send(&app, "POST", "/api/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        let at = |path: &str| format!("/api/sessions/{id}{path}");

        let (status, body) = send(&app, "POST", &at("/continue"), None).await;
        assert_eq!(status, StatusCode::CONFLICT, "{body}");

        let (_, body) = send(&app, "POST", &at("/prompt"), Some(json!({ "topic": "coastal birds" }))).await;
        assert_eq!(body["stepNumber"], 2);
        send(&app, "POST", &at("/continue"), None).await;
        let layout = json!({ "orientation": "portrait", "totalPages": 3, "imagesPerPage": 2, "layoutStyle": "modern" });
        send(&app, "PUT", &at("/layout"), Some(layout)).await;
        let (_, body) = send(&app, "POST", &at("/preview"), None).await;
        assert_eq!(body["stepNumber"], 4);
        assert_eq!(body["renderedPages"].as_array().unwrap().len(), 3);

        send(&app, "POST", &at("/pages/1/edit"), None).await;
        let (_, body) = send(&app, "POST", &at("/edit/apply"), Some(json!({ "style": "minimal", "imagesPerPage": 1 }))).await;
        assert_eq!(body["state"]["pages"][1]["images"].as_array().unwrap().len(), 1);

        send(&app, "POST", &at("/generate"), None).await;
        let (status, _) = send_raw(&app, "GET", &at("/pdf"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let mut requests = 0;
        loop {
            let (status, body) = send(&app, "POST", &at("/generate/next"), None).await;
            assert_eq!(status, StatusCode::OK, "{body}");
            match body["progress"]["outcome"].as_str().unwrap() {
                "complete" => break,
                "generated" => requests += 1,
                _ => {}
            }
            assert!(requests <= 5);
        }
        assert_eq!(requests, 5);

        let (_, body) = send(&app, "POST", &at("/pages/0/images/1/regenerate"), None).await;
        assert_eq!(body["state"]["pages"][0]["images"][1]["url"], "data:image/png;base64,aGVsbG8=");

        let (status, pdf) = send_raw(&app, "GET", &at("/pdf"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(pdf.starts_with(b"%PDF"));
    }

    /// Walks a fresh session to Generate with one page of `images` slots.
    async fn session_in_generate(app: &Router, images: usize) -> String {
        let (_, created) = send(app, "POST", "/api/sessions", None).await;
        let id = created["id"].as_str().unwrap().to_string();
        send(app, "POST", &format!("/api/sessions/{id}/prompt"), Some(json!({ "topic": "tide pools" }))).await;
        send(app, "POST", &format!("/api/sessions/{id}/continue"), None).await;
        let layout = json!({ "orientation": "portrait", "totalPages": 1, "imagesPerPage": images, "layoutStyle": "classic" });
        send(app, "PUT", &format!("/api/sessions/{id}/layout"), Some(layout)).await;
        send(app, "POST", &format!("/api/sessions/{id}/preview"), None).await;
        let (status, body) = send(app, "POST", &format!("/api/sessions/{id}/generate"), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        id
    }

    #[tokio::test]
    async fn in_flight_image_is_visible_and_blocks_a_second_request() {
        let slow = Router::new().route(
            "/images/generation",
            post(|| async {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                Json(json!({ "output": ["aGVsbG8="] }))
            }),
        );
        let base = spawn_upstream(slow).await;
        let app = app(Some("key"), &base);
        let id = session_in_generate(&app, 2).await;
        let next = format!("/api/sessions/{id}/generate/next");

        let first = {
            let (app, next) = (app.clone(), next.clone());
            tokio::spawn(async move { send(&app, "POST", &next, None).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;

        let (status, body) = send(&app, "GET", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["cursor"]["loading"], true);
        assert_eq!(body["state"]["cursor"]["image"], 0);

        let (status, body) = send(&app, "POST", &next, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, json!({ "error": "An image request is already in progress" }));
        let (status, _) = send(&app, "POST", &format!("/api/sessions/{id}/pages/0/images/0/regenerate"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = first.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["progress"], json!({ "outcome": "generated", "page": 0, "slot": 0, "succeeded": true }));
        assert_eq!(body["state"]["cursor"]["loading"], false);
        assert_eq!(body["state"]["cursor"]["image"], 1);
    }

    #[tokio::test]
    async fn deleted_session_is_gone() {
        let app = app(None, "http://127.0.0.1:9");
        let (_, created) = send(&app, "POST", "/api/sessions", None).await;
        let uri = format!("/api/sessions/{}", created["id"].as_str().unwrap());

        let (status, _) = send_raw(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send_raw(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let app = app(None, "http://127.0.0.1:9");
        let (status, _) = send(&app, "GET", &format!("/api/sessions/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

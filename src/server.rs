use crate::{
    FrontendConfig, HttpQrApi, QrApi, QrFormController, QrFormError, QrFormPhase,
    page::{PageView, render_page},
};
use axum::{
    Form, Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, HeaderName, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{any, get},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Same-origin prefix rewritten to the backend origin.
pub const PROXY_PREFIX: &str = "/api/proxy/";

/// Shared state of the front-end routes.
///
/// Form state is not kept here: every page request builds its own
/// [`QrFormController`], so visitors never see each other's input or image.
pub struct AppState<A: QrApi> {
    pub api: Arc<A>,
    pub proxy: Option<BackendProxy>,
    in_flight: Arc<AtomicUsize>,
}

impl<A: QrApi> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            proxy: self.proxy.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<A: QrApi> AppState<A> {
    pub fn new(api: A) -> Self {
        Self {
            api: Arc::new(api),
            proxy: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_proxy(mut self, proxy: BackendProxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Number of form submissions currently waiting on the backend, across
    /// all visitors.
    pub fn outstanding(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn controller(&self) -> QrFormController<Arc<A>> {
        QrFormController::new(self.api.clone())
    }
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AppState<HttpQrApi> {
    pub fn from_config(config: &FrontendConfig) -> Self {
        let client = reqwest::Client::new();
        let state = Self::new(HttpQrApi::with_client(
            client.clone(),
            config.public_api_url.clone(),
        ));
        match &config.api_url {
            Some(origin) => state.with_proxy(BackendProxy::with_client(client, origin.clone())),
            None => state,
        }
    }
}

/// Forwards `/api/proxy/{path}` to `{origin}/{path}` unchanged.
#[derive(Clone, Debug)]
pub struct BackendProxy {
    client: reqwest::Client,
    origin: String,
}

impl BackendProxy {
    pub fn new(origin: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), origin)
    }

    pub fn with_client(client: reqwest::Client, origin: impl Into<String>) -> Self {
        let origin = origin.into().trim_end_matches('/').to_string();
        Self { client, origin }
    }

    /// Destination for a path already stripped of [`PROXY_PREFIX`].
    pub fn target(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) => format!("{}/{}?{}", self.origin, path, q),
            None => format!("{}/{}", self.origin, path),
        }
    }

    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response, reqwest::Error> {
        let target = self.target(path, query);
        log::debug!("Proxying {method} to {target}");

        let upstream = self
            .client
            .request(method, &target)
            .headers(forwardable(headers))
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let headers = forwardable(upstream.headers());
        let bytes = upstream.bytes().await?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

// Hop-by-hop headers plus the ones the client recomputes.
fn is_skipped(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "host"
            | "content-length"
    )
}

fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_skipped(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    pub url: String,
}

/// Aggregate submission activity. Carries no per-visitor data.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub outstanding: usize,
    pub busy: bool,
    pub status: &'static str,
}

async fn get_index() -> Html<String> {
    Html(render_page(&PageView::default()))
}

async fn post_index<A: QrApi>(
    State(state): State<AppState<A>>,
    Form(form): Form<SubmitForm>,
) -> impl IntoResponse {
    let controller = state.controller();
    controller.set_input(form.url);

    let _in_flight = InFlight::enter(&state.in_flight);
    match controller.submit_input().await {
        Ok(_) => (
            StatusCode::OK,
            Html(render_page(&PageView::new(controller.snapshot()))),
        ),
        Err(QrFormError::GenerationFailed) => (
            StatusCode::OK,
            Html(render_page(
                &PageView::new(controller.snapshot()).with_alert(),
            )),
        ),
        Err(e) => {
            log::debug!("Rejected form input: {e}");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(render_page(
                    &PageView::new(controller.snapshot()).with_validation(e.to_string()),
                )),
            )
        }
    }
}

async fn get_state<A: QrApi>(State(state): State<AppState<A>>) -> Json<StateResponse> {
    let outstanding = state.outstanding();
    let phase = if outstanding > 0 {
        QrFormPhase::Submitting
    } else {
        QrFormPhase::Idle
    };
    Json(StateResponse {
        outstanding,
        busy: outstanding > 0,
        status: phase.as_str(),
    })
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn proxy<A: QrApi>(
    State(state): State<AppState<A>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(proxy) = &state.proxy else {
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": "no backend configured for the proxy" })),
        )
            .into_response();
    };

    let path = uri.path().strip_prefix(PROXY_PREFIX).unwrap_or_default();
    match proxy.forward(method, path, uri.query(), &headers, body).await {
        Ok(response) => response,
        Err(e) => {
            log::warn!("Proxy request failed: {e}");
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

/// Builds the front-end router.
pub fn router<A: QrApi>(state: AppState<A>) -> Router {
    Router::new()
        .route("/", get(get_index).post(post_index::<A>))
        .route("/api/state", get(get_state::<A>))
        .route("/health", get(health))
        .route("/api/proxy/{*path}", any(proxy::<A>))
        .with_state(state)
}

/// Binds the configured address and serves the front-end until the process
/// is stopped.
pub async fn serve(config: &FrontendConfig) -> std::io::Result<()> {
    let app = router(AppState::from_config(config));

    log::info!("Submitting to: {}", config.public_api_url);
    match &config.api_url {
        Some(origin) => log::info!("Proxying {PROXY_PREFIX}* to: {origin}"),
        None => log::info!("Proxy disabled"),
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    log::info!("Listening on: {}", listener.local_addr()?);
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ApiError,
        page::{BUSY_LABEL, FAILURE_ALERT, SUBMIT_LABEL},
        tests::ScriptedApi,
    };
    use axum::{body::to_bytes, http::Request};
    use tokio::{net::TcpListener, sync::Semaphore};
    use tower::ServiceExt;

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn form_post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn index_renders_idle_form() {
        let app = router(AppState::new(ScriptedApi::new(vec![])));

        let response = app.oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains(&format!("<button type=\"submit\">{SUBMIT_LABEL}</button>")));
        assert!(!html.contains(&format!("disabled>{BUSY_LABEL}</button>")));
        assert!(!html.contains("alt=\"QR Code\""));
    }

    #[tokio::test]
    async fn submit_renders_generated_image() {
        let state = AppState::new(ScriptedApi::new(vec![ScriptedApi::image(
            "https://img/x.png",
        )]));
        let app = router(state.clone());

        let response = app
            .oneshot(form_post("url=https%3A%2F%2Fexample.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("<img src=\"https://img/x.png\" alt=\"QR Code\">"));
        assert!(!html.contains("alert("));
        assert_eq!(*state.api.calls.lock().unwrap(), vec!["https://example.com"]);
    }

    #[tokio::test]
    async fn failed_submit_raises_alert() {
        let state = AppState::new(ScriptedApi::new(vec![Err(ApiError::Status(500))]));
        let app = router(state.clone());

        let response = app
            .oneshot(form_post("url=https%3A%2F%2Fexample.com"))
            .await
            .unwrap();

        let html = body_text(response).await;
        assert!(html.contains(FAILURE_ALERT));
        assert!(!html.contains("alt=\"QR Code\""));
        assert_eq!(state.outstanding(), 0);
    }

    #[tokio::test]
    async fn empty_submit_is_rejected_without_request() {
        let state = AppState::new(ScriptedApi::new(vec![]));
        let app = router(state.clone());

        let response = app.oneshot(form_post("url=")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(response).await.contains("a target URL is required"));
        assert!(state.api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fresh_page_does_not_show_other_visitors_submission() {
        let state = AppState::new(ScriptedApi::new(vec![ScriptedApi::image(
            "https://img/secret.png",
        )]));

        let response = router(state.clone())
            .oneshot(form_post("url=https%3A%2F%2Fprivate.example%2Ftoken%3Dabc"))
            .await
            .unwrap();
        assert!(body_text(response).await.contains("https://img/secret.png"));

        let html = body_text(router(state).oneshot(get_request("/")).await.unwrap()).await;
        assert!(!html.contains("alt=\"QR Code\""));
        assert!(!html.contains("secret.png"));
        assert!(!html.contains("private.example"));
        assert!(html.contains("value=\"\""));
    }

    #[tokio::test]
    async fn concurrent_submissions_keep_their_own_urls() {
        let gate = Arc::new(Semaphore::new(0));
        let api = ScriptedApi::new(vec![
            ScriptedApi::image("https://img/a.png"),
            ScriptedApi::image("https://img/b.png"),
        ])
        .gated(gate.clone());
        let state = AppState::new(api);

        let first = tokio::spawn(
            router(state.clone()).oneshot(form_post("url=https%3A%2F%2Fa.example")),
        );
        state.api.started.notified().await;
        let second = tokio::spawn(
            router(state.clone()).oneshot(form_post("url=https%3A%2F%2Fb.example")),
        );
        state.api.started.notified().await;

        let in_flight = router(state.clone())
            .oneshot(get_request("/api/state"))
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_text(in_flight).await).unwrap();
        assert_eq!(
            body,
            json!({ "outstanding": 2, "busy": true, "status": "submitting" })
        );

        gate.add_permits(1);
        let first = body_text(first.await.unwrap().unwrap()).await;
        gate.add_permits(1);
        let second = body_text(second.await.unwrap().unwrap()).await;

        assert!(first.contains("value=\"https://a.example\""));
        assert!(first.contains("https://img/a.png"));
        assert!(second.contains("value=\"https://b.example\""));
        assert!(second.contains("https://img/b.png"));
        assert_eq!(
            *state.api.calls.lock().unwrap(),
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(state.outstanding(), 0);
    }

    #[tokio::test]
    async fn state_reports_idle_without_submissions() {
        let app = router(AppState::new(ScriptedApi::new(vec![])));

        let response = app.oneshot(get_request("/api/state")).await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();

        assert_eq!(body, json!({ "outstanding": 0, "busy": false, "status": "idle" }));
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = router(AppState::new(ScriptedApi::new(vec![])));
        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(body_text(response).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn proxy_without_origin_is_bad_gateway() {
        let app = router(AppState::new(ScriptedApi::new(vec![])));
        let response = app
            .oneshot(get_request("/api/proxy/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> impl IntoResponse {
        let content_type = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (
            StatusCode::CREATED,
            [("x-echo", "1")],
            Json(json!({
                "method": method.as_str(),
                "uri": uri.to_string(),
                "content_type": content_type,
                "body": body,
            })),
        )
    }

    #[tokio::test]
    async fn proxy_forwards_request_unchanged() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, Router::new().fallback(echo)).await;
        });

        let state = AppState::new(ScriptedApi::new(vec![]))
            .with_proxy(BackendProxy::new(format!("http://{addr}/")));
        let app = router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/api/proxy/generate-qr/?trace=1")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"url":"https://example.com"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-echo"], "1");
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(
            body,
            json!({
                "method": "POST",
                "uri": "/generate-qr/?trace=1",
                "content_type": "application/json",
                "body": r#"{"url":"https://example.com"}"#,
            })
        );
    }

    #[test]
    fn target_joins_origin_path_and_query() {
        let proxy = BackendProxy::new("http://backend:8000/");
        assert_eq!(proxy.target("health", None), "http://backend:8000/health");
        assert_eq!(
            proxy.target("a/b", Some("x=1")),
            "http://backend:8000/a/b?x=1"
        );
    }
}

use axum::extract::rejection::FormRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Form, Json, Router};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::metrics::SharedMetrics;
use crate::models::NewPaste;
use crate::store::PasteStore;
use crate::types::api::{PasteForm, PasteInfo, UploadPaste};
use crate::{ApiError, App};

/// The manual for the program in man page form.
const MAN_PAGE: &str = include_str!("../../assets/man.txt");

pub async fn run(app: App) -> anyhow::Result<()> {
    let addr = app.config.bind;
    let router = router(app);

    info!("listening on {addr}");

    axum::Server::bind(&addr)
        .serve(router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn router(app: App) -> Router {
    Router::new()
        .route("/", get(index).post(upload_paste))
        .route("/debug/vars", get(debug_vars))
        .route("/:id", get(get_paste))
        .route("/:id/info", get(get_paste_info))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(
            app.config.limits.max_upload_size,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn index() -> &'static str {
    MAN_PAGE
}

async fn debug_vars(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    Json(metrics.snapshot())
}

async fn get_paste(
    State(store): State<PasteStore>,
    State(metrics): State<SharedMetrics>,
    Path(id): Path<String>,
) -> crate::ApiResult<impl IntoResponse> {
    metrics.record_request();

    let Some(paste) = store.get(&id).await? else {
        metrics.record_web_not_found();
        return Err(ApiError::NotFound);
    };

    metrics.record_view();
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        paste.data,
    ))
}

async fn get_paste_info(
    State(store): State<PasteStore>,
    Path(id): Path<String>,
) -> crate::ApiResult<Json<PasteInfo>> {
    let paste = store.get(&id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(PasteInfo::from(&paste)))
}

async fn upload_paste(
    State(config): State<Config>,
    State(store): State<PasteStore>,
    State(metrics): State<SharedMetrics>,
    headers: HeaderMap,
    form: Result<Form<PasteForm>, FormRejection>,
) -> crate::ApiResult<impl IntoResponse> {
    metrics.record_request();

    let owner = headers
        .get(config.auth.user_header.as_str())
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::MissingUser)?
        .to_owned();

    let Form(form) = form?;
    if form.paste.is_empty() {
        return Err(ApiError::MissingPaste);
    }

    let paste = NewPaste {
        title: form.title,
        syntax: form.syntax,
        ..NewPaste::new(form.paste)
    };
    let id = store.put(&paste, &owner).await?;
    metrics.record_edit();

    let path = format!("/{id}");
    let url = format!(
        "{base_url}{path}",
        base_url = config.base_url.trim_end_matches('/')
    );

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, path)],
        Json(UploadPaste {
            id: id.to_string(),
            url,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    async fn test_app() -> App {
        let config: Config = r#"
            base_url = "https://paste.example.org/"

            [database]
            kind = "memory"

            [limits]
            max_upload_size = 1024
        "#
        .parse()
        .unwrap();
        App::new(config).await.unwrap()
    }

    fn submit(body: impl Into<String>, user: Option<&str>) -> Request<Body> {
        let body = body.into();
        let mut request = Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::CONTENT_LENGTH, body.len());
        if let Some(user) = user {
            request = request.header("x-remote-user", user);
        }
        request.body(Body::from(body)).unwrap()
    }

    fn fetch(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn upload_then_fetch() {
        let app = test_app().await;

        let response = router(app.clone())
            .oneshot(submit("paste=hello+world&title=&syntax=", Some("alice")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/uU0nuZN");
        let json = body_json(response).await;
        assert_eq!(json["id"], "uU0nuZN");
        assert_eq!(json["url"], "https://paste.example.org/uU0nuZN");

        let response = router(app.clone())
            .oneshot(fetch("/uU0nuZN"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], b"hello world");

        let response = router(app).oneshot(fetch("/uU0nuZN/info")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["owner"], "alice");
        assert_eq!(json["title"], serde_json::Value::Null);
        assert_eq!(json["size"], 11);
    }

    #[tokio::test]
    async fn upload_requires_user() {
        let app = test_app().await;
        let response = router(app)
            .oneshot(submit("paste=hello", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upload_requires_data() {
        let app = test_app().await;
        let response = router(app)
            .oneshot(submit("paste=&title=empty", Some("alice")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_paste_is_404() {
        let app = test_app().await;
        let response = router(app.clone())
            .oneshot(fetch("/nothing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let snapshot = app.metrics.snapshot();
        assert_eq!(snapshot.num_notfounds, 1);
        assert_eq!(snapshot.store_not_found, 1);
    }

    #[tokio::test]
    async fn debug_vars_reports_counters() {
        let app = test_app().await;
        router(app.clone())
            .oneshot(submit("paste=counted", Some("alice")))
            .await
            .unwrap();
        router(app.clone())
            .oneshot(fetch(&format!(
                "/{}",
                crate::store::PasteId::from_data(b"counted")
            )))
            .await
            .unwrap();

        let response = router(app).oneshot(fetch("/debug/vars")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["num-requests"], 2);
        assert_eq!(json["num-edits"], 1);
        assert_eq!(json["num-views"], 1);
        assert_eq!(json["store-found"], 1);
        assert_eq!(json["store-errors"]["timeout"], 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let app = test_app().await;
        let body = format!("paste={}", "x".repeat(4096));
        let response = router(app)
            .oneshot(submit(body, Some("alice")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 AgroLens Contributors

//! Web UI: route dispatch, upload handling, and template rendering

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use minijinja::{context, Environment};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::classifier::{Classifier, OllamaClassifier, Prediction};
use crate::config::AppConfig;
use crate::history::{ProgressEntry, ProgressHistory};
use crate::report::{format_confidence, generate_report};
use crate::storage::{allowed_file, unique_filename, StorageLayout, UploadedAsset};
use crate::{AgroLensError, Result};

/// A purely informational route: one template render, no business logic
struct StaticPage {
    path: &'static str,
    template: &'static str,
    title: &'static str,
}

const STATIC_PAGES: &[StaticPage] = &[
    StaticPage { path: "/", template: "reg.html", title: "Welcome" },
    StaticPage { path: "/home", template: "home.html", title: "Home" },
    StaticPage { path: "/pesticide", template: "pesticide.html", title: "Pesticides" },
    StaticPage { path: "/fertilizers", template: "fertilizers.html", title: "Fertilizers" },
    StaticPage { path: "/schemes", template: "schemes.html", title: "Schemes" },
    StaticPage { path: "/about", template: "about.html", title: "About" },
];

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    ("reg.html", include_str!("../../templates/reg.html")),
    ("home.html", include_str!("../../templates/home.html")),
    ("pesticide.html", include_str!("../../templates/pesticide.html")),
    ("fertilizers.html", include_str!("../../templates/fertilizers.html")),
    ("schemes.html", include_str!("../../templates/schemes.html")),
    ("about.html", include_str!("../../templates/about.html")),
    ("upload.html", include_str!("../../templates/upload.html")),
    ("result.html", include_str!("../../templates/result.html")),
    ("upload_progress.html", include_str!("../../templates/upload_progress.html")),
    ("history_progress.html", include_str!("../../templates/history_progress.html")),
];

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    pub layout: StorageLayout,
    pub classifier: Arc<dyn Classifier>,
    pub history: ProgressHistory,
    pub templates: Environment<'static>,
}

impl AppState {
    /// Build state with the configured Ollama classifier
    pub fn new(config: AppConfig) -> Result<Self> {
        let classifier = Arc::new(OllamaClassifier::new(&config.ai_engine)?);
        Self::with_classifier(config, classifier)
    }

    /// Build state with an injected classifier (used by tests)
    pub fn with_classifier(config: AppConfig, classifier: Arc<dyn Classifier>) -> Result<Self> {
        let layout = StorageLayout::new(&config.storage);
        layout.ensure()?;
        let history = ProgressHistory::new(config.storage.history_path.clone());
        let templates = build_environment()?;

        Ok(Self {
            config,
            layout,
            classifier,
            history,
            templates,
        })
    }
}

fn build_environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    for (name, source) in TEMPLATES {
        env.add_template(name, source)?;
    }
    Ok(env)
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();

    for page in STATIC_PAGES {
        let (template, title) = (page.template, page.title);
        router = router.route(
            page.path,
            get(move |State(state): State<Arc<AppState>>| async move {
                render(&state, template, context! { title => title })
            }),
        );
    }

    let body_limit = state.config.body_limit_bytes();
    let static_root = state.layout.static_root.clone();

    router
        .route("/upload", get(upload_form).post(upload_image))
        .route("/upload_progress", get(progress_form).post(upload_progress))
        .route("/history_progress", get(history_progress))
        .nest_service("/static", ServeDir::new(static_root))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Render a template with the shared environment
fn render(state: &AppState, name: &str, ctx: minijinja::Value) -> Result<Html<String>> {
    let template = state.templates.get_template(name)?;
    Ok(Html(template.render(ctx)?))
}

// === Upload pipeline ===

struct IncomingFile {
    filename: String,
    data: Bytes,
}

/// Pull the `file` field out of a multipart payload.
///
/// Mirrors the validation order of the upload contract: a missing field,
/// an empty filename, and a disallowed extension are separate errors.
async fn extract_file(multipart: &mut Multipart, config: &AppConfig) -> Result<IncomingFile> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AgroLensError::Validation(format!("Invalid multipart payload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(AgroLensError::Validation("No selected file".to_string()));
        }
        if !allowed_file(&filename, &config.uploads.allowed_extensions) {
            let ext = filename
                .rsplit_once('.')
                .map(|(_, e)| e)
                .unwrap_or(filename.as_str());
            return Err(AgroLensError::Validation(format!(
                "File type not allowed: {}",
                ext
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AgroLensError::Validation(format!("Failed to read upload: {}", e)))?;

        return Ok(IncomingFile { filename, data });
    }

    Err(AgroLensError::Validation("No file part".to_string()))
}

/// Classify with a request-level timeout; model latency is unbounded
async fn classify_with_timeout(state: &AppState, image: &Path) -> Result<Prediction> {
    let timeout = Duration::from_secs(state.config.ai_engine.timeout_secs);
    tokio::time::timeout(timeout, state.classifier.classify(image))
        .await
        .map_err(|_| AgroLensError::Prediction("inference timed out".to_string()))?
}

async fn upload_form(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    render(&state, "upload.html", context! { title => "Damage Assessment" })
}

async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response> {
    let file = extract_file(&mut multipart, &state.config).await?;

    let stored_name = unique_filename(&file.filename);
    let path = state.layout.store_upload(&stored_name, &file.data).await?;
    let asset = UploadedAsset::new(&file.filename, stored_name, path);
    info!("Stored upload {:?} as {}", asset.original_name, asset.stored_name);

    let prediction = classify_with_timeout(&state, &asset.path).await?;
    info!(
        "Prediction for {}: {} ({})",
        asset.stored_name,
        prediction.label,
        format_confidence(prediction.confidence)
    );

    let report_path = generate_report(&state.layout, &asset.stored_name, &prediction)?;
    let report_name = report_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AgroLensError::Pdf("report path has no filename".to_string()))?
        .to_string();

    let page = render(
        &state,
        "result.html",
        context! {
            title => "Assessment Result",
            label => prediction.label,
            confidence => format_confidence(prediction.confidence),
            image_url => format!("/static/uploads/{}", asset.stored_name),
            pdf_url => format!("/static/reports/{}", report_name),
        },
    )?;

    Ok(page.into_response())
}

// === Progress tracking ===

async fn progress_form(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    render(&state, "upload_progress.html", context! { title => "Track Progress" })
}

async fn upload_progress(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Redirect> {
    let file = extract_file(&mut multipart, &state.config).await?;

    let stored_name = unique_filename(&file.filename);
    state.layout.store_progress(&stored_name, &file.data).await?;

    let entry = ProgressEntry::new(
        stored_name.clone(),
        format!("/static/uploads_progress/{}", stored_name),
    );
    state.history.append(&entry)?;
    info!("Recorded progress upload {}", stored_name);

    Ok(Redirect::to("/history_progress"))
}

async fn history_progress(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    let entries = state.history.read_all()?;
    render(
        &state,
        "history_progress.html",
        context! {
            title => "Crop Progress History",
            entries => entries,
        },
    )
}

// === Server ===

/// Start the web server and serve until shutdown
pub async fn start_server(state: Arc<AppState>) -> Result<()> {
    let addr = format!("{}:{}", state.config.web.host, state.config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("AgroLens available at http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AgroLensError::Config(format!("Server error: {}", e)))?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

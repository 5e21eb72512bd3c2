use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{Response, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    serve, Json, Router,
};
use minijinja::Environment;
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, error, info, instrument};

use crate::completion::{CompletionClient, CompletionError};
use crate::constants::{GENERIC_ERROR_MESSAGE, INVALID_QUESTION_MESSAGE, SYSTEM_PROMPT};
use crate::parser::{parse_assistant_response, ParsedResponse};

/// Widget script and stylesheet, resolved against the package rather than the working directory.
pub const STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("question is missing, empty or not a string")]
    InvalidQuestion,

    #[error(transparent)]
    Upstream(#[from] CompletionError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            GatewayError::InvalidQuestion => (StatusCode::BAD_REQUEST, INVALID_QUESTION_MESSAGE),
            GatewayError::Upstream(e) => {
                error!("Completion request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR_MESSAGE)
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<Environment<'static>>,
    completion: Arc<CompletionClient>,
}

impl AppState {
    pub fn new(completion: CompletionClient) -> Result<Self> {
        Ok(Self {
            templates: Arc::new(create_minijinja_env().context("Failed to initialize template engine")?),
            completion: Arc::new(completion),
        })
    }
}

fn create_minijinja_env() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.add_template("index.html", include_str!("../templates/index.html"))?;
    Ok(env)
}

/// Forwards one question upstream and parses the reply.
#[instrument(skip(completion))]
pub async fn answer_question(
    completion: &CompletionClient,
    question: &str,
) -> Result<ParsedResponse, CompletionError> {
    let assistant_message = completion.complete(SYSTEM_PROMPT, question).await?;
    debug!(%assistant_message, "Assistant message");

    let parsed = parse_assistant_response(&assistant_message);
    debug!(?parsed, "Parsed response");
    Ok(parsed)
}

/// Pulls a non-empty string `question` out of the request body.
fn extract_question(payload: Result<Json<Value>, JsonRejection>) -> Result<String, GatewayError> {
    let Json(body) = payload.map_err(|rejection| {
        debug!("Rejected request body: {}", rejection);
        GatewayError::InvalidQuestion
    })?;

    match body.get("question").and_then(Value::as_str) {
        Some(question) if !question.is_empty() => Ok(question.to_string()),
        _ => Err(GatewayError::InvalidQuestion),
    }
}

async fn ask_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ParsedResponse>, GatewayError> {
    let question = extract_question(payload)?;
    info!("Question received: {}", question);

    let parsed = answer_question(&state.completion, &question).await?;
    Ok(Json(parsed))
}

async fn index_handler(State(state): State<AppState>) -> axum::response::Response {
    render_index(&state.templates)
}

fn render_index(templates: &Environment<'static>) -> axum::response::Response {
    templates
        .get_template("index.html")
        .and_then(|tmpl| {
            let context = minijinja::context! {
                title => "MTG Assistant",
                heading => "Magic: The Gathering Assistant",
                placeholder => "Posez votre question...",
            };
            tmpl.render(context)
        })
        .map(|html| Html(html).into_response())
        .unwrap_or_else(|e| {
            error!("Failed to get or render template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
                .into_response()
        })
}

/// Builds the gateway router: widget page, static assets and the ask endpoint.
pub fn router(state: AppState) -> Router {
    let static_files_service = ServeDir::new(STATIC_DIR).not_found_service(tower::service_fn(|_| async {
        Ok::<_, std::convert::Infallible>({
            let mut response = Response::new(Body::from("Not Found"));
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        })
    }));

    Router::new()
        .route("/", get(index_handler))
        .route("/api/ask", post(ask_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_gateway(addr: SocketAddr, completion: CompletionClient) -> Result<()> {
    let app = router(AppState::new(completion)?);

    info!("Gateway listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Gateway server failed")?;

    Ok(())
}

//! HTTP surface: chat streaming, the shop listing and a health probe.

use crate::config::StreamFormat;
use crate::llm::{ChatMessage, TokenStream};
use crate::orchestrator::Orchestrator;
use crate::shop;
use crate::store::ProductCatalog;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Header announcing the data stream line protocol to the web client.
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";

/// Shared application state.
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub catalog: Arc<dyn ProductCatalog>,
    pub stream_format: StreamFormat,
}

impl AppState {
    pub fn new(
        orchestrator: Orchestrator,
        catalog: Arc<dyn ProductCatalog>,
        stream_format: StreamFormat,
    ) -> Self {
        Self {
            orchestrator,
            catalog,
            stream_format,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/shop", get(shop_listing))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the router on `listener` until the process is stopped.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ShopQuery {
    sort: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct ShopErrorResponse {
    message: String,
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: bool,
}

// === Handlers ===

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match state.orchestrator.retrieval().health_check().await {
        Ok(()) => true,
        Err(e) => {
            error!("Health check failed: {}", e);
            false
        }
    };
    Json(HealthResponse {
        status: "ok",
        database,
    })
}

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            error!("Rejected chat request body: {}", rejection);
            return internal_error();
        }
    };

    if req.messages.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "messages must not be empty".to_string(),
            }),
        )
            .into_response();
    }

    match state.orchestrator.respond(&req.messages).await {
        Ok(reply) => {
            info!("Streaming {} reply for {} question", reply.stage, reply.label);
            stream_response(reply.tokens, state.stream_format)
        }
        Err(e) => {
            error!("Chat request failed: {}", e);
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Internal server error".to_string(),
        }),
    )
        .into_response()
}

async fn shop_listing(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ShopQuery>,
) -> Response {
    let sort = query
        .sort
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "default".to_string());

    match shop::list_products(state.catalog.as_ref(), &sort).await {
        Ok(listing) => Json(listing).into_response(),
        Err(e) => {
            error!("Error fetching products: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ShopErrorResponse {
                    message: "Server error".to_string(),
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

// === Streaming ===

fn stream_response(tokens: TokenStream, format: StreamFormat) -> Response {
    let mut response = Response::new(Body::from_stream(encode_stream(tokens, format)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    if format == StreamFormat::Data {
        headers.insert(DATA_STREAM_HEADER, HeaderValue::from_static("v1"));
    }
    response
}

/// Frame one generated token.
pub fn token_frame(token: &str, format: StreamFormat) -> String {
    match format {
        StreamFormat::Text => token.to_string(),
        StreamFormat::Data => format!("0:{}\n", serde_json::Value::from(token)),
    }
}

fn error_frame(format: StreamFormat) -> Option<String> {
    match format {
        StreamFormat::Text => None,
        StreamFormat::Data => Some("3:\"An error occurred.\"\n".to_string()),
    }
}

fn finish_frame(format: StreamFormat) -> Option<String> {
    match format {
        StreamFormat::Text => None,
        StreamFormat::Data => Some("d:{\"finishReason\":\"stop\"}\n".to_string()),
    }
}

/// Encode a token stream as response body chunks.
///
/// A failed token ends the body: the data format writes an error line, the
/// text format just stops.
pub fn encode_stream(
    tokens: TokenStream,
    format: StreamFormat,
) -> impl Stream<Item = Result<String, Infallible>> + Send {
    stream::unfold(Some(tokens), move |state| async move {
        let mut tokens = state?;
        match tokens.next().await {
            Some(Ok(token)) => Some((Ok(token_frame(&token, format)), Some(tokens))),
            Some(Err(e)) => {
                error!("Response stream failed: {}", e);
                error_frame(format).map(|frame| (Ok(frame), None))
            }
            None => finish_frame(format).map(|frame| (Ok(frame), None)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ShopwrightError};

    fn tokens(items: Vec<Result<String>>) -> TokenStream {
        Box::pin(stream::iter(items))
    }

    async fn encoded(items: Vec<Result<String>>, format: StreamFormat) -> String {
        encode_stream(tokens(items), format)
            .map(|chunk| match chunk {
                Ok(text) => text,
                Err(never) => match never {},
            })
            .collect::<Vec<_>>()
            .await
            .concat()
    }

    #[test]
    fn test_token_frame_escapes() {
        assert_eq!(token_frame("Hi \"there\"\n", StreamFormat::Data), "0:\"Hi \\\"there\\\"\\n\"\n");
        assert_eq!(token_frame("raw", StreamFormat::Text), "raw");
    }

    #[tokio::test]
    async fn test_data_stream_framing() {
        let body = encoded(
            vec![Ok("Use ".to_string()), Ok("a sled.".to_string())],
            StreamFormat::Data,
        )
        .await;
        assert_eq!(body, "0:\"Use \"\n0:\"a sled.\"\nd:{\"finishReason\":\"stop\"}\n");
    }

    #[tokio::test]
    async fn test_text_stream_framing() {
        let body = encoded(
            vec![Ok("Use ".to_string()), Ok("a sled.".to_string())],
            StreamFormat::Text,
        )
        .await;
        assert_eq!(body, "Use a sled.");
    }

    #[tokio::test]
    async fn test_stream_error_ends_body() {
        let items = || {
            vec![
                Ok("partial".to_string()),
                Err(ShopwrightError::Timeout("deadline".to_string())),
                Ok("never sent".to_string()),
            ]
        };
        assert_eq!(
            encoded(items(), StreamFormat::Data).await,
            "0:\"partial\"\n3:\"An error occurred.\"\n"
        );
        assert_eq!(encoded(items(), StreamFormat::Text).await, "partial");
    }
}

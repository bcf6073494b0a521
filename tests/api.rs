//! End-to-end tests for the HTTP API against in-memory collaborators.

use async_trait::async_trait;
use futures::stream;
use shopwright::config::{PromptKind, Prompts, Settings, StreamFormat};
use shopwright::embedding::Embedder;
use shopwright::error::{Result, ShopwrightError};
use shopwright::llm::{CompletionRequest, LanguageModel, TokenStream};
use shopwright::orchestrator::Orchestrator;
use shopwright::server::{self, AppState};
use shopwright::store::{MemoryStore, Product, ProductCatalog, ProductOrder, TranscriptChunk};
use std::net::SocketAddr;
use std::sync::Arc;

/// Answers every classification with `label` and streams two tokens.
struct ScriptedModel {
    label: &'static str,
    fail_stream: bool,
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        Ok(self.label.to_string())
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream> {
        if self.fail_stream && request.kind == PromptKind::Answer {
            return Err(ShopwrightError::OpenAI("upstream unavailable".to_string()));
        }
        let tokens = match request.kind {
            PromptKind::Rewrite => vec!["crosscut sled"],
            _ => vec!["Square ", "the fence."],
        };
        Ok(Box::pin(stream::iter(
            tokens.into_iter().map(|t| Ok(t.to_string())),
        )))
    }
}

struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }

    fn model(&self) -> &str {
        "fixed"
    }
}

struct FailingCatalog;

#[async_trait]
impl ProductCatalog for FailingCatalog {
    async fn related_products(&self, _video_ids: &[String], _limit: usize) -> Result<Vec<Product>> {
        Err(ShopwrightError::Store("relation \"products\" does not exist".to_string()))
    }

    async fn list_products(&self, _order: ProductOrder) -> Result<Vec<Product>> {
        Err(ShopwrightError::Store("relation \"products\" does not exist".to_string()))
    }
}

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_chunk(
            vec![1.0, 0.0],
            TranscriptChunk {
                id: "vid1".to_string(),
                text: "[00:10]Square the fence to the blade.".to_string(),
                title: "Crosscut Sled".to_string(),
                url: "https://youtu.be/vid1".to_string(),
                chunk_index: 0,
                similarity_score: 0.0,
            },
        )
        .unwrap();
    for (id, tags) in [("p1", "Jigs,Sleds,vid1"), ("p2", "Clamps,vid2")] {
        store
            .insert_product(Product {
                id: id.to_string(),
                title: format!("Product {}", id),
                tags: tags.split(',').map(str::to_string).collect(),
                link: format!("https://shop.example/{}", id),
                video_id: tags.rsplit(',').next().unwrap().to_string(),
                image_data: None,
            })
            .unwrap();
    }
    store
}

async fn spawn(
    model: ScriptedModel,
    catalog: Arc<dyn ProductCatalog>,
    stream_format: StreamFormat,
) -> SocketAddr {
    let store = seeded_store();
    let orchestrator = Orchestrator::new(
        &Settings::default(),
        Prompts::default(),
        Arc::new(model),
        Arc::new(FixedEmbedder),
        store,
        catalog.clone(),
    );
    let state = Arc::new(AppState::new(orchestrator, catalog, stream_format));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server::serve(listener, state).await.unwrap();
    });
    addr
}

fn relevant() -> ScriptedModel {
    ScriptedModel {
        label: "RELEVANT",
        fail_stream: false,
    }
}

fn chat_body(question: &str) -> serde_json::Value {
    serde_json::json!({ "messages": [{ "role": "user", "content": question }] })
}

#[tokio::test]
async fn test_chat_streams_data_protocol() {
    let addr = spawn(relevant(), seeded_store(), StreamFormat::Data).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/chat", addr))
        .json(&chat_body("How do I square a sled?"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-vercel-ai-data-stream"], "v1");
    assert_eq!(
        response.text().await.unwrap(),
        "0:\"Square \"\n0:\"the fence.\"\nd:{\"finishReason\":\"stop\"}\n"
    );
}

#[tokio::test]
async fn test_chat_streams_plain_text() {
    let addr = spawn(relevant(), seeded_store(), StreamFormat::Text).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/chat", addr))
        .json(&chat_body("How do I square a sled?"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers().get("x-vercel-ai-data-stream").is_none());
    assert_eq!(response.text().await.unwrap(), "Square the fence.");
}

#[tokio::test]
async fn test_chat_survives_product_lookup_failure() {
    let addr = spawn(relevant(), Arc::new(FailingCatalog), StreamFormat::Text).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/chat", addr))
        .json(&chat_body("How do I square a sled?"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "Square the fence.");
}

#[tokio::test]
async fn test_chat_upstream_failure_is_generic_500() {
    let model = ScriptedModel {
        label: "RELEVANT",
        fail_stream: true,
    };
    let addr = spawn(model, seeded_store(), StreamFormat::Data).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/chat", addr))
        .json(&chat_body("How do I square a sled?"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "error": "Internal server error" }));
}

#[tokio::test]
async fn test_chat_rejects_empty_messages() {
    let addr = spawn(relevant(), seeded_store(), StreamFormat::Data).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/chat", addr))
        .json(&serde_json::json!({ "messages": [] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_chat_malformed_body_is_generic_500() {
    let addr = spawn(relevant(), seeded_store(), StreamFormat::Data).await;
    let client = reqwest::Client::new();

    let wrong_type = client
        .post(format!("http://{}/api/chat", addr))
        .json(&serde_json::json!({ "messages": "oops" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_type.status(), 500);
    let body: serde_json::Value = wrong_type.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "error": "Internal server error" }));

    let not_json = client
        .post(format!("http://{}/api/chat", addr))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(not_json.status(), 500);
    let body: serde_json::Value = not_json.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "error": "Internal server error" }));
}

#[tokio::test]
async fn test_shop_listing() {
    let addr = spawn(relevant(), seeded_store(), StreamFormat::Data).await;
    let client = reqwest::Client::new();

    let flat: serde_json::Value = client
        .get(format!("http://{}/api/shop", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(flat["sortOption"], "default");
    assert_eq!(flat["products"].as_array().unwrap().len(), 2);

    let grouped: serde_json::Value = client
        .get(format!("http://{}/api/shop?sort=video", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(grouped["sortOption"], "video");
    assert_eq!(grouped["groupedProducts"]["Jigs"][0]["id"], "p1");
    assert_eq!(grouped["groupedProducts"]["Sleds"][0]["groupTags"], serde_json::json!(["Jigs", "Sleds"]));
    assert_eq!(grouped["groupedProducts"]["Clamps"][0]["id"], "p2");
}

#[tokio::test]
async fn test_shop_failure_reports_server_error() {
    let addr = spawn(relevant(), Arc::new(FailingCatalog), StreamFormat::Data).await;

    let response = reqwest::get(format!("http://{}/api/shop?sort=video", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Server error");
    assert!(body["error"].as_str().unwrap().contains("does not exist"));
}

#[tokio::test]
async fn test_health() {
    let addr = spawn(relevant(), seeded_store(), StreamFormat::Data).await;

    let body: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, serde_json::json!({ "status": "ok", "database": true }));
}

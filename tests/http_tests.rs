use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use recipe_suggest::api_connection::{ModelClient, ModelError};
use recipe_suggest::recipe_generator::RecipeGenerator;
use recipe_suggest::recipe_parser::ValidationPolicy;
use recipe_suggest::server::{router, AppState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const SOUP_REPLY: &str = "```json\n{\"recipes\":[{\"title\":\"Tomato Soup\",\"description\":\"d\",\"prep\":\"10 min\",\"cook\":\"20 min\",\"servings\":2,\"ingredients\":[{\"name\":\"tomato\",\"amount\":3 pieces}],\"steps\":[\"Boil\",\"Blend\"],\"nutrition\":{\"calories\":200kcal},\"benefits\":[\"vitamin C\"]}]}\n```\nNote: enjoy!";

/// Replies with a fixed outcome and remembers every prompt it was given.
#[derive(Clone)]
struct StubModel {
    reply: Result<&'static str, &'static str>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl StubModel {
    fn replying(reply: &'static str) -> Self {
        Self {
            reply: Ok(reply),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn unreachable() -> Self {
        Self {
            reply: Err("http://localhost:11434"),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ModelClient for StubModel {
    async fn generate(&self, prompt: String) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt);
        self.reply
            .map(str::to_string)
            .map_err(|url| ModelError::ConnectionRefused(url.to_string()))
    }
}

fn app(model: StubModel) -> Router {
    router(AppState::new(RecipeGenerator::new(model, ValidationPolicy::Strict)))
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_generate_recipe_returns_collection() {
    let model = StubModel::replying(SOUP_REPLY);
    let prompts = Arc::clone(&model.prompts);

    let (status, body) = post_json(
        app(model),
        "/api/generate-recipe",
        json!({"ingredients": "tomatoes", "dietType": "vegan", "allergies": "nuts"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recipes"][0]["title"], "Tomato Soup");
    assert_eq!(body["recipes"][0]["servings"], "2");
    assert_eq!(body["recipes"][0]["ingredients"][0]["amount"], "3 pieces");
    assert_eq!(body["recipes"][0]["nutrition"]["calories"], "200 kcal");

    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Diet preference: vegan. Allergies to avoid: nuts."));
}

#[tokio::test]
async fn test_blank_ingredients_are_bad_request() {
    let model = StubModel::replying(SOUP_REPLY);
    let prompts = Arc::clone(&model.prompts);

    let (status, body) =
        post_json(app(model), "/api/generate-recipe", json!({"ingredients": "  "})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ingredients must not be empty");
    assert!(prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_model_failure_is_generic_500() {
    let (status, body) = post_json(
        app(StubModel::unreachable()),
        "/api/generate-recipe",
        json!({"ingredients": "rice"}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Recipe generation failed"}));
}

#[tokio::test]
async fn test_extraction_failure_is_generic_500() {
    let (status, body) = post_json(
        app(StubModel::replying("I'm not sure what to cook, sorry.")),
        "/api/generate-recipe",
        json!({"ingredients": "rice"}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Recipe generation failed"}));
}

#[tokio::test]
async fn test_health() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app(StubModel::replying(SOUP_REPLY))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
}

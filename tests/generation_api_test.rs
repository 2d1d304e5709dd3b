use std::path::Path;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as JsonValue};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use verbal_reasoning_backend::{
    config::GenerationSettings,
    routes,
    services::{
        ai_service::StaticCompletionSource,
        eval_service::EvaluatorRegistry,
        lexicon::PermissiveOracle,
        prompt_service::PromptLibrary,
        question_store::{InMemoryQuestionStore, StoredQuestion},
    },
    AppState,
};

async fn app(store: Arc<InMemoryQuestionStore>) -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://postgres@localhost/verbal_reasoning_unused")
        .expect("lazy pool");
    let prompts = PromptLibrary::load(&Path::new(env!("CARGO_MANIFEST_DIR")).join("prompts/prompts.toml"))
        .await
        .expect("bundled prompts");
    let state = AppState::assemble(
        pool,
        store,
        Arc::new(StaticCompletionSource::new()),
        prompts,
        Arc::new(PermissiveOracle),
        EvaluatorRegistry::native(),
        GenerationSettings::default(),
    );
    routes::router().with_state(state)
}

async fn send(app: Router, method: &str, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, json)
}

#[tokio::test]
async fn health_reports_completion_source() {
    let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
    let (status, body) = send(app(store).await, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["completion_source"], "static");
}

#[tokio::test]
async fn generates_per_topic_and_records_unknown_topics() {
    let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
    let (status, body) = send(
        app(store.clone()).await,
        "POST",
        "/api/llm/questions/generate",
        Some(json!({
            "question_types": ["Rule", "word ladders", "Synonyms"],
            "difficulty_level": "easy",
            "num_questions": 2
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);

    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["questions"].as_array().unwrap().len(), 2);
    assert_eq!(results[0]["questions"][0]["status"], "pending_review");
    assert_eq!(results[0]["questions"][0]["difficulty_level"], "Easy");

    assert_eq!(results[1]["success"], true);
    assert_eq!(results[1]["total_generated"], 2);

    assert_eq!(results[2]["success"], false);
    assert!(results[2]["error"]
        .as_str()
        .unwrap()
        .contains("Invalid question_type: 'Synonyms'"));

    let pending = store.pending();
    assert_eq!(pending.len(), 4);
    assert!(pending.iter().all(|q| q.is_llm_generated && q.difficulty_id == 1));
}

#[tokio::test]
async fn anagram_generation_rewrites_questions() {
    let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
    let (status, body) = send(
        app(store.clone()).await,
        "POST",
        "/api/llm/questions/generate",
        Some(json!({
            "question_types": ["Anagram"],
            "difficulty_level": "Easy",
            "num_questions": 3
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["success"], true);
    let pending = store.pending();
    assert_eq!(pending.len(), 3);
    for q in pending {
        assert_eq!(q.distractors.len(), 4);
        assert!(q.question_text.contains("Which of the following is the correct answer?"));
        assert_eq!(q.correct_answer, q.correct_answer.to_uppercase());
    }
}

#[tokio::test]
async fn existing_answers_are_reported_as_duplicates() {
    let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
    store.add_approved(StoredQuestion {
        id: 12,
        topic_id: 1,
        question_text: "An older rule question".into(),
        correct_answer: "NIB".into(),
    });

    let (status, body) = send(
        app(store).await,
        "POST",
        "/api/llm/questions/generate",
        Some(json!({
            "question_types": ["Rule"],
            "difficulty_level": "Easy",
            "num_questions": 1
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let result = &body["results"][0];
    assert_eq!(result["success"], true);
    let skipped = result["skipped"].as_array().unwrap();
    let duplicate = skipped
        .iter()
        .find(|s| s["status"] == "duplicate")
        .expect("duplicate verdict");
    assert_eq!(duplicate["existingQuestionId"], 12);
    assert!(duplicate["reason"]
        .as_str()
        .unwrap()
        .contains("approved question #12"));
}

#[tokio::test]
async fn unknown_difficulty_lists_available_levels() {
    let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
    let (status, body) = send(
        app(store).await,
        "POST",
        "/api/llm/questions/generate",
        Some(json!({
            "question_types": ["Rule"],
            "difficulty_level": "Impossible",
            "num_questions": 2
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("Invalid difficulty_level: 'Impossible'"));
    assert!(error.contains("'Easy', 'Medium', 'Hard'"));
}

#[tokio::test]
async fn rejects_out_of_range_counts_and_empty_topics() {
    let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
    let (status, body) = send(
        app(store.clone()).await,
        "POST",
        "/api/llm/questions/generate",
        Some(json!({
            "question_types": ["Rule"],
            "difficulty_level": "Easy",
            "num_questions": 21
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("between 1 and 20"));

    let (status, _) = send(
        app(store).await,
        "POST",
        "/api/llm/questions/generate",
        Some(json!({
            "question_types": [],
            "difficulty_level": "Easy",
            "num_questions": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_prompt_template_is_a_server_error() {
    let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
    let (status, body) = send(
        app(store.clone()).await,
        "POST",
        "/api/llm/questions/generate",
        Some(json!({
            "question_types": ["Rule"],
            "difficulty_level": "Hard",
            "num_questions": 2
        })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("No prompt template"));
    assert!(store.pending().is_empty());
}

#[tokio::test]
async fn invalid_pending_question_is_rejected_before_storage() {
    let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
    let (status, body) = send(
        app(store).await,
        "POST",
        "/api/pending-questions",
        Some(json!({
            "question_text": "",
            "correct_answer": "lame",
            "distractors": ["lane"],
            "topic_id": 4,
            "difficulty_id": 1,
            "explanation": "One letter at a time."
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("question_text"));
}

#[tokio::test]
async fn question_bank_create_validates_before_storage() {
    let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
    let (status, body) = send(
        app(store).await,
        "POST",
        "/api/questions",
        Some(json!({
            "question_text": "tap (pod) nod son (?) rib",
            "correct_answer": "",
            "distractors": "bin",
            "topic_id": 1,
            "difficulty_id": 1,
            "explanation": "Last letter then last two letters."
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("correct_answer"));
}

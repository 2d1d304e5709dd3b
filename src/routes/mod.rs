pub mod generation;
pub mod health;
pub mod pending_question;
pub mod question;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/llm/questions/generate",
            post(generation::generate_questions),
        )
        .route(
            "/api/pending-questions",
            get(pending_question::list_pending_questions)
                .post(pending_question::create_pending_question),
        )
        .route(
            "/api/pending-questions/bulk",
            post(pending_question::create_pending_questions_bulk),
        )
        .route(
            "/api/pending-questions/:id",
            get(pending_question::get_pending_question)
                .put(pending_question::update_pending_question)
                .delete(pending_question::delete_pending_question),
        )
        .route(
            "/api/pending-questions/:id/approve",
            post(pending_question::approve_pending_question),
        )
        .route(
            "/api/questions",
            get(question::list_questions).post(question::create_question),
        )
        .route("/api/questions/:id", get(question::get_question))
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::question_dto::{QuestionCreatedResponse, QuestionListQuery, QuestionPayload},
    error::Result,
    models::question::Question,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/questions",
    request_body = QuestionPayload,
    responses(
        (status = 201, description = "Question created", body = Json<QuestionCreatedResponse>),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Json(payload): Json<QuestionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let question_id = state.question_service.create(&payload.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(QuestionCreatedResponse {
            question_id,
            message: "Question created successfully".to_string(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/questions",
    params(
        ("topic_id" = Option<i64>, Query, description = "Filter by topic"),
        ("difficulty_id" = Option<i64>, Query, description = "Filter by difficulty"),
        ("limit" = Option<i64>, Query, description = "Page size, 1 to 100, default 10"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses(
        (status = 200, description = "Approved questions", body = Json<Vec<Question>>)
    )
)]
#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<QuestionListQuery>,
) -> Result<impl IntoResponse> {
    let questions = state.question_service.list(&query).await?;
    Ok(Json(questions))
}

#[utoipa::path(
    get,
    path = "/api/questions/{id}",
    params(
        ("id" = i64, Path, description = "Question ID")
    ),
    responses(
        (status = 200, description = "Question found", body = Json<Question>),
        (status = 404, description = "Question not found")
    )
)]
#[axum::debug_handler]
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let question = state.question_service.get(id).await?;
    Ok(Json(question))
}

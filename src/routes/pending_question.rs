use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::question_dto::{
        ApproveResponse, BulkCreateResponse, BulkPendingQuestionsPayload, CreatedResponse,
        QuestionPayload, QuestionListQuery,
    },
    error::Result,
    models::question::PendingQuestion,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/pending-questions",
    request_body = QuestionPayload,
    responses(
        (status = 201, description = "Pending question created", body = Json<CreatedResponse>),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn create_pending_question(
    State(state): State<AppState>,
    Json(payload): Json<QuestionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let created = state.pending_question_service.create(&payload.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            pending_question_id: created.pending_question_id,
            message: "Pending question created successfully".to_string(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/pending-questions/bulk",
    request_body = BulkPendingQuestionsPayload,
    responses(
        (status = 201, description = "Per-item creation report", body = Json<BulkCreateResponse>),
        (status = 400, description = "Questions must be an array")
    )
)]
#[axum::debug_handler]
pub async fn create_pending_questions_bulk(
    State(state): State<AppState>,
    Json(payload): Json<BulkPendingQuestionsPayload>,
) -> Result<impl IntoResponse> {
    let report = state
        .pending_question_service
        .create_bulk(payload.questions)
        .await;
    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    get,
    path = "/api/pending-questions",
    params(
        ("topic_id" = Option<i64>, Query, description = "Filter by topic"),
        ("difficulty_id" = Option<i64>, Query, description = "Filter by difficulty"),
        ("limit" = Option<i64>, Query, description = "Page size, 1 to 200"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses(
        (status = 200, description = "Pending questions", body = Json<Vec<PendingQuestion>>)
    )
)]
#[axum::debug_handler]
pub async fn list_pending_questions(
    State(state): State<AppState>,
    Query(query): Query<QuestionListQuery>,
) -> Result<impl IntoResponse> {
    let questions = state.pending_question_service.list(&query).await?;
    Ok(Json(questions))
}

#[utoipa::path(
    get,
    path = "/api/pending-questions/{id}",
    params(
        ("id" = i64, Path, description = "Pending question ID")
    ),
    responses(
        (status = 200, description = "Pending question found", body = Json<PendingQuestion>),
        (status = 404, description = "Pending question not found")
    )
)]
#[axum::debug_handler]
pub async fn get_pending_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let question = state.pending_question_service.get(id).await?;
    Ok(Json(question))
}

#[utoipa::path(
    put,
    path = "/api/pending-questions/{id}",
    params(
        ("id" = i64, Path, description = "Pending question ID")
    ),
    request_body = QuestionPayload,
    responses(
        (status = 200, description = "Pending question updated", body = Json<PendingQuestion>),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Pending question not found")
    )
)]
#[axum::debug_handler]
pub async fn update_pending_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<QuestionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let question = state
        .pending_question_service
        .update(id, &payload.into())
        .await?;
    Ok(Json(question))
}

#[utoipa::path(
    delete,
    path = "/api/pending-questions/{id}",
    params(
        ("id" = i64, Path, description = "Pending question ID")
    ),
    responses(
        (status = 204, description = "Pending question deleted"),
        (status = 404, description = "Pending question not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_pending_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.pending_question_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/pending-questions/{id}/approve",
    params(
        ("id" = i64, Path, description = "Pending question ID")
    ),
    responses(
        (status = 200, description = "Pending question moved to the question bank", body = Json<ApproveResponse>),
        (status = 404, description = "Pending question not found")
    )
)]
#[axum::debug_handler]
pub async fn approve_pending_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let question_id = state.pending_question_service.approve(id).await?;
    Ok(Json(ApproveResponse {
        question_id,
        message: "Pending question converted to approved question successfully".to_string(),
    }))
}

use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::question_dto::{
        GenerateQuestionsPayload, GenerateQuestionsResponse, GeneratedQuestionRef,
        GenerationTypeResult,
    },
    error::{Error, Result},
    services::generation_service::GenerationTarget,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/llm/questions/generate",
    request_body = GenerateQuestionsPayload,
    responses(
        (status = 200, description = "Per-topic generation results", body = Json<GenerateQuestionsResponse>),
        (status = 400, description = "Invalid payload or unknown difficulty level"),
        (status = 500, description = "Prompt configuration error")
    )
)]
#[axum::debug_handler]
pub async fn generate_questions(
    State(state): State<AppState>,
    Json(payload): Json<GenerateQuestionsPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let settings = state.generation_settings;
    if payload.num_questions > settings.max_questions_per_batch {
        return Err(Error::BadRequest(format!(
            "num_questions must be a number between 1 and {}",
            settings.max_questions_per_batch
        )));
    }

    let store = &state.question_store;
    let Some(difficulty) = store
        .find_difficulty_by_label(&payload.difficulty_level)
        .await?
    else {
        let available = store
            .list_difficulty_labels()
            .await?
            .iter()
            .map(|l| format!("'{}'", l))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(Error::BadRequest(format!(
            "Invalid difficulty_level: '{}'. Available levels: {}",
            payload.difficulty_level, available
        )));
    };

    let mut results = Vec::with_capacity(payload.question_types.len());
    for question_type in &payload.question_types {
        let Some(topic) = store.find_topic_by_name(question_type).await? else {
            results.push(GenerationTypeResult::failure(
                question_type,
                format!("Invalid question_type: '{}'", question_type),
            ));
            continue;
        };

        let target = GenerationTarget {
            topic,
            difficulty: difficulty.clone(),
        };
        match state
            .generation_service
            .generate(&target, payload.num_questions, &settings)
            .await
        {
            Ok(outcome) => results.push(GenerationTypeResult {
                question_type: question_type.clone(),
                success: true,
                error: None,
                total_generated: outcome.saved.len(),
                failed: outcome.failed.len(),
                questions: outcome
                    .saved
                    .iter()
                    .map(|id| GeneratedQuestionRef {
                        id: *id,
                        difficulty_level: difficulty.label.clone(),
                        status: "pending_review".to_string(),
                    })
                    .collect(),
                stats: Some(outcome.stats),
                skipped: outcome.skipped,
            }),
            Err(e @ Error::Config(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(question_type = %question_type, error = %e, "generation failed for topic");
                results.push(GenerationTypeResult::failure(question_type, e.to_string()));
            }
        }
    }

    Ok(Json(GenerateQuestionsResponse {
        success: true,
        message: "Questions generated for selected topics".to_string(),
        source: state.generation_service.source_name().to_string(),
        results,
    }))
}

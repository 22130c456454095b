//! Question catalog import and lookup.

use std::collections::HashSet;

use tracing::info;

use crate::{
    dao::models::QuestionEntity,
    dto::{
        catalog::{CatalogImportRequest, CatalogImportResponse, CatalogResponse},
        session::QuestionSummary,
    },
    error::ServiceError,
    state::{SharedState, session::Question},
};

/// Load the whole catalog as domain questions.
pub async fn load_catalog(state: &SharedState) -> Result<Vec<Question>, ServiceError> {
    let store = state.require_session_store().await?;
    let entities = store.read_catalog().await?;
    Ok(entities.into_iter().map(Question::from).collect())
}

/// List the catalog for display.
pub async fn list_catalog(state: &SharedState) -> Result<CatalogResponse, ServiceError> {
    let questions = load_catalog(state).await?;
    Ok(CatalogResponse {
        questions: questions.iter().map(QuestionSummary::from).collect(),
    })
}

/// Replace the catalog with the submitted questions.
pub async fn import_catalog(
    state: &SharedState,
    request: CatalogImportRequest,
) -> Result<CatalogImportResponse, ServiceError> {
    let questions = normalize_import(request)?;
    let store = state.require_session_store().await?;
    let imported = questions.len();
    store
        .replace_catalog(questions.iter().map(QuestionEntity::from).collect())
        .await?;
    info!(imported, "question catalog replaced");
    Ok(CatalogImportResponse { imported })
}

/// Convert the payload, refusing duplicate identifiers.
fn normalize_import(request: CatalogImportRequest) -> Result<Vec<Question>, ServiceError> {
    let questions: Vec<Question> = request.questions.into_iter().map(Into::into).collect();
    let mut seen = HashSet::with_capacity(questions.len());
    for question in &questions {
        if !seen.insert(question.id.as_str()) {
            return Err(ServiceError::InvalidInput(format!(
                "duplicate question id `{}`",
                question.id
            )));
        }
    }
    Ok(questions)
}

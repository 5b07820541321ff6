use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{field, info, instrument, warn, Span};
use uuid::Uuid;

use crate::errors::AppError;
use crate::import::coordinator::reconcile;
use crate::import::normalize::normalize;
use crate::import::summary::{report, ImportResponse};
use crate::models::profile::ProfileSnapshot;
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// POST /api/v1/profile/import
#[instrument(skip_all, fields(user_id = field::Empty))]
pub async fn handle_import(
    State(state): State<AppState>,
    query: Result<Query<UserIdQuery>, QueryRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ImportResponse>, AppError> {
    let Query(params) = query.map_err(rejected)?;
    Span::current().record("user_id", field::display(params.user_id));
    let Json(payload) = payload.map_err(rejected)?;

    let batch = normalize(&payload).map_err(|err| {
        info!(invalid_fields = err.fields.len(), "import payload rejected");
        err
    })?;

    if batch.ignored.publications > 0 || batch.ignored.certifications > 0 {
        warn!(
            publications = batch.ignored.publications,
            certifications = batch.ignored.certifications,
            "sections accepted but not persisted"
        );
    }
    if batch.is_empty() {
        warn!("import payload carries no profile data");
    }

    let result = reconcile(state.store.as_ref(), params.user_id, batch).await;
    Ok(Json(report(params.user_id, result)?))
}

/// GET /api/v1/profile
#[instrument(skip_all, fields(user_id = field::Empty))]
pub async fn handle_get_profile(
    State(state): State<AppState>,
    query: Result<Query<UserIdQuery>, QueryRejection>,
) -> Result<Json<ProfileSnapshot>, AppError> {
    let Query(params) = query.map_err(rejected)?;
    Span::current().record("user_id", field::display(params.user_id));
    let profile = state
        .store
        .load_profile(params.user_id)
        .await
        .map_err(|err| {
            if !matches!(err, StoreError::OwnerNotFound(_)) {
                tracing::error!(error = %err, "profile load failed");
            }
            err
        })?;
    Ok(Json(profile))
}

fn rejected<R: Into<AppError>>(rejection: R) -> AppError {
    let err = rejection.into();
    info!(error = %err, "request rejected");
    err
}

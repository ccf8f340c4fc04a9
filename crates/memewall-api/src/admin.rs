use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::{error, info};

use memewall_types::api::MigrationReport;

use crate::auth::AppStateInner;
use crate::error::ApiError;

/// Run one named data migration. Gated behind the admin middleware; the
/// known-good-once jobs (chunk migration, renumbering) are expected to be
/// disabled in the admin UI after their first successful run.
pub async fn run_migration(
    State(state): State<Arc<AppStateInner>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let job = name.clone();

    let rows_affected = tokio::task::spawn_blocking(move || match job.as_str() {
        "backfill-types" => db.db.backfill_types().map(Some),
        "repair-types" => db.db.repair_types().map(Some),
        "migrate-to-chunks" => db.db.migrate_to_chunks().map(Some),
        "renumber-chunks" => db.db.renumber_chunks().map(Some),
        "backfill-vote-fields" => db.db.backfill_vote_fields().map(Some),
        _ => Ok(None),
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); ApiError::Internal(anyhow::anyhow!(e)) })??
    .ok_or_else(|| ApiError::NotFound(format!("migration '{name}'")))?;

    info!("Migration {} finished, {} rows affected", name, rows_affected);

    Ok(Json(MigrationReport { migration: name, rows_affected }))
}

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::services::calendar::{generate_ics, meeting_url};
use crate::state::AppState;

// GET /calendar/:access_token
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_token): Path<String>,
) -> Result<Response, AppError> {
    let token = raw_token.strip_suffix(".ics").unwrap_or(&raw_token);
    let now = Utc::now().naive_utc();

    let booking = {
        let conn = db::lock(&state.db)?;
        queries::find_active_booking_by_access_token(&conn, token, &now)?
    }
    .ok_or_else(|| AppError::NotFound("booking".to_string()))?;

    let ics = generate_ics(&booking, &meeting_url(&state.config.public_base_url, &booking));

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"demo-vetchat.ics\"".to_string(),
            ),
        ],
        ics,
    )
        .into_response())
}

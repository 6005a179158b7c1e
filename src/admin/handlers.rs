use axum::{
    Form,
    extract::{
        Query, State,
        rejection::{FormRejection, QueryRejection},
    },
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::{
    session::{FlashLevel, Session},
    sheets::{FIRST_DATA_ROW, Gateway, SheetError},
    state::AppState,
};

use super::{
    MANAGE_LIMIT, PREVIEW_LIMIT,
    fields::{ResourceForm, RowEdit, parse_row},
    template::{self, DashboardView},
};

const NOT_CONFIGURED: &str =
    "Google Sheets not configured (check SHEET_URL and GOOGLE_APPLICATION_CREDENTIALS).";
const UNREADABLE_ADD: &str = "Failed to add row: the form could not be read.";
const BAD_UPDATE: &str = "Update failed (bad row or sheet).";
const BAD_DELETE: &str = "Delete failed (bad row or sheet).";

// ── Dashboard ─────────────────────────────────────────────────────────────────

pub async fn get_dashboard(State(state): State<AppState>, session: Session) -> Response {
    let mut view = DashboardView::default();

    match open_gateway(&state).await {
        Some(gw) => match gw.list_records(MANAGE_LIMIT).await {
            Ok(records) => {
                view.headers = gw.headers().to_vec();
                view.preview = records.iter().take(PREVIEW_LIMIT).cloned().collect();
                view.rows = records;
            }
            Err(e) => {
                tracing::error!("Cannot read spreadsheet rows: {}", e);
                view.headers = gw.headers().to_vec();
                view.warning = Some(format!("Couldn't read sheet rows: {}.", e.summary()));
            }
        },
        None => view.warning = Some(NOT_CONFIGURED.to_string()),
    }

    view.flashes = session.take_flashes().await;
    Html(template::dashboard(&view).into_string()).into_response()
}

// ── Add ───────────────────────────────────────────────────────────────────────

pub async fn post_add(
    State(state): State<AppState>,
    session: Session,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Response {
    let pairs = match form {
        Ok(Form(pairs)) => pairs,
        Err(e) => {
            tracing::warn!("Unreadable add form: {}", e);
            return back(&session, FlashLevel::Danger, UNREADABLE_ADD).await;
        }
    };
    let form = ResourceForm::from_pairs(&pairs);

    if state.admin.require_title_url && !form.has_title_and_url() {
        return back(&session, FlashLevel::Danger, "Title and URL are required.").await;
    }

    let Some(gw) = open_gateway(&state).await else {
        return back(&session, FlashLevel::Danger, NOT_CONFIGURED).await;
    };

    let row = form.row_for(gw.headers());
    match gw.append(row).await {
        Ok(()) => {
            tracing::info!(title = %form.value("title"), "row appended");
            back(&session, FlashLevel::Success, "Row added to the sheet.").await
        }
        Err(e) => failed(&session, "Failed to add row", e).await,
    }
}

// ── Update ────────────────────────────────────────────────────────────────────

pub async fn post_update(
    State(state): State<AppState>,
    session: Session,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Response {
    let pairs = match form {
        Ok(Form(pairs)) => pairs,
        Err(e) => {
            tracing::warn!("Unreadable update form: {}", e);
            return back(&session, FlashLevel::Danger, BAD_UPDATE).await;
        }
    };
    let edit = RowEdit::from_pairs(&pairs);
    let Some(row) = edit.sheet_row.filter(|r| *r >= FIRST_DATA_ROW) else {
        return back(&session, FlashLevel::Danger, BAD_UPDATE).await;
    };
    let Some(gw) = open_gateway(&state).await else {
        return back(&session, FlashLevel::Danger, BAD_UPDATE).await;
    };

    let values = edit.row_for(gw.headers());
    match gw.update(row, values).await {
        Ok(()) => {
            tracing::info!(row, "row updated");
            back(&session, FlashLevel::Success, format!("Updated row {row}.")).await
        }
        Err(e) => failed(&session, "Update failed", e).await,
    }
}

// ── Delete ────────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct RowParam {
    #[serde(default)]
    pub sheet_row: Option<String>,
}

/// Row number from the query string, falling back to the form body (POST).
pub async fn delete_row(
    State(state): State<AppState>,
    session: Session,
    query: Result<Query<RowParam>, QueryRejection>,
    form: Result<Form<RowParam>, FormRejection>,
) -> Response {
    let raw = query
        .ok()
        .and_then(|Query(q)| q.sheet_row)
        .or_else(|| form.ok().and_then(|Form(f)| f.sheet_row));
    let Some(row) = raw
        .as_deref()
        .and_then(parse_row)
        .filter(|r| *r >= FIRST_DATA_ROW)
    else {
        return back(&session, FlashLevel::Danger, BAD_DELETE).await;
    };
    let Some(gw) = open_gateway(&state).await else {
        return back(&session, FlashLevel::Danger, BAD_DELETE).await;
    };

    match gw.delete(row).await {
        Ok(()) => {
            tracing::info!(row, "row deleted");
            back(&session, FlashLevel::Success, format!("Deleted row {row}.")).await
        }
        Err(e) => failed(&session, "Delete failed", e).await,
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Open the spreadsheet; a sheet with no header row counts as not configured.
async fn open_gateway(state: &AppState) -> Option<Gateway> {
    let gw = Gateway::open(state.sheets.as_ref()).await?;
    if gw.headers().is_empty() {
        tracing::warn!("Spreadsheet header row is empty");
        return None;
    }
    Some(gw)
}

/// Flash `message` and return to the dashboard.
async fn back(session: &Session, level: FlashLevel, message: impl Into<String>) -> Response {
    session.flash(level, message).await;
    Redirect::to("/admin/").into_response()
}

async fn failed(session: &Session, action: &str, err: SheetError) -> Response {
    tracing::error!("{}: {}", action, err);
    back(session, FlashLevel::Danger, format!("{}: {}.", action, err.summary())).await
}

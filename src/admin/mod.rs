mod fields;
mod handlers;
mod template;

use axum::{
    Form, Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    session::{self, FlashLevel, Session},
    state::AppState,
};

/// Max rows shown in the manage table.
pub const MANAGE_LIMIT: usize = 50;
/// Rows shown in the preview table.
pub const PREVIEW_LIMIT: usize = 5;

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the admin router with full `/admin/*` paths.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/admin/login", get(get_login).post(post_login))
        .route("/admin/logout", get(get_logout));

    let protected = Router::new()
        .route("/admin/", get(handlers::get_dashboard))
        .route("/admin/add", post(handlers::post_add))
        .route("/admin/update", post(handlers::post_update))
        .route(
            "/admin/delete",
            get(handlers::delete_row).post(handlers::delete_row),
        )
        .route_layer(middleware::from_fn(require_admin));

    Router::new()
        .route("/admin", get(|| async { Redirect::permanent("/admin/") }))
        .merge(public)
        .merge(protected)
        .route_layer(middleware::from_fn_with_state(state, session::attach))
}

// ── Auth middleware ───────────────────────────────────────────────────────────

async fn require_admin(session: Session, req: Request, next: Next) -> Response {
    if session.is_admin().await {
        return next.run(req).await;
    }
    tracing::debug!(path = %req.uri().path(), "anonymous request to admin route");
    session
        .flash(FlashLevel::Warning, "Please log in as admin.")
        .await;
    Redirect::to("/admin/login").into_response()
}

// ── Login / logout ────────────────────────────────────────────────────────────

async fn get_login(session: Session) -> Response {
    if session.is_admin().await {
        return Redirect::to("/admin/").into_response();
    }
    let flashes = session.take_flashes().await;
    Html(template::login_page(&flashes).into_string()).into_response()
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn post_login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let username = form.username.trim();

    if state.credentials.verify(username, &form.password) {
        session.log_in().await;
        tracing::info!(user = %username, "admin logged in");
        session
            .flash(FlashLevel::Success, format!("Welcome, {username}!"))
            .await;
        return Redirect::to("/admin/").into_response();
    }

    tracing::warn!("failed admin login attempt");
    session
        .flash(FlashLevel::Danger, "Invalid username or password.")
        .await;
    Redirect::to("/admin/login").into_response()
}

async fn get_logout(session: Session) -> Response {
    session.log_out().await;
    session.flash(FlashLevel::Info, "Logged out.").await;
    Redirect::to("/admin/login").into_response()
}

use askama::Template;
use axum::extract::State;
use axum::response::{Html, IntoResponse};

use crate::db;
use crate::error::AppError;
use crate::session::{CurrentUser, Flash, Session};
use crate::state::SharedState;

#[derive(Template)]
#[template(path = "dashboard/index.html")]
struct DashboardTemplate {
    flashes: Vec<Flash>,
    csrf_token: String,
    firstname: String,
    lastname: String,
    email: String,
    username: String,
    specialization: String,
}

pub async fn index(
    State(state): State<SharedState>,
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    // Profile fields come fresh from the store, not the session snapshot.
    let profile = db::users::find_by_id(&state.pool, user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Login required".to_string()))?;

    let specialization = match profile.specialization_id {
        Some(id) => db::specializations::find_by_id(&state.pool, id)
            .await?
            .map(|s| s.name)
            .unwrap_or_default(),
        None => String::new(),
    };

    let template = DashboardTemplate {
        flashes: session.take_flashes(),
        csrf_token: session.csrf_token(),
        firstname: profile.firstname,
        lastname: profile.lastname,
        email: profile.email,
        username: profile.username,
        specialization,
    };
    Ok(Html(template.render().unwrap_or_default()))
}

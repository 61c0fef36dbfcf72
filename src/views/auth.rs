use askama::Template;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::db;
use crate::error::AppError;
use crate::models::Specialization;
use crate::session::{Flash, Session};
use crate::state::SharedState;

#[derive(Template)]
#[template(path = "auth/login.html")]
struct LoginTemplate {
    flashes: Vec<Flash>,
    csrf_token: String,
    login: String,
}

#[derive(Template)]
#[template(path = "auth/register.html")]
struct RegisterTemplate {
    flashes: Vec<Flash>,
    csrf_token: String,
    email: String,
    username: String,
    firstname: String,
    lastname: String,
    specialization_id: String,
    specializations: Vec<Specialization>,
}

#[derive(Template)]
#[template(path = "auth/forgot_password.html")]
struct ForgotPasswordTemplate {
    flashes: Vec<Flash>,
    csrf_token: String,
    email: String,
}

#[derive(Template)]
#[template(path = "auth/reset_password.html")]
struct ResetPasswordTemplate {
    flashes: Vec<Flash>,
    csrf_token: String,
    token: String,
    user: String,
}

#[derive(Deserialize)]
pub struct ResetQuery {
    pub token: Option<String>,
    pub user: Option<String>,
}

pub async fn login_page(session: Session) -> Response {
    if session.user().is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    let old = session.take_old_input();
    let template = LoginTemplate {
        flashes: session.take_flashes(),
        csrf_token: session.csrf_token(),
        login: old.get("login").cloned().unwrap_or_default(),
    };
    Html(template.render().unwrap_or_default()).into_response()
}

pub async fn register_page(
    State(state): State<SharedState>,
    session: Session,
) -> Result<Response, AppError> {
    if session.user().is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let old = session.take_old_input();
    let template = RegisterTemplate {
        flashes: session.take_flashes(),
        csrf_token: session.csrf_token(),
        email: old.get("email").cloned().unwrap_or_default(),
        username: old.get("username").cloned().unwrap_or_default(),
        firstname: old.get("firstname").cloned().unwrap_or_default(),
        lastname: old.get("lastname").cloned().unwrap_or_default(),
        specialization_id: old.get("specialization_id").cloned().unwrap_or_default(),
        specializations: db::specializations::list_all(&state.pool).await?,
    };
    Ok(Html(template.render().unwrap_or_default()).into_response())
}

pub async fn forgot_password_page(session: Session) -> impl IntoResponse {
    let old = session.take_old_input();
    let template = ForgotPasswordTemplate {
        flashes: session.take_flashes(),
        csrf_token: session.csrf_token(),
        email: old.get("email").cloned().unwrap_or_default(),
    };
    Html(template.render().unwrap_or_default())
}

pub async fn reset_password_page(session: Session, Query(q): Query<ResetQuery>) -> impl IntoResponse {
    let template = ResetPasswordTemplate {
        flashes: session.take_flashes(),
        csrf_token: session.csrf_token(),
        token: q.token.unwrap_or_default(),
        user: q.user.unwrap_or_default(),
    };
    Html(template.render().unwrap_or_default())
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;

use regex::Regex;
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use medboard::config::Config;

/// A running test server instance with a dedicated test database.
/// `None` when `TEST_DATABASE_URL` is not set, so suites skip cleanly.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub db_name: String,
    admin_url: String,
}

pub async fn try_spawn_app() -> Option<TestApp> {
    try_spawn_app_with(|_| {}).await
}

/// Spawn with a config tweak, e.g. a short idle timeout.
pub async fn try_spawn_app_with(tweak: impl FnOnce(&mut Config)) -> Option<TestApp> {
    let Ok(admin_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping integration test");
        return None;
    };

    let db_name = format!("medboard_test_{}", Uuid::new_v4().simple());
    let admin_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&admin_url)
        .await
        .expect("failed to connect to admin database");
    sqlx::query(&format!(r#"CREATE DATABASE "{db_name}""#))
        .execute(&admin_pool)
        .await
        .expect("failed to create test database");
    admin_pool.close().await;

    let database_url = swap_database(&admin_url, &db_name);
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let mut config = Config {
        database_url: database_url.clone(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: String::new(),
        session_idle_secs: 1800,
        session_rotate_secs: 300,
        rate_window_secs: 900,
        rate_max_attempts: 5,
        trusted_proxies: Vec::new(),
        log_level: "warn".to_string(),
        smtp: None,
    };
    tweak(&mut config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    config.base_url = format!("http://{addr}");

    let app = medboard::build_app(pool.clone(), config);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("test server failed");
    });

    Some(TestApp {
        addr,
        pool,
        db_name,
        admin_url,
    })
}

pub async fn cleanup(app: TestApp) {
    app.pool.close().await;
    let admin_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&app.admin_url)
        .await
        .expect("failed to reconnect to admin database");
    let _ = sqlx::query(&format!(r#"DROP DATABASE IF EXISTS "{}" WITH (FORCE)"#, app.db_name))
        .execute(&admin_pool)
        .await;
    admin_pool.close().await;
}

fn swap_database(url: &str, db_name: &str) -> String {
    // Replace the path segment of a postgres url with the test database.
    let (base, _) = url.rsplit_once('/').expect("database url without a path");
    format!("{base}/{db_name}")
}

/// One simulated browser: redirects are manual and cookies are tracked by
/// hand so Secure cookies still flow over plain-http test servers and stale
/// cookie values can be replayed deliberately.
pub struct Browser {
    client: Client,
    base: String,
    pub cookies: HashMap<String, String>,
}

impl Browser {
    pub fn new(app: &TestApp) -> Self {
        Self {
            client: Client::builder()
                .redirect(Policy::none())
                .build()
                .expect("failed to build test client"),
            base: format!("http://{}", app.addr),
            cookies: HashMap::new(),
        }
    }

    fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn absorb_cookies(&mut self, resp: &Response) {
        for value in resp.headers().get_all("set-cookie") {
            let Ok(raw) = value.to_str() else { continue };
            let Some(pair) = raw.split(';').next() else { continue };
            let Some((name, value)) = pair.split_once('=') else { continue };
            if value.is_empty() {
                self.cookies.remove(name.trim());
            } else {
                self.cookies
                    .insert(name.trim().to_string(), value.to_string());
            }
        }
    }

    pub async fn get(&mut self, path: &str) -> Response {
        let resp = self
            .client
            .get(format!("{}{path}", self.base))
            .header("cookie", self.cookie_header())
            .send()
            .await
            .expect("GET failed");
        self.absorb_cookies(&resp);
        resp
    }

    pub async fn post_form(&mut self, path: &str, fields: &[(&str, &str)]) -> Response {
        let resp = self
            .client
            .post(format!("{}{path}", self.base))
            .header("cookie", self.cookie_header())
            .form(fields)
            .send()
            .await
            .expect("POST failed");
        self.absorb_cookies(&resp);
        resp
    }

    /// Fetch a page and pull the CSRF token out of its form.
    pub async fn csrf_from(&mut self, path: &str) -> String {
        let body = self.get(path).await.text().await.expect("page body");
        let re = Regex::new(r#"name="csrf_token" value="([0-9a-f]{64})""#).unwrap();
        re.captures(&body)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| panic!("no csrf token found at {path}"))
    }

    pub async fn register(&mut self, email: &str, username: &str, password: &str) -> Response {
        let csrf = self.csrf_from("/register").await;
        self.post_form(
            "/register",
            &[
                ("email", email),
                ("username", username),
                ("firstname", "Test"),
                ("lastname", "User"),
                ("password", password),
                ("password_confirmation", password),
                ("specialization_id", ""),
                ("csrf_token", &csrf),
            ],
        )
        .await
    }

    pub async fn login(&mut self, login: &str, password: &str, remember: bool) -> Response {
        let csrf = self.csrf_from("/login").await;
        let mut fields = vec![
            ("login", login),
            ("password", password),
            ("csrf_token", csrf.as_str()),
        ];
        if remember {
            fields.push(("remember", "1"));
        }
        self.post_form("/login", &fields).await
    }

    pub async fn logout(&mut self) -> Response {
        let csrf = self.csrf_from("/dashboard").await;
        self.post_form("/logout", &[("csrf_token", &csrf)]).await
    }

    /// Whether this browser currently reaches the dashboard.
    pub async fn is_logged_in(&mut self) -> bool {
        self.get("/dashboard").await.status() == reqwest::StatusCode::OK
    }
}

pub fn location_of(resp: &Response) -> String {
    resp.headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

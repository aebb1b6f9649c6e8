#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use base64::Engine as _;
use dryfruits::bootstrap::{self, SuperuserInput};
use dryfruits::config::{BasicConfig, Config};
use dryfruits::db::Db;
use dryfruits::server::{AppState, app_router};
use serde_json::Value;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-pass-1";

pub fn temp_db_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "dryfruits-{tag}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    path
}

/// Configuration pointing at a SQLite file that does not exist yet.
pub fn sqlite_config(tag: &str) -> Config {
    let mut cfg = Config::default();
    cfg.database.url = Some(format!("sqlite:{}", temp_db_path(tag).display()));
    cfg.database.max_connections = 4;
    cfg
}

/// create-database -> migrate -> create-superuser, as an operator would run them.
pub async fn bootstrapped(tag: &str) -> (Config, Db) {
    let cfg = sqlite_config(tag);
    bootstrap::create_database(&cfg)
        .await
        .expect("create database");
    bootstrap::migrate(&cfg).await.expect("migrate");
    let db = bootstrap::connect(&cfg).await.expect("connect");
    bootstrap::create_superuser(
        &db,
        &SuperuserInput {
            email: ADMIN_EMAIL.to_string(),
            first_name: "Site".to_string(),
            last_name: "Admin".to_string(),
            password: ADMIN_PASSWORD.to_string(),
            password_confirm: ADMIN_PASSWORD.to_string(),
        },
    )
    .await
    .expect("create superuser");
    (cfg, db)
}

pub struct TestApp {
    pub db: Db,
    pub router: Router,
    admin_cookie: String,
}

pub async fn app(tag: &str) -> TestApp {
    app_with(tag, BasicConfig::default()).await
}

pub async fn app_with(tag: &str, basic: BasicConfig) -> TestApp {
    let (_cfg, db) = bootstrapped(tag).await;
    let router = app_router(AppState::new(db.clone(), &basic));
    let mut app = TestApp {
        db,
        router,
        admin_cookie: String::new(),
    };
    app.admin_cookie = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    app
}

pub fn basic_auth(email: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{email}:{password}"));
    format!("Basic {encoded}")
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body was not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("response body was not utf-8")
    }
}

/// Who a request is sent as.
#[derive(Clone, Copy)]
pub enum As<'a> {
    Anonymous,
    Basic(&'a str, &'a str),
    Cookie(&'a str),
}

impl TestApp {
    /// The superuser's session cookie.
    pub fn admin(&self) -> As<'_> {
        As::Cookie(&self.admin_cookie)
    }

    /// Logs in through `/login/` and returns the `Cookie` header value for the session.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let reply = self
            .post(
                "/login/",
                As::Anonymous,
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
        let set_cookie = reply
            .headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("login sets a cookie");
        set_cookie
            .split(';')
            .next()
            .expect("cookie pair")
            .to_string()
    }

    pub async fn send(&self, method: &str, uri: &str, who: As<'_>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        match who {
            As::Anonymous => {}
            As::Basic(email, password) => {
                builder = builder.header(header::AUTHORIZATION, basic_auth(email, password));
            }
            As::Cookie(cookie) => {
                builder = builder.header(header::COOKIE, cookie);
            }
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.raw(builder.body(body).expect("failed to build request"))
            .await
    }

    pub async fn raw(&self, request: Request<Body>) -> Reply {
        let resp = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("failed to read response body")
            .to_vec();
        Reply {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, who: As<'_>) -> Reply {
        self.send("GET", uri, who, None).await
    }

    pub async fn post(&self, uri: &str, who: As<'_>, body: Value) -> Reply {
        self.send("POST", uri, who, Some(body)).await
    }

    /// Creates a user through the API as the superuser and returns its id.
    pub async fn create_user(&self, email: &str, password: &str, role: &str) -> i64 {
        let reply = self
            .post(
                "/users/",
                self.admin(),
                serde_json::json!({
                    "email": email,
                    "role": role,
                    "password1": password,
                    "password2": password,
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
        reply.json()["id"].as_i64().expect("user id")
    }
}

/*!
Interoperation between the client (user) and server.

(Not the application and the database; that's covered by `store`.)

Everything is JSON over `POST`. Every request must carry an
`x-hw-request-id` header, which gets echoed back on the response. The
role endpoints (`/teacher`, `/student`) additionally need `x-hw-email` and
`x-hw-key` headers from a successful login, and say what they want done
in an `x-hw-action` header, which is also echoed back.
*/
use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{Request, StatusCode},
    http::header::{HeaderMap, HeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use crate::{
    auth::AuthResult,
    config::Glob,
    error::HwError,
    user::{Actor, Role},
};

pub mod student;
pub mod teacher;

pub const REQUEST_ID: &str = "x-hw-request-id";
pub const EMAIL: &str = "x-hw-email";
pub const KEY: &str = "x-hw-key";
pub const ACTION: &str = "x-hw-action";

static TEXT_500: &str = "An internal error occurred; an appropriate response was inconstructable.";

pub fn text_500(text: Option<String>) -> Response {
    match text {
        Some(text) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            text
        ).into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            TEXT_500.to_owned()
        ).into_response()
    }
}

pub fn respond_bad_key() -> Response {
    log::trace!("respond_bad_key() called.");

    (
        StatusCode::UNAUTHORIZED,
        "Invalid authorization key.".to_owned(),
    ).into_response()
}

pub fn respond_bad_request(msg: String) -> Response {
    log::trace!("respond_bad_request( {:?} ) called.", &msg);

    (
        StatusCode::BAD_REQUEST,
        msg
    ).into_response()
}

impl IntoResponse for HwError {
    fn into_response(self) -> Response {
        match self {
            HwError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            HwError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            HwError::Validation(msg) => respond_bad_request(msg),
            HwError::PolicyDenied(reason) => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "reason": reason.code(),
                    "message": reason.to_string(),
                }))
            ).into_response(),
            HwError::BadCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid email/password combination.".to_owned(),
            ).into_response(),
            HwError::Unexpected(detail) => {
                log::error!("Unexpected error: {}", &detail);
                text_500(None)
            },
        }
    }
}

/// Deserialize a JSON request body, or explain why it can't be.
pub fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, HwError> {
    serde_json::from_str(body)
        .map_err(|e| HwError::invalid(format!("Unable to read request body: {}", &e)))
}

/// Pull a header's value out as a `&str`, complaining appropriately if it
/// isn't there or isn't text.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, Response> {
    match headers.get(name) {
        Some(val) => match val.to_str() {
            Ok(s) => Ok(s),
            Err(e) => {
                log::error!("Failed converting {} value {:?} to &str: {}", name, val, &e);
                Err(respond_bad_request(format!("{} value unrecognizable.", name)))
            },
        },
        None => Err(respond_bad_request(format!("Request must have an {} header.", name))),
    }
}

/// Echo the `x-hw-action` value back on whatever `api` came up with.
pub fn with_action(action: HeaderValue, res: Result<Response, HwError>) -> Response {
    let mut response = match res {
        Ok(r) => r,
        Err(e) => e.into_response(),
    };
    response.headers_mut().insert(ACTION, action);
    response
}

/// End the session whose key came with this request. The actor's other
/// sessions, if any, stay live.
pub async fn logout(glob: &Glob, headers: &HeaderMap, actor: &Actor) -> Result<Response, HwError> {
    if let Some(key) = headers.get(KEY).and_then(|v| v.to_str().ok()) {
        if glob.keys.forget(key).await {
            log::info!("{} {} logged out.", &actor.role, actor.id);
        }
    }
    Ok(Json(json!({ "id": actor.id })).into_response())
}

/// Middleware function to ensure `x-hw-request-id` header is
/// maintained between request and response.
pub async fn request_identity<B>(
    req: Request<B>,
    next: Next<B>
) -> Response {
    let id_header = match req.headers().get(REQUEST_ID) {
        Some(id) => id.to_owned(),
        None => {
            return respond_bad_request(
                format!("Request must have an {} header.", REQUEST_ID)
            );
        },
    };

    let mut response = next.run(req).await;
    response.headers_mut().insert(REQUEST_ID, id_header);
    response
}

/**
Middleware function that checks the `x-hw-email`/`x-hw-key` pair and, if it
checks out, sticks the `Actor` it was issued to into the request's
extensions for the handler.
*/
pub async fn key_authenticate<B>(
    mut req: Request<B>,
    next: Next<B>,
) -> Response {
    let glob: Arc<Glob> = match req.extensions().get::<Arc<Glob>>() {
        Some(glob) => glob.clone(),
        None => {
            log::error!("key_authenticate(): no Glob in request extensions.");
            return text_500(None);
        },
    };

    let (email, key) = {
        let headers = req.headers();
        let key = match header_str(headers, KEY) {
            Ok(s) => s.to_owned(),
            Err(r) => { return r; },
        };
        let email = match header_str(headers, EMAIL) {
            Ok(s) => s.to_owned(),
            Err(r) => { return r; },
        };
        (email, key)
    };

    match glob.keys.check(&email, &key).await {
        AuthResult::Ok(actor) => {
            req.extensions_mut().insert(actor);
        },
        AuthResult::InvalidKey => { return respond_bad_key(); },
        AuthResult::Expired => {
            return (
                StatusCode::UNAUTHORIZED,
                "Authorization key has expired; please log in again.".to_owned(),
            ).into_response();
        },
    }

    next.run(req).await
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub role: Role,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegistrationData {
    pub role: Role,
    pub email: String,
    pub name: String,
    pub password: String,
}

pub async fn login(
    Extension(glob): Extension<Arc<Glob>>,
    body: String,
) -> Response {
    log::trace!("login( [ glob ], [ body ] ) called.");

    let form: LoginData = match parse_body(&body) {
        Ok(form) => form,
        Err(e) => { return e.into_response(); },
    };

    let acct = match glob.accounts().login(form.role, &form.email, &form.password).await {
        Ok(acct) => acct,
        Err(e) => { return e.into_response(); },
    };

    let key = glob.keys.issue(acct.email(), acct.actor()).await;
    log::info!("{} {} ({}) logged in.", &form.role, acct.id(), acct.email());

    (
        StatusCode::OK,
        Json(json!({
            "email": acct.email(),
            "role": acct.role(),
            "key": key,
        }))
    ).into_response()
}

pub async fn register(
    Extension(glob): Extension<Arc<Glob>>,
    body: String,
) -> Response {
    log::trace!("register( [ glob ], [ body ] ) called.");

    let form: RegistrationData = match parse_body(&body) {
        Ok(form) => form,
        Err(e) => { return e.into_response(); },
    };

    match glob.accounts().register(form.role, &form.email, &form.name, &form.password).await {
        Ok(acct) => (StatusCode::CREATED, Json(acct)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Every route the server answers, with `glob` made available to them all.
pub fn router(glob: Arc<Glob>) -> Router {
    let authenticated = Router::new()
        .route("/teacher", post(teacher::api))
        .route("/student", post(student::api))
        .layer(middleware::from_fn(key_authenticate));

    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .merge(authenticated)
        .layer(middleware::from_fn(request_identity))
        .layer(Extension(glob))
}

/*!
Subcrate for interoperation with Student users.
*/
use axum::{
    extract::Extension,
    http::header::HeaderMap,
    Json,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    homework::Status,
    policy::DenyReason,
    registry::Change,
};
use super::*;

pub async fn api(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
    Extension(actor): Extension<Actor>,
    body: String,
) -> Response {
    log::trace!("student::api( {:?}, ... ) called.", &actor);

    if actor.role != Role::Student {
        return HwError::PolicyDenied(DenyReason::NotStudent).into_response();
    }

    let action = match header_str(&headers, ACTION) {
        Ok(s) => s,
        Err(r) => { return r; },
    };
    let action_value = HeaderValue::from_str(action).unwrap_or_else(|_| HeaderValue::from_static(""));

    let res = match action {
        "populate-homeworks" => populate_homeworks(&glob, &actor).await,
        "view-homework" => view_homework(&glob, &actor, &body).await,
        "update-homework" => update_homework(&glob, &actor, &body).await,
        "pair-teacher" => pair_teacher(&glob, &actor, &body).await,
        "profile" => profile(&glob, &actor).await,
        "delete-account" => delete_account(&glob, &actor).await,
        "logout" => logout(&glob, &headers, &actor).await,
        x => {
            return respond_bad_request(
                format!("{:?} is not a recognized {} value.", &x, ACTION)
            );
        },
    };

    with_action(action_value, res)
}

#[derive(Debug, Deserialize)]
struct IdData {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct UpdateData {
    id: i64,
    status: String,
}

#[derive(Debug, Deserialize)]
struct PairData {
    teacher_id: i64,
}

async fn populate_homeworks(glob: &Glob, actor: &Actor) -> Result<Response, HwError> {
    let homeworks = glob.registry().list_by_student(actor.id).await?;
    Ok(Json(homeworks).into_response())
}

async fn view_homework(glob: &Glob, actor: &Actor, body: &str) -> Result<Response, HwError> {
    let data: IdData = parse_body(body)?;
    let view = glob.registry().view(actor, data.id).await?;
    Ok(Json(view).into_response())
}

async fn update_homework(glob: &Glob, actor: &Actor, body: &str) -> Result<Response, HwError> {
    let data: UpdateData = parse_body(body)?;
    let status: Status = data.status.parse()?;
    let hw = glob.registry().apply_transition(actor, data.id, Change::to(status)).await?;
    Ok(Json(hw).into_response())
}

async fn pair_teacher(glob: &Glob, actor: &Actor, body: &str) -> Result<Response, HwError> {
    let data: PairData = parse_body(body)?;
    glob.pairing().assign(actor.id, data.teacher_id).await?;
    let p = glob.accounts().profile(actor).await?;
    Ok(Json(p).into_response())
}

async fn profile(glob: &Glob, actor: &Actor) -> Result<Response, HwError> {
    let p = glob.accounts().profile(actor).await?;
    Ok(Json(p).into_response())
}

async fn delete_account(glob: &Glob, actor: &Actor) -> Result<Response, HwError> {
    glob.accounts().delete(actor).await?;
    glob.keys.revoke(*actor).await;
    Ok(Json(json!({ "id": actor.id })).into_response())
}

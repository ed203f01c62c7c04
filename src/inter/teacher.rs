/*!
Subcrate for interoperation with Teacher users.
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
    homework::{Kind, Points, Status},
    policy::DenyReason,
    registry::{Change, Draft},
};
use super::*;

pub async fn api(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<Glob>>,
    Extension(actor): Extension<Actor>,
    body: String,
) -> Response {
    log::trace!("teacher::api( {:?}, ... ) called.", &actor);

    if actor.role != Role::Teacher {
        return HwError::PolicyDenied(DenyReason::NotTeacher).into_response();
    }

    let action = match header_str(&headers, ACTION) {
        Ok(s) => s,
        Err(r) => { return r; },
    };
    let action_value = HeaderValue::from_str(action).unwrap_or_else(|_| HeaderValue::from_static(""));

    let res = match action {
        "populate-homeworks" => populate_homeworks(&glob, &actor).await,
        "populate-students" => populate_students(&glob, &actor).await,
        "add-homework" => add_homework(&glob, &actor, &body).await,
        "view-homework" => view_homework(&glob, &actor, &body).await,
        "check-homework" => check_homework(&glob, &actor, &body).await,
        "delete-homework" => delete_homework(&glob, &actor, &body).await,
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
struct HomeworkData {
    name: String,
    description: String,
    #[serde(default)]
    current_points: u8,
    max_points: u8,
    kind: String,
    status: Option<String>,
    student_id: i64,
}

impl HomeworkData {
    fn into_draft(self) -> Result<Draft, HwError> {
        let initial_status = match self.status {
            Some(s) => Some(s.parse::<Status>()?),
            None => None,
        };

        Ok(Draft {
            name: self.name,
            description: self.description,
            current_points: Points::new(self.current_points)?,
            max_points: Points::new(self.max_points)?,
            kind: self.kind.parse::<Kind>()?,
            initial_status,
            student_id: self.student_id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct IdData {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CheckData {
    id: i64,
    current_points: u8,
}

async fn populate_homeworks(glob: &Glob, actor: &Actor) -> Result<Response, HwError> {
    let registry = glob.registry();
    let pairing = glob.pairing();
    let (homeworks, students) = tokio::join!(
        registry.list_by_teacher(actor.id),
        pairing.students_of(actor.id),
    );

    Ok(Json(json!({
        "homeworks": homeworks?,
        "students": students?,
    })).into_response())
}

async fn populate_students(glob: &Glob, actor: &Actor) -> Result<Response, HwError> {
    let students = glob.pairing().students_of(actor.id).await?;
    Ok(Json(students).into_response())
}

async fn add_homework(glob: &Glob, actor: &Actor, body: &str) -> Result<Response, HwError> {
    let data: HomeworkData = parse_body(body)?;
    let hw = glob.registry().create(actor, data.into_draft()?).await?;
    Ok((StatusCode::CREATED, Json(hw)).into_response())
}

async fn view_homework(glob: &Glob, actor: &Actor, body: &str) -> Result<Response, HwError> {
    let data: IdData = parse_body(body)?;
    let view = glob.registry().view(actor, data.id).await?;
    Ok(Json(view).into_response())
}

async fn check_homework(glob: &Glob, actor: &Actor, body: &str) -> Result<Response, HwError> {
    let data: CheckData = parse_body(body)?;
    let points = Points::new(data.current_points)?;
    let hw = glob.registry().apply_transition(actor, data.id, Change::grade(points)).await?;
    Ok(Json(hw).into_response())
}

async fn delete_homework(glob: &Glob, actor: &Actor, body: &str) -> Result<Response, HwError> {
    let data: IdData = parse_body(body)?;
    glob.registry().delete(actor, data.id).await?;
    Ok(Json(json!({ "id": data.id })).into_response())
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

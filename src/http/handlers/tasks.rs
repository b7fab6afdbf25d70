//! Task CRUD.
//!
//! Any authenticated caller may read; only the owner or an admin may modify.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::policy;
use crate::http::error::ApiError;
use crate::http::handlers::auth::MessageResponse;
use crate::http::server::AppState;
use crate::security::{AuthError, CurrentUser};
use crate::store::{NewTask, Page, StoreError, Task, TaskChanges};

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// RFC 3339; empty means none.
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    /// RFC 3339; `""` clears the due date.
    pub due_date: Option<String>,
    pub completed: Option<bool>,
}

/// Raw query values; parsed leniently by [`Page::from_query`].
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

pub async fn create_task(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    // A validly signed token can outlive its user (e.g. a reset database).
    if state.store.find_user_by_id(claims.user_id)?.is_none() {
        tracing::debug!(user_id = claims.user_id, "Token subject has no account");
        return Err(ApiError::from(AuthError::InvalidToken));
    }

    let Json(input) = body?;

    if input.title.trim().is_empty() {
        return Err(ApiError::bad_request("title is required"));
    }
    let due_date = match input.due_date.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(parse_due_date(raw)?),
    };

    let task = state.store.create_task(
        claims.user_id,
        NewTask {
            title: input.title,
            description: input.description,
            category: input.category,
            due_date,
        },
    )?;

    tracing::info!(task_id = task.id, owner_id = claims.user_id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let page = Page::from_query(query.page.as_deref(), query.page_size.as_deref());
    Ok(Json(state.store.list_tasks(page)?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let id = parse_task_id(&raw_id)?;
    let task = state.store.get_task(id)?.ok_or_else(task_not_found)?;
    Ok(Json(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(raw_id): Path<String>,
    body: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let id = parse_task_id(&raw_id)?;
    let task = state.store.get_task(id)?.ok_or_else(task_not_found)?;
    if !policy::can_modify(&claims, task.owner_id) {
        return Err(not_allowed());
    }

    let Json(input) = body?;
    let due_date = match input.due_date.as_deref() {
        None => None,
        Some("") => Some(None),
        Some(raw) => Some(Some(parse_due_date(raw)?)),
    };

    let changes = TaskChanges {
        title: input.title,
        description: input.description,
        category: input.category,
        due_date,
        completed: input.completed,
    };

    let updated = state.store.update_task(id, changes).map_err(|e| match e {
        StoreError::NotFound => task_not_found(),
        other => other.into(),
    })?;

    tracing::info!(task_id = id, user_id = claims.user_id, "Task updated");
    Ok(Json(updated))
}

pub async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_task_id(&raw_id)?;
    let task = state.store.get_task(id)?.ok_or_else(task_not_found)?;
    if !policy::can_modify(&claims, task.owner_id) {
        return Err(not_allowed());
    }

    state.store.delete_task(id).map_err(|e| match e {
        StoreError::NotFound => task_not_found(),
        other => other.into(),
    })?;

    tracing::info!(task_id = id, user_id = claims.user_id, "Task deleted");
    Ok(Json(MessageResponse { message: "deleted" }))
}

fn task_not_found() -> ApiError {
    ApiError::NotFound("task not found".to_string())
}

fn not_allowed() -> ApiError {
    ApiError::Forbidden("not allowed".to_string())
}

/// Ids that are not positive integers cannot name a task.
fn parse_task_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(task_not_found)
}

fn parse_due_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::bad_request("invalid due_date, use RFC3339"))
}

/// Task endpoints
///
/// All routes require an access token; creation and deletion also require
/// ADMIN.
///
/// # Endpoints
///
/// - `GET /tasks` - Cursor-paginated listing
/// - `GET /tasks/{id}`
/// - `POST /tasks` - Create; the caller becomes the creator
/// - `PATCH /tasks/{id}` - Update; assignees who are not admins may only
///   change the status
/// - `DELETE /tasks/{id}` - Soft delete
///
/// # Listing
///
/// ```text
/// GET /api/v1/tasks?status=TODO&search=report&sort=-created_at&limit=20
/// GET /api/v1/tasks?sort=-created_at&limit=20&cursor=eyJsYXN0X2lkIjo...
/// ```
///
/// `metadata` carries `limit`, `has_next` and `next_cursor`. A cursor must be
/// sent back with the same `sort` it was issued for.

use crate::{
    error::{ApiError, ApiResult},
    extract::{Id, JsonBody, ValidatedJson, ValidatedQuery},
    middleware::auth::CurrentUser,
    response::ApiResponse,
    session::DbSession,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use taskmm_shared::auth::authorization::{task_update_scope, UpdateScope};
use taskmm_shared::models::task::{
    NewTask, Task, TaskPriority, TaskStatus, TaskUpdate, SEARCHABLE_COLUMNS,
};
use taskmm_shared::pagination::{CursorRequest, Filters, Search};
use validator::Validate;

/// Page size when `limit` is omitted
pub const DEFAULT_LIMIT: u32 = 10;

const NOT_FOUND: &str = "No task data found!";

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListTasksQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<i64>,
    pub search: Option<String>,

    /// Column name, `-` prefixed for descending
    pub sort: Option<String>,
    pub cursor: Option<String>,

    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

impl ListTasksQuery {
    fn into_request(self) -> CursorRequest {
        CursorRequest {
            filters: Filters::new()
                .eq_opt("status", self.status.map(|s| s.as_str()))
                .eq_opt("priority", self.priority.map(|p| p.as_str()))
                .eq_opt("assignee_id", self.assignee_id),
            search: Search::new(self.search.as_deref(), SEARCHABLE_COLUMNS),
            sort: self.sort,
            cursor: self.cursor.filter(|c| !c.is_empty()),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,

    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,

    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<i64>,
}

impl From<UpdateTaskRequest> for TaskUpdate {
    fn from(req: UpdateTaskRequest) -> Self {
        TaskUpdate {
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            due_date: req.due_date,
            assignee_id: req.assignee_id,
        }
    }
}

pub async fn list_tasks(
    session: DbSession,
    ValidatedQuery(query): ValidatedQuery<ListTasksQuery>,
) -> ApiResult<ApiResponse<Vec<Task>>> {
    let request = query.into_request();

    let mut conn = session.connection().await?;
    let page = Task::paginate(&mut conn, &request).await?;

    Ok(ApiResponse::cursor_page(page))
}

pub async fn get_task(session: DbSession, Id(id): Id) -> ApiResult<ApiResponse<Task>> {
    let mut conn = session.connection().await?;

    let task = Task::find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;

    Ok(ApiResponse::ok(task))
}

/// Creates a task owned by the caller
///
/// # Errors
///
/// - `422 Unprocessable Entity`: validation failed or `assignee_id` does not
///   name an existing user
pub async fn create_task(
    session: DbSession,
    current: CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateTaskRequest>,
) -> ApiResult<ApiResponse<Task>> {
    let mut conn = session.connection().await?;

    let task = Task::create(
        &mut conn,
        NewTask {
            title: req.title,
            description: req.description,
            status: req.status.unwrap_or_default(),
            priority: req.priority.unwrap_or_default(),
            due_date: req.due_date,
            assignee_id: req.assignee_id,
            creator_id: current.user.id,
        },
    )
    .await?;

    tracing::info!(task_id = task.id, creator_id = task.creator_id, "Task created");

    Ok(ApiResponse::created(task))
}

/// Updates a task
///
/// Admins may change every field. The assignee may only change the status;
/// any other field in the request is ignored and not validated.
///
/// # Errors
///
/// - `404 Not Found`: no live task with this id (checked first)
/// - `403 Forbidden`: caller is neither an admin nor the assignee
/// - `422 Unprocessable Entity`: a field the caller may change breaks a rule
pub async fn update_task(
    session: DbSession,
    current: CurrentUser,
    Id(id): Id,
    JsonBody(req): JsonBody<UpdateTaskRequest>,
) -> ApiResult<ApiResponse<Task>> {
    let mut conn = session.connection().await?;

    let task = Task::find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;

    let changes = match task_update_scope(&current.user, &task)? {
        UpdateScope::Full => {
            req.validate()?;
            TaskUpdate::from(req)
        }
        UpdateScope::StatusOnly => TaskUpdate::from(req).restrict_to_status(),
    };

    let task = Task::update(&mut conn, id, changes)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;

    Ok(ApiResponse::ok(task))
}

pub async fn delete_task(session: DbSession, Id(id): Id) -> ApiResult<ApiResponse<Vec<Task>>> {
    let mut conn = session.connection().await?;

    if !Task::soft_delete(&mut conn, id).await? {
        return Err(ApiError::NotFound(NOT_FOUND.to_string()));
    }

    tracing::info!(task_id = id, "Task deleted");

    Ok(ApiResponse::ok(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::Uri;
    use taskmm_shared::pagination::{FilterValue, SqlValue};

    fn parse(query: &str) -> Option<ListTasksQuery> {
        let uri: Uri = format!("/tasks?{}", query).parse().unwrap();
        Query::try_from_uri(&uri).ok().map(|Query(q)| q)
    }

    #[test]
    fn test_query_parsing() {
        let query = parse("status=IN_PROGRESS&assignee_id=4&search=%20report%20&limit=5").unwrap();

        assert_eq!(query.status, Some(TaskStatus::InProgress));
        let request = query.into_request();

        let filters: Vec<_> = request.filters.iter().collect();
        assert_eq!(
            filters,
            vec![
                ("status", &FilterValue::One(SqlValue::Text("IN_PROGRESS".to_string()))),
                ("assignee_id", &FilterValue::One(SqlValue::Int(4))),
            ]
        );
        assert_eq!(request.search.unwrap().text, "report");
        assert_eq!(request.limit, 5);
    }

    #[test]
    fn test_query_defaults() {
        let request = ListTasksQuery {
            cursor: Some(String::new()),
            ..Default::default()
        }
        .into_request();

        assert!(request.filters.is_empty());
        assert!(request.search.is_none());
        assert!(request.cursor.is_none());
        assert_eq!(request.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_limit_bounds() {
        let query = ListTasksQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert!(query.validate().is_err());

        let query = ListTasksQuery {
            limit: Some(100),
            ..Default::default()
        };
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(parse("status=ARCHIVED").is_none());
    }

    #[test]
    fn test_create_request_rules() {
        let req: CreateTaskRequest = serde_json::from_str(r#"{"title":""}"#).unwrap();
        assert!(req.validate().is_err());

        let req: CreateTaskRequest = serde_json::from_str(
            r#"{"title":"Report","priority":"HIGH","due_date":"2024-12-31T23:59:59Z"}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.priority, Some(TaskPriority::High));
        assert!(req.status.is_none());
    }
}

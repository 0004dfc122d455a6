/// Task model and database operations
///
/// Tasks are created by administrators and handed to an assignee. The
/// assignee may move a task through its statuses; every other field is
/// reserved for administrators (see [`TaskUpdate::restrict_to_status`]).
///
/// # Status Values
///
/// ```text
/// TODO ──> IN_PROGRESS ──> DONE
///   ^                        │
///   └────────────────────────┘
/// ```
///
/// Any status may be set from any other; the diagram shows the usual flow.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id BIGSERIAL PRIMARY KEY,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     status TEXT NOT NULL DEFAULT 'TODO'
///         CHECK (status IN ('TODO', 'IN_PROGRESS', 'DONE')),
///     priority TEXT NOT NULL DEFAULT 'MEDIUM'
///         CHECK (priority IN ('LOW', 'MEDIUM', 'HIGH')),
///     due_date TIMESTAMPTZ,
///     assignee_id BIGINT REFERENCES users(id) ON DELETE SET NULL,
///     creator_id BIGINT NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskmm_shared::models::task::{NewTask, Task, TaskPriority, TaskStatus};
///
/// # async fn example(conn: &mut sqlx::PgConnection, admin_id: i64, user_id: i64) -> Result<(), Box<dyn std::error::Error>> {
/// let task = Task::create(conn, NewTask {
///     title: "Write the quarterly report".to_string(),
///     description: None,
///     status: TaskStatus::Todo,
///     priority: TaskPriority::High,
///     due_date: None,
///     assignee_id: Some(user_id),
///     creator_id: admin_id,
/// })
/// .await?;
///
/// assert_eq!(task.status, TaskStatus::Todo);
/// # Ok(())
/// # }
/// ```
use super::{decode_enum, ParseEnumError, RepositoryError};
use crate::pagination::{paginate_cursor, Column, CursorPage, CursorRequest, Entity, PaginationError, SqlValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder, Row};
use std::fmt;
use std::str::FromStr;

const TASK_COLUMNS: &str =
    "id, title, description, status, priority, due_date, assignee_id, creator_id, created_at, updated_at";

/// Columns matched by free-text search
pub const SEARCHABLE_COLUMNS: &[&str] = &["title", "description"];

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TODO" => Ok(TaskStatus::Todo),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "DONE" => Ok(TaskStatus::Done),
            other => Err(ParseEnumError {
                kind: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "LOW",
            TaskPriority::Medium => "MEDIUM",
            TaskPriority::High => "HIGH",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(TaskPriority::Low),
            "MEDIUM" => Ok(TaskPriority::Medium),
            "HIGH" => Ok(TaskPriority::High),
            other => Err(ParseEnumError {
                kind: "priority",
                value: other.to_string(),
            }),
        }
    }
}

/// Task record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<i64>,
    pub creator_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Task {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            status: decode_enum(row, "status")?,
            priority: decode_enum(row, "priority")?,
            due_date: row.try_get("due_date")?,
            assignee_id: row.try_get("assignee_id")?,
            creator_id: row.try_get("creator_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<i64>,
    pub creator_id: i64,
}

/// Partial task update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<i64>,
}

impl TaskUpdate {
    /// Drops every change except the status
    ///
    /// Applied to updates from an assignee who is not an administrator, so
    /// the stored title, description, priority, due date and assignee are
    /// kept as they are.
    pub fn restrict_to_status(self) -> Self {
        Self {
            status: self.status,
            ..Default::default()
        }
    }
}

impl Entity for Task {
    const TABLE: &'static str = "tasks";
    const SELECT: &'static str = TASK_COLUMNS;
    const PRIMARY_KEY: &'static Column = &Column::big_int("id");
    const COLUMNS: &'static [Column] = &[
        Column::big_int("id"),
        Column::text("title"),
        Column::text("description").nullable(),
        Column::text("status"),
        Column::text("priority"),
        Column::timestamp("due_date").nullable(),
        Column::big_int("assignee_id").nullable(),
        Column::big_int("creator_id"),
        Column::timestamp("created_at"),
        Column::timestamp("updated_at"),
    ];

    fn value_of(&self, column: &str) -> SqlValue {
        match column {
            "id" => self.id.into(),
            "title" => self.title.as_str().into(),
            "description" => self.description.clone().into(),
            "status" => self.status.as_str().into(),
            "priority" => self.priority.as_str().into(),
            "due_date" => self.due_date.into(),
            "assignee_id" => self.assignee_id.into(),
            "creator_id" => self.creator_id.into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => SqlValue::Null,
        }
    }
}

impl Task {
    /// Inserts a new task
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::MissingReference`] with field `assignee_id`
    /// (or `creator_id`) when the referenced user does not exist.
    pub async fn create(conn: &mut PgConnection, data: NewTask) -> Result<Self, RepositoryError> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (title, description, status, priority, due_date, assignee_id, creator_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, title, description, status, priority, due_date,
                      assignee_id, creator_id, created_at, updated_at
            "#,
        )
        .bind(data.title)
        .bind(data.description)
        .bind(data.status.as_str())
        .bind(data.priority.as_str())
        .bind(data.due_date)
        .bind(data.assignee_id)
        .bind(data.creator_id)
        .fetch_one(conn)
        .await?;

        Ok(task)
    }

    /// Finds a live task by ID
    pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<Self>, RepositoryError> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, title, description, status, priority, due_date,
                   assignee_id, creator_id, created_at, updated_at
            FROM tasks
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(task)
    }

    /// Cursor-paginated listing with filters, search and sort
    pub async fn paginate(
        conn: &mut PgConnection,
        request: &CursorRequest,
    ) -> Result<CursorPage<Self>, PaginationError> {
        paginate_cursor::<Task>(conn, request).await
    }

    /// Applies a partial update and bumps `updated_at`
    ///
    /// Returns `None` if no live task has this ID.
    pub async fn update(
        conn: &mut PgConnection,
        id: i64,
        data: TaskUpdate,
    ) -> Result<Option<Self>, RepositoryError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE tasks SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(status) = data.status {
            qb.push(", status = ").push_bind(status.as_str());
        }
        if let Some(priority) = data.priority {
            qb.push(", priority = ").push_bind(priority.as_str());
        }
        if let Some(due_date) = data.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }
        if let Some(assignee_id) = data.assignee_id {
            qb.push(", assignee_id = ").push_bind(assignee_id);
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND deleted_at IS NULL RETURNING ")
            .push(TASK_COLUMNS);

        let task = qb.build_query_as::<Task>().fetch_optional(conn).await?;

        Ok(task)
    }

    /// Marks a live task as deleted
    pub async fn soft_delete(conn: &mut PgConnection, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Demo data for development databases
///
/// Creates an administrator, two users (all with password `password`) and a
/// handful of tasks spread across statuses and assignees. Seeding is skipped
/// when any user exists, so running it against a populated database is a
/// no-op.

use crate::auth::password::hash_password_blocking;
use crate::models::task::{NewTask, Task, TaskPriority, TaskStatus};
use crate::models::user::{NewUser, Role, User};
use crate::models::RepositoryError;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::PgPool;
use tracing::info;

/// Password shared by every seeded account
pub const SEED_PASSWORD: &str = "password";

/// Seeding errors
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Password(#[from] crate::auth::password::PasswordError),
}

/// What a seeding run inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub tasks: usize,
}

const SEED_USERS: [(&str, &str, Role); 3] = [
    ("Admin", "admin@gmail.com", Role::Admin),
    ("User One", "userone@gmail.com", Role::User),
    ("User Two", "usertwo@gmail.com", Role::User),
];

/// (title, status, priority, due month in 2024, assignee index into SEED_USERS)
const SEED_TASKS: [(&str, TaskStatus, TaskPriority, u32, Option<usize>); 6] = [
    ("Initial Task", TaskStatus::Todo, TaskPriority::High, 12, None),
    ("Second Task", TaskStatus::InProgress, TaskPriority::Medium, 11, Some(1)),
    ("Third Task", TaskStatus::Done, TaskPriority::Low, 10, Some(1)),
    ("Fourth Task", TaskStatus::Todo, TaskPriority::High, 9, Some(1)),
    ("Fifth Task", TaskStatus::InProgress, TaskPriority::Medium, 8, Some(2)),
    ("Sixth Task", TaskStatus::Done, TaskPriority::Low, 7, Some(2)),
];

fn end_of_month_2024(month: u32) -> Option<DateTime<Utc>> {
    let (year, next) = if month == 12 { (2025, 1) } else { (2024, month + 1) };
    Utc.with_ymd_and_hms(year, next, 1, 0, 0, 0)
        .single()
        .map(|start| start - chrono::Duration::seconds(1))
}

/// Inserts the demo users and tasks in one transaction
///
/// Returns an all-zero summary when the users table already has rows.
pub async fn seed(pool: &PgPool) -> Result<SeedSummary, SeedError> {
    let mut tx = pool.begin().await?;

    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *tx)
        .await?;
    if existing > 0 {
        info!(existing_users = existing, "Skipping seed, users already present");
        return Ok(SeedSummary { users: 0, tasks: 0 });
    }

    let password_hash = hash_password_blocking(SEED_PASSWORD.to_string()).await?;

    let mut users = Vec::with_capacity(SEED_USERS.len());
    for (name, email, role) in SEED_USERS {
        let user = User::create(
            &mut tx,
            NewUser {
                name: Some(name.to_string()),
                email: email.to_string(),
                role,
                password_hash: password_hash.clone(),
            },
        )
        .await?;
        users.push(user);
    }

    let creator_id = users[0].id;
    let mut tasks = 0;
    for (index, (title, status, priority, due_month, assignee)) in SEED_TASKS.into_iter().enumerate() {
        Task::create(
            &mut tx,
            NewTask {
                title: title.to_string(),
                description: Some(format!("This is task number {}", index + 1)),
                status,
                priority,
                due_date: end_of_month_2024(due_month),
                assignee_id: assignee.map(|i| users[i].id),
                creator_id,
            },
        )
        .await?;
        tasks += 1;
    }

    tx.commit().await?;

    info!(users = users.len(), tasks, "Seeded database");
    Ok(SeedSummary {
        users: users.len(),
        tasks,
    })
}

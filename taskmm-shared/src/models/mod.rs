/// Database models for taskmm
///
/// Each model doubles as its repository: the CRUD operations live in an
/// `impl` block on the row type and take a `&mut PgConnection`, so callers
/// decide which transaction they run in.
///
/// # Models
///
/// - `user`: accounts, roles and credentials
/// - `task`: work items assigned to users
///
/// Both tables are soft-deleted: rows with a `deleted_at` value are excluded
/// from every read.
///
/// # Example
///
/// ```no_run
/// use taskmm_shared::models::user::{NewUser, Role, User};
///
/// # async fn example(conn: &mut sqlx::PgConnection) -> Result<(), Box<dyn std::error::Error>> {
/// let user = User::create(conn, NewUser {
///     name: Some("User One".to_string()),
///     email: "userone@gmail.com".to_string(),
///     role: Role::User,
///     password_hash: "$argon2id$...".to_string(),
/// })
/// .await?;
///
/// let found = User::find_by_id(conn, user.id).await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```

pub mod task;
pub mod user;

use sqlx::postgres::PgRow;
use sqlx::Row;
use std::str::FromStr;

/// Repository errors
///
/// Constraint violations are classified so the transport layer can report
/// them as field-level validation errors.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A unique constraint rejected the write
    #[error("{field} already exists")]
    Duplicate { field: String },

    /// A foreign key pointed at a missing row
    #[error("{field} not found")]
    MissingReference { field: String },

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let field = || constraint_field(db_err.constraint(), db_err.table());

            if db_err.is_unique_violation() {
                return RepositoryError::Duplicate { field: field() };
            }
            if db_err.is_foreign_key_violation() {
                return RepositoryError::MissingReference { field: field() };
            }
        }
        RepositoryError::Database(err)
    }
}

/// Derives the offending column from a Postgres constraint name
///
/// Default constraint names follow `{table}_{column}_{key|fkey}`, so
/// `users_email_key` on `users` yields `email`.
fn constraint_field(constraint: Option<&str>, table: Option<&str>) -> String {
    let Some(constraint) = constraint else {
        return "unknown".to_string();
    };

    let without_table = table
        .and_then(|table| constraint.strip_prefix(table))
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(constraint);

    ["_fkey", "_key", "_unique"]
        .iter()
        .find_map(|suffix| without_table.strip_suffix(suffix))
        .unwrap_or(without_table)
        .to_string()
}

/// Error for a text column holding a value outside its enum
#[derive(Debug, thiserror::Error)]
#[error("invalid {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Reads a text column and parses it into an enum
pub(crate) fn decode_enum<T>(row: &PgRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = ParseEnumError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: ParseEnumError| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_field() {
        assert_eq!(constraint_field(Some("users_email_key"), Some("users")), "email");
        assert_eq!(
            constraint_field(Some("tasks_assignee_id_fkey"), Some("tasks")),
            "assignee_id"
        );
        assert_eq!(constraint_field(Some("uq_email_unique"), None), "uq_email");
        assert_eq!(constraint_field(None, Some("users")), "unknown");
    }

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Duplicate {
            field: "email".to_string(),
        };
        assert_eq!(err.to_string(), "email already exists");

        let err = RepositoryError::MissingReference {
            field: "assignee_id".to_string(),
        };
        assert_eq!(err.to_string(), "assignee_id not found");
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = RepositoryError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::RowNotFound)));
    }
}

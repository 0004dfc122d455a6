/// User model and database operations
///
/// Users own credentials (an Argon2id hash) and carry a role that gates the
/// administrative routes. Deleting a user only stamps `deleted_at`; every
/// read below skips such rows, so a deleted user can no longer log in or
/// authenticate with a token issued before the deletion.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     name VARCHAR(25),
///     email VARCHAR(40) NOT NULL,
///     password_hash TEXT NOT NULL,
///     role TEXT NOT NULL DEFAULT 'USER' CHECK (role IN ('USER', 'ADMIN')),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```
///
/// Email uniqueness is enforced among live rows only (`users_email_key`, a
/// partial unique index), so an address can be reused after its owner is
/// deleted.
use super::{decode_enum, ParseEnumError, RepositoryError};
use crate::pagination::{paginate_offset, Column, Entity, Filters, Page, PaginationError, SqlValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder, Row};
use std::fmt;
use std::str::FromStr;

/// Columns returned by every user read that exposes the user publicly
const USER_COLUMNS: &str = "id, name, email, role, created_at, updated_at";

/// Access role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(ParseEnumError {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// User as exposed by the API (never carries the password hash)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            role: decode_enum(row, "role")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Login lookup result: identity plus the stored hash
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
}

impl<'r> FromRow<'r, PgRow> for UserCredentials {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            role: decode_enum(row, "role")?,
            password_hash: row.try_get("password_hash")?,
        })
    }
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
    /// Argon2id PHC string, never the plaintext
    pub password_hash: String,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none()
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const SELECT: &'static str = USER_COLUMNS;
    const PRIMARY_KEY: &'static Column = &Column::big_int("id");
    const COLUMNS: &'static [Column] = &[
        Column::big_int("id"),
        Column::text("name").nullable(),
        Column::text("email"),
        Column::text("role"),
        Column::timestamp("created_at"),
        Column::timestamp("updated_at"),
    ];

    fn value_of(&self, column: &str) -> SqlValue {
        match column {
            "id" => self.id.into(),
            "name" => self.name.clone().into(),
            "email" => self.email.as_str().into(),
            "role" => self.role.as_str().into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => SqlValue::Null,
        }
    }
}

impl User {
    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Duplicate`] with field `email` when a live
    /// user already holds the address.
    pub async fn create(conn: &mut PgConnection, data: NewUser) -> Result<Self, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, role, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, role, created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.email)
        .bind(data.role.as_str())
        .bind(data.password_hash)
        .fetch_one(conn)
        .await?;

        Ok(user)
    }

    /// Finds a live user by ID
    pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<Self>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, created_at, updated_at
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(user)
    }

    /// Finds a live user by email address (exact match)
    pub async fn find_by_email(
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<Option<Self>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, created_at, updated_at
            FROM users
            WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(conn)
        .await?;

        Ok(user)
    }

    /// Loads the stored hash for login
    pub async fn find_credentials_by_email(
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let credentials = sqlx::query_as::<_, UserCredentials>(
            r#"
            SELECT id, email, role, password_hash
            FROM users
            WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(conn)
        .await?;

        Ok(credentials)
    }

    /// Lists every live user, oldest first
    pub async fn list_all(conn: &mut PgConnection) -> Result<Vec<Self>, RepositoryError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, created_at, updated_at
            FROM users
            WHERE deleted_at IS NULL
            ORDER BY id ASC
            "#,
        )
        .fetch_all(conn)
        .await?;

        Ok(users)
    }

    /// Offset-paginated listing of live users
    pub async fn paginate(
        conn: &mut PgConnection,
        filters: &Filters,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Self>, PaginationError> {
        paginate_offset::<User>(conn, filters, page, per_page).await
    }

    /// Applies a partial update and bumps `updated_at`
    ///
    /// # Returns
    ///
    /// The updated user, or `None` if no live user has this ID.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Duplicate`] when the new email is taken.
    pub async fn update(
        conn: &mut PgConnection,
        id: i64,
        data: UpdateUser,
    ) -> Result<Option<Self>, RepositoryError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE users SET updated_at = NOW()");

        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(email) = data.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(role) = data.role {
            qb.push(", role = ").push_bind(role.as_str());
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND deleted_at IS NULL RETURNING ")
            .push(USER_COLUMNS);

        let user = qb.build_query_as::<User>().fetch_optional(conn).await?;

        Ok(user)
    }

    /// Marks a live user as deleted
    ///
    /// # Returns
    ///
    /// True if a row was stamped, false if the user was missing or already
    /// deleted.
    pub async fn soft_delete(conn: &mut PgConnection, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
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

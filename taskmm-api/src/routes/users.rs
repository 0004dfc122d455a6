/// User management endpoints
///
/// All routes require an access token. Everything except the listing also
/// requires the ADMIN role (see the route table).
///
/// # Endpoints
///
/// - `GET /users` - Full list, or an offset page when `page` and `per_page`
///   are both given
/// - `GET /users/find/{id}`
/// - `POST /users` - Create a user with the placeholder password
/// - `POST /users/update/{id}` - Partial update
/// - `DELETE /users/delete/{id}` - Soft delete

use crate::{
    error::{ApiError, ApiResult},
    extract::{Id, ValidatedJson, ValidatedQuery},
    response::ApiResponse,
    session::DbSession,
};
use serde::Deserialize;
use taskmm_shared::auth::password::{hash_password_blocking, DEFAULT_PASSWORD};
use taskmm_shared::models::user::{NewUser, Role, UpdateUser, User};
use taskmm_shared::pagination::Filters;
use validator::Validate;

const NOT_FOUND: &str = "No user data found!";

#[derive(Debug, Deserialize, Validate)]
pub struct ListUsersQuery {
    #[validate(range(min = 1))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 100))]
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(max = 25, message = "Name must be at most 25 characters"))]
    pub name: Option<String>,

    #[validate(
        email(message = "Invalid email format"),
        length(max = 40, message = "Email must be at most 40 characters")
    )]
    pub email: String,

    pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(max = 25, message = "Name must be at most 25 characters"))]
    pub name: Option<String>,

    #[validate(
        email(message = "Invalid email format"),
        length(max = 40, message = "Email must be at most 40 characters")
    )]
    pub email: Option<String>,

    pub role: Option<Role>,
}

impl From<UpdateUserRequest> for UpdateUser {
    fn from(req: UpdateUserRequest) -> Self {
        UpdateUser {
            name: req.name,
            email: req.email,
            role: req.role,
        }
    }
}

pub async fn list_users(
    session: DbSession,
    ValidatedQuery(query): ValidatedQuery<ListUsersQuery>,
) -> ApiResult<ApiResponse<Vec<User>>> {
    let mut conn = session.connection().await?;

    match (query.page, query.per_page) {
        (Some(page), Some(per_page)) => {
            let page = User::paginate(&mut conn, &Filters::new(), page, per_page).await?;
            Ok(ApiResponse::page(page))
        }
        _ => Ok(ApiResponse::ok(User::list_all(&mut conn).await?)),
    }
}

pub async fn find_user(session: DbSession, Id(id): Id) -> ApiResult<ApiResponse<User>> {
    let mut conn = session.connection().await?;

    let user = User::find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;

    Ok(ApiResponse::ok(user))
}

/// Creates a user; the role defaults to USER
///
/// # Errors
///
/// - `422 Unprocessable Entity`: validation failed or the email is taken
pub async fn create_user(
    session: DbSession,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> ApiResult<ApiResponse<User>> {
    let password_hash = hash_password_blocking(DEFAULT_PASSWORD.to_string()).await?;

    let mut conn = session.connection().await?;
    let user = User::create(
        &mut conn,
        NewUser {
            name: req.name,
            email: req.email,
            role: req.role.unwrap_or_default(),
            password_hash,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, role = %user.role, "User created");

    Ok(ApiResponse::created(user))
}

pub async fn update_user(
    session: DbSession,
    Id(id): Id,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<ApiResponse<User>> {
    let mut conn = session.connection().await?;

    let user = User::update(&mut conn, id, req.into())
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;

    Ok(ApiResponse::ok(user))
}

/// Soft-deletes a user; deleting twice is a 404
pub async fn delete_user(session: DbSession, Id(id): Id) -> ApiResult<ApiResponse<Vec<User>>> {
    let mut conn = session.connection().await?;

    if !User::soft_delete(&mut conn, id).await? {
        return Err(ApiError::NotFound(NOT_FOUND.to_string()));
    }

    tracing::info!(user_id = id, "User deleted");

    Ok(ApiResponse::ok(Vec::new()))
}

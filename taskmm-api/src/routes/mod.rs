/// API route handlers and the route table
///
/// Every versioned endpoint is declared once in [`route_table`] with its
/// method, path (relative to the API prefix), handler and guards. Guards are
/// listed in the order they run.
///
/// - `health`: Health check endpoint (unprefixed, registered in `app`)
/// - `auth`: signup, login, profile, logout, token refresh
/// - `users`: user management
/// - `tasks`: task management

pub mod auth;
pub mod health;
pub mod tasks;
pub mod users;

use crate::app::AppState;
use crate::middleware::auth::{access_token_guard, refresh_token_guard, role_guard};
use axum::{
    handler::Handler,
    http::Method,
    middleware::from_fn_with_state,
    routing::{self, MethodRouter},
    Router,
};
use taskmm_shared::models::user::Role;

/// Precondition checked before a handler runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Valid, unrevoked access token; loads the current user
    AccessToken,

    /// Valid, unrevoked refresh token; loads the current user
    RefreshToken,

    /// Current user holds one of these roles; needs a token guard before it
    Roles(&'static [Role]),
}

const AUTHENTICATED: &[Guard] = &[Guard::AccessToken];
const ADMIN_ONLY: &[Guard] = &[Guard::AccessToken, Guard::Roles(&[Role::Admin])];

/// One entry of the route table
pub struct RouteDef {
    pub method: Method,
    pub path: &'static str,
    pub guards: &'static [Guard],
    handler: MethodRouter<AppState>,
}

impl RouteDef {
    fn get<H, T>(path: &'static str, handler: H, guards: &'static [Guard]) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self::new(Method::GET, path, routing::get(handler), guards)
    }

    fn post<H, T>(path: &'static str, handler: H, guards: &'static [Guard]) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self::new(Method::POST, path, routing::post(handler), guards)
    }

    fn patch<H, T>(path: &'static str, handler: H, guards: &'static [Guard]) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self::new(Method::PATCH, path, routing::patch(handler), guards)
    }

    fn delete<H, T>(path: &'static str, handler: H, guards: &'static [Guard]) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self::new(Method::DELETE, path, routing::delete(handler), guards)
    }

    fn new(
        method: Method,
        path: &'static str,
        handler: MethodRouter<AppState>,
        guards: &'static [Guard],
    ) -> Self {
        Self {
            method,
            path,
            guards,
            handler,
        }
    }

    /// Handler wrapped in its guards
    fn into_method_router(self, state: &AppState) -> MethodRouter<AppState> {
        // The last route_layer applied runs first
        self.guards.iter().rev().fold(self.handler, |router, guard| match *guard {
            Guard::AccessToken => {
                router.route_layer(from_fn_with_state(state.auth.clone(), access_token_guard))
            }
            Guard::RefreshToken => {
                router.route_layer(from_fn_with_state(state.auth.clone(), refresh_token_guard))
            }
            Guard::Roles(roles) => router.route_layer(from_fn_with_state(roles, role_guard)),
        })
    }
}

/// Every versioned endpoint
pub fn route_table() -> Vec<RouteDef> {
    vec![
        // Auth
        RouteDef::post("/auth/signup", auth::signup, &[]),
        RouteDef::post("/auth/login", auth::login, &[]),
        RouteDef::get("/auth/profile", auth::profile, AUTHENTICATED),
        RouteDef::get("/auth/logout", auth::logout, AUTHENTICATED),
        RouteDef::get("/auth/refresh_token", auth::refresh_token, &[Guard::RefreshToken]),
        // Users
        RouteDef::get("/users", users::list_users, AUTHENTICATED),
        RouteDef::get("/users/find/:id", users::find_user, ADMIN_ONLY),
        RouteDef::post("/users", users::create_user, ADMIN_ONLY),
        RouteDef::post("/users/update/:id", users::update_user, ADMIN_ONLY),
        RouteDef::delete("/users/delete/:id", users::delete_user, ADMIN_ONLY),
        // Tasks
        RouteDef::get("/tasks", tasks::list_tasks, AUTHENTICATED),
        RouteDef::get("/tasks/:id", tasks::get_task, AUTHENTICATED),
        RouteDef::post("/tasks", tasks::create_task, ADMIN_ONLY),
        RouteDef::patch("/tasks/:id", tasks::update_task, AUTHENTICATED),
        RouteDef::delete("/tasks/:id", tasks::delete_task, ADMIN_ONLY),
    ]
}

/// Router for the route table under `prefix`
pub fn api_router(state: &AppState, prefix: &str) -> Router<AppState> {
    route_table().into_iter().fold(Router::new(), |router, def| {
        let path = format!("{}{}", prefix, def.path);
        tracing::debug!(method = %def.method, path = %path, guards = ?def.guards, "Registering route");
        router.route(&path, def.into_method_router(state))
    })
}

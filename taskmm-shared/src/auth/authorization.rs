/// Authorization helpers and permission checks
///
/// Two checks exist:
///
/// 1. **Role gate**: a route lists the roles allowed to call it; the caller's
///    role must be one of them.
/// 2. **Task ownership**: administrators may change any field of any task;
///    other users may only change the status of a task assigned to them.
///
/// # Example
///
/// ```no_run
/// use taskmm_shared::auth::authorization::{require_role, task_update_scope, UpdateScope};
/// use taskmm_shared::models::task::{Task, TaskUpdate};
/// use taskmm_shared::models::user::{Role, User};
///
/// fn check(user: &User, task: &Task, update: TaskUpdate) -> Result<TaskUpdate, Box<dyn std::error::Error>> {
///     require_role(user.role, &[Role::Admin, Role::User])?;
///
///     let update = match task_update_scope(user, task)? {
///         UpdateScope::Full => update,
///         UpdateScope::StatusOnly => update.restrict_to_status(),
///     };
///     Ok(update)
/// }
/// ```

use crate::models::task::Task;
use crate::models::user::{Role, User};

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Caller's role is not in the route's allow list
    #[error("Insufficient permissions: {actual} is not one of {allowed:?}")]
    InsufficientRole { allowed: Vec<Role>, actual: Role },

    /// Caller is neither an administrator nor the task's assignee
    #[error("Not the assignee of task {0}")]
    NotAssignee(i64),
}

/// How much of a task the caller may change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateScope {
    /// Every field
    Full,

    /// Only `status`
    StatusOnly,
}

/// Checks that `role` is one of `allowed`
///
/// An empty allow list rejects every role.
///
/// # Example
///
/// ```
/// # use taskmm_shared::auth::authorization::require_role;
/// # use taskmm_shared::models::user::Role;
/// assert!(require_role(Role::Admin, &[Role::Admin]).is_ok());
/// assert!(require_role(Role::User, &[Role::Admin]).is_err());
/// ```
pub fn require_role(role: Role, allowed: &[Role]) -> Result<(), AuthzError> {
    if !allowed.contains(&role) {
        return Err(AuthzError::InsufficientRole {
            allowed: allowed.to_vec(),
            actual: role,
        });
    }

    Ok(())
}

/// Decides what `user` may change on `task`
///
/// # Errors
///
/// Returns [`AuthzError::NotAssignee`] when a non-administrator is not the
/// current assignee (including when the task has no assignee).
pub fn task_update_scope(user: &User, task: &Task) -> Result<UpdateScope, AuthzError> {
    if user.role == Role::Admin {
        return Ok(UpdateScope::Full);
    }

    if task.assignee_id == Some(user.id) {
        return Ok(UpdateScope::StatusOnly);
    }

    Err(AuthzError::NotAssignee(task.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{TaskPriority, TaskStatus};
    use chrono::Utc;

    fn user(id: i64, role: Role) -> User {
        User {
            id,
            name: None,
            email: format!("user{}@gmail.com", id),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn task(assignee_id: Option<i64>) -> Task {
        Task {
            id: 10,
            title: "Report".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_date: None,
            assignee_id,
            creator_id: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_require_role() {
        assert!(require_role(Role::Admin, &[Role::Admin]).is_ok());
        assert!(require_role(Role::User, &[Role::Admin, Role::User]).is_ok());

        let err = require_role(Role::User, &[Role::Admin]).unwrap_err();
        assert_eq!(
            err,
            AuthzError::InsufficientRole {
                allowed: vec![Role::Admin],
                actual: Role::User,
            }
        );
    }

    #[test]
    fn test_empty_allow_list_rejects_everyone() {
        assert!(require_role(Role::Admin, &[]).is_err());
        assert!(require_role(Role::User, &[]).is_err());
    }

    #[test]
    fn test_admin_gets_full_scope() {
        let admin = user(1, Role::Admin);
        assert_eq!(task_update_scope(&admin, &task(Some(2))), Ok(UpdateScope::Full));
        assert_eq!(task_update_scope(&admin, &task(None)), Ok(UpdateScope::Full));
    }

    #[test]
    fn test_assignee_gets_status_only() {
        let assignee = user(2, Role::User);
        assert_eq!(
            task_update_scope(&assignee, &task(Some(2))),
            Ok(UpdateScope::StatusOnly)
        );
    }

    #[test]
    fn test_other_users_are_rejected() {
        let other = user(3, Role::User);
        assert_eq!(
            task_update_scope(&other, &task(Some(2))),
            Err(AuthzError::NotAssignee(10))
        );
        assert_eq!(
            task_update_scope(&other, &task(None)),
            Err(AuthzError::NotAssignee(10))
        );
    }
}

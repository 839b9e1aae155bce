//! Role-based permission decisions for articles.
//!
//! Rules, in precedence order:
//! 1. No logged-in user: nothing is allowed.
//! 2. ADMIN and EDITOR may create, edit and delete any article.
//! 3. AUTHOR may create, and may edit or delete only articles they own.
//! 4. READER may do none of these.
//!
//! Decisions depend only on the user's role and whether the user's id equals
//! the article's owner id. The server enforces the same rules; these checks
//! let the client refuse early and hide actions the user cannot take.

use crate::model::{Role, User};
use thiserror::Error;

/// An article operation subject to permission checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Edit,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("log in to {action} articles")]
    NotLoggedIn { action: Action },
    #[error("role {role} cannot {action} articles")]
    RoleDenied { action: Action, role: Role },
    #[error("authors can only {action} their own articles")]
    NotOwner { action: Action },
}

fn role_can_create(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Editor | Role::Author)
}

fn role_can_modify_any(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Editor)
}

pub fn can_create(user: Option<&User>) -> bool {
    check(user, Action::Create, None).is_ok()
}

pub fn can_edit(user: Option<&User>, owner_id: Option<i64>) -> bool {
    check(user, Action::Edit, owner_id).is_ok()
}

pub fn can_delete(user: Option<&User>, owner_id: Option<i64>) -> bool {
    check(user, Action::Delete, owner_id).is_ok()
}

/// Decide whether `user` may perform `action` on an article owned by
/// `owner_id`. The owner is ignored for `Action::Create`.
pub fn check(user: Option<&User>, action: Action, owner_id: Option<i64>) -> Result<(), PolicyError> {
    let Some(user) = user else {
        return Err(PolicyError::NotLoggedIn { action });
    };

    match action {
        Action::Create if role_can_create(user.role) => Ok(()),
        Action::Create => Err(PolicyError::RoleDenied {
            action,
            role: user.role,
        }),
        Action::Edit | Action::Delete => {
            if role_can_modify_any(user.role) {
                Ok(())
            } else if user.role == Role::Author {
                if owner_id == Some(user.id) {
                    Ok(())
                } else {
                    Err(PolicyError::NotOwner { action })
                }
            } else {
                Err(PolicyError::RoleDenied {
                    action,
                    role: user.role,
                })
            }
        }
    }
}

/// Snapshot of what a user may do with one article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArticlePermissions {
    pub edit: bool,
    pub delete: bool,
}

impl ArticlePermissions {
    pub fn for_owner(user: Option<&User>, owner_id: Option<i64>) -> Self {
        Self {
            edit: can_edit(user, owner_id),
            delete: can_delete(user, owner_id),
        }
    }
}

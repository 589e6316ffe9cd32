//! Per-endpoint and per-object access rules.
//!
//! Every handler names its `(Resource, Action)` pair. [`check_endpoint`] runs
//! before any data is read; [`check_object`] runs once the owning user of the
//! target is known. Anonymous callers are refused with 401, authenticated
//! callers lacking rights with 403.

use super::ApiError;
use crate::domain::Viewer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    Recipe,
    Tag,
    Ingredient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    Destroy,
    Me,
    SetPassword,
    Subscribe,
    Subscriptions,
    Favorite,
    ShoppingCart,
    DownloadShoppingCart,
}

impl Action {
    /// Read-only actions.
    #[must_use]
    pub const fn is_safe(self) -> bool {
        matches!(self, Self::List | Self::Retrieve)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    AllowAny,
    Authenticated,
    /// Reads open to all; writes need the admin role.
    ReadOnlyOrAdmin,
    /// Reads open to all; creation needs a login; changes need authorship.
    ReadOnlyOrAuthor,
    /// Login required; the target must be the caller's own or the caller an admin.
    OwnerOrAdmin,
}

/// The access rule for each endpoint. `None` marks an action the resource
/// does not offer.
#[must_use]
pub const fn policy(resource: Resource, action: Action) -> Option<Permission> {
    use Action as A;
    use Permission as P;

    match (resource, action) {
        (Resource::User, A::List) => Some(P::ReadOnlyOrAdmin),
        (Resource::User, A::Create) => Some(P::AllowAny),
        (Resource::User, A::Update | A::Destroy) => Some(P::OwnerOrAdmin),
        (
            Resource::User,
            A::Retrieve | A::Me | A::SetPassword | A::Subscribe | A::Subscriptions,
        )
        | (Resource::Recipe, A::Favorite | A::ShoppingCart | A::DownloadShoppingCart) => {
            Some(P::Authenticated)
        }
        (Resource::Recipe, A::List | A::Retrieve | A::Create | A::Update | A::Destroy) => {
            Some(P::ReadOnlyOrAuthor)
        }
        (Resource::Tag, A::List | A::Retrieve | A::Create | A::Update | A::Destroy) => {
            Some(P::ReadOnlyOrAdmin)
        }
        (Resource::Ingredient, A::List | A::Retrieve) => Some(P::AllowAny),
        _ => None,
    }
}

fn deny(viewer: &Viewer) -> ApiError {
    if viewer.is_authenticated() {
        ApiError::forbidden()
    } else {
        ApiError::unauthorized()
    }
}

/// List-level check, before the target object is loaded.
pub fn check_endpoint(resource: Resource, action: Action, viewer: &Viewer) -> Result<(), ApiError> {
    let Some(permission) = policy(resource, action) else {
        return Err(deny(viewer));
    };

    let allowed = match permission {
        Permission::AllowAny => true,
        Permission::Authenticated | Permission::OwnerOrAdmin => viewer.is_authenticated(),
        Permission::ReadOnlyOrAdmin => action.is_safe() || viewer.is_admin(),
        Permission::ReadOnlyOrAuthor => action.is_safe() || viewer.is_authenticated(),
    };

    if allowed { Ok(()) } else { Err(deny(viewer)) }
}

/// Object-level check once `owner_id` (author, or the account itself) is known.
pub fn check_object(
    resource: Resource,
    action: Action,
    viewer: &Viewer,
    owner_id: i32,
) -> Result<(), ApiError> {
    check_endpoint(resource, action, viewer)?;

    let Some(permission) = policy(resource, action) else {
        return Err(deny(viewer));
    };

    let is_owner = viewer.id() == Some(owner_id);
    let allowed = match permission {
        Permission::AllowAny | Permission::Authenticated => true,
        Permission::ReadOnlyOrAdmin => action.is_safe() || viewer.is_admin(),
        Permission::ReadOnlyOrAuthor => action.is_safe() || is_owner,
        Permission::OwnerOrAdmin => is_owner || viewer.is_admin(),
    };

    if allowed { Ok(()) } else { Err(deny(viewer)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CurrentUser;
    use axum::http::StatusCode;

    fn viewer(id: i32, is_admin: bool) -> Viewer {
        Viewer::user(CurrentUser {
            id,
            email: format!("u{id}@example.com"),
            username: format!("u{id}"),
            is_admin,
        })
    }

    fn status(result: Result<(), ApiError>) -> Option<StatusCode> {
        result.err().map(|e| e.status())
    }

    #[test]
    fn test_anonymous_reads_and_registration() {
        let anon = Viewer::anonymous();
        assert!(check_endpoint(Resource::Recipe, Action::List, &anon).is_ok());
        assert!(check_endpoint(Resource::Tag, Action::Retrieve, &anon).is_ok());
        assert!(check_endpoint(Resource::Ingredient, Action::List, &anon).is_ok());
        assert!(check_endpoint(Resource::User, Action::Create, &anon).is_ok());
        assert!(check_endpoint(Resource::User, Action::List, &anon).is_ok());
        assert_eq!(
            status(check_endpoint(Resource::User, Action::Retrieve, &anon)),
            Some(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            status(check_endpoint(Resource::Recipe, Action::Create, &anon)),
            Some(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn test_recipe_changes_need_authorship() {
        let author = viewer(1, false);
        let other = viewer(2, false);
        let admin = viewer(3, true);

        assert!(check_object(Resource::Recipe, Action::Update, &author, 1).is_ok());
        assert_eq!(
            status(check_object(Resource::Recipe, Action::Destroy, &other, 1)),
            Some(StatusCode::FORBIDDEN)
        );
        assert_eq!(
            status(check_object(Resource::Recipe, Action::Update, &admin, 1)),
            Some(StatusCode::FORBIDDEN)
        );
        assert!(check_object(Resource::Recipe, Action::Retrieve, &other, 1).is_ok());
        assert_eq!(
            status(check_object(
                Resource::Recipe,
                Action::Update,
                &Viewer::anonymous(),
                1
            )),
            Some(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn test_user_edit_owner_or_admin() {
        assert!(check_object(Resource::User, Action::Update, &viewer(5, false), 5).is_ok());
        assert!(check_object(Resource::User, Action::Destroy, &viewer(9, true), 5).is_ok());
        assert_eq!(
            status(check_object(Resource::User, Action::Update, &viewer(6, false), 5)),
            Some(StatusCode::FORBIDDEN)
        );
    }

    #[test]
    fn test_tag_writes_admin_only() {
        assert!(check_endpoint(Resource::Tag, Action::Create, &viewer(1, true)).is_ok());
        assert_eq!(
            status(check_endpoint(Resource::Tag, Action::Create, &viewer(1, false))),
            Some(StatusCode::FORBIDDEN)
        );
        assert_eq!(
            status(check_endpoint(Resource::Tag, Action::Destroy, &Viewer::anonymous())),
            Some(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn test_unknown_actions_denied() {
        assert!(policy(Resource::Ingredient, Action::Create).is_none());
        assert_eq!(
            status(check_endpoint(Resource::Ingredient, Action::Destroy, &viewer(1, true))),
            Some(StatusCode::FORBIDDEN)
        );
    }
}

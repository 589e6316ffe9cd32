//! Domain types shared by the service and HTTP layers.
//!
//! [`Viewer`] is the optionally-authenticated requester every read and
//! permission decision is evaluated against. The view types in [`views`]
//! are the wire representations returned to clients.

pub mod views;

use crate::db::User;

/// The authenticated account behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub is_admin: bool,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            is_admin: user.is_admin,
        }
    }
}

/// Who is asking. Anonymous requests carry `None`.
///
/// # Examples
///
/// ```rust
/// use foodgram::domain::Viewer;
///
/// let viewer = Viewer::anonymous();
/// assert!(!viewer.is_authenticated());
/// assert_eq!(viewer.id(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer(Option<CurrentUser>);

impl Viewer {
    #[must_use]
    pub const fn anonymous() -> Self {
        Self(None)
    }

    #[must_use]
    pub const fn user(user: CurrentUser) -> Self {
        Self(Some(user))
    }

    #[must_use]
    pub const fn current(&self) -> Option<&CurrentUser> {
        self.0.as_ref()
    }

    #[must_use]
    pub fn id(&self) -> Option<i32> {
        self.0.as_ref().map(|u| u.id)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(|u| u.is_admin)
    }
}

/// A page of items together with the unpaginated total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Paged<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Validated page request: `page` is 1-based, `size` is at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub size: u64,
}

impl PageRequest {
    /// A page past the end is only valid as the first page of an empty set.
    #[must_use]
    pub const fn is_out_of_range(&self, total: u64) -> bool {
        self.page > 1 && (self.page - 1).saturating_mul(self.size) >= total
    }
}

pub mod ingredient;
pub mod recipe;
pub mod relation;
pub mod shopping_list;
pub mod subscription;
pub mod tag;
pub mod token;
pub mod user;

use sea_orm::{DbErr, SqlErr};

/// True when an insert lost to an identical row already covered by a
/// unique index.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::{prelude::*, tags};

pub use crate::entities::tags::Model as Tag;

#[derive(Debug, Clone)]
pub struct TagInput {
    pub name: String,
    pub color: String,
    pub slug: String,
}

/// Which unique tag column a write collides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagField {
    Name,
    Color,
    Slug,
}

impl TagField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Color => "color",
            Self::Slug => "slug",
        }
    }
}

pub struct TagRepository {
    conn: DatabaseConnection,
}

impl TagRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> Result<Vec<Tag>> {
        Tags::find()
            .order_by_asc(tags::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to list tags")
    }

    pub async fn get(&self, id: i32) -> Result<Option<Tag>> {
        Tags::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query tag")
    }

    /// Subset of `ids` that name existing tags.
    pub async fn existing_ids(&self, ids: &[i32]) -> Result<Vec<i32>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = Tags::find()
            .filter(tags::Column::Id.is_in(ids.iter().copied()))
            .all(&self.conn)
            .await?;

        Ok(found.into_iter().map(|t| t.id).collect())
    }

    /// First unique column already used by a tag other than `except_id`.
    pub async fn find_conflict(
        &self,
        input: &TagInput,
        except_id: Option<i32>,
    ) -> Result<Option<TagField>> {
        let checks = [
            (TagField::Name, tags::Column::Name, &input.name),
            (TagField::Color, tags::Column::Color, &input.color),
            (TagField::Slug, tags::Column::Slug, &input.slug),
        ];

        for (field, column, value) in checks {
            let mut query = Tags::find().filter(column.eq(value.as_str()));
            if let Some(id) = except_id {
                query = query.filter(tags::Column::Id.ne(id));
            }
            if query.count(&self.conn).await? > 0 {
                return Ok(Some(field));
            }
        }

        Ok(None)
    }

    pub async fn create(&self, input: TagInput) -> Result<Tag> {
        tags::ActiveModel {
            name: Set(input.name),
            color: Set(input.color),
            slug: Set(input.slug),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert tag")
    }

    pub async fn update(&self, id: i32, input: TagInput) -> Result<Option<Tag>> {
        let Some(tag) = Tags::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: tags::ActiveModel = tag.into();
        active.name = Set(input.name);
        active.color = Set(input.color);
        active.slug = Set(input.slug);

        Ok(Some(active.update(&self.conn).await?))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Tags::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}

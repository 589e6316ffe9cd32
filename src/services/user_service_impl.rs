//! `SeaORM` implementation of the `UserService` trait.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::config::SecurityConfig;
use crate::db::{NewUser, Store, User, UserChanges};
use crate::domain::views::{RecipeSummary, SubscriptionView, UserView};
use crate::domain::{PageRequest, Paged, Viewer};
use crate::services::image::ImageService;
use crate::services::user_service::{Registration, UserError, UserService};

pub struct SeaOrmUserService {
    store: Store,
    security: SecurityConfig,
    images: ImageService,
}

impl SeaOrmUserService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig, images: ImageService) -> Self {
        Self {
            store,
            security,
            images,
        }
    }

    async fn require_user(&self, id: i32) -> Result<User, UserError> {
        self.store
            .get_user(id)
            .await?
            .ok_or(UserError::NotFound(id))
    }

    async fn followed_by_viewer(
        &self,
        viewer: &Viewer,
        author_ids: &[i32],
    ) -> Result<HashSet<i32>, UserError> {
        let Some(viewer_id) = viewer.id() else {
            return Ok(HashSet::new());
        };
        Ok(self
            .store
            .subscription_repo()
            .followed_among(viewer_id, author_ids)
            .await?)
    }

    async fn check_unique(
        &self,
        email: Option<&str>,
        username: Option<&str>,
        except_id: Option<i32>,
    ) -> Result<(), UserError> {
        let repo = self.store.user_repo();

        if let Some(email) = email
            && repo.email_taken(email, except_id).await?
        {
            return Err(UserError::Validation(
                "A user with that email already exists".to_string(),
            ));
        }

        if let Some(username) = username
            && repo.username_taken(username, except_id).await?
        {
            return Err(UserError::Validation(
                "A user with that username already exists".to_string(),
            ));
        }

        Ok(())
    }

    async fn subscription_view(
        &self,
        author: User,
        recipes_limit: Option<u64>,
        recipes_count: u64,
    ) -> Result<SubscriptionView, UserError> {
        let recipes = self
            .store
            .recipe_repo()
            .by_author(author.id, recipes_limit)
            .await?
            .into_iter()
            .map(|recipe| {
                let url = self.images.public_url(&recipe.image);
                RecipeSummary::new(recipe, url)
            })
            .collect();

        Ok(SubscriptionView {
            author: UserView::new(author, true),
            recipes,
            recipes_count,
        })
    }
}

#[async_trait]
impl UserService for SeaOrmUserService {
    async fn register(&self, registration: Registration) -> Result<UserView, UserError> {
        self.check_unique(
            Some(&registration.email),
            Some(&registration.username),
            None,
        )
        .await?;

        let user = self
            .store
            .user_repo()
            .create(
                NewUser {
                    email: registration.email,
                    username: registration.username,
                    first_name: registration.first_name,
                    last_name: registration.last_name,
                    password: registration.password,
                    is_admin: false,
                },
                &self.security,
            )
            .await?;

        tracing::info!(user_id = user.id, "User registered");
        Ok(UserView::new(user, false))
    }

    async fn list(
        &self,
        viewer: &Viewer,
        page: PageRequest,
    ) -> Result<Paged<UserView>, UserError> {
        let (users, total) = self
            .store
            .user_repo()
            .list_page(page.page, page.size)
            .await?;

        if page.is_out_of_range(total) {
            return Err(UserError::InvalidPage);
        }

        let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
        let followed = self.followed_by_viewer(viewer, &ids).await?;

        Ok(Paged {
            items: users,
            total,
        }
        .map(|user| {
            let subscribed = followed.contains(&user.id);
            UserView::new(user, subscribed)
        }))
    }

    async fn get(&self, viewer: &Viewer, id: i32) -> Result<UserView, UserError> {
        let user = self.require_user(id).await?;
        let followed = self.followed_by_viewer(viewer, &[id]).await?;
        Ok(UserView::new(user, followed.contains(&id)))
    }

    async fn update(
        &self,
        viewer: &Viewer,
        id: i32,
        changes: UserChanges,
    ) -> Result<UserView, UserError> {
        self.require_user(id).await?;
        self.check_unique(
            changes.email.as_deref(),
            changes.username.as_deref(),
            Some(id),
        )
        .await?;

        let user = self.store.user_repo().update_profile(id, changes).await?;
        let followed = self.followed_by_viewer(viewer, &[id]).await?;

        Ok(UserView::new(user, followed.contains(&id)))
    }

    async fn delete(&self, id: i32) -> Result<(), UserError> {
        // Recipe rows go with the user through the cascade; their files do not.
        let images: Vec<String> = self
            .store
            .recipe_repo()
            .by_author(id, None)
            .await?
            .into_iter()
            .map(|recipe| recipe.image)
            .collect();

        if !self.store.user_repo().delete(id).await? {
            return Err(UserError::NotFound(id));
        }

        for image in &images {
            self.images.remove(image).await;
        }

        tracing::info!(user_id = id, images = images.len(), "User deleted");
        Ok(())
    }

    async fn set_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserError> {
        let min = self.security.min_password_length;
        if new_password.chars().count() < min {
            return Err(UserError::Validation(format!(
                "New password must be at least {min} characters"
            )));
        }

        if current_password == new_password {
            return Err(UserError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        let repo = self.store.user_repo();
        if !repo.verify_password(user_id, current_password).await? {
            return Err(UserError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        repo.update_password(user_id, new_password, &self.security)
            .await?;

        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    async fn subscribe(
        &self,
        user_id: i32,
        author_id: i32,
        recipes_limit: Option<u64>,
    ) -> Result<SubscriptionView, UserError> {
        let author = self.require_user(author_id).await?;

        if user_id == author_id {
            return Err(UserError::SelfSubscription);
        }

        if !self
            .store
            .subscription_repo()
            .create(user_id, author_id)
            .await?
        {
            return Err(UserError::AlreadySubscribed);
        }

        let count = self
            .store
            .recipe_repo()
            .count_by_author(&[author_id])
            .await?
            .get(&author_id)
            .copied()
            .unwrap_or(0);

        tracing::info!(user_id, author_id, "Subscribed");
        self.subscription_view(author, recipes_limit, count).await
    }

    async fn unsubscribe(&self, user_id: i32, author_id: i32) -> Result<(), UserError> {
        self.require_user(author_id).await?;

        if !self
            .store
            .subscription_repo()
            .delete(user_id, author_id)
            .await?
        {
            return Err(UserError::NotSubscribed);
        }

        tracing::info!(user_id, author_id, "Unsubscribed");
        Ok(())
    }

    async fn subscriptions(
        &self,
        user_id: i32,
        page: PageRequest,
        recipes_limit: Option<u64>,
    ) -> Result<Paged<SubscriptionView>, UserError> {
        let (authors, total) = self
            .store
            .subscription_repo()
            .authors_page(user_id, page.page, page.size)
            .await?;

        if page.is_out_of_range(total) {
            return Err(UserError::InvalidPage);
        }

        let ids: Vec<i32> = authors.iter().map(|a| a.id).collect();
        let counts = self.store.recipe_repo().count_by_author(&ids).await?;

        let mut items = Vec::with_capacity(authors.len());
        for author in authors {
            let count = counts.get(&author.id).copied().unwrap_or(0);
            items.push(self.subscription_view(author, recipes_limit, count).await?);
        }

        Ok(Paged { items, total })
    }
}

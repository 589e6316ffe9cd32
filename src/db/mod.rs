use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::ingredient::{Ingredient, IngredientSeed};
pub use repositories::recipe::{
    Recipe, RecipeDraft, RecipeFilter, RecipeIngredientRow, RecipeUpdate,
};
pub use repositories::relation::RecipeList;
pub use repositories::shopping_list::ShoppingListItem;
pub use repositories::tag::{Tag, TagField, TagInput};
pub use repositories::user::{NewUser, User, UserChanges};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn token_repo(&self) -> repositories::token::TokenRepository {
        repositories::token::TokenRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn tag_repo(&self) -> repositories::tag::TagRepository {
        repositories::tag::TagRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn ingredient_repo(&self) -> repositories::ingredient::IngredientRepository {
        repositories::ingredient::IngredientRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn recipe_repo(&self) -> repositories::recipe::RecipeRepository {
        repositories::recipe::RecipeRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn recipe_list_repo(&self) -> repositories::relation::RecipeListRepository {
        repositories::relation::RecipeListRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn subscription_repo(&self) -> repositories::subscription::SubscriptionRepository {
        repositories::subscription::SubscriptionRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn shopping_list_repo(&self) -> repositories::shopping_list::ShoppingListRepository {
        repositories::shopping_list::ShoppingListRepository::new(self.conn.clone())
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn user_for_token(&self, key: &str) -> Result<Option<User>> {
        self.token_repo().find_user(key).await
    }

    pub async fn load_ingredients(&self, seeds: &[IngredientSeed]) -> Result<usize> {
        self.ingredient_repo().load_seeds(seeds).await
    }
}

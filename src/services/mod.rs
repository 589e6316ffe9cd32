pub mod export;
pub mod image;
pub use export::{Export, ExportFormat};
pub use image::{ImageError, ImageService, ImageUpload};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService};
pub use auth_service_impl::SeaOrmAuthService;

pub mod user_service;
pub mod user_service_impl;
pub use user_service::{Registration, UserError, UserService};
pub use user_service_impl::SeaOrmUserService;

pub mod recipe_service;
pub mod recipe_service_impl;
pub use recipe_service::{RecipeError, RecipeInput, RecipePatch, RecipeQuery, RecipeService};
pub use recipe_service_impl::SeaOrmRecipeService;

pub mod catalog_service;
pub mod catalog_service_impl;
pub use catalog_service::{CatalogError, CatalogService, TagPatch};
pub use catalog_service_impl::SeaOrmCatalogService;

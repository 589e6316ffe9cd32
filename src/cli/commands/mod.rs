mod create_admin;
mod load_ingredients;

pub use create_admin::cmd_create_admin;
pub use load_ingredients::cmd_load_ingredients;

use crate::config::Config;
use crate::db::{NewUser, Store};

pub async fn cmd_create_admin(
    config: &Config,
    email: &str,
    username: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> anyhow::Result<()> {
    let email = email.trim().to_lowercase();
    let username = username.trim();

    if password.chars().count() < config.security.min_password_length {
        anyhow::bail!(
            "Password must be at least {} characters",
            config.security.min_password_length
        );
    }

    let store = Store::new(&config.general.database_path).await?;
    let users = store.user_repo();

    if users.email_taken(&email, None).await? {
        anyhow::bail!("A user with email {email} already exists");
    }
    if users.username_taken(username, None).await? {
        anyhow::bail!("A user with username {username} already exists");
    }

    let user = users
        .create(
            NewUser {
                email,
                username: username.to_string(),
                first_name: first_name.trim().to_string(),
                last_name: last_name.trim().to_string(),
                password: password.to_string(),
                is_admin: true,
            },
            &config.security,
        )
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "Administrator created");
    println!("✓ Administrator {} created (id {})", user.username, user.id);

    Ok(())
}

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use foodgram::api::AppState;
use foodgram::config::Config;
use foodgram::db::{IngredientSeed, NewUser, RecipeList, TagInput};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const PASSWORD: &str = "s3cret-pass";

struct TestApp {
    router: Router,
    state: Arc<AppState>,
}

async fn spawn_app() -> TestApp {
    let root = std::env::temp_dir().join(format!("foodgram-test-{}", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", root.join("foodgram.db").display());
    config.media.media_path = root.join("media").display().to_string();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;

    let state = foodgram::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");

    TestApp {
        router: foodgram::api::router(state.clone()),
        state,
    }
}

impl TestApp {
    async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>, Option<String>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec(), content_type)
    }

    async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes, _) = self.request(method, uri, token, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Registers a user and returns `(id, token)`.
    async fn user(&self, username: &str) -> (i64, String) {
        let (status, body) = self
            .json(
                "POST",
                "/api/users/",
                None,
                Some(json!({
                    "email": format!("{username}@example.com"),
                    "username": username,
                    "first_name": "Test",
                    "last_name": "User",
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id = body["id"].as_i64().unwrap();

        (id, self.login(&format!("{username}@example.com"), PASSWORD).await)
    }

    async fn admin(&self) -> String {
        let config = self.state.config().clone();
        self.state
            .store()
            .user_repo()
            .create(
                NewUser {
                    email: "admin@example.com".to_string(),
                    username: "admin".to_string(),
                    first_name: "Ad".to_string(),
                    last_name: "Min".to_string(),
                    password: PASSWORD.to_string(),
                    is_admin: true,
                },
                &config.security,
            )
            .await
            .unwrap();

        self.login("admin@example.com", PASSWORD).await
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/api/auth/token/login/",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["auth_token"].as_str().unwrap().to_string()
    }

    async fn tag(&self, slug: &str) -> i32 {
        self.state
            .store()
            .tag_repo()
            .create(TagInput {
                name: slug.to_uppercase(),
                color: format!("#{:0>6}", slug.len()),
                slug: slug.to_string(),
            })
            .await
            .unwrap()
            .id
    }

    /// Seeds ingredients and returns their ids in the given order.
    async fn ingredients(&self, items: &[(&str, &str)]) -> Vec<i32> {
        let seeds: Vec<IngredientSeed> = items
            .iter()
            .map(|(name, unit)| IngredientSeed {
                name: (*name).to_string(),
                measurement_unit: (*unit).to_string(),
            })
            .collect();
        self.state.store().load_ingredients(&seeds).await.unwrap();

        let (_, body) = self.json("GET", "/api/ingredients/", None, None).await;
        items
            .iter()
            .map(|(name, _)| {
                body.as_array()
                    .unwrap()
                    .iter()
                    .find(|i| i["name"] == *name)
                    .and_then(|i| i["id"].as_i64())
                    .unwrap() as i32
            })
            .collect()
    }

    async fn create_recipe(
        &self,
        token: &str,
        name: &str,
        tags: &[i32],
        ingredients: &[(i32, i32)],
    ) -> Value {
        let (status, body) = self
            .json(
                "POST",
                "/api/recipes/",
                Some(token),
                Some(recipe_payload(name, tags, ingredients)),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}

fn png_data_uri() -> String {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R']);
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

fn recipe_payload(name: &str, tags: &[i32], ingredients: &[(i32, i32)]) -> Value {
    json!({
        "name": name,
        "text": "Mix everything and bake.",
        "cooking_time": 30,
        "image": png_data_uri(),
        "tags": tags,
        "ingredients": ingredients
            .iter()
            .map(|(id, amount)| json!({ "id": id, "amount": amount }))
            .collect::<Vec<_>>(),
    })
}

#[tokio::test]
async fn test_register_login_and_token_handling() {
    let app = spawn_app().await;
    let (id, token) = app.user("chef").await;

    let (status, me) = app.json("GET", "/api/users/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"].as_i64(), Some(id));
    assert_eq!(me["username"], "chef");
    assert_eq!(me["is_subscribed"], false);
    assert!(me.get("password").is_none());

    let (status, _) = app.json("GET", "/api/users/me/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A bad token is refused even on public endpoints.
    let (status, _) = app.json("GET", "/api/recipes/", Some("nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Logging in again hands back the same token.
    assert_eq!(app.login("CHEF@example.com", PASSWORD).await, token);

    let (status, _) = app
        .json("POST", "/api/auth/token/logout/", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.json("GET", "/api/users/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_registration_rejects_duplicates_and_bad_login() {
    let app = spawn_app().await;
    app.user("chef").await;

    let (status, _) = app
        .json(
            "POST",
            "/api/users/",
            None,
            Some(json!({
                "email": "chef@example.com",
                "username": "other",
                "first_name": "A",
                "last_name": "B",
                "password": PASSWORD,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            "POST",
            "/api/auth/token/login/",
            None,
            Some(json!({ "email": "chef@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recipe_round_trip_and_full_replacement() {
    let app = spawn_app().await;
    let (author_id, token) = app.user("author").await;
    let breakfast = app.tag("breakfast").await;
    let lunch = app.tag("lunch").await;
    let ids = app.ingredients(&[("flour", "g"), ("egg", "pcs")]).await;

    let created = app
        .create_recipe(&token, "Pancakes", &[breakfast], &[(ids[0], 200), (ids[1], 2)])
        .await;
    let recipe_id = created["id"].as_i64().unwrap();

    assert_eq!(created["name"], "Pancakes");
    assert_eq!(created["cooking_time"], 30);
    assert_eq!(created["author"]["id"].as_i64(), Some(author_id));
    assert_eq!(created["tags"][0]["slug"], "breakfast");
    assert_eq!(created["ingredients"].as_array().unwrap().len(), 2);
    assert!(
        created["image"]
            .as_str()
            .unwrap()
            .starts_with("/media/recipes/")
    );

    let (_, fan) = app.user("fan").await;
    for list in ["favorite", "shopping_cart"] {
        let (status, _) = app
            .json(
                "POST",
                &format!("/api/recipes/{recipe_id}/{list}/"),
                Some(&fan),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, seen_by_fan) = app
        .json("GET", &format!("/api/recipes/{recipe_id}/"), Some(&fan), None)
        .await;
    assert_eq!(seen_by_fan["is_favorited"], true);
    assert_eq!(seen_by_fan["is_in_shopping_cart"], true);

    // Someone else's lists never leak into an anonymous view.
    let (status, fetched) = app
        .json("GET", &format!("/api/recipes/{recipe_id}/"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["is_favorited"], false);
    assert_eq!(fetched["is_in_shopping_cart"], false);
    assert_eq!(fetched["ingredients"], created["ingredients"]);

    let (status, updated) = app
        .json(
            "PATCH",
            &format!("/api/recipes/{recipe_id}/"),
            Some(&token),
            Some(json!({
                "name": "Crepes",
                "tags": [lunch],
                "ingredients": [{ "id": ids[1], "amount": 3 }],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["name"], "Crepes");
    assert_eq!(updated["text"], "Mix everything and bake.");
    assert_eq!(updated["image"], created["image"]);
    assert_eq!(updated["tags"].as_array().unwrap().len(), 1);
    assert_eq!(updated["tags"][0]["slug"], "lunch");
    assert_eq!(updated["ingredients"].as_array().unwrap().len(), 1);
    assert_eq!(updated["ingredients"][0]["name"], "egg");
    assert_eq!(updated["ingredients"][0]["amount"], 3);

    let (status, _) = app
        .json(
            "PATCH",
            &format!("/api/recipes/{recipe_id}/"),
            Some(&token),
            Some(json!({ "name": "No lists" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json("DELETE", &format!("/api/recipes/{recipe_id}/"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .json("GET", &format!("/api/recipes/{recipe_id}/"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recipe_changes_need_authorship() {
    let app = spawn_app().await;
    let (_, author) = app.user("author").await;
    let (_, stranger) = app.user("stranger").await;
    let tag = app.tag("dinner").await;
    let ids = app.ingredients(&[("rice", "g")]).await;

    let recipe = app
        .create_recipe(&author, "Risotto", &[tag], &[(ids[0], 100)])
        .await;
    let uri = format!("/api/recipes/{}/", recipe["id"]);
    let patch = json!({ "tags": [tag], "ingredients": [{ "id": ids[0], "amount": 5 }] });

    let (status, _) = app
        .json("PATCH", &uri, Some(&stranger), Some(patch.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.json("PATCH", &uri, None, Some(patch)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.json("DELETE", &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.json("DELETE", &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(
            "POST",
            "/api/recipes/",
            None,
            Some(recipe_payload("Anon", &[tag], &[(ids[0], 1)])),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_and_unknown_ids_rejected() {
    let app = spawn_app().await;
    let (_, token) = app.user("author").await;
    let tag = app.tag("soup").await;
    let ids = app.ingredients(&[("water", "ml")]).await;

    let cases = [
        recipe_payload("Dup ingredient", &[tag], &[(ids[0], 10), (ids[0], 20)]),
        recipe_payload("Dup tag", &[tag, tag], &[(ids[0], 10)]),
        recipe_payload("Unknown ingredient", &[tag], &[(9999, 10)]),
        recipe_payload("Unknown tag", &[9999], &[(ids[0], 10)]),
        recipe_payload("Zero amount", &[tag], &[(ids[0], 0)]),
        recipe_payload("No tags", &[], &[(ids[0], 10)]),
    ];

    for payload in cases {
        let (status, body) = app
            .json("POST", "/api/recipes/", Some(&token), Some(payload))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }

    let mut payload = recipe_payload("Slow", &[tag], &[(ids[0], 10)]);
    payload["cooking_time"] = json!(0);
    let (status, _) = app
        .json("POST", "/api/recipes/", Some(&token), Some(payload))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = app.json("GET", "/api/recipes/", None, None).await;
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn test_favorites_and_cart_membership() {
    let app = spawn_app().await;
    let (_, author) = app.user("author").await;
    let (_, fan) = app.user("fan").await;
    let tag = app.tag("dessert").await;
    let ids = app.ingredients(&[("sugar", "g")]).await;

    let recipe = app
        .create_recipe(&author, "Fudge", &[tag], &[(ids[0], 100)])
        .await;
    let favorite = format!("/api/recipes/{}/favorite/", recipe["id"]);

    let (status, summary) = app.json("POST", &favorite, Some(&fan), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(summary["name"], "Fudge");
    assert_eq!(summary["cooking_time"], 30);
    assert!(summary.get("author").is_none());

    let (status, _) = app.json("POST", &favorite, Some(&fan), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = app
        .json("GET", "/api/recipes/?is_favorited=1", Some(&fan), None)
        .await;
    assert_eq!(list["count"], 1);
    assert_eq!(list["results"][0]["is_favorited"], true);

    // Anonymous callers never see per-user flags and the filter is ignored.
    let (_, list) = app
        .json("GET", "/api/recipes/?is_favorited=1", None, None)
        .await;
    assert_eq!(list["count"], 1);
    assert_eq!(list["results"][0]["is_favorited"], false);

    let (_, list) = app
        .json("GET", "/api/recipes/?is_favorited=1", Some(&author), None)
        .await;
    assert_eq!(list["count"], 0);

    let (status, _) = app.json("DELETE", &favorite, Some(&fan), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.json("DELETE", &favorite, Some(&fan), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.json("POST", &favorite, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json("POST", "/api/recipes/9999/shopping_cart/", Some(&fan), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_duplicate_adds_are_rejected() {
    let app = spawn_app().await;
    let (author_id, author) = app.user("author").await;
    let (_, fan) = app.user("fan").await;
    let tag = app.tag("snack").await;
    let ids = app.ingredients(&[("nuts", "g")]).await;
    let recipe = app
        .create_recipe(&author, "Trail mix", &[tag], &[(ids[0], 50)])
        .await;

    let favorite = format!("/api/recipes/{}/favorite/", recipe["id"]);
    let subscribe = format!("/api/users/{author_id}/subscribe/");
    let (first, second, third, fourth) = tokio::join!(
        app.json("POST", &favorite, Some(&fan), None),
        app.json("POST", &favorite, Some(&fan), None),
        app.json("POST", &subscribe, Some(&fan), None),
        app.json("POST", &subscribe, Some(&fan), None),
    );

    let mut favorites = [first.0, second.0];
    favorites.sort();
    assert_eq!(favorites, [StatusCode::CREATED, StatusCode::BAD_REQUEST]);

    let mut subscriptions = [third.0, fourth.0];
    subscriptions.sort();
    assert_eq!(subscriptions, [StatusCode::CREATED, StatusCode::BAD_REQUEST]);

    // The repositories report a lost insert race as a duplicate, not an error.
    let recipe_id = i32::try_from(recipe["id"].as_i64().unwrap()).unwrap();
    let fan_id = i32::try_from(
        app.json("GET", "/api/users/me/", Some(&fan), None).await.1["id"]
            .as_i64()
            .unwrap(),
    )
    .unwrap();
    let store = app.state.store();
    assert!(
        !store
            .recipe_list_repo()
            .add(RecipeList::Favorites, fan_id, recipe_id)
            .await
            .unwrap()
    );
    assert!(
        store
            .recipe_list_repo()
            .add(RecipeList::ShoppingCart, fan_id, recipe_id)
            .await
            .unwrap()
    );
    assert!(
        !store
            .subscription_repo()
            .create(fan_id, i32::try_from(author_id).unwrap())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_user_deletion_removes_recipe_images() {
    let app = spawn_app().await;
    let (author_id, author) = app.user("author").await;
    let admin = app.admin().await;
    let tag = app.tag("bread").await;
    let ids = app.ingredients(&[("rye", "g")]).await;
    let recipe = app
        .create_recipe(&author, "Rye loaf", &[tag], &[(ids[0], 400)])
        .await;

    let image_url = recipe["image"].as_str().unwrap().to_string();
    let stored = std::path::Path::new(&app.state.config().media.media_path)
        .join(image_url.trim_start_matches("/media/"));
    assert!(stored.exists());

    let (status, _) = app
        .json("DELETE", &format!("/api/users/{author_id}/"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(!stored.exists());
    let (status, _, _) = app.request("GET", &image_url, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .json("GET", &format!("/api/recipes/{}/", recipe["id"]), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recipe_filters() {
    let app = spawn_app().await;
    let (first_id, first) = app.user("first").await;
    let (_, second) = app.user("second").await;
    let breakfast = app.tag("breakfast").await;
    let dinner = app.tag("dinner").await;
    let ids = app.ingredients(&[("oats", "g")]).await;

    app.create_recipe(&first, "Porridge", &[breakfast], &[(ids[0], 50)])
        .await;
    app.create_recipe(&second, "Stew", &[dinner], &[(ids[0], 10)])
        .await;
    app.create_recipe(&second, "Granola", &[breakfast, dinner], &[(ids[0], 80)])
        .await;

    let (_, list) = app.json("GET", "/api/recipes/", None, None).await;
    assert_eq!(list["count"], 3);
    assert_eq!(list["results"][0]["name"], "Granola");

    let (_, list) = app
        .json("GET", &format!("/api/recipes/?author={first_id}"), None, None)
        .await;
    assert_eq!(list["count"], 1);
    assert_eq!(list["results"][0]["name"], "Porridge");

    let (_, list) = app
        .json("GET", "/api/recipes/?tags=breakfast", None, None)
        .await;
    assert_eq!(list["count"], 2);

    let (_, list) = app
        .json("GET", "/api/recipes/?tags=breakfast&tags=dinner", None, None)
        .await;
    assert_eq!(list["count"], 3);

    let (status, _) = app
        .json("GET", "/api/recipes/?author=someone", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_shopping_list_aggregates_and_exports() {
    let app = spawn_app().await;
    let (_, token) = app.user("shopper").await;
    let tag = app.tag("bake").await;
    let ids = app.ingredients(&[("flour", "g"), ("egg", "pcs")]).await;

    let bread = app
        .create_recipe(&token, "Bread", &[tag], &[(ids[0], 200), (ids[1], 2)])
        .await;
    let cake = app
        .create_recipe(&token, "Cake", &[tag], &[(ids[0], 300)])
        .await;

    for recipe in [&bread, &cake] {
        let (status, _) = app
            .json(
                "POST",
                &format!("/api/recipes/{}/shopping_cart/", recipe["id"]),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body, content_type) = app
        .request("GET", "/api/recipes/download_shopping_cart/", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/csv"));
    let csv = String::from_utf8(body).unwrap();
    assert_eq!(csv, "Name,Measurement_unit,Amount\negg,pcs,2\nflour,g,500\n");

    let (_, cart) = app
        .json("GET", "/api/recipes/?is_in_shopping_cart=1", Some(&token), None)
        .await;
    assert_eq!(cart["count"], 2);

    let (status, body, content_type) = app
        .request(
            "GET",
            "/api/recipes/download_shopping_cart/?format=pdf",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/pdf"));
    assert!(body.starts_with(b"%PDF-"));

    let (status, _, _) = app
        .request(
            "GET",
            "/api/recipes/download_shopping_cart/?format=xls",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = app
        .request("GET", "/api/recipes/download_shopping_cart/", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_long_shopping_list_spans_pdf_pages() {
    let app = spawn_app().await;
    let (_, token) = app.user("shopper").await;
    let tag = app.tag("feast").await;

    let names: Vec<String> = (0..45).map(|i| format!("item {i:02}")).collect();
    let items: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "g")).collect();
    let ids = app.ingredients(&items).await;
    let lines: Vec<(i32, i32)> = ids.iter().map(|id| (*id, 1)).collect();

    let recipe = app.create_recipe(&token, "Feast", &[tag], &lines).await;
    app.json(
        "POST",
        &format!("/api/recipes/{}/shopping_cart/", recipe["id"]),
        Some(&token),
        None,
    )
    .await;

    let (status, body, _) = app
        .request(
            "GET",
            "/api/recipes/download_shopping_cart/?format=pdf",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let needle = b"/Count 2";
    assert!(body.windows(needle.len()).any(|w| w == needle));
}

#[tokio::test]
async fn test_subscriptions() {
    let app = spawn_app().await;
    let (author_id, author) = app.user("author").await;
    let (reader_id, reader) = app.user("reader").await;
    let tag = app.tag("daily").await;
    let ids = app.ingredients(&[("salt", "g")]).await;

    for name in ["One", "Two", "Three"] {
        app.create_recipe(&author, name, &[tag], &[(ids[0], 1)])
            .await;
    }

    let (status, _) = app
        .json(
            "POST",
            &format!("/api/users/{reader_id}/subscribe/"),
            Some(&reader),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let subscribe = format!("/api/users/{author_id}/subscribe/");
    let (status, body) = app
        .json(
            "POST",
            &format!("{subscribe}?recipes_limit=2"),
            Some(&reader),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["username"], "author");
    assert_eq!(body["is_subscribed"], true);
    assert_eq!(body["recipes"].as_array().unwrap().len(), 2);
    assert_eq!(body["recipes_count"], 3);

    let (status, _) = app.json("POST", &subscribe, Some(&reader), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, page) = app
        .json(
            "GET",
            "/api/users/subscriptions/?recipes_limit=1",
            Some(&reader),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["recipes"].as_array().unwrap().len(), 1);
    assert_eq!(page["results"][0]["recipes_count"], 3);

    let (_, profile) = app
        .json("GET", &format!("/api/users/{author_id}/"), Some(&reader), None)
        .await;
    assert_eq!(profile["is_subscribed"], true);

    let (status, _) = app.json("DELETE", &subscribe, Some(&reader), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.json("DELETE", &subscribe, Some(&reader), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json("POST", "/api/users/9999/subscribe/", Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_set_password_rules() {
    let app = spawn_app().await;
    let (_, token) = app.user("cook").await;
    let uri = "/api/users/set_password/";

    let attempts = [
        (PASSWORD, "short"),
        (PASSWORD, PASSWORD),
        ("not-my-password", "brand-new-pass"),
    ];
    for (current, new) in attempts {
        let (status, _) = app
            .json(
                "POST",
                uri,
                Some(&token),
                Some(json!({ "current_password": current, "new_password": new })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = app
        .json(
            "POST",
            uri,
            Some(&token),
            Some(json!({ "current_password": PASSWORD, "new_password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    app.login("cook@example.com", "brand-new-pass").await;
}

#[tokio::test]
async fn test_user_pagination() {
    let app = spawn_app().await;
    for name in ["ann", "bob", "cat"] {
        app.user(name).await;
    }

    let (status, page) = app.json("GET", "/api/users/?limit=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 3);
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
    assert!(page["next"].as_str().unwrap().contains("page=2"));
    assert!(page["previous"].is_null());

    let (_, page) = app
        .json("GET", "/api/users/?limit=2&page=2", None, None)
        .await;
    assert_eq!(page["results"].as_array().unwrap().len(), 1);
    assert!(page["next"].is_null());

    let (status, _) = app.json("GET", "/api/users/?page=99", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.json("GET", "/api/users/?page=abc", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(
            "GET",
            "/api/recipes/?page=4611686018427387905&limit=4",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.json("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_profile_edit_owner_or_admin() {
    let app = spawn_app().await;
    let (owner_id, owner) = app.user("owner").await;
    let (_, other) = app.user("other").await;
    let admin = app.admin().await;
    let uri = format!("/api/users/{owner_id}/");

    let (status, _) = app
        .json("PATCH", &uri, Some(&other), Some(json!({ "first_name": "X" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .json("PATCH", &uri, Some(&owner), Some(json!({ "first_name": "Olga" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Olga");

    let (status, _) = app
        .json("PATCH", &uri, Some(&owner), Some(json!({ "username": "other" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.json("DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.json("GET", "/api/users/me/", Some(&owner), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tags_admin_writes() {
    let app = spawn_app().await;
    let (_, cook) = app.user("cook").await;
    let admin = app.admin().await;
    let tag = json!({ "name": "Breakfast", "color": "#e26c2d", "slug": "breakfast" });

    let (status, _) = app
        .json("POST", "/api/tags/", Some(&cook), Some(tag.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app
        .json("POST", "/api/tags/", Some(&admin), Some(tag.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["color"], "#E26C2D");

    let (status, _) = app.json("POST", "/api/tags/", Some(&admin), Some(tag)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/tags/{}/", created["id"]);
    let (status, updated) = app
        .json("PATCH", &uri, Some(&admin), Some(json!({ "name": "Morning" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Morning");
    assert_eq!(updated["slug"], "breakfast");

    let (status, list) = app.json("GET", "/api/tags/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = app.json("DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.json("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ingredient_search() {
    let app = spawn_app().await;
    app.ingredients(&[("Flour", "g"), ("flaxseed", "g"), ("milk", "ml")])
        .await;

    let (status, list) = app
        .json("GET", "/api/ingredients/?search=FL", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Flour", "flaxseed"]);

    let (_, list) = app
        .json("GET", "/api/ingredients/?search=%25", None, None)
        .await;
    assert_eq!(list, json!([]));

    let (status, _) = app.json("GET", "/api/ingredients/9999/", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ingredient_search_cyrillic() {
    let app = spawn_app().await;
    let ids = app
        .ingredients(&[("Мука", "г"), ("Молоко", "мл"), ("Flour", "g")])
        .await;

    // "мук"
    let (status, list) = app
        .json("GET", "/api/ingredients/?search=%D0%BC%D1%83%D0%BA", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"].as_i64(), Some(i64::from(ids[0])));
    assert_eq!(list[0]["name"], "Мука");
    assert_eq!(list[0]["measurement_unit"], "г");

    // "М" matches both Cyrillic names regardless of case.
    let (_, list) = app
        .json("GET", "/api/ingredients/?search=%D0%BC", None, None)
        .await;
    assert_eq!(list.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app().await;
    let (status, body) = app.json("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], "ok");
}

#[tokio::test]
async fn test_multipart_recipe_upload() {
    let app = spawn_app().await;
    let (_, token) = app.user("baker").await;
    let tag = app.tag("snack").await;
    let ids = app.ingredients(&[("bread", "slice")]).await;

    let boundary = "foodgram-boundary";
    let text_part = |name: &str, value: &str| {
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
    };

    let mut body = Vec::new();
    body.extend(text_part("name", "Toast").into_bytes());
    body.extend(text_part("text", "Toast the bread.").into_bytes());
    body.extend(text_part("cooking_time", "5").into_bytes());
    body.extend(text_part("tags", &tag.to_string()).into_bytes());
    body.extend(
        text_part(
            "ingredients",
            &json!([{ "id": ids[0], "amount": 2 }]).to_string(),
        )
        .into_bytes(),
    );
    body.extend(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"toast.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .into_bytes(),
    );
    body.extend_from_slice(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR");
    body.extend(format!("\r\n--{boundary}--\r\n").into_bytes());

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/recipes/")
                .header(header::AUTHORIZATION, format!("Token {token}"))
                .header(
                    header::CONTENT_TYPE,
                    format!("{}; boundary={boundary}", mime::MULTIPART_FORM_DATA),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let recipe: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(recipe["name"], "Toast");
    assert_eq!(recipe["ingredients"][0]["amount"], 2);
    assert!(recipe["image"].as_str().unwrap().ends_with(".png"));

    // The stored image is served from the media mount.
    let (status, served, _) = app
        .request("GET", recipe["image"].as_str().unwrap(), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(served.starts_with(b"\x89PNG"));
}

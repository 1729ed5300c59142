use sqlx::{Pool, Postgres};

use crate::{
    jwt::SessionData,
    media::{DecodedImage, MediaStorage},
    schema::{UserRole, Uuid},
    validation::{IngredientLine, ValidatedRecipe},
};

pub async fn insert_user(username: &str, pool: &Pool<Postgres>) -> Uuid {
    let (id,): (Uuid,) = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, 'Test', 'Cook', '')
        RETURNING id;
    ",
    )
    .bind(format!("{username}@example.com"))
    .bind(username)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

pub async fn insert_tag(slug: &str, color: &str, pool: &Pool<Postgres>) -> Uuid {
    let (id,): (Uuid,) =
        sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $1) RETURNING id")
            .bind(slug)
            .bind(color)
            .fetch_one(pool)
            .await
            .unwrap();
    id
}

pub async fn insert_ingredient(name: &str, unit: &str, pool: &Pool<Postgres>) -> Uuid {
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id",
    )
    .bind(name)
    .bind(unit)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

pub fn session(user_id: Uuid, role: UserRole) -> SessionData {
    SessionData {
        user_id,
        username: format!("user{user_id}"),
        role,
    }
}

pub fn recipe(name: &str, tags: &[Uuid], ingredients: &[(Uuid, i32)]) -> ValidatedRecipe {
    ValidatedRecipe {
        name: name.to_string(),
        text: "Mix and bake".to_string(),
        cooking_time: 30,
        image: DecodedImage {
            bytes: vec![],
            extension: "png",
        },
        tags: tags.to_vec(),
        ingredients: ingredients
            .iter()
            .map(|&(id, amount)| IngredientLine { id, amount })
            .collect(),
    }
}

pub fn media() -> MediaStorage {
    MediaStorage::new("./media", "/media/")
}

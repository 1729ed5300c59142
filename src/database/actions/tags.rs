use std::collections::HashMap;

use crate::{
    error::QueryError,
    schema::{RecipeTagRow, Tag, Uuid},
};

use sqlx::{Pool, Postgres};

pub async fn list_tags(slug: Option<&str>, pool: &Pool<Postgres>) -> Result<Vec<Tag>, potion::Error> {
    let rows: Vec<Tag> = match slug {
        Some(slug) => sqlx::query_as("SELECT * FROM tags WHERE slug = $1 ORDER BY id")
            .bind(slug)
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT * FROM tags ORDER BY id")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Tag>, potion::Error> {
    let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Returns `None` when a tag with the same name, colour or slug exists.
pub async fn create_tag(
    name: &str,
    color: &str,
    slug: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<Tag>, potion::Error> {
    let row: Option<Tag> = sqlx::query_as(
        "
        INSERT INTO tags (name, color, slug)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(name)
    .bind(color.to_uppercase())
    .bind(slug)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn existing_tag_ids(ids: &[Uuid], pool: &Pool<Postgres>) -> Result<Vec<Uuid>, potion::Error> {
    let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Tags of every given recipe, keyed by recipe id.
pub async fn list_recipe_tags(
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, Vec<Tag>>, potion::Error> {
    let rows: Vec<RecipeTagRow> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut map: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for row in rows {
        map.entry(row.recipe_id).or_default().push(row.into());
    }

    Ok(map)
}

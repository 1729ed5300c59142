use std::collections::HashMap;

use crate::{
    catalog::CatalogRow,
    error::QueryError,
    schema::{Ingredient, RecipeIngredientRow, RecipeIngredientView, Uuid},
};

use sqlx::{Pool, Postgres, QueryBuilder};

// Two binds per row, Postgres allows 65535 per statement
const IMPORT_CHUNK_SIZE: usize = 65535 / 2;

/// Escapes `%`, `_` and `\` so user input matches literally inside `ILIKE`.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive search. Names starting with the query come before names that only contain it.
pub async fn search_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, potion::Error> {
    let name = name.map(str::trim).filter(|name| !name.is_empty());

    let rows: Vec<Ingredient> = match name {
        Some(name) => {
            let escaped = escape_like(name);
            sqlx::query_as(
                "
                SELECT id, name, measurement_unit FROM ingredients
                WHERE name ILIKE $1
                ORDER BY (name ILIKE $2) DESC, name, id
            ",
            )
            .bind(format!("%{escaped}%"))
            .bind(format!("{escaped}%"))
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?
        }
        None => sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients ORDER BY name, id")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

pub async fn get_ingredient(
    id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, potion::Error> {
    let row: Option<Ingredient> =
        sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn existing_ingredient_ids(
    ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<Vec<Uuid>, potion::Error> {
    let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Line items of every given recipe, keyed by recipe id.
pub async fn list_recipe_ingredients(
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, Vec<RecipeIngredientView>>, potion::Error> {
    let rows: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut map: HashMap<Uuid, Vec<RecipeIngredientView>> = HashMap::new();
    for row in rows {
        map.entry(row.recipe_id).or_default().push(row.into());
    }

    Ok(map)
}

/// Inserts catalog rows that do not exist yet. Returns the number of new rows.
pub async fn import_ingredients(
    rows: &[CatalogRow],
    pool: &Pool<Postgres>,
) -> Result<u64, potion::Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let mut inserted = 0;
    for chunk in rows.chunks(IMPORT_CHUNK_SIZE) {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");

        query_builder.push_values(chunk, |mut b, row| {
            b.push_bind(row.name.clone())
                .push_bind(row.measurement_unit.clone());
        });
        query_builder.push(" ON CONFLICT (name, measurement_unit) DO NOTHING");

        let result = query_builder
            .build()
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;
        inserted += result.rows_affected();
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    Ok(inserted)
}

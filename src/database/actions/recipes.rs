use crate::{
    authentication::permissions::ensure_can_manage_recipe,
    error::{bad_request, forbidden, not_found, QueryError},
    form::Form,
    jwt::SessionData,
    media::MediaStorage,
    pagination::{window_total, Page, PageContext},
    schema::{RecipeRow, RecipeSummary, RecipeView, UserRole, Uuid},
    validation::ValidatedRecipe,
};

use super::{ingredients::list_recipe_ingredients, tags::list_recipe_tags};
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

/// Query filters accepted by the recipe list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

impl RecipeFilter {
    pub fn from_form(form: &Form) -> Result<Self, crate::error::TypeError> {
        Ok(Self {
            author: form.get_number("author")?,
            tags: form.get_all("tags"),
            is_favorited: form.get_bool("is_favorited")?,
            is_in_shopping_cart: form.get_bool("is_in_shopping_cart")?,
        })
    }

    /// Marker filters only make sense for a known caller.
    pub fn needs_session(&self) -> bool {
        self.is_favorited.is_some() || self.is_in_shopping_cart.is_some()
    }
}

fn push_recipe_select(query_builder: &mut QueryBuilder<'_, Postgres>, viewer: Option<Uuid>) {
    query_builder
        .push(
            "
        SELECT r.id, r.author_id, r.name, r.text, r.image, r.cooking_time,
            u.email AS author_email, u.username AS author_username,
            u.first_name AS author_first_name, u.last_name AS author_last_name,
            EXISTS (
                SELECT 1 FROM subscriptions s WHERE s.author_id = r.author_id AND s.follower_id = ",
        )
        .push_bind(viewer)
        .push(
            "
            ) AS author_is_subscribed,
            EXISTS (
                SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ",
        )
        .push_bind(viewer)
        .push(
            "
            ) AS is_favorited,
            EXISTS (
                SELECT 1 FROM cart_items c WHERE c.recipe_id = r.id AND c.user_id = ",
        )
        .push_bind(viewer)
        .push(
            "
            ) AS is_in_shopping_cart,
            COUNT(*) OVER() AS count
        FROM recipes r
        INNER JOIN users u ON u.id = r.author_id
        WHERE TRUE",
        );
}

fn push_marker_filter(
    query_builder: &mut QueryBuilder<'_, Postgres>,
    table: &str,
    flag: bool,
    viewer: Uuid,
) {
    let exists = if flag { "EXISTS" } else { "NOT EXISTS" };
    query_builder
        .push(format!(
            " AND {exists} (SELECT 1 FROM {table} m WHERE m.recipe_id = r.id AND m.user_id = "
        ))
        .push_bind(viewer)
        .push(")");
}

async fn assemble_views(
    rows: Vec<RecipeRow>,
    media: &MediaStorage,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeView>, potion::Error> {
    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let mut tags = list_recipe_tags(&ids, pool).await?;
    let mut ingredients = list_recipe_ingredients(&ids, pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let id = row.id;
            RecipeView::from_parts(
                row,
                tags.remove(&id).unwrap_or_default(),
                ingredients.remove(&id).unwrap_or_default(),
                media,
            )
        })
        .collect())
}

fn push_recipe_filters(
    query_builder: &mut QueryBuilder<'_, Postgres>,
    filter: &RecipeFilter,
    viewer: Option<Uuid>,
) {
    if let Some(author) = filter.author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query_builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }
    if let Some(viewer) = viewer {
        if let Some(flag) = filter.is_favorited {
            push_marker_filter(query_builder, "favorites", flag, viewer);
        }
        if let Some(flag) = filter.is_in_shopping_cart {
            push_marker_filter(query_builder, "cart_items", flag, viewer);
        }
    }
}

async fn count_recipes(
    filter: &RecipeFilter,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<i64, potion::Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
    push_recipe_filters(&mut query_builder, filter, viewer);

    let (count,): (i64,) = query_builder
        .build_query_as()
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(count)
}

/// Newest recipes first. Marker filters are ignored for anonymous viewers.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Uuid>,
    page: Page,
    media: &MediaStorage,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeView>, potion::Error> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new("");
    push_recipe_select(&mut query_builder, viewer);
    push_recipe_filters(&mut query_builder, filter, viewer);

    query_builder
        .push(" ORDER BY r.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);

    let rows: Vec<RecipeRow> = query_builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let first = rows.first().map(|row| row.count);
    let total_count = window_total(first, page, count_recipes(filter, viewer, pool)).await?;
    let views = assemble_views(rows, media, pool).await?;

    Ok(PageContext::from_rows(views, total_count, page))
}

pub async fn get_recipe_view(
    id: Uuid,
    viewer: Option<Uuid>,
    media: &MediaStorage,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeView>, potion::Error> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new("");
    push_recipe_select(&mut query_builder, viewer);
    query_builder.push(" AND r.id = ").push_bind(id);

    let row: Option<RecipeRow> = query_builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    match row {
        Some(row) => Ok(assemble_views(vec![row], media, pool).await?.into_iter().next()),
        None => Ok(None),
    }
}

pub async fn get_recipe_summary(
    id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeSummary>, potion::Error> {
    let row: Option<RecipeSummary> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

/// Resolves a recipe the caller is about to change: 404 when it is missing, 403 when it is not theirs.
/// The caller's role is read from the store, a token keeps the role it was issued with.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Uuid, potion::Error> {
    let row: Option<(Uuid, Option<UserRole>)> = sqlx::query_as(
        "
        SELECT r.author_id, (SELECT u.role FROM users u WHERE u.id = $2) AS role
        FROM recipes r
        WHERE r.id = $1
    ",
    )
    .bind(id)
    .bind(session.user_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    let (author_id, role) = row.ok_or_else(|| not_found("Recipe not found"))?;
    let role = role.ok_or_else(|| forbidden("You do not have permission to perform this action"))?;

    let current = SessionData {
        role,
        ..session.clone()
    };
    ensure_can_manage_recipe(author_id, &current)?;

    Ok(author_id)
}

fn map_write_error(e: sqlx::Error) -> potion::Error {
    let rejected = e
        .as_database_error()
        .map(|db| db.is_foreign_key_violation() || db.is_unique_violation())
        .unwrap_or(false);

    if rejected {
        return bad_request("Recipe references a missing or duplicate tag or ingredient");
    }
    QueryError::from(e).into()
}

async fn insert_recipe_children(
    recipe_id: Uuid,
    recipe: &ValidatedRecipe,
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), potion::Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query_builder.push_values(recipe.tags.iter(), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });
    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(map_write_error)?;

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query_builder.push_values(recipe.ingredients.iter(), |mut b, line| {
        b.push_bind(recipe_id)
            .push_bind(line.id)
            .push_bind(line.amount);
    });
    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(map_write_error)?;

    Ok(())
}

pub async fn create_recipe(
    author_id: Uuid,
    recipe: &ValidatedRecipe,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Uuid, potion::Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let (id,): (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id;
    ",
    )
    .bind(author_id)
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(image)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    insert_recipe_children(id, recipe, &mut tr).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    log::info!("User {author_id} created recipe {id}");
    Ok(id)
}

/// Replaces every field, tag and line item of the recipe. Returns the image it had before.
pub async fn update_recipe(
    id: Uuid,
    recipe: &ValidatedRecipe,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<String>, potion::Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let previous: Option<(Option<String>,)> =
        sqlx::query_as("SELECT image FROM recipes WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tr)
            .await
            .map_err(QueryError::from)?;
    let (previous_image,) = previous.ok_or_else(|| not_found("Recipe not found"))?;

    sqlx::query(
        "UPDATE recipes SET name = $1, text = $2, image = $3, cooking_time = $4 WHERE id = $5",
    )
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(image)
    .bind(recipe.cooking_time)
    .bind(id)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    insert_recipe_children(id, recipe, &mut tr).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    log::info!("Recipe {id} updated");
    Ok(previous_image)
}

/// Returns the image of the deleted recipe.
pub async fn delete_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<String>, potion::Error> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("DELETE FROM recipes WHERE id = $1 RETURNING image")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    let (image,) = row.ok_or_else(|| not_found("Recipe not found"))?;

    log::info!("Recipe {id} deleted");
    Ok(image)
}

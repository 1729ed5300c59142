use crate::{
    error::{bad_request, not_found, QueryError},
    media::MediaStorage,
    schema::{CartPart, RecipeSummary, Uuid},
    shopping_list::ShoppingList,
};

use super::recipes::get_recipe_summary;
use sqlx::{Pool, Postgres};

/// Per-user recipe markers. Both ledgers share the same `(user_id, recipe_id)` shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ledger {
    Favorites,
    ShoppingCart,
}

impl Ledger {
    fn table(&self) -> &'static str {
        match self {
            Ledger::Favorites => "favorites",
            Ledger::ShoppingCart => "cart_items",
        }
    }

    fn duplicate_message(&self) -> &'static str {
        match self {
            Ledger::Favorites => "Recipe is already in favorites",
            Ledger::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    fn missing_message(&self) -> &'static str {
        match self {
            Ledger::Favorites => "Recipe is not in favorites",
            Ledger::ShoppingCart => "Recipe is not in the shopping cart",
        }
    }
}

/// A recipe deleted after the caller looked it up fails the foreign key.
async fn insert_marker(
    ledger: Ledger,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        ledger.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| {
        let missing = e
            .as_database_error()
            .map(|db| db.is_foreign_key_violation())
            .unwrap_or(false);
        if missing {
            return bad_request("Recipe does not exist");
        }
        QueryError::from(e).into()
    })?;

    if result.rows_affected() == 0 {
        return Err(bad_request(ledger.duplicate_message()));
    }

    Ok(())
}

/// Marks a recipe. A missing recipe is a bad request here, the recipe id comes from the body of the action.
pub async fn add_to_ledger(
    ledger: Ledger,
    user_id: Uuid,
    recipe_id: Uuid,
    media: &MediaStorage,
    pool: &Pool<Postgres>,
) -> Result<RecipeSummary, potion::Error> {
    let recipe = get_recipe_summary(recipe_id, pool)
        .await?
        .ok_or_else(|| bad_request("Recipe does not exist"))?;

    insert_marker(ledger, user_id, recipe_id, pool).await?;

    log::trace!("User {user_id} added recipe {recipe_id} to {}", ledger.table());
    Ok(recipe.with_media_url(media))
}

pub async fn remove_from_ledger(
    ledger: Ledger,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    if get_recipe_summary(recipe_id, pool).await?.is_none() {
        return Err(not_found("Recipe does not exist"));
    }

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        ledger.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(bad_request(ledger.missing_message()));
    }

    log::trace!("User {user_id} removed recipe {recipe_id} from {}", ledger.table());
    Ok(())
}

/// Aggregated ingredients of every recipe in the user's cart.
pub async fn build_shopping_list(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShoppingList, potion::Error> {
    let parts: Vec<CartPart> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, ri.amount
        FROM cart_items c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(ShoppingList::from_parts(parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::fixtures::{insert_ingredient, insert_tag, insert_user, media, recipe};
    use crate::actions::create_recipe;
    use sqlx::PgPool;

    #[test]
    fn ledgers_use_their_own_tables_and_messages() {
        assert_eq!(Ledger::Favorites.table(), "favorites");
        assert_eq!(Ledger::ShoppingCart.table(), "cart_items");
        assert_ne!(
            Ledger::Favorites.duplicate_message(),
            Ledger::ShoppingCart.duplicate_message()
        );
        assert!(Ledger::ShoppingCart.missing_message().contains("shopping cart"));
    }

    async fn bread(author: Uuid, pool: &PgPool) -> Uuid {
        let tag = insert_tag("breakfast", "#E26C2D", pool).await;
        let flour = insert_ingredient("flour", "g", pool).await;
        let draft = recipe("Bread", &[tag], &[(flour, 500)]);
        create_recipe(author, &draft, "a.png", pool)
            .await
            .ok()
            .unwrap()
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn marking_twice_is_a_conflict(pool: PgPool) {
        let user = insert_user("reader", &pool).await;
        let id = bread(user, &pool).await;

        for ledger in [Ledger::Favorites, Ledger::ShoppingCart] {
            let summary = add_to_ledger(ledger, user, id, &media(), &pool).await;
            assert_eq!(summary.ok().map(|s| s.id), Some(id));

            let again = add_to_ledger(ledger, user, id, &media(), &pool).await.err();
            assert_eq!(again.as_ref().map(|e| e.code), Some(400));
            assert_eq!(
                again.and_then(|e| e.info),
                Some(ledger.duplicate_message().to_string())
            );
        }
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn removing_twice_reports_the_missing_marker(pool: PgPool) {
        let user = insert_user("reader", &pool).await;
        let id = bread(user, &pool).await;

        add_to_ledger(Ledger::Favorites, user, id, &media(), &pool)
            .await
            .ok()
            .unwrap();
        assert!(remove_from_ledger(Ledger::Favorites, user, id, &pool).await.is_ok());

        let again = remove_from_ledger(Ledger::Favorites, user, id, &pool).await.err();
        assert_eq!(again.as_ref().map(|e| e.code), Some(400));
        assert_eq!(
            again.and_then(|e| e.info),
            Some(Ledger::Favorites.missing_message().to_string())
        );
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn missing_recipes_are_rejected(pool: PgPool) {
        let user = insert_user("reader", &pool).await;

        let add = add_to_ledger(Ledger::Favorites, user, 404, &media(), &pool).await;
        assert_eq!(add.err().map(|e| e.code), Some(400));

        let remove = remove_from_ledger(Ledger::ShoppingCart, user, 404, &pool).await;
        assert_eq!(remove.err().map(|e| e.code), Some(404));

        let insert = insert_marker(Ledger::ShoppingCart, user, 404, &pool).await.err();
        assert_eq!(insert.as_ref().map(|e| e.code), Some(400));
        assert_eq!(
            insert.and_then(|e| e.info),
            Some("Recipe does not exist".to_string())
        );
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn shopping_list_sums_only_the_callers_cart(pool: PgPool) {
        let user = insert_user("reader", &pool).await;
        let other = insert_user("other", &pool).await;
        let tag = insert_tag("baking", "#E26C2D", &pool).await;
        let flour = insert_ingredient("flour", "g", &pool).await;
        let apple = insert_ingredient("apple", "pcs", &pool).await;
        let banana = insert_ingredient("Banana", "pcs", &pool).await;
        let salt = insert_ingredient("salt", "g", &pool).await;

        let drafts = [
            (user, recipe("A", &[tag], &[(flour, 200), (banana, 2)])),
            (user, recipe("B", &[tag], &[(flour, 300), (apple, 1)])),
            (other, recipe("C", &[tag], &[(salt, 5)])),
        ];
        let mut ids = vec![];
        for (author, draft) in &drafts {
            ids.push(create_recipe(*author, draft, "a.png", &pool).await.ok().unwrap());
        }
        let (a, b, c) = (ids[0], ids[1], ids[2]);

        for id in [a, b] {
            add_to_ledger(Ledger::ShoppingCart, user, id, &media(), &pool)
                .await
                .ok()
                .unwrap();
        }
        add_to_ledger(Ledger::ShoppingCart, other, c, &media(), &pool)
            .await
            .ok()
            .unwrap();
        add_to_ledger(Ledger::Favorites, user, c, &media(), &pool)
            .await
            .ok()
            .unwrap();

        let list = build_shopping_list(user, &pool).await.ok().unwrap();
        assert_eq!(
            list.render(),
            "Shopping list:\n\napple - 1, pcs\nBanana - 2, pcs\nflour - 500, g"
        );

        let empty = build_shopping_list(insert_user("newcomer", &pool).await, &pool)
            .await
            .ok()
            .unwrap();
        assert_eq!(empty.render(), "Shopping list:\n");
    }
}

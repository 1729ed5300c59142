use std::collections::HashMap;

use crate::{
    error::{bad_request, violated_constraint, QueryError},
    media::MediaStorage,
    pagination::{window_total, Page, PageContext},
    schema::{AuthorRecipeRow, ProfileView, RecipeSummary, UserRow, UserView, Uuid},
};

use sqlx::{Pool, Postgres};

/// Recipes of one author after grouping: the newest `limit` of them and the full count.
#[derive(Debug, Default)]
struct AuthorRecipes {
    recipes: Vec<RecipeSummary>,
    count: i64,
}

/// Expects rows ordered newest first.
fn group_author_recipes(
    rows: Vec<AuthorRecipeRow>,
    limit: Option<usize>,
) -> HashMap<Uuid, AuthorRecipes> {
    let mut map: HashMap<Uuid, AuthorRecipes> = HashMap::new();
    for row in rows {
        let entry = map.entry(row.author_id).or_default();
        entry.count += 1;
        if limit.map_or(true, |limit| entry.recipes.len() < limit) {
            entry.recipes.push(row.into());
        }
    }
    map
}

async fn build_profiles(
    users: Vec<UserView>,
    recipes_limit: Option<usize>,
    media: &MediaStorage,
    pool: &Pool<Postgres>,
) -> Result<Vec<ProfileView>, potion::Error> {
    let author_ids: Vec<Uuid> = users.iter().map(|user| user.id).collect();

    let rows: Vec<AuthorRecipeRow> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time
        FROM recipes
        WHERE author_id = ANY($1)
        ORDER BY id DESC
    ",
    )
    .bind(&author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut grouped = group_author_recipes(rows, recipes_limit);

    Ok(users
        .into_iter()
        .map(|user| {
            let AuthorRecipes { recipes, count } = grouped.remove(&user.id).unwrap_or_default();
            ProfileView {
                user,
                recipes: recipes
                    .into_iter()
                    .map(|recipe| recipe.with_media_url(media))
                    .collect(),
                recipes_count: count,
            }
        })
        .collect())
}

pub async fn get_profile(
    author_id: Uuid,
    viewer: Uuid,
    recipes_limit: Option<usize>,
    media: &MediaStorage,
    pool: &Pool<Postgres>,
) -> Result<Option<ProfileView>, potion::Error> {
    let user = match super::users::get_user_view(author_id, Some(viewer), pool).await? {
        Some(user) => user,
        None => return Ok(None),
    };

    let profile = build_profiles(vec![user], recipes_limit, media, pool).await?;
    Ok(profile.into_iter().next())
}

/// The author must exist and differ from the follower; both are checked by the caller.
pub async fn follow_user(
    follower_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let result = sqlx::query(
        "INSERT INTO subscriptions (follower_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(follower_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(|e| match violated_constraint(&e).as_deref() {
        Some("self_follow_forbidden") => bad_request("You cannot subscribe to yourself"),
        _ => QueryError::from(e).into(),
    })?;

    if result.rows_affected() == 0 {
        return Err(bad_request("You are already subscribed to this user"));
    }

    log::info!("User {follower_id} subscribed to {author_id}");
    Ok(())
}

pub async fn unfollow_user(
    follower_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE follower_id = $1 AND author_id = $2")
        .bind(follower_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(bad_request("Subscription does not exist"));
    }

    log::info!("User {follower_id} unsubscribed from {author_id}");
    Ok(())
}

async fn count_subscriptions(follower_id: Uuid, pool: &Pool<Postgres>) -> Result<i64, potion::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE follower_id = $1")
            .bind(follower_id)
            .fetch_one(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(count)
}

/// Authors the user follows, oldest subscription first.
pub async fn fetch_subscriptions(
    follower_id: Uuid,
    page: Page,
    recipes_limit: Option<usize>,
    media: &MediaStorage,
    pool: &Pool<Postgres>,
) -> Result<PageContext<ProfileView>, potion::Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            TRUE AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.follower_id = $1
        ORDER BY s.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(follower_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let first = rows.first().map(|row| row.count);
    let total_count = window_total(first, page, count_subscriptions(follower_id, pool)).await?;
    let users = rows.into_iter().map(UserView::from).collect();
    let profiles = build_profiles(users, recipes_limit, media, pool).await?;

    Ok(PageContext::from_rows(profiles, total_count, page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::fixtures::{insert_user, media};
    use sqlx::PgPool;

    fn row(author_id: Uuid, id: Uuid) -> AuthorRecipeRow {
        AuthorRecipeRow {
            author_id,
            id,
            name: format!("recipe {id}"),
            image: None,
            cooking_time: 10,
        }
    }

    #[test]
    fn limits_recipes_but_counts_all() {
        let rows = vec![row(1, 5), row(2, 4), row(1, 3), row(1, 2)];
        let grouped = group_author_recipes(rows, Some(2));

        let first = &grouped[&1];
        assert_eq!(first.count, 3);
        assert_eq!(
            first.recipes.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![5, 3]
        );
        assert_eq!(grouped[&2].count, 1);
    }

    #[test]
    fn keeps_every_recipe_without_limit() {
        let grouped = group_author_recipes(vec![row(1, 2), row(1, 1)], None);
        assert_eq!(grouped[&1].recipes.len(), 2);
        assert!(!grouped.contains_key(&3));
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn following_twice_is_a_conflict(pool: PgPool) {
        let reader = insert_user("reader", &pool).await;
        let author = insert_user("author", &pool).await;

        assert!(follow_user(reader, author, &pool).await.is_ok());
        let again = follow_user(reader, author, &pool).await.err();
        assert_eq!(again.as_ref().map(|e| e.code), Some(400));
        assert_eq!(
            again.and_then(|e| e.info),
            Some("You are already subscribed to this user".to_string())
        );

        let profile = get_profile(author, reader, None, &media(), &pool)
            .await
            .ok()
            .flatten()
            .unwrap();
        assert!(profile.user.is_subscribed);
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn self_follow_is_refused_by_the_store(pool: PgPool) {
        let reader = insert_user("reader", &pool).await;

        let refused = follow_user(reader, reader, &pool).await.err();
        assert_eq!(refused.as_ref().map(|e| e.code), Some(400));
        assert_eq!(
            refused.and_then(|e| e.info),
            Some("You cannot subscribe to yourself".to_string())
        );
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn unfollowing_without_a_subscription_fails(pool: PgPool) {
        let reader = insert_user("reader", &pool).await;
        let author = insert_user("author", &pool).await;

        let missing = unfollow_user(reader, author, &pool).await.err();
        assert_eq!(missing.as_ref().map(|e| e.code), Some(400));
        assert_eq!(
            missing.and_then(|e| e.info),
            Some("Subscription does not exist".to_string())
        );

        follow_user(reader, author, &pool).await.ok().unwrap();
        assert!(unfollow_user(reader, author, &pool).await.is_ok());
        assert!(unfollow_user(reader, author, &pool).await.is_err());
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn subscription_pages_past_the_end_keep_the_total(pool: PgPool) {
        let reader = insert_user("reader", &pool).await;
        for name in ["first", "second", "third"] {
            let author = insert_user(name, &pool).await;
            follow_user(reader, author, &pool).await.ok().unwrap();
        }

        let page = fetch_subscriptions(reader, Page::new(Some(2), Some(4)), None, &media(), &pool)
            .await
            .ok()
            .unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.count, 3);

        let page = fetch_subscriptions(reader, Page::new(Some(2), Some(0)), None, &media(), &pool)
            .await
            .ok()
            .unwrap();
        let names: Vec<&str> = page.results.iter().map(|p| p.user.username.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(page.next_offset, Some(2));
    }
}

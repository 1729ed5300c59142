use crate::{
    authentication::{cryptography::verify_password, jwt::SessionKeys},
    error::{bad_request, QueryError, ValidationError},
    pagination::{window_total, Page, PageContext},
    schema::{RegisteredUser, User, UserRole, UserRow, UserView, Uuid},
    validation::RegisterPayload,
};

use sqlx::{Pool, Postgres};

const USER_VIEW_SELECT: &str = "
    SELECT u.id, u.email, u.username, u.first_name, u.last_name,
        EXISTS (
            SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.follower_id = $1
        ) AS is_subscribed,
        COUNT(*) OVER() AS count
    FROM users u
";

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(
    pool: &Pool<Postgres>,
    user_id: Uuid,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Creates a user with an already hashed password.
/// Returns `None` when the username or email is taken, emails compare without case.
pub async fn register_user(
    payload: &RegisterPayload,
    password_hash: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<RegisteredUser>, potion::Error> {
    let row: Option<RegisteredUser> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING
        RETURNING id, email, username, first_name, last_name;
    ",
    )
    .bind(payload.email.trim())
    .bind(&payload.username)
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(password_hash)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

/// Names the field a refused registration collided on.
pub async fn registration_conflict(
    payload: &RegisterPayload,
    pool: &Pool<Postgres>,
) -> Result<ValidationError, potion::Error> {
    if get_user_by_email(pool, payload.email.trim()).await?.is_some() {
        return Ok(ValidationError::new(
            "email",
            "A user with that email already exists",
        ));
    }

    Ok(ValidationError::new(
        "username",
        "A user with that username already exists",
    ))
}

pub async fn login_user(
    email: &str,
    password: &str,
    keys: &SessionKeys,
    pool: &Pool<Postgres>,
) -> Result<String, potion::Error> {
    let user = match get_user_by_email(pool, email).await? {
        Some(user) => user,
        None => return Err(bad_request("Invalid credentials")),
    };

    let authenticated = verify_password(password, &user.password)
        .map_err(|e| QueryError::new(format!("Stored password hash is invalid: {e}")))?;
    if !authenticated {
        return Err(bad_request("Invalid credentials"));
    }

    log::info!("User {} logged in", user.id);
    keys.generate_jwt_session(&user)
}

pub async fn update_password(
    user_id: Uuid,
    password_hash: &str,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

pub async fn set_user_role(
    email: &str,
    role: UserRole,
    pool: &Pool<Postgres>,
) -> Result<bool, potion::Error> {
    let result = sqlx::query("UPDATE users SET role = $1 WHERE LOWER(email) = LOWER($2)")
        .bind(role)
        .bind(email)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_user_view(
    user_id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<Option<UserView>, potion::Error> {
    let row: Option<UserRow> = sqlx::query_as(&format!("{USER_VIEW_SELECT} WHERE u.id = $2"))
        .bind(viewer)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row.map(UserView::from))
}

async fn count_users(pool: &Pool<Postgres>) -> Result<i64, potion::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(count)
}

pub async fn fetch_users(
    viewer: Option<Uuid>,
    page: Page,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserView>, potion::Error> {
    let rows: Vec<UserRow> = sqlx::query_as(&format!(
        "{USER_VIEW_SELECT} ORDER BY u.id LIMIT $2 OFFSET $3"
    ))
    .bind(viewer)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let first = rows.first().map(|row| row.count);
    let total_count = window_total(first, page, count_users(pool)).await?;
    let rows = rows.into_iter().map(UserView::from).collect();

    Ok(PageContext::from_rows(rows, total_count, page))
}

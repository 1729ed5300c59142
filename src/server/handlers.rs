use std::sync::Arc;

use serde_json::json;
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply},
};

use super::{
    rejection::reject,
    state::AppState,
};
use crate::{
    actions::{self, Ledger, RecipeFilter},
    constants::SHOPPING_LIST_FILENAME,
    cryptography::{hash_password, verify_password},
    error::{not_found, QueryError, TypeError, ValidationError},
    form::Form,
    jwt::SessionData,
    middleware::Unauthorized,
    pagination::Page,
    permissions::ActionType,
    schema::Uuid,
    validation::{
        missing_ids, RecipePayload, RegisterPayload, SetPasswordPayload, TokenPayload,
        ValidatedRecipe,
    },
};

fn page_from_form(form: &Form) -> Result<Page, TypeError> {
    Ok(Page::new(form.get_number("limit")?, form.get_number("offset")?))
}

fn no_content() -> impl Reply {
    reply::with_status(reply::reply(), StatusCode::NO_CONTENT)
}

fn created<T: serde::Serialize>(body: &T) -> impl Reply {
    reply::with_status(reply::json(body), StatusCode::CREATED)
}

/// Every referenced tag and ingredient has to exist before anything is written.
async fn ensure_catalog(recipe: &ValidatedRecipe, state: &AppState) -> Result<(), Rejection> {
    let found = actions::existing_tag_ids(&recipe.tags, &state.pool)
        .await
        .map_err(reject)?;
    if let Some(id) = missing_ids(&recipe.tags, &found).first() {
        return Err(reject(ValidationError::new(
            "tags",
            &format!("Tag {id} does not exist"),
        )));
    }

    let requested = recipe.ingredient_ids();
    let found = actions::existing_ingredient_ids(&requested, &state.pool)
        .await
        .map_err(reject)?;
    if let Some(id) = missing_ids(&requested, &found).first() {
        return Err(reject(ValidationError::new(
            "ingredients",
            &format!("Ingredient {id} does not exist"),
        )));
    }

    Ok(())
}

async fn recipe_reply(id: Uuid, viewer: Uuid, state: &AppState) -> Result<reply::Json, Rejection> {
    let view = actions::get_recipe_view(id, Some(viewer), &state.media, &state.pool)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(not_found("Recipe not found")))?;

    Ok(reply::json(&view))
}

// Recipes

pub async fn list_recipes(
    query: String,
    session: Option<SessionData>,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let form = Form::from_query(&query);
    let filter = RecipeFilter::from_form(&form).map_err(reject)?;
    if filter.needs_session() && session.is_none() {
        return Err(warp::reject::custom(Unauthorized));
    }
    let page = page_from_form(&form).map_err(reject)?;

    let viewer = session.map(|session| session.user_id);
    let recipes = actions::fetch_recipes(&filter, viewer, page, &state.media, &state.pool)
        .await
        .map_err(reject)?;

    Ok(reply::json(&recipes))
}

pub async fn get_recipe(
    id: Uuid,
    session: Option<SessionData>,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|session| session.user_id);
    let recipe = actions::get_recipe_view(id, viewer, &state.media, &state.pool)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(not_found("Recipe not found")))?;

    Ok(reply::json(&recipe))
}

pub async fn create_recipe(
    session: SessionData,
    payload: RecipePayload,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::CreateRecipes)
        .map_err(reject)?;

    let recipe = payload.validate().map_err(reject)?;
    ensure_catalog(&recipe, &state).await?;

    let image = state.media.save(&recipe.image).await.map_err(reject)?;
    let id = match actions::create_recipe(session.user_id, &recipe, &image, &state.pool).await {
        Ok(id) => id,
        Err(e) => {
            state.media.remove(&image).await;
            return Err(reject(e));
        }
    };

    let body = recipe_reply(id, session.user_id, &state).await?;
    Ok(reply::with_status(body, StatusCode::CREATED))
}

pub async fn update_recipe(
    id: Uuid,
    session: SessionData,
    payload: RecipePayload,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    actions::get_recipe_mut(id, &session, &state.pool)
        .await
        .map_err(reject)?;

    let recipe = payload.validate().map_err(reject)?;
    ensure_catalog(&recipe, &state).await?;

    let image = state.media.save(&recipe.image).await.map_err(reject)?;
    match actions::update_recipe(id, &recipe, &image, &state.pool).await {
        Ok(Some(previous)) => state.media.remove(&previous).await,
        Ok(None) => {}
        Err(e) => {
            state.media.remove(&image).await;
            return Err(reject(e));
        }
    }

    recipe_reply(id, session.user_id, &state).await
}

pub async fn delete_recipe(
    id: Uuid,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    actions::get_recipe_mut(id, &session, &state.pool)
        .await
        .map_err(reject)?;

    let image = actions::delete_recipe(id, &state.pool)
        .await
        .map_err(reject)?;
    if let Some(image) = image {
        state.media.remove(&image).await;
    }

    Ok(no_content())
}

// Favorites and shopping cart

pub async fn add_to_ledger(
    ledger: Ledger,
    id: Uuid,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnMarkers)
        .map_err(reject)?;

    let summary = actions::add_to_ledger(ledger, session.user_id, id, &state.media, &state.pool)
        .await
        .map_err(reject)?;

    Ok(created(&summary))
}

pub async fn remove_from_ledger(
    ledger: Ledger,
    id: Uuid,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnMarkers)
        .map_err(reject)?;

    actions::remove_from_ledger(ledger, session.user_id, id, &state.pool)
        .await
        .map_err(reject)?;

    Ok(no_content())
}

pub async fn download_shopping_cart(
    session: SessionData,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let list = actions::build_shopping_list(session.user_id, &state.pool)
        .await
        .map_err(reject)?;

    let body = reply::with_header(list.render(), "content-type", "text/plain; charset=utf-8");
    Ok(reply::with_header(
        body,
        "content-disposition",
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    ))
}

// Catalog

pub async fn list_tags(query: String, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let form = Form::from_query(&query);
    let tags = actions::list_tags(form.get_str("slug"), &state.pool)
        .await
        .map_err(reject)?;

    Ok(reply::json(&tags))
}

pub async fn get_tag(id: Uuid, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let tag = actions::get_tag(id, &state.pool)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(not_found("Tag not found")))?;

    Ok(reply::json(&tag))
}

pub async fn list_ingredients(
    query: String,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let form = Form::from_query(&query);
    let ingredients = actions::search_ingredients(form.get_str("name"), &state.pool)
        .await
        .map_err(reject)?;

    Ok(reply::json(&ingredients))
}

pub async fn get_ingredient(id: Uuid, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let ingredient = actions::get_ingredient(id, &state.pool)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(not_found("Ingredient not found")))?;

    Ok(reply::json(&ingredient))
}

// Users

pub async fn register(
    payload: RegisterPayload,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    payload.validate().map_err(reject)?;

    if actions::get_user_by_email(&state.pool, payload.email.trim())
        .await
        .map_err(reject)?
        .is_some()
    {
        return Err(reject(ValidationError::new(
            "email",
            "A user with that email already exists",
        )));
    }

    let password_hash = hash_password(&payload.password)
        .map_err(|e| reject(QueryError::new(format!("Could not hash password: {e}"))))?;

    let user = match actions::register_user(&payload, &password_hash, &state.pool)
        .await
        .map_err(reject)?
    {
        Some(user) => user,
        None => {
            let conflict = actions::registration_conflict(&payload, &state.pool)
                .await
                .map_err(reject)?;
            return Err(reject(conflict));
        }
    };

    log::info!("Registered user {}", user.id);
    Ok(created(&user))
}

pub async fn login(payload: TokenPayload, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let token = actions::login_user(&payload.email, &payload.password, &state.keys, &state.pool)
        .await
        .map_err(reject)?;

    Ok(reply::json(&json!({ "auth_token": token })))
}

/// Tokens are stateless, logging out only confirms the caller held a valid one.
pub async fn logout(session: SessionData) -> Result<impl Reply, Rejection> {
    log::trace!("User {} logged out", session.user_id);
    Ok(no_content())
}

pub async fn list_users(
    query: String,
    session: Option<SessionData>,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let page = page_from_form(&Form::from_query(&query)).map_err(reject)?;
    let viewer = session.map(|session| session.user_id);

    let users = actions::fetch_users(viewer, page, &state.pool)
        .await
        .map_err(reject)?;

    Ok(reply::json(&users))
}

pub async fn get_user(
    id: Uuid,
    session: Option<SessionData>,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|session| session.user_id);
    let user = actions::get_user_view(id, viewer, &state.pool)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(not_found("User not found")))?;

    Ok(reply::json(&user))
}

pub async fn me(session: SessionData, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let user = actions::get_user_view(session.user_id, Some(session.user_id), &state.pool)
        .await
        .map_err(reject)?
        .ok_or_else(|| warp::reject::custom(Unauthorized))?;

    Ok(reply::json(&user))
}

pub async fn set_password(
    session: SessionData,
    payload: SetPasswordPayload,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    payload.validate().map_err(reject)?;

    let user = actions::get_user_by_id(&state.pool, session.user_id)
        .await
        .map_err(reject)?
        .ok_or_else(|| warp::reject::custom(Unauthorized))?;

    let valid = verify_password(&payload.current_password, &user.password)
        .map_err(|e| reject(QueryError::new(format!("Stored password hash is invalid: {e}"))))?;
    if !valid {
        return Err(reject(ValidationError::new(
            "current_password",
            "Invalid password",
        )));
    }

    let password_hash = hash_password(&payload.new_password)
        .map_err(|e| reject(QueryError::new(format!("Could not hash password: {e}"))))?;
    actions::update_password(user.id, &password_hash, &state.pool)
        .await
        .map_err(reject)?;

    log::info!("User {} changed their password", user.id);
    Ok(no_content())
}

// Subscriptions

pub async fn list_subscriptions(
    query: String,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let form = Form::from_query(&query);
    let page = page_from_form(&form).map_err(reject)?;
    let recipes_limit = form.get_number("recipes_limit").map_err(reject)?;

    let profiles = actions::fetch_subscriptions(
        session.user_id,
        page,
        recipes_limit,
        &state.media,
        &state.pool,
    )
    .await
    .map_err(reject)?;

    Ok(reply::json(&profiles))
}

pub async fn subscribe(
    id: Uuid,
    query: String,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnSubscriptions)
        .map_err(reject)?;
    let recipes_limit = Form::from_query(&query)
        .get_number("recipes_limit")
        .map_err(reject)?;

    if actions::get_user_by_id(&state.pool, id)
        .await
        .map_err(reject)?
        .is_none()
    {
        return Err(reject(not_found("User not found")));
    }
    if id == session.user_id {
        return Err(reject(ValidationError::new(
            "errors",
            "You cannot subscribe to yourself",
        )));
    }

    actions::follow_user(session.user_id, id, &state.pool)
        .await
        .map_err(reject)?;

    let profile = actions::get_profile(id, session.user_id, recipes_limit, &state.media, &state.pool)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(not_found("User not found")))?;

    Ok(created(&profile))
}

pub async fn unsubscribe(
    id: Uuid,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnSubscriptions)
        .map_err(reject)?;

    if actions::get_user_by_id(&state.pool, id)
        .await
        .map_err(reject)?
        .is_none()
    {
        return Err(reject(not_found("User not found")));
    }

    actions::unfollow_user(session.user_id, id, &state.pool)
        .await
        .map_err(reject)?;

    Ok(no_content())
}

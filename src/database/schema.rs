use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::TypeError;
use crate::media::MediaStorage;

pub type Uuid = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

impl FromStr for UserRole {
    type Err = TypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(TypeError::new("Invalid variant")),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
}

/// Returned right after registration, before any relation to the caller exists.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,

    pub count: i64,
}

impl From<UserRow> for UserView {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: row.is_subscribed,
        }
    }
}

/// A followed author together with a slice of their recipes.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: UserView,
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub image: Option<String>,
    pub cooking_time: i32,

    pub author_email: String,
    pub author_username: String,
    pub author_first_name: String,
    pub author_last_name: String,
    pub author_is_subscribed: bool,

    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,

    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeTagRow {
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<RecipeTagRow> for Tag {
    fn from(row: RecipeTagRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            color: row.color,
            slug: row.slug,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeIngredientRow {
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecipeIngredientView {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipeIngredientRow> for RecipeIngredientView {
    fn from(row: RecipeIngredientRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            measurement_unit: row.measurement_unit,
            amount: row.amount,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeView {
    pub id: Uuid,
    pub author: UserView,
    pub ingredients: Vec<RecipeIngredientView>,
    pub tags: Vec<Tag>,
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeView {
    pub fn from_parts(
        row: RecipeRow,
        tags: Vec<Tag>,
        ingredients: Vec<RecipeIngredientView>,
        media: &MediaStorage,
    ) -> Self {
        Self {
            id: row.id,
            author: UserView {
                id: row.author_id,
                email: row.author_email,
                username: row.author_username,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
                is_subscribed: row.author_is_subscribed,
            },
            ingredients,
            tags,
            image: row.image.map(|name| media.url(&name)),
            name: row.name,
            text: row.text,
            cooking_time: row.cooking_time,
            is_favorited: row.is_favorited,
            is_in_shopping_cart: row.is_in_shopping_cart,
        }
    }
}

/// Compact recipe shape returned by the ledger endpoints and profile views.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i32,
}

impl RecipeSummary {
    pub fn with_media_url(mut self, media: &MediaStorage) -> Self {
        self.image = self.image.map(|name| media.url(&name));
        self
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct AuthorRecipeRow {
    pub author_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i32,
}

impl From<AuthorRecipeRow> for RecipeSummary {
    fn from(row: AuthorRecipeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            image: row.image,
            cooking_time: row.cooking_time,
        }
    }
}

/// One recipe line item reached through a user's cart.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct CartPart {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

use std::collections::HashSet;

use serde::Deserialize;

use super::{error::ValidationError, schema::Uuid};
use crate::{
    constants::{
        EMAIL_MAX_LENGTH, MIN_COOKING_TIME, MIN_INGREDIENT_AMOUNT, NAME_MAX_LENGTH,
        RECIPE_NAME_MAX_LENGTH, TAG_FIELD_MAX_LENGTH, USERNAME_MAX_LENGTH, USERNAME_MIN_LENGTH,
    },
    media::{decode_image, DecodedImage},
};

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IngredientLine {
    pub id: Uuid,
    pub amount: i32,
}

/// Body of `POST /recipes` and `PATCH /recipes/{id}`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RecipePayload {
    #[serde(default)]
    pub ingredients: Vec<IngredientLine>,
    #[serde(default)]
    pub tags: Vec<Uuid>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub cooking_time: Option<i32>,
}

/// A recipe payload that passed every check that does not need the store.
#[derive(Debug, Clone)]
pub struct ValidatedRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: DecodedImage,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientLine>,
}

impl RecipePayload {
    pub fn validate(self) -> Result<ValidatedRecipe, ValidationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::new("name", "This field is required"));
        }
        if name.chars().count() > RECIPE_NAME_MAX_LENGTH {
            return Err(ValidationError::new(
                "name",
                &format!("Ensure this field has no more than {RECIPE_NAME_MAX_LENGTH} characters"),
            ));
        }
        if self.text.trim().is_empty() {
            return Err(ValidationError::new("text", "This field is required"));
        }
        let cooking_time = match self.cooking_time {
            Some(time) if time >= MIN_COOKING_TIME => time,
            Some(_) => {
                return Err(ValidationError::new(
                    "cooking_time",
                    &format!("Cooking time must be at least {MIN_COOKING_TIME}"),
                ))
            }
            None => return Err(ValidationError::new("cooking_time", "This field is required")),
        };

        let image = decode_image(self.image.as_deref().unwrap_or(""))?;

        if self.tags.is_empty() {
            return Err(ValidationError::new("tags", "At least one tag is required"));
        }
        let mut seen_tags = HashSet::new();
        if !self.tags.iter().all(|tag| seen_tags.insert(*tag)) {
            return Err(ValidationError::new("tags", "This tag is already added"));
        }

        if self.ingredients.is_empty() {
            return Err(ValidationError::new(
                "ingredients",
                "At least one ingredient is required",
            ));
        }
        let mut seen_ingredients = HashSet::new();
        for line in self.ingredients.iter() {
            if line.amount < MIN_INGREDIENT_AMOUNT {
                return Err(ValidationError::new(
                    "ingredients",
                    &format!("Ingredient amount must be at least {MIN_INGREDIENT_AMOUNT}"),
                ));
            }
            if !seen_ingredients.insert(line.id) {
                return Err(ValidationError::new(
                    "ingredients",
                    "This ingredient is already added",
                ));
            }
        }

        Ok(ValidatedRecipe {
            name,
            text: self.text,
            cooking_time,
            image,
            tags: self.tags,
            ingredients: self.ingredients,
        })
    }
}

impl ValidatedRecipe {
    pub fn ingredient_ids(&self) -> Vec<Uuid> {
        self.ingredients.iter().map(|line| line.id).collect()
    }
}

/// Requested ids that the store did not return, in request order.
pub fn missing_ids(requested: &[Uuid], found: &[Uuid]) -> Vec<Uuid> {
    let found: HashSet<&Uuid> = found.iter().collect();
    requested
        .iter()
        .filter(|id| !found.contains(id))
        .copied()
        .collect()
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RegisterPayload {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;

        let email = self.email.trim();
        if email.is_empty() {
            return Err(ValidationError::new("email", "This field is required"));
        }
        if email.chars().count() > EMAIL_MAX_LENGTH || !is_email(email) {
            return Err(ValidationError::new("email", "Enter a valid email address"));
        }

        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::new(field, "This field is required"));
            }
            if value.chars().count() > NAME_MAX_LENGTH {
                return Err(ValidationError::new(
                    field,
                    &format!("Ensure this field has no more than {NAME_MAX_LENGTH} characters"),
                ));
            }
        }

        if self.password.is_empty() {
            return Err(ValidationError::new("password", "This field is required"));
        }

        Ok(())
    }
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let length = username.chars().count();
    if length < USERNAME_MIN_LENGTH {
        return Err(ValidationError::new(
            "username",
            &format!("Ensure this field has at least {USERNAME_MIN_LENGTH} characters"),
        ));
    }
    if length > USERNAME_MAX_LENGTH {
        return Err(ValidationError::new(
            "username",
            &format!("Ensure this field has no more than {USERNAME_MAX_LENGTH} characters"),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
    {
        return Err(ValidationError::new(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters",
        ));
    }

    Ok(())
}

fn is_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TokenPayload {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SetPasswordPayload {
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub current_password: String,
}

impl SetPasswordPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.new_password.is_empty() {
            return Err(ValidationError::new("new_password", "This field is required"));
        }
        if self.current_password.is_empty() {
            return Err(ValidationError::new(
                "current_password",
                "This field is required",
            ));
        }
        Ok(())
    }
}

pub fn validate_tag(name: &str, color: &str, slug: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() || name.chars().count() > TAG_FIELD_MAX_LENGTH {
        return Err(ValidationError::new("name", "Enter a valid tag name"));
    }
    if !is_hex_color(color) {
        return Err(ValidationError::new(
            "color",
            "Color must be a HEX value such as #49B64E",
        ));
    }
    if slug.is_empty()
        || slug.chars().count() > TAG_FIELD_MAX_LENGTH
        || !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::new(
            "slug",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens",
        ));
    }

    Ok(())
}

pub fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn payload() -> RecipePayload {
        RecipePayload {
            ingredients: vec![
                IngredientLine { id: 1, amount: 5 },
                IngredientLine { id: 2, amount: 3 },
            ],
            tags: vec![1, 2],
            image: Some(PNG_PIXEL.to_string()),
            name: "Pancakes".to_string(),
            text: "Mix and fry".to_string(),
            cooking_time: Some(20),
        }
    }

    fn field_of(payload: RecipePayload) -> &'static str {
        payload.validate().unwrap_err().field
    }

    #[test]
    fn accepts_valid_payload() {
        let recipe = payload().validate().unwrap();
        assert_eq!(recipe.tags, vec![1, 2]);
        assert_eq!(recipe.ingredient_ids(), vec![1, 2]);
        assert_eq!(recipe.cooking_time, 20);
        assert_eq!(recipe.image.extension, "png");
    }

    #[test]
    fn requires_image() {
        assert_eq!(field_of(RecipePayload { image: None, ..payload() }), "image");
        assert_eq!(
            field_of(RecipePayload {
                image: Some("not an image".into()),
                ..payload()
            }),
            "image"
        );
    }

    #[test]
    fn rejects_empty_or_duplicate_tags() {
        assert_eq!(field_of(RecipePayload { tags: vec![], ..payload() }), "tags");
        assert_eq!(
            field_of(RecipePayload {
                tags: vec![1, 1],
                ..payload()
            }),
            "tags"
        );
    }

    #[test]
    fn rejects_empty_ingredients() {
        assert_eq!(
            field_of(RecipePayload {
                ingredients: vec![],
                ..payload()
            }),
            "ingredients"
        );
    }

    #[test]
    fn rejects_small_amounts() {
        let error = RecipePayload {
            ingredients: vec![IngredientLine { id: 1, amount: 0 }],
            ..payload()
        }
        .validate()
        .unwrap_err();
        assert_eq!(error.field, "ingredients");
        assert!(error.message.contains("at least 1"));
    }

    #[test]
    fn rejects_duplicate_ingredients() {
        let error = RecipePayload {
            ingredients: vec![
                IngredientLine { id: 4, amount: 1 },
                IngredientLine { id: 4, amount: 2 },
            ],
            ..payload()
        }
        .validate()
        .unwrap_err();
        assert_eq!(error.message, "This ingredient is already added");
    }

    #[test]
    fn checks_plain_fields() {
        assert_eq!(field_of(RecipePayload { name: " ".into(), ..payload() }), "name");
        assert_eq!(
            field_of(RecipePayload {
                name: "x".repeat(RECIPE_NAME_MAX_LENGTH + 1),
                ..payload()
            }),
            "name"
        );
        assert_eq!(field_of(RecipePayload { text: "".into(), ..payload() }), "text");
        assert_eq!(
            field_of(RecipePayload {
                cooking_time: Some(0),
                ..payload()
            }),
            "cooking_time"
        );
        assert_eq!(
            field_of(RecipePayload {
                cooking_time: None,
                ..payload()
            }),
            "cooking_time"
        );
    }

    #[test]
    fn deserializes_with_missing_collections() {
        let payload: RecipePayload =
            serde_json::from_str(r#"{"name": "Soup", "text": "Boil", "cooking_time": 5}"#).unwrap();
        assert!(payload.tags.is_empty());
        assert_eq!(payload.validate().unwrap_err().field, "image");
    }

    #[test]
    fn reports_missing_ids_in_request_order() {
        assert_eq!(missing_ids(&[3, 1, 7, 2], &[1, 2]), vec![3, 7]);
        assert!(missing_ids(&[1, 2], &[2, 1]).is_empty());
    }

    #[test]
    fn validates_usernames() {
        assert!(validate_username("chef.anna+1").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("шеф_повар").is_ok());
    }

    #[test]
    fn validates_registration() {
        let payload = RegisterPayload {
            email: "cook@example.com".into(),
            username: "cook".into(),
            first_name: "Ann".into(),
            last_name: "Cook".into(),
            password: "secret-password".into(),
        };
        assert!(payload.validate().is_ok());

        let error = RegisterPayload {
            email: "cook.example.com".into(),
            ..payload.clone()
        }
        .validate()
        .unwrap_err();
        assert_eq!(error.field, "email");

        let error = RegisterPayload {
            last_name: "".into(),
            ..payload
        }
        .validate()
        .unwrap_err();
        assert_eq!(error.field, "last_name");
    }

    #[test]
    fn validates_tags() {
        assert!(validate_tag("Breakfast", "#E26C2D", "breakfast").is_ok());
        assert_eq!(
            validate_tag("Breakfast", "E26C2D", "breakfast").unwrap_err().field,
            "color"
        );
        assert_eq!(
            validate_tag("Breakfast", "#E26C2G", "breakfast").unwrap_err().field,
            "color"
        );
        assert_eq!(
            validate_tag("Breakfast", "#E26C2D", "late lunch").unwrap_err().field,
            "slug"
        );
    }
}

pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const USERNAME_MIN_LENGTH: usize = 3;
pub const USERNAME_MAX_LENGTH: usize = 128;
pub const NAME_MAX_LENGTH: usize = 128;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const RECIPE_NAME_MAX_LENGTH: usize = 200;
pub const TAG_FIELD_MAX_LENGTH: usize = 128;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MIN_INGREDIENT_AMOUNT: i32 = 1;

pub const RECIPE_IMAGE_DIR: &str = "recipes_images";

/// File extension for each accepted image signature.
pub const IMAGE_SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "png"),
    (b"\xff\xd8\xff", "jpg"),
    (b"GIF87a", "gif"),
    (b"GIF89a", "gif"),
];

pub const SHOPPING_LIST_HEADER: &str = "Shopping list:";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_cart.txt";

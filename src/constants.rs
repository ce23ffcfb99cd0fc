pub const MIN_AMOUNT: i64 = 1;
pub const MAX_AMOUNT: i64 = 32767;

pub const MIN_COOKING_TIME: i64 = 1;
pub const MAX_COOKING_TIME: i64 = 32767;

pub const NAME_MAX_LENGTH: usize = 200;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const USER_FIELD_MAX_LENGTH: usize = 150;
pub const COLOR_MAX_LENGTH: usize = 7;

pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

pub const SAFE_METHODS: &[&str] = &["GET", "HEAD", "OPTIONS"];

pub const RECIPE_IMAGE_DIR: &str = "recipes/images";
pub const MEDIA_URL: &str = "/media/";
pub const IMAGE_SUFFIX_LENGTH: usize = 7;

pub const SHOPPING_LIST_FILE_NAME: &str = "shopping_cart.txt";

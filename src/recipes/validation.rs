//! Rules applied to write payloads before anything touches the database.
//!
//! Every check reports into a [`FieldErrors`] map so a client gets all of
//! its mistakes in one 400 response.

use std::collections::HashSet;

use serde::Deserialize;

use crate::{
    error::{Error, FieldErrors, HtmlError},
    image::{decode_data_uri, DecodedImage},
    schema::Uuid,
    COLOR_MAX_LENGTH, EMAIL_MAX_LENGTH, MAX_AMOUNT, MAX_COOKING_TIME, MIN_AMOUNT,
    MIN_COOKING_TIME, NAME_MAX_LENGTH, USER_FIELD_MAX_LENGTH,
};

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmount {
    pub id: Uuid,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub cooking_time: Option<i64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<Uuid>>,
    #[serde(default)]
    pub ingredients: Option<Vec<IngredientAmount>>,
}

/// A draft that passed every rule; amounts are narrowed to the column type.
#[derive(Debug, Clone)]
pub struct ValidRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i16,
    pub image: Option<DecodedImage>,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<(Uuid, i16)>,
}

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

fn has_duplicates<T: std::hash::Hash + Eq>(items: impl IntoIterator<Item = T>) -> bool {
    let mut seen = HashSet::new();
    items.into_iter().any(|item| !seen.insert(item))
}

pub fn validate_tags(tags: &[Uuid]) -> Result<(), String> {
    if tags.is_empty() {
        return Err(String::from("At least one tag is required."));
    }
    if has_duplicates(tags.iter()) {
        return Err(String::from("Tags must be unique."));
    }
    Ok(())
}

pub fn validate_ingredients(ingredients: &[IngredientAmount]) -> Result<(), Vec<String>> {
    if ingredients.is_empty() {
        return Err(vec![String::from("At least one ingredient is required.")]);
    }

    let mut messages = vec![];
    if has_duplicates(ingredients.iter().map(|i| i.id)) {
        messages.push(String::from("Ingredients must be unique."));
    }
    for ingredient in ingredients {
        if !(MIN_AMOUNT..=MAX_AMOUNT).contains(&ingredient.amount) {
            messages.push(format!(
                "Ingredient {}: amount must be between {MIN_AMOUNT} and {MAX_AMOUNT}.",
                ingredient.id
            ));
        }
    }

    match messages.is_empty() {
        true => Ok(()),
        false => Err(messages),
    }
}

fn check_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
    max_length: Option<usize>,
) -> String {
    match value.map(str::trim) {
        None => push(errors, field, REQUIRED),
        Some("") => push(errors, field, BLANK),
        Some(v) => {
            if let Some(max) = max_length {
                if v.chars().count() > max {
                    push(
                        errors,
                        field,
                        format!("Ensure this field has no more than {max} characters."),
                    );
                }
            }
            return v.to_string();
        }
    }
    String::new()
}

pub fn validate_recipe(draft: RecipeDraft, require_image: bool) -> Result<ValidRecipe, Error> {
    let mut errors = FieldErrors::new();

    let name = check_text(&mut errors, "name", draft.name.as_deref(), Some(NAME_MAX_LENGTH));
    let text = check_text(&mut errors, "text", draft.text.as_deref(), None);

    let cooking_time = match draft.cooking_time {
        None => {
            push(&mut errors, "cooking_time", REQUIRED);
            0
        }
        Some(t) if !(MIN_COOKING_TIME..=MAX_COOKING_TIME).contains(&t) => {
            push(
                &mut errors,
                "cooking_time",
                format!("Cooking time must be between {MIN_COOKING_TIME} and {MAX_COOKING_TIME}."),
            );
            0
        }
        Some(t) => t as i16,
    };

    let image = match draft.image.as_deref() {
        None | Some("") if require_image => {
            push(&mut errors, "image", REQUIRED);
            None
        }
        None | Some("") => None,
        Some(uri) => match decode_data_uri(uri) {
            Ok(image) => Some(image),
            Err(e) => {
                push(&mut errors, "image", e.to_string());
                None
            }
        },
    };

    let tags = draft.tags.unwrap_or_default();
    if let Err(message) = validate_tags(&tags) {
        push(&mut errors, "tags", message);
    }

    let ingredients = draft.ingredients.unwrap_or_default();
    if let Err(messages) = validate_ingredients(&ingredients) {
        for message in messages {
            push(&mut errors, "ingredients", message);
        }
    }

    if !errors.is_empty() {
        return Err(HtmlError::InvalidRequest.fields(errors));
    }

    Ok(ValidRecipe {
        name,
        text,
        cooking_time,
        image,
        tags,
        ingredients: ingredients
            .into_iter()
            .map(|i| (i.id, i.amount as i16))
            .collect(),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

/// `#RGB` / `#RRGGBB`, uppercase hex, leading `#` optional.
pub fn is_valid_color(color: &str) -> bool {
    let hex = color.strip_prefix('#').unwrap_or(color);
    matches!(hex.len(), 3 | 6)
        && hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn validate_tag(draft: TagDraft) -> Result<ValidTag, Error> {
    let mut errors = FieldErrors::new();

    let name = check_text(&mut errors, "name", draft.name.as_deref(), Some(NAME_MAX_LENGTH));
    let color = check_text(&mut errors, "color", draft.color.as_deref(), Some(COLOR_MAX_LENGTH));
    let slug = check_text(&mut errors, "slug", draft.slug.as_deref(), Some(NAME_MAX_LENGTH));

    if !color.is_empty() && !is_valid_color(&color) {
        push(&mut errors, "color", "Use an uppercase hex color such as #E26C2D.");
    }
    if !slug.is_empty() && !is_valid_slug(&slug) {
        push(
            &mut errors,
            "slug",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        );
    }

    if !errors.is_empty() {
        return Err(HtmlError::InvalidRequest.fields(errors));
    }
    Ok(ValidTag { name, color, slug })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserDraft {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || "_.@+-".contains(c))
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

pub fn validate_user(draft: UserDraft) -> Result<ValidUser, Error> {
    let mut errors = FieldErrors::new();

    let email = check_text(&mut errors, "email", draft.email.as_deref(), Some(EMAIL_MAX_LENGTH));
    let username = check_text(
        &mut errors,
        "username",
        draft.username.as_deref(),
        Some(USER_FIELD_MAX_LENGTH),
    );
    let first_name = check_text(
        &mut errors,
        "first_name",
        draft.first_name.as_deref(),
        Some(USER_FIELD_MAX_LENGTH),
    );
    let last_name = check_text(
        &mut errors,
        "last_name",
        draft.last_name.as_deref(),
        Some(USER_FIELD_MAX_LENGTH),
    );
    let password = match draft.password {
        None => {
            push(&mut errors, "password", REQUIRED);
            String::new()
        }
        Some(p) if p.trim().is_empty() => {
            push(&mut errors, "password", BLANK);
            String::new()
        }
        Some(p) => p,
    };

    if !email.is_empty() && !is_valid_email(&email) {
        push(&mut errors, "email", "Enter a valid email address.");
    }
    if !username.is_empty() && !is_valid_username(&username) {
        push(
            &mut errors,
            "username",
            "Enter a valid username. Letters, digits and @/./+/-/_ only.",
        );
    }

    if !errors.is_empty() {
        return Err(HtmlError::InvalidRequest.fields(errors));
    }
    Ok(ValidUser {
        email: email.to_lowercase(),
        username,
        first_name,
        last_name,
        password,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const PNG_URI: &str = "data:image/png;base64,iVBORw0KGgo=";

    fn amount(id: Uuid, amount: i64) -> IngredientAmount {
        IngredientAmount { id, amount }
    }

    fn draft() -> RecipeDraft {
        RecipeDraft {
            name: Some("Pancakes".to_string()),
            text: Some("Mix and fry.".to_string()),
            cooking_time: Some(20),
            image: Some(PNG_URI.to_string()),
            tags: Some(vec![1, 2]),
            ingredients: Some(vec![amount(1, 3), amount(2, 5)]),
        }
    }

    fn field<'a>(err: &'a Error, name: &str) -> Vec<&'a str> {
        err.info[name]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn accepts_a_complete_recipe() {
        let valid = validate_recipe(draft(), true).unwrap();
        assert_eq!(valid.name, "Pancakes");
        assert_eq!(valid.cooking_time, 20);
        assert_eq!(valid.tags, vec![1, 2]);
        assert_eq!(valid.ingredients, vec![(1, 3), (2, 5)]);
        assert_eq!(valid.image.unwrap().file_name, "temp.png");
    }

    #[test]
    fn empty_and_duplicate_tags() {
        let mut d = draft();
        d.tags = Some(vec![]);
        let err = validate_recipe(d, true).unwrap_err();
        assert_eq!(err.code, 400);
        assert_eq!(field(&err, "tags"), vec!["At least one tag is required."]);

        let mut d = draft();
        d.tags = Some(vec![4, 4]);
        let err = validate_recipe(d, true).unwrap_err();
        assert_eq!(field(&err, "tags"), vec!["Tags must be unique."]);

        let mut d = draft();
        d.tags = None;
        assert!(validate_recipe(d, true).is_err());
    }

    #[test]
    fn ingredient_rules() {
        let mut d = draft();
        d.ingredients = Some(vec![]);
        let err = validate_recipe(d, true).unwrap_err();
        assert_eq!(field(&err, "ingredients"), vec!["At least one ingredient is required."]);

        let mut d = draft();
        d.ingredients = Some(vec![amount(1, 3), amount(1, 4)]);
        let err = validate_recipe(d, true).unwrap_err();
        assert_eq!(field(&err, "ingredients"), vec!["Ingredients must be unique."]);

        for bad in [0, -1, 32768] {
            let mut d = draft();
            d.ingredients = Some(vec![amount(1, bad)]);
            let err = validate_recipe(d, true).unwrap_err();
            assert_eq!(field(&err, "ingredients").len(), 1);
        }

        let mut d = draft();
        d.ingredients = Some(vec![amount(1, 1), amount(2, 32767)]);
        assert!(validate_recipe(d, true).is_ok());
    }

    #[test]
    fn cooking_time_bounds() {
        for (time, ok) in [(0, false), (1, true), (32767, true), (32768, false)] {
            let mut d = draft();
            d.cooking_time = Some(time);
            assert_eq!(validate_recipe(d, true).is_ok(), ok, "cooking_time {time}");
        }
    }

    #[test]
    fn image_is_required_only_on_create() {
        let mut d = draft();
        d.image = None;
        let err = validate_recipe(d.clone(), true).unwrap_err();
        assert_eq!(field(&err, "image"), vec![REQUIRED]);

        let valid = validate_recipe(d, false).unwrap();
        assert!(valid.image.is_none());
    }

    #[test]
    fn reports_every_broken_field_at_once() {
        let err = validate_recipe(RecipeDraft::default(), true).unwrap_err();
        for name in ["name", "text", "cooking_time", "image", "tags", "ingredients"] {
            assert!(!field(&err, name).is_empty(), "missing error for {name}");
        }
    }

    #[test]
    fn long_names_are_rejected() {
        let mut d = draft();
        d.name = Some("x".repeat(NAME_MAX_LENGTH + 1));
        let err = validate_recipe(d, true).unwrap_err();
        assert_eq!(field(&err, "name").len(), 1);
    }

    #[test]
    fn tag_color_and_slug() {
        assert!(is_valid_color("#E26C2D"));
        assert!(is_valid_color("FFF"));
        assert!(!is_valid_color("#e26c2d"));
        assert!(!is_valid_color("#12345"));
        assert!(is_valid_slug("breakfast_2-go"));
        assert!(!is_valid_slug("bad slug"));

        let err = validate_tag(TagDraft {
            name: Some("Lunch".to_string()),
            color: Some("red".to_string()),
            slug: Some("lunch".to_string()),
        })
        .unwrap_err();
        assert_eq!(field(&err, "color").len(), 1);
    }

    #[test]
    fn user_registration_rules() {
        let valid = validate_user(UserDraft {
            email: Some("Cook@Example.com".to_string()),
            username: Some("cook.1".to_string()),
            first_name: Some("Ann".to_string()),
            last_name: Some("Cook".to_string()),
            password: Some("s3cret-pass".to_string()),
        })
        .unwrap();
        assert_eq!(valid.email, "cook@example.com");

        let err = validate_user(UserDraft {
            email: Some("not-an-email".to_string()),
            username: Some("bad name".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        for name in ["email", "username", "first_name", "last_name", "password"] {
            assert!(!field(&err, name).is_empty(), "missing error for {name}");
        }
    }

    #[test]
    fn passwords_are_kept_verbatim() {
        let padded = format!("  pass phrase {}  ", "x".repeat(USER_FIELD_MAX_LENGTH));
        let valid = validate_user(UserDraft {
            email: Some("cook@example.com".to_string()),
            username: Some("cook".to_string()),
            first_name: Some("Ann".to_string()),
            last_name: Some("Cook".to_string()),
            password: Some(padded.clone()),
        })
        .unwrap();
        assert_eq!(valid.password, padded);

        let err = validate_user(UserDraft {
            password: Some("   ".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(field(&err, "password"), vec![BLANK]);
    }

    proptest! {
        #[test]
        fn tags_pass_iff_non_empty_and_unique(tags in proptest::collection::vec(0..20i32, 0..8)) {
            let unique: HashSet<_> = tags.iter().collect();
            let expected = !tags.is_empty() && unique.len() == tags.len();
            prop_assert_eq!(validate_tags(&tags).is_ok(), expected);
        }

        #[test]
        fn amounts_pass_iff_in_range(amounts in proptest::collection::vec(-5i64..40_000, 1..6)) {
            let ingredients: Vec<_> = amounts
                .iter()
                .enumerate()
                .map(|(i, a)| amount(i as Uuid, *a))
                .collect();
            let expected = amounts.iter().all(|a| (MIN_AMOUNT..=MAX_AMOUNT).contains(a));
            prop_assert_eq!(validate_ingredients(&ingredients).is_ok(), expected);
        }
    }
}

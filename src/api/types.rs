//! Read views sent to clients and the small request bodies that have no
//! validation rules of their own. Recipe, tag and user write views live in
//! `validation`.

use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres};

use crate::{
    actions::{
        recipes::{count_author_recipes, list_author_recipes, list_recipe_parts, recipe_flags},
        subscriptions::is_subscribed,
        tags::list_recipe_tags,
        users::get_user_by_id,
    },
    error::{Error, HtmlError},
    image::media_url,
    schema::{Recipe, RecipePart, Tag, User, Uuid},
};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserView {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserView {
    pub fn new(user: User, is_subscribed: bool) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }

    /// `is_subscribed` is false for anonymous viewers and for oneself.
    pub async fn load(user: User, viewer: Option<Uuid>, pool: &Pool<Postgres>) -> Result<Self, Error> {
        let is_subscribed = match viewer {
            Some(viewer) if viewer != user.id => is_subscribed(user.id, viewer, pool).await?,
            _ => false,
        };
        Ok(Self::new(user, is_subscribed))
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct CreatedUserView {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for CreatedUserView {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RecipeIngredientView {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i16,
}

impl From<RecipePart> for RecipeIngredientView {
    fn from(part: RecipePart) -> Self {
        Self {
            id: part.ingredient_id,
            name: part.name,
            measurement_unit: part.measurement_unit,
            amount: part.amount,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct RecipeView {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<RecipeIngredientView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i16,
}

impl RecipeView {
    pub async fn load(recipe: Recipe, viewer: Option<Uuid>, pool: &Pool<Postgres>) -> Result<Self, Error> {
        let author = get_user_by_id(recipe.author_id, pool).await?.ok_or_else(|| {
            log::error!("Recipe {} has no author row", recipe.id);
            HtmlError::InternalServerError.default()
        })?;

        let tags = list_recipe_tags(recipe.id, pool).await?;
        let ingredients = list_recipe_parts(recipe.id, pool)
            .await?
            .into_iter()
            .map(RecipeIngredientView::from)
            .collect();
        let flags = recipe_flags(recipe.id, viewer, pool).await?;

        Ok(Self {
            id: recipe.id,
            tags,
            author: UserView::load(author, viewer, pool).await?,
            ingredients,
            is_favorited: flags.is_favorited,
            is_in_shopping_cart: flags.is_in_shopping_cart,
            name: recipe.name,
            image: media_url(&recipe.image),
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ShortRecipeView {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i16,
}

impl From<Recipe> for ShortRecipeView {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            image: media_url(&recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub author: UserView,
    pub recipes: Vec<ShortRecipeView>,
    pub recipes_count: i64,
}

impl SubscriptionView {
    pub async fn load(
        author: User,
        viewer: Uuid,
        recipes_limit: Option<i64>,
        pool: &Pool<Postgres>,
    ) -> Result<Self, Error> {
        let recipes = list_author_recipes(author.id, recipes_limit, pool)
            .await?
            .into_iter()
            .map(ShortRecipeView::from)
            .collect();
        let recipes_count = count_author_recipes(author.id, pool).await?;

        Ok(Self {
            author: UserView::load(author, Some(viewer), pool).await?,
            recipes,
            recipes_count,
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct TokenView {
    pub auth_token: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SetPasswordPayload {
    pub new_password: String,
    pub current_password: String,
}

use std::path::Path;

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::{Error, FieldErrors, HtmlError, QueryError},
    image::{remove_image, store_image},
    pagination::{PageContext, PageRequest},
    permissions::{authorize_recipe_object, RequestContext},
    schema::{Recipe, RecipeFlags, RecipePart, RecipeRow, Uuid},
    validation::ValidRecipe,
};

use super::{
    favorites::{is_listed, RecipeList},
    ingredients::find_missing_ingredients,
    tags::{find_missing_tags, set_recipe_tags},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<Uuid>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

impl RecipeFilter {
    /// Builds the filter from raw `key=value` pairs; `tags` may repeat.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, Error> {
        let mut filter = Self::default();
        let mut errors = FieldErrors::new();

        for (key, value) in pairs {
            match key.as_str() {
                "tags" => {
                    if !value.is_empty() && !filter.tags.contains(value) {
                        filter.tags.push(value.to_owned());
                    }
                }
                "author" => match value.trim().parse::<Uuid>() {
                    Ok(author) => filter.author = Some(author),
                    Err(_) => errors
                        .entry(key.to_owned())
                        .or_default()
                        .push(String::from("A valid integer is required.")),
                },
                "is_favorited" | "is_in_shopping_cart" => match parse_flag(value) {
                    Some(flag) if key == "is_favorited" => filter.is_favorited = flag,
                    Some(flag) => filter.is_in_shopping_cart = flag,
                    None => errors
                        .entry(key.to_owned())
                        .or_default()
                        .push(String::from("Expected 0 or 1.")),
                },
                _ => {}
            }
        }

        if !errors.is_empty() {
            return Err(HtmlError::InvalidRequest.fields(errors));
        }
        Ok(filter)
    }
}

/// Newest-first page of recipes. The favorite/cart flags only apply when a
/// viewer is known.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Uuid>,
    page: PageRequest,
    pool: &Pool<Postgres>,
) -> Result<PageContext<Recipe>, Error> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }
    if let Some(viewer) = viewer {
        if filter.is_favorited {
            query
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query
                .push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
    }

    query
        .push(" ORDER BY r.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    let rows = rows.into_iter().map(Recipe::from).collect();
    Ok(PageContext::from_rows(rows, total_count, page))
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Loads a recipe the caller is about to mutate: 404 when it is missing,
/// then the object-level permission check.
pub async fn get_recipe_mut(
    id: Uuid,
    ctx: &RequestContext<'_>,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    authorize_recipe_object(ctx, recipe.author_id)?;
    Ok(recipe)
}

pub async fn find_recipe(
    name: &str,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<Uuid>, Error> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT id FROM recipes WHERE name = $1 AND author_id = $2")
            .bind(name)
            .bind(author_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row.map(|r| r.0))
}

pub async fn list_recipe_parts(recipe_id: Uuid, pool: &Pool<Postgres>) -> Result<Vec<RecipePart>, Error> {
    let rows: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name,
            i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY ri.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn recipe_flags(
    recipe_id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<RecipeFlags, Error> {
    match viewer {
        Some(user_id) => Ok(RecipeFlags {
            is_favorited: is_listed(RecipeList::Favorites, recipe_id, user_id, pool).await?,
            is_in_shopping_cart: is_listed(RecipeList::ShoppingCart, recipe_id, user_id, pool)
                .await?,
        }),
        None => Ok(RecipeFlags::default()),
    }
}

pub async fn list_author_recipes(
    author_id: Uuid,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, Error> {
    let rows: Vec<Recipe> = sqlx::query_as(
        "SELECT * FROM recipes WHERE author_id = $1 ORDER BY id DESC LIMIT $2",
    )
    .bind(author_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn count_author_recipes(author_id: Uuid, pool: &Pool<Postgres>) -> Result<i64, Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row.0)
}

/// 404 when any referenced tag or ingredient does not exist.
async fn ensure_references(recipe: &ValidRecipe, pool: &Pool<Postgres>) -> Result<(), Error> {
    let missing = find_missing_tags(&recipe.tags, pool).await?;
    if !missing.is_empty() {
        return Err(HtmlError::NotFound.new(&format!("Tags not found: {missing:?}")));
    }

    let ids: Vec<Uuid> = recipe.ingredients.iter().map(|(id, _)| *id).collect();
    let missing = find_missing_ingredients(&ids, pool).await?;
    if !missing.is_empty() {
        return Err(HtmlError::NotFound.new(&format!("Ingredients not found: {missing:?}")));
    }

    Ok(())
}

fn duplicate_name() -> Error {
    let mut errors = FieldErrors::new();
    errors.insert(
        String::from("name"),
        vec![String::from("You already have a recipe with this name.")],
    );
    HtmlError::InvalidRequest.fields(errors)
}

async fn insert_recipe_parts(
    recipe_id: Uuid,
    parts: &[(Uuid, i16)],
    conn: &mut PgConnection,
) -> Result<(), Error> {
    let (ids, amounts): (Vec<Uuid>, Vec<i16>) = parts.iter().copied().unzip();

    sqlx::query(
        "
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1::int, * FROM UNNEST($2::int[], $3::smallint[])
    ",
    )
    .bind(recipe_id)
    .bind(ids)
    .bind(amounts)
    .execute(&mut *conn)
    .await
    .map_err(QueryError::from)?;

    Ok(())
}

async fn store_recipe_image(recipe: &ValidRecipe, media_root: &Path) -> Result<Option<String>, Error> {
    match &recipe.image {
        Some(image) => store_image(media_root, image).await.map(Some).map_err(|e| {
            log::error!("Failed to store recipe image: {e}");
            HtmlError::InternalServerError.default()
        }),
        None => Ok(None),
    }
}

async fn write_recipe(
    author_id: Uuid,
    recipe: &ValidRecipe,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Uuid, Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    let id: (i32,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, cooking_time, image)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .bind(image)
    .fetch_one(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    insert_recipe_parts(id.0, &recipe.ingredients, &mut tx).await?;
    set_recipe_tags(id.0, &recipe.tags, &mut tx).await?;

    tx.commit().await.map_err(QueryError::from)?;
    Ok(id.0)
}

pub async fn create_recipe(
    author_id: Uuid,
    recipe: &ValidRecipe,
    media_root: &Path,
    pool: &Pool<Postgres>,
) -> Result<Uuid, Error> {
    ensure_references(recipe, pool).await?;

    if find_recipe(&recipe.name, author_id, pool).await?.is_some() {
        return Err(duplicate_name());
    }

    let image = store_recipe_image(recipe, media_root)
        .await?
        .unwrap_or_default();

    match write_recipe(author_id, recipe, &image, pool).await {
        Ok(id) => {
            log::info!("User {author_id} created recipe {id}");
            Ok(id)
        }
        Err(e) => {
            remove_image(media_root, &image).await;
            Err(e)
        }
    }
}

async fn rewrite_recipe(
    id: Uuid,
    recipe: &ValidRecipe,
    image: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    sqlx::query(
        "
        UPDATE recipes
        SET name = $1, text = $2, cooking_time = $3, image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .bind(image)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    insert_recipe_parts(id, &recipe.ingredients, &mut tx).await?;
    set_recipe_tags(id, &recipe.tags, &mut tx).await?;

    tx.commit().await.map_err(QueryError::from)?;
    Ok(())
}

/// Rewrites scalar fields and replaces the ingredient and tag sets
/// wholesale. The previous image file is removed once a new one is
/// committed.
pub async fn update_recipe(
    current: &Recipe,
    recipe: &ValidRecipe,
    media_root: &Path,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    ensure_references(recipe, pool).await?;

    if let Some(other) = find_recipe(&recipe.name, current.author_id, pool).await? {
        if other != current.id {
            return Err(duplicate_name());
        }
    }

    let image = store_recipe_image(recipe, media_root).await?;

    match rewrite_recipe(current.id, recipe, image.as_deref(), pool).await {
        Ok(()) => {
            if image.is_some() {
                remove_image(media_root, &current.image).await;
            }
            log::info!("Recipe {} updated", current.id);
            Ok(())
        }
        Err(e) => {
            if let Some(image) = image {
                remove_image(media_root, &image).await;
            }
            Err(e)
        }
    }
}

pub async fn delete_recipe(recipe: &Recipe, media_root: &Path, pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    remove_image(media_root, &recipe.image).await;
    log::info!("Recipe {} deleted", recipe.id);
    Ok(())
}

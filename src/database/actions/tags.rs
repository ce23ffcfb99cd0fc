use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{Error, FieldErrors, HtmlError, QueryError},
    schema::{Tag, Uuid},
    validation::ValidTag,
};

/// Field-level errors for every value another tag already holds.
async fn ensure_tag_unique(
    tag: &ValidTag,
    except: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let existing: Vec<Tag> = sqlx::query_as(
        "SELECT * FROM tags WHERE (name = $1 OR color = $2 OR slug = $3) AND id IS DISTINCT FROM $4",
    )
    .bind(&tag.name)
    .bind(&tag.color)
    .bind(&tag.slug)
    .bind(except)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut errors = FieldErrors::new();
    for other in existing {
        for (field, taken) in [
            ("name", other.name == tag.name),
            ("color", other.color == tag.color),
            ("slug", other.slug == tag.slug),
        ] {
            if taken {
                errors
                    .entry(field.to_string())
                    .or_default()
                    .push(format!("A tag with this {field} already exists."));
            }
        }
    }

    match errors.is_empty() {
        true => Ok(()),
        false => Err(HtmlError::InvalidRequest.fields(errors)),
    }
}

pub async fn create_tag(tag: &ValidTag, pool: &Pool<Postgres>) -> Result<Tag, Error> {
    ensure_tag_unique(tag, None, pool).await?;

    let row: Tag =
        sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *")
            .bind(&tag.name)
            .bind(&tag.color)
            .bind(&tag.slug)
            .fetch_one(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn update_tag(id: Uuid, tag: &ValidTag, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    ensure_tag_unique(tag, Some(id), pool).await?;

    let row: Option<Tag> = sqlx::query_as(
        "UPDATE tags SET name = $1, color = $2, slug = $3 WHERE id = $4 RETURNING *",
    )
    .bind(&tag.name)
    .bind(&tag.color)
    .bind(&tag.slug)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn delete_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<bool, Error> {
    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn list_recipe_tags(recipe_id: Uuid, pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn find_missing_tags(ids: &[Uuid], pool: &Pool<Postgres>) -> Result<Vec<Uuid>, Error> {
    let found: Vec<(i32,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(ids
        .iter()
        .copied()
        .filter(|id| !found.iter().any(|(f,)| f == id))
        .collect())
}

/// Replaces the whole tag set of a recipe. Runs on the caller's transaction.
pub async fn set_recipe_tags(
    recipe_id: Uuid,
    tags: &[Uuid],
    conn: &mut PgConnection,
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1::int, UNNEST($2::int[])")
        .bind(recipe_id)
        .bind(tags)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

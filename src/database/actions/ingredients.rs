use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    schema::{Ingredient, Uuid},
};

/// Escapes LIKE wildcards so a prefix is matched literally.
fn like_prefix(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

pub async fn list_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => sqlx::query_as(
            "SELECT * FROM ingredients WHERE LOWER(name) LIKE LOWER($1) ORDER BY name, id",
        )
        .bind(like_prefix(name))
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name, id")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn find_missing_ingredients(
    ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<Vec<Uuid>, Error> {
    let found: Vec<(i32,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
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

/// Get-or-create; returns whether a row was inserted.
pub async fn insert_ingredient(
    name: &str,
    measurement_unit: &str,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result = sqlx::query(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(name)
    .bind(measurement_unit)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

fn unquote(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}

/// Splits one `name,measurement_unit` row. The unit is the last column, so a
/// name may itself contain commas.
pub fn parse_ingredient_row(row: &str) -> Option<(&str, &str)> {
    let (name, unit) = row.trim().rsplit_once(',')?;
    let (name, unit) = (unquote(name), unquote(unit));

    if name.is_empty() || unit.is_empty() {
        return None;
    }
    Some((name, unit))
}

pub async fn load_ingredients(csv: &str, pool: &Pool<Postgres>) -> Result<usize, Error> {
    let mut inserted = 0;

    for (number, row) in csv.lines().enumerate() {
        if row.trim().is_empty() {
            continue;
        }
        match parse_ingredient_row(row) {
            Some((name, unit)) => {
                if insert_ingredient(name, unit, pool).await? {
                    inserted += 1;
                }
            }
            None => log::warn!("Skipping malformed ingredient row {}: {row:?}", number + 1),
        }
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::{like_prefix, parse_ingredient_row};

    #[test]
    fn rows_split_on_the_last_comma() {
        assert_eq!(parse_ingredient_row("sugar,g"), Some(("sugar", "g")));
        assert_eq!(
            parse_ingredient_row("\"salt, sea\",  pinch "),
            Some(("salt, sea", "pinch"))
        );
        assert_eq!(parse_ingredient_row("no unit"), None);
        assert_eq!(parse_ingredient_row("water,"), None);
    }

    #[test]
    fn prefix_wildcards_are_escaped() {
        assert_eq!(like_prefix("Sug"), "Sug%");
        assert_eq!(like_prefix("50%_"), "50\\%\\_%");
        assert_eq!(like_prefix("a\\b"), "a\\\\b%");
    }
}

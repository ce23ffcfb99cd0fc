use chrono::Duration;
use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    error::{Error, FieldErrors, HtmlError, QueryError},
    pagination::{PageContext, PageRequest},
    schema::{User, UserRow, Uuid},
    validation::ValidUser,
};

pub async fn get_user_by_id(user_id: Uuid, pool: &Pool<Postgres>) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_email(email: &str, pool: &Pool<Postgres>) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn fetch_users(page: PageRequest, pool: &Pool<Postgres>) -> Result<PageContext<User>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT id, email, username, first_name, last_name, COUNT(*) OVER() AS count
        FROM users
        ORDER BY username
        LIMIT $1 OFFSET $2
    ",
    )
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    let rows = rows.into_iter().map(User::from).collect();
    Ok(PageContext::from_rows(rows, total_count, page))
}

pub async fn register_user(user: &ValidUser, pool: &Pool<Postgres>) -> Result<User, Error> {
    let taken: Vec<(String, String)> = sqlx::query_as(
        "SELECT LOWER(email), username FROM users WHERE LOWER(email) = LOWER($1) OR username = $2",
    )
    .bind(&user.email)
    .bind(&user.username)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut errors = FieldErrors::new();
    for (email, username) in taken {
        if email == user.email.to_lowercase() {
            errors
                .entry(String::from("email"))
                .or_default()
                .push(String::from("A user with that email already exists."));
        }
        if username == user.username {
            errors
                .entry(String::from("username"))
                .or_default()
                .push(String::from("A user with that username already exists."));
        }
    }
    if !errors.is_empty() {
        return Err(HtmlError::InvalidRequest.fields(errors));
    }

    let password = hash_password(&user.password)?;

    let row: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    log::info!("Registered user {} ({})", row.id, row.username);
    Ok(row)
}

pub async fn login_user(
    email: &str,
    password: &str,
    secret: &str,
    lifetime: Duration,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let invalid = || HtmlError::InvalidRequest.new("Unable to log in with provided credentials.");

    let user = get_user_by_email(email, pool).await?.ok_or_else(invalid)?;

    let authenticated = verify_password(password, &user.password)?;
    if !authenticated {
        return Err(invalid());
    }

    generate_jwt_session(&user, secret, lifetime)
}

pub async fn set_password(
    user_id: Uuid,
    current_password: &str,
    new_password: &str,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let user = get_user_by_id(user_id, pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    if !verify_password(current_password, &user.password)? {
        let mut errors = FieldErrors::new();
        errors.insert(
            String::from("current_password"),
            vec![String::from("Invalid password.")],
        );
        return Err(HtmlError::InvalidRequest.fields(errors));
    }

    let hash = hash_password(new_password)?;
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(hash)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

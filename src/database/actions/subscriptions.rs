use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, HtmlError, QueryError},
    pagination::{PageContext, PageRequest},
    schema::{User, UserRow, Uuid},
};

pub async fn is_subscribed(
    author_id: Uuid,
    subscriber_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(i32,)> = sqlx::query_as(
        "SELECT id FROM subscriptions WHERE author_id = $1 AND subscriber_id = $2",
    )
    .bind(author_id)
    .bind(subscriber_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.is_some())
}

pub async fn subscribe(
    author_id: Uuid,
    subscriber_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let result = sqlx::query(
        "INSERT INTO subscriptions (author_id, subscriber_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(author_id)
    .bind(subscriber_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are already subscribed to this author."));
    }

    log::debug!("User {subscriber_id} subscribed to {author_id}");
    Ok(())
}

pub async fn unsubscribe(
    author_id: Uuid,
    subscriber_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE author_id = $1 AND subscriber_id = $2")
        .bind(author_id)
        .bind(subscriber_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are not subscribed to this author."));
    }

    log::debug!("User {subscriber_id} unsubscribed from {author_id}");
    Ok(())
}

pub async fn fetch_subscriptions(
    subscriber_id: Uuid,
    page: PageRequest,
    pool: &Pool<Postgres>,
) -> Result<PageContext<User>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name, COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.subscriber_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(subscriber_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    let rows = rows.into_iter().map(User::from).collect();
    Ok(PageContext::from_rows(rows, total_count, page))
}

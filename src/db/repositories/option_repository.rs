use crate::db::connection::DbPool;
use crate::db::models::PollOption;
use sqlx::Error;

pub async fn get_poll_options(pool: &DbPool, poll_id: i64) -> Result<Vec<PollOption>, Error> {
    sqlx::query_as::<_, PollOption>(
        "SELECT id, poll_id, title, description, votes_count FROM options
         WHERE poll_id = $1 ORDER BY id",
    )
    .bind(poll_id)
    .fetch_all(pool)
    .await
}

/// Looks up an option only if it belongs to `poll_id`.
pub async fn get_poll_option(
    pool: &DbPool,
    poll_id: i64,
    option_id: i64,
) -> Result<Option<PollOption>, Error> {
    sqlx::query_as::<_, PollOption>(
        "SELECT id, poll_id, title, description, votes_count FROM options
         WHERE id = $1 AND poll_id = $2",
    )
    .bind(option_id)
    .bind(poll_id)
    .fetch_optional(pool)
    .await
}

pub async fn add_poll_option(
    pool: &DbPool,
    poll_id: i64,
    title: &str,
    description: &str,
) -> Result<PollOption, Error> {
    sqlx::query_as::<_, PollOption>(
        "INSERT INTO options (poll_id, title, description) VALUES ($1, $2, $3)
         RETURNING id, poll_id, title, description, votes_count",
    )
    .bind(poll_id)
    .bind(title)
    .bind(description)
    .fetch_one(pool)
    .await
}

pub async fn update_poll_option(
    pool: &DbPool,
    option_id: i64,
    title: Option<&str>,
    description: Option<&str>,
) -> Result<(), Error> {
    sqlx::query(
        "UPDATE options SET title = COALESCE($2, title), description = COALESCE($3, description)
         WHERE id = $1",
    )
    .bind(option_id)
    .bind(title)
    .bind(description)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_poll_option(pool: &DbPool, option_id: i64) -> Result<(), Error> {
    sqlx::query("DELETE FROM options WHERE id = $1")
        .bind(option_id)
        .execute(pool)
        .await?;

    Ok(())
}

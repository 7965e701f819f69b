use crate::db::connection::DbPool;
use crate::db::models::{Poll, PollOption};
use sqlx::Error;

pub async fn create_poll(
    pool: &DbPool,
    user_id: i64,
    title: &str,
    description: &str,
    options: &[(String, String)],
) -> Result<(Poll, Vec<PollOption>), Error> {
    let mut tx = pool.begin().await?;

    let poll = sqlx::query_as::<_, Poll>(
        "INSERT INTO polls (user_id, title, description) VALUES ($1, $2, $3)
         RETURNING id, user_id, title, description, created_at",
    )
    .bind(user_id)
    .bind(title)
    .bind(description)
    .fetch_one(&mut *tx)
    .await?;

    let mut created = Vec::with_capacity(options.len());
    for (option_title, option_description) in options {
        let option = sqlx::query_as::<_, PollOption>(
            "INSERT INTO options (poll_id, title, description) VALUES ($1, $2, $3)
             RETURNING id, poll_id, title, description, votes_count",
        )
        .bind(poll.id)
        .bind(option_title)
        .bind(option_description)
        .fetch_one(&mut *tx)
        .await?;
        created.push(option);
    }

    tx.commit().await?;
    Ok((poll, created))
}

pub async fn get_poll(pool: &DbPool, poll_id: i64) -> Result<Option<Poll>, Error> {
    sqlx::query_as::<_, Poll>(
        "SELECT id, user_id, title, description, created_at FROM polls WHERE id = $1",
    )
    .bind(poll_id)
    .fetch_optional(pool)
    .await
}

pub async fn poll_exists(pool: &DbPool, poll_id: i64) -> Result<bool, Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM polls WHERE id = $1)")
        .bind(poll_id)
        .fetch_one(pool)
        .await
}

pub async fn get_user_polls(pool: &DbPool, user_id: i64) -> Result<Vec<Poll>, Error> {
    sqlx::query_as::<_, Poll>(
        "SELECT id, user_id, title, description, created_at FROM polls
         WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn update_poll(
    pool: &DbPool,
    poll_id: i64,
    title: Option<&str>,
    description: Option<&str>,
) -> Result<(), Error> {
    sqlx::query(
        "UPDATE polls SET title = COALESCE($2, title), description = COALESCE($3, description)
         WHERE id = $1",
    )
    .bind(poll_id)
    .bind(title)
    .bind(description)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_poll(pool: &DbPool, poll_id: i64) -> Result<(), Error> {
    sqlx::query("DELETE FROM polls WHERE id = $1")
        .bind(poll_id)
        .execute(pool)
        .await?;

    Ok(())
}

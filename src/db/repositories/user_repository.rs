use crate::db::connection::DbPool;
use crate::db::models::{PollOption, User, Vote};
use crate::db::repositories::vote_repository::VoteChange;
use sqlx::Error;

pub async fn create_user(
    pool: &DbPool,
    username: &str,
    email: &str,
    hashed_password: &str,
) -> Result<User, Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (username, email, hashed_password) VALUES ($1, $2, $3)
         RETURNING id, username, email, hashed_password, created_at",
    )
    .bind(username)
    .bind(email)
    .bind(hashed_password)
    .fetch_one(pool)
    .await
}

pub async fn get_user(pool: &DbPool, user_id: i64) -> Result<Option<User>, Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, email, hashed_password, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_user_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, email, hashed_password, created_at FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

/// Fields left as `None` keep their stored value.
pub async fn update_user(
    pool: &DbPool,
    user_id: i64,
    username: Option<&str>,
    email: Option<&str>,
    hashed_password: Option<&str>,
) -> Result<(), Error> {
    sqlx::query(
        "UPDATE users SET
            username = COALESCE($2, username),
            email = COALESCE($3, email),
            hashed_password = COALESCE($4, hashed_password)
         WHERE id = $1",
    )
    .bind(user_id)
    .bind(username)
    .bind(email)
    .bind(hashed_password)
    .execute(pool)
    .await?;

    Ok(())
}

/// Deletes the user together with their votes in one transaction, lowering
/// each affected tally first. Returns the withdrawn votes on polls the user
/// did not own; their own polls are removed with them.
pub async fn delete_user(pool: &DbPool, user_id: i64) -> Result<Vec<VoteChange>, Error> {
    let mut tx = pool.begin().await?;

    let votes = sqlx::query_as::<_, Vote>(
        "DELETE FROM votes WHERE user_id = $1
         AND poll_id NOT IN (SELECT id FROM polls WHERE user_id = $1)
         RETURNING id, user_id, poll_id, option_id",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut changes = Vec::with_capacity(votes.len());
    for vote in votes {
        let option = sqlx::query_as::<_, PollOption>(
            "UPDATE options SET votes_count = GREATEST(votes_count - 1, 0) WHERE id = $1
             RETURNING id, poll_id, title, description, votes_count",
        )
        .bind(vote.option_id)
        .fetch_one(&mut *tx)
        .await?;
        changes.push(VoteChange { vote, option });
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(changes)
}

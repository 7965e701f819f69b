use crate::db::connection::DbPool;
use crate::db::models::{PollOption, Vote};
use sqlx::Error;

/// A committed vote mutation together with the option's new tally.
#[derive(Debug, Clone)]
pub struct VoteChange {
    pub vote: Vote,
    pub option: PollOption,
}

/// Records a vote and bumps the option's counter in one transaction.
/// Returns `None` when the user already voted for this option.
pub async fn cast_vote(
    pool: &DbPool,
    user_id: i64,
    poll_id: i64,
    option_id: i64,
) -> Result<Option<VoteChange>, Error> {
    let mut tx = pool.begin().await?;

    let vote = sqlx::query_as::<_, Vote>(
        "INSERT INTO votes (user_id, poll_id, option_id) VALUES ($1, $2, $3)
         ON CONFLICT (user_id, option_id) DO NOTHING
         RETURNING id, user_id, poll_id, option_id",
    )
    .bind(user_id)
    .bind(poll_id)
    .bind(option_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(vote) = vote else {
        tx.rollback().await?;
        return Ok(None);
    };

    let option = sqlx::query_as::<_, PollOption>(
        "UPDATE options SET votes_count = votes_count + 1 WHERE id = $1
         RETURNING id, poll_id, title, description, votes_count",
    )
    .bind(option_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(VoteChange { vote, option }))
}

/// Deletes the user's vote and decrements the counter in one transaction.
/// Returns `None` when there was no such vote.
pub async fn withdraw_vote(
    pool: &DbPool,
    user_id: i64,
    poll_id: i64,
    option_id: i64,
) -> Result<Option<VoteChange>, Error> {
    let mut tx = pool.begin().await?;

    let vote = sqlx::query_as::<_, Vote>(
        "DELETE FROM votes WHERE user_id = $1 AND poll_id = $2 AND option_id = $3
         RETURNING id, user_id, poll_id, option_id",
    )
    .bind(user_id)
    .bind(poll_id)
    .bind(option_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(vote) = vote else {
        tx.rollback().await?;
        return Ok(None);
    };

    let option = sqlx::query_as::<_, PollOption>(
        "UPDATE options SET votes_count = GREATEST(votes_count - 1, 0) WHERE id = $1
         RETURNING id, poll_id, title, description, votes_count",
    )
    .bind(option_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(VoteChange { vote, option }))
}

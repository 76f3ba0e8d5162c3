use lms_aggregate::{RatingSummary, VoteTally};
use sqlx::{Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::models::{RatingTotals, Review, ReviewResponse};

const REVIEW_SELECT: &str = r#"
    SELECT r.id, r.course_id, r.user_id, u.username, r.rating, r.comment, r.is_approved,
           r.has_attended, r.helpful_count, r.not_helpful_count, r.created_at, r.updated_at
    FROM reviews r
    JOIN users u ON u.id = r.user_id
"#;

pub async fn list_approved_for_course<'e, E>(
    executor: E,
    course_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Review>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "{REVIEW_SELECT} WHERE r.course_id = $1 AND r.is_approved = TRUE \
         ORDER BY r.created_at DESC, r.id LIMIT $2 OFFSET $3"
    ))
    .bind(course_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

pub async fn count_approved_for_course<'e, E>(executor: E, course_id: Uuid) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE course_id = $1 AND is_approved = TRUE")
        .bind(course_id)
        .fetch_one(executor)
        .await
}

pub async fn find_review<'e, E>(executor: E, review_id: Uuid) -> Result<Option<Review>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
        .bind(review_id)
        .fetch_optional(executor)
        .await
}

pub async fn review_exists<'e, E>(
    executor: E,
    course_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reviews WHERE course_id = $1 AND user_id = $2)")
        .bind(course_id)
        .bind(user_id)
        .fetch_one(executor)
        .await
}

pub struct NewReview<'a> {
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub comment: &'a str,
    pub has_attended: bool,
}

pub async fn insert_review<'e, E>(executor: E, review: &NewReview<'_>) -> Result<Uuid, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            INSERT INTO reviews (course_id, user_id, rating, comment, has_attended)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        "#,
    )
    .bind(review.course_id)
    .bind(review.user_id)
    .bind(review.rating)
    .bind(review.comment)
    .bind(review.has_attended)
    .fetch_one(executor)
    .await
}

#[derive(Debug, Default)]
pub struct ReviewUpdate<'a> {
    pub rating: Option<i16>,
    pub comment: Option<&'a str>,
    pub has_attended: Option<bool>,
}

pub async fn update_review<'e, E>(
    executor: E,
    review_id: Uuid,
    update: &ReviewUpdate<'_>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE reviews
            SET rating = COALESCE($1, rating),
                comment = COALESCE($2, comment),
                has_attended = COALESCE($3, has_attended),
                updated_at = NOW()
            WHERE id = $4
        "#,
    )
    .bind(update.rating)
    .bind(update.comment)
    .bind(update.has_attended)
    .bind(review_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a review, returning the course it belonged to.
pub async fn delete_review<'e, E>(executor: E, review_id: Uuid) -> Result<Option<Uuid>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("DELETE FROM reviews WHERE id = $1 RETURNING course_id")
        .bind(review_id)
        .fetch_optional(executor)
        .await
}

/// Set the moderation flag, returning the course the review belongs to.
pub async fn set_approval<'e, E>(
    executor: E,
    review_id: Uuid,
    is_approved: bool,
) -> Result<Option<Uuid>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            UPDATE reviews
            SET is_approved = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING course_id
        "#,
    )
    .bind(is_approved)
    .bind(review_id)
    .fetch_optional(executor)
    .await
}

/// Recompute a course's rating and review count from its approved reviews.
///
/// The course row is locked first, so concurrent recomputes for one course
/// run one after another and the last one sees every committed review.
pub async fn refresh_course_rating(
    conn: &mut PgConnection,
    course_id: Uuid,
) -> Result<RatingSummary, sqlx::Error> {
    sqlx::query("SELECT id FROM courses WHERE id = $1 FOR UPDATE")
        .bind(course_id)
        .execute(&mut *conn)
        .await?;

    let totals: RatingTotals = sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT COALESCE(SUM(rating), 0)::BIGINT AS sum, COUNT(*) AS count
            FROM reviews
            WHERE course_id = $1 AND is_approved = TRUE
        "#,
    )
    .bind(course_id)
    .fetch_one(&mut *conn)
    .await?;

    let summary = RatingSummary::from_totals(totals.sum, totals.count);

    sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE courses
            SET rating = $1, reviews = $2
            WHERE id = $3
        "#,
    )
    .bind(summary.rating)
    .bind(summary.reviews)
    .bind(course_id)
    .execute(&mut *conn)
    .await?;

    Ok(summary)
}

// --- Responses ---

pub async fn find_response<'e, E>(
    executor: E,
    review_id: Uuid,
) -> Result<Option<ReviewResponse>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT rr.id, rr.review_id, rr.responder_id, u.username AS responder_name,
                   rr.comment, rr.created_at
            FROM review_responses rr
            JOIN users u ON u.id = rr.responder_id
            WHERE rr.review_id = $1
        "#,
    )
    .bind(review_id)
    .fetch_optional(executor)
    .await
}

pub async fn insert_response<'e, E>(
    executor: E,
    review_id: Uuid,
    responder_id: Uuid,
    comment: &str,
) -> Result<ReviewResponse, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            WITH inserted AS (
                INSERT INTO review_responses (review_id, responder_id, comment)
                VALUES ($1, $2, $3)
                RETURNING id, review_id, responder_id, comment, created_at
            )
            SELECT i.id, i.review_id, i.responder_id, u.username AS responder_name,
                   i.comment, i.created_at
            FROM inserted i
            JOIN users u ON u.id = i.responder_id
        "#,
    )
    .bind(review_id)
    .bind(responder_id)
    .bind(comment)
    .fetch_one(executor)
    .await
}

// --- Votes ---

pub async fn vote_exists<'e, E>(executor: E, review_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM review_votes WHERE review_id = $1 AND user_id = $2)")
        .bind(review_id)
        .bind(user_id)
        .fetch_one(executor)
        .await
}

pub async fn insert_vote<'e, E>(
    executor: E,
    review_id: Uuid,
    user_id: Uuid,
    is_helpful: bool,
) -> Result<Uuid, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            INSERT INTO review_votes (review_id, user_id, is_helpful)
            VALUES ($1, $2, $3)
            RETURNING id
        "#,
    )
    .bind(review_id)
    .bind(user_id)
    .bind(is_helpful)
    .fetch_one(executor)
    .await
}

/// Recompute a review's helpful counters from its votes.
pub async fn refresh_review_votes(
    conn: &mut PgConnection,
    review_id: Uuid,
) -> Result<VoteTally, sqlx::Error> {
    sqlx::query("SELECT id FROM reviews WHERE id = $1 FOR UPDATE")
        .bind(review_id)
        .execute(&mut *conn)
        .await?;

    let votes: Vec<bool> = sqlx::query_scalar("SELECT is_helpful FROM review_votes WHERE review_id = $1")
        .bind(review_id)
        .fetch_all(&mut *conn)
        .await?;

    let tally = VoteTally::from_votes(votes);

    sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE reviews
            SET helpful_count = $1, not_helpful_count = $2
            WHERE id = $3
        "#,
    )
    .bind(tally.helpful)
    .bind(tally.not_helpful)
    .bind(review_id)
    .execute(&mut *conn)
    .await?;

    Ok(tally)
}

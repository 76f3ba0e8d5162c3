use lms_aggregate::Progress;
use sqlx::{Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::models::{Enrollment, EnrollmentPayment, EnrollmentSummary, LessonCounts, LessonProgress};

const ENROLLMENT_COLUMNS: &str = "id, user_id, course_id, is_active, price, progress, is_completed, \
     payment_currency, payment_status, payment_intent_id, payment_amount, total_mark, \
     is_certificate_ready, created_at, updated_at";

/// Load an enrollment and lock it until the transaction ends, so that
/// completion writes for the same enrollment are applied one at a time.
pub async fn lock_enrollment(
    conn: &mut PgConnection,
    enrollment_id: Uuid,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = $1 FOR UPDATE"
    ))
    .bind(enrollment_id)
    .fetch_optional(conn)
    .await
}

pub async fn find_user_enrollment<'e, E>(
    executor: E,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Option<Enrollment>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE user_id = $1 AND course_id = $2"
    ))
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(executor)
    .await
}

/// Insert an enrollment unless one already exists for the (user, course) pair.
///
/// Returns `None` when a row was already present; the existing row is left untouched.
pub async fn insert_enrollment_if_absent<'e, E>(
    executor: E,
    user_id: Uuid,
    course_id: Uuid,
    payment: &EnrollmentPayment,
) -> Result<Option<Enrollment>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
            INSERT INTO enrollments (
                user_id, course_id, price, payment_currency, payment_status,
                payment_intent_id, payment_amount
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT DO NOTHING
            RETURNING {ENROLLMENT_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(course_id)
    .bind(payment.price)
    .bind(&payment.currency)
    .bind(&payment.status)
    .bind(&payment.intent_id)
    .bind(payment.amount)
    .fetch_optional(executor)
    .await
}

pub async fn list_active_for_user<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Vec<EnrollmentSummary>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT e.id, e.course_id, c.title AS course_title, c.banner_url AS course_banner_url,
                   e.progress, e.is_completed, e.price, e.created_at
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            WHERE e.user_id = $1 AND e.is_active = TRUE
            ORDER BY e.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

pub async fn is_actively_enrolled<'e, E>(
    executor: E,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            SELECT EXISTS(
                SELECT 1 FROM enrollments
                WHERE user_id = $1 AND course_id = $2 AND is_active = TRUE
            )
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(executor)
    .await
}

/// Record a lesson completion. Returns `false` when it was already recorded.
pub async fn insert_completion<'e, E>(
    executor: E,
    enrollment_id: Uuid,
    lesson_id: Uuid,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            INSERT INTO lesson_completions (enrollment_id, lesson_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
        "#,
    )
    .bind(enrollment_id)
    .bind(lesson_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove a lesson completion. Returns `false` when none was recorded.
pub async fn delete_completion<'e, E>(
    executor: E,
    enrollment_id: Uuid,
    lesson_id: Uuid,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM lesson_completions WHERE enrollment_id = $1 AND lesson_id = $2")
        .bind(enrollment_id)
        .bind(lesson_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Ids of every lesson the enrollment has completed, in curriculum order.
pub async fn completed_lesson_ids<'e, E>(
    executor: E,
    enrollment_id: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            SELECT lc.lesson_id
            FROM lesson_completions lc
            JOIN lessons l ON l.id = lc.lesson_id
            WHERE lc.enrollment_id = $1
            ORDER BY l.sequence_number
        "#,
    )
    .bind(enrollment_id)
    .fetch_all(executor)
    .await
}

/// Active lessons of the enrollment's course and how many of them it completed.
pub async fn lesson_counts<'e, E>(executor: E, enrollment_id: Uuid) -> Result<LessonCounts, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT
                (SELECT COUNT(*) FROM lessons l
                 WHERE l.course_id = e.course_id AND l.is_active = TRUE) AS active,
                (SELECT COUNT(*) FROM lesson_completions lc
                 JOIN lessons l ON l.id = lc.lesson_id
                 WHERE lc.enrollment_id = e.id AND l.is_active = TRUE) AS completed
            FROM enrollments e
            WHERE e.id = $1
        "#,
    )
    .bind(enrollment_id)
    .fetch_one(executor)
    .await
}

pub async fn store_progress<'e, E>(
    executor: E,
    enrollment_id: Uuid,
    progress: Progress,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE enrollments
            SET progress = $1, is_completed = $2, updated_at = NOW()
            WHERE id = $3
        "#,
    )
    .bind(progress.percentage)
    .bind(progress.is_completed)
    .bind(enrollment_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Recompute and store the progress of one enrollment.
pub async fn refresh_progress(
    conn: &mut PgConnection,
    enrollment_id: Uuid,
) -> Result<Progress, sqlx::Error> {
    let counts = lesson_counts(&mut *conn, enrollment_id).await?;
    let progress = Progress::from_counts(counts.completed, counts.active);
    store_progress(&mut *conn, enrollment_id, progress).await?;
    Ok(progress)
}

/// Recompute the progress of every enrollment in a course.
///
/// Called after a lesson of the course is created, changed or removed.
pub async fn refresh_course_progress(
    conn: &mut PgConnection,
    course_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let enrollment_ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM enrollments WHERE course_id = $1 FOR UPDATE")
            .bind(course_id)
            .fetch_all(&mut *conn)
            .await?;

    for enrollment_id in &enrollment_ids {
        refresh_progress(&mut *conn, *enrollment_id).await?;
    }

    Ok(enrollment_ids.len() as u64)
}

/// Recompute a course's student counter from its enrollments.
pub async fn refresh_course_students<'e, E>(executor: E, course_id: Uuid) -> Result<i32, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            UPDATE courses
            SET students = (SELECT COUNT(*) FROM enrollments WHERE course_id = $1)
            WHERE id = $1
            RETURNING students
        "#,
    )
    .bind(course_id)
    .fetch_one(executor)
    .await
}

/// Active lessons of a course with the enrollment's completion flags.
pub async fn lesson_progress<'e, E>(
    executor: E,
    enrollment_id: Uuid,
    course_id: Uuid,
) -> Result<Vec<LessonProgress>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT l.id AS lesson_id, l.title, l.sequence_number,
                   EXISTS(
                       SELECT 1 FROM lesson_completions lc
                       WHERE lc.enrollment_id = $1 AND lc.lesson_id = l.id
                   ) AS is_completed
            FROM lessons l
            WHERE l.course_id = $2 AND l.is_active = TRUE
            ORDER BY l.sequence_number
        "#,
    )
    .bind(enrollment_id)
    .bind(course_id)
    .fetch_all(executor)
    .await
}

//! Payments, enrollments and lesson progress.

pub mod model;
pub mod routes;

use lms_db::{
    models::{CoursePricing, Enrollment, EnrollmentPayment},
    repositories::enrollment as enrollment_repo,
};

use crate::{
    ApiState,
    auth::AuthUser,
    error::ApiError,
    metrics,
    notify::{self, Notification},
};

pub use routes::routes;

#[derive(Debug)]
pub struct EnrollmentOutcome {
    pub enrollment: Enrollment,
    /// `false` when the user was already enrolled
    pub created: bool,
}

/// Enroll `user` in `course`, or return the enrollment they already have.
///
/// The insert is guarded by the (user, course) unique constraint, so
/// concurrent confirmations of the same payment yield one row and every
/// caller sees it. The course student counter is recomputed in the same
/// transaction as a new row.
pub(crate) async fn enroll(
    state: &ApiState,
    user: &AuthUser,
    course: &CoursePricing,
    payment: &EnrollmentPayment,
    source: &'static str,
) -> Result<EnrollmentOutcome, ApiError> {
    let mut tx = state.pool.begin().await?;

    let outcome =
        match enrollment_repo::insert_enrollment_if_absent(&mut *tx, user.user_id, course.id, payment)
            .await?
        {
            Some(enrollment) => {
                let students = enrollment_repo::refresh_course_students(&mut *tx, course.id).await?;
                tracing::info!(
                    enrollment_id = %enrollment.id,
                    course_id = %course.id,
                    user_id = %user.user_id,
                    students,
                    source,
                    "Enrollment created"
                );
                EnrollmentOutcome {
                    enrollment,
                    created: true,
                }
            }
            None => {
                // Either this user is enrolled already or the payment intent
                // was recorded on another enrollment
                let enrollment =
                    enrollment_repo::find_user_enrollment(&mut *tx, user.user_id, course.id)
                        .await?
                        .ok_or_else(|| {
                            ApiError::Conflict(
                                "This payment has already been used for another enrollment"
                                    .to_string(),
                            )
                        })?;
                EnrollmentOutcome {
                    enrollment,
                    created: false,
                }
            }
        };

    tx.commit().await?;
    metrics::record_enrollment(source, outcome.created);

    if outcome.created {
        notify::deliver_in_background(
            state.notifier.clone(),
            user.email.clone(),
            Notification::EnrollmentConfirmed {
                course_title: course.title.clone(),
            },
        );
    }

    Ok(outcome)
}

use axum::{
    Json, Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use sqlx::PgConnection;
use uuid::Uuid;

use lms_aggregate::{Progress, effective_price, from_minor_units, to_minor_units};
use lms_db::{
    models::{CoursePricing, Enrollment, EnrollmentPayment},
    repositories::{catalog as catalog_repo, enrollment as enrollment_repo},
};

use super::{
    enroll,
    model::{
        CheckoutCourse, CompletionStatus, CourseProgress, EnrollmentReceipt, PaymentDetails,
        ProcessPaymentRequest,
    },
};
use crate::{
    ApiState,
    auth::AuthUser,
    catalog::course_owner,
    error::ApiError,
    metrics,
    middleware::rate_limit,
    payment::intent_metadata,
    policy::{Action, authorize},
    response::{created, success},
    validation::ValidJson,
};

pub fn routes() -> Router<ApiState> {
    use crate::make_rate_limit_layer;

    Router::new()
        .route("/payment/{course_id}", get(payment_details))
        .route("/payment/process", post(process_payment))
        .route("/courses/{course_id}/enroll", post(enroll_free))
        .route("/courses/{course_id}/progress", get(course_progress))
        .route("/enrollments", get(list_enrollments))
        .route("/enrollments/check/{course_id}", get(check_enrollment))
        .route(
            "/enrollments/{enrollment_id}/lessons/{lesson_id}/complete",
            post(mark_lesson_complete),
        )
        .route(
            "/enrollments/{enrollment_id}/lessons/{lesson_id}/incomplete",
            post(mark_lesson_incomplete),
        )
        .layer(make_rate_limit_layer!(
            rate_limit::GENERAL_REPLENISH_MS,
            rate_limit::GENERAL_BURST_SIZE
        ))
}

async fn load_pricing(state: &ApiState, course_id: Uuid) -> Result<CoursePricing, ApiError> {
    catalog_repo::find_course_pricing(&state.pool, course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

/// Create a payment intent for the course, unless the caller already owns it.
async fn payment_details(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let course = load_pricing(&state, course_id).await?;

    if enrollment_repo::find_user_enrollment(&state.pool, auth_user.user_id, course_id)
        .await?
        .is_some()
    {
        return Ok(success(
            "You are already enrolled in this course",
            PaymentDetails {
                already_enrolled: true,
                client_secret: None,
                payment_intent_id: None,
                currency: None,
                amount: None,
                course: course.into(),
            },
        ));
    }

    let amount = to_minor_units(effective_price(course.price, course.discount_price));
    if amount <= 0 {
        return Err(ApiError::Validation(
            "This course is free, enroll directly instead".to_string(),
        ));
    }

    let intent = state
        .payments
        .create_intent(
            amount,
            &state.payment_currency,
            &format!("Payment for {}", course.title),
            &intent_metadata(course_id, auth_user.user_id, &auth_user.email),
        )
        .await?;

    metrics::record_payment_event("intent_created");
    tracing::info!(intent_id = %intent.id, %course_id, user_id = %auth_user.user_id, amount, "Payment intent created");

    Ok(success(
        "Payment details retrieved successfully",
        PaymentDetails {
            already_enrolled: false,
            client_secret: Some(intent.client_secret),
            payment_intent_id: Some(intent.id),
            currency: Some(intent.currency),
            amount: Some(amount),
            course: CheckoutCourse::from(course),
        },
    ))
}

/// Confirm a paid intent and create the enrollment it paid for.
async fn process_payment(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<ProcessPaymentRequest>,
) -> Result<Response, ApiError> {
    authorize(&auth_user, Action::Enroll)?;
    let course = load_pricing(&state, req.course_id).await?;

    let intent = state.payments.retrieve_intent(&req.payment_intent_id).await?;

    if let Err(e) = intent.confirm_for(req.course_id, auth_user.user_id) {
        metrics::record_payment_event("mismatch");
        tracing::warn!(
            intent_id = %intent.id,
            course_id = %req.course_id,
            user_id = %auth_user.user_id,
            status = %intent.status,
            "Payment intent does not match enrollment request"
        );
        return Err(e);
    }
    metrics::record_payment_event("confirmed");

    let payment = EnrollmentPayment {
        price: from_minor_units(intent.amount),
        currency: Some(intent.currency),
        status: Some(intent.status),
        intent_id: Some(intent.id),
        amount: Some(intent.amount),
    };

    let outcome = enroll(&state, &auth_user, &course, &payment, "payment").await?;
    let receipt = EnrollmentReceipt {
        enrollment_id: outcome.enrollment.id,
        amount_paid: outcome.enrollment.price,
    };

    Ok(if outcome.created {
        created("Enrollment successful", receipt).into_response()
    } else {
        success("Already enrolled", receipt).into_response()
    })
}

/// Enroll in a course whose effective price is zero.
async fn enroll_free(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(course_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    authorize(&auth_user, Action::Enroll)?;
    let course = load_pricing(&state, course_id).await?;

    if to_minor_units(effective_price(course.price, course.discount_price)) > 0 {
        return Err(ApiError::Validation(
            "This course requires payment".to_string(),
        ));
    }

    let outcome = enroll(
        &state,
        &auth_user,
        &course,
        &EnrollmentPayment::default(),
        "free",
    )
    .await?;

    Ok(if outcome.created {
        created("Enrollment successful", outcome.enrollment).into_response()
    } else {
        success("Already enrolled", outcome.enrollment).into_response()
    })
}

async fn list_enrollments(
    auth_user: AuthUser,
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let enrollments = enrollment_repo::list_active_for_user(&state.pool, auth_user.user_id).await?;
    Ok(success("Enrollments retrieved successfully", enrollments))
}

async fn check_enrollment(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let is_enrolled =
        enrollment_repo::is_actively_enrolled(&state.pool, auth_user.user_id, course_id).await?;
    Ok(Json(json!({ "is_enrolled": is_enrolled })))
}

/// Lock the caller's active enrollment and check the lesson belongs to its course.
async fn lock_tracked_enrollment(
    conn: &mut PgConnection,
    enrollment_id: Uuid,
    lesson_id: Uuid,
    user_id: Uuid,
) -> Result<Enrollment, ApiError> {
    let enrollment = enrollment_repo::lock_enrollment(conn, enrollment_id)
        .await?
        .filter(|e| e.user_id == user_id)
        .ok_or_else(not_found)?;
    if !enrollment.is_active {
        return Err(ApiError::NotEnrolled(
            "You are not enrolled in this course".to_string(),
        ));
    }

    catalog_repo::find_lesson(&mut *conn, lesson_id)
        .await?
        .filter(|l| l.course_id == enrollment.course_id)
        .ok_or_else(not_found)?;

    Ok(enrollment)
}

async fn mark_lesson_complete(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path((enrollment_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CompletionStatus>, ApiError> {
    authorize(&auth_user, Action::TrackProgress)?;

    let mut tx = state.pool.begin().await?;

    let enrollment = lock_tracked_enrollment(&mut tx, enrollment_id, lesson_id, auth_user.user_id).await?;

    let inserted = enrollment_repo::insert_completion(&mut *tx, enrollment_id, lesson_id).await?;
    let progress = enrollment_repo::refresh_progress(&mut tx, enrollment_id).await?;
    let completed_lessons = enrollment_repo::completed_lesson_ids(&mut *tx, enrollment_id).await?;

    tx.commit().await?;

    tracing::debug!(%enrollment_id, %lesson_id, inserted, progress = progress.percentage, "Lesson completed");

    Ok(Json(CompletionStatus {
        detail: "Lesson marked as completed",
        progress: progress.percentage,
        is_completed: true,
        lesson_id,
        is_course_completed: Some(progress.is_completed),
        completed_lessons: Some(completed_lessons),
    }))
}

async fn mark_lesson_incomplete(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path((enrollment_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CompletionStatus>, ApiError> {
    authorize(&auth_user, Action::TrackProgress)?;

    let mut tx = state.pool.begin().await?;

    let enrollment = lock_tracked_enrollment(&mut tx, enrollment_id, lesson_id, auth_user.user_id).await?;

    if !enrollment_repo::delete_completion(&mut *tx, enrollment_id, lesson_id).await? {
        return Ok(Json(CompletionStatus {
            detail: "Lesson not marked as completed",
            progress: enrollment.progress,
            is_completed: false,
            lesson_id,
            is_course_completed: None,
            completed_lessons: None,
        }));
    }

    let progress = enrollment_repo::refresh_progress(&mut tx, enrollment_id).await?;
    let completed_lessons = enrollment_repo::completed_lesson_ids(&mut *tx, enrollment_id).await?;

    tx.commit().await?;

    Ok(Json(CompletionStatus {
        detail: "Lesson marked as incomplete",
        progress: progress.percentage,
        is_completed: false,
        lesson_id,
        is_course_completed: Some(progress.is_completed),
        completed_lessons: Some(completed_lessons),
    }))
}

async fn course_progress(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&auth_user, Action::TrackProgress)?;
    course_owner(&state.pool, course_id).await?;

    let enrollment = enrollment_repo::find_user_enrollment(&state.pool, auth_user.user_id, course_id)
        .await?
        .filter(|e| e.is_active)
        .ok_or_else(|| ApiError::NotEnrolled("You are not enrolled in this course".to_string()))?;

    let lessons = enrollment_repo::lesson_progress(&state.pool, enrollment.id, course_id).await?;
    let total_lessons = lessons.len() as i64;
    let completed_lessons = lessons.iter().filter(|l| l.is_completed).count() as i64;
    let progress = Progress::from_counts(completed_lessons, total_lessons);

    Ok(success(
        "Course progress retrieved successfully",
        CourseProgress {
            course_id,
            enrollment_id: enrollment.id,
            total_lessons,
            completed_lessons,
            progress: progress.percentage,
            is_completed: progress.is_completed,
            lessons,
        },
    ))
}

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::{get, patch, post},
};
use uuid::Uuid;

use lms_db::{
    is_unique_violation,
    models::Review,
    repositories::{enrollment as enrollment_repo, review as review_repo},
};

use super::model::{
    ApprovalRequest, ResponseRequest, ReviewDetail, ReviewRequest, ReviewUpdateRequest,
    VoteRequest, VoteResult, check_comment, check_rating,
};
use crate::{
    ApiState,
    auth::AuthUser,
    catalog::course_owner,
    error::ApiError,
    middleware::rate_limit,
    policy::{Action, authorize},
    response::{Page, PageParams, created, success},
    validation::ValidJson,
};

pub fn routes() -> Router<ApiState> {
    use crate::make_rate_limit_layer;

    Router::new()
        .route(
            "/courses/{course_id}/reviews",
            get(list_reviews).post(create_review),
        )
        .route(
            "/reviews/{review_id}",
            get(get_review).patch(update_review).delete(delete_review),
        )
        .route("/reviews/{review_id}/approval", patch(set_approval))
        .route(
            "/reviews/{review_id}/response",
            get(get_response).post(create_response),
        )
        .route("/reviews/{review_id}/vote", post(vote))
        .layer(make_rate_limit_layer!(
            rate_limit::GENERAL_REPLENISH_MS,
            rate_limit::GENERAL_BURST_SIZE
        ))
}

async fn load_review(state: &ApiState, review_id: Uuid) -> Result<Review, ApiError> {
    review_repo::find_review(&state.pool, review_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Review not found".to_string()))
}

async fn list_reviews(
    State(state): State<ApiState>,
    Path(course_id): Path<Uuid>,
    Query(params): Query<PageParams>,
    uri: Uri,
) -> Result<Json<Page<Review>>, ApiError> {
    course_owner(&state.pool, course_id).await?;

    let count = review_repo::count_approved_for_course(&state.pool, course_id).await?;
    let reviews = review_repo::list_approved_for_course(
        &state.pool,
        course_id,
        params.page_size(),
        params.offset(),
    )
    .await?;

    Ok(Json(Page::new(reviews, count, &params, &uri)?))
}

async fn create_review(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(course_id): Path<Uuid>,
    ValidJson(req): ValidJson<ReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    course_owner(&state.pool, course_id).await?;
    let is_enrolled =
        enrollment_repo::is_actively_enrolled(&state.pool, auth_user.user_id, course_id).await?;
    authorize(&auth_user, Action::SubmitReview { is_enrolled })?;

    check_rating(req.rating)?;
    check_comment(&req.comment)?;

    let duplicate = || ApiError::Conflict("You have already reviewed this course".to_string());

    if review_repo::review_exists(&state.pool, course_id, auth_user.user_id).await? {
        return Err(duplicate());
    }

    let mut tx = state.pool.begin().await?;

    let review_id = review_repo::insert_review(
        &mut *tx,
        &review_repo::NewReview {
            course_id,
            user_id: auth_user.user_id,
            rating: req.rating,
            comment: req.comment.trim(),
            has_attended: req.has_attended,
        },
    )
    .await
    .map_err(|e| if is_unique_violation(&e) { duplicate() } else { e.into() })?;

    let summary = review_repo::refresh_course_rating(&mut tx, course_id).await?;
    tx.commit().await?;

    tracing::info!(%review_id, %course_id, rating = summary.rating, reviews = summary.reviews, "Review created");

    let review = load_review(&state, review_id).await?;
    Ok(created("Review created successfully", review))
}

async fn get_review(
    State(state): State<ApiState>,
    Path(review_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let review = load_review(&state, review_id).await?;
    if !review.is_approved {
        return Err(ApiError::NotFound("Review not found".to_string()));
    }

    let response = review_repo::find_response(&state.pool, review_id).await?;
    Ok(success(
        "Review retrieved successfully",
        ReviewDetail { review, response },
    ))
}

async fn update_review(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(review_id): Path<Uuid>,
    ValidJson(req): ValidJson<ReviewUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let review = load_review(&state, review_id).await?;
    authorize(
        &auth_user,
        Action::EditReview {
            author_id: review.user_id,
        },
    )?;
    req.check()?;

    let mut tx = state.pool.begin().await?;

    let updated = review_repo::update_review(
        &mut *tx,
        review_id,
        &review_repo::ReviewUpdate {
            rating: req.rating,
            comment: req.comment.as_deref().map(str::trim),
            has_attended: req.has_attended,
        },
    )
    .await?;
    if !updated {
        return Err(ApiError::NotFound("Review not found".to_string()));
    }

    review_repo::refresh_course_rating(&mut tx, review.course_id).await?;
    tx.commit().await?;

    let review = load_review(&state, review_id).await?;
    Ok(success("Review updated successfully", review))
}

async fn delete_review(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(review_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let review = load_review(&state, review_id).await?;
    authorize(
        &auth_user,
        Action::DeleteReview {
            author_id: review.user_id,
        },
    )?;

    let mut tx = state.pool.begin().await?;

    let course_id = review_repo::delete_review(&mut *tx, review_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Review not found".to_string()))?;
    let summary = review_repo::refresh_course_rating(&mut tx, course_id).await?;

    tx.commit().await?;

    tracing::info!(%review_id, %course_id, deleted_by = %auth_user.user_id, reviews = summary.reviews, "Review deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Approve or hide a review. Hidden reviews do not count towards the rating.
async fn set_approval(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(review_id): Path<Uuid>,
    ValidJson(req): ValidJson<ApprovalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&auth_user, Action::ModerateReview)?;

    let mut tx = state.pool.begin().await?;

    let course_id = review_repo::set_approval(&mut *tx, review_id, req.is_approved)
        .await?
        .ok_or_else(|| ApiError::NotFound("Review not found".to_string()))?;
    review_repo::refresh_course_rating(&mut tx, course_id).await?;

    tx.commit().await?;

    tracing::info!(%review_id, is_approved = req.is_approved, "Review moderated");

    let review = load_review(&state, review_id).await?;
    Ok(success("Review approval updated successfully", review))
}

async fn get_response(
    State(state): State<ApiState>,
    Path(review_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    load_review(&state, review_id).await?;

    let response = review_repo::find_response(&state.pool, review_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No response found for this review".to_string()))?;

    Ok(success("Response retrieved successfully", response))
}

async fn create_response(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(review_id): Path<Uuid>,
    ValidJson(req): ValidJson<ResponseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let review = load_review(&state, review_id).await?;
    let owner = course_owner(&state.pool, review.course_id).await?;
    authorize(
        &auth_user,
        Action::RespondToReview {
            instructor_id: owner.instructor_id,
        },
    )?;
    check_comment(&req.comment)?;

    let duplicate = || ApiError::Conflict("Response already exists for this review".to_string());

    if review_repo::find_response(&state.pool, review_id).await?.is_some() {
        return Err(duplicate());
    }

    let response =
        review_repo::insert_response(&state.pool, review_id, auth_user.user_id, req.comment.trim())
            .await
            .map_err(|e| if is_unique_violation(&e) { duplicate() } else { e.into() })?;

    Ok(created("Response added successfully", response))
}

async fn vote(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(review_id): Path<Uuid>,
    ValidJson(req): ValidJson<VoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&auth_user, Action::VoteOnReview)?;

    let review = load_review(&state, review_id).await?;
    if !review.is_approved {
        return Err(ApiError::NotFound("Review not found".to_string()));
    }

    let duplicate = || ApiError::Conflict("You have already voted on this review".to_string());

    if review_repo::vote_exists(&state.pool, review_id, auth_user.user_id).await? {
        return Err(duplicate());
    }

    let mut tx = state.pool.begin().await?;

    review_repo::insert_vote(&mut *tx, review_id, auth_user.user_id, req.is_helpful)
        .await
        .map_err(|e| if is_unique_violation(&e) { duplicate() } else { e.into() })?;
    let tally = review_repo::refresh_review_votes(&mut tx, review_id).await?;

    tx.commit().await?;

    Ok(created(
        "Vote recorded successfully",
        VoteResult::new(review_id, req.is_helpful, tally),
    ))
}

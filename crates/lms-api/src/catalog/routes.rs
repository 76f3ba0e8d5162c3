use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::Uri,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use uuid::Uuid;

use lms_db::{
    models::{Category, Course, CourseFilter},
    repositories::catalog as catalog_repo,
};

use super::{
    course_owner, curriculum,
    model::{CategoryRequest, CourseDetail, CourseQuery, CourseRequest, TeacherDashboard},
};
use crate::{
    ApiState,
    auth::AuthUser,
    error::ApiError,
    middleware::rate_limit,
    policy::{Action, authorize},
    response::{MAX_PAGE_SIZE, Page, PageParams, created, success},
    validation::ValidJson,
};

pub fn routes() -> Router<ApiState> {
    use crate::make_rate_limit_layer;

    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/courses", get(list_courses).post(create_course))
        .route(
            "/courses/{course_id}",
            get(get_course).put(update_course).delete(delete_course),
        )
        .route("/teacher-dashboard", get(teacher_dashboard))
        .merge(curriculum::routes())
        .layer(make_rate_limit_layer!(
            rate_limit::GENERAL_REPLENISH_MS,
            rate_limit::GENERAL_BURST_SIZE
        ))
}

async fn ensure_category(state: &ApiState, category_id: Uuid) -> Result<(), ApiError> {
    if catalog_repo::category_exists(&state.pool, category_id).await? {
        Ok(())
    } else {
        Err(ApiError::Validation("Category does not exist".to_string()))
    }
}

async fn load_course(state: &ApiState, course_id: Uuid) -> Result<Course, ApiError> {
    catalog_repo::find_course(&state.pool, course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))
}

async fn list_categories(
    State(state): State<ApiState>,
    Query(params): Query<PageParams>,
    uri: Uri,
) -> Result<Json<Page<Category>>, ApiError> {
    let count = catalog_repo::count_categories(&state.pool).await?;
    let categories =
        catalog_repo::list_categories(&state.pool, params.page_size(), params.offset()).await?;

    Ok(Json(Page::new(categories, count, &params, &uri)?))
}

async fn create_category(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&auth_user, Action::CreateCategory)?;

    let category = catalog_repo::create_category(&state.pool, req.title.trim(), req.is_active).await?;

    tracing::info!(category_id = %category.id, "Category created");

    Ok(created("Category created successfully", category))
}

async fn list_courses(
    State(state): State<ApiState>,
    Query(params): Query<PageParams>,
    Query(query): Query<CourseQuery>,
    uri: Uri,
) -> Result<Json<Page<Course>>, ApiError> {
    let filter = query.into_filter()?;

    let count = catalog_repo::count_courses(&state.pool, &filter).await?;
    let courses =
        catalog_repo::list_courses(&state.pool, &filter, params.page_size(), params.offset())
            .await?;

    Ok(Json(Page::new(courses, count, &params, &uri)?))
}

async fn create_course(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<CourseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&auth_user, Action::CreateCourse)?;

    let input = req.into_input()?;
    ensure_category(&state, input.category_id).await?;

    let course_id = catalog_repo::create_course(&state.pool, auth_user.user_id, &input).await?;
    let course = load_course(&state, course_id).await?;

    tracing::info!(%course_id, instructor_id = %auth_user.user_id, "Course created");

    Ok(created("Course created successfully", course))
}

async fn get_course(
    State(state): State<ApiState>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let course = load_course(&state, course_id).await?;
    let sections = catalog_repo::list_sections(&state.pool, Some(course_id)).await?;
    let lessons = catalog_repo::list_course_lessons(&state.pool, course_id).await?;

    Ok(success(
        "Course retrieved successfully",
        CourseDetail::new(course, sections, lessons),
    ))
}

async fn update_course(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(course_id): Path<Uuid>,
    ValidJson(req): ValidJson<CourseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = course_owner(&state.pool, course_id).await?;
    authorize(
        &auth_user,
        Action::ManageCourse {
            instructor_id: owner.instructor_id,
        },
    )?;

    let input = req.into_input()?;
    ensure_category(&state, input.category_id).await?;

    if !catalog_repo::update_course(&state.pool, course_id, &input).await? {
        return Err(ApiError::NotFound("Course not found".to_string()));
    }

    let course = load_course(&state, course_id).await?;
    Ok(success("Course updated successfully", course))
}

async fn delete_course(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = course_owner(&state.pool, course_id).await?;
    authorize(
        &auth_user,
        Action::ManageCourse {
            instructor_id: owner.instructor_id,
        },
    )?;

    if !catalog_repo::delete_course(&state.pool, course_id).await? {
        return Err(ApiError::NotFound("Course not found".to_string()));
    }

    tracing::info!(%course_id, deleted_by = %auth_user.user_id, "Course deleted");

    Ok(success("Course deleted successfully", json!({ "id": course_id })))
}

async fn teacher_dashboard(
    auth_user: AuthUser,
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&auth_user, Action::ViewTeacherDashboard)?;

    let stats = catalog_repo::teacher_stats(&state.pool, auth_user.user_id).await?;
    let filter = CourseFilter {
        instructor_id: Some(auth_user.user_id),
        ..CourseFilter::default()
    };
    let courses = catalog_repo::list_courses(&state.pool, &filter, MAX_PAGE_SIZE, 0).await?;

    Ok(success(
        "Teacher dashboard data retrieved successfully",
        TeacherDashboard { stats, courses },
    ))
}

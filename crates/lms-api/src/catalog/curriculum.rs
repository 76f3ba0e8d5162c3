//! Sections, lessons, lesson questions and materials.
//!
//! Every lesson write recomputes the progress of all enrollments in the
//! course inside the same transaction, since the active lesson set is the
//! denominator of every progress value.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::Uri,
    response::IntoResponse,
    routing::{delete, get},
};
use serde_json::json;
use sqlx::PgConnection;
use uuid::Uuid;

use lms_aggregate::next_sequence_number;
use lms_db::{
    is_unique_violation,
    models::{CurriculumSection, Lesson},
    repositories::{
        catalog::{self as catalog_repo, NewMaterial},
        enrollment as enrollment_repo,
    },
};

use super::{
    course_owner,
    model::{
        CourseScope, LessonRequest, LessonUpdateRequest, MaterialRequest, QuestionRequest,
        SectionRequest, SectionUpdateRequest,
    },
};
use crate::{
    ApiState,
    auth::AuthUser,
    error::ApiError,
    policy::{Action, authorize},
    response::{Page, PageParams, created, success},
    validation::{ValidJson, validate_text, validate_url},
};

const QUESTION_MAX_LENGTH: usize = 5000;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/sections", get(list_sections).post(create_section))
        .route(
            "/sections/{section_id}",
            get(get_section).patch(update_section).delete(delete_section),
        )
        .route("/lessons", get(list_lessons).post(create_lesson))
        .route(
            "/lessons/{lesson_id}",
            get(get_lesson).patch(update_lesson).delete(delete_lesson),
        )
        .route(
            "/lessons/{lesson_id}/questions",
            get(list_questions).post(create_question),
        )
        .route(
            "/courses/{course_id}/materials",
            get(list_materials).post(create_material),
        )
        .route("/materials/{material_id}", delete(delete_material))
}

async fn authorize_course_manager(
    state: &ApiState,
    auth_user: &AuthUser,
    course_id: Uuid,
) -> Result<(), ApiError> {
    let owner = course_owner(&state.pool, course_id).await?;
    authorize(
        auth_user,
        Action::ManageCourse {
            instructor_id: owner.instructor_id,
        },
    )
}

async fn load_section(state: &ApiState, section_id: Uuid) -> Result<CurriculumSection, ApiError> {
    catalog_repo::find_section(&state.pool, section_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Section not found".to_string()))
}

async fn load_lesson(state: &ApiState, lesson_id: Uuid) -> Result<Lesson, ApiError> {
    catalog_repo::find_lesson(&state.pool, lesson_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Lesson not found".to_string()))
}

/// A lesson may only be filed under a section of its own course.
async fn ensure_section_in_course(
    state: &ApiState,
    section_id: Option<Uuid>,
    course_id: Uuid,
) -> Result<(), ApiError> {
    let Some(section_id) = section_id else {
        return Ok(());
    };

    match catalog_repo::find_section(&state.pool, section_id).await? {
        Some(section) if section.course_id == course_id => Ok(()),
        Some(_) => Err(ApiError::Validation(
            "Section does not belong to this course".to_string(),
        )),
        None => Err(ApiError::Validation("Section does not exist".to_string())),
    }
}

fn sequence_clash(err: sqlx::Error) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::Conflict(
            "A lesson with this sequence number already exists in this course".to_string(),
        )
    } else {
        ApiError::Database(err)
    }
}

/// Recompute the progress of every enrollment in the course.
async fn refresh_progress_after_lesson_write(
    conn: &mut PgConnection,
    course_id: Uuid,
) -> Result<(), ApiError> {
    let refreshed = enrollment_repo::refresh_course_progress(conn, course_id).await?;
    tracing::debug!(%course_id, refreshed, "Recomputed enrollment progress");
    Ok(())
}

// --- Sections ---

async fn list_sections(
    State(state): State<ApiState>,
    Query(scope): Query<CourseScope>,
) -> Result<impl IntoResponse, ApiError> {
    let sections = catalog_repo::list_sections(&state.pool, scope.course).await?;
    Ok(success("Sections retrieved successfully", sections))
}

async fn create_section(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<SectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_course_manager(&state, &auth_user, req.course_id).await?;

    let section = catalog_repo::create_section(&state.pool, req.course_id, req.title.trim()).await?;
    Ok(created("Section created successfully", section))
}

async fn get_section(
    State(state): State<ApiState>,
    Path(section_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let section = load_section(&state, section_id).await?;
    Ok(success("Section retrieved successfully", section))
}

async fn update_section(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(section_id): Path<Uuid>,
    ValidJson(req): ValidJson<SectionUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let section = load_section(&state, section_id).await?;
    authorize_course_manager(&state, &auth_user, section.course_id).await?;

    let section = catalog_repo::rename_section(&state.pool, section_id, req.title.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound("Section not found".to_string()))?;

    Ok(success("Section updated successfully", section))
}

/// Deleting a section deletes its lessons as well.
async fn delete_section(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(section_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let section = load_section(&state, section_id).await?;
    authorize_course_manager(&state, &auth_user, section.course_id).await?;

    let mut tx = state.pool.begin().await?;
    if !catalog_repo::delete_section(&mut *tx, section_id).await? {
        return Err(ApiError::NotFound("Section not found".to_string()));
    }
    refresh_progress_after_lesson_write(&mut tx, section.course_id).await?;
    tx.commit().await?;

    Ok(success("Section deleted successfully", json!({ "id": section_id })))
}

// --- Lessons ---

async fn list_lessons(
    State(state): State<ApiState>,
    Query(params): Query<PageParams>,
    Query(scope): Query<CourseScope>,
    uri: Uri,
) -> Result<Json<Page<Lesson>>, ApiError> {
    let count = catalog_repo::count_lessons(&state.pool, scope.course).await?;
    let lessons = catalog_repo::list_lessons(
        &state.pool,
        scope.course,
        params.page_size(),
        params.offset(),
    )
    .await?;

    Ok(Json(Page::new(lessons, count, &params, &uri)?))
}

async fn create_lesson(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    ValidJson(req): ValidJson<LessonRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize_course_manager(&state, &auth_user, req.course_id).await?;
    let input = req.to_input()?;
    ensure_section_in_course(&state, input.section_id, req.course_id).await?;

    let mut tx = state.pool.begin().await?;

    // Serializes appends so two writers never pick the same number
    if !catalog_repo::lock_course(&mut tx, req.course_id).await? {
        return Err(ApiError::NotFound("Course not found".to_string()));
    }

    let sequence_number = match req.sequence_number {
        Some(explicit) => explicit,
        None => next_sequence_number(
            catalog_repo::max_sequence_number(&mut *tx, req.course_id).await?,
        )
        .ok_or_else(|| {
            ApiError::Conflict(
                "No sequence number left for this course, renumber its lessons first".to_string(),
            )
        })?,
    };

    let lesson = catalog_repo::insert_lesson(&mut *tx, req.course_id, sequence_number, &input)
        .await
        .map_err(sequence_clash)?;

    refresh_progress_after_lesson_write(&mut tx, req.course_id).await?;
    tx.commit().await?;

    tracing::info!(lesson_id = %lesson.id, course_id = %lesson.course_id, sequence_number, "Lesson created");

    Ok(created("Lesson created successfully", lesson))
}

async fn get_lesson(
    State(state): State<ApiState>,
    Path(lesson_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let lesson = load_lesson(&state, lesson_id).await?;
    Ok(success("Lesson retrieved successfully", lesson))
}

async fn update_lesson(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(lesson_id): Path<Uuid>,
    ValidJson(req): ValidJson<LessonUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = load_lesson(&state, lesson_id).await?;
    let course_id = current.course_id;
    authorize_course_manager(&state, &auth_user, course_id).await?;

    let (input, sequence_number) = req.merge(current)?;
    ensure_section_in_course(&state, input.section_id, course_id).await?;

    let mut tx = state.pool.begin().await?;
    catalog_repo::lock_course(&mut tx, course_id).await?;

    let lesson = catalog_repo::update_lesson(&mut *tx, lesson_id, sequence_number, &input)
        .await
        .map_err(sequence_clash)?
        .ok_or_else(|| ApiError::NotFound("Lesson not found".to_string()))?;

    refresh_progress_after_lesson_write(&mut tx, course_id).await?;
    tx.commit().await?;

    Ok(success("Lesson updated successfully", lesson))
}

async fn delete_lesson(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(lesson_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let lesson = load_lesson(&state, lesson_id).await?;
    authorize_course_manager(&state, &auth_user, lesson.course_id).await?;

    let mut tx = state.pool.begin().await?;
    if !catalog_repo::delete_lesson(&mut *tx, lesson_id).await? {
        return Err(ApiError::NotFound("Lesson not found".to_string()));
    }
    refresh_progress_after_lesson_write(&mut tx, lesson.course_id).await?;
    tx.commit().await?;

    tracing::info!(%lesson_id, course_id = %lesson.course_id, "Lesson deleted");

    Ok(success("Lesson deleted successfully", json!({ "id": lesson_id })))
}

// --- Lesson questions ---

async fn list_questions(
    _auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(lesson_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    load_lesson(&state, lesson_id).await?;

    let questions = catalog_repo::list_questions(&state.pool, lesson_id).await?;
    Ok(success("Questions retrieved successfully", questions))
}

async fn create_question(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(lesson_id): Path<Uuid>,
    ValidJson(req): ValidJson<QuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_text("Description", &req.description, QUESTION_MAX_LENGTH)?;
    load_lesson(&state, lesson_id).await?;

    let question = catalog_repo::create_question(
        &state.pool,
        lesson_id,
        auth_user.user_id,
        req.description.trim(),
    )
    .await?;

    Ok(created("Question posted successfully", question))
}

// --- Materials ---

async fn list_materials(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = course_owner(&state.pool, course_id).await?;
    let is_enrolled =
        enrollment_repo::is_actively_enrolled(&state.pool, auth_user.user_id, course_id).await?;

    authorize(
        &auth_user,
        Action::ViewMaterials {
            instructor_id: owner.instructor_id,
            is_enrolled,
        },
    )?;

    let materials = catalog_repo::list_materials(&state.pool, course_id).await?;
    Ok(success("Materials retrieved successfully", materials))
}

async fn create_material(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(course_id): Path<Uuid>,
    ValidJson(req): ValidJson<MaterialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.file_url.trim().is_empty() {
        return Err(ApiError::Validation("File URL is required".to_string()));
    }
    validate_url("File URL", &req.file_url)?;
    authorize_course_manager(&state, &auth_user, course_id).await?;

    let material = catalog_repo::create_material(
        &state.pool,
        course_id,
        &NewMaterial {
            title: req.title.trim(),
            description: &req.description,
            file_type: req.file_type.trim(),
            file_url: &req.file_url,
        },
    )
    .await?;

    Ok(created("Material uploaded successfully", material))
}

async fn delete_material(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(material_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = catalog_repo::find_material_course(&state.pool, material_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Material not found".to_string()))?;
    authorize_course_manager(&state, &auth_user, course_id).await?;

    if !catalog_repo::delete_material(&state.pool, material_id).await? {
        return Err(ApiError::NotFound("Material not found".to_string()));
    }

    Ok(success("Material deleted successfully", json!({ "id": material_id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_clash_passes_through_other_errors() {
        assert!(matches!(
            sequence_clash(sqlx::Error::RowNotFound),
            ApiError::Database(_)
        ));
    }
}

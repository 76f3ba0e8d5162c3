//! Categories, courses and their curriculum: sections, lessons, lesson
//! questions and downloadable materials.

pub mod curriculum;
pub mod model;
pub mod routes;

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use lms_db::{models::CourseOwner, repositories::catalog as catalog_repo};

use crate::error::ApiError;

pub use routes::routes;

/// Load the ownership facts of a course, or `404` when it does not exist.
pub(crate) async fn course_owner<'e, E>(executor: E, course_id: Uuid) -> Result<CourseOwner, ApiError>
where
    E: Executor<'e, Database = Postgres>,
{
    catalog_repo::find_course_owner(executor, course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))
}

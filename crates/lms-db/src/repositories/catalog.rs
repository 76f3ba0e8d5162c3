use sqlx::{Executor, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{
    Category, Course, CourseFilter, CourseInput, CourseOwner, CoursePricing, CurriculumSection,
    Lesson, LessonInput, LessonQuestion, Material, TeacherStats,
};

// --- Categories ---

pub async fn list_categories<'e, E>(
    executor: E,
    limit: i64,
    offset: i64,
) -> Result<Vec<Category>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, title, is_active, created_at, updated_at
            FROM categories
            ORDER BY title, id
            LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

pub async fn count_categories<'e, E>(executor: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM categories")
        .fetch_one(executor)
        .await
}

pub async fn create_category<'e, E>(
    executor: E,
    title: &str,
    is_active: bool,
) -> Result<Category, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO categories (title, is_active)
            VALUES ($1, $2)
            RETURNING id, title, is_active, created_at, updated_at
        "#,
    )
    .bind(title)
    .bind(is_active)
    .fetch_one(executor)
    .await
}

pub async fn category_exists<'e, E>(executor: E, category_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
        .bind(category_id)
        .fetch_one(executor)
        .await
}

// --- Courses ---

const COURSE_SELECT: &str = r#"
    SELECT c.id, c.title, c.description, c.banner_url, c.price, c.discount_price, c.duration,
           c.rating, c.reviews, c.students, c.start_date, c.is_featured, c.level,
           c.category_id, cat.title AS category_title,
           c.instructor_id, COALESCE(NULLIF(u.full_name, ''), u.username) AS instructor_name,
           c.what_you_will_learn, c.requirements, c.created_at, c.updated_at
    FROM courses c
    JOIN categories cat ON cat.id = c.category_id
    JOIN users u ON u.id = c.instructor_id
"#;

/// Escape `LIKE` wildcards so user input only matches literally.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_course_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &CourseFilter) {
    builder.push(" WHERE TRUE");

    if let Some(category_id) = filter.category_id {
        builder.push(" AND c.category_id = ").push_bind(category_id);
    }
    if let Some(level) = filter.level {
        builder.push(" AND c.level = ").push_bind(level);
    }
    if let Some(is_featured) = filter.is_featured {
        builder.push(" AND c.is_featured = ").push_bind(is_featured);
    }
    if let Some(instructor_id) = filter.instructor_id {
        builder.push(" AND c.instructor_id = ").push_bind(instructor_id);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search.trim());
        builder
            .push(" AND (c.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR c.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub async fn list_courses<'e, E>(
    executor: E,
    filter: &CourseFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Course>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut builder = QueryBuilder::new(COURSE_SELECT);
    push_course_filters(&mut builder, filter);
    builder
        .push(" ORDER BY c.created_at DESC, c.id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    builder.build_query_as().fetch_all(executor).await
}

pub async fn count_courses<'e, E>(executor: E, filter: &CourseFilter) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM courses c");
    push_course_filters(&mut builder, filter);

    builder.build_query_scalar().fetch_one(executor).await
}

pub async fn find_course<'e, E>(executor: E, course_id: Uuid) -> Result<Option<Course>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut builder = QueryBuilder::new(COURSE_SELECT);
    builder.push(" WHERE c.id = ").push_bind(course_id);

    builder.build_query_as().fetch_optional(executor).await
}

pub async fn find_course_owner<'e, E>(
    executor: E,
    course_id: Uuid,
) -> Result<Option<CourseOwner>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as("SELECT id, instructor_id FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_optional(executor)
        .await
}

pub async fn find_course_pricing<'e, E>(
    executor: E,
    course_id: Uuid,
) -> Result<Option<CoursePricing>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as("SELECT id, title, price, discount_price FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_optional(executor)
        .await
}

/// Lock a course row so concurrent writers of its lessons are serialized.
pub async fn lock_course(conn: &mut PgConnection, course_id: Uuid) -> Result<bool, sqlx::Error> {
    let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM courses WHERE id = $1 FOR UPDATE")
        .bind(course_id)
        .fetch_optional(conn)
        .await?;
    Ok(locked.is_some())
}

pub async fn create_course<'e, E>(
    executor: E,
    instructor_id: Uuid,
    input: &CourseInput,
) -> Result<Uuid, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            INSERT INTO courses (
                title, description, banner_url, price, discount_price, duration, start_date,
                is_featured, level, category_id, instructor_id, what_you_will_learn, requirements
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
        "#,
    )
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.banner_url)
    .bind(input.price)
    .bind(input.discount_price)
    .bind(&input.duration)
    .bind(input.start_date)
    .bind(input.is_featured)
    .bind(input.level)
    .bind(input.category_id)
    .bind(instructor_id)
    .bind(&input.what_you_will_learn)
    .bind(&input.requirements)
    .fetch_one(executor)
    .await
}

/// Overwrite the writable fields of a course. Derived columns are left untouched.
pub async fn update_course<'e, E>(
    executor: E,
    course_id: Uuid,
    input: &CourseInput,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE courses
            SET title = $1, description = $2, banner_url = $3, price = $4, discount_price = $5,
                duration = $6, start_date = $7, is_featured = $8, level = $9, category_id = $10,
                what_you_will_learn = $11, requirements = $12, updated_at = NOW()
            WHERE id = $13
        "#,
    )
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.banner_url)
    .bind(input.price)
    .bind(input.discount_price)
    .bind(&input.duration)
    .bind(input.start_date)
    .bind(input.is_featured)
    .bind(input.level)
    .bind(input.category_id)
    .bind(&input.what_you_will_learn)
    .bind(&input.requirements)
    .bind(course_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_course<'e, E>(executor: E, course_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(course_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn teacher_stats<'e, E>(executor: E, instructor_id: Uuid) -> Result<TeacherStats, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT COUNT(*) AS total_courses,
                   COALESCE(SUM(students), 0)::BIGINT AS total_students,
                   COUNT(*) FILTER (WHERE is_featured) AS total_featured_courses
            FROM courses
            WHERE instructor_id = $1
        "#,
    )
    .bind(instructor_id)
    .fetch_one(executor)
    .await
}

// --- Curriculum sections ---

pub async fn list_sections<'e, E>(
    executor: E,
    course_id: Option<Uuid>,
) -> Result<Vec<CurriculumSection>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, course_id, title, created_at, updated_at
            FROM curriculum_sections
            WHERE $1::uuid IS NULL OR course_id = $1
            ORDER BY created_at, id
        "#,
    )
    .bind(course_id)
    .fetch_all(executor)
    .await
}

pub async fn find_section<'e, E>(
    executor: E,
    section_id: Uuid,
) -> Result<Option<CurriculumSection>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, course_id, title, created_at, updated_at
            FROM curriculum_sections
            WHERE id = $1
        "#,
    )
    .bind(section_id)
    .fetch_optional(executor)
    .await
}

pub async fn create_section<'e, E>(
    executor: E,
    course_id: Uuid,
    title: &str,
) -> Result<CurriculumSection, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO curriculum_sections (course_id, title)
            VALUES ($1, $2)
            RETURNING id, course_id, title, created_at, updated_at
        "#,
    )
    .bind(course_id)
    .bind(title)
    .fetch_one(executor)
    .await
}

pub async fn rename_section<'e, E>(
    executor: E,
    section_id: Uuid,
    title: &str,
) -> Result<Option<CurriculumSection>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            UPDATE curriculum_sections
            SET title = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, course_id, title, created_at, updated_at
        "#,
    )
    .bind(title)
    .bind(section_id)
    .fetch_optional(executor)
    .await
}

pub async fn delete_section<'e, E>(executor: E, section_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM curriculum_sections WHERE id = $1")
        .bind(section_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

// --- Lessons ---

const LESSON_COLUMNS: &str = "id, course_id, section_id, title, description, video_url, duration, \
     is_preview, is_active, sequence_number, created_at, updated_at";

pub async fn list_lessons<'e, E>(
    executor: E,
    course_id: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Lesson>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
            SELECT {LESSON_COLUMNS}
            FROM lessons
            WHERE $1::uuid IS NULL OR course_id = $1
            ORDER BY course_id, sequence_number
            LIMIT $2 OFFSET $3
        "#
    ))
    .bind(course_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

pub async fn count_lessons<'e, E>(executor: E, course_id: Option<Uuid>) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM lessons WHERE $1::uuid IS NULL OR course_id = $1")
        .bind(course_id)
        .fetch_one(executor)
        .await
}

/// All lessons of a course in curriculum order.
pub async fn list_course_lessons<'e, E>(
    executor: E,
    course_id: Uuid,
) -> Result<Vec<Lesson>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {LESSON_COLUMNS} FROM lessons WHERE course_id = $1 ORDER BY sequence_number"
    ))
    .bind(course_id)
    .fetch_all(executor)
    .await
}

pub async fn find_lesson<'e, E>(executor: E, lesson_id: Uuid) -> Result<Option<Lesson>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1"))
        .bind(lesson_id)
        .fetch_optional(executor)
        .await
}

pub async fn max_sequence_number<'e, E>(executor: E, course_id: Uuid) -> Result<Option<i32>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("SELECT MAX(sequence_number) FROM lessons WHERE course_id = $1")
        .bind(course_id)
        .fetch_one(executor)
        .await
}

pub async fn insert_lesson<'e, E>(
    executor: E,
    course_id: Uuid,
    sequence_number: i32,
    input: &LessonInput,
) -> Result<Lesson, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
            INSERT INTO lessons (
                course_id, section_id, title, description, video_url, duration,
                is_preview, is_active, sequence_number
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {LESSON_COLUMNS}
        "#
    ))
    .bind(course_id)
    .bind(input.section_id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.video_url)
    .bind(&input.duration)
    .bind(input.is_preview)
    .bind(input.is_active)
    .bind(sequence_number)
    .fetch_one(executor)
    .await
}

pub async fn update_lesson<'e, E>(
    executor: E,
    lesson_id: Uuid,
    sequence_number: i32,
    input: &LessonInput,
) -> Result<Option<Lesson>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
            UPDATE lessons
            SET section_id = $1, title = $2, description = $3, video_url = $4, duration = $5,
                is_preview = $6, is_active = $7, sequence_number = $8, updated_at = NOW()
            WHERE id = $9
            RETURNING {LESSON_COLUMNS}
        "#
    ))
    .bind(input.section_id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.video_url)
    .bind(&input.duration)
    .bind(input.is_preview)
    .bind(input.is_active)
    .bind(sequence_number)
    .bind(lesson_id)
    .fetch_optional(executor)
    .await
}

pub async fn delete_lesson<'e, E>(executor: E, lesson_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
        .bind(lesson_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

// --- Materials ---

pub async fn list_materials<'e, E>(executor: E, course_id: Uuid) -> Result<Vec<Material>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, course_id, title, description, file_type, file_url, is_active, created_at
            FROM materials
            WHERE course_id = $1 AND is_active = TRUE
            ORDER BY created_at, id
        "#,
    )
    .bind(course_id)
    .fetch_all(executor)
    .await
}

pub struct NewMaterial<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub file_type: &'a str,
    pub file_url: &'a str,
}

pub async fn create_material<'e, E>(
    executor: E,
    course_id: Uuid,
    material: &NewMaterial<'_>,
) -> Result<Material, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO materials (course_id, title, description, file_type, file_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, course_id, title, description, file_type, file_url, is_active, created_at
        "#,
    )
    .bind(course_id)
    .bind(material.title)
    .bind(material.description)
    .bind(material.file_type)
    .bind(material.file_url)
    .fetch_one(executor)
    .await
}

/// Course a material belongs to.
pub async fn find_material_course<'e, E>(
    executor: E,
    material_id: Uuid,
) -> Result<Option<Uuid>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar("SELECT course_id FROM materials WHERE id = $1")
        .bind(material_id)
        .fetch_optional(executor)
        .await
}

pub async fn delete_material<'e, E>(executor: E, material_id: Uuid) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM materials WHERE id = $1")
        .bind(material_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

// --- Lesson questions ---

pub async fn list_questions<'e, E>(
    executor: E,
    lesson_id: Uuid,
) -> Result<Vec<LessonQuestion>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT q.id, q.lesson_id, q.author_id, u.username AS author_name, q.description,
                   q.is_active, q.created_at, q.updated_at
            FROM lesson_questions q
            JOIN users u ON u.id = q.author_id
            WHERE q.lesson_id = $1 AND q.is_active = TRUE
            ORDER BY q.created_at, q.id
        "#,
    )
    .bind(lesson_id)
    .fetch_all(executor)
    .await
}

pub async fn create_question<'e, E>(
    executor: E,
    lesson_id: Uuid,
    author_id: Uuid,
    description: &str,
) -> Result<LessonQuestion, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            WITH inserted AS (
                INSERT INTO lesson_questions (lesson_id, author_id, description)
                VALUES ($1, $2, $3)
                RETURNING id, lesson_id, author_id, description, is_active, created_at, updated_at
            )
            SELECT i.id, i.lesson_id, i.author_id, u.username AS author_name, i.description,
                   i.is_active, i.created_at, i.updated_at
            FROM inserted i
            JOIN users u ON u.id = i.author_id
        "#,
    )
    .bind(lesson_id)
    .bind(author_id)
    .bind(description)
    .fetch_one(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("c:\\x"), "%c:\\\\x%");
    }

    #[test]
    fn test_course_filters_bind_only_present_values() {
        let filter = CourseFilter {
            level: Some(crate::models::CourseLevel::Advanced),
            search: Some("  ".to_string()),
            ..CourseFilter::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM courses c");
        push_course_filters(&mut builder, &filter);

        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM courses c WHERE TRUE AND c.level = $1"
        );
    }
}

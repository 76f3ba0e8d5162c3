use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use lms_aggregate::effective_price;
use lms_db::models::{
    Course, CourseFilter, CourseInput, CourseLevel, CurriculumSection, Lesson, LessonInput,
    TeacherStats,
};

use crate::{error::ApiError, validation::validate_url};

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Course listing filters. `all` or an empty value disables a filter.
#[derive(Debug, Default, Deserialize)]
pub struct CourseQuery {
    pub category: Option<String>,
    pub level: Option<String>,
    pub is_featured: Option<String>,
    pub search: Option<String>,
}

fn active_filter(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

fn parse_level(value: &str) -> Option<CourseLevel> {
    match value.to_ascii_lowercase().as_str() {
        "beginner" => Some(CourseLevel::Beginner),
        "intermediate" => Some(CourseLevel::Intermediate),
        "advanced" => Some(CourseLevel::Advanced),
        _ => None,
    }
}

impl CourseQuery {
    pub fn into_filter(self) -> Result<CourseFilter, ApiError> {
        let category_id = active_filter(self.category.as_deref())
            .map(|c| {
                c.parse::<Uuid>()
                    .map_err(|_| ApiError::Validation("Invalid category id".to_string()))
            })
            .transpose()?;

        let level = active_filter(self.level.as_deref())
            .map(|l| {
                parse_level(l).ok_or_else(|| {
                    ApiError::Validation(
                        "Level must be one of Beginner, Intermediate, Advanced".to_string(),
                    )
                })
            })
            .transpose()?;

        let is_featured = active_filter(self.is_featured.as_deref())
            .map(|f| match f.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(ApiError::Validation(
                    "is_featured must be true or false".to_string(),
                )),
            })
            .transpose()?;

        Ok(CourseFilter {
            category_id,
            level,
            is_featured,
            instructor_id: None,
            search: active_filter(self.search.as_deref()).map(str::to_string),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CourseRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub banner_url: Option<String>,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    #[validate(range(min = 0.0, message = "Discount price cannot be negative"))]
    pub discount_price: Option<f64>,
    #[validate(length(max = 100, message = "Duration must be at most 100 characters"))]
    pub duration: Option<String>,
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub level: CourseLevel,
    #[serde(alias = "category")]
    pub category_id: Uuid,
    #[serde(default)]
    pub what_you_will_learn: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

impl CourseRequest {
    pub fn into_input(self) -> Result<CourseInput, ApiError> {
        if let Some(banner) = self.banner_url.as_deref() {
            validate_url("Banner URL", banner)?;
        }

        Ok(CourseInput {
            title: self.title.trim().to_string(),
            description: self.description,
            banner_url: self.banner_url.filter(|b| !b.is_empty()),
            price: self.price,
            discount_price: self.discount_price,
            duration: self.duration,
            start_date: self.start_date,
            is_featured: self.is_featured,
            level: self.level,
            category_id: self.category_id,
            what_you_will_learn: non_blank(self.what_you_will_learn),
            requirements: non_blank(self.requirements),
        })
    }
}

fn non_blank(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// One curriculum section with its lessons in sequence order
#[derive(Debug, Serialize)]
pub struct CurriculumEntry {
    #[serde(flatten)]
    pub section: CurriculumSection,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub effective_price: f64,
    pub curriculum: Vec<CurriculumEntry>,
    /// Lessons not attached to any section
    pub lessons: Vec<Lesson>,
}

impl CourseDetail {
    /// Group the active lessons under their sections.
    pub fn new(course: Course, sections: Vec<CurriculumSection>, lessons: Vec<Lesson>) -> Self {
        let mut curriculum: Vec<CurriculumEntry> = sections
            .into_iter()
            .map(|section| CurriculumEntry {
                section,
                lessons: Vec::new(),
            })
            .collect();
        let mut loose = Vec::new();

        for lesson in lessons.into_iter().filter(|l| l.is_active) {
            let entry = lesson
                .section_id
                .and_then(|id| curriculum.iter_mut().find(|e| e.section.id == id));
            match entry {
                Some(entry) => entry.lessons.push(lesson),
                None => loose.push(lesson),
            }
        }

        Self {
            effective_price: effective_price(course.price, course.discount_price),
            course,
            curriculum,
            lessons: loose,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeacherDashboard {
    #[serde(flatten)]
    pub stats: TeacherStats,
    pub courses: Vec<Course>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CourseScope {
    pub course: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SectionRequest {
    #[serde(alias = "course")]
    pub course_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SectionUpdateRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LessonRequest {
    #[serde(alias = "course")]
    pub course_id: Uuid,
    #[serde(alias = "section")]
    pub section_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub video_url: Option<String>,
    #[validate(length(max = 20, message = "Duration must be at most 20 characters"))]
    pub duration: Option<String>,
    #[serde(default)]
    pub is_preview: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[validate(range(
        min = 1,
        max = 1_000_000,
        message = "Sequence number must be between 1 and 1000000"
    ))]
    pub sequence_number: Option<i32>,
}

impl LessonRequest {
    pub fn to_input(&self) -> Result<LessonInput, ApiError> {
        if let Some(url) = self.video_url.as_deref() {
            validate_url("Video URL", url)?;
        }

        Ok(LessonInput {
            section_id: self.section_id,
            title: self.title.trim().to_string(),
            description: self.description.clone(),
            video_url: self.video_url.clone().filter(|v| !v.is_empty()),
            duration: self.duration.clone(),
            is_preview: self.is_preview,
            is_active: self.is_active,
        })
    }
}

/// Tells an explicit `null` (`Some(None)`) apart from an absent field (`None`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial lesson update. Absent fields keep their current value; a `null`
/// section moves the lesson out of its section.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct LessonUpdateRequest {
    #[serde(alias = "section", default, deserialize_with = "nullable")]
    pub section_id: Option<Option<Uuid>>,
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    #[validate(length(max = 20, message = "Duration must be at most 20 characters"))]
    pub duration: Option<String>,
    pub is_preview: Option<bool>,
    pub is_active: Option<bool>,
    #[validate(range(
        min = 1,
        max = 1_000_000,
        message = "Sequence number must be between 1 and 1000000"
    ))]
    pub sequence_number: Option<i32>,
}

impl LessonUpdateRequest {
    /// Merge onto `current`, returning the new fields and sequence number.
    pub fn merge(self, current: Lesson) -> Result<(LessonInput, i32), ApiError> {
        if let Some(url) = self.video_url.as_deref() {
            validate_url("Video URL", url)?;
        }

        let input = LessonInput {
            section_id: self.section_id.unwrap_or(current.section_id),
            title: self
                .title
                .map_or(current.title, |t| t.trim().to_string()),
            description: self.description.unwrap_or(current.description),
            video_url: match self.video_url {
                Some(url) if url.is_empty() => None,
                Some(url) => Some(url),
                None => current.video_url,
            },
            duration: self.duration.or(current.duration),
            is_preview: self.is_preview.unwrap_or(current.is_preview),
            is_active: self.is_active.unwrap_or(current.is_active),
        };

        Ok((input, self.sequence_number.unwrap_or(current.sequence_number)))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuestionRequest {
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MaterialRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 100, message = "File type must be 1-100 characters"))]
    pub file_type: String,
    pub file_url: String,
}

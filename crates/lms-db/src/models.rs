use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role, mirrored by the `user_role` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

/// Course difficulty, mirrored by the `course_level` Postgres enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "course_level")]
pub enum CourseLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

// --- Users ---

/// Public view of a user
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub mobile_no: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to check a login attempt
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_verified: bool,
}

/// Pending one-time passcode of an unverified user
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserOtp {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_verified: bool,
    pub otp_hash: Option<String>,
    pub otp_created_at: Option<DateTime<Utc>>,
}

/// Minimal identity used by the request extractor
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserIdentity {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
}

/// A refresh token removed from storage on use
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConsumedRefreshToken {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

// --- Catalog ---

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub title: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Course row joined with its category title and instructor name
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub banner_url: Option<String>,
    pub price: f64,
    pub discount_price: Option<f64>,
    pub duration: Option<String>,
    /// Mean of approved review ratings, maintained by the review aggregate
    pub rating: f64,
    /// Number of approved reviews
    pub reviews: i32,
    /// Number of enrollments
    pub students: i32,
    pub start_date: Option<NaiveDate>,
    pub is_featured: bool,
    pub level: CourseLevel,
    pub category_id: Uuid,
    pub category_title: String,
    pub instructor_id: Uuid,
    pub instructor_name: String,
    pub what_you_will_learn: Vec<String>,
    pub requirements: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable course fields
#[derive(Debug, Clone, Deserialize)]
pub struct CourseInput {
    pub title: String,
    pub description: String,
    pub banner_url: Option<String>,
    pub price: f64,
    pub discount_price: Option<f64>,
    pub duration: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub is_featured: bool,
    pub level: CourseLevel,
    pub category_id: Uuid,
    pub what_you_will_learn: Vec<String>,
    pub requirements: Vec<String>,
}

/// Filters accepted by the course listing
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub category_id: Option<Uuid>,
    pub level: Option<CourseLevel>,
    pub is_featured: Option<bool>,
    pub instructor_id: Option<Uuid>,
    pub search: Option<String>,
}

/// Ownership facts of a course used by access checks
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct CourseOwner {
    pub id: Uuid,
    pub instructor_id: Uuid,
}

/// Price facts of a course used by the payment flow
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CoursePricing {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub discount_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CurriculumSection {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Lesson {
    pub id: Uuid,
    pub course_id: Uuid,
    pub section_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub video_url: Option<String>,
    pub duration: Option<String>,
    pub is_preview: bool,
    pub is_active: bool,
    pub sequence_number: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable lesson fields
#[derive(Debug, Clone)]
pub struct LessonInput {
    pub section_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub video_url: Option<String>,
    pub duration: Option<String>,
    pub is_preview: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Material {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub file_type: String,
    pub file_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LessonQuestion {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-instructor totals shown on the teacher dashboard
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TeacherStats {
    pub total_courses: i64,
    pub total_students: i64,
    pub total_featured_courses: i64,
}

// --- Enrollments ---

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub is_active: bool,
    pub price: f64,
    /// Whole percentage of active lessons completed
    pub progress: i32,
    pub is_completed: bool,
    pub payment_currency: Option<String>,
    pub payment_status: Option<String>,
    pub payment_intent_id: Option<String>,
    /// Amount charged in minor currency units
    pub payment_amount: Option<i64>,
    pub total_mark: i32,
    pub is_certificate_ready: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment facts recorded on a new enrollment
#[derive(Debug, Clone, Default)]
pub struct EnrollmentPayment {
    pub price: f64,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub intent_id: Option<String>,
    pub amount: Option<i64>,
}

/// Enrollment joined with the course title for listings
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EnrollmentSummary {
    pub id: Uuid,
    pub course_id: Uuid,
    pub course_title: String,
    pub course_banner_url: Option<String>,
    pub progress: i32,
    pub is_completed: bool,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

/// Lesson counts a progress value is derived from
#[derive(Debug, Clone, Copy, Default, sqlx::FromRow)]
pub struct LessonCounts {
    pub active: i64,
    pub completed: i64,
}

/// Active lesson with the caller's completion flag
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LessonProgress {
    pub lesson_id: Uuid,
    pub title: String,
    pub sequence_number: i32,
    pub is_completed: bool,
}

// --- Reviews ---

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub rating: i16,
    pub comment: String,
    pub is_approved: bool,
    pub has_attended: bool,
    pub helpful_count: i32,
    pub not_helpful_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub review_id: Uuid,
    pub responder_id: Uuid,
    pub responder_name: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Approved-rating totals a course rating is derived from
#[derive(Debug, Clone, Copy, Default, sqlx::FromRow)]
pub struct RatingTotals {
    pub sum: i64,
    pub count: i64,
}

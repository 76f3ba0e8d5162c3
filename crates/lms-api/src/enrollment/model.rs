use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use lms_db::models::{CoursePricing, LessonProgress};

/// Course facts shown on the checkout page
#[derive(Debug, Serialize)]
pub struct CheckoutCourse {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub discount_price: Option<f64>,
    pub effective_price: f64,
}

impl From<CoursePricing> for CheckoutCourse {
    fn from(course: CoursePricing) -> Self {
        Self {
            effective_price: lms_aggregate::effective_price(course.price, course.discount_price),
            id: course.id,
            title: course.title,
            price: course.price,
            discount_price: course.discount_price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentDetails {
    pub already_enrolled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Minor currency units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    pub course: CheckoutCourse,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProcessPaymentRequest {
    #[validate(length(min = 1, max = 255, message = "Payment intent id is required"))]
    pub payment_intent_id: String,
    #[serde(alias = "course")]
    pub course_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentReceipt {
    pub enrollment_id: Uuid,
    pub amount_paid: f64,
}

/// Body returned by the lesson completion endpoints
#[derive(Debug, Serialize)]
pub struct CompletionStatus {
    pub detail: &'static str,
    pub progress: i32,
    pub is_completed: bool,
    pub lesson_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_course_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_lessons: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
pub struct CourseProgress {
    pub course_id: Uuid,
    pub enrollment_id: Uuid,
    pub total_lessons: i64,
    pub completed_lessons: i64,
    pub progress: i32,
    pub is_completed: bool,
    pub lessons: Vec<LessonProgress>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_course_applies_discount() {
        let course = CheckoutCourse::from(CoursePricing {
            id: Uuid::nil(),
            title: "Rust".to_string(),
            price: 80.0,
            discount_price: Some(60.0),
        });

        assert_eq!(course.effective_price, 60.0);
    }

    #[test]
    fn test_already_enrolled_details_omit_intent_fields() {
        let details = PaymentDetails {
            already_enrolled: true,
            client_secret: None,
            payment_intent_id: None,
            currency: None,
            amount: None,
            course: CheckoutCourse {
                id: Uuid::nil(),
                title: "Rust".to_string(),
                price: 10.0,
                discount_price: None,
                effective_price: 10.0,
            },
        };

        let value = serde_json::to_value(&details).expect("details serialize");
        assert_eq!(value["already_enrolled"], true);
        assert!(value.get("client_secret").is_none());
        assert_eq!(value["course"]["title"], "Rust");
    }

    #[test]
    fn test_unmarked_completion_status_shape() {
        let status = CompletionStatus {
            detail: "Lesson not marked as completed",
            progress: 25,
            is_completed: false,
            lesson_id: Uuid::nil(),
            is_course_completed: None,
            completed_lessons: None,
        };

        let value = serde_json::to_value(&status).expect("status serializes");
        assert_eq!(value["progress"], 25);
        assert!(value.get("completed_lessons").is_none());
    }
}

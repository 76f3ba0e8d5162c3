use serde::{Deserialize, Serialize};
use validator::Validate;

use lms_aggregate::{RATING_RANGE, VoteTally, is_valid_rating};
use lms_db::models::{Review, ReviewResponse};

use crate::{error::ApiError, validation::validate_text};

pub const COMMENT_MAX_LENGTH: usize = 5000;

const fn default_true() -> bool {
    true
}

pub fn check_rating(rating: i16) -> Result<(), ApiError> {
    if is_valid_rating(rating) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Rating must be between {} and {}",
            RATING_RANGE.start(),
            RATING_RANGE.end()
        )))
    }
}

pub fn check_comment(comment: &str) -> Result<(), ApiError> {
    validate_text("Comment", comment, COMMENT_MAX_LENGTH)
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    pub rating: i16,
    pub comment: String,
    #[serde(default = "default_true")]
    pub has_attended: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReviewUpdateRequest {
    pub rating: Option<i16>,
    pub comment: Option<String>,
    pub has_attended: Option<bool>,
}

impl ReviewUpdateRequest {
    pub fn check(&self) -> Result<(), ApiError> {
        if let Some(rating) = self.rating {
            check_rating(rating)?;
        }
        if let Some(comment) = self.comment.as_deref() {
            check_comment(comment)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApprovalRequest {
    pub is_approved: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResponseRequest {
    pub comment: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VoteRequest {
    pub is_helpful: bool,
}

/// A review with the instructor's response, if any
#[derive(Debug, Serialize)]
pub struct ReviewDetail {
    #[serde(flatten)]
    pub review: Review,
    pub response: Option<ReviewResponse>,
}

#[derive(Debug, Serialize)]
pub struct VoteResult {
    pub review_id: uuid::Uuid,
    pub is_helpful: bool,
    pub helpful_count: i32,
    pub not_helpful_count: i32,
}

impl VoteResult {
    pub const fn new(review_id: uuid::Uuid, is_helpful: bool, tally: VoteTally) -> Self {
        Self {
            review_id,
            is_helpful,
            helpful_count: tally.helpful,
            not_helpful_count: tally.not_helpful,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_rating_bounds() {
        assert!(check_rating(1).is_ok());
        assert!(check_rating(5).is_ok());

        match check_rating(6) {
            Err(ApiError::Validation(msg)) => assert_eq!(msg, "Rating must be between 1 and 5"),
            other => panic!("Expected validation error, got {other:?}"),
        }
        assert!(check_rating(0).is_err());
    }

    #[test]
    fn test_update_request_checks_present_fields_only() {
        assert!(ReviewUpdateRequest::default().check().is_ok());

        let blank_comment = ReviewUpdateRequest {
            comment: Some("   ".to_string()),
            ..ReviewUpdateRequest::default()
        };
        assert!(blank_comment.check().is_err());

        let bad_rating = ReviewUpdateRequest {
            rating: Some(9),
            ..ReviewUpdateRequest::default()
        };
        assert!(bad_rating.check().is_err());
    }

    #[test]
    fn test_review_request_defaults_has_attended() {
        let req: ReviewRequest =
            serde_json::from_value(serde_json::json!({ "rating": 4, "comment": "Clear and thorough" }))
                .expect("request should parse");

        assert!(req.has_attended);
    }
}

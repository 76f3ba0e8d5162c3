//! Access control for every protected operation.
//!
//! Handlers load the facts a decision depends on (course instructor, review
//! author, enrollment) and pass them in the [`Action`]; [`authorize`] itself
//! never touches the database.

use lms_db::models::Role;
use uuid::Uuid;

use crate::{auth::AuthUser, error::ApiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateCategory,
    CreateCourse,
    /// Edit or delete a course and its sections, lessons and materials
    ManageCourse { instructor_id: Uuid },
    ViewTeacherDashboard,
    ViewMaterials { instructor_id: Uuid, is_enrolled: bool },
    /// Pay for or join a course
    Enroll,
    /// Mark lessons and read progress of the caller's own enrollments
    TrackProgress,
    SubmitReview { is_enrolled: bool },
    EditReview { author_id: Uuid },
    DeleteReview { author_id: Uuid },
    ModerateReview,
    RespondToReview { instructor_id: Uuid },
    VoteOnReview,
}

fn forbidden(message: &str) -> Result<(), ApiError> {
    Err(ApiError::Forbidden(message.to_string()))
}

/// Decide whether `user` may perform `action`.
pub fn authorize(user: &AuthUser, action: Action) -> Result<(), ApiError> {
    let is_admin = user.role == Role::Admin;

    match action {
        Action::CreateCategory | Action::ModerateReview => {
            if is_admin {
                Ok(())
            } else {
                forbidden("You do not have permission to perform this action")
            }
        }
        Action::CreateCourse => {
            if user.role == Role::Teacher {
                Ok(())
            } else {
                forbidden("Only teachers can create courses")
            }
        }
        Action::ManageCourse { instructor_id } => {
            if is_admin || user.user_id == instructor_id {
                Ok(())
            } else {
                forbidden("Only the course instructor can modify this course")
            }
        }
        Action::ViewTeacherDashboard => {
            if user.role == Role::Teacher {
                Ok(())
            } else {
                forbidden("Only teachers can access the dashboard")
            }
        }
        Action::ViewMaterials {
            instructor_id,
            is_enrolled,
        } => {
            if is_admin || user.user_id == instructor_id || is_enrolled {
                Ok(())
            } else {
                Err(ApiError::NotEnrolled(
                    "You must be enrolled in this course to view its materials".to_string(),
                ))
            }
        }
        Action::Enroll | Action::TrackProgress => {
            if user.role == Role::Student {
                Ok(())
            } else {
                forbidden("Only students can enroll in courses")
            }
        }
        Action::SubmitReview { is_enrolled } => {
            if user.role != Role::Student {
                return forbidden("Only students can create reviews");
            }
            if !is_enrolled {
                return Err(ApiError::NotEnrolled(
                    "You must be enrolled in this course to review it".to_string(),
                ));
            }
            Ok(())
        }
        Action::EditReview { author_id } => {
            if user.user_id == author_id {
                Ok(())
            } else {
                forbidden("You can only update your own reviews")
            }
        }
        Action::DeleteReview { author_id } => {
            if is_admin || user.user_id == author_id {
                Ok(())
            } else {
                forbidden("You can only delete your own reviews")
            }
        }
        Action::RespondToReview { instructor_id } => {
            if user.role == Role::Teacher && user.user_id == instructor_id {
                Ok(())
            } else {
                forbidden("Only the course instructor can respond to reviews")
            }
        }
        Action::VoteOnReview => {
            if user.role == Role::Student {
                Ok(())
            } else {
                forbidden("Only students can vote on reviews")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            email: format!("{}@example.com", role.as_str()),
            role,
        }
    }

    #[test]
    fn test_admin_only_actions() {
        assert!(authorize(&user(Role::Admin), Action::CreateCategory).is_ok());
        assert!(authorize(&user(Role::Admin), Action::ModerateReview).is_ok());
        assert!(authorize(&user(Role::Teacher), Action::CreateCategory).is_err());
        assert!(authorize(&user(Role::Student), Action::ModerateReview).is_err());
    }

    #[test]
    fn test_course_management_requires_instructor_or_admin() {
        let teacher = user(Role::Teacher);
        let other_teacher = user(Role::Teacher);
        let own = Action::ManageCourse {
            instructor_id: teacher.user_id,
        };

        assert!(authorize(&teacher, Action::CreateCourse).is_ok());
        assert!(authorize(&user(Role::Student), Action::CreateCourse).is_err());
        assert!(authorize(&teacher, own).is_ok());
        assert!(authorize(&user(Role::Admin), own).is_ok());
        assert!(matches!(
            authorize(&other_teacher, own),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_materials_visible_to_enrolled_instructor_and_admin() {
        let teacher = user(Role::Teacher);
        let student = user(Role::Student);
        let closed = Action::ViewMaterials {
            instructor_id: teacher.user_id,
            is_enrolled: false,
        };

        assert!(authorize(&teacher, closed).is_ok());
        assert!(authorize(&user(Role::Admin), closed).is_ok());
        assert!(matches!(
            authorize(&student, closed),
            Err(ApiError::NotEnrolled(_))
        ));
        assert!(
            authorize(
                &student,
                Action::ViewMaterials {
                    instructor_id: teacher.user_id,
                    is_enrolled: true
                }
            )
            .is_ok()
        );
    }

    #[test]
    fn test_review_submission() {
        let student = user(Role::Student);

        assert!(authorize(&student, Action::SubmitReview { is_enrolled: true }).is_ok());
        assert!(matches!(
            authorize(&student, Action::SubmitReview { is_enrolled: false }),
            Err(ApiError::NotEnrolled(_))
        ));
        assert!(matches!(
            authorize(&user(Role::Teacher), Action::SubmitReview { is_enrolled: true }),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_review_ownership() {
        let author = user(Role::Student);
        let stranger = user(Role::Student);
        let admin = user(Role::Admin);

        let edit = Action::EditReview {
            author_id: author.user_id,
        };
        let delete = Action::DeleteReview {
            author_id: author.user_id,
        };

        assert!(authorize(&author, edit).is_ok());
        assert!(authorize(&stranger, edit).is_err());
        assert!(authorize(&admin, edit).is_err());

        assert!(authorize(&author, delete).is_ok());
        assert!(authorize(&admin, delete).is_ok());
        assert!(authorize(&stranger, delete).is_err());
    }

    #[test]
    fn test_review_response_and_votes() {
        let teacher = user(Role::Teacher);
        let respond = Action::RespondToReview {
            instructor_id: teacher.user_id,
        };

        assert!(authorize(&teacher, respond).is_ok());
        assert!(authorize(&user(Role::Teacher), respond).is_err());
        assert!(authorize(&user(Role::Admin), respond).is_err());

        assert!(authorize(&user(Role::Student), Action::VoteOnReview).is_ok());
        assert!(authorize(&teacher, Action::VoteOnReview).is_err());
    }

    #[test]
    fn test_enrollment_is_student_only() {
        assert!(authorize(&user(Role::Student), Action::Enroll).is_ok());
        assert!(authorize(&user(Role::Student), Action::TrackProgress).is_ok());
        assert!(authorize(&user(Role::Teacher), Action::Enroll).is_err());
        assert!(authorize(&user(Role::Admin), Action::TrackProgress).is_err());
    }
}

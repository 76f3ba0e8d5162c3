//! Derived aggregates for the learning platform.
//!
//! Every denormalized number the API stores (enrollment progress, course
//! rating, review vote counters, lesson sequence numbers, charge amounts) is
//! computed here from the rows it is derived from. The functions are pure so
//! they can be re-run at any time and always yield the same value for the
//! same inputs.

/// Percentage reported once every active lesson of a course is completed.
pub const COMPLETE: i32 = 100;

/// Compute enrollment progress as a whole percentage.
///
/// `completed` must only count lessons that are still active; values larger
/// than `active` are clamped so a stale completion set can never push the
/// result past 100.
///
/// Rounds half up: 1 of 8 lessons is 12.5% and reports 13.
///
/// # Examples
///
/// ```
/// use lms_aggregate::progress_percentage;
///
/// assert_eq!(progress_percentage(2, 4), 50);
/// assert_eq!(progress_percentage(1, 3), 33);
/// assert_eq!(progress_percentage(0, 0), 0);
/// ```
pub fn progress_percentage(completed: i64, active: i64) -> i32 {
    if active <= 0 {
        return 0;
    }
    let completed = completed.clamp(0, active);

    // round(100 * completed / active) with integer arithmetic
    ((200 * completed + active) / (2 * active)) as i32
}

/// Whether a progress value means the course has been completed.
pub const fn is_course_completed(progress: i32) -> bool {
    progress == COMPLETE
}

/// Progress fields stored on an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub percentage: i32,
    pub is_completed: bool,
}

impl Progress {
    /// Derive both stored fields from lesson counts.
    pub fn from_counts(completed_active: i64, active: i64) -> Self {
        let percentage = progress_percentage(completed_active, active);
        Self {
            percentage,
            is_completed: is_course_completed(percentage),
        }
    }
}

/// Rating aggregate stored on a course.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    /// Mean rating rounded to one decimal place, `0.0` without reviews
    pub rating: f64,
    /// Number of reviews the mean was taken over
    pub reviews: i32,
}

impl RatingSummary {
    /// Summary for a course without approved reviews.
    pub const EMPTY: Self = Self {
        rating: 0.0,
        reviews: 0,
    };

    /// Build the summary from the sum and count of approved ratings.
    pub fn from_totals(sum: i64, count: i64) -> Self {
        if count <= 0 {
            return Self::EMPTY;
        }

        // Mean in tenths, rounded half up
        let tenths = (20 * sum + count) / (2 * count);

        Self {
            rating: tenths as f64 / 10.0,
            reviews: count as i32,
        }
    }
}

/// Helpful / not-helpful counters stored on a review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub helpful: i32,
    pub not_helpful: i32,
}

impl VoteTally {
    /// Count votes by polarity.
    pub fn from_votes<I>(votes: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        votes.into_iter().fold(Self::default(), |mut tally, helpful| {
            if helpful {
                tally.helpful += 1;
            } else {
                tally.not_helpful += 1;
            }
            tally
        })
    }
}

/// Largest sequence number a lesson may carry.
pub const MAX_SEQUENCE_NUMBER: i32 = 1_000_000;

/// Sequence number for a lesson appended to a course.
///
/// `current_max` is the largest sequence number already used in the course,
/// `None` when the course has no lessons yet. Returns `None` once the course
/// has used up [`MAX_SEQUENCE_NUMBER`].
pub fn next_sequence_number(current_max: Option<i32>) -> Option<i32> {
    match current_max {
        None => Some(1),
        Some(max) => max
            .max(0)
            .checked_add(1)
            .filter(|next| *next <= MAX_SEQUENCE_NUMBER),
    }
}

/// Allowed rating values for a review.
pub const RATING_RANGE: std::ops::RangeInclusive<i16> = 1..=5;

/// Whether a rating is inside [`RATING_RANGE`].
pub fn is_valid_rating(rating: i16) -> bool {
    RATING_RANGE.contains(&rating)
}

/// Price a student is charged for a course.
///
/// A discount applies only when it is lower than the base price.
pub fn effective_price(price: f64, discount_price: Option<f64>) -> f64 {
    match discount_price {
        Some(discount) if discount >= 0.0 && discount < price => discount,
        _ => price,
    }
}

/// Convert a price to minor currency units (cents), rounding to the nearest unit.
pub fn to_minor_units(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

/// Convert minor currency units back to a price.
pub fn from_minor_units(amount: i64) -> f64 {
    amount as f64 / 100.0
}

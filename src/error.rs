use thiserror::Error;

/// Precondition violations raised by the grid generator and the motion estimator.
///
/// Lack of consensus is not an error, it yields a zero estimate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    #[error("point sets differ in length: {old} old points vs {new} new points")]
    LengthMismatch { old: usize, new: usize },

    #[error("grid region must be positive, got {height} x {width}")]
    InvalidRegion { height: i64, width: i64 },

    #[error("grid pitch must be positive, got {0}")]
    InvalidPitch(i64),

    #[error("cannot draw consensus candidates from an empty population")]
    EmptyPopulation,
}

use thiserror::Error;

/// Errors raised when an entity is configured with values it cannot honour.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MotionError {
    #[error("Invalid size range [{low}, {high}): sizes must be positive and the range non-empty")]
    InvalidSizeRange { low: i32, high: i32 },

    #[error("Invalid velocity range [{low}, {high}): range must be non-empty")]
    InvalidVelocityRange { low: i32, high: i32 },

    #[error("Tick interval must be greater than zero")]
    InvalidTickInterval,

    #[error("Bounds {width}x{height} exceed the signed coordinate range")]
    BoundsOutOfRange { width: u32, height: u32 },
}

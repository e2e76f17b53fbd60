//! Motion and notification engine for a kaleidoscope of bouncing shapes.
//!
//! Each [`MotionEntity`] owns its position, velocity and viewport bounds,
//! steps on its own timer thread while running, and tells its observers
//! after every step. Rendering lives elsewhere and only reacts to those
//! notifications.

pub mod entity;
pub mod error;
pub mod observable;
pub mod random;
pub mod scheduler;
pub mod world;

pub use entity::{
    Bounds, EntityId, EntitySnapshot, MotionEntity, MotionSettings, Position, Velocity,
};
pub use error::MotionError;
pub use observable::{NotificationHub, Observable, Observer, SubscriptionId};
pub use random::{RandomSource, SequenceRandom, StdRandom};
pub use scheduler::{RepeatingTask, TickOutcome};
pub use world::World;

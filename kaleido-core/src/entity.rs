use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::debug;

use crate::error::MotionError;
use crate::observable::{NotificationHub, Observable, Observer, SubscriptionId};
use crate::random::RandomSource;
use crate::scheduler::{RepeatingTask, TickOutcome};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a `MotionEntity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        EntityId(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Velocity {
    pub dx: i32,
    pub dy: i32,
}

/// Size of the drawable viewport the entity bounces inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Bounds {
    pub width: u32,
    pub height: u32,
}

/// Creation parameters shared by every entity of a kaleidoscope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionSettings {
    /// Half-open range the entity size is drawn from.
    pub size_range: (i32, i32),
    pub initial_velocity: Velocity,
    /// Half-open range `start` draws each velocity component from.
    pub velocity_range: (i32, i32),
    pub tick_interval: Duration,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            size_range: (50, 100),
            initial_velocity: Velocity { dx: 6, dy: 4 },
            velocity_range: (2, 12),
            tick_interval: Duration::from_millis(40), // 25 steps a second
        }
    }
}

impl MotionSettings {
    pub fn validate(&self) -> Result<(), MotionError> {
        let (low, high) = self.size_range;
        if low <= 0 || low >= high {
            return Err(MotionError::InvalidSizeRange { low, high });
        }
        let (low, high) = self.velocity_range;
        if low >= high {
            return Err(MotionError::InvalidVelocityRange { low, high });
        }
        if self.tick_interval.is_zero() {
            return Err(MotionError::InvalidTickInterval);
        }
        Ok(())
    }
}

/// Point-in-time copy of an entity's observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub size: i32,
    pub position: Position,
    pub velocity: Velocity,
    pub bounds: Bounds,
    pub running: bool,
}

#[derive(Debug, Clone, Copy)]
struct MotionState {
    position: Position,
    velocity: Velocity,
    bounds: Bounds,
}

impl MotionState {
    // Upper bound only. A shrinking viewport can leave a negative coordinate
    // below -limit/2; the entity then stays put until the viewport grows.
    fn clamp_to_bounds(&mut self) {
        self.position.x = self.position.x.min(self.bounds.width as i32);
        self.position.y = self.position.y.min(self.bounds.height as i32);
    }

    fn step(&mut self, size: i32) {
        step_axis(
            &mut self.position.x,
            &mut self.velocity.dx,
            self.bounds.width as i32,
            size,
        );
        step_axis(
            &mut self.position.y,
            &mut self.velocity.dy,
            self.bounds.height as i32,
            size,
        );
    }
}

/// Moves one axis by its velocity, reflecting at most once if the result
/// leaves `[-limit/2, limit/2 - size]`.
fn step_axis(position: &mut i32, delta: &mut i32, limit: i32, size: i32) {
    *position = position.saturating_add(*delta);
    if *position < -limit / 2 || *position > limit / 2 - size {
        *delta = delta.saturating_neg();
        *position = position.saturating_add(*delta);
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct EntityInner {
    id: EntityId,
    size: i32,
    tick_interval: Duration,
    state: Mutex<MotionState>,
    // Held for a whole step, notification included.
    step_lock: Mutex<()>,
    hub: NotificationHub<MotionEntity>,
    rng: Mutex<Box<dyn RandomSource>>,
    ticker: Mutex<Option<RepeatingTask>>,
    live_tickers: Arc<AtomicUsize>,
}

/// Keeps `live_tickers` accurate for as long as a ticker thread owns it.
struct LiveTicker(Arc<AtomicUsize>);

impl LiveTicker {
    fn register(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        LiveTicker(Arc::clone(counter))
    }
}

impl Drop for LiveTicker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One bouncing shape.
///
/// `MotionEntity` is a cheap handle; clones refer to the same entity. The
/// periodic ticker only holds a weak reference, so dropping every handle
/// stops the animation.
///
/// Observers run on whichever thread called `advance` (the ticker thread
/// while running). They may read state, change bounds or velocity, and
/// start or pause the entity, but must not call `advance` on the entity
/// notifying them.
#[derive(Clone)]
pub struct MotionEntity {
    inner: Arc<EntityInner>,
}

impl MotionEntity {
    /// Creates an idle entity at `(0, 0)` with zero bounds. Its size is drawn
    /// once from `settings.size_range` using `rng`, which the entity then keeps
    /// for velocity randomisation.
    pub fn new(
        settings: &MotionSettings,
        mut rng: Box<dyn RandomSource>,
    ) -> Result<Self, MotionError> {
        settings.validate()?;
        let (low, high) = settings.size_range;
        let size = rng.next_in_range(low, high);

        Ok(Self {
            inner: Arc::new(EntityInner {
                id: EntityId::next(),
                size,
                tick_interval: settings.tick_interval,
                state: Mutex::new(MotionState {
                    position: Position::default(),
                    velocity: settings.initial_velocity,
                    bounds: Bounds::default(),
                }),
                step_lock: Mutex::new(()),
                hub: NotificationHub::new(),
                rng: Mutex::new(rng),
                ticker: Mutex::new(None),
                live_tickers: Arc::new(AtomicUsize::new(0)),
            }),
        })
    }

    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    pub fn size(&self) -> i32 {
        self.inner.size
    }

    pub fn position(&self) -> Position {
        lock(&self.inner.state).position
    }

    pub fn velocity(&self) -> Velocity {
        lock(&self.inner.state).velocity
    }

    pub fn bounds(&self) -> Bounds {
        lock(&self.inner.state).bounds
    }

    pub fn tick_interval(&self) -> Duration {
        self.inner.tick_interval
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        let state = *lock(&self.inner.state);
        EntitySnapshot {
            id: self.inner.id,
            size: self.inner.size,
            position: state.position,
            velocity: state.velocity,
            bounds: state.bounds,
            running: self.is_running(),
        }
    }

    /// Sets the walls and pulls the position back under the new upper limits.
    /// Does not notify observers.
    pub fn set_bounds(&self, width: u32, height: u32) -> Result<(), MotionError> {
        if width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(MotionError::BoundsOutOfRange { width, height });
        }
        let mut state = lock(&self.inner.state);
        state.bounds = Bounds { width, height };
        state.clamp_to_bounds();
        Ok(())
    }

    /// Takes effect on the next `advance`.
    pub fn set_velocity(&self, dx: i32, dy: i32) {
        lock(&self.inner.state).velocity = Velocity { dx, dy };
    }

    pub fn set_dx(&self, dx: i32) {
        lock(&self.inner.state).velocity.dx = dx;
    }

    pub fn set_dy(&self, dy: i32) {
        lock(&self.inner.state).velocity.dy = dy;
    }

    /// Draws a fresh velocity from `[low, high)` on each axis without touching
    /// the schedule.
    pub fn randomize_velocity(&self, low: i32, high: i32) -> Result<Velocity, MotionError> {
        if low >= high {
            return Err(MotionError::InvalidVelocityRange { low, high });
        }
        let velocity = {
            let mut rng = lock(&self.inner.rng);
            let dx = rng.next_in_range(low, high);
            let dy = rng.next_in_range(low, high);
            Velocity { dx, dy }
        };
        lock(&self.inner.state).velocity = velocity;
        Ok(velocity)
    }

    /// Moves one step and notifies every subscriber in registration order.
    pub fn advance(&self) {
        let _step = lock(&self.inner.step_lock);
        lock(&self.inner.state).step(self.inner.size);
        self.inner.hub.notify(self);
    }

    /// Randomises the velocity and begins ticking every `tick_interval`.
    /// A schedule that is already running is replaced.
    pub fn start(&self, low: i32, high: i32) -> Result<(), MotionError> {
        let velocity = self.randomize_velocity(low, high)?;

        let weak = Arc::downgrade(&self.inner);
        let alive = LiveTicker::register(&self.inner.live_tickers);
        let task = RepeatingTask::spawn(
            format!("kaleido-entity-{}", self.inner.id),
            self.inner.tick_interval,
            move || {
                let _alive = &alive;
                match weak.upgrade() {
                    Some(inner) => {
                        MotionEntity { inner }.advance();
                        TickOutcome::Continue
                    }
                    None => TickOutcome::Stop,
                }
            },
        );

        let previous = lock(&self.inner.ticker).replace(task);
        match previous {
            Some(mut previous) => {
                previous.cancel();
                debug!(
                    "Entity {} restarted with velocity ({}, {}), previous schedule replaced",
                    self.inner.id, velocity.dx, velocity.dy
                );
            }
            None => debug!(
                "Entity {} started with velocity ({}, {})",
                self.inner.id, velocity.dx, velocity.dy
            ),
        }
        Ok(())
    }

    /// Stops the schedule. No-op when idle.
    pub fn pause(&self) {
        if let Some(mut task) = lock(&self.inner.ticker).take() {
            task.cancel();
            debug!("Entity {} paused", self.inner.id);
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.ticker)
            .as_ref()
            .is_some_and(|task| !task.is_cancelled())
    }

    /// Number of ticker threads still alive for this entity. Briefly exceeds
    /// one right after a restart, while the replaced thread winds down.
    pub fn active_schedules(&self) -> usize {
        self.inner.live_tickers.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.hub.len()
    }
}

impl Observable<MotionEntity> for MotionEntity {
    fn subscribe(&self, observer: Observer<MotionEntity>) -> SubscriptionId {
        self.inner.hub.subscribe(observer)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.hub.unsubscribe(id)
    }
}

impl PartialEq for MotionEntity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for MotionEntity {}

impl fmt::Debug for MotionEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = *lock(&self.inner.state);
        f.debug_struct("MotionEntity")
            .field("id", &self.inner.id)
            .field("size", &self.inner.size)
            .field("position", &state.position)
            .field("velocity", &state.velocity)
            .field("bounds", &state.bounds)
            .finish()
    }
}

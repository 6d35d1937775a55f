use std::collections::VecDeque;

/// Snapshots held ahead of the one being interpolated towards
pub const INTERPOLATION_BUFFER_CAPACITY: usize = 2;

/// Interpolation runs this much slower than the send rate so that small
/// arrival jitter doesn't drain the buffer
pub const INTERPOLATION_TIME_STRETCH: f32 = 1.05;

/// Received snapshots for one interpolated entity, plus the state the entity
/// started interpolating from.
///
/// The front snapshot is the current target. `frame` counts fixed steps since
/// the last advance and `fraction` is progress from `start` to the target.
pub struct InterpolationBuffer<D> {
    snapshots: VecDeque<Box<D>>,
    start: Option<Box<D>>,
    frame: u32,
    fraction: f32,
    received_initial: bool,
    fixed_updates_between_receiving: u32,
}

impl<D> InterpolationBuffer<D> {
    pub fn new(fixed_updates_between_receiving: u32) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(INTERPOLATION_BUFFER_CAPACITY),
            start: None,
            frame: 0,
            fraction: 0.0,
            received_initial: false,
            fixed_updates_between_receiving: fixed_updates_between_receiving.max(1),
        }
    }

    /// Fills the buffer from the first snapshot, so interpolation starts at
    /// rest: `start` and every buffered target hold the same state.
    pub fn prime(&mut self, start: Box<D>, fill: impl IntoIterator<Item = Box<D>>) {
        self.start = Some(start);
        self.snapshots.clear();
        self.snapshots
            .extend(fill.into_iter().take(INTERPOLATION_BUFFER_CAPACITY));
        self.frame = 0;
        self.fraction = 0.0;
        self.received_initial = true;
    }

    /// Queues a snapshot. Callers advance first when the buffer is full.
    pub fn push(&mut self, snapshot: Box<D>) {
        self.snapshots.push_back(snapshot);
    }

    /// Removes the current target and resets progress. The returned snapshot
    /// is the state the entity was interpolating towards.
    pub fn pop_target(&mut self) -> Option<Box<D>> {
        let target = self.snapshots.pop_front()?;
        self.frame = 0;
        self.fraction = 0.0;
        Some(target)
    }

    /// Counts one fixed step and recomputes the fraction
    pub fn step(&mut self) {
        self.frame += 1;
        let span = self.fixed_updates_between_receiving as f32 * INTERPOLATION_TIME_STRETCH;
        self.fraction = (self.frame as f32 / span).min(1.0);
    }

    pub fn should_advance(&self) -> bool {
        self.frame >= self.fixed_updates_between_receiving && self.snapshots.len() > 1
    }

    pub fn start(&self) -> Option<&D> {
        self.start.as_deref()
    }

    pub fn start_mut(&mut self) -> Option<&mut D> {
        self.start.as_deref_mut()
    }

    pub fn target(&self) -> Option<&D> {
        self.snapshots.front().map(|snapshot| &**snapshot)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.snapshots.len() >= INTERPOLATION_BUFFER_CAPACITY
    }

    pub fn has_received_initial(&self) -> bool {
        self.received_initial
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn fraction(&self) -> f32 {
        self.fraction
    }

    /// Empties the buffer, yielding every held snapshot so it can be returned
    /// to a pool
    pub fn drain(&mut self) -> impl Iterator<Item = Box<D>> + '_ {
        self.received_initial = false;
        self.frame = 0;
        self.fraction = 0.0;
        self.start.take().into_iter().chain(self.snapshots.drain(..))
    }
}

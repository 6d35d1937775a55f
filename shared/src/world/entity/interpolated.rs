use std::any::Any;

use crate::{
    world::data::{DataKinds, DataKindsError, DataPool, DynNetworkData, NetworkData},
    DataTypeId,
};

use super::{
    interpolation_buffer::{InterpolationBuffer, INTERPOLATION_BUFFER_CAPACITY},
    sync_entity::{SyncBehavior, SyncEntity},
};

/// A [`SyncBehavior`] whose remote copies smoothly interpolate between
/// received snapshots instead of snapping to each one
pub trait InterpolatedBehavior: SyncBehavior {
    /// Called whenever the interpolation target changes
    fn on_start_interpolating(&mut self, previous: &Self::Data, next: &Self::Data);

    /// Blends `start` towards `target`. `fraction` is in `0.0..=1.0`.
    fn interpolate(&mut self, start: &Self::Data, target: &Self::Data, fraction: f32);
}

/// Adapts an [`InterpolatedBehavior`] into a [`SyncEntity`].
///
/// Sent every replication tick while owned. While not owned, received
/// snapshots are buffered and played back one send interval behind.
pub struct Interpolated<B: InterpolatedBehavior> {
    behavior: B,
    data_type_id: DataTypeId,
    buffer: InterpolationBuffer<B::Data>,
}

impl<B: InterpolatedBehavior> Interpolated<B> {
    pub fn new(
        behavior: B,
        data_kinds: &DataKinds,
        fixed_updates_between_receiving: u32,
    ) -> Result<Self, DataKindsError> {
        let data_type_id = data_kinds.id_of::<B::Data>()?;
        Ok(Self {
            behavior,
            data_type_id,
            buffer: InterpolationBuffer::new(fixed_updates_between_receiving),
        })
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    pub fn buffer(&self) -> &InterpolationBuffer<B::Data> {
        &self.buffer
    }

    fn receive(&mut self, data: Box<B::Data>, pool: &mut DataPool) {
        if !self.buffer.has_received_initial() {
            self.behavior.on_start_interpolating(&data, &data);
            self.behavior.interpolate(&data, &data, 1.0);

            let behavior = &self.behavior;
            let fill = (0..INTERPOLATION_BUFFER_CAPACITY).map(|_| {
                let mut snapshot = pool.take::<B::Data>();
                behavior.update_data(&mut snapshot);
                snapshot
            });
            let fill: Vec<_> = fill.collect();
            self.buffer.prime(data, fill);
            return;
        }

        if self.buffer.is_full() {
            self.advance(pool);
        }
        self.buffer.push(data);
    }

    fn advance(&mut self, pool: &mut DataPool) {
        let Some(previous) = self.buffer.pop_target() else {
            return;
        };

        // the new start is wherever the entity actually is right now
        if let Some(start) = self.buffer.start_mut() {
            self.behavior.update_data(start);
        }
        if let Some(next) = self.buffer.target() {
            self.behavior.on_start_interpolating(&previous, next);
        }

        pool.give_typed(previous);
    }

    fn apply_interpolation(&mut self) {
        if let (Some(start), Some(target)) = (self.buffer.start(), self.buffer.target()) {
            self.behavior
                .interpolate(start, target, self.buffer.fraction());
        }
    }
}

impl<B: InterpolatedBehavior> SyncEntity for Interpolated<B> {
    fn data_type_id(&self) -> DataTypeId {
        self.data_type_id
    }

    fn send_every_tick(&self) -> bool {
        true
    }

    fn create_data(&self, pool: &mut DataPool) -> Box<dyn DynNetworkData> {
        let mut data = pool.take::<B::Data>();
        self.behavior.update_data(&mut data);
        data
    }

    fn on_received_data(
        &mut self,
        is_owned: bool,
        data: Box<dyn DynNetworkData>,
        pool: &mut DataPool,
    ) {
        if is_owned {
            pool.give(data);
            return;
        }

        let name = data.name();
        match data.into_any().downcast::<B::Data>() {
            Ok(typed) => self.receive(typed, pool),
            Err(_) => {
                log::error!(
                    "{} received {} payload, expected {}",
                    std::any::type_name::<B>(),
                    name,
                    B::Data::NAME
                );
            }
        }
    }

    fn on_owned_data_synced_to_all(&mut self) {
        self.behavior.on_owned_data_synced_to_all();
    }

    fn fixed_update(&mut self, is_owned: bool, pool: &mut DataPool) {
        if is_owned || self.buffer.is_empty() {
            return;
        }

        self.buffer.step();
        self.apply_interpolation();
        if self.buffer.should_advance() {
            self.advance(pool);
        }
    }

    fn update(&mut self, is_owned: bool, _pool: &mut DataPool) {
        if is_owned || self.buffer.is_empty() {
            return;
        }
        self.apply_interpolation();
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<B>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

use std::any::Any;

use peerhost_serde::ByteWriter;

use crate::{
    world::data::{DataKinds, DataKindsError, DataPool, DynNetworkData, NetworkData},
    DataTypeId,
};

/// A replicated piece of state attached to a scene object.
///
/// The owning peer snapshots it with [`SyncEntity::create_data`]; everyone
/// else applies snapshots through [`SyncEntity::on_received_data`].
pub trait SyncEntity: Any {
    fn data_type_id(&self) -> DataTypeId;

    /// Entities that report `true` are sent on every replication tick while
    /// owned, instead of only when dirtied
    fn send_every_tick(&self) -> bool {
        false
    }

    /// Snapshots current state into a payload taken from `pool`
    fn create_data(&self, pool: &mut DataPool) -> Box<dyn DynNetworkData>;

    /// Applies a received payload. The entity owns `data` and must give it
    /// back to `pool` once finished with it.
    fn on_received_data(
        &mut self,
        is_owned: bool,
        data: Box<dyn DynNetworkData>,
        pool: &mut DataPool,
    );

    /// Called once an owned entity's snapshot has been sent to every peer
    fn on_owned_data_synced_to_all(&mut self) {}

    /// Called every fixed step
    fn fixed_update(&mut self, _is_owned: bool, _pool: &mut DataPool) {}

    /// Called every frame
    fn update(&mut self, _is_owned: bool, _pool: &mut DataPool) {}

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn SyncEntity {
    /// Writes `[u16 data type id][payload]`
    pub fn write_to(&self, writer: &mut ByteWriter, pool: &mut DataPool) {
        writer.write(&self.data_type_id());
        let data = self.create_data(pool);
        data.write(writer);
        pool.give(data);
    }
}

/// Typed state and snapshot logic for a [`Synced`] entity
pub trait SyncBehavior: 'static {
    type Data: NetworkData;

    /// Copies current state into `data`
    fn update_data(&self, data: &mut Self::Data);

    /// Applies a received snapshot
    fn apply_data(&mut self, data: &Self::Data);

    fn on_owned_data_synced_to_all(&mut self) {}
}

/// Adapts a [`SyncBehavior`] into a [`SyncEntity`] with a resolved data type id
pub struct Synced<B: SyncBehavior> {
    behavior: B,
    data_type_id: DataTypeId,
}

impl<B: SyncBehavior> Synced<B> {
    pub fn new(behavior: B, data_kinds: &DataKinds) -> Result<Self, DataKindsError> {
        let data_type_id = data_kinds.id_of::<B::Data>()?;
        Ok(Self {
            behavior,
            data_type_id,
        })
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }
}

impl<B: SyncBehavior> SyncEntity for Synced<B> {
    fn data_type_id(&self) -> DataTypeId {
        self.data_type_id
    }

    fn create_data(&self, pool: &mut DataPool) -> Box<dyn DynNetworkData> {
        let mut data = pool.take::<B::Data>();
        self.behavior.update_data(&mut data);
        data
    }

    fn on_received_data(
        &mut self,
        _is_owned: bool,
        data: Box<dyn DynNetworkData>,
        pool: &mut DataPool,
    ) {
        let name = data.name();
        match data.into_any().downcast::<B::Data>() {
            Ok(typed) => {
                self.behavior.apply_data(&typed);
                pool.give_typed(typed);
            }
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

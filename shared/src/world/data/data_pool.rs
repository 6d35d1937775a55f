use std::{any::TypeId, collections::HashMap};

use crate::DataTypeId;

use super::{DataKinds, DataKindsError, DynNetworkData, NetworkData};

/// Free lists of payload instances, one per schema.
///
/// Snapshots are written and read every tick, so payloads are taken from the
/// pool, used, and given back instead of being allocated each time. A taken
/// payload is owned by whoever holds it; giving it back ends that use.
pub struct DataPool {
    free: HashMap<TypeId, Vec<Box<dyn DynNetworkData>>>,
}

impl DataPool {
    pub fn new() -> Self {
        Self {
            free: HashMap::new(),
        }
    }

    pub fn take<D: NetworkData>(&mut self) -> Box<D> {
        if let Some(data) = self.pop(TypeId::of::<D>()) {
            if let Ok(typed) = data.into_any().downcast::<D>() {
                return typed;
            }
        }
        Box::<D>::default()
    }

    pub fn take_by_id(
        &mut self,
        data_kinds: &DataKinds,
        data_type_id: DataTypeId,
    ) -> Result<Box<dyn DynNetworkData>, DataKindsError> {
        let type_id = data_kinds.type_id_of(data_type_id)?;
        match self.pop(type_id) {
            Some(data) => Ok(data),
            None => data_kinds.create(data_type_id),
        }
    }

    pub fn give(&mut self, data: Box<dyn DynNetworkData>) {
        let type_id = data.as_any().type_id();
        self.free.entry(type_id).or_default().push(data);
    }

    pub fn give_typed<D: NetworkData>(&mut self, data: Box<D>) {
        self.give(data);
    }

    /// How many idle payloads of this schema are waiting for reuse
    pub fn pooled_count<D: NetworkData>(&self) -> usize {
        self.free
            .get(&TypeId::of::<D>())
            .map_or(0, |list| list.len())
    }

    fn pop(&mut self, type_id: TypeId) -> Option<Box<dyn DynNetworkData>> {
        self.free.get_mut(&type_id).and_then(|list| list.pop())
    }
}

impl Default for DataPool {
    fn default() -> Self {
        Self::new()
    }
}

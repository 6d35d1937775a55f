use std::{any::TypeId, collections::HashMap};

use crate::DataTypeId;

use super::{DataKindsError, DynNetworkData, NetworkData};

#[derive(Clone, Copy)]
struct DataKindEntry {
    name: &'static str,
    type_id: TypeId,
    builder: fn() -> Box<dyn DynNetworkData>,
}

fn build_data<D: NetworkData>() -> Box<dyn DynNetworkData> {
    Box::new(D::default())
}

/// Registry of every payload schema known to the protocol.
///
/// Ids are handed out on [`DataKinds::lock`] by enumerating the registered
/// names in ascending byte order, so every peer that registered the same set
/// of schemas computes the same mapping without exchanging it.
pub struct DataKinds {
    registered: Vec<DataKindEntry>,
    id_by_type: HashMap<TypeId, DataTypeId>,
    locked: bool,
}

impl DataKinds {
    pub fn new() -> Self {
        Self {
            registered: Vec::new(),
            id_by_type: HashMap::new(),
            locked: false,
        }
    }

    pub fn add_data<D: NetworkData>(&mut self) {
        if let Err(error) = self.try_add_data::<D>() {
            panic!("{}", error);
        }
    }

    pub fn try_add_data<D: NetworkData>(&mut self) -> Result<(), DataKindsError> {
        if self.locked {
            return Err(DataKindsError::AlreadyLocked { name: D::NAME });
        }
        let type_id = TypeId::of::<D>();
        if self.registered.iter().any(|entry| entry.type_id == type_id) {
            // registering the same type twice is harmless
            return Ok(());
        }
        if self.registered.iter().any(|entry| entry.name == D::NAME) {
            return Err(DataKindsError::DuplicateName { name: D::NAME });
        }
        self.registered.push(DataKindEntry {
            name: D::NAME,
            type_id,
            builder: build_data::<D>,
        });
        Ok(())
    }

    pub fn lock(&mut self) {
        if let Err(error) = self.try_lock() {
            panic!("{}", error);
        }
    }

    pub fn try_lock(&mut self) -> Result<(), DataKindsError> {
        if self.registered.len() > usize::from(DataTypeId::MAX) {
            return Err(DataKindsError::TooManyDataTypes {
                count: self.registered.len(),
            });
        }
        self.registered.sort_by(|a, b| a.name.cmp(b.name));
        self.id_by_type.clear();
        for (index, entry) in self.registered.iter().enumerate() {
            self.id_by_type.insert(entry.type_id, index as DataTypeId);
        }
        self.locked = true;
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    pub fn id_of<D: NetworkData>(&self) -> Result<DataTypeId, DataKindsError> {
        if !self.locked {
            return Err(DataKindsError::NotLocked);
        }
        self.id_by_type
            .get(&TypeId::of::<D>())
            .copied()
            .ok_or(DataKindsError::UnregisteredType { name: D::NAME })
    }

    pub fn name_of(&self, data_type_id: DataTypeId) -> Result<&'static str, DataKindsError> {
        Ok(self.entry(data_type_id)?.name)
    }

    pub fn type_id_of(&self, data_type_id: DataTypeId) -> Result<TypeId, DataKindsError> {
        Ok(self.entry(data_type_id)?.type_id)
    }

    /// Builds a fresh default payload for the given id
    pub fn create(&self, data_type_id: DataTypeId) -> Result<Box<dyn DynNetworkData>, DataKindsError> {
        Ok((self.entry(data_type_id)?.builder)())
    }

    fn entry(&self, data_type_id: DataTypeId) -> Result<&DataKindEntry, DataKindsError> {
        if !self.locked {
            return Err(DataKindsError::NotLocked);
        }
        self.registered
            .get(usize::from(data_type_id))
            .ok_or(DataKindsError::UnknownDataTypeId {
                data_type_id,
                registered: self.registered.len(),
            })
    }
}

impl Default for DataKinds {
    fn default() -> Self {
        Self::new()
    }
}

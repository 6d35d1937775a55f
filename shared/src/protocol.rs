use crate::world::data::{DataKinds, NetworkData};

pub mod error;
pub use error::ProtocolError;

/// Replication updates go out once every this many fixed updates
pub const DEFAULT_FIXED_UPDATES_BETWEEN_TICKS: u32 = 3;

// Protocol
pub struct Protocol {
    pub data_kinds: DataKinds,
    /// How many fixed updates pass between two replication ticks
    pub fixed_updates_between_ticks: u32,
    locked: bool,
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            data_kinds: DataKinds::new(),
            fixed_updates_between_ticks: DEFAULT_FIXED_UPDATES_BETWEEN_TICKS,
            locked: false,
        }
    }
}

impl Protocol {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn fixed_updates_between_ticks(&mut self, count: u32) -> &mut Self {
        self.check_lock();
        self.fixed_updates_between_ticks = count.max(1);
        self
    }

    pub fn add_data<D: NetworkData>(&mut self) -> &mut Self {
        self.check_lock();
        self.data_kinds.add_data::<D>();
        self
    }

    /// Freezes the protocol and assigns every registered data type its wire id
    pub fn lock(&mut self) {
        self.check_lock();
        self.locked = true;
        self.data_kinds.lock();
    }

    pub fn check_lock(&self) {
        if self.locked {
            panic!("Protocol already locked!");
        }
    }

    pub fn try_check_lock(&self) -> Result<(), ProtocolError> {
        if self.locked {
            Err(ProtocolError::AlreadyLocked)
        } else {
            Ok(())
        }
    }

    pub fn try_add_data<D: NetworkData>(&mut self) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.data_kinds.try_add_data::<D>()?;
        Ok(self)
    }

    pub fn try_lock(&mut self) -> Result<(), ProtocolError> {
        self.try_check_lock()?;
        self.data_kinds.try_lock()?;
        self.locked = true;
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn build(&mut self) -> Self {
        std::mem::take(self)
    }
}

mod notification_bus;
mod notifications;

pub use notification_bus::{ListenerId, NotificationBus};
pub use notifications::{OwnershipGranted, ReceivedInitialData};

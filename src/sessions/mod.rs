pub mod monitor;
pub mod registry;

pub use monitor::{HeartbeatMonitor, SessionEvent, SweepReport};
pub use registry::{
    MetadataPatch, RegistryError, SessionPolicy, SessionRegistry, SessionSnapshot, SessionStatus,
};

//! Shared registries coordinating engine starts across test scopes.

mod connection;
mod instance;

pub use connection::{
    Acquisition, ConnectionRegistry, Release, ShutdownAction, StartPermit, StopPermit,
};
pub use instance::{KeyedInstanceRegistry, TargetReservation};

//! WebSocket relay for two-party call signaling

mod envelope;
mod registry;
mod server;
mod types;

pub use envelope::Envelope;
pub use registry::RegistryHandle;
pub use server::{DEFAULT_PORT, RelayServer};
pub use types::{ConnId, OutboundFrame, RelayError};

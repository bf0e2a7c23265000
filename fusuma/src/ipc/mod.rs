pub(crate) mod client;
mod event_server;
mod server;
mod transport;

pub use client::{subscribe_and_print, IpcClient};
pub use event_server::{EventBroadcaster, EventServer};
pub use server::IpcServer;

//! Wire types shared by the fusuma daemon and its clients. Both endpoints
//! speak newline-delimited JSON.

pub mod command;
pub mod event;

pub use command::{
    BindingInfo, Command, LayoutKind, Response, ShiftDirection, StateInfo, WindowInfo,
    WorkspaceInfo,
};
pub use event::{EventCategory, EventFilter, StateEvent, SubscribeRequest};

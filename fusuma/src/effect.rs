use crate::core::WindowHandle;

use fusuma_ipc::Response;

/// Follow-up work a command needs from the host after the registry handled it.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ExecCommand { command: String },
    FocusWindow { handle: WindowHandle },
}

/// What dispatching a command produced: the reply for the caller and any
/// effects still to run.
pub struct CommandResult {
    pub response: Response,
    pub effects: Vec<Effect>,
}

impl From<Response> for CommandResult {
    fn from(response: Response) -> Self {
        Self {
            response,
            effects: Vec::new(),
        }
    }
}

impl CommandResult {
    pub fn ok() -> Self {
        Response::Ok.into()
    }

    pub fn ok_with_effects(effects: Vec<Effect>) -> Self {
        Self {
            effects,
            ..Self::ok()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
        .into()
    }

    pub fn with_response(response: Response) -> Self {
        response.into()
    }

    /// `Ok` when the operation changed something, an error otherwise.
    pub fn from_change(changed: bool, message: impl FnOnce() -> String) -> Self {
        if changed {
            Self::ok()
        } else {
            Self::error(message())
        }
    }
}

mod config;
mod monitor;
mod registry;
mod rule;
mod rules_engine;
mod window;
mod workspace;

pub use config::*;
pub use monitor::*;
pub use registry::*;
pub use rule::*;
pub use rules_engine::*;
pub use window::*;
pub use workspace::*;

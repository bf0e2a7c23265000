use crate::core::Registry;
use crate::effect::Effect;
use crate::platform::Host;

/// Execute side effects.
pub fn execute_effects(
    effects: Vec<Effect>,
    registry: &mut Registry,
    host: &Host,
) -> Result<(), String> {
    for effect in effects {
        match effect {
            Effect::ExecCommand { command } => {
                tracing::info!("Executing: {}", command);
                host.manipulator.exec_command(&command)?;
            }
            Effect::FocusWindow { handle } => {
                if !registry.switch_to_application(host, handle) {
                    return Err(format!("Cannot focus window {}", handle));
                }
            }
        }
    }
    Ok(())
}

// Teleoperated command shaping
//
// Provides:
// - Per-axis deadband, response curve and slew-rate limiting
// - A declarative table of button bindings (one-shot, hold, combo)
// - Characterization sweeps
// - Composition of all of the above into one DriveRequest per tick

pub mod bindings;
mod composer;
pub mod shaper;
pub mod sweep;

pub use bindings::{Action, Binding, BindingSet, Condition, TriggerKind};
pub use composer::{Composition, DriveFrameComposer};
pub use shaper::{InputShaper, ShapedCommand};

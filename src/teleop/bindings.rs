// Declarative button bindings evaluated once per tick
//
// Every binding is {condition, trigger kind, action}. A single dispatcher walks the
// table in order, so the full binding set can be listed and tested.

use tracing::debug;

use crate::messages::{Button, JoystickSample, PovDirection};
use crate::teleop::sweep::SweepKind;

/// Input condition a binding watches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Button(Button),
    Pov(PovDirection),
    /// Both buttons held together; used to gate rarely used or hazardous actions
    Combo(Button, Button),
}

impl Condition {
    /// With no sample (watchdog tripped) every condition reads false
    pub fn is_met(&self, sample: Option<&JoystickSample>) -> bool {
        let Some(sample) = sample else {
            return false;
        };
        match *self {
            Condition::Button(button) => sample.is_pressed(button),
            Condition::Pov(direction) => sample.pov_direction() == Some(direction),
            Condition::Combo(first, second) => sample.is_pressed(first) && sample.is_pressed(second),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Fires once on the rising edge
    OneShot,
    /// Active exactly while the condition holds
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SeedFieldCentric,
    Brake,
    PointWheels,
    Nudge(PovDirection),
    Sweep(SweepKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub name: &'static str,
    pub condition: Condition,
    pub kind: TriggerKind,
    pub action: Action,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BindingState {
    #[default]
    Idle,
    Active,
}

/// Binding table plus the per-binding edge state
#[derive(Debug, Clone)]
pub struct BindingSet {
    bindings: Vec<Binding>,
    states: Vec<BindingState>,
    // Condition level seen on the previous tick, for one-shot edge detection
    was_met: Vec<bool>,
}

const fn binding(name: &'static str, condition: Condition, kind: TriggerKind, action: Action) -> Binding {
    Binding {
        name,
        condition,
        kind,
        action,
    }
}

/// Default driver bindings
pub const STANDARD_BINDINGS: [Binding; 11] = [
    binding(
        "seed_field_centric",
        Condition::Combo(Button::Back, Button::Start),
        TriggerKind::OneShot,
        Action::SeedFieldCentric,
    ),
    binding("nudge_forward", Condition::Pov(PovDirection::Up), TriggerKind::Hold, Action::Nudge(PovDirection::Up)),
    binding("nudge_back", Condition::Pov(PovDirection::Down), TriggerKind::Hold, Action::Nudge(PovDirection::Down)),
    binding("nudge_left", Condition::Pov(PovDirection::Left), TriggerKind::Hold, Action::Nudge(PovDirection::Left)),
    binding("nudge_right", Condition::Pov(PovDirection::Right), TriggerKind::Hold, Action::Nudge(PovDirection::Right)),
    binding("brake", Condition::Combo(Button::Back, Button::B), TriggerKind::Hold, Action::Brake),
    binding("point_wheels", Condition::Combo(Button::Back, Button::A), TriggerKind::Hold, Action::PointWheels),
    binding(
        "sweep_dynamic_forward",
        Condition::Combo(Button::Start, Button::A),
        TriggerKind::Hold,
        Action::Sweep(SweepKind::DynamicForward),
    ),
    binding(
        "sweep_dynamic_reverse",
        Condition::Combo(Button::Start, Button::B),
        TriggerKind::Hold,
        Action::Sweep(SweepKind::DynamicReverse),
    ),
    binding(
        "sweep_quasistatic_forward",
        Condition::Combo(Button::Start, Button::Y),
        TriggerKind::Hold,
        Action::Sweep(SweepKind::QuasistaticForward),
    ),
    binding(
        "sweep_quasistatic_reverse",
        Condition::Combo(Button::Start, Button::X),
        TriggerKind::Hold,
        Action::Sweep(SweepKind::QuasistaticReverse),
    ),
];

impl BindingSet {
    pub fn new(bindings: Vec<Binding>) -> Self {
        let count = bindings.len();
        Self {
            bindings,
            states: vec![BindingState::Idle; count],
            was_met: vec![false; count],
        }
    }

    pub fn standard() -> Self {
        Self::new(STANDARD_BINDINGS.to_vec())
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn states(&self) -> &[BindingState] {
        &self.states
    }

    /// Update every binding and return the actions that fire this tick, in table order.
    ///
    /// Hold bindings report their action on every tick the condition holds; one-shot
    /// bindings report it only on the tick the condition becomes true.
    pub fn evaluate(&mut self, sample: Option<&JoystickSample>) -> Vec<Action> {
        let mut fired = Vec::new();

        for (i, binding) in self.bindings.iter().enumerate() {
            let met = binding.condition.is_met(sample);
            let rising = met && !self.was_met[i];
            self.was_met[i] = met;

            match binding.kind {
                TriggerKind::Hold => {
                    let next = if met { BindingState::Active } else { BindingState::Idle };
                    if next != self.states[i] {
                        debug!("Binding {} -> {:?}", binding.name, next);
                    }
                    self.states[i] = next;
                    if met {
                        fired.push(binding.action);
                    }
                }
                TriggerKind::OneShot => {
                    if rising {
                        debug!("Binding {} fired", binding.name);
                        fired.push(binding.action);
                    }
                    // Active lasts only for the instant of firing
                    self.states[i] = BindingState::Idle;
                }
            }
        }

        fired
    }
}

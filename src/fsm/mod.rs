//! Function-pointer finite state machine for the pump control policy.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                      │
//! │  ┌──────────────────┬───────────┬──────────┬───────────────────┐ │
//! │  │ ControlMode      │ on_enter  │ on_exit  │ on_update         │ │
//! │  ├──────────────────┼───────────┼──────────┼───────────────────┤ │
//! │  │ Idle             │ fn(ctx)   │    -     │ fn(ctx)->Option<> │ │
//! │  │ Transferring     │ fn(ctx)   │    -     │ fn(ctx)->Option<> │ │
//! │  │ SaturatedActive  │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  │ SaturatedResting │ fn(ctx)   │    -     │ fn(ctx)->Option<> │ │
//! │  └──────────────────┴───────────┴──────────┴───────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each cycle the engine advances the phase timer by `dt`, stores the new
//! snapshot and calls `on_update` for the **current** mode.  If it returns
//! `Some(next)`, the engine runs `on_exit` for the current mode, resets the
//! phase timer, then runs `on_enter` for the next.  A sensor-critical
//! snapshot bypasses the table and forces `Idle`.
//!
//! Only the mode and the phase timer survive between cycles; both live
//! inside [`ControlStateMachine`] and change only in [`ControlStateMachine::step`].

pub mod context;
pub mod states;

use core::fmt;
use std::time::Duration;

use context::{FsmContext, PumpState, TemperatureSnapshot};
use log::{info, warn};
use serde::Serialize;

use crate::config::ControlConfig;
use crate::error::SensorCriticalFault;

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Enumeration of all control modes.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ControlMode {
    Idle = 0,
    Transferring = 1,
    SaturatedActive = 2,
    SaturatedResting = 3,
}

impl ControlMode {
    /// Total number of modes, used to size the table array.
    pub const COUNT: usize = 4;

    pub const ALL: [ControlMode; Self::COUNT] = [
        Self::Idle,
        Self::Transferring,
        Self::SaturatedActive,
        Self::SaturatedResting,
    ];

    /// Convert an index back to `ControlMode`.  Panics on out-of-range in
    /// debug builds; returns `Idle` in release (pumps-off fallback).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Transferring,
            2 => Self::SaturatedActive,
            3 => Self::SaturatedResting,
            _ => {
                debug_assert!(false, "invalid mode index: {idx}");
                Self::Idle
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Transferring => "Transferring",
            Self::SaturatedActive => "TankSaturated-Active",
            Self::SaturatedResting => "TankSaturated-Resting",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the per-cycle update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<ControlMode>;

/// Static descriptor for a single mode.  One row in the table.
pub struct StateDescriptor {
    pub id: ControlMode,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// Step result
// ---------------------------------------------------------------------------

/// What one control step decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Commanded pump outputs.
    pub pumps: PumpState,
    /// Mode after the step.
    pub mode: ControlMode,
    /// Set when the snapshot forced the fail-safe.
    pub fault: Option<SensorCriticalFault>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The controller instance: state table, current mode and context.
pub struct ControlStateMachine {
    /// Fixed-size table indexed by `ControlMode as usize`.
    table: [StateDescriptor; ControlMode::COUNT],
    current: usize,
    ctx: FsmContext,
}

impl ControlStateMachine {
    /// Construct a machine in `Idle`.  Call [`start`](Self::start) before
    /// the first step.
    pub fn new(config: ControlConfig) -> Self {
        Self {
            table: states::build_state_table(),
            current: ControlMode::Idle as usize,
            ctx: FsmContext::new(config),
        }
    }

    /// Run the initial `on_enter` for the starting mode.
    pub fn start(&mut self) -> ControlMode {
        info!("FSM starting in mode: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(&mut self.ctx);
        }
        self.mode()
    }

    /// Advance the machine by one control cycle.
    ///
    /// 1. Accumulate `dt` into the phase timer and store the snapshot.
    /// 2. If the snapshot is sensor-critical, force `Idle` with all pumps off.
    /// 3. Otherwise call `on_update`; on `Some(next)` run the transition
    ///    `on_exit(current)` → reset timer → `on_enter(next)`.
    pub fn step(&mut self, snapshot: TemperatureSnapshot, dt: Duration) -> StepOutcome {
        self.ctx.phase_elapsed = self.ctx.phase_elapsed.saturating_add(dt);
        self.ctx.total_steps = self.ctx.total_steps.wrapping_add(1);
        self.ctx.snapshot = snapshot;

        if let Some(fault) = snapshot.critical {
            warn!(
                "FSM fail-safe: {fault}, forcing {} with all pumps off (was {})",
                ControlMode::Idle,
                self.mode()
            );
            self.force_transition(ControlMode::Idle);
            self.ctx.commands = PumpState::all_off();
            return self.outcome(Some(fault));
        }

        let next = (self.table[self.current].on_update)(&mut self.ctx);
        if let Some(next_mode) = next {
            self.transition(next_mode);
        }

        self.outcome(None)
    }

    /// Force an immediate transition, bypassing `on_update`.
    pub fn force_transition(&mut self, next: ControlMode) {
        if next as usize != self.current {
            self.transition(next);
        }
    }

    pub fn mode(&self) -> ControlMode {
        ControlMode::from_index(self.current)
    }

    /// Time accumulated in the current phase.
    pub fn phase_elapsed(&self) -> Duration {
        self.ctx.phase_elapsed
    }

    pub fn commands(&self) -> PumpState {
        self.ctx.commands
    }

    pub fn last_snapshot(&self) -> &TemperatureSnapshot {
        &self.ctx.snapshot
    }

    pub fn total_steps(&self) -> u64 {
        self.ctx.total_steps
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn outcome(&self, fault: Option<SensorCriticalFault>) -> StepOutcome {
        StepOutcome {
            pumps: self.ctx.commands,
            mode: self.mode(),
            fault,
        }
    }

    fn transition(&mut self, next: ControlMode) {
        let next_idx = next as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(&mut self.ctx);
        }

        self.current = next_idx;
        self.ctx.phase_elapsed = Duration::ZERO;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(&mut self.ctx);
        }
    }
}

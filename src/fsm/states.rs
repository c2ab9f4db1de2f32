//! Concrete state handler functions and table builder.
//!
//! Each mode is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  IDLE ──[delta >= start]──▶ TRANSFERRING ──[tank >= saturation]──▶ SAT-ACTIVE
//!   ▲                           │                                        │   ▲
//!   └───────[delta < stop]──────┘                            [active time]  │
//!   ▲                                                                    ▼   │ [rest time]
//!   │                                                                SAT-RESTING
//!   │
//!   └──[delta < stop: SAT-ACTIVE at any time, SAT-RESTING after the rest time]
//!
//!  Any mode ──[sensor-critical fault]──▶ IDLE (forced by the engine)
//! ```

use super::context::{FsmContext, PumpState};
use super::{ControlMode, StateDescriptor};
use log::info;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; ControlMode::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: ControlMode::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: Transferring
        StateDescriptor {
            id: ControlMode::Transferring,
            name: "Transferring",
            on_enter: Some(transferring_enter),
            on_exit: None,
            on_update: transferring_update,
        },
        // Index 2: TankSaturated-Active
        StateDescriptor {
            id: ControlMode::SaturatedActive,
            name: "TankSaturated-Active",
            on_enter: Some(active_enter),
            on_exit: Some(active_exit),
            on_update: active_update,
        },
        // Index 3: TankSaturated-Resting
        StateDescriptor {
            id: ControlMode::SaturatedResting,
            name: "TankSaturated-Resting",
            on_enter: Some(resting_enter),
            on_exit: None,
            on_update: resting_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE: nothing worth collecting, every pump stopped
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    ctx.commands = PumpState::all_off();
    info!("IDLE: all pumps stopped");
}

fn idle_update(ctx: &mut FsmContext) -> Option<ControlMode> {
    if ctx.can_start_transfer() {
        return Some(ControlMode::Transferring);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  TRANSFERRING: loading the tank from the collector
// ═══════════════════════════════════════════════════════════════════════════

fn transferring_enter(ctx: &mut FsmContext) {
    ctx.commands = PumpState::transfer();
    info!(
        "TRANSFERRING: delta {:.1} °C, solar + exchanger on",
        ctx.snapshot.delta_c().unwrap_or(f32::NAN)
    );
}

fn transferring_update(ctx: &mut FsmContext) -> Option<ControlMode> {
    if !ctx.has_useful_heat() {
        return Some(ControlMode::Idle);
    }

    if ctx.tank_saturated() {
        info!(
            "TRANSFERRING: tank bottom {:.1} °C >= {:.1} °C, starting boiler duty cycle",
            ctx.snapshot.tank_bottom_c().unwrap_or(f32::NAN),
            ctx.config.saturation_temp_c
        );
        return Some(ControlMode::SaturatedActive);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  TANK SATURATED, ACTIVE: unloading surplus heat into the boiler tank
// ═══════════════════════════════════════════════════════════════════════════

fn active_enter(ctx: &mut FsmContext) {
    ctx.commands = PumpState::unload();
    info!(
        "SATURATED-ACTIVE: boiler pump on for {}s",
        ctx.config.active_duration_secs
    );
}

fn active_exit(ctx: &mut FsmContext) {
    ctx.commands.boiler = false;
}

fn active_update(ctx: &mut FsmContext) -> Option<ControlMode> {
    // Lost heat overrides the timer.
    if !ctx.has_useful_heat() {
        return Some(ControlMode::Idle);
    }

    if ctx.phase_elapsed >= ctx.config.active_duration() {
        return Some(ControlMode::SaturatedResting);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  TANK SATURATED, RESTING: everything stopped until the rest time is up
// ═══════════════════════════════════════════════════════════════════════════

fn resting_enter(ctx: &mut FsmContext) {
    ctx.commands = PumpState::all_off();
    info!(
        "SATURATED-RESTING: pumps stopped for {}s",
        ctx.config.rest_duration_secs
    );
}

fn resting_update(ctx: &mut FsmContext) -> Option<ControlMode> {
    if ctx.phase_elapsed < ctx.config.rest_duration() {
        return None;
    }

    if ctx.has_useful_heat() {
        Some(ControlMode::SaturatedActive)
    } else {
        Some(ControlMode::Idle)
    }
}

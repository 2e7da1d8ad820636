//! Runtime tests

use std::rc::Rc;

use crate::rollback::config::{RollbackConfig, SETUP_MESSAGE_FRAMES};
use crate::rollback::events::RollbackError;
use crate::rollback::hooks::Hooks;
use crate::system::device::{DEVICE_ANALOG, DEVICE_JOYPAD, DEVICE_NONE};
use crate::system::{GameInfo, LoadContentInfo, SavestateSupport, SimulationCore};
use crate::test_utils::{RecordingCallbacks, ToyCore, ToyCounters, ToyLoader};

use super::Runtime;

fn run_ahead_config(frames: u32) -> RollbackConfig {
    RollbackConfig {
        run_ahead_enabled: true,
        run_ahead_frames: frames,
        ..RollbackConfig::default()
    }
}

fn preempt_config(frames: u32) -> RollbackConfig {
    RollbackConfig {
        preemptive_frames: true,
        run_ahead_frames: frames,
        ..RollbackConfig::default()
    }
}

fn content() -> LoadContentInfo {
    LoadContentInfo::new(GameInfo::from_path("/roms/game.bin"))
}

fn loaded_runtime(config: RollbackConfig) -> Runtime<ToyCore> {
    let mut runtime = Runtime::new(ToyCore::new(), config);
    runtime.set_savestate_support(SavestateSupport::Deterministic);
    runtime.load_game(content()).unwrap();
    runtime
}

/// Runtime with a secondary loader, returns the secondary's counters
fn secondary_runtime(frames: u32) -> (Runtime<ToyCore>, Rc<ToyCounters>) {
    let loader = ToyLoader::new();
    let counters = loader.counters.clone();
    let config = RollbackConfig {
        secondary_instance: true,
        ..run_ahead_config(frames)
    };
    let mut runtime = Runtime::new(ToyCore::new(), config).with_loader(Box::new(loader));
    runtime.set_savestate_support(SavestateSupport::Deterministic);
    runtime.load_game(content()).unwrap();
    (runtime, counters)
}

fn counters(runtime: &Runtime<ToyCore>) -> &ToyCounters {
    &runtime.core().inner().counters
}

// ============================================================================
// Creation and content
// ============================================================================

#[test]
fn test_runtime_new() {
    let mut runtime = Runtime::new(ToyCore::new(), RollbackConfig::default());
    assert_eq!(runtime.frame_count(), 0);
    assert!(!runtime.strategy().is_preempt());
    assert!(runtime.strategy().run_ahead().unwrap().is_available());
    assert!(!runtime.secondary().exists());
    assert!(runtime.drain_notifications().is_empty());
    // Unreported capability level is allowed to try
    assert!(runtime.supports_rollback());
}

#[test]
fn test_load_game_failure_propagates() {
    let core = ToyCore::new();
    core.counters.fail_load.set(true);
    let mut runtime = Runtime::new(core, RollbackConfig::default());
    assert!(runtime.load_game(content()).is_err());
}

#[test]
fn test_contentless_load_passes_no_info() {
    let mut runtime = Runtime::new(ToyCore::new(), RollbackConfig::default());
    runtime.load_game(LoadContentInfo::contentless()).unwrap();
    assert_eq!(counters(&runtime).loaded_with.borrow().as_slice(), &[None]);
}

// ============================================================================
// Frame dispatch
// ============================================================================

#[test]
fn test_plain_step_when_run_ahead_disabled() {
    let mut runtime = loaded_runtime(RollbackConfig::default());
    let mut cb = RecordingCallbacks::with_input(2);

    runtime.run_frame(&mut cb);
    runtime.run_frame(&mut cb);

    assert_eq!(counters(&runtime).runs.get(), 2);
    assert_eq!(runtime.core().inner().counter(), 2);
    assert_eq!(runtime.core().hooks(), Hooks::empty());
    assert_eq!(cb.video_frames, 2);
    assert_eq!(runtime.frame_count(), 2);
}

#[test]
fn test_run_ahead_frame_uses_config() {
    let mut runtime = loaded_runtime(run_ahead_config(2));
    let mut cb = RecordingCallbacks::with_input(1);

    runtime.run_frame(&mut cb);

    assert_eq!(counters(&runtime).runs.get(), 3);
    assert_eq!(runtime.core().inner().counter(), 1);
    assert_eq!(runtime.core().hooks(), Hooks::all());
    assert_eq!(cb.last_shown().unwrap().counter, 3);
}

#[test]
fn test_rollback_refused_without_savestate_support() {
    let mut runtime = loaded_runtime(run_ahead_config(2));
    runtime.set_savestate_support(SavestateSupport::Basic);
    let mut cb = RecordingCallbacks::new();

    runtime.run_frame(&mut cb);
    runtime.run_frame(&mut cb);

    assert!(!runtime.supports_rollback());
    assert_eq!(counters(&runtime).runs.get(), 2);
    assert_eq!(counters(&runtime).serializes.get(), 0);
    let notes = runtime.drain_notifications();
    assert_eq!(notes.len(), 1);
    assert!(!notes[0].on_screen);
}

#[test]
fn test_unallocatable_run_ahead_states_degrade_to_plain_steps() {
    let mut runtime = Runtime::new(ToyCore::new().with_state_size(usize::MAX), run_ahead_config(2));
    runtime.set_savestate_support(SavestateSupport::Deterministic);
    runtime.load_game(content()).unwrap();
    let mut cb = RecordingCallbacks::with_input(3);

    runtime.run_frame(&mut cb);
    runtime.run_frame(&mut cb);

    let runahead = runtime.strategy().run_ahead().unwrap();
    assert!(!runahead.is_available());
    assert!(!runahead.is_created());
    assert_eq!(runtime.core().hooks(), Hooks::empty());
    assert_eq!(counters(&runtime).runs.get(), 2);
    assert_eq!(cb.last_shown().unwrap().counter, 2);

    let notes = runtime.drain_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].message, RollbackError::AllocationFailed.to_string());
    assert_eq!(notes[0].duration_frames, SETUP_MESSAGE_FRAMES);
}

#[test]
fn test_user_load_marks_input_dirty() {
    let mut runtime = loaded_runtime(run_ahead_config(1));
    let mut cb = RecordingCallbacks::new();
    runtime.run_frame(&mut cb);

    let mut buf = vec![0; runtime.serialize_size()];
    runtime.save_state(&mut buf).unwrap();
    runtime.core_mut().tracker_mut().clear_input_dirty();

    runtime.load_state(&buf).unwrap();
    assert!(runtime.core().tracker().is_input_dirty());
}

#[test]
fn test_reset_marks_input_dirty() {
    let mut runtime = loaded_runtime(run_ahead_config(1));
    let mut cb = RecordingCallbacks::new();
    runtime.run_frame(&mut cb);
    runtime.core_mut().tracker_mut().clear_input_dirty();

    runtime.reset();
    assert!(runtime.core().tracker().is_input_dirty());
    assert_eq!(runtime.core().inner().counter(), 0);
}

// ============================================================================
// Secondary instance
// ============================================================================

#[test]
fn test_secondary_loads_recorded_content() {
    let (mut runtime, secondary) = secondary_runtime(2);
    let mut cb = RecordingCallbacks::new();

    runtime.run_frame(&mut cb);

    assert!(runtime.secondary().exists());
    assert_eq!(
        secondary.loaded_with.borrow().as_slice(),
        &[Some(GameInfo::from_path("/roms/game.bin"))]
    );
}

#[test]
fn test_port_devices_reach_secondary() {
    let (mut runtime, secondary) = secondary_runtime(2);
    let mut cb = RecordingCallbacks::new();

    runtime.set_controller_port_device(0, DEVICE_ANALOG);
    runtime.set_controller_port_device(3, DEVICE_JOYPAD);
    assert_eq!(
        counters(&runtime).port_devices.borrow().as_slice(),
        &[(0, DEVICE_ANALOG), (3, DEVICE_JOYPAD)]
    );

    runtime.run_frame(&mut cb);
    // Port 3 is beyond the two configured users
    assert_eq!(
        secondary.port_devices.borrow().as_slice(),
        &[(0, DEVICE_ANALOG), (3, DEVICE_NONE)]
    );

    runtime.set_controller_port_device(1, DEVICE_JOYPAD);
    assert_eq!(secondary.port_devices.borrow().last(), Some(&(1, DEVICE_JOYPAD)));
}

#[test]
fn test_unload_tears_down_sessions_first() {
    let (mut runtime, secondary) = secondary_runtime(2);
    let mut cb = RecordingCallbacks::new();
    runtime.run_frame(&mut cb);
    assert!(runtime.strategy().run_ahead().unwrap().is_created());

    runtime.unload_game();

    assert!(!runtime.secondary().exists());
    assert_eq!(secondary.unloads.get(), 1);
    assert_eq!(secondary.deinits.get(), 1);
    assert_eq!(counters(&runtime).unloads.get(), 1);
    assert_eq!(runtime.core().hooks(), Hooks::empty());
    assert!(!runtime.strategy().run_ahead().unwrap().is_created());
    assert!(runtime.core().shadow().is_none());

    runtime.deinit();
    assert_eq!(counters(&runtime).deinits.get(), 1);
    // Already unloaded
    assert_eq!(counters(&runtime).unloads.get(), 1);
}

#[test]
fn test_direct_core_unload_ends_run_ahead_session() {
    let (mut runtime, secondary) = secondary_runtime(2);
    let mut cb = RecordingCallbacks::with_input(1);
    runtime.run_frame(&mut cb);
    assert!(runtime.secondary().exists());

    SimulationCore::unload_game(runtime.core_mut());
    assert_eq!(runtime.core().hooks(), Hooks::empty());

    cb.set_input(9);
    runtime.run_frame(&mut cb);
    // Torn down, then rebuilt from scratch with live input recorded again
    assert_eq!(secondary.deinits.get(), 1);
    assert!(runtime.strategy().run_ahead().unwrap().is_created());
    assert_eq!(runtime.core().hooks(), Hooks::all());
    assert!(runtime.core().shadow().is_some());
    assert_eq!(cb.last_shown().unwrap().last_input, 9);
}

#[test]
fn test_reload_forgets_previous_content() {
    let (mut runtime, secondary) = secondary_runtime(2);
    let mut cb = RecordingCallbacks::new();
    runtime.run_frame(&mut cb);

    runtime.load_game(LoadContentInfo::contentless()).unwrap();
    assert!(!runtime.secondary().exists());
    assert_eq!(runtime.frame_count(), 0);

    runtime.run_frame(&mut cb);
    assert_eq!(secondary.loaded_with.borrow().last(), Some(&None));
}

// ============================================================================
// Preemptive frames
// ============================================================================

#[test]
fn test_preempt_starts_after_load() {
    let mut runtime = loaded_runtime(preempt_config(2));
    let mut cb = RecordingCallbacks::new();

    runtime.run_frame(&mut cb);

    let preempt = runtime.strategy().preempt().unwrap();
    assert_eq!(preempt.frames(), 2);
    assert_eq!(preempt.frame_count(), 1);
    // Warm-up step before the first real one
    assert_eq!(counters(&runtime).runs.get(), 2);
}

#[test]
fn test_preempt_replaces_run_ahead_session() {
    let mut runtime = loaded_runtime(run_ahead_config(2));
    let mut cb = RecordingCallbacks::new();
    runtime.run_frame(&mut cb);
    assert_eq!(runtime.core().hooks(), Hooks::all());

    runtime.set_config(RollbackConfig {
        preemptive_frames: true,
        ..run_ahead_config(2)
    });
    runtime.run_frame(&mut cb);

    assert!(runtime.strategy().is_preempt());
    assert_eq!(runtime.core().hooks(), Hooks::empty());
    assert!(runtime.core().shadow().is_none());
}

#[test]
fn test_disabling_preempt_restores_run_ahead() {
    let mut runtime = loaded_runtime(preempt_config(2));
    let mut cb = RecordingCallbacks::new();
    runtime.run_frame(&mut cb);
    assert!(runtime.strategy().is_preempt());

    runtime.set_config(RollbackConfig::default());

    let runahead = runtime.strategy().run_ahead().unwrap();
    assert!(runahead.is_available());
    assert!(!runahead.is_created());
}

#[test]
fn test_preempt_init_failure_notifies() {
    let mut runtime = loaded_runtime(preempt_config(2));
    runtime.set_savestate_support(SavestateSupport::Serialized);
    let mut cb = RecordingCallbacks::new();

    runtime.run_frame(&mut cb);

    assert!(!runtime.strategy().is_preempt());
    let notes = runtime.drain_notifications();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].on_screen);
    assert_eq!(notes[0].duration_frames, SETUP_MESSAGE_FRAMES);
    // Still one plain step per frame
    assert_eq!(counters(&runtime).runs.get(), 1);
}

#[test]
fn test_preempt_init_failure_hidden() {
    let config = RollbackConfig {
        hide_warnings: true,
        ..preempt_config(2)
    };
    let mut runtime = Runtime::new(ToyCore::new().with_state_size(0), config);
    runtime.load_game(content()).unwrap();
    let mut cb = RecordingCallbacks::new();

    runtime.run_frame(&mut cb);

    let notes = runtime.drain_notifications();
    assert_eq!(notes.len(), 1);
    assert!(!notes[0].on_screen);
}

#[test]
fn test_preempt_run_failure_falls_back() {
    let mut runtime = loaded_runtime(preempt_config(2));
    let mut cb = RecordingCallbacks::new();
    runtime.run_frame(&mut cb);

    counters(&runtime).fail_serialize.set(true);
    runtime.run_frame(&mut cb);
    assert!(!runtime.strategy().is_preempt());
    assert_eq!(runtime.drain_notifications().len(), 1);

    // Plain stepping from now on
    let runs = counters(&runtime).runs.get();
    runtime.run_frame(&mut cb);
    assert_eq!(counters(&runtime).runs.get(), runs + 1);
    assert!(runtime.av().video_active());
}

#[test]
fn test_preempt_needs_content() {
    let mut runtime = Runtime::new(ToyCore::new(), preempt_config(2));
    let mut cb = RecordingCallbacks::new();
    assert!(!runtime.enable_preempt(&mut cb));
    assert!(!runtime.strategy().is_preempt());
    assert!(runtime.drain_notifications().is_empty());
}

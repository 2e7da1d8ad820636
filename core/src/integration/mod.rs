//! Integration tests for the rollback execution core
//!
//! Drive a toy core through [`Runtime`](crate::runtime::Runtime) the way a
//! frontend would, one display frame at a time.


#[cfg(test)]
pub(crate) mod test_utils {
    use crate::rollback::config::RollbackConfig;
    use crate::runtime::Runtime;
    use crate::system::{GameInfo, LoadContentInfo, SavestateSupport, SimulationCore};
    use crate::test_utils::{RecordingCallbacks, ToyCore};

    /// Runtime over a fresh toy core with content loaded
    pub fn loaded_runtime(config: RollbackConfig) -> Runtime<ToyCore> {
        let mut runtime = Runtime::new(ToyCore::new(), config);
        runtime.set_savestate_support(SavestateSupport::Deterministic);
        runtime
            .load_game(LoadContentInfo::new(GameInfo::from_path("game.bin")))
            .unwrap();
        runtime
    }

    /// Serialized state of a plain toy core stepped once per input
    pub fn reference_state(inputs: &[i16]) -> Vec<u8> {
        let mut core = ToyCore::new();
        let mut cb = RecordingCallbacks::new();
        for &input in inputs {
            cb.set_input(input);
            core.run(&mut cb);
        }
        core.state_bytes()
    }
}

//! The quantum scheduler.
//!
//! A quantum is a bounded burst of simulator steps. It ends when:
//! - the instruction budget is exhausted ([`QuantumResult::Completed`]),
//! - the wall-clock deadline passes ([`QuantumResult::TimedOut`]),
//! - the active [`StopCondition`] matches the PC ([`QuantumResult::StoppedAt`]).
//!
//! Progress made before the end of the quantum is never rolled back.
//!
//! The budget and period of a quantum are derived from the simulator's clock frequency
//! and the target refresh rate of the display (see [`Quantum::new`]).
use std::time::{Duration, Instant};

use crate::err::SimErr;

use super::debug::{BreakpointRegistry, StopCondition};
use super::{Addr, Simulator};

/// The default number of quanta per second.
pub const DEFAULT_REFRESH_HZ: u32 = 5;

/// The outcome of a quantum.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum QuantumResult {
    /// The whole instruction budget was executed.
    Completed,
    /// The wall-clock deadline passed before the budget was exhausted.
    ///
    /// This is not an error: it indicates the simulator runs slower than the refresh rate.
    TimedOut,
    /// The stop condition matched the PC after a step.
    StoppedAt(Addr),
}

/// The bounds of a quantum.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Quantum {
    /// The maximum number of instructions executed.
    pub budget: u64,
    /// The maximum wall-clock time.
    pub period: Duration,
}
impl Quantum {
    /// Computes the quantum for a simulator running at `frequency` Hz
    /// and a display refreshing `target_refresh_hz` times per second.
    ///
    /// ```
    /// use std::time::Duration;
    /// use bass_debugger::sim::quantum::Quantum;
    ///
    /// let q = Quantum::new(1_000_000, 5);
    /// assert_eq!(q.budget, 200_000);
    /// assert_eq!(q.period, Duration::from_millis(200));
    /// ```
    pub fn new(frequency: u64, target_refresh_hz: u32) -> Self {
        // a refresh rate of 0 would never refresh; treat it as 1 Hz
        let hz = target_refresh_hz.max(1);
        Self {
            budget: instruction_budget(frequency, hz),
            period: Duration::from_millis(1000 / u64::from(hz)),
        }
    }
}

/// Computes `floor(frequency / target_refresh_hz)`.
///
/// A refresh rate of 0 is treated as 1 Hz.
pub fn instruction_budget(frequency: u64, target_refresh_hz: u32) -> u64 {
    frequency / u64::from(target_refresh_hz.max(1))
}

/// Runs one quantum, with a deadline of `quantum.period` from now.
///
/// See [`run_quantum_until`].
pub fn run_quantum(
    sim: &mut dyn Simulator,
    quantum: &Quantum,
    cond: &StopCondition,
    breakpoints: &BreakpointRegistry
) -> Result<QuantumResult, SimErr> {
    run_quantum_until(sim, quantum.budget, Instant::now() + quantum.period, cond, breakpoints)
}

/// Runs at most `budget` steps of the simulator.
///
/// After each step, the stop condition is checked first, then the deadline,
/// so a step reaching a stop address always stops even if the deadline passed.
/// If the simulator fails to step, the error is returned and the steps
/// executed before it are kept.
pub fn run_quantum_until(
    sim: &mut dyn Simulator,
    budget: u64,
    deadline: Instant,
    cond: &StopCondition,
    breakpoints: &BreakpointRegistry
) -> Result<QuantumResult, SimErr> {
    for _ in 0..budget {
        sim.step()?;

        let pc = sim.pc();
        log::trace!("stepped to {pc:08x}");
        if cond.check(pc, breakpoints) {
            return Ok(QuantumResult::StoppedAt(pc));
        }
        if Instant::now() >= deadline {
            return Ok(QuantumResult::TimedOut);
        }
    }

    Ok(QuantumResult::Completed)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{instruction_budget, run_quantum, run_quantum_until, Quantum, QuantumResult};
    use crate::sim::debug::{BreakpointRegistry, StopCondition};
    use crate::sim::testing::{Op, ScriptSim};
    use crate::sim::Simulator;

    const LONG: Duration = Duration::from_secs(3600);

    fn far() -> Instant {
        Instant::now() + LONG
    }

    #[test]
    fn test_budget() {
        assert_eq!(instruction_budget(1_000_000, 5), 200_000);
        assert_eq!(instruction_budget(7, 2), 3);
        assert_eq!(instruction_budget(3, 5), 0);
        assert_eq!(instruction_budget(10, 0), 10);
        assert_eq!(Quantum::new(50_000_000, 10).period, Duration::from_millis(100));
    }

    #[test]
    fn test_stop_on_breakpoint() {
        let mut sim = ScriptSim::linear(0x1000);
        let mut bps = BreakpointRegistry::new();
        bps.add(0x1010);

        let result = run_quantum_until(&mut sim, 100, far(), &StopCondition::Breakpoints, &bps);
        assert_eq!(result, Ok(QuantumResult::StoppedAt(0x1010)));
        assert_eq!(sim.steps, 4);
        assert_eq!(sim.pc(), 0x1010);
    }

    #[test]
    fn test_pc_not_checked_before_first_step() {
        // a breakpoint at the current PC does not stop the quantum immediately
        let mut sim = ScriptSim::linear(0x1000);
        let mut bps = BreakpointRegistry::new();
        bps.add(0x1000);
        bps.add(0x1008);

        let result = run_quantum_until(&mut sim, 100, far(), &StopCondition::Breakpoints, &bps);
        assert_eq!(result, Ok(QuantumResult::StoppedAt(0x1008)));
        assert_eq!(sim.steps, 2);
    }

    #[test]
    fn test_completed() {
        let mut sim = ScriptSim::linear(0x1000);
        let bps = BreakpointRegistry::new();

        let result = run_quantum_until(&mut sim, 10, far(), &StopCondition::Breakpoints, &bps);
        assert_eq!(result, Ok(QuantumResult::Completed));
        assert_eq!(sim.steps, 10);

        // breakpoint beyond the budget is not reached
        let mut bps = BreakpointRegistry::new();
        bps.add(0x1000 + 4 * 30);
        let result = run_quantum_until(&mut sim, 10, far(), &StopCondition::Breakpoints, &bps);
        assert_eq!(result, Ok(QuantumResult::Completed));
        assert_eq!(sim.steps, 20);
    }

    #[test]
    fn test_timed_out() {
        let mut sim = ScriptSim::linear(0x1000);
        let bps = BreakpointRegistry::new();
        let q = Quantum { budget: 50, period: Duration::ZERO };

        // progress is kept: one step was made before the deadline was noticed
        let result = run_quantum(&mut sim, &q, &StopCondition::Breakpoints, &bps);
        assert_eq!(result, Ok(QuantumResult::TimedOut));
        assert_eq!(sim.steps, 1);
        assert_eq!(sim.pc(), 0x1004);
    }

    #[test]
    fn test_stop_wins_over_deadline() {
        let mut sim = ScriptSim::linear(0x1000);
        let mut bps = BreakpointRegistry::new();
        bps.add(0x1004);
        let q = Quantum { budget: 50, period: Duration::ZERO };

        let result = run_quantum(&mut sim, &q, &StopCondition::Breakpoints, &bps);
        assert_eq!(result, Ok(QuantumResult::StoppedAt(0x1004)));
        assert_eq!(sim.steps, 1);

        let result = run_quantum(&mut sim, &q, &StopCondition::ExactAddress(0x1008), &bps);
        assert_eq!(result, Ok(QuantumResult::StoppedAt(0x1008)));
        assert_eq!(sim.steps, 2);
    }

    #[test]
    fn test_exact_address_ignores_breakpoints() {
        // 0x1000: call 0x2000
        // 0x1004: nop           <- step-over target
        // 0x2000: nop           <- breakpoint inside the call
        // 0x2004: ret
        let mut sim = ScriptSim::new(0x1000, [
            (0x1000, Op::Call(0x2000)),
            (0x1004, Op::Nop),
            (0x2000, Op::Nop),
            (0x2004, Op::Ret),
        ]);
        let mut bps = BreakpointRegistry::new();
        bps.add(0x2000);

        let target = sim.next_pc();
        assert_eq!(target, 0x1004);
        let result = run_quantum_until(&mut sim, 100, far(), &StopCondition::ExactAddress(target), &bps);
        assert_eq!(result, Ok(QuantumResult::StoppedAt(0x1004)));
        assert_eq!(sim.steps, 3);
    }

    #[test]
    fn test_step_error_keeps_progress() {
        let mut sim = ScriptSim::new(0x0, [
            (0x0, Op::Nop),
            (0x4, Op::Nop),
            (0x8, Op::Fault),
        ]);
        let bps = BreakpointRegistry::new();

        let result = run_quantum_until(&mut sim, 100, far(), &StopCondition::Breakpoints, &bps);
        assert!(result.is_err());
        assert_eq!(sim.steps, 2);
        assert_eq!(sim.pc(), 0x8);
    }
}

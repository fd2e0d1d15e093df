//! Running a [`DebugSession`] on a worker thread.
//!
//! The [`SessionDriver`] moves the session onto a thread which owns it exclusively.
//! Other threads act on the session by submitting closures with [`SessionDriver::call`].
//!
//! While the session is running, the worker executes one quantum per period of the
//! configured refresh rate. Commands are only applied between quanta, so a command never
//! observes the simulator or the breakpoints in the middle of a quantum, and a pause
//! takes effect before the next quantum starts.
//!
//! ```no_run
//! use bass_debugger::session::DebugSession;
//! use bass_debugger::session::driver::{DriverEvent, SessionDriver};
//!
//! let driver = SessionDriver::spawn(DebugSession::default());
//! driver.call(|s| s.go_on()).unwrap().unwrap();
//!
//! for event in driver.events().iter() {
//!     if let DriverEvent::Halted(pc) = event {
//!         println!("stopped at {pc:08x}");
//!         break;
//!     }
//! }
//! let _session = driver.shutdown().unwrap();
//! ```
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel as cbc;

use crate::err::DriverErr;
use crate::sim::observer::Delta;
use crate::sim::quantum::QuantumResult;
use crate::sim::{Addr, RegId};

use super::DebugSession;

type Job = Box<dyn FnOnce(&mut DebugSession) + Send>;

/// What the worker reports after executing quanta.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DriverEvent {
    /// A quantum ended.
    Quantum {
        /// How it ended.
        result: QuantumResult,
        /// The registers which changed during the quantum.
        registers: Delta<RegId, u32>,
        /// The memory window cells which changed during the quantum, by window id.
        windows: Vec<(usize, Delta<usize, i64>)>,
    },
    /// Execution halted at the given PC, either on the stop condition or on a failure.
    Halted(Addr),
    /// The simulator failed while executing a quantum.
    Failed(String),
}

/// Handle to a worker thread owning a [`DebugSession`].
#[derive(Debug)]
pub struct SessionDriver {
    jobs: Option<cbc::Sender<Job>>,
    events: cbc::Receiver<DriverEvent>,
    handle: Option<JoinHandle<DebugSession>>,
}
impl SessionDriver {
    /// Moves the session to a new worker thread.
    pub fn spawn(session: DebugSession) -> Self {
        let (jobs_tx, jobs_rx) = cbc::unbounded();
        let (events_tx, events_rx) = cbc::unbounded();

        let handle = std::thread::spawn(move || work(session, jobs_rx, events_tx));
        Self {
            jobs: Some(jobs_tx),
            events: events_rx,
            handle: Some(handle),
        }
    }

    /// Runs a closure on the session and waits for its result.
    pub fn call<R: Send + 'static>(&self, f: impl FnOnce(&mut DebugSession) -> R + Send + 'static) -> Result<R, DriverErr> {
        let jobs = self.jobs.as_ref().ok_or(DriverErr)?;
        let (tx, rx) = cbc::bounded(1);

        let job: Job = Box::new(move |session: &mut DebugSession| {
            // the caller may have given up waiting
            let _ = tx.send(f(session));
        });
        jobs.send(job).map_err(|_| DriverErr)?;
        rx.recv().map_err(|_| DriverErr)
    }

    /// The events reported by the worker.
    pub fn events(&self) -> &cbc::Receiver<DriverEvent> {
        &self.events
    }

    /// Stops the simulation, ends the worker thread and returns the session.
    pub fn shutdown(mut self) -> Result<DebugSession, DriverErr> {
        self.jobs.take();
        self.handle.take()
            .ok_or(DriverErr)?
            .join()
            .map_err(|_| DriverErr)
    }
}
impl Drop for SessionDriver {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn work(mut session: DebugSession, jobs: cbc::Receiver<Job>, events: cbc::Sender<DriverEvent>) -> DebugSession {
    let period = session.config().quantum(0).period;
    let ticker = cbc::tick(period);
    let idle = cbc::never::<Instant>();
    log::debug!("session driver started, quantum period {period:?}");

    loop {
        let ticks = match session.is_running() {
            true  => &ticker,
            false => &idle,
        };

        cbc::select! {
            recv(jobs) -> job => match job {
                Ok(job) => job(&mut session),
                Err(_) => break,
            },
            recv(ticks) -> _ => {
                let result = session.tick();
                let halted = !session.is_running();

                match result {
                    Ok(Some(result)) => {
                        let registers = session.refresh_registers().unwrap_or_default();
                        let windows = session.refresh_windows();
                        let _ = events.send(DriverEvent::Quantum { result, registers, windows });
                    },
                    Ok(None) => {},
                    Err(e) => {
                        let _ = events.send(DriverEvent::Failed(e.to_string()));
                    },
                }
                if let Some(pc) = session.pc().filter(|_| halted) {
                    let _ = events.send(DriverEvent::Halted(pc));
                }
            },
        }
    }

    session.stop();
    log::debug!("session driver stopped");
    session
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use super::{DriverEvent, SessionDriver};
    use crate::disasm::Disassembly;
    use crate::err::DisasmErr;
    use crate::session::{CompileOutput, DebugSession, Project, SessionConfig, SessionState};
    use crate::sim::quantum::QuantumResult;
    use crate::sim::testing::ScriptSim;
    use crate::sim::Simulator;

    const WAIT: Duration = Duration::from_secs(10);

    /// Executes a straight line of instructions from 0.
    struct LineProject;
    impl Project for LineProject {
        fn name(&self) -> &str {
            "line"
        }

        fn exec_path(&self) -> PathBuf {
            PathBuf::from("line.elf")
        }

        fn new_sim(&self) -> Box<dyn Simulator> {
            Box::new(ScriptSim::unloaded(0, Arc::default(), Arc::default()))
        }

        fn compile(&mut self) -> std::io::Result<CompileOutput> {
            Ok(CompileOutput { success: true, ..Default::default() })
        }

        fn disassembly(&mut self) -> Result<Disassembly, DisasmErr> {
            Ok(Disassembly::default())
        }
    }

    fn spawn() -> SessionDriver {
        // 1000 Hz simulator at 100 Hz: 10 instructions every 10 ms
        let mut session = DebugSession::new(SessionConfig { target_refresh_hz: 100, ..Default::default() });
        session.open_project(Box::new(LineProject));
        session.compile().unwrap();
        session.start().unwrap();
        SessionDriver::spawn(session)
    }

    #[test]
    fn test_run_to_breakpoint() {
        let driver = spawn();
        driver.call(|s| {
            s.toggle_breakpoint(4 * 25);
            s.go_on()
        }).unwrap().unwrap();

        let mut quanta = vec![];
        loop {
            match driver.events().recv_timeout(WAIT).unwrap() {
                DriverEvent::Quantum { result, .. } => quanta.push(result),
                DriverEvent::Halted(pc) => {
                    assert_eq!(pc, 100);
                    break;
                },
                DriverEvent::Failed(e) => panic!("{e}"),
            }
        }
        assert_eq!(quanta, [QuantumResult::Completed, QuantumResult::Completed, QuantumResult::StoppedAt(100)]);

        let (state, cycles) = driver.call(|s| (s.state(), s.cycle_count())).unwrap();
        assert_eq!(state, SessionState::Paused);
        assert_eq!(cycles, Some(25));
    }

    #[test]
    fn test_pause_between_quanta() {
        let driver = spawn();
        driver.call(|s| s.go_on()).unwrap().unwrap();

        let first = driver.events().recv_timeout(WAIT).unwrap();
        assert!(matches!(first, DriverEvent::Quantum { result: QuantumResult::Completed, .. }));

        let cycles = driver.call(|s| {
            s.pause();
            s.cycle_count()
        }).unwrap();
        // whole quanta only
        assert_eq!(cycles.map(|c| c % 10), Some(0));

        driver.events().try_iter().for_each(drop);
        assert!(driver.events().recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(driver.call(|s| s.cycle_count()).unwrap(), cycles);
    }

    #[test]
    fn test_shutdown_stops() {
        let driver = spawn();
        driver.call(|s| s.go_on()).unwrap().unwrap();

        let session = driver.shutdown().unwrap();
        assert_eq!(session.state(), SessionState::ProjectOpen { compiled: true });
    }
}

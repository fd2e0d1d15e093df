//! The debug session, the state machine the user interface binds its actions to.
//!
//! A [`DebugSession`] owns the project, the simulator handle, the breakpoint registry and the
//! active [`StopCondition`]. Its states are:
//!
//! ```text
//! NoProject --open_project--> ProjectOpen(not compiled) --compile--> ProjectOpen(compiled)
//!                                                                         |    ^
//!                                                                     start    stop
//!                                                                         v    |
//!                 step, reset  +-----------------------------------> Paused ---+
//!                              |                                     |    ^
//!                              +-------------------------------------+    |
//!                                          go_on, step_over, run_to  |    | stop condition hit, pause
//!                                                                    v    |
//!                                                                   Running
//! ```
//!
//! Recompiling from any state stops the simulation first.
//!
//! While running, the session does not execute anything on its own:
//! the host calls [`DebugSession::tick`] periodically (every [`Quantum::period`]),
//! and each call runs exactly one quantum. [`driver::SessionDriver`] does this on a worker thread.
//!
//! ```no_run
//! use bass_debugger::session::{DebugSession, MakeProject, SessionConfig};
//! # use bass_debugger::sim::Simulator;
//! # fn new_sim() -> Box<dyn Simulator> { unimplemented!() }
//!
//! let mut session = DebugSession::new(SessionConfig::default());
//! session.open_project(Box::new(MakeProject::new("hello", "projects/hello", "main.elf", new_sim)));
//!
//! let output = session.compile().unwrap();
//! if output.success {
//!     session.start().unwrap();
//!     session.go_on().unwrap();
//!     while session.is_running() {
//!         session.tick().unwrap();
//!     }
//!     println!("stopped at {:08x}", session.pc().unwrap());
//! }
//! ```
pub mod driver;
mod project;

use std::collections::BTreeMap;

use crossbeam_channel as cbc;

use crate::disasm::Disassembly;
use crate::err::{SessionErr, SimErr};
use crate::sim::addr::AddrExpr;
use crate::sim::debug::{BreakpointRegistry, StopCondition};
use crate::sim::mem::{MemDisplay, MemWindow};
use crate::sim::observer::Delta;
use crate::sim::quantum::{self, Quantum, QuantumResult, DEFAULT_REFRESH_HZ};
use crate::sim::regs::{RegDisplay, RegisterView};
use crate::sim::{Addr, RegId, Simulator};

pub use project::{CompileOutput, Diagnostic, MakeProject, Project};

/// Configuration of a [`DebugSession`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SessionConfig {
    /// The number of quanta (and therefore display refreshes) per second while running.
    ///
    /// A value of 0 is treated as 1.
    pub target_refresh_hz: u32,

    /// The symbols which receive a breakpoint after every successful compilation.
    ///
    /// Symbols missing from the program are skipped.
    pub auto_breakpoints: &'static [&'static str],
}
impl SessionConfig {
    /// The quantum for a simulator running at `frequency` Hz.
    pub fn quantum(&self, frequency: u64) -> Quantum {
        Quantum::new(frequency, self.target_refresh_hz)
    }
}
impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_refresh_hz: DEFAULT_REFRESH_HZ,
            auto_breakpoints: &["main", "_exit"]
        }
    }
}

/// The state of a [`DebugSession`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum SessionState {
    /// No project is open.
    NoProject,
    /// A project is open and the simulation is not started.
    ProjectOpen {
        /// Whether the last compilation succeeded.
        compiled: bool
    },
    /// The simulation is started and waiting for an action.
    Paused,
    /// The simulation is started and executing quanta.
    Running,
}
impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::NoProject => f.write_str("no project is open"),
            SessionState::ProjectOpen { compiled: false } => f.write_str("the project is not compiled"),
            SessionState::ProjectOpen { compiled: true }  => f.write_str("the simulation is stopped"),
            SessionState::Paused  => f.write_str("paused"),
            SessionState::Running => f.write_str("running"),
        }
    }
}

/// A guarded action of a [`DebugSession`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Action {
    /// [`DebugSession::compile`]
    Compile,
    /// [`DebugSession::start`]
    Start,
    /// [`DebugSession::step`]
    Step,
    /// [`DebugSession::step_over`]
    StepOver,
    /// [`DebugSession::run_to`]
    RunTo,
    /// [`DebugSession::go_on`]
    GoOn,
    /// [`DebugSession::reset`]
    Reset,
    /// [`DebugSession::set_register`]
    SetRegister,
    /// [`DebugSession::open_window`]
    OpenWindow,
}
impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Action::Compile     => "compile",
            Action::Start       => "start",
            Action::Step        => "step",
            Action::StepOver    => "step over",
            Action::RunTo       => "run to",
            Action::GoOn        => "go on",
            Action::Reset       => "reset",
            Action::SetRegister => "set register",
            Action::OpenWindow  => "open memory window",
        })
    }
}

/// Notifications published by a [`DebugSession`] to its subscribers.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SessionEvent {
    /// A project was opened.
    ProjectOpened(String),
    /// A compilation finished.
    Compiled {
        /// Whether it succeeded.
        success: bool
    },
    /// The simulation started.
    Started,
    /// The simulation returned to the entry point.
    Reset,
    /// The simulation stopped.
    Stopped,
    /// Execution resumed until the given condition.
    Resumed(StopCondition),
    /// Execution is paused at the given PC.
    Paused(Addr),
    /// The timed-out diagnostic flag changed.
    TimedOut(bool),
    /// A user-visible error message.
    Error(String),
}

/// The debugger execution-control engine.
pub struct DebugSession {
    config: SessionConfig,
    project: Option<Box<dyn Project>>,
    sim: Option<Box<dyn Simulator>>,
    disasm: Option<Disassembly>,

    compiled: bool,
    started: bool,
    running: bool,
    timed_out: bool,
    cycle_origin: u64,
    cycle_count: Option<u64>,
    quantum: Quantum,
    cursor: Option<Addr>,

    stop_cond: StopCondition,
    breakpoints: BreakpointRegistry,
    registers: Option<RegisterView>,
    windows: BTreeMap<usize, MemWindow>,
    next_window: usize,

    subscribers: Vec<cbc::Sender<SessionEvent>>,
}
impl DebugSession {
    /// Creates a session with no project.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            project: None,
            sim: None,
            disasm: None,
            compiled: false,
            started: false,
            running: false,
            timed_out: false,
            cycle_origin: 0,
            cycle_count: None,
            quantum: config.quantum(0),
            cursor: None,
            stop_cond: StopCondition::default(),
            breakpoints: BreakpointRegistry::new(),
            registers: None,
            windows: BTreeMap::new(),
            next_window: 0,
            subscribers: vec![],
        }
    }

    /// Subscribes to the events of this session.
    pub fn subscribe(&mut self) -> cbc::Receiver<SessionEvent> {
        let (tx, rx) = cbc::unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn guard(&self, action: Action, allowed: bool) -> Result<(), SessionErr> {
        match allowed {
            true => Ok(()),
            false => {
                let state = self.state();
                log::error!("rejected {action} while {state}");
                Err(SessionErr::InvalidTransition { action, state })
            }
        }
    }

    fn sim_ref(&self) -> Result<&dyn Simulator, SessionErr> {
        self.sim.as_deref().ok_or(SessionErr::NoProject)
    }

    fn sim_mut(&mut self) -> Result<&mut dyn Simulator, SessionErr> {
        match self.sim.as_deref_mut() {
            Some(sim) => Ok(sim),
            None => Err(SessionErr::NoProject),
        }
    }

    //// STATE ////

    /// The current state.
    pub fn state(&self) -> SessionState {
        match (self.project.is_some(), self.started, self.running) {
            (false, _, _) => SessionState::NoProject,
            (true, false, _) => SessionState::ProjectOpen { compiled: self.compiled },
            (true, true, false) => SessionState::Paused,
            (true, true, true) => SessionState::Running,
        }
    }

    /// The configuration of this session.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The name of the open project.
    pub fn project_name(&self) -> Option<&str> {
        self.project.as_deref().map(|p| p.name())
    }

    /// Whether the last compilation succeeded.
    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Whether the simulation is started.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether quanta are being executed.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the simulation is started and not running.
    pub fn is_paused(&self) -> bool {
        self.started && !self.running
    }

    /// Whether the last quantum hit its deadline before exhausting its instruction budget.
    ///
    /// This indicates the simulator is slower than the target refresh rate.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// The number of cycles executed since the simulation started or was reset.
    pub fn cycle_count(&self) -> Option<u64> {
        self.cycle_count
    }

    /// The current quantum.
    pub fn quantum(&self) -> &Quantum {
        &self.quantum
    }

    /// The PC of the started simulation.
    pub fn pc(&self) -> Option<Addr> {
        self.sim.as_deref()
            .filter(|_| self.started)
            .map(|s| s.pc())
    }

    /// The run-to target.
    pub fn cursor(&self) -> Option<Addr> {
        self.cursor
    }

    /// Sets the run-to target.
    pub fn set_cursor(&mut self, cursor: Option<Addr>) {
        self.cursor = cursor;
    }

    /// The active stop condition.
    pub fn stop_condition(&self) -> StopCondition {
        self.stop_cond
    }

    /// The breakpoints.
    pub fn breakpoints(&self) -> &BreakpointRegistry {
        &self.breakpoints
    }

    /// The breakpoints, to subscribe to or edit.
    pub fn breakpoints_mut(&mut self) -> &mut BreakpointRegistry {
        &mut self.breakpoints
    }

    /// Adds a breakpoint at the address if there is none, removes it otherwise.
    ///
    /// Returns whether there is a breakpoint at the address afterwards.
    pub fn toggle_breakpoint(&mut self, addr: Addr) -> bool {
        let set = self.breakpoints.toggle(addr);
        log::debug!("breakpoint at {addr:08x} {}", if set { "set" } else { "removed" });
        set
    }

    /// The disassembly of the last successful compilation.
    pub fn disassembly(&self) -> Option<&Disassembly> {
        self.disasm.as_ref()
    }

    /// The simulator handle of the open project.
    pub fn simulator(&self) -> Option<&dyn Simulator> {
        self.sim.as_deref()
    }

    fn update_cycles(&mut self) {
        if !self.started {
            return;
        }
        if let Some(sim) = self.sim.as_deref() {
            self.cycle_count = Some(sim.date().saturating_sub(self.cycle_origin));
        }
    }

    fn set_timed_out(&mut self, timed_out: bool) {
        if self.timed_out == timed_out {
            return;
        }
        if timed_out {
            log::warn!("simulation cannot keep up with {} Hz refresh", self.config.target_refresh_hz);
        }
        self.timed_out = timed_out;
        self.emit(SessionEvent::TimedOut(timed_out));
    }

    //// PROJECT ////

    /// Opens a project, closing the current one.
    ///
    /// This acquires a fresh simulator handle for the project, which is not loaded yet.
    /// The breakpoints of the previous project are cleared.
    pub fn open_project(&mut self, project: Box<dyn Project>) {
        self.stop();

        let name = project.name().to_string();
        log::info!("opened project {name}");

        self.sim = Some(project.new_sim());
        self.project = Some(project);
        self.compiled = false;
        self.disasm = None;
        self.cursor = None;
        self.breakpoints.clear();
        self.emit(SessionEvent::ProjectOpened(name));
    }

    /// Compiles the project.
    ///
    /// A running or paused simulation is stopped first, and the cursor is cleared.
    /// A build that fails is not an error: it is reported in the returned [`CompileOutput`].
    ///
    /// On success, the auto-breakpoints of the previous compilation are replaced
    /// by breakpoints at the configured symbols.
    pub fn compile(&mut self) -> Result<CompileOutput, SessionErr> {
        if self.project.is_none() {
            return Err(SessionErr::NoProject);
        }
        self.stop();
        self.compiled = false;
        self.cursor = None;
        self.disasm = None;

        let Some(project) = self.project.as_deref_mut() else {
            return Err(SessionErr::NoProject);
        };
        log::info!("compiling {}", project.name());
        let output = match project.compile() {
            Ok(out) => out,
            Err(e) => {
                log::error!("cannot run build: {e}");
                return Err(SessionErr::Compile(e));
            }
        };

        if output.success {
            match project.disassembly() {
                Ok(disasm) => {
                    self.place_auto_breakpoints(&disasm);
                    self.disasm = Some(disasm);
                },
                Err(e) => {
                    log::warn!("{e}");
                    self.breakpoints.replace_auto([]);
                    self.emit(SessionEvent::Error(e.to_string()));
                },
            }
            self.compiled = true;
        } else {
            log::info!("build failed");
        }

        self.emit(SessionEvent::Compiled { success: output.success });
        Ok(output)
    }

    fn place_auto_breakpoints(&mut self, disasm: &Disassembly) {
        let addrs: Vec<_> = self.config.auto_breakpoints.iter()
            .filter_map(|&name| {
                let addr = disasm.find_label(name);
                if addr.is_none() {
                    log::debug!("no symbol {name:?}, skipping its breakpoint");
                }
                addr
            })
            .collect();

        self.breakpoints.replace_auto(addrs);
    }

    //// SIMULATION ////

    /// Starts the simulation of the compiled project.
    ///
    /// The simulator is reset and the executable is loaded.
    /// If loading fails, the session stays stopped and compiled.
    pub fn start(&mut self) -> Result<(), SessionErr> {
        if self.project.is_none() {
            return Err(SessionErr::NoProject);
        }
        self.guard(Action::Start, self.compiled && !self.started)?;

        let (Some(project), Some(sim)) = (self.project.as_deref(), self.sim.as_deref_mut()) else {
            return Err(SessionErr::NoProject);
        };
        let path = project.exec_path();
        sim.reset();
        if let Err(e) = sim.load(&path) {
            log::error!("cannot load {}: {e}", path.display());
            self.emit(SessionEvent::Error(e.to_string()));
            return Err(SessionErr::SimulationLoad(e));
        }

        let mut quantum = self.config.quantum(sim.frequency());
        // a simulator slower than the refresh rate still advances one step per quantum
        quantum.budget = quantum.budget.max(1);
        log::debug!("quantum: {} instructions in {:?}", quantum.budget, quantum.period);

        self.cycle_origin = sim.date();
        self.registers = Some(RegisterView::new(sim));
        self.quantum = quantum;
        self.cycle_count = Some(0);
        self.started = true;
        self.running = false;
        self.cursor = None;
        self.stop_cond = StopCondition::default();
        self.set_timed_out(false);

        log::info!("simulation started");
        self.emit(SessionEvent::Started);
        Ok(())
    }

    /// Stops the simulation.
    ///
    /// The loaded image is released, and the register view and memory windows are closed.
    /// This does nothing if the simulation is not started.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        if let Some(sim) = self.sim.as_deref_mut() {
            sim.release();
        }

        self.started = false;
        self.running = false;
        self.set_timed_out(false);
        self.cycle_count = None;
        self.stop_cond = StopCondition::default();
        self.registers = None;
        self.windows.clear();

        log::info!("simulation stopped");
        self.emit(SessionEvent::Stopped);
    }

    /// Executes a single instruction.
    pub fn step(&mut self) -> Result<(), SessionErr> {
        self.guard(Action::Step, self.is_paused())?;

        let result = self.sim_mut()?.step();
        self.update_cycles();
        match result {
            Ok(()) => {
                if let Some(pc) = self.pc() {
                    log::trace!("stepped to {pc:08x}");
                    self.emit(SessionEvent::Paused(pc));
                }
                Ok(())
            },
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Runs until the instruction following the current one.
    ///
    /// Breakpoints are ignored, so stepping over a call does not stop inside it.
    pub fn step_over(&mut self) -> Result<(), SessionErr> {
        self.guard(Action::StepOver, self.is_paused())?;
        let target = self.sim_ref()?.next_pc();
        self.resume(StopCondition::ExactAddress(target));
        Ok(())
    }

    /// Runs until the cursor. Breakpoints are ignored.
    pub fn run_to(&mut self) -> Result<(), SessionErr> {
        self.guard(Action::RunTo, self.is_paused())?;
        let target = self.cursor.ok_or(SessionErr::NoRunToTarget)?;
        self.resume(StopCondition::ExactAddress(target));
        Ok(())
    }

    /// Runs until a breakpoint.
    pub fn go_on(&mut self) -> Result<(), SessionErr> {
        self.guard(Action::GoOn, self.is_paused())?;
        self.resume(StopCondition::Breakpoints);
        Ok(())
    }

    fn resume(&mut self, cond: StopCondition) {
        log::info!("running until {cond:?}");
        self.stop_cond = cond;
        self.running = true;
        self.emit(SessionEvent::Resumed(cond));
    }

    /// Pauses execution. This does nothing if the session is not running.
    pub fn pause(&mut self) {
        if !self.running {
            return;
        }
        log::info!("paused");
        self.halt();
    }

    fn halt(&mut self) {
        self.running = false;
        self.stop_cond = StopCondition::default();
        if let Some(pc) = self.pc() {
            self.emit(SessionEvent::Paused(pc));
        }
    }

    fn fail(&mut self, e: SimErr) -> SessionErr {
        log::error!("{e}");
        self.emit(SessionEvent::Error(e.to_string()));
        self.halt();
        SessionErr::Simulation(e)
    }

    /// Returns the simulation to the entry point, reloading the executable.
    ///
    /// If reloading fails, the simulation is stopped.
    pub fn reset(&mut self) -> Result<(), SessionErr> {
        self.guard(Action::Reset, self.is_paused())?;

        let (Some(project), Some(sim)) = (self.project.as_deref(), self.sim.as_deref_mut()) else {
            return Err(SessionErr::NoProject);
        };
        let path = project.exec_path();
        sim.reset();
        if let Err(e) = sim.load(&path) {
            log::error!("cannot reload {}: {e}", path.display());
            self.emit(SessionEvent::Error(e.to_string()));
            self.stop();
            return Err(SessionErr::SimulationLoad(e));
        }

        self.cycle_origin = sim.date();
        self.registers = Some(RegisterView::new(sim));
        self.cycle_count = Some(0);
        self.set_timed_out(false);

        log::info!("simulation reset");
        self.emit(SessionEvent::Reset);
        Ok(())
    }

    /// Executes one quantum if the session is running.
    ///
    /// This returns `Ok(None)` without doing anything if the session is not running.
    /// If the stop condition is hit or the simulator fails, the session pauses.
    pub fn tick(&mut self) -> Result<Option<QuantumResult>, SessionErr> {
        if !self.running {
            return Ok(None);
        }
        let Some(sim) = self.sim.as_deref_mut() else {
            return Err(SessionErr::NoProject);
        };

        let result = quantum::run_quantum(sim, &self.quantum, &self.stop_cond, &self.breakpoints);
        self.update_cycles();

        let result = match result {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e)),
        };
        log::debug!("quantum ended: {result:?}");
        match result {
            QuantumResult::Completed => self.set_timed_out(false),
            QuantumResult::TimedOut  => self.set_timed_out(true),
            QuantumResult::StoppedAt(pc) => {
                log::info!("stopped at {pc:08x}");
                self.set_timed_out(false);
                self.halt();
            },
        }
        Ok(Some(result))
    }

    //// REGISTERS ////

    /// Reads the registers and reports what changed since the last refresh.
    ///
    /// This returns `None` if the simulation is not started.
    pub fn refresh_registers(&mut self) -> Option<Delta<RegId, u32>> {
        let (Some(view), Some(sim)) = (self.registers.as_mut(), self.sim.as_deref()) else {
            return None;
        };
        Some(view.refresh(sim))
    }

    /// The register view of the started simulation.
    pub fn register_view(&self) -> Option<&RegisterView> {
        self.registers.as_ref()
    }

    /// Changes how a register is displayed.
    pub fn set_register_display(&mut self, reg: RegId, display: RegDisplay) {
        if let Some(view) = self.registers.as_mut() {
            view.set_display(reg, display);
        }
    }

    /// Writes a register of the paused simulation.
    pub fn set_register(&mut self, reg: RegId, value: u32) -> Result<(), SessionErr> {
        self.guard(Action::SetRegister, self.is_paused())?;
        log::debug!("set register {reg:?} to {value:#x}");
        self.sim_mut()?.set_register(reg, value);
        Ok(())
    }

    //// MEMORY WINDOWS ////

    /// Opens a memory window on an address expression (see [`AddrExpr`]).
    ///
    /// Returns the id of the new window.
    pub fn open_window(&mut self, expr: &str, count: usize, display: MemDisplay) -> Result<usize, SessionErr> {
        self.guard(Action::OpenWindow, self.started)?;
        let parsed: AddrExpr = expr.parse()?;
        let addr = parsed.resolve(self.disasm.as_ref(), self.sim_ref()?)
            .ok_or_else(|| SessionErr::UnresolvedAddr(expr.to_string()))?;

        self.open_window_at(addr, count, display)
    }

    /// Opens a memory window showing `count` values from `addr`.
    ///
    /// Returns the id of the new window.
    pub fn open_window_at(&mut self, addr: Addr, count: usize, display: MemDisplay) -> Result<usize, SessionErr> {
        self.guard(Action::OpenWindow, self.started)?;
        let window = MemWindow::new(self.sim_ref()?, addr, count, display)
            .ok_or(SessionErr::WindowOutOfRange { addr, count })?;

        let id = self.next_window;
        self.next_window += 1;
        log::debug!("opened memory window {id} at {:08x} ({} cells)", window.base(), window.len());
        self.windows.insert(id, window);
        Ok(id)
    }

    /// Closes a memory window. Returns whether the window existed.
    pub fn close_window(&mut self, id: usize) -> bool {
        self.windows.remove(&id).is_some()
    }

    /// Gets an open memory window.
    pub fn window(&self, id: usize) -> Option<&MemWindow> {
        self.windows.get(&id)
    }

    /// Reads a memory window and reports which cells changed since its last refresh.
    pub fn refresh_window(&mut self, id: usize) -> Result<Delta<usize, i64>, SessionErr> {
        let window = self.windows.get_mut(&id).ok_or(SessionErr::UnknownWindow(id))?;
        let sim = self.sim.as_deref().ok_or(SessionErr::NoProject)?;
        Ok(window.refresh(sim))
    }

    /// Refreshes every open memory window.
    pub fn refresh_windows(&mut self) -> Vec<(usize, Delta<usize, i64>)> {
        let Some(sim) = self.sim.as_deref() else { return vec![] };
        self.windows.iter_mut()
            .map(|(&id, w)| (id, w.refresh(sim)))
            .collect()
    }
}
impl Default for DebugSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
impl std::fmt::Debug for DebugSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSession")
            .field("project", &self.project_name())
            .field("state", &self.state())
            .field("pc", &self.pc().map(|pc| format!("{pc:08x}")))
            .field("cycle_count", &self.cycle_count)
            .field("stop_cond", &self.stop_cond)
            .field("breakpoints", &self.breakpoints)
            .field("windows", &self.windows.len())
            .finish_non_exhaustive()
    }
}

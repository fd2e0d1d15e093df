//! Execution control for the BASS assembly training console.
//!
//! This crate decides, instruction by instruction, whether a simulated program keeps running,
//! how long it may run before yielding control to the display, and when it must stop.
//! It also turns full reads of the registers and memory into minimal deltas, so the display
//! only redraws what changed.
//!
//! Instruction decoding and semantics are not part of this crate: they are provided
//! by an external simulator implementing [`sim::Simulator`]. Building the program is
//! provided by a [`session::Project`].
//!
//! # Usage
//!
//! A [`session::DebugSession`] is the state machine user actions are bound to:
//! ```no_run
//! use bass_debugger::session::{DebugSession, MakeProject};
//! # use bass_debugger::sim::Simulator;
//! # fn arm_simulator() -> Box<dyn Simulator> { unimplemented!() }
//!
//! let mut session = DebugSession::default();
//! session.open_project(Box::new(MakeProject::new("hello", "projects/hello", "main.elf", arm_simulator)));
//!
//! // Compiling places breakpoints on `main` and `_exit`.
//! let output = session.compile().unwrap();
//! for d in output.diagnostics() {
//!     eprintln!("{}:{}: {}", d.file, d.line, d.message);
//! }
//!
//! session.start().unwrap();
//! session.go_on().unwrap();
//!
//! // Each tick runs one quantum, until a breakpoint is hit.
//! while session.is_running() {
//!     session.tick().unwrap();
//!     let delta = session.refresh_registers().unwrap();
//!     println!("{} registers changed", delta.changed.len());
//! }
//! ```
//!
//! To run the session off the UI thread, see [`session::driver::SessionDriver`].
#![warn(missing_docs)]

pub mod sim;
pub mod session;
pub mod disasm;
pub mod err;

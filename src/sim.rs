//! The simulator boundary and the execution-control machinery around it.
//!
//! Instruction decoding and semantics are owned by an external instruction-set simulator.
//! This crate only sees it through the [`Simulator`] trait, and builds on top of it:
//! - [`debug`]: The breakpoint registry and the stop conditions checked after each step.
//! - [`quantum`]: The quantum scheduler, which runs a bounded burst of steps.
//! - [`observer`]: The change tracker, which turns full snapshots into deltas.
//! - [`regs`]: The register view, tracking and formatting the register file.
//! - [`mem`]: Memory windows, tracking and formatting ranges of memory.
//! - [`addr`]: Address expressions used to open memory windows.
//!
//! # Implementing a simulator
//!
//! A simulator must be able to step one instruction at a time and report its program counter.
//! The address of the instruction after the current one ([`Simulator::next_pc`]) is used
//! to implement step-over.
//!
//! ```
//! use std::path::Path;
//! use bass_debugger::err::SimErr;
//! use bass_debugger::sim::{Addr, RegId, RegisterDesc, Simulator};
//!
//! /// Executes a flat sequence of 4-byte `NOP`s.
//! struct NopSim { pc: Addr, date: u64 }
//! impl Simulator for NopSim {
//!     fn load(&mut self, _path: &Path) -> Result<(), SimErr> { Ok(()) }
//!     fn reset(&mut self) { self.pc = 0; self.date = 0; }
//!     fn release(&mut self) {}
//!     fn step(&mut self) -> Result<(), SimErr> {
//!         self.pc += 4;
//!         self.date += 1;
//!         Ok(())
//!     }
//!     fn pc(&self) -> Addr { self.pc }
//!     fn next_pc(&self) -> Addr { self.pc + 4 }
//!     fn registers(&self) -> &[RegisterDesc] { &[] }
//!     fn get_register(&self, _reg: RegId) -> u32 { 0 }
//!     fn set_register(&mut self, _reg: RegId, _value: u32) {}
//!     fn get_byte(&self, _addr: Addr) -> u8 { 0 }
//!     fn get_half(&self, _addr: Addr) -> u16 { 0 }
//!     fn get_word(&self, _addr: Addr) -> u32 { 0 }
//!     fn date(&self) -> u64 { self.date }
//!     fn frequency(&self) -> u64 { 1_000_000 }
//! }
//!
//! let mut sim = NopSim { pc: 0, date: 0 };
//! sim.step().unwrap();
//! assert_eq!(sim.pc(), 4);
//! ```
pub mod debug;
pub mod quantum;
pub mod observer;
pub mod regs;
pub mod mem;
pub mod addr;
#[cfg(test)]
pub(crate) mod testing;

use std::path::Path;

use crate::err::SimErr;
use regs::RegDisplay;

/// A location in the simulator's memory or program.
pub type Addr = u32;

/// Identifies a register as a bank and an index within that bank.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RegId {
    /// The register bank.
    pub bank: u16,
    /// The index of the register in its bank.
    pub index: u16,
}
impl RegId {
    /// Creates a new register id.
    pub const fn new(bank: u16, index: u16) -> Self {
        Self { bank, index }
    }
}

/// Description of one register exposed by a simulator.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RegisterDesc {
    /// The name displayed to the user (e.g., `R0`, `sp`, `CPSR`).
    pub name: String,
    /// The id used to read and write the register.
    pub id: RegId,
    /// The format this register is displayed in until the user picks another.
    pub display: RegDisplay,
}

/// The external instruction-set simulator.
///
/// A handle is exclusively owned by one [`DebugSession`] at a time.
/// Its lifecycle is:
/// - created unloaded by [`Project::new_sim`],
/// - [`Simulator::load`] installs a program image,
/// - [`Simulator::reset`] returns to the entry point with memory and registers reinitialized,
/// - [`Simulator::release`] drops the loaded image (the handle may be reset and loaded again).
///
/// [`DebugSession`]: crate::session::DebugSession
/// [`Project::new_sim`]: crate::session::Project::new_sim
pub trait Simulator: Send {
    /// Loads the executable image at the given path.
    fn load(&mut self, path: &Path) -> Result<(), SimErr>;
    /// Reinitializes memory and registers and returns to the entry point.
    fn reset(&mut self);
    /// Drops the loaded image.
    fn release(&mut self);
    /// Executes one instruction.
    fn step(&mut self) -> Result<(), SimErr>;
    /// The address of the instruction about to execute.
    fn pc(&self) -> Addr;
    /// The address following the instruction about to execute.
    fn next_pc(&self) -> Addr;

    /// The registers of this simulator, in display order.
    fn registers(&self) -> &[RegisterDesc];
    /// Reads a register.
    fn get_register(&self, reg: RegId) -> u32;
    /// Writes a register.
    fn set_register(&mut self, reg: RegId, value: u32);

    /// Reads the byte at the address.
    fn get_byte(&self, addr: Addr) -> u8;
    /// Reads the 16-bit half-word at the address.
    fn get_half(&self, addr: Addr) -> u16;
    /// Reads the 32-bit word at the address.
    fn get_word(&self, addr: Addr) -> u32;

    /// The cycle counter.
    fn date(&self) -> u64;
    /// The simulated clock frequency, in Hz.
    fn frequency(&self) -> u64;
}
impl dyn Simulator {} // assert Simulator is dyn safe

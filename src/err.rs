//! Error interface for this crate.
//!
//! Every fallible operation of the crate returns one of these types:
//! - [`SimErr`]: raised by the external simulator while loading or stepping.
//! - [`DisasmErr`]: raised while producing or parsing a disassembly.
//! - [`AddrExprErr`]: raised while parsing a memory window address expression.
//! - [`SessionErr`]: raised by the [`DebugSession`] actions.
//! - [`DriverErr`]: raised when the background [`SessionDriver`] is unreachable.
//!
//! [`DebugSession`]: crate::session::DebugSession
//! [`SessionDriver`]: crate::session::driver::SessionDriver

use crate::session::{Action, SessionState};
use crate::sim::Addr;

/// Errors raised by the simulator collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimErr {
    /// The executable image could not be loaded.
    Load(String),
    /// The simulator failed to execute an instruction.
    Step(String),
    /// The simulator was used without a loaded image.
    NotLoaded,
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::Load(m)   => write!(f, "cannot load executable: {m}"),
            SimErr::Step(m)   => write!(f, "simulation failed: {m}"),
            SimErr::NotLoaded => f.write_str("no executable is loaded in the simulator"),
        }
    }
}
impl std::error::Error for SimErr {}

/// Errors raised while building a [`Disassembly`].
///
/// [`Disassembly`]: crate::disasm::Disassembly
#[derive(Debug)]
pub enum DisasmErr {
    /// The disassembler could not be run.
    Io(std::io::Error),
    /// The disassembler ran, but reported a failure.
    Failed(String),
}
impl std::fmt::Display for DisasmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisasmErr::Io(e)     => write!(f, "cannot run disassembler: {e}"),
            DisasmErr::Failed(m) => write!(f, "disassembly failed: {m}"),
        }
    }
}
impl std::error::Error for DisasmErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DisasmErr::Io(e) => Some(e),
            DisasmErr::Failed(_) => None,
        }
    }
}
impl From<std::io::Error> for DisasmErr {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Any errors raised in attempting to parse an address expression.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum AddrExprErr {
    /// The expression contains a character that is not part of any token.
    #[default]
    InvalidToken,
    /// The expression has no base (e.g., it is empty or starts with `+`).
    MissingBase,
    /// The offset after `+` or `-` is missing.
    MissingOffset,
    /// The offset after `+` or `-` is not a hexadecimal number.
    InvalidOffset,
    /// Tokens remain after the offset.
    TrailingTokens,
}
impl std::fmt::Display for AddrExprErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddrExprErr::InvalidToken   => f.write_str("invalid character in address"),
            AddrExprErr::MissingBase    => f.write_str("address is missing a base"),
            AddrExprErr::MissingOffset  => f.write_str("address is missing an offset after the sign"),
            AddrExprErr::InvalidOffset  => f.write_str("address offset must be hexadecimal"),
            AddrExprErr::TrailingTokens => f.write_str("unexpected text after address offset"),
        }
    }
}
impl std::error::Error for AddrExprErr {}

/// Errors raised by the actions of a [`DebugSession`].
///
/// [`DebugSession`]: crate::session::DebugSession
#[derive(Debug)]
pub enum SessionErr {
    /// The image failed to load or start.
    ///
    /// This is recoverable: the session stays compiled and
    /// the action can be retried or the project recompiled.
    SimulationLoad(SimErr),
    /// An action was invoked while its state guard is false.
    ///
    /// This indicates an enablement bug in the caller.
    InvalidTransition {
        /// The rejected action.
        action: Action,
        /// The state the session was in.
        state: SessionState,
    },
    /// The simulator failed while executing. The session is paused.
    Simulation(SimErr),
    /// No project is open.
    NoProject,
    /// Run-to was requested with no cursor set.
    NoRunToTarget,
    /// The build command could not be run.
    Compile(std::io::Error),
    /// An address expression could not be parsed.
    AddrExpr(AddrExprErr),
    /// An address expression did not resolve to an address.
    UnresolvedAddr(String),
    /// No memory window has the given id.
    UnknownWindow(usize),
    /// A memory window would extend past the end of the address space.
    WindowOutOfRange {
        /// The requested start address.
        addr: Addr,
        /// The requested number of cells.
        count: usize,
    },
}
impl std::fmt::Display for SessionErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionErr::SimulationLoad(e) => write!(f, "cannot start simulation: {e}"),
            SessionErr::InvalidTransition { action, state } => write!(f, "{action} is not allowed while {state}"),
            SessionErr::Simulation(e)     => e.fmt(f),
            SessionErr::NoProject         => f.write_str("no project is open"),
            SessionErr::NoRunToTarget     => f.write_str("no position selected to run to"),
            SessionErr::Compile(e)        => write!(f, "cannot run build: {e}"),
            SessionErr::AddrExpr(e)       => e.fmt(f),
            SessionErr::UnresolvedAddr(s) => write!(f, "cannot resolve address {s:?}"),
            SessionErr::UnknownWindow(id) => write!(f, "no memory window with id {id}"),
            SessionErr::WindowOutOfRange { addr, count } => write!(f, "{count} cells from {addr:08x} do not fit in memory"),
        }
    }
}
impl std::error::Error for SessionErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionErr::SimulationLoad(e) => Some(e),
            SessionErr::Simulation(e)     => Some(e),
            SessionErr::Compile(e)        => Some(e),
            SessionErr::AddrExpr(e)       => Some(e),
            _ => None
        }
    }
}
impl From<AddrExprErr> for SessionErr {
    fn from(value: AddrExprErr) -> Self {
        Self::AddrExpr(value)
    }
}

/// The background driver thread has exited and can no longer take commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverErr;
impl std::fmt::Display for DriverErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("session driver has shut down")
    }
}
impl std::error::Error for DriverErr {}

//! Utilities to decide where execution stops.
//!
//! The key types here are:
//! - [`BreakpointRegistry`]: the observable set of breakpoint addresses.
//! - [`StopCondition`]: the condition checked against the PC after every step.
//!
//! Views that display breakpoints subscribe to the registry,
//! either with a [`BreakpointListener`] or through a channel (see [`BreakpointRegistry::subscribe`]).
//!
//! ```
//! use bass_debugger::sim::debug::{BreakpointEvent, BreakpointRegistry, StopCondition};
//!
//! let mut bps = BreakpointRegistry::new();
//! let events = bps.subscribe();
//!
//! bps.add(0x8010);
//! assert!(StopCondition::Breakpoints.check(0x8010, &bps));
//! assert!(!StopCondition::Breakpoints.check(0x8014, &bps));
//! assert!(StopCondition::ExactAddress(0x8014).check(0x8014, &bps));
//!
//! assert_eq!(events.try_recv(), Ok(BreakpointEvent::Added(0x8010)));
//! ```
use std::collections::BTreeSet;
use std::fmt::Write;

use crossbeam_channel as cbc;

use super::Addr;

/// The condition under which a quantum stops.
///
/// There is a single active condition per session.
/// It is [`StopCondition::Breakpoints`] by default and is replaced
/// transiently by step-over and run-to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StopCondition {
    /// Break when the PC is a member of the breakpoint registry.
    #[default]
    Breakpoints,
    /// Break when the PC is equal to the given value.
    ///
    /// The breakpoint registry is ignored while this is active.
    ExactAddress(Addr),
}
impl StopCondition {
    /// Checks if a break should occur at the given PC.
    pub fn check(&self, pc: Addr, breakpoints: &BreakpointRegistry) -> bool {
        match *self {
            StopCondition::Breakpoints => breakpoints.contains(pc),
            StopCondition::ExactAddress(target) => target == pc,
        }
    }
}
impl std::fmt::Debug for StopCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StopCondition(")?;
        match self {
            Self::Breakpoints => f.write_str("PC in breakpoints")?,
            Self::ExactAddress(a) => write!(f, "PC == {a:08x}")?,
        }
        f.write_char(')')
    }
}

/// A change to a [`BreakpointRegistry`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BreakpointEvent {
    /// A breakpoint was added at the address.
    Added(Addr),
    /// The breakpoint at the address was removed.
    Removed(Addr),
    /// All breakpoints were removed.
    Cleared,
}

/// An observer of a [`BreakpointRegistry`].
///
/// This is used to keep a visual marker in sync with the registry
/// without the registry knowing anything about rendering.
pub trait BreakpointListener: Send {
    /// Called after a breakpoint is added.
    fn on_add(&mut self, addr: Addr);
    /// Called after a breakpoint is removed.
    fn on_remove(&mut self, addr: Addr);
    /// Called after all breakpoints are removed.
    fn on_clear(&mut self);

    /// Whether this listener should keep receiving events.
    ///
    /// Listeners which return false are dropped from the registry.
    fn is_alive(&self) -> bool {
        true
    }
}
impl dyn BreakpointListener {} // assert BreakpointListener is dyn safe

/// A listener forwarding every event to a channel.
///
/// The listener is dropped once the receiving end is disconnected.
#[derive(Debug)]
pub struct ChannelListener {
    tx: cbc::Sender<BreakpointEvent>,
    alive: bool
}
impl ChannelListener {
    /// Creates a listener sending to the given channel.
    pub fn new(tx: cbc::Sender<BreakpointEvent>) -> Self {
        Self { tx, alive: true }
    }

    fn send(&mut self, event: BreakpointEvent) {
        if self.tx.send(event).is_err() {
            self.alive = false;
        }
    }
}
impl BreakpointListener for ChannelListener {
    fn on_add(&mut self, addr: Addr) {
        self.send(BreakpointEvent::Added(addr));
    }

    fn on_remove(&mut self, addr: Addr) {
        self.send(BreakpointEvent::Removed(addr));
    }

    fn on_clear(&mut self) {
        self.send(BreakpointEvent::Cleared);
    }

    fn is_alive(&self) -> bool {
        self.alive
    }
}

/// The set of addresses execution stops at.
///
/// Entries are either user-placed or auto-placed (inserted after a successful compilation).
/// The auto tag is not stored per entry: the registry remembers the addresses it auto-inserted
/// and removes them at the next [`BreakpointRegistry::replace_auto`].
/// An address that is both user-placed and auto-placed is a single entry,
/// and is treated as auto (and therefore removed by the next `replace_auto`).
#[derive(Default)]
pub struct BreakpointRegistry {
    set: BTreeSet<Addr>,
    auto: BTreeSet<Addr>,
    listeners: Vec<Box<dyn BreakpointListener>>
}
impl BreakpointRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a listener, which receives every subsequent change.
    pub fn add_listener(&mut self, listener: impl BreakpointListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Creates a channel receiving every subsequent change.
    pub fn subscribe(&mut self) -> cbc::Receiver<BreakpointEvent> {
        let (tx, rx) = cbc::unbounded();
        self.add_listener(ChannelListener::new(tx));
        rx
    }

    fn notify(&mut self, mut f: impl FnMut(&mut dyn BreakpointListener)) {
        for l in &mut self.listeners {
            f(&mut **l);
        }
        self.listeners.retain(|l| l.is_alive());
    }

    /// Adds a breakpoint, returning whether it was newly inserted.
    pub fn add(&mut self, addr: Addr) -> bool {
        let inserted = self.set.insert(addr);
        if inserted {
            self.notify(|l| l.on_add(addr));
        }
        inserted
    }

    /// Removes a breakpoint, returning whether it was present.
    pub fn remove(&mut self, addr: Addr) -> bool {
        let removed = self.set.remove(&addr);
        if removed {
            self.auto.remove(&addr);
            self.notify(|l| l.on_remove(addr));
        }
        removed
    }

    /// Adds the breakpoint if it is absent or removes it if it is present.
    ///
    /// This returns whether the breakpoint is present afterwards.
    pub fn toggle(&mut self, addr: Addr) -> bool {
        match self.contains(addr) {
            true  => !self.remove(addr),
            false => self.add(addr),
        }
    }

    /// Whether there is a breakpoint at the address.
    pub fn contains(&self, addr: Addr) -> bool {
        self.set.contains(&addr)
    }

    /// Whether the breakpoint at this address was auto-placed.
    pub fn is_auto(&self, addr: Addr) -> bool {
        self.auto.contains(&addr)
    }

    /// All breakpoints, in address order.
    pub fn all(&self) -> &BTreeSet<Addr> {
        &self.set
    }

    /// The number of breakpoints.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Whether there are no breakpoints.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Removes all breakpoints.
    pub fn clear(&mut self) {
        self.set.clear();
        self.auto.clear();
        self.notify(|l| l.on_clear());
    }

    /// Swaps the auto-placed breakpoints of the previous compilation for new ones.
    ///
    /// Every address auto-inserted by the previous call that is still present is removed,
    /// then the given addresses are inserted and remembered as auto-placed.
    /// User-placed breakpoints at other addresses are not touched.
    pub fn replace_auto(&mut self, addrs: impl IntoIterator<Item=Addr>) {
        for addr in std::mem::take(&mut self.auto) {
            if self.remove(addr) {
                log::debug!("removed auto breakpoint at {addr:08x}");
            }
        }
        for addr in addrs {
            self.add(addr);
            self.auto.insert(addr);
            log::debug!("placed auto breakpoint at {addr:08x}");
        }
    }
}
impl std::fmt::Debug for BreakpointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        struct Addrs<'a>(&'a BTreeSet<Addr>);
        impl std::fmt::Debug for Addrs<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_set()
                    .entries(self.0.iter().map(|a| format!("{a:08x}")))
                    .finish()
            }
        }

        f.debug_struct("BreakpointRegistry")
            .field("set", &Addrs(&self.set))
            .field("auto", &Addrs(&self.auto))
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

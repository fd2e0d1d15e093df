//! Tracking and formatting of the register file.
//!
//! The [`RegisterView`] keeps one [`ChangeTracker`] over the whole register file
//! and a display format per register. Changes are always detected on the raw value:
//! the display format is only applied when a value is rendered.
use std::collections::BTreeMap;

use super::observer::{ChangeTracker, Delta};
use super::{RegId, Simulator};

/// How a register value is displayed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum RegDisplay {
    /// `0000002a`
    Hex,
    /// `-42`
    #[default]
    Signed,
    /// `4294967254`
    Unsigned,
    /// `00000000000000000000000000101010`
    Binary,
    /// The ARM CPSR flag summary, e.g., `N-C- ---F User`.
    Flags,
}
impl RegDisplay {
    /// Renders the value.
    pub fn format(self, value: u32) -> String {
        match self {
            RegDisplay::Hex      => format!("{value:08x}"),
            RegDisplay::Signed   => (value as i32).to_string(),
            RegDisplay::Unsigned => value.to_string(),
            RegDisplay::Binary   => format!("{value:032b}"),
            RegDisplay::Flags    => format_cpsr(value),
        }
    }
}

fn format_cpsr(value: u32) -> String {
    let flag = |bit: u32, c: char| if (value >> bit) & 1 != 0 { c } else { '-' };
    let mode = match value & 0xF {
        0b0000 => "User",
        0b0001 => "FIQ",
        0b0010 => "IRQ",
        0b0011 => "Super",
        0b0110 => "Monit",
        0b0111 => "Abort",
        0b1010 => "Hyper",
        0b1011 => "Undef",
        0b1111 => "Sys",
        _ => "Invalid"
    };

    format!(
        "{}{}{}{} {}{}{}{} {mode}",
        flag(31, 'N'), flag(30, 'Z'), flag(29, 'C'), flag(28, 'V'),
        flag(9, 'E'), flag(8, 'A'), flag(7, 'I'), flag(6, 'F'),
    )
}

/// The register file as seen by the user.
#[derive(Debug, Default)]
pub struct RegisterView {
    tracker: ChangeTracker<RegId, u32>,
    displays: BTreeMap<RegId, RegDisplay>
}
impl RegisterView {
    /// Creates a view which starts tracking from the simulator's current register values.
    pub fn new(sim: &dyn Simulator) -> Self {
        Self {
            tracker: ChangeTracker::with_baseline(snapshot(sim)),
            displays: sim.registers().iter()
                .map(|r| (r.id, r.display))
                .collect()
        }
    }

    /// Reads every register and reports what changed since the last refresh.
    pub fn refresh(&mut self, sim: &dyn Simulator) -> Delta<RegId, u32> {
        self.tracker.refresh(snapshot(sim))
    }

    /// The last value read from the register.
    pub fn value(&self, reg: RegId) -> Option<u32> {
        self.tracker.get(&reg).copied()
    }

    /// The display format of the register.
    pub fn display(&self, reg: RegId) -> RegDisplay {
        self.displays.get(&reg).copied().unwrap_or_default()
    }

    /// Changes the display format of the register.
    pub fn set_display(&mut self, reg: RegId, display: RegDisplay) {
        self.displays.insert(reg, display);
    }

    /// Renders a value of the register with its display format.
    pub fn format(&self, reg: RegId, value: u32) -> String {
        self.display(reg).format(value)
    }

    /// Renders every changed register of a delta.
    pub fn render(&self, delta: &Delta<RegId, u32>) -> Vec<(RegId, String)> {
        delta.changed.iter()
            .map(|(&r, &v)| (r, self.format(r, v)))
            .collect()
    }
}

fn snapshot(sim: &dyn Simulator) -> Vec<(RegId, u32)> {
    sim.registers().iter()
        .map(|r| (r.id, sim.get_register(r.id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{RegDisplay, RegisterView};
    use crate::sim::testing::{Op, ScriptSim, R0, R1, SP};
    use crate::sim::Simulator;

    #[test]
    fn test_formats() {
        assert_eq!(RegDisplay::Hex.format(42), "0000002a");
        assert_eq!(RegDisplay::Signed.format(-42i32 as u32), "-42");
        assert_eq!(RegDisplay::Unsigned.format(-42i32 as u32), "4294967254");
        assert_eq!(RegDisplay::Binary.format(5), "00000000000000000000000000000101");
        assert_eq!(RegDisplay::Flags.format(0xA000_0050), "N-C- ---F User");
        assert_eq!(RegDisplay::Flags.format(0x6000_0013), "-ZC- ---- Super");
        assert_eq!(RegDisplay::Flags.format(0x0000_000C), "---- ---- Invalid");
    }

    #[test]
    fn test_refresh() {
        let mut sim = ScriptSim::new(0, [
            (0x0, Op::AddReg(0, 1)),
            (0x4, Op::AddReg(1, 2)),
            (0x8, Op::Nop),
        ]);
        let mut view = RegisterView::new(&sim);
        assert_eq!(view.display(SP), RegDisplay::Hex);

        sim.step().unwrap();
        let delta = view.refresh(&sim);
        assert_eq!(delta.changed.keys().copied().collect::<Vec<_>>(), [R0]);

        sim.step().unwrap();
        let delta = view.refresh(&sim);
        assert_eq!(delta.changed.keys().copied().collect::<Vec<_>>(), [R1]);
        assert_eq!(delta.unflagged, BTreeSet::from([R0]));

        sim.step().unwrap();
        let delta = view.refresh(&sim);
        assert!(delta.changed.is_empty());
        assert_eq!(delta.unflagged, BTreeSet::from([R1]));
    }

    #[test]
    fn test_display_does_not_affect_tracking() {
        let mut sim = ScriptSim::new(0, [(0x0, Op::AddReg(0, 0xFFFF_FFFF))]);
        let mut view = RegisterView::new(&sim);
        view.set_display(R0, RegDisplay::Hex);

        sim.step().unwrap();
        let delta = view.refresh(&sim);
        assert_eq!(view.render(&delta), [(R0, "ffffffff".to_string())]);

        view.set_display(R0, RegDisplay::Signed);
        assert!(view.refresh(&sim).changed.is_empty());
        assert_eq!(view.format(R0, view.value(R0).unwrap()), "-1");
    }
}

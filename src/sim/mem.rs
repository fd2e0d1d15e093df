//! Memory windows.
//!
//! A [`MemWindow`] displays a range of the simulator's memory as a table of 16-byte rows,
//! each cell holding one value of the window's [`MemDisplay`] type.
//! Like the register view, changes are tracked on raw values and only formatted for display.
//!
//! ```
//! use bass_debugger::sim::mem::{MemDisplay, MemWindow};
//!
//! # use bass_debugger::sim::Simulator;
//! # fn demo(sim: &dyn Simulator) {
//! // 8 half-words from 0x8004: the window starts at the row boundary 0x8000
//! let window = MemWindow::new(sim, 0x8004, 8, MemDisplay::Hex16).unwrap();
//! assert_eq!(window.base(), 0x8000);
//! assert_eq!(window.target(), 2);
//! assert_eq!(window.columns(), 8);
//! # }
//! ```
use super::observer::{ChangeTracker, Delta};
use super::{Addr, Simulator};

const ROW_BYTES: u64 = 16;
const ADDR_SPACE: u64 = 1 << Addr::BITS;

/// The type of the values displayed in a memory window.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum MemDisplay {
    /// Unsigned bytes, in hexadecimal.
    #[default]
    Byte,
    /// Signed 16-bit values, in decimal.
    Signed16,
    /// Unsigned 16-bit values, in decimal.
    Unsigned16,
    /// 16-bit values, in hexadecimal.
    Hex16,
    /// Signed 32-bit values, in decimal.
    Signed32,
    /// Unsigned 32-bit values, in decimal.
    Unsigned32,
    /// 32-bit values, in hexadecimal.
    Hex32,
    /// Bytes, as characters.
    Char,
}
impl MemDisplay {
    /// Every display type, in menu order.
    pub const ALL: [MemDisplay; 8] = [
        MemDisplay::Byte,
        MemDisplay::Signed16,
        MemDisplay::Unsigned16,
        MemDisplay::Hex16,
        MemDisplay::Signed32,
        MemDisplay::Unsigned32,
        MemDisplay::Hex32,
        MemDisplay::Char,
    ];

    /// The label of this display type.
    pub fn label(self) -> &'static str {
        match self {
            MemDisplay::Byte       => "Byte",
            MemDisplay::Signed16   => "Signed 16b",
            MemDisplay::Unsigned16 => "Unsign. 16b",
            MemDisplay::Hex16      => "Hexa. 16b",
            MemDisplay::Signed32   => "Signed 32b",
            MemDisplay::Unsigned32 => "Unsign. 32b",
            MemDisplay::Hex32      => "Hexa. 32b",
            MemDisplay::Char       => "Character",
        }
    }

    /// The size of one value, in bytes.
    pub fn size(self) -> u32 {
        match self {
            MemDisplay::Byte | MemDisplay::Char => 1,
            MemDisplay::Signed16 | MemDisplay::Unsigned16 | MemDisplay::Hex16 => 2,
            MemDisplay::Signed32 | MemDisplay::Unsigned32 | MemDisplay::Hex32 => 4,
        }
    }

    /// Reads one value at the address.
    pub fn load(self, sim: &dyn Simulator, addr: Addr) -> i64 {
        match self {
            MemDisplay::Byte | MemDisplay::Char => i64::from(sim.get_byte(addr)),
            MemDisplay::Signed16 => i64::from(sim.get_half(addr) as i16),
            MemDisplay::Unsigned16 | MemDisplay::Hex16 => i64::from(sim.get_half(addr)),
            MemDisplay::Signed32 => i64::from(sim.get_word(addr) as i32),
            MemDisplay::Unsigned32 | MemDisplay::Hex32 => i64::from(sim.get_word(addr)),
        }
    }

    /// Renders one value.
    pub fn format(self, value: i64) -> String {
        match self {
            MemDisplay::Byte  => format!("{value:02x}"),
            MemDisplay::Hex16 => format!("{value:04x}"),
            MemDisplay::Hex32 => format!("{value:08x}"),
            MemDisplay::Char  => format_char(value),
            MemDisplay::Signed16 | MemDisplay::Unsigned16
            | MemDisplay::Signed32 | MemDisplay::Unsigned32 => value.to_string(),
        }
    }
}
impl std::fmt::Display for MemDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn format_char(value: i64) -> String {
    match value {
        8  => "\u{21a4}".to_string(),
        9  => "\u{21b9}".to_string(),
        10 => "\u{23ce}".to_string(),
        32 => "\u{2423}".to_string(),
        33..=126 => char::from(value as u8).to_string(),
        _ => format!("{value:02x}"),
    }
}

/// A range of memory displayed to the user.
#[derive(Debug)]
pub struct MemWindow {
    base: Addr,
    len: usize,
    target: usize,
    display: MemDisplay,
    tracker: ChangeTracker<usize, i64>
}
impl MemWindow {
    /// Creates a window showing `count` values of type `display` from `addr`.
    ///
    /// The window is widened to whole 16-byte rows: it starts at `addr` rounded down to 16
    /// and ends after the last value rounded up to 16. The cell at `addr` is the target cell.
    /// The window's values are read immediately and no cell is marked as changed.
    ///
    /// This returns `None` if the window would extend past the end of the address space.
    pub fn new(sim: &dyn Simulator, addr: Addr, count: usize, display: MemDisplay) -> Option<Self> {
        let size = u64::from(display.size());
        let base = u64::from(addr) & !(ROW_BYTES - 1);
        let end = u64::try_from(count).ok()?
            .checked_mul(size)?
            .checked_add(u64::from(addr) + ROW_BYTES - 1)?
            & !(ROW_BYTES - 1);
        if end > ADDR_SPACE {
            return None;
        }

        let mut window = Self {
            base: base as Addr,
            len: ((end - base) / size) as usize,
            target: ((u64::from(addr) - base) / size) as usize,
            display,
            tracker: ChangeTracker::new()
        };
        window.tracker = ChangeTracker::with_baseline(window.snapshot(sim));
        Some(window)
    }

    fn snapshot(&self, sim: &dyn Simulator) -> Vec<(usize, i64)> {
        (0..self.len)
            .map(|i| (i, self.display.load(sim, self.cell_addr(i))))
            .collect()
    }

    /// The address of the first cell.
    pub fn base(&self) -> Addr {
        self.base
    }

    /// The number of cells.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the window has no cells.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The index of the cell at the requested address.
    pub fn target(&self) -> usize {
        self.target
    }

    /// The display type of the cells.
    pub fn display(&self) -> MemDisplay {
        self.display
    }

    /// The number of cells per row.
    pub fn columns(&self) -> usize {
        (ROW_BYTES / u64::from(self.display.size())) as usize
    }

    /// The address of a cell.
    pub fn cell_addr(&self, index: usize) -> Addr {
        self.base.wrapping_add((index as Addr).wrapping_mul(self.display.size()))
    }

    /// Reads the window and reports which cells changed since the last refresh.
    pub fn refresh(&mut self, sim: &dyn Simulator) -> Delta<usize, i64> {
        let snap = self.snapshot(sim);
        self.tracker.refresh(snap)
    }

    /// Renders every changed cell of a delta.
    pub fn render(&self, delta: &Delta<usize, i64>) -> Vec<(usize, String)> {
        delta.changed.iter()
            .map(|(&i, &v)| (i, self.display.format(v)))
            .collect()
    }

    /// Renders the whole window as rows of (row address, cell texts),
    /// from the last values read.
    pub fn rows(&self) -> Vec<(Addr, Vec<String>)> {
        let columns = self.columns();
        (0..self.len)
            .step_by(columns)
            .map(|start| {
                let cells = (start..(start + columns).min(self.len))
                    .map(|i| self.display.format(self.tracker.get(&i).copied().unwrap_or(0)))
                    .collect();
                (self.cell_addr(start), cells)
            })
            .collect()
    }
}

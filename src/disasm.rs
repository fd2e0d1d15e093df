//! Disassembly of the compiled program.
//!
//! The disassembly is obtained from the textual output of `objdump -d`,
//! which consists of label lines and instruction lines:
//!
//! ```text
//! 00008000 <main>:
//!     8000:	e3a00000 	mov	r0, #0
//!     8004:	eb000001 	bl	8010 <f>
//! ```
//!
//! Other lines (section headers, file names, blank lines) are ignored.
//!
//! The labels are used to place the auto-breakpoints after compilation
//! and to resolve address expressions of memory windows.
use std::collections::{BTreeMap, HashMap};

use crate::sim::Addr;

/// One row of the disassembly.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DisasmLine {
    /// The address of the row.
    pub addr: Addr,
    /// The encoded instruction, in hexadecimal (empty for label rows).
    pub bytes: String,
    /// The instruction text, or `label:` for label rows.
    pub text: String,
}
impl DisasmLine {
    /// Whether this row is a label row.
    pub fn is_label(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The disassembly of a program.
#[derive(Debug, Default, Clone)]
pub struct Disassembly {
    lines: Vec<DisasmLine>,
    labels: HashMap<String, Addr>,
    rows: BTreeMap<Addr, usize>
}
impl Disassembly {
    /// Parses the output of `objdump -d`.
    ///
    /// Instruction addresses shorter than the address of the last label
    /// are completed with the label's leading digits.
    pub fn parse(output: &str) -> Self {
        let mut disasm = Self::default();
        let mut base = "";

        for line in output.lines() {
            if let Some((addr_str, label)) = parse_label_line(line) {
                // parse_label_line only accepts hex digits
                let Ok(addr) = Addr::from_str_radix(addr_str, 16) else { continue };
                base = addr_str;
                disasm.labels.insert(label.to_string(), addr);
                disasm.lines.push(DisasmLine { addr, bytes: String::new(), text: format!("{label}:") });
            } else if let Some((addr_str, bytes, text)) = parse_instr_line(line) {
                let addr = match addr_str.len() < base.len() {
                    true  => Addr::from_str_radix(&format!("{}{addr_str}", &base[..base.len() - addr_str.len()]), 16),
                    false => Addr::from_str_radix(addr_str, 16),
                };
                let Ok(addr) = addr else { continue };

                disasm.rows.insert(addr, disasm.lines.len());
                disasm.lines.push(DisasmLine { addr, bytes: bytes.to_string(), text: text.to_string() });
            }
        }

        disasm
    }

    /// Gets the address of a label.
    pub fn find_label(&self, name: &str) -> Option<Addr> {
        self.labels.get(name).copied()
    }

    /// All rows, in order of appearance.
    pub fn lines(&self) -> &[DisasmLine] {
        &self.lines
    }

    /// The index of the instruction row at the given address.
    ///
    /// This is used to highlight the row of the PC.
    pub fn row_of(&self, addr: Addr) -> Option<usize> {
        self.rows.get(&addr).copied()
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Matches `ADDR <label>:`.
fn parse_label_line(line: &str) -> Option<(&str, &str)> {
    let (addr, rest) = line.split_once(|c: char| c.is_ascii_whitespace())?;
    let label = rest.trim_start()
        .strip_prefix('<')?
        .strip_suffix(':')?
        .strip_suffix('>')?;

    (is_hex(addr) && !label.is_empty()).then_some((addr, label))
}

/// Matches `   ADDR:  BYTES  TEXT`.
fn parse_instr_line(line: &str) -> Option<(&str, &str, &str)> {
    let (addr, rest) = line.trim_start().split_once(':')?;
    if !is_hex(addr) || !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
        return None;
    }

    let rest = rest.trim_start();
    let (bytes, text) = rest.split_once(|c: char| c.is_ascii_whitespace())?;
    is_hex(bytes).then(|| (addr, bytes, text.trim()))
}

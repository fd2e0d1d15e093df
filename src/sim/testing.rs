//! A deterministic scripted simulator used by the tests of this crate.
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::err::SimErr;

use super::regs::RegDisplay;
use super::{Addr, RegId, RegisterDesc, Simulator};

/// One scripted instruction. Every instruction is 4 bytes long.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Op {
    Nop,
    Jump(Addr),
    Call(Addr),
    Ret,
    /// `R[index] += imm`
    AddReg(u16, u32),
    /// Writes a word into memory.
    Store(Addr, u32),
    /// Fails to execute.
    Fault,
}

pub const R0: RegId = RegId::new(0, 0);
pub const R1: RegId = RegId::new(0, 1);
pub const SP: RegId = RegId::new(0, 2);

/// Executes a map of scripted instructions. Addresses not in the map execute as [`Op::Nop`].
#[derive(Debug)]
pub struct ScriptSim {
    program: Arc<BTreeMap<Addr, Op>>,
    entry: Addr,
    pub pc: Addr,
    pub steps: u64,
    regs: [u32; 3],
    descs: Vec<RegisterDesc>,
    mem: BTreeMap<Addr, u8>,
    stack: Vec<Addr>,
    loaded: bool,
    pub fail_load: Arc<AtomicBool>,
    pub frequency: u64,
}
impl ScriptSim {
    pub fn new(entry: Addr, program: impl IntoIterator<Item=(Addr, Op)>) -> Self {
        let mut sim = Self::unloaded(entry, Arc::new(program.into_iter().collect()), Default::default());
        sim.loaded = true;
        sim
    }

    pub fn linear(entry: Addr) -> Self {
        Self::new(entry, [])
    }

    pub fn unloaded(entry: Addr, program: Arc<BTreeMap<Addr, Op>>, fail_load: Arc<AtomicBool>) -> Self {
        let desc = |name: &str, id, display| RegisterDesc { name: name.to_string(), id, display };
        Self {
            program,
            entry,
            pc: entry,
            steps: 0,
            regs: [0; 3],
            descs: vec![
                desc("R0", R0, RegDisplay::Signed),
                desc("R1", R1, RegDisplay::Signed),
                desc("sp", SP, RegDisplay::Hex),
            ],
            mem: BTreeMap::new(),
            stack: vec![],
            loaded: false,
            fail_load,
            frequency: 1_000,
        }
    }

    fn op(&self) -> Op {
        self.program.get(&self.pc).copied().unwrap_or(Op::Nop)
    }

    fn write_word(&mut self, addr: Addr, value: u32) {
        for (i, b) in value.to_le_bytes().into_iter().enumerate() {
            self.mem.insert(addr.wrapping_add(i as Addr), b);
        }
    }
}
impl Simulator for ScriptSim {
    fn load(&mut self, path: &Path) -> Result<(), SimErr> {
        if self.fail_load.load(Ordering::Relaxed) {
            return Err(SimErr::Load(path.display().to_string()));
        }
        self.loaded = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.pc = self.entry;
        self.steps = 0;
        self.regs = [0; 3];
        self.mem.clear();
        self.stack.clear();
    }

    fn release(&mut self) {
        self.loaded = false;
    }

    fn step(&mut self) -> Result<(), SimErr> {
        if !self.loaded {
            return Err(SimErr::NotLoaded);
        }
        let next = self.pc.wrapping_add(4);
        self.pc = match self.op() {
            Op::Nop => next,
            Op::Jump(a) => a,
            Op::Call(a) => {
                self.stack.push(next);
                a
            },
            Op::Ret => self.stack.pop().unwrap_or(next),
            Op::AddReg(i, imm) => {
                let r = &mut self.regs[usize::from(i)];
                *r = r.wrapping_add(imm);
                next
            },
            Op::Store(a, v) => {
                self.write_word(a, v);
                next
            },
            Op::Fault => return Err(SimErr::Step(format!("fault at {:08x}", self.pc))),
        };
        self.steps += 1;
        Ok(())
    }

    fn pc(&self) -> Addr {
        self.pc
    }

    fn next_pc(&self) -> Addr {
        self.pc.wrapping_add(4)
    }

    fn registers(&self) -> &[RegisterDesc] {
        &self.descs
    }

    fn get_register(&self, reg: RegId) -> u32 {
        self.regs[usize::from(reg.index)]
    }

    fn set_register(&mut self, reg: RegId, value: u32) {
        self.regs[usize::from(reg.index)] = value;
    }

    fn get_byte(&self, addr: Addr) -> u8 {
        self.mem.get(&addr).copied().unwrap_or(0)
    }

    fn get_half(&self, addr: Addr) -> u16 {
        u16::from_le_bytes([self.get_byte(addr), self.get_byte(addr.wrapping_add(1))])
    }

    fn get_word(&self, addr: Addr) -> u32 {
        u32::from(self.get_half(addr)) | (u32::from(self.get_half(addr.wrapping_add(2))) << 16)
    }

    fn date(&self) -> u64 {
        self.steps
    }

    fn frequency(&self) -> u64 {
        self.frequency
    }
}

//! Reference RSP interpreter.
//!
//! Defines the semantics every generated fast path must refine.
//! `Reference::execute` is the single-instruction entry point the
//! translator calls from native code; `Reference::run` drives whole
//! programs with delay-slot sequencing and is the oracle used by the
//! equivalence tests.

mod divide;
mod scalar;
mod vector;
mod vmem;

use rsp_core::insn::{branch_target, jump_target};
use rsp_core::state::{COP0_SP_STATUS, PC_MASK, SP_STATUS_BROKE, SP_STATUS_HALT};
use rsp_core::{Insn, Interpreter, Opcode, RspState};

pub use divide::{INVERSE_SQRT_TABLE, RECIPROCAL_TABLE};

/// Pending control transfer after a branch word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DelaySlot {
    #[default]
    None,
    /// Next word is a delay slot; control falls through afterwards.
    NotTaken,
    /// Next word is a delay slot; control moves to the target afterwards.
    Taken(u32),
}

/// Interpreter with its own delay-slot tracking.
#[derive(Debug, Default)]
pub struct Reference {
    delay: DelaySlot,
}

impl Reference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute the word at `state.pc` and advance the program counter.
    pub fn step(&mut self, state: &mut RspState) {
        let pc = state.pc & PC_MASK;
        let insn = Insn(state.imem_word(pc));
        let op = Opcode::decode(insn);
        let pending = std::mem::take(&mut self.delay);
        let in_delay_slot = pending != DelaySlot::None;

        if op.is_branch() {
            if in_delay_slot {
                tracing::warn!(pc, "branch in delay slot ignored");
            } else {
                self.delay = match self.branch(state, pc, insn, op) {
                    Some(target) => DelaySlot::Taken(target),
                    None => DelaySlot::NotTaken,
                };
            }
        } else if op == Opcode::Break {
            state.halted = 1;
            state.cop0[COP0_SP_STATUS] |= SP_STATUS_HALT | SP_STATUS_BROKE;
        } else {
            self.execute(state, insn);
        }

        state.pc = match pending {
            DelaySlot::Taken(target) => target,
            _ => pc.wrapping_add(4) & PC_MASK,
        };
    }

    /// Run until halted or until `cycles` instructions have executed.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self, state: &mut RspState, cycles: u32) -> u32 {
        let mut executed = 0;
        while state.halted == 0 && executed < cycles {
            self.step(state);
            executed += 1;
        }
        executed
    }

    /// Evaluate a branch word: writes the link register and returns
    /// the target when taken.
    fn branch(&mut self, state: &mut RspState, pc: u32, insn: Insn, op: Opcode) -> Option<u32> {
        let regs = &mut state.regs;
        let rs = regs.gpr[insn.rs()];
        let rt = regs.gpr[insn.rt()];
        let link = pc.wrapping_add(8) & PC_MASK;
        let rel = branch_target(pc, insn);
        let (taken, target) = match op {
            Opcode::J => (true, jump_target(insn)),
            Opcode::Jal => {
                scalar::set_gpr(regs, 31, link);
                (true, jump_target(insn))
            }
            Opcode::Jr => (true, rs & PC_MASK),
            Opcode::Jalr => {
                scalar::set_gpr(regs, insn.rd(), link);
                (true, rs & PC_MASK)
            }
            Opcode::Beq => (rs == rt, rel),
            Opcode::Bne => (rs != rt, rel),
            Opcode::Blez => ((rs as i32) <= 0, rel),
            Opcode::Bgtz => ((rs as i32) > 0, rel),
            Opcode::Bltz => ((rs as i32) < 0, rel),
            Opcode::Bgez => ((rs as i32) >= 0, rel),
            Opcode::Bltzal => {
                scalar::set_gpr(regs, 31, link);
                ((rs as i32) < 0, rel)
            }
            Opcode::Bgezal => {
                scalar::set_gpr(regs, 31, link);
                ((rs as i32) >= 0, rel)
            }
            _ => (false, 0),
        };
        taken.then_some(target)
    }
}

impl Interpreter for Reference {
    fn execute(&mut self, state: &mut RspState, insn: Insn) {
        let op = Opcode::decode(insn);
        match op {
            Opcode::Break => {
                state.halted = 1;
                state.cop0[COP0_SP_STATUS] |= SP_STATUS_HALT | SP_STATUS_BROKE;
            }
            _ if op.is_branch() => {}
            _ if op.is_vector_load() => vmem::load(state, op, insn),
            _ if op.is_vector_store() => vmem::store(state, op, insn),
            Opcode::Mfc0 | Opcode::Mtc0 => scalar::cop0(state, op, insn),
            Opcode::Mfc2 | Opcode::Mtc2 | Opcode::Cfc2 | Opcode::Ctc2 => {
                vector::cop2_move(&mut state.regs, op, insn)
            }
            _ => {
                if !scalar::execute(state, op, insn) {
                    vector::execute(&mut state.regs, op, insn);
                }
            }
        }
    }
}

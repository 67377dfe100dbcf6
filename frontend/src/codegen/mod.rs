//! Per-instruction code generation.
//!
//! Guest registers live in `RspState` behind RBP for the whole
//! lifetime of generated code; routines load operands into scratch
//! registers, compute, and store results straight back. Scratch
//! registers are RAX, RCX, RDX, RBX and R8-R11. Anything a routine
//! cannot express natively goes through `trap`, which hands the word
//! to the interpreter.

pub mod branch;
pub mod cop;
pub mod memory;
pub mod scalar;
pub mod vector;
pub mod vector_mem;

use rsp_backend::x86_64::emitter::*;
use rsp_backend::x86_64::regs::BRANCH_FLAG_OFFSET;
use rsp_backend::x86_64::Reg;
use rsp_backend::{CodeBuffer, PatchHandle};
use rsp_core::insn::{branch_target, jump_target};
use rsp_core::state::{
    gpr_offset, BUDGET_OFFSET, HALTED_OFFSET, PC_MASK, PC_OFFSET, TRAP_WORD_OFFSET,
};
use rsp_core::{CompilerConfig, Insn, JumpTable, Opcode};

use crate::analysis::{
    are_flags_used, will_accumulator_be_read, will_vector_dest_be_overwritten, AccSlices,
    Analysis, Image,
};
use crate::compiler::BlockState;
use crate::linker::BranchFixup;

/// Host addresses generated code needs at compile time.
#[derive(Debug, Clone, Copy)]
pub struct Runtime {
    /// Buffer offset of the shared epilogue.
    pub epilogue: usize,
    /// `unsafe extern "C" fn(*mut RspState, *mut c_void)` run for traps.
    pub trap_fn: u64,
    /// Second argument passed to `trap_fn`.
    pub trap_ctx: u64,
}

/// Counters describing what the compiler emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub blocks_compiled: u64,
    pub insns_compiled: u64,
    pub traps_emitted: u64,
    pub accum_writes_elided: u64,
    pub dest_writes_elided: u64,
    pub simd_paths: u64,
    pub fixups_linked: u64,
}

/// Branch whose second phase is still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingBranch {
    pub pc: u32,
    /// The condition sits in `[rsp + BRANCH_FLAG_OFFSET]`.
    pub latched: bool,
}

/// Translation state for one compilation session.
pub struct DisasContext<'a> {
    pub buf: &'a mut CodeBuffer,
    pub table: &'a mut JumpTable,
    /// Scratch copy of the overlay image, reordered as sub-blocks
    /// are entered and discarded with the context.
    pub image: &'a mut Image,
    pub analysis: &'a Analysis,
    pub config: &'a CompilerConfig,
    pub runtime: Runtime,
    pub stats: &'a mut CompileStats,
    /// Forward branches waiting for their target to be compiled.
    pub fixups: Vec<BranchFixup>,
    pub pc: u32,
    pub state: BlockState,
    pub branch: Option<PendingBranch>,
    /// Instructions executed since the budget was last decremented.
    charge: u32,
}

impl<'a> DisasContext<'a> {
    pub fn new(
        buf: &'a mut CodeBuffer,
        table: &'a mut JumpTable,
        image: &'a mut Image,
        analysis: &'a Analysis,
        config: &'a CompilerConfig,
        runtime: Runtime,
        stats: &'a mut CompileStats,
    ) -> Self {
        Self {
            buf,
            table,
            image,
            analysis,
            config,
            runtime,
            stats,
            fixups: Vec::new(),
            pc: 0,
            state: BlockState::Normal,
            branch: None,
            charge: 0,
        }
    }

    // -- Cycle accounting --

    #[inline]
    pub fn charge(&mut self) {
        self.charge += 1;
    }

    /// Subtract the accumulated instruction count from the budget.
    pub fn flush_charge(&mut self) {
        if self.charge > 0 {
            emit_arith_mi(self.buf, ArithOp::Sub, false, Reg::Rbp, BUDGET_OFFSET, self.charge as i32);
            self.charge = 0;
        }
    }

    // -- Block structure --

    #[inline]
    pub fn in_delay_slot(&self) -> bool {
        self.state == BlockState::DelaySlot
    }

    /// Make `pc` an entry point: record its address in the jump table
    /// and check the budget on the way in.
    pub fn begin_entry(&mut self, pc: u32) {
        self.flush_charge();
        emit_align(self.buf, 8);
        let offset = self.buf.offset();
        self.table.insert(pc, self.buf.addr_of(offset));

        emit_arith_mi(self.buf, ArithOp::Cmp, false, Reg::Rbp, BUDGET_OFFSET, 0);
        let out = emit_jcc_fwd(self.buf, X86Cond::Jle);
        self.buf.toggle();
        self.buf.patch_here(out);
        emit_store_imm(self.buf, false, Reg::Rbp, PC_OFFSET, pc as i32);
        emit_jmp(self.buf, self.runtime.epilogue);
        self.buf.toggle();
    }

    /// Continue at an already compiled entry.
    pub fn emit_link(&mut self, host_addr: usize) -> bool {
        let Some(offset) = self.buf.offset_of_addr(host_addr) else {
            return false;
        };
        self.flush_charge();
        emit_jmp(self.buf, offset);
        true
    }

    /// Leave generated code with `pc` as the next instruction.
    pub fn emit_exit_at(&mut self, pc: u32) {
        self.flush_charge();
        emit_store_imm(self.buf, false, Reg::Rbp, PC_OFFSET, (pc & PC_MASK) as i32);
        emit_jmp(self.buf, self.runtime.epilogue);
    }

    /// Resolve `handle` against `target`, now if it is compiled,
    /// otherwise once the linker has compiled it.
    pub fn add_fixup(&mut self, target: u32, handle: PatchHandle) {
        let compiled = self.table.lookup(target).and_then(|a| self.buf.offset_of_addr(a));
        match compiled {
            Some(offset) => {
                self.buf.patch(handle, offset);
                self.stats.fixups_linked += 1;
            }
            None => self.fixups.push(BranchFixup { target, site: handle }),
        }
    }

    // -- Guest scalar registers --

    /// Value of `r` if it is constant over the whole image.
    #[inline]
    pub fn gpr_const(&self, r: usize) -> Option<u32> {
        if r == 0 {
            Some(0)
        } else if self.config.gpr_constants {
            self.analysis.facts.constant(r)
        } else {
            None
        }
    }

    /// Load guest register `r` into `reg`. May clobber the flags.
    pub fn load_gpr(&mut self, reg: Reg, r: usize) {
        match self.gpr_const(r) {
            Some(v) => emit_mov_ri(self.buf, false, reg, v as u64),
            None => emit_load(self.buf, false, reg, Reg::Rbp, gpr_offset(r)),
        }
    }

    pub fn store_gpr(&mut self, r: usize, reg: Reg) {
        if r != 0 {
            emit_store(self.buf, false, reg, Reg::Rbp, gpr_offset(r));
        }
    }

    pub fn store_gpr_imm(&mut self, r: usize, value: u32) {
        if r != 0 {
            emit_store_imm(self.buf, false, Reg::Rbp, gpr_offset(r), value as i32);
        }
    }

    // -- Liveness queries --

    /// Whether the accumulator slices written by the current
    /// instruction can be observed later.
    pub fn accumulator_live(&self, slices: AccSlices) -> bool {
        !self.config.accum_liveness
            || self.in_delay_slot()
            || will_accumulator_be_read(self.image, slices, self.pc)
    }

    /// Whether the vector register written by the current
    /// instruction can be observed later.
    pub fn dest_live(&self, reg: usize) -> bool {
        !self.config.dest_liveness
            || self.in_delay_slot()
            || !will_vector_dest_be_overwritten(self.image, reg, self.pc)
    }

    /// Whether VCO may hold set bits at the current instruction.
    pub fn flags_may_be_set(&self) -> bool {
        if !self.config.flag_analysis || self.in_delay_slot() {
            return true;
        }
        let table = &*self.table;
        are_flags_used(self.image, &self.analysis.labels, self.pc, |pc| table.contains(pc))
    }

    // -- Interpreter fallback --

    /// Call the interpreter for `insn`.
    pub fn emit_trap(&mut self, insn: Insn) {
        emit_store_imm(self.buf, false, Reg::Rbp, TRAP_WORD_OFFSET, insn.raw() as i32);
        emit_mov_rr(self.buf, true, Reg::Rdi, Reg::Rbp);
        emit_mov_ri(self.buf, true, Reg::Rsi, self.runtime.trap_ctx);
        emit_call_abs(self.buf, self.runtime.trap_fn);
        self.stats.traps_emitted += 1;
    }

    /// Out-of-line interpreter call for a failed fast-path guard.
    /// `handle` is the guard's forward jump; the slow path rejoins
    /// the primary stream at the current position.
    pub fn emit_slow_path(&mut self, handle: PatchHandle, insn: Insn) {
        let rejoin = self.buf.offset();
        self.buf.toggle();
        self.buf.patch_here(handle);
        self.emit_trap(insn);
        emit_jmp(self.buf, rejoin);
        self.buf.toggle();
    }

    /// Leave generated code if the last instruction halted the core.
    pub fn emit_halt_check(&mut self) {
        emit_arith_mi(self.buf, ArithOp::Cmp, false, Reg::Rbp, HALTED_OFFSET, 0);
        let halted = emit_jcc_fwd(self.buf, X86Cond::Jne);
        self.buf.toggle();
        self.buf.patch_here(halted);
        self.emit_store_resume_pc();
        emit_jmp(self.buf, self.runtime.epilogue);
        self.buf.toggle();
    }

    /// Store the pc execution resumes at after the current
    /// instruction, taking a pending branch into account.
    pub fn emit_store_resume_pc(&mut self) {
        let pending = match (self.state, self.branch) {
            (BlockState::DelaySlot, Some(b)) => b,
            _ => {
                let next = self.pc.wrapping_add(4) & PC_MASK;
                emit_store_imm(self.buf, false, Reg::Rbp, PC_OFFSET, next as i32);
                return;
            }
        };
        let insn = self.image.word(pending.pc);
        match Opcode::decode(insn) {
            Opcode::J | Opcode::Jal => {
                emit_store_imm(self.buf, false, Reg::Rbp, PC_OFFSET, jump_target(insn) as i32);
            }
            // Stored before the delay slot ran.
            Opcode::Jr | Opcode::Jalr => {}
            _ => {
                let cond = if pending.latched {
                    emit_arith_mi(self.buf, ArithOp::Cmp, false, Reg::Rsp, BRANCH_FLAG_OFFSET, 0);
                    X86Cond::Jne
                } else {
                    branch::emit_condition(self, insn)
                };
                let fallthrough = pending.pc.wrapping_add(8) & PC_MASK;
                let target = branch_target(pending.pc, insn);
                emit_mov_ri_keep_flags(self.buf, false, Reg::Rdx, fallthrough as u64);
                emit_mov_ri_keep_flags(self.buf, false, Reg::R8, target as u64);
                emit_cmovcc(self.buf, cond, false, Reg::Rdx, Reg::R8);
                emit_store(self.buf, false, Reg::Rdx, Reg::Rbp, PC_OFFSET);
            }
        }
    }
}

/// Universal fallback routine.
pub fn trap(ctx: &mut DisasContext<'_>, insn: Insn) {
    let op = Opcode::decode(insn);
    if op == Opcode::Mtc0 {
        ctx.flush_charge();
    }
    ctx.emit_trap(insn);
    if op == Opcode::Mtc0 {
        ctx.emit_halt_check();
    }
}

/// Routine for words that compile to nothing.
pub fn nop(_ctx: &mut DisasContext<'_>, _insn: Insn) {}

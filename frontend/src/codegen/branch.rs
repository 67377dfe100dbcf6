//! Branches, jumps and BREAK.
//!
//! Every branch is compiled in two phases. Phase one runs when the
//! branch word is reached: it writes the link register, stores the
//! target of register jumps, and latches the condition when the
//! delay slot could disturb it. Phase two runs after the delay slot
//! has been compiled and emits the actual control transfer.

use rsp_backend::x86_64::emitter::*;
use rsp_backend::x86_64::regs::BRANCH_FLAG_OFFSET;
use rsp_backend::x86_64::Reg;
use rsp_core::insn::{branch_target, jump_target};
use rsp_core::state::{
    cop0_offset, gpr_offset, COP0_SP_STATUS, HALTED_OFFSET, PC_MASK, PC_OFFSET, SP_STATUS_BROKE,
    SP_STATUS_HALT,
};
use rsp_core::{Insn, Opcode};

use super::{DisasContext, PendingBranch};
use crate::analysis::delay_slot_affects_branch;
use crate::compiler::BlockState;

/// Compare the operands of a conditional branch. The returned
/// condition holds when the branch is taken.
pub(crate) fn emit_condition(ctx: &mut DisasContext<'_>, insn: Insn) -> X86Cond {
    let op = Opcode::decode(insn);
    ctx.load_gpr(Reg::Rax, insn.rs());
    match op {
        Opcode::Beq | Opcode::Bne => {
            let rt = insn.rt();
            match ctx.gpr_const(rt) {
                Some(v) => emit_arith_ri(ctx.buf, ArithOp::Cmp, false, Reg::Rax, v as i32),
                None => emit_arith_rm(ctx.buf, ArithOp::Cmp, false, Reg::Rax, Reg::Rbp, gpr_offset(rt)),
            }
            if op == Opcode::Beq {
                X86Cond::Je
            } else {
                X86Cond::Jne
            }
        }
        _ => {
            emit_test_rr(ctx.buf, false, Reg::Rax, Reg::Rax);
            match op {
                Opcode::Blez => X86Cond::Jle,
                Opcode::Bgtz => X86Cond::Jg,
                Opcode::Bltz | Opcode::Bltzal => X86Cond::Jl,
                _ => X86Cond::Jge,
            }
        }
    }
}

fn link_address(pc: u32) -> u32 {
    pc.wrapping_add(8) & PC_MASK
}

fn begin(ctx: &mut DisasContext<'_>, latched: bool) {
    ctx.branch = Some(PendingBranch { pc: ctx.pc, latched });
    ctx.state = BlockState::DelaySlotPending;
}

/// BEQ/BNE/BLEZ/BGTZ/BLTZ/BGEZ/BLTZAL/BGEZAL.
pub fn conditional(ctx: &mut DisasContext<'_>, insn: Insn) {
    let op = Opcode::decode(insn);
    match ctx.state {
        BlockState::Normal => {
            let delay = ctx.image.word(ctx.pc.wrapping_add(4));
            let latched = delay_slot_affects_branch(insn, delay);
            if latched {
                let cond = emit_condition(ctx, insn);
                emit_setcc(ctx.buf, cond, Reg::Rax);
                emit_movzx(ctx.buf, OPC_MOVZBL, Reg::Rax, Reg::Rax);
                emit_store(ctx.buf, false, Reg::Rax, Reg::Rsp, BRANCH_FLAG_OFFSET);
            }
            if matches!(op, Opcode::Bltzal | Opcode::Bgezal) {
                ctx.store_gpr_imm(31, link_address(ctx.pc));
            }
            begin(ctx, latched);
        }
        BlockState::DelaySlotResolved => {
            let latched = ctx.branch.take().is_some_and(|b| b.latched);
            ctx.flush_charge();
            let cond = if latched {
                emit_arith_mi(ctx.buf, ArithOp::Cmp, false, Reg::Rsp, BRANCH_FLAG_OFFSET, 0);
                X86Cond::Jne
            } else {
                emit_condition(ctx, insn)
            };
            let taken = emit_jcc_fwd(ctx.buf, cond);
            ctx.add_fixup(branch_target(ctx.pc, insn), taken);
            ctx.state = BlockState::SubBlockDone;
        }
        _ => {}
    }
}

/// J/JAL.
pub fn jump(ctx: &mut DisasContext<'_>, insn: Insn) {
    match ctx.state {
        BlockState::Normal => {
            if Opcode::decode(insn) == Opcode::Jal {
                ctx.store_gpr_imm(31, link_address(ctx.pc));
            }
            begin(ctx, false);
        }
        BlockState::DelaySlotResolved => {
            ctx.branch = None;
            ctx.flush_charge();
            let site = emit_jmp_fwd(ctx.buf);
            ctx.add_fixup(jump_target(insn), site);
            ctx.state = BlockState::Finished;
        }
        _ => {}
    }
}

/// JR/JALR. The target is stored to `state.pc` before the delay slot
/// runs and looked up in the jump table afterwards; a miss leaves
/// generated code so the dispatcher can compile it.
pub fn jump_register(ctx: &mut DisasContext<'_>, insn: Insn) {
    match ctx.state {
        BlockState::Normal => {
            ctx.load_gpr(Reg::Rax, insn.rs());
            emit_arith_ri(ctx.buf, ArithOp::And, false, Reg::Rax, PC_MASK as i32);
            emit_store(ctx.buf, false, Reg::Rax, Reg::Rbp, PC_OFFSET);
            if Opcode::decode(insn) == Opcode::Jalr {
                ctx.store_gpr_imm(insn.rd(), link_address(ctx.pc));
            }
            begin(ctx, false);
        }
        BlockState::DelaySlotResolved => {
            ctx.branch = None;
            ctx.flush_charge();
            let table = ctx.table.base_ptr() as u64;
            let buf = &mut *ctx.buf;
            emit_load(buf, false, Reg::Rax, Reg::Rbp, PC_OFFSET);
            emit_mov_ri(buf, true, Reg::Rcx, table);
            // slot = table + (pc >> 2) * 8
            emit_load_sib(buf, true, Reg::Rax, Reg::Rcx, Reg::Rax, 1, 0);
            emit_test_rr(buf, true, Reg::Rax, Reg::Rax);
            emit_jcc(buf, X86Cond::Je, ctx.runtime.epilogue);
            emit_jmp_reg(buf, Reg::Rax);
            ctx.state = BlockState::Finished;
        }
        _ => {}
    }
}

/// BREAK: halt with the broke bit set and leave generated code.
pub fn brk(ctx: &mut DisasContext<'_>, _insn: Insn) {
    emit_store_imm(ctx.buf, false, Reg::Rbp, HALTED_OFFSET, 1);
    emit_arith_mi(
        ctx.buf,
        ArithOp::Or,
        false,
        Reg::Rbp,
        cop0_offset(COP0_SP_STATUS),
        (SP_STATUS_HALT | SP_STATUS_BROKE) as i32,
    );
    ctx.flush_charge();
    ctx.emit_store_resume_pc();
    emit_jmp(ctx.buf, ctx.runtime.epilogue);
    if ctx.state == BlockState::Normal {
        ctx.state = BlockState::Finished;
    }
}

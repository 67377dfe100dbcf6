//! Scalar DMEM loads and stores.
//!
//! DMEM is big-endian; the host is not. Halfwords are swapped with
//! `rol 8`, words with `bswap`. A fast path is only taken for
//! naturally aligned addresses; anything else is handed to the
//! interpreter, which knows how accesses wrap at the end of DMEM.

use rsp_backend::x86_64::emitter::*;
use rsp_backend::x86_64::Reg;
use rsp_backend::{CodeBuffer, PatchHandle};
use rsp_core::state::{DMEM_OFFSET, MEM_MASK};
use rsp_core::{Insn, Opcode};
use tracing::warn;

use super::DisasContext;

/// A DMEM location addressable from generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemOperand {
    /// `[rbp + DMEM + addr]`, address known at compile time.
    Fixed(u32),
    /// `[rbp + rbx + DMEM]`, masked address in EBX.
    Indexed,
}

/// Emit `opc` with `r` against `mem + disp`.
pub(crate) fn emit_mem(buf: &mut CodeBuffer, opc: u32, r: Reg, mem: MemOperand, disp: i32) {
    match mem {
        MemOperand::Fixed(addr) => {
            emit_modrm_offset(buf, opc, r, Reg::Rbp, DMEM_OFFSET + addr as i32 + disp)
        }
        MemOperand::Indexed => emit_modrm_sib(buf, opc, r, Reg::Rbp, Reg::Rbx, 0, DMEM_OFFSET + disp),
    }
}

/// Outcome of address generation.
pub(crate) enum Access {
    /// Fast path valid unconditionally.
    Direct(MemOperand),
    /// Fast path guarded by an alignment test; resolve the handle with
    /// `emit_slow_path` after emitting the fast path.
    Guarded(MemOperand, PatchHandle),
    /// Address is known to be misaligned.
    Misaligned(u32),
}

/// Compute `gpr[base] + offset` masked to DMEM, requiring `align`
/// byte alignment. With `trust_alignment` no runtime test is made.
pub(crate) fn dmem_access(
    ctx: &mut DisasContext<'_>,
    base: usize,
    offset: i32,
    align: u32,
    trust_alignment: bool,
) -> Access {
    if let Some(b) = ctx.gpr_const(base) {
        let addr = b.wrapping_add(offset as u32) & MEM_MASK;
        return if addr & (align - 1) != 0 {
            Access::Misaligned(addr)
        } else {
            Access::Direct(MemOperand::Fixed(addr))
        };
    }

    ctx.load_gpr(Reg::Rbx, base);
    if offset != 0 {
        emit_arith_ri(ctx.buf, ArithOp::Add, false, Reg::Rbx, offset);
    }
    emit_arith_ri(ctx.buf, ArithOp::And, false, Reg::Rbx, MEM_MASK as i32);
    if align == 1 || trust_alignment {
        return Access::Direct(MemOperand::Indexed);
    }
    emit_test_ri(ctx.buf, Reg::Rbx, align - 1);
    let guard = emit_jcc_fwd(ctx.buf, X86Cond::Jne);
    Access::Guarded(MemOperand::Indexed, guard)
}

fn width(op: Opcode) -> u32 {
    match op {
        Opcode::Lb | Opcode::Lbu | Opcode::Sb => 1,
        Opcode::Lh | Opcode::Lhu | Opcode::Sh => 2,
        _ => 4,
    }
}

/// LB/LBU/LH/LHU/LW.
pub fn load(ctx: &mut DisasContext<'_>, insn: Insn) {
    let op = Opcode::decode(insn);
    let rt = insn.rt();
    if rt == 0 {
        return;
    }
    let align_gpr = ctx.config.align_gpr;
    let (mem, guard) = match dmem_access(ctx, insn.base(), insn.simm(), width(op), align_gpr) {
        Access::Direct(mem) => (mem, None),
        Access::Guarded(mem, guard) => (mem, Some(guard)),
        Access::Misaligned(addr) => {
            warn!(pc = ctx.pc, addr, "misaligned constant load, using interpreter");
            ctx.emit_trap(insn);
            return;
        }
    };

    let buf = &mut *ctx.buf;
    match op {
        Opcode::Lb => emit_mem(buf, OPC_MOVSBL, Reg::Rax, mem, 0),
        Opcode::Lbu => emit_mem(buf, OPC_MOVZBL, Reg::Rax, mem, 0),
        Opcode::Lh | Opcode::Lhu => {
            emit_mem(buf, OPC_MOVZWL, Reg::Rax, mem, 0);
            emit_shift16_ri(buf, ShiftOp::Rol, Reg::Rax, 8);
            if op == Opcode::Lh {
                emit_movsx(buf, OPC_MOVSWL, Reg::Rax, Reg::Rax);
            } else {
                emit_movzx(buf, OPC_MOVZWL, Reg::Rax, Reg::Rax);
            }
        }
        _ => {
            emit_mem(buf, OPC_MOVL_GvEv, Reg::Rax, mem, 0);
            emit_bswap(buf, false, Reg::Rax);
        }
    }
    ctx.store_gpr(rt, Reg::Rax);

    if let Some(guard) = guard {
        ctx.emit_slow_path(guard, insn);
    }
}

/// SB/SH/SW.
pub fn store(ctx: &mut DisasContext<'_>, insn: Insn) {
    let op = Opcode::decode(insn);
    let align_gpr = ctx.config.align_gpr;
    let (mem, guard) = match dmem_access(ctx, insn.base(), insn.simm(), width(op), align_gpr) {
        Access::Direct(mem) => (mem, None),
        Access::Guarded(mem, guard) => (mem, Some(guard)),
        Access::Misaligned(addr) => {
            warn!(pc = ctx.pc, addr, "misaligned constant store, using interpreter");
            ctx.emit_trap(insn);
            return;
        }
    };

    ctx.load_gpr(Reg::Rax, insn.rt());
    let buf = &mut *ctx.buf;
    match op {
        Opcode::Sb => emit_mem(buf, OPC_MOVB_EvGv | P_REXB_R, Reg::Rax, mem, 0),
        Opcode::Sh => {
            emit_shift16_ri(buf, ShiftOp::Rol, Reg::Rax, 8);
            emit_mem(buf, OPC_MOVW_EvGv, Reg::Rax, mem, 0);
        }
        _ => {
            emit_bswap(buf, false, Reg::Rax);
            emit_mem(buf, OPC_MOVL_EvGv, Reg::Rax, mem, 0);
        }
    }

    if let Some(guard) = guard {
        ctx.emit_slow_path(guard, insn);
    }
}

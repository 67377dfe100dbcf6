//! Vector loads and stores between DMEM and vector registers.
//!
//! Native forms exist for the byte-order-preserving group (LSV, LLV,
//! LDV, LQV and the matching stores) when the element selector is
//! even and the access is naturally aligned. Each halfword then maps
//! onto exactly one lane and no access wraps at the end of DMEM.

use rsp_backend::x86_64::emitter::*;
use rsp_backend::x86_64::{Reg, Xmm};
use rsp_backend::{CodeBuffer, PatchHandle};
use rsp_core::state::{vpr_offset, DMEM_OFFSET};
use rsp_core::{Insn, Opcode};
use tracing::warn;

use super::memory::{dmem_access, emit_mem, Access, MemOperand};
use super::{trap, DisasContext};

/// Bytes moved by a native vector access, or `None` for forms that
/// always go to the interpreter.
fn native_size(op: Opcode, e: u32) -> Option<u32> {
    let size = match op {
        Opcode::Lsv | Opcode::Ssv => 2,
        Opcode::Llv | Opcode::Slv => 4,
        Opcode::Ldv | Opcode::Sdv => 8,
        Opcode::Lqv | Opcode::Sqv if e == 0 => 16,
        _ => return None,
    };
    (e & 1 == 0 && e + size <= 16).then_some(size)
}

fn swap_halfwords(buf: &mut CodeBuffer) {
    // Byte-swap every 16-bit lane of xmm0.
    emit_movdqa_rr(buf, Xmm::Xmm1, Xmm::Xmm0);
    emit_sse_shift_ri(buf, OPC_SHIFTW_Ib, PackedShiftOp::Sll, Xmm::Xmm0, 8);
    emit_sse_shift_ri(buf, OPC_SHIFTW_Ib, PackedShiftOp::Srl, Xmm::Xmm1, 8);
    emit_sse_rr(buf, OPC_POR, Xmm::Xmm0, Xmm::Xmm1);
}

fn emit_quad_load(buf: &mut CodeBuffer, mem: MemOperand) {
    match mem {
        MemOperand::Fixed(addr) => {
            emit_movdqu_load(buf, Xmm::Xmm0, Reg::Rbp, DMEM_OFFSET + addr as i32)
        }
        MemOperand::Indexed => emit_movdqu_load_sib(buf, Xmm::Xmm0, Reg::Rbp, Reg::Rbx, DMEM_OFFSET),
    }
}

fn emit_quad_store(buf: &mut CodeBuffer, mem: MemOperand) {
    match mem {
        MemOperand::Fixed(addr) => {
            emit_movdqu_store(buf, Xmm::Xmm0, Reg::Rbp, DMEM_OFFSET + addr as i32)
        }
        MemOperand::Indexed => emit_movdqu_store_sib(buf, Xmm::Xmm0, Reg::Rbp, Reg::Rbx, DMEM_OFFSET),
    }
}

/// Shared front half of every native vector access.
fn begin(
    ctx: &mut DisasContext<'_>,
    insn: Insn,
    size: u32,
) -> Option<(MemOperand, Option<PatchHandle>)> {
    let align_vector = ctx.config.align_vector;
    let offset = insn.voffset() * size as i32;
    match dmem_access(ctx, insn.base(), offset, size, align_vector) {
        Access::Direct(mem) => Some((mem, None)),
        Access::Guarded(mem, guard) => Some((mem, Some(guard))),
        Access::Misaligned(addr) => {
            warn!(pc = ctx.pc, addr, "misaligned constant vector access, using interpreter");
            ctx.emit_trap(insn);
            None
        }
    }
}

/// LSV/LLV/LDV/LQV.
pub fn load(ctx: &mut DisasContext<'_>, insn: Insn) {
    let op = Opcode::decode(insn);
    let e = insn.del();
    let Some(size) = native_size(op, e) else {
        return trap(ctx, insn);
    };
    let Some((mem, guard)) = begin(ctx, insn, size) else {
        return;
    };

    let vt = insn.vt();
    let buf = &mut *ctx.buf;
    if size == 16 {
        emit_quad_load(buf, mem);
        swap_halfwords(buf);
        emit_movdqu_store(buf, Xmm::Xmm0, Reg::Rbp, vpr_offset(vt, 0));
    } else {
        let first = (e >> 1) as usize;
        for k in 0..(size / 2) as usize {
            emit_mem(buf, OPC_MOVZWL, Reg::Rax, mem, 2 * k as i32);
            emit_shift16_ri(buf, ShiftOp::Rol, Reg::Rax, 8);
            emit_store16(buf, Reg::Rax, Reg::Rbp, vpr_offset(vt, first + k));
        }
    }

    if let Some(guard) = guard {
        ctx.emit_slow_path(guard, insn);
    }
}

/// SSV/SLV/SDV/SQV.
pub fn store(ctx: &mut DisasContext<'_>, insn: Insn) {
    let op = Opcode::decode(insn);
    let e = insn.del();
    let Some(size) = native_size(op, e) else {
        return trap(ctx, insn);
    };
    let Some((mem, guard)) = begin(ctx, insn, size) else {
        return;
    };

    let vt = insn.vt();
    let buf = &mut *ctx.buf;
    if size == 16 {
        emit_movdqu_load(buf, Xmm::Xmm0, Reg::Rbp, vpr_offset(vt, 0));
        swap_halfwords(buf);
        emit_quad_store(buf, mem);
    } else {
        let first = (e >> 1) as usize;
        for k in 0..(size / 2) as usize {
            emit_load_zx(buf, OPC_MOVZWL, Reg::Rax, Reg::Rbp, vpr_offset(vt, first + k));
            emit_shift16_ri(buf, ShiftOp::Rol, Reg::Rax, 8);
            emit_mem(buf, OPC_MOVW_EvGv, Reg::Rax, mem, 2 * k as i32);
        }
    }

    if let Some(guard) = guard {
        ctx.emit_slow_path(guard, insn);
    }
}

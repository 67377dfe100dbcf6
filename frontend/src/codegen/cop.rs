//! Coprocessor 2 moves between scalar registers, vector lanes and
//! the vector flag registers. Byte-granular element selectors go to
//! the interpreter.

use rsp_backend::x86_64::emitter::*;
use rsp_backend::x86_64::Reg;
use rsp_core::state::{vpr_offset, VCC_OFFSET, VCE_OFFSET, VCO_OFFSET};
use rsp_core::Insn;

use super::{trap, DisasContext};

/// Lane addressed by an even element selector.
fn lane(insn: Insn) -> Option<usize> {
    let e = insn.del();
    (e & 1 == 0).then_some((e >> 1) as usize)
}

fn flag_register(insn: Insn) -> (i32, u32) {
    match insn.rd() & 3 {
        0 => (VCO_OFFSET, 0xFFFF),
        1 => (VCC_OFFSET, 0xFFFF),
        _ => (VCE_OFFSET, 0xFF),
    }
}

pub fn mfc2(ctx: &mut DisasContext<'_>, insn: Insn) {
    let Some(lane) = lane(insn) else {
        return trap(ctx, insn);
    };
    if insn.rt() == 0 {
        return;
    }
    emit_load_sx(ctx.buf, OPC_MOVSWL, Reg::Rax, Reg::Rbp, vpr_offset(insn.vs(), lane));
    ctx.store_gpr(insn.rt(), Reg::Rax);
}

pub fn mtc2(ctx: &mut DisasContext<'_>, insn: Insn) {
    let Some(lane) = lane(insn) else {
        return trap(ctx, insn);
    };
    match ctx.gpr_const(insn.rt()) {
        Some(v) => emit_store16_imm(ctx.buf, Reg::Rbp, vpr_offset(insn.vs(), lane), v as u16),
        None => {
            ctx.load_gpr(Reg::Rax, insn.rt());
            emit_store16(ctx.buf, Reg::Rax, Reg::Rbp, vpr_offset(insn.vs(), lane));
        }
    }
}

pub fn cfc2(ctx: &mut DisasContext<'_>, insn: Insn) {
    if insn.rt() == 0 {
        return;
    }
    let (offset, mask) = flag_register(insn);
    let opc = if mask == 0xFF { OPC_MOVZBL } else { OPC_MOVSWL };
    emit_load_sx(ctx.buf, opc, Reg::Rax, Reg::Rbp, offset);
    ctx.store_gpr(insn.rt(), Reg::Rax);
}

pub fn ctc2(ctx: &mut DisasContext<'_>, insn: Insn) {
    let (offset, mask) = flag_register(insn);
    match ctx.gpr_const(insn.rt()) {
        Some(v) => emit_store_imm(ctx.buf, false, Reg::Rbp, offset, (v & mask) as i32),
        None => {
            ctx.load_gpr(Reg::Rax, insn.rt());
            emit_arith_ri(ctx.buf, ArithOp::And, false, Reg::Rax, mask as i32);
            emit_store(ctx.buf, false, Reg::Rax, Reg::Rbp, offset);
        }
    }
}

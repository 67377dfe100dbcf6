//! Vector unit compute instructions.
//!
//! Each lane is computed in general-purpose registers, except for a
//! few multiplies and bitwise ops that have an exact eight-lane SSE2
//! form when the accumulator result is dead and the element selector
//! needs no shuffle. Writes to the accumulator and to the destination
//! register are dropped when the liveness walks prove them dead.

use rsp_backend::x86_64::emitter::*;
use rsp_backend::x86_64::regs::VECTOR_SCRATCH_OFFSET;
use rsp_backend::x86_64::{Reg, Xmm};
use rsp_core::insn::select_lane;
use rsp_core::state::{acc_offset, vpr_offset, NUM_LANES, VCC_OFFSET, VCO_OFFSET};
use rsp_core::{Insn, Opcode};

use super::{trap, DisasContext};
use crate::analysis::AccSlices;

/// Where lane results are written.
///
/// When the destination is also the shuffled second operand, a lane
/// written early could be read again by a later lane; results are
/// then staged on the stack and copied over at the end.
struct Dest {
    reg: usize,
    staged: bool,
}

impl Dest {
    fn new(insn: Insn) -> Self {
        Self {
            reg: insn.vd(),
            staged: insn.vd() == insn.vt() && insn.element() >= 2,
        }
    }

    fn lane(&self, i: usize) -> (Reg, i32) {
        if self.staged {
            (Reg::Rsp, VECTOR_SCRATCH_OFFSET + 2 * i as i32)
        } else {
            (Reg::Rbp, vpr_offset(self.reg, i))
        }
    }

    fn store(&self, ctx: &mut DisasContext<'_>, src: Reg, i: usize) {
        let (base, offset) = self.lane(i);
        emit_store16(ctx.buf, src, base, offset);
    }

    fn commit(&self, ctx: &mut DisasContext<'_>) {
        if self.staged {
            emit_movdqu_load(ctx.buf, Xmm::Xmm0, Reg::Rsp, VECTOR_SCRATCH_OFFSET);
            emit_movdqu_store(ctx.buf, Xmm::Xmm0, Reg::Rbp, vpr_offset(self.reg, 0));
        }
    }
}

#[inline]
fn vs_lane(insn: Insn, i: usize) -> i32 {
    vpr_offset(insn.vs(), i)
}

#[inline]
fn vt_lane(insn: Insn, i: usize) -> i32 {
    vpr_offset(insn.vt(), select_lane(insn.element(), i))
}

/// Selector that reads `vt` unshuffled or broadcasts one lane.
fn simd_selector(e: u32) -> bool {
    e < 2 || e >= 8
}

/// xmm0 = vs, xmm1 = vt after element selection.
fn simd_load_operands(ctx: &mut DisasContext<'_>, insn: Insn) {
    let buf = &mut *ctx.buf;
    emit_movdqu_load(buf, Xmm::Xmm0, Reg::Rbp, vpr_offset(insn.vs(), 0));
    let e = insn.element();
    if e < 2 {
        emit_movdqu_load(buf, Xmm::Xmm1, Reg::Rbp, vpr_offset(insn.vt(), 0));
    } else {
        emit_load_zx(buf, OPC_MOVZWL, Reg::Rax, Reg::Rbp, vpr_offset(insn.vt(), (e & 7) as usize));
        emit_movd_to_xmm(buf, Xmm::Xmm1, Reg::Rax);
        emit_pshuf(buf, OPC_PSHUFLW, Xmm::Xmm1, Xmm::Xmm1, 0);
        emit_pshuf(buf, OPC_PSHUFD, Xmm::Xmm1, Xmm::Xmm1, 0);
    }
}

// -- Multiply family --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clamp {
    Signed,
    Low,
    Unsigned,
}

#[derive(Debug, Clone, Copy)]
struct Multiply {
    s_signed: bool,
    t_signed: bool,
    /// Left shift applied to the raw product (-16: right shift).
    shift: i8,
    round: bool,
    accumulate: bool,
    clamp: Clamp,
}

fn multiply_form(op: Opcode) -> Multiply {
    let (s_signed, t_signed, shift, round, accumulate, clamp) = match op {
        Opcode::Vmulf => (true, true, 1, true, false, Clamp::Signed),
        Opcode::Vmulu => (true, true, 1, true, false, Clamp::Unsigned),
        Opcode::Vmacf => (true, true, 1, false, true, Clamp::Signed),
        Opcode::Vmacu => (true, true, 1, false, true, Clamp::Unsigned),
        Opcode::Vmudl => (false, false, -16, false, false, Clamp::Low),
        Opcode::Vmadl => (false, false, -16, false, true, Clamp::Low),
        Opcode::Vmudm => (true, false, 0, false, false, Clamp::Signed),
        Opcode::Vmadm => (true, false, 0, false, true, Clamp::Signed),
        Opcode::Vmudn => (false, true, 0, false, false, Clamp::Low),
        Opcode::Vmadn => (false, true, 0, false, true, Clamp::Low),
        Opcode::Vmudh => (true, true, 16, false, false, Clamp::Signed),
        _ => (true, true, 16, false, true, Clamp::Signed),
    };
    Multiply {
        s_signed,
        t_signed,
        shift,
        round,
        accumulate,
        clamp,
    }
}

fn emit_load_lane(ctx: &mut DisasContext<'_>, dst: Reg, offset: i32, signed: bool) {
    if signed {
        emit_load_sx(ctx.buf, OPC_MOVSWL | P_REXW, dst, Reg::Rbp, offset);
    } else {
        emit_load_zx(ctx.buf, OPC_MOVZWL, dst, Reg::Rbp, offset);
    }
}

/// Saturate the 48-bit accumulator value in RAX into the 16-bit
/// lane result in the low half of the returned register.
fn emit_clamp(ctx: &mut DisasContext<'_>, clamp: Clamp) -> Reg {
    let buf = &mut *ctx.buf;
    emit_mov_rr(buf, true, Reg::Rdx, Reg::Rax);
    emit_shift_ri(buf, ShiftOp::Sar, true, Reg::Rdx, 16);
    match clamp {
        Clamp::Signed => {
            emit_mov_ri(buf, true, Reg::Rcx, (-32768i64) as u64);
            emit_arith_rr(buf, ArithOp::Cmp, true, Reg::Rdx, Reg::Rcx);
            emit_cmovcc(buf, X86Cond::Jl, true, Reg::Rdx, Reg::Rcx);
            emit_mov_ri(buf, true, Reg::Rcx, 0x7FFF);
            emit_arith_rr(buf, ArithOp::Cmp, true, Reg::Rdx, Reg::Rcx);
            emit_cmovcc(buf, X86Cond::Jg, true, Reg::Rdx, Reg::Rcx);
            Reg::Rdx
        }
        Clamp::Low => {
            emit_mov_ri(buf, false, Reg::R8, 0);
            emit_mov_ri(buf, false, Reg::R9, 0xFFFF);
            emit_arith_ri(buf, ArithOp::Cmp, true, Reg::Rdx, -32768);
            emit_cmovcc(buf, X86Cond::Jl, false, Reg::Rax, Reg::R8);
            emit_arith_ri(buf, ArithOp::Cmp, true, Reg::Rdx, 0x7FFF);
            emit_cmovcc(buf, X86Cond::Jg, false, Reg::Rax, Reg::R9);
            Reg::Rax
        }
        Clamp::Unsigned => {
            emit_mov_ri(buf, false, Reg::R8, 0);
            emit_mov_ri(buf, false, Reg::R9, 0xFFFF);
            emit_test_rr(buf, true, Reg::Rdx, Reg::Rdx);
            emit_cmovcc(buf, X86Cond::Jl, false, Reg::Rdx, Reg::R8);
            emit_arith_ri(buf, ArithOp::Cmp, true, Reg::Rdx, 0x7FFF);
            emit_cmovcc(buf, X86Cond::Jg, false, Reg::Rdx, Reg::R9);
            Reg::Rdx
        }
    }
}

fn multiply_lanes(ctx: &mut DisasContext<'_>, insn: Insn, form: Multiply, acc_live: bool, dest_live: bool) {
    let dest = Dest::new(insn);
    for i in 0..NUM_LANES {
        emit_load_lane(ctx, Reg::Rax, vs_lane(insn, i), form.s_signed);
        emit_load_lane(ctx, Reg::Rcx, vt_lane(insn, i), form.t_signed);
        let buf = &mut *ctx.buf;
        emit_imul_rr(buf, true, Reg::Rax, Reg::Rcx);
        match form.shift {
            0 => {}
            s if s < 0 => emit_shift_ri(buf, ShiftOp::Shr, true, Reg::Rax, (-s) as u8),
            s => emit_shift_ri(buf, ShiftOp::Shl, true, Reg::Rax, s as u8),
        }
        if form.round {
            emit_arith_ri(buf, ArithOp::Add, true, Reg::Rax, 0x8000);
        }
        if form.accumulate {
            emit_arith_rm(buf, ArithOp::Add, true, Reg::Rax, Reg::Rbp, acc_offset(i));
            emit_shift_ri(buf, ShiftOp::Shl, true, Reg::Rax, 16);
            emit_shift_ri(buf, ShiftOp::Sar, true, Reg::Rax, 16);
        }
        if acc_live {
            emit_store(buf, true, Reg::Rax, Reg::Rbp, acc_offset(i));
        }
        if dest_live {
            let result = emit_clamp(ctx, form.clamp);
            dest.store(ctx, result, i);
        }
    }
    if dest_live {
        dest.commit(ctx);
    }
}

/// Eight-lane multiply for the forms whose result needs no
/// accumulator state. Returns false if `op` has no such form.
fn multiply_simd(ctx: &mut DisasContext<'_>, op: Opcode, insn: Insn) -> bool {
    if !matches!(op, Opcode::Vmulf | Opcode::Vmudl | Opcode::Vmudm | Opcode::Vmudn | Opcode::Vmudh) {
        return false;
    }
    simd_load_operands(ctx, insn);
    let buf = &mut *ctx.buf;
    let result = match op {
        Opcode::Vmudl => {
            emit_sse_rr(buf, OPC_PMULHUW, Xmm::Xmm0, Xmm::Xmm1);
            Xmm::Xmm0
        }
        Opcode::Vmudn => {
            emit_sse_rr(buf, OPC_PMULLW, Xmm::Xmm0, Xmm::Xmm1);
            Xmm::Xmm0
        }
        Opcode::Vmudm => {
            // high(s * unsigned t) = high(s * t) + (t < 0 ? s : 0)
            emit_movdqa_rr(buf, Xmm::Xmm2, Xmm::Xmm0);
            emit_sse_rr(buf, OPC_PMULHW, Xmm::Xmm2, Xmm::Xmm1);
            emit_movdqa_rr(buf, Xmm::Xmm3, Xmm::Xmm1);
            emit_sse_shift_ri(buf, OPC_SHIFTW_Ib, PackedShiftOp::Sra, Xmm::Xmm3, 15);
            emit_sse_rr(buf, OPC_PAND, Xmm::Xmm3, Xmm::Xmm0);
            emit_sse_rr(buf, OPC_PADDW, Xmm::Xmm2, Xmm::Xmm3);
            Xmm::Xmm2
        }
        _ => {
            // Full 32-bit products: lanes 0-3 in xmm0, 4-7 in xmm3.
            emit_movdqa_rr(buf, Xmm::Xmm2, Xmm::Xmm0);
            emit_sse_rr(buf, OPC_PMULLW, Xmm::Xmm0, Xmm::Xmm1);
            emit_sse_rr(buf, OPC_PMULHW, Xmm::Xmm2, Xmm::Xmm1);
            emit_movdqa_rr(buf, Xmm::Xmm3, Xmm::Xmm0);
            emit_sse_rr(buf, OPC_PUNPCKLWD, Xmm::Xmm0, Xmm::Xmm2);
            emit_sse_rr(buf, OPC_PUNPCKHWD, Xmm::Xmm3, Xmm::Xmm2);
            if op == Opcode::Vmulf {
                // (2p + 0x8000) >> 16 == (p + 0x4000) >> 15
                emit_mov_ri(buf, false, Reg::Rax, 0x4000);
                emit_movd_to_xmm(buf, Xmm::Xmm4, Reg::Rax);
                emit_pshuf(buf, OPC_PSHUFD, Xmm::Xmm4, Xmm::Xmm4, 0);
                emit_sse_rr(buf, OPC_PADDD, Xmm::Xmm0, Xmm::Xmm4);
                emit_sse_rr(buf, OPC_PADDD, Xmm::Xmm3, Xmm::Xmm4);
                emit_sse_shift_ri(buf, OPC_SHIFTD_Ib, PackedShiftOp::Sra, Xmm::Xmm0, 15);
                emit_sse_shift_ri(buf, OPC_SHIFTD_Ib, PackedShiftOp::Sra, Xmm::Xmm3, 15);
            }
            emit_sse_rr(buf, OPC_PACKSSDW, Xmm::Xmm0, Xmm::Xmm3);
            Xmm::Xmm0
        }
    };
    emit_movdqu_store(buf, result, Reg::Rbp, vpr_offset(insn.vd(), 0));
    ctx.stats.simd_paths += 1;
    true
}

/// VMULF/VMULU/VMUDL/VMUDM/VMUDN/VMUDH and their accumulating forms.
pub fn multiply(ctx: &mut DisasContext<'_>, insn: Insn) {
    let op = Opcode::decode(insn);
    let form = multiply_form(op);
    let acc_live = ctx.accumulator_live(AccSlices::all());
    let dest_live = ctx.dest_live(insn.vd());
    if !acc_live {
        ctx.stats.accum_writes_elided += 1;
    }
    if !dest_live {
        ctx.stats.dest_writes_elided += 1;
    }
    if !acc_live && !dest_live {
        return;
    }

    if !acc_live && ctx.config.simd && simd_selector(insn.element()) && multiply_simd(ctx, op, insn) {
        return;
    }
    multiply_lanes(ctx, insn, form, acc_live, dest_live);
}

// -- Add/subtract --

/// Clamp EAX to a signed halfword.
fn emit_clamp16(ctx: &mut DisasContext<'_>) {
    let buf = &mut *ctx.buf;
    emit_mov_ri(buf, false, Reg::Rdx, (-32768i32) as u32 as u64);
    emit_arith_ri(buf, ArithOp::Cmp, false, Reg::Rax, -32768);
    emit_cmovcc(buf, X86Cond::Jl, false, Reg::Rax, Reg::Rdx);
    emit_mov_ri(buf, false, Reg::Rdx, 0x7FFF);
    emit_arith_ri(buf, ArithOp::Cmp, false, Reg::Rax, 0x7FFF);
    emit_cmovcc(buf, X86Cond::Jg, false, Reg::Rax, Reg::Rdx);
}

/// VADD/VSUB: signed saturating add with the VCO carry folded in.
pub fn add_sub(ctx: &mut DisasContext<'_>, insn: Insn) {
    let op = Opcode::decode(insn);
    let carry = ctx.flags_may_be_set();
    let acc_live = ctx.accumulator_live(AccSlices::LOW);
    if !acc_live {
        ctx.stats.accum_writes_elided += 1;
    }

    if op == Opcode::Vadd && !carry && !acc_live && ctx.config.simd && simd_selector(insn.element()) {
        simd_load_operands(ctx, insn);
        emit_sse_rr(ctx.buf, OPC_PADDSW, Xmm::Xmm0, Xmm::Xmm1);
        emit_movdqu_store(ctx.buf, Xmm::Xmm0, Reg::Rbp, vpr_offset(insn.vd(), 0));
        emit_store_imm(ctx.buf, false, Reg::Rbp, VCO_OFFSET, 0);
        ctx.stats.simd_paths += 1;
        return;
    }

    let dest = Dest::new(insn);
    let arith = match (op, carry) {
        (Opcode::Vadd, true) => ArithOp::Adc,
        (Opcode::Vadd, false) => ArithOp::Add,
        (_, true) => ArithOp::Sbb,
        (_, false) => ArithOp::Sub,
    };
    for i in 0..NUM_LANES {
        let buf = &mut *ctx.buf;
        emit_load_sx(buf, OPC_MOVSWL, Reg::Rax, Reg::Rbp, vs_lane(insn, i));
        emit_load_sx(buf, OPC_MOVSWL, Reg::Rcx, Reg::Rbp, vt_lane(insn, i));
        if carry {
            emit_bt_mi(buf, Reg::Rbp, VCO_OFFSET, i as u8);
        }
        emit_arith_rr(buf, arith, false, Reg::Rax, Reg::Rcx);
        if acc_live {
            emit_store16(buf, Reg::Rax, Reg::Rbp, acc_offset(i));
        }
        emit_clamp16(ctx);
        dest.store(ctx, Reg::Rax, i);
    }
    dest.commit(ctx);
    emit_store_imm(ctx.buf, false, Reg::Rbp, VCO_OFFSET, 0);
}

// -- Bitwise and select --

/// VAND/VNAND/VOR/VNOR/VXOR/VNXOR.
pub fn logical(ctx: &mut DisasContext<'_>, insn: Insn) {
    let op = Opcode::decode(insn);
    let acc_live = ctx.accumulator_live(AccSlices::LOW);
    if !acc_live {
        ctx.stats.accum_writes_elided += 1;
    }
    let (arith, invert) = match op {
        Opcode::Vand => (ArithOp::And, false),
        Opcode::Vnand => (ArithOp::And, true),
        Opcode::Vor => (ArithOp::Or, false),
        Opcode::Vnor => (ArithOp::Or, true),
        Opcode::Vxor => (ArithOp::Xor, false),
        _ => (ArithOp::Xor, true),
    };

    if !invert && !acc_live && ctx.config.simd && simd_selector(insn.element()) {
        simd_load_operands(ctx, insn);
        let opc = match arith {
            ArithOp::And => OPC_PAND,
            ArithOp::Or => OPC_POR,
            _ => OPC_PXOR,
        };
        emit_sse_rr(ctx.buf, opc, Xmm::Xmm0, Xmm::Xmm1);
        emit_movdqu_store(ctx.buf, Xmm::Xmm0, Reg::Rbp, vpr_offset(insn.vd(), 0));
        ctx.stats.simd_paths += 1;
        return;
    }

    let dest = Dest::new(insn);
    for i in 0..NUM_LANES {
        let buf = &mut *ctx.buf;
        emit_load_zx(buf, OPC_MOVZWL, Reg::Rax, Reg::Rbp, vs_lane(insn, i));
        emit_load_zx(buf, OPC_MOVZWL, Reg::Rcx, Reg::Rbp, vt_lane(insn, i));
        emit_arith_rr(buf, arith, false, Reg::Rax, Reg::Rcx);
        if invert {
            emit_not(buf, false, Reg::Rax);
        }
        if acc_live {
            emit_store16(buf, Reg::Rax, Reg::Rbp, acc_offset(i));
        }
        dest.store(ctx, Reg::Rax, i);
    }
    dest.commit(ctx);
}

/// VMRG: per-lane select on VCC.
pub fn merge(ctx: &mut DisasContext<'_>, insn: Insn) {
    let acc_live = ctx.accumulator_live(AccSlices::LOW);
    if !acc_live {
        ctx.stats.accum_writes_elided += 1;
    }
    let dest = Dest::new(insn);
    for i in 0..NUM_LANES {
        let buf = &mut *ctx.buf;
        emit_load_zx(buf, OPC_MOVZWL, Reg::Rax, Reg::Rbp, vt_lane(insn, i));
        emit_load_zx(buf, OPC_MOVZWL, Reg::Rcx, Reg::Rbp, vs_lane(insn, i));
        emit_bt_mi(buf, Reg::Rbp, VCC_OFFSET, i as u8);
        emit_cmovcc(buf, X86Cond::Jb, false, Reg::Rax, Reg::Rcx);
        if acc_live {
            emit_store16(buf, Reg::Rax, Reg::Rbp, acc_offset(i));
        }
        dest.store(ctx, Reg::Rax, i);
    }
    dest.commit(ctx);
}

/// VMOV: copy one selected lane; the accumulator low slice receives
/// the whole selected operand.
pub fn mov(ctx: &mut DisasContext<'_>, insn: Insn) {
    if ctx.accumulator_live(AccSlices::LOW) {
        for i in 0..NUM_LANES {
            emit_load_zx(ctx.buf, OPC_MOVZWL, Reg::Rax, Reg::Rbp, vt_lane(insn, i));
            emit_store16(ctx.buf, Reg::Rax, Reg::Rbp, acc_offset(i));
        }
    } else {
        ctx.stats.accum_writes_elided += 1;
    }
    let de = insn.de();
    emit_load_zx(ctx.buf, OPC_MOVZWL, Reg::Rax, Reg::Rbp, vt_lane(insn, de));
    emit_store16(ctx.buf, Reg::Rax, Reg::Rbp, vpr_offset(insn.vd(), de));
}

/// VSAR: read one accumulator slice into the destination.
pub fn read_accumulator(ctx: &mut DisasContext<'_>, insn: Insn) {
    let slice = match insn.element() {
        8 => Some(4),
        9 => Some(2),
        10 => Some(0),
        _ => None,
    };
    for i in 0..NUM_LANES {
        let dst = vpr_offset(insn.vd(), i);
        match slice {
            Some(byte) => {
                emit_load_zx(ctx.buf, OPC_MOVZWL, Reg::Rax, Reg::Rbp, acc_offset(i) + byte);
                emit_store16(ctx.buf, Reg::Rax, Reg::Rbp, dst);
            }
            None => emit_store16_imm(ctx.buf, Reg::Rbp, dst, 0),
        }
    }
}

/// Compute ops without a native form.
pub fn unaccelerated(ctx: &mut DisasContext<'_>, insn: Insn) {
    trap(ctx, insn);
}

//! Scalar ALU instructions.
//!
//! Operands proven constant over the image are folded at compile
//! time; a result computed entirely from constants is stored as an
//! immediate.

use rsp_backend::x86_64::emitter::*;
use rsp_backend::x86_64::Reg;
use rsp_core::state::gpr_offset;
use rsp_core::{Insn, Opcode};

use super::DisasContext;

/// Compile-time evaluation, matching the interpreter bit for bit.
fn fold(op: Opcode, a: u32, b: u32, sa: u32) -> u32 {
    match op {
        Opcode::Addi | Opcode::Addiu | Opcode::Add | Opcode::Addu => a.wrapping_add(b),
        Opcode::Sub | Opcode::Subu => a.wrapping_sub(b),
        Opcode::Slti | Opcode::Slt => ((a as i32) < (b as i32)) as u32,
        Opcode::Sltiu | Opcode::Sltu => (a < b) as u32,
        Opcode::Andi | Opcode::And => a & b,
        Opcode::Ori | Opcode::Or => a | b,
        Opcode::Xori | Opcode::Xor => a ^ b,
        Opcode::Nor => !(a | b),
        Opcode::Sll => b << sa,
        Opcode::Srl => b >> sa,
        Opcode::Sra => ((b as i32) >> sa) as u32,
        Opcode::Sllv => b << (a & 31),
        Opcode::Srlv => b >> (a & 31),
        Opcode::Srav => ((b as i32) >> (a & 31)) as u32,
        _ => 0,
    }
}

fn arith_op(op: Opcode) -> ArithOp {
    match op {
        Opcode::Addi | Opcode::Addiu | Opcode::Add | Opcode::Addu => ArithOp::Add,
        Opcode::Sub | Opcode::Subu => ArithOp::Sub,
        Opcode::Andi | Opcode::And => ArithOp::And,
        Opcode::Xori | Opcode::Xor => ArithOp::Xor,
        _ => ArithOp::Or,
    }
}

fn shift_op(op: Opcode) -> ShiftOp {
    match op {
        Opcode::Sll | Opcode::Sllv => ShiftOp::Shl,
        Opcode::Srl | Opcode::Srlv => ShiftOp::Shr,
        _ => ShiftOp::Sar,
    }
}

/// `ecx = (eax <cond> operand)`, with `operand` already compared.
fn emit_set_less(ctx: &mut DisasContext<'_>, unsigned: bool, dst: usize) {
    let cond = if unsigned { X86Cond::Jb } else { X86Cond::Jl };
    emit_setcc(ctx.buf, cond, Reg::Rcx);
    ctx.store_gpr(dst, Reg::Rcx);
}

/// ADDI/ADDIU/SLTI/SLTIU/ANDI/ORI/XORI.
pub fn alu_imm(ctx: &mut DisasContext<'_>, insn: Insn) {
    let op = Opcode::decode(insn);
    let (rs, rt) = (insn.rs(), insn.rt());
    if rt == 0 {
        return;
    }
    let imm = match op {
        Opcode::Andi | Opcode::Ori | Opcode::Xori => insn.imm() as u32,
        _ => insn.simm() as u32,
    };
    if let Some(a) = ctx.gpr_const(rs) {
        ctx.store_gpr_imm(rt, fold(op, a, imm, 0));
        return;
    }

    match op {
        Opcode::Slti | Opcode::Sltiu => {
            emit_mov_ri(ctx.buf, false, Reg::Rcx, 0);
            ctx.load_gpr(Reg::Rax, rs);
            emit_arith_ri(ctx.buf, ArithOp::Cmp, false, Reg::Rax, imm as i32);
            emit_set_less(ctx, op == Opcode::Sltiu, rt);
        }
        _ if rs == rt => {
            emit_arith_mi(ctx.buf, arith_op(op), false, Reg::Rbp, gpr_offset(rt), imm as i32);
        }
        _ => {
            ctx.load_gpr(Reg::Rax, rs);
            if imm != 0 || op == Opcode::Andi {
                emit_arith_ri(ctx.buf, arith_op(op), false, Reg::Rax, imm as i32);
            }
            ctx.store_gpr(rt, Reg::Rax);
        }
    }
}

pub fn lui(ctx: &mut DisasContext<'_>, insn: Insn) {
    ctx.store_gpr_imm(insn.rt(), (insn.imm() as u32) << 16);
}

/// SLL/SRL/SRA.
pub fn shift_imm(ctx: &mut DisasContext<'_>, insn: Insn) {
    let op = Opcode::decode(insn);
    let (rt, rd, sa) = (insn.rt(), insn.rd(), insn.sa());
    if rd == 0 {
        return;
    }
    if let Some(b) = ctx.gpr_const(rt) {
        ctx.store_gpr_imm(rd, fold(op, 0, b, sa));
        return;
    }
    ctx.load_gpr(Reg::Rax, rt);
    if sa != 0 {
        emit_shift_ri(ctx.buf, shift_op(op), false, Reg::Rax, sa as u8);
    }
    ctx.store_gpr(rd, Reg::Rax);
}

/// SLLV/SRLV/SRAV.
pub fn shift_var(ctx: &mut DisasContext<'_>, insn: Insn) {
    let op = Opcode::decode(insn);
    let (rs, rt, rd) = (insn.rs(), insn.rt(), insn.rd());
    if rd == 0 {
        return;
    }
    match (ctx.gpr_const(rs), ctx.gpr_const(rt)) {
        (Some(a), Some(b)) => ctx.store_gpr_imm(rd, fold(op, a, b, 0)),
        (Some(a), None) => {
            ctx.load_gpr(Reg::Rax, rt);
            if a & 31 != 0 {
                emit_shift_ri(ctx.buf, shift_op(op), false, Reg::Rax, (a & 31) as u8);
            }
            ctx.store_gpr(rd, Reg::Rax);
        }
        (None, _) => {
            ctx.load_gpr(Reg::Rcx, rs);
            ctx.load_gpr(Reg::Rax, rt);
            emit_shift_cl(ctx.buf, shift_op(op), false, Reg::Rax);
            ctx.store_gpr(rd, Reg::Rax);
        }
    }
}

/// ADD/ADDU/SUB/SUBU/AND/OR/XOR/NOR/SLT/SLTU.
pub fn alu_reg(ctx: &mut DisasContext<'_>, insn: Insn) {
    let op = Opcode::decode(insn);
    let (rs, rt, rd) = (insn.rs(), insn.rt(), insn.rd());
    if rd == 0 {
        return;
    }
    let (a, b) = (ctx.gpr_const(rs), ctx.gpr_const(rt));
    if let (Some(a), Some(b)) = (a, b) {
        ctx.store_gpr_imm(rd, fold(op, a, b, 0));
        return;
    }

    let compare = matches!(op, Opcode::Slt | Opcode::Sltu);
    if compare {
        emit_mov_ri(ctx.buf, false, Reg::Rcx, 0);
    }
    ctx.load_gpr(Reg::Rax, rs);
    let arith = if compare { ArithOp::Cmp } else { arith_op(op) };
    match b {
        Some(v) => emit_arith_ri(ctx.buf, arith, false, Reg::Rax, v as i32),
        None => emit_arith_rm(ctx.buf, arith, false, Reg::Rax, Reg::Rbp, gpr_offset(rt)),
    }

    if compare {
        emit_set_less(ctx, op == Opcode::Sltu, rd);
        return;
    }
    if op == Opcode::Nor {
        emit_not(ctx.buf, false, Reg::Rax);
    }
    ctx.store_gpr(rd, Reg::Rax);
}

#![allow(non_upper_case_globals)]

use crate::code_buffer::{CodeBuffer, PatchHandle};
use crate::x86_64::regs::{Reg, Xmm, CALLEE_SAVED, CALL_ARG_REGS, STACK_ADDEND, STATE_REG};
use crate::HostCodeGen;

// -- Prefix flags --

pub const P_EXT: u32 = 0x100; // 0x0F prefix
pub const P_DATA16: u32 = 0x400; // 0x66 prefix
pub const P_REXW: u32 = 0x1000; // REX.W = 1
pub const P_REXB_R: u32 = 0x2000; // REG field as byte register
pub const P_REXB_RM: u32 = 0x4000; // R/M field as byte register
pub const P_SIMDF3: u32 = 0x20000; // 0xF3 prefix
pub const P_SIMDF2: u32 = 0x40000; // 0xF2 prefix

// -- Opcode constants (OPC_*) --

// Arithmetic
pub const OPC_ARITH_EvIb: u32 = 0x83;
pub const OPC_ARITH_EvIz: u32 = 0x81;
pub const OPC_ARITH_GvEv: u32 = 0x03;

// Shift
pub const OPC_SHIFT_1: u32 = 0xD1;
pub const OPC_SHIFT_Ib: u32 = 0xC1;
pub const OPC_SHIFT_cl: u32 = 0xD3;

// Data movement
pub const OPC_MOVB_EvGv: u32 = 0x88;
pub const OPC_MOVL_EvGv: u32 = 0x89;
pub const OPC_MOVL_GvEv: u32 = 0x8B;
pub const OPC_MOVL_EvIz: u32 = 0xC7;
pub const OPC_MOVL_Iv: u32 = 0xB8;
pub const OPC_MOVW_EvGv: u32 = 0x89 | P_DATA16;

// Extensions
pub const OPC_MOVZBL: u32 = 0xB6 | P_EXT;
pub const OPC_MOVZWL: u32 = 0xB7 | P_EXT;
pub const OPC_MOVSBL: u32 = 0xBE | P_EXT;
pub const OPC_MOVSWL: u32 = 0xBF | P_EXT;

// Branch
pub const OPC_JCC_long: u32 = 0x80 | P_EXT;
pub const OPC_JMP_long: u32 = 0xE9;

pub const OPC_BSWAP: u32 = 0xC8 | P_EXT;

// Compare / conditional
pub const OPC_CMOVCC: u32 = 0x40 | P_EXT;
pub const OPC_SETCC: u32 = 0x90 | P_EXT | P_REXB_RM;
pub const OPC_TESTL: u32 = 0x85;

// Group opcodes
pub const OPC_GRP3_Ev: u32 = 0xF7;
pub const OPC_GRP5: u32 = 0xFF;
pub const OPC_GRPBT: u32 = 0xBA | P_EXT;

// Multiply
pub const OPC_IMUL_GvEv: u32 = 0xAF | P_EXT;

// Misc
pub const OPC_PUSH_r32: u32 = 0x50;
pub const OPC_POP_r32: u32 = 0x58;
pub const OPC_RET: u32 = 0xC3;

// SSE2 integer
pub const OPC_MOVDQU_VxWx: u32 = 0x6F | P_EXT | P_SIMDF3;
pub const OPC_MOVDQU_WxVx: u32 = 0x7F | P_EXT | P_SIMDF3;
pub const OPC_MOVDQA_VxWx: u32 = 0x6F | P_EXT | P_DATA16;
pub const OPC_MOVD_VyEy: u32 = 0x6E | P_EXT | P_DATA16;
pub const OPC_PADDW: u32 = 0xFD | P_EXT | P_DATA16;
pub const OPC_PADDSW: u32 = 0xED | P_EXT | P_DATA16;
pub const OPC_PADDD: u32 = 0xFE | P_EXT | P_DATA16;
pub const OPC_PMULLW: u32 = 0xD5 | P_EXT | P_DATA16;
pub const OPC_PMULHW: u32 = 0xE5 | P_EXT | P_DATA16;
pub const OPC_PMULHUW: u32 = 0xE4 | P_EXT | P_DATA16;
pub const OPC_PAND: u32 = 0xDB | P_EXT | P_DATA16;
pub const OPC_POR: u32 = 0xEB | P_EXT | P_DATA16;
pub const OPC_PXOR: u32 = 0xEF | P_EXT | P_DATA16;
pub const OPC_PUNPCKLWD: u32 = 0x61 | P_EXT | P_DATA16;
pub const OPC_PUNPCKHWD: u32 = 0x69 | P_EXT | P_DATA16;
pub const OPC_PACKSSDW: u32 = 0x6B | P_EXT | P_DATA16;
pub const OPC_PSHUFD: u32 = 0x70 | P_EXT | P_DATA16;
pub const OPC_PSHUFLW: u32 = 0x70 | P_EXT | P_SIMDF2;
pub const OPC_SHIFTW_Ib: u32 = 0x71 | P_EXT | P_DATA16;
pub const OPC_SHIFTD_Ib: u32 = 0x72 | P_EXT | P_DATA16;

// -- Sub-operation enums --

/// Arithmetic sub-opcodes (used in /r field of 0x81/0x83 and shifted into GvEv).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArithOp {
    Add = 0,
    Or = 1,
    Adc = 2,
    Sbb = 3,
    And = 4,
    Sub = 5,
    Xor = 6,
    Cmp = 7,
}

/// Shift sub-opcodes (used in /r field of 0xC1/0xD1/0xD3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShiftOp {
    Rol = 0,
    Shl = 4,
    Shr = 5,
    Sar = 7,
}

/// Packed shift sub-opcodes (used in /r field of 0x0F 0x71/0x72).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PackedShiftOp {
    Srl = 2,
    Sra = 4,
    Sll = 6,
}

/// Group 3 extension codes (used in /r field of 0xF7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Ext3Op {
    Not = 2,
}

/// Group 5 extension codes (used in /r field of 0xFF).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Ext5Op {
    CallN = 2,
    JmpN = 4,
}

/// Bit-test group extension codes (used in /r field of 0xBA).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GrpBtOp {
    Bt = 4,
}

/// x86 condition codes for Jcc/SETcc/CMOVcc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum X86Cond {
    Jo = 0x0,
    Jno = 0x1,
    Jb = 0x2,
    Jae = 0x3,
    Je = 0x4,
    Jne = 0x5,
    Jbe = 0x6,
    Ja = 0x7,
    Js = 0x8,
    Jns = 0x9,
    Jp = 0xA,
    Jnp = 0xB,
    Jl = 0xC,
    Jge = 0xD,
    Jle = 0xE,
    Jg = 0xF,
}

impl X86Cond {
    /// Return the inverted condition.
    pub fn invert(self) -> Self {
        use X86Cond::*;
        match self {
            Jo => Jno,
            Jno => Jo,
            Jb => Jae,
            Jae => Jb,
            Je => Jne,
            Jne => Je,
            Jbe => Ja,
            Ja => Jbe,
            Js => Jns,
            Jns => Js,
            Jp => Jnp,
            Jnp => Jp,
            Jl => Jge,
            Jge => Jl,
            Jle => Jg,
            Jg => Jle,
        }
    }
}

// -- Core encoding functions --

#[inline]
fn rexw_flag(rexw: bool) -> u32 {
    if rexw {
        P_REXW
    } else {
        0
    }
}

/// Emit legacy prefixes, REX and the opcode bytes. `r`, `rm` and
/// `index` are raw register numbers (0-15); pass 0 when unused.
fn emit_prefixed(buf: &mut CodeBuffer, opc: u32, r: u8, rm: u8, index: u8) {
    let mut rex: u8 = 0;
    if opc & P_REXW != 0 {
        rex |= 0x08;
    }
    if r >= 8 {
        rex |= 0x04;
    }
    if index >= 8 {
        rex |= 0x02;
    }
    if rm >= 8 {
        rex |= 0x01;
    }
    // SPL/BPL/SIL/DIL need a bare REX to be addressable as bytes.
    let byte_r = opc & P_REXB_R != 0 && r >= 4;
    let byte_rm = opc & P_REXB_RM != 0 && rm >= 4;
    if rex == 0 && (byte_r || byte_rm) {
        rex = 0x40;
    }

    // Mandatory SIMD prefixes must precede REX.
    if opc & P_DATA16 != 0 {
        buf.emit_u8(0x66);
    }
    if opc & P_SIMDF3 != 0 {
        buf.emit_u8(0xF3);
    } else if opc & P_SIMDF2 != 0 {
        buf.emit_u8(0xF2);
    }
    if rex != 0 {
        buf.emit_u8(0x40 | rex);
    }
    if opc & P_EXT != 0 {
        buf.emit_u8(0x0F);
    }
    buf.emit_u8(opc as u8);
}

/// Emit opcode with REX prefix. `r` is the reg field, `rm` is the r/m field.
pub fn emit_opc(buf: &mut CodeBuffer, opc: u32, r: u8, rm: u8) {
    emit_prefixed(buf, opc, r, rm, 0);
}

/// ModR/M (and SIB/displacement) for a `[base + offset]` operand
/// with raw reg field `r3`.
fn emit_mem_operand(buf: &mut CodeBuffer, r3: u8, base: Reg, offset: i32) {
    let b3 = base.low3();
    // RSP/R12 as base require a SIB byte; RBP/R13 cannot use mod=00.
    let (mode, disp) = if offset == 0 && b3 != 5 {
        (0x00, 0)
    } else if (-128..=127).contains(&offset) {
        (0x40, 1)
    } else {
        (0x80, 4)
    };
    if b3 == 4 {
        buf.emit_u8(mode | (r3 << 3) | 0x04);
        buf.emit_u8(0x24);
    } else {
        buf.emit_u8(mode | (r3 << 3) | b3);
    }
    match disp {
        1 => buf.emit_u8(offset as u8),
        4 => buf.emit_u32(offset as u32),
        _ => {}
    }
}

/// Emit opcode + ModR/M for register-register operation.
pub fn emit_modrm(buf: &mut CodeBuffer, opc: u32, r: Reg, rm: Reg) {
    emit_modrm_raw(buf, opc, r as u8, rm as u8);
}

/// Register-register form taking raw register numbers, shared by
/// the general-purpose and SSE encoders.
pub fn emit_modrm_raw(buf: &mut CodeBuffer, opc: u32, r: u8, rm: u8) {
    emit_opc(buf, opc, r, rm);
    buf.emit_u8(0xC0 | ((r & 7) << 3) | (rm & 7));
}

/// Emit opcode + ModR/M with /r extension (for group opcodes).
pub fn emit_modrm_ext(buf: &mut CodeBuffer, opc: u32, ext: u8, rm: Reg) {
    emit_modrm_raw(buf, opc, ext, rm as u8);
}

/// Emit opcode + ModR/M + displacement for memory [base + offset].
pub fn emit_modrm_offset(buf: &mut CodeBuffer, opc: u32, r: Reg, base: Reg, offset: i32) {
    emit_opc(buf, opc, r as u8, base as u8);
    emit_mem_operand(buf, r.low3(), base, offset);
}

/// Emit opcode + ModR/M with /r extension for memory [base + offset].
pub fn emit_modrm_ext_offset(buf: &mut CodeBuffer, opc: u32, ext: u8, base: Reg, offset: i32) {
    emit_opc(buf, opc, ext, base as u8);
    emit_mem_operand(buf, ext, base, offset);
}

/// Emit opcode + ModR/M + SIB for memory [base + index*scale + offset].
pub fn emit_modrm_sib(
    buf: &mut CodeBuffer,
    opc: u32,
    r: Reg,
    base: Reg,
    index: Reg,
    shift: u8,
    offset: i32,
) {
    emit_modrm_sib_raw(buf, opc, r as u8, base, index, shift, offset);
}

/// Same as `emit_modrm_sib` with a raw reg field (SSE registers).
fn emit_modrm_sib_raw(
    buf: &mut CodeBuffer,
    opc: u32,
    r: u8,
    base: Reg,
    index: Reg,
    shift: u8,
    offset: i32,
) {
    emit_prefixed(buf, opc, r, base as u8, index as u8);

    let r3 = r & 7;
    let b3 = base.low3();
    let sib = (shift << 6) | (index.low3() << 3) | b3;

    if offset == 0 && b3 != 5 {
        buf.emit_u8((r3 << 3) | 0x04);
        buf.emit_u8(sib);
    } else if (-128..=127).contains(&offset) {
        buf.emit_u8(0x44 | (r3 << 3));
        buf.emit_u8(sib);
        buf.emit_u8(offset as u8);
    } else {
        buf.emit_u8(0x84 | (r3 << 3));
        buf.emit_u8(sib);
        buf.emit_u32(offset as u32);
    }
}

// -- Arithmetic instructions --

/// Emit arithmetic reg, reg (ADD/SUB/AND/OR/XOR/CMP/ADC/SBB).
pub fn emit_arith_rr(buf: &mut CodeBuffer, op: ArithOp, rexw: bool, dst: Reg, src: Reg) {
    let opc = (OPC_ARITH_GvEv + ((op as u32) << 3)) | rexw_flag(rexw);
    emit_modrm(buf, opc, dst, src);
}

/// Emit arithmetic reg, imm (auto-selects imm8 vs imm32).
pub fn emit_arith_ri(buf: &mut CodeBuffer, op: ArithOp, rexw: bool, dst: Reg, imm: i32) {
    let w = rexw_flag(rexw);
    if (-128..=127).contains(&imm) {
        emit_modrm_ext(buf, OPC_ARITH_EvIb | w, op as u8, dst);
        buf.emit_u8(imm as u8);
    } else {
        emit_modrm_ext(buf, OPC_ARITH_EvIz | w, op as u8, dst);
        buf.emit_u32(imm as u32);
    }
}

/// Emit arithmetic [base+offset], imm (read-modify-write or CMP).
pub fn emit_arith_mi(
    buf: &mut CodeBuffer,
    op: ArithOp,
    rexw: bool,
    base: Reg,
    offset: i32,
    imm: i32,
) {
    let w = rexw_flag(rexw);
    if (-128..=127).contains(&imm) {
        emit_modrm_ext_offset(buf, OPC_ARITH_EvIb | w, op as u8, base, offset);
        buf.emit_u8(imm as u8);
    } else {
        emit_modrm_ext_offset(buf, OPC_ARITH_EvIz | w, op as u8, base, offset);
        buf.emit_u32(imm as u32);
    }
}

/// Emit arithmetic reg, [base+offset] (load-op).
pub fn emit_arith_rm(
    buf: &mut CodeBuffer,
    op: ArithOp,
    rexw: bool,
    dst: Reg,
    base: Reg,
    offset: i32,
) {
    let opc = (OPC_ARITH_GvEv + ((op as u32) << 3)) | rexw_flag(rexw);
    emit_modrm_offset(buf, opc, dst, base, offset);
}

/// Emit NOT reg.
pub fn emit_not(buf: &mut CodeBuffer, rexw: bool, reg: Reg) {
    emit_modrm_ext(buf, OPC_GRP3_Ev | rexw_flag(rexw), Ext3Op::Not as u8, reg);
}

// -- Shift instructions --

/// Emit shift reg, imm8.
pub fn emit_shift_ri(buf: &mut CodeBuffer, op: ShiftOp, rexw: bool, dst: Reg, imm: u8) {
    let w = rexw_flag(rexw);
    if imm == 1 {
        emit_modrm_ext(buf, OPC_SHIFT_1 | w, op as u8, dst);
    } else {
        emit_modrm_ext(buf, OPC_SHIFT_Ib | w, op as u8, dst);
        buf.emit_u8(imm);
    }
}

/// Emit 16-bit shift/rotate reg, imm8 (`rol ax, 8` swaps halfword bytes).
pub fn emit_shift16_ri(buf: &mut CodeBuffer, op: ShiftOp, dst: Reg, imm: u8) {
    emit_modrm_ext(buf, OPC_SHIFT_Ib | P_DATA16, op as u8, dst);
    buf.emit_u8(imm);
}

/// Emit shift reg, CL.
pub fn emit_shift_cl(buf: &mut CodeBuffer, op: ShiftOp, rexw: bool, dst: Reg) {
    emit_modrm_ext(buf, OPC_SHIFT_cl | rexw_flag(rexw), op as u8, dst);
}

// -- Data movement --

/// Emit MOV reg, reg (32-bit or 64-bit).
pub fn emit_mov_rr(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Reg) {
    emit_modrm(buf, OPC_MOVL_EvGv | rexw_flag(rexw), src, dst);
}

/// Emit MOV reg, imm (32-bit or 64-bit).
///
/// Zero is materialized with XOR, which clobbers the flags.
pub fn emit_mov_ri(buf: &mut CodeBuffer, rexw: bool, reg: Reg, val: u64) {
    if val == 0 {
        emit_modrm(buf, 0x31, reg, reg);
    } else {
        emit_mov_ri_keep_flags(buf, rexw, reg, val);
    }
}

/// Emit MOV reg, imm without touching the flags.
pub fn emit_mov_ri_keep_flags(buf: &mut CodeBuffer, rexw: bool, reg: Reg, val: u64) {
    if !rexw || val <= u32::MAX as u64 {
        emit_opc(buf, OPC_MOVL_Iv + (reg.low3() as u32), 0, reg as u8);
        buf.emit_u32(val as u32);
    } else if val as i64 >= i32::MIN as i64 && val as i64 <= i32::MAX as i64 {
        emit_modrm_ext(buf, OPC_MOVL_EvIz | P_REXW, 0, reg);
        buf.emit_u32(val as u32);
    } else {
        emit_opc(buf, (OPC_MOVL_Iv + (reg.low3() as u32)) | P_REXW, 0, reg as u8);
        buf.emit_u64(val);
    }
}

/// Emit zero-extend: MOVZBL or MOVZWL.
pub fn emit_movzx(buf: &mut CodeBuffer, opc: u32, dst: Reg, src: Reg) {
    emit_modrm(buf, opc, dst, src);
}

/// Emit sign-extend: MOVSBL, MOVSWL, or MOVSLQ.
pub fn emit_movsx(buf: &mut CodeBuffer, opc: u32, dst: Reg, src: Reg) {
    emit_modrm(buf, opc, dst, src);
}

/// Emit BSWAP reg (32-bit or 64-bit).
pub fn emit_bswap(buf: &mut CodeBuffer, rexw: bool, reg: Reg) {
    emit_opc(buf, (OPC_BSWAP + reg.low3() as u32) | rexw_flag(rexw), 0, reg as u8);
}

// -- Memory operations --

/// Emit MOV reg, [base+offset] (load).
pub fn emit_load(buf: &mut CodeBuffer, rexw: bool, dst: Reg, base: Reg, offset: i32) {
    emit_modrm_offset(buf, OPC_MOVL_GvEv | rexw_flag(rexw), dst, base, offset);
}

/// Emit MOV [base+offset], reg (store).
pub fn emit_store(buf: &mut CodeBuffer, rexw: bool, src: Reg, base: Reg, offset: i32) {
    emit_modrm_offset(buf, OPC_MOVL_EvGv | rexw_flag(rexw), src, base, offset);
}

/// Emit MOV word [base+offset], reg.
pub fn emit_store16(buf: &mut CodeBuffer, src: Reg, base: Reg, offset: i32) {
    emit_modrm_offset(buf, OPC_MOVW_EvGv, src, base, offset);
}

/// Emit MOV [base+offset], imm32 (store immediate).
pub fn emit_store_imm(buf: &mut CodeBuffer, rexw: bool, base: Reg, offset: i32, imm: i32) {
    emit_modrm_ext_offset(buf, OPC_MOVL_EvIz | rexw_flag(rexw), 0, base, offset);
    buf.emit_u32(imm as u32);
}

/// Emit MOV word [base+offset], imm16.
pub fn emit_store16_imm(buf: &mut CodeBuffer, base: Reg, offset: i32, imm: u16) {
    emit_modrm_ext_offset(buf, OPC_MOVL_EvIz | P_DATA16, 0, base, offset);
    buf.emit_u16(imm);
}

/// Emit zero-extend load: MOVZBL/MOVZWL [base+offset].
pub fn emit_load_zx(buf: &mut CodeBuffer, opc: u32, dst: Reg, base: Reg, offset: i32) {
    emit_modrm_offset(buf, opc, dst, base, offset);
}

/// Emit sign-extend load: MOVSBL/MOVSWL/MOVSLQ [base+offset].
pub fn emit_load_sx(buf: &mut CodeBuffer, opc: u32, dst: Reg, base: Reg, offset: i32) {
    emit_modrm_offset(buf, opc, dst, base, offset);
}

/// Emit MOV reg, [base+index*scale+offset] (indexed load).
pub fn emit_load_sib(
    buf: &mut CodeBuffer,
    rexw: bool,
    dst: Reg,
    base: Reg,
    index: Reg,
    shift: u8,
    offset: i32,
) {
    emit_modrm_sib(buf, OPC_MOVL_GvEv | rexw_flag(rexw), dst, base, index, shift, offset);
}

// -- Multiply --

/// Emit two-operand IMUL: dst = dst * src.
pub fn emit_imul_rr(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Reg) {
    emit_modrm(buf, OPC_IMUL_GvEv | rexw_flag(rexw), dst, src);
}

// -- Bit operations --

/// Emit BT dword [base+offset], imm8 (CF = selected bit).
pub fn emit_bt_mi(buf: &mut CodeBuffer, base: Reg, offset: i32, bit: u8) {
    emit_modrm_ext_offset(buf, OPC_GRPBT, GrpBtOp::Bt as u8, base, offset);
    buf.emit_u8(bit);
}

// -- Branches and comparisons --

/// Emit Jcc rel32 to an absolute buffer offset.
pub fn emit_jcc(buf: &mut CodeBuffer, cond: X86Cond, target_offset: usize) {
    let handle = emit_jcc_fwd(buf, cond);
    buf.patch(handle, target_offset);
}

/// Emit Jcc rel32 with an unresolved target.
pub fn emit_jcc_fwd(buf: &mut CodeBuffer, cond: X86Cond) -> PatchHandle {
    emit_opc(buf, OPC_JCC_long + (cond as u32), 0, 0);
    buf.reserve_rel32()
}

/// Emit JMP rel32 to an absolute buffer offset.
pub fn emit_jmp(buf: &mut CodeBuffer, target_offset: usize) {
    let handle = emit_jmp_fwd(buf);
    buf.patch(handle, target_offset);
}

/// Emit JMP rel32 with an unresolved target.
pub fn emit_jmp_fwd(buf: &mut CodeBuffer) -> PatchHandle {
    buf.emit_u8(OPC_JMP_long as u8);
    buf.reserve_rel32()
}

/// Emit indirect JMP through register.
pub fn emit_jmp_reg(buf: &mut CodeBuffer, reg: Reg) {
    emit_modrm_ext(buf, OPC_GRP5, Ext5Op::JmpN as u8, reg);
}

/// Emit indirect CALL through register.
pub fn emit_call_reg(buf: &mut CodeBuffer, reg: Reg) {
    emit_modrm_ext(buf, OPC_GRP5, Ext5Op::CallN as u8, reg);
}

/// Emit `mov rax, imm64; call rax` for a host function outside the
/// rel32 range of the buffer.
pub fn emit_call_abs(buf: &mut CodeBuffer, addr: u64) {
    emit_mov_ri(buf, true, Reg::Rax, addr);
    emit_call_reg(buf, Reg::Rax);
}

/// Emit SETcc dst (set byte on condition).
pub fn emit_setcc(buf: &mut CodeBuffer, cond: X86Cond, dst: Reg) {
    emit_modrm_ext(buf, OPC_SETCC + (cond as u32), 0, dst);
}

/// Emit CMOVcc dst, src (conditional move).
pub fn emit_cmovcc(buf: &mut CodeBuffer, cond: X86Cond, rexw: bool, dst: Reg, src: Reg) {
    emit_modrm(buf, (OPC_CMOVCC + (cond as u32)) | rexw_flag(rexw), dst, src);
}

/// Emit TEST reg, reg.
pub fn emit_test_rr(buf: &mut CodeBuffer, rexw: bool, r1: Reg, r2: Reg) {
    emit_modrm(buf, OPC_TESTL | rexw_flag(rexw), r1, r2);
}

/// Emit TEST r32, imm32.
pub fn emit_test_ri(buf: &mut CodeBuffer, reg: Reg, imm: u32) {
    emit_modrm_ext(buf, OPC_GRP3_Ev, 0, reg);
    buf.emit_u32(imm);
}

// -- SSE2 --

/// Emit a packed-integer op `dst = dst <op> src`.
pub fn emit_sse_rr(buf: &mut CodeBuffer, opc: u32, dst: Xmm, src: Xmm) {
    emit_modrm_raw(buf, opc, dst as u8, src as u8);
}

/// Emit MOVDQU xmm, [base+offset].
pub fn emit_movdqu_load(buf: &mut CodeBuffer, dst: Xmm, base: Reg, offset: i32) {
    emit_opc(buf, OPC_MOVDQU_VxWx, dst as u8, base as u8);
    emit_mem_operand(buf, dst as u8 & 7, base, offset);
}

/// Emit MOVDQU [base+offset], xmm.
pub fn emit_movdqu_store(buf: &mut CodeBuffer, src: Xmm, base: Reg, offset: i32) {
    emit_opc(buf, OPC_MOVDQU_WxVx, src as u8, base as u8);
    emit_mem_operand(buf, src as u8 & 7, base, offset);
}

/// Emit MOVDQU xmm, [base+index+offset].
pub fn emit_movdqu_load_sib(buf: &mut CodeBuffer, dst: Xmm, base: Reg, index: Reg, offset: i32) {
    emit_modrm_sib_raw(buf, OPC_MOVDQU_VxWx, dst as u8, base, index, 0, offset);
}

/// Emit MOVDQU [base+index+offset], xmm.
pub fn emit_movdqu_store_sib(buf: &mut CodeBuffer, src: Xmm, base: Reg, index: Reg, offset: i32) {
    emit_modrm_sib_raw(buf, OPC_MOVDQU_WxVx, src as u8, base, index, 0, offset);
}

/// Emit MOVDQA xmm, xmm.
pub fn emit_movdqa_rr(buf: &mut CodeBuffer, dst: Xmm, src: Xmm) {
    emit_sse_rr(buf, OPC_MOVDQA_VxWx, dst, src);
}

/// Emit MOVD xmm, r32.
pub fn emit_movd_to_xmm(buf: &mut CodeBuffer, dst: Xmm, src: Reg) {
    emit_modrm_raw(buf, OPC_MOVD_VyEy, dst as u8, src as u8);
}

/// Emit a packed shift by immediate. `opc` is OPC_SHIFTW_Ib or
/// OPC_SHIFTD_Ib.
pub fn emit_sse_shift_ri(buf: &mut CodeBuffer, opc: u32, op: PackedShiftOp, reg: Xmm, imm: u8) {
    emit_modrm_raw(buf, opc, op as u8, reg as u8);
    buf.emit_u8(imm);
}

/// Emit PSHUFD/PSHUFLW/PSHUFHW dst, src, imm8.
pub fn emit_pshuf(buf: &mut CodeBuffer, opc: u32, dst: Xmm, src: Xmm, imm: u8) {
    emit_modrm_raw(buf, opc, dst as u8, src as u8);
    buf.emit_u8(imm);
}

// -- Miscellaneous --

/// Emit PUSH reg.
pub fn emit_push(buf: &mut CodeBuffer, reg: Reg) {
    emit_opc(buf, OPC_PUSH_r32 + (reg.low3() as u32), 0, reg as u8);
}

/// Emit POP reg.
pub fn emit_pop(buf: &mut CodeBuffer, reg: Reg) {
    emit_opc(buf, OPC_POP_r32 + (reg.low3() as u32), 0, reg as u8);
}

/// Emit RET.
pub fn emit_ret(buf: &mut CodeBuffer) {
    buf.emit_u8(OPC_RET as u8);
}

/// Emit `n` bytes of NOP padding using recommended multi-byte NOPs.
pub fn emit_nops(buf: &mut CodeBuffer, mut n: usize) {
    const NOPS: [&[u8]; 8] = [
        &[0x90],
        &[0x66, 0x90],
        &[0x0F, 0x1F, 0x00],
        &[0x0F, 0x1F, 0x40, 0x00],
        &[0x0F, 0x1F, 0x44, 0x00, 0x00],
        &[0x66, 0x0F, 0x1F, 0x44, 0x00, 0x00],
        &[0x0F, 0x1F, 0x80, 0x00, 0x00, 0x00, 0x00],
        &[0x0F, 0x1F, 0x84, 0x00, 0x00, 0x00, 0x00, 0x00],
    ];
    while n > 0 {
        let len = n.min(8);
        buf.emit_bytes(NOPS[len - 1]);
        n -= len;
    }
}

/// Pad the active region with NOPs up to an `align`-byte boundary.
pub fn emit_align(buf: &mut CodeBuffer, align: usize) {
    let pad = buf.offset().next_multiple_of(align) - buf.offset();
    emit_nops(buf, pad);
}

// ==========================================================
// X86_64CodeGen: fixed entry and exit glue
// ==========================================================

/// x86-64 entry/exit code generator.
///
/// Generated code is entered through the prologue as
/// `extern "C" fn(state: *mut RspState, entry: *const u8)` and leaves
/// by jumping to the epilogue.
#[derive(Debug, Default)]
pub struct X86_64CodeGen {
    pub prologue_offset: usize,
    pub epilogue_offset: usize,
    pub code_gen_start: usize,
}

impl X86_64CodeGen {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostCodeGen for X86_64CodeGen {
    fn emit_prologue(&mut self, buf: &mut CodeBuffer) {
        self.prologue_offset = buf.offset();

        for &reg in CALLEE_SAVED {
            emit_push(buf, reg);
        }

        // mov rbp, rdi (state pointer)
        emit_mov_rr(buf, true, STATE_REG, CALL_ARG_REGS[0]);

        emit_arith_ri(buf, ArithOp::Sub, true, Reg::Rsp, STACK_ADDEND as i32);

        // jmp *rsi (block entry)
        emit_jmp_reg(buf, CALL_ARG_REGS[1]);

        self.code_gen_start = buf.offset();
    }

    fn emit_epilogue(&mut self, buf: &mut CodeBuffer) {
        self.epilogue_offset = buf.offset();

        emit_arith_ri(buf, ArithOp::Add, true, Reg::Rsp, STACK_ADDEND as i32);

        for &reg in CALLEE_SAVED.iter().rev() {
            emit_pop(buf, reg);
        }

        emit_ret(buf);
        self.code_gen_start = buf.offset();
    }

    fn prologue_offset(&self) -> usize {
        self.prologue_offset
    }

    fn epilogue_offset(&self) -> usize {
        self.epilogue_offset
    }

    fn emit_exit(&self, buf: &mut CodeBuffer) {
        emit_jmp(buf, self.epilogue_offset);
    }
}

use rsp_core::{Insn, Opcode, RspState};

use crate::vector::{get_byte, set_byte};

/// Access size used to scale the 7-bit offset.
fn scale(op: Opcode) -> u32 {
    match op {
        Opcode::Lbv | Opcode::Sbv => 1,
        Opcode::Lsv | Opcode::Ssv => 2,
        Opcode::Llv | Opcode::Slv => 4,
        Opcode::Ldv | Opcode::Sdv => 8,
        Opcode::Lpv | Opcode::Luv | Opcode::Spv | Opcode::Suv => 8,
        _ => 16,
    }
}

/// Effective DMEM address of a vector load/store.
pub fn address(state: &RspState, op: Opcode, insn: Insn) -> u32 {
    let base = state.regs.gpr[insn.base()];
    base.wrapping_add((insn.voffset() * scale(op) as i32) as u32)
}

pub(crate) fn load(state: &mut RspState, op: Opcode, insn: Insn) {
    let addr = address(state, op, insn);
    let vt = insn.vt();
    let e = insn.del() as usize;

    match op {
        Opcode::Lbv | Opcode::Lsv | Opcode::Llv | Opcode::Ldv => {
            for i in 0..scale(op) as usize {
                if e + i < 16 {
                    let b = state.read_u8(addr.wrapping_add(i as u32));
                    set_byte(&mut state.regs.vpr[vt], e + i, b);
                }
            }
        }
        Opcode::Lqv => {
            let end = (16 + e).saturating_sub((addr & 15) as usize).min(16);
            for (n, offset) in (e..end).enumerate() {
                let b = state.read_u8(addr.wrapping_add(n as u32));
                set_byte(&mut state.regs.vpr[vt], offset, b);
            }
        }
        Opcode::Lrv => {
            let start = 16 + e - (addr & 15) as usize;
            let base = addr & !15;
            for (n, offset) in (start..16).enumerate() {
                let b = state.read_u8(base.wrapping_add(n as u32));
                set_byte(&mut state.regs.vpr[vt], offset & 15, b);
            }
        }
        Opcode::Lpv | Opcode::Luv | Opcode::Lhv => {
            let base = addr & !7;
            let index = (addr & 7).wrapping_sub(e as u32);
            let (stride, shift) = match op {
                Opcode::Lpv => (1, 8),
                Opcode::Luv => (1, 7),
                _ => (2, 7),
            };
            for n in 0..8u32 {
                let a = base.wrapping_add(index.wrapping_add(n * stride) & 15);
                state.regs.vpr[vt][n as usize] = (state.read_u8(a) as u16) << shift;
            }
        }
        Opcode::Lfv => {
            let base = addr & !7;
            let index = (addr & 7).wrapping_sub(e as u32);
            let mut tmp = [0u16; 8];
            for n in 0..4u32 {
                let a = base.wrapping_add(index.wrapping_add(n * 4) & 15);
                let b = base.wrapping_add(index.wrapping_add(n * 4 + 8) & 15);
                tmp[n as usize] = (state.read_u8(a) as u16) << 7;
                tmp[n as usize + 4] = (state.read_u8(b) as u16) << 7;
            }
            for offset in e..(e + 8).min(16) {
                let b = get_byte(&tmp, offset);
                set_byte(&mut state.regs.vpr[vt], offset, b);
            }
        }
        Opcode::Ltv => {
            let begin = addr & !7;
            let mut a = begin.wrapping_add((e as u32 + (addr & 8)) & 15);
            let vtbase = vt & !7;
            let mut vtoff = e >> 1;
            for i in 0..8 {
                let reg = vtbase + vtoff;
                for half in 0..2 {
                    let b = state.read_u8(a);
                    set_byte(&mut state.regs.vpr[reg], i * 2 + half, b);
                    a = a.wrapping_add(1);
                    if a == begin.wrapping_add(16) {
                        a = begin;
                    }
                }
                vtoff = (vtoff + 1) & 7;
            }
        }
        _ => {}
    }
}

pub(crate) fn store(state: &mut RspState, op: Opcode, insn: Insn) {
    let addr = address(state, op, insn);
    let vt = insn.vt();
    let e = insn.del() as usize;
    let reg = state.regs.vpr[vt];

    match op {
        Opcode::Sbv | Opcode::Ssv | Opcode::Slv | Opcode::Sdv => {
            for i in 0..scale(op) as usize {
                state.write_u8(addr.wrapping_add(i as u32), get_byte(&reg, (e + i) & 15));
            }
        }
        Opcode::Sqv => {
            let len = 16 - (addr & 15) as usize;
            for n in 0..len {
                state.write_u8(addr.wrapping_add(n as u32), get_byte(&reg, (e + n) & 15));
            }
        }
        Opcode::Srv => {
            let len = (addr & 15) as usize;
            let base = 16 - len;
            let aligned = addr & !15;
            for n in 0..len {
                let b = get_byte(&reg, (e + n + base) & 15);
                state.write_u8(aligned.wrapping_add(n as u32), b);
            }
        }
        Opcode::Spv | Opcode::Suv => {
            for (n, offset) in (e..e + 8).enumerate() {
                let packed = (offset & 15) < 8;
                let byte_form = if op == Opcode::Spv { packed } else { !packed };
                let b = if byte_form {
                    get_byte(&reg, (offset & 7) << 1)
                } else {
                    (reg[offset & 7] >> 7) as u8
                };
                state.write_u8(addr.wrapping_add(n as u32), b);
            }
        }
        Opcode::Shv => {
            let base = addr & 7;
            let aligned = addr & !7;
            for offset in (0..16).step_by(2) {
                let hi = get_byte(&reg, (e + offset) & 15);
                let lo = get_byte(&reg, (e + offset + 1) & 15);
                let b = (hi << 1) | (lo >> 7);
                state.write_u8(aligned.wrapping_add((base + offset as u32) & 15), b);
            }
        }
        Opcode::Sfv => {
            let mut base = addr & 15;
            let aligned = addr & !15;
            let start = e >> 1;
            for offset in start..start + 4 {
                let b = (reg[offset & 7] >> 7) as u8;
                state.write_u8(aligned.wrapping_add(base & 15), b);
                base += 4;
            }
        }
        Opcode::Swv => {
            let mut base = addr & 7;
            let aligned = addr & !7;
            for offset in e..e + 16 {
                state.write_u8(aligned.wrapping_add(base & 15), get_byte(&reg, offset & 15));
                base += 1;
            }
        }
        Opcode::Stv => {
            let start = vt & !7;
            let mut element = 16 - (e & !1);
            let mut base = (addr & 7).wrapping_sub((e & !1) as u32);
            let aligned = addr & !7;
            for r in start..start + 8 {
                for _ in 0..2 {
                    let b = get_byte(&state.regs.vpr[r], element & 15);
                    state.write_u8(aligned.wrapping_add(base & 15), b);
                    base = base.wrapping_add(1);
                    element += 1;
                }
            }
        }
        _ => {}
    }
}

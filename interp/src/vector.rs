use rsp_core::insn::select_lane;
use rsp_core::state::NUM_LANES;
use rsp_core::{Insn, Opcode, RegisterFile};

use crate::divide;

type Lanes = [u16; NUM_LANES];

/// Second operand after element selection.
fn vte(regs: &RegisterFile, vt: usize, e: u32) -> Lanes {
    let src = regs.vpr[vt];
    std::array::from_fn(|i| src[select_lane(e, i)])
}

/// Signed clamp of the accumulator middle slice.
#[inline]
pub(crate) fn clamp_signed(acc: i64) -> u16 {
    (acc >> 16).clamp(-32768, 32767) as i16 as u16
}

/// Clamp of the low slice: the low 16 bits when the upper bits are
/// a sign extension, otherwise saturate.
#[inline]
pub(crate) fn clamp_low(acc: i64) -> u16 {
    let hi = acc >> 16;
    if hi < -32768 {
        0
    } else if hi > 32767 {
        0xFFFF
    } else {
        acc as u16
    }
}

/// Unsigned clamp of the middle slice (VMULU/VMACU).
#[inline]
pub(crate) fn clamp_unsigned(acc: i64) -> u16 {
    let hi = acc >> 16;
    if hi < 0 {
        0
    } else if hi > 0x7FFF {
        0xFFFF
    } else {
        hi as u16
    }
}

#[inline]
fn bit(word: u32, n: usize) -> bool {
    (word >> n) & 1 != 0
}

#[inline]
fn set_bit(word: &mut u32, n: usize, value: bool) {
    if value {
        *word |= 1 << n;
    } else {
        *word &= !(1 << n);
    }
}

/// MFC2/MTC2/CFC2/CTC2.
pub(crate) fn cop2_move(regs: &mut RegisterFile, op: Opcode, insn: Insn) {
    let rt = insn.rt();
    let vs = insn.vs();
    let e = insn.del() as usize;
    match op {
        Opcode::Mfc2 => {
            let hi = get_byte(&regs.vpr[vs], e);
            let lo = get_byte(&regs.vpr[vs], (e + 1) & 15);
            let value = u16::from_be_bytes([hi, lo]) as i16 as i32 as u32;
            crate::scalar::set_gpr(regs, rt, value);
        }
        Opcode::Mtc2 => {
            let value = regs.gpr[rt];
            set_byte(&mut regs.vpr[vs], e, (value >> 8) as u8);
            if e != 15 {
                set_byte(&mut regs.vpr[vs], e + 1, value as u8);
            }
        }
        Opcode::Cfc2 => {
            let flags = match insn.rd() & 3 {
                0 => regs.vco,
                1 => regs.vcc,
                _ => regs.vce & 0xFF,
            };
            crate::scalar::set_gpr(regs, rt, flags as u16 as i16 as i32 as u32);
        }
        Opcode::Ctc2 => {
            let value = regs.gpr[rt];
            match insn.rd() & 3 {
                0 => regs.vco = value & 0xFFFF,
                1 => regs.vcc = value & 0xFFFF,
                _ => regs.vce = value & 0xFF,
            }
        }
        _ => {}
    }
}

/// Byte `i` of a vector register in big-endian register order.
#[inline]
pub(crate) fn get_byte(reg: &Lanes, i: usize) -> u8 {
    let lane = reg[(i >> 1) & 7];
    if i & 1 == 0 {
        (lane >> 8) as u8
    } else {
        lane as u8
    }
}

#[inline]
pub(crate) fn set_byte(reg: &mut Lanes, i: usize, value: u8) {
    let lane = &mut reg[(i >> 1) & 7];
    if i & 1 == 0 {
        *lane = (*lane & 0x00FF) | ((value as u16) << 8);
    } else {
        *lane = (*lane & 0xFF00) | value as u16;
    }
}

/// Execute a vector compute op.
pub(crate) fn execute(regs: &mut RegisterFile, op: Opcode, insn: Insn) {
    let vs = regs.vpr[insn.vs()];
    let vt = vte(regs, insn.vt(), insn.element());
    let mut vd = regs.vpr[insn.vd()];

    match op {
        Opcode::Vmulf
        | Opcode::Vmulu
        | Opcode::Vmudl
        | Opcode::Vmudm
        | Opcode::Vmudn
        | Opcode::Vmudh
        | Opcode::Vmacf
        | Opcode::Vmacu
        | Opcode::Vmadl
        | Opcode::Vmadm
        | Opcode::Vmadn
        | Opcode::Vmadh => multiply(regs, op, &vs, &vt, &mut vd),
        Opcode::Vadd | Opcode::Vsub => {
            for i in 0..NUM_LANES {
                let carry = bit(regs.vco, i) as i32;
                let (s, t) = (vs[i] as i16 as i32, vt[i] as i16 as i32);
                let r = if op == Opcode::Vadd { s + t + carry } else { s - t - carry };
                regs.set_acc_low(i, r as u16);
                vd[i] = r.clamp(-32768, 32767) as i16 as u16;
            }
            regs.vco = 0;
        }
        Opcode::Vabs => {
            for i in 0..NUM_LANES {
                let (s, t) = (vs[i] as i16 as i32, vt[i] as i16 as i32);
                let r = match s {
                    0 => 0,
                    s if s < 0 => -t,
                    _ => t,
                };
                regs.set_acc_low(i, r as u16);
                vd[i] = r.clamp(-32768, 32767) as i16 as u16;
            }
        }
        Opcode::Vaddc => {
            let mut vco = 0;
            for i in 0..NUM_LANES {
                let r = vs[i] as u32 + vt[i] as u32;
                regs.set_acc_low(i, r as u16);
                vd[i] = r as u16;
                set_bit(&mut vco, i, r > 0xFFFF);
            }
            regs.vco = vco;
        }
        Opcode::Vsubc => {
            let mut vco = 0;
            for i in 0..NUM_LANES {
                let r = vs[i] as i32 - vt[i] as i32;
                regs.set_acc_low(i, r as u16);
                vd[i] = r as u16;
                set_bit(&mut vco, i, r < 0);
                set_bit(&mut vco, i + 8, r != 0);
            }
            regs.vco = vco;
        }
        Opcode::Vsar => {
            for i in 0..NUM_LANES {
                let acc = regs.acc[i];
                vd[i] = match insn.element() {
                    8 => (acc >> 32) as u16,
                    9 => (acc >> 16) as u16,
                    10 => acc as u16,
                    _ => 0,
                };
            }
        }
        Opcode::Vlt | Opcode::Veq | Opcode::Vne | Opcode::Vge => {
            compare(regs, op, &vs, &vt, &mut vd)
        }
        Opcode::Vcl => clip_low(regs, &vs, &vt, &mut vd),
        Opcode::Vch => clip_high(regs, &vs, &vt, &mut vd),
        Opcode::Vcr => clip_reduce(regs, &vs, &vt, &mut vd),
        Opcode::Vmrg => {
            for i in 0..NUM_LANES {
                let r = if bit(regs.vcc, i) { vs[i] } else { vt[i] };
                regs.set_acc_low(i, r);
                vd[i] = r;
            }
        }
        Opcode::Vand
        | Opcode::Vnand
        | Opcode::Vor
        | Opcode::Vnor
        | Opcode::Vxor
        | Opcode::Vnxor => {
            for i in 0..NUM_LANES {
                let (s, t) = (vs[i], vt[i]);
                let r = match op {
                    Opcode::Vand => s & t,
                    Opcode::Vnand => !(s & t),
                    Opcode::Vor => s | t,
                    Opcode::Vnor => !(s | t),
                    Opcode::Vxor => s ^ t,
                    _ => !(s ^ t),
                };
                regs.set_acc_low(i, r);
                vd[i] = r;
            }
        }
        Opcode::Vmov => {
            for i in 0..NUM_LANES {
                regs.set_acc_low(i, vt[i]);
            }
            vd[insn.de()] = vt[insn.de()];
        }
        Opcode::Vrcp | Opcode::Vrcpl | Opcode::Vrsq | Opcode::Vrsql => {
            let src = regs.vpr[insn.vt()][(insn.element() & 7) as usize];
            let long = matches!(op, Opcode::Vrcpl | Opcode::Vrsql);
            let sqrt = matches!(op, Opcode::Vrsq | Opcode::Vrsql);
            let result = divide::evaluate(regs, src, long, sqrt);
            for i in 0..NUM_LANES {
                regs.set_acc_low(i, vt[i]);
            }
            vd[insn.de()] = result as u16;
        }
        Opcode::Vrcph | Opcode::Vrsqh => {
            for i in 0..NUM_LANES {
                regs.set_acc_low(i, vt[i]);
            }
            regs.div_dp = 1;
            regs.div_in = regs.vpr[insn.vt()][(insn.element() & 7) as usize] as u32;
            vd[insn.de()] = regs.div_out as u16;
        }
        // Rounding and MPEG quantization ops are not used by the
        // audio microcodes this core runs; they leave state untouched.
        Opcode::Vrndp | Opcode::Vrndn | Opcode::Vmulq | Opcode::Vmacq | Opcode::Vnop => return,
        _ => {
            tracing::trace!(word = insn.raw(), "unknown vector op executed as nop");
            return;
        }
    }
    regs.vpr[insn.vd()] = vd;
}

/// Multiply and multiply-accumulate family.
fn multiply(regs: &mut RegisterFile, op: Opcode, vs: &Lanes, vt: &Lanes, vd: &mut Lanes) {
    for i in 0..NUM_LANES {
        let (su, tu) = (vs[i] as i64, vt[i] as i64);
        let (ss, ts) = (vs[i] as i16 as i64, vt[i] as i16 as i64);
        let old = regs.acc[i];
        let acc = match op {
            Opcode::Vmulf | Opcode::Vmulu => ss * ts * 2 + 0x8000,
            Opcode::Vmudl => (su * tu) >> 16,
            Opcode::Vmudm => ss * tu,
            Opcode::Vmudn => su * ts,
            Opcode::Vmudh => (ss * ts) << 16,
            Opcode::Vmacf | Opcode::Vmacu => old + ss * ts * 2,
            Opcode::Vmadl => old + ((su * tu) >> 16),
            Opcode::Vmadm => old + ss * tu,
            Opcode::Vmadn => old + su * ts,
            _ => old + ((ss * ts) << 16),
        };
        regs.set_acc(i, acc);
        let acc = regs.acc[i];
        vd[i] = match op {
            Opcode::Vmulu | Opcode::Vmacu => clamp_unsigned(acc),
            Opcode::Vmudl | Opcode::Vmadl | Opcode::Vmudn | Opcode::Vmadn => clamp_low(acc),
            _ => clamp_signed(acc),
        };
    }
}

fn compare(regs: &mut RegisterFile, op: Opcode, vs: &Lanes, vt: &Lanes, vd: &mut Lanes) {
    let mut vcc = 0;
    for i in 0..NUM_LANES {
        let (s, t) = (vs[i] as i16, vt[i] as i16);
        let carry = bit(regs.vco, i);
        let ne = bit(regs.vco, i + 8);
        let eq = s == t;
        let flag = match op {
            Opcode::Vlt => s < t || (eq && carry && ne),
            Opcode::Veq => eq && !ne,
            Opcode::Vne => !eq || ne,
            _ => s > t || (eq && !(carry && ne)),
        };
        let r = if flag { vs[i] } else { vt[i] };
        regs.set_acc_low(i, r);
        vd[i] = r;
        set_bit(&mut vcc, i, flag);
    }
    regs.vcc = vcc;
    regs.vco = 0;
}

fn clip_low(regs: &mut RegisterFile, vs: &Lanes, vt: &Lanes, vd: &mut Lanes) {
    let mut vcc = regs.vcc;
    for i in 0..NUM_LANES {
        let (s, t) = (vs[i], vt[i]);
        let carry = bit(regs.vco, i);
        let ne = bit(regs.vco, i + 8);
        let r = if carry {
            let le = if ne {
                bit(vcc, i)
            } else {
                let sum = s as u32 + t as u32;
                let zero = sum as u16 == 0;
                let overflow = sum > 0xFFFF;
                let le = if bit(regs.vce, i) { zero || !overflow } else { zero && !overflow };
                set_bit(&mut vcc, i, le);
                le
            };
            if le {
                t.wrapping_neg()
            } else {
                s
            }
        } else {
            let ge = if ne {
                bit(vcc, i + 8)
            } else {
                let ge = s >= t;
                set_bit(&mut vcc, i + 8, ge);
                ge
            };
            if ge {
                t
            } else {
                s
            }
        };
        regs.set_acc_low(i, r);
        vd[i] = r;
    }
    regs.vcc = vcc;
    regs.vco = 0;
    regs.vce = 0;
}

fn clip_high(regs: &mut RegisterFile, vs: &Lanes, vt: &Lanes, vd: &mut Lanes) {
    let (mut vcc, mut vco, mut vce) = (0, 0, 0);
    for i in 0..NUM_LANES {
        let (s, t) = (vs[i] as i16 as i32, vt[i] as i16 as i32);
        let ne_pattern = vs[i] != (vt[i] ^ 0xFFFF);
        let r = if (s ^ t) < 0 {
            let sum = s + t;
            set_bit(&mut vcc, i, sum <= 0);
            set_bit(&mut vcc, i + 8, t < 0);
            set_bit(&mut vco, i, true);
            set_bit(&mut vco, i + 8, sum != 0 && ne_pattern);
            set_bit(&mut vce, i, sum == -1);
            if sum <= 0 {
                vt[i].wrapping_neg()
            } else {
                vs[i]
            }
        } else {
            let diff = s - t;
            set_bit(&mut vcc, i, t < 0);
            set_bit(&mut vcc, i + 8, diff >= 0);
            set_bit(&mut vco, i + 8, diff != 0 && ne_pattern);
            if diff >= 0 {
                vt[i]
            } else {
                vs[i]
            }
        };
        regs.set_acc_low(i, r);
        vd[i] = r;
    }
    regs.vcc = vcc;
    regs.vco = vco;
    regs.vce = vce;
}

fn clip_reduce(regs: &mut RegisterFile, vs: &Lanes, vt: &Lanes, vd: &mut Lanes) {
    let mut vcc = 0;
    for i in 0..NUM_LANES {
        let (s, t) = (vs[i] as i16 as i32, vt[i] as i16 as i32);
        let r = if (s ^ t) < 0 {
            let le = s + t + 1 <= 0;
            set_bit(&mut vcc, i, le);
            set_bit(&mut vcc, i + 8, t < 0);
            if le {
                !vt[i]
            } else {
                vs[i]
            }
        } else {
            let ge = s - t >= 0;
            set_bit(&mut vcc, i, t < 0);
            set_bit(&mut vcc, i + 8, ge);
            if ge {
                vt[i]
            } else {
                vs[i]
            }
        };
        regs.set_acc_low(i, r);
        vd[i] = r;
    }
    regs.vcc = vcc;
    regs.vco = 0;
    regs.vce = 0;
}

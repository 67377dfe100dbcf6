use rsp_core::state::{
    COP0_SEMAPHORE, COP0_SP_STATUS, SP_CLR_BROKE, SP_CLR_HALT, SP_SET_HALT, SP_STATUS_BROKE,
    SP_STATUS_HALT,
};
use rsp_core::{Insn, Opcode, RegisterFile, RspState};

/// Write a scalar register; register 0 stays zero.
#[inline]
pub(crate) fn set_gpr(regs: &mut RegisterFile, r: usize, value: u32) {
    if r != 0 {
        regs.gpr[r] = value;
    }
}

/// Execute a scalar ALU or memory op. Returns false if `op` is not
/// a scalar instruction.
pub(crate) fn execute(state: &mut RspState, op: Opcode, insn: Insn) -> bool {
    let rs = state.regs.gpr[insn.rs()];
    let rt = state.regs.gpr[insn.rt()];
    let simm = insn.simm() as u32;
    let imm = insn.imm() as u32;
    let sa = insn.sa();
    let addr = rs.wrapping_add(simm);

    let (dst, value) = match op {
        Opcode::Addi | Opcode::Addiu => (insn.rt(), rs.wrapping_add(simm)),
        Opcode::Slti => (insn.rt(), ((rs as i32) < (simm as i32)) as u32),
        Opcode::Sltiu => (insn.rt(), (rs < simm) as u32),
        Opcode::Andi => (insn.rt(), rs & imm),
        Opcode::Ori => (insn.rt(), rs | imm),
        Opcode::Xori => (insn.rt(), rs ^ imm),
        Opcode::Lui => (insn.rt(), imm << 16),

        Opcode::Sll => (insn.rd(), rt << sa),
        Opcode::Srl => (insn.rd(), rt >> sa),
        Opcode::Sra => (insn.rd(), ((rt as i32) >> sa) as u32),
        Opcode::Sllv => (insn.rd(), rt << (rs & 31)),
        Opcode::Srlv => (insn.rd(), rt >> (rs & 31)),
        Opcode::Srav => (insn.rd(), ((rt as i32) >> (rs & 31)) as u32),
        Opcode::Add | Opcode::Addu => (insn.rd(), rs.wrapping_add(rt)),
        Opcode::Sub | Opcode::Subu => (insn.rd(), rs.wrapping_sub(rt)),
        Opcode::And => (insn.rd(), rs & rt),
        Opcode::Or => (insn.rd(), rs | rt),
        Opcode::Xor => (insn.rd(), rs ^ rt),
        Opcode::Nor => (insn.rd(), !(rs | rt)),
        Opcode::Slt => (insn.rd(), ((rs as i32) < (rt as i32)) as u32),
        Opcode::Sltu => (insn.rd(), (rs < rt) as u32),

        Opcode::Lb => (insn.rt(), state.read_u8(addr) as i8 as i32 as u32),
        Opcode::Lbu => (insn.rt(), state.read_u8(addr) as u32),
        Opcode::Lh => (insn.rt(), state.read_u16(addr) as i16 as i32 as u32),
        Opcode::Lhu => (insn.rt(), state.read_u16(addr) as u32),
        Opcode::Lw => (insn.rt(), state.read_u32(addr)),

        Opcode::Sb => {
            state.write_u8(addr, rt as u8);
            return true;
        }
        Opcode::Sh => {
            state.write_u16(addr, rt as u16);
            return true;
        }
        Opcode::Sw => {
            state.write_u32(addr, rt);
            return true;
        }
        Opcode::Unknown => {
            tracing::trace!(word = insn.raw(), "unknown instruction executed as nop");
            return true;
        }
        _ => return false,
    };
    set_gpr(&mut state.regs, dst, value);
    true
}

/// MFC0/MTC0 against the SP control registers.
pub(crate) fn cop0(state: &mut RspState, op: Opcode, insn: Insn) {
    let reg = insn.rd() & 15;
    match op {
        Opcode::Mfc0 => {
            let value = state.cop0[reg];
            if reg == COP0_SEMAPHORE {
                state.cop0[reg] = 1;
            }
            set_gpr(&mut state.regs, insn.rt(), value);
        }
        Opcode::Mtc0 => {
            let value = state.regs.gpr[insn.rt()];
            match reg {
                COP0_SP_STATUS => write_sp_status(state, value),
                COP0_SEMAPHORE => state.cop0[reg] = 0,
                _ => state.cop0[reg] = value,
            }
        }
        _ => {}
    }
}

fn write_sp_status(state: &mut RspState, value: u32) {
    let status = &mut state.cop0[COP0_SP_STATUS];
    if value & SP_CLR_HALT != 0 {
        *status &= !SP_STATUS_HALT;
    }
    if value & SP_SET_HALT != 0 {
        *status |= SP_STATUS_HALT;
        state.halted = 1;
    }
    if value & SP_CLR_BROKE != 0 {
        *status &= !SP_STATUS_BROKE;
    }
}

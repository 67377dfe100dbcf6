//! Instruction word to codegen routine.
//!
//! One static table per instruction class, indexed by the class key
//! from `classify`. Every slot starts out as the interpreter trap, so
//! encodings without a native routine still execute correctly.

use rsp_core::opcode::{cop, op, regimm, special, vector as vu, vmem};
use rsp_core::{classify, Insn, OpClass};

use crate::codegen::{
    branch, cop as cop2, memory, nop, scalar, trap, vector, vector_mem, DisasContext,
};

/// Emits the native code for one instruction.
pub type Routine = fn(&mut DisasContext<'_>, Insn);

static MAIN: [Routine; 64] = {
    let mut t = [trap as Routine; 64];
    t[op::J as usize] = branch::jump;
    t[op::JAL as usize] = branch::jump;
    t[op::BEQ as usize] = branch::conditional;
    t[op::BNE as usize] = branch::conditional;
    t[op::BLEZ as usize] = branch::conditional;
    t[op::BGTZ as usize] = branch::conditional;
    t[op::ADDI as usize] = scalar::alu_imm;
    t[op::ADDIU as usize] = scalar::alu_imm;
    t[op::SLTI as usize] = scalar::alu_imm;
    t[op::SLTIU as usize] = scalar::alu_imm;
    t[op::ANDI as usize] = scalar::alu_imm;
    t[op::ORI as usize] = scalar::alu_imm;
    t[op::XORI as usize] = scalar::alu_imm;
    t[op::LUI as usize] = scalar::lui;
    t[op::LB as usize] = memory::load;
    t[op::LH as usize] = memory::load;
    t[op::LW as usize] = memory::load;
    t[op::LBU as usize] = memory::load;
    t[op::LHU as usize] = memory::load;
    t[op::SB as usize] = memory::store;
    t[op::SH as usize] = memory::store;
    t[op::SW as usize] = memory::store;
    t
};

static SPECIAL: [Routine; 64] = {
    let mut t = [trap as Routine; 64];
    t[special::SLL as usize] = scalar::shift_imm;
    t[special::SRL as usize] = scalar::shift_imm;
    t[special::SRA as usize] = scalar::shift_imm;
    t[special::SLLV as usize] = scalar::shift_var;
    t[special::SRLV as usize] = scalar::shift_var;
    t[special::SRAV as usize] = scalar::shift_var;
    t[special::JR as usize] = branch::jump_register;
    t[special::JALR as usize] = branch::jump_register;
    t[special::BREAK as usize] = branch::brk;
    t[special::ADD as usize] = scalar::alu_reg;
    t[special::ADDU as usize] = scalar::alu_reg;
    t[special::SUB as usize] = scalar::alu_reg;
    t[special::SUBU as usize] = scalar::alu_reg;
    t[special::AND as usize] = scalar::alu_reg;
    t[special::OR as usize] = scalar::alu_reg;
    t[special::XOR as usize] = scalar::alu_reg;
    t[special::NOR as usize] = scalar::alu_reg;
    t[special::SLT as usize] = scalar::alu_reg;
    t[special::SLTU as usize] = scalar::alu_reg;
    t
};

static REGIMM: [Routine; 32] = {
    let mut t = [trap as Routine; 32];
    t[regimm::BLTZ as usize] = branch::conditional;
    t[regimm::BGEZ as usize] = branch::conditional;
    t[regimm::BLTZAL as usize] = branch::conditional;
    t[regimm::BGEZAL as usize] = branch::conditional;
    t
};

/// COP0 accesses have side effects on the host; always interpreted.
static COP0: [Routine; 32] = [trap as Routine; 32];

static COP2: [Routine; 32] = {
    let mut t = [trap as Routine; 32];
    t[cop::MF as usize] = cop2::mfc2;
    t[cop::CF as usize] = cop2::cfc2;
    t[cop::MT as usize] = cop2::mtc2;
    t[cop::CT as usize] = cop2::ctc2;
    t
};

static VECTOR: [Routine; 64] = {
    let mut t = [vector::unaccelerated as Routine; 64];
    t[vu::VMULF as usize] = vector::multiply;
    t[vu::VMULU as usize] = vector::multiply;
    t[vu::VMUDL as usize] = vector::multiply;
    t[vu::VMUDM as usize] = vector::multiply;
    t[vu::VMUDN as usize] = vector::multiply;
    t[vu::VMUDH as usize] = vector::multiply;
    t[vu::VMACF as usize] = vector::multiply;
    t[vu::VMACU as usize] = vector::multiply;
    t[vu::VMADL as usize] = vector::multiply;
    t[vu::VMADM as usize] = vector::multiply;
    t[vu::VMADN as usize] = vector::multiply;
    t[vu::VMADH as usize] = vector::multiply;
    t[vu::VRNDP as usize] = nop;
    t[vu::VRNDN as usize] = nop;
    t[vu::VMULQ as usize] = nop;
    t[vu::VMACQ as usize] = nop;
    t[vu::VNOP as usize] = nop;
    t[vu::VADD as usize] = vector::add_sub;
    t[vu::VSUB as usize] = vector::add_sub;
    t[vu::VSAR as usize] = vector::read_accumulator;
    t[vu::VMRG as usize] = vector::merge;
    t[vu::VAND as usize] = vector::logical;
    t[vu::VNAND as usize] = vector::logical;
    t[vu::VOR as usize] = vector::logical;
    t[vu::VNOR as usize] = vector::logical;
    t[vu::VXOR as usize] = vector::logical;
    t[vu::VNXOR as usize] = vector::logical;
    t[vu::VMOV as usize] = vector::mov;
    t
};

static LC2: [Routine; 32] = {
    let mut t = [trap as Routine; 32];
    t[vmem::SV as usize] = vector_mem::load;
    t[vmem::LV as usize] = vector_mem::load;
    t[vmem::DV as usize] = vector_mem::load;
    t[vmem::QV as usize] = vector_mem::load;
    t
};

static SC2: [Routine; 32] = {
    let mut t = [trap as Routine; 32];
    t[vmem::SV as usize] = vector_mem::store;
    t[vmem::LV as usize] = vector_mem::store;
    t[vmem::DV as usize] = vector_mem::store;
    t[vmem::QV as usize] = vector_mem::store;
    t
};

fn table(class: OpClass) -> &'static [Routine] {
    match class {
        OpClass::Main => &MAIN,
        OpClass::Special => &SPECIAL,
        OpClass::RegImm => &REGIMM,
        OpClass::Cop0 => &COP0,
        OpClass::Cop2 => &COP2,
        OpClass::Vector => &VECTOR,
        OpClass::Lc2 => &LC2,
        OpClass::Sc2 => &SC2,
    }
}

/// Routine for `insn`.
pub fn lookup(insn: Insn) -> Option<Routine> {
    let (class, key) = classify(insn);
    table(class).get(key as usize).copied()
}

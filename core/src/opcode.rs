use crate::insn::Insn;

/// Primary opcode field values.
pub mod op {
    pub const SPECIAL: u8 = 0x00;
    pub const REGIMM: u8 = 0x01;
    pub const J: u8 = 0x02;
    pub const JAL: u8 = 0x03;
    pub const BEQ: u8 = 0x04;
    pub const BNE: u8 = 0x05;
    pub const BLEZ: u8 = 0x06;
    pub const BGTZ: u8 = 0x07;
    pub const ADDI: u8 = 0x08;
    pub const ADDIU: u8 = 0x09;
    pub const SLTI: u8 = 0x0A;
    pub const SLTIU: u8 = 0x0B;
    pub const ANDI: u8 = 0x0C;
    pub const ORI: u8 = 0x0D;
    pub const XORI: u8 = 0x0E;
    pub const LUI: u8 = 0x0F;
    pub const COP0: u8 = 0x10;
    pub const COP2: u8 = 0x12;
    pub const LB: u8 = 0x20;
    pub const LH: u8 = 0x21;
    pub const LW: u8 = 0x23;
    pub const LBU: u8 = 0x24;
    pub const LHU: u8 = 0x25;
    pub const SB: u8 = 0x28;
    pub const SH: u8 = 0x29;
    pub const SW: u8 = 0x2B;
    pub const LWC2: u8 = 0x32;
    pub const SWC2: u8 = 0x3A;
}

/// SPECIAL function codes.
pub mod special {
    pub const SLL: u8 = 0x00;
    pub const SRL: u8 = 0x02;
    pub const SRA: u8 = 0x03;
    pub const SLLV: u8 = 0x04;
    pub const SRLV: u8 = 0x06;
    pub const SRAV: u8 = 0x07;
    pub const JR: u8 = 0x08;
    pub const JALR: u8 = 0x09;
    pub const BREAK: u8 = 0x0D;
    pub const ADD: u8 = 0x20;
    pub const ADDU: u8 = 0x21;
    pub const SUB: u8 = 0x22;
    pub const SUBU: u8 = 0x23;
    pub const AND: u8 = 0x24;
    pub const OR: u8 = 0x25;
    pub const XOR: u8 = 0x26;
    pub const NOR: u8 = 0x27;
    pub const SLT: u8 = 0x2A;
    pub const SLTU: u8 = 0x2B;
}

/// REGIMM `rt` codes.
pub mod regimm {
    pub const BLTZ: u8 = 0x00;
    pub const BGEZ: u8 = 0x01;
    pub const BLTZAL: u8 = 0x10;
    pub const BGEZAL: u8 = 0x11;
}

/// COP0/COP2 `rs` move codes.
pub mod cop {
    pub const MF: u8 = 0x00;
    pub const CF: u8 = 0x02;
    pub const MT: u8 = 0x04;
    pub const CT: u8 = 0x06;
}

/// Vector unit function codes.
pub mod vector {
    pub const VMULF: u8 = 0x00;
    pub const VMULU: u8 = 0x01;
    pub const VRNDP: u8 = 0x02;
    pub const VMULQ: u8 = 0x03;
    pub const VMUDL: u8 = 0x04;
    pub const VMUDM: u8 = 0x05;
    pub const VMUDN: u8 = 0x06;
    pub const VMUDH: u8 = 0x07;
    pub const VMACF: u8 = 0x08;
    pub const VMACU: u8 = 0x09;
    pub const VRNDN: u8 = 0x0A;
    pub const VMACQ: u8 = 0x0B;
    pub const VMADL: u8 = 0x0C;
    pub const VMADM: u8 = 0x0D;
    pub const VMADN: u8 = 0x0E;
    pub const VMADH: u8 = 0x0F;
    pub const VADD: u8 = 0x10;
    pub const VSUB: u8 = 0x11;
    pub const VABS: u8 = 0x13;
    pub const VADDC: u8 = 0x14;
    pub const VSUBC: u8 = 0x15;
    pub const VSAR: u8 = 0x1D;
    pub const VLT: u8 = 0x20;
    pub const VEQ: u8 = 0x21;
    pub const VNE: u8 = 0x22;
    pub const VGE: u8 = 0x23;
    pub const VCL: u8 = 0x24;
    pub const VCH: u8 = 0x25;
    pub const VCR: u8 = 0x26;
    pub const VMRG: u8 = 0x27;
    pub const VAND: u8 = 0x28;
    pub const VNAND: u8 = 0x29;
    pub const VOR: u8 = 0x2A;
    pub const VNOR: u8 = 0x2B;
    pub const VXOR: u8 = 0x2C;
    pub const VNXOR: u8 = 0x2D;
    pub const VRCP: u8 = 0x30;
    pub const VRCPL: u8 = 0x31;
    pub const VRCPH: u8 = 0x32;
    pub const VMOV: u8 = 0x33;
    pub const VRSQ: u8 = 0x34;
    pub const VRSQL: u8 = 0x35;
    pub const VRSQH: u8 = 0x36;
    pub const VNOP: u8 = 0x37;
}

/// LWC2/SWC2 sub-opcodes (the `rd` field).
pub mod vmem {
    pub const BV: u8 = 0x00;
    pub const SV: u8 = 0x01;
    pub const LV: u8 = 0x02;
    pub const DV: u8 = 0x03;
    pub const QV: u8 = 0x04;
    pub const RV: u8 = 0x05;
    pub const PV: u8 = 0x06;
    pub const UV: u8 = 0x07;
    pub const HV: u8 = 0x08;
    pub const FV: u8 = 0x09;
    pub const WV: u8 = 0x0A;
    pub const TV: u8 = 0x0B;
}

/// Instruction class: selects which dispatch table a word is looked
/// up in, together with the class-specific key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    /// Keyed by the primary opcode.
    Main,
    /// Keyed by `funct`.
    Special,
    /// Keyed by `rt`.
    RegImm,
    /// Keyed by `rs`.
    Cop0,
    /// COP2 moves, keyed by `rs`.
    Cop2,
    /// COP2 compute, keyed by `funct`.
    Vector,
    /// Keyed by `rd`.
    Lc2,
    /// Keyed by `rd`.
    Sc2,
}

impl OpClass {
    /// Number of keys in the class's dispatch table.
    pub const fn table_len(self) -> usize {
        match self {
            OpClass::Main | OpClass::Special | OpClass::Vector => 64,
            OpClass::RegImm | OpClass::Cop0 | OpClass::Cop2 | OpClass::Lc2 | OpClass::Sc2 => 32,
        }
    }
}

/// Split an instruction word into its class and table key.
pub fn classify(insn: Insn) -> (OpClass, u8) {
    match insn.op() {
        op::SPECIAL => (OpClass::Special, insn.funct()),
        op::REGIMM => (OpClass::RegImm, insn.rt() as u8),
        op::COP0 => (OpClass::Cop0, insn.rs() as u8),
        op::COP2 if insn.is_vector_compute() => (OpClass::Vector, insn.funct()),
        op::COP2 => (OpClass::Cop2, insn.rs() as u8),
        op::LWC2 => (OpClass::Lc2, insn.rd() as u8),
        op::SWC2 => (OpClass::Sc2, insn.rd() as u8),
        other => (OpClass::Main, other),
    }
}

/// Fully decoded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Main
    J,
    Jal,
    Beq,
    Bne,
    Blez,
    Bgtz,
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    Lui,
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    Sb,
    Sh,
    Sw,
    // Special
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    Jr,
    Jalr,
    Break,
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    // RegImm
    Bltz,
    Bgez,
    Bltzal,
    Bgezal,
    // Coprocessor moves
    Mfc0,
    Mtc0,
    Mfc2,
    Cfc2,
    Mtc2,
    Ctc2,
    // Vector compute
    Vmulf,
    Vmulu,
    Vrndp,
    Vmulq,
    Vmudl,
    Vmudm,
    Vmudn,
    Vmudh,
    Vmacf,
    Vmacu,
    Vrndn,
    Vmacq,
    Vmadl,
    Vmadm,
    Vmadn,
    Vmadh,
    Vadd,
    Vsub,
    Vabs,
    Vaddc,
    Vsubc,
    Vsar,
    Vlt,
    Veq,
    Vne,
    Vge,
    Vcl,
    Vch,
    Vcr,
    Vmrg,
    Vand,
    Vnand,
    Vor,
    Vnor,
    Vxor,
    Vnxor,
    Vrcp,
    Vrcpl,
    Vrcph,
    Vmov,
    Vrsq,
    Vrsql,
    Vrsqh,
    Vnop,
    // Vector loads
    Lbv,
    Lsv,
    Llv,
    Ldv,
    Lqv,
    Lrv,
    Lpv,
    Luv,
    Lhv,
    Lfv,
    Ltv,
    // Vector stores
    Sbv,
    Ssv,
    Slv,
    Sdv,
    Sqv,
    Srv,
    Spv,
    Suv,
    Shv,
    Sfv,
    Swv,
    Stv,
    /// Encoding with no defined behavior; executes as a no-op.
    Unknown,
}

impl Opcode {
    /// Decode an instruction word.
    pub fn decode(insn: Insn) -> Opcode {
        let (class, key) = classify(insn);
        match class {
            OpClass::Main => match key {
                op::J => Opcode::J,
                op::JAL => Opcode::Jal,
                op::BEQ => Opcode::Beq,
                op::BNE => Opcode::Bne,
                op::BLEZ => Opcode::Blez,
                op::BGTZ => Opcode::Bgtz,
                op::ADDI => Opcode::Addi,
                op::ADDIU => Opcode::Addiu,
                op::SLTI => Opcode::Slti,
                op::SLTIU => Opcode::Sltiu,
                op::ANDI => Opcode::Andi,
                op::ORI => Opcode::Ori,
                op::XORI => Opcode::Xori,
                op::LUI => Opcode::Lui,
                op::LB => Opcode::Lb,
                op::LH => Opcode::Lh,
                op::LW => Opcode::Lw,
                op::LBU => Opcode::Lbu,
                op::LHU => Opcode::Lhu,
                op::SB => Opcode::Sb,
                op::SH => Opcode::Sh,
                op::SW => Opcode::Sw,
                _ => Opcode::Unknown,
            },
            OpClass::Special => match key {
                special::SLL => Opcode::Sll,
                special::SRL => Opcode::Srl,
                special::SRA => Opcode::Sra,
                special::SLLV => Opcode::Sllv,
                special::SRLV => Opcode::Srlv,
                special::SRAV => Opcode::Srav,
                special::JR => Opcode::Jr,
                special::JALR => Opcode::Jalr,
                special::BREAK => Opcode::Break,
                special::ADD => Opcode::Add,
                special::ADDU => Opcode::Addu,
                special::SUB => Opcode::Sub,
                special::SUBU => Opcode::Subu,
                special::AND => Opcode::And,
                special::OR => Opcode::Or,
                special::XOR => Opcode::Xor,
                special::NOR => Opcode::Nor,
                special::SLT => Opcode::Slt,
                special::SLTU => Opcode::Sltu,
                _ => Opcode::Unknown,
            },
            OpClass::RegImm => match key {
                regimm::BLTZ => Opcode::Bltz,
                regimm::BGEZ => Opcode::Bgez,
                regimm::BLTZAL => Opcode::Bltzal,
                regimm::BGEZAL => Opcode::Bgezal,
                _ => Opcode::Unknown,
            },
            OpClass::Cop0 => match key {
                cop::MF => Opcode::Mfc0,
                cop::MT => Opcode::Mtc0,
                _ => Opcode::Unknown,
            },
            OpClass::Cop2 => match key {
                cop::MF => Opcode::Mfc2,
                cop::CF => Opcode::Cfc2,
                cop::MT => Opcode::Mtc2,
                cop::CT => Opcode::Ctc2,
                _ => Opcode::Unknown,
            },
            OpClass::Vector => Self::decode_vector(key),
            OpClass::Lc2 => match key {
                vmem::BV => Opcode::Lbv,
                vmem::SV => Opcode::Lsv,
                vmem::LV => Opcode::Llv,
                vmem::DV => Opcode::Ldv,
                vmem::QV => Opcode::Lqv,
                vmem::RV => Opcode::Lrv,
                vmem::PV => Opcode::Lpv,
                vmem::UV => Opcode::Luv,
                vmem::HV => Opcode::Lhv,
                vmem::FV => Opcode::Lfv,
                vmem::TV => Opcode::Ltv,
                _ => Opcode::Unknown,
            },
            OpClass::Sc2 => match key {
                vmem::BV => Opcode::Sbv,
                vmem::SV => Opcode::Ssv,
                vmem::LV => Opcode::Slv,
                vmem::DV => Opcode::Sdv,
                vmem::QV => Opcode::Sqv,
                vmem::RV => Opcode::Srv,
                vmem::PV => Opcode::Spv,
                vmem::UV => Opcode::Suv,
                vmem::HV => Opcode::Shv,
                vmem::FV => Opcode::Sfv,
                vmem::WV => Opcode::Swv,
                vmem::TV => Opcode::Stv,
                _ => Opcode::Unknown,
            },
        }
    }

    fn decode_vector(funct: u8) -> Opcode {
        use vector::*;
        match funct {
            VMULF => Opcode::Vmulf,
            VMULU => Opcode::Vmulu,
            VRNDP => Opcode::Vrndp,
            VMULQ => Opcode::Vmulq,
            VMUDL => Opcode::Vmudl,
            VMUDM => Opcode::Vmudm,
            VMUDN => Opcode::Vmudn,
            VMUDH => Opcode::Vmudh,
            VMACF => Opcode::Vmacf,
            VMACU => Opcode::Vmacu,
            VRNDN => Opcode::Vrndn,
            VMACQ => Opcode::Vmacq,
            VMADL => Opcode::Vmadl,
            VMADM => Opcode::Vmadm,
            VMADN => Opcode::Vmadn,
            VMADH => Opcode::Vmadh,
            VADD => Opcode::Vadd,
            VSUB => Opcode::Vsub,
            VABS => Opcode::Vabs,
            VADDC => Opcode::Vaddc,
            VSUBC => Opcode::Vsubc,
            VSAR => Opcode::Vsar,
            VLT => Opcode::Vlt,
            VEQ => Opcode::Veq,
            VNE => Opcode::Vne,
            VGE => Opcode::Vge,
            VCL => Opcode::Vcl,
            VCH => Opcode::Vch,
            VCR => Opcode::Vcr,
            VMRG => Opcode::Vmrg,
            VAND => Opcode::Vand,
            VNAND => Opcode::Vnand,
            VOR => Opcode::Vor,
            VNOR => Opcode::Vnor,
            VXOR => Opcode::Vxor,
            VNXOR => Opcode::Vnxor,
            VRCP => Opcode::Vrcp,
            VRCPL => Opcode::Vrcpl,
            VRCPH => Opcode::Vrcph,
            VMOV => Opcode::Vmov,
            VRSQ => Opcode::Vrsq,
            VRSQL => Opcode::Vrsql,
            VRSQH => Opcode::Vrsqh,
            VNOP => Opcode::Vnop,
            _ => Opcode::Unknown,
        }
    }

    /// Relative or absolute branch/jump with a delay slot.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::J
                | Opcode::Jal
                | Opcode::Jr
                | Opcode::Jalr
                | Opcode::Beq
                | Opcode::Bne
                | Opcode::Blez
                | Opcode::Bgtz
                | Opcode::Bltz
                | Opcode::Bgez
                | Opcode::Bltzal
                | Opcode::Bgezal
        )
    }

    /// Conditional branches (one taken and one fallthrough path).
    pub fn is_conditional_branch(self) -> bool {
        matches!(
            self,
            Opcode::Beq
                | Opcode::Bne
                | Opcode::Blez
                | Opcode::Bgtz
                | Opcode::Bltz
                | Opcode::Bgez
                | Opcode::Bltzal
                | Opcode::Bgezal
        )
    }

    /// Register-indirect jumps; no statically known target.
    pub fn is_indirect(self) -> bool {
        matches!(self, Opcode::Jr | Opcode::Jalr)
    }

    pub fn is_vector_load(self) -> bool {
        matches!(
            self,
            Opcode::Lbv
                | Opcode::Lsv
                | Opcode::Llv
                | Opcode::Ldv
                | Opcode::Lqv
                | Opcode::Lrv
                | Opcode::Lpv
                | Opcode::Luv
                | Opcode::Lhv
                | Opcode::Lfv
                | Opcode::Ltv
        )
    }

    pub fn is_vector_store(self) -> bool {
        matches!(
            self,
            Opcode::Sbv
                | Opcode::Ssv
                | Opcode::Slv
                | Opcode::Sdv
                | Opcode::Sqv
                | Opcode::Srv
                | Opcode::Spv
                | Opcode::Suv
                | Opcode::Shv
                | Opcode::Sfv
                | Opcode::Swv
                | Opcode::Stv
        )
    }
}

/// Mnemonic for log output.
pub fn mnemonic(insn: Insn) -> String {
    let name = format!("{:?}", Opcode::decode(insn));
    name.to_ascii_lowercase()
}

use bitflags::bitflags;
use rsp_core::{Insn, Opcode};

bitflags! {
    /// Side-effect classes of one instruction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShapeFlags: u32 {
        const BRANCH = 1 << 0;
        const LOAD = 1 << 1;
        const STORE = 1 << 2;
        const FLAGS_READ = 1 << 3;
        const FLAGS_WRITE = 1 << 4;
        /// Uses the divide unit latches.
        const DIVIDE = 1 << 5;
        /// Effects outside the register file (COP0, BREAK).
        const OPAQUE = 1 << 6;
        /// Architecturally does nothing.
        const NOP = 1 << 7;
        const UNKNOWN = 1 << 8;
    }
}

bitflags! {
    /// 16-bit slices of the 48-bit accumulator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccSlices: u8 {
        const LOW = 1 << 0;
        const MID = 1 << 1;
        const HIGH = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Domain {
    #[default]
    Scalar,
    Vector,
    Control,
}

/// Register and resource footprint of an instruction.
///
/// Register sets are bit masks indexed by register number. Scalar
/// register 0 never appears in either set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shape {
    pub domain: Domain,
    pub flags: ShapeFlags,
    pub gpr_read: u32,
    pub gpr_write: u32,
    pub vpr_read: u32,
    pub vpr_write: u32,
    /// `vpr_write` replaces all eight lanes.
    pub full_vpr_write: bool,
    pub acc_read: AccSlices,
    pub acc_write: AccSlices,
}

const fn bit(r: usize) -> u32 {
    1 << r
}

/// Eight consecutive registers starting at the group base of `r`.
const fn group(r: usize) -> u32 {
    0xFF << (r & !7)
}

impl Shape {
    fn scalar(read: u32, write: u32) -> Self {
        Self {
            gpr_read: read & !1,
            gpr_write: write & !1,
            ..Self::default()
        }
    }

    fn control(flags: ShapeFlags) -> Self {
        Self {
            domain: Domain::Control,
            flags,
            ..Self::default()
        }
    }

    fn with(mut self, flags: ShapeFlags) -> Self {
        self.flags |= flags;
        self
    }

    fn vector(read: u32, write: u32, full: bool) -> Self {
        Self {
            domain: Domain::Vector,
            vpr_read: read,
            vpr_write: write,
            full_vpr_write: full,
            ..Self::default()
        }
    }

    fn acc(mut self, read: AccSlices, write: AccSlices) -> Self {
        self.acc_read = read;
        self.acc_write = write;
        self
    }

    #[inline]
    pub fn is_branch(&self) -> bool {
        self.flags.contains(ShapeFlags::BRANCH)
    }

    #[inline]
    pub fn touches_memory(&self) -> bool {
        self.flags.intersects(ShapeFlags::LOAD | ShapeFlags::STORE)
    }
}

/// Footprint of `insn`.
pub fn shape(insn: Insn) -> Shape {
    use Opcode::*;

    if insn == Insn::FILL || insn.raw() == 0 {
        return Shape::default().with(ShapeFlags::NOP);
    }

    let (rs, rt, rd) = (bit(insn.rs()), bit(insn.rt()), bit(insn.rd()));
    let (vs, vt, vd) = (bit(insn.vs()), bit(insn.vt()), bit(insn.vd()));
    let all = AccSlices::all();
    let low = AccSlices::LOW;
    let none = AccSlices::empty();

    match Opcode::decode(insn) {
        Addi | Addiu | Slti | Sltiu | Andi | Ori | Xori => Shape::scalar(rs, rt),
        Lui => Shape::scalar(0, rt),
        Sll | Srl | Sra => Shape::scalar(rt, rd),
        Sllv | Srlv | Srav | Add | Addu | Sub | Subu | And | Or | Xor | Nor | Slt | Sltu => {
            Shape::scalar(rs | rt, rd)
        }
        Lb | Lh | Lw | Lbu | Lhu => Shape::scalar(rs, rt).with(ShapeFlags::LOAD),
        Sb | Sh | Sw => Shape::scalar(rs | rt, 0).with(ShapeFlags::STORE),

        J => Shape::control(ShapeFlags::BRANCH),
        Jal => Shape {
            gpr_write: bit(31),
            ..Shape::control(ShapeFlags::BRANCH)
        },
        Jr => Shape {
            gpr_read: rs & !1,
            ..Shape::control(ShapeFlags::BRANCH)
        },
        Jalr => Shape {
            gpr_read: rs & !1,
            gpr_write: rd & !1,
            ..Shape::control(ShapeFlags::BRANCH)
        },
        Beq | Bne => Shape {
            gpr_read: (rs | rt) & !1,
            ..Shape::control(ShapeFlags::BRANCH)
        },
        Blez | Bgtz | Bltz | Bgez => Shape {
            gpr_read: rs & !1,
            ..Shape::control(ShapeFlags::BRANCH)
        },
        Bltzal | Bgezal => Shape {
            gpr_read: rs & !1,
            gpr_write: bit(31),
            ..Shape::control(ShapeFlags::BRANCH)
        },
        Break => Shape::control(ShapeFlags::OPAQUE),
        Mfc0 => Shape {
            gpr_write: rt & !1,
            ..Shape::control(ShapeFlags::OPAQUE)
        },
        Mtc0 => Shape {
            gpr_read: rt & !1,
            ..Shape::control(ShapeFlags::OPAQUE)
        },

        Mfc2 => Shape {
            gpr_write: rt & !1,
            ..Shape::vector(vs, 0, false)
        },
        Mtc2 => Shape {
            gpr_read: rt & !1,
            ..Shape::vector(0, vs, false)
        },
        Cfc2 => Shape {
            gpr_write: rt & !1,
            ..Shape::vector(0, 0, false).with(ShapeFlags::FLAGS_READ)
        },
        Ctc2 => Shape {
            gpr_read: rt & !1,
            ..Shape::vector(0, 0, false).with(ShapeFlags::FLAGS_WRITE)
        },

        Vmulf | Vmulu | Vmudl | Vmudm | Vmudn | Vmudh => {
            Shape::vector(vs | vt, vd, true).acc(none, all)
        }
        Vmacf | Vmacu | Vmadl | Vmadm | Vmadn | Vmadh => {
            Shape::vector(vs | vt, vd, true).acc(all, all)
        }
        Vrndp | Vrndn | Vmulq | Vmacq | Vnop => {
            Shape::vector(0, 0, false).with(ShapeFlags::NOP)
        }
        Vadd | Vsub => Shape::vector(vs | vt, vd, true)
            .acc(none, low)
            .with(ShapeFlags::FLAGS_READ | ShapeFlags::FLAGS_WRITE),
        Vabs => Shape::vector(vs | vt, vd, true).acc(none, low),
        Vaddc | Vsubc => Shape::vector(vs | vt, vd, true)
            .acc(none, low)
            .with(ShapeFlags::FLAGS_WRITE),
        Vsar => {
            let read = match insn.element() {
                8 => AccSlices::HIGH,
                9 => AccSlices::MID,
                10 => AccSlices::LOW,
                _ => none,
            };
            Shape::vector(0, vd, true).acc(read, none)
        }
        Vlt | Veq | Vne | Vge | Vcl => Shape::vector(vs | vt, vd, true)
            .acc(none, low)
            .with(ShapeFlags::FLAGS_READ | ShapeFlags::FLAGS_WRITE),
        Vmrg => Shape::vector(vs | vt, vd, true)
            .acc(none, low)
            .with(ShapeFlags::FLAGS_READ),
        Vch | Vcr => Shape::vector(vs | vt, vd, true)
            .acc(none, low)
            .with(ShapeFlags::FLAGS_WRITE),
        Vand | Vnand | Vor | Vnor | Vxor | Vnxor => {
            Shape::vector(vs | vt, vd, true).acc(none, low)
        }
        Vmov => Shape::vector(vt, vd, false).acc(none, low),
        Vrcp | Vrcpl | Vrsq | Vrsql | Vrcph | Vrsqh => Shape::vector(vt, vd, false)
            .acc(none, low)
            .with(ShapeFlags::DIVIDE),

        Ltv => Shape {
            gpr_read: bit(insn.base()) & !1,
            ..Shape::vector(0, group(insn.vt()), false).with(ShapeFlags::LOAD)
        },
        Stv => Shape {
            gpr_read: bit(insn.base()) & !1,
            ..Shape::vector(group(insn.vt()), 0, false).with(ShapeFlags::STORE)
        },
        op if op.is_vector_load() => Shape {
            gpr_read: bit(insn.base()) & !1,
            ..Shape::vector(0, vt, false).with(ShapeFlags::LOAD)
        },
        op if op.is_vector_store() => Shape {
            gpr_read: bit(insn.base()) & !1,
            ..Shape::vector(vt, 0, false).with(ShapeFlags::STORE)
        },

        _ => Shape::control(ShapeFlags::UNKNOWN),
    }
}

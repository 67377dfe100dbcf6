/// A raw 32-bit RSP instruction word with named field views.
///
/// Fields are re-derived from the raw bits on every access; an
/// `Insn` is never stored independently of the image it was read
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Insn(pub u32);

impl Insn {
    /// Word used by some microcode as padding; compiled as nothing.
    pub const FILL: Insn = Insn(0xFFFF_FFFF);

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Primary opcode, bits 31..26.
    #[inline]
    pub const fn op(self) -> u8 {
        (self.0 >> 26) as u8
    }

    #[inline]
    pub const fn rs(self) -> usize {
        ((self.0 >> 21) & 0x1F) as usize
    }

    #[inline]
    pub const fn rt(self) -> usize {
        ((self.0 >> 16) & 0x1F) as usize
    }

    #[inline]
    pub const fn rd(self) -> usize {
        ((self.0 >> 11) & 0x1F) as usize
    }

    #[inline]
    pub const fn sa(self) -> u32 {
        (self.0 >> 6) & 0x1F
    }

    /// Function code, bits 5..0.
    #[inline]
    pub const fn funct(self) -> u8 {
        (self.0 & 0x3F) as u8
    }

    #[inline]
    pub const fn imm(self) -> u16 {
        self.0 as u16
    }

    /// Immediate sign-extended to 32 bits.
    #[inline]
    pub const fn simm(self) -> i32 {
        self.0 as u16 as i16 as i32
    }

    /// 26-bit jump target field.
    #[inline]
    pub const fn target(self) -> u32 {
        self.0 & 0x03FF_FFFF
    }

    /// Base register of a load/store (same bits as `rs`).
    #[inline]
    pub const fn base(self) -> usize {
        self.rs()
    }

    // -- COP2 views --

    /// Vector destination register (bits 10..6).
    #[inline]
    pub const fn vd(self) -> usize {
        ((self.0 >> 6) & 0x1F) as usize
    }

    /// First vector source register (bits 15..11).
    #[inline]
    pub const fn vs(self) -> usize {
        self.rd()
    }

    /// Second vector source register (bits 20..16).
    #[inline]
    pub const fn vt(self) -> usize {
        self.rt()
    }

    /// Element selector of a vector compute op (bits 24..21).
    #[inline]
    pub const fn element(self) -> u32 {
        (self.0 >> 21) & 0xF
    }

    /// Destination element of the single-lane ops (VMOV, VRCP...).
    #[inline]
    pub const fn de(self) -> usize {
        (self.vs() & 7) as usize
    }

    /// Element field of MFC2/MTC2 and vector loads/stores (bits 10..7).
    #[inline]
    pub const fn del(self) -> u32 {
        (self.0 >> 7) & 0xF
    }

    /// Signed 7-bit offset of a vector load/store.
    #[inline]
    pub const fn voffset(self) -> i32 {
        ((self.0 << 25) as i32) >> 25
    }

    /// Whether bit 25 marks this COP2 word as a vector compute op.
    #[inline]
    pub const fn is_vector_compute(self) -> bool {
        self.rs() >= 0x10
    }
}

/// Lane of `vt` read by lane `lane` under element selector `e`.
#[inline]
pub const fn select_lane(e: u32, lane: usize) -> usize {
    let e = e as usize;
    if e < 2 {
        lane
    } else if e < 4 {
        (lane & !1) | (e & 1)
    } else if e < 8 {
        (lane & !3) | (e & 3)
    } else {
        e & 7
    }
}

/// Compute the target of a relative branch located at `pc`.
#[inline]
pub const fn branch_target(pc: u32, insn: Insn) -> u32 {
    (pc.wrapping_add(4).wrapping_add((insn.simm() << 2) as u32)) & 0xFFC
}

/// Compute the target of J/JAL.
#[inline]
pub const fn jump_target(insn: Insn) -> u32 {
    (insn.target() << 2) & 0xFFC
}

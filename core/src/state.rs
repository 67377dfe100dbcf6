//! Emulated RSP register file and memories.
//!
//! Layout must be `#[repr(C)]`: generated code addresses every
//! field at a fixed displacement from the state pointer.

use core::mem::offset_of;

/// Number of scalar registers.
pub const NUM_GPRS: usize = 32;
/// Number of 128-bit vector registers.
pub const NUM_VPRS: usize = 32;
/// Lanes per vector register.
pub const NUM_LANES: usize = 8;
/// Size of DMEM and of IMEM.
pub const MEM_SIZE: usize = 0x1000;
/// Address mask for DMEM/IMEM accesses.
pub const MEM_MASK: u32 = 0xFFF;
/// Instruction address mask.
pub const PC_MASK: u32 = 0xFFC;

// COP0 register indices.
pub const COP0_DMA_CACHE: usize = 0;
pub const COP0_DMA_DRAM: usize = 1;
pub const COP0_DMA_READ_LENGTH: usize = 2;
pub const COP0_DMA_WRITE_LENGTH: usize = 3;
pub const COP0_SP_STATUS: usize = 4;
pub const COP0_DMA_FULL: usize = 5;
pub const COP0_DMA_BUSY: usize = 6;
pub const COP0_SEMAPHORE: usize = 7;

// SP_STATUS read bits.
pub const SP_STATUS_HALT: u32 = 0x0001;
pub const SP_STATUS_BROKE: u32 = 0x0002;

// SP_STATUS write bits.
pub const SP_CLR_HALT: u32 = 0x0001;
pub const SP_SET_HALT: u32 = 0x0002;
pub const SP_CLR_BROKE: u32 = 0x0004;

/// Architectural registers of the scalar and vector units.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    /// Scalar registers. `gpr[0]` is never written.
    pub gpr: [u32; NUM_GPRS],
    /// Vector registers; element `e` lives at index `e`.
    pub vpr: [[u16; NUM_LANES]; NUM_VPRS],
    /// 48-bit accumulator per lane, sign-extended to 64 bits.
    pub acc: [i64; NUM_LANES],
    /// Carry (bits 0..8) and not-equal (bits 8..16) flags.
    pub vco: u32,
    /// Compare (bits 0..8) and clip compare (bits 8..16) flags.
    pub vcc: u32,
    /// Clip compare extension flags (bits 0..8).
    pub vce: u32,
    pub div_in: u32,
    pub div_out: u32,
    pub div_dp: u32,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            gpr: [0; NUM_GPRS],
            vpr: [[0; NUM_LANES]; NUM_VPRS],
            acc: [0; NUM_LANES],
            vco: 0,
            vcc: 0,
            vce: 0,
            div_in: 0,
            div_out: 0,
            div_dp: 0,
        }
    }

    /// Store a value into the accumulator, wrapping to 48 bits.
    #[inline]
    pub fn set_acc(&mut self, lane: usize, value: i64) {
        self.acc[lane] = (value << 16) >> 16;
    }

    /// Replace the low 16 bits of a lane's accumulator.
    #[inline]
    pub fn set_acc_low(&mut self, lane: usize, value: u16) {
        self.acc[lane] = (self.acc[lane] & !0xFFFF) | value as i64;
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete RSP state shared between generated code, the
/// interpreter, and the surrounding emulator.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RspState {
    pub regs: RegisterFile,
    /// SP control registers as seen through COP0.
    pub cop0: [u32; 16],
    /// Data memory, big-endian byte order.
    pub dmem: [u8; MEM_SIZE],
    /// Instruction memory, big-endian byte order.
    pub imem: [u8; MEM_SIZE],
    /// Program counter (always masked with `PC_MASK`).
    pub pc: u32,
    /// Non-zero once BREAK or a SP_STATUS write halted the core.
    pub halted: u32,
    /// Remaining cycle budget of the current run.
    pub budget: i32,
    /// Instruction word handed to the interpreter by a trap.
    pub trap_word: u32,
}

impl RspState {
    pub fn new() -> Self {
        Self {
            regs: RegisterFile::new(),
            cop0: [0; 16],
            dmem: [0; MEM_SIZE],
            imem: [0; MEM_SIZE],
            pc: 0,
            halted: 0,
            budget: 0,
            trap_word: 0,
        }
    }

    /// A fresh state moved into a box, so callers do not keep both
    /// memories on their own stack.
    pub fn boxed() -> Box<Self> {
        Box::new(Self::new())
    }

    /// Read the big-endian instruction word at `addr`.
    #[inline]
    pub fn imem_word(&self, addr: u32) -> u32 {
        let a = (addr & PC_MASK) as usize;
        u32::from_be_bytes([self.imem[a], self.imem[a + 1], self.imem[a + 2], self.imem[a + 3]])
    }

    /// Load a program into IMEM starting at `addr`.
    pub fn load_imem(&mut self, addr: u32, words: &[u32]) {
        for (i, w) in words.iter().enumerate() {
            let a = ((addr as usize) + i * 4) & (PC_MASK as usize);
            self.imem[a..a + 4].copy_from_slice(&w.to_be_bytes());
        }
    }

    #[inline]
    pub fn read_u8(&self, addr: u32) -> u8 {
        self.dmem[(addr & MEM_MASK) as usize]
    }

    #[inline]
    pub fn write_u8(&mut self, addr: u32, val: u8) {
        self.dmem[(addr & MEM_MASK) as usize] = val;
    }

    /// Big-endian halfword; wraps byte by byte at the end of DMEM.
    pub fn read_u16(&self, addr: u32) -> u16 {
        u16::from_be_bytes([self.read_u8(addr), self.read_u8(addr.wrapping_add(1))])
    }

    pub fn read_u32(&self, addr: u32) -> u32 {
        u32::from_be_bytes([
            self.read_u8(addr),
            self.read_u8(addr.wrapping_add(1)),
            self.read_u8(addr.wrapping_add(2)),
            self.read_u8(addr.wrapping_add(3)),
        ])
    }

    pub fn write_u16(&mut self, addr: u32, val: u16) {
        let b = val.to_be_bytes();
        self.write_u8(addr, b[0]);
        self.write_u8(addr.wrapping_add(1), b[1]);
    }

    pub fn write_u32(&mut self, addr: u32, val: u32) {
        for (i, b) in val.to_be_bytes().into_iter().enumerate() {
            self.write_u8(addr.wrapping_add(i as u32), b);
        }
    }
}

impl Default for RspState {
    fn default() -> Self {
        Self::new()
    }
}

// Field offsets (bytes) from the start of RspState.

const REGS: usize = offset_of!(RspState, regs);

/// Byte offset of `regs.gpr[i]`.
pub const fn gpr_offset(i: usize) -> i32 {
    (REGS + offset_of!(RegisterFile, gpr) + i * 4) as i32
}

/// Byte offset of element `lane` of vector register `r`.
pub const fn vpr_offset(r: usize, lane: usize) -> i32 {
    (REGS + offset_of!(RegisterFile, vpr) + r * 16 + lane * 2) as i32
}

/// Byte offset of lane `lane` of the accumulator.
pub const fn acc_offset(lane: usize) -> i32 {
    (REGS + offset_of!(RegisterFile, acc) + lane * 8) as i32
}

/// Byte offset of `cop0[i]`.
pub const fn cop0_offset(i: usize) -> i32 {
    (offset_of!(RspState, cop0) + i * 4) as i32
}

pub const VCO_OFFSET: i32 = (REGS + offset_of!(RegisterFile, vco)) as i32;
pub const VCC_OFFSET: i32 = (REGS + offset_of!(RegisterFile, vcc)) as i32;
pub const VCE_OFFSET: i32 = (REGS + offset_of!(RegisterFile, vce)) as i32;
pub const DIV_IN_OFFSET: i32 = (REGS + offset_of!(RegisterFile, div_in)) as i32;
pub const DIV_OUT_OFFSET: i32 = (REGS + offset_of!(RegisterFile, div_out)) as i32;
pub const DIV_DP_OFFSET: i32 = (REGS + offset_of!(RegisterFile, div_dp)) as i32;
pub const DMEM_OFFSET: i32 = offset_of!(RspState, dmem) as i32;
pub const IMEM_OFFSET: i32 = offset_of!(RspState, imem) as i32;
pub const PC_OFFSET: i32 = offset_of!(RspState, pc) as i32;
pub const HALTED_OFFSET: i32 = offset_of!(RspState, halted) as i32;
pub const BUDGET_OFFSET: i32 = offset_of!(RspState, budget) as i32;
pub const TRAP_WORD_OFFSET: i32 = offset_of!(RspState, trap_word) as i32;

use std::sync::LazyLock;

use rsp_core::RegisterFile;

/// 512-entry reciprocal mantissa table: `1 / (1 + i/512)` in 0.16
/// fixed point, saturated.
pub static RECIPROCAL_TABLE: LazyLock<[u16; 512]> = LazyLock::new(|| {
    std::array::from_fn(|index| {
        let a = index as u64 + 512;
        let b = (1u64 << 34) / a;
        ((b + 1) >> 9).min(0xFFFF) as u16
    })
});

/// 512-entry inverse square root mantissa table. Odd entries cover
/// the odd exponents, so their input is halved.
pub static INVERSE_SQRT_TABLE: LazyLock<[u16; 512]> = LazyLock::new(|| {
    std::array::from_fn(|index| {
        let shift = (index % 2 == 1) as u32;
        let a = (index as u64 + 512) >> shift;
        ((1u64 << 41) / a).isqrt().min(0xFFFF) as u16
    })
});

/// Evaluate VRCP/VRCPL/VRSQ/VRSQL and latch the divide registers.
///
/// Returns the full 32-bit result; the caller writes its low half.
pub(crate) fn evaluate(regs: &mut RegisterFile, src: u16, long: bool, sqrt: bool) -> u32 {
    let input: i32 = if long && regs.div_dp != 0 {
        ((regs.div_in << 16) | src as u32) as i32
    } else {
        src as i16 as i32
    };
    let mask = input >> 31;
    let mut data = input ^ mask;
    if input > -32768 {
        data = data.wrapping_sub(mask);
    }

    let result: u32 = if data == 0 {
        0x7FFF_FFFF
    } else if input == -32768 {
        0xFFFF_0000
    } else {
        let shift = data.leading_zeros();
        let index = ((((data as u32 as u64) << shift) & 0x7FC0_0000) >> 22) as usize;
        if sqrt {
            let r = INVERSE_SQRT_TABLE[(index & 0x1FE) | (shift & 1) as usize] as u32;
            let r = (0x10000 | r) << 14;
            (r >> ((31 - shift) >> 1)) ^ mask as u32
        } else {
            let r = RECIPROCAL_TABLE[index] as u32;
            let r = (0x10000 | r) << 14;
            (r >> (31 - shift)) ^ mask as u32
        }
    };

    regs.div_dp = 0;
    regs.div_out = result >> 16;
    result
}

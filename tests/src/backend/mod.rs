mod code_buffer;

use rsp_backend::x86_64::emitter::*;
use rsp_backend::x86_64::{Reg, Xmm};
use rsp_backend::CodeBuffer;

fn encode(f: impl FnOnce(&mut CodeBuffer)) -> Vec<u8> {
    let mut buf = CodeBuffer::new(4096, 4096).unwrap();
    f(&mut buf);
    buf.region_slice(rsp_backend::Region::Primary).to_vec()
}

#[test]
fn test_arith_encodings() {
    // add eax, ecx
    assert_eq!(encode(|b| emit_arith_rr(b, ArithOp::Add, false, Reg::Rax, Reg::Rcx)), [0x03, 0xC1]);
    // sub rsp, 8
    assert_eq!(encode(|b| emit_arith_ri(b, ArithOp::Sub, true, Reg::Rsp, 8)), [0x48, 0x83, 0xEC, 0x08]);
    // cmp dword [rbp+0x10], 0
    assert_eq!(
        encode(|b| emit_arith_mi(b, ArithOp::Cmp, false, Reg::Rbp, 0x10, 0)),
        [0x83, 0x7D, 0x10, 0x00]
    );
}

#[test]
fn test_mov_encodings() {
    // mov rbp, rdi
    assert_eq!(encode(|b| emit_mov_rr(b, true, Reg::Rbp, Reg::Rdi)), [0x48, 0x89, 0xFD]);
    // mov eax, [rbp+8]
    assert_eq!(encode(|b| emit_load(b, false, Reg::Rax, Reg::Rbp, 8)), [0x8B, 0x45, 0x08]);
    // mov dword [rbp+0x10], 5
    assert_eq!(
        encode(|b| emit_store_imm(b, false, Reg::Rbp, 0x10, 5)),
        [0xC7, 0x45, 0x10, 0x05, 0x00, 0x00, 0x00]
    );
    // mov [rsp+0x80], eax needs a SIB byte and a 32-bit displacement
    assert_eq!(
        encode(|b| emit_store(b, false, Reg::Rax, Reg::Rsp, 0x80)),
        [0x89, 0x84, 0x24, 0x80, 0x00, 0x00, 0x00]
    );
    // xor eax, eax for a zero immediate
    assert_eq!(encode(|b| emit_mov_ri(b, false, Reg::Rax, 0)), [0x31, 0xC0]);
}

#[test]
fn test_extended_registers() {
    // mov r8d, 1
    assert_eq!(
        encode(|b| emit_mov_ri(b, false, Reg::R8, 1)),
        [0x41, 0xB8, 0x01, 0x00, 0x00, 0x00]
    );
    // push r12
    assert_eq!(encode(|b| emit_push(b, Reg::R12)), [0x41, 0x54]);
}

#[test]
fn test_control_encodings() {
    // jmp rax
    assert_eq!(encode(|b| emit_jmp_reg(b, Reg::Rax)), [0xFF, 0xE0]);
    // call rax
    assert_eq!(encode(|b| emit_call_reg(b, Reg::Rax)), [0xFF, 0xD0]);
    // jmp to self: rel32 of -5
    assert_eq!(encode(|b| emit_jmp(b, 0)), [0xE9, 0xFB, 0xFF, 0xFF, 0xFF]);
    assert_eq!(encode(emit_ret), [0xC3]);
}

#[test]
fn test_sse_encodings() {
    // paddw xmm0, xmm1
    assert_eq!(
        encode(|b| emit_sse_rr(b, OPC_PADDW, Xmm::Xmm0, Xmm::Xmm1)),
        [0x66, 0x0F, 0xFD, 0xC1]
    );
    // movdqu xmm0, [rbp+0x20]
    assert_eq!(
        encode(|b| emit_movdqu_load(b, Xmm::Xmm0, Reg::Rbp, 0x20)),
        [0xF3, 0x0F, 0x6F, 0x45, 0x20]
    );
    // psraw xmm2, 15
    assert_eq!(
        encode(|b| emit_sse_shift_ri(b, OPC_SHIFTW_Ib, PackedShiftOp::Sra, Xmm::Xmm2, 15)),
        [0x66, 0x0F, 0x71, 0xE2, 0x0F]
    );
}

#[test]
fn test_align_pads_with_nops() {
    let bytes = encode(|b| {
        emit_ret(b);
        emit_align(b, 8);
    });
    assert_eq!(bytes.len(), 8);
    assert_eq!(&bytes[1..], &[0x0F, 0x1F, 0x80, 0x00, 0x00, 0x00, 0x00]);
}

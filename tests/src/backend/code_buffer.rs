use rsp_backend::x86_64::emitter::{emit_jcc_fwd, emit_jmp, emit_jmp_fwd, X86Cond};
use rsp_backend::{CodeBuffer, Region};

#[test]
fn test_emit_and_read() {
    let mut buf = CodeBuffer::new(4096, 4096).unwrap();
    buf.emit_u8(0x90); // NOP
    buf.emit_u32(0xDEADBEEF);
    assert_eq!(buf.offset(), 5);
    assert_eq!(buf.read_u8(0), 0x90);
    assert_eq!(buf.read_u32(1), 0xDEADBEEF);
}

#[test]
fn test_regions_have_independent_cursors() {
    let mut buf = CodeBuffer::new(4096, 4096).unwrap();
    let split = buf.offset_in(Region::Secondary);
    assert!(split >= 4096);
    assert_eq!(buf.offset_in(Region::Primary), 0);

    buf.emit_u8(0xC3);
    buf.toggle();
    assert_eq!(buf.active(), Region::Secondary);
    buf.emit_u16(0x9090);
    assert_eq!(buf.offset(), split + 2);
    buf.toggle();
    assert_eq!(buf.offset(), 1);

    assert_eq!(buf.region_slice(Region::Primary), &[0xC3]);
    assert_eq!(buf.region_slice(Region::Secondary), &[0x90, 0x90]);
}

#[test]
fn test_patch_handle_targets() {
    let mut buf = CodeBuffer::new(4096, 4096).unwrap();
    let handle = emit_jcc_fwd(&mut buf, X86Cond::Jne);
    let site = handle.site();
    assert_eq!(site, 2);
    buf.emit_u8(0x90);
    buf.patch_here(handle);
    assert_eq!(buf.rel32_target(site), 7);
    // the displacement counts from the end of the field
    assert_eq!(buf.read_u32(site), 1);
}

#[test]
fn test_jump_across_regions() {
    let mut buf = CodeBuffer::new(4096, 4096).unwrap();
    let out = emit_jmp_fwd(&mut buf);
    let rejoin = buf.offset();

    buf.toggle();
    let stub = buf.offset();
    buf.patch(out, stub);
    emit_jmp(&mut buf, rejoin);
    let back_site = buf.offset() - 4;
    buf.toggle();

    assert_eq!(buf.rel32_target(1), stub);
    assert_eq!(buf.rel32_target(back_site), rejoin);
}

#[test]
fn test_reset_rewinds_both_regions() {
    let mut buf = CodeBuffer::new(4096, 4096).unwrap();
    buf.emit_u32(0);
    buf.toggle();
    buf.emit_u32(0);
    buf.reset(2);
    assert_eq!(buf.active(), Region::Primary);
    assert_eq!(buf.offset(), 2);
    assert_eq!(buf.region_slice(Region::Secondary).len(), 0);
}

#[test]
fn test_address_round_trip() {
    let buf = CodeBuffer::new(4096, 4096).unwrap();
    let addr = buf.addr_of(100);
    assert_eq!(buf.offset_of_addr(addr), Some(100));
    assert_eq!(buf.offset_of_addr(0), None);
}

#[test]
#[should_panic(expected = "code buffer overflow")]
fn test_overflow_panics() {
    let mut buf = CodeBuffer::new(4096, 4096).unwrap();
    let room = buf.remaining();
    buf.emit_bytes(&vec![0x90; room + 1]);
}

//! CPU execution engine tests: instruction semantics, flags, interrupt entry,
//! and fault handling.

use super::*;
use crate::memory::MemoryController;

fn booted(mem: &mut MemoryController) -> Cpu {
    let mut cpu = Cpu::new();
    cpu.reset(mem);
    cpu
}

fn load_program(mem: &mut MemoryController, addr: u32, bytes: &[u8]) {
    mem.load(addr, bytes);
}

#[test]
fn reset_sets_pc_from_the_reset_vector() {
    let mut mem = MemoryController::new();
    mem.write32(RESET_VECTOR_ADDR, 0x0000_1000);
    let cpu = booted(&mut mem);
    assert_eq!(cpu.pc, 0x0000_1000);
    assert_eq!(cpu.state(), CpuState::Running);
}

#[test]
fn add_updates_register_and_flags() {
    let mut mem = MemoryController::new();
    mem.write32(RESET_VECTOR_ADDR, 0x1000);
    let mut cpu = booted(&mut mem);
    load_program(&mut mem, 0x1000, &[0x48, 0x10]); // ADD R1,R0 (rs=1,rd=0)
    cpu.write_reg(0, 5);
    cpu.write_reg(1, 7);
    cpu.step(&mut mem);
    assert_eq!(cpu.get_reg(0), 12);
    assert!(!cpu.flag(flags::Z));
}

#[test]
fn cmp_imm4_sets_zero_flag_without_writing_back() {
    let mut mem = MemoryController::new();
    mem.write32(RESET_VECTOR_ADDR, 0x1000);
    let mut cpu = booted(&mut mem);
    load_program(&mut mem, 0x1000, &[0x61, 0x00]); // CMP #0,R0
    cpu.write_reg(0, 0);
    cpu.step(&mut mem);
    assert!(cpu.flag(flags::Z));
    assert_eq!(cpu.get_reg(0), 0);
}

#[test]
fn bra_w_takes_a_signed_16_bit_displacement() {
    let mut mem = MemoryController::new();
    mem.write32(RESET_VECTOR_ADDR, 0x1000);
    let mut cpu = booted(&mut mem);
    load_program(&mut mem, 0x1000, &[0x38, 0x05, 0x00]); // BRA.W +5
    cpu.step(&mut mem);
    assert_eq!(cpu.pc, 0x1003 + 5);
}

#[test]
fn push_then_pop_round_trips_through_memory() {
    let mut mem = MemoryController::new();
    mem.write32(RESET_VECTOR_ADDR, 0x1000);
    let mut cpu = booted(&mut mem);
    load_program(&mut mem, 0x1000, &[0x7E, 0x01, 0x7F, 0x02]); // PUSH.L R1; POP R2
    cpu.write_reg(1, 0xCAFEBABE);
    cpu.step(&mut mem);
    cpu.step(&mut mem);
    assert_eq!(cpu.get_reg(2), 0xCAFEBABE);
}

#[test]
fn undefined_opcode_raises_exception_and_halts() {
    let mut mem = MemoryController::new();
    mem.write32(RESET_VECTOR_ADDR, 0x1000);
    let mut cpu = booted(&mut mem);
    load_program(&mut mem, 0x1000, &[0xFF]);
    cpu.step(&mut mem);
    assert_eq!(cpu.state(), CpuState::Exception);
    assert_eq!(cpu.fault(), Some((0x1000, 0xFF)));
}

#[test]
fn wait_parks_the_cpu_until_an_interrupt_arrives() {
    let mut mem = MemoryController::new();
    mem.write32(RESET_VECTOR_ADDR, 0x1000);
    let mut cpu = booted(&mut mem);
    load_program(&mut mem, 0x1000, &[0x76, 0x90]); // WAIT
    cpu.step(&mut mem);
    assert_eq!(cpu.state(), CpuState::Waiting);
    assert_eq!(cpu.step(&mut mem), 0);
}

#[test]
fn interrupt_entry_pushes_psw_and_pc_and_jumps_to_the_handler() {
    let mut mem = MemoryController::new();
    mem.write32(RESET_VECTOR_ADDR, 0x1000);
    mem.write32(VECTOR_TABLE_BASE + 64 * 4, 0x0000_2000);
    let mut cpu = booted(&mut mem);
    cpu.set_flag(flags::I, true);
    mem.interrupts_mut().write_ier(64 / 8, 1 << (64 % 8));
    mem.interrupts_mut().write_ipr(64, 5);
    mem.interrupts_mut().request(64);

    let pc_before = cpu.pc;
    let psw_before = cpu.psw;
    cpu.step(&mut mem);

    assert_eq!(cpu.pc, 0x0000_2000);
    assert_eq!(flags::ipl(cpu.psw), 5);
    assert!(!cpu.flag(flags::I));
    assert_eq!(cpu.pop32(&mut mem), pc_before);
    assert_eq!(cpu.pop32(&mut mem), psw_before);
}

#[test]
fn interrupt_is_masked_by_an_equal_or_higher_current_ipl() {
    let mut mem = MemoryController::new();
    mem.write32(RESET_VECTOR_ADDR, 0x1000);
    let mut cpu = booted(&mut mem);
    cpu.set_flag(flags::I, true);
    cpu.psw = flags::with_ipl(cpu.psw, 5);
    mem.interrupts_mut().write_ier(64 / 8, 1 << (64 % 8));
    mem.interrupts_mut().write_ipr(64, 5);
    mem.interrupts_mut().request(64);

    load_program(&mut mem, 0x1000, &[0x03]); // NOP
    cpu.step(&mut mem);
    assert_eq!(cpu.pc, 0x1001);
}

#[test]
fn breakpoint_stops_execution_before_the_instruction_runs() {
    let mut mem = MemoryController::new();
    mem.write32(RESET_VECTOR_ADDR, 0x1000);
    let mut cpu = booted(&mut mem);
    load_program(&mut mem, 0x1000, &[0x03]);
    cpu.add_breakpoint(0x1000);
    let cycles = cpu.step(&mut mem);
    assert_eq!(cycles, 0);
    assert_eq!(cpu.state(), CpuState::Stopped);
}

use chip8_lib::cpu::{Cpu, CpuError};
use chip8_lib::Chip8;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn assemble(program: &[u16]) -> Vec<u8> {
    program.iter().flat_map(|op| op.to_be_bytes()).collect()
}

// Step until PC reaches `addr`, failing after `limit` cycles
fn run_until(cpu: &mut Cpu, addr: u16, limit: usize) {
    for _ in 0..limit {
        if cpu.pc() == addr {
            return;
        }
        cpu.step().expect("step failed");
    }
    panic!("PC never reached {addr:#05X}, stuck at {:#05X}", cpu.pc());
}

#[test]
fn subroutine_sums_one_to_ten() {
    init_logger();
    let rom = assemble(&[
        0x6000, // 200: V0 = 0
        0x610A, // 202: V1 = 10
        0x220E, // 204: CALL 20E
        0x3100, // 206: SE V1, 0
        0x1204, // 208: JP 204
        0x120A, // 20A: JP 20A
        0x0000, // 20C
        0x8014, // 20E: V0 += V1
        0x71FF, // 210: V1 -= 1
        0x00EE, // 212: RET
    ]);
    let mut cpu = Cpu::with_seed(1);
    cpu.load_program(&rom).unwrap();
    run_until(&mut cpu, 0x20A, 1000);

    assert_eq!(cpu.registers()[0], 55);
    assert_eq!(cpu.registers()[1], 0);
    assert_eq!(cpu.stack_depth(), 0);
}

#[test]
fn draws_bcd_digits_with_font() {
    init_logger();
    let rom = assemble(&[
        0x602A, // V0 = 42
        0xA300, // I = 300
        0xF033, // BCD V0
        0xF265, // V0..V2 = [I]
        0x6300, // V3 = 0
        0x6400, // V4 = 0
        0xF129, // I = glyph V1
        0xD345, // DRW V3, V4, 5
        0x7305, // V3 += 5
        0xF229, // I = glyph V2
        0xD345, // DRW V3, V4, 5
        0x1216, // JP 216
    ]);
    let mut cpu = Cpu::with_seed(1);
    cpu.load_program(&rom).unwrap();
    run_until(&mut cpu, 0x216, 100);

    assert_eq!(&cpu.memory()[0x300..0x303], &[0, 4, 2]);
    assert_eq!(cpu.registers()[0xF], 0, "digits do not overlap");

    let text = cpu.display().to_string();
    let rows: Vec<&str> = text.lines().map(str::trim_end).take(6).collect();
    assert_eq!(
        rows,
        vec!["X  X XXXX", "X  X    X", "XXXX XXXX", "   X X", "   X XXXX", ""]
    );
}

#[test]
fn caller_drives_keys_and_redraws() {
    init_logger();
    let rom = assemble(&[
        0xF50A, // 200: wait for key into V5
        0xE59E, // 202: skip if V5 pressed
        0x1200, // 204: JP 200
        0x00E0, // 206: CLS
        0x1208, // 208: JP 208
    ]);
    let mut cpu = Cpu::with_seed(1);
    cpu.load_program(&rom).unwrap();
    assert!(cpu.take_redraw(), "fresh machine asks for a redraw");

    for _ in 0..10 {
        cpu.step().unwrap();
    }
    assert_eq!(cpu.pc(), 0x200);
    assert!(!cpu.needs_redraw());

    cpu.keys_mut().states_mut()[0xE] = true;
    run_until(&mut cpu, 0x208, 10);
    assert_eq!(cpu.registers()[5], 0xE);
    assert!(cpu.take_redraw());
}

#[test]
fn fatal_error_stops_the_driver() {
    init_logger();
    let mut chip8 = Chip8::new();
    // RET with nothing on the stack
    chip8.load_rom(&assemble(&[0x00EE])).unwrap();
    assert_eq!(
        chip8.run_cycles(1),
        Err(CpuError::StackUnderflow { pc: 0x200 })
    );
    assert_eq!(chip8.run_cycles(1), Err(CpuError::Halted));

    // A fresh program clears the halt
    chip8.load_rom(&assemble(&[0x1200])).unwrap();
    chip8.run_cycles(5).unwrap();
}

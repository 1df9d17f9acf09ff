use std::ops::Range;

use log::{debug, error, info, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::display::{DisplayController, PIXEL_COUNT};
use crate::input::InputController;
use crate::opcode::Opcode;

pub const MEMORY_SIZE: usize = 4096;
pub const REGISTER_COUNT: usize = 16;
// Maximum 16 nested subroutines
pub const STACK_SIZE: usize = 16;
// Memory address from where the font is stored
pub const FONT_START_ADDR: usize = 0x000;
pub const FONT_GLYPH_SIZE: usize = 5;
// Programs are loaded above the reserved interpreter area
pub const PROGRAM_START_ADDR: usize = 0x200;
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - PROGRAM_START_ADDR;
// VF doubles as the carry/borrow/collision flag
const FLAG: usize = 0xF;

pub const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

// Error handling
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CpuError {
    #[error("program is {size} bytes, but only {max} bytes of program memory are available")]
    ProgramTooLarge { size: usize, max: usize },
    #[error("attempted to fetch an instruction beyond memory constraints at {pc:#05X}")]
    OutOfBoundsFetch { pc: u16 },
    #[error("encountered unknown opcode {opcode} at {pc:#05X}")]
    UnknownOpcode { opcode: Opcode, pc: u16 },
    #[error("stack nesting limit exceeded at {pc:#05X}")]
    StackOverflow { pc: u16 },
    #[error("attempted to return with an empty stack at {pc:#05X}")]
    StackUnderflow { pc: u16 },
    #[error("memory access at {address:#05X} is out of bounds (instruction at {pc:#05X})")]
    MemoryOutOfBounds { address: u16, pc: u16 },
    #[error("interpreter halted after a fatal error; reset before stepping again")]
    Halted,
}

type Handler = fn(&mut Cpu, Opcode) -> Result<(), CpuError>;

/// Dispatch on the high nibble of the opcode.
const PRIMARY_TABLE: [Handler; 16] = [
    Cpu::exec_system, // 0
    Cpu::jp,          // 1nnn
    Cpu::call,        // 2nnn
    Cpu::se_vx_nn,    // 3xnn
    Cpu::sne_vx_nn,   // 4xnn
    Cpu::se_vx_vy,    // 5xy0
    Cpu::ld_vx_nn,    // 6xnn
    Cpu::add_vx_nn,   // 7xnn
    Cpu::exec_alu,    // 8xyn
    Cpu::sne_vx_vy,   // 9xy0
    Cpu::ld_i,        // Annn
    Cpu::jp_v0,       // Bnnn
    Cpu::rnd,         // Cxnn
    Cpu::drw,         // Dxyn
    Cpu::exec_key,    // Ex__
    Cpu::exec_misc,   // Fx__
];

/// 0x8xyN, indexed by N.
const ALU_TABLE: [Handler; 16] = [
    Cpu::ld_vx_vy,
    Cpu::or,
    Cpu::and,
    Cpu::xor,
    Cpu::add_vx_vy,
    Cpu::sub,
    Cpu::shr,
    Cpu::subn,
    Cpu::unknown,
    Cpu::unknown,
    Cpu::unknown,
    Cpu::unknown,
    Cpu::unknown,
    Cpu::unknown,
    Cpu::shl,
    Cpu::unknown,
];

/// 0x00NN
const SYSTEM_TABLE: [(u8, Handler); 2] = [(0xE0, Cpu::cls), (0xEE, Cpu::ret)];

/// 0xExNN
const KEY_TABLE: [(u8, Handler); 2] = [(0x9E, Cpu::skp), (0xA1, Cpu::sknp)];

/// 0xFxNN
const MISC_TABLE: [(u8, Handler); 9] = [
    (0x07, Cpu::ld_vx_dt),
    (0x0A, Cpu::ld_vx_k),
    (0x15, Cpu::ld_dt_vx),
    (0x18, Cpu::ld_st_vx),
    (0x1E, Cpu::add_i_vx),
    (0x29, Cpu::ld_f_vx),
    (0x33, Cpu::ld_b_vx),
    (0x55, Cpu::ld_mem_vx),
    (0x65, Cpu::ld_vx_mem),
];

/// The CHIP-8 interpreter core: memory, registers, stack, timers, screen and keypad.
pub struct Cpu {
    // Program counter
    pc: u16,
    // Stack pointer; number of return addresses on the stack
    sp: usize,
    // Delay timer
    dt: u8,
    // Sound timer
    st: u8,
    // Index register
    i: u16,
    // General purpose registers
    reg: [u8; REGISTER_COUNT],
    // Memory space; maximum 4KB
    mem: [u8; MEMORY_SIZE],
    // Stack; holds maximum of 16 addresses
    stk: [u16; STACK_SIZE],
    // Display controller
    dct: DisplayController,
    // Input controller, written by the caller between steps
    ict: InputController,
    rng: StdRng,
    // Set by a fatal error, cleared by reset
    halted: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Interpreter whose random opcode produces a reproducible sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let mut ret = Self {
            pc: 0,
            sp: 0,
            dt: 0,
            st: 0,
            i: 0,
            reg: [0; REGISTER_COUNT],
            mem: [0; MEMORY_SIZE],
            stk: [0; STACK_SIZE],
            dct: DisplayController::default(),
            ict: InputController::default(),
            rng,
            halted: false,
        };
        ret.reset();
        ret
    }

    /// Zero the whole machine, map the font to memory and point PC at the program area.
    ///
    /// The redraw flag is left set so the caller presents the blank screen once.
    pub fn reset(&mut self) {
        self.pc = PROGRAM_START_ADDR as u16;
        self.sp = 0;
        self.dt = 0;
        self.st = 0;
        self.i = 0;
        self.reg = [0; REGISTER_COUNT];
        self.mem = [0; MEMORY_SIZE];
        self.stk = [0; STACK_SIZE];
        self.mem[FONT_START_ADDR..FONT_START_ADDR + FONT.len()].copy_from_slice(&FONT);
        self.dct = DisplayController::default();
        self.dct.request_redraw();
        self.ict.clear();
        self.halted = false;
        debug!("interpreter reset");
    }

    /// Reset the machine and copy `program` to 0x200.
    ///
    /// An oversized program is rejected before anything is touched.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), CpuError> {
        if program.len() > MAX_PROGRAM_SIZE {
            return Err(CpuError::ProgramTooLarge {
                size: program.len(),
                max: MAX_PROGRAM_SIZE,
            });
        }
        self.reset();
        self.mem[PROGRAM_START_ADDR..PROGRAM_START_ADDR + program.len()].copy_from_slice(program);
        info!(
            "loaded {} byte program at {PROGRAM_START_ADDR:#05X}",
            program.len()
        );
        Ok(())
    }

    /// Run one fetch, decode, execute and timer cycle.
    ///
    /// Any error is fatal: the interpreter refuses to step again until it is reset.
    pub fn step(&mut self) -> Result<(), CpuError> {
        if self.halted {
            return Err(CpuError::Halted);
        }
        if let Err(e) = self.cycle() {
            error!("halting interpreter: {e}");
            self.halted = true;
            return Err(e);
        }
        Ok(())
    }

    fn cycle(&mut self) -> Result<(), CpuError> {
        let op = self.fetch()?;
        trace!("{:#05X}: {op}", self.pc);
        PRIMARY_TABLE[op.category()](self, op)?;
        // Timers tick once per cycle, even while stalled on a key wait
        self.tick_timers();
        Ok(())
    }

    // Pack two contiguous 8-bit segments in memory into a 16-bit instruction
    fn fetch(&self) -> Result<Opcode, CpuError> {
        let pc = self.pc as usize;
        match (self.mem.get(pc), self.mem.get(pc + 1)) {
            (Some(&high), Some(&low)) => Ok(Opcode::from_bytes(high, low)),
            _ => Err(CpuError::OutOfBoundsFetch { pc: self.pc }),
        }
    }

    fn tick_timers(&mut self) {
        self.dt = self.dt.saturating_sub(1);
        self.st = self.st.saturating_sub(1);
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn index(&self) -> u16 {
        self.i
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.reg
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.mem
    }

    pub fn stack_depth(&self) -> usize {
        self.sp
    }

    pub fn delay_timer(&self) -> u8 {
        self.dt
    }

    /// A frontend should sound a tone while this is non-zero.
    pub fn sound_timer(&self) -> u8 {
        self.st
    }

    pub fn display(&self) -> &DisplayController {
        &self.dct
    }

    pub fn frame_buffer(&self) -> &[u8; PIXEL_COUNT] {
        self.dct.frame_buffer()
    }

    pub fn needs_redraw(&self) -> bool {
        self.dct.needs_redraw()
    }

    /// Read and clear the redraw flag; call once per presented frame.
    pub fn take_redraw(&mut self) -> bool {
        self.dct.take_redraw()
    }

    pub fn keys(&self) -> &InputController {
        &self.ict
    }

    pub fn keys_mut(&mut self) -> &mut InputController {
        &mut self.ict
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    // Advance program counter by 16 bits
    fn next(&mut self) -> Result<(), CpuError> {
        self.pc += 2;
        Ok(())
    }

    // Skip over the following instruction when `cond` holds
    fn skip(&mut self, cond: bool) -> Result<(), CpuError> {
        self.pc += if cond { 4 } else { 2 };
        Ok(())
    }

    // Memory range [I, I + len), provided it lies inside memory
    fn index_range(&self, len: usize) -> Result<Range<usize>, CpuError> {
        let start = self.i as usize;
        let end = start + len;
        if end > MEMORY_SIZE {
            return Err(CpuError::MemoryOutOfBounds {
                address: start.max(MEMORY_SIZE) as u16,
                pc: self.pc,
            });
        }
        Ok(start..end)
    }

    fn dispatch(&mut self, table: &[(u8, Handler)], op: Opcode) -> Result<(), CpuError> {
        match table.iter().find(|(nn, _)| *nn == op.nn()) {
            Some((_, handler)) => handler(self, op),
            None => self.unknown(op),
        }
    }

    fn exec_system(&mut self, op: Opcode) -> Result<(), CpuError> {
        // 0nnn machine code routines are not supported
        if op.x() != 0 {
            return self.unknown(op);
        }
        self.dispatch(&SYSTEM_TABLE, op)
    }

    fn exec_alu(&mut self, op: Opcode) -> Result<(), CpuError> {
        ALU_TABLE[op.n() as usize](self, op)
    }

    fn exec_key(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.dispatch(&KEY_TABLE, op)
    }

    fn exec_misc(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.dispatch(&MISC_TABLE, op)
    }

    fn unknown(&mut self, op: Opcode) -> Result<(), CpuError> {
        Err(CpuError::UnknownOpcode {
            opcode: op,
            pc: self.pc,
        })
    }

    /// Opcode 0x00E0 - CLS
    ///
    /// Clears the screen.
    fn cls(&mut self, _op: Opcode) -> Result<(), CpuError> {
        self.dct.clear_screen();
        self.next()
    }

    /// Opcode 0x00EE - RET
    ///
    /// Pops the return address, which points at the calling instruction,
    /// then continues after it.
    fn ret(&mut self, _op: Opcode) -> Result<(), CpuError> {
        if self.sp == 0 {
            return Err(CpuError::StackUnderflow { pc: self.pc });
        }
        self.sp -= 1;
        debug!("return from {:#05X} to {:#05X}", self.pc, self.stk[self.sp]);
        self.pc = self.stk[self.sp];
        self.next()
    }

    /// Opcode 0x1nnn - JP
    fn jp(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.pc = op.nnn();
        Ok(())
    }

    /// Opcode 0x2nnn - CALL
    ///
    /// Puts the current PC on the top of the stack, then sets PC to nnn.
    fn call(&mut self, op: Opcode) -> Result<(), CpuError> {
        if self.sp >= STACK_SIZE {
            return Err(CpuError::StackOverflow { pc: self.pc });
        }
        self.stk[self.sp] = self.pc;
        self.sp += 1;
        debug!("call {:#05X} from {:#05X}", op.nnn(), self.pc);
        self.pc = op.nnn();
        Ok(())
    }

    /// Opcode 0x3xnn - SE Vx, nn
    fn se_vx_nn(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.skip(self.reg[op.x()] == op.nn())
    }

    /// Opcode 0x4xnn - SNE Vx, nn
    fn sne_vx_nn(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.skip(self.reg[op.x()] != op.nn())
    }

    /// Opcode 0x5xy0 - SE Vx, Vy
    fn se_vx_vy(&mut self, op: Opcode) -> Result<(), CpuError> {
        if op.n() != 0 {
            return self.unknown(op);
        }
        self.skip(self.reg[op.x()] == self.reg[op.y()])
    }

    /// Opcode 0x6xnn - LD Vx, nn
    fn ld_vx_nn(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.reg[op.x()] = op.nn();
        self.next()
    }

    /// Opcode 0x7xnn - ADD Vx, nn
    ///
    /// Wraps around without touching VF.
    fn add_vx_nn(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.reg[op.x()] = self.reg[op.x()].wrapping_add(op.nn());
        self.next()
    }

    /// Opcode 0x8xy0 - LD Vx, Vy
    fn ld_vx_vy(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.reg[op.x()] = self.reg[op.y()];
        self.next()
    }

    /// Opcode 0x8xy1 - OR Vx, Vy
    fn or(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.reg[op.x()] |= self.reg[op.y()];
        self.next()
    }

    /// Opcode 0x8xy2 - AND Vx, Vy
    fn and(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.reg[op.x()] &= self.reg[op.y()];
        self.next()
    }

    /// Opcode 0x8xy3 - XOR Vx, Vy
    fn xor(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.reg[op.x()] ^= self.reg[op.y()];
        self.next()
    }

    /// Opcode 0x8xy4 - ADD Vx, Vy
    ///
    /// VF = 1 on carry. The flag is written last, so it wins when x is F.
    fn add_vx_vy(&mut self, op: Opcode) -> Result<(), CpuError> {
        let (sum, carry) = self.reg[op.x()].overflowing_add(self.reg[op.y()]);
        self.reg[op.x()] = sum;
        self.reg[FLAG] = carry as u8;
        self.next()
    }

    /// Opcode 0x8xy5 - SUB Vx, Vy
    ///
    /// Vx = Vx - Vy, VF = 1 when there is no borrow.
    fn sub(&mut self, op: Opcode) -> Result<(), CpuError> {
        let (vx, vy) = (self.reg[op.x()], self.reg[op.y()]);
        self.reg[op.x()] = vx.wrapping_sub(vy);
        self.reg[FLAG] = (vx >= vy) as u8;
        self.next()
    }

    /// Opcode 0x8xy6 - SHR Vx
    fn shr(&mut self, op: Opcode) -> Result<(), CpuError> {
        let vx = self.reg[op.x()];
        self.reg[op.x()] = vx >> 1;
        self.reg[FLAG] = vx & 0x01;
        self.next()
    }

    /// Opcode 0x8xy7 - SUBN Vx, Vy
    ///
    /// Vx = Vy - Vx, VF = 1 when there is no borrow.
    fn subn(&mut self, op: Opcode) -> Result<(), CpuError> {
        let (vx, vy) = (self.reg[op.x()], self.reg[op.y()]);
        self.reg[op.x()] = vy.wrapping_sub(vx);
        self.reg[FLAG] = (vy >= vx) as u8;
        self.next()
    }

    /// Opcode 0x8xyE - SHL Vx
    fn shl(&mut self, op: Opcode) -> Result<(), CpuError> {
        let vx = self.reg[op.x()];
        self.reg[op.x()] = vx << 1;
        self.reg[FLAG] = vx >> 7;
        self.next()
    }

    /// Opcode 0x9xy0 - SNE Vx, Vy
    fn sne_vx_vy(&mut self, op: Opcode) -> Result<(), CpuError> {
        if op.n() != 0 {
            return self.unknown(op);
        }
        self.skip(self.reg[op.x()] != self.reg[op.y()])
    }

    /// Opcode 0xAnnn - LD I, nnn
    fn ld_i(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.i = op.nnn();
        self.next()
    }

    /// Opcode 0xBnnn - JP V0, nnn
    fn jp_v0(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.pc = op.nnn() + self.reg[0] as u16;
        Ok(())
    }

    /// Opcode 0xCxnn - RND Vx, nn
    fn rnd(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.reg[op.x()] = self.rng.gen::<u8>() & op.nn();
        self.next()
    }

    /// Opcode 0xDxyn - DRW Vx, Vy, n
    ///
    /// XORs the n-byte sprite at I onto the screen at (Vx, Vy).
    /// VF = 1 if any lit pixel was erased.
    fn drw(&mut self, op: Opcode) -> Result<(), CpuError> {
        let rows = self.index_range(op.n() as usize)?;
        let (x, y) = (self.reg[op.x()] as usize, self.reg[op.y()] as usize);
        let collision = self.dct.draw_sprite(x, y, &self.mem[rows]);
        self.reg[FLAG] = collision as u8;
        self.next()
    }

    /// Opcode 0xEx9E - SKP Vx
    fn skp(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.skip(self.ict.key_pressed(self.reg[op.x()]))
    }

    /// Opcode 0xExA1 - SKNP Vx
    fn sknp(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.skip(!self.ict.key_pressed(self.reg[op.x()]))
    }

    /// Opcode 0xFx07 - LD Vx, DT
    fn ld_vx_dt(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.reg[op.x()] = self.dt;
        self.next()
    }

    /// Opcode 0xFx0A - LD Vx, K
    ///
    /// Stalls on this instruction until a key is down, then stores the lowest one.
    fn ld_vx_k(&mut self, op: Opcode) -> Result<(), CpuError> {
        match self.ict.first_pressed() {
            Some(key) => {
                debug!("key {key:X} ended wait at {:#05X}", self.pc);
                self.reg[op.x()] = key;
                self.next()
            }
            None => Ok(()),
        }
    }

    /// Opcode 0xFx15 - LD DT, Vx
    fn ld_dt_vx(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.dt = self.reg[op.x()];
        self.next()
    }

    /// Opcode 0xFx18 - LD ST, Vx
    fn ld_st_vx(&mut self, op: Opcode) -> Result<(), CpuError> {
        self.st = self.reg[op.x()];
        self.next()
    }

    /// Opcode 0xFx1E - ADD I, Vx
    ///
    /// VF = 1 when the sum leaves the 12-bit address space; I keeps the low 12 bits.
    fn add_i_vx(&mut self, op: Opcode) -> Result<(), CpuError> {
        let sum = self.i as u32 + self.reg[op.x()] as u32;
        self.i = (sum & 0x0FFF) as u16;
        self.reg[FLAG] = (sum > 0x0FFF) as u8;
        self.next()
    }

    /// Opcode 0xFx29 - LD F, Vx
    fn ld_f_vx(&mut self, op: Opcode) -> Result<(), CpuError> {
        let digit = (self.reg[op.x()] & 0x0F) as usize;
        self.i = (FONT_START_ADDR + digit * FONT_GLYPH_SIZE) as u16;
        self.next()
    }

    /// Opcode 0xFx33 - LD B, Vx
    ///
    /// Hundreds, tens and ones of Vx go to I, I + 1 and I + 2.
    fn ld_b_vx(&mut self, op: Opcode) -> Result<(), CpuError> {
        let bcd = self.index_range(3)?;
        let vx = self.reg[op.x()];
        self.mem[bcd].copy_from_slice(&[vx / 100, (vx / 10) % 10, vx % 10]);
        self.next()
    }

    /// Opcode 0xFx55 - LD [I], Vx
    ///
    /// Stores V0..=Vx at I, then advances I past them.
    fn ld_mem_vx(&mut self, op: Opcode) -> Result<(), CpuError> {
        let count = op.x() + 1;
        let dst = self.index_range(count)?;
        self.mem[dst].copy_from_slice(&self.reg[..count]);
        self.i += count as u16;
        self.next()
    }

    /// Opcode 0xFx65 - LD Vx, [I]
    ///
    /// Loads V0..=Vx from I, then advances I past them.
    fn ld_vx_mem(&mut self, op: Opcode) -> Result<(), CpuError> {
        let count = op.x() + 1;
        let src = self.index_range(count)?;
        self.reg[..count].copy_from_slice(&self.mem[src]);
        self.i += count as u16;
        self.next()
    }
}

use std::fmt;

use log::{debug, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    disasm,
    display::Framebuffer,
    errors::CoreError,
    globals::{
        AUDIO_PATTERN_LEN, DEBUG_ASM, DEBUG_DRAW, DEBUG_KEYS, DEBUG_STATE, FLAG_REG_COUNT,
        LORES_HEIGHT, LORES_WIDTH, PROGRAM_ADDR, QUIRK_CLIP, QUIRK_JUMP, QUIRK_LOAD_STORE,
        QUIRK_LOGIC, QUIRK_SHIFT, QUIRK_VF_ORDER, RAM_SIZE, REG_COUNT, SCREEN_HEIGHT,
        SCREEN_WIDTH, STACK_DEPTH, XO_RAM_SIZE,
    },
    memory::Memory,
    utils::{nibbles, u16_from_three, u8_from_two},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Chip8,
    Schip,
    XoChip,
}

impl Platform {
    pub fn mem_size(self) -> usize {
        match self {
            Platform::XoChip => XO_RAM_SIZE,
            _ => RAM_SIZE,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Platform::Chip8 => "chip8",
            Platform::Schip => "schip",
            Platform::XoChip => "xochip",
        })
    }
}

/// What one `step` did. `Unsupported` means the opcode was not recognized
/// for the active platform; PC has still advanced past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Exit,
    Unsupported,
}

/// The host side of the machine: key state and the one-shot sound signals.
/// The sound sink keeps its own phase.
pub trait HostIo {
    fn pressed(&self, key: u8) -> bool;
    fn start_sound(&mut self) {}
    fn stop_sound(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyWait {
    None,
    AwaitPress { dest: usize },
    AwaitRelease { dest: usize, key: u8 },
}

/// The fetch-decode-execute engine. Owns registers, timers, the key-wait
/// latch and the framebuffer; memory and host IO are passed into `step`.
pub struct Cpu {
    platform: Platform,
    quirks: u32,
    debug: u32,
    v: [u8; REG_COUNT],
    flags: [u8; FLAG_REG_COUNT],
    stack: Vec<u16>,
    i: u16,
    pc: u16,
    dt: u8,
    st: u8,
    extended: bool,
    planes: u8,
    audio_pattern: [u8; AUDIO_PATTERN_LEN],
    framebuffer: Framebuffer,
    rng: StdRng,
    key_wait: KeyWait,
    clock: u64,
}

impl Cpu {
    pub fn new(platform: Platform, quirks: u32) -> Self {
        Cpu {
            platform,
            quirks,
            debug: 0,
            v: [0; REG_COUNT],
            flags: [0; FLAG_REG_COUNT],
            stack: Vec::with_capacity(STACK_DEPTH),
            i: 0,
            pc: PROGRAM_ADDR,
            dt: 0,
            st: 0,
            extended: false,
            planes: 0b01,
            audio_pattern: [0; AUDIO_PATTERN_LEN],
            framebuffer: Framebuffer::new(),
            rng: StdRng::from_entropy(),
            key_wait: KeyWait::None,
            clock: 0,
        }
    }

    /// Pins the CXNN stream, mainly so tests can assert on it.
    pub fn set_rng_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn set_debug(&mut self, mask: u32) {
        self.debug = mask;
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn framebuffer_mut(&mut self) -> &mut Framebuffer {
        &mut self.framebuffer
    }

    /// Checks and clears the framebuffer dirty flag.
    pub fn take_redraw(&mut self) -> bool {
        self.framebuffer.take_dirty()
    }

    /// The 16 bytes most recently captured by F002.
    pub fn audio_pattern(&self) -> &[u8; AUDIO_PATTERN_LEN] {
        &self.audio_pattern
    }

    /// 60 Hz field tick: decrements the timers, raising the stop-sound
    /// signal when ST runs out. Independent of the key-wait state.
    pub fn tick(&mut self, io: &mut impl HostIo) {
        if self.dt > 0 {
            self.dt -= 1;
        }
        if self.st > 0 {
            self.st -= 1;
            if self.st == 0 {
                io.stop_sound();
            }
        }
    }

    /// Executes at most one instruction. During a key wait this only polls
    /// the keys and consumes nothing.
    pub fn step(&mut self, memory: &mut Memory, io: &mut impl HostIo) -> Result<StepOutcome, CoreError> {
        match self.key_wait {
            KeyWait::AwaitPress { dest } => {
                if let Some(key) = (0..16).find(|&k| io.pressed(k)) {
                    if self.debug & DEBUG_KEYS != 0 {
                        debug!(target: "ocho::keys", "key {key:X} down, waiting for release");
                    }
                    self.key_wait = KeyWait::AwaitRelease { dest, key };
                }
                return Ok(StepOutcome::Continue);
            }
            KeyWait::AwaitRelease { dest, key } => {
                if io.pressed(key) {
                    return Ok(StepOutcome::Continue);
                }
                if self.debug & DEBUG_KEYS != 0 {
                    debug!(target: "ocho::keys", "key wait over");
                }
                self.v[dest] = key;
                self.key_wait = KeyWait::None;
            }
            KeyWait::None => {}
        }

        let word = memory.read_word(self.pc)?;
        let (a, x, y, n) = nibbles(word);
        let nn = u8_from_two(y, n);
        let nnn = u16_from_three(x, y, n);
        let vx = x as usize;
        let vy = y as usize;

        if self.debug & DEBUG_STATE != 0 {
            debug!(
                target: "ocho::state",
                "clk:{} pc:{:04X} i:{:04X} v:{:02X?}",
                self.clock, self.pc, self.i, self.v
            );
        }
        if self.debug & DEBUG_ASM != 0 {
            let word_after = memory.read_word(self.pc.wrapping_add(2)).unwrap_or(0);
            debug!(target: "ocho::asm", "{}", disasm::disassemble(self.pc, word, word_after));
        }

        let mut next_pc = self.pc.wrapping_add(self.insn_size(memory, self.pc)?);
        let mut outcome = StepOutcome::Continue;

        match (a, x, y, n) {
            (0x0, 0x0, 0xC, n) => {
                // scroll down n
                if self.platform != Platform::Chip8 {
                    self.framebuffer.scroll(0, n as i32);
                } else {
                    outcome = self.unsupported(word, Some(Platform::Schip));
                }
            }
            (0x0, 0x0, 0xD, n) => {
                // scroll up n
                if self.platform == Platform::XoChip {
                    self.framebuffer.scroll(0, -(n as i32));
                } else {
                    outcome = self.unsupported(word, Some(Platform::XoChip));
                }
            }
            (0x0, 0x0, 0xE, 0x0) => {
                let planes = match self.platform {
                    Platform::XoChip => self.planes,
                    _ => 0b11,
                };
                self.framebuffer.clear(planes);
            }
            (0x0, 0x0, 0xE, 0xE) => {
                next_pc = self.stack.pop().ok_or(CoreError::StackUnderflow)?;
            }
            (0x0, 0x0, 0xF, 0xB) => {
                // scroll right 4
                if self.platform != Platform::Chip8 {
                    self.framebuffer.scroll(4, 0);
                } else {
                    outcome = self.unsupported(word, Some(Platform::Schip));
                }
            }
            (0x0, 0x0, 0xF, 0xC) => {
                // scroll left 4
                if self.platform != Platform::Chip8 {
                    self.framebuffer.scroll(-4, 0);
                } else {
                    outcome = self.unsupported(word, Some(Platform::Schip));
                }
            }
            (0x0, 0x0, 0xF, 0xD) => {
                if self.platform != Platform::Chip8 {
                    outcome = StepOutcome::Exit;
                } else {
                    outcome = self.unsupported(word, Some(Platform::Schip));
                }
            }
            (0x0, 0x0, 0xF, 0xE) => {
                if self.platform != Platform::Chip8 {
                    self.extended = false;
                } else {
                    outcome = self.unsupported(word, Some(Platform::Schip));
                }
            }
            (0x0, 0x0, 0xF, 0xF) => {
                if self.platform != Platform::Chip8 {
                    self.extended = true;
                } else {
                    outcome = self.unsupported(word, Some(Platform::Schip));
                }
            }
            (0x0, _, _, _) => outcome = self.unsupported(word, None),
            (0x1, _, _, _) => next_pc = nnn,
            (0x2, _, _, _) => {
                if self.stack.len() >= STACK_DEPTH {
                    return Err(CoreError::StackOverflow(STACK_DEPTH));
                }
                self.stack.push(next_pc);
                next_pc = nnn;
            }
            (0x3, _, _, _) => {
                if self.v[vx] == nn {
                    next_pc = next_pc.wrapping_add(self.insn_size(memory, next_pc)?);
                }
            }
            (0x4, _, _, _) => {
                if self.v[vx] != nn {
                    next_pc = next_pc.wrapping_add(self.insn_size(memory, next_pc)?);
                }
            }
            (0x5, _, _, 0x0) => {
                if self.v[vx] == self.v[vy] {
                    next_pc = next_pc.wrapping_add(self.insn_size(memory, next_pc)?);
                }
            }
            (0x5, _, _, 0x2) => {
                // save VX..VY (inclusive, either direction) at I
                if self.platform == Platform::XoChip {
                    for k in 0..=vx.abs_diff(vy) {
                        let r = if vx <= vy { vx + k } else { vx - k };
                        memory.write(self.i.wrapping_add(k as u16), self.v[r])?;
                    }
                } else {
                    outcome = self.unsupported(word, Some(Platform::XoChip));
                }
            }
            (0x5, _, _, 0x3) => {
                // load VX..VY from I
                if self.platform == Platform::XoChip {
                    for k in 0..=vx.abs_diff(vy) {
                        let r = if vx <= vy { vx + k } else { vx - k };
                        self.v[r] = memory.read(self.i.wrapping_add(k as u16))?;
                    }
                } else {
                    outcome = self.unsupported(word, Some(Platform::XoChip));
                }
            }
            (0x5, _, _, _) => outcome = self.unsupported(word, None),
            (0x6, _, _, _) => self.v[vx] = nn,
            (0x7, _, _, _) => self.v[vx] = self.v[vx].wrapping_add(nn),
            (0x8, _, _, op) => {
                let (a_val, b_val) = (self.v[vx], self.v[vy]);
                match op {
                    0x0 => self.v[vx] = b_val,
                    0x1 => {
                        self.v[vx] |= b_val;
                        if self.quirks & QUIRK_LOGIC != 0 {
                            self.v[0xF] = 0;
                        }
                    }
                    0x2 => {
                        self.v[vx] &= b_val;
                        if self.quirks & QUIRK_LOGIC != 0 {
                            self.v[0xF] = 0;
                        }
                    }
                    0x3 => {
                        self.v[vx] ^= b_val;
                        if self.quirks & QUIRK_LOGIC != 0 {
                            self.v[0xF] = 0;
                        }
                    }
                    0x4 => {
                        let (result, carry) = a_val.overflowing_add(b_val);
                        self.store_alu(vx, result, carry);
                    }
                    0x5 => {
                        self.store_alu(vx, a_val.wrapping_sub(b_val), a_val >= b_val);
                    }
                    0x6 => {
                        let src = if self.quirks & QUIRK_SHIFT != 0 { a_val } else { b_val };
                        self.store_alu(vx, src >> 1, src & 0x01 != 0);
                    }
                    0x7 => {
                        self.store_alu(vx, b_val.wrapping_sub(a_val), b_val >= a_val);
                    }
                    0xE => {
                        let src = if self.quirks & QUIRK_SHIFT != 0 { a_val } else { b_val };
                        self.store_alu(vx, src << 1, src & 0x80 != 0);
                    }
                    _ => outcome = self.unsupported(word, None),
                }
            }
            (0x9, _, _, 0x0) => {
                if self.v[vx] != self.v[vy] {
                    next_pc = next_pc.wrapping_add(self.insn_size(memory, next_pc)?);
                }
            }
            (0x9, _, _, _) => outcome = self.unsupported(word, None),
            (0xA, _, _, _) => self.i = nnn,
            (0xB, _, _, _) => {
                next_pc = if self.quirks & QUIRK_JUMP != 0 {
                    (nnn & 0xFF)
                        .wrapping_add(self.v[vx] as u16)
                        .wrapping_add((x as u16) << 8)
                } else {
                    nnn.wrapping_add(self.v[0] as u16)
                };
            }
            (0xC, _, _, _) => self.v[vx] = self.rng.gen::<u8>() & nn,
            (0xD, _, _, n) => self.draw_sprite(memory, vx, vy, n)?,
            (0xE, _, 0x9, 0xE) => {
                if io.pressed(self.v[vx] & 0x0F) {
                    if self.debug & DEBUG_KEYS != 0 {
                        debug!(target: "ocho::keys", "clk:{} pc:{:04X} key {:X} down, skipping", self.clock, self.pc, self.v[vx]);
                    }
                    next_pc = next_pc.wrapping_add(self.insn_size(memory, next_pc)?);
                }
            }
            (0xE, _, 0xA, 0x1) => {
                if !io.pressed(self.v[vx] & 0x0F) {
                    next_pc = next_pc.wrapping_add(self.insn_size(memory, next_pc)?);
                }
            }
            (0xE, _, _, _) => outcome = self.unsupported(word, None),
            (0xF, 0x0, 0x0, 0x0) => {
                // F000 NNNN: 16-bit load of I from the trailing word
                if self.platform == Platform::XoChip {
                    self.i = memory.read_word(self.pc.wrapping_add(2))?;
                } else {
                    outcome = self.unsupported(word, Some(Platform::XoChip));
                }
            }
            (0xF, planes, 0x0, 0x1) => {
                if self.platform == Platform::XoChip {
                    self.planes = planes & 0b11;
                } else {
                    outcome = self.unsupported(word, Some(Platform::XoChip));
                }
            }
            (0xF, 0x0, 0x0, 0x2) => {
                // capture the 16-byte audio pattern at I
                if self.platform == Platform::XoChip {
                    for k in 0..AUDIO_PATTERN_LEN {
                        self.audio_pattern[k] = memory.read(self.i.wrapping_add(k as u16))?;
                    }
                } else {
                    outcome = self.unsupported(word, Some(Platform::XoChip));
                }
            }
            (0xF, _, 0x0, 0x7) => self.v[vx] = self.dt,
            (0xF, _, 0x0, 0xA) => {
                if self.debug & DEBUG_KEYS != 0 {
                    debug!(target: "ocho::keys", "waiting for key into v{vx:X}");
                }
                self.key_wait = KeyWait::AwaitPress { dest: vx };
            }
            (0xF, _, 0x1, 0x5) => self.dt = self.v[vx],
            (0xF, _, 0x1, 0x8) => {
                self.st = self.v[vx];
                if self.st > 0 {
                    io.start_sound();
                }
            }
            (0xF, _, 0x1, 0xE) => self.i = self.i.wrapping_add(self.v[vx] as u16),
            (0xF, _, 0x2, 0x9) => self.i = memory.digit_address(self.v[vx]),
            (0xF, _, 0x3, 0x0) => {
                if self.platform != Platform::Chip8 {
                    self.i = memory.large_digit_address(self.v[vx]);
                } else {
                    outcome = self.unsupported(word, Some(Platform::Schip));
                }
            }
            (0xF, _, 0x3, 0x3) => {
                let value = self.v[vx];
                memory.write(self.i, value / 100)?;
                memory.write(self.i.wrapping_add(1), value % 100 / 10)?;
                memory.write(self.i.wrapping_add(2), value % 10)?;
            }
            (0xF, _, 0x5, 0x5) => {
                for k in 0..=vx {
                    memory.write(self.i.wrapping_add(k as u16), self.v[k])?;
                }
                if self.quirks & QUIRK_LOAD_STORE == 0 {
                    self.i = self.i.wrapping_add(vx as u16 + 1);
                }
            }
            (0xF, _, 0x6, 0x5) => {
                for k in 0..=vx {
                    self.v[k] = memory.read(self.i.wrapping_add(k as u16))?;
                }
                if self.quirks & QUIRK_LOAD_STORE == 0 {
                    self.i = self.i.wrapping_add(vx as u16 + 1);
                }
            }
            (0xF, _, 0x7, 0x5) => {
                if self.platform != Platform::Chip8 {
                    for k in 0..=vx.min(FLAG_REG_COUNT - 1) {
                        self.flags[k] = self.v[k];
                    }
                } else {
                    outcome = self.unsupported(word, Some(Platform::Schip));
                }
            }
            (0xF, _, 0x8, 0x5) => {
                if self.platform != Platform::Chip8 {
                    for k in 0..=vx.min(FLAG_REG_COUNT - 1) {
                        self.v[k] = self.flags[k];
                    }
                } else {
                    outcome = self.unsupported(word, Some(Platform::Schip));
                }
            }
            (0xF, _, _, _) => outcome = self.unsupported(word, None),
            // nibbles() yields 0..=15, but the compiler cannot see that
            _ => outcome = self.unsupported(word, None),
        }

        self.pc = next_pc;
        self.clock += 1;
        Ok(outcome)
    }

    /// 2 bytes, or 4 when the word at `addr` is the xochip extended-load
    /// prefix. Skips consult this so they always clear a whole instruction.
    fn insn_size(&self, memory: &Memory, addr: u16) -> Result<u16, CoreError> {
        if self.platform == Platform::XoChip && memory.read_word(addr)? == 0xF000 {
            Ok(4)
        } else {
            Ok(2)
        }
    }

    /// Writes an ALU result and its flag, in the order the VF_ORDER quirk
    /// dictates. With the quirk, a destination of VF keeps the result;
    /// without it, VF keeps the flag.
    fn store_alu(&mut self, dest: usize, result: u8, flag: bool) {
        if self.quirks & QUIRK_VF_ORDER != 0 {
            self.v[0xF] = flag as u8;
            self.v[dest] = result;
        } else {
            self.v[dest] = result;
            self.v[0xF] = flag as u8;
        }
    }

    fn draw_sprite(&mut self, memory: &Memory, vx: usize, vy: usize, n: u8) -> Result<(), CoreError> {
        self.v[0xF] = 0;
        let (width, height, scale) = if self.extended {
            (SCREEN_WIDTH, SCREEN_HEIGHT, 1)
        } else {
            (LORES_WIDTH, LORES_HEIGHT, 2)
        };
        let (rows, row_bytes) = if self.extended && n == 0 {
            (16, 2)
        } else {
            (n as usize, 1)
        };
        let origin_x = self.v[vx] as usize % width;
        let origin_y = self.v[vy] as usize % height;

        // xochip sprite layout: the plane-0 block first, then the plane-1
        // block for the same sprite, each consumed only if its plane is on
        let mut addr = self.i;
        let mut erased = false;
        for plane in 0..2u8 {
            let mask = 1 << plane;
            if self.planes & mask == 0 {
                continue;
            }
            for row in 0..rows {
                for byte_index in 0..row_bytes {
                    let byte = memory.read(addr)?;
                    addr = addr.wrapping_add(1);
                    for bit in 0..8usize {
                        if byte & (0x80 >> bit) == 0 {
                            continue;
                        }
                        let col = byte_index * 8 + bit;
                        if self.quirks & QUIRK_CLIP != 0
                            && (origin_x + col >= width || origin_y + row >= height)
                        {
                            continue;
                        }
                        let px = (origin_x + col) % width;
                        let py = (origin_y + row) % height;
                        if self.debug & DEBUG_DRAW != 0 {
                            debug!(target: "ocho::draw", "draw {px} {py} plane {mask}");
                        }
                        for grid_y in 0..scale {
                            for grid_x in 0..scale {
                                erased |= self
                                    .framebuffer
                                    .xor_plane(px * scale + grid_x, py * scale + grid_y, mask);
                            }
                        }
                    }
                }
            }
        }
        self.v[0xF] = erased as u8;
        Ok(())
    }

    fn unsupported(&self, word: u16, hint: Option<Platform>) -> StepOutcome {
        match hint {
            Some(platform) => warn!(
                target: "ocho::insn",
                "{:04X}: unsupported instruction {word:04X} - does this ROM require the \"{platform}\" platform?",
                self.pc
            ),
            None => warn!(
                target: "ocho::insn",
                "{:04X}: unsupported instruction {word:04X}",
                self.pc
            ),
        }
        StepOutcome::Unsupported
    }
}

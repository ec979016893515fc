pub const RAM_SIZE: usize = 4096;
pub const XO_RAM_SIZE: usize = 65536;
pub const STACK_DEPTH: usize = 16;
pub const REG_COUNT: usize = 16;
pub const FLAG_REG_COUNT: usize = 8;

pub const PROGRAM_ADDR: u16 = 0x200;

pub const SCREEN_WIDTH: usize = 128;
pub const SCREEN_HEIGHT: usize = 64;
pub const LORES_WIDTH: usize = 64;
pub const LORES_HEIGHT: usize = 32;

pub const AUDIO_PATTERN_LEN: usize = 16;

// QUIRKS
pub const QUIRK_SHIFT: u32 = 0x01; // shift VX instead of VY
pub const QUIRK_LOAD_STORE: u32 = 0x02; // FX55/FX65 leave I unchanged
pub const QUIRK_JUMP: u32 = 0x04; // BNNN reads VX, X doubles as address high nybble
pub const QUIRK_CLIP: u32 = 0x08; // sprites clip at the screen edge instead of wrapping
pub const QUIRK_VF_ORDER: u32 = 0x10; // VF is written before VX in flag-setting ALU ops
pub const QUIRK_LOGIC: u32 = 0x20; // VF is cleared after OR/AND/XOR

// DEBUG FLAGS
pub const DEBUG_STATE: u32 = 0x01;
pub const DEBUG_ASM: u32 = 0x02;
pub const DEBUG_DRAW: u32 = 0x04;
pub const DEBUG_STRICT_INSN: u32 = 0x08;
pub const DEBUG_KEYS: u32 = 0x10;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use ocho_core::{
    globals::{
        DEBUG_ASM, DEBUG_DRAW, DEBUG_KEYS, DEBUG_STATE, DEBUG_STRICT_INSN, QUIRK_CLIP, QUIRK_JUMP,
        QUIRK_LOAD_STORE, QUIRK_LOGIC, QUIRK_SHIFT, QUIRK_VF_ORDER, SCREEN_HEIGHT, SCREEN_WIDTH,
    },
    Platform, Rgb,
};

#[derive(Parser)]
#[command(name = "ocho", version, about = "CHIP-8 / SUPER-CHIP 1.1 / XO-CHIP emulator")]
pub struct Args {
    /// Program image, loaded at 0x200
    pub rom: PathBuf,

    /// Interpreter steps per 60 Hz field
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..))]
    pub rate: u32,

    /// Palette override: a color index (0-3) and a RRGGBB hex value
    #[arg(long, num_args = 2, value_names = ["INDEX", "RRGGBB"], action = clap::ArgAction::Append)]
    pub color: Vec<String>,

    #[arg(long, value_enum, default_value = "chip8")]
    pub platform: PlatformArg,

    /// Enable a platform quirk (repeatable)
    #[arg(long = "quirk", value_enum)]
    pub quirks: Vec<QuirkArg>,

    /// Screen rotation in degrees, applied at render time only
    #[arg(long, value_enum, default_value = "0")]
    pub rotation: RotationArg,

    /// Enable a diagnostic (repeatable); "insn" stops on unsupported opcodes
    #[arg(long = "debug", value_enum)]
    pub debug: Vec<DebugArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    Chip8,
    Schip,
    Xochip,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Platform {
        match arg {
            PlatformArg::Chip8 => Platform::Chip8,
            PlatformArg::Schip => Platform::Schip,
            PlatformArg::Xochip => Platform::XoChip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QuirkArg {
    Shift,
    Loadstore,
    Jump,
    Clip,
    Vforder,
    Logic,
}

pub fn quirk_mask(quirks: &[QuirkArg]) -> u32 {
    quirks.iter().fold(0, |mask, quirk| {
        mask | match quirk {
            QuirkArg::Shift => QUIRK_SHIFT,
            QuirkArg::Loadstore => QUIRK_LOAD_STORE,
            QuirkArg::Jump => QUIRK_JUMP,
            QuirkArg::Clip => QUIRK_CLIP,
            QuirkArg::Vforder => QUIRK_VF_ORDER,
            QuirkArg::Logic => QUIRK_LOGIC,
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DebugArg {
    State,
    Asm,
    Draw,
    Insn,
    Keys,
}

pub fn debug_mask(flags: &[DebugArg]) -> u32 {
    flags.iter().fold(0, |mask, flag| {
        mask | match flag {
            DebugArg::State => DEBUG_STATE,
            DebugArg::Asm => DEBUG_ASM,
            DebugArg::Draw => DEBUG_DRAW,
            DebugArg::Insn => DEBUG_STRICT_INSN,
            DebugArg::Keys => DEBUG_KEYS,
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RotationArg {
    #[value(name = "0")]
    R0,
    #[value(name = "90")]
    R90,
    #[value(name = "180")]
    R180,
    #[value(name = "270")]
    R270,
}

impl RotationArg {
    /// Frame dimensions after rotation, in framebuffer cells.
    pub fn frame_size(self) -> (usize, usize) {
        match self {
            RotationArg::R0 | RotationArg::R180 => (SCREEN_WIDTH, SCREEN_HEIGHT),
            RotationArg::R90 | RotationArg::R270 => (SCREEN_HEIGHT, SCREEN_WIDTH),
        }
    }

    /// Initial window size; the sideways orientations open at half scale.
    pub fn window_size(self) -> (usize, usize) {
        let (width, height) = self.frame_size();
        let scale = match self {
            RotationArg::R0 | RotationArg::R180 => 8,
            RotationArg::R90 | RotationArg::R270 => 4,
        };
        (width * scale, height * scale)
    }
}

/// Parses the flattened `--color K RRGGBB` pairs.
pub fn parse_colors(raw: &[String]) -> anyhow::Result<Vec<(usize, Rgb)>> {
    raw.chunks(2)
        .map(|pair| {
            let index: usize = pair[0]
                .parse()
                .with_context(|| format!("bad color index \"{}\"", pair[0]))?;
            if index > 3 {
                bail!("color index {index} out of range 0-3");
            }
            let packed = u32::from_str_radix(&pair[1], 16)
                .with_context(|| format!("bad color value \"{}\"", pair[1]))?;
            if packed > 0xFF_FFFF {
                bail!("color value \"{}\" does not fit 24 bits", pair[1]);
            }
            Ok((index, Rgb::from_u32(packed)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["ocho", "game.ch8"]).unwrap();
        assert!(args.rate == 7);
        assert!(args.platform == PlatformArg::Chip8);
        assert!(args.rotation == RotationArg::R0);
        assert!(args.quirks.is_empty());
    }

    #[test]
    fn rate_must_be_positive() {
        assert!(Args::try_parse_from(["ocho", "--rate", "0", "game.ch8"]).is_err());
    }

    #[test]
    fn quirks_accumulate() {
        let args = Args::try_parse_from([
            "ocho", "--quirk", "shift", "--quirk", "loadstore", "game.ch8",
        ])
        .unwrap();
        assert!(quirk_mask(&args.quirks) == (QUIRK_SHIFT | QUIRK_LOAD_STORE));
    }

    #[test]
    fn debug_flags_accumulate() {
        let args =
            Args::try_parse_from(["ocho", "--debug", "asm", "--debug", "insn", "game.ch8"]).unwrap();
        assert!(debug_mask(&args.debug) == (DEBUG_ASM | DEBUG_STRICT_INSN));
    }

    #[test]
    fn rotation_is_given_in_degrees() {
        let args = Args::try_parse_from(["ocho", "--rotation", "270", "game.ch8"]).unwrap();
        assert!(args.rotation == RotationArg::R270);
        assert!(args.rotation.frame_size() == (64, 128));
        assert!(Args::try_parse_from(["ocho", "--rotation", "45", "game.ch8"]).is_err());
    }

    #[test]
    fn color_pairs_parse() {
        let args = Args::try_parse_from([
            "ocho", "--color", "0", "102030", "--color", "3", "FF7F50", "game.ch8",
        ])
        .unwrap();
        let colors = parse_colors(&args.color).unwrap();
        assert!(colors == vec![(0, Rgb::new(0x10, 0x20, 0x30)), (3, Rgb::new(0xFF, 0x7F, 0x50))]);
    }

    #[test]
    fn bad_colors_are_rejected() {
        assert!(parse_colors(&["4".into(), "000000".into()]).is_err());
        assert!(parse_colors(&["0".into(), "redish".into()]).is_err());
        assert!(parse_colors(&["0".into(), "1234567".into()]).is_err());
    }
}

//! Catalog launcher: turns a JSON program catalog entry into an `ocho`
//! command line. With no program selected it lists the catalog.

use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use clap::Parser;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "ocho-launch", version, about = "catalog launcher for the ocho emulator")]
struct Args {
    /// Program catalog (JSON)
    catalog: PathBuf,

    /// Directory holding the .ch8 program images
    roms_dir: Option<PathBuf>,

    /// Catalog key of the program to run; omit to list the catalog
    program: Option<String>,
}

type Catalog = BTreeMap<String, Entry>;

#[derive(Debug, Deserialize)]
struct Entry {
    title: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    options: Options,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Options {
    tickrate: Option<IntOrString>,
    background_color: Option<String>,
    fill_color: Option<String>,
    fill_color2: Option<String>,
    blend_color: Option<String>,
    screen_rotation: Option<u32>,
    shift_quirks: Option<Toggle>,
    load_store_quirks: Option<Toggle>,
    logic_quirks: Option<Toggle>,
    vf_order_quirks: Option<Toggle>,
    clip_quirks: Option<Toggle>,
    jump_quirks: Option<Toggle>,
}

/// Catalogs write tickrates both as integers and as decimal strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(u32),
    Str(String),
}

impl IntOrString {
    fn value(&self) -> anyhow::Result<u32> {
        match self {
            IntOrString::Int(n) => Ok(*n),
            IntOrString::Str(s) => s.parse().with_context(|| format!("bad tickrate \"{s}\"")),
        }
    }
}

/// Booleans appear as true/false or as 0/1 integers.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Toggle {
    Bool(bool),
    Int(i64),
}

impl Toggle {
    fn is_set(self) -> bool {
        match self {
            Toggle::Bool(b) => b,
            Toggle::Int(n) => n != 0,
        }
    }
}

fn enabled(toggle: &Option<Toggle>) -> bool {
    toggle.map(Toggle::is_set).unwrap_or(false)
}

/// The CSS color names catalogs actually use.
const COLORS_BY_NAME: [(&str, u32); 13] = [
    ("aquamarine", 0x7FFFD4),
    ("black", 0x000000),
    ("coral", 0xFF7F50),
    ("deeppink", 0xFF1493),
    ("gray", 0x808080),
    ("hotpink", 0xFF69B4),
    ("lavender", 0xE6E6FA),
    ("lightcyan", 0xE0FFFF),
    ("lightgray", 0xD3D3D3),
    ("navy", 0x000080),
    ("powderblue", 0xB0E0E6),
    ("red", 0xFF0000),
    ("white", 0xFFFFFF),
];

/// 12-bit #RGB colors expand by nibble duplication.
fn expand_12_bit(color: u32) -> u32 {
    let r = (color & 0xF00) >> 8;
    let g = (color & 0x0F0) >> 4;
    let b = color & 0x00F;
    (r << 20 | r << 16) | (g << 12 | g << 8) | (b << 4 | b)
}

/// Accepts a CSS name from the table, #RRGGBB, #RGB, or bare hex, and
/// renders the six hex digits the emulator's --color flag takes.
fn to_hex_color(name: &str) -> anyhow::Result<String> {
    let color = if let Some(digits) = name.strip_prefix('#') {
        let color = u32::from_str_radix(digits, 16)
            .with_context(|| format!("bad color \"{name}\""))?;
        if digits.len() <= 3 {
            expand_12_bit(color)
        } else {
            color
        }
    } else if let Ok(color) = u32::from_str_radix(name, 16) {
        if name.len() <= 3 {
            expand_12_bit(color)
        } else {
            color
        }
    } else {
        COLORS_BY_NAME
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, color)| *color)
            .with_context(|| format!("unknown color \"{name}\""))?
    };
    Ok(format!("{color:06x}"))
}

/// Translates one catalog entry into emulator arguments, ending with the
/// program image path.
fn emulator_args(key: &str, entry: &Entry, roms_dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut args: Vec<String> = Vec::new();

    match entry.platform.as_deref() {
        Some("schip") => args.extend(["--platform".into(), "schip".into()]),
        Some("xochip") => args.extend(["--platform".into(), "xochip".into()]),
        _ => {}
    }

    let options = &entry.options;
    if let Some(tickrate) = &options.tickrate {
        args.extend(["--rate".into(), tickrate.value()?.to_string()]);
    }

    let palette = [
        (0, &options.background_color),
        (1, &options.fill_color),
        (2, &options.fill_color2),
        (3, &options.blend_color),
    ];
    for (index, color) in palette {
        if let Some(color) = color {
            args.extend(["--color".into(), index.to_string(), to_hex_color(color)?]);
        }
    }

    if let Some(rotation) = options.screen_rotation {
        args.extend(["--rotation".into(), rotation.to_string()]);
    }

    let quirks = [
        ("shift", &options.shift_quirks),
        ("loadstore", &options.load_store_quirks),
        ("logic", &options.logic_quirks),
        ("vforder", &options.vf_order_quirks),
        ("clip", &options.clip_quirks),
        ("jump", &options.jump_quirks),
    ];
    for (name, toggle) in quirks {
        if enabled(toggle) {
            args.extend(["--quirk".into(), name.into()]);
        }
    }

    args.push(roms_dir.join(format!("{key}.ch8")).display().to_string());
    Ok(args)
}

fn list_catalog(catalog: &Catalog) {
    let width = catalog.keys().map(String::len).max().unwrap_or(0);
    for (key, entry) in catalog {
        println!("{key:>width$} : {}", entry.title);
        println!("{:>width$}   {}", "", entry.desc);
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let file = File::open(&args.catalog)
        .with_context(|| format!("could not open {}", args.catalog.display()))?;
    let catalog: Catalog = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("could not parse {}", args.catalog.display()))?;

    let (roms_dir, program) = match (&args.roms_dir, &args.program) {
        (Some(roms_dir), Some(program)) => (roms_dir, program),
        _ => {
            list_catalog(&catalog);
            return Ok(());
        }
    };

    let entry = match catalog.get(program) {
        Some(entry) => entry,
        None => bail!("unknown program \"{program}\""),
    };

    let mut command = vec!["ocho".to_string()];
    command.extend(emulator_args(program, entry, roms_dir)?);
    println!("{}", command.join(" "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_and_hex_colors() {
        assert!(to_hex_color("coral").unwrap() == "ff7f50");
        assert!(to_hex_color("#FF1493").unwrap() == "ff1493");
        assert!(to_hex_color("102030").unwrap() == "102030");
        assert!(to_hex_color("no-such-color").is_err());
    }

    #[test]
    fn short_colors_expand_by_nibble() {
        assert!(to_hex_color("#a5f").unwrap() == "aa55ff");
        assert!(to_hex_color("f0f").unwrap() == "ff00ff");
    }

    #[test]
    fn toggles_accept_bools_and_ints() {
        let options: Options = serde_json::from_str(
            r#"{"shiftQuirks": true, "clipQuirks": 1, "jumpQuirks": 0, "logicQuirks": false}"#,
        )
        .unwrap();
        assert!(enabled(&options.shift_quirks));
        assert!(enabled(&options.clip_quirks));
        assert!(!enabled(&options.jump_quirks));
        assert!(!enabled(&options.logic_quirks));
        assert!(!enabled(&options.vf_order_quirks));
    }

    #[test]
    fn entry_translates_to_flags() {
        let entry: Entry = serde_json::from_str(
            r##"{
                "title": "An Evening to Die For",
                "desc": "survival horror",
                "platform": "xochip",
                "options": {
                    "tickrate": "200",
                    "backgroundColor": "#112233",
                    "fillColor": "white",
                    "screenRotation": 90,
                    "shiftQuirks": 1,
                    "loadStoreQuirks": true
                }
            }"##,
        )
        .unwrap();
        let args = emulator_args("evening", &entry, Path::new("roms")).unwrap();
        assert!(
            args == [
                "--platform", "xochip",
                "--rate", "200",
                "--color", "0", "112233",
                "--color", "1", "ffffff",
                "--rotation", "90",
                "--quirk", "shift",
                "--quirk", "loadstore",
                "roms/evening.ch8",
            ]
        );
    }

    #[test]
    fn minimal_entry_is_just_the_image_path() {
        let entry: Entry =
            serde_json::from_str(r#"{"title": "Pong", "platform": "chip8"}"#).unwrap();
        let args = emulator_args("pong", &entry, Path::new("roms")).unwrap();
        assert!(args == ["roms/pong.ch8"]);
    }

    #[test]
    fn string_tickrate_must_be_numeric() {
        let entry: Entry = serde_json::from_str(
            r#"{"title": "x", "options": {"tickrate": "fast"}}"#,
        )
        .unwrap();
        assert!(emulator_args("x", &entry, Path::new("roms")).is_err());
    }
}

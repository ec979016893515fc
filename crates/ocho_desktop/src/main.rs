mod args;
mod audio;

use std::{
    fs, thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use log::info;
use minifb::{Key, Window, WindowOptions};

use ocho_core::{
    globals::DEBUG_STRICT_INSN, Cpu, Framebuffer, HostIo, Memory, StepOutcome,
};

use crate::args::{Args, RotationArg};

const FIELD: Duration = Duration::from_nanos(16_666_667);

/// The reference keypad layout: 1234/QWER/ASDF/ZXCV on the left of the
/// keyboard map to the 4x4 hex pad.
const KEYMAP: [(Key, usize); 16] = [
    (Key::Key1, 0x1),
    (Key::Key2, 0x2),
    (Key::Key3, 0x3),
    (Key::Key4, 0xC),
    (Key::Q, 0x4),
    (Key::W, 0x5),
    (Key::E, 0x6),
    (Key::R, 0xD),
    (Key::A, 0x7),
    (Key::S, 0x8),
    (Key::D, 0x9),
    (Key::F, 0xE),
    (Key::Z, 0xA),
    (Key::X, 0x0),
    (Key::C, 0xB),
    (Key::V, 0xF),
];

struct DesktopIo {
    keys: [bool; 16],
    beeper: Option<audio::Beeper>,
}

impl DesktopIo {
    fn poll(&mut self, window: &Window) {
        for (key, index) in KEYMAP {
            self.keys[index] = window.is_key_down(key);
        }
    }
}

impl HostIo for DesktopIo {
    fn pressed(&self, key: u8) -> bool {
        self.keys[key as usize & 0xF]
    }

    fn start_sound(&mut self) {
        if let Some(beeper) = &mut self.beeper {
            beeper.start();
        }
    }

    fn stop_sound(&mut self) {
        if let Some(beeper) = &mut self.beeper {
            beeper.stop();
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let platform = args.platform.into();
    let quirks = args::quirk_mask(&args.quirks);
    let debug = args::debug_mask(&args.debug);
    let strict = debug & DEBUG_STRICT_INSN != 0;

    let image = fs::read(&args.rom)
        .with_context(|| format!("could not read {}", args.rom.display()))?;
    let mut memory = Memory::new(platform);
    memory.load_program(&image)?;

    let mut cpu = Cpu::new(platform, quirks);
    cpu.set_debug(debug);
    for (index, color) in args::parse_colors(&args.color)? {
        cpu.framebuffer_mut().set_color(index, color);
    }

    let title = args
        .rom
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ocho".into());
    let (window_width, window_height) = args.rotation.window_size();
    let mut window = Window::new(
        &title,
        window_width,
        window_height,
        WindowOptions {
            resize: true,
            ..WindowOptions::default()
        },
    )
    .map_err(|err| anyhow!("could not open the display window: {err}"))?;

    let mut io = DesktopIo {
        keys: [false; 16],
        beeper: audio::Beeper::detect(),
    };

    let (frame_width, frame_height) = args.rotation.frame_size();
    let mut frame = vec![0u32; frame_width * frame_height];

    info!("running {title} as {platform}, {} steps per field", args.rate);

    let mut field_start = Instant::now();
    while window.is_open() && !window.is_key_down(Key::Escape) {
        io.poll(&window);

        for _ in 0..args.rate {
            match cpu.step(&mut memory, &mut io)? {
                StepOutcome::Continue => {}
                StepOutcome::Exit => {
                    info!("program requested exit");
                    return Ok(());
                }
                StepOutcome::Unsupported => {
                    if strict {
                        bail!("stopped on an unsupported instruction");
                    }
                }
            }
        }

        let elapsed = field_start.elapsed();
        if elapsed < FIELD {
            thread::sleep(FIELD - elapsed);
        }
        field_start = Instant::now();

        if cpu.take_redraw() {
            render(cpu.framebuffer(), args.rotation, &mut frame);
            window
                .update_with_buffer(&frame, frame_width, frame_height)
                .map_err(|err| anyhow!("could not present the framebuffer: {err}"))?;
        } else {
            window.update();
        }
        cpu.tick(&mut io);
    }
    Ok(())
}

/// Rasterizes the framebuffer into a 0RGB frame, rotated for presentation.
fn render(fb: &Framebuffer, rotation: RotationArg, frame: &mut [u32]) {
    let palette = fb.palette().map(|c| {
        ((c.r as u32) << 16) | ((c.g as u32) << 8) | c.b as u32
    });
    let (width, height) = rotation.frame_size();
    for fy in 0..height {
        for fx in 0..width {
            let cell = match rotation {
                RotationArg::R0 => fb.cell(fx, fy),
                RotationArg::R90 => fb.cell(fy, 63 - fx),
                RotationArg::R180 => fb.cell(127 - fx, 63 - fy),
                RotationArg::R270 => fb.cell(127 - fy, fx),
            };
            frame[fy * width + fx] = palette[cell as usize & 0x3];
        }
    }
}

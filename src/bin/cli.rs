//! modport CLI: song summary, exports and headless playback.
//!
//! Usage:
//!   mp-cli path/to/file.mod
//!   mp-cli path/to/file.mod --midi song.mid --sf2 song.sf2 --wav song.wav
//!   mp-cli path/to/file.mod --legacy
//!
//! With no export flags the song is played on the default output device.

use mp_ir::RowStatus;
use mp_master::{Controller, FormatVariant, MidiOptions, SoundFontOptions};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::env;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: mp-cli <file.mod> [--midi out.mid] [--sf2 out.sf2] [--wav out.wav] [--legacy]";

struct Args {
    path: String,
    midi: Option<String>,
    sf2: Option<String>,
    wav: Option<String>,
    legacy: bool,
}

impl Args {
    fn parse(args: &[String]) -> Option<Self> {
        let flag_value = |name: &str| {
            args.iter()
                .position(|a| a == name)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };
        let path = args.get(1).filter(|a| !a.starts_with("--"))?.clone();
        Some(Self {
            path,
            midi: flag_value("--midi"),
            sf2: flag_value("--sf2"),
            wav: flag_value("--wav"),
            legacy: args.iter().any(|a| a == "--legacy"),
        })
    }

    fn exports(&self) -> bool {
        self.midi.is_some() || self.sf2.is_some() || self.wav.is_some()
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw: Vec<String> = env::args().collect();
    let args = Args::parse(&raw).unwrap_or_else(|| {
        eprintln!("{USAGE}");
        std::process::exit(1);
    });

    tracing::debug!(path = %args.path, legacy = args.legacy, "reading module");
    let data = fs::read(&args.path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", args.path, e);
        std::process::exit(1);
    });

    let mut ctrl = Controller::new();
    let loaded = if args.legacy {
        ctrl.load_as(&data, FormatVariant::Legacy)
    } else {
        ctrl.load(&data)
    };
    if let Err(e) = loaded {
        eprintln!("Failed to parse {}: {}", args.path, e);
        std::process::exit(1);
    }

    print_summary(&ctrl);

    if args.exports() {
        if let Some(path) = &args.midi {
            export(path, |out| ctrl.write_midi(out, &MidiOptions::default()));
        }
        if let Some(path) = &args.sf2 {
            export(path, |out| ctrl.write_soundfont(out, &SoundFontOptions::default()));
        }
        if let Some(path) = &args.wav {
            let sample_rate: u32 = 44100;
            let max_seconds: u32 = 600;
            println!("Rendering to {} at {} Hz...", path, sample_rate);
            export(path, |out| ctrl.write_rendered_wav(out, sample_rate, max_seconds));
        }
    } else {
        play_audio(&mut ctrl);
    }
}

fn print_summary(ctrl: &Controller) {
    let Some(module) = ctrl.module() else {
        return;
    };
    println!("Title:    {}", module.song_name);
    println!("Layout:   {:?}", module.variant);
    println!("Orders:   {}", module.song_length);
    println!("Patterns: {}", module.pattern_count());
    println!("Samples:  {} (with data)", module.used_sample_count());
    for (index, sample) in module.audio_samples().filter(|(_, s)| !s.is_empty()) {
        println!(
            "  {:02X} {:<22} {:>6} bytes{}",
            index,
            sample.name,
            sample.size_in_bytes,
            if sample.is_looped() { "  loop" } else { "" }
        );
    }
    println!();
}

fn export(path: &str, write: impl FnOnce(&mut BufWriter<File>) -> mp_master::Result<()>) {
    let written = File::create(path)
        .map_err(mp_master::Error::from)
        .and_then(|file| write(&mut BufWriter::new(file)));
    match written {
        Ok(()) => println!("Wrote {}", path),
        Err(e) => {
            eprintln!("Failed to write {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn play_audio(ctrl: &mut Controller) {
    if let Err(e) = ctrl.play() {
        eprintln!("Failed to start playback: {}", e);
        std::process::exit(1);
    }
    println!("Playing...");
    println!();

    let mut shown = None;
    while ctrl.is_playing() {
        if let (Some(pos), Some(module)) = (ctrl.position(), ctrl.module()) {
            if shown != Some(pos) {
                shown = Some(pos);
                if let Some(cells) = module.row_cells(pos.order as usize, pos.row as usize) {
                    let status = RowStatus { order: pos.order, row: pos.row, cells: *cells };
                    print!("\r{status}");
                    let _ = std::io::stdout().flush();
                }
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    println!();
    println!("Done.");
}

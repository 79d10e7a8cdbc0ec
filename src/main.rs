// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};

use retimer::audio::sample_source::FileDecoder;
use retimer::config::load_render_config;
use retimer::loader::load_buffer;
use retimer::render::render;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Periodically injects silence, noise or a sample in time with a transport."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Renders a scripted session to a WAV file.
    Render {
        /// The path to the render config.
        config_path: PathBuf,
        /// Where to write the rendered audio.
        output_path: PathBuf,
    },
    /// Decodes a file and prints what it becomes at the given rate.
    Inspect {
        /// The audio file to inspect.
        path: PathBuf,
        /// The host sample rate to resample to.
        #[arg(short, long, default_value_t = 48000)]
        sample_rate: u32,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            config_path,
            output_path,
        } => {
            let config = load_render_config(&config_path)?;
            let rendered = render(&config, &FileDecoder)?;
            rendered.write_wav(&output_path)?;

            println!(
                "Rendered {} frames to {}.",
                rendered.frames(),
                output_path.display()
            );
            println!("Triggers (count: {}):", rendered.report.triggers.len());
            for trigger in rendered.report.triggers.iter() {
                println!("- {:.3}s", trigger);
            }
            if !rendered.report.discontinuities.is_empty() {
                println!(
                    "Transport discontinuities (count: {}):",
                    rendered.report.discontinuities.len()
                );
                for position in rendered.report.discontinuities.iter() {
                    println!("- {:.3}s", position);
                }
            }
        }
        Commands::Inspect { path, sample_rate } => {
            let buffer = load_buffer(&FileDecoder, &path, sample_rate)?;
            println!("{}:", path.display());
            println!("  Channels: {}", buffer.channel_count());
            println!("  Frames: {}", buffer.frame_count());
            println!("  Sample rate: {}", buffer.sample_rate());
            println!("  Duration: {:.3}s", buffer.duration_seconds());
        }
    }

    Ok(())
}

use anyhow::Result;
use clap::Parser;
use log::info;
use rand::{RngCore, SeedableRng};
use std::path::PathBuf;
use tmntrando::patch::{Rom, make_rom};
use tmntrando::settings::{VERSION, load_randomizer_settings};
use tmntrando_game::GameData;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    input_rom: PathBuf,

    #[arg(long)]
    output_rom: Option<PathBuf>,

    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    random_seed: Option<usize>,

    #[arg(long)]
    output_spoiler_log: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    info!("TMNT entrance randomizer version {VERSION}");
    let settings = load_randomizer_settings(args.settings.as_deref())?;
    let game_data = GameData::load(&args.data_dir)?;

    let seed = match args.random_seed {
        Some(s) => s,
        None => (rand::rngs::StdRng::from_entropy().next_u64() & 0xFFFFFFFF) as usize,
    };
    info!("Random seed: {seed}");

    let input_rom = Rom::load(&args.input_rom)?;
    let (output_rom, randomization) = make_rom(&input_rom, &game_data, &settings, seed)?;

    // Save the outputs:
    if let Some(output_rom_path) = &args.output_rom {
        println!("Writing output ROM to {}", output_rom_path.display());
        output_rom.save(output_rom_path)?;
    }

    if let Some(output_spoiler_log_path) = &args.output_spoiler_log {
        println!(
            "Writing spoiler log to {}",
            output_spoiler_log_path.display()
        );
        let spoiler_str = serde_json::to_string_pretty(&randomization.spoiler_log)?;
        std::fs::write(output_spoiler_log_path, spoiler_str)?;
    }

    Ok(())
}

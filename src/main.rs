use std::path::PathBuf;

use clap::Parser;
use dicom_volume4d::{Processor, VolumeLoader};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the multi-frame 3D DICOM file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Extract frames on a thread pool of this size (0 = one per core)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Print the timestamp of every frame
    #[arg(long)]
    frame_times: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Cli::parse();
    let processor = match args.threads {
        Some(threads) => Processor::Parallel { threads },
        None => Processor::CPU,
    };

    let volume = VolumeLoader::load_from_file(&args.input, processor)?;

    let (frames, columns, rows, slices) = volume.dim();
    println!("shape (frames, columns, rows, slices): ({frames}, {columns}, {rows}, {slices})");
    let [dx, dy, dz] = volume.spacing();
    println!("spacing (mm): [{dx}, {dy}, {dz}]");

    if args.frame_times {
        for (index, time) in volume.frame_times().iter().enumerate() {
            println!("frame {index}: {time:.4} s");
        }
    }

    Ok(())
}

use std::path::PathBuf;
use clap::Parser;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use mr_data::convert::convert_physio;

/// Convert PhysioMRI data to ISMRMRD
#[derive(clap::Parser,Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PhysioMRI MAT file to read
    input:PathBuf,
    /// ISMRMRD file to write: an HDF5 data set for `.h5`, otherwise a message stream
    output:PathBuf,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let n = convert_physio(&args.input,&args.output)?;
    info!("wrote {} acquisitions to {}",n,args.output.display());
    Ok(())
}

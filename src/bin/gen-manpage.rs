//! Writes `mspflash.1` into the directory given as the first argument
//! (default `man`)

use clap::CommandFactory;
use std::path::PathBuf;

#[path = "../cli.rs"]
mod cli;

fn main() -> std::io::Result<()> {
    let output_dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "man".into()));
    std::fs::create_dir_all(&output_dir)?;

    let mut page = Vec::new();
    clap_mangen::Man::new(cli::Cli::command()).render(&mut page)?;

    let path = output_dir.join("mspflash.1");
    std::fs::write(&path, page)?;
    println!("{}", path.display());
    Ok(())
}

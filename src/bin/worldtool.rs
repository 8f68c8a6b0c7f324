//! Diagnostic tool for world-map save files.
//!
//! `dump` prints the decoded document tree, `verify` checks the
//! decode → encode round trip byte-for-byte, `terrain` summarizes a terrain
//! grid file. Set `RUST_LOG=worldfile=warn` to see degraded-decode reports.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use worldfile::{decode_world, encode_world, LeafValue, TerrainGrid, Tree};

#[derive(Parser)]
#[command(name = "worldtool", about = "Inspect and verify world-map save files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the decoded document tree
    Dump { file: PathBuf },
    /// Decode, re-encode and compare byte-for-byte
    Verify { file: PathBuf },
    /// Summarize a terrain grid file
    Terrain { file: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Dump { file } => {
            let data = std::fs::read(&file)?;
            let tree = decode_world(&data)?;
            print_tree(&tree);
        }
        Command::Verify { file } => {
            let data = std::fs::read(&file)?;
            let tree = decode_world(&data)?;
            let out = encode_world(&tree)?;
            if out == data {
                println!("OK: {} bytes round-trip identically", data.len());
            } else {
                let first = data
                    .iter()
                    .zip(&out)
                    .position(|(a, b)| a != b)
                    .unwrap_or(data.len().min(out.len()));
                println!(
                    "MISMATCH: input {} bytes, output {} bytes, first difference at offset {first}",
                    data.len(),
                    out.len()
                );
                std::process::exit(1);
            }
        }
        Command::Terrain { file } => {
            let data = std::fs::read(&file)?;
            let grid = TerrainGrid::decode(&data)?;
            let (min, max) = grid.height_range();
            println!(
                "{}x{} cells, stretch {}, offset ({}, {}), texture {:?}",
                grid.width, grid.height, grid.stretch, grid.offset_x, grid.offset_y, grid.texture
            );
            println!("height range {min}..{max}");
        }
    }
    Ok(())
}

fn print_tree(tree: &Tree) {
    tree.walk(
        tree.root(),
        &mut |t, node, depth| {
            println!("{:indent$}{}", "", t.name(node), indent = depth * 2);
        },
        &mut |_, _, leaf, depth| {
            let value = match &leaf.value {
                LeafValue::Byte(v) => format!("{v}"),
                LeafValue::Int32(v) => format!("{v}"),
                LeafValue::Single(v) => format!("{} ({:#010x})", v.to_f32(), v.0),
                LeafValue::Str { value, .. } => format!("{value:?}"),
                LeafValue::Bytes(v) => format!("<{} bytes>", v.len()),
                LeafValue::Void => "<void>".into(),
            };
            println!("{:indent$}- {} = {value}", "", leaf.name, indent = depth * 2 + 2);
        },
    );
}

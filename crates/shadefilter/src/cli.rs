use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "shadefilter",
    author,
    version,
    about = "Show a PNG through a pass-through or box-blur GPU filter"
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile and link the shaders and decode the image without opening a window.
    Check(AssetArgs),
}

/// Where the image, shaders, and optional config file come from.
#[derive(Args, Debug, Clone, Default)]
pub struct AssetArgs {
    /// PNG image to display.
    #[arg(value_name = "IMAGE")]
    pub image: Option<PathBuf>,

    /// TOML file with window, asset, and filter settings.
    #[arg(long, value_name = "FILE", env = "SHADEFILTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Vertex shader source (defaults to the bundled `filter.vert`).
    #[arg(long, value_name = "FILE")]
    pub vertex: Option<PathBuf>,

    /// Fragment shader source (defaults to the bundled `filter.frag`).
    #[arg(long, value_name = "FILE")]
    pub fragment: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub assets: AssetArgs,

    /// Initial window size in logical pixels.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Initial blur radius.
    #[arg(long, value_name = "N")]
    pub radius: Option<i32>,

    /// Start with the blurred image shown.
    #[arg(long)]
    pub filtered: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(spec: &str) -> Result<(u32, u32), String> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_owned())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{width}' in size specification"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{height}' in size specification"))?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_owned());
    }
    Ok((width, height))
}

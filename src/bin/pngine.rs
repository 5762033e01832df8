//! pngine CLI - PNG inspection and recompression tool.
//!
//! Prints information about a PNG, or decodes and re-encodes it with
//! the library's own compression stack.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use pngine::{
    decode_with_state, encode_with_state, inspect, ColorType, FilterStrategy, State,
};

/// Inspect or recompress PNG files with a self-contained codec.
#[derive(Parser, Debug)]
#[command(name = "pngine")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input PNG file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file; when omitted, only file information is printed
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Filter selection strategy
    #[arg(long, value_enum, default_value = "minsum")]
    filter: FilterArg,

    /// LZ77 window size (power of two, up to 32768)
    #[arg(long, default_value = "2048")]
    window: usize,

    /// Keep the input's color mode instead of choosing the smallest one
    #[arg(long)]
    no_auto_convert: bool,

    /// Write Adam7 interlaced output
    #[arg(long)]
    interlace: bool,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FilterArg {
    /// Always filter type 0
    Zero,
    /// Smallest sum of absolute residuals per row
    Minsum,
    /// Lowest byte-histogram entropy per row
    Entropy,
}

impl From<FilterArg> for FilterStrategy {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Zero => FilterStrategy::Zero,
            FilterArg::Minsum => FilterStrategy::Minsum,
            FilterArg::Entropy => FilterStrategy::Entropy,
        }
    }
}

fn colortype_name(colortype: ColorType) -> &'static str {
    match colortype {
        ColorType::Grey => "grayscale",
        ColorType::Rgb => "RGB",
        ColorType::Palette => "palette",
        ColorType::GreyAlpha => "grayscale+alpha",
        ColorType::Rgba => "RGBA",
    }
}

fn run(args: &Args) -> Result<(), String> {
    let input = fs::read(&args.input)
        .map_err(|e| format!("cannot read {}: {e}", args.input.display()))?;

    let (w, h, info) = inspect(&input).map_err(|e| e.to_string())?;
    println!(
        "{}: {}x{}, {} {}-bit{}{}",
        args.input.display(),
        w,
        h,
        colortype_name(info.color.colortype),
        info.color.bitdepth,
        if info.color.colortype == ColorType::Palette {
            ", PLTE"
        } else {
            ""
        },
        if info.interlace == 1 {
            ", Adam7 interlaced"
        } else {
            ""
        },
    );

    let Some(output) = &args.output else {
        return Ok(());
    };

    let start = Instant::now();
    let mut state = State::new();
    let image = decode_with_state(&input, &mut state).map_err(|e| e.to_string())?;
    let decode_time = start.elapsed();

    let mut out_state = State::new();
    out_state.info_raw = state.info_raw.clone();
    out_state.encoder.filter_strategy = args.filter.into();
    out_state.encoder.zlib.windowsize = args.window;
    out_state.encoder.auto_convert = !args.no_auto_convert;
    if args.no_auto_convert {
        out_state.info_png.color = state.info_png.color.clone();
    }
    if args.interlace {
        out_state.info_png.interlace = 1;
    }

    let start = Instant::now();
    let png =
        encode_with_state(&image.pixels, image.width, image.height, &out_state)
            .map_err(|e| e.to_string())?;
    let encode_time = start.elapsed();

    fs::write(output, &png).map_err(|e| format!("cannot write {}: {e}", output.display()))?;

    let ratio = png.len() as f64 / input.len() as f64 * 100.0;
    println!(
        "{}: {} -> {} bytes ({:.1}%)",
        output.display(),
        input.len(),
        png.len(),
        ratio
    );
    if args.verbose {
        println!(
            "decode {:.1} ms, encode {:.1} ms",
            decode_time.as_secs_f64() * 1000.0,
            encode_time.as_secs_f64() * 1000.0
        );
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

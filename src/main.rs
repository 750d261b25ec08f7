use fitload::decode::{write_png, SUPPORTED_EXTENSIONS};
use fitload::loader::{collect_paths, load_path, LoadOptions};
use fitload::{FitMode, SampleStrategy, ViewportSize};
use std::env;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;

fn print_help() {
    println!("Usage: fitload [options] <file>... | fitload [options] <directory>");
    println!("  Supported formats: {}", SUPPORTED_EXTENSIONS.join(", "));
    println!();
    println!("Options:");
    println!("  -h, --help     Show this help message");
    println!("  -W <px>        Viewport width (default 1080)");
    println!("  -H <px>        Viewport height (default 1920)");
    println!("  --pow2         Pick power-of-two sample factors from the smaller viewport side");
    println!("  --fit <mode>   Fit after decoding: rect, scale, width, height, fill");
    println!("  -o <dir>       Write each upright image as PNG into <dir>");
    println!("  -v             Debug logging (RUST_LOG overrides)");
}

struct Config {
    options: LoadOptions,
    out_dir: Option<PathBuf>,
    verbose: bool,
    files: Vec<String>,
}

fn parse_dim(flag: &str, value: Option<String>) -> Result<u32, String> {
    let value = value.ok_or_else(|| format!("{} needs a value", flag))?;
    value
        .parse::<u32>()
        .map_err(|_| format!("{}: '{}' is not a pixel count", flag, value))
}

fn parse_args(args: Vec<String>) -> Result<Config, String> {
    let mut width = ViewportSize::DEFAULT.width();
    let mut height = ViewportSize::DEFAULT.height();
    let mut strategy = SampleStrategy::Ladder;
    let mut fit = None;
    let mut out_dir = None;
    let mut verbose = false;
    let mut files = Vec::new();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-W" => width = parse_dim("-W", iter.next())?,
            "-H" => height = parse_dim("-H", iter.next())?,
            "--pow2" => strategy = SampleStrategy::PowerOfTwo,
            "--fit" => {
                let mode = iter.next().ok_or("--fit needs a mode")?;
                fit = Some(mode.parse::<FitMode>()?);
            }
            "-o" => out_dir = Some(PathBuf::from(iter.next().ok_or("-o needs a directory")?)),
            "-v" => verbose = true,
            _ => files.push(arg),
        }
    }

    let viewport = ViewportSize::new(width, height).map_err(|e| e.to_string())?;
    Ok(Config {
        options: LoadOptions {
            viewport,
            strategy,
            fit,
        },
        out_dir,
        verbose,
        files,
    })
}

fn output_path(out_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    out_dir.join(format!("{}.png", stem))
}

/// Load one file, print its summary line and optionally write it out.
fn process_file(path: &Path, config: &Config) -> Result<(), String> {
    let loaded = load_path(path, &config.options).map_err(|e| e.to_string())?;
    let Some(loaded) = loaded else {
        println!("{}: not enough memory, skipped", path.display());
        return Ok(());
    };

    let (w, h) = loaded.pixels.dimensions();
    println!(
        "{}: natural {}x{}, orientation {:?}, sample 1/{}, output {}x{}",
        path.display(),
        loaded.natural.width(),
        loaded.natural.height(),
        loaded.orientation,
        loaded.sample.get(),
        w,
        h
    );

    if let Some(dir) = &config.out_dir {
        let out = output_path(dir, path);
        let file = File::create(&out)
            .map_err(|e| format!("Failed to create {}: {}", out.display(), e))?;
        write_png(loaded.pixels, BufWriter::new(file)).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        print_help();
        process::exit(1);
    }

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        process::exit(0);
    }

    let config = match parse_args(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let default_level = if config.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if config.files.is_empty() {
        eprintln!("Error: no image files specified");
        process::exit(1);
    }

    let paths = collect_paths(&config.files);
    if paths.is_empty() {
        eprintln!("Error: no supported image files found");
        process::exit(1);
    }

    if let Some(dir) = &config.out_dir {
        if let Err(e) = fs::create_dir_all(dir) {
            eprintln!("Error: cannot create {}: {}", dir.display(), e);
            process::exit(1);
        }
    }

    let mut failed = 0;
    for path in &paths {
        if let Err(e) = process_file(path, &config) {
            eprintln!("Error: {}", e);
            failed += 1;
        }
    }

    if failed > 0 {
        process::exit(1);
    }
}

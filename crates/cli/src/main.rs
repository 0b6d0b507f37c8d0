//! ductus-trace - Trace the drawing calls of a PDF content stream
//!
//! Interprets a raw content stream against an empty resource dictionary
//! and prints every call the interpreter makes on its drawing surface, as
//! text or JSON lines.

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, ValueEnum};
use ductus_core::codec::decode_filters;
use ductus_core::model::objects::dict_from;
use ductus_core::parser::ContentLexer;
use ductus_core::{
    ObjectStore, PDFDict, PDFObject, PageInterpreter, RecordingSurface, RenderOptions,
    ResourceManager,
};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Output format for traced calls.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// One call per line (default)
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Trace the drawing calls of a PDF content stream.
#[derive(Parser, Debug)]
#[command(name = "ductus-trace")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a content stream, or "-" for stdin
    file: PathBuf,

    /// Page width in points
    #[arg(long, default_value = "612")]
    width: f64,

    /// Page height in points
    #[arg(long, default_value = "792")]
    height: f64,

    /// Type of output to generate
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// The stream is Flate-compressed
    #[arg(long, action = ArgAction::SetTrue)]
    flate: bool,

    /// Skip malformed operators instead of stopping
    #[arg(long, action = ArgAction::SetTrue)]
    lenient: bool,

    /// Print the token stream instead of drawing calls
    #[arg(long, action = ArgAction::SetTrue)]
    tokens: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

fn read_input(args: &Args) -> anyhow::Result<Vec<u8>> {
    let raw = if args.file.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::Read::read_to_end(&mut io::stdin(), &mut buf).context("reading stdin")?;
        buf
    } else {
        fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?
    };
    if !args.flate {
        return Ok(raw);
    }
    let filters = dict_from([("Filter", PDFObject::name("FlateDecode"))]);
    let (data, rest) = decode_filters(&raw, &filters)?;
    if !rest.is_empty() {
        bail!("unexpected filters left: {rest:?}");
    }
    Ok(data)
}

fn print_tokens(data: &[u8], out: &mut impl Write) -> anyhow::Result<()> {
    for token in ContentLexer::new(data) {
        let token = token?;
        writeln!(out, "{:>6}..{:<6} {:?}", token.range.start, token.range.end, token.kind)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let data = read_input(&args)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if args.tokens {
        print_tokens(&data, &mut out)?;
        out.flush()?;
        return Ok(());
    }

    let store = ObjectStore::new();
    let mut resources = ResourceManager::new();
    let mut surface = RecordingSurface::with_bounds((0.0, 0.0, args.width, args.height));
    let options = RenderOptions::default().with_strict_operands(!args.lenient);
    // y-down device space with the origin at the top-left corner
    let ctm = (1.0, 0.0, 0.0, -1.0, 0.0, args.height);
    let result = PageInterpreter::new(&store, &mut resources, &mut surface, &options).render_page(
        &data,
        PDFDict::new(),
        ctm,
    );

    for call in surface.calls() {
        match args.format {
            OutputFormat::Text => writeln!(out, "{call}")?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut out, call)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;
    log::info!("{} drawing calls", surface.calls().len());
    result.context("interpreting content stream")?;
    Ok(())
}

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use unmangle_core::mangled_name::Element;
use unmangle_core::words::DecodeWords;
use unmangle_core::{
    decode_identifier, demangle_symbol, demangle_type, encode_identifier, parse_symbolic_byte_stream, ContextIndex,
    ContextResolver, ImageReader, MachOImage, MangledNameKind, ResolverConfig, Result as UnmangleResult,
    UnmangleError, WordTable,
};
use unmangle_utils::{info, init_logging_with, LogConfig, LogFormat, LogLevel};

/// Decode symbolic mangled names and context descriptors.
#[derive(Parser, Debug)]
#[command(name = "unmangle")]
#[command(version)]
#[command(about = "Decode symbolic mangled names and context descriptors", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: GlobalOptions,
}

#[derive(Args, Debug)]
struct GlobalOptions
{
    /// Parent links followed before a context walk gives up
    #[arg(long, global = true)]
    recursion_limit: Option<usize>,
    /// Reject the concurrency standard-type abbreviations
    #[arg(long, global = true, default_value_t = false)]
    no_concurrency_abbreviations: bool,
    /// Write non-ASCII identifiers verbatim instead of Punycode
    #[arg(long, global = true, default_value_t = false)]
    no_punycode: bool,
    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    /// Log format (pretty or json)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
    /// Also write logs to a dated file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Print the qualified path of context descriptors in a Mach-O image
    Context
    {
        /// Path to the image
        image: PathBuf,
        /// Descriptor file offsets (hex format: 0x1000 or decimal); all listed descriptors if omitted
        offsets: Vec<String>,
    },
    /// Parse the symbolic name stored at an offset and decode it
    Name
    {
        /// Path to the image
        image: PathBuf,
        /// File offset of the name (hex format: 0x1000 or decimal)
        offset: String,
        /// Decode as a symbol instead of a type
        #[arg(long, default_value_t = false)]
        symbol: bool,
    },
    /// Demangle textual symbols or type manglings
    Demangle
    {
        /// Names to demangle
        #[arg(required = true)]
        names: Vec<String>,
        /// Treat the input as bare type manglings instead of symbols
        #[arg(long = "type", default_value_t = false)]
        as_type: bool,
        /// Print the node tree instead of the readable form
        #[arg(long, default_value_t = false)]
        tree: bool,
    },
    /// Encode identifiers with word substitution, as one symbol
    Encode
    {
        #[arg(required = true)]
        identifiers: Vec<String>,
    },
    /// Decode a run of encoded identifiers
    Decode
    {
        encoded: String,
    },
}

fn main()
{
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env().with_level(cli.options.log_level);
    if let Some(format) = cli.options.log_format {
        log_config = log_config.with_format(format);
    }
    if let Some(dir) = &cli.options.log_dir {
        log_config = log_config.with_log_dir(dir);
    }
    let _guard = match init_logging_with(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn resolver_config(options: &GlobalOptions) -> ResolverConfig
{
    let mut config = ResolverConfig::from_env();
    if let Some(limit) = options.recursion_limit {
        config = config.with_recursion_limit(limit);
    }
    if options.no_concurrency_abbreviations {
        config.allow_concurrency_abbreviations = false;
    }
    if options.no_punycode {
        config.use_punycode = false;
    }
    config
}

fn run_command(cli: Cli) -> UnmangleResult<()>
{
    let config = resolver_config(&cli.options);

    match cli.command {
        Commands::Context { image, offsets } => {
            info!("Reading image {}", image.display());
            let image = MachOImage::open(&image)?;
            if offsets.is_empty() {
                return print_index(&image, config);
            }
            let resolver = ContextResolver::new(&image, config);
            for offset in &offsets {
                let offset = parse_offset(offset)?;
                match resolver.decode_context_path(offset)? {
                    Some(node) => println!("0x{offset:x}  {node}"),
                    None => println!("0x{offset:x}  <unresolvable>"),
                }
            }
            Ok(())
        }
        Commands::Name { image, offset, symbol } => {
            let image = MachOImage::open(&image)?;
            print_name(&image, parse_offset(&offset)?, symbol, config)
        }
        Commands::Demangle { names, as_type, tree } => {
            for name in names {
                let node = if as_type {
                    demangle_type(&name, None, config.allow_concurrency_abbreviations)
                } else {
                    demangle_symbol(&name, None, config.allow_concurrency_abbreviations)
                };
                match node {
                    Ok(node) if tree => println!("{node:?}"),
                    Ok(node) => println!("{name} ---> {node}"),
                    Err(e) => println!("{name} ---> <{e}>"),
                }
            }
            Ok(())
        }
        Commands::Encode { identifiers } => {
            let mut table = WordTable::with_punycode(config.use_punycode);
            for identifier in &identifiers {
                encode_identifier(identifier, &mut table)?;
            }
            println!("{}", table.buffer());
            Ok(())
        }
        Commands::Decode { encoded } => {
            let mut words = DecodeWords::new();
            let mut pos = 0;
            while pos < encoded.chars().count() {
                let (identifier, next) = decode_identifier(&encoded, pos, &mut words)?;
                println!("{identifier}");
                pos = next;
            }
            Ok(())
        }
    }
}

fn print_name(image: &MachOImage, offset: u64, symbol: bool, config: ResolverConfig) -> UnmangleResult<()>
{
    let name = parse_symbolic_byte_stream(image, offset)?;
    println!("0x{:x}..0x{:x}", name.start_offset, name.end_offset);
    for element in &name.elements {
        match element {
            Element::Text(text) => println!("  text    {text:?}"),
            Element::Lookup(lookup) => println!(
                "  lookup  kind 0x{:02x} at 0x{:x}",
                lookup.reference.kind(),
                lookup.offset
            ),
        }
    }

    let kind = if symbol { MangledNameKind::Symbol } else { MangledNameKind::Type };
    let resolver = ContextResolver::new(image, config);
    match resolver.decode_mangled_name(&name, kind) {
        Ok(node) => println!("{node}"),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => println!("<{e}>"),
    }
    Ok(())
}

fn print_index(image: &MachOImage, config: ResolverConfig) -> UnmangleResult<()>
{
    let offsets = image.context_descriptor_offsets()?;
    info!("Resolving {} descriptors from {} bytes", offsets.len(), image.len());
    let index = ContextIndex::build(image, &offsets, config);
    for (offset, node) in index.entries() {
        println!("0x{offset:x}  {node}");
    }
    if !index.skipped().is_empty() {
        eprintln!("{} descriptor(s) could not be resolved", index.skipped().len());
    }
    Ok(())
}

/// Parse an offset in hex format (0x1000) or decimal.
fn parse_offset(text: &str) -> UnmangleResult<u64>
{
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| UnmangleError::InvalidArgument(format!("Invalid offset: {text}")))
}

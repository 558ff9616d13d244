use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use flexi_logger::{Logger, LoggerHandle};
use std::path::{Path, PathBuf};
use std::time::Instant;

use honeycomb_intercalator::{
    detect_channels, intercalate, parser, writer, BondWindow, CancellationToken, CoordinateLimits, GuestParams,
    IntercalationSpec, IntercalationSpecBuilder, Lattice, LatticeVectorCalculator, PipelineConfig, PlacementPattern,
};

#[derive(Parser)]
#[command(author, version, about = "Honeycomb channel detection and guest intercalation")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Host loading options shared by every subcommand.
#[derive(Args)]
struct HostArgs {
    /// Input files or glob patterns (.xyz / .dat).
    #[arg(required = true)]
    inputs: Vec<String>,

    /// JSON pipeline config; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    bond_min: Option<f64>,

    #[arg(long)]
    bond_max: Option<f64>,

    /// Fail on hosts whose bond graph has several fragments.
    #[arg(long)]
    require_connected: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Xyz,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Xyz => "xyz",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the channels found in each host.
    Detect {
        #[command(flatten)]
        host: HostArgs,
    },
    /// Fits primitive lattice vectors from ring centroids.
    Vectors {
        #[command(flatten)]
        host: HostArgs,
    },
    /// Places guest atoms into every channel and writes the merged structure.
    Intercalate {
        #[command(flatten)]
        host: HostArgs,

        /// Guest element. Al, Ar and Xe seed spacing and threshold from presets.
        #[arg(short, long, default_value = "Al")]
        element: String,

        /// Layer spacing in Å (default: preset, else fitted stacking distance).
        #[arg(long, conflicts_with = "fit_spacing")]
        spacing: Option<f64>,

        /// Ignore the preset spacing and use the host's stacking distance.
        #[arg(long)]
        fit_spacing: bool,

        /// Minimum centre-to-centre distance in Å.
        #[arg(long)]
        threshold: Option<f64>,

        #[arg(long, default_value_t = 6)]
        per_layer: usize,

        /// ring | staggered | centered
        #[arg(long, default_value = "ring")]
        pattern: String,

        #[arg(long, default_value_t = 0.5)]
        clearance: f64,

        #[arg(long, default_value_t = 4)]
        attempts: usize,

        #[arg(long, value_enum, default_value_t = OutputFormat::Xyz)]
        format: OutputFormat,

        /// Directory for output files (default: next to each input).
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Export only atoms inside x_min x_max y_min y_max z_min z_max.
        #[arg(long, num_args = 6, allow_negative_numbers = true)]
        limits: Option<Vec<f64>>,

        /// Print per-guest distances.
        #[arg(long)]
        details: bool,
    },
}

fn init_logging(verbose: u8) -> Result<LoggerHandle> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    Logger::try_with_env_or_str(level)
        .context("Invalid log specification")?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()
        .context("Failed to start logger")
}

fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let before = paths.len();
        for entry in glob::glob(pattern).with_context(|| format!("Invalid glob pattern '{}'", pattern))? {
            paths.push(entry.with_context(|| format!("Unreadable match for '{}'", pattern))?);
        }
        if paths.len() == before {
            bail!("No input files match '{}'", pattern);
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}

fn load_config(host: &HostArgs) -> Result<PipelineConfig> {
    let mut config = match &host.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    config.bond_window = BondWindow::new(
        host.bond_min.unwrap_or(config.bond_window.min),
        host.bond_max.unwrap_or(config.bond_window.max),
    );
    config.require_connected_host |= host.require_connected;
    config.validate()?;
    Ok(config)
}

fn load_lattice(path: &Path, config: &PipelineConfig) -> Result<Lattice> {
    println!("Reading structure from {:?}...", path);
    let records = parser::read_records(path)?;
    let lattice = config
        .build_lattice(&records)
        .with_context(|| format!("Invalid host in {:?}", path))?;
    println!("-> Loaded {} atoms, {} bonds.", lattice.len(), lattice.bonds().len());
    Ok(lattice)
}

fn build_spec(
    element: &str,
    spacing: Option<f64>,
    fit_spacing: bool,
    threshold: Option<f64>,
    per_layer: usize,
    pattern: &str,
    clearance: f64,
    attempts: usize,
) -> Result<IntercalationSpec> {
    let mut builder = match GuestParams::lookup(element) {
        Some(preset) => {
            println!("-> Using {} preset (a = {:.4} Å).", preset.name, preset.lattice_param);
            IntercalationSpecBuilder::from_preset(preset)
        }
        None => IntercalationSpec::builder(element),
    };
    if let Some(s) = spacing {
        builder = builder.layer_spacing(s);
    } else if fit_spacing {
        builder = builder.default_layer_spacing();
    }
    if let Some(t) = threshold {
        builder = builder.collision_threshold(t);
    }
    let spec = builder
        .max_atoms_per_layer(per_layer)
        .pattern(pattern.parse::<PlacementPattern>()?)
        .clearance_margin(clearance)
        .max_attempts(attempts)
        .build()?;
    Ok(spec)
}

fn parse_limits(values: Option<Vec<f64>>) -> Result<Option<CoordinateLimits>> {
    let Some(v) = values else { return Ok(None) };
    if v.len() != 6 {
        bail!("--limits takes exactly 6 values, got {}", v.len());
    }
    if v[0] > v[1] || v[2] > v[3] || v[4] > v[5] {
        bail!("--limits must be given as min/max pairs");
    }
    Ok(Some(CoordinateLimits {
        x_min: v[0],
        x_max: v[1],
        y_min: v[2],
        y_max: v[3],
        z_min: v[4],
        z_max: v[5],
    }))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logger = init_logging(cli.verbose)?;
    let start_time = Instant::now();

    match cli.command {
        Commands::Detect { host } => {
            let config = load_config(&host)?;
            for path in expand_inputs(&host.inputs)? {
                let lattice = load_lattice(&path, &config)?;
                let analysis = detect_channels(&lattice, &config)
                    .with_context(|| format!("Channel detection failed for {:?}", path))?;
                println!("-> {} channel(s):", analysis.channels.len());
                for ch in &analysis.channels {
                    println!(
                        "   #{:<3} rings {:>3}  length {:>8.3} Å  diameter {:>6.3} Å  axis ({:.3}, {:.3}, {:.3})",
                        ch.id,
                        ch.ring_count(),
                        ch.length,
                        ch.mean_diameter,
                        ch.axis.direction.x,
                        ch.axis.direction.y,
                        ch.axis.direction.z
                    );
                }
                for w in &analysis.warnings {
                    println!("   warning: {}", w);
                }
            }
        }
        Commands::Vectors { host } => {
            let config = load_config(&host)?;
            for path in expand_inputs(&host.inputs)? {
                let lattice = load_lattice(&path, &config)?;
                let analysis = detect_channels(&lattice, &config)
                    .with_context(|| format!("Channel detection failed for {:?}", path))?;
                let v = LatticeVectorCalculator::new(config.lattice)
                    .fit(&analysis.channels)
                    .with_context(|| format!("Lattice fit failed for {:?}", path))?;
                println!("-> a1 = ({:>9.4}, {:>9.4}, {:>9.4})  |a1| = {:.4} Å", v.a1.x, v.a1.y, v.a1.z, v.a1.norm());
                println!("-> a2 = ({:>9.4}, {:>9.4}, {:>9.4})  |a2| = {:.4} Å", v.a2.x, v.a2.y, v.a2.z, v.a2.norm());
                println!("-> c  = ({:>9.4}, {:>9.4}, {:>9.4})  |c|  = {:.4} Å", v.c.x, v.c.y, v.c.z, v.c.norm());
            }
        }
        Commands::Intercalate {
            host,
            element,
            spacing,
            fit_spacing,
            threshold,
            per_layer,
            pattern,
            clearance,
            attempts,
            format,
            output_dir,
            limits,
            details,
        } => {
            println!("--- Honeycomb Intercalator ---");
            let config = load_config(&host)?;
            let spec = build_spec(&element, spacing, fit_spacing, threshold, per_layer, &pattern, clearance, attempts)?;
            let limits = parse_limits(limits)?;

            for path in expand_inputs(&host.inputs)? {
                let lattice = load_lattice(&path, &config)?;
                let outcome = intercalate(&lattice, &spec, &config, &CancellationToken::new())
                    .with_context(|| format!("Intercalation failed for {:?}", path))?;

                let report = outcome.report();
                println!("\nSuccess!");
                println!("• Channels:        {}", outcome.channels.len());
                println!("• Layer spacing:   {:.4} Å", outcome.layer_spacing);
                if details {
                    print!("{}", report);
                } else {
                    println!("• Guests placed:   {}", outcome.structure.guest_count());
                    println!("• {}", report.summary());
                }
                if let (Some(preset), Some(closest)) = (GuestParams::lookup(spec.element()), report.closest_contact()) {
                    if closest < preset.min_recommended_dist() {
                        log::warn!(
                            "closest contact {:.3} Å is below the recommended {:.3} Å for {}",
                            closest,
                            preset.min_recommended_dist(),
                            preset.name
                        );
                    }
                }

                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("structure");
                let dir = match &output_dir {
                    Some(d) => d.clone(),
                    None => path.parent().map(Path::to_path_buf).unwrap_or_default(),
                };
                let output = dir.join(format!("{}_{}.{}", stem, spec.element(), format.extension()));
                println!("Writing output to {:?}...", output);
                writer::to_path(&outcome.structure, &outcome.warnings, &output, limits)?;
            }
        }
    }

    println!("Done in {:.2?}", start_time.elapsed());
    Ok(())
}

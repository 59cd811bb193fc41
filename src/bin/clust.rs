use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use clust_core::adjacency::Connectivity;
use clust_core::coords::Orientation;
use clust_core::finder::ClusterMode;
use clust_core::mask_writer::LabelMode;
use clust_core::pipeline::{load_mask_file, run_batch, write_batch_outputs, ClustOptions};

/// Clust - find and report clusters of nonzero voxels in 3D datasets
///
/// Either give a radius and minimum volume before the datasets
/// (`clust RMM VMUL DATASET...`) or use `--nn` and list only datasets.
#[derive(Parser, Debug)]
#[command(name = "clust", version, about)]
struct Cli {
    /// [RMM VMUL] DATASET...
    #[arg(required = true, allow_negative_numbers = true, value_name = "ARGS")]
    args: Vec<String>,

    /// Nearest-neighbor clustering: 1 = faces, 2 = edges, 3 = corners
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    nn: Option<u8>,

    /// Minimum cluster size in voxels with --nn (default 2)
    #[arg(long, value_name = "N", default_value_t = 0)]
    nn_min: usize,

    /// Use 1 mm voxel dimensions for distances and volumes
    #[arg(long)]
    dxyz1: bool,

    /// Only cluster neighbors with identical values
    #[arg(long, conflicts_with = "isomerge")]
    isovalue: bool,

    /// Merge all voxels with identical values, ignoring adjacency
    #[arg(long)]
    isomerge: bool,

    /// Mean and SEM from signed values instead of absolute values
    #[arg(long)]
    noabs: bool,

    /// Only print the totals
    #[arg(long)]
    summarize: bool,

    /// Do not print the totals row
    #[arg(long)]
    nosum: bool,

    /// Suppress header lines
    #[arg(long)]
    quiet: bool,

    /// Plain output without `#` comment prefixes
    #[arg(long)]
    no_1d_format: bool,

    /// Coordinate order code, e.g. RAI or LPI
    #[arg(long, value_name = "CODE")]
    orient: Option<String>,

    /// Report MNI coordinates (Talairach datasets), LPI order
    #[arg(long)]
    mni: bool,

    /// Only voxels nonzero in this dataset are clustered
    #[arg(long, value_name = "FILE")]
    mask: Option<PathBuf>,

    /// Write the first dataset with voxels outside clusters zeroed
    #[arg(long, value_name = "FILE")]
    prefix: Option<PathBuf>,

    /// Write the cluster labels of the first dataset
    #[arg(long, value_name = "FILE")]
    savemask: Option<PathBuf>,

    /// Label every cluster voxel 1 in --savemask output
    #[arg(long)]
    binary: bool,

    /// Zero voxels with |value| below V
    #[arg(long, value_name = "V")]
    clip: Option<f64>,

    /// Zero voxels with LO <= value <= HI
    #[arg(long, num_args = 2, value_names = ["LO", "HI"], allow_negative_numbers = true)]
    two_clip: Option<Vec<f64>>,

    /// Zero negative voxels
    #[arg(long)]
    no_neg: bool,

    /// Zero voxels whose threshold value has |t| below T
    #[arg(long, value_name = "T")]
    thresh: Option<f64>,

    /// Volume to cluster
    #[arg(long, value_name = "N", default_value_t = 0)]
    data_index: usize,

    /// Volume holding the threshold values
    #[arg(long, value_name = "N")]
    thresh_index: Option<usize>,

    /// Print " 0" after a no-cluster message
    #[arg(long)]
    report_zero: bool,

    /// Debug logging
    #[arg(long)]
    verbose: bool,
}

fn invalid(msg: String) -> ! {
    Cli::command().error(ErrorKind::ValueValidation, msg).exit()
}

/// Build run options and the dataset list from the command line
fn options(cli: &Cli) -> (ClustOptions, Vec<PathBuf>) {
    let (mut opts, datasets) = match cli.nn {
        Some(level) => {
            let connectivity = Connectivity::from_level(level)
                .unwrap_or_else(|| invalid(format!("--nn must be 1, 2 or 3, got {}", level)));
            (ClustOptions::nearest_neighbor(connectivity, cli.nn_min), &cli.args[..])
        }
        None => {
            if cli.args.len() < 3 {
                invalid("expected RMM VMUL followed by at least one dataset (or use --nn)".to_string());
            }
            let rmm: f64 = cli.args[0]
                .parse()
                .unwrap_or_else(|_| invalid(format!("RMM must be a number, got '{}'", cli.args[0])));
            let vmul: f64 = cli.args[1]
                .parse()
                .unwrap_or_else(|_| invalid(format!("VMUL must be a number, got '{}'", cli.args[1])));
            (ClustOptions::from_radius(rmm, vmul), &cli.args[2..])
        }
    };

    if let Err(e) = opts.finder.rule.validate() {
        invalid(e.to_string());
    }

    opts.finder.fake_spacing = cli.dxyz1;
    opts.finder.mode = if cli.isomerge {
        ClusterMode::IsoMerge
    } else if cli.isovalue {
        ClusterMode::IsoValue
    } else {
        ClusterMode::ContiguousNonzero
    };
    opts.signed_mean = cli.noabs;

    opts.edit.clip = cli.clip;
    opts.edit.two_clip = cli.two_clip.as_ref().map(|v| (v[0], v[1]));
    opts.edit.no_negative = cli.no_neg;
    opts.edit.thresh = cli.thresh;
    opts.data_index = cli.data_index;
    opts.thresh_index = cli.thresh_index;

    if let Some(code) = &cli.orient {
        opts.orientation = Orientation::parse(code).unwrap_or_else(|e| invalid(e.to_string()));
    }
    opts.mni = cli.mni;

    opts.style.one_d_format = !cli.no_1d_format;
    opts.style.quiet = cli.quiet;
    opts.style.summarize = cli.summarize;
    opts.style.nosum = cli.nosum;
    opts.style.report_zero = cli.report_zero;

    opts.outputs.prefix = cli.prefix.clone();
    opts.outputs.savemask = cli.savemask.clone();
    opts.outputs.label_mode = if cli.binary { LabelMode::Binary } else { LabelMode::Ordered };

    (opts, datasets.iter().map(PathBuf::from).collect())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let (mut opts, datasets) = options(&cli);

    if let Some(path) = &cli.mask {
        match load_mask_file(path) {
            Ok(mask) => opts.mask = Some(mask),
            Err(e) => {
                eprintln!("** cannot use mask {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    let outcomes = run_batch(&datasets, &opts);
    for (path, outcome) in datasets.iter().zip(outcomes.iter()) {
        match outcome {
            Ok(outcome) => print!("{}", outcome.render(&opts.style)),
            Err(e) if e.is_config_error() => eprintln!("** skipping {}: {}", path.display(), e),
            Err(e) => eprintln!("** failed on {}: {}", path.display(), e),
        }
    }

    if let Err(e) = write_batch_outputs(&datasets, &outcomes, &opts) {
        eprintln!("** output not written: {}", e);
    }

    ExitCode::SUCCESS
}

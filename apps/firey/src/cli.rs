use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::Local;
use clap::Parser;

const EXAMPLES: &str = "\
Examples:
  firey -i my-project -p /users/1
  firey -i my-project -l paths.txt -m GET,POST -v
  firey -i my-project -l paths.txt --kae -o monitoring.txt
  firey -i my-project -p /admin -t 10 -o results.json
  firey --status";

/// Firey - Firebase authorization tester
#[derive(Debug, Clone, Parser)]
#[command(name = "firey", version, about, after_help = EXAMPLES)]
pub struct Cli {
    /// Project ID
    #[arg(short = 'i', long = "project-id", required_unless_present = "status")]
    pub project_id: Option<String>,

    /// Custom base URL, overrides the default Firestore URL
    #[arg(short = 'u', long = "url")]
    pub custom_url: Option<String>,

    /// File containing list of paths (one per line, `#` comments allowed)
    #[arg(short = 'l', long = "list")]
    pub path_list: Option<PathBuf>,

    /// Single path to test
    #[arg(short = 'p', long = "path")]
    pub single_path: Option<String>,

    /// Comma-separated HTTP methods [default: GET,POST,PATCH,DELETE]
    #[arg(short = 'm', long = "methods")]
    pub methods: Option<String>,

    /// Verbose mode - show detailed response information
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Output file to append results to
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Keep An Eye mode - re-run the probes in the background on a schedule
    #[arg(long = "kae", visible_alias = "keep-an-eye")]
    pub keep_an_eye: bool,

    /// Number of probes in flight at once
    #[arg(short = 't', long = "threads", default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub threads: u64,

    /// Silent mode - no banner or extra output
    #[arg(short = 's', long)]
    pub silent: bool,

    /// Configuration file [default: $XDG_CONFIG_HOME/firey/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Show the status of the background monitor and exit
    #[arg(long)]
    pub status: bool,
}

impl Cli {
    pub fn concurrency(&self) -> usize {
        usize::try_from(self.threads).unwrap_or(usize::MAX)
    }
}

/// Output file used by a monitor started without `-o`
pub fn generated_output_path() -> PathBuf {
    PathBuf::from(format!("firey_monitoring_{}.txt", Local::now().format("%Y%m%d_%H%M%S")))
}

/// Arguments for the background worker.
///
/// The worker re-parses the original arguments, so an output file chosen
/// here must be passed explicitly or the two processes would disagree.
pub fn worker_args(
    original: impl IntoIterator<Item = OsString>,
    output: Option<&Path>,
) -> (PathBuf, Vec<OsString>) {
    let mut args: Vec<OsString> = original.into_iter().collect();

    let output = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let generated = generated_output_path();
            args.push("--output".into());
            args.push(generated.clone().into_os_string());
            generated
        }
    };

    (output, args)
}

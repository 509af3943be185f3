//! stackviz-export - Generate JSON data files for a StackViz site

use clap::Parser;
use stackviz_export::export::{export, ExportOptions};
use stackviz_export::provider::get_providers;
use stackviz_export::ui::{CliUI, UI};
use std::error::Error as _;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackviz-export")]
#[command(about = "Generates JSON data files for a StackViz site", long_about = None)]
struct Cli {
    /// The output directory; created if it doesn't already exist
    path: PathBuf,

    /// Enable gzip compression for data files
    #[arg(short = 'z', long)]
    gzip: bool,

    /// Include Zuul metadata from environment variables
    #[arg(short = 'e', long)]
    env: bool,

    /// Include the given direct subunit stream; can be used multiple times
    #[arg(short = 'f', long = "stream-file", value_name = "PATH")]
    stream_files: Vec<PathBuf>,

    /// A directory containing a `.testrepository` to include; can be used
    /// multiple times
    #[arg(short = 'r', long = "repository", value_name = "DIR")]
    repositories: Vec<PathBuf>,

    /// Read a direct subunit stream from standard input
    #[arg(short = 'i', long)]
    stdin: bool,

    /// The path to the DStat log file (CSV-formatted) to include
    #[arg(long, env = "STACKVIZ_DSTAT", value_name = "PATH")]
    dstat: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let mut ui = CliUI::new();

    let options = ExportOptions {
        output_dir: cli.path,
        compress: cli.gzip,
        dstat: cli.dstat,
        environment: cli.env,
    };

    let result = get_providers(&cli.repositories, &cli.stream_files, cli.stdin)
        .and_then(|providers| export(&options, &providers, &mut ui));

    if let Err(e) = result {
        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(cause) = source {
            if !message.contains(&cause.to_string()) {
                message.push_str(&format!(": {}", cause));
            }
            source = cause.source();
        }
        let _ = ui.error(&message);
        std::process::exit(1);
    }
}

//! `mist-gen`: the CLI driver for the template engine (spec §6 "CLI
//! surface"). A thin consumer of the library's Driver API plus the two
//! boundary collaborators (`config`, `discovery`).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, info};

use mist::discovery;
use mist::driver::{self, FsWriter};
use mist::{config, MistError};

#[derive(Parser, Debug)]
#[command(name = "mist-gen", author, version, about = "Multi-valued string-template engine", long_about = None)]
struct Cli {
    /// Treat `template_path` as a single template file and print the result
    /// to standard output, instead of resolving a group directory.
    #[arg(short = 's', long = "simplified")]
    simplified: bool,

    /// Path to a template file (simplified mode) or a template-group
    /// directory (regular mode).
    template_path: PathBuf,

    /// Path to the parameter values file (config-file format, spec §6).
    values_path: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mist-gen: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), MistError> {
    let values_src = std::fs::read_to_string(&cli.values_path).map_err(|source| MistError::Io {
        source,
        path: cli.values_path.clone(),
    })?;
    let dict = config::parse_config(&values_src)?;
    let params: Vec<(&str, &str)> = dict.iter().collect();

    if cli.simplified {
        info!(path = %cli.template_path.display(), "rendering single template");
        let src = std::fs::read_to_string(&cli.template_path).map_err(|source| MistError::Io {
            source,
            path: cli.template_path.clone(),
        })?;
        let name = cli
            .template_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("template");
        let mut group = driver::build_single(name, &src, "<$", "$>")?;
        driver::set_attributes(&mut group, params.iter().copied());
        let values = driver::evaluate(&mut group);
        return match values.len() {
            1 => {
                print!("{}", values[0]);
                Ok(())
            }
            count => Err(MistError::MainMultiValued { count }),
        };
    }

    info!(dir = %cli.template_path.display(), "loading template group");
    let discovered = discovery::load_group_dir(&cli.template_path)?;
    debug!(templates = discovered.templates.len(), "discovered *.tpl files");

    let mut path_group = driver::build_single(
        discovery::path_template_name(),
        &discovered.file_path_template,
        &discovered.begin_marker,
        &discovered.end_marker,
    )?;
    let mut content_group = driver::build_group(
        &discovered.main_name,
        discovered
            .templates
            .iter()
            .map(|(name, src)| (name.as_str(), src.as_str())),
        &discovered.begin_marker,
        &discovered.end_marker,
    )?;

    let output_path = driver::generate_path(&mut path_group, params.iter().copied())?;
    info!(path = %output_path, "writing generated file");
    driver::generate_file(
        &mut content_group,
        std::path::Path::new(&output_path),
        params.iter().copied(),
        &FsWriter,
    )?;

    Ok(())
}

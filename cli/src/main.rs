use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands::{command_arsc, command_axml, command_list, command_show};

mod commands;

#[derive(Parser)]
#[command(version, about, arg_required_else_help(true))]
struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,
}

#[derive(Args)]
pub(crate) struct ShowOptions {
    /// Print information as json, one object per line
    #[arg(short, long, default_value_t = false)]
    json: bool,

    /// Also print the decoded AndroidManifest.xml
    #[arg(short, long, default_value_t = false)]
    raw: bool,

    /// Fail when resources.arsc can't be decoded
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Show enum and flag attributes by name
    #[arg(long, default_value_t = false)]
    symbolic: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show application name, package and versions of apk files
    Show {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        options: ShowOptions,
    },
    /// Read binary xml from a file or from an apk entry and pretty print
    Axml {
        #[arg(required = true)]
        path: PathBuf,

        /// Entry to decode when `path` is an archive
        #[arg(short, long, default_value = apk_meta::ANDROID_MANIFEST_PATH)]
        entry: String,

        /// Resolve references through the archive resources.arsc
        #[arg(long, default_value_t = false)]
        resolve: bool,
    },
    /// Print packages and resources from resources.arsc or an apk
    Arsc {
        #[arg(required = true)]
        path: PathBuf,

        /// Print every resource value, not only packages
        #[arg(short, long, default_value_t = false)]
        dump: bool,
    },
    /// List entries of the apk archive
    List {
        #[arg(required = true)]
        path: PathBuf,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match &cli.commands {
        Some(Commands::Show { paths, options }) => command_show(paths, options),
        Some(Commands::Axml {
            path,
            entry,
            resolve,
        }) => command_axml(path, entry, *resolve),
        Some(Commands::Arsc { path, dump }) => command_arsc(path, *dump),
        Some(Commands::List { path }) => command_list(path),
        None => Ok(()),
    };

    if let Err(err) = result {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

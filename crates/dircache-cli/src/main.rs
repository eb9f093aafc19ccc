//! `dircache`: the thin command-dispatcher binary over the object store and
//! staging index. All seven commands live as one `clap` `Subcommand` enum on
//! a single binary, rather than seven separate executables; each
//! subcommand's behavior (argv shape, stdout contract, exit-on-error) is
//! otherwise unchanged.

#![deny(unsafe_code)]

mod commands;
mod error;
mod identity;

use clap::{Parser, Subcommand};
use error::CliError;

#[derive(Parser, Debug)]
#[command(name = "dircache", about = "A minimal content-addressed version-control data store")]
struct Cli {
    /// Shorthand for `RUST_LOG=debug`; an explicit `RUST_LOG` still wins.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the repository and object-store directories.
    Init,
    /// Stage or unstage the given paths, rewriting the index atomically.
    UpdateCache {
        /// Paths to stage (or, if now missing, unstage).
        paths: Vec<String>,
    },
    /// Emit a tree object from the current index and print its digest.
    WriteTree,
    /// Print every entry of the named tree object.
    ReadTree {
        /// Hex digest of the tree object.
        tree: String,
    },
    /// Extract an object's payload to a tempfile and print its type.
    CatFile {
        /// Hex digest of the object.
        object: String,
    },
    /// Compare staged entries against the working tree and show diffs.
    ShowDiff,
    /// Build a commit object over a tree, reading the message from stdin.
    CommitTree {
        /// Hex digest of the tree this commit snapshots.
        tree: String,
        /// Parent commit digest; may be repeated in significant order.
        #[arg(short = 'p', long = "parent")]
        parents: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    if cli.verbose && std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "debug");
    }
    let _ = telemetry::init_logging();
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("error: could not determine current directory: {e}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(&cli.command, &cwd) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(command: &Command, cwd: &std::path::Path) -> Result<(), CliError> {
    match command {
        Command::Init => commands::init(cwd),
        Command::UpdateCache { paths } => commands::update_cache(cwd, paths),
        Command::WriteTree => {
            let hex = commands::write_tree(cwd)?;
            println!("{hex}");
            Ok(())
        }
        Command::ReadTree { tree } => {
            let lines = commands::read_tree(cwd, tree)?;
            for line in lines {
                println!("{line}");
            }
            Ok(())
        }
        Command::CatFile { object } => {
            let (path, kind) = commands::cat_file(cwd, object)?;
            println!("{}: {kind}", path.display());
            Ok(())
        }
        Command::ShowDiff => commands::show_diff(cwd),
        Command::CommitTree { tree, parents } => {
            let hex = commands::commit_tree(cwd, tree, parents)?;
            println!("{hex}");
            Ok(())
        }
    }
}

use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};
use structopt::StructOpt;
use tracing::Level;

use chunktree::{ChunkContainer, ChunkContainerRef, ChunkHasher, Config, WriteMode};
use chunktree_utils::{dump, DirAccessor};

#[cfg(target_env = "musl")]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

pub type Result<T> = anyhow::Result<T>;

#[derive(StructOpt)]
#[structopt(about = "CLI to work with chunk trees")]
struct Opts {
    #[structopt(short, parse(from_occurrences = set_log_level), global = true)]
    #[allow(dead_code)] // log level will be set in [`set_log_level`]
    /// Increase verbosity
    verbosity: u64,
    #[structopt(long, global = true)]
    /// Use the small debug chunking config instead of the default
    debug_config: bool,
    #[structopt(subcommand)]
    cmd: Command,
}

fn set_log_level(verbosity: u64) -> u64 {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
    verbosity
}

#[derive(StructOpt)]
enum Command {
    /// Compute the root hash of a file, without storing anything
    Hash {
        #[structopt(long)]
        /// The file to hash
        file: PathBuf,
    },
    /// Store a file as a container and print the reference as json
    Import {
        #[structopt(long)]
        /// The file to import
        file: PathBuf,
        #[structopt(long)]
        /// Directory to store chunks in
        store: PathBuf,
    },
    /// Write the content of a container to stdout
    Cat {
        #[structopt(long)]
        /// Json file with the container reference
        reference: PathBuf,
        #[structopt(long)]
        /// Directory to read chunks from
        store: PathBuf,
    },
    /// Traverse a container and dump its nodes as dot. Can be piped directly:
    /// `chunktree-cli graph --reference <..> --store <..> | dot -Tpng -o output.png`.
    Graph {
        #[structopt(long)]
        /// Json file with the container reference
        reference: PathBuf,
        #[structopt(long)]
        /// Directory to read chunks from
        store: PathBuf,
    },
}

fn load(reference: &Path, store: &Path) -> Result<ChunkContainer> {
    let reference: ChunkContainerRef =
        serde_json::from_reader(BufReader::new(File::open(reference)?))?;
    let accessor = DirAccessor::new(store)?;
    ChunkContainer::open(Arc::new(accessor), &reference)
}

fn main() -> Result<()> {
    let opts = Opts::from_args();
    let config = if opts.debug_config {
        Config::debug_fast()
    } else {
        Config::default()
    };
    match opts.cmd {
        Command::Hash { file } => {
            let mut hasher = ChunkHasher::new(&config);
            io::copy(&mut BufReader::new(File::open(file)?), &mut hasher)?;
            println!("{}", hasher.finalize());
        }
        Command::Import { file, store } => {
            let accessor = DirAccessor::new(store)?;
            let mut container = ChunkContainer::create(Arc::new(accessor), config)?;
            let mut writer = container.writer(WriteMode::Insert);
            io::copy(&mut BufReader::new(File::open(file)?), &mut writer)?;
            writer.finish()?;
            drop(writer);
            let reference = container.flush()?;
            println!("{}", serde_json::to_string_pretty(&reference)?);
        }
        Command::Cat { reference, store } => {
            let mut container = load(&reference, &store)?;
            let mut reader = container.reader();
            io::copy(&mut reader, &mut io::stdout().lock())?;
        }
        Command::Graph { reference, store } => {
            let container = load(&reference, &store)?;
            dump::graph(&container, io::stdout().lock())?;
        }
    }
    Ok(())
}

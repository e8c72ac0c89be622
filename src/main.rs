use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use chest::chain::{free_page_set, read_chain, ChainReader};
use chest::{build_container, parse_container, Catalog, FileStore, NO_PAGE};

#[derive(Parser)]
#[command(name = "chest", about = "The .chest container format CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unpack a container into a directory tree, recursing into nested
    /// containers
    Parse {
        input: PathBuf,
        output_dir: PathBuf,
    },
    /// Pack a directory tree back into a container
    Build {
        input_dir: PathBuf,
        output: PathBuf,
    },
    /// List catalog entries
    List {
        input: PathBuf,
    },
    /// Show container header and page statistics
    Info {
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let ok = match Cli::parse().command {
        Commands::Parse { input, output_dir } => parse_container(&input, &output_dir),
        Commands::Build { input_dir, output } => build_container(&input_dir, &output),
        Commands::List { input } => report(list(&input)),
        Commands::Info { input } => report(info(&input)),
    };
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn report(result: chest::Result<()>) -> bool {
    if let Err(e) = result {
        eprintln!("error: {e}");
        return false;
    }
    true
}

fn open_catalog(input: &Path) -> chest::Result<(FileStore<BufReader<File>>, Catalog)> {
    let mut store = FileStore::open(BufReader::new(File::open(input)?))?;
    let root = store.header().root_page;
    let catalog = if root == NO_PAGE {
        Catalog::default()
    } else {
        Catalog::decode(&read_chain(&mut store, root)?)?
    };
    Ok((store, catalog))
}

// ── List ─────────────────────────────────────────────────────────────────────

fn list(input: &Path) -> chest::Result<()> {
    let (mut store, catalog) = open_catalog(input)?;

    println!("{:<32} {:>10} {:>7}  Compressed", "Name", "Stored", "Pages");
    for (disk_name, entry) in catalog.disambiguated() {
        let stored = read_chain(&mut store, entry.data_head)?.len();
        let pages = ChainReader::open(&mut store, entry.data_head).count_pages()?;
        println!(
            "{:<32} {:>10} {:>7}  {}",
            disk_name,
            stored,
            pages,
            if entry.is_compressed() { "deflate" } else { "raw" }
        );
    }
    Ok(())
}

// ── Info ─────────────────────────────────────────────────────────────────────

fn info(input: &Path) -> chest::Result<()> {
    let (mut store, catalog) = open_catalog(input)?;
    let header = store.header().clone();
    let free = free_page_set(&mut store, &header)?;

    println!("── .chest container ─────────────────────────────────────");
    println!("  Path        {}", input.display());
    println!("  Page size   {} B", header.page_size);
    println!("  Pages       {}", header.page_count);
    if header.root_page == NO_PAGE {
        println!("  Catalog     (empty)");
    } else {
        println!("  Catalog     page {}", header.root_page);
    }
    println!("  Elements    {}", catalog.entries.len());
    println!("  Free pages  {}", free.len());
    Ok(())
}

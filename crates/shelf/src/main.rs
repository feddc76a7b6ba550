mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use shelf_platform::{AppPaths, Settings};
use shelf_sync::{
    Library, LibraryEntry, LibraryRoots, NullWatcher, RemoteSource, UpdateOutcome, UpdateProgress,
};

#[derive(Parser)]
#[command(
    name = "shelf",
    version,
    about = "Maintain a local, versioned mirror of the remote master library"
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the installed and latest library revisions
    Status,
    /// Download the latest snapshot and replace the local mirror
    Update {
        /// Only update when no library is installed yet
        #[arg(long)]
        if_missing: bool,
    },
    /// List the contents of the master and user libraries
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match AppPaths::new() {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("shelf: {error}");
            return ExitCode::FAILURE;
        }
    };
    let settings = Settings::load(&paths);
    logging::init(cli.debug || settings.debug_logging);

    let library = Library::new(
        LibraryRoots {
            master: settings.master_library_dir(&paths),
            user: settings.user_library_dir(&paths),
        },
        remote_source(&settings),
        paths.staging_dir(),
    );

    match cli.command {
        Command::Status => status(&library).await,
        Command::Update { if_missing } => update(&library, if_missing).await,
        Command::List => list(&library).await,
    }
}

fn remote_source(settings: &Settings) -> RemoteSource {
    let mut source = RemoteSource::default();
    if let Some(owner) = settings.remote_owner.clone() {
        source.owner = owner;
    }
    if let Some(repo) = settings.remote_repo.clone() {
        source.repo = repo;
    }
    if let Some(branch) = settings.remote_branch.clone() {
        source.branch = branch;
    }
    source
}

async fn status(library: &Library) -> ExitCode {
    let recorded = library.recorded_revision();
    if recorded.is_empty() {
        println!("Installed: (not installed)");
    } else {
        println!("Installed: {recorded}");
    }

    let latest = library.latest_revision().await;
    if latest.is_empty() {
        println!("Latest:    (unknown)");
    } else {
        println!("Latest:    {latest}");
        if shelf_sync::needs_update_for(&recorded, &latest) {
            println!("An update is available; run `shelf update`.");
        } else {
            println!("The library is up to date.");
        }
    }

    if let Some(minimum) = library.minimum_app_version().await
        && let Ok(own) = semver::Version::parse(env!("CARGO_PKG_VERSION"))
        && own < minimum
    {
        println!("Note: the library requires shelf {minimum} or newer (this is {own}).");
    }

    ExitCode::SUCCESS
}

async fn update(library: &Library, if_missing: bool) -> ExitCode {
    let (events_tx, mut events_rx) = mpsc::channel(64);
    let reporter = tokio::spawn(async move {
        let mut last_percent = None;
        while let Some(event) = events_rx.recv().await {
            match event {
                UpdateProgress::Started => println!("Downloading the master library…"),
                UpdateProgress::Downloading { downloaded, total } if total > 0 => {
                    let percent = downloaded * 100 / total;
                    if last_percent != Some(percent) && percent.is_multiple_of(10) {
                        println!("  {percent}%");
                        last_percent = Some(percent);
                    }
                }
                UpdateProgress::Downloading { .. } => {}
                UpdateProgress::Extracting => println!("Installing…"),
                UpdateProgress::Finished(_) => {}
            }
        }
    });

    let outcome = if if_missing {
        library.update_if_missing(events_tx).await
    } else {
        library.update(events_tx).await
    };
    let _ = reporter.await;

    match outcome {
        UpdateOutcome::Success { revision } => {
            println!("Master library is at revision {revision}.");
            ExitCode::SUCCESS
        }
        UpdateOutcome::Failure { message } => {
            eprintln!("Master library update failed: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn list(library: &Library) -> ExitCode {
    match library.collect(Arc::new(NullWatcher)).await {
        Ok(listing) => {
            print_entry(&listing.master, 0);
            print_entry(&listing.user, 0);
            ExitCode::SUCCESS
        }
        Err(error) => {
            // An unreadable tree is reported as unavailable, never as empty.
            eprintln!("shelf: library listing unavailable: {error}");
            ExitCode::FAILURE
        }
    }
}

fn print_entry(entry: &LibraryEntry, depth: usize) {
    println!("{}{}", "  ".repeat(depth), entry.name());
    if let LibraryEntry::Dir { children, .. } = entry {
        for child in children {
            print_entry(child, depth + 1);
        }
    }
}

//! mpsync - one-way directory sync onto a MicroPython device
//!
//! The device is driven over its serial raw-REPL channel; the local tree is
//! always authoritative. `list` shows either side with the same filtering
//! the sync uses.

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use crossterm::style::{Color, Stylize};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

use mpsync::channel::SerialChannel;
use mpsync::diff::{diff, ChangePolicy};
use mpsync::filter::FilterSpec;
use mpsync::logger::{Logger, NoopLogger, TextLogger};
use mpsync::sync::{apply, SyncOptions};
use mpsync::tree::tree_map;
use mpsync::walk::{walk_local, walk_remote, FileEntry};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Sync a local directory tree onto a MicroPython device over serial"
)]
struct Args {
    /// Serial device node of the board
    #[arg(long, global = true, env = "MPSYNC_PORT", default_value = "/dev/ttyACM0")]
    port: PathBuf,

    /// Append timestamped action log entries to this file
    #[arg(long = "log-file", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List files on the device, or locally with -l
    List {
        /// Directory to list (default: $MPSYNC_REMOTE_PATH or /, local: $MPSYNC_LOCAL_PATH or .)
        path: Option<String>,

        /// List files on the local machine instead of the device
        #[arg(short, long)]
        local: bool,

        /// File patterns to include (default: all files)
        #[arg(long, num_args = 0.., default_value = "*")]
        include: Vec<String>,

        /// File patterns to exclude
        #[arg(long, num_args = 0..)]
        exclude: Vec<String>,
    },

    /// Synchronize a local directory onto the device (local side wins)
    Sync {
        /// Local source directory
        #[arg(env = "MPSYNC_LOCAL_PATH", default_value = ".")]
        local_path: PathBuf,

        /// Destination directory on the device
        #[arg(env = "MPSYNC_REMOTE_PATH", default_value = "/")]
        remote_path: String,

        /// Only show differences, do not sync
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Only upload changes, never delete files on the device
        #[arg(short = 'u', long)]
        upload_only: bool,

        /// File patterns to include (default: all files)
        #[arg(long, num_args = 0.., default_value = "*")]
        include: Vec<String>,

        /// File patterns to exclude
        #[arg(long, num_args = 0..)]
        exclude: Vec<String>,

        /// Also treat an older destination mtime as a change (requires synced clocks)
        #[arg(long)]
        mtime: bool,
    },
}

fn main() -> Result<()> {
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Exiting (Ctrl-C)...");
        // 128 + SIGINT
        std::process::exit(130);
    })
    .expect("Error setting Ctrl-C handler");

    let args = Args::parse();

    match &args.command {
        Command::List {
            path,
            local,
            include,
            exclude,
        } => cmd_list(&args, path.clone(), *local, include, exclude),
        Command::Sync {
            local_path,
            remote_path,
            dry_run,
            upload_only,
            include,
            exclude,
            mtime,
        } => cmd_sync(
            &args,
            local_path,
            remote_path,
            SyncOptions {
                dry_run: *dry_run,
                upload_only: *upload_only,
                policy: if *mtime {
                    ChangePolicy::SizeAndMtime
                } else {
                    ChangePolicy::SizeOnly
                },
            },
            include,
            exclude,
        ),
    }
}

fn cmd_list(
    args: &Args,
    path: Option<String>,
    local: bool,
    include: &[String],
    exclude: &[String],
) -> Result<()> {
    // Compile patterns before any walk so bad globs fail fast
    let filter = FilterSpec::new(include, exclude)?;

    let path = path.unwrap_or_else(|| {
        if local {
            std::env::var("MPSYNC_LOCAL_PATH").unwrap_or_else(|_| ".".into())
        } else {
            std::env::var("MPSYNC_REMOTE_PATH").unwrap_or_else(|_| "/".into())
        }
    });

    let entries = if local {
        walk_local(Path::new(&path))?
    } else {
        let mut channel = SerialChannel::new(open_port(&args.port)?);
        let spinner = listing_spinner("Listing device files...");
        let entries = walk_remote(&mut channel, &path);
        spinner.finish_and_clear();
        entries?
    };

    for entry in filter.apply(entries) {
        print_entry(&entry);
    }
    Ok(())
}

fn print_entry(entry: &FileEntry) {
    let indent = "    ".repeat(entry.depth as usize);
    if entry.is_dir() {
        println!(
            "{:7}  {:19}  {}{}/",
            "",
            "",
            indent,
            entry.name().with(Color::Green)
        );
    } else {
        println!(
            "{:7}  {:19}  {}{}",
            entry.size,
            format_mtime(entry.mtime),
            indent,
            entry.name().with(Color::Cyan)
        );
    }
}

fn format_mtime(mtime: f64) -> String {
    match Local.timestamp_opt(mtime as i64, 0).single() {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "?".to_string(),
    }
}

fn cmd_sync(
    args: &Args,
    local_path: &Path,
    remote_path: &str,
    opts: SyncOptions,
    include: &[String],
    exclude: &[String],
) -> Result<()> {
    let filter = FilterSpec::new(include, exclude)?;

    let logger: Box<dyn Logger> = match &args.log_file {
        Some(path) => Box::new(TextLogger::new(path)?),
        None => Box::new(NoopLogger),
    };

    // The two walks are independent: run the local one on its own thread
    // while the remote listing occupies the serial channel. The channel
    // itself never leaves this flow; it supports one request at a time.
    let local_filter = filter.clone();
    let local_root = local_path.to_path_buf();
    let local_walk =
        std::thread::spawn(move || walk_local(&local_root).map(|e| local_filter.apply(e)));

    let mut channel = SerialChannel::new(open_port(&args.port)?);
    let spinner = listing_spinner("Listing device files...");
    let remote_entries = walk_remote(&mut channel, remote_path);
    spinner.finish_and_clear();
    let remote_entries = filter.apply(remote_entries?);

    let local_entries = local_walk
        .join()
        .expect("local walker thread panicked")
        .context("failed to walk local directory")?;

    let source = tree_map(&local_entries);
    let dest = tree_map(&remote_entries);
    let plan = diff(&source, &dest, opts.policy);

    apply(
        &mut channel,
        &plan,
        local_path,
        remote_path,
        &opts,
        logger.as_ref(),
    )?;
    Ok(())
}

fn listing_spinner(msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(msg.to_string());
    spinner
}

fn open_port(path: &Path) -> Result<std::fs::File> {
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("failed to open serial port {:?}", path))?;
    #[cfg(unix)]
    set_raw_mode(&file)?;
    Ok(file)
}

/// Put a tty into raw mode so the REPL sees bytes unmodified. Non-tty
/// targets (ptys under test, socket forwards) are left alone.
#[cfg(unix)]
fn set_raw_mode(file: &std::fs::File) -> Result<()> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    // SAFETY: fd stays open for the duration of the calls below
    unsafe {
        if libc::isatty(fd) != 1 {
            return Ok(());
        }
        let mut tio: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut tio) != 0 {
            return Err(std::io::Error::last_os_error()).context("tcgetattr failed");
        }
        libc::cfmakeraw(&mut tio);
        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(std::io::Error::last_os_error()).context("tcsetattr failed");
        }
    }
    Ok(())
}

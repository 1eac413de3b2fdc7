//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the signal handler and
//! dispatches to the subcommand.

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};
use walkdir::WalkDir;

use atomic_paths::cli::{Args, Command};
use atomic_paths::output as out;
use atomic_paths::config::load_config;
use atomic_paths::{
    find_orphans, remove_orphans, shutdown, AtomicPathsError, Config, Options, SweepOptions,
};

use crate::logging::init_tracing;

const COPY_BUF: usize = 64 * 1024;

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    let mut cfg = match load_config()? {
        Some((cfg, path)) => {
            debug!(path = %path.display(), "loaded config");
            cfg
        }
        None => Config::default(),
    };
    args.apply_overrides(&mut cfg);

    let guard_opt = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json).map_err(|e| {
        out::print_error(&format!("Failed to initialize logging: {e}"));
        e
    })?;

    // Dropped on SIGINT to flush the file appender.
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        ctrlc::set_handler(move || {
            if shutdown::is_requested() {
                // Second interrupt: a copy may be blocked on input; leave now.
                std::process::exit(130);
            }
            shutdown::request();
            out::print_warn("Received interrupt; discarding pending changes...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take();
            }
        })
        .context("install signal handler")?;
    }

    debug!(?args, "starting atomic_paths");

    let result = dispatch(&args.command, &cfg);
    if let Err(e) = &result {
        log_failure(e);
    }

    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }
    result
}

fn dispatch(command: &Command, cfg: &Config) -> Result<()> {
    let opts = cfg.options();
    match command {
        Command::Write { path, input, .. } => {
            write_file(&opts, path, input.as_deref(), cfg.file_mode)?;
            out::print_success(&format!("wrote {}", path.display()));
        }
        Command::InstallDir { source, target, .. } => {
            install_dir(&opts, source, target, cfg.dir_mode)?;
            out::print_success(&format!("installed {} -> {}", source.display(), target.display()));
        }
        Command::Sweep {
            dir,
            max_depth,
            remove,
            dry_run,
            ..
        } => {
            let sweep_opts = SweepOptions {
                max_depth: *max_depth,
                dry_run: *dry_run,
                ..cfg.sweep_options()
            };
            let orphans = if *remove {
                remove_orphans(dir, &sweep_opts)?
            } else {
                find_orphans(dir, &sweep_opts)?
            };
            for o in &orphans {
                out::print_user(&o.path.display().to_string());
            }
            info!(dir = %dir.display(), count = orphans.len(), removed = *remove && !*dry_run, "sweep finished");
        }
    }
    Ok(())
}

fn log_failure(e: &anyhow::Error) {
    if let Some(ap) = e.downcast_ref::<AtomicPathsError>() {
        let code = ap.code();
        match ap.op() {
            Some(op) => error!(code, op = %op, error = %ap, "operation failed"),
            None => error!(code, error = %ap, "operation failed"),
        }
    } else {
        error!(error = %format!("{e:#}"), "operation failed");
    }
}

/// Copy `reader` to `writer`, stopping early on a shutdown request.
fn copy_interruptible(reader: &mut impl Read, writer: &mut impl Write) -> io::Result<u64> {
    let mut buf = vec![0u8; COPY_BUF];
    let mut total = 0u64;
    loop {
        if shutdown::is_requested() {
            return Err(shutdown::interrupted());
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
}

/// Stream stdin (or `input`) into a temporary file next to `path` and commit it.
/// Any failure before the commit discards the temporary file.
pub fn write_file(opts: &Options, path: &Path, input: Option<&Path>, mode: u32) -> Result<()> {
    let mut tmp = opts.create_file(path, mode)?;
    debug!(temp = %tmp.name().display(), "writing");

    let copied = match input {
        Some(src) => fs::File::open(src)
            .with_context(|| format!("open input '{}'", src.display()))
            .and_then(|mut f| copy_interruptible(&mut f, &mut tmp).context("copy input")),
        None => copy_interruptible(&mut io::stdin().lock(), &mut tmp).context("copy stdin"),
    };

    let bytes = match copied {
        Ok(n) => n,
        Err(e) => {
            if let Err(close_err) = tmp.close() {
                error!(error = %close_err, "failed to discard temporary file");
            }
            return Err(e);
        }
    };

    tmp.commit()?;
    info!(path = %path.display(), bytes, "file committed");
    Ok(())
}

/// Copy the `source` tree into a temporary directory next to `target`, then
/// swap it into place. Files are copied in parallel.
pub fn install_dir(opts: &Options, source: &Path, target: &Path, mode: u32) -> Result<()> {
    let meta = fs::metadata(source).with_context(|| format!("stat source '{}'", source.display()))?;
    if !meta.is_dir() {
        bail!("source is not a directory: {}", source.display());
    }

    let mut tmp = opts.create_dir(target, mode)?;
    match copy_tree(source, tmp.name()) {
        Ok(files) => debug!(files, "tree copied"),
        Err(e) => {
            if let Err(close_err) = tmp.close() {
                error!(error = %close_err, "failed to discard temporary directory");
            }
            return Err(e);
        }
    }

    tmp.commit()?;
    info!(source = %source.display(), target = %target.display(), "directory installed");
    Ok(())
}

fn copy_tree(src_root: &Path, dst_root: &Path) -> Result<usize> {
    let mut files: Vec<(PathBuf, PathBuf)> = Vec::new();

    // Directories come before their contents in walk order.
    for entry in WalkDir::new(src_root).min_depth(1) {
        let entry = entry.with_context(|| format!("walk '{}'", src_root.display()))?;
        let rel = entry.path().strip_prefix(src_root)?;
        let dst = dst_root.join(rel);
        let ft = entry.file_type();
        if ft.is_dir() {
            fs::create_dir(&dst).with_context(|| format!("create dir '{}'", dst.display()))?;
        } else if ft.is_symlink() {
            let link = fs::read_link(entry.path())
                .with_context(|| format!("read link '{}'", entry.path().display()))?;
            std::os::unix::fs::symlink(&link, &dst)
                .with_context(|| format!("create symlink '{}'", dst.display()))?;
        } else if ft.is_file() {
            files.push((entry.into_path(), dst));
        } else {
            debug!(path = %entry.path().display(), "skipping special file");
        }
    }

    files.par_iter().try_for_each(|(from, to)| -> Result<()> {
        if shutdown::is_requested() {
            return Err(shutdown::interrupted().into());
        }
        fs::copy(from, to)
            .with_context(|| format!("copy '{}' -> '{}'", from.display(), to.display()))?;
        Ok(())
    })?;

    Ok(files.len())
}

//! `jotnal` — command-line front end for the encrypted Jotnal store.
//!
//! # Usage
//!
//! ```
//! jotnal info
//! jotnal passwd
//! jotnal set-path ~/work/jotnal.db
//! jotnal interface set --theme light --font-size 16
//! ```
//!
//! On first run a preferences file is created under `~/.jotnal/` and a store
//! password is requested before the store is created.

mod session;

use std::{
  io::{self, Write as _},
  path::PathBuf,
};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use jotnal_core::{
  Preferences, PreferencesStore,
  preferences::{InterfaceSettings, home_dir},
};
use jotnal_store_sqlite::Registry;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "jotnal", author, version, about = "Encrypted local store for Jotnal")]
struct Cli {
  /// Path to the preferences file (default: ~/.jotnal/config.json).
  #[arg(long, env = "JOTNAL_PREFS", value_name = "FILE")]
  prefs: Option<PathBuf>,

  /// Store password to set on first run instead of prompting.
  #[arg(long, env = "JOTNAL_PASSWORD", hide_env_values = true)]
  password: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Open the store and show its path, version, tables and history.
  Info,
  /// Re-encrypt the store under a new password and save it.
  Passwd {
    /// The new password (prompted for when absent).
    #[arg(long, env = "JOTNAL_NEW_PASSWORD", hide_env_values = true)]
    new: Option<String>,
  },
  /// Save a new store location; used from the next start.
  SetPath { path: PathBuf },
  /// Show or change interface settings.
  Interface {
    #[command(subcommand)]
    action: InterfaceAction,
  },
}

#[derive(Subcommand, Debug)]
enum InterfaceAction {
  Show,
  /// Change the given settings, keeping the rest.
  Set {
    #[arg(long)]
    theme:     Option<String>,
    #[arg(long)]
    font_size: Option<u32>,
    #[arg(long)]
    width:     Option<u32>,
    #[arg(long)]
    height:    Option<u32>,
    #[arg(long)]
    language:  Option<String>,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
  // Logs go to stderr so command output stays clean.
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let home = home_dir()?;
  let prefs_store = match &cli.prefs {
    Some(path) => PreferencesStore::new(path),
    None => PreferencesStore::at_default_location()?,
  };
  let mut prefs = prefs_store
    .load_or_init(&home)
    .context("loading preferences")?;
  if prefs.was_created() {
    println!("Created preferences at {}", prefs.file_path().display());
  }

  let mut input = session::Terminal;
  let mut out = io::stdout().lock();

  match cli.command.unwrap_or(Command::Info) {
    Command::Info => {
      session::ensure_password(&mut prefs, cli.password.as_deref(), &mut input, &mut out)?;
      let manager = session::open_store(&prefs, Registry::builtin())?;
      session::render_info(&manager, &mut out)?;
    }
    Command::Passwd { new } => {
      session::ensure_password(&mut prefs, cli.password.as_deref(), &mut input, &mut out)?;
      let mut manager = session::open_store(&prefs, Registry::builtin())?;
      let new = match new {
        Some(p) => p,
        None => session::read_new_password(&mut input, &mut out)?,
      };
      session::change_password(&mut manager, &mut prefs, &new)?;
      manager.close();
      writeln!(out, "Store password changed")?;
    }
    Command::SetPath { path } => {
      prefs.update_store_path(&path).context("saving store path")?;
      writeln!(out, "Store path set to {}; restart to use it", path.display())?;
    }
    Command::Interface { action } => match action {
      InterfaceAction::Show => show_interface(&prefs, &mut out)?,
      InterfaceAction::Set { theme, font_size, width, height, language } => {
        let current = &prefs.document().interface;
        let settings = InterfaceSettings {
          theme:     theme.unwrap_or_else(|| current.theme.clone()),
          font_size: font_size.unwrap_or(current.font_size),
          width:     width.unwrap_or(current.window_size.width),
          height:    height.unwrap_or(current.window_size.height),
          language:  language.unwrap_or_else(|| current.language.clone()),
        };
        prefs.update_interface(settings).context("saving interface settings")?;
        show_interface(&prefs, &mut out)?;
      }
    },
  }

  Ok(())
}

fn show_interface(prefs: &Preferences, out: &mut impl io::Write) -> Result<()> {
  let interface = &prefs.document().interface;
  writeln!(out, "Theme:       {}", interface.theme)?;
  writeln!(out, "Font size:   {}", interface.font_size)?;
  writeln!(
    out,
    "Window size: {}x{}",
    interface.window_size.width, interface.window_size.height
  )?;
  writeln!(out, "Language:    {}", interface.language)?;
  Ok(())
}

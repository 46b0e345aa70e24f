// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `holo`: command-line host for lightfield displays.
//!
//! Lists quilt formats and devices, sends quilts (or the daemon's cached and
//! demo content) to a display, and packs/unpacks quilt image files.
//!
//! # Usage
//! ```text
//! holo [--socket PATH] [--timeout-ms MS] [-v] <command> [options]
//! ```
//!
//! Exit code `0` on success, non-zero on error.

// The CLI is expected to print to stdout.
#![allow(clippy::print_stdout)]

mod commands;
mod session;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use holo_device::{DeviceId, RegistryError};
use holo_quilt::{FormatError, FormatId};
use holo_service_proto::ProtocolError;
use tracing_subscriber::EnvFilter;

const DRIVER_HINT: &str = "driver not running / unreachable";
const DIMENSIONS_HINT: &str = "unsupported image dimensions";

#[derive(Parser, Debug)]
#[command(author, version, about = "Lightfield display host")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct GlobalArgs {
    /// Display daemon socket (default: saved preference, then HOLO_DRIVER_SOCKET, then the well-known path)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,
    /// Send/receive timeout in milliseconds (default: saved preference)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    /// Directory holding the saved preferences
    #[arg(long, global = true, env = "HOLO_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered quilt formats
    Formats {
        /// Include hidden formats
        #[arg(long)]
        all: bool,
    },
    /// List displays reported by the daemon plus emulated ones
    Info {
        /// Print device records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Send a quilt image to a display
    Show {
        /// Quilt image file
        quilt: PathBuf,
        /// Target device id (default: active device)
        #[arg(long)]
        device: Option<DeviceId>,
        /// View aspect ratio (default: the quilt format's)
        #[arg(long)]
        aspect: Option<f32>,
        /// Reverse view order on the display
        #[arg(long)]
        invert: bool,
    },
    /// Play the daemon's demo content
    Demo {
        /// Target device id (default: active device)
        #[arg(long)]
        device: Option<DeviceId>,
    },
    /// Show the quilt the daemon has cached
    Cache {
        /// Target device id (default: active device)
        #[arg(long)]
        device: Option<DeviceId>,
    },
    /// Clear a display
    Hide {
        /// Target device id (default: active device)
        #[arg(long)]
        device: Option<DeviceId>,
    },
    /// Split a quilt image into one PNG per view
    Unpack {
        /// Quilt image file
        quilt: PathBuf,
        /// Directory for the view files
        out_dir: PathBuf,
    },
    /// Tile view images into a quilt image
    Pack {
        /// Quilt format id (see `holo formats`)
        #[arg(long)]
        format: FormatId,
        /// Output quilt file; the extension picks the container
        out: PathBuf,
        /// View images, first view first
        #[arg(required = true)]
        views: Vec<PathBuf>,
        /// Views are stored bottom row first
        #[arg(long)]
        flip: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    run(&cli).map_err(with_hint)
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let global = &cli.global;
    match &cli.command {
        Command::Formats { all } => commands::formats(global, *all),
        Command::Info { json } => commands::info(global, *json),
        Command::Show {
            quilt,
            device,
            aspect,
            invert,
        } => commands::show(global, quilt, *device, *aspect, *invert),
        Command::Demo { device } => {
            commands::show_source(global, *device, holo_service_proto::ShowSource::Demo)
        }
        Command::Cache { device } => {
            commands::show_source(global, *device, holo_service_proto::ShowSource::Cache)
        }
        Command::Hide { device } => commands::hide(global, *device),
        Command::Unpack { quilt, out_dir } => commands::unpack(global, quilt, out_dir),
        Command::Pack {
            format,
            out,
            views,
            flip,
        } => commands::pack(global, *format, out, views, *flip),
    }
}

/// Prefix daemon and image-size failures with a plain-language summary.
fn with_hint(err: anyhow::Error) -> anyhow::Error {
    match hint(&err) {
        Some(summary) => err.context(summary),
        None => err,
    }
}

fn hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if cause.is::<ProtocolError>() {
            return Some(DRIVER_HINT);
        }
        if let Some(format) = cause.downcast_ref::<FormatError>() {
            return format_hint(format);
        }
        match cause.downcast_ref::<RegistryError>()? {
            RegistryError::Protocol(_) => Some(DRIVER_HINT),
            RegistryError::Format(format) => format_hint(format),
            _ => None,
        }
    })
}

fn format_hint(err: &FormatError) -> Option<&'static str> {
    match err {
        FormatError::UnsupportedQuiltDimensions { .. }
        | FormatError::IncompleteViewSet { .. }
        | FormatError::ViewFormatMismatch { .. }
        | FormatError::TooManyViews { .. } => Some(DIMENSIONS_HINT),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn protocol_failures_get_the_driver_hint() {
        let err = anyhow::Error::new(ProtocolError::NoService).context("connect");
        assert_eq!(hint(&err), Some(DRIVER_HINT));
        let wrapped = anyhow::Error::new(RegistryError::Protocol(ProtocolError::Timeout));
        assert_eq!(hint(&wrapped), Some(DRIVER_HINT));
    }

    #[test]
    fn dimension_failures_get_the_size_hint() {
        let err = anyhow::Error::new(FormatError::UnsupportedQuiltDimensions {
            width: 3,
            height: 3,
        });
        assert_eq!(hint(&err), Some(DIMENSIONS_HINT));
        assert_eq!(hint(&anyhow::anyhow!("other")), None);
        assert_eq!(
            hint(&anyhow::Error::new(RegistryError::NoActiveDevice)),
            None
        );
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["holo", "-vv", "formats", "--all"]).unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert!(matches!(cli.command, Command::Formats { all: true }));
    }

    #[test]
    fn pack_requires_views() {
        assert!(Cli::try_parse_from(["holo", "pack", "--format", "1", "out.png"]).is_err());
        let cli =
            Cli::try_parse_from(["holo", "pack", "--format", "1", "out.png", "a.png", "b.png"])
                .unwrap();
        match cli.command {
            Command::Pack { format, views, flip, .. } => {
                assert_eq!(format, 1);
                assert_eq!(views.len(), 2);
                assert!(!flip);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

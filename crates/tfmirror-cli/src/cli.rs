use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};
use tfmirror_utils::{bytes::parse_bytes, version::VersionFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the versions published by a release upstream
    #[command(arg_required_else_help = true)]
    #[clap(name = "versions", visible_alias = "ls")]
    Versions {
        /// Upstream name from the config, or a release server / GitHub URL
        upstream: String,

        /// Product to list when the upstream is given as a URL
        #[arg(required = false, long)]
        product: Option<String>,

        /// Select versions: `latest:N`, `>=1.5.0`, `1.9.`, `1.9.x`, or a comma-separated list
        #[arg(required = false, short, long, value_parser = VersionFilter::parse)]
        filter: Option<VersionFilter>,
    },

    /// Download a release, verify its signature and checksums, and write the binaries
    #[command(arg_required_else_help = true)]
    Fetch {
        /// Upstream name from the config, or a release server / GitHub URL
        upstream: String,

        /// Version to fetch
        version: String,

        /// Product to fetch when the upstream is given as a URL
        #[arg(required = false, long)]
        product: Option<String>,

        /// Only fetch builds for this operating system
        #[arg(required = false, long)]
        os: Option<String>,

        /// Only fetch builds for this architecture
        #[arg(required = false, long)]
        arch: Option<String>,

        /// Directory to write the verified binaries to
        #[arg(required = false, short, long, default_value = ".", value_hint = ValueHint::DirPath)]
        output: PathBuf,

        /// Additional ASCII-armored public key to trust (repeatable)
        #[arg(required = false, short, long = "key", value_hint = ValueHint::FilePath)]
        keys: Vec<PathBuf>,

        /// Do not verify the SHA256SUMS signature
        #[arg(required = false, long)]
        skip_signature: bool,
    },

    /// Query a provider registry
    #[command(arg_required_else_help = true)]
    Provider {
        #[clap(subcommand)]
        action: ProviderAction,
    },

    /// Verify a detached OpenPGP signature against one or more public keys
    #[command(arg_required_else_help = true)]
    VerifySignature {
        /// ASCII-armored public key (repeatable)
        #[arg(required = true, short, long = "key", value_hint = ValueHint::FilePath)]
        keys: Vec<PathBuf>,

        /// The signed file
        #[arg(value_hint = ValueHint::FilePath)]
        data: PathBuf,

        /// The detached signature, armored or binary
        #[arg(value_hint = ValueHint::FilePath)]
        signature: PathBuf,
    },

    /// Check that a .tar.gz archive is safe to extract
    #[command(arg_required_else_help = true)]
    CheckArchive {
        /// Archive to check
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,

        /// Maximum total uncompressed size, e.g. `100MiB` (default from config)
        #[arg(required = false, long, value_parser = parse_bytes)]
        max_size: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum ProviderAction {
    /// List the published versions of a provider
    #[command(arg_required_else_help = true)]
    Versions {
        /// Registry name from the config, or a registry URL
        registry: String,

        /// Provider address as NAMESPACE/TYPE
        provider: String,
    },

    /// Show the download metadata of one provider build
    #[command(arg_required_else_help = true)]
    Package {
        /// Registry name from the config, or a registry URL
        registry: String,

        /// Provider address as NAMESPACE/TYPE
        provider: String,

        /// Provider version
        version: String,

        /// Target operating system
        os: String,

        /// Target architecture
        arch: String,

        /// Download, verify and write the package into this directory
        #[arg(required = false, short, long, value_hint = ValueHint::DirPath)]
        download: Option<PathBuf>,
    },
}

use std::path::Path;

use clap::Parser;
use cli::{Args, Commands, ProviderAction};
use context::AppContext;
use error::CliResult;
use fetch::{fetch, FetchArgs};
use logging::setup_logging;
use provider::{list_provider_versions, show_provider_package, PackageArgs};
use tfmirror_config::Config;
use tracing::debug;
use verify::{check_archive, verify_signature_files};
use versions::list_versions;

mod cli;
mod context;
mod error;
mod fetch;
mod logging;
mod provider;
mod utils;
mod verify;
mod versions;

fn load_context(config_path: Option<&Path>) -> CliResult<AppContext> {
    let config = match config_path {
        Some(path) => Config::load(path)?,
        None => Config::new()?,
    };
    debug!(
        "{} upstream(s), {} registry(ies) configured",
        config.upstreams.len(),
        config.registries.len()
    );
    AppContext::new(config)
}

fn handle_cli() -> CliResult<()> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        utils::disable_color();
    }

    let json = args.json;
    let config_path = args.config.as_deref();

    match args.command {
        Commands::Versions {
            upstream,
            product,
            filter,
        } => {
            let ctx = load_context(config_path)?;
            list_versions(
                &ctx,
                &upstream,
                product.as_deref(),
                filter.as_ref(),
                json,
            )?;
        }
        Commands::Fetch {
            upstream,
            version,
            product,
            os,
            arch,
            output,
            keys,
            skip_signature,
        } => {
            let ctx = load_context(config_path)?;
            let args = FetchArgs {
                upstream,
                version,
                product,
                os,
                arch,
                output,
                keys,
                skip_signature,
            };
            fetch(&ctx, args, json)?;
        }
        Commands::Provider { action } => {
            let ctx = load_context(config_path)?;
            match action {
                ProviderAction::Versions { registry, provider } => {
                    list_provider_versions(&ctx, &registry, &provider, json)?;
                }
                ProviderAction::Package {
                    registry,
                    provider,
                    version,
                    os,
                    arch,
                    download,
                } => {
                    let args = PackageArgs {
                        registry,
                        provider,
                        version,
                        os,
                        arch,
                        download,
                    };
                    show_provider_package(&ctx, args, json)?;
                }
            }
        }
        Commands::VerifySignature {
            keys,
            data,
            signature,
        } => {
            verify_signature_files(&keys, &data, &signature, json)?;
        }
        Commands::CheckArchive { file, max_size } => {
            let ctx = load_context(config_path)?;
            check_archive(&ctx, &file, max_size, json)?;
        }
    }

    Ok(())
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli() {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}

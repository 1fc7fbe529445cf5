pub mod category;
pub mod cli;
pub mod commands;
pub mod config;
pub mod counts;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod render;
pub mod repo;
pub mod stats;
pub mod store;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::info;

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting taskdeck CLI"
    );

    let mut cfg = config::Config::load(cli.config.as_deref())?;
    cfg.apply_overrides(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value)));

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;

    let store = datastore::DataStore::open(&data_dir)
        .with_context(|| format!("failed to open datastore at {}", data_dir.display()))?;

    let mut tasks = store::TaskStore::new(Box::new(store.task_repository()?));
    let mut categories = store::CategoryStore::new(Box::new(store.category_repository()?));

    let mut renderer = render::Renderer::new(&cfg)?;
    let inv = cli::Invocation::parse(&cfg, cli.rest)?;

    commands::dispatch(&mut tasks, &mut categories, &cfg, &mut renderer, inv)?;

    info!("done");
    Ok(())
}

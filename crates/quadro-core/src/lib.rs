pub mod api;
pub mod archive;
pub mod board;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod drag;
pub mod error;
pub mod http;
pub mod mutator;
pub mod notify;
pub mod organizer;
pub mod page;
pub mod preferences;
pub mod render;
pub mod session;
pub mod store;
pub mod tabs;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

const RELOGIN_HINT: &str =
  "run `quadro login <email>` to sign \
   in again";

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting quadro CLI"
  );

  let mut cfg = config::Config::load(
    cli.quadrorc.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );
  debug!(files = ?cfg.loaded_files, "config loaded");

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let tz = datetime::resolve_timezone(
    cfg.timezone().as_deref()
  );
  let app =
    commands::App::new(&cfg, &store, tz)?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  let result = runtime.block_on(
    commands::dispatch(
      &app,
      cli.command
    )
  );

  if let Err(err) = &result
    && err
      .downcast_ref::<error::ApiError>()
      .is_some_and(
        error::ApiError::is_authorization
      )
  {
    return result
      .context(RELOGIN_HINT);
  }

  info!("done");
  result
}

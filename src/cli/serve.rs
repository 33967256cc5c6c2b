//! `gdab serve`: action API, OAuth callback and settings page.

use crate::cli::Context;
use crate::core::scheduler::CrontabScheduler;
use crate::error::Result;
use crate::server::{self, App};

/// Execute the serve command. Runs until the process is stopped.
///
/// # Errors
/// Returns an error if the listen address cannot be bound.
pub async fn execute(ctx: Context) -> Result<()> {
    let archiver = ctx.archiver();
    let bind = ctx.config.bind;
    let app = App::from_config(
        ctx.store,
        ctx.http,
        &ctx.config,
        CrontabScheduler::default(),
        archiver,
    );
    server::serve(app, bind).await
}

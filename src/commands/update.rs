//! Update command - refresh an existing installation

use anyhow::Result;

use crate::Context as AppContext;
use crate::cli::UpdateArgs;
use crate::resolver::{Defaults, ResolveMode, Session};
use crate::{steps, ui};

pub fn run(ctx: &AppContext, args: UpdateArgs) -> Result<()> {
    ui::header("Update");

    let connection = super::connect(ctx)?;
    let mode = ResolveMode::from_flag(args.defaults);
    let defaults = Defaults::for_host(&connection.target.host).with_config(&connection.config.defaults);

    let mut session = Session::new(defaults, mode);
    session.preset_update_target(args.root_dir, args.project);

    ui::kv("host", &connection.target.to_string());
    let workflow = steps::update(connection.config.health.poll_config());
    let summary = super::provision(ctx, &workflow, &mut session, connection.runner.as_ref(), mode)?;

    super::print_summary(&summary);
    Ok(())
}

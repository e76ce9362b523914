//! `jetbuild --list-versions` command

use std::path::PathBuf;

use anyhow::Result;

use jetbuild::ops::{format_versions, list_versions};
use jetbuild::util::{GlobalContext, SystemRunner};

pub fn execute(work_dir: Option<PathBuf>, component: Option<&str>) -> Result<()> {
    let ctx = GlobalContext::new(work_dir)?;
    let runner = SystemRunner::new(ctx.log().clone());

    let listing = list_versions(&runner, component, ctx.log())?;
    print!("{}", format_versions(&listing));

    Ok(())
}

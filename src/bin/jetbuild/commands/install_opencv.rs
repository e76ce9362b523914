//! `jetbuild --install-opencv` command

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};

use jetbuild::ops::{install_opencv, InstallOpencvOptions};
use jetbuild::util::{GlobalContext, SystemRunner};
use jetbuild::{ComponentVersion, TransferEngine};

pub fn execute(work_dir: Option<PathBuf>, version: ComponentVersion) -> Result<()> {
    let ctx = GlobalContext::new(work_dir)?;
    let runner = SystemRunner::new(ctx.log().clone());

    let mut transfer = ctx.config().transfer_config();
    transfer.show_progress = std::io::stderr().is_terminal();
    let engine = TransferEngine::new(transfer, ctx.log().clone())?;

    ctx.log().info(format!("Starting OpenCV {version} installation..."));
    let options = InstallOpencvOptions::from_context(&ctx, version);
    let report = install_opencv(&ctx, options, &runner, &engine)
        .with_context(|| format!("OpenCV {version} installation failed"))?;

    if report.is_noop() {
        ctx.log().info(format!(
            "Nothing to do; remove {} to rebuild",
            ctx.ledger_path().display()
        ));
    } else {
        ctx.log().info("OpenCV installed successfully");
    }
    Ok(())
}

//! `jetbuild --install-cuda` command

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use jetbuild::ops::install_cuda;
use jetbuild::util::{GlobalContext, SystemRunner};

pub fn execute(work_dir: Option<PathBuf>) -> Result<()> {
    let ctx = GlobalContext::new(work_dir)?;
    let runner = SystemRunner::new(ctx.log().clone());

    ctx.log().info("Starting CUDA toolchain installation...");
    let report = install_cuda(&ctx, &runner).context("CUDA toolchain installation failed")?;

    if !report.all_installed() {
        bail!(
            "CUDA toolchain installation failed: {} did not verify",
            report.missing().join(", ")
        );
    }

    ctx.log().info("CUDA toolchain installed successfully");
    Ok(())
}

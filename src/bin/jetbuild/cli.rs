//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;
use jetbuild::core::DEFAULT_OPENCV_VERSION;
use jetbuild::ComponentVersion;

/// jetbuild - Jetson environment builder
#[derive(Parser)]
#[command(name = "jetbuild")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Install the CUDA toolchain, cuDNN, TensorRT and VPI
    #[arg(long)]
    pub install_cuda: bool,

    /// Build and install OpenCV from source
    #[arg(long)]
    pub install_opencv: bool,

    /// OpenCV release to install
    #[arg(long, value_name = "X.Y.Z", default_value_t = DEFAULT_OPENCV_VERSION)]
    pub opencv_version: ComponentVersion,

    /// List versions apt offers, for one component or all of them
    #[arg(long, value_name = "COMPONENT", num_args = 0..=1)]
    pub list_versions: Option<Option<String>>,

    /// Directory holding downloads, build trees and the install ledger
    #[arg(long, value_name = "DIR", env = "JETBUILD_WORK_DIR")]
    pub work_dir: Option<PathBuf>,
}

impl Cli {
    /// True when no action flag was given.
    pub fn is_idle(&self) -> bool {
        !self.install_cuda && !self.install_opencv && self.list_versions.is_none()
    }
}

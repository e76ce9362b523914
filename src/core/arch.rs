//! CUDA architecture detection from the board model string.

use std::fmt;
use std::path::Path;

/// A CUDA compute capability, as passed to `CUDA_ARCH_BIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CudaArch(&'static str);

impl CudaArch {
    pub const ORIN_NANO: CudaArch = CudaArch("8.6");
    pub const ORIN_NX: CudaArch = CudaArch("8.7");
    pub const AGX_ORIN: CudaArch = CudaArch("8.7");
    pub const AGX: CudaArch = CudaArch("7.2");
    pub const XAVIER_NX: CudaArch = CudaArch("6.2");
    /// Used when the board cannot be identified.
    pub const FALLBACK: CudaArch = CudaArch::AGX;

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for CudaArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Model substrings, most specific first.
const KNOWN_BOARDS: &[(&str, CudaArch)] = &[
    ("jetson-orin-nano", CudaArch::ORIN_NANO),
    ("jetson-orin-nx", CudaArch::ORIN_NX),
    ("jetson-agx-orin", CudaArch::AGX_ORIN),
    ("jetson-agx", CudaArch::AGX),
    ("jetson-xavier-nx", CudaArch::XAVIER_NX),
    ("jetson-xaiver-nx", CudaArch::XAVIER_NX),
];

/// Map a board model string to its CUDA architecture.
///
/// Matching ignores case and treats runs of whitespace or underscores as
/// dashes, so "NVIDIA Jetson Orin Nano Developer Kit" matches
/// `jetson-orin-nano`. Returns `None` for unknown boards.
pub fn classify(model: &str) -> Option<CudaArch> {
    let normalized = model
        .trim_matches('\0')
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    KNOWN_BOARDS
        .iter()
        .find(|(needle, _)| normalized.contains(needle))
        .map(|&(_, arch)| arch)
}

/// Read the board model from `model_path` and classify it.
///
/// Never fails: an unreadable file or unknown board yields
/// [`CudaArch::FALLBACK`] together with the reason.
pub fn probe(model_path: &Path) -> (CudaArch, String) {
    match std::fs::read_to_string(model_path) {
        Ok(model) => {
            let model = model.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            match classify(model) {
                Some(arch) => (arch, format!("Detected `{model}`, using architecture {arch}")),
                None => (
                    CudaArch::FALLBACK,
                    format!(
                        "No Jetson device detected in `{model}`, using default architecture {}",
                        CudaArch::FALLBACK
                    ),
                ),
            }
        }
        Err(e) => (
            CudaArch::FALLBACK,
            format!(
                "Unable to read {} ({e}), using default architecture {}",
                model_path.display(),
                CudaArch::FALLBACK
            ),
        ),
    }
}

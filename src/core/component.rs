//! Static description of a buildable component.

use std::collections::BTreeMap;

use crate::core::version::ComponentVersion;

/// OpenCV release built when no version is requested.
pub const DEFAULT_OPENCV_VERSION: ComponentVersion = ComponentVersion::new(4, 4, 0);

/// CMake cache entries every OpenCV build starts from.
const OPENCV_DEFAULT_OPTIONS: &[(&str, &str)] = &[
    ("CMAKE_BUILD_TYPE", "RELEASE"),
    ("CMAKE_INSTALL_PREFIX", "/usr"),
    ("EIGEN_INCLUDE_PATH", "/usr/include/eigen3"),
    ("WITH_OPENCL", "OFF"),
    ("WITH_CUDA", "ON"),
    ("WITH_CUDNN", "ON"),
    ("WITH_CUBLAS", "ON"),
    ("ENABLE_FAST_MATH", "ON"),
    ("CUDA_FAST_MATH", "ON"),
    ("OPENCV_DNN_CUDA", "ON"),
    ("ENABLE_NEON", "ON"),
    ("WITH_QT", "OFF"),
    ("WITH_OPENMP", "ON"),
    ("BUILD_TIFF", "ON"),
    ("WITH_FFMPEG", "ON"),
    ("WITH_GSTREAMER", "ON"),
    ("WITH_TBB", "ON"),
    ("BUILD_TBB", "ON"),
    ("BUILD_TESTS", "OFF"),
    ("WITH_EIGEN", "ON"),
    ("WITH_V4L", "ON"),
    ("WITH_LIBV4L", "ON"),
    ("WITH_PROTOBUF", "ON"),
    ("OPENCV_ENABLE_NONFREE", "ON"),
    ("INSTALL_C_EXAMPLES", "OFF"),
    ("INSTALL_PYTHON_EXAMPLES", "OFF"),
    ("OPENCV_GENERATE_PKGCONFIG", "ON"),
    ("BUILD_EXAMPLES", "OFF"),
];

/// Development packages the OpenCV build links against, one `apt-get
/// install` call per group.
pub const OPENCV_DEPENDENCIES: &[&[&str]] = &[
    &["qt5-default", "qtcreator"],
    &["build-essential", "git", "unzip", "pkg-config", "zlib1g-dev"],
    &["python3-dev", "python3-numpy"],
    &["gstreamer1.0-tools", "libgstreamer-plugins-base1.0-dev"],
    &["libgstreamer-plugins-good1.0-dev"],
    &["libtbb2", "libgtk-3-dev", "libxine2-dev"],
    &["cmake"],
    &["libjpeg-dev", "libjpeg8-dev", "libjpeg-turbo8-dev"],
    &["libpng-dev", "libtiff-dev", "libglew-dev"],
    &["libavcodec-dev", "libavformat-dev", "libswscale-dev"],
    &["libgtk2.0-dev", "libgtk-3-dev", "libcanberra-gtk*"],
    &["python3-pip"],
    &["libxvidcore-dev", "libx264-dev"],
    &["libtbb-dev", "libdc1394-22-dev", "libxine2-dev"],
    &["libv4l-dev", "v4l-utils", "qv4l2"],
    &["libtesseract-dev", "libpostproc-dev"],
    &["libavresample-dev", "libvorbis-dev"],
    &["libfaac-dev", "libmp3lame-dev", "libtheora-dev"],
    &["libopencore-amrnb-dev", "libopencore-amrwb-dev"],
    &["libopenblas-dev", "libatlas-base-dev", "libblas-dev"],
    &["liblapack-dev", "liblapacke-dev", "libeigen3-dev", "gfortran"],
    &["libhdf5-dev", "libprotobuf-dev", "protobuf-compiler"],
    &["libgoogle-glog-dev", "libgflags-dev"],
];

/// A component's version, where to get it and how to configure it.
///
/// Immutable once built; the orchestrator reads it for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    name: String,
    version: ComponentVersion,
    main_url: String,
    contrib_url: String,
    options: BTreeMap<String, String>,
}

impl ComponentDescriptor {
    /// OpenCV with the stock Jetson option set.
    pub fn opencv(version: ComponentVersion) -> Self {
        ComponentDescriptor {
            name: "opencv".to_string(),
            version,
            main_url: format!("https://github.com/opencv/opencv/archive/{version}.zip"),
            contrib_url: format!("https://github.com/opencv/opencv_contrib/archive/{version}.zip"),
            options: OPENCV_DEFAULT_OPTIONS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Override or add build options, consuming the descriptor.
    pub fn with_options(mut self, extra: &BTreeMap<String, String>) -> Self {
        self.options
            .extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Point the archive URLs somewhere else (mirrors, tests).
    pub fn with_urls(mut self, main_url: impl Into<String>, contrib_url: impl Into<String>) -> Self {
        self.main_url = main_url.into();
        self.contrib_url = contrib_url.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> ComponentVersion {
        self.version
    }

    pub fn main_url(&self) -> &str {
        &self.main_url
    }

    pub fn contrib_url(&self) -> &str {
        &self.contrib_url
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Directory holding this component's archives and sources, e.g.
    /// `opencv-4.4.0`.
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// Top-level directory of the extracted primary archive.
    pub fn source_dir_name(&self) -> String {
        self.dir_name()
    }

    /// Top-level directory of the extracted contrib archive.
    pub fn contrib_dir_name(&self) -> String {
        format!("{}_contrib-{}", self.name, self.version)
    }

    /// Download file names for the primary and contrib archives.
    pub fn archive_names(&self) -> (String, String) {
        (
            format!("{}.zip", self.source_dir_name()),
            format!("{}.zip", self.contrib_dir_name()),
        )
    }

    /// Pre-staged tarballs looked up in the work directory, only known for
    /// the default release.
    pub fn prestaged_archives(&self) -> Option<(String, String)> {
        (self.version == DEFAULT_OPENCV_VERSION).then(|| {
            (
                format!("{}.tar.gz", self.source_dir_name()),
                format!("{}.tar.gz", self.contrib_dir_name()),
            )
        })
    }

    /// Whether a file or directory name belongs to the contrib module.
    pub fn is_auxiliary(name: &str) -> bool {
        name.contains("contrib")
    }
}

// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Harness configuration.
//!
//! Everything has a default. [`HarnessConfig::from_env_or_default`] lets a test run be
//! reconfigured without recompiling:
//!
//! | Variable                            | Meaning                                      |
//! |-------------------------------------|----------------------------------------------|
//! | `KERNELS_AND_IMAGES_CL_STD`         | `latest`, or a version such as `CL1.2`       |
//! | `KERNELS_AND_IMAGES_BUILD_OPTIONS`  | extra flags appended to every build          |
//! | `KERNELS_AND_IMAGES_INTEROP`        | `1` or `true` to share with the current GL context |

use std::fmt::{Display, Formatter};

pub const ENV_CL_STD: &str = "KERNELS_AND_IMAGES_CL_STD";
pub const ENV_BUILD_OPTIONS: &str = "KERNELS_AND_IMAGES_BUILD_OPTIONS";
pub const ENV_INTEROP: &str = "KERNELS_AND_IMAGES_INTEROP";

/// Which OpenCL C dialect to compile against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LanguageVersion {
    /// The newest version the device reports.
    #[default]
    Latest,
    Fixed { major: u8, minor: u8 },
}

impl LanguageVersion {
    /// Parses `latest`, `CL2.0` or `2.0`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Some(LanguageVersion::Latest);
        }
        let digits = s
            .strip_prefix("CL")
            .or_else(|| s.strip_prefix("cl"))
            .unwrap_or(s);
        parse_major_minor(digits).map(|(major, minor)| LanguageVersion::Fixed { major, minor })
    }

    /// The version to pass to the compiler for a device reporting `device_version`.
    ///
    /// `None` means no `-cl-std` flag: the device string couldn't be read and the
    /// compiler's default is the safest choice.
    pub fn resolve(self, device_version: &str) -> Option<(u8, u8)> {
        match self {
            LanguageVersion::Fixed { major, minor } => Some((major, minor)),
            LanguageVersion::Latest => parse_opencl_c_version(device_version),
        }
    }
}

impl Display for LanguageVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LanguageVersion::Latest => f.write_str("latest"),
            LanguageVersion::Fixed { major, minor } => write!(f, "CL{major}.{minor}"),
        }
    }
}

fn parse_major_minor(s: &str) -> Option<(u8, u8)> {
    let (major, minor) = s.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Reads the version out of `CL_DEVICE_OPENCL_C_VERSION`.
///
/// The string is `OpenCL C <major>.<minor> <vendor-specific>`.
pub fn parse_opencl_c_version(s: &str) -> Option<(u8, u8)> {
    let rest = s.trim().strip_prefix("OpenCL C")?;
    let version = rest.split_whitespace().next()?;
    parse_major_minor(version)
}

/// Options for [`crate::build`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildOptions {
    pub language: LanguageVersion,
    /// Appended verbatim after the language flag. Must not contain NUL; a build with
    /// such options fails with `CL_INVALID_BUILD_OPTIONS`.
    pub extra: String,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_language(mut self, language: LanguageVersion) -> Self {
        self.language = language;
        self
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    /// The option string for a device reporting `device_version`.
    pub fn render(&self, device_version: &str) -> String {
        let mut out = String::new();
        if let Some((major, minor)) = self.language.resolve(device_version) {
            out.push_str(&format!("-cl-std=CL{major}.{minor}"));
        }
        let extra = self.extra.trim();
        if !extra.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(extra);
        }
        out
    }
}

/// Configuration of a [`crate::Harness`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HarnessConfig {
    /// Share the compute context with the graphics context current on the constructing
    /// thread.
    pub interop: bool,
    pub build: BuildOptions,
}

impl HarnessConfig {
    /// Defaults, overridden by any of the `KERNELS_AND_IMAGES_*` variables that are set.
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = HarnessConfig::default();
        if let Some(value) = lookup(ENV_CL_STD) {
            match LanguageVersion::parse(&value) {
                Some(language) => config.build.language = language,
                None => logwise::warn_sync!(
                    "ignoring unparseable {var}={value}",
                    var = ENV_CL_STD,
                    value = logwise::privacy::LogIt(&value)
                ),
            }
        }
        if let Some(value) = lookup(ENV_BUILD_OPTIONS) {
            config.build.extra = value;
        }
        if let Some(value) = lookup(ENV_INTEROP) {
            config.interop = matches!(value.trim(), "1" | "true" | "TRUE" | "yes");
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn device_version_strings() {
        assert_eq!(parse_opencl_c_version("OpenCL C 1.2 "), Some((1, 2)));
        assert_eq!(
            parse_opencl_c_version("OpenCL C 3.0 (build 41)"),
            Some((3, 0))
        );
        assert_eq!(parse_opencl_c_version("OpenCL 3.0"), None);
        assert_eq!(parse_opencl_c_version(""), None);
    }

    #[test]
    fn language_parse_and_display() {
        assert_eq!(
            LanguageVersion::parse("CL2.0"),
            Some(LanguageVersion::Fixed { major: 2, minor: 0 })
        );
        assert_eq!(
            LanguageVersion::parse("1.2"),
            Some(LanguageVersion::Fixed { major: 1, minor: 2 })
        );
        assert_eq!(LanguageVersion::parse("Latest"), Some(LanguageVersion::Latest));
        assert_eq!(LanguageVersion::parse("two"), None);
        assert_eq!(LanguageVersion::Fixed { major: 2, minor: 0 }.to_string(), "CL2.0");
    }

    #[test]
    fn render_options() {
        let latest = BuildOptions::new();
        assert_eq!(latest.render("OpenCL C 1.2 foo"), "-cl-std=CL1.2");
        assert_eq!(latest.render("garbage"), "");
        let pinned = BuildOptions::new()
            .with_language(LanguageVersion::Fixed { major: 2, minor: 0 })
            .with_extra(" -DFOO ");
        assert_eq!(pinned.render("OpenCL C 3.0"), "-cl-std=CL2.0 -DFOO");
        let only_extra = BuildOptions::new().with_extra("-Werror");
        assert_eq!(only_extra.render("?"), "-Werror");
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_CL_STD, "CL1.1"),
            (ENV_BUILD_OPTIONS, "-DX=1"),
            (ENV_INTEROP, "true"),
        ]
        .into_iter()
        .collect();
        let config = HarnessConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert!(config.interop);
        assert_eq!(config.build.language, LanguageVersion::Fixed { major: 1, minor: 1 });
        assert_eq!(config.build.extra, "-DX=1");

        let defaults = HarnessConfig::from_lookup(|_| None);
        assert_eq!(defaults, HarnessConfig::default());
        let bad = HarnessConfig::from_lookup(|k| (k == ENV_CL_STD).then(|| "nope".to_string()));
        assert_eq!(bad.build.language, LanguageVersion::Latest);
    }
}

//! Managed host OS detection
//!
//! The host's version banner is matched against the supported releases.
//! Detection happens once, at the start of an install; later steps only
//! consult the resulting [`Platform`].

use std::fmt;

use workflow::{CommandRunner, Error, RunOptions};

/// Supported distribution releases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ubuntu1204,
    Ubuntu1310,
    Ubuntu1404,
    Debian7,
}

/// (distro, version, platform), matched against the banner in order
const SUPPORTED: &[(&str, &str, Platform)] = &[
    ("ubuntu", "12.04", Platform::Ubuntu1204),
    ("ubuntu", "13.10", Platform::Ubuntu1310),
    ("ubuntu", "14.04", Platform::Ubuntu1404),
    ("debian", "7", Platform::Debian7),
];

/// Package renames for Ubuntu 14.04, which ships PostgreSQL 9.3
const POSTGRES_93: &[(&str, &str)] = &[
    ("postgresql-9.1", "postgresql-9.3"),
    ("postgresql-server-dev-9.1", "postgresql-server-dev-9.3"),
    ("postgresql-contrib-9.1", "postgresql-contrib-9.3"),
];

impl Platform {
    /// All supported platforms
    pub const ALL: [Self; 4] = [
        Self::Ubuntu1204,
        Self::Ubuntu1310,
        Self::Ubuntu1404,
        Self::Debian7,
    ];

    /// Match a version banner such as `Ubuntu 14.04.1 LTS \n \l`
    ///
    /// The distro name is matched case-insensitively; the version must be a
    /// whole token or the leading part of a dotted one, so `7` matches
    /// `Debian GNU/Linux 7` and `7.5` but not `17`.
    pub fn from_banner(banner: &str) -> workflow::Result<Self> {
        let lower = banner.to_lowercase();
        let tokens: Vec<&str> = lower.split_whitespace().collect();

        SUPPORTED
            .iter()
            .find(|(distro, version, _)| {
                lower.contains(distro)
                    && tokens.iter().any(|token| {
                        *token == *version
                            || token
                                .strip_prefix(version)
                                .is_some_and(|rest| rest.starts_with('.'))
                    })
            })
            .map(|(_, _, platform)| *platform)
            .ok_or_else(|| Error::UnsupportedPlatform {
                banner: banner.lines().next().unwrap_or_default().trim().to_string(),
            })
    }

    /// Package renames that apply on this platform
    pub fn package_substitutions(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Ubuntu1404 => POSTGRES_93,
            Self::Ubuntu1204 | Self::Ubuntu1310 | Self::Debian7 => &[],
        }
    }

    /// Apply [`Self::package_substitutions`] to a package list
    pub fn apply_substitutions(self, packages: &[&str]) -> Vec<String> {
        let rules = self.package_substitutions();
        packages
            .iter()
            .map(|package| {
                rules
                    .iter()
                    .find(|(from, _)| from == package)
                    .map_or(*package, |(_, to)| *to)
                    .to_string()
            })
            .collect()
    }

    /// PostgreSQL major version shipped by the platform
    pub fn postgres_version(self) -> &'static str {
        match self {
            Self::Ubuntu1404 => "9.3",
            Self::Ubuntu1204 | Self::Ubuntu1310 | Self::Debian7 => "9.1",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ubuntu1204 => "Ubuntu 12.04",
            Self::Ubuntu1310 => "Ubuntu 13.10",
            Self::Ubuntu1404 => "Ubuntu 14.04",
            Self::Debian7 => "Debian 7",
        };
        write!(f, "{name}")
    }
}

/// Read the host's version banner and identify the platform
pub fn detect(runner: &dyn CommandRunner) -> workflow::Result<Platform> {
    let issue = runner.run("cat /etc/issue", RunOptions::quiet())?;
    let mut banner = if issue.success {
        issue.stdout_str()
    } else {
        String::new()
    };

    if banner.trim().is_empty() {
        log::debug!("/etc/issue unreadable, asking lsb_release");
        let lsb = runner.run("lsb_release -ds", RunOptions::quiet())?;
        if lsb.success {
            banner = lsb.stdout_str();
        }
    }

    let platform = Platform::from_banner(&banner)?;
    log::info!("detected {platform}");
    Ok(platform)
}

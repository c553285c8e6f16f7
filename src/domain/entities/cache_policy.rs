//! Per-tier cache permissions.

use serde::{Deserialize, Serialize};

/// Read/write permissions a request has on a cache tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Read and write.
    #[default]
    Enabled,
    /// Lookups only; results are never stored.
    ReadOnly,
    /// Results are stored but never looked up.
    WriteOnly,
    /// The tier is bypassed entirely.
    Disabled,
}

impl CachePolicy {
    /// Returns true if lookups are allowed.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        matches!(self, Self::Enabled | Self::ReadOnly)
    }

    /// Returns true if stores are allowed.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::Enabled | Self::WriteOnly)
    }

    /// Returns true if both lookups and stores are allowed.
    #[must_use]
    pub const fn is_read_write(self) -> bool {
        matches!(self, Self::Enabled)
    }

    /// Short tag used in request keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::ReadOnly => "read_only",
            Self::WriteOnly => "write_only",
            Self::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(CachePolicy::Enabled, true, true ; "enabled")]
    #[test_case(CachePolicy::ReadOnly, true, false ; "read_only")]
    #[test_case(CachePolicy::WriteOnly, false, true ; "write_only")]
    #[test_case(CachePolicy::Disabled, false, false ; "disabled")]
    fn test_permissions(policy: CachePolicy, readable: bool, writable: bool) {
        assert_eq!(policy.is_readable(), readable);
        assert_eq!(policy.is_writable(), writable);
        assert_eq!(policy.is_read_write(), readable && writable);
    }
}

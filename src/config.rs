//! Engine configuration.

use crate::bitfields::Adkd;
use core::fmt;
use core::str::FromStr;

/// Tag policy.
///
/// The tag policy selects which kinds of navigation data are authenticated.
/// Tags with an ADKD that the policy does not allow are discarded when the
/// MACK message is processed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum TagPolicy {
    /// ADKD=0, 4 and 12.
    #[default]
    All,
    /// Timing parameters only (ADKD=4).
    Utc,
    /// Slow MAC ephemeris only (ADKD=12).
    SlowEph,
    /// Ephemeris only (ADKD=0).
    Eph,
    /// No tags.
    None,
}

impl TagPolicy {
    /// Returns `true` if tags with this ADKD are processed.
    pub fn allows(&self, adkd: Adkd) -> bool {
        matches!(
            (self, adkd),
            (
                TagPolicy::All,
                Adkd::InavCed | Adkd::InavTiming | Adkd::SlowMac
            ) | (TagPolicy::Utc, Adkd::InavTiming)
                | (TagPolicy::SlowEph, Adkd::SlowMac)
                | (TagPolicy::Eph, Adkd::InavCed)
        )
    }
}

impl fmt::Display for TagPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagPolicy::All => "all",
            TagPolicy::Utc => "utc",
            TagPolicy::SlowEph => "slow_eph",
            TagPolicy::Eph => "eph",
            TagPolicy::None => "none",
        }
        .fmt(f)
    }
}

/// Error produced when parsing a [`TagPolicy`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TagPolicyError;

impl fmt::Display for TagPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "unknown tag policy (expected all, utc, slow_eph, eph or none)".fmt(f)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TagPolicyError {}

impl FromStr for TagPolicy {
    type Err = TagPolicyError;

    fn from_str(s: &str) -> Result<TagPolicy, TagPolicyError> {
        Ok(match s {
            "all" => TagPolicy::All,
            "utc" => TagPolicy::Utc,
            "slow_eph" => TagPolicy::SlowEph,
            "eph" => TagPolicy::Eph,
            "none" => TagPolicy::None,
            _ => return Err(TagPolicyError),
        })
    }
}

/// Default number of verified tag bits needed to report a navigation object
/// as authenticated.
pub const DEFAULT_MIN_AUTHBITS: u16 = 40;

/// Default tolerance between the receiver time and the MACK epoch.
pub const DEFAULT_TIME_TOLERANCE_SECS: u32 = 30;

/// Engine configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct EngineConfig {
    /// Kinds of navigation data to authenticate.
    pub tag_policy: TagPolicy,
    /// Number of verified tag bits needed to report a navigation object as
    /// authenticated.
    pub min_authbits: u16,
    /// Maximum difference in seconds between the receiver time and the time
    /// at which the key of a MACK message is disclosed.
    ///
    /// Only checked when a receiver time has been set.
    pub time_tolerance_secs: u32,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            tag_policy: TagPolicy::default(),
            min_authbits: DEFAULT_MIN_AUTHBITS,
            time_tolerance_secs: DEFAULT_TIME_TOLERANCE_SECS,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn policies() {
        let adkds = [Adkd::InavCed, Adkd::InavTiming, Adkd::SlowMac, Adkd::Reserved];
        let allowed = |policy: TagPolicy| -> Vec<Adkd> {
            adkds.into_iter().filter(|&a| policy.allows(a)).collect()
        };
        assert_eq!(
            allowed(TagPolicy::All),
            [Adkd::InavCed, Adkd::InavTiming, Adkd::SlowMac]
        );
        assert_eq!(allowed(TagPolicy::Eph), [Adkd::InavCed]);
        assert_eq!(allowed(TagPolicy::SlowEph), [Adkd::SlowMac]);
        assert_eq!(allowed(TagPolicy::Utc), [Adkd::InavTiming]);
        assert!(allowed(TagPolicy::None).is_empty());
    }

    #[test]
    fn parse_policy() {
        for policy in [
            TagPolicy::All,
            TagPolicy::Utc,
            TagPolicy::SlowEph,
            TagPolicy::Eph,
            TagPolicy::None,
        ] {
            assert_eq!(policy.to_string().parse::<TagPolicy>(), Ok(policy));
        }
        assert_eq!("ALL".parse::<TagPolicy>(), Err(TagPolicyError));
    }

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tag_policy, TagPolicy::All);
        assert_eq!(config.min_authbits, 40);
        assert_eq!(config.time_tolerance_secs, 30);
    }
}

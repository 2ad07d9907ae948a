use crate::types::NUM_SVNS;
use core::fmt;
use core::num::NonZeroU8;
use core::str::FromStr;

/// Galileo SVN.
///
/// The SVN is the Galileo satellite number, between 1 and 36. It is stored
/// as a `NonZeroU8` and is always in range once constructed. In OSNMA the
/// SVN is used as PRN_A (the satellite transmitting a MACK message) and as
/// PRN_D (the satellite whose navigation data a tag authenticates).
///
/// # Examples
///
/// ```
/// use osnma_engine::Svn;
///
/// let svn = Svn::try_from(24).unwrap();
/// assert_eq!(format!("{}", svn), "E24");
/// assert_eq!("E24".parse::<Svn>(), Ok(svn));
/// ```
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Svn(NonZeroU8);

impl Svn {
    /// Iterate over all the SVNs, from E01 to E36.
    pub fn iter() -> impl Iterator<Item = Svn> {
        (1..=NUM_SVNS as u8).filter_map(NonZeroU8::new).map(Svn)
    }

    /// Returns the SVN as a PRN byte, as it appears in OSNMA messages.
    pub fn prn(&self) -> u8 {
        self.0.get()
    }
}

macro_rules! impl_conv {
    ($t: ty) => {
        impl From<Svn> for $t {
            fn from(svn: Svn) -> $t {
                // SVNs are at most 36, which fits in every integer type.
                svn.0.get() as $t
            }
        }

        impl TryFrom<$t> for Svn {
            type Error = SvnError;
            fn try_from(value: $t) -> Result<Svn, SvnError> {
                if (1..=NUM_SVNS as $t).contains(&value) {
                    NonZeroU8::new(value as u8)
                        .map(Svn)
                        .ok_or(SvnError::OutOfRange)
                } else {
                    Err(SvnError::OutOfRange)
                }
            }
        }
    };
}

impl_conv!(u8);
impl_conv!(u16);
impl_conv!(u32);
impl_conv!(u64);
impl_conv!(usize);
impl_conv!(i32);
impl_conv!(i64);

/// Formats an SVN as Exx.
impl fmt::Display for Svn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:02}", self.0)
    }
}

/// Parses an SVN written either as `"E24"` or as `"24"`.
impl FromStr for Svn {
    type Err = SvnError;

    fn from_str(s: &str) -> Result<Svn, SvnError> {
        let digits = s.strip_prefix('E').unwrap_or(s);
        let value: u8 = digits.parse().map_err(|_| SvnError::Syntax)?;
        Svn::try_from(value)
    }
}

/// SVN construction error.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SvnError {
    /// The value is outside the range 1-36.
    OutOfRange,
    /// The string is not an SVN.
    Syntax,
}

impl fmt::Display for SvnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvnError::OutOfRange => "SVN outside the range 1-36".fmt(f),
            SvnError::Syntax => "malformed SVN".fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SvnError {}

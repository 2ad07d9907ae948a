/// Galileo week number.
pub type Wn = u16;
/// Time of week.
///
/// This represents the time of week in seconds.
pub type Tow = u32;

pub(crate) const SECS_IN_WEEK: Tow = 24 * 3600 * 7;
pub(crate) const SECS_PER_SUBFRAME: Tow = 30;
// The WN field broadcast by Galileo has 12 bits.
const WEEKS_IN_ROLLOVER: i64 = 4096;

/// GST (Galileo System Time)
///
/// The Galileo System Time, stored as a week number and a time of week.
///
/// # Examples
/// ```
/// use osnma_engine::Gst;
///
/// let gst = Gst::new(1248, 345600);
/// assert_eq!(gst.wn(), 1248);
/// assert_eq!(gst.tow(), 345600);
/// ```
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Gst {
    wn: Wn,
    tow: Tow,
}

impl Gst {
    /// Constructs a new GST from a week number and TOW.
    ///
    /// # Panics
    ///
    /// Panics if `tow` is greater or equal to 604800 (the number of
    /// seconds in a week). Use [`Gst::try_new`] for untrusted values.
    pub fn new(wn: Wn, tow: Tow) -> Self {
        assert!(tow < SECS_IN_WEEK);
        Gst { wn, tow }
    }

    /// Constructs a new GST, returning `None` if `tow` is out of range.
    pub fn try_new(wn: Wn, tow: Tow) -> Option<Self> {
        (tow < SECS_IN_WEEK).then_some(Gst { wn, tow })
    }

    /// Returns the week number of the GST.
    pub fn wn(&self) -> Wn {
        self.wn
    }

    /// Returns the time of week of the GST.
    pub fn tow(&self) -> Tow {
        self.tow
    }

    /// Adds `seconds` seconds to the GST.
    ///
    /// The week number wraps around modulo 4096, like the 12-bit WN field
    /// broadcast by Galileo.
    ///
    /// # Examples
    ///
    /// ```
    /// use osnma_engine::Gst;
    ///
    /// let gst = Gst::new(1248, 604790);
    /// let later = gst.add_seconds(20);
    /// assert_eq!(later, Gst::new(1249, 10));
    /// assert_eq!(later.add_seconds(-20), gst);
    /// assert_eq!(Gst::new(4095, 604790).add_seconds(20), Gst::new(0, 10));
    /// ```
    pub fn add_seconds(&self, seconds: i64) -> Self {
        let week = i64::from(SECS_IN_WEEK);
        let total = i64::from(self.tow) + seconds;
        let weeks = total.div_euclid(week);
        let tow = total.rem_euclid(week);
        Gst {
            // rem_euclid keeps the value in 0..4096
            wn: (i64::from(self.wn) + weeks).rem_euclid(WEEKS_IN_ROLLOVER) as Wn,
            tow: tow as Tow,
        }
    }

    /// Adds `subframes` 30-second subframes to the GST.
    pub fn add_subframes(&self, subframes: i64) -> Self {
        self.add_seconds(subframes * i64::from(SECS_PER_SUBFRAME))
    }

    /// Returns the signed number of seconds from `earlier` to `self`.
    ///
    /// The week numbers are compared modulo 4096, so the result is correct
    /// across a week number rollover for times less than 2048 weeks apart.
    ///
    /// # Examples
    ///
    /// ```
    /// use osnma_engine::Gst;
    ///
    /// let a = Gst::new(1248, 345600);
    /// assert_eq!(a.add_seconds(90).seconds_since(a), 90);
    /// assert_eq!(a.seconds_since(a.add_seconds(90)), -90);
    /// ```
    pub fn seconds_since(&self, earlier: Gst) -> i64 {
        let mut weeks =
            (i64::from(self.wn) - i64::from(earlier.wn)).rem_euclid(WEEKS_IN_ROLLOVER);
        if weeks >= WEEKS_IN_ROLLOVER / 2 {
            weeks -= WEEKS_IN_ROLLOVER;
        }
        weeks * i64::from(SECS_IN_WEEK) + i64::from(self.tow) - i64::from(earlier.tow)
    }

    /// Returns the GST at the start of the subframe that contains `self`.
    pub fn gst_subframe(&self) -> Self {
        Gst {
            wn: self.wn,
            tow: self.tow / SECS_PER_SUBFRAME * SECS_PER_SUBFRAME,
        }
    }

    /// Returns `true` if `self` corresponds to the start of a subframe.
    pub fn is_subframe(&self) -> bool {
        self.tow % SECS_PER_SUBFRAME == 0
    }

    /// Returns the MACK message number (0 or 1) used in MAC Look-up Table
    /// lookups for a MACK transmitted at this GST.
    pub fn mack_message_number(&self) -> usize {
        if (self.tow / SECS_PER_SUBFRAME) % 2 == 0 {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn week_rollover() {
        let gst = Gst::new(1248, 10);
        assert_eq!(gst.add_seconds(-30), Gst::new(1247, 604780));
        assert_eq!(gst.add_subframes(-1).add_subframes(1), gst);
        assert_eq!(gst.add_seconds(2 * 604800), Gst::new(1250, 10));
    }

    #[test]
    fn week_number_rollover() {
        let last = Gst::new(4095, 604790);
        let first = last.add_seconds(20);
        assert_eq!(first, Gst::new(0, 10));
        assert_eq!(first.add_subframes(-1), Gst::new(4095, 604780));
        assert_eq!(first.seconds_since(last), 20);
        assert_eq!(last.seconds_since(first), -20);
    }

    #[test]
    fn subframe_helpers() {
        let gst = Gst::new(1248, 345617);
        assert!(!gst.is_subframe());
        assert_eq!(gst.gst_subframe(), Gst::new(1248, 345600));
        assert_eq!(Gst::new(1248, 345600).mack_message_number(), 0);
        assert_eq!(Gst::new(1248, 345630).mack_message_number(), 1);
        assert!(Gst::try_new(1248, 604800).is_none());
    }
}

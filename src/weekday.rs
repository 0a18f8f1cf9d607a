use std::fmt;

use nom::{branch::alt, IResult};

use crate::parser::enum_utils::enum_element;

// chrono's Weekday has no Arbitrary impl and no two-letter iCalendar form
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Debug)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Weekday {
    /// Monday.
    Mon = 0,
    /// Tuesday.
    Tue = 1,
    /// Wednesday.
    Wed = 2,
    /// Thursday.
    Thu = 3,
    /// Friday.
    Fri = 4,
    /// Saturday.
    Sat = 5,
    /// Sunday.
    Sun = 6,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    /// Mon = 1 .. Sun = 7.
    pub fn number_from_monday(self) -> u32 {
        self as u32 + 1
    }

    pub fn num_days_from_monday(self) -> u32 {
        self as u32
    }

    /// Days to walk forward from `self` to reach `other` (0..=6).
    pub fn days_until(self, other: Weekday) -> u32 {
        (7 + other as u32 - self as u32) % 7
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(weekday: chrono::Weekday) -> Self {
        Weekday::ALL[weekday.num_days_from_monday() as usize]
    }
}

impl From<Weekday> for chrono::Weekday {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => chrono::Weekday::Mon,
            Weekday::Tue => chrono::Weekday::Tue,
            Weekday::Wed => chrono::Weekday::Wed,
            Weekday::Thu => chrono::Weekday::Thu,
            Weekday::Fri => chrono::Weekday::Fri,
            Weekday::Sat => chrono::Weekday::Sat,
            Weekday::Sun => chrono::Weekday::Sun,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Weekday::Mon => "MO",
                Weekday::Tue => "TU",
                Weekday::Wed => "WE",
                Weekday::Thu => "TH",
                Weekday::Fri => "FR",
                Weekday::Sat => "SA",
                Weekday::Sun => "SU",
            }
        )
    }
}

pub fn weekday(input: &str) -> IResult<&str, Weekday> {
    alt((
        enum_element("MO", Weekday::Mon),
        enum_element("TU", Weekday::Tue),
        enum_element("WE", Weekday::Wed),
        enum_element("TH", Weekday::Thu),
        enum_element("FR", Weekday::Fri),
        enum_element("SA", Weekday::Sat),
        enum_element("SU", Weekday::Sun),
    ))(input)
}

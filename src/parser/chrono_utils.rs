use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while_m_n},
    combinator::{map_res, opt},
    error::{Error as NomError, ErrorKind},
    sequence::{preceded, tuple},
    IResult,
};

use crate::date_value::DateValue;

fn fixed_digits(count: usize) -> impl FnMut(&str) -> IResult<&str, u32> {
    move |input| {
        map_res(
            take_while_m_n(count, count, |c: char| c.is_ascii_digit()),
            |v: &str| v.parse::<u32>(),
        )(input)
    }
}

fn fail(input: &str) -> nom::Err<NomError<&str>> {
    nom::Err::Error(NomError {
        input,
        code: ErrorKind::Verify,
    })
}

// https://datatracker.ietf.org/doc/html/rfc5545#section-3.3.4
pub fn date(input: &str) -> IResult<&str, DateValue> {
    let (rest, (year, month, day)) = tuple((fixed_digits(4), fixed_digits(2), fixed_digits(2)))(input)?;
    match DateValue::date(year as i32, month, day) {
        Ok(value) => Ok((rest, value)),
        Err(_) => Err(fail(input)),
    }
}

// https://datatracker.ietf.org/doc/html/rfc5545#section-3.3.5
// FORM #1 (floating) and FORM #2 (UTC); FORM #3 carries its TZID as a
// property parameter and is resolved by the caller into an offset.
pub fn datetime(input: &str) -> IResult<&str, DateValue> {
    let (rest, (date, (hour, minute, second), utc)) = tuple((
        date,
        preceded(
            tag_no_case("T"),
            tuple((fixed_digits(2), fixed_digits(2), fixed_digits(2))),
        ),
        opt(tag_no_case("Z")),
    ))(input)?;
    let value = DateValue::date_time(date.year(), date.month(), date.day(), hour, minute, second)
        .and_then(|value| match utc {
            Some(_) => value.with_utc_offset(0),
            None => Ok(value),
        });
    match value {
        Ok(value) => Ok((rest, value)),
        Err(_) => Err(fail(input)),
    }
}

/// DATE-TIME when a time part follows, plain DATE otherwise.
pub fn date_or_datetime(input: &str) -> IResult<&str, DateValue> {
    alt((datetime, date))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_forms() {
        assert_eq!(date("20210920"), Ok(("", DateValue::date(2021, 9, 20).unwrap())));
        assert_eq!(date("202109201"), Ok(("1", DateValue::date(2021, 9, 20).unwrap())));
        assert!(date("20210a920").is_err());
        assert!(date("2021").is_err());
        assert!(date("20210230").is_err());

        assert_eq!(
            datetime("20210920T000000F"),
            Ok(("F", DateValue::date_time(2021, 9, 20, 0, 0, 0).unwrap()))
        );
        let (rest, utc) = datetime("20210920T000000Z").unwrap();
        assert_eq!(rest, "");
        assert_eq!(utc.utc_offset_seconds(), Some(0));
        assert!(datetime("20210920T00000").is_err());
        assert!(datetime("20210920Q000000").is_err());
        assert!(datetime("20210920T250000").is_err());

        assert!(date_or_datetime("").is_err());
        let (rest, value) = date_or_datetime("20210920;COUNT=1").unwrap();
        assert_eq!(rest, ";COUNT=1");
        assert!(value.is_date_only());
        let (_, value) = date_or_datetime("20210920t101500z").unwrap();
        assert_eq!(value, DateValue::utc(2021, 9, 20, 10, 15, 0).unwrap());
    }
}

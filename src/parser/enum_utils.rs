use nom::{bytes::complete::tag_no_case, IResult};

/// Matches `keyword` regardless of ASCII case and yields `enum_element`.
pub const fn enum_element<'a, T: Copy>(
    keyword: &'static str,
    enum_element: T,
) -> impl FnMut(&'a str) -> IResult<&'a str, T> {
    move |input| {
        let (input, _) = tag_no_case(keyword)(input)?;
        Ok((input, enum_element))
    }
}

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{anychar, one_of},
    combinator::{map_opt, map_res, recognize},
    multi::{many0, many_m_n},
    sequence::preceded,
    IResult, Parser,
};

/// Decode `\uXXXX` escapes in a table cell, e.g. `k\u0250t` -> `kɐt`.
///
/// Malformed escapes are kept as literal text.
pub fn decode_escapes(input: &str) -> String {
    let (_, chars) = parse_grapheme_sequence(input).unwrap_or(("", Vec::new()));
    chars.into_iter().collect()
}

fn parse_grapheme_sequence(input: &str) -> IResult<&str, Vec<char>> {
    let mut parser = many0(alt((uni_esc, anychar)));
    let (input, chars) = parser.parse(input)?;
    Ok((input, chars))
}

fn uni_esc(input: &str) -> IResult<&str, char> {
    let mut parser = map_opt(
        map_res(
            preceded(
                tag("\\u"),
                recognize(many_m_n(4, 4, one_of("0123456789abcdefABCDEF"))),
            ),
            |out: &str| u32::from_str_radix(out, 16),
        ),
        std::char::from_u32,
    );
    parser.parse(input)
}

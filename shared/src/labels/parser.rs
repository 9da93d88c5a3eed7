//! Label string parser using nom.
//!
//! Parses strings like:
//! - `{job="api", level="error"}`
//! - `job="api"` (braces are optional)
//! - `{msg="a, b", quote="say \"hi\""}` (commas and escapes inside values)
//!
//! Values accept the escapes Go's `strconv.Quote` emits. Any other escape is
//! kept verbatim.

use super::{LabelParseError, LabelSet};
use nom::{
    branch::alt,
    bytes::complete::{is_not, take_while1, take_while_m_n},
    character::complete::{anychar, char, multispace0},
    combinator::{map, map_opt, value},
    multi::fold_many0,
    sequence::{delimited, preceded},
    IResult, Parser,
};

/// Parses a serialized label string into a [`LabelSet`].
///
/// # Errors
///
/// Returns a `LabelParseError` if:
/// - A pair has no `=` separator
/// - A value is not enclosed in double quotes
/// - The braces are unbalanced
/// - A label name is empty, invalid or duplicated
///
/// # Examples
///
/// ```
/// use shared::labels::parse_label_set;
///
/// let labels = parse_label_set(r#"{_foo="bar"}"#).unwrap();
/// assert_eq!(labels.get("foo"), Some("bar"));
///
/// assert!(parse_label_set("{foo}").is_err());
/// ```
pub fn parse_label_set(input: &str) -> Result<LabelSet, LabelParseError> {
    let body = strip_braces(input.trim())?;
    let mut labels = LabelSet::new();
    let mut rest = body.trim_start();

    while !rest.is_empty() {
        let (remaining, (name, value)) = label_pair(rest).map_err(|_| classify_failure(rest))?;
        labels.try_insert(name, &value)?;

        let remaining = remaining.trim_start();
        if remaining.is_empty() {
            break;
        }
        match remaining.strip_prefix(',') {
            Some(next) => rest = next.trim_start(),
            None => return Err(LabelParseError::MalformedValue(first_pair(rest).to_string())),
        }
    }

    Ok(labels)
}

fn strip_braces(input: &str) -> Result<&str, LabelParseError> {
    match (input.strip_prefix('{'), input.ends_with('}')) {
        (Some(inner), true) => Ok(inner.strip_suffix('}').unwrap_or(inner)),
        (None, false) => Ok(input),
        _ => Err(LabelParseError::UnbalancedBraces(input.to_string())),
    }
}

/// Decides which error to report for a pair the grammar rejected.
fn classify_failure(rest: &str) -> LabelParseError {
    let pair = first_pair(rest);
    if pair.contains('=') {
        LabelParseError::MalformedValue(pair.to_string())
    } else {
        LabelParseError::MissingSeparator(pair.to_string())
    }
}

fn first_pair(rest: &str) -> &str {
    rest.split(',').next().unwrap_or(rest).trim()
}

// ============================================================================
// Grammar
// ============================================================================

fn label_pair(input: &str) -> IResult<&str, (&str, String)> {
    let (input, name) = take_while1(|c: char| c != '=' && c != ',')(input)?;
    let (input, _) = char('=')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, value) = quoted_value(input)?;
    Ok((input, (name, value)))
}

enum Fragment<'a> {
    Literal(&'a str),
    Escaped(char),
    Unknown(char),
}

fn quoted_value(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        fold_many0(fragment, String::new, |mut acc, fragment| {
            match fragment {
                Fragment::Literal(s) => acc.push_str(s),
                Fragment::Escaped(c) => acc.push(c),
                Fragment::Unknown(c) => {
                    acc.push('\\');
                    acc.push(c);
                }
            }
            acc
        }),
        char('"'),
    )
    .parse(input)
}

fn fragment(input: &str) -> IResult<&str, Fragment<'_>> {
    alt((
        map(is_not("\"\\"), Fragment::Literal),
        map(preceded(char('\\'), escaped_char), Fragment::Escaped),
        map(preceded(char('\\'), anychar), Fragment::Unknown),
    ))
    .parse(input)
}

fn escaped_char(input: &str) -> IResult<&str, char> {
    alt((
        value('\n', char('n')),
        value('\t', char('t')),
        value('\r', char('r')),
        value('\u{07}', char('a')),
        value('\u{08}', char('b')),
        value('\u{0C}', char('f')),
        value('\u{0B}', char('v')),
        value('\\', char('\\')),
        value('"', char('"')),
        value('\'', char('\'')),
        preceded(char('x'), hex_byte),
        preceded(char('u'), code_point(4)),
        preceded(char('U'), code_point(8)),
    ))
    .parse(input)
}

/// `\xNN` escape. Bytes outside ASCII cannot stand alone in a `String`.
fn hex_byte(input: &str) -> IResult<&str, char> {
    map(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), |hex| {
        u8::from_str_radix(hex, 16)
            .ok()
            .filter(u8::is_ascii)
            .map_or(char::REPLACEMENT_CHARACTER, char::from)
    })
    .parse(input)
}

fn code_point(digits: usize) -> impl FnMut(&str) -> IResult<&str, char> {
    move |input| {
        map_opt(
            take_while_m_n(digits, digits, |c: char| c.is_ascii_hexdigit()),
            |hex| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32),
        )
        .parse(input)
    }
}

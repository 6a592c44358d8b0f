use nom::{
    IResult, Parser,
    bytes::complete::tag_no_case,
    character::complete::space1,
    combinator::{rest, verify},
    sequence::preceded,
};

// Only two client commands are understood by the harness server:
//
//       Command: NICK
//    Parameters: <nickname>
//
//       Command: JOIN
//    Parameters: <target>
//
// The keyword is matched case-insensitively and everything after it, trimmed, is the
// parameter. No further RFC 2812 validation is done: the client under test decides
// what a nickname or a channel looks like.

fn command_argument_parser<'a>(
    keyword: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    preceded(
        (tag_no_case(keyword), space1),
        verify(rest, |s: &str| !s.trim().is_empty()),
    )
}

pub fn nick_message_parser(input: &str) -> IResult<&str, &str> {
    let (rem, nick) = command_argument_parser("NICK").parse(input.trim())?;
    Ok((rem, nick.trim()))
}

pub fn join_message_parser(input: &str) -> IResult<&str, &str> {
    let (rem, target) = command_argument_parser("JOIN").parse(input.trim())?;
    Ok((rem, target.trim()))
}

//! Placeholder substitution for action template lines.
//!
//! A template is plain protocol text holding any of `{nick}`, `{hostmask}`, `{channel}`,
//! `{targetNick}` and `{command}`. Everything but `{channel}` is resolved once, when a
//! virtual user builds its queue; the channel is rolled again for every line sent.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    combinator::{map, value},
    multi::many0,
    sequence::delimited,
};

use crate::constants::{BOT_DOMAIN, BOT_USER};

pub const CHANNEL_PLACEHOLDER: &str = "{channel}";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placeholder {
    Nick,
    Hostmask,
    Channel,
    TargetNick,
    Command,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment<'a> {
    Literal(&'a str),
    Placeholder(Placeholder),
}

/// Values bound to the placeholders of one virtual user.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateParams {
    pub nick: String,
    pub hostmask: String,
    pub target_nick: String,
    pub command: String,
}

impl TemplateParams {
    pub fn new(nick: &str, target_nick: &str, command: &str) -> Self {
        TemplateParams {
            nick: nick.to_owned(),
            hostmask: bot_hostmask(nick),
            target_nick: target_nick.to_owned(),
            command: command.to_owned(),
        }
    }

    fn resolve(&self, placeholder: Placeholder) -> &str {
        match placeholder {
            Placeholder::Nick => &self.nick,
            Placeholder::Hostmask => &self.hostmask,
            Placeholder::TargetNick => &self.target_nick,
            Placeholder::Command => &self.command,
            Placeholder::Channel => CHANNEL_PLACEHOLDER,
        }
    }
}

pub fn bot_hostmask(nick: &str) -> String {
    format!("{nick}!{BOT_USER}@{BOT_DOMAIN}")
}

fn placeholder_parser(input: &str) -> IResult<&str, Placeholder> {
    delimited(
        tag("{"),
        alt((
            value(Placeholder::Nick, tag("nick")),
            value(Placeholder::Hostmask, tag("hostmask")),
            value(Placeholder::Channel, tag("channel")),
            value(Placeholder::TargetNick, tag("targetNick")),
            value(Placeholder::Command, tag("command")),
        )),
        tag("}"),
    )
    .parse(input)
}

// A '{' that does not open a known placeholder is kept as text.
fn segment_parser(input: &str) -> IResult<&str, Segment<'_>> {
    alt((
        map(placeholder_parser, Segment::Placeholder),
        map(take_while1(|c: char| c != '{'), Segment::Literal),
        map(tag("{"), Segment::Literal),
    ))
    .parse(input)
}

fn segments(template: &str) -> Vec<Segment<'_>> {
    match many0(segment_parser).parse(template) {
        Ok((_, segments)) => segments,
        // every character is covered by one of the alternatives
        Err(_) => vec![Segment::Literal(template)],
    }
}

/// A template line with every value bound except the channel, which goes between
/// consecutive pieces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingLine {
    pieces: Vec<String>,
}

impl PendingLine {
    pub fn needs_channel(&self) -> bool {
        self.pieces.len() > 1
    }

    /// Fills the channel slots only; `{channel}` text coming from bound values stays.
    pub fn with_channel(&self, channel: &str) -> String {
        self.pieces.join(channel)
    }
}

impl std::fmt::Display for PendingLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pieces.join(CHANNEL_PLACEHOLDER))
    }
}

/// Substitutes every placeholder except `{channel}`, whose positions are kept.
pub fn render(template: &str, params: &TemplateParams) -> PendingLine {
    let mut pieces = vec![String::new()];
    for segment in segments(template) {
        let text = match segment {
            Segment::Placeholder(Placeholder::Channel) => {
                pieces.push(String::new());
                continue;
            }
            Segment::Placeholder(placeholder) => params.resolve(placeholder),
            Segment::Literal(text) => text,
        };
        if let Some(piece) = pieces.last_mut() {
            piece.push_str(text);
        }
    }
    PendingLine { pieces }
}

/// Placeholders still present in a line.
pub fn unresolved_placeholders(line: &str) -> Vec<Placeholder> {
    segments(line)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(placeholder) => Some(placeholder),
            Segment::Literal(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TemplateParams {
        TemplateParams::new("vu0000000", "target", "?jmeter")
    }

    #[test]
    fn test_render_leaves_only_channel() {
        let line = render(
            ":{hostmask} PRIVMSG {channel} :{nick} {targetNick} {command}",
            &params(),
        );
        assert!(line.needs_channel());
        assert_eq!(
            line.to_string(),
            ":vu0000000!~jmeter@bots.jmeter PRIVMSG {channel} :vu0000000 target ?jmeter"
        );
        assert_eq!(unresolved_placeholders(&line.to_string()), vec![Placeholder::Channel]);

        let line = line.with_channel("#jmeter3");
        assert!(unresolved_placeholders(&line).is_empty());
        assert!(line.contains(" PRIVMSG #jmeter3 :"));
    }

    #[test]
    fn test_line_without_channel() {
        let line = render(":{hostmask} PRIVMSG {targetNick} :{nick}", &params());
        assert!(!line.needs_channel());
        assert_eq!(
            line.with_channel("#x"),
            ":vu0000000!~jmeter@bots.jmeter PRIVMSG target :vu0000000"
        );
    }

    #[test]
    fn test_channel_text_in_values_is_not_a_slot() {
        let params = TemplateParams::new("vu0000000", "{channel}", "say {channel}");
        let line = render("PRIVMSG {targetNick} :{command} in {channel}", &params);
        assert_eq!(
            line.with_channel("#t0"),
            "PRIVMSG {channel} :say {channel} in #t0"
        );

        let line = render("{command}", &params);
        assert!(!line.needs_channel());
        assert_eq!(line.with_channel("#t0"), "say {channel}");
    }

    #[test]
    fn test_unknown_braces_are_kept() {
        let line = render("{unknown} { {nick}} {nick", &params());
        assert_eq!(line.to_string(), "{unknown} { vu0000000} {nick");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let params = TemplateParams::new("bot", "", "{nick}");
        assert_eq!(render("{command}", &params).with_channel("#c"), "{nick}");
    }
}

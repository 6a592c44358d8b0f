use serde::{Deserialize, Serialize};

use crate::config::ActionsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    ChannelCommand,
    PmCommand,
    ChannelMessage,
    ChannelNotice,
    ChannelAction,
    PmMessage,
    PmAction,
    OperatorOp,
    OperatorVoice,
    OperatorKick,
    OperatorBan,
    UserPart,
    UserQuit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionGroup {
    Commands,
    RandomMessages,
    OperatorActions,
    UserStatus,
}

impl ActionGroup {
    pub fn label(&self) -> &'static str {
        match self {
            ActionGroup::Commands => "Commands",
            ActionGroup::RandomMessages => "Random Messages",
            ActionGroup::OperatorActions => "Operator Actions",
            ActionGroup::UserStatus => "User Status",
        }
    }
}

impl ActionCategory {
    pub const ALL: [ActionCategory; 13] = [
        ActionCategory::ChannelCommand,
        ActionCategory::PmCommand,
        ActionCategory::ChannelMessage,
        ActionCategory::ChannelNotice,
        ActionCategory::ChannelAction,
        ActionCategory::PmMessage,
        ActionCategory::PmAction,
        ActionCategory::OperatorOp,
        ActionCategory::OperatorVoice,
        ActionCategory::OperatorKick,
        ActionCategory::OperatorBan,
        ActionCategory::UserPart,
        ActionCategory::UserQuit,
    ];

    pub fn group(&self) -> ActionGroup {
        match self {
            ActionCategory::ChannelCommand | ActionCategory::PmCommand => ActionGroup::Commands,
            ActionCategory::ChannelMessage
            | ActionCategory::ChannelNotice
            | ActionCategory::ChannelAction
            | ActionCategory::PmMessage
            | ActionCategory::PmAction => ActionGroup::RandomMessages,
            ActionCategory::OperatorOp
            | ActionCategory::OperatorVoice
            | ActionCategory::OperatorKick
            | ActionCategory::OperatorBan => ActionGroup::OperatorActions,
            ActionCategory::UserPart | ActionCategory::UserQuit => ActionGroup::UserStatus,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActionCategory::ChannelCommand => "Channel Message",
            ActionCategory::PmCommand => "Private Message",
            ActionCategory::ChannelMessage => "Channel Message",
            ActionCategory::ChannelNotice => "Channel Notice",
            ActionCategory::ChannelAction => "Channel Action",
            ActionCategory::PmMessage => "Private Message",
            ActionCategory::PmAction => "Private Action",
            ActionCategory::OperatorOp => "Operator-Deoperator (self)",
            ActionCategory::OperatorVoice => "Voice-Devoice (self)",
            ActionCategory::OperatorKick => "Kick-Join (self)",
            ActionCategory::OperatorBan => "Ban-Unban (self)",
            ActionCategory::UserPart => "Part-Join",
            ActionCategory::UserQuit => "Quit-Join",
        }
    }

    /// Lines sent for this category, in order. CTCP actions are wrapped in \x01.
    pub fn default_lines(&self) -> &'static [&'static str] {
        match self {
            ActionCategory::ChannelCommand => &[":{hostmask} PRIVMSG {channel} :{command}"],
            ActionCategory::PmCommand => &[":{hostmask} PRIVMSG {targetNick} :{command}"],
            ActionCategory::ChannelMessage => &[":{hostmask} PRIVMSG {channel} :{nick}"],
            ActionCategory::ChannelNotice => &[":{hostmask} NOTICE {channel} :{nick}"],
            ActionCategory::ChannelAction => {
                &[":{hostmask} PRIVMSG {channel} :\u{1}ACTION {nick}\u{1}"]
            }
            ActionCategory::PmMessage => &[":{hostmask} PRIVMSG {targetNick} :{nick}"],
            ActionCategory::PmAction => {
                &[":{hostmask} PRIVMSG {targetNick} :\u{1}ACTION {nick}\u{1}"]
            }
            ActionCategory::OperatorOp => &[
                ":irc.jmeter MODE {channel} +o {nick}",
                ":irc.jmeter MODE {channel} -o {nick}",
            ],
            ActionCategory::OperatorVoice => &[
                ":irc.jmeter MODE {channel} +v {nick}",
                ":irc.jmeter MODE {channel} -v {nick}",
            ],
            ActionCategory::OperatorKick => &[
                ":irc.jmeter KICK {channel} {nick} :{command}",
                ":{hostmask} JOIN :{channel}",
            ],
            ActionCategory::OperatorBan => &[
                ":irc.jmeter MODE {channel} +b {hostmask}",
                ":irc.jmeter MODE {channel} -b {hostmask}",
            ],
            ActionCategory::UserPart => &[":{hostmask} PART {channel}", ":{hostmask} JOIN :{channel}"],
            ActionCategory::UserQuit => &[":{hostmask} QUIT :{command}", ":{hostmask} JOIN :{channel}"],
        }
    }
}

/// Template lines of one enabled category.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTemplate {
    pub category: ActionCategory,
    pub lines: Vec<String>,
}

/// Enabled categories with their template lines, fixed once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionCatalog {
    templates: Vec<ActionTemplate>,
}

impl ActionCatalog {
    pub fn from_config(config: &ActionsConfig) -> Self {
        let templates = ActionCategory::ALL
            .iter()
            .filter(|category| config.is_enabled(**category))
            .map(|category| {
                let lines = config
                    .template_override(*category)
                    .map(|lines| lines.to_vec())
                    .unwrap_or_else(|| {
                        category
                            .default_lines()
                            .iter()
                            .map(|line| line.to_string())
                            .collect()
                    });
                ActionTemplate {
                    category: *category,
                    lines,
                }
            })
            .filter(|template| !template.lines.is_empty())
            .collect();
        ActionCatalog { templates }
    }

    pub fn only(categories: &[ActionCategory]) -> Self {
        let mut config = ActionsConfig::none();
        for category in categories {
            config.set_enabled(*category, true);
        }
        ActionCatalog::from_config(&config)
    }

    pub fn templates(&self) -> &[ActionTemplate] {
        &self.templates
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.templates.iter().map(|t| t.lines.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TemplateOverride;

    #[test]
    fn test_default_catalog_has_every_category() {
        let catalog = ActionCatalog::from_config(&ActionsConfig::default());
        assert_eq!(catalog.templates().len(), ActionCategory::ALL.len());
        assert_eq!(catalog.line_count(), 7 + 2 * 6);
    }

    #[test]
    fn test_every_default_line_names_the_bot() {
        for category in ActionCategory::ALL {
            for line in category.default_lines() {
                assert!(
                    line.contains("{nick}") || line.contains("{hostmask}"),
                    "{category:?}: {line}"
                );
            }
        }
    }

    #[test]
    fn test_disabled_categories_are_skipped() {
        let catalog = ActionCatalog::only(&[ActionCategory::UserPart, ActionCategory::PmAction]);
        let categories: Vec<_> = catalog.templates().iter().map(|t| t.category).collect();
        assert_eq!(categories, vec![ActionCategory::PmAction, ActionCategory::UserPart]);
        assert!(ActionCatalog::from_config(&ActionsConfig::none()).is_empty());
    }

    #[test]
    fn test_template_override_replaces_default_lines() {
        let mut config = ActionsConfig::none();
        config.set_enabled(ActionCategory::ChannelMessage, true);
        config.templates.push(TemplateOverride {
            category: ActionCategory::ChannelMessage,
            lines: vec!["PRIVMSG {channel} :hello {nick}".to_owned()],
        });
        let catalog = ActionCatalog::from_config(&config);
        assert_eq!(
            catalog.templates()[0].lines,
            vec!["PRIVMSG {channel} :hello {nick}".to_owned()]
        );
    }
}

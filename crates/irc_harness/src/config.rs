use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::actions::ActionCategory;
use crate::constants::*;
use crate::errors::ConfigError;

/// Everything the operator can set: server connection parameters, bot information and
/// the enabled actions. Missing keys fall back to their defaults.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub bot: BotConfig,
    pub actions: ActionsConfig,
    pub load: LoadConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// How long a new client has to send its NICK line.
    pub handshake_timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    pub prefix: String,
    pub channel_prefix: String,
    pub channels: u32,
    pub command: String,
    pub target_nick: String,
    pub reply_timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoadConfig {
    pub users: usize,
    pub samples: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TemplateOverride {
    pub category: ActionCategory,
    pub lines: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ActionsConfig {
    pub channel_command: bool,
    pub pm_command: bool,
    pub channel_message: bool,
    pub channel_notice: bool,
    pub channel_action: bool,
    pub pm_message: bool,
    pub pm_action: bool,
    pub operator_op: bool,
    pub operator_voice: bool,
    pub operator_kick: bool,
    pub operator_ban: bool,
    pub user_part: bool,
    pub user_quit: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<TemplateOverride>,
}

impl Config {
    /// Loads and parses the TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: DEFAULT_BIND_ADDRESS.to_owned(),
            port: DEFAULT_PORT,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ServerConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn with_port(&self, port: u16) -> Self {
        ServerConfig {
            port,
            ..self.clone()
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            prefix: DEFAULT_BOT_PREFIX.to_owned(),
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_owned(),
            channels: 1,
            command: DEFAULT_COMMAND.to_owned(),
            target_nick: String::new(),
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl BotConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        LoadConfig {
            users: 1,
            samples: 10,
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        ActionsConfig::all(true)
    }
}

impl ActionsConfig {
    fn all(enabled: bool) -> Self {
        ActionsConfig {
            channel_command: enabled,
            pm_command: enabled,
            channel_message: enabled,
            channel_notice: enabled,
            channel_action: enabled,
            pm_message: enabled,
            pm_action: enabled,
            operator_op: enabled,
            operator_voice: enabled,
            operator_kick: enabled,
            operator_ban: enabled,
            user_part: enabled,
            user_quit: enabled,
            templates: Vec::new(),
        }
    }

    /// Every category unchecked.
    pub fn none() -> Self {
        ActionsConfig::all(false)
    }

    fn flag_mut(&mut self, category: ActionCategory) -> &mut bool {
        match category {
            ActionCategory::ChannelCommand => &mut self.channel_command,
            ActionCategory::PmCommand => &mut self.pm_command,
            ActionCategory::ChannelMessage => &mut self.channel_message,
            ActionCategory::ChannelNotice => &mut self.channel_notice,
            ActionCategory::ChannelAction => &mut self.channel_action,
            ActionCategory::PmMessage => &mut self.pm_message,
            ActionCategory::PmAction => &mut self.pm_action,
            ActionCategory::OperatorOp => &mut self.operator_op,
            ActionCategory::OperatorVoice => &mut self.operator_voice,
            ActionCategory::OperatorKick => &mut self.operator_kick,
            ActionCategory::OperatorBan => &mut self.operator_ban,
            ActionCategory::UserPart => &mut self.user_part,
            ActionCategory::UserQuit => &mut self.user_quit,
        }
    }

    pub fn is_enabled(&self, category: ActionCategory) -> bool {
        match category {
            ActionCategory::ChannelCommand => self.channel_command,
            ActionCategory::PmCommand => self.pm_command,
            ActionCategory::ChannelMessage => self.channel_message,
            ActionCategory::ChannelNotice => self.channel_notice,
            ActionCategory::ChannelAction => self.channel_action,
            ActionCategory::PmMessage => self.pm_message,
            ActionCategory::PmAction => self.pm_action,
            ActionCategory::OperatorOp => self.operator_op,
            ActionCategory::OperatorVoice => self.operator_voice,
            ActionCategory::OperatorKick => self.operator_kick,
            ActionCategory::OperatorBan => self.operator_ban,
            ActionCategory::UserPart => self.user_part,
            ActionCategory::UserQuit => self.user_quit,
        }
    }

    pub fn set_enabled(&mut self, category: ActionCategory, enabled: bool) {
        *self.flag_mut(category) = enabled;
    }

    /// Last override declared for the category wins.
    pub fn template_override(&self, category: ActionCategory) -> Option<&[String]> {
        self.templates
            .iter()
            .rev()
            .find(|o| o.category == category)
            .map(|o| o.lines.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_toml(
            r##"
[server]
port = 6668

[bot]
prefix = "vu"
channel_prefix = "#t"

[actions]
operator_ban = false

[[actions.templates]]
category = "pm_command"
lines = ["PRIVMSG {targetNick} :!stats {nick}"]
"##,
        )
        .unwrap();
        assert_eq!(config.server.port, 6668);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.server.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(config.bot.prefix, "vu");
        assert_eq!(config.bot.command, "?jmeter");
        assert_eq!(config.bot.channels, 1);
        assert!(!config.actions.is_enabled(ActionCategory::OperatorBan));
        assert!(config.actions.is_enabled(ActionCategory::OperatorKick));
        assert_eq!(
            config.actions.template_override(ActionCategory::PmCommand),
            Some(&["PRIVMSG {targetNick} :!stats {nick}".to_owned()][..])
        );
        assert_eq!(config.load, LoadConfig::default());
    }

    #[test]
    fn test_saved_config_loads_back() {
        let mut config = Config::default();
        config.bot.target_nick = "Quackbot".to_owned();
        config.actions.set_enabled(ActionCategory::UserQuit, false);
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        assert!(matches!(
            Config::from_toml("[server]\nport = \"six\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_sample_config_file_parses() {
        let config = Config::from_toml(include_str!("../../../config/harness.toml")).unwrap();
        assert_eq!(config.bot.channels, 4);
        assert_eq!(config.load.users, 10);
        assert!(!config.actions.is_enabled(ActionCategory::OperatorKick));
        assert!(config.actions.template_override(ActionCategory::ChannelMessage).is_some());
    }
}

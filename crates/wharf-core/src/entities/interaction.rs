//! Interactions - slash command invocations and the commands behind them

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MemberPayload, User};
use crate::value_objects::Snowflake;

/// Interaction type tag as sent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum InteractionType {
    Ping,
    ApplicationCommand,
    MessageComponent,
    Autocomplete,
    ModalSubmit,
    Unknown(u8),
}

impl From<u8> for InteractionType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Ping,
            2 => Self::ApplicationCommand,
            3 => Self::MessageComponent,
            4 => Self::Autocomplete,
            5 => Self::ModalSubmit,
            other => Self::Unknown(other),
        }
    }
}

impl From<InteractionType> for u8 {
    fn from(kind: InteractionType) -> Self {
        match kind {
            InteractionType::Ping => 1,
            InteractionType::ApplicationCommand => 2,
            InteractionType::MessageComponent => 3,
            InteractionType::Autocomplete => 4,
            InteractionType::ModalSubmit => 5,
            InteractionType::Unknown(other) => other,
        }
    }
}

/// Command option type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum CommandOptionType {
    SubCommand,
    SubCommandGroup,
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Attachment,
    Unknown(u8),
}

impl From<u8> for CommandOptionType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::SubCommand,
            2 => Self::SubCommandGroup,
            3 => Self::String,
            4 => Self::Integer,
            5 => Self::Boolean,
            6 => Self::User,
            7 => Self::Channel,
            8 => Self::Role,
            9 => Self::Mentionable,
            10 => Self::Number,
            11 => Self::Attachment,
            other => Self::Unknown(other),
        }
    }
}

impl From<CommandOptionType> for u8 {
    fn from(kind: CommandOptionType) -> Self {
        match kind {
            CommandOptionType::SubCommand => 1,
            CommandOptionType::SubCommandGroup => 2,
            CommandOptionType::String => 3,
            CommandOptionType::Integer => 4,
            CommandOptionType::Boolean => 5,
            CommandOptionType::User => 6,
            CommandOptionType::Channel => 7,
            CommandOptionType::Role => 8,
            CommandOptionType::Mentionable => 9,
            CommandOptionType::Number => 10,
            CommandOptionType::Attachment => 11,
            CommandOptionType::Unknown(other) => other,
        }
    }
}

/// A command registered for the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationCommand {
    pub id: Snowflake,
    pub application_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Vec<Value>,
}

/// The invoked command and the values the user filled in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandData {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandDataOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDataOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CommandOptionType,
    #[serde(default)]
    pub value: Option<Value>,
    /// Nested options of a subcommand or group
    #[serde(default)]
    pub options: Vec<CommandDataOption>,
}

/// Interaction received through `INTERACTION_CREATE`
///
/// Guild invocations carry `member`, DM invocations carry `user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Snowflake,
    pub application_id: Snowflake,
    #[serde(rename = "type")]
    pub kind: InteractionType,
    #[serde(default)]
    pub data: Option<CommandData>,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    #[serde(default)]
    pub member: Option<MemberPayload>,
    #[serde(default)]
    pub user: Option<User>,
    /// Response token, valid for 15 minutes
    pub token: String,
}

impl Interaction {
    /// Invoking user, wherever it was sent from
    pub fn user(&self) -> Option<&User> {
        self.member.as_ref().map(|m| &m.user).or(self.user.as_ref())
    }

    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.name.as_str())
    }

    /// Top-level option value by name
    pub fn option(&self, name: &str) -> Option<&Value> {
        self.data
            .as_ref()?
            .options
            .iter()
            .find(|o| o.name == name)?
            .value
            .as_ref()
    }
}

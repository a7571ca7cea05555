//! Typed REST endpoints

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use wharf_core::{
    ApplicationCommand, Channel, CommandOptionType, Embed, Guild, GuildSource, MemberPayload,
    Message, MessageFlags, Role, Snowflake, SourceResult, User,
};

use crate::client::Http;
use crate::error::HttpResult;
use crate::request::{AttachmentFile, Request, RequestBody};
use crate::route::Route;

/// Largest page `GET /guilds/{id}/members` will return
pub const MEMBER_PAGE_LIMIT: u32 = 1000;

/// Interaction callback type for "reply with a message"
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;

/// Command type for chat input (slash) commands
const CHAT_INPUT: u8 = 1;

/// `GET /gateway/bot` response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayBot {
    pub url: String,
    #[serde(default)]
    pub shards: u32,
    pub session_start_limit: Option<SessionStartLimit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    pub reset_after: u64,
    #[serde(default)]
    pub max_concurrency: u32,
}

/// Fields for a new role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateRole {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hoist: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentionable: Option<bool>,
}

/// A message to send, optionally with embeds and files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateMessage {
    pub content: String,
    pub embeds: Vec<Embed>,
    pub flags: Option<MessageFlags>,
    pub files: Vec<AttachmentFile>,
}

impl CreateMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn flags(mut self, flags: MessageFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn file(mut self, file: AttachmentFile) -> Self {
        self.files.push(file);
        self
    }

    /// JSON payload plus the files that go beside it
    fn into_parts(self) -> (Value, Vec<AttachmentFile>) {
        let mut payload = json!({});
        if !self.content.is_empty() || self.embeds.is_empty() {
            payload["content"] = Value::String(self.content);
        }
        if !self.embeds.is_empty() {
            payload["embeds"] = json!(self.embeds);
        }
        if let Some(flags) = self.flags {
            payload["flags"] = json!(flags);
        }
        if !self.files.is_empty() {
            let attachments: Vec<Value> = self
                .files
                .iter()
                .enumerate()
                .map(|(id, file)| json!({ "id": id, "filename": file.filename }))
                .collect();
            payload["attachments"] = Value::Array(attachments);
        }
        (payload, self.files)
    }

    fn into_body(self) -> RequestBody {
        let (payload, files) = self.into_parts();
        RequestBody::with_files(payload, files)
    }
}

/// Choice offered for a string, integer or number option
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandChoice {
    pub name: String,
    pub value: Value,
}

/// One option of a slash command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOption {
    #[serde(rename = "type")]
    pub kind: CommandOptionType,
    pub name: String,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<CommandChoice>,
}

impl CommandOption {
    pub fn new(
        kind: CommandOptionType,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            description: description.into(),
            required: false,
            choices: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn choice(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.choices.push(CommandChoice {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// A global slash command to register
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateCommand {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
}

impl CreateCommand {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: CHAT_INPUT,
            options: Vec::new(),
        }
    }

    pub fn option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }
}

impl Http {
    // =========================================================================
    // Gateway
    // =========================================================================

    pub async fn get_gateway_bot(&self) -> HttpResult<GatewayBot> {
        self.request(Route::get("/gateway/bot").into()).await
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn get_current_user(&self) -> HttpResult<User> {
        self.request(Route::get("/users/@me").into()).await
    }

    pub async fn get_user(&self, user_id: Snowflake) -> HttpResult<User> {
        self.request(Route::get("/users/{user_id}").param("user_id", user_id).into())
            .await
    }

    // =========================================================================
    // Guilds
    // =========================================================================

    pub async fn get_guild(&self, guild_id: Snowflake) -> HttpResult<Guild> {
        self.request(Route::get("/guilds/{guild_id}").param("guild_id", guild_id).into())
            .await
    }

    pub async fn get_guild_channels(&self, guild_id: Snowflake) -> HttpResult<Vec<Channel>> {
        let route = Route::get("/guilds/{guild_id}/channels").param("guild_id", guild_id);
        self.request(route.into()).await
    }

    pub async fn get_guild_roles(&self, guild_id: Snowflake) -> HttpResult<Vec<Role>> {
        let route = Route::get("/guilds/{guild_id}/roles").param("guild_id", guild_id);
        self.request(route.into()).await
    }

    /// First page of up to 1000 members
    pub async fn get_guild_members(&self, guild_id: Snowflake) -> HttpResult<Vec<MemberPayload>> {
        let route = Route::get("/guilds/{guild_id}/members").param("guild_id", guild_id);
        self.request(Request::new(route).query("limit", MEMBER_PAGE_LIMIT))
            .await
    }

    pub async fn get_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> HttpResult<MemberPayload> {
        let route = Route::get("/guilds/{guild_id}/members/{user_id}")
            .param("guild_id", guild_id)
            .param("user_id", user_id);
        self.request(route.into()).await
    }

    /// Create a role; `reason` lands in the audit log
    pub async fn create_role(
        &self,
        guild_id: Snowflake,
        role: &CreateRole,
        reason: Option<&str>,
    ) -> HttpResult<Role> {
        let route = Route::post("/guilds/{guild_id}/roles").param("guild_id", guild_id);
        let request = Request::new(route)
            .json(serde_json::to_value(role)?)
            .reason(reason);
        let mut created: Role = self.request(request).await?;
        created.guild_id = guild_id;
        Ok(created)
    }

    /// Ban a user, deleting up to `delete_message_seconds` of their history
    pub async fn ban_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        delete_message_seconds: u32,
        reason: Option<&str>,
    ) -> HttpResult<()> {
        let route = Route::put("/guilds/{guild_id}/bans/{user_id}")
            .param("guild_id", guild_id)
            .param("user_id", user_id);
        let body = json!({ "delete_message_seconds": delete_message_seconds });
        self.request_empty(Request::new(route).json(body).reason(reason))
            .await
    }

    // =========================================================================
    // Channels
    // =========================================================================

    pub async fn get_channel(&self, channel_id: Snowflake) -> HttpResult<Channel> {
        let route = Route::get("/channels/{channel_id}").param("channel_id", channel_id);
        self.request(route.into()).await
    }

    pub async fn send_message(
        &self,
        channel_id: Snowflake,
        message: CreateMessage,
    ) -> HttpResult<Message> {
        let route = Route::post("/channels/{channel_id}/messages").param("channel_id", channel_id);
        self.request(Request::new(route).body(message.into_body()))
            .await
    }

    // =========================================================================
    // Application commands
    // =========================================================================

    /// Create or overwrite a global command with the same name
    pub async fn register_app_command(
        &self,
        command: &CreateCommand,
    ) -> HttpResult<ApplicationCommand> {
        let application_id = self.application_id().await?;
        let route = Route::post("/applications/{application_id}/commands")
            .param("application_id", application_id);
        self.request(Request::new(route).json(serde_json::to_value(command)?))
            .await
    }

    pub async fn get_app_commands(&self) -> HttpResult<Vec<ApplicationCommand>> {
        let application_id = self.application_id().await?;
        let route = Route::get("/applications/{application_id}/commands")
            .param("application_id", application_id);
        self.request(route.into()).await
    }

    pub async fn delete_app_command(&self, command_id: Snowflake) -> HttpResult<()> {
        let application_id = self.application_id().await?;
        let route = Route::delete("/applications/{application_id}/commands/{command_id}")
            .param("application_id", application_id)
            .param("command_id", command_id);
        self.request_empty(route.into()).await
    }

    // =========================================================================
    // Interactions
    // =========================================================================

    /// Answer an interaction with a message
    pub async fn interaction_respond(
        &self,
        interaction_id: Snowflake,
        token: &str,
        message: CreateMessage,
    ) -> HttpResult<()> {
        let route = Route::post("/interactions/{interaction_id}/{interaction_token}/callback")
            .param("interaction_id", interaction_id)
            .param("interaction_token", token);
        let (data, files) = message.into_parts();
        let payload = json!({ "type": CHANNEL_MESSAGE_WITH_SOURCE, "data": data });
        self.request_empty(Request::new(route).body(RequestBody::with_files(payload, files)))
            .await
    }
}

#[async_trait]
impl GuildSource for Http {
    async fn guild_members(&self, guild_id: Snowflake) -> SourceResult<Vec<MemberPayload>> {
        Ok(self.get_guild_members(guild_id).await?)
    }

    async fn guild_channels(&self, guild_id: Snowflake) -> SourceResult<Vec<Channel>> {
        Ok(self.get_guild_channels(guild_id).await?)
    }

    async fn guild_roles(&self, guild_id: Snowflake) -> SourceResult<Vec<Role>> {
        Ok(self.get_guild_roles(guild_id).await?)
    }
}

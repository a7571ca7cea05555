//! In-memory entity cache
//!
//! Guild-scoped tables sit behind one lock so a dependent is always in both
//! its guild's collection and the flat table, or in neither. Users are
//! guild-independent and live in their own concurrent map.

mod guild_entry;

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use wharf_core::{CacheError, Channel, Guild, Member, MemberPayload, Role, Snowflake, User};

use guild_entry::GuildEntry;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Default)]
struct GuildTables {
    guilds: HashMap<Snowflake, GuildEntry>,
    channels: HashMap<Snowflake, Arc<Channel>>,
    roles: HashMap<Snowflake, Arc<Role>>,
    members: HashMap<(Snowflake, Snowflake), Arc<Member>>,
}

/// Entity counts, mostly for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub guilds: usize,
    pub channels: usize,
    pub roles: usize,
    pub members: usize,
    pub users: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryCache {
    tables: RwLock<GuildTables>,
    users: DashMap<Snowflake, Arc<User>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new shared cache
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // =========================================================================
    // Guilds
    // =========================================================================

    /// Insert a guild if absent; returns the cached guild either way
    pub fn add_guild(&self, guild: Guild) -> Arc<Guild> {
        let mut tables = self.tables.write();
        let entry = tables
            .guilds
            .entry(guild.id)
            .or_insert_with(|| GuildEntry::new(guild));
        Arc::clone(&entry.guild)
    }

    pub fn guild(&self, guild_id: Snowflake) -> Option<Arc<Guild>> {
        self.tables
            .read()
            .guilds
            .get(&guild_id)
            .map(|entry| Arc::clone(&entry.guild))
    }

    pub fn guilds(&self) -> Vec<Arc<Guild>> {
        self.tables
            .read()
            .guilds
            .values()
            .map(|entry| Arc::clone(&entry.guild))
            .collect()
    }

    /// Remove a guild and everything it owns
    ///
    /// Owned collections are drained and popped from the flat tables
    /// before the guild entry itself goes.
    pub fn remove_guild(&self, guild_id: Snowflake) -> CacheResult<Arc<Guild>> {
        let mut tables = self.tables.write();
        let tables = &mut *tables;

        let entry = tables
            .guilds
            .get_mut(&guild_id)
            .ok_or(CacheError::GuildNotFound(guild_id))?;

        for (user_id, _) in entry.members.drain() {
            tables.members.remove(&(guild_id, user_id));
        }
        for (channel_id, _) in entry.channels.drain() {
            tables.channels.remove(&channel_id);
        }
        for (role_id, _) in entry.roles.drain() {
            tables.roles.remove(&role_id);
        }

        let entry = tables
            .guilds
            .remove(&guild_id)
            .ok_or(CacheError::GuildNotFound(guild_id))?;
        debug!(guild_id = %guild_id, "Removed guild from cache");
        Ok(entry.guild)
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Insert a channel if absent
    ///
    /// Guild channels require their guild to be cached; DM channels go in
    /// the flat table only.
    pub fn add_channel(&self, channel: Channel) -> CacheResult<Arc<Channel>> {
        let mut tables = self.tables.write();
        let tables = &mut *tables;

        if let Some(existing) = tables.channels.get(&channel.id) {
            return Ok(Arc::clone(existing));
        }

        let channel = Arc::new(channel);
        if let Some(guild_id) = channel.guild_id {
            let entry = tables
                .guilds
                .get_mut(&guild_id)
                .ok_or(CacheError::GuildNotFound(guild_id))?;
            entry.channels.insert(channel.id, Arc::clone(&channel));
        }
        tables.channels.insert(channel.id, Arc::clone(&channel));
        Ok(channel)
    }

    /// Insert a channel under `guild_id`, filling in the payload's missing guild id
    pub fn add_guild_channel(
        &self,
        guild_id: Snowflake,
        mut channel: Channel,
    ) -> CacheResult<Arc<Channel>> {
        channel.guild_id = Some(guild_id);
        self.add_channel(channel)
    }

    pub fn channel(&self, channel_id: Snowflake) -> Option<Arc<Channel>> {
        self.tables.read().channels.get(&channel_id).cloned()
    }

    pub fn remove_channel(&self, channel_id: Snowflake) -> CacheResult<Arc<Channel>> {
        let mut tables = self.tables.write();
        let tables = &mut *tables;

        let channel = tables
            .channels
            .get(&channel_id)
            .cloned()
            .ok_or(CacheError::ChannelNotFound(channel_id))?;

        if let Some(guild_id) = channel.guild_id {
            let entry = tables
                .guilds
                .get_mut(&guild_id)
                .ok_or(CacheError::GuildNotFound(guild_id))?;
            entry.channels.remove(&channel_id);
        }
        tables.channels.remove(&channel_id);
        Ok(channel)
    }

    pub fn guild_channels(&self, guild_id: Snowflake) -> CacheResult<Vec<Arc<Channel>>> {
        let tables = self.tables.read();
        let entry = tables
            .guilds
            .get(&guild_id)
            .ok_or(CacheError::GuildNotFound(guild_id))?;
        Ok(entry.channels.values().cloned().collect())
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub fn add_role(&self, guild_id: Snowflake, mut role: Role) -> CacheResult<Arc<Role>> {
        let mut tables = self.tables.write();
        let tables = &mut *tables;

        let entry = tables
            .guilds
            .get_mut(&guild_id)
            .ok_or(CacheError::GuildNotFound(guild_id))?;
        if let Some(existing) = entry.roles.get(&role.id) {
            return Ok(Arc::clone(existing));
        }

        role.guild_id = guild_id;
        let role = Arc::new(role);
        entry.roles.insert(role.id, Arc::clone(&role));
        tables.roles.insert(role.id, Arc::clone(&role));
        Ok(role)
    }

    pub fn role(&self, role_id: Snowflake) -> Option<Arc<Role>> {
        self.tables.read().roles.get(&role_id).cloned()
    }

    pub fn remove_role(&self, guild_id: Snowflake, role_id: Snowflake) -> CacheResult<Arc<Role>> {
        let mut tables = self.tables.write();
        let tables = &mut *tables;

        let entry = tables
            .guilds
            .get_mut(&guild_id)
            .ok_or(CacheError::GuildNotFound(guild_id))?;
        let role = entry
            .roles
            .remove(&role_id)
            .ok_or(CacheError::RoleNotFound(role_id))?;
        tables.roles.remove(&role_id);
        Ok(role)
    }

    pub fn guild_roles(&self, guild_id: Snowflake) -> CacheResult<Vec<Arc<Role>>> {
        let tables = self.tables.read();
        let entry = tables
            .guilds
            .get(&guild_id)
            .ok_or(CacheError::GuildNotFound(guild_id))?;
        Ok(entry.roles.values().cloned().collect())
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Insert a member (and its user) if absent
    pub fn add_member(
        &self,
        guild_id: Snowflake,
        payload: &MemberPayload,
    ) -> CacheResult<Arc<Member>> {
        let mut tables = self.tables.write();
        let tables = &mut *tables;

        let entry = tables
            .guilds
            .get_mut(&guild_id)
            .ok_or(CacheError::GuildNotFound(guild_id))?;

        let user_id = payload.user.id;
        if let Some(existing) = entry.members.get(&user_id) {
            return Ok(Arc::clone(existing));
        }

        self.add_user(payload.user.clone());
        let member = Arc::new(Member::from_payload(guild_id, payload));
        entry.members.insert(user_id, Arc::clone(&member));
        tables.members.insert((guild_id, user_id), Arc::clone(&member));
        Ok(member)
    }

    pub fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Arc<Member>> {
        self.tables.read().members.get(&(guild_id, user_id)).cloned()
    }

    pub fn remove_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> CacheResult<Arc<Member>> {
        let mut tables = self.tables.write();
        let tables = &mut *tables;

        let entry = tables
            .guilds
            .get_mut(&guild_id)
            .ok_or(CacheError::GuildNotFound(guild_id))?;
        let member = entry
            .members
            .remove(&user_id)
            .ok_or(CacheError::MemberNotFound { guild_id, user_id })?;
        tables.members.remove(&(guild_id, user_id));
        Ok(member)
    }

    pub fn guild_members(&self, guild_id: Snowflake) -> CacheResult<Vec<Arc<Member>>> {
        let tables = self.tables.read();
        let entry = tables
            .guilds
            .get(&guild_id)
            .ok_or(CacheError::GuildNotFound(guild_id))?;
        Ok(entry.members.values().cloned().collect())
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn add_user(&self, user: User) -> Arc<User> {
        Arc::clone(
            self.users
                .entry(user.id)
                .or_insert_with(|| Arc::new(user))
                .value(),
        )
    }

    pub fn user(&self, user_id: Snowflake) -> Option<Arc<User>> {
        self.users.get(&user_id).map(|u| Arc::clone(u.value()))
    }

    pub fn remove_user(&self, user_id: Snowflake) -> CacheResult<Arc<User>> {
        self.users
            .remove(&user_id)
            .map(|(_, user)| user)
            .ok_or(CacheError::UserNotFound(user_id))
    }

    pub fn stats(&self) -> CacheStats {
        let tables = self.tables.read();
        CacheStats {
            guilds: tables.guilds.len(),
            channels: tables.channels.len(),
            roles: tables.roles.len(),
            members: tables.members.len(),
            users: self.users.len(),
        }
    }
}

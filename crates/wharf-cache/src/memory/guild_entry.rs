//! A cached guild and the collections it owns

use std::collections::HashMap;
use std::sync::Arc;

use wharf_core::{Channel, Guild, Member, Role, Snowflake};

/// Guild plus its owned channels, roles and members (keyed by user id)
///
/// Every value here is the same `Arc` held in the matching flat table.
#[derive(Debug)]
pub(crate) struct GuildEntry {
    pub guild: Arc<Guild>,
    pub channels: HashMap<Snowflake, Arc<Channel>>,
    pub roles: HashMap<Snowflake, Arc<Role>>,
    pub members: HashMap<Snowflake, Arc<Member>>,
}

impl GuildEntry {
    pub fn new(guild: Guild) -> Self {
        Self {
            guild: Arc::new(guild),
            channels: HashMap::new(),
            roles: HashMap::new(),
            members: HashMap::new(),
        }
    }
}

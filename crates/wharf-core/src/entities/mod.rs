//! Entity records mirrored from the platform

mod channel;
mod embed;
mod guild;
mod interaction;
mod member;
mod message;
mod role;
mod user;

pub use channel::{Channel, ChannelType};
pub use embed::{Embed, EmbedField, EmbedFooter, EmbedMedia};
pub use guild::Guild;
pub use interaction::{
    ApplicationCommand, CommandData, CommandDataOption, CommandOptionType, Interaction,
    InteractionType,
};
pub use member::{Member, MemberPayload};
pub use message::{Attachment, Message};
pub use role::Role;
pub use user::User;

//! Channel lifecycle: joining, bridging existing groups, sharding DC groups
//! by size, removing members and tearing channels down.
//!
//! A channel is one MUC room. It is bound to one or more DC groups; when a
//! group fills up to `max_group_size` contacts, the next joiner gets a fresh
//! group. The channel disappears, and the bridge leaves the room, once its
//! last bound group is gone.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use dcxmpp_shared::{ChannelName, ChatId};
use dcxmpp_store::{SharedDatabase, StoreError};

use crate::error::BridgeError;
use crate::gateway::MucGateway;
use crate::host::DcClient;
use crate::nicks::NickRegistry;

/// Outcome of [`ChannelManager::on_member_removed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Teardown {
    /// The group stays bound.
    None,
    /// The group was unbound; the channel still has other groups.
    Group { channel: String },
    /// The group was the channel's last one; the channel is gone.
    Channel { channel: String },
}

#[derive(Clone)]
pub struct ChannelManager {
    store: SharedDatabase,
    dc: Arc<dyn DcClient>,
    muc: Arc<dyn MucGateway>,
    nicks: NickRegistry,
    max_group_size: usize,
}

impl ChannelManager {
    pub fn new(
        store: SharedDatabase,
        dc: Arc<dyn DcClient>,
        muc: Arc<dyn MucGateway>,
        max_group_size: usize,
    ) -> Self {
        Self {
            nicks: NickRegistry::new(store.clone()),
            store,
            dc,
            muc,
            max_group_size,
        }
    }

    /// Add `member` to the least loaded bound group of `channel`, creating
    /// the channel and/or a new group as needed.
    pub async fn join(&self, channel: &str, member: &str) -> Result<(ChannelName, ChatId), BridgeError> {
        let channel = self.allowed_channel(channel)?;
        let name = channel.as_str();
        let created = self.ensure_channel(name).await?;

        match self.place_member(name, member).await {
            Ok(group) => Ok((channel, group)),
            Err(e) => {
                if created {
                    self.discard_channel(name).await;
                }
                Err(e)
            }
        }
    }

    async fn place_member(&self, name: &str, member: &str) -> Result<ChatId, BridgeError> {
        let mut target: Option<(ChatId, usize)> = None;
        for group in self.store.with(|db| db.list_bound_groups(name))? {
            let members = self.dc.members(group).await?;
            if members.iter().any(|m| m == member) {
                return Err(BridgeError::AlreadyMember {
                    channel: name.to_string(),
                    group,
                });
            }
            let load = members.len();
            if load < self.max_group_size && target.map_or(true, |(_, best)| load < best) {
                target = Some((group, load));
            }
        }

        let group = match target {
            Some((group, load)) => {
                debug!(channel = %name, group = %group, load, "adding member to bound group");
                self.dc.add_member(group, member).await?;
                group
            }
            None => {
                let group = self.dc.create_group(name, &[member.to_string()]).await?;
                self.store.with(|db| db.add_bound_group(group, name))?;
                info!(channel = %name, group = %group, "created bound group");
                group
            }
        };

        Ok(group)
    }

    /// Bind an existing DC group to `channel`.
    pub async fn bridge_existing(&self, chat: ChatId, channel: &str) -> Result<ChannelName, BridgeError> {
        let channel = self.allowed_channel(channel)?;
        let name = channel.as_str();

        if let Some(bound) = self.store.with(|db| db.channel_by_group(chat))? {
            return Err(BridgeError::AlreadyBound { channel: bound });
        }

        let created = self.ensure_channel(name).await?;
        let bound = self.store.with(|db| db.add_bound_group(chat, name));
        if let Err(e) = bound {
            if created {
                self.discard_channel(name).await;
            }
            return Err(match e {
                StoreError::Conflict(_) => BridgeError::AlreadyBound {
                    channel: name.to_string(),
                },
                other => other.into(),
            });
        }

        info!(channel = %name, group = %chat, "bridged existing group");
        Ok(channel)
    }

    /// Take `member` out of every bound group of `channel` and tell the
    /// remaining groups.
    pub async fn leave(&self, member: &str, channel: &str) -> Result<(), BridgeError> {
        let channel = ChannelName::parse(channel).ok_or(BridgeError::WrongSyntax)?;
        let name = channel.as_str();

        let groups = self.store.with(|db| db.list_bound_groups(name))?;
        let mut left = Vec::new();
        for group in &groups {
            if self.is_in_group(*group, member).await? {
                self.dc.remove_member(*group, member).await?;
                left.push(*group);
            }
        }

        if left.is_empty() {
            return Err(BridgeError::NotAMember {
                channel: name.to_string(),
                who: None,
            });
        }

        let nick = self.nicks.nick(member)?;
        let notice = format!("** {nick} left");
        for group in groups.iter().filter(|g| !left.contains(*g)) {
            if let Err(e) = self.dc.send_text(*group, &notice).await {
                warn!(group = %group, error = %e, "Failed to post leave notice");
            }
        }

        for group in left {
            self.on_member_removed(group, member).await?;
        }

        info!(channel = %name, member = %member, "member left channel");
        Ok(())
    }

    /// React to `addr` having left or been removed from a DC group.
    ///
    /// The group is unbound once the bot itself is gone or at most one
    /// contact remains; the channel goes with its last group.
    pub async fn on_member_removed(&self, chat: ChatId, addr: &str) -> Result<Teardown, BridgeError> {
        if addr != self.dc.self_addr() {
            let remaining = self.dc.members(chat).await?.len();
            if remaining > 1 {
                return Ok(Teardown::None);
            }
        }

        let teardown = self.store.with(|db| {
            let Some(channel) = db.channel_by_group(chat)? else {
                return Ok(Teardown::None);
            };
            db.remove_bound_group(chat)?;
            if db.list_bound_groups(&channel)?.is_empty() {
                db.remove_channel(&channel)?;
                Ok(Teardown::Channel { channel })
            } else {
                Ok(Teardown::Group { channel })
            }
        })?;

        match &teardown {
            Teardown::None => {}
            Teardown::Group { channel } => {
                info!(channel = %channel, group = %chat, "unbound group");
            }
            Teardown::Channel { channel } => {
                info!(channel = %channel, group = %chat, "last group gone, leaving channel");
                self.muc.leave_channel(channel).await?;
            }
        }
        Ok(teardown)
    }

    /// Remove a member from a channel on someone's request.
    ///
    /// Inside a bound group `payload` is the optional target. Elsewhere its
    /// first word names the channel, which the requester must belong to.
    /// The target defaults to the requester.
    pub async fn remove(&self, chat: ChatId, payload: &str, requester: &str) -> Result<(), BridgeError> {
        let payload = payload.trim();

        let (channel, target_arg) = match self.store.with(|db| db.channel_by_group(chat))? {
            Some(channel) => (channel, payload),
            None => {
                let (first, rest) = payload
                    .split_once(char::is_whitespace)
                    .unwrap_or((payload, ""));
                let channel = ChannelName::parse(first).ok_or(BridgeError::WrongSyntax)?;
                if !self.is_member(channel.as_str(), requester).await? {
                    return Err(BridgeError::NotAMember {
                        channel: channel.to_string(),
                        who: None,
                    });
                }
                (channel.to_string(), rest.trim())
            }
        };

        let target = if target_arg.is_empty() {
            requester.to_string()
        } else {
            self.nicks.resolve(target_arg)?
        };

        let groups = self.store.with(|db| db.list_bound_groups(&channel))?;
        for group in &groups {
            if !self.is_in_group(*group, &target).await? {
                continue;
            }

            self.dc.remove_member(*group, &target).await?;
            info!(channel = %channel, group = %group, target = %target, by = %requester, "member removed");

            if target != requester {
                let by = self.nicks.nick(requester)?;
                let nick = self.nicks.nick(&target)?;
                let notice = format!("** {nick} removed by {by}");
                for g in &groups {
                    if let Err(e) = self.dc.send_text(*g, &notice).await {
                        warn!(group = %g, error = %e, "Failed to post removal notice");
                    }
                }
                self.dc
                    .send_to_contact(&target, &format!("Removed from {channel} by {by}"))
                    .await?;
            }

            self.on_member_removed(*group, &target).await?;
            return Ok(());
        }

        Err(BridgeError::NotAMember {
            channel,
            who: Some(if target_arg.is_empty() {
                target
            } else {
                target_arg.to_string()
            }),
        })
    }

    /// Whether `member` is in any bound group of `channel`.
    pub async fn is_member(&self, channel: &str, member: &str) -> Result<bool, BridgeError> {
        for group in self.store.with(|db| db.list_bound_groups(channel))? {
            if self.is_in_group(group, member).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn is_in_group(&self, group: ChatId, member: &str) -> Result<bool, BridgeError> {
        Ok(self.dc.members(group).await?.iter().any(|m| m == member))
    }

    fn allowed_channel(&self, raw: &str) -> Result<ChannelName, BridgeError> {
        let channel = ChannelName::parse(raw).ok_or(BridgeError::WrongSyntax)?;
        if !self.store.with(|db| db.is_whitelisted(channel.as_str()))? {
            return Err(BridgeError::NotWhitelisted(channel.to_string()));
        }
        Ok(channel)
    }

    /// Create the channel and join its room if it does not exist yet.
    /// Returns whether the channel was created.
    async fn ensure_channel(&self, name: &str) -> Result<bool, BridgeError> {
        let created = self.store.with(|db| {
            if db.channel_exists(name)? {
                Ok(false)
            } else {
                db.add_channel(name)?;
                Ok(true)
            }
        })?;

        if created {
            info!(channel = %name, "new channel, joining room");
            if let Err(e) = self.muc.join_channel(name).await {
                self.discard_channel(name).await;
                return Err(e.into());
            }
        }
        Ok(created)
    }

    /// Undo a channel created for a join or bridge that did not bind any
    /// group.
    async fn discard_channel(&self, name: &str) {
        warn!(channel = %name, "no group bound, discarding new channel");
        if let Err(e) = self.store.with(|db| db.remove_channel(name)) {
            error!(channel = %name, error = %e, "Failed to discard channel");
        }
        if let Err(e) = self.muc.leave_channel(name).await {
            warn!(channel = %name, error = %e, "Failed to leave room");
        }
    }
}

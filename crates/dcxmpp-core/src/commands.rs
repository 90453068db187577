//! User command registration table.
//!
//! The table is built once at startup; the bridge command only exists when
//! `allow_bridging` is enabled.

use std::collections::BTreeMap;

use futures::future::BoxFuture;

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::host::IncomingMessage;
use crate::replies::Replies;

pub const CMD_JOIN: &str = "/xmpp_join";
pub const CMD_NICK: &str = "/xmpp_nick";
pub const CMD_MEMBERS: &str = "/xmpp_members";
pub const CMD_BRIDGE: &str = "/xmpp_bridge";
pub const CMD_REMOVE: &str = "/xmpp_remove";

/// Arguments of one command invocation.
pub struct CommandContext<'a> {
    /// Everything after the command name, trimmed.
    pub payload: &'a str,
    pub message: &'a IncomingMessage,
}

pub type CommandFuture<'a> = BoxFuture<'a, Result<Replies, BridgeError>>;

pub type Handler = for<'a> fn(&'a Bridge, &'a CommandContext<'a>) -> CommandFuture<'a>;

#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub handler: Handler,
}

pub struct CommandTable {
    entries: BTreeMap<&'static str, CommandSpec>,
}

impl CommandTable {
    pub fn new(allow_bridging: bool) -> Self {
        let mut table = Self {
            entries: BTreeMap::new(),
        };
        table.register(CMD_JOIN, "Join the given XMPP channel.", cmd_join);
        table.register(
            CMD_NICK,
            "Set your XMPP nick or display your current nick if no new nick is given.",
            cmd_nick,
        );
        table.register(CMD_MEMBERS, "Show list of XMPP channel members.", cmd_members);
        table.register(
            CMD_REMOVE,
            "Remove the DC member with the given nick from the XMPP channel, if no nick is given remove yourself.",
            cmd_remove,
        );
        if allow_bridging {
            table.register(CMD_BRIDGE, "Bridge current group to the given XMPP channel.", cmd_bridge);
        }
        table
    }

    fn register(&mut self, name: &'static str, description: &'static str, handler: Handler) {
        self.entries.insert(
            name,
            CommandSpec {
                name,
                description,
                handler,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.entries.values()
    }
}

/// Split `"/name payload"` into its parts. Not a command: `None`.
pub fn parse_command(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if !text.starts_with('/') {
        return None;
    }
    let (name, payload) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    Some((name, payload.trim()))
}

fn cmd_join<'a>(bridge: &'a Bridge, ctx: &'a CommandContext<'a>) -> CommandFuture<'a> {
    Box::pin(async move {
        let sender = ctx.message.sender.as_str();
        let (channel, _) = bridge.channels().join(ctx.payload, sender).await?;
        let nick = bridge.nicks().nick(sender)?;
        Ok(Replies::text(format!("** You joined {channel} as {nick}")))
    })
}

fn cmd_nick<'a>(bridge: &'a Bridge, ctx: &'a CommandContext<'a>) -> CommandFuture<'a> {
    Box::pin(async move {
        let addr = ctx.message.sender.as_str();
        if ctx.payload.is_empty() {
            let nick = bridge.nicks().nick(addr)?;
            return Ok(Replies::text(format!("** Nick: {nick}")));
        }
        bridge.nicks().rename(addr, ctx.payload)?;
        Ok(Replies::text(format!("** Nick: {}", ctx.payload)))
    })
}

fn cmd_members<'a>(bridge: &'a Bridge, ctx: &'a CommandContext<'a>) -> CommandFuture<'a> {
    Box::pin(async move {
        let members = bridge.relay().list_members(ctx.message.chat).await?;
        Ok(Replies::text(members.render()))
    })
}

fn cmd_bridge<'a>(bridge: &'a Bridge, ctx: &'a CommandContext<'a>) -> CommandFuture<'a> {
    Box::pin(async move {
        let channel = bridge
            .channels()
            .bridge_existing(ctx.message.chat, ctx.payload)
            .await?;
        Ok(Replies::text(format!(
            "** This chat is now bridged with XMPP channel: {channel}"
        )))
    })
}

fn cmd_remove<'a>(bridge: &'a Bridge, ctx: &'a CommandContext<'a>) -> CommandFuture<'a> {
    Box::pin(async move {
        bridge
            .channels()
            .remove(ctx.message.chat, ctx.payload, &ctx.message.sender)
            .await?;
        Ok(Replies::new())
    })
}

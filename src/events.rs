//! Gateway events outside of commands: the reaction controls on now-playing messages.

use poise::serenity_prelude as serenity;
use serenity::{CreateEmbed, CreateMessage, FullEvent, GuildId, Reaction};
use tracing::{debug, error, warn};

use crate::commands::music::utils::{
    embedded_messages,
    error::MusicResult,
    reaction_controls::{ReactionControl, VOLUME_STEP},
};
use crate::{Data, Error};

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let FullEvent::ReactionAdd { add_reaction } = event {
        if let Err(e) = reaction_add(ctx, add_reaction, framework.bot_id, data).await {
            error!("Error handling reaction: {}", e);
        }
    }
    Ok(())
}

/// Handle a reaction on one of the bot's messages
async fn reaction_add(
    ctx: &serenity::Context,
    reaction: &Reaction,
    bot_id: serenity::UserId,
    data: &Data,
) -> Result<(), Error> {
    // Ignore the reactions the bot seeds itself
    let Some(user_id) = reaction.user_id else {
        return Ok(());
    };
    if user_id == bot_id {
        return Ok(());
    }

    let Some(control) = ReactionControl::from_reaction(&reaction.emoji) else {
        return Ok(());
    };
    let Some(guild_id) = reaction.guild_id else {
        return Ok(());
    };

    let message = reaction.message(&ctx.http).await?;
    if message.author.id != bot_id {
        return Ok(());
    }

    debug!("{:?} reaction from {} in guild {}", control, user_id, guild_id);
    let embed = match apply_control(data, guild_id, control).await {
        Ok(embed) => embed,
        Err(err) => {
            warn!("Reaction control {:?} failed: {}", control, err);
            embedded_messages::error_embed(err.to_string())
        }
    };

    // Leave the control ready for the next press
    if let Err(e) = reaction.delete(&ctx.http).await {
        warn!("Failed to remove {} reaction: {}", control.emoji(), e);
    }

    reaction
        .channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

/// Apply a reaction control to the guild's session, returning the embed to post.
pub async fn apply_control(
    data: &Data,
    guild_id: GuildId,
    control: ReactionControl,
) -> MusicResult<CreateEmbed> {
    let embed = match control {
        ReactionControl::Stop => {
            data.sessions.stop(guild_id).await?;
            embedded_messages::stopped()
        }
        ReactionControl::PlayPause => {
            let status = data.sessions.require(guild_id)?.toggle_pause().await?;
            embedded_messages::toggled(status)
        }
        ReactionControl::Skip => {
            let skipped = data.sessions.require(guild_id)?.skip().await?;
            embedded_messages::skipped(&skipped)
        }
        ReactionControl::VolumeDown => {
            let volume = data.sessions.require(guild_id)?.nudge_volume(-VOLUME_STEP).await?;
            embedded_messages::volume_set(volume)
        }
        ReactionControl::VolumeUp => {
            let volume = data.sessions.require(guild_id)?.nudge_volume(VOLUME_STEP).await?;
            embedded_messages::volume_set(volume)
        }
    };
    Ok(embed)
}

use super::*;
use crate::commands::music::{
    audio_sources::{PlayOutcome, queue_request},
    utils::{
        announcer::ChannelAnnouncer,
        session::Session,
        voice::{SongbirdTransport, get_songbird, get_user_voice_channel},
    },
};
use std::sync::Arc;
use tracing::info;

/// Play a song from a search query, a YouTube link or playlist, or a Spotify link
#[poise::command(prefix_command, slash_command, guild_only, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search query"]
    #[rest]
    query: String,
) -> CommandResult {
    info!("Received play command with query: {}", query);
    let Some(guild_id) = ctx.guild_id() else {
        return reply_error(ctx, &MusicError::NotInGuild).await;
    };

    // Get the user's voice channel
    let voice_channel =
        match get_user_voice_channel(ctx.serenity_context(), guild_id, ctx.author().id) {
            Ok(channel_id) => channel_id,
            Err(err) => return reply_error(ctx, &err).await,
        };

    // Resolution may take a while
    ctx.defer().await?;

    let manager = match get_songbird(ctx.serenity_context()).await {
        Ok(manager) => manager,
        Err(err) => return reply_error(ctx, &err).await,
    };

    let data = ctx.data();
    let http = ctx.serenity_context().http.clone();
    let text_channel = ctx.channel_id();

    let session = data
        .sessions
        .get_or_start(guild_id, voice_channel, || {
            Session::spawn(
                Arc::new(SongbirdTransport::new(
                    manager,
                    guild_id,
                    data.http_client.clone(),
                )),
                Arc::new(ChannelAnnouncer::new(http, text_channel)),
                data.config.default_volume,
            )
        })
        .await;
    let session = match session {
        Ok(session) => session,
        Err(err) => return reply_error(ctx, &err).await,
    };

    let requested_by = ctx.author().display_name().to_string();
    let reply = match queue_request(data.resolver.as_ref(), &session, &query, &requested_by).await
    {
        Ok(PlayOutcome::Started(entry)) => embedded_messages::started_playing(&entry),
        Ok(PlayOutcome::Queued { entry, position }) => {
            embedded_messages::added_to_queue(&entry, position)
        }
        Ok(PlayOutcome::Playlist { title }) => embedded_messages::playlist_accepted(&title),
        Err(
            err @ (MusicError::Resolution(_) | MusicError::ExternalApi(_) | MusicError::Config(_)),
        ) => {
            warn!("Failed to resolve '{}': {}", query, err);
            embedded_messages::resolution_failed(&err)
        }
        Err(err) => return reply_error(ctx, &err).await,
    };

    ctx.send(reply).await?;
    Ok(())
}

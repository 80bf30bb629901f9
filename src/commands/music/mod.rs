//! Music playback commands. Each command talks to the guild's voice session through
//! [`SessionRegistry`](utils::session_registry::SessionRegistry).

pub mod audio_sources;
pub mod utils;

pub(crate) mod pause;
pub(crate) mod play;
pub(crate) mod queue;
pub(crate) mod resume;
pub(crate) mod skip;
pub(crate) mod stop;
pub(crate) mod volume;

use poise::CreateReply;
use tracing::warn;

use crate::{CommandResult, Context};
use utils::{embedded_messages, error::MusicError, session::SessionHandle};

/// Report a failed music command to the invoking user.
async fn reply_error(ctx: Context<'_>, err: &MusicError) -> CommandResult {
    warn!("Music command '{}' failed: {}", ctx.command().name, err);
    ctx.send(embedded_messages::error(err)).await?;
    Ok(())
}

/// The running session of the guild the command was invoked in.
fn guild_session(ctx: Context<'_>) -> Result<SessionHandle, MusicError> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;
    ctx.data().sessions.require(guild_id)
}

/// Send `reply`, or the error embed when the command failed.
async fn respond(ctx: Context<'_>, result: Result<CreateReply, MusicError>) -> CommandResult {
    match result {
        Ok(reply) => {
            ctx.send(reply).await?;
            Ok(())
        }
        Err(err) => reply_error(ctx, &err).await,
    }
}

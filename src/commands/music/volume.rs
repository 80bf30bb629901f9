use super::*;

/// Set the playback volume
#[poise::command(prefix_command, slash_command, guild_only, category = "Music")]
pub async fn volume(
    ctx: Context<'_>,
    #[description = "Volume in percent (0-100)"] percent: i64,
) -> CommandResult {
    let result = match guild_session(ctx) {
        Ok(session) => session.set_volume(percent).await,
        Err(err) => Err(err),
    };
    respond(
        ctx,
        result.map(|volume| CreateReply::default().embed(embedded_messages::volume_set(volume))),
    )
    .await
}

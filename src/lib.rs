use ::serenity::all::ClientBuilder;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info};

pub mod commands;
pub mod config;
pub mod events;

use commands::music::{
    audio_sources::{SourceResolver, TrackResolver, spotify::SpotifyApi, youtube::YoutubeApi},
    pause::*,
    play::*,
    queue::*,
    resume::*,
    skip::*,
    stop::*,
    utils::session_registry::SessionRegistry,
    volume::*,
};
use config::BotConfig;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// User data, which is stored and accessible in all command invocations
pub struct Data {
    pub config: BotConfig,
    /// Shared by songbird inputs and the Spotify client.
    pub http_client: reqwest::Client,
    pub resolver: Arc<dyn TrackResolver>,
    pub sessions: SessionRegistry,
}

impl Data {
    pub fn new(config: BotConfig) -> Self {
        let http_client = reqwest::Client::new();
        let spotify = config
            .spotify
            .clone()
            .map(|credentials| SpotifyApi::new(http_client.clone(), credentials));
        if spotify.is_none() {
            info!("Spotify credentials not set, Spotify links are disabled");
        }

        Self {
            config,
            http_client,
            resolver: Arc::new(SourceResolver::new(YoutubeApi, spotify)),
            sessions: SessionRegistry::new(),
        }
    }
}

#[poise::command(prefix_command, slash_command, category = "General")]
async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}

#[poise::command(prefix_command, hide_in_help)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    if let poise::FrameworkError::Command { error, ctx, .. } = &error {
        error!("Command '{}' failed: {}", ctx.command().name, error);
    }
    if let Err(e) = poise::builtins::on_error(error).await {
        error!("Error while handling error: {}", e);
    }
}

/// Connect to Discord and serve commands until the gateway connection ends.
pub async fn run(config: BotConfig) -> Result<(), Error> {
    use songbird::SerenityInit;

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let commands = vec![
        // Default commands
        register(),
        help(),
        // Music commands
        play(),
        pause(),
        resume(),
        skip(),
        stop(),
        volume(),
        queue(),
    ];

    let token = config.discord_token.clone();
    let prefix = config.command_prefix.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(Data::new(config))
            })
        });

    let mut client = ClientBuilder::new(token, intents)
        .framework(framework.build())
        .register_songbird()
        .await?;
    client.start().await.map_err(Into::into)
}

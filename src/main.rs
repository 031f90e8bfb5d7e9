use anyhow::{anyhow, Context as _};
use serenity::{
    async_trait,
    model::{
        application::{
            command::Command as AppCommand,
            interaction::{
                application_command::ApplicationCommandInteraction, Interaction,
                InteractionResponseType,
            },
        },
        channel::Message,
        gateway::{GatewayIntents, Ready},
    },
    prelude::*,
};
use serenity_command::{CommandResponse, CommandStore};

mod commands;
mod config;
mod crosslink;
mod error;
mod markdown;
mod opengraph;
mod parser;
mod provider;
mod render;
mod track;

use config::Config;
use crosslink::CrossLinker;
use markdown::{format_links, format_reply};
use parser::LinkParser;
use provider::{Provider, ProviderPatterns};
use track::ParseResult;

const PARSING_MESSAGE: &str = "Parsing your link...";
const INVALID_MESSAGE: &str =
    "Please send a valid music track link from Spotify, Yandex Music, or MTS Music.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageRoute {
    Ignore,
    UsageHint,
    Parse,
}

/// Guild channels only get replies for links to supported services; direct
/// messages get a reply for anything.
fn route_message(patterns: &ProviderPatterns, text: &str, direct: bool) -> MessageRoute {
    match patterns.find_first_url(text) {
        None if direct => MessageRoute::UsageHint,
        None => MessageRoute::Ignore,
        Some(url) if !direct && patterns.classify(url) == Provider::Unknown => {
            MessageRoute::Ignore
        }
        Some(_) => MessageRoute::Parse,
    }
}

pub struct Handler {
    parser: LinkParser,
    crosslinker: CrossLinker,
    commands: CommandStore<Handler>,
}

impl Handler {
    async fn new(config: &Config) -> anyhow::Result<Self> {
        let parser = LinkParser::new(config)?;
        let crosslinker = CrossLinker::from_config(config).await?;
        let mut commands = CommandStore::new();
        commands::register_commands(&mut commands);
        Ok(Handler {
            parser,
            crosslinker,
            commands,
        })
    }

    /// The full reply to a message carrying a link: the card plus links to
    /// the track on other services, or the error text.
    pub async fn reply_for(&self, text: &str) -> String {
        let result = self.parser.parse_link(text).await;
        tracing::debug!(success = result.is_success(), "formatting reply");
        let mut reply = format_reply(&result);
        if let ParseResult::Success(track) = &result {
            let source = self.parser.patterns().classify(&track.url);
            let links = self.crosslinker.find_links(track, source).await;
            tracing::debug!(count = links.len(), "found links on other services");
            reply.push_str(&format_links(&links));
        }
        reply
    }

    async fn handle_message(&self, ctx: &Context, msg: &Message) -> anyhow::Result<()> {
        let direct = msg.guild_id.is_none();
        match route_message(self.parser.patterns(), &msg.content, direct) {
            MessageRoute::Ignore => return Ok(()),
            MessageRoute::UsageHint => {
                msg.channel_id.say(&ctx.http, INVALID_MESSAGE).await?;
                return Ok(());
            }
            MessageRoute::Parse => {}
        }

        let status = msg.channel_id.say(&ctx.http, PARSING_MESSAGE).await?;
        let reply = self.reply_for(&msg.content).await;
        tracing::debug!(channel = msg.channel_id.0, "replying to link");
        if let Err(err) = status.delete(ctx).await {
            tracing::warn!(error = %err, "failed to delete status message");
        }
        msg.channel_id
            .say(&ctx.http, reply)
            .await
            .context("failed to send reply")?;
        Ok(())
    }

    async fn run_command(&self, ctx: &Context, command: &ApplicationCommandInteraction) {
        let name = command.data.name.as_str();
        let response = match self.commands.get(name) {
            Some(runner) => runner.run(self, ctx, command).await,
            None => Err(anyhow!("Unknown command {name}")),
        }
        .unwrap_or_else(|err| {
            tracing::warn!(command = name, error = %err, "command failed");
            CommandResponse::Private(err.to_string())
        });
        let (contents, flags) = match response.to_contents_and_flags() {
            None => return,
            Some(c) => c,
        };
        if let Err(why) = command
            .create_interaction_response(&ctx.http, |resp| {
                resp.kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|message| message.content(contents).flags(flags))
            })
            .await
        {
            tracing::error!(command = name, error = %why, "cannot respond to slash command");
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::ApplicationCommand(command) = interaction {
            self.run_command(&ctx, &command).await;
        }
    }

    async fn message(&self, ctx: Context, new_message: Message) {
        if new_message.author.bot {
            return;
        }
        if let Err(err) = self.handle_message(&ctx, &new_message).await {
            tracing::error!(
                channel = new_message.channel_id.0,
                error = %format!("{err:#}"),
                "failed to handle message"
            );
        }
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!("{} is connected!", ready.user.name);

        let registered = AppCommand::set_global_application_commands(&ctx.http, |commands| {
            for runner in self.commands.values() {
                commands.create_application_command(|command| runner.register(command));
            }
            commands
        })
        .await;
        match registered {
            Ok(commands) => tracing::info!(count = commands.len(), "registered slash commands"),
            Err(err) => tracing::error!(error = %err, "failed to register slash commands"),
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let handler = Handler::new(&config)
        .await
        .context("Initialization failed")?;

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .application_id(config.application_id)
        .await
        .context("Error creating client")?;

    // Shards reconnect on their own with exponential backoff.
    client.start().await.context("Client error")
}

#[tokio::main]
async fn main() {
    config::init_environment();
    if let Err(err) = run().await {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;
    use crate::crosslink::TrackFinder;
    use crate::opengraph::{ArtistSplitter, OgTags, TagSource};
    use crate::render::PageRenderer;

    struct PreviewTags;

    #[async_trait]
    impl TagSource for PreviewTags {
        async fn fetch_tags(&self, _url: &str) -> anyhow::Result<OgTags> {
            Ok(OgTags {
                title: Some("Song".to_string()),
                description: Some("Song by Artist".to_string()),
                url: None,
            })
        }
    }

    struct RenderedTitle;

    #[async_trait]
    impl PageRenderer for RenderedTitle {
        async fn render_page_title(&self, _url: &str) -> anyhow::Result<String> {
            Ok("Artist — Song — Яндекс Музыка".to_string())
        }
    }

    struct SpotifySearch;

    #[async_trait]
    impl TrackFinder for SpotifySearch {
        fn provider(&self) -> Provider {
            Provider::Spotify
        }

        async fn find_track(&self, query: &str) -> anyhow::Result<Option<String>> {
            match query {
                "Artist Song" => Ok(Some("https://open.spotify.com/track/found".to_string())),
                _ => Err(anyhow!("unexpected query {query}")),
            }
        }
    }

    fn handler() -> Handler {
        let parser = LinkParser::with_sources(
            ProviderPatterns::new().unwrap(),
            ArtistSplitter::new().unwrap(),
            Box::new(PreviewTags),
            Box::new(RenderedTitle),
        );
        Handler {
            parser,
            crosslinker: CrossLinker::new(vec![Box::new(SpotifySearch)]).unwrap(),
            commands: CommandStore::new(),
        }
    }

    #[test]
    fn messages_without_links_never_reach_the_parser() {
        let patterns = ProviderPatterns::new().unwrap();
        assert_eq!(
            route_message(&patterns, "hello there", false),
            MessageRoute::Ignore
        );
        assert_eq!(
            route_message(&patterns, "www.spotify.com/track/1", true),
            MessageRoute::UsageHint
        );
        assert_eq!(
            route_message(&patterns, "see https://github.com/x/y", false),
            MessageRoute::Ignore
        );
        assert_eq!(
            route_message(&patterns, "see https://github.com/x/y", true),
            MessageRoute::Parse
        );
        assert_eq!(
            route_message(&patterns, "https://open.spotify.com/track/abc", false),
            MessageRoute::Parse
        );
    }

    #[tokio::test]
    async fn reply_links_other_services() {
        let handler = handler();
        let reply = handler
            .reply_for("https://music.yandex.ru/album/1/track/2")
            .await;
        assert_eq!(
            reply,
            "**Title:** Song\n**Artists:** Artist\n**URL:** https://music.yandex.ru/album/1/track/2\
             \n\n**Also on:**\n🟢 Spotify: https://open.spotify.com/track/found"
        );

        // No lookup on the service the link came from
        let reply = handler.reply_for("https://open.spotify.com/track/abc").await;
        assert!(!reply.contains("Also on"), "{reply}");

        let reply = handler.reply_for("https://example.com/song").await;
        assert_eq!(reply, markdown::ERROR_MESSAGE);
    }
}

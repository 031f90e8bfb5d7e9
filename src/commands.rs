use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::{async_trait, prelude::Context};
use serenity_command::{add_runner, BotCommand, CommandBuilder, CommandResponse, CommandStore};
use serenity_command_derive::Command;

use crate::Handler;

pub const WELCOME_MESSAGE: &str = "Hello! Send me a music track link from Spotify, Yandex Music, \
or MTS Music, and I'll reply with the track's title, artists and link, plus links to the track \
on other services when I can find it there.";

#[derive(Command)]
#[cmd(name = "start", desc = "How to use the bot")]
pub struct Start {}

#[async_trait]
impl BotCommand for Start {
    type Data = Handler;

    async fn run(
        self,
        _handler: &Handler,
        _ctx: &Context,
        _interaction: &ApplicationCommandInteraction,
    ) -> anyhow::Result<CommandResponse> {
        Ok(CommandResponse::Private(WELCOME_MESSAGE.to_string()))
    }
}

#[derive(Command)]
#[cmd(name = "parse", desc = "Show title and artists for a music link")]
pub struct Parse {
    #[cmd(desc = "Spotify, Yandex Music or MTS Music link")]
    link: String,
}

#[async_trait]
impl BotCommand for Parse {
    type Data = Handler;

    async fn run(
        self,
        handler: &Handler,
        ctx: &Context,
        interaction: &ApplicationCommandInteraction,
    ) -> anyhow::Result<CommandResponse> {
        // Rendering can take longer than the interaction deadline
        interaction
            .create_interaction_response(&ctx.http, |resp| {
                resp.kind(InteractionResponseType::DeferredChannelMessageWithSource)
            })
            .await?;
        let reply = handler.reply_for(&self.link).await;
        interaction
            .edit_original_interaction_response(&ctx.http, |msg| msg.content(reply))
            .await?;
        Ok(CommandResponse::None)
    }
}

pub fn register_commands(commands: &mut CommandStore<Handler>) {
    add_runner(commands, Start::runner());
    add_runner(commands, Parse::runner());
}

#[cfg(test)]
mod tests {
    use serenity::model::application::interaction::application_command::CommandData;

    use super::*;

    fn command_data(json: serde_json::Value) -> CommandData {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn parse_requires_a_link() {
        let data = command_data(serde_json::json!({
            "id": "1",
            "name": "parse",
            "type": 1,
        }));
        let err = Parse::try_from(&data).err().expect("missing link accepted");
        assert!(err.to_string().contains("Missing value for option link"), "{err}");
    }

    #[test]
    fn start_takes_no_options() {
        let data = command_data(serde_json::json!({
            "id": "2",
            "name": "start",
            "type": 1,
        }));
        assert!(Start::try_from(&data).is_ok());
    }
}

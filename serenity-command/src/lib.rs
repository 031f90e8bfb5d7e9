use std::collections::HashMap;

use serenity::async_trait;
use serenity::builder::{CreateApplicationCommand, CreateApplicationCommandOption};
use serenity::model::application::interaction::application_command::{
    ApplicationCommandInteraction, CommandData,
};
use serenity::model::prelude::interaction::MessageFlags;
use serenity::model::permissions::Permissions;
use serenity::prelude::Context;

#[derive(Debug)]
pub enum CommandResponse {
    None,
    Public(String),
    Private(String),
}

impl CommandResponse {
    pub fn to_contents_and_flags(self) -> Option<(String, MessageFlags)> {
        Some(match self {
            CommandResponse::None => return None,
            CommandResponse::Public(s) => (s, MessageFlags::empty()),
            CommandResponse::Private(s) => (s, MessageFlags::EPHEMERAL),
        })
    }
}

/// A slash command, built from the interaction's options and run against
/// the bot's shared data.
#[async_trait]
pub trait BotCommand {
    type Data: Send + Sync;

    const PERMISSIONS: Permissions = Permissions::empty();

    async fn run(
        self,
        data: &Self::Data,
        ctx: &Context,
        interaction: &ApplicationCommandInteraction,
    ) -> anyhow::Result<CommandResponse>;

    fn setup_options(_opt_name: &'static str, _opt: &mut CreateApplicationCommandOption) {}
}

/// Implemented by `#[derive(Command)]`.
pub trait CommandBuilder<'a>:
    BotCommand + TryFrom<&'a CommandData, Error = anyhow::Error> + 'static
{
    fn create_extras<E: Fn(&'static str, &mut CreateApplicationCommandOption)>(
        builder: &mut CreateApplicationCommand,
        extras: E,
    ) -> &mut CreateApplicationCommand;
    fn create(builder: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand;
    const NAME: &'static str;
    fn runner() -> Box<dyn CommandRunner<Self::Data> + Send + Sync>;
}

#[async_trait]
pub trait CommandRunner<T> {
    async fn run(
        &self,
        data: &T,
        ctx: &Context,
        interaction: &ApplicationCommandInteraction,
    ) -> anyhow::Result<CommandResponse>;
    fn name(&self) -> &'static str;
    fn register<'a>(
        &self,
        builder: &'a mut CreateApplicationCommand,
    ) -> &'a mut CreateApplicationCommand;
}

pub type CommandStore<T> = HashMap<&'static str, Box<dyn CommandRunner<T> + Send + Sync>>;

pub fn add_runner<T>(store: &mut CommandStore<T>, runner: Box<dyn CommandRunner<T> + Send + Sync>) {
    store.insert(runner.name(), runner);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_response_has_no_contents() {
        assert!(CommandResponse::None.to_contents_and_flags().is_none());
    }

    #[test]
    fn private_response_is_ephemeral() {
        let (contents, flags) = CommandResponse::Private("hi".to_string())
            .to_contents_and_flags()
            .unwrap();
        assert_eq!(contents, "hi");
        assert_eq!(flags, MessageFlags::EPHEMERAL);

        let (_, flags) = CommandResponse::Public("hi".to_string())
            .to_contents_and_flags()
            .unwrap();
        assert!(flags.is_empty());
    }
}

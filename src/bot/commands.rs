use std::fmt;

use tracing::debug;

use crate::{
    audio::{backend::VoiceBackend, session::VoiceSession},
    error::BotError,
    sources::TrackFetcher,
    ui::replies,
};

/// Built-in text commands. Each variant is one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Ping,
    Hello,
    Join,
    Play,
    Pause,
    Resume,
    Stop,
    Leave,
    Volume,
}

impl Command {
    /// Dispatch order used when the configuration does not list commands.
    pub const ALL: [Command; 9] = [
        Command::Ping,
        Command::Hello,
        Command::Join,
        Command::Play,
        Command::Pause,
        Command::Resume,
        Command::Stop,
        Command::Leave,
        Command::Volume,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Hello => "hello",
            Self::Join => "join",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Leave => "leave",
            Self::Volume => "volume",
        }
    }

    /// Commands that drive the voice player and are restricted to the music channel.
    pub fn is_player_command(self) -> bool {
        !matches!(self, Self::Ping | Self::Hello)
    }

    /// Runs the command against the guild's session and returns the reply text.
    pub async fn execute(
        self,
        args: &str,
        session: &mut VoiceSession,
        env: &CommandEnv<'_>,
    ) -> Result<String, BotError> {
        match self {
            Self::Ping => Ok(replies::pong()),
            Self::Hello => Ok(replies::hello()),
            Self::Join => {
                let name = args.trim();
                if name.is_empty() {
                    return Err(BotError::MissingArgument("join <voice_channel>"));
                }
                if !env.allowed_voice_channels.is_empty()
                    && !env.allowed_voice_channels.iter().any(|allowed| allowed == name)
                {
                    return Err(BotError::VoiceChannelNotAllowed(name.to_string()));
                }

                let outcome = session.join(env.backend, name).await?;
                Ok(replies::joined(&outcome))
            }
            Self::Play => {
                let url = args.trim();
                if url.is_empty() {
                    return Err(BotError::MissingArgument("play <link>"));
                }

                let track = session.play(env.backend, env.fetcher, url).await?;
                Ok(replies::now_playing(&track, session.volume_percent()))
            }
            Self::Pause => {
                session.pause().await?;
                Ok(replies::paused(env.prefix))
            }
            Self::Resume => {
                session.resume().await?;
                Ok(replies::resumed())
            }
            Self::Stop | Self::Leave => {
                session.stop(env.backend).await?;
                Ok(replies::disconnected())
            }
            Self::Volume => {
                let raw = args.trim();
                let percent: i64 = raw
                    .parse()
                    .map_err(|_| BotError::VolumeUnparseable(raw.to_string()))?;

                let applied = session.set_volume(percent).await?;
                Ok(replies::volume_changed(applied))
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collaborators a command needs besides the session itself.
pub struct CommandEnv<'a> {
    pub prefix: &'a str,
    pub allowed_voice_channels: &'a [String],
    pub backend: &'a dyn VoiceBackend,
    pub fetcher: &'a dyn TrackFetcher,
}

/// A message matched against one recognized command name.
#[derive(Debug, PartialEq, Eq)]
pub struct Invocation<'a> {
    pub name: &'a str,
    /// `None` when the name is configured but has no handler.
    pub command: Option<Command>,
    pub args: &'a str,
}

/// Maps the leading token of a message to a recognized command.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    prefix: String,
    names: Vec<String>,
}

impl Dispatcher {
    pub fn new(prefix: impl Into<String>, configured: &[String]) -> Self {
        let names = if configured.is_empty() {
            Command::ALL.iter().map(|c| c.name().to_string()).collect()
        } else {
            configured.to_vec()
        };

        Self {
            prefix: prefix.into(),
            names,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Configured names that no handler implements.
    pub fn unknown_names(&self) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .map(String::as_str)
            .filter(|name| Command::from_name(name).is_none())
    }

    /// Matches the first whitespace-delimited token against `prefix + name`.
    ///
    /// Names are scanned in configured order and the first match wins. The
    /// argument is everything after the token and one separating character.
    pub fn dispatch<'a>(&'a self, content: &'a str) -> Option<Invocation<'a>> {
        let token = content.split(char::is_whitespace).next()?;
        let name = token.strip_prefix(self.prefix.as_str())?;

        let name = self.names.iter().find(|candidate| candidate.as_str() == name)?;

        let mut rest = content[token.len()..].chars();
        rest.next();
        let args = rest.as_str();

        debug!(command = %name, args, "matched command");

        Some(Invocation {
            name,
            command: Command::from_name(name),
            args,
        })
    }
}

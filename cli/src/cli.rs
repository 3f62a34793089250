use clap::{Parser, Subcommand};
use goose_desktop_client::DesktopConfig;
use std::path::PathBuf;

use crate::{commands, error::CliError};

#[derive(Debug, Parser)]
#[command(name = "goose-desktop")]
#[command(about = "Talk to a running goosed: chat, deep links and sessions")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Send one message and stream the reply
    Chat {
        /// Message text
        prompt: String,

        /// Continue an existing goosed session
        #[arg(short, long)]
        session: Option<String>,

        /// Approve tool confirmation prompts instead of denying them
        #[arg(long)]
        approve_tools: bool,
    },

    /// Install an extension or open a shared session or recipe link
    Deeplink {
        /// goose:// URL
        url: String,
    },

    /// Session operations
    Session {
        #[command(subcommand)]
        action: SessionCommands,
    },

    /// Installed extensions
    Extension {
        #[command(subcommand)]
        action: ExtensionCommands,
    },

    /// Check that goosed is up
    Status,

    /// Desktop settings (provider, model, theme, env.<VAR>)
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum SessionCommands {
    /// List sessions known to goosed
    List,

    /// Write a session to a portable JSON file
    Export {
        /// Session id
        id: String,

        /// Output file (defaults to <id>.goose-session.json)
        file: Option<PathBuf>,
    },

    /// Read and validate an exported session file
    Import {
        file: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum ExtensionCommands {
    /// List installed extensions
    List,

    /// Load an installed extension into goosed
    Enable {
        key: String,
    },

    /// Unload an extension from goosed but keep it installed
    Disable {
        key: String,
    },

    /// Unload and forget an extension
    Remove {
        key: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommands {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: String,
    },
    Remove {
        key: String,
    },
}

impl Cli {
    pub async fn run(&self) -> Result<(), CliError> {
        let Some(command) = &self.command else {
            println!("goose-desktop - headless goose desktop client");
            println!("Run 'goose-desktop --help' for usage information.");
            return Ok(());
        };

        let config = self.load_config()?;
        match command {
            Commands::Chat {
                prompt,
                session,
                approve_tools,
            } => commands::run_chat(&config, prompt, session.as_deref(), *approve_tools).await,
            Commands::Deeplink { url } => commands::open_deep_link(&config, url).await,
            Commands::Session { action } => commands::handle_session_command(&config, action).await,
            Commands::Extension { action } => {
                commands::handle_extension_command(&config, action).await
            }
            Commands::Status => commands::check_status(&config).await,
            Commands::Settings { action } => commands::handle_settings_command(&config, action),
        }
    }

    fn load_config(&self) -> Result<DesktopConfig, CliError> {
        let config = match &self.config {
            Some(path) => DesktopConfig::load_from(path)?,
            None => DesktopConfig::load()?,
        };
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_session_export() {
        let cli = Cli::parse_from(["goose-desktop", "session", "export", "s1", "out.json"]);
        match cli.command {
            Some(Commands::Session {
                action: SessionCommands::Export { id, file },
            }) => {
                assert_eq!(id, "s1");
                assert_eq!(file, Some(PathBuf::from("out.json")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_chat_flags() {
        let cli = Cli::parse_from([
            "goose-desktop",
            "--verbose",
            "chat",
            "hello",
            "--session",
            "abc",
            "--approve-tools",
        ]);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Some(Commands::Chat { ref prompt, ref session, approve_tools: true })
                if prompt == "hello" && session.as_deref() == Some("abc")
        ));
    }

    #[test]
    fn test_parse_extension_disable() {
        let cli = Cli::parse_from(["goose-desktop", "extension", "disable", "fetch"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Extension { action: ExtensionCommands::Disable { ref key } }) if key == "fetch"
        ));
    }
}

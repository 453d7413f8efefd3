use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use slackline_core::SlacklineConfig;

mod commands;
mod markdown;
mod permalink;
mod ui;

#[derive(Parser)]
#[command(name = "slackline")]
#[command(about = "Read Slack conversations as Markdown and talk to Slack from the terminal.")]
#[command(
    long_about = "Read Slack conversations as Markdown and talk to Slack from the terminal.\n\n\
                  The session is recovered from the Slack desktop app, or from $SLACK_AUTH.\n\
                  If no command is given, `read` is assumed."
)]
#[command(version)]
struct Cli {
    /// Show debug logs on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a conversation as Markdown, starting at a message permalink
    Read {
        /// Permalink of the first message, e.g. https://acme.slack.com/archives/C0123/p1700000000000100
        #[arg(value_name = "PERMALINK")]
        link: String,

        /// Channel messages to fetch after the first one (whole threads are always fetched)
        #[arg(long, short)]
        limit: Option<usize>,

        /// Wrap the output in an HTML <details> block
        #[arg(long, short)]
        details: bool,
    },

    /// Send a message to a channel
    Send {
        /// Message text
        #[arg(long, short)]
        message: String,

        /// Channel name (defaults to `channel` in the config file)
        #[arg(long, short)]
        channel: Option<String>,

        /// Slack team (defaults to `team` in the config file)
        #[arg(long, short)]
        team: Option<String>,

        /// Wait for a reply from this bot: a user ID, bot name or username
        #[arg(long, short)]
        bot: Option<String>,

        /// Wait for a reply from the `bot` in the config file
        #[arg(long, short)]
        wait: bool,
    },

    /// Call any Web API method and print the raw response
    Api {
        /// Optional HTTP verb followed by the API method, e.g. `post chat.postMessage`
        #[arg(value_name = "ARGS", num_args = 1..=2, required = true)]
        args: Vec<String>,

        /// Query parameter as key=value (repeatable)
        #[arg(long = "field", short = 'F', value_name = "KEY=VALUE")]
        fields: Vec<String>,

        /// JSON request body (implies POST when no verb is given)
        #[arg(long)]
        body: Option<String>,

        /// Slack team (defaults to `team` in the config file)
        #[arg(long, short)]
        team: Option<String>,
    },

    /// Print the session token and cookies as shell exports (treat as secret)
    Auth {
        /// Slack team (defaults to `team` in the config file)
        #[arg(long, short)]
        team: Option<String>,
    },
}

/// Insert `read` when the first positional argument is not a subcommand,
/// so `slackline <permalink>` works.
fn with_default_command(mut args: Vec<String>) -> Vec<String> {
    let command = Cli::command();
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let Some(first) = first_positional else {
        return args;
    };
    let known = first == "help"
        || command
            .get_subcommands()
            .any(|sub| sub.get_name() == first || sub.get_all_aliases().any(|a| a == first));
    if !known {
        args.insert(1, "read".to_string());
    }
    args
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_from(with_default_command(std::env::args().collect()));

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    if let Err(err) = run(cli.command).await {
        ui::error(&format!("{:#}", err));
        if commands::needs_desktop_login(&err) {
            ui::info("Are you logged in to the Slack desktop app?");
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands) -> Result<()> {
    let config = SlacklineConfig::load_default()?;

    match command {
        Commands::Read {
            link,
            limit,
            details,
        } => commands::read::run(&link, limit.unwrap_or(config.limit), details).await,
        Commands::Send {
            message,
            channel,
            team,
            bot,
            wait,
        } => {
            let team = commands::require(team, config.team.as_ref(), "team")?;
            let channel = commands::require(channel, config.channel.as_ref(), "channel")?;
            let bot = match (bot, wait) {
                (Some(bot), _) => Some(bot),
                (None, true) => Some(commands::require(None, config.bot.as_ref(), "bot")?),
                (None, false) => None,
            };
            commands::send::run(&team, &channel, &message, bot.as_deref()).await
        }
        Commands::Api {
            args,
            fields,
            body,
            team,
        } => {
            let team = commands::require(team, config.team.as_ref(), "team")?;
            commands::api::run(&team, &args, &fields, body.as_deref()).await
        }
        Commands::Auth { team } => {
            let team = commands::require(team, config.team.as_ref(), "team")?;
            commands::auth::run(&team).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_permalink_defaults_to_read() {
        let link = "https://acme.slack.com/archives/C1/p1700000000000100";
        assert_eq!(
            with_default_command(args(&["slackline", link])),
            args(&["slackline", "read", link])
        );
        assert_eq!(
            with_default_command(args(&["slackline", "-d", link])),
            args(&["slackline", "read", "-d", link])
        );
    }

    #[test]
    fn test_known_commands_untouched() {
        for input in [
            args(&["slackline", "send", "-m", "hi"]),
            args(&["slackline", "auth"]),
            args(&["slackline", "--help"]),
            args(&["slackline", "help", "read"]),
        ] {
            assert_eq!(with_default_command(input.clone()), input);
        }
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::parse_from(args(&[
            "slackline", "-v", "send", "-m", "hello", "-c", "ops", "-t", "acme", "-b", "U0BOT",
        ]));
        assert!(cli.verbose);
        match cli.command {
            Commands::Send {
                message,
                channel,
                team,
                bot,
                wait,
            } => {
                assert_eq!(message, "hello");
                assert_eq!(channel.as_deref(), Some("ops"));
                assert_eq!(team.as_deref(), Some("acme"));
                assert_eq!(bot.as_deref(), Some("U0BOT"));
                assert!(!wait);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_parse_api_fields() {
        let cli = Cli::parse_from(args(&[
            "slackline", "api", "get", "conversations.list", "-F", "types=im", "-F", "limit=5",
        ]));
        match cli.command {
            Commands::Api { args, fields, body, .. } => {
                assert_eq!(args, vec!["get", "conversations.list"]);
                assert_eq!(fields, vec!["types=im", "limit=5"]);
                assert!(body.is_none());
            }
            _ => panic!("expected api"),
        }
    }
}

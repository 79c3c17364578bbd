use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use session_api::SessionController;
use shared::domain::{ChannelId, GuildId, Member, NewSession, SessionId, SessionKind, UserId};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/bot.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateSession {
        session_id: i64,
        #[arg(long, default_value_t = 0)]
        guild_id: i64,
        #[arg(long, default_value = "")]
        guild_name: String,
        #[arg(long, default_value_t = 0)]
        channel_id: i64,
        #[arg(long, default_value = "")]
        channel_name: String,
        #[arg(long, default_value_t = 0)]
        author_id: i64,
        #[arg(long, default_value = "")]
        author_name: String,
        #[arg(long, default_value = "qk")]
        kind: String,
    },
    Join {
        session_id: i64,
        user_id: i64,
        name: String,
        #[arg(long)]
        mention: Option<String>,
    },
    Leave {
        session_id: i64,
        user_id: i64,
    },
    Break {
        session_id: i64,
        size: u8,
    },
    View {
        session_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    let sessions = SessionController::new(Arc::new(storage));

    let output = match cli.command {
        Command::CreateSession {
            session_id,
            guild_id,
            guild_name,
            channel_id,
            channel_name,
            author_id,
            author_name,
            kind,
        } => {
            let kind = SessionKind::parse(&kind)
                .ok_or_else(|| anyhow::anyhow!("unknown session kind '{kind}' (qk or bosyu)"))?;
            let session = sessions
                .create_session(NewSession {
                    session_id: SessionId(session_id),
                    guild_id: GuildId(guild_id),
                    guild_name,
                    channel_id: ChannelId(channel_id),
                    channel_name,
                    author_id: UserId(author_id),
                    author_display_name: author_name.clone(),
                    author_name,
                    kind,
                })
                .await?;
            serde_json::to_string_pretty(&session)?
        }
        Command::Join {
            session_id,
            user_id,
            name,
            mention,
        } => {
            let mut member = Member::new(UserId(user_id), name);
            if let Some(mention) = mention {
                member.mention = mention;
            }
            let view = sessions.join(SessionId(session_id), &member).await?;
            serde_json::to_string_pretty(&view)?
        }
        Command::Leave {
            session_id,
            user_id,
        } => {
            let view = sessions
                .leave(SessionId(session_id), UserId(user_id))
                .await?;
            serde_json::to_string_pretty(&view)?
        }
        Command::Break { session_id, size } => {
            let view = sessions.request_break(SessionId(session_id), size).await?;
            serde_json::to_string_pretty(&view)?
        }
        Command::View { session_id } => {
            let view = sessions.current_view(SessionId(session_id)).await?;
            serde_json::to_string_pretty(&view)?
        }
    };

    println!("{output}");
    Ok(())
}

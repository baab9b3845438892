use clap::{Parser, Subcommand};
use isles::engine::{
    CommandError, Context, HttpRemote, IslandBoard, Outcome, Presenter, SettingsScreen,
    SqliteSnapshotStore,
};
use isles::protocol::{Session, User};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod terminal;

use terminal::TerminalPresenter;

/// Manage Isles games and the islands of the loaded game.
#[derive(Debug, Parser)]
#[command(name = "isles", version)]
struct Cli {
    /// Base URL of the record server.
    #[arg(long, env = "ISLES_REMOTE", default_value = "http://127.0.0.1:39333")]
    remote: String,

    /// Local snapshot database; defaults to ~/.isles/snapshot.db.
    #[arg(long, env = "ISLES_SNAPSHOT_DB")]
    snapshot_db: Option<PathBuf>,

    /// Display name of the signed-in user.
    #[arg(long, env = "ISLES_USER")]
    username: Option<String>,

    /// Session token; without one the session is anonymous.
    #[arg(long, env = "ISLES_SESSION_TOKEN")]
    session_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the session and the games of the signed-in user.
    Games,
    #[command(subcommand)]
    Game(GameCommand),
    /// Show the islands of the loaded game.
    Islands,
    #[command(subcommand)]
    Island(IslandCommand),
}

#[derive(Debug, Subcommand)]
enum GameCommand {
    /// Create a game. Needs a session token: anonymous sessions list no
    /// games, so the game could never be loaded afterwards.
    Create { name: String },
    /// Delete the game at a 1-based position in the list.
    Delete { position: usize },
    /// Make the game at a 1-based position the active game.
    Load { position: usize },
}

#[derive(Debug, Subcommand)]
enum IslandCommand {
    Create { name: String },
    Delete { id: String },
    Rename { id: String },
    /// Move an island to a 1-based position; prompts when omitted.
    Move {
        id: String,
        #[arg(allow_negative_numbers = true)]
        position: Option<i64>,
    },
    Up { id: String },
    Down { id: String },
}

type Ctx = Context<SqliteSnapshotStore, HttpRemote, TerminalPresenter>;

fn session(username: Option<String>, token: Option<String>) -> Session {
    match token {
        Some(session_token) => Session::signed_in(User {
            username: username.unwrap_or_else(|| "player".to_string()),
            session_token,
        }),
        None => Session::anonymous(),
    }
}

const SIGN_IN_TO_CREATE: &str =
    "Games belong to a session; pass --session-token (or ISLES_SESSION_TOKEN) to create one.";

/// 1-based list position to index; 0 maps past the end so lookups miss.
fn index_of(position: usize) -> usize {
    position.checked_sub(1).unwrap_or(usize::MAX)
}

async fn run_game(ctx: &mut Ctx, command: Option<GameCommand>) -> Result<Outcome, CommandError> {
    if matches!(command, Some(GameCommand::Create { .. })) && ctx.session.user.is_none() {
        ctx.presenter.alert(SIGN_IN_TO_CREATE);
        return Err(CommandError::validation(SIGN_IN_TO_CREATE));
    }
    let mut screen = SettingsScreen::open(ctx).await?;
    match command {
        None => Ok(Outcome::Applied),
        Some(GameCommand::Create { name }) => screen.create_game(&name).await,
        Some(GameCommand::Delete { position }) => screen.delete_game(index_of(position)).await,
        Some(GameCommand::Load { position }) => screen.load_game(index_of(position)),
    }
}

async fn run_island(
    ctx: &mut Ctx,
    command: Option<IslandCommand>,
) -> Result<Outcome, CommandError> {
    let Some(mut board) = IslandBoard::open(ctx).await? else {
        return Err(CommandError::validation("no loaded game"));
    };
    match command {
        None => Ok(Outcome::Applied),
        Some(IslandCommand::Create { name }) => board.create_island(&name).await,
        Some(IslandCommand::Delete { id }) => board.delete_island(&id).await,
        Some(IslandCommand::Rename { id }) => board.rename_island(&id).await,
        Some(IslandCommand::Move { id, position }) => board.reorder_island(&id, position).await,
        Some(IslandCommand::Up { id }) => board.move_up(&id).await,
        Some(IslandCommand::Down { id }) => board.move_down(&id).await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let snapshot_db = cli.snapshot_db.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".isles")
            .join("snapshot.db")
    });
    let session = session(cli.username, cli.session_token);
    let remote =
        HttpRemote::new(cli.remote).with_session_token(session.token().map(str::to_string));
    let mut ctx = Context::new(
        SqliteSnapshotStore::new(snapshot_db),
        remote,
        TerminalPresenter::new(),
        session,
    );

    let result = match cli.command {
        Command::Games => run_game(&mut ctx, None).await,
        Command::Game(command) => run_game(&mut ctx, Some(command)).await,
        Command::Islands => run_island(&mut ctx, None).await,
        Command::Island(command) => run_island(&mut ctx, Some(command)).await,
    };
    ctx.presenter.flush();

    match result {
        Ok(Outcome::Applied) => Ok(ExitCode::SUCCESS),
        Ok(Outcome::Cancelled) => Ok(ExitCode::from(2)),
        // Already alerted.
        Err(err) if err.is_validation() => Ok(ExitCode::FAILURE),
        Err(CommandError::Remote(_)) => Ok(ExitCode::FAILURE),
        Err(err) => Err(err.into()),
    }
}

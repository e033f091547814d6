use clap::{Parser, ValueEnum};
use client::gui::LocalGui;
use client::hud::HudState;
use client::{Client, ClientConfig};
use log::info;
use server::{Server, ServerConfig};
use shared::{GuiObserver, World};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Role {
    /// Play alone, no network
    Single,
    /// Host a world for clients to join
    Server,
    /// Join a hosted world
    Client,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_enum, default_value = "single")]
    role: Role,

    /// Address to bind (server) or connect to (client)
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Display name used when joining
    #[arg(short, long, default_value = "Player")]
    name: String,

    #[arg(long, default_value_t = shared::world::DEFAULT_MAX_ENTITIES)]
    max_entities: usize,

    /// Reduce effect history for slower machines
    #[arg(long)]
    low_graphics: bool,

    /// Delete the saved world before starting
    #[arg(long)]
    clean_save: bool,

    /// Start from the fixed test layout instead of a random world
    #[arg(long)]
    test_map: bool,

    /// Simulation steps per second
    #[arg(short, long, default_value = "20")]
    tick_rate: u32,

    /// Save file location
    #[arg(long, default_value = "saves/world")]
    save_path: PathBuf,
}

impl Args {
    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    fn server_config(&self) -> ServerConfig {
        let save_dir = self
            .save_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let save_location = self
            .save_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| ServerConfig::default().save_location);

        ServerConfig {
            bind_addr: self.address(),
            tick_duration: self.tick_duration(),
            max_entities: self.max_entities,
            save_dir,
            save_location,
            clean_save: self.clean_save,
            test_map: self.test_map,
            ..ServerConfig::default()
        }
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_addr: self.address(),
            name: self.name.clone(),
            tick_duration: self.tick_duration(),
            max_entities: self.max_entities,
            low_graphics: self.low_graphics,
            ..ClientConfig::default()
        }
    }
}

/// Forwards lines typed on stdin until it closes.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn run_server(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::new(args.server_config()).await?;
    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.shutdown();
        }
    });
    server.run().await?;
    Ok(())
}

async fn run_client(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = Client::connect(args.client_config()).await?;
    info!("Type to chat, /msg <name> <text> to whisper, /save to save, /quit to leave");
    client.run(spawn_stdin_reader()).await
}

async fn run_single(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut world = World::new(args.max_entities);
    if args.test_map {
        server::game::seed_test_map(&mut world)?;
    } else {
        server::game::seed_random(&mut world, None)?;
    }
    let mut gui = LocalGui::new(world, HudState::new(args.low_graphics));
    gui.start_game(&args.name);

    let mut input = spawn_stdin_reader();
    let mut tick_interval = interval(args.tick_duration());
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = Instant::now();

    info!("Type to chat, /win to end the game, /quit to leave");
    loop {
        tokio::select! {
            line = input.recv() => {
                match line.as_deref().map(str::trim) {
                    None | Some("/quit") => break,
                    Some("/win") => gui.declare_won(),
                    Some(text) => gui.send_chat(text),
                }
                if let Some(line) = gui.hud().last_chat() {
                    info!("<{}> {}", line.sender, line.text);
                }
                if let Some(winner) = &gui.hud().game_over {
                    info!("{} won the game", winner);
                    break;
                }
            },

            _ = tick_interval.tick() => {
                let now = Instant::now();
                gui.tick(now.duration_since(last_tick).as_secs_f32());
                last_tick = now;
            },
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    info!("Starting in {:?} mode", args.role);

    match args.role {
        Role::Single => run_single(&args).await,
        Role::Server => run_server(&args).await,
        Role::Client => run_client(&args).await,
    }
}

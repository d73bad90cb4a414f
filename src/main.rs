mod app;
mod ui;

use std::fs::{self, OpenOptions};
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use directories::ProjectDirs;
use hashtycoon::constants::{HEARTBEAT_MS, SAVE_KEY};
use hashtycoon::data::ReferenceData;
use hashtycoon::save::{FileStore, KeyValueStore};
use hashtycoon::session::Session;
use rand::SeedableRng;
use rand::rngs::StdRng;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::ui::draw;

#[derive(Parser, Debug)]
#[command(name = "hashtycoon", about = "Bitcoin mining tycoon replaying history from the genesis block")]
struct Cli {
    /// Directory holding the historical JSON feeds
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Where the save file lives (defaults to the platform config directory)
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Seed for the price noise, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Log file (defaults to tycoon.log in the save directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Discard any existing save and start from the genesis block
    #[arg(long)]
    fresh: bool,
}

enum Event<I> {
    Input(I),
    Tick,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let save_dir = match cli.save_dir.clone() {
        Some(dir) => dir,
        None => ProjectDirs::from("", "", "hashtycoon")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .context("could not determine a save directory")?,
    };
    fs::create_dir_all(&save_dir)
        .with_context(|| format!("creating {}", save_dir.display()))?;
    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(|| save_dir.join("tycoon.log"));
    init_logging(&log_path)?;

    let data = ReferenceData::load(&cli.data_dir)
        .with_context(|| format!("loading reference data from {}", cli.data_dir.display()))?;
    let mut store = FileStore::new(&save_dir)?;
    if cli.fresh {
        store.remove(SAVE_KEY)?;
        info!("existing save discarded");
    }
    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let session = Session::restore(Arc::new(data), Box::new(store), rng)?;

    let mut app = App::new(session);
    let mut terminal = setup_terminal()?;
    let res = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    info!("exiting");
    res
}

fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let tick_rate = Duration::from_millis(HEARTBEAT_MS);

    let input_tx = tx.clone();
    thread::spawn(move || {
        loop {
            if !event::poll(Duration::from_millis(250)).unwrap_or(false) {
                continue;
            }
            match event::read() {
                Ok(CEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    if input_tx.send(Event::Input(key)).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => {}
            }
        }
    });

    thread::spawn(move || {
        loop {
            if tx.send(Event::Tick).is_err() {
                break;
            }
            thread::sleep(tick_rate);
        }
    });

    loop {
        terminal.draw(|f| draw(f, app))?;

        match rx.recv()? {
            Event::Input(key) => {
                app.on_key(key);
            }
            Event::Tick => {
                app.on_tick(tick_rate);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

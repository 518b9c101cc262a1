mod config;
mod events;
mod link;
mod sandbox;
mod tui;

use std::io;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use config::SandboxConfig;
use sandbox::Sandbox;
use tui::TuiState;

#[derive(Parser)]
#[command(name = "sidearm-server")]
#[command(about = "Authority and observer duel over a simulated link")]
struct Args {
    #[arg(short, long, default_value_t = 60)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 30.0, help = "Simulated seconds to run when headless")]
    duration: f32,

    #[arg(long)]
    headless: bool,

    #[arg(long, default_value_t = 50, help = "One-way link latency in ms")]
    latency_ms: u32,

    #[arg(long, default_value_t = 0, help = "Jitter in ms")]
    jitter_ms: u32,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    #[arg(short, long, default_value_t = 2)]
    bots: usize,

    #[arg(long, help = "Disable health regeneration")]
    no_regen: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = SandboxConfig {
        tick_rate: args.tick_rate,
        latency_ms: args.latency_ms,
        jitter_ms: args.jitter_ms,
        bots: args.bots,
        seed: args.seed,
        health_regen: !args.no_regen,
        ..Default::default()
    };

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        let mut sandbox = Sandbox::new(config)?;
        log::info!(
            "sandbox started: {} bots, {}ms latency, seed {}",
            args.bots,
            args.latency_ms,
            args.seed
        );
        sandbox.run_headless(args.duration)?;
        log::info!("sandbox shutting down");
    } else {
        let mut sandbox = Sandbox::new(config)?;
        run_with_tui(&mut sandbox)?;
    }

    Ok(())
}

fn run_with_tui(sandbox: &mut Sandbox) -> Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let running = sandbox.running();
    let mut tui_state = TuiState::new();
    tui_state.log_info("Duel started");

    let result = (|| -> Result<()> {
        while running.load(Ordering::SeqCst) {
            sandbox.tick_once()?;

            for event in sandbox.drain_events() {
                if event.is_warning() {
                    tui_state.log_warn(event.describe());
                } else {
                    tui_state.log_info(event.describe());
                }
            }

            if event::poll(Duration::from_millis(1))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => {
                                running.store(false, Ordering::SeqCst);
                            }
                            KeyCode::Char('p') => sandbox.toggle_pause(),
                            KeyCode::Char('r') => match sandbox.reset() {
                                Ok(()) => tui_state.log_info("Duel reset"),
                                Err(err) => tui_state.log_error(format!("reset failed: {}", err)),
                            },
                            _ => {}
                        }
                    }
                }
            }

            let stats = sandbox.stats();
            terminal.draw(|frame| {
                tui::render(frame, &tui_state, &stats);
            })?;
        }
        Ok(())
    })();

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    result
}

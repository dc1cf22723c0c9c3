use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, ExecutableCommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use menu_roulette::app::AppState;
use menu_roulette::cli::Cli;
use menu_roulette::config::{AppPaths, ConfigFile};
use menu_roulette::fetch::FetchJob;
use menu_roulette::logging;
use menu_roulette::resolver::{CandidateList, ResolvePlan};
use menu_roulette::source::FetchError;
use menu_roulette::ui;

/// Short enough that the 100 ms focal refresh stays smooth.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.validate()?;

    let paths = AppPaths::new(cli.config.as_deref())?;
    let _log_guard = logging::init(&paths.config_dir, paths.log_file_name)?;
    tracing::info!(
        config = %paths.config_file.display(),
        log = %paths.log_file().display(),
        "starting"
    );

    let config = ConfigFile::load(&paths.config_file)?;
    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    if cli.list_candidates {
        let mut config = config;
        cli.apply(&mut config);
        return list_candidates(&config);
    }

    let mut app = AppState::new(config, Some(paths.config_file.clone()), cli, rng);
    let result = run_app(&mut app);
    if let Err(err) = &result {
        tracing::error!(error = %format!("{err:#}"), "exiting with an error");
    }
    result
}

/// Resolve once, blocking on any fetch, and print one name per line.
fn list_candidates(config: &ConfigFile) -> Result<()> {
    let resolver = config.resolver();
    let resolution = match resolver.plan() {
        ResolvePlan::Ready(resolution) => resolution,
        ResolvePlan::Fetch(request) => {
            let result = match config.record_source() {
                Some(source) => FetchJob::spawn(source, request, config.fetch_timeout()).wait(),
                None => Err(FetchError::Unavailable),
            };
            resolver.finish(result)
        }
    };
    let mut candidates = CandidateList::default();
    candidates.apply(resolution);

    let mut stdout = io::stdout().lock();
    for item in candidates.items() {
        writeln!(stdout, "{item}")?;
    }
    Ok(())
}

fn run_app(app: &mut AppState) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let result = event_loop(&mut terminal, app);

    restore_terminal(&mut terminal)?;
    result
}

fn event_loop<B>(terminal: &mut Terminal<B>, app: &mut AppState) -> Result<()>
where
    B: ratatui::backend::Backend + Write,
{
    let mut dirty = true;
    loop {
        if dirty {
            terminal.draw(|frame| ui::render(frame, app))?;
        }

        dirty = false;
        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key) => app.handle_key(key),
                Event::Mouse(mouse) => {
                    let size = terminal.size()?;
                    app.handle_mouse(mouse, size);
                }
                Event::Resize(_, _) => {}
                Event::FocusGained | Event::FocusLost | Event::Paste(_) => {}
            };
            dirty = true;
        }

        dirty |= app.tick(Instant::now());
        // Flashes fade over time, so keep drawing while any are on screen.
        dirty |= !app.selection().flashes().is_empty();

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn restore_terminal<B>(terminal: &mut Terminal<B>) -> Result<()>
where
    B: ratatui::backend::Backend + Write,
{
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

//! Application state and input handling for the picker screen.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use rand::rngs::StdRng;
use ratatui::prelude::Rect;

use crate::cli::Cli;
use crate::config::ConfigFile;
use crate::fetch::{FetchJob, FetchPoll};
use crate::resolver::{CandidateList, MenuResolver, ResolvePlan, Resolution};
use crate::selection::{Selection, SelectionState};
use crate::source::{FetchError, RecordSource};
use crate::ui::theme::Theme;
use crate::ui::{screen_layout, shortcut_line, ShortcutAction};

const SPINNER_FRAMES: &[char] = &['-', '\\', '|', '/'];

pub struct AppState {
    config: ConfigFile,
    config_path: Option<PathBuf>,
    overrides: Cli,
    resolver: MenuResolver,
    source: Option<Arc<dyn RecordSource>>,
    pending_fetch: Option<FetchJob>,
    candidates: CandidateList,
    menu_origin: &'static str,
    selection: Selection,
    rng: StdRng,
    theme: Theme,
    status_message: Option<String>,
    spinner_frame: usize,
    pub should_quit: bool,
}

impl AppState {
    /// Build the state and kick off the first resolution. `overrides` are
    /// re-applied whenever the configuration is reloaded from `config_path`.
    pub fn new(
        mut config: ConfigFile,
        config_path: Option<PathBuf>,
        overrides: Cli,
        rng: StdRng,
    ) -> Self {
        overrides.apply(&mut config);
        let mut app = AppState {
            resolver: config.resolver(),
            source: config.record_source(),
            theme: Theme::resolve(&config.theme),
            config,
            config_path,
            overrides,
            pending_fetch: None,
            candidates: CandidateList::default(),
            menu_origin: Resolution::Builtin.label(),
            selection: Selection::new(),
            rng,
            status_message: None,
            spinner_frame: 0,
            should_quit: false,
        };
        app.start_resolution();
        app
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn candidates(&self) -> &CandidateList {
        &self.candidates
    }

    pub fn is_loading(&self) -> bool {
        self.pending_fetch.is_some()
    }

    /// Title before the first pick, the focal item afterwards.
    pub fn headline(&self) -> &str {
        match (self.selection.state(), self.selection.focal()) {
            (SelectionState::Idle, _) | (_, None) => self.config.title(),
            (_, Some(focal)) => focal,
        }
    }

    pub fn status_text(&self) -> String {
        let mut text = if self.is_loading() {
            let frame = SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()];
            format!("{frame} Loading records...")
        } else {
            format!(
                "{} dishes from {}",
                self.candidates.len(),
                self.menu_origin
            )
        };
        text.push_str(&format!(" | Theme: {}", self.theme.name));
        if let Some(msg) = &self.status_message {
            text.push_str(" | ");
            text.push_str(msg);
        }
        text
    }

    /// Resolve the candidate list again. Any fetch still in flight is abandoned.
    pub fn start_resolution(&mut self) {
        if self.pending_fetch.take().is_some() {
            tracing::debug!("abandoning the previous record fetch");
        }
        match self.resolver.plan() {
            ResolvePlan::Ready(resolution) => self.apply_resolution(resolution),
            ResolvePlan::Fetch(request) => match &self.source {
                Some(source) => {
                    self.pending_fetch = Some(FetchJob::spawn(
                        Arc::clone(source),
                        request,
                        self.config.fetch_timeout(),
                    ));
                }
                None => {
                    let resolution = self.resolver.finish(Err(FetchError::Unavailable));
                    self.apply_resolution(resolution);
                }
            },
        }
    }

    fn apply_resolution(&mut self, resolution: Resolution) {
        let label = resolution.label();
        if self.candidates.apply(resolution) {
            self.menu_origin = label;
            tracing::info!(
                items = self.candidates.len(),
                origin = label,
                "menu updated"
            );
        }
    }

    /// Check on a pending fetch without blocking.
    pub fn poll_fetch(&mut self) -> bool {
        let Some(job) = self.pending_fetch.as_mut() else {
            return false;
        };
        match job.poll() {
            FetchPoll::Pending => false,
            FetchPoll::Done(result) => {
                self.pending_fetch = None;
                let resolution = self.resolver.finish(result);
                self.apply_resolution(resolution);
                true
            }
        }
    }

    /// Per-frame housekeeping. Returns whether a redraw is needed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = self.poll_fetch();
        if self.is_loading() {
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
            changed = true;
        }
        changed |= self
            .selection
            .tick(&self.candidates, &mut self.rng, now);
        changed
    }

    pub fn advance(&mut self, now: Instant) -> SelectionState {
        self.status_message = None;
        self.selection.advance(&self.candidates, &mut self.rng, now)
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        // Some terminals report releases and repeats too; one keystroke is one action.
        if key.kind != KeyEventKind::Press {
            return;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                self.advance(Instant::now());
            }
            KeyCode::Char('r') | KeyCode::Char('R') => self.reload(),
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            _ => {}
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, terminal_area: Rect) {
        if !matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left)) {
            return;
        }
        let layout = screen_layout(terminal_area);
        if contains(layout.button, mouse.column, mouse.row) {
            self.advance(Instant::now());
            return;
        }
        if contains(layout.shortcuts, mouse.column, mouse.row) {
            if let Some(action) = shortcut_line(self).action_at(mouse.column, layout.shortcuts) {
                self.execute_shortcut(action);
            }
        }
    }

    fn execute_shortcut(&mut self, action: ShortcutAction) {
        match action {
            ShortcutAction::Advance => {
                self.advance(Instant::now());
            }
            ShortcutAction::Reload => self.reload(),
            ShortcutAction::Quit => self.should_quit = true,
        }
    }

    fn reload(&mut self) {
        match self.reload_from_disk() {
            Ok(()) => self.status_message = Some("Configuration reloaded".into()),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "configuration reload failed");
                self.status_message = Some("Reload failed, see log".into());
            }
        }
    }

    /// Re-read the configuration file and resolve the menu again. On error the
    /// current configuration stays in effect.
    pub fn reload_from_disk(&mut self) -> Result<()> {
        if let Some(path) = &self.config_path {
            let mut config = ConfigFile::load(path)?;
            self.overrides.apply(&mut config);
            self.config = config;
        }
        self.resolver = self.config.resolver();
        self.source = self.config.record_source();
        self.theme = Theme::resolve(&self.config.theme);
        self.start_resolution();
        Ok(())
    }
}

fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x && column < area.x + area.width && row >= area.y && row < area.y + area.height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::selection::FOCAL_REFRESH_INTERVAL;
    use rand::SeedableRng;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use std::fs;
    use std::time::Duration;

    fn app_with(config: ConfigFile) -> AppState {
        AppState::new(config, None, Cli::default(), StdRng::seed_from_u64(11))
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::NONE,
        }
    }

    fn click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn screen(app: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        terminal.draw(|frame| crate::ui::render(frame, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn wait_for_fetch(app: &mut AppState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.is_loading() && Instant::now() < deadline {
            app.tick(Instant::now());
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!app.is_loading(), "fetch did not finish");
    }

    #[test]
    fn operator_text_becomes_the_menu() {
        let mut config = ConfigFile::default();
        config.params.text = Some("Pho, Ramen, Pho".into());
        let app = app_with(config);
        assert_eq!(app.candidates().items(), ["Pho".to_string(), "Ramen".to_string()]);
        assert!(app.status_text().starts_with("2 dishes from manual list"));
    }

    #[test]
    fn keys_drive_the_selection() {
        let mut app = app_with(ConfigFile::default());
        assert_eq!(app.headline(), crate::config::DEFAULT_TITLE);

        app.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(app.selection().state(), SelectionState::Running);
        let focal = app.headline().to_string();
        assert!(app.candidates().items().contains(&focal));

        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.selection().state(), SelectionState::Stopped);
        assert_eq!(app.selection().history().iter().next(), Some(app.headline()));

        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn key_releases_are_ignored() {
        let mut app = app_with(ConfigFile::default());
        let press = key(KeyCode::Char(' '));
        let release = KeyEvent {
            kind: KeyEventKind::Release,
            ..press
        };
        app.handle_key(press);
        app.handle_key(release);
        assert_eq!(app.selection().state(), SelectionState::Running);

        app.handle_key(KeyEvent {
            kind: KeyEventKind::Repeat,
            ..key(KeyCode::Char('q'))
        });
        assert!(!app.should_quit);
    }

    #[test]
    fn clicking_the_button_advances() {
        let mut app = app_with(ConfigFile::default());
        let area = Rect::new(0, 0, 60, 20);
        let button = screen_layout(area).button;
        app.handle_mouse(click(button.x + 1, button.y + 1), area);
        assert_eq!(app.selection().state(), SelectionState::Running);
        app.handle_mouse(click(0, 10), area);
        assert_eq!(app.selection().state(), SelectionState::Running);
    }

    #[test]
    fn render_shows_state_label_and_history() {
        let mut app = app_with(ConfigFile::default());
        let idle = screen(&app);
        assert!(idle.contains("Start"));
        assert!(idle.contains(crate::config::DEFAULT_TITLE));

        let now = Instant::now();
        app.advance(now);
        app.tick(now + FOCAL_REFRESH_INTERVAL);
        assert!(screen(&app).contains("Stop"));

        app.advance(now + FOCAL_REFRESH_INTERVAL);
        let stopped = screen(&app);
        assert!(stopped.contains("Again"));
        let pick = app.selection().focal().unwrap().to_string();
        assert!(stopped.matches(pick.as_str()).count() >= 2);
    }

    #[test]
    fn fields_without_source_keep_builtin_menu() {
        let mut config = ConfigFile::default();
        config.params.fields = vec!["dish".into()];
        config.columns = serde_json::from_str(r#"[{"id":"dish","kind":2}]"#).unwrap();
        let app = app_with(config);
        assert!(!app.is_loading());
        assert_eq!(app.candidates(), &CandidateList::builtin());
    }

    #[test]
    fn records_load_in_the_background() {
        let dir = tempfile::tempdir().unwrap();
        let rows = dir.path().join("rows.json");
        fs::write(
            &rows,
            r#"{"data":[{"dish":"Laksa","price":"12.50"},{"dish":"Laksa"},{"dish":"Pho"}]}"#,
        )
        .unwrap();

        let mut config = ConfigFile::default();
        config.params.fields = vec!["dish".into()];
        config.columns = serde_json::from_str(r#"[{"id":"dish","kind":2}]"#).unwrap();
        config.source = Some(SourceConfig::File { path: rows });
        let mut app = app_with(config);
        assert!(app.status_text().contains("Loading records"));

        wait_for_fetch(&mut app);
        assert_eq!(app.candidates().items(), ["Laksa".to_string(), "Pho".to_string()]);
        assert!(app.status_text().starts_with("2 dishes from records"));
    }

    #[test]
    fn reload_picks_up_config_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = ConfigFile::default();
        config.params.text = Some("Tacos".into());
        config.save(&path).unwrap();

        let mut app = AppState::new(
            ConfigFile::load(&path).unwrap(),
            Some(path.clone()),
            Cli::default(),
            StdRng::seed_from_u64(3),
        );
        assert_eq!(app.candidates().items(), ["Tacos".to_string()]);

        config.params.text = Some("Curry\nSoup".into());
        config.save(&path).unwrap();
        app.handle_key(key(KeyCode::Char('r')));
        assert_eq!(app.candidates().len(), 2);
        assert!(app.status_text().contains("Configuration reloaded"));

        fs::write(&path, "{ broken").unwrap();
        app.handle_key(key(KeyCode::Char('r')));
        assert_eq!(app.candidates().len(), 2);
        assert!(app.status_text().contains("Reload failed"));
    }
}

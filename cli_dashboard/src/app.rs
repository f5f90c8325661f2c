use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, Instant};

use city_core::{
    ClientError, Completion, CompletionOutcome, DashboardConfig, Dispatch, Session,
    ValidationError,
};
use city_proto::group_troops;
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};

use crate::ui::{draw_ui, training_rows, Focus, TrainingRow, ViewState};

const QUANTITY_STEP: i64 = 1;
const QUANTITY_STEP_LARGE: i64 = 10;

/// Leaves raw mode and shows the cursor when dropped, so early returns from
/// the event loop still hand back a usable terminal.
pub(crate) struct TerminalGuard {
    restore: fn(),
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self {
            restore: restore_terminal,
        })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        (self.restore)();
    }
}

fn restore_terminal() {
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = crossterm::execute!(std::io::stdout(), crossterm::cursor::Show);
}

pub struct DashboardApp {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    session: Session,
    view: ViewState,
    max_levels_shown: u32,
    dispatches: UnboundedSender<Dispatch>,
    completions: UnboundedReceiver<Completion>,
    shutdown_sender: Sender<()>,
    log_receiver: Receiver<String>,
    _guard: TerminalGuard,
}

impl DashboardApp {
    pub fn new(
        config: &DashboardConfig,
        dispatches: UnboundedSender<Dispatch>,
        completions: UnboundedReceiver<Completion>,
        shutdown_sender: Sender<()>,
        log_receiver: Receiver<String>,
    ) -> Result<Self> {
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        let guard = TerminalGuard::enter()?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(Self {
            terminal,
            session: Session::new(config),
            view: ViewState::default(),
            max_levels_shown: config.max_levels_shown(),
            dispatches,
            completions,
            shutdown_sender,
            log_receiver,
            _guard: guard,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let mut last_draw: Option<Instant> = None;

        if self.session.state_query().is_some() {
            self.refresh();
        } else {
            self.view
                .push_log("No city or player configured. Pass --city-id or --player-id.");
        }

        loop {
            while let Ok(completion) = self.completions.try_recv() {
                self.apply_completion(completion);
            }

            while let Ok(line) = self.log_receiver.try_recv() {
                self.view.push_log(line);
            }

            if let Some(dispatch) = self.session.poll_timers(Instant::now()) {
                info!(seq = dispatch.seq, "auto_refresh.fired");
                self.send(dispatch);
            }

            let rows = self.training_rows();
            self.view.clamp_selection(self.building_count(), rows.len());

            if last_draw.map_or(true, |at| at.elapsed() >= Duration::from_millis(100)) {
                self.terminal
                    .draw(|frame| draw_ui(frame, &self.session, &self.view, &rows))?;
                last_draw = Some(Instant::now());
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        KeyCode::Char('r') | KeyCode::Char('R') => self.refresh(),
                        KeyCode::Tab | KeyCode::BackTab => self.view.toggle_focus(),
                        KeyCode::Char('v') | KeyCode::Char('V') => {
                            self.view.show_raw = !self.view.show_raw;
                        }
                        KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1, &rows),
                        KeyCode::Down | KeyCode::Char('j') => self.move_selection(1, &rows),
                        KeyCode::Char('=') | KeyCode::Char('+') => {
                            self.adjust_selected(QUANTITY_STEP, &rows);
                        }
                        KeyCode::Char('-') | KeyCode::Char('_') => {
                            self.adjust_selected(-QUANTITY_STEP, &rows);
                        }
                        KeyCode::Char(']') | KeyCode::Char('}') => {
                            self.adjust_selected(QUANTITY_STEP_LARGE, &rows);
                        }
                        KeyCode::Char('[') | KeyCode::Char('{') => {
                            self.adjust_selected(-QUANTITY_STEP_LARGE, &rows);
                        }
                        KeyCode::Char('0') => {
                            if let Some(row) = rows.get(self.view.training_index) {
                                self.session.set_quantity(&row.troop_type, row.level, 0.0);
                            }
                        }
                        KeyCode::Enter => match self.view.focus {
                            Focus::Buildings => self.upgrade_selected(),
                            Focus::Training => self.train_selected(&rows),
                        },
                        KeyCode::Char('u') => self.upgrade_selected(),
                        KeyCode::Char('t') => self.train_selected(&rows),
                        _ => {}
                    }
                }
            }
        }

        self.session.shutdown();
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    fn training_rows(&self) -> Vec<TrainingRow> {
        training_rows(self.session.payload(), self.max_levels_shown)
    }

    fn building_count(&self) -> usize {
        self.session
            .payload()
            .map(|payload| payload.buildings().len())
            .unwrap_or(0)
    }

    fn move_selection(&mut self, delta: isize, rows: &[TrainingRow]) {
        let len = match self.view.focus {
            Focus::Buildings => self.building_count(),
            Focus::Training => rows.len(),
        };
        self.view.move_selection(delta, len);
    }

    fn adjust_selected(&mut self, delta: i64, rows: &[TrainingRow]) {
        if self.view.focus != Focus::Training || self.session.is_busy() {
            return;
        }
        if let Some(row) = rows.get(self.view.training_index) {
            self.session.adjust_quantity(&row.key(), delta);
        }
    }

    fn refresh(&mut self) {
        match self.session.begin_refresh() {
            Ok(dispatch) => self.send(dispatch),
            Err(err) => self.report_rejected("refresh", err),
        }
    }

    fn upgrade_selected(&mut self) {
        let code = self.session.payload().and_then(|payload| {
            payload
                .buildings()
                .get(self.view.building_index)
                .map(|building| building.building_type.code.clone())
        });
        let Some(code) = code else {
            return;
        };
        match self.session.begin_upgrade(&code) {
            Ok(dispatch) => {
                info!(building = %code, "upgrade.requested");
                self.send(dispatch);
            }
            Err(err) => self.report_rejected("upgrade", err),
        }
    }

    fn train_selected(&mut self, rows: &[TrainingRow]) {
        let Some(row) = rows.get(self.view.training_index) else {
            return;
        };
        match self.session.begin_train(&row.troop_type, row.level) {
            Ok(dispatch) => {
                info!(troop = %row.troop_type, level = row.level, "train.requested");
                self.send(dispatch);
            }
            Err(err) => self.report_rejected("train", err),
        }
    }

    fn send(&mut self, dispatch: Dispatch) {
        let seq = dispatch.seq;
        let call = dispatch.call.clone();
        if let Err(err) = self.dispatches.send(dispatch) {
            error!("Failed to queue request: {}", err);
            // The pump is gone; settle the in-flight count locally.
            self.session.complete(
                Completion {
                    seq,
                    call,
                    result: Err(ClientError::PumpStopped),
                },
                Instant::now(),
            );
        }
    }

    fn apply_completion(&mut self, completion: Completion) {
        match self.session.complete(completion, Instant::now()) {
            CompletionOutcome::Applied { rebased } => {
                if !rebased {
                    warn!("State response lacked resources or rates; keeping previous snapshot");
                }
                if let Some(payload) = self.session.payload() {
                    let groups = group_troops(payload.troops());
                    for troop in &groups.unrecognized {
                        warn!(
                            troop = %troop.troop_type.code,
                            category = %troop.troop_type.category.code,
                            "Troop category not recognised; not shown in training"
                        );
                    }
                }
            }
            CompletionOutcome::Superseded | CompletionOutcome::Failed => {}
        }
    }

    fn report_rejected(&self, action: &str, err: ValidationError) {
        warn!(action, error = %err, "request.rejected");
    }
}

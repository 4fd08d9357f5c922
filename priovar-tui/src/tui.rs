use crate::{
    activity::ActivityLine,
    command::{Command, parse_command},
    styles,
    view::{self, ViewSnap},
};
use anyhow::Result;
use async_trait::async_trait;
use crossterm::{
    event::{Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use priovar_portal::{
    Modal, Navigation, NoteMode, PatientScope, PatientTable, RecordId, RefreshOutcome, TableRow,
};
use priovar_runtime::{
    ShutdownHandle,
    actor::{Actor, Addr, Context},
};
use ratatui::{Terminal, backend::CrosstermBackend, style::Style};
use std::{
    future::Future,
    io::{self, Stdout},
    sync::Arc,
    time::{Duration, Instant},
};

const BRAILLE_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const MAX_LINES: usize = 500;
const LOG_STEP: usize = 3;

/// Row the cursor sits on. Follows the tracked patient through re-sorts and
/// falls back to the last position when that patient left the list.
fn cursor_index(rows: &[TableRow], selected: Option<&RecordId>, last: usize) -> Option<usize> {
    let last_row = rows.len().checked_sub(1)?;
    selected
        .and_then(|id| rows.iter().position(|r| &r.record.patient_id == id))
        .or(Some(last.min(last_row)))
}

pub enum TuiMsg {
    /// Initial title and list load.
    Start,
    InputEvent(CtEvent),
    Tick,
    /// Periodic background refetch.
    Poll,
    Submit(String),
    Refreshed {
        label: &'static str,
        result: std::result::Result<RefreshOutcome, String>,
    },
    TitleLoaded(std::result::Result<String, String>),
    Navigated(std::result::Result<Navigation, String>),
    OpError(String),
    Shutdown,
}

/// Which keymap applies, from the open modal and command focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyMode {
    Browse,
    Command,
    ConfirmDelete,
    ConfirmAnnotation,
    NoteDisplay,
    NoteEditing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Quit,
    Up,
    Down,
    LogUp,
    LogDown,
    Activate,
    Delete,
    Note,
    Finish,
    Details,
    Similar,
    Refresh,
    ToggleScope,
    FocusCommand,
    Confirm,
    Cancel,
    EditNote,
    SaveNote,
    NoteChar(char),
    NoteBackspace,
    CmdChar(char),
    CmdBackspace,
    CmdDelete,
    CmdLeft,
    CmdRight,
    CmdHome,
    CmdEnd,
    CmdSubmit,
    CmdCancel,
}

fn key_action(mode: KeyMode, key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q'))
    {
        return Some(Action::Quit);
    }
    let action = match mode {
        KeyMode::Browse => match key.code {
            KeyCode::Up | KeyCode::Char('k') => Action::Up,
            KeyCode::Down | KeyCode::Char('j') => Action::Down,
            KeyCode::PageUp => Action::LogUp,
            KeyCode::PageDown => Action::LogDown,
            KeyCode::Enter | KeyCode::Char('v') => Action::Activate,
            KeyCode::Char('d') | KeyCode::Delete => Action::Delete,
            KeyCode::Char('n') => Action::Note,
            KeyCode::Char('f') => Action::Finish,
            KeyCode::Char('p') => Action::Details,
            KeyCode::Char('s') => Action::Similar,
            KeyCode::Char('r') => Action::Refresh,
            KeyCode::Tab => Action::ToggleScope,
            KeyCode::Char('/') | KeyCode::Char(':') => Action::FocusCommand,
            KeyCode::Char('q') => Action::Quit,
            _ => return None,
        },
        KeyMode::Command => match key.code {
            KeyCode::Enter => Action::CmdSubmit,
            KeyCode::Esc => Action::CmdCancel,
            KeyCode::Backspace => Action::CmdBackspace,
            KeyCode::Delete => Action::CmdDelete,
            KeyCode::Left => Action::CmdLeft,
            KeyCode::Right => Action::CmdRight,
            KeyCode::Home => Action::CmdHome,
            KeyCode::End => Action::CmdEnd,
            KeyCode::Char(ch) => Action::CmdChar(ch),
            _ => return None,
        },
        KeyMode::ConfirmDelete | KeyMode::ConfirmAnnotation => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Action::Confirm,
            KeyCode::Char('n') | KeyCode::Esc => Action::Cancel,
            _ => return None,
        },
        KeyMode::NoteDisplay => match key.code {
            KeyCode::Char('e') => Action::EditNote,
            KeyCode::Esc | KeyCode::Char('q') => Action::Cancel,
            _ => return None,
        },
        KeyMode::NoteEditing => match key.code {
            KeyCode::Enter => Action::SaveNote,
            KeyCode::Esc => Action::Cancel,
            KeyCode::Backspace => Action::NoteBackspace,
            KeyCode::Char(ch) => Action::NoteChar(ch),
            _ => return None,
        },
    };
    Some(action)
}

pub struct TuiActor {
    table: Arc<PatientTable>,

    // terminal
    term: Terminal<CrosstermBackend<Stdout>>,
    tick_rate: Duration,
    last_tick: Instant,

    // ui state
    selected: Option<RecordId>,
    cursor: usize,
    command_focus: bool,
    input: String,
    input_cursor: usize,
    lines: Vec<ActivityLine>,
    scroll: usize,
    max_scroll: usize,
    last_nav: Option<String>,
    dirty: bool,

    // busy/spinner
    busy: u32,
    spin_idx: usize,

    restored: bool,
    shutdown: ShutdownHandle,
}

impl TuiActor {
    pub fn new(table: Arc<PatientTable>, shutdown: ShutdownHandle, tick_rate: Duration) -> Result<Self> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut term = Terminal::new(backend)?;
        term.clear()?;

        Ok(Self {
            table,
            term,
            tick_rate,
            last_tick: Instant::now(),
            selected: None,
            cursor: 0,
            command_focus: false,
            input: String::new(),
            input_cursor: 0,
            lines: vec![ActivityLine::new(
                "Loading patients. Type `/help` for commands.".into(),
                styles::system(),
            )],
            scroll: 0,
            max_scroll: 0,
            last_nav: None,
            dirty: true,
            busy: 0,
            spin_idx: 0,
            restored: false,
            shutdown,
        })
    }

    fn key_mode(&self) -> KeyMode {
        match self.table.snapshot().modal {
            Some(Modal::ConfirmDelete { .. }) => KeyMode::ConfirmDelete,
            Some(Modal::ConfirmAnnotation { .. }) => KeyMode::ConfirmAnnotation,
            Some(Modal::Note(ed)) if ed.mode() == NoteMode::Editing => KeyMode::NoteEditing,
            Some(Modal::Note(_)) => KeyMode::NoteDisplay,
            None if self.command_focus => KeyMode::Command,
            None => KeyMode::Browse,
        }
    }

    fn cursor_left(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        self.input_cursor -= 1;
        while self.input_cursor > 0 && !self.input.is_char_boundary(self.input_cursor) {
            self.input_cursor -= 1;
        }
    }

    fn cursor_right(&mut self) {
        if self.input_cursor >= self.input.len() {
            return;
        }
        self.input_cursor += 1;
        while self.input_cursor < self.input.len()
            && !self.input.is_char_boundary(self.input_cursor)
        {
            self.input_cursor += 1;
        }
    }

    fn backspace(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        let mut prev = self.input_cursor - 1;
        while prev > 0 && !self.input.is_char_boundary(prev) {
            prev -= 1;
        }
        self.input.drain(prev..self.input_cursor);
        self.input_cursor = prev;
    }

    fn delete(&mut self) {
        if self.input_cursor >= self.input.len() {
            return;
        }
        let start = self.input_cursor;
        let mut end = start + 1;
        while end < self.input.len() && !self.input.is_char_boundary(end) {
            end += 1;
        }
        self.input.drain(start..end);
    }

    fn push_styled<S: Into<String>>(&mut self, s: S, style: Style) {
        self.lines.push(ActivityLine::new(s.into(), style));
        if self.lines.len() > MAX_LINES {
            let excess = self.lines.len() - MAX_LINES;
            self.lines.drain(..excess);
        }
        self.dirty = true;
    }

    fn push_error(&mut self, e: impl std::fmt::Display) {
        tracing::warn!(error = %e, "tui.op.failed");
        self.push_styled(format!("× {e}"), styles::error());
    }

    fn spinner(&self) -> &'static str {
        if self.busy > 0 {
            BRAILLE_FRAMES[self.spin_idx % BRAILLE_FRAMES.len()]
        } else {
            " "
        }
    }

    fn set_busy(&mut self, on: bool) {
        if on {
            self.busy = self.busy.saturating_add(1)
        } else {
            self.busy = self.busy.saturating_sub(1)
        }
        self.dirty = true;
    }

    fn step_spinner(&mut self) {
        self.spin_idx = (self.spin_idx + 1) % BRAILLE_FRAMES.len();
        // Running rows animate even when no call of ours is in flight.
        self.dirty = true;
    }

    fn draw(&mut self) -> Result<()> {
        let table = self.table.snapshot();
        if let Some(index) = cursor_index(&table.rows, self.selected.as_ref(), self.cursor) {
            self.cursor = index;
        }
        let snap = ViewSnap {
            table,
            selected: self.cursor,
            lines: self.lines.clone(),
            scroll: self.scroll,
            input: self.input.clone(),
            input_cursor: self.input_cursor,
            command_focus: self.command_focus,
            busy: self.busy,
            spinner: self.spinner(),
            last_nav: self.last_nav.clone(),
        };
        self.max_scroll = view::draw(&mut self.term, &snap)?;
        self.scroll = self.scroll.min(self.max_scroll);
        Ok(())
    }

    /// Runs a backend call off the actor and posts its result back.
    fn spawn_op<F>(&mut self, me: Addr<TuiActor>, fut: F)
    where
        F: Future<Output = TuiMsg> + Send + 'static,
    {
        self.set_busy(true);
        tokio::spawn(async move {
            let msg = fut.await;
            let _ = me.send(msg).await;
        });
    }

    fn refresh(&mut self, me: Addr<TuiActor>, label: &'static str) {
        let table = self.table.clone();
        self.spawn_op(me, async move {
            TuiMsg::Refreshed {
                label,
                result: table.refresh().await.map_err(|e| e.to_string()),
            }
        });
    }

    fn load_title(&mut self, me: Addr<TuiActor>) {
        let table = self.table.clone();
        self.spawn_op(me, async move {
            TuiMsg::TitleLoaded(table.load_title().await.map_err(|e| e.to_string()))
        });
    }

    /// Patient under the cursor in the current list, if any.
    fn selected_patient(&mut self) -> Option<RecordId> {
        let rows = self.table.snapshot().rows;
        let index = cursor_index(&rows, self.selected.as_ref(), self.cursor)?;
        let id = rows.get(index)?.record.patient_id.clone();
        self.cursor = index;
        self.selected = Some(id.clone());
        Some(id)
    }

    fn move_cursor(&mut self, down: bool) {
        let rows = self.table.snapshot().rows;
        let Some(index) = cursor_index(&rows, self.selected.as_ref(), self.cursor) else {
            return;
        };
        let next = if down {
            (index + 1).min(rows.len() - 1)
        } else {
            index.saturating_sub(1)
        };
        self.cursor = next;
        self.selected = rows.get(next).map(|r| r.record.patient_id.clone());
    }

    fn apply(&mut self, action: Action, me: Addr<TuiActor>) {
        self.dirty = true;
        match action {
            Action::Quit => {
                let _ = me.try_send(TuiMsg::Shutdown);
            }
            Action::Up => self.move_cursor(false),
            Action::Down => self.move_cursor(true),
            Action::LogUp => self.scroll = (self.scroll + LOG_STEP).min(self.max_scroll),
            Action::LogDown => self.scroll = self.scroll.saturating_sub(LOG_STEP),
            Action::Activate
            | Action::Delete
            | Action::Note
            | Action::Finish
            | Action::Details
            | Action::Similar => {
                if let Some(patient) = self.selected_patient() {
                    self.apply_to_patient(action, patient, me);
                }
            }
            Action::Refresh => self.refresh(me, "refresh"),
            Action::ToggleScope => {
                let scope = self.table.scope().toggled();
                self.switch_scope(scope, me);
            }
            Action::FocusCommand => {
                self.command_focus = true;
                self.input = "/".into();
                self.input_cursor = 1;
            }
            Action::Confirm => match self.key_mode() {
                KeyMode::ConfirmDelete => {
                    let table = self.table.clone();
                    self.spawn_op(me, async move {
                        TuiMsg::Refreshed {
                            label: "delete",
                            result: table.confirm_delete().await.map_err(|e| e.to_string()),
                        }
                    });
                }
                KeyMode::ConfirmAnnotation => {
                    let table = self.table.clone();
                    self.spawn_op(me, async move {
                        TuiMsg::Refreshed {
                            label: "annotation",
                            result: table.confirm_annotation().await.map_err(|e| e.to_string()),
                        }
                    });
                }
                _ => {}
            },
            Action::Cancel => match self.key_mode() {
                KeyMode::ConfirmDelete => self.table.cancel_delete(),
                KeyMode::ConfirmAnnotation => self.table.cancel_annotation(),
                _ => self.table.dismiss_modal(),
            },
            Action::EditNote => {
                if let Err(e) = self.table.edit_note() {
                    self.push_error(e);
                }
            }
            Action::NoteChar(ch) => {
                let _ = self.table.note_push(ch);
            }
            Action::NoteBackspace => {
                let _ = self.table.note_pop();
            }
            Action::SaveNote => {
                let table = self.table.clone();
                self.spawn_op(me, async move {
                    TuiMsg::Refreshed {
                        label: "note",
                        result: table.save_note().await.map_err(|e| e.to_string()),
                    }
                });
            }
            Action::CmdChar(ch) => {
                self.input.insert(self.input_cursor, ch);
                self.input_cursor += ch.len_utf8();
            }
            Action::CmdBackspace => {
                self.backspace();
                if self.input.is_empty() {
                    self.command_focus = false;
                }
            }
            Action::CmdDelete => self.delete(),
            Action::CmdLeft => self.cursor_left(),
            Action::CmdRight => self.cursor_right(),
            Action::CmdHome => self.input_cursor = 0,
            Action::CmdEnd => self.input_cursor = self.input.len(),
            Action::CmdSubmit => {
                let line = std::mem::take(&mut self.input);
                self.input_cursor = 0;
                self.command_focus = false;
                let _ = me.try_send(TuiMsg::Submit(line));
            }
            Action::CmdCancel => {
                self.input.clear();
                self.input_cursor = 0;
                self.command_focus = false;
            }
        }
    }

    fn apply_to_patient(&mut self, action: Action, patient: RecordId, me: Addr<TuiActor>) {
        match action {
            Action::Activate => match self.table.activate_control(&patient) {
                Ok(Some(nav)) => self.navigated(nav),
                Ok(None) => {}
                Err(e) => self.push_error(e),
            },
            Action::Delete => {
                if let Err(e) = self.table.request_delete(&patient) {
                    self.push_error(e);
                }
            }
            Action::Note => {
                if let Err(e) = self.table.open_note(&patient) {
                    self.push_error(e);
                }
            }
            Action::Finish => {
                let table = self.table.clone();
                self.spawn_op(me, async move {
                    TuiMsg::Refreshed {
                        label: "finish info",
                        result: table.mark_finished(&patient).await.map_err(|e| e.to_string()),
                    }
                });
            }
            Action::Details => match self.table.patient_details(&patient) {
                Ok(nav) => self.navigated(nav),
                Err(e) => self.push_error(e),
            },
            Action::Similar => {
                let table = self.table.clone();
                self.spawn_op(me, async move {
                    TuiMsg::Navigated(
                        table
                            .see_similar_patients(&patient)
                            .await
                            .map_err(|e| e.to_string()),
                    )
                });
            }
            _ => {}
        }
    }

    fn navigated(&mut self, nav: Navigation) {
        let path = nav.route.path();
        tracing::info!(route = %path, "tui.navigate");
        match &nav.state {
            Some(row) => self.push_styled(
                format!("→ {path} (patient {} • {})", row.patient_id, row.patient_name),
                styles::navigation(),
            ),
            None => self.push_styled(format!("→ {path}"), styles::navigation()),
        }
        self.last_nav = Some(path);
    }

    fn switch_scope(&mut self, scope: PatientScope, me: Addr<TuiActor>) {
        self.table.set_scope(scope);
        self.selected = None;
        self.cursor = 0;
        self.push_styled(format!("Scope: {scope}"), styles::system());
        self.refresh(me, "refresh");
    }

    fn handle_command(&mut self, cmd: Command, me: Addr<TuiActor>) {
        match cmd {
            Command::Quit => {
                let _ = me.try_send(TuiMsg::Shutdown);
            }
            Command::Refresh => self.refresh(me, "refresh"),
            Command::Scope(None) => {
                let scope = self.table.scope().toggled();
                self.switch_scope(scope, me);
            }
            Command::Scope(Some(raw)) => match raw.parse::<PatientScope>() {
                Ok(scope) => self.switch_scope(scope, me),
                Err(e) => self.push_styled(format!("× {e}"), styles::error()),
            },
            Command::Find(id) => match self.table.index_of_patient(&RecordId::from(id.as_str())) {
                Some(i) => {
                    self.cursor = i;
                    self.selected = Some(RecordId::from(id.as_str()));
                }
                None => self.push_styled(format!("× No patient {id} in this list."), styles::error()),
            },
            Command::Help => {
                for (line, style) in [
                    ("Keys:", styles::header()),
                    ("  ↑/↓ j/k   select row", styles::value()),
                    ("  enter/v   run the analysis control (View / Analysis Not Started)", styles::value()),
                    ("  d         delete patient (asks first)", styles::value()),
                    ("  n         clinician notes (e to edit, enter to save)", styles::value()),
                    ("  f         mark analysis finished", styles::value()),
                    ("  p / s     patient details / similar patients", styles::value()),
                    ("  tab       switch requested/clinic list", styles::value()),
                    ("Commands: /refresh  /scope [requested|clinic]  /find <id>  /quit", styles::header()),
                ] {
                    self.push_styled(line, style);
                }
            }
            Command::Unknown(s) => {
                self.push_styled(format!("× Unknown command: {s}"), styles::error());
                self.push_styled("Try `/help`.", styles::dim());
            }
        }
    }

    fn restore_terminal(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        disable_raw_mode().ok();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = self.term.show_cursor();
    }
}

impl Drop for TuiActor {
    fn drop(&mut self) {
        self.restore_terminal();
    }
}

#[async_trait]
impl Actor for TuiActor {
    type Msg = TuiMsg;

    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            TuiMsg::Start => {
                self.load_title(ctx.addr());
                self.refresh(ctx.addr(), "load");
            }
            TuiMsg::InputEvent(ev) => {
                if let CtEvent::Key(k) = ev
                    && k.kind == KeyEventKind::Press
                    && let Some(action) = key_action(self.key_mode(), k)
                {
                    self.apply(action, ctx.addr());
                }
            }
            TuiMsg::Poll => {
                if self.busy == 0 {
                    self.refresh(ctx.addr(), "poll");
                }
            }
            TuiMsg::Submit(line) => {
                let s = line.trim();
                if !s.is_empty() {
                    let cmd = parse_command(s);
                    self.handle_command(cmd, ctx.addr());
                }
            }
            TuiMsg::Refreshed { label, result } => {
                self.set_busy(false);
                match result {
                    Ok(RefreshOutcome::Applied(n)) if label != "poll" => {
                        self.push_styled(format!("✓ {label}: {n} patient(s) listed"), styles::success());
                    }
                    Ok(RefreshOutcome::Stale) => {
                        tracing::debug!(label, "tui.refresh.stale");
                    }
                    Ok(_) => {}
                    Err(e) => self.push_error(format!("{label}: {e}")),
                }
            }
            TuiMsg::TitleLoaded(result) => {
                self.set_busy(false);
                if let Err(e) = result {
                    self.push_error(format!("health center: {e}"));
                }
            }
            TuiMsg::Navigated(result) => {
                self.set_busy(false);
                match result {
                    Ok(nav) => self.navigated(nav),
                    Err(e) => self.push_error(e),
                }
            }
            TuiMsg::OpError(e) => self.push_error(e),
            TuiMsg::Tick => {
                self.step_spinner();
                if self.dirty || self.last_tick.elapsed() >= self.tick_rate {
                    self.draw()?;
                    self.last_tick = Instant::now();
                    self.dirty = false;
                }
            }
            TuiMsg::Shutdown => {
                self.restore_terminal();
                self.shutdown.signal();
                ctx.stop();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn rows(ids: &[&str]) -> Vec<TableRow> {
        ids.iter()
            .map(|id| {
                TableRow::from_record(priovar_portal::PatientRecord {
                    patient_id: RecordId::from(*id),
                    patient_name: format!("P{id}"),
                    file: None,
                })
            })
            .collect()
    }

    #[test]
    fn cursor_follows_the_patient_after_a_reorder() {
        let before = rows(&["41"]);
        let selected = RecordId::from("41");
        assert_eq!(cursor_index(&before, Some(&selected), 0), Some(0));

        let after = rows(&["57", "41"]);
        assert_eq!(cursor_index(&after, Some(&selected), 0), Some(1));
    }

    #[test]
    fn cursor_falls_back_when_the_patient_is_gone() {
        let list = rows(&["1", "2"]);
        let gone = RecordId::from("9");
        assert_eq!(cursor_index(&list, Some(&gone), 5), Some(1));
        assert_eq!(cursor_index(&list, None, 0), Some(0));
        assert_eq!(cursor_index(&[], Some(&gone), 0), None);
    }

    #[test]
    fn browse_keys() {
        assert_eq!(key_action(KeyMode::Browse, key(KeyCode::Enter)), Some(Action::Activate));
        assert_eq!(key_action(KeyMode::Browse, key(KeyCode::Char('d'))), Some(Action::Delete));
        assert_eq!(key_action(KeyMode::Browse, key(KeyCode::Tab)), Some(Action::ToggleScope));
        assert_eq!(key_action(KeyMode::Browse, key(KeyCode::Char('x'))), None);
    }

    #[test]
    fn confirmation_only_accepts_yes_or_no() {
        for mode in [KeyMode::ConfirmDelete, KeyMode::ConfirmAnnotation] {
            assert_eq!(key_action(mode, key(KeyCode::Char('y'))), Some(Action::Confirm));
            assert_eq!(key_action(mode, key(KeyCode::Esc)), Some(Action::Cancel));
            assert_eq!(key_action(mode, key(KeyCode::Char('d'))), None);
        }
    }

    #[test]
    fn note_editing_captures_text() {
        assert_eq!(
            key_action(KeyMode::NoteEditing, key(KeyCode::Char('q'))),
            Some(Action::NoteChar('q'))
        );
        assert_eq!(key_action(KeyMode::NoteEditing, key(KeyCode::Enter)), Some(Action::SaveNote));
        assert_eq!(key_action(KeyMode::NoteDisplay, key(KeyCode::Char('e'))), Some(Action::EditNote));
    }

    #[test]
    fn ctrl_c_quits_everywhere() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        for mode in [KeyMode::Browse, KeyMode::Command, KeyMode::NoteEditing] {
            assert_eq!(key_action(mode, ctrl_c), Some(Action::Quit));
        }
    }
}

use std::mem;

use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use crate::controller::{Command, Controller, Notice, Response, Severity, Statistics};
use crate::models::{Bird, Species};
use crate::query::{self, Page};

use super::forms::{BirdField, BirdForm, ConfirmBirdDelete};
use super::helpers::centered_rect;

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Width share of the bird list; the info card takes the rest.
const LIST_PERCENT: u16 = 40;

/// High-level navigation states.
enum Screen {
    Birds,
    Statistics(Statistics),
}

/// Fine-grained modes scoped to the current screen.
enum Mode {
    Normal,
    AddingBird(BirdForm),
    EditingBird { bird: Bird, form: BirdForm },
    ConfirmDelete(ConfirmBirdDelete),
    Searching(SearchState),
}

/// State for an active inline search.
struct SearchState {
    query: String,
}

/// Which slice of the catalog the list shows.
#[derive(Clone, PartialEq)]
enum View {
    All,
    Search(String),
    Species(Species),
    NameDesc,
}

impl View {
    fn label(&self) -> String {
        match self {
            View::All => "All".to_string(),
            View::Search(query) => format!("Search \"{query}\""),
            View::Species(species) => format!("Species: {species}"),
            View::NameDesc => "Name Z-A".to_string(),
        }
    }

    fn command(&self) -> Command {
        match self {
            View::All => Command::Refresh,
            View::Search(query) => Command::Search(query.clone()),
            View::Species(species) => Command::FilterSpecies(*species),
            View::NameDesc => Command::SortByNameDesc,
        }
    }

    /// All, then each species in ordinal order, then back to All.
    fn next_species(&self) -> View {
        match self {
            View::Species(species) if *species == Species::Penguin => View::All,
            View::Species(species) => View::Species(species.cycle(1)),
            _ => View::Species(Species::Cardinal),
        }
    }
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Warning,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Warning => Style::default().fg(Color::Yellow),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

impl From<Severity> for StatusKind {
    fn from(value: Severity) -> Self {
        match value {
            Severity::Info => StatusKind::Info,
            Severity::Warning => StatusKind::Warning,
            Severity::Error => StatusKind::Error,
        }
    }
}

/// Central application state shared across the TUI. Every read and write goes
/// through the controller; the app only keeps the page it is showing.
pub struct App {
    controller: Controller,
    view: View,
    page: Page<Bird>,
    page_size: i64,
    selected: usize,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    pub fn new(controller: Controller, page_size: i64) -> Self {
        let page_size = page_size.max(1);
        let mut app = Self {
            controller,
            view: View::All,
            page: query::page_of(&[], 1, page_size),
            page_size,
            selected: 0,
            screen: Screen::Birds,
            mode: Mode::Normal,
            status: None,
        };
        app.reload(None);
        app
    }

    /// Returns `true` when the user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit),
            Mode::AddingBird(form) => self.handle_add_bird(code, form),
            Mode::EditingBird { bird, form } => self.handle_edit_bird(code, bird, form),
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm),
            Mode::Searching(state) => self.handle_search(code, state),
        };

        exit
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Mode {
        if let Screen::Statistics(_) = self.screen {
            match code {
                KeyCode::Char('q') => *exit = true,
                KeyCode::Esc | KeyCode::Char('t') => self.screen = Screen::Birds,
                _ => {}
            }
            return Mode::Normal;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => *exit = true,
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::PageUp => self.change_page(-1),
            KeyCode::PageDown => self.change_page(1),
            KeyCode::Char('+') => {
                self.clear_status();
                return Mode::AddingBird(BirdForm::default());
            }
            KeyCode::Char('e') => match self.current_bird().cloned() {
                Some(bird) => {
                    let form = BirdForm::from_bird(&bird);
                    return Mode::EditingBird { bird, form };
                }
                None => self.set_status("No bird selected.", StatusKind::Warning),
            },
            KeyCode::Char('-') => match self.current_bird() {
                Some(bird) => return Mode::ConfirmDelete(ConfirmBirdDelete::from(bird)),
                None => self.set_status("No bird selected.", StatusKind::Warning),
            },
            KeyCode::Char('f') => {
                let query = match &self.view {
                    View::Search(query) => query.clone(),
                    _ => String::new(),
                };
                return Mode::Searching(SearchState { query });
            }
            KeyCode::Char('s') => {
                self.view = self.view.next_species();
                self.reset_to_first_page();
            }
            KeyCode::Char('o') => {
                self.view = if self.view == View::NameDesc {
                    View::All
                } else {
                    View::NameDesc
                };
                self.reset_to_first_page();
            }
            KeyCode::Char('r') => {
                self.reload(self.current_bird().map(|b| b.id));
                self.set_status("Reloaded.", StatusKind::Info);
            }
            KeyCode::Char('t') => match self.controller.handle(Command::Statistics) {
                Response::Statistics(stats) => self.screen = Screen::Statistics(stats),
                Response::Notice(notice) => self.notify(notice),
                _ => {}
            },
            _ => {}
        }
        Mode::Normal
    }

    fn handle_add_bird(&mut self, code: KeyCode, mut form: BirdForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Add bird cancelled.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(false),
            KeyCode::BackTab | KeyCode::Up => form.next_field(true),
            KeyCode::Left => {
                form.cycle_species(-1);
            }
            KeyCode::Right => {
                form.cycle_species(1);
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.controller.handle(Command::Add(form.to_new_bird())) {
                Response::Added(bird) => {
                    self.reload(Some(bird.id));
                    self.set_status(format!("Added {}.", bird.name), StatusKind::Info);
                    return Mode::Normal;
                }
                Response::Notice(notice) => {
                    form.error = Some(notice.message.clone());
                    self.notify(notice);
                }
                _ => {}
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Mode::AddingBird(form)
    }

    fn handle_edit_bird(&mut self, code: KeyCode, bird: Bird, mut form: BirdForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(false),
            KeyCode::BackTab | KeyCode::Up => form.next_field(true),
            KeyCode::Left => {
                form.cycle_species(-1);
            }
            KeyCode::Right => {
                form.cycle_species(1);
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.controller.handle(Command::Update(form.apply_to(&bird))) {
                Response::Updated(updated) => {
                    self.reload(Some(updated.id));
                    self.set_status(format!("Updated {}.", updated.name), StatusKind::Info);
                    return Mode::Normal;
                }
                Response::Notice(notice) => {
                    form.error = Some(notice.message.clone());
                    self.notify(notice);
                }
                _ => {}
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Mode::EditingBird { bird, form }
    }

    fn handle_confirm_delete(&mut self, code: KeyCode, confirm: ConfirmBirdDelete) -> Mode {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Mode::Normal
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.controller.handle(Command::Delete(confirm.id)) {
                    Response::Deleted(_) => {
                        self.reload(None);
                        self.set_status(format!("Deleted {}.", confirm.name), StatusKind::Info);
                        Mode::Normal
                    }
                    Response::Notice(notice) => {
                        self.notify(notice);
                        Mode::Normal
                    }
                    _ => Mode::Normal,
                }
            }
            _ => Mode::ConfirmDelete(confirm),
        }
    }

    /// Live search: every keystroke re-runs the query.
    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Mode {
        match code {
            KeyCode::Esc => {
                self.view = View::All;
                self.reset_to_first_page();
                return Mode::Normal;
            }
            KeyCode::Enter => return Mode::Normal,
            KeyCode::Up => {
                self.move_selection(-1);
                return Mode::Searching(state);
            }
            KeyCode::Down => {
                self.move_selection(1);
                return Mode::Searching(state);
            }
            KeyCode::Backspace => {
                state.query.pop();
            }
            KeyCode::Char(ch) if !ch.is_control() => state.query.push(ch),
            _ => return Mode::Searching(state),
        }

        self.view = if state.query.is_empty() {
            View::All
        } else {
            View::Search(state.query.clone())
        };
        self.reset_to_first_page();
        Mode::Searching(state)
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Birds => self.draw_birds(frame, content_area),
            Screen::Statistics(stats) => self.draw_statistics(frame, content_area, stats),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::AddingBird(form) => self.draw_bird_form(frame, area, "Add Bird", form),
            Mode::EditingBird { form, .. } => self.draw_bird_form(frame, area, "Edit Bird", form),
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::Searching(state) => self.draw_search_bar(frame, area, state),
            Mode::Normal => {}
        }
    }

    fn draw_birds(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(LIST_PERCENT),
                Constraint::Percentage(100 - LIST_PERCENT),
            ])
            .split(area);

        self.draw_bird_list(frame, chunks[0]);
        self.draw_info_card(frame, chunks[1]);
    }

    fn draw_bird_list(&self, frame: &mut Frame, area: Rect) {
        let title = format!(
            "Birds • {} • page {}/{}",
            self.view.label(),
            self.page.page,
            self.page.total_pages.max(1)
        );
        let block = Block::default().borders(Borders::ALL).title(title);

        if self.page.items.is_empty() {
            let text = if self.view == View::All {
                "No birds yet. Press '+' to add one."
            } else {
                "No birds match the current view."
            };
            let message = Paragraph::new(text)
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let items: Vec<ListItem> = self
            .page
            .items
            .iter()
            .map(|bird| {
                ListItem::new(Line::from(vec![
                    Span::raw(bird.name.clone()),
                    Span::styled(
                        format!("  {}", bird.species),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("▶ ");

        let mut list_state = ListState::default();
        list_state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_info_card(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Info");
        let Some(bird) = self.current_bird() else {
            frame.render_widget(Paragraph::new("").block(block), area);
            return;
        };

        let label = Style::default().fg(Color::Cyan);
        let mut lines = vec![
            Line::from(Span::styled(
                bird.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(vec![
                Span::styled("Species: ", label),
                Span::raw(bird.species.to_string()),
            ]),
            Line::from(vec![
                Span::styled("Added: ", label),
                Span::raw(bird.created_at.format("%Y-%m-%d").to_string()),
            ]),
            Line::from(""),
            Line::from(bird.info.clone()),
        ];

        if let Some(details) = &bird.details {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Details", label)));
            lines.push(Line::from(details.info.clone()));
            let optional = [
                ("Description", details.description.clone()),
                ("Diet", details.diet.clone()),
                ("Behavior", details.behavior.clone()),
                ("Length", details.average_length.map(|v| format!("{v} cm"))),
                ("Weight", details.average_weight.map(|v| format!("{v} g"))),
            ];
            for (name, value) in optional {
                if let Some(value) = value {
                    lines.push(Line::from(vec![
                        Span::styled(format!("{name}: "), label),
                        Span::raw(value),
                    ]));
                }
            }
            if details.is_endangered {
                lines.push(Line::from(Span::styled(
                    "Endangered",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )));
            }
        }

        let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn draw_statistics(&self, frame: &mut Frame, area: Rect, stats: &Statistics) {
        let block = Block::default().borders(Borders::ALL).title("Statistics");
        let label = Style::default().fg(Color::Cyan);
        let most_common = stats
            .most_common
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Total birds: ", label),
                Span::raw(stats.total.to_string()),
            ]),
            Line::from(vec![
                Span::styled("Most common: ", label),
                Span::raw(most_common),
            ]),
            Line::from(vec![
                Span::styled("Average weight: ", label),
                Span::raw(format!("{:.1} g", stats.average_weight)),
            ]),
            Line::from(""),
        ];

        for group in &stats.distribution {
            lines.push(Line::from(vec![
                Span::raw(format!("{:<10}", group.species.to_string())),
                Span::styled("█".repeat(group.count.min(40)), Style::default().fg(Color::Green)),
                Span::raw(format!(" {}", group.count)),
            ]));
        }

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title("Search");
        let paragraph = Paragraph::new(Span::raw(format!("Search: {}", state.query)))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + "Search: ".len() as u16 + state.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let hints: &[(&str, &str)] = match (&self.screen, &self.mode) {
            (_, Mode::AddingBird(_) | Mode::EditingBird { .. }) => &[
                ("[Tab]", " Next Field   "),
                ("[←→]", " Species   "),
                ("[Enter]", " Save   "),
                ("[Esc]", " Cancel"),
            ],
            (_, Mode::ConfirmDelete(_)) => &[("[y]", " Delete   "), ("[n]", " Keep")],
            (_, Mode::Searching(_)) => &[
                ("[↑↓]", " Select   "),
                ("[Enter]", " Keep Results   "),
                ("[Esc]", " Clear"),
            ],
            (Screen::Statistics(_), _) => &[("[t/Esc]", " Back   "), ("[q]", " Quit")],
            (Screen::Birds, Mode::Normal) => &[
                ("[↑↓]", " Select   "),
                ("[PgUp/PgDn]", " Page   "),
                ("[+]", " Add   "),
                ("[e]", " Edit   "),
                ("[-]", " Delete   "),
                ("[f]", " Search   "),
                ("[s]", " Species   "),
                ("[o]", " Z-A   "),
                ("[t]", " Stats   "),
                ("[q]", " Quit"),
            ],
        };

        let spans: Vec<Span<'static>> = hints
            .iter()
            .flat_map(|(key, text)| [Span::styled(*key, key_style), Span::raw(*text)])
            .collect();
        Line::from(spans)
    }

    fn draw_bird_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &BirdForm) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![
            form.build_line("Name", BirdField::Name),
            form.build_line("Info", BirdField::Info),
            form.build_line("Species", BirdField::Species),
            Line::from(""),
        ];

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to save • Tab to switch • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let (prefix, row) = match form.active {
            BirdField::Name => ("Name: ", 0),
            BirdField::Info => ("Info: ", 1),
            BirdField::Species => return,
        };
        let cursor_x = inner.x + prefix.len() as u16 + form.value_len(form.active) as u16;
        frame.set_cursor_position((cursor_x, inner.y + row));
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmBirdDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Confirm Delete").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!("Delete {}?", confirm.name)),
            Line::from("Its details, observations and habitats go with it."),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn notify(&mut self, notice: Notice) {
        self.set_status(notice.message, notice.severity.into());
    }

    /// Re-run the current view and rebuild the visible page. With `focus_id`
    /// the page jumps to wherever that bird landed.
    fn reload(&mut self, focus_id: Option<i64>) {
        let birds = match self.controller.handle(self.view.command()) {
            Response::Birds(birds) => birds,
            Response::Notice(notice) => {
                self.notify(notice);
                return;
            }
            _ => return,
        };

        let size = self.page_size as usize;
        let focus = focus_id.and_then(|id| birds.iter().position(|b| b.id == id));
        if let Some(idx) = focus {
            self.page.page = (idx / size) as i64 + 1;
            self.selected = idx % size;
        }

        let last_page = birds.len().div_ceil(size).max(1) as i64;
        let page = self.page.page.clamp(1, last_page);
        self.page = query::page_of(&birds, page, self.page_size);

        if self.selected >= self.page.items.len() {
            self.selected = self.page.items.len().saturating_sub(1);
        }
        self.sync_selection();
    }

    fn reset_to_first_page(&mut self) {
        self.page.page = 1;
        self.selected = 0;
        self.reload(None);
    }

    fn change_page(&mut self, offset: i64) {
        let last_page = self.page.total_pages.max(1) as i64;
        let target = (self.page.page + offset).clamp(1, last_page);
        if target == self.page.page {
            return;
        }
        self.page.page = target;
        self.selected = 0;
        self.reload(None);
    }

    fn move_selection(&mut self, offset: isize) {
        let len = self.page.items.len();
        if len == 0 {
            return;
        }
        let next = (self.selected as isize + offset).clamp(0, len as isize - 1);
        self.selected = next as usize;
        self.sync_selection();
    }

    /// Keep the controller's selection in step with the highlighted row.
    fn sync_selection(&mut self) {
        let Some(id) = self.current_bird().map(|b| b.id) else {
            return;
        };
        if let Response::Notice(notice) = self.controller.handle(Command::Select(id)) {
            self.notify(notice);
        }
    }

    fn current_bird(&self) -> Option<&Bird> {
        self.page.items.get(self.selected)
    }
}

//! Status Kanban board.
//!
//! Tasks are laid out in one column per status. Cards move between columns
//! with Ctrl+Left/Right, and every change goes through the repository so the
//! board never edits the registry file directly.

use std::collections::BTreeSet;
use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::error::ProviderResult;
use crate::fields::*;
use crate::repository::TaskRepository;
use crate::task::Task;
use crate::tui::colors::{status_color, GOLD};

const COLUMN_COUNT: usize = Status::ALL.len();

/// Board state. `columns` hold indexes into `tasks`.
pub struct BoardApp {
    repo: TaskRepository,
    tasks: Vec<Task>,
    columns: [Vec<usize>; COLUMN_COUNT],
    selected_column: usize,
    selected_card: usize,
    column_scroll_offsets: [usize; COLUMN_COUNT],
    status_message: String,
    show_task_detail: bool,
    show_closed: bool,
    category_filter: Option<Category>,
    filter_active: bool,
    filter_text: String,
}

impl BoardApp {
    pub fn new(repo: TaskRepository) -> ProviderResult<Self> {
        let tasks = repo.find_all()?;
        let mut app = BoardApp {
            repo,
            tasks,
            columns: Default::default(),
            selected_column: 0,
            selected_card: 0,
            column_scroll_offsets: [0; COLUMN_COUNT],
            status_message: String::new(),
            show_task_detail: false,
            show_closed: true,
            category_filter: None,
            filter_active: false,
            filter_text: String::new(),
        };
        app.update_columns();
        Ok(app)
    }

    /// Re-read tasks from the repository and rebuild the columns.
    fn reload(&mut self) {
        match self.repo.find_all() {
            Ok(tasks) => self.tasks = tasks,
            Err(e) => self.set_status_message(format!("Error loading tasks: {e}")),
        }
        self.update_columns();
    }

    /// Update the task columns based on current filters
    fn update_columns(&mut self) {
        for (i, column) in self.columns.iter_mut().enumerate() {
            column.clear();
            self.column_scroll_offsets[i] = 0;
        }

        for (i, task) in self.tasks.iter().enumerate() {
            if task.status.is_closed() && !self.show_closed {
                continue;
            }
            if let Some(category) = self.category_filter {
                if task.category != category {
                    continue;
                }
            }
            if !self.filter_text.is_empty() && !task.matches_text(&self.filter_text) {
                continue;
            }
            self.columns[column_of(task.status)].push(i);
        }

        self.clamp_selection();
    }

    /// Ensure selected column and card indices are valid
    fn clamp_selection(&mut self) {
        if self.selected_column >= COLUMN_COUNT {
            self.selected_column = 0;
        }
        let column_len = self.columns[self.selected_column].len();
        if column_len == 0 {
            self.selected_card = 0;
        } else if self.selected_card >= column_len {
            self.selected_card = column_len - 1;
        }
    }

    fn selected_task(&self) -> Option<&Task> {
        self.columns[self.selected_column]
            .get(self.selected_card)
            .and_then(|&i| self.tasks.get(i))
    }

    fn set_status_message(&mut self, msg: String) {
        self.status_message = msg;
    }

    fn clear_status_message(&mut self) {
        self.status_message.clear();
    }

    fn visible_count(&self) -> usize {
        self.columns.iter().map(|col| col.len()).sum()
    }

    /// Move the selected card to `status`, keeping it selected.
    fn apply_status(&mut self, status: Status) {
        let Some(id) = self.selected_task().map(|t| t.id.clone()) else {
            return;
        };
        let result = match status {
            Status::InProgress => self.repo.start(&id),
            Status::Completed => self.repo.complete(&id),
            Status::Blocked => self.repo.block(&id),
            Status::Cancelled => self.repo.cancel(&id),
            Status::Pending => self.repo.provider().set_status(&id, status),
        };
        match result {
            Ok(task) => {
                self.reload();
                self.selected_column = column_of(task.status);
                let position = self.columns[self.selected_column]
                    .iter()
                    .position(|&i| self.tasks[i].id == task.id);
                match position {
                    Some(pos) => self.selected_card = pos,
                    None => self.clamp_selection(),
                }
                self.set_status_message(format!("{} moved to {}", task.id, task.status));
            }
            Err(e) => self.set_status_message(format!("Error saving: {e}")),
        }
    }

    fn move_card(&mut self, forward: bool) {
        let target = if forward {
            self.selected_column + 1
        } else {
            match self.selected_column.checked_sub(1) {
                Some(t) => t,
                None => return,
            }
        };
        if let Some(&status) = Status::ALL.get(target) {
            self.apply_status(status);
        }
    }

    /// Cycle the category filter through the categories that have tasks.
    fn cycle_category(&mut self) {
        let present: Vec<Category> = self
            .tasks
            .iter()
            .map(|t| t.category)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        self.category_filter = match self.category_filter {
            None => present.first().copied(),
            Some(current) => present.iter().copied().find(|c| *c > current),
        };
        self.update_columns();
        let label = self
            .category_filter
            .map(|c| c.display_name().to_string())
            .unwrap_or_else(|| "all categories".to_string());
        self.set_status_message(format!("Showing {label}"));
    }

    /// Apply one key press. Returns `true` when the board should close.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.filter_active {
            match key.code {
                KeyCode::Esc => {
                    self.filter_active = false;
                    self.filter_text.clear();
                    self.update_columns();
                    self.clear_status_message();
                }
                KeyCode::Enter => {
                    self.filter_active = false;
                    if self.filter_text.is_empty() {
                        self.set_status_message("Filter cleared".to_string());
                    } else {
                        self.set_status_message(format!(
                            "Filter: '{}' ({} tasks shown)",
                            self.filter_text,
                            self.visible_count()
                        ));
                    }
                }
                KeyCode::Backspace => {
                    if self.filter_text.pop().is_some() {
                        self.update_columns();
                    }
                }
                KeyCode::Char(c) => {
                    self.filter_text.push(c);
                    self.update_columns();
                }
                _ => {}
            }
            return false;
        }

        if self.show_task_detail {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                self.show_task_detail = false;
            }
            return false;
        }

        self.clear_status_message();
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('c') if ctrl => return true,
            KeyCode::Esc => return true,

            KeyCode::Left if ctrl => self.move_card(false),
            KeyCode::Right if ctrl => self.move_card(true),

            KeyCode::Left => {
                if self.selected_column > 0 {
                    self.selected_column -= 1;
                    self.clamp_selection();
                }
            }
            KeyCode::Right => {
                if self.selected_column < COLUMN_COUNT - 1 {
                    self.selected_column += 1;
                    self.clamp_selection();
                }
            }
            KeyCode::Up => {
                self.selected_card = self.selected_card.saturating_sub(1);
            }
            KeyCode::Down => {
                let column_len = self.columns[self.selected_column].len();
                if self.selected_card + 1 < column_len {
                    self.selected_card += 1;
                }
            }

            KeyCode::Enter => {
                self.show_task_detail = self.selected_task().is_some();
            }
            KeyCode::Char('s') => self.apply_status(Status::InProgress),
            KeyCode::Char('c') => self.apply_status(Status::Completed),
            KeyCode::Char('b') => self.apply_status(Status::Blocked),
            KeyCode::Char('x') => self.apply_status(Status::Cancelled),
            KeyCode::Tab => self.cycle_category(),
            KeyCode::Char('r') => {
                self.repo.refresh();
                self.reload();
                self.set_status_message(format!("Reloaded {} tasks", self.tasks.len()));
            }
            KeyCode::Char('t') => {
                self.show_closed = !self.show_closed;
                self.update_columns();
                let msg = if self.show_closed {
                    "Showing completed and cancelled tasks"
                } else {
                    "Hiding completed and cancelled tasks"
                };
                self.set_status_message(msg.to_string());
            }
            KeyCode::Char('/') => {
                self.filter_active = true;
                self.set_status_message("Filter: type to search id/title/description".to_string());
            }
            KeyCode::Char('h') => {
                self.set_status_message(
                    "Enter: Details | Ctrl+←/→: Move | s/c/b/x: Start/Complete/Block/Cancel | Tab: Category | /: Filter | r: Reload | t: Toggle closed | Esc: Exit"
                        .to_string(),
                );
            }
            _ => {}
        }
        false
    }

    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(self.handle_key(key));
                }
            }
        }
        Ok(false)
    }

    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Board
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        self.render_board(f, chunks[1]);
        self.render_status_bar(f, chunks[2]);

        if self.show_task_detail {
            self.render_task_detail_popup(f);
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let category = self
            .category_filter
            .map(|c| c.display_name().to_string())
            .unwrap_or_else(|| "All categories".to_string());
        let store = self.repo.provider().kind();

        let header_text = vec![Line::from(vec![
            Span::styled("TASK BOARD", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                format!("{category}  ({store} store)"),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ])];

        let header_block = Paragraph::new(header_text)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        f.render_widget(header_block, area);
    }

    fn render_board(&mut self, f: &mut Frame, area: Rect) {
        let constraints: Vec<Constraint> = (0..COLUMN_COUNT)
            .map(|_| Constraint::Ratio(1, COLUMN_COUNT as u32))
            .collect();

        let columns_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        for (i, &column_area) in columns_layout.iter().enumerate() {
            self.render_column(f, column_area, i);
        }
    }

    fn render_column(&mut self, f: &mut Frame, area: Rect, column_index: usize) {
        let status = Status::ALL[column_index];
        let is_selected = column_index == self.selected_column;
        let color = status_color(status);

        let border_style = if is_selected {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let title = format!("{} ({})", status.as_str(), self.columns[column_index].len());
        let block = Block::default().borders(Borders::ALL).title(title).border_style(border_style);

        let inner = block.inner(area);
        f.render_widget(block, area);

        let cards = &self.columns[column_index];
        if cards.is_empty() {
            return;
        }

        let card_height = 5;
        let available_height = inner.height as usize;
        let visible_cards = available_height / card_height;

        let scroll_offset = if is_selected {
            let start_visible = self.column_scroll_offsets[column_index];
            let end_visible = start_visible + visible_cards;
            if self.selected_card < start_visible {
                self.column_scroll_offsets[column_index] = self.selected_card;
                self.selected_card
            } else if self.selected_card >= end_visible && visible_cards > 0 {
                let new_offset = self.selected_card + 1 - visible_cards;
                self.column_scroll_offsets[column_index] = new_offset;
                new_offset
            } else {
                start_visible
            }
        } else {
            self.column_scroll_offsets[column_index]
        };

        let mut current_y = 0;
        let mut rendered_cards = 0;
        for (card_index, &task_index) in cards.iter().enumerate().skip(scroll_offset) {
            if current_y + card_height > available_height {
                break;
            }
            let task = &self.tasks[task_index];
            let card_area = Rect {
                x: inner.x,
                y: inner.y + current_y as u16,
                width: inner.width,
                height: card_height as u16,
            };
            render_card(f, card_area, task, is_selected && card_index == self.selected_card);
            current_y += card_height;
            rendered_cards += 1;
        }

        if scroll_offset > 0 {
            let indicator = Paragraph::new(format!("▲ +{scroll_offset} above")).style(Style::default().fg(Color::Cyan));
            f.render_widget(indicator, Rect { height: 1, ..inner });
        }
        let remaining = cards.len().saturating_sub(scroll_offset + rendered_cards);
        if remaining > 0 && inner.height > 0 {
            let indicator = Paragraph::new(format!("▼ +{remaining} below")).style(Style::default().fg(Color::Cyan));
            f.render_widget(
                indicator,
                Rect {
                    y: inner.y + inner.height - 1,
                    height: 1,
                    ..inner
                },
            );
        }
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let status_text = if self.filter_active {
            format!("Filter: {} | Enter to apply, Esc to cancel", self.filter_text)
        } else if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            let closed = if self.show_closed { "" } else { " [closed hidden]" };
            let filter = if self.filter_text.is_empty() {
                String::new()
            } else {
                format!(" [Filter: {}]", self.filter_text)
            };
            format!(
                "Tasks: {}{closed}{filter} | Ctrl+←/→: Move | Tab: Category | /: Filter | h: Help",
                self.visible_count()
            )
        };

        let status = Paragraph::new(status_text)
            .style(Style::default().bg(GOLD).fg(Color::Rgb(20, 20, 20)))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    fn render_task_detail_popup(&self, f: &mut Frame) {
        let Some(task) = self.selected_task() else {
            return;
        };

        let popup_area = {
            let area = f.area();
            let popup_width = (area.width * 80) / 100;
            let popup_height = (area.height * 80) / 100;
            let x = (area.width - popup_width) / 2;
            let y = (area.height - popup_height) / 2;
            Rect::new(x, y, popup_width, popup_height)
        };
        f.render_widget(Clear, popup_area);

        let dash = || "-".to_string();
        let mut detail_lines = vec![
            Line::from(vec![Span::styled(
                format!("{}: {}", task.id, task.title),
                Style::default().add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(format!("Category:     {}", task.category.display_name())),
            Line::from(format!("Status:       {}", task.status)),
            Line::from(format!("Priority:     {}", task.priority)),
            Line::from(format!("Assignee:     {}", task.assignee.clone().unwrap_or_else(dash))),
            Line::from(format!("Estimate:     {}", task.estimated_effort.clone().unwrap_or_else(dash))),
            Line::from(format!(
                "Depends on:   {}",
                if task.dependencies.is_empty() { dash() } else { task.dependencies.join(", ") }
            )),
            Line::from(format!(
                "Progress:     {}",
                task.progress
                    .map(|p| format!("{}/{} ({}%)", p.completed, p.total, p.percentage))
                    .unwrap_or_else(dash)
            )),
            Line::from(""),
            Line::from("Description:"),
            Line::from(if task.description.is_empty() { dash() } else { task.description.clone() }),
        ];

        for (key, body) in &task.sections {
            detail_lines.push(Line::from(""));
            detail_lines.push(Line::from(Span::styled(
                key.heading(),
                Style::default().add_modifier(Modifier::UNDERLINED),
            )));
            detail_lines.extend(body.lines().map(|l| Line::from(l.to_string())));
        }

        let popup_block = Block::default()
            .borders(Borders::ALL)
            .title("Task Details (Enter to close)")
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(status_color(task.status)).add_modifier(Modifier::BOLD));

        let popup_paragraph = Paragraph::new(detail_lines)
            .block(popup_block)
            .wrap(Wrap { trim: false })
            .style(Style::default().bg(Color::Black));

        f.render_widget(popup_paragraph, popup_area);
    }

    /// Main event loop
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;
            if self.handle_input()? {
                break;
            }
        }
        Ok(())
    }
}

fn column_of(status: Status) -> usize {
    Status::ALL.iter().position(|s| *s == status).unwrap_or(0)
}

fn render_card(f: &mut Frame, area: Rect, task: &Task, is_selected: bool) {
    let color = status_color(task.status);
    let style = if is_selected {
        Style::default().bg(color).fg(Color::Black).add_modifier(Modifier::BOLD)
    } else {
        Style::default().bg(Color::DarkGray)
    };

    let mut card_text = vec![Line::from(task.id.clone())];

    // Word-wrap the title to at most two lines.
    let available_width = area.width.saturating_sub(2) as usize;
    let mut current_line = String::new();
    let mut lines = Vec::new();
    for word in task.title.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= available_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
            if lines.len() >= 2 {
                break;
            }
        }
    }
    if !current_line.is_empty() && lines.len() < 2 {
        lines.push(current_line);
    }
    card_text.extend(lines.into_iter().map(Line::from));

    let progress = task.progress.map(|p| format!(" {}%", p.percentage)).unwrap_or_default();
    card_text.push(Line::from(format!("{}{progress}", task.priority)));

    let card_block = Paragraph::new(card_text)
        .block(Block::default().borders(Borders::ALL))
        .style(style)
        .wrap(Wrap { trim: true });
    f.render_widget(card_block, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryProvider;
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    fn board() -> BoardApp {
        let repo = TaskRepository::new(Arc::new(InMemoryProvider::seeded()));
        BoardApp::new(repo).unwrap()
    }

    fn press(app: &mut BoardApp, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(app: &mut BoardApp, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::CONTROL))
    }

    fn column_ids(app: &BoardApp, status: Status) -> Vec<String> {
        app.columns[column_of(status)].iter().map(|&i| app.tasks[i].id.clone()).collect()
    }

    #[test]
    fn tasks_are_grouped_by_status() {
        let app = board();
        assert_eq!(column_ids(&app, Status::Pending), vec!["TASK-FEAT-003", "TASK-DOC-001", "TASK-SEC-001"]);
        assert_eq!(column_ids(&app, Status::Blocked), vec!["TASK-BUG-001"]);
        assert_eq!(column_ids(&app, Status::Completed), vec!["TASK-FEAT-001"]);
    }

    #[test]
    fn ctrl_right_moves_card_to_next_status() {
        let mut app = board();
        assert!(!ctrl(&mut app, KeyCode::Right));
        assert_eq!(app.selected_column, column_of(Status::InProgress));
        assert!(column_ids(&app, Status::InProgress).contains(&"TASK-FEAT-003".to_string()));
        let stored = app.repo.find_by_id("TASK-FEAT-003").unwrap().unwrap();
        assert_eq!(stored.status, Status::InProgress);
    }

    #[test]
    fn ctrl_left_in_first_column_is_a_no_op() {
        let mut app = board();
        ctrl(&mut app, KeyCode::Left);
        assert_eq!(column_ids(&app, Status::Pending).len(), 3);
    }

    #[test]
    fn shortcut_keys_change_status() {
        let mut app = board();
        press(&mut app, KeyCode::Char('b'));
        assert_eq!(app.selected_task().unwrap().status, Status::Blocked);
        press(&mut app, KeyCode::Char('c'));
        assert_eq!(app.selected_task().unwrap().status, Status::Completed);
    }

    #[test]
    fn toggling_closed_hides_terminal_columns() {
        let mut app = board();
        press(&mut app, KeyCode::Char('t'));
        assert!(column_ids(&app, Status::Completed).is_empty());
        press(&mut app, KeyCode::Char('t'));
        assert_eq!(column_ids(&app, Status::Completed).len(), 1);
    }

    #[test]
    fn tab_cycles_categories_then_back_to_all() {
        let mut app = board();
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.category_filter, Some(Category::Feat));
        assert_eq!(app.visible_count(), 3);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.category_filter, Some(Category::Sec));
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.category_filter, None);
        assert_eq!(app.visible_count(), 6);
    }

    #[test]
    fn text_filter_narrows_cards() {
        let mut app = board();
        press(&mut app, KeyCode::Char('/'));
        for ch in "guide".chars() {
            press(&mut app, KeyCode::Char(ch));
        }
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.visible_count(), 1);
        assert!(!app.filter_active);
    }

    #[test]
    fn escape_quits_and_closes_popup_first() {
        let mut app = board();
        press(&mut app, KeyCode::Enter);
        assert!(app.show_task_detail);
        assert!(!press(&mut app, KeyCode::Esc));
        assert!(!app.show_task_detail);
        assert!(press(&mut app, KeyCode::Esc));
    }

    #[test]
    fn renders_every_status_column() {
        let mut app = board();
        let mut terminal = Terminal::new(TestBackend::new(160, 40)).unwrap();
        terminal.draw(|f| app.render(f)).unwrap();
        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        for status in Status::ALL {
            assert!(text.contains(status.as_str()), "missing column {status}");
        }
        assert!(text.contains("TASK BOARD"));
    }
}

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::wrap;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::api::{ListOptions, Post};
use crate::browser::{AppState, Browser, EditState, RenderMode};
use crate::form::Form;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_LIKE: Color = Color::Rgb(243, 139, 168);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const HIGHLIGHT_SYMBOL: &str = "▌ ";
const FIELD_LABEL_WIDTH: usize = 9;
const CURSOR: &str = "▏";

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Popup {
    BaseUrl(Form),
    AddPost,
    Search,
}

impl Popup {
    fn title(&self) -> &'static str {
        match self {
            Popup::BaseUrl(_) => "API Base URL",
            Popup::AddPost => "Add Post",
            Popup::Search => "Search Posts",
        }
    }

    fn submit_label(&self) -> &'static str {
        match self {
            Popup::BaseUrl(_) => "load posts",
            Popup::AddPost => "add post",
            Popup::Search => "search",
        }
    }
}

fn tail_to_width(value: &str, max: usize) -> String {
    if UnicodeWidthStr::width(value) <= max {
        return value.to_string();
    }
    let mut kept: Vec<char> = Vec::new();
    let mut used = 0;
    for ch in value.chars().rev() {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + width + 1 > max {
            break;
        }
        used += width;
        kept.push(ch);
    }
    kept.reverse();
    format!("…{}", kept.into_iter().collect::<String>())
}

fn form_lines(form: &Form, width: usize) -> Vec<Line<'static>> {
    let value_width = width.saturating_sub(FIELD_LABEL_WIDTH + 4).max(1);
    form.fields()
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let active = index == form.active();
            let marker = if active { "▸ " } else { "  " };
            let label = format!("{:<width$}", field.label, width = FIELD_LABEL_WIDTH);
            let label_style = if active {
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(COLOR_TEXT_SECONDARY)
            };
            let mut spans = vec![
                Span::styled(marker, Style::default().fg(COLOR_ACCENT)),
                Span::styled(label, label_style),
                Span::styled(
                    tail_to_width(&field.value, value_width),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                ),
            ];
            if active {
                spans.push(Span::styled(CURSOR, Style::default().fg(COLOR_ACCENT)));
            }
            Line::from(spans)
        })
        .collect()
}

fn action_spans(key: &str, label: &str) -> Vec<Span<'static>> {
    vec![
        Span::styled(
            format!("[{key}]"),
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {label}  "),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ),
    ]
}

fn likes_span(likes: i64) -> Span<'static> {
    Span::styled(format!("♥ {likes}   "), Style::default().fg(COLOR_LIKE))
}

pub fn post_lines(
    post: &Post,
    mode: RenderMode,
    editing: Option<&EditState>,
    width: usize,
) -> Vec<Line<'static>> {
    let width = width.max(10);
    let mut lines = Vec::new();

    if let Some(edit) = editing {
        lines.extend(form_lines(&edit.form, width));
        let mut footer = vec![likes_span(post.likes)];
        footer.extend(action_spans("Enter", "Update post"));
        footer.extend(action_spans("Esc", "Cancel"));
        lines.push(Line::from(footer));
    } else {
        lines.push(Line::from(Span::styled(
            post.title.clone(),
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        )));
        for row in wrap(&post.content, width) {
            lines.push(Line::from(Span::styled(
                row.into_owned(),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            )));
        }
        let label = Style::default()
            .fg(COLOR_TEXT_SECONDARY)
            .add_modifier(Modifier::BOLD);
        lines.push(Line::from(vec![
            Span::styled("Author: ", label),
            Span::raw(post.author.clone()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Date: ", label),
            Span::raw(post.date.clone()),
        ]));
        let mut footer = vec![likes_span(post.likes)];
        footer.extend(action_spans("l", "Like"));
        footer.extend(action_spans("x", "Delete"));
        if mode == RenderMode::Editable {
            footer.extend(action_spans("e", "Edit"));
        }
        lines.push(Line::from(footer));
    }

    lines.push(Line::from(""));
    lines
}

fn posts_title(state: &AppState) -> String {
    match state.mode {
        RenderMode::Editable => format!(
            "Posts · sort: {} {}",
            state.sort_key.as_str(),
            state.sort_direction.as_str()
        ),
        RenderMode::ReadOnly => "Search results".to_string(),
    }
}

fn draw_posts(frame: &mut Frame<'_>, area: Rect, state: &AppState, list_state: &mut ListState) {
    let block = Block::default()
        .title(Span::styled(
            posts_title(state),
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(COLOR_BORDER_FOCUSED))
        .style(Style::default().bg(COLOR_PANEL_BG))
        .padding(Padding::uniform(1));

    if state.posts.is_empty() {
        let message = if state.base_url.is_empty() {
            "No API base URL yet. Press b to set one."
        } else {
            "No posts to show. Press a to add one or r to reload."
        };
        let empty = Paragraph::new(message)
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let width = (block.inner(area).width as usize)
        .saturating_sub(UnicodeWidthStr::width(HIGHLIGHT_SYMBOL));
    let items: Vec<ListItem> = state
        .posts
        .iter()
        .map(|post| {
            ListItem::new(post_lines(
                post,
                state.mode,
                state.editing_post(post.id),
                width,
            ))
        })
        .collect();
    list_state.select(Some(state.selected.min(state.posts.len() - 1)));

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(COLOR_PANEL_SELECTED_BG))
        .highlight_symbol(HIGHLIGHT_SYMBOL);
    frame.render_stateful_widget(list, area, list_state);
}

fn draw_form_popup(frame: &mut Frame<'_>, area: Rect, popup: &Popup, form: &Form, hint: &str) {
    let popup_area = centered_rect(70, 50, area);
    frame.render_widget(Clear, popup_area);
    let mut lines = form_lines(form, popup_area.width.saturating_sub(4) as usize);
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!(
            "Enter {} · Tab/Shift-Tab change field · Del clear field · Esc close",
            popup.submit_label()
        ),
        Style::default()
            .fg(COLOR_TEXT_SECONDARY)
            .add_modifier(Modifier::ITALIC),
    )));
    if !hint.is_empty() {
        lines.push(Line::from(Span::styled(
            hint.to_string(),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )));
    }
    let body = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .title(Span::styled(
                    popup.title(),
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(COLOR_ACCENT))
                .style(Style::default().bg(COLOR_PANEL_BG))
                .padding(Padding::uniform(1)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(body, popup_area);
}

fn draw_alert(frame: &mut Frame<'_>, area: Rect, message: &str) {
    let popup_area = centered_rect(50, 30, area);
    frame.render_widget(Clear, popup_area);
    let text = Text::from(vec![
        Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(COLOR_TEXT_PRIMARY),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press Enter to continue.",
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::ITALIC),
        )),
    ]);
    let alert = Paragraph::new(text)
        .block(
            Block::default()
                .title(Span::styled(
                    "Alert",
                    Style::default()
                        .fg(COLOR_ERROR)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(COLOR_ERROR))
                .style(Style::default().bg(COLOR_PANEL_BG))
                .padding(Padding::uniform(1)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(alert, popup_area);
}

fn edit_form(form: &mut Form, code: KeyCode) -> bool {
    match code {
        KeyCode::Tab | KeyCode::Down => form.next(),
        KeyCode::BackTab | KeyCode::Up => form.previous(),
        KeyCode::Backspace => form.backspace(),
        KeyCode::Delete => form.clear_active(),
        KeyCode::Char(ch) => form.insert_char(ch),
        _ => return false,
    }
    true
}

pub struct Options {
    pub browser: Browser,
    pub config_path: String,
    pub log_path: Option<String>,
}

pub struct Model {
    browser: Browser,
    popup: Option<Popup>,
    list_state: ListState,
    spinner: Spinner,
    needs_redraw: bool,
    config_path: String,
    log_path: Option<String>,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let popup = if opts.browser.state().base_url.is_empty() {
            Some(Popup::BaseUrl(Form::base_url("")))
        } else {
            None
        };
        Self {
            browser: opts.browser,
            popup,
            list_state: ListState::default(),
            spinner: Spinner::new(),
            needs_redraw: true,
            config_path: opts.config_path,
            log_path: opts.log_path,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.browser.poll() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key) {
                            break;
                        }
                        self.mark_dirty();
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.browser.is_busy() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        if self.browser.state().alert.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                self.browser.dismiss_alert();
            }
            return false;
        }

        if self.popup.is_some() {
            self.handle_popup_key(key.code);
            return false;
        }

        if self.browser.state().editing.is_some() {
            self.handle_edit_key(key.code);
            return false;
        }

        self.handle_list_key(key.code)
    }

    fn popup_form_mut(&mut self) -> Option<&mut Form> {
        match self.popup.as_mut()? {
            Popup::BaseUrl(form) => Some(form),
            Popup::AddPost => Some(&mut self.browser.state_mut().add_form),
            Popup::Search => Some(&mut self.browser.state_mut().search_form),
        }
    }

    fn handle_popup_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => self.popup = None,
            KeyCode::Enter => self.submit_popup(),
            _ => {
                if let Some(form) = self.popup_form_mut() {
                    edit_form(form, code);
                }
            }
        }
    }

    fn submit_popup(&mut self) {
        let Some(popup) = self.popup.take() else {
            return;
        };
        match popup {
            Popup::BaseUrl(form) => {
                self.browser.set_base_url(form.value(0));
                if self.browser.state().base_url.is_empty() {
                    self.popup = Some(Popup::BaseUrl(form));
                    return;
                }
                self.browser.load_list(ListOptions::default());
            }
            Popup::AddPost => self.browser.add_post(),
            Popup::Search => self.browser.search_posts(),
        }
    }

    fn handle_edit_key(&mut self, code: KeyCode) {
        let Some(post_id) = self.browser.state().editing.as_ref().map(|edit| edit.post_id) else {
            return;
        };
        match code {
            KeyCode::Esc => self.browser.cancel_edit(),
            KeyCode::Enter => self.browser.update_post(post_id),
            _ => {
                if let Some(edit) = self.browser.state_mut().editing.as_mut() {
                    edit_form(&mut edit.form, code);
                }
            }
        }
    }

    fn require_base_url(&mut self) -> bool {
        if self.browser.state().base_url.is_empty() {
            self.popup = Some(Popup::BaseUrl(Form::base_url("")));
            return false;
        }
        true
    }

    fn handle_list_key(&mut self, code: KeyCode) -> bool {
        let selected = self.browser.state().selected_post().map(|post| post.id);
        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('j') | KeyCode::Down => self.browser.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.browser.move_selection(-1),
            KeyCode::Char('g') | KeyCode::Home => self.browser.move_selection(i32::MIN),
            KeyCode::Char('G') | KeyCode::End => self.browser.move_selection(i32::MAX),
            KeyCode::Char('b') => {
                let current = self.browser.state().base_url.clone();
                self.popup = Some(Popup::BaseUrl(Form::base_url(&current)));
            }
            KeyCode::Char('a') => {
                if self.require_base_url() {
                    self.popup = Some(Popup::AddPost);
                }
            }
            KeyCode::Char('/') => {
                if self.require_base_url() {
                    self.popup = Some(Popup::Search);
                }
            }
            KeyCode::Char('r') => {
                if self.require_base_url() {
                    self.browser.load_list(ListOptions::default());
                }
            }
            KeyCode::Char('s') => {
                if self.require_base_url() {
                    let state = self.browser.state_mut();
                    state.sort_key = state.sort_key.next();
                    self.browser.sort_posts();
                }
            }
            KeyCode::Char('S') => {
                if self.require_base_url() {
                    let state = self.browser.state_mut();
                    state.sort_direction = state.sort_direction.flip();
                    self.browser.sort_posts();
                }
            }
            KeyCode::Char('l') => {
                if let Some(id) = selected {
                    self.browser.like_post(id);
                }
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                if let Some(id) = selected {
                    self.browser.delete_post(id);
                }
            }
            KeyCode::Char('e') => {
                if let Some(id) = selected {
                    self.browser.enter_edit(id);
                }
            }
            _ => {}
        }
        false
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let state = self.browser.state();
        let status_text = if self.browser.is_busy() {
            format!("{} {}", self.spinner.frame(), state.status)
        } else {
            state.status.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        draw_posts(frame, layout[1], state, &mut self.list_state);

        let footer = Paragraph::new(footer_text(state, self.popup.as_ref()))
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);

        if let Some(popup) = self.popup.as_ref() {
            match popup {
                Popup::BaseUrl(form) => {
                    let mut hint = format!("Config: {}", self.config_path);
                    if let Some(log) = &self.log_path {
                        hint.push_str(&format!(" · Log: {log}"));
                    }
                    draw_form_popup(frame, layout[1], popup, form, &hint);
                }
                Popup::AddPost => draw_form_popup(frame, layout[1], popup, &state.add_form, ""),
                Popup::Search => {
                    draw_form_popup(frame, layout[1], popup, &state.search_form, "")
                }
            }
        }

        if let Some(message) = &state.alert {
            draw_alert(frame, layout[1], message);
        }
    }
}

fn footer_text(state: &AppState, popup: Option<&Popup>) -> String {
    if state.alert.is_some() {
        return "Enter dismiss".to_string();
    }
    if popup.is_some() {
        return "Type to edit · Tab next field · Enter submit · Esc close".to_string();
    }
    if state.editing.is_some() {
        return "Editing: Tab/Shift-Tab change field · Enter update post · Esc cancel".to_string();
    }

    let mut parts: Vec<&str> = Vec::new();
    if !state.posts.is_empty() {
        parts.push("j/k move");
        parts.push("l like");
        parts.push("x delete");
        if state.mode == RenderMode::Editable {
            parts.push("e edit");
        }
    }
    parts.push("a add");
    parts.push("/ search");
    parts.push("s sort key");
    parts.push("S direction");
    parts.push("r reload");
    parts.push("b base URL");
    parts.push("q quit");
    parts.join(" · ")
}

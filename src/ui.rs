use std::cell::Cell;
use std::io::{self, Stdout, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crossterm::cursor::Show;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::config::Labels;
use crate::feed::{Feed, Item};
use crate::humanize;
use crate::navigator::{self, Activation, Cursor, Effect, Input, State};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);

// Title line plus attribution line.
const ITEM_HEIGHT: u16 = 2;
const HELP_TEXT: &str = "j/k: move  g/G: first/last  o/Enter: open  q: quit";
const EMPTY_TEXT: &str = "This feed has no items. Press q to quit.";

pub trait Browser {
    fn open(&self, url: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        webbrowser::open(url).with_context(|| format!("open {url} in a browser"))
    }
}

pub struct Options<B> {
    pub username: String,
    pub feed: Feed,
    pub labels: Labels,
    pub activation: Activation,
    pub browser: B,
}

pub struct Model<B> {
    username: String,
    feed: Feed,
    labels: Labels,
    activation: Activation,
    browser: B,
    cursor: Cursor,
    pending_open: Option<usize>,
    list_area: Cell<Rect>,
    list_offset: Cell<usize>,
}

impl<B: Browser> Model<B> {
    pub fn new(opts: Options<B>) -> Self {
        Self {
            username: opts.username,
            feed: opts.feed,
            labels: opts.labels,
            activation: opts.activation,
            browser: opts.browser,
            cursor: Cursor::default(),
            pending_open: None,
            list_area: Cell::new(Rect::default()),
            list_offset: Cell::new(0),
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn is_exiting(&self) -> bool {
        self.cursor.state == State::Exiting
    }

    // True once the session is over.
    pub fn handle(&mut self, input: Input) -> bool {
        let (cursor, effect) =
            navigator::dispatch(self.cursor, input, self.feed.len(), self.activation);
        self.cursor = cursor;
        if let Effect::Open(index) = effect {
            self.pending_open = Some(index);
        }
        self.is_exiting()
    }

    pub fn finish(self) -> Result<()> {
        let Some(index) = self.pending_open else {
            return Ok(());
        };
        let Some(item) = self.feed.items.get(index) else {
            return Ok(());
        };
        tracing::info!(link = %item.link, "opening item");
        self.browser
            .open(&item.link)
            .context("Failed to open the link in a browser")
    }

    pub fn run(mut self) -> Result<()> {
        let guard = TerminalGuard::enter(io::stdout())?;
        let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        drop(terminal);
        drop(guard);
        result?;
        self.finish()
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        while !self.is_exiting() {
            terminal.draw(|frame| self.draw(frame))?;

            let input = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => input_for_key(key),
                Event::Mouse(mouse) => self.input_for_mouse(mouse),
                _ => None,
            };
            if let Some(input) = input {
                self.handle(input);
            }
        }
        Ok(())
    }

    fn input_for_mouse(&self, mouse: MouseEvent) -> Option<Input> {
        match mouse.kind {
            MouseEventKind::ScrollDown => Some(Input::Down),
            MouseEventKind::ScrollUp => Some(Input::Up),
            MouseEventKind::Down(MouseButton::Left) => self
                .row_at(mouse.column, mouse.row)
                .map(Input::Click),
            _ => None,
        }
    }

    fn row_at(&self, column: u16, row: u16) -> Option<usize> {
        let area = self.list_area.get();
        if column < area.x || column >= area.right() || row < area.y || row >= area.bottom() {
            return None;
        }
        let index = self.list_offset.get() + usize::from((row - area.y) / ITEM_HEIGHT);
        (index < self.feed.len()).then_some(index)
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(frame.size());

        let title = if self.feed.title.is_empty() {
            format!(" @{} ", self.username)
        } else {
            format!(" {} ", self.feed.title)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_FOCUSED))
            .title(Span::styled(
                title,
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ))
            .style(Style::default().bg(COLOR_BG));
        let inner = block.inner(chunks[0]);
        self.list_area.set(inner);

        if self.feed.is_empty() {
            let empty = Paragraph::new(EMPTY_TEXT)
                .style(Style::default().fg(COLOR_TEXT_SECONDARY))
                .block(block);
            frame.render_widget(empty, chunks[0]);
        } else {
            let now = Utc::now();
            let items: Vec<ListItem> = self
                .feed
                .items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    ListItem::new(vec![
                        Line::from(Span::styled(
                            primary_text(index, item, self.labels),
                            Style::default().fg(COLOR_TEXT_PRIMARY),
                        )),
                        Line::from(Span::styled(
                            secondary_text(item, now),
                            Style::default().fg(COLOR_TEXT_SECONDARY),
                        )),
                    ])
                })
                .collect();
            let list = List::new(items).block(block).highlight_style(
                Style::default()
                    .bg(COLOR_PANEL_SELECTED_BG)
                    .add_modifier(Modifier::BOLD),
            );
            let mut state = ListState::default()
                .with_selected(Some(self.cursor.selected))
                .with_offset(self.list_offset.get());
            frame.render_stateful_widget(list, chunks[0], &mut state);
            self.list_offset.set(state.offset());
        }

        let help = Paragraph::new(Line::from(Span::styled(
            HELP_TEXT,
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )))
        .style(Style::default().bg(COLOR_BG));
        frame.render_widget(help, chunks[1]);
    }
}


// Restores the terminal on every exit from the session, panics included.
struct TerminalGuard<W: Write> {
    out: W,
}

impl<W: Write> TerminalGuard<W> {
    fn enter(out: W) -> Result<Self> {
        enable_raw_mode()?;
        let mut guard = Self { out };
        guard.out.execute(EnterAlternateScreen)?;
        guard.out.execute(EnableMouseCapture)?;
        Ok(guard)
    }
}

impl<W: Write> Drop for TerminalGuard<W> {
    fn drop(&mut self) {
        restore(&mut self.out);
    }
}

// Each step runs even when an earlier one fails.
fn restore(out: &mut impl Write) {
    if let Err(err) = disable_raw_mode() {
        tracing::warn!(error = %err, "Couldn't leave raw mode");
    }
    if let Err(err) = out.execute(DisableMouseCapture) {
        tracing::warn!(error = %err, "Couldn't disable mouse capture");
    }
    if let Err(err) = out.execute(LeaveAlternateScreen) {
        tracing::warn!(error = %err, "Couldn't leave the alternate screen");
    }
    if let Err(err) = out.execute(Show) {
        tracing::warn!(error = %err, "Couldn't show the cursor");
    }
}
pub fn input_for_key(key: KeyEvent) -> Option<Input> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('n') => Some(Input::Down),
            KeyCode::Char('p') => Some(Input::Up),
            KeyCode::Char('m') => Some(Input::Activate),
            KeyCode::Char('c') => Some(Input::Quit),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => Some(Input::Down),
        KeyCode::Char('k') | KeyCode::Up => Some(Input::Up),
        KeyCode::Char('g') | KeyCode::Home => Some(Input::First),
        KeyCode::Char('G') | KeyCode::End => Some(Input::Last),
        KeyCode::Char('o') | KeyCode::Enter => Some(Input::Activate),
        KeyCode::Char('q') | KeyCode::Esc => Some(Input::Quit),
        _ => None,
    }
}

pub fn label(index: usize, labels: Labels) -> String {
    match labels {
        Labels::Letters if index < 26 => format!("{}.", char::from(b'a' + index as u8)),
        _ => format!("{:02}.", index + 1),
    }
}

pub fn primary_text(index: usize, item: &Item, labels: Labels) -> String {
    format!("{} {}", label(index, labels), item.title)
}

pub fn secondary_text(item: &Item, now: DateTime<Utc>) -> String {
    let mut parts = Vec::with_capacity(2);
    let author = item.author_name();
    if !author.is_empty() {
        parts.push(format!("by {author}"));
    }
    if let Some(published) = item.published_parsed {
        parts.push(humanize::relative(published, now));
    }
    format!("    {}", parts.join(" | "))
}

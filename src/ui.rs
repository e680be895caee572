use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::Duration;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use ratatui::{
    backend::CrosstermBackend, Terminal,
    layout::{Layout, Constraint, Direction},
    widgets::{Block, Borders, Paragraph, Wrap, Clear},
    style::{Style, Color, Modifier},
    text::{Span, Line},
};
use unicode_width::UnicodeWidthStr;

use crate::api_client::Product;
use crate::history::{format_timestamp, HistoryEntry, HistoryStore};

#[derive(Clone, Copy)]
pub enum Theme { Dark, Light }

impl Theme {
    fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

pub enum UiEvent {
    Results { keyword: String, products: Vec<Product> },
    SearchFailed { keyword: String, error: String },
}

struct UiState {
    input: String,
    products: Vec<Product>,
    last_keyword: Option<String>,
    searching: bool,
    status: Option<String>,
    error: Option<(String, String)>, // (keyword, message)
    scroll: u16,
    show_history: bool,
    history_index: usize,
    history_entries: Vec<HistoryEntry>,
    history: HistoryStore,
    theme: Theme,
}

impl UiState {
    fn new(history: HistoryStore) -> Self {
        let history_entries = history.get_all();
        Self {
            input: String::new(),
            products: vec![],
            last_keyword: None,
            searching: false,
            status: None,
            error: None,
            scroll: 0,
            show_history: false,
            history_index: 0,
            history_entries,
            history,
            theme: Theme::Dark,
        }
    }

    fn refresh_history(&mut self) {
        self.history_entries = self.history.get_all();
        if self.history_index >= self.history_entries.len() {
            self.history_index = self.history_entries.len().saturating_sub(1);
        }
    }
}

fn accent_color(theme: Theme) -> Color {
    match theme {
        Theme::Dark => Color::Cyan,
        Theme::Light => Color::Blue,
    }
}

fn text_color(theme: Theme) -> Color {
    match theme {
        Theme::Dark => Color::Gray,
        Theme::Light => Color::Black,
    }
}

fn dim_color(theme: Theme) -> Color {
    match theme {
        Theme::Dark => Color::DarkGray,
        Theme::Light => Color::Gray,
    }
}

fn base_style(theme: Theme) -> Style {
    match theme {
        Theme::Dark => Style::default().fg(Color::Gray),
        Theme::Light => Style::default().fg(Color::Black).bg(Color::White),
    }
}

fn results_lines(state: &UiState, frame: u64) -> Vec<Line<'static>> {
    let accent = accent_color(state.theme);
    let dim = dim_color(state.theme);
    let text = text_color(state.theme);
    let mut lines: Vec<Line<'static>> = Vec::new();

    if let Some(status) = &state.status {
        lines.push(Line::from(Span::styled(status.clone(), Style::default().fg(dim))));
        lines.push(Line::from(""));
    }

    if let Some((keyword, message)) = &state.error {
        lines.push(Line::from(Span::styled(
            format!("search failed: {keyword}"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(message.clone(), Style::default().fg(Color::Red))));
        lines.push(Line::from(Span::styled(
            "check the network connection or try a different keyword".to_string(),
            Style::default().fg(dim),
        )));
    } else if !state.products.is_empty() {
        for product in &state.products {
            lines.push(Line::from(Span::styled(
                product.title.clone(),
                Style::default().fg(accent).add_modifier(Modifier::BOLD),
            )));
            let mut meta = format!("id: {}", product.product_id);
            if let Some(image_url) = &product.image_url {
                meta.push_str("  image: ");
                meta.push_str(image_url);
            }
            lines.push(Line::from(Span::styled(meta, Style::default().fg(dim))));
            lines.push(Line::from(""));
        }
    } else if let Some(keyword) = &state.last_keyword {
        if !state.searching {
            lines.push(Line::from(Span::styled(
                format!("no products found for {keyword}"),
                Style::default().fg(text),
            )));
        }
    } else if !state.searching {
        lines.push(Line::from(Span::styled(
            "type a keyword and press enter to search the catalog".to_string(),
            Style::default().fg(dim),
        )));
    }

    if state.searching {
        let dots = ["·  ", "·· ", "···"][(frame as usize / 10) % 3];
        lines.push(Line::from(Span::styled(
            format!("searching {}", dots),
            Style::default().fg(dim),
        )));
    }

    lines
}

fn history_lines(state: &UiState) -> Vec<Line<'static>> {
    let accent = accent_color(state.theme);
    let dim = dim_color(state.theme);
    let text = text_color(state.theme);

    if !state.history.is_storage_available() {
        return vec![Line::from(Span::styled(
            "local storage unavailable".to_string(),
            Style::default().fg(Color::Red),
        ))];
    }
    if state.history_entries.is_empty() {
        return vec![Line::from(Span::styled(
            "no search history yet".to_string(),
            Style::default().fg(dim),
        ))];
    }

    state
        .history_entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let selected = i == state.history_index;
            let marker = if selected { "> " } else { "  " };
            let style = if selected {
                Style::default().fg(accent).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(text)
            };
            Line::from(vec![
                Span::styled(format!("{marker}{}", entry.keyword), style),
                Span::styled(
                    format!("  {}", format_timestamp(entry.timestamp)),
                    Style::default().fg(dim),
                ),
            ])
        })
        .collect()
}

fn line_display_rows(line: &Line<'_>, available_width: u16) -> u16 {
    let mut width = 0usize;
    for span in &line.spans {
        width += span.content.width();
    }
    let aw = available_width.max(1) as usize;
    let rows = if width == 0 { 1 } else { (width + aw - 1) / aw };
    rows as u16
}

// The history store only renders a fragment; wrapping it into a standalone
// page is this caller's job.
fn export_history(store: &HistoryStore) -> anyhow::Result<PathBuf> {
    let path = PathBuf::from("search_history.html");
    let page = format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Search history</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        store.render_html()
    );
    fs::write(&path, page)?;
    Ok(path)
}

fn begin_search<F: FnMut(String)>(state: &mut UiState, on_submit: &mut F, keyword: String) {
    let keyword = keyword.trim().to_string();
    if keyword.is_empty() {
        return;
    }
    state.searching = true;
    state.error = None;
    state.status = Some(format!("→ searching: {keyword}"));
    state.last_keyword = Some(keyword.clone());
    state.scroll = 0;
    on_submit(keyword);
}

pub fn run_loop<F>(rx: Receiver<UiEvent>, history: HistoryStore, mut on_submit: F) -> anyhow::Result<()>
where
    F: FnMut(String) + Send + 'static,
{
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut state = UiState::new(history);
    let mut frame = 0u64;

    loop {
        // 1) Pull search outcomes (non-blocking) and update state
        while let Ok(ev) = rx.try_recv() {
            match ev {
                UiEvent::Results { keyword, products } => {
                    state.searching = false;
                    state.status = Some(format!("← {} results for {keyword}", products.len()));
                    state.products = products;
                    // A completed search is what earns a history entry
                    state.history.add(&keyword);
                    state.refresh_history();
                }
                UiEvent::SearchFailed { keyword, error } => {
                    state.searching = false;
                    state.status = None;
                    state.products.clear();
                    state.error = Some((keyword, error));
                }
            }
        }

        // 2) Draw UI
        terminal.draw(|f| {
            let size = f.size();
            let base = base_style(state.theme);
            let accent = accent_color(state.theme);
            let dim = dim_color(state.theme);

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(3), Constraint::Length(3)])
                .split(size);

            // Header
            let header = Paragraph::new(Line::from(vec![
                Span::styled(" shopscope ", Style::default().fg(accent).add_modifier(Modifier::BOLD)),
                Span::raw("— catalog search with local history "),
                Span::styled(
                    "[^h] history  [^t] theme  [^e] export  [esc] quit",
                    Style::default().fg(dim),
                ),
            ]))
            .style(base)
            .block(Block::default().borders(Borders::ALL));
            f.render_widget(header, chunks[0]);

            // Results, with the history panel at the side when open
            let (results_area, history_area) = if state.show_history {
                let cols = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
                    .split(chunks[1]);
                (cols[0], Some(cols[1]))
            } else {
                (chunks[1], None)
            };

            let lines = results_lines(&state, frame);
            let available_width = results_area.width.saturating_sub(2); // minus borders
            let mut total_rows: u16 = 0;
            for line in &lines {
                total_rows = total_rows.saturating_add(line_display_rows(line, available_width));
            }
            let content_height = results_area.height.saturating_sub(2);
            let max_scroll = total_rows.saturating_sub(content_height);
            let clamped_scroll = state.scroll.min(max_scroll);

            let results = Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .scroll((clamped_scroll, 0))
                .style(base)
                .block(Block::default().borders(Borders::ALL).title("results"));
            f.render_widget(results, results_area);

            if let Some(area) = history_area {
                let panel = Paragraph::new(history_lines(&state))
                    .wrap(Wrap { trim: true })
                    .style(base)
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .title("history — enter run · del remove · ^x clear"),
                    );
                f.render_widget(panel, area);
            }

            // Input
            let prompt = "> ";
            let input = Paragraph::new(format!("{prompt}{}", state.input))
                .style(base)
                .block(Block::default().borders(Borders::ALL).title("search"));
            f.render_widget(Clear, chunks[2]);
            f.render_widget(input, chunks[2]);

            // Cursor in input
            let x = chunks[2].x + (prompt.len() as u16) + (state.input.chars().count() as u16);
            let y = chunks[2].y + 1;
            f.set_cursor(x, y);
        })?;

        frame += 1;

        // 3) Handle keys
        if crossterm::event::poll(Duration::from_millis(33))? {
            if let Event::Key(key) = event::read()? {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    match key.code {
                        KeyCode::Char('h') => {
                            state.show_history = !state.show_history;
                            if state.show_history {
                                state.refresh_history();
                                state.history_index = 0;
                            }
                        }
                        KeyCode::Char('t') => state.theme = state.theme.toggled(),
                        KeyCode::Char('e') => {
                            state.status = Some(match export_history(&state.history) {
                                Ok(path) => format!("exported search history to {}", path.display()),
                                Err(err) => format!("export failed: {err}"),
                            });
                        }
                        KeyCode::Char('x') => {
                            state.history.clear();
                            state.refresh_history();
                        }
                        KeyCode::Char('c') => break,
                        _ => {}
                    }
                } else if state.show_history {
                    match key.code {
                        KeyCode::Up => state.history_index = state.history_index.saturating_sub(1),
                        KeyCode::Down => {
                            if state.history_index + 1 < state.history_entries.len() {
                                state.history_index += 1;
                            }
                        }
                        KeyCode::Enter => {
                            let selected = state
                                .history_entries
                                .get(state.history_index)
                                .map(|entry| entry.keyword.clone());
                            if let Some(keyword) = selected {
                                state.show_history = false;
                                begin_search(&mut state, &mut on_submit, keyword);
                            }
                        }
                        KeyCode::Delete => {
                            let selected = state
                                .history_entries
                                .get(state.history_index)
                                .map(|entry| entry.id);
                            if let Some(id) = selected {
                                state.history.delete(id);
                                state.refresh_history();
                            }
                        }
                        KeyCode::Esc => state.show_history = false,
                        KeyCode::Char(c) => state.input.push(c),
                        KeyCode::Backspace => { state.input.pop(); }
                        _ => {}
                    }
                } else {
                    match key.code {
                        KeyCode::Char(c) => state.input.push(c),
                        KeyCode::Backspace => { state.input.pop(); }
                        KeyCode::Enter => {
                            let line = std::mem::take(&mut state.input);
                            begin_search(&mut state, &mut on_submit, line);
                        }
                        KeyCode::Esc => break,
                        KeyCode::Up => state.scroll = state.scroll.saturating_sub(1),
                        KeyCode::Down => state.scroll = state.scroll.saturating_add(1),
                        KeyCode::PageUp => state.scroll = state.scroll.saturating_sub(5),
                        KeyCode::PageDown => state.scroll = state.scroll.saturating_add(5),
                        _ => {}
                    }
                }
            }
        }
    }

    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), crossterm::terminal::LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

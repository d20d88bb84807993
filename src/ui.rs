use crate::app::{ActiveInput, App, InputMode, Level};
use crate::models::{Priority, Status, Task};
use crate::store::TaskStore;
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

const TITLE_WIDTH: usize = 19;

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

// Computed in u32 so wide terminals cannot overflow.
fn percent_of(length: u16, percent: u16) -> u16 {
    (u32::from(length) * u32::from(percent) / 100) as u16
}

fn key_span(key: &'static str) -> Span<'static> {
    Span::styled(key, Style::default().fg(Color::Red))
}

fn get_legend(input_mode: &InputMode) -> Text<'static> {
    match input_mode {
        InputMode::Normal => Text::from(Line::from(vec![
            key_span(" q "),
            Span::raw(": Quit "),
            key_span(" j/k "),
            Span::raw(": Down/Up "),
            key_span(" 1 "),
            Span::raw(": List All "),
            key_span(" a "),
            Span::raw(": Add "),
            key_span(" Enter "),
            Span::raw(": Details "),
            key_span(" g "),
            Span::raw(": Go To ID "),
            key_span(" s "),
            Span::raw(": Status "),
            key_span(" d "),
            Span::raw(": Delete "),
            key_span(" / "),
            Span::raw(": Search "),
        ])),
        InputMode::Editing => Text::from(Line::from(vec![
            key_span(" i "),
            Span::raw(": Type "),
            key_span(" Tab "),
            Span::raw(": Next Field "),
            key_span(" Enter "),
            Span::raw(": Submit "),
            key_span(" Esc "),
            Span::raw(": Cancel "),
        ])),
        InputMode::Insert => Text::from(Line::from(vec![
            key_span(" Tab "),
            Span::raw(": Next Field "),
            key_span(" Esc "),
            Span::raw(": Stop Typing "),
        ])),
        InputMode::Status => Text::from(Line::from(vec![
            key_span(" 1-3 "),
            Span::raw(": Choose "),
            key_span(" Esc "),
            Span::raw(": Cancel "),
        ])),
        InputMode::ConfirmDelete => Text::from(Line::from(vec![
            key_span(" y "),
            Span::raw(": Delete "),
            key_span(" any other key "),
            Span::raw(": Cancel "),
        ])),
        InputMode::Search | InputMode::GoTo => Text::from(Line::from(vec![
            key_span(" Enter "),
            Span::raw(": Submit "),
            key_span(" Esc "),
            Span::raw(": Cancel "),
        ])),
    }
}

fn status_style(status: Status) -> Style {
    match status {
        Status::Pending => Style::default(),
        Status::InProgress => Style::default().fg(Color::Yellow),
        Status::Done => Style::default().fg(Color::Green),
    }
}

fn priority_style(priority: Priority) -> Style {
    match priority {
        Priority::High => Style::default().fg(Color::Red),
        Priority::Medium | Priority::Low => Style::default(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

fn task_row(task: &Task) -> ListItem<'static> {
    ListItem::new(Line::from(vec![
        Span::raw(format!("{:<4}", task.id)),
        Span::raw(format!("{:<20}", truncate(&task.title, TITLE_WIDTH))),
        Span::styled(format!("{:<12}", task.status.label()), status_style(task.status)),
        Span::styled(
            format!("{:<12}", task.priority.label()),
            priority_style(task.priority),
        ),
        Span::raw(format!("{:<15}", task.due_date)),
    ]))
}

fn detail_line(label: &'static str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(label, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(value),
    ])
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

fn task_detail_lines(task: &Task) -> Vec<Line<'static>> {
    vec![
        detail_line("ID: ", task.id.to_string()),
        detail_line("Title: ", task.title.clone()),
        detail_line("Status: ", task.status.to_string()),
        detail_line("Priority: ", task.priority.to_string()),
        detail_line("Due Date: ", or_placeholder(&task.due_date, "No due date")),
        detail_line("Created: ", task.created_at.clone()),
        Line::from(Span::styled(
            "Description: ",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(or_placeholder(&task.description, "No description")),
    ]
}

fn draw_task_list<S: TaskStore>(f: &mut Frame, app: &mut App<S>, area: Rect) {
    let task_title = match &app.search {
        Some(term) => format!("Tasks (Search: {term})"),
        None => "Tasks (All)".to_string(),
    };
    let header = format!(
        "{:<4}{:<20}{:<12}{:<12}{:<15}",
        "ID", "Title", "Status", "Priority", "Due Date"
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .title(task_title)
        .title_bottom(header);

    let tasks: Vec<ListItem<'static>> = app.visible_tasks().into_iter().map(task_row).collect();

    let tasks_widget = if !tasks.is_empty() {
        List::new(tasks)
            .block(block)
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ")
    } else if app.search.is_some() {
        List::new(vec![ListItem::new("No matching tasks")]).block(block)
    } else {
        List::new(vec![ListItem::new("No tasks yet.")]).block(block)
    };

    f.render_stateful_widget(tasks_widget, area, &mut app.state);
}

fn draw_task_detail<S: TaskStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let detail_block = Block::default().borders(Borders::ALL).title("Task Details");

    let paragraph = match &app.task_detail {
        Some(task) => Paragraph::new(task_detail_lines(task)),
        None => Paragraph::new("Press Enter to view task details"),
    };
    f.render_widget(
        paragraph.block(detail_block).wrap(Wrap { trim: true }),
        area,
    );
}

fn draw_add_form<S: TaskStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    for input in ActiveInput::ALL {
        let active = input == app.active_input;
        let label_style = if active {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        let mut value = app.field(input).to_string();
        if active && app.input_mode == InputMode::Insert {
            value.push('_');
        }
        lines.push(Line::from(Span::styled(format!("{}:", input.label()), label_style)));
        lines.push(Line::from(Span::raw(format!("  {value}"))));
    }

    let popup_width = percent_of(area.width, 60).max(40).min(area.width);
    let popup_height = u16::try_from(lines.len())
        .unwrap_or(u16::MAX)
        .saturating_add(2)
        .min(area.height);
    let popup_area = centered_rect_absolute(popup_width, popup_height, area);

    let popup_block = Block::default()
        .title("New Task (Press Enter to Submit)")
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green));

    let form = Paragraph::new(lines)
        .style(Style::default().fg(Color::White))
        .block(popup_block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(form, popup_area);
}

fn draw_popup(f: &mut Frame, title: &str, lines: Vec<String>, area: Rect) {
    let popup_width_percentage = 60;
    let popup_width = percent_of(area.width, popup_width_percentage).saturating_sub(2);

    let lines_required: usize = lines
        .iter()
        .map(|line| calculate_wrapped_lines(line, popup_width.max(1)).max(1))
        .sum();

    let popup_height = u16::try_from(lines_required)
        .unwrap_or(u16::MAX)
        .saturating_add(2);
    let max_popup_height = area.height.saturating_sub(2);
    let popup_height = std::cmp::min(popup_height, max_popup_height);

    let popup_area = centered_rect_absolute(popup_width.saturating_add(2), popup_height, area);

    let popup_block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green));

    let input = Paragraph::new(lines.join("\n"))
        .style(Style::default().fg(Color::White))
        .block(popup_block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(input, popup_area);
}

fn draw<S: TaskStore>(f: &mut Frame, app: &mut App<S>) {
    let size = f.area();

    // Split the main layout into body, message line and footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints(
            [
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(size);

    let body_chunk = chunks[0];
    let message_chunk = chunks[1];
    let footer_chunk = chunks[2];

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)].as_ref())
        .split(body_chunk);

    draw_task_list(f, app, columns[0]);
    draw_task_detail(f, app, columns[1]);

    match app.input_mode {
        InputMode::Normal => {}
        InputMode::Editing | InputMode::Insert => draw_add_form(f, app, body_chunk),
        InputMode::Status => {
            let title = app
                .target
                .as_ref()
                .map(|task| truncate(&task.title, TITLE_WIDTH))
                .unwrap_or_default();
            let mut lines = vec![format!("New status for '{title}':")];
            lines.extend(
                Status::ALL
                    .iter()
                    .enumerate()
                    .map(|(i, status)| format!("{}. {}", i + 1, status)),
            );
            draw_popup(f, "Update Status", lines, body_chunk);
        }
        InputMode::ConfirmDelete => {
            let title = app
                .target
                .as_ref()
                .map(|task| task.title.clone())
                .unwrap_or_default();
            let lines = vec![format!("Are you sure you want to delete '{title}'? (y/n)")];
            draw_popup(f, "Delete Task", lines, body_chunk);
        }
        InputMode::Search => {
            let lines = vec![format!("{}_", app.prompt)];
            draw_popup(f, "Search Term (Press Enter to Search)", lines, body_chunk);
        }
        InputMode::GoTo => {
            let lines = vec![format!("{}_", app.prompt)];
            draw_popup(f, "Task ID (Press Enter to View)", lines, body_chunk);
        }
    }

    if let Some(message) = &app.message {
        let color = match message.level {
            Level::Info => Color::Cyan,
            Level::Warning => Color::Yellow,
            Level::Error => Color::Red,
        };
        let line = Paragraph::new(message.text.clone()).style(Style::default().fg(color));
        f.render_widget(line, message_chunk);
    }

    // Render the legend in the footer
    let legend = Paragraph::new(get_legend(&app.input_mode))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(legend, footer_chunk);
}

pub fn run_app<B: Backend, S: TaskStore>(terminal: &mut Terminal<B>, mut app: App<S>) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, &mut app))?;

        // Handle input
        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if app.handle_input(key) {
                    return Ok(());
                }
            }
        }
    }
}

fn calculate_wrapped_lines(text: &str, max_width: u16) -> usize {
    let mut line_count = 0;
    for line in text.lines() {
        let line_width = line.chars().count();
        line_count += line_width.div_ceil(usize::from(max_width.max(1)));
    }
    line_count
}

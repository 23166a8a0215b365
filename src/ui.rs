use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::{App, ASSISTANT_NAME, ChatRole, InputMode, LoginField, Screen};

/// Render `**bold**` runs in assistant text as styled spans. Lines with an
/// unpaired marker render as-is.
fn styled_reply_line(text: &str) -> Line<'static> {
    if text.matches("**").count() % 2 != 0 {
        return Line::from(text.to_string());
    }

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut bold = false;
    let mut rest = text;

    while let Some(idx) = rest.find("**") {
        let (before, after) = rest.split_at(idx);
        if !before.is_empty() {
            spans.push(styled_span(before, bold));
        }
        rest = &after[2..];
        bold = !bold;
    }
    if !rest.is_empty() {
        spans.push(styled_span(rest, bold));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn styled_span(text: &str, bold: bool) -> Span<'static> {
    let style = if bold {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    Span::styled(text.to_string(), style)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Login => render_login_screen(app, frame, body_area),
        Screen::Chat => render_chat_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    // The success notice blocks everything behind it until dismissed
    if app.login_notice.is_some() {
        render_notice_popup(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(
            format!(" {} ", ASSISTANT_NAME),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(
            app.api.base_url().to_string(),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    frame.render_widget(Paragraph::new(title), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Login => " LOGIN ",
        Screen::Chat => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = if app.login_notice.is_some() {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" continue ", label_style),
        ]
    } else {
        match (app.screen, app.input_mode) {
            (Screen::Login, _) => vec![
                Span::styled(" Tab ", key_style),
                Span::styled(" field ", label_style),
                Span::styled(" Enter ", key_style),
                Span::styled(" login ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" quit ", label_style),
            ],
            (Screen::Chat, InputMode::Editing) => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" scroll mode ", label_style),
            ],
            (Screen::Chat, InputMode::Normal) => vec![
                Span::styled(" j/k ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" g/G ", key_style),
                Span::styled(" top/bottom ", label_style),
                Span::styled(" C ", key_style),
                Span::styled(" clear ", label_style),
                Span::styled(" i ", key_style),
                Span::styled(" type ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ],
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_login_screen(app: &App, frame: &mut Frame, area: Rect) {
    // Centered card, sized like a small dialog
    let card_width = 44.min(area.width.saturating_sub(4));
    let card_height = 10.min(area.height);
    let card_x = area.x + area.width.saturating_sub(card_width) / 2;
    let card_y = area.y + area.height.saturating_sub(card_height) / 2;
    let card_area = Rect::new(card_x, card_y, card_width, card_height);

    let card = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Chatbot Login ");

    let inner = card.inner(card_area);
    frame.render_widget(card, card_area);

    let [username_area, password_area, _, error_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(inner);

    render_login_field(
        frame,
        username_area,
        " Username ",
        &app.username_input,
        app.login_field == LoginField::Username,
    );

    let masked = "*".repeat(app.password_input.chars().count());
    render_login_field(
        frame,
        password_area,
        " Password ",
        &masked,
        app.login_field == LoginField::Password,
    );

    if let Some(error) = &app.login_error {
        let error_line = Paragraph::new(error.as_str())
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center);
        frame.render_widget(error_line, error_area);
    }

    // Cursor sits at the end of the focused field
    let (focused_area, focused_len) = match app.login_field {
        LoginField::Username => (username_area, app.username_input.chars().count()),
        LoginField::Password => (password_area, masked.chars().count()),
    };
    let inner_width = focused_area.width.saturating_sub(2) as usize;
    let cursor_x = focused_len.min(inner_width) as u16;
    frame.set_cursor_position((focused_area.x + cursor_x + 1, focused_area.y + 1));
}

fn render_login_field(frame: &mut Frame, area: Rect, title: &str, value: &str, focused: bool) {
    let border_color = if focused { Color::Yellow } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title.to_string());

    // Keep the tail visible when the value outgrows the field
    let inner_width = area.width.saturating_sub(2) as usize;
    let char_count = value.chars().count();
    let visible_text: String = value
        .chars()
        .skip(char_count.saturating_sub(inner_width))
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);
}

fn render_notice_popup(app: &App, frame: &mut Frame, area: Rect) {
    let Some(notice) = &app.login_notice else {
        return;
    };

    let popup_width = 50.min(area.width.saturating_sub(4));
    let popup_height = 5;

    let popup_x = area.width.saturating_sub(popup_width) / 2;
    let popup_y = area.height.saturating_sub(popup_height) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(format!(" {} ", ASSISTANT_NAME));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let message = Paragraph::new(notice.as_str()).alignment(Alignment::Center);
    frame.render_widget(message, Rect::new(inner.x, inner.y, inner.width, 1));

    let hint = Paragraph::new("Press Enter to continue")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(hint, Rect::new(inner.x, inner.y + 2, inner.width, 1));
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_focused = app.input_mode == InputMode::Normal;
    let chat_border_color = if chat_focused { Color::Cyan } else { Color::DarkGray };

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(chat_border_color))
        .title(" Conversation ");

    let chat_text = if app.chat_messages.is_empty() && !app.awaiting_reply() {
        Text::from(Span::styled(
            "No messages yet. Type below to start the conversation.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &app.chat_messages {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                    lines.push(Line::default());
                }
                ChatRole::Assistant => {
                    lines.push(Line::from(Span::styled(
                        format!("{}:", ASSISTANT_NAME),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(styled_reply_line(line));
                    }
                    lines.push(Line::default());
                }
            }
        }

        if app.awaiting_reply() {
            lines.push(Line::from(Span::styled(
                format!("{}:", ASSISTANT_NAME),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    // Message input at the bottom - highlight while editing
    let input_border_color = if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(" Message ");

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.chat_cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .chat_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, input_area);

    // Show cursor when editing
    if app.input_mode == InputMode::Editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

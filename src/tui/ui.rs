use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, GenerateField, NotificationKind, View};
use crate::quiz::{QuizPhase, QuizSession};

use super::Theme;

const DELETE_WARNING: &str =
    "This action cannot be undone. This will permanently delete the item.";

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(0),    // Body
            Constraint::Length(1), // Notification / key hints
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    match app.view {
        View::Generate => render_generate(frame, app, chunks[1]),
        View::Notes => render_notes(frame, app, chunks[1]),
        View::Quizzes => render_quizzes(frame, app, chunks[1]),
    }

    render_status(frame, app, chunks[2]);

    let deleting = match app.view {
        View::Notes => app.note_delete,
        View::Quizzes => app.quiz.pending_delete(),
        View::Generate => None,
    };
    if let Some(pending) = deleting {
        render_confirm(frame, &app.theme, pending.in_flight);
    }

    if app.show_help {
        render_help(frame, &app.theme);
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let tab = |label: &str, view: View| {
        let style = if app.view == view {
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.muted)
        };
        Span::styled(format!(" {label} "), style)
    };

    let line = Line::from(vec![
        tab("1 Generate", View::Generate),
        tab("2 Notes", View::Notes),
        tab("3 Quizzes", View::Quizzes),
        Span::styled(
            format!("  {} materials", app.material_count),
            Style::default().fg(theme.muted),
        ),
    ]);

    let block = Block::default()
        .title(" Study Buddy ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border));

    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_generate(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Topic
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Content
        ])
        .split(area);

    let field = |title: &str, value: &str, which: GenerateField| {
        let focused = app.generate_field == which;
        let border = if focused { theme.accent } else { theme.muted };
        let cursor = if focused && !app.is_generating { "_" } else { "" };
        Paragraph::new(format!("{value}{cursor}"))
            .style(Style::default().fg(theme.text))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(title.to_string())
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border)),
            )
    };

    frame.render_widget(
        field(" Topic (Enter to generate) ", &app.topic_input, GenerateField::Topic),
        chunks[0],
    );
    frame.render_widget(
        field(" Title ", &app.title_input, GenerateField::Title),
        chunks[1],
    );
    frame.render_widget(
        field(
            " Content (Alt+Enter for newline, Enter to generate) ",
            &app.content_input,
            GenerateField::Content,
        ),
        chunks[2],
    );
}

fn render_notes(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)])
        .split(area);

    let items: Vec<ListItem> = app
        .notes
        .iter()
        .map(|note| ListItem::new(Span::styled(note.title.as_str(), Style::default().fg(theme.text))))
        .collect();

    let list = List::new(items)
        .block(Block::default().title(" Notes ").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(theme.highlight_bg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !app.notes.is_empty() {
        state.select(Some(app.selected_note));
    }
    frame.render_stateful_widget(list, chunks[0], &mut state);

    let mut lines: Vec<Line> = Vec::new();
    match app.selected_note() {
        Some(note) => {
            lines.push(Line::from(note.content.as_str()));
            if !note.key_points.is_empty() {
                lines.push(Line::from(""));
                lines.push(Line::styled("Key points", Style::default().fg(theme.accent)));
                lines.extend(note.key_points.iter().map(|p| Line::from(format!("• {p}"))));
            }
            if !note.examples.is_empty() {
                lines.push(Line::from(""));
                lines.push(Line::styled("Examples", Style::default().fg(theme.accent)));
                lines.extend(note.examples.iter().map(|e| Line::from(format!("• {e}"))));
            }
        }
        None => lines.push(Line::from("No notes yet. Press 1 to generate some.")),
    }

    let detail = Paragraph::new(lines)
        .style(Style::default().fg(theme.text))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(" Note ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border)),
        );
    frame.render_widget(detail, chunks[1]);
}

fn render_quizzes(frame: &mut Frame, app: &App, area: Rect) {
    let session = &app.quiz;
    match session.phase() {
        QuizPhase::Browsing => render_quiz_list(frame, session, &app.theme, area),
        QuizPhase::Loading => render_message(frame, &app.theme, area, "Loading questions..."),
        QuizPhase::Submitting => render_message(frame, &app.theme, area, "Submitting..."),
        QuizPhase::InProgress => render_question(frame, session, &app.theme, area),
        QuizPhase::Results => render_results(frame, app, area),
        QuizPhase::Reviewing => render_review(frame, session, &app.theme, area),
    }
}

fn render_quiz_list(frame: &mut Frame, session: &QuizSession, theme: &Theme, area: Rect) {
    let items: Vec<ListItem> = session
        .quizzes()
        .iter()
        .map(|quiz| {
            let date = quiz.created_at.format("%Y-%m-%d").to_string();
            ListItem::new(Line::from(vec![
                Span::styled(quiz.title.as_str(), Style::default().fg(theme.text)),
                Span::styled(format!("  {date}"), Style::default().fg(theme.muted)),
            ]))
        })
        .collect();

    let title = if items.is_empty() {
        " Quizzes (none yet) "
    } else {
        " Quizzes "
    };

    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border)),
        )
        .highlight_style(
            Style::default()
                .bg(theme.highlight_bg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !session.quizzes().is_empty() {
        state.select(Some(session.selected_index()));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_question(frame: &mut Frame, session: &QuizSession, theme: &Theme, area: Rect) {
    let Some(question) = session.current_question() else {
        return;
    };
    let selected = session.current_answer();
    let total = session.questions().len();

    let mut lines = vec![
        Line::from(question.question.as_str()).style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
    ];
    for (i, option) in question.options.iter().enumerate() {
        let chosen = selected == Some(option.as_str());
        let marker = if chosen { "(•)" } else { "( )" };
        let style = if chosen {
            Style::default().fg(theme.accent)
        } else {
            Style::default().fg(theme.text)
        };
        lines.push(Line::styled(format!("{marker} {}. {option}", i + 1), style));
    }
    lines.push(Line::from(""));
    let hint = if session.is_last_question() {
        "h: previous  Enter: submit  Esc: exit"
    } else {
        "h/l: previous/next  Esc: exit"
    };
    lines.push(Line::styled(hint, Style::default().fg(theme.muted)));

    let title = format!(
        " {} - Question {} of {} ",
        session.active_quiz().map(|q| q.title.as_str()).unwrap_or("Quiz"),
        session.current_index() + 1,
        total
    );

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border)),
    );
    frame.render_widget(paragraph, area);
}

fn render_results(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let Some(score) = app.quiz.score() else {
        return;
    };

    let lines = vec![
        Line::styled(
            format!("{}%", score.display_percentage()),
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        ),
        Line::from(format!("{} of {} correct", score.correct, score.total)),
        Line::styled(
            format!("Attempts on this quiz: {}", app.attempt_count),
            Style::default().fg(theme.muted),
        ),
        Line::from(""),
        Line::styled("r: review answers  Esc: back to quizzes", Style::default().fg(theme.muted)),
    ];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(" Results ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border)),
    );
    frame.render_widget(paragraph, area);
}

fn render_review(frame: &mut Frame, session: &QuizSession, theme: &Theme, area: Rect) {
    let Some(item) = session.current_review_item() else {
        return;
    };

    let (verdict, verdict_style) = if item.is_correct {
        ("Correct", Style::default().fg(theme.success))
    } else {
        ("Incorrect", Style::default().fg(theme.error))
    };

    let mut lines = vec![
        Line::from(item.question.question.as_str()).style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::styled(verdict, verdict_style),
        Line::from(format!("Your answer: {}", item.answer_label())),
    ];
    if !item.is_correct {
        lines.push(Line::from(format!("Correct answer: {}", item.question.correct_answer)));
    }
    if let Some(explanation) = &item.question.explanation {
        lines.push(Line::from(""));
        lines.push(Line::styled(explanation.as_str(), Style::default().fg(theme.muted)));
    }
    lines.push(Line::from(""));
    lines.push(Line::styled(
        "h/l: previous/next  Esc: results  x: back to quizzes",
        Style::default().fg(theme.muted),
    ));

    let title = format!(
        " Review {} of {} ",
        session.review_index() + 1,
        session.questions().len()
    );
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border)),
    );
    frame.render_widget(paragraph, area);
}

fn render_message(frame: &mut Frame, theme: &Theme, area: Rect, message: &str) {
    let paragraph = Paragraph::new(message)
        .style(Style::default().fg(theme.muted))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let (text, style) = if let Some(notification) = &app.notification {
        let color = match notification.kind {
            NotificationKind::Success => theme.success,
            NotificationKind::Error => theme.error,
        };
        (notification.message.clone(), Style::default().fg(color))
    } else if app.is_generating {
        ("Generating study materials...".to_string(), Style::default().fg(theme.warning))
    } else {
        let hints = match app.view {
            View::Generate if !app.has_generator() => {
                "Generation unavailable: set api_key in config.toml  Esc: notes"
            }
            View::Generate => "Tab: next field  Enter: generate  Esc: notes  Ctrl+C: quit",
            View::Notes => "j/k: nav  d: delete  1/3: views  ?: help  q: quit",
            View::Quizzes => "j/k: nav  Enter: start  d: delete  r: reload  ?: help  q: quit",
        };
        (hints.to_string(), Style::default().fg(theme.muted))
    };

    frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_confirm(frame: &mut Frame, theme: &Theme, in_flight: bool) {
    let area = centered_rect(50, 25, frame.area());

    let actions = if in_flight {
        Line::styled("Deleting...", Style::default().fg(theme.muted))
    } else {
        Line::from(vec![
            Span::styled("[n] Cancel", Style::default().fg(theme.text)),
            Span::raw("   "),
            Span::styled("[y] Delete", Style::default().fg(theme.error)),
        ])
    };

    let lines = vec![
        Line::from(DELETE_WARNING),
        Line::from(""),
        actions,
    ];

    let block = Block::default()
        .title(" Are you sure? ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.error));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame, theme: &Theme) {
    let area = centered_rect(50, 60, frame.area());

    let help_text = [
        "",
        " Views:",
        "   1        Generate",
        "   2        Notes",
        "   3        Quizzes",
        "",
        " Lists:",
        "   j / ↓    Move down",
        "   k / ↑    Move up",
        "   Enter    Start quiz",
        "   d        Delete",
        "",
        " Quiz:",
        "   1-9      Pick an answer",
        "   h / l    Previous / next question",
        "   Enter    Submit (last question)",
        "   r        Review answers",
        "   Esc      Exit quiz",
        "",
        " General:",
        "   ?        Toggle this help",
        "   q        Quit",
        "",
        " Press any key to close",
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border));

    let paragraph = Paragraph::new(help_text.join("\n"))
        .block(block)
        .style(Style::default().fg(theme.text));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

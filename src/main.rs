use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossterm::event::KeyEventKind;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

mod ai;
mod app;
mod config;
mod db;
mod error;
mod models;
mod quiz;
mod services;
mod tui;

use ai::GenerationInput;
use app::App;
use config::Config;
use error::Result;
use models::SourceKind;
use tui::{draw, handle_key_event};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let config = Config::load()?;

    // --topic <topic>: generate from a topic and exit
    let topic = if args.len() >= 3 && args[1] == "--topic" {
        Some(args[2..].join(" "))
    } else {
        None
    };

    // --import <file> [title]: generate from a file and exit
    let import_path = if args.len() >= 3 && args[1] == "--import" {
        Some(PathBuf::from(&args[2]))
    } else {
        None
    };

    let mut app = App::new(&config).await?;

    if let Some(topic) = topic {
        return run_headless(&app, GenerationInput::Topic { topic }).await;
    }

    if let Some(path) = import_path {
        let input = import_input(&path, args.get(3).cloned())?;
        return run_headless(&app, input).await;
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    Ok(())
}

fn import_input(path: &Path, title: Option<String>) -> Result<GenerationInput> {
    let content = std::fs::read_to_string(path)?;
    let title = title.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    });
    Ok(GenerationInput::Paste {
        title,
        content,
        source: SourceKind::Uploaded,
    })
}

async fn run_headless(app: &App, input: GenerationInput) -> Result<()> {
    let report = app
        .generate_headless(input)
        .await
        .inspect_err(|e| eprintln!("{}", e.user_message()))?;

    println!(
        "Created '{}': {} note, {} flashcards, {} quiz questions",
        report.title,
        usize::from(report.note_id.is_some()),
        report.flashcard_count,
        report.question_count
    );

    for card in app.flashcards_for(report.material_id).await? {
        println!();
        println!("{}", textwrap::fill(&format!("Q: {}", card.question), 80));
        println!(
            "{}",
            textwrap::fill(&format!("A: {} [{}]", card.answer, card.difficulty.as_str()), 80)
        );
    }

    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, app))?;

        app.tick();

        // Poll for finished background work
        app.poll_generation_result().await?;
        app.poll_quiz_result().await?;
        app.poll_note_delete_result();

        // Poll for events with timeout to allow async operations
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = handle_key_event(key, app.input_mode()) {
                        let should_quit = app.handle_action(action).await?;
                        if should_quit {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

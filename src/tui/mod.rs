mod handler;
mod theme;
mod ui;

pub use handler::{handle_key_event, AppAction, InputMode};
pub use theme::Theme;
pub use ui::draw;

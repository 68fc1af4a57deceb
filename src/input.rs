use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

use crate::actions::HintHost;
use crate::app::{App, PaletteMatch};
use crate::models::FocusArea;
use crate::observer::Layout;

/// Routes one key press. Returns `true` when the app should quit.
pub async fn handle_key(app: &mut App, key: KeyEvent) -> Result<bool> {
    // an active hinting session owns the keyboard
    if app.hint_key(&key) {
        return Ok(false);
    }

    if app.host.focus == FocusArea::Editing {
        if let Some(block) = app.host.editing {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => app.host.stop_editing(),
                KeyCode::Backspace => app.host.document.edit_text(block, None),
                KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    app.host.document.edit_text(block, Some(c))
                }
                _ => {}
            }
            app.pump();
            return Ok(false);
        }
        app.host.stop_editing();
    }

    match app.host.palette.feed(key) {
        PaletteMatch::Command(id) => {
            trace!(command = %id, "command fired");
            app.trigger(&id).await;
            return Ok(false);
        }
        PaletteMatch::Pending => return Ok(false),
        PaletteMatch::None => {}
    }

    match key.code {
        KeyCode::Char('q') => return Ok(true),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(true),
        KeyCode::Char('j') | KeyCode::Down => app.scroll(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll(-1),
        KeyCode::PageDown => app.scroll(i32::from(app_height(app))),
        KeyCode::PageUp => app.scroll(-i32::from(app_height(app))),
        KeyCode::Char('J') => app.host.move_selection(1),
        KeyCode::Char('K') => app.host.move_selection(-1),
        KeyCode::Char(' ') => {
            if let Some(block) = app.host.selected {
                let collapsed = app.host.document.is_collapsed(block);
                app.host.document.set_collapsed(block, !collapsed);
            }
        }
        KeyCode::Enter => {
            if let Some(uuid) = selected_uuid(app) {
                app.host.edit_block(&uuid);
            }
        }
        KeyCode::Esc => {
            app.host.select(None);
            app.host.palette.reset();
        }
        _ => {}
    }
    app.pump();
    Ok(false)
}

fn app_height(app: &App) -> u16 {
    app.host.viewport().height.max(1) as u16
}

fn selected_uuid(app: &App) -> Option<String> {
    app.host
        .selected
        .and_then(|b| app.host.document.attribute(b, "blockid"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::dom::test_document;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn app() -> App {
        App::new(test_document(3), Settings { hint_keys: "ab".into(), ..Settings::default() })
    }

    #[tokio::test]
    async fn shortcut_starts_a_session_that_swallows_keys() {
        let mut app = app();
        assert!(!handle_key(&mut app, key('f')).await.unwrap());
        assert!(app.session.is_active());

        // `q` is not a hint key here: it aborts the session instead of quitting
        assert!(!handle_key(&mut app, key('q')).await.unwrap());
        assert!(!app.session.is_active());
        assert!(handle_key(&mut app, key('q')).await.unwrap());
    }

    #[tokio::test]
    async fn two_key_shortcut_edits_the_hinted_block() {
        let mut app = app();
        handle_key(&mut app, key('g')).await.unwrap();
        assert!(!app.session.is_active());
        handle_key(&mut app, key('e')).await.unwrap();
        assert!(app.session.is_active());

        handle_key(&mut app, key('a')).await.unwrap();
        handle_key(&mut app, key('b')).await.unwrap();
        assert_eq!(app.host.focus, FocusArea::Editing);

        // typed text lands in the edited block, not in the palette
        handle_key(&mut app, key('f')).await.unwrap();
        assert!(!app.session.is_active());
        let block = app.host.editing.unwrap();
        assert!(app.host.document.text_content(block).starts_with("block 1 f"));

        handle_key(&mut app, KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)).await.unwrap();
        assert_eq!(app.host.focus, FocusArea::Document);
    }

    #[tokio::test]
    async fn selection_moves_with_shift_j() {
        let mut app = app();
        handle_key(&mut app, key('J')).await.unwrap();
        handle_key(&mut app, key('J')).await.unwrap();
        let selected = app.host.selected.unwrap();
        assert_eq!(app.host.document.attribute(selected, "blockid"), Some("b1"));
    }
}

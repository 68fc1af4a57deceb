//! One hinting pass: show labels, read keystrokes, act on the match.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

use crate::actions::{ActionFn, HintHost};
use crate::error::HintError;
use crate::labels::allocate;
use crate::models::{DomRect, ElementId};
use crate::tracker::Snapshot;
use crate::trie::{Resolution, Trie};

/// A label drawn next to a candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HintMarker {
    pub target: ElementId,
    pub label: String,
    pub x: i32,
    pub y: i32,
    /// Cleared when the typed prefix rules this marker out.
    pub visible: bool,
}

impl HintMarker {
    /// Places the label one cell left of the candidate, on its first row inside `viewport`.
    pub fn new(target: ElementId, label: String, rect: &DomRect, viewport: &DomRect) -> Self {
        Self {
            target,
            label,
            x: (rect.left - 1).max(0),
            y: rect.top.max(viewport.top).min(rect.bottom() - 1),
            visible: true,
        }
    }
}

/// Result of feeding one keystroke to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No session is running; the key was ignored.
    Inactive,
    /// Still ambiguous, waiting for more input.
    Pending,
    /// The action already ran on this element.
    Resolved(ElementId),
    /// The input matched nothing, or focus was lost.
    Aborted,
    /// Explicitly cancelled; the prior block selection was restored.
    Cancelled,
}

struct ActiveSession {
    trie: Trie<ElementId>,
    markers: Vec<HintMarker>,
    pending: String,
    on_match: ActionFn,
    prev_block: Option<String>,
}

/// Owner of the single live hinting session.
#[derive(Default)]
pub struct HintSession {
    active: Option<ActiveSession>,
}

impl HintSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Starts a session over `snapshot`, tearing down any session that is still running.
    ///
    /// When `hint_keys` cannot label the snapshot this fails before anything changes: a
    /// running session keeps going and the host is not touched.
    pub fn begin(
        &mut self,
        snapshot: &Snapshot,
        viewport: &DomRect,
        hint_keys: &str,
        on_match: ActionFn,
        host: &mut dyn HintHost,
    ) -> Result<(), HintError> {
        let allocation = allocate(snapshot.keys().copied(), hint_keys)?;
        let markers = snapshot
            .iter()
            .filter_map(|(&target, rect)| {
                let label = allocation.reverse.get(&target)?.clone();
                Some(HintMarker::new(target, label, rect, viewport))
            })
            .collect::<Vec<_>>();

        if self.teardown(host).is_some() {
            debug!("previous hint session discarded");
        }

        let prev_block = host.current_block();
        host.capture_input();
        debug!(hints = markers.len(), label_len = allocation.label_len, "hint session started");

        self.active = Some(ActiveSession {
            trie: allocation.trie,
            markers,
            pending: String::new(),
            on_match,
            prev_block,
        });
        Ok(())
    }

    /// Routes a key event from the capture element.
    ///
    /// A session with nothing to pick ends on any key: `Esc` cancels, everything else aborts.
    pub fn handle_key(&mut self, event: &KeyEvent, host: &mut dyn HintHost) -> Outcome {
        let Some(active) = self.active.as_ref() else {
            return Outcome::Inactive;
        };
        let empty = active.markers.is_empty();
        match event.code {
            KeyCode::Esc => self.cancel(host),
            _ if empty => {
                debug!(key = ?event.code, "no hints to pick");
                self.abort(host)
            }
            KeyCode::Backspace => self.backspace(host),
            KeyCode::Char(ch) if !event.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
                self.input(ch, host)
            }
            _ => Outcome::Pending,
        }
    }

    pub fn input(&mut self, ch: char, host: &mut dyn HintHost) -> Outcome {
        let Some(active) = self.active.as_mut() else {
            return Outcome::Inactive;
        };
        active.pending.extend(ch.to_lowercase());
        self.evaluate(host)
    }

    pub fn backspace(&mut self, host: &mut dyn HintHost) -> Outcome {
        let Some(active) = self.active.as_mut() else {
            return Outcome::Inactive;
        };
        active.pending.pop();
        self.evaluate(host)
    }

    /// Ends the session and re-selects the block that was selected before it began.
    pub fn cancel(&mut self, host: &mut dyn HintHost) -> Outcome {
        let Some(session) = self.teardown(host) else {
            return Outcome::Inactive;
        };
        if let Some(uuid) = session.prev_block {
            host.jump_to_block(&uuid);
        }
        debug!("hint session cancelled");
        Outcome::Cancelled
    }

    /// The capture element lost focus.
    pub fn blur(&mut self, host: &mut dyn HintHost) -> Outcome {
        let outcome = self.abort(host);
        if outcome == Outcome::Aborted {
            debug!("hint session aborted on blur");
        }
        outcome
    }

    fn abort(&mut self, host: &mut dyn HintHost) -> Outcome {
        match self.teardown(host) {
            Some(_) => Outcome::Aborted,
            None => Outcome::Inactive,
        }
    }

    fn evaluate(&mut self, host: &mut dyn HintHost) -> Outcome {
        let Some(active) = self.active.as_mut() else {
            return Outcome::Inactive;
        };

        let matched = match active.trie.resolve(&active.pending) {
            Resolution::Match(&target) => Some(target),
            Resolution::NoMatch => None,
            Resolution::Ambiguous => {
                for marker in &mut active.markers {
                    marker.visible = marker.label.starts_with(&active.pending);
                }
                return Outcome::Pending;
            }
        };

        let input = active.pending.clone();
        let Some(session) = self.teardown(host) else {
            return Outcome::Inactive;
        };
        match matched {
            Some(target) => {
                debug!(%target, input = %input, "hint matched");
                (session.on_match)(host, target);
                Outcome::Resolved(target)
            }
            None => {
                debug!(input = %input, "no hint matches input");
                Outcome::Aborted
            }
        }
    }

    /// Clears markers and input and releases the capture element.
    fn teardown(&mut self, host: &mut dyn HintHost) -> Option<ActiveSession> {
        let session = self.active.take()?;
        host.release_input();
        Some(session)
    }

    /// Markers still consistent with the typed prefix.
    pub fn markers(&self) -> impl Iterator<Item = &HintMarker> {
        self.active
            .iter()
            .flat_map(|s| s.markers.iter())
            .filter(|m| m.visible)
    }

    pub fn pending_input(&self) -> &str {
        self.active.as_ref().map_or("", |s| s.pending.as_str())
    }
}

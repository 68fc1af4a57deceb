use std::time::{Duration, Instant};

use crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace, warn};

use crate::actions::{HintHost, PointerEvent, PointerKind};
use crate::config::{Settings, SettingsUpdate};
use crate::dom::{Document, NodeSpec};
use crate::error::HintError;
use crate::models::{DomRect, ElementId, FocusArea};
use crate::modes::{CommandHost, ModeRegistry, Trackers, default_modes};
use crate::observer::Layout;
use crate::selector::Matchable;
use crate::session::{HintSession, Outcome};
use crate::shortcut::Shortcut;

pub const ROOT_ID: &str = "app-container";
const MESSAGE_TTL: Duration = Duration::from_secs(4);

#[derive(Clone, Debug)]
pub struct Command {
    pub id: String,
    pub label: String,
    pub shortcut: Shortcut,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaletteMatch {
    None,
    Pending,
    Command(String),
}

/// Registered commands plus the chords typed so far.
#[derive(Debug, Default)]
pub struct CommandPalette {
    commands: Vec<Command>,
    pending: Vec<KeyEvent>,
}

impl CommandPalette {
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn feed(&mut self, event: KeyEvent) -> PaletteMatch {
        self.pending.push(event);
        let result = self.check();
        if result != PaletteMatch::None || self.pending.len() == 1 {
            if result == PaletteMatch::None {
                self.pending.clear();
            }
            return result;
        }

        // the chord broke the pending sequence; it may still start a new one
        self.pending = vec![event];
        let result = self.check();
        if result == PaletteMatch::None {
            self.pending.clear();
        }
        result
    }

    fn check(&mut self) -> PaletteMatch {
        if let Some(cmd) = self.commands.iter().find(|c| c.shortcut.is_matched_by(&self.pending)) {
            let id = cmd.id.clone();
            self.pending.clear();
            return PaletteMatch::Command(id);
        }
        if self.commands.iter().any(|c| c.shortcut.starts_with(&self.pending)) {
            PaletteMatch::Pending
        } else {
            PaletteMatch::None
        }
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

/// Everything the outliner itself owns: the document, selection, editing and messages.
#[derive(Debug)]
pub struct HostState {
    pub document: Document,
    pub palette: CommandPalette,
    pub focus: FocusArea,
    pub selected: Option<ElementId>,
    pub editing: Option<ElementId>,
    pub current_page: Option<String>,
    pub sidebar_page: Option<String>,
    message: Option<(String, Instant)>,
}

impl HostState {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            palette: CommandPalette::default(),
            focus: FocusArea::Document,
            selected: None,
            editing: None,
            current_page: None,
            sidebar_page: None,
            message: None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message
            .as_ref()
            .filter(|(_, at)| at.elapsed() < MESSAGE_TTL)
            .map(|(msg, _)| msg.as_str())
    }

    pub fn blocks(&self) -> Vec<ElementId> {
        self.document
            .lines()
            .iter()
            .map(|l| l.block)
            .filter(|&b| self.document.attribute(b, "blockid").is_some())
            .collect()
    }

    pub fn select(&mut self, block: Option<ElementId>) {
        self.selected = block;
        if let Some(block) = block {
            self.document.scroll_into_view(block);
        }
    }

    /// Moves the selection `delta` blocks up or down the rendered order.
    pub fn move_selection(&mut self, delta: i32) {
        let blocks = self.blocks();
        if blocks.is_empty() {
            return;
        }
        let next = match self.selected.and_then(|s| blocks.iter().position(|&b| b == s)) {
            Some(i) => (i as i32 + delta).clamp(0, blocks.len() as i32 - 1) as usize,
            None if delta < 0 => blocks.len() - 1,
            None => 0,
        };
        self.select(Some(blocks[next]));
    }

    pub fn stop_editing(&mut self) {
        self.editing = None;
        if self.focus == FocusArea::Editing {
            self.focus = FocusArea::Document;
        }
    }

    /// Replaces the main area with `page`.
    pub fn navigate(&mut self, page: &str) {
        let Some(main) = self.document.get_element_by_id("main-content") else {
            self.show_msg("No main content area to navigate in");
            return;
        };
        let specs = self.page_specs(page);
        self.document.replace_children(main, &specs);
        self.document.scroll_by(-self.document.scroll_top());
        self.selected = None;
        self.stop_editing();
        self.current_page = Some(page.to_string());
        info!(page, "navigated");
    }

    /// Shows `page` in the right sidebar and returns its first block.
    pub fn open_in_sidebar(&mut self, page: &str) -> Option<ElementId> {
        let Some(sidebar) = self.document.get_element_by_id("right-sidebar") else {
            self.show_msg("No sidebar to open pages in");
            return None;
        };
        let specs = self.page_specs(page);
        let added = self.document.replace_children(sidebar, &specs);
        self.forget_detached();
        self.sidebar_page = Some(page.to_string());
        info!(page, "opened in sidebar");
        added.into_iter().find(|&b| self.document.attribute(b, "blockid").is_some())
    }

    /// Drops a selection or edit whose block is no longer in the document.
    fn forget_detached(&mut self) {
        if self.selected.is_some_and(|b| !self.document.is_attached(b)) {
            self.selected = None;
        }
        if self.editing.is_some_and(|b| !self.document.is_attached(b)) {
            self.stop_editing();
        }
    }

    fn page_specs(&self, page: &str) -> Vec<NodeSpec> {
        let mut specs = vec![NodeSpec::element("div").attr("class", "page-title").child(NodeSpec::text(page))];
        match self.document.page(page) {
            Some(blocks) => specs.extend(blocks.iter().cloned()),
            None => specs.push(
                NodeSpec::element("div")
                    .attr("class", "ls-block")
                    .attr("blockid", &format!("{page}-empty"))
                    .child(NodeSpec::text("(empty page)")),
            ),
        }
        specs
    }

    /// Page a clicked element points at: its `data-ref`, or a recent item's text.
    fn page_ref(&self, target: ElementId) -> Option<String> {
        if let Some(page) = self.document.attribute(target, "data-ref") {
            return Some(page.to_string());
        }
        let node = self.document.node(target)?;
        node.has_class("recent-item")
            .then(|| self.document.text_content(target).trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

impl Layout for HostState {
    fn viewport(&self) -> DomRect {
        self.document.viewport()
    }

    fn bounding_client_rect(&self, element: ElementId) -> Option<DomRect> {
        Layout::bounding_client_rect(&self.document, element)
    }
}

impl HintHost for HostState {
    fn current_block(&self) -> Option<String> {
        self.selected
            .and_then(|b| self.document.attribute(b, "blockid"))
            .map(str::to_string)
    }

    fn capture_input(&mut self) {
        self.palette.reset();
        self.focus = FocusArea::HintCapture;
    }

    fn release_input(&mut self) {
        self.focus = if self.editing.is_some() { FocusArea::Editing } else { FocusArea::Document };
    }

    fn jump_to_block(&mut self, uuid: &str) {
        match self.document.find_by_attribute("blockid", uuid) {
            Some(block) => {
                self.stop_editing();
                self.select(Some(block));
            }
            None => warn!(uuid, "jump to unknown block"),
        }
    }

    fn edit_block(&mut self, uuid: &str) {
        match self.document.find_by_attribute("blockid", uuid) {
            Some(block) => {
                self.select(Some(block));
                self.editing = Some(block);
                self.focus = FocusArea::Editing;
            }
            None => warn!(uuid, "edit of unknown block"),
        }
    }

    fn focus_element(&mut self, target: ElementId) {
        debug!(%target, "focus");
    }

    fn dispatch_pointer(&mut self, target: ElementId, event: PointerEvent) {
        if event.kind != PointerKind::Click {
            return;
        }
        let Some(page) = self.page_ref(target) else {
            if self.document.attribute(target, "blockid").is_some() {
                self.select(Some(target));
            }
            return;
        };
        if event.modifiers.shift {
            // follow the page into the sidebar
            if let Some(first) = self.open_in_sidebar(&page) {
                self.stop_editing();
                self.select(Some(first));
            }
        } else if event.modifiers.ctrl {
            // open in the background
            self.open_in_sidebar(&page);
        } else {
            self.navigate(&page);
        }
    }

    fn attribute(&self, target: ElementId, name: &str) -> Option<String> {
        self.document.attribute(target, name).map(str::to_string)
    }

    fn bounding_client_rect(&self, target: ElementId) -> Option<DomRect> {
        Layout::bounding_client_rect(&self.document, target)
    }

    fn show_msg(&mut self, msg: &str) {
        info!(msg, "message");
        self.message = Some((msg.to_string(), Instant::now()));
    }
}

impl CommandHost for HostState {
    fn register_command(&mut self, id: &str, label: &str, shortcut: Shortcut) {
        self.palette.commands.retain(|c| c.id != id);
        self.palette.commands.push(Command { id: id.to_string(), label: label.to_string(), shortcut });
    }

    fn unregister_command(&mut self, id: &str) {
        self.palette.commands.retain(|c| c.id != id);
        self.palette.reset();
    }
}

pub struct App {
    pub host: HostState,
    pub trackers: Option<Trackers>,
    pub registry: ModeRegistry,
    pub session: HintSession,
}

impl App {
    /// Wires trackers and modes to the document. A missing root disables hinting only.
    pub fn new(document: Document, settings: Settings) -> Self {
        let mut host = HostState::new(document);
        let mut registry = ModeRegistry::new(default_modes(), settings);

        let trackers = match host.document.get_element_by_id(ROOT_ID) {
            Some(root) => match Trackers::create(&host.document, root) {
                Ok(mut trackers) => {
                    trackers.update(&host.document, &[]);
                    Some(trackers)
                }
                Err(e) => {
                    error!(error = %e, "failed to create trackers");
                    None
                }
            },
            None => None,
        };

        match trackers {
            Some(_) => {
                for e in registry.register_all(&mut host) {
                    warn!(error = %e, "mode not registered");
                    host.show_msg(&format!("Link Hints: {e}"));
                }
                if host.message().is_none() {
                    host.show_msg("Link Hints loaded!");
                }
            }
            None => {
                let e = HintError::RootNotFound(ROOT_ID.to_string());
                error!(error = %e, "hinting disabled");
                host.show_msg(&format!("Link Hints Error: {e}"));
            }
        }
        // the initial scan already saw the whole tree
        host.document.take_mutations();

        Self { host, trackers, registry, session: HintSession::new() }
    }

    /// Delivers pending tree changes and layout to the trackers, then frees what they dropped.
    pub fn pump(&mut self) {
        let records = self.host.document.take_mutations();
        if let Some(trackers) = self.trackers.as_mut() {
            trackers.update(&self.host.document, &records);
        }
        self.host.forget_detached();
        let freed = self.host.document.collect_garbage();
        if freed > 0 {
            trace!(freed, slots = self.host.document.arena_len(), "reclaimed removed nodes");
        }
    }

    pub async fn trigger(&mut self, id: &str) {
        let Some(trackers) = self.trackers.as_ref() else {
            return;
        };
        if let Err(e) = self.registry.trigger(id, trackers, &mut self.session, &mut self.host).await {
            warn!(mode = id, error = %e, "could not start hinting");
            self.host.show_msg(&format!("Link Hints: {e}"));
        }
    }

    /// Feeds a key to the active session; returns `false` when no session is running.
    pub fn hint_key(&mut self, key: &KeyEvent) -> bool {
        let outcome = self.session.handle_key(key, &mut self.host);
        match outcome {
            Outcome::Inactive => return false,
            Outcome::Resolved(target) => debug!(%target, "hint resolved"),
            Outcome::Aborted | Outcome::Cancelled | Outcome::Pending => {}
        }
        self.pump();
        true
    }

    pub fn blur(&mut self) {
        if self.session.blur(&mut self.host) == Outcome::Aborted {
            self.pump();
        }
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.host.document.resize(i32::from(width), i32::from(height));
        self.pump();
    }

    pub fn scroll(&mut self, delta: i32) {
        self.host.document.scroll_by(delta);
        self.pump();
    }

    /// Unbinds every mode and stops tracking.
    pub fn shutdown(&mut self) {
        let ids: Vec<&'static str> = default_modes().iter().map(|m| m.id).collect();
        for id in ids {
            self.registry.unregister(id, &mut self.host);
        }
        if let Some(trackers) = self.trackers.as_mut() {
            trackers.dispose();
        }
        self.session.blur(&mut self.host);
    }

    /// Reconciles a debounced settings reload with the registered shortcuts.
    pub fn apply_settings(&mut self, update: SettingsUpdate) {
        match update {
            Ok(settings) => {
                if self.trackers.is_none() {
                    return;
                }
                let (changed, errors) = self.registry.reconcile(settings, &mut self.host);
                info!(?changed, "settings applied");
                for e in errors {
                    self.host.show_msg(&format!("Link Hints: {e}"));
                }
            }
            Err(e) => self.host.show_msg(&format!("Link Hints: invalid settings: {e}")),
        }
    }
}

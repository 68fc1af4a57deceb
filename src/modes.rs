use std::collections::HashMap;

use tracing::{debug, info};

use crate::actions::{Action, ActionFn, HintHost, NamedAction};
use crate::config::{Settings, SettingsKey};
use crate::error::HintError;
use crate::models::ElementId;
use crate::observer::{ElementTree, Layout, MutationRecord};
use crate::selector::Selector;
use crate::session::HintSession;
use crate::shortcut::Shortcut;
use crate::tracker::VisibilityTracker;

/// Which tracked element set a mode hints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Targets {
    Links,
    Blocks,
}

impl Targets {
    pub fn selector(self) -> &'static str {
        match self {
            Targets::Links => ".page-ref, .recent-item",
            Targets::Blocks => ".ls-block",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Mode {
    pub id: &'static str,
    pub description: &'static str,
    pub keybind: SettingsKey,
    pub action: Action,
    pub targets: Targets,
}

pub fn default_modes() -> Vec<Mode> {
    vec![
        Mode {
            id: "link-hints-click",
            description: "Link Hints: Click",
            keybind: SettingsKey::Click,
            action: Action::Named(NamedAction::Click),
            targets: Targets::Links,
        },
        Mode {
            id: "link-hints-shift-click",
            description: "Link Hints: Shift Click",
            keybind: SettingsKey::ShiftClick,
            action: Action::Named(NamedAction::ShiftClick),
            targets: Targets::Links,
        },
        Mode {
            id: "link-hints-ctrl-click",
            description: "Link Hints: Ctrl Click",
            keybind: SettingsKey::CtrlClick,
            action: Action::Named(NamedAction::CtrlClick),
            targets: Targets::Links,
        },
        Mode {
            id: "link-hints-edit-block",
            description: "Link Hints: Edit Block",
            keybind: SettingsKey::EditBlock,
            action: Action::Named(NamedAction::EditBlock),
            targets: Targets::Blocks,
        },
        Mode {
            id: "link-hints-jump-to-block",
            description: "Link Hints: Jump to Block",
            keybind: SettingsKey::JumpToBlock,
            action: Action::Named(NamedAction::JumpToBlock),
            targets: Targets::Blocks,
        },
    ]
}

/// The host's command facility, where mode shortcuts get bound.
pub trait CommandHost {
    fn register_command(&mut self, id: &str, label: &str, shortcut: Shortcut);
    fn unregister_command(&mut self, id: &str);
}

/// One long-lived tracker per target set.
#[derive(Debug)]
pub struct Trackers {
    links: VisibilityTracker,
    blocks: VisibilityTracker,
}

impl Trackers {
    pub fn create<T: ElementTree + ?Sized>(tree: &T, root: ElementId) -> Result<Self, HintError> {
        Ok(Self {
            links: VisibilityTracker::create(tree, root, Selector::parse(Targets::Links.selector())?),
            blocks: VisibilityTracker::create(tree, root, Selector::parse(Targets::Blocks.selector())?),
        })
    }

    pub fn get(&self, targets: Targets) -> &VisibilityTracker {
        match targets {
            Targets::Links => &self.links,
            Targets::Blocks => &self.blocks,
        }
    }

    /// Feeds the same mutations to every tracker, then re-evaluates intersections.
    pub fn update<T: ElementTree + Layout + ?Sized>(&mut self, tree: &T, records: &[MutationRecord]) {
        for tracker in [&mut self.links, &mut self.blocks] {
            if !records.is_empty() {
                tracker.process_mutations(tree, records);
            }
            tracker.refresh(tree);
        }
    }

    pub fn dispose(&mut self) {
        self.links.dispose();
        self.blocks.dispose();
    }
}

/// Binds modes to shortcuts and starts sessions when one fires.
pub struct ModeRegistry {
    modes: Vec<Mode>,
    settings: Settings,
    bound: HashMap<&'static str, (Shortcut, ActionFn)>,
}

impl ModeRegistry {
    pub fn new(modes: Vec<Mode>, settings: Settings) -> Self {
        Self { modes, settings, bound: HashMap::new() }
    }

    #[cfg(test)]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[cfg(test)]
    pub fn shortcut(&self, id: &str) -> Option<&Shortcut> {
        self.bound.get(id).map(|(shortcut, _)| shortcut)
    }

    pub fn register(&mut self, id: &str, host: &mut dyn CommandHost) -> Result<(), HintError> {
        let mode = self
            .modes
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| HintError::UnknownMode(id.to_string()))?;
        let binding = self.settings.shortcut(mode.keybind);
        let shortcut = Shortcut::parse(binding)
            .map_err(|e| HintError::InvalidShortcut(format!("{} (`{binding}`): {e}", mode.description)))?;

        host.register_command(mode.id, mode.description, shortcut.clone());
        info!(mode = mode.id, shortcut = %shortcut, "registered mode");
        self.bound.insert(mode.id, (shortcut, mode.action.callback()));
        Ok(())
    }

    pub fn unregister(&mut self, id: &str, host: &mut dyn CommandHost) {
        if self.bound.remove(id).is_some() {
            host.unregister_command(id);
            info!(mode = id, "unregistered mode");
        }
    }

    /// Registers every mode; modes with a bad shortcut stay unbound and are reported.
    pub fn register_all(&mut self, host: &mut dyn CommandHost) -> Vec<HintError> {
        let ids: Vec<&'static str> = self.modes.iter().map(|m| m.id).collect();
        ids.into_iter()
            .filter_map(|id| self.register(id, host).err())
            .collect()
    }

    /// Applies new settings, re-binding only the modes whose shortcut changed.
    pub fn reconcile(&mut self, settings: Settings, host: &mut dyn CommandHost) -> (Vec<&'static str>, Vec<HintError>) {
        let changed: Vec<&'static str> = self
            .modes
            .iter()
            .filter(|m| self.settings.shortcut(m.keybind) != settings.shortcut(m.keybind))
            .map(|m| m.id)
            .collect();
        if self.settings.hint_keys != settings.hint_keys {
            debug!(hint_keys = %settings.hint_keys, "hint keys changed");
        }
        self.settings = settings;

        let mut errors = Vec::new();
        for &id in &changed {
            self.unregister(id, host);
            if let Err(e) = self.register(id, host) {
                errors.push(e);
            }
        }
        (changed, errors)
    }

    /// Snapshots the mode's targets and begins a session with its action.
    pub async fn trigger<H: HintHost + Layout>(
        &self,
        id: &str,
        trackers: &Trackers,
        session: &mut HintSession,
        host: &mut H,
    ) -> Result<(), HintError> {
        let mode = self
            .modes
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| HintError::UnknownMode(id.to_string()))?;
        let on_match = match self.bound.get(id) {
            Some((_, callback)) => callback.clone(),
            None => mode.action.callback(),
        };

        let snapshot = trackers.get(mode.targets).snapshot(&*host).await;
        debug!(mode = id, candidates = snapshot.len(), "mode triggered");
        session.begin(&snapshot, &host.viewport(), &self.settings.hint_keys, on_match, host)
    }
}

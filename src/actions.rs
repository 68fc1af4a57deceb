use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::models::{DomRect, ElementId, Modifiers};

/// The host capabilities a hinting session and its actions need.
pub trait HintHost {
    /// Uuid of the block that is selected before hinting starts, if any.
    fn current_block(&self) -> Option<String>;
    /// Routes every keystroke to the hint capture element.
    fn capture_input(&mut self);
    fn release_input(&mut self);
    fn jump_to_block(&mut self, uuid: &str);
    fn edit_block(&mut self, uuid: &str);
    fn focus_element(&mut self, target: ElementId);
    fn dispatch_pointer(&mut self, target: ElementId, event: PointerEvent);
    fn attribute(&self, target: ElementId, name: &str) -> Option<String>;
    fn bounding_client_rect(&self, target: ElementId) -> Option<DomRect>;
    fn show_msg(&mut self, msg: &str);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    MouseDown,
    MouseUp,
    Click,
}

/// A synthetic pointer event, shaped after `MouseEvent` init options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub client_x: i32,
    pub client_y: i32,
    pub buttons: u8,
    pub detail: u8,
    pub modifiers: Modifiers,
}

pub type ActionFn = Rc<dyn Fn(&mut dyn HintHost, ElementId)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NamedAction {
    Click,
    ShiftClick,
    CtrlClick,
    EditBlock,
    JumpToBlock,
}

impl NamedAction {
    pub fn run(self, host: &mut dyn HintHost, target: ElementId) {
        match self {
            NamedAction::Click => click_with(host, target, Modifiers::NONE),
            NamedAction::ShiftClick => click_with(host, target, Modifiers::SHIFT),
            NamedAction::CtrlClick => click_with(host, target, Modifiers::CTRL),
            NamedAction::EditBlock => edit_block(host, target),
            NamedAction::JumpToBlock => jump_to_block(host, target),
        }
    }
}

/// What to do with the element a session resolves to.
#[derive(Clone)]
pub enum Action {
    Named(NamedAction),
    Custom(ActionFn),
}

impl Action {
    pub fn custom(f: impl Fn(&mut dyn HintHost, ElementId) + 'static) -> Self {
        Action::Custom(Rc::new(f))
    }

    /// Resolves either variant to a callable.
    pub fn callback(&self) -> ActionFn {
        match self {
            Action::Named(named) => {
                let named = *named;
                Rc::new(move |host: &mut dyn HintHost, target| named.run(host, target))
            }
            Action::Custom(f) => Rc::clone(f),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Named(named) => f.debug_tuple("Named").field(named).finish(),
            Action::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Focuses `target`, then sends mousedown, mouseup and click at its left edge.
pub fn click_with(host: &mut dyn HintHost, target: ElementId, modifiers: Modifiers) {
    let rect = host.bounding_client_rect(target).unwrap_or_default();
    let client_x = rect.left;
    let client_y = (f64::from(rect.top) + f64::from(rect.height) / 2.0).round() as i32;
    let event = |kind, buttons| PointerEvent { kind, client_x, client_y, buttons, detail: 1, modifiers };

    host.focus_element(target);
    host.dispatch_pointer(target, event(PointerKind::MouseDown, 1));
    host.dispatch_pointer(target, event(PointerKind::MouseUp, 0));
    host.dispatch_pointer(target, event(PointerKind::Click, 0));
    debug!(%target, ?modifiers, client_x, client_y, "dispatched click");
}

pub fn edit_block(host: &mut dyn HintHost, target: ElementId) {
    match host.attribute(target, "blockid") {
        Some(uuid) => host.edit_block(&uuid),
        None => warn!(%target, "edit block: element has no blockid"),
    }
}

pub fn jump_to_block(host: &mut dyn HintHost, target: ElementId) {
    match host.attribute(target, "blockid") {
        Some(uuid) => host.jump_to_block(&uuid),
        None => warn!(%target, "jump to block: element has no blockid"),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingHost;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn shift_click_sends_the_full_pointer_sequence() {
        let mut host = RecordingHost::default();
        host.rects.insert(ElementId(3), DomRect::new(10, 4, 6, 3));
        Action::Named(NamedAction::ShiftClick).callback()(&mut host, ElementId(3));

        assert_eq!(host.calls, vec!["focus #3".to_string()]);
        let kinds: Vec<_> = host.pointer.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![PointerKind::MouseDown, PointerKind::MouseUp, PointerKind::Click]);
        assert_eq!(host.pointer[0].buttons, 1);
        for event in &host.pointer {
            assert_eq!((event.client_x, event.client_y), (10, 6));
            assert_eq!(event.modifiers, Modifiers::SHIFT);
            assert_eq!(event.detail, 1);
        }
    }

    #[test]
    fn block_actions_use_the_blockid_attribute() {
        let mut host = RecordingHost::default();
        host.attrs.insert((ElementId(1), "blockid".into()), "abc".into());
        NamedAction::EditBlock.run(&mut host, ElementId(1));
        NamedAction::JumpToBlock.run(&mut host, ElementId(1));
        NamedAction::JumpToBlock.run(&mut host, ElementId(2));
        assert_eq!(host.calls, vec!["edit abc".to_string(), "jump abc".to_string()]);
    }

    #[test]
    fn custom_actions_are_called_as_given() {
        let mut host = RecordingHost::default();
        let action = Action::custom(|host, target| host.show_msg(&format!("got {target}")));
        action.callback()(&mut host, ElementId(9));
        assert_eq!(host.calls, vec!["msg got #9".to_string()]);
    }
}

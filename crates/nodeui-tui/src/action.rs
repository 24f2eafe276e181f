//! Requests produced by key handling.

use nodeui_core::{CatchupAction, Event, NavigationEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Navigate(NavigationEvent),
    Catchup(CatchupAction),
}

impl Action {
    /// The dashboard event this action stands for, if any.
    pub fn into_event(self) -> Option<Event> {
        match self {
            Action::Quit => None,
            Action::Navigate(nav) => Some(Event::Navigate(nav)),
            Action::Catchup(action) => Some(Event::CatchupRequested(action)),
        }
    }
}

//! Frontend state that is not part of the dashboard: tabs, scrolling, theme.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use nodeui_core::{CatchupAction, NavigationEvent};

use crate::action::Action;
use crate::log_buffer::LogBuffer;
use crate::theme::{Palette, Theme};

/// Lines moved per PgUp/PgDn in the log pane.
const LOG_PAGE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Explorer,
    Utilities,
    Accounts,
    Configuration,
    Help,
}

impl View {
    pub fn all() -> &'static [View] {
        &[
            View::Explorer,
            View::Utilities,
            View::Accounts,
            View::Configuration,
            View::Help,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            View::Explorer => "EXPLORER",
            View::Utilities => "UTILITIES",
            View::Accounts => "ACCOUNTS",
            View::Configuration => "CONFIGURATION",
            View::Help => "HELP",
        }
    }

    pub fn index(&self) -> usize {
        View::all().iter().position(|v| v == self).unwrap_or(0)
    }

    fn offset(&self, by: isize) -> View {
        let all = View::all();
        let len = all.len() as isize;
        all[(self.index() as isize + by).rem_euclid(len) as usize]
    }
}

pub struct App {
    pub palette: Palette,
    pub view: View,
    pub log_buffer: LogBuffer,
    /// Lines scrolled back from the newest log line.
    pub log_scroll: usize,
    /// The node's `config.json`, when a data directory was given.
    pub node_config: Option<String>,
    /// Scroll offset for the text tabs.
    pub text_scroll: usize,
    tick_count: u64,
}

impl App {
    pub fn new(theme: Theme, log_buffer: LogBuffer, node_config: Option<String>) -> Self {
        Self {
            palette: theme.palette(),
            view: View::default(),
            log_buffer,
            log_scroll: 0,
            node_config,
            text_scroll: 0,
            tick_count: 0,
        }
    }

    pub fn tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    fn set_view(&mut self, view: View) {
        if self.view != view {
            self.view = view;
            self.text_scroll = 0;
        }
    }

    /// Map a key press to an action, applying purely local effects directly.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }

        match key.code {
            KeyCode::Char('q') => return Some(Action::Quit),
            KeyCode::Tab => self.set_view(self.view.offset(1)),
            KeyCode::BackTab => self.set_view(self.view.offset(-1)),
            KeyCode::Char('?') => self.set_view(View::Help),
            KeyCode::Char('f') => return Some(Action::Catchup(CatchupAction::Start)),
            KeyCode::Char('a') => return Some(Action::Catchup(CatchupAction::Stop)),
            KeyCode::PageUp => {
                let max = self.log_buffer.len().saturating_sub(1);
                self.log_scroll = (self.log_scroll + LOG_PAGE).min(max);
            }
            KeyCode::PageDown => self.log_scroll = self.log_scroll.saturating_sub(LOG_PAGE),
            _ => return self.handle_view_key(key),
        }
        None
    }

    fn handle_view_key(&mut self, key: KeyEvent) -> Option<Action> {
        if self.view == View::Explorer {
            let nav = match key.code {
                KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => NavigationEvent::Forward,
                KeyCode::Esc | KeyCode::Left | KeyCode::Char('h') => NavigationEvent::Back,
                KeyCode::Up | KeyCode::Char('k') => NavigationEvent::Up,
                KeyCode::Down | KeyCode::Char('j') => NavigationEvent::Down,
                KeyCode::Home | KeyCode::Char('g') => NavigationEvent::Top,
                KeyCode::End | KeyCode::Char('G') => NavigationEvent::Bottom,
                _ => return None,
            };
            return Some(Action::Navigate(nav));
        }

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.text_scroll = self.text_scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.text_scroll = self.text_scroll.saturating_add(1),
            KeyCode::Home | KeyCode::Char('g') => self.text_scroll = 0,
            _ => {}
        }
        None
    }
}

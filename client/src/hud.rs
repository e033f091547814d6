//! State the user interface reads: chat, the open container, end of game.

use shared::{InventoryId, Vec3};
use std::collections::VecDeque;

/// Chat lines kept for display.
pub const CHAT_HISTORY: usize = 100;

/// Effects kept for the presentation layer between frames.
pub const EFFECT_HISTORY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub sender: String,
    pub text: String,
    pub private: bool,
}

#[derive(Debug, Default)]
pub struct HudState {
    pub chat_log: VecDeque<ChatLine>,
    /// Container the local player has open
    pub open_container: Option<InventoryId>,
    /// Last container the local player was refused
    pub denied_container: Option<InventoryId>,
    pub game_over: Option<String>,
    pub recent_effects: VecDeque<(String, Vec3)>,
    /// Rendering-performance flag passed through from the launcher
    pub low_graphics: bool,
}

impl HudState {
    pub fn new(low_graphics: bool) -> Self {
        Self {
            low_graphics,
            ..Self::default()
        }
    }

    pub fn push_chat(&mut self, sender: &str, text: &str, private: bool) {
        if self.chat_log.len() == CHAT_HISTORY {
            self.chat_log.pop_front();
        }
        self.chat_log.push_back(ChatLine {
            sender: sender.to_string(),
            text: text.to_string(),
            private,
        });
    }

    pub fn push_effect(&mut self, name: String, position: Vec3) {
        let limit = if self.low_graphics { EFFECT_HISTORY / 4 } else { EFFECT_HISTORY };
        while self.recent_effects.len() >= limit {
            self.recent_effects.pop_front();
        }
        self.recent_effects.push_back((name, position));
    }

    pub fn last_chat(&self) -> Option<&ChatLine> {
        self.chat_log.back()
    }
}

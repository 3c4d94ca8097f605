use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    card::Card, error::EngineError, game_state::Snapshot, user_name::Username,
};

/// Authoritative events, as broadcast by the room to its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Event {
    Joined {
        username: Username,
    },
    Left {
        username: Username,
    },
    StartGame {},
    GameState {
        snapshot: Snapshot,
    },
    FinishRound {
        newplayer: Username,
        deckcount: usize,
        cardcounts: BTreeMap<Username, usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cards: Option<Vec<Card>>,
    },
    FinishGame {
        loser: Option<Username>,
    },
    ThrowCards {
        player: Username,
        cards: Vec<Card>,
    },
    TakeCards {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player: Option<Username>,
    },
    BreakCards {
        username: Username,
    },
    BreakCard {
        player: Username,
        bottomcard: Card,
        topcard: Card,
    },
    MoveTopCard {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player: Option<Username>,
        topcard: Card,
        new_bottomcard: Card,
    },
    PassCards {
        player: Username,
        newplayer: Username,
        cards: Vec<Card>,
    },
    PassTrump {
        newplayer: Username,
    },
    AllowBreak {
        player: Username,
    },
    StealTrump {
        player: Username,
        card: Card,
    },
    PutIntoDeck {
        player: Username,
        cards: Vec<Card>,
    },
    CallCheat {
        player: Username,
        cheater: Username,
        revert: bool,
    },
    /// Sent only to the player whose intent was refused.
    RejectMove {
        player: Username,
        reason: String,
        intent: Intent,
    },
}

impl Event {
    /// Unknown tags and malformed payloads put the replica out of sync.
    pub fn from_json(text: &str) -> Result<Self, EngineError> {
        serde_json::from_str(text)
            .map_err(|e| EngineError::invariant(format!("malformed event: {}", e)))
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(self).map_err(|e| EngineError::invariant(e.to_string()))
    }
}

/// What a participant asks the room to do. The room adds the acting player
/// and anything else only it can decide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Intent {
    Join {},
    Leave {},
    StartGame {},
    ThrowCards { cards: Vec<Card> },
    TakeCards {},
    BreakCards {},
    BreakCard { bottomcard: Card, topcard: Card },
    MoveTopCard { topcard: Card, new_bottomcard: Card },
    PassCards { cards: Vec<Card> },
    PassTrump {},
    AllowBreak {},
    StealTrump { card: Card },
    PutIntoDeck { cards: Vec<Card> },
    CallCheat { cheater: Username },
}

impl Intent {
    pub fn from_json(text: &str) -> Result<Self, EngineError> {
        serde_json::from_str(text)
            .map_err(|e| EngineError::invariant(format!("malformed intent: {}", e)))
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(self).map_err(|e| EngineError::invariant(e.to_string()))
    }

    /// Whether `event` is the room's confirmation of this intent sent by `me`.
    pub fn is_echoed_by(&self, event: &Event, me: &Username, current: Option<&Username>) -> bool {
        let mine = |p: &Username| p == me;
        let same_cards = |a: &[Card], b: &[Card]| {
            a.len() == b.len() && a.iter().all(|c| b.contains(c))
        };
        match (self, event) {
            (Intent::ThrowCards { cards }, Event::ThrowCards { player, cards: c }) => {
                mine(player) && same_cards(cards, c)
            }
            (Intent::TakeCards {}, Event::TakeCards { player }) => {
                player.as_ref().or(current).map_or(false, mine)
            }
            (Intent::BreakCards {}, Event::BreakCards { username }) => mine(username),
            (
                Intent::BreakCard {
                    bottomcard,
                    topcard,
                },
                Event::BreakCard {
                    player,
                    bottomcard: b,
                    topcard: t,
                },
            ) => mine(player) && bottomcard == b && topcard == t,
            (
                Intent::MoveTopCard {
                    topcard,
                    new_bottomcard,
                },
                Event::MoveTopCard {
                    player,
                    topcard: t,
                    new_bottomcard: b,
                },
            ) => player.as_ref().or(current).map_or(false, mine) && topcard == t && new_bottomcard == b,
            (Intent::PassCards { cards }, Event::PassCards { player, cards: c, .. }) => {
                mine(player) && same_cards(cards, c)
            }
            (Intent::PassTrump {}, Event::PassTrump { .. }) => current.map_or(false, mine),
            (Intent::AllowBreak {}, Event::AllowBreak { player }) => mine(player),
            (Intent::StealTrump { card }, Event::StealTrump { player, card: c }) => {
                mine(player) && card == c
            }
            (Intent::PutIntoDeck { cards }, Event::PutIntoDeck { player, cards: c }) => {
                mine(player) && same_cards(cards, c)
            }
            (Intent::CallCheat { cheater }, Event::CallCheat { player, cheater: c, .. }) => {
                mine(player) && cheater == c
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventVisibility {
    Public,
    Private(Username),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEntry {
    pub visibility: EventVisibility,
    pub event: Event,
}

impl EventEntry {
    pub fn public(event: Event) -> Self {
        EventEntry {
            visibility: EventVisibility::Public,
            event,
        }
    }

    pub fn private(player: Username, event: Event) -> Self {
        EventEntry {
            visibility: EventVisibility::Private(player),
            event,
        }
    }

    pub fn is_visible_to(&self, viewer: &Username) -> bool {
        match &self.visibility {
            EventVisibility::Public => true,
            EventVisibility::Private(p) => p == viewer,
        }
    }
}

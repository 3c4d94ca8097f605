use std::{str::FromStr, time::Instant};

use itertools::Itertools;

use durak_core::{
    card::Card,
    event::{Event, Intent},
    game_state::GameState,
    play::PlayerAction,
    replica::{Replica, Update},
    user_name::Username,
};

static RULES: &str = "
*** Durak ***
Get rid of all your cards; the last player holding cards loses. The current player defends: every
card thrown onto the table has to be broken with a higher card of the same suit or with a trump.
The neighbours of the current player may throw more cards of ranks already on the table. The
defender either breaks everything and breaks out, takes all cards on the table, or passes the
table on to the next player by adding a card of the same rank (or by showing the matching trump).
Cheating is possible: steal the trump card, put cards back into the deck, throw or pass cards that
do not fit. Anyone who notices can call the cheat within a few seconds to have it undone.";

static COMMANDS: &str = "
  <card>          select or unselect a hand card, e.g. 7h or card12S
  top <card>      select a top card on the table
  x               clear the selection
  throw           throw the selected cards
  break <card>    break the given table card with the selected card
  move <card>     move the selected top card onto the given table card
  take            take all cards on the table
  out             break out once every card is covered
  pass            pass the table on with the selected cards
  passtrump       pass the table on by showing the trump
  allow           allow the current player to break out
  steal           swap the selected card with the trump card
  deck            put the selected cards into the deck
  cheat <name>    call a cheat
  start           start a game
  s               show the table
  r               rules
  h               this help
  q               quit";

#[derive(Debug, PartialEq)]
pub enum CliAction {
    Quit,
    Rules,
    Help,
    Show,
    StartGame,
    Select(Card),
    SelectTop(Card),
    Retract,
    Throw,
    Break(Card),
    Move(Card),
    Take,
    BreakOut,
    Pass,
    PassTrump,
    AllowBreak,
    Steal,
    PutIntoDeck,
    CallCheat(Username),
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseActionError;

impl FromStr for CliAction {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = s.split_whitespace().collect();
        let card = |w: &str| Card::from_str(w).map_err(|_| ParseActionError);
        match words.as_slice() {
            ["q"] => Ok(CliAction::Quit),
            ["r"] => Ok(CliAction::Rules),
            ["h"] => Ok(CliAction::Help),
            ["s"] => Ok(CliAction::Show),
            ["start"] => Ok(CliAction::StartGame),
            ["x"] => Ok(CliAction::Retract),
            ["throw"] => Ok(CliAction::Throw),
            ["take"] => Ok(CliAction::Take),
            ["out"] => Ok(CliAction::BreakOut),
            ["pass"] => Ok(CliAction::Pass),
            ["passtrump"] => Ok(CliAction::PassTrump),
            ["allow"] => Ok(CliAction::AllowBreak),
            ["steal"] => Ok(CliAction::Steal),
            ["deck"] => Ok(CliAction::PutIntoDeck),
            ["top", c] => card(*c).map(CliAction::SelectTop),
            ["break", c] => card(*c).map(CliAction::Break),
            ["move", c] => card(*c).map(CliAction::Move),
            ["cheat", name] => Ok(CliAction::CallCheat(Username::from(*name))),
            [c] => card(*c).map(CliAction::Select),
            _ => Err(ParseActionError),
        }
    }
}

pub struct CliPlayer;

impl CliPlayer {
    /// Runs one typed command. Returns the intent to send, if any.
    pub fn handle(&self, action: CliAction, replica: &mut Replica, now: Instant) -> Option<Intent> {
        let selection = replica.selection().clone();
        let move_action = match action {
            CliAction::Quit => return None,
            CliAction::Rules => {
                println!("{}", RULES);
                return None;
            }
            CliAction::Help => {
                println!("{}", COMMANDS);
                return None;
            }
            CliAction::Show => {
                self.show(replica);
                return None;
            }
            CliAction::StartGame => return Some(Intent::StartGame {}),
            CliAction::Select(card) => {
                replica.selection_mut().toggle(card);
                self.show_selection(replica);
                return None;
            }
            CliAction::SelectTop(card) => {
                replica.selection_mut().toggle_top(card);
                self.show_selection(replica);
                return None;
            }
            CliAction::Retract => {
                replica.selection_mut().retract();
                return None;
            }
            CliAction::Throw => selection.throw(),
            CliAction::Break(bottom) => selection.break_onto(bottom),
            CliAction::Move(bottom) => selection.move_top_onto(bottom),
            CliAction::Take => PlayerAction::Take,
            CliAction::BreakOut => PlayerAction::BreakOut,
            CliAction::Pass => selection.pass(),
            CliAction::PassTrump => PlayerAction::PassWithTrump,
            CliAction::AllowBreak => PlayerAction::AllowBreak,
            CliAction::Steal => selection.steal_trump(),
            CliAction::PutIntoDeck => selection.put_into_deck(),
            CliAction::CallCheat(cheater) => PlayerAction::CallCheat { cheater },
        };
        match replica.submit(&move_action, now) {
            Ok(intent) => Some(intent),
            Err(e) => {
                println!("! {}", e);
                None
            }
        }
    }

    fn show_selection(&self, replica: &Replica) {
        let selection = replica.selection();
        println!(
            "selected: [{}]{}",
            selection.cards().iter().join(" "),
            selection
                .top_card()
                .map(|c| format!(", top card {}", c))
                .unwrap_or_default()
        );
    }

    pub fn show(&self, replica: &Replica) {
        match replica.view() {
            Some(view) => println!("{}", self.format_state(&view, replica.me())),
            None => println!(
                "lobby: {} ({:?})",
                replica.roster().iter().join(", "),
                replica.status()
            ),
        }
    }

    pub fn format_state(&self, state: &GameState, me: &Username) -> String {
        let players = state
            .players()
            .iter()
            .map(|p| {
                let marker = if state.is_current(p) { "*" } else { "" };
                format!("{}{} ({})", marker, p, state.count_for(p))
            })
            .join(", ");
        let table = state
            .table()
            .pairs()
            .iter()
            .map(|pair| match pair.top() {
                Some(top) => format!("{}/{}", pair.bottom(), top),
                None => pair.bottom().to_string(),
            })
            .join(" ");
        let hand = state
            .cards_for(me, me)
            .map(|cards| cards.iter().sorted().join(" "))
            .unwrap_or_default();
        format!(
            "players: {}\ntrump: {} | deck: {}\ntable: [{}]\nhand: [{}]",
            players,
            state
                .deck()
                .trump()
                .map(|c| c.to_string())
                .or_else(|| state.deck().trump_suit().map(|s| s.to_string()))
                .unwrap_or_default(),
            state.deck().visible_count(),
            table,
            hand
        )
    }

    pub fn print_event(&self, event: &Event) {
        match event {
            Event::Joined { username } => println!("~ {} joined", username),
            Event::Left { username } => println!("~ {} left", username),
            Event::StartGame {} => println!("~ game starts"),
            Event::GameState { .. } => println!("~ table dealt"),
            Event::FinishRound {
                newplayer,
                deckcount,
                ..
            } => println!(
                "~ round over, {} defends, {} cards left in the deck",
                newplayer, deckcount
            ),
            Event::FinishGame { loser } => match loser {
                Some(loser) => println!("~ game over, {} is the durak", loser),
                None => println!("~ game over, nobody lost"),
            },
            Event::ThrowCards { player, cards } => {
                println!("~ {} throws {}", player, cards.iter().join(" "))
            }
            Event::TakeCards { player } => match player {
                Some(player) => println!("~ {} takes the table", player),
                None => println!("~ the table is taken"),
            },
            Event::BreakCards { username } => println!("~ {} breaks out", username),
            Event::BreakCard {
                player,
                bottomcard,
                topcard,
            } => println!("~ {} breaks {} with {}", player, bottomcard, topcard),
            Event::MoveTopCard {
                topcard,
                new_bottomcard,
                ..
            } => println!("~ {} moved onto {}", topcard, new_bottomcard),
            Event::PassCards {
                player,
                newplayer,
                cards,
            } => println!(
                "~ {} passes to {} with {}",
                player,
                newplayer,
                cards.iter().join(" ")
            ),
            Event::PassTrump { newplayer } => println!("~ passed to {} with the trump", newplayer),
            Event::AllowBreak { player } => println!("~ {} allows the break", player),
            Event::StealTrump { player, card } => {
                println!("~ {} swapped {} with the trump card", player, card)
            }
            Event::PutIntoDeck { player, cards } => {
                println!("~ {} put {} cards into the deck", player, cards.len())
            }
            Event::CallCheat {
                player,
                cheater,
                revert,
            } => println!(
                "~ {} calls {} a cheat: {}",
                player,
                cheater,
                if *revert { "caught" } else { "nothing to undo" }
            ),
            Event::RejectMove { .. } => {}
        }
    }

    pub fn print_update(&self, update: &Update) {
        match update {
            Update::Rejected { reason, .. } => println!("! rejected: {}", reason),
            Update::Resynced => println!("(synchronized)"),
            _ => {}
        }
    }
}

pub mod card;
pub mod cheat;
pub mod config;
pub mod deck;
pub mod error;
pub mod event;
mod game_logic;
pub mod game_state;
pub mod hand;
pub mod pair;
pub mod play;
pub mod replica;
pub mod table;
pub mod user_name;
pub mod utils;

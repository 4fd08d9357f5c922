//! Terminal front end for the patient table.
mod activity;
mod command;
mod feeders;
mod styles;
mod tui;
mod view;

pub use feeders::spawn_tui_feeders;
pub use tui::{TuiActor, TuiMsg};

/// Persisted greeting and game state behind the CLI commands.
use std::sync::Arc;

use anyhow::{bail, Result};
use keepsake_core::{
    Codec, DurableCell, HistoryCursor, HistoryKeys, Initial, JsonCodec, KeyValueStore,
    PrettyJsonCodec,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::game::{self, Mark, Squares};

pub const NAME_KEY: &str = "name";
pub const HISTORY_KEY: &str = "history";
pub const STEP_KEY: &str = "currentStep";

/// JSON layout for stored snapshots, chosen by config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotCodec {
    Compact,
    Pretty,
}

impl SnapshotCodec {
    pub fn from_pretty(pretty: bool) -> Self {
        if pretty {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

impl<T: Serialize + DeserializeOwned> Codec<T> for SnapshotCodec {
    fn encode(&self, value: &T) -> Result<String> {
        match self {
            Self::Compact => JsonCodec.encode(value),
            Self::Pretty => PrettyJsonCodec.encode(value),
        }
    }

    fn decode(&self, text: &str) -> Result<T> {
        JsonCodec.decode(text)
    }
}

/// The remembered user name.
#[derive(Debug)]
pub struct Greeting {
    name: DurableCell<String>,
}

impl Greeting {
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let name = DurableCell::new(
            store,
            NAME_KEY,
            Initial::with(|| {
                tracing::debug!("Default name initializer ran");
                String::new()
            }),
        );
        Self { name }
    }

    pub fn set(&mut self, name: &str) -> Result<()> {
        self.name.update(|_| name.to_string())?;
        Ok(())
    }

    pub fn render(&mut self) -> String {
        let name = self.name.read();
        if name.is_empty() {
            "Please type your name".to_string()
        } else {
            format!("Hello {name}")
        }
    }
}

/// What happened when a square was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Placed(Mark),
    Occupied,
    AlreadyWon(Mark),
}

/// A tic-tac-toe game whose moves form a navigable, persisted history.
#[derive(Debug)]
pub struct Game {
    history: HistoryCursor<Squares, SnapshotCodec>,
}

impl Game {
    pub fn open(store: Arc<dyn KeyValueStore>, codec: SnapshotCodec) -> Self {
        let history = HistoryCursor::open_with_codec(
            store,
            HistoryKeys::new(HISTORY_KEY, STEP_KEY),
            game::empty_board(),
            codec,
        );
        Self { history }
    }

    /// Places the next mark on `square` of the board at the current step.
    pub fn play(&mut self, square: usize) -> Result<PlayOutcome> {
        if square >= 9 {
            bail!("square must be between 0 and 8, got {square}");
        }

        let current = *self.history.current();
        if let Some(mark) = game::winner(&current) {
            return Ok(PlayOutcome::AlreadyWon(mark));
        }
        if current[square].is_some() {
            return Ok(PlayOutcome::Occupied);
        }

        let mark = game::next_value(&current);
        self.history.commit_with(|squares| {
            let mut next = *squares;
            next[square] = Some(mark);
            next
        })?;
        Ok(PlayOutcome::Placed(mark))
    }

    pub fn go_to(&mut self, step: usize) -> Result<()> {
        self.history.go_to(step)?;
        Ok(())
    }

    pub fn undo(&mut self) -> Result<bool> {
        Ok(self.history.undo()?)
    }

    pub fn redo(&mut self) -> Result<bool> {
        Ok(self.history.redo()?)
    }

    pub fn restart(&mut self) -> Result<()> {
        self.history.reset(game::empty_board())?;
        Ok(())
    }

    pub fn current(&mut self) -> Squares {
        *self.history.current()
    }

    /// Board, status line, and the numbered move list.
    pub fn render(&mut self) -> String {
        let squares = self.current();
        let mut out = game::render_board(&squares);
        out.push_str("\n\n");
        out.push_str(&game::status(&squares));
        out.push('\n');

        for position in self.history.positions() {
            let label = if position.index == 0 {
                "Go to game start".to_string()
            } else {
                format!("Go to move #{}", position.index)
            };
            let marker = if position.is_current { " (current)" } else { "" };
            out.push_str(&format!("\n{}. {label}{marker}", position.index + 1));
        }
        out
    }
}

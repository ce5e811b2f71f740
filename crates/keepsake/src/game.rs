/// Tic-tac-toe rules over a single board snapshot. No state of its own.
use serde::{Deserialize, Serialize};

/// A player's mark. X always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X => f.write_str("X"),
            Self::O => f.write_str("O"),
        }
    }
}

/// Nine squares, row by row. `None` is an empty square.
pub type Squares = [Option<Mark>; 9];

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

pub fn empty_board() -> Squares {
    [None; 9]
}

/// Whose turn it is, counting marks already placed.
pub fn next_value(squares: &Squares) -> Mark {
    if squares.iter().flatten().count() % 2 == 0 {
        Mark::X
    } else {
        Mark::O
    }
}

/// The mark owning a full line, if any.
pub fn winner(squares: &Squares) -> Option<Mark> {
    LINES.iter().find_map(|&[a, b, c]| match squares[a] {
        Some(mark) if squares[b] == Some(mark) && squares[c] == Some(mark) => Some(mark),
        _ => None,
    })
}

/// One-line game status for display.
pub fn status(squares: &Squares) -> String {
    if let Some(mark) = winner(squares) {
        format!("Winner: {mark}")
    } else if squares.iter().all(Option::is_some) {
        "Scratch: Cat's game".to_string()
    } else {
        format!("Next player: {}", next_value(squares))
    }
}

/// Renders the board as three rows; empty squares show their index.
pub fn render_board(squares: &Squares) -> String {
    squares
        .chunks(3)
        .enumerate()
        .map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .map(|(col, cell)| match cell {
                    Some(mark) => mark.to_string(),
                    None => (row * 3 + col).to_string(),
                })
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n---------\n")
}

//! direction encodes forward-vs-reverse traversal as a small set of
//! primitives, so the cursor's scan loop is written once for both.

use crate::format::{PageNum, INVALID_ROW_NUMBER};
use crate::rowid::{RowId, FIRST_ROW_ID, LAST_ROW_ID};
use crate::usage_map::PageCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn from_forward(move_forward: bool) -> Direction {
        if move_forward {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    pub fn is_forward(self) -> bool {
        self == Direction::Forward
    }

    /// The sentinel a cursor is seated on after a reset in this direction.
    pub fn beginning_row_id(self) -> RowId {
        match self {
            Direction::Forward => FIRST_ROW_ID,
            Direction::Reverse => LAST_ROW_ID,
        }
    }

    /// The sentinel that signals traversal in this direction is complete.
    pub fn end_row_id(self) -> RowId {
        match self {
            Direction::Forward => LAST_ROW_ID,
            Direction::Reverse => FIRST_ROW_ID,
        }
    }

    pub fn row_increment(self) -> i16 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }

    /// The next owned page in this direction.
    pub fn another_page(self, pages: &mut PageCursor<'_>) -> PageNum {
        match self {
            Direction::Forward => pages.next_page(),
            Direction::Reverse => pages.prev_page(),
        }
    }

    /// The row slot to seat on when landing on a freshly-loaded page, chosen
    /// so that the immediately following row increment produces the first
    /// slot to visit.
    pub fn initial_row_number(self, rows_on_page: i16) -> i16 {
        match self {
            Direction::Forward => INVALID_ROW_NUMBER,
            Direction::Reverse => rows_on_page,
        }
    }
}

#[test]
fn test_forward_primitives() {
    let d = Direction::Forward;
    assert_eq!(d.beginning_row_id(), FIRST_ROW_ID);
    assert_eq!(d.end_row_id(), LAST_ROW_ID);
    assert_eq!(d.row_increment(), 1);
    assert_eq!(d.initial_row_number(5), INVALID_ROW_NUMBER);
}

#[test]
fn test_reverse_primitives() {
    let d = Direction::Reverse;
    assert_eq!(d.beginning_row_id(), LAST_ROW_ID);
    assert_eq!(d.end_row_id(), FIRST_ROW_ID);
    assert_eq!(d.row_increment(), -1);
    // The immediate -1 increment then produces the last valid slot.
    assert_eq!(d.initial_row_number(5), 5);
}

#[test]
fn test_from_forward() {
    assert_eq!(Direction::from_forward(true), Direction::Forward);
    assert_eq!(Direction::from_forward(false), Direction::Reverse);
}

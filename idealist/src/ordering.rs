//! Position bookkeeping shared by items and subscriptions
//!
//! A scope (one list's items, one user's subscriptions) is handed in as its
//! rows sorted by `(position, id)`. Trashed rows stay in the scope and keep a
//! rank; they are only skipped when looking for an up/down neighbour.
//!
//! Moves are expressed as "take the row out, insert it at index N". Every row
//! whose rank differs from its stored position is returned, which also
//! repairs any gap left behind by older data.

use crate::error::{AppError, MoveRejection, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Where to move a row within (or into) a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveTarget {
    /// Swap past the nearest active row above
    Up,
    /// Swap past the nearest active row below
    Down,
    /// Absolute zero-based rank, clamped to the scope
    Position(usize),
}

impl MoveTarget {
    pub fn is_relative(&self) -> bool {
        matches!(self, MoveTarget::Up | MoveTarget::Down)
    }
}

impl FromStr for MoveTarget {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(MoveTarget::Up),
            "down" => Ok(MoveTarget::Down),
            other => other
                .parse::<usize>()
                .map(MoveTarget::Position)
                .map_err(|_| AppError::Validation(format!("invalid move target: {}", other))),
        }
    }
}

impl fmt::Display for MoveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveTarget::Up => write!(f, "up"),
            MoveTarget::Down => write!(f, "down"),
            MoveTarget::Position(rank) => write!(f, "{}", rank),
        }
    }
}

/// One row of a positional scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sibling {
    pub id: String,
    pub position: i64,
    /// Eligible as an up/down neighbour
    pub active: bool,
}

impl Sibling {
    pub fn new(id: impl Into<String>, position: i64, active: bool) -> Self {
        Self {
            id: id.into(),
            position,
            active,
        }
    }
}

/// Resolve `target` to the index the row should occupy after the move.
///
/// `siblings` must contain `moving_id`.
pub fn resolve_target(siblings: &[Sibling], moving_id: &str, target: MoveTarget) -> Result<usize> {
    let current = siblings
        .iter()
        .position(|s| s.id == moving_id)
        .ok_or_else(|| AppError::InvalidScope(format!("{} is not part of this scope", moving_id)))?;

    match target {
        MoveTarget::Up => siblings[..current]
            .iter()
            .rposition(|s| s.active)
            .ok_or(AppError::NoOpMove(MoveRejection::AtTop)),
        MoveTarget::Down => siblings[current + 1..]
            .iter()
            .position(|s| s.active)
            .map(|offset| current + 1 + offset)
            .ok_or(AppError::NoOpMove(MoveRejection::AtBottom)),
        MoveTarget::Position(rank) => {
            let to = rank.min(siblings.len() - 1);
            if to == current {
                Err(AppError::NoOpMove(MoveRejection::Unchanged))
            } else {
                Ok(to)
            }
        }
    }
}

/// Place `id` at index `at` (clamped) and return every changed `(id, rank)`.
///
/// `id` may or may not already be part of `siblings`; a newcomer is always
/// part of the result.
pub fn place(siblings: &[Sibling], id: &str, at: usize) -> Vec<(String, i64)> {
    let mut order: Vec<&str> = siblings
        .iter()
        .map(|s| s.id.as_str())
        .filter(|sid| *sid != id)
        .collect();
    let at = at.min(order.len());
    order.insert(at, id);
    assignments(&order, siblings)
}

/// Remove `id` from the scope and return the ranks that shift to close the gap.
pub fn close_gap(siblings: &[Sibling], id: &str) -> Vec<(String, i64)> {
    let order: Vec<&str> = siblings
        .iter()
        .map(|s| s.id.as_str())
        .filter(|sid| *sid != id)
        .collect();
    assignments(&order, siblings)
}

fn assignments(order: &[&str], previous: &[Sibling]) -> Vec<(String, i64)> {
    let stored: HashMap<&str, i64> = previous
        .iter()
        .map(|s| (s.id.as_str(), s.position))
        .collect();

    order
        .iter()
        .enumerate()
        .filter_map(|(rank, id)| {
            let rank = rank as i64;
            (stored.get(id) != Some(&rank)).then(|| (id.to_string(), rank))
        })
        .collect()
}

/// True when positions are exactly `0..len` with no repeats.
pub fn is_dense(positions: &[i64]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted.iter().enumerate().all(|(rank, pos)| *pos == rank as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(ids: &[(&str, bool)]) -> Vec<Sibling> {
        ids.iter()
            .enumerate()
            .map(|(i, (id, active))| Sibling::new(*id, i as i64, *active))
            .collect()
    }

    fn apply(siblings: &[Sibling], changes: &[(String, i64)]) -> Vec<String> {
        let mut ranked: Vec<(i64, String)> = siblings
            .iter()
            .map(|s| {
                let pos = changes
                    .iter()
                    .find(|(id, _)| *id == s.id)
                    .map(|(_, p)| *p)
                    .unwrap_or(s.position);
                (pos, s.id.clone())
            })
            .collect();
        for (id, pos) in changes {
            if !siblings.iter().any(|s| &s.id == id) {
                ranked.push((*pos, id.clone()));
            }
        }
        ranked.sort();
        ranked.into_iter().map(|(_, id)| id).collect()
    }

    #[test]
    fn test_parse_move_target() {
        assert_eq!("up".parse::<MoveTarget>().unwrap(), MoveTarget::Up);
        assert_eq!("down".parse::<MoveTarget>().unwrap(), MoveTarget::Down);
        assert_eq!("3".parse::<MoveTarget>().unwrap(), MoveTarget::Position(3));
        assert!("-1".parse::<MoveTarget>().is_err());
        assert!("sideways".parse::<MoveTarget>().is_err());
    }

    #[test]
    fn test_move_up_swaps_with_neighbour() {
        let s = scope(&[("a", true), ("b", true), ("c", true)]);

        let to = resolve_target(&s, "c", MoveTarget::Up).unwrap();
        assert_eq!(to, 1);

        let changes = place(&s, "c", to);
        assert_eq!(apply(&s, &changes), vec!["a", "c", "b"]);
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_move_down_swaps_with_neighbour() {
        let s = scope(&[("a", true), ("b", true), ("c", true)]);

        let to = resolve_target(&s, "a", MoveTarget::Down).unwrap();
        let changes = place(&s, "a", to);

        assert_eq!(apply(&s, &changes), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_trashed_rows_are_skipped_as_neighbours() {
        let s = scope(&[("a", true), ("t", false), ("b", true)]);

        let to = resolve_target(&s, "b", MoveTarget::Up).unwrap();
        assert_eq!(to, 0);
        assert_eq!(apply(&s, &place(&s, "b", to)), vec!["b", "a", "t"]);

        let to = resolve_target(&s, "a", MoveTarget::Down).unwrap();
        assert_eq!(to, 2);
        assert_eq!(apply(&s, &place(&s, "a", to)), vec!["t", "b", "a"]);
    }

    #[test]
    fn test_boundaries_reject() {
        let s = scope(&[("t", false), ("a", true), ("b", true), ("u", false)]);

        assert!(matches!(
            resolve_target(&s, "a", MoveTarget::Up),
            Err(AppError::NoOpMove(MoveRejection::AtTop))
        ));
        assert!(matches!(
            resolve_target(&s, "b", MoveTarget::Down),
            Err(AppError::NoOpMove(MoveRejection::AtBottom))
        ));
    }

    #[test]
    fn test_absolute_target_is_clamped() {
        let s = scope(&[("a", true), ("b", true), ("c", true)]);

        let to = resolve_target(&s, "a", MoveTarget::Position(99)).unwrap();
        assert_eq!(to, 2);
        assert_eq!(apply(&s, &place(&s, "a", to)), vec!["b", "c", "a"]);

        assert!(matches!(
            resolve_target(&s, "c", MoveTarget::Position(7)),
            Err(AppError::NoOpMove(MoveRejection::Unchanged))
        ));
    }

    #[test]
    fn test_unknown_row_is_invalid_scope() {
        let s = scope(&[("a", true)]);
        assert!(matches!(
            resolve_target(&s, "zzz", MoveTarget::Up),
            Err(AppError::InvalidScope(_))
        ));
    }

    #[test]
    fn test_place_newcomer_opens_gap() {
        let s = scope(&[("a", true), ("b", true)]);

        let changes = place(&s, "n", 1);

        assert_eq!(changes, vec![("n".to_string(), 1), ("b".to_string(), 2)]);
    }

    #[test]
    fn test_close_gap_shifts_followers() {
        let s = scope(&[("a", true), ("b", true), ("c", true)]);

        let changes = close_gap(&s, "a");

        assert_eq!(changes, vec![("b".to_string(), 0), ("c".to_string(), 1)]);
    }

    #[test]
    fn test_every_move_keeps_scope_dense() {
        let s = scope(&[("a", true), ("b", false), ("c", true), ("d", true), ("e", false)]);

        for from in 0..s.len() {
            for to in 0..s.len() {
                let changes = place(&s, &s[from].id, to);
                let positions: Vec<i64> = s
                    .iter()
                    .map(|sib| {
                        changes
                            .iter()
                            .find(|(id, _)| *id == sib.id)
                            .map(|(_, p)| *p)
                            .unwrap_or(sib.position)
                    })
                    .collect();
                assert!(is_dense(&positions), "{} -> {}: {:?}", from, to, positions);
            }
        }
    }

    #[test]
    fn test_place_repairs_sparse_positions() {
        let s = vec![
            Sibling::new("a", 0, true),
            Sibling::new("b", 4, true),
            Sibling::new("c", 9, true),
        ];

        let changes = place(&s, "a", 0);

        assert_eq!(changes, vec![("b".to_string(), 1), ("c".to_string(), 2)]);
    }
}

//! Static exchange evaluation.
//!
//! Enumerates the shallow attackers of the target square, then plays out the
//! capture sequence lowest-valued-attacker first on a simulated occupancy,
//! refreshing x-ray attackers through vacated slider lines, with stand-pat
//! exits whenever continuing would worsen the side to move's balance.
//! Returns the signed material swing for the side making the first capture.

use crate::board::{Board, Color, Piece};
use crate::moves::magic::MagicTables;
use crate::moves::masks::{FILE_MASKS, RANK_MASKS};
use crate::square::Square;
use crate::utils::pop_lsb;
use arrayvec::ArrayVec;

const MAX_PIECES: usize = 16;

// Exchange values: the king is effectively priceless, so capturing it
// dominates any sequence (the previous capture was not really answerable).
#[inline]
fn see_value(piece: Piece) -> i32 {
    match piece {
        Piece::King => 20000,
        p => p.value(),
    }
}

#[inline]
fn value_of(piece: Option<Piece>) -> i32 {
    piece.map_or(0, see_value)
}

#[inline]
fn piece_on(board: &Board, sq: u8) -> Piece {
    board
        .piece_type_at(Square::from_index(sq))
        .expect("attacker square must be occupied")
}

// most valuable first, so pop() hands out the least valuable attacker
fn sort_by_value(list: &mut ArrayVec<u8, MAX_PIECES>, board: &Board) {
    list.sort_unstable_by_key(|&sq| std::cmp::Reverse(see_value(piece_on(board, sq))));
}

pub fn see(board: &Board, tables: &MagicTables, initial_from: Square, initial_to: Square) -> i32 {
    let us = board.side_to_move;
    let to = initial_to.index();

    let mut full_attackers = board.attackers_for_square(initial_to, tables);
    let mut occupancy = board.occ_all;

    let mut attackers: ArrayVec<u8, MAX_PIECES> = ArrayVec::new();
    let mut defenders: ArrayVec<u8, MAX_PIECES> = ArrayVec::new();

    let mut shallow = full_attackers;
    while shallow != 0 {
        let sq = pop_lsb(&mut shallow);
        if sq == initial_from.index() {
            continue; // the initial mover goes on top of the stack below
        }
        let color = Color::from_u8(board.piece_on_sq[sq as usize] >> 3);
        let list = if color == us { &mut attackers } else { &mut defenders };
        if !list.is_full() {
            list.push(sq);
        }
    }
    sort_by_value(&mut attackers, board);
    sort_by_value(&mut defenders, board);
    if attackers.is_full() {
        attackers.pop();
    }
    attackers.push(initial_from.index());

    let mut score = 0i32;
    let mut attacking = true;
    let mut piece_on_to = board.piece_type_at(initial_to);

    loop {
        let popped = if attacking {
            attackers.pop()
        } else {
            defenders.pop()
        };
        let next_sq = match popped {
            Some(sq) => sq,
            None => break,
        };

        let next_piece = piece_on(board, next_sq);
        let captured = piece_on_to;
        piece_on_to = Some(next_piece);
        occupancy ^= 1u64 << next_sq;

        if attacking {
            score += value_of(captured);
        } else {
            score -= value_of(captured);
        }

        // stand pat: the opponent will simply stop the sequence here
        if attacking && score < 0 {
            return score;
        }
        if !attacking && score >= 0 {
            return score;
        }

        // the vacated square may reveal an x-ray attacker behind the mover;
        // knights never shield a line
        if next_piece != Piece::Knight {
            let row = (next_sq / 8) as usize;
            let col = (next_sq % 8) as usize;
            let rooks_queens = board.bb(Color::White, Piece::Rook)
                | board.bb(Color::Black, Piece::Rook)
                | board.bb(Color::White, Piece::Queen)
                | board.bb(Color::Black, Piece::Queen);
            let bishops_queens = board.bb(Color::White, Piece::Bishop)
                | board.bb(Color::Black, Piece::Bishop)
                | board.bb(Color::White, Piece::Queen)
                | board.bb(Color::Black, Piece::Queen);

            let on_line = (FILE_MASKS[col] | RANK_MASKS[row]) & initial_to.bb() != 0;
            let rays = if on_line {
                tables
                    .rook
                    .get_attacks(to as usize, occupancy ^ initial_to.bb())
                    & rooks_queens
            } else {
                tables
                    .bishop
                    .get_attacks(to as usize, occupancy ^ initial_to.bb())
                    & bishops_queens
            };
            let mut discovered = rays & !full_attackers;

            full_attackers |= discovered;
            while discovered != 0 {
                let sq = pop_lsb(&mut discovered);
                let color = Color::from_u8(board.piece_on_sq[sq as usize] >> 3);
                let list = if color == us { &mut attackers } else { &mut defenders };
                if !list.is_full() {
                    list.push(sq);
                }
            }
            sort_by_value(&mut attackers, board);
            sort_by_value(&mut defenders, board);
        }

        attacking = !attacking;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::magic::loader::build_magic_tables;
    use std::str::FromStr;

    fn run_see(fen: &str, from: &str, to: &str) -> i32 {
        let board = Board::from_str(fen).unwrap();
        let tables = build_magic_tables();
        see(
            &board,
            &tables,
            Square::from_str(from).unwrap(),
            Square::from_str(to).unwrap(),
        )
    }

    #[test]
    fn free_pawn_wins_a_pawn() {
        assert_eq!(run_see("4k3/8/8/3p4/8/8/8/3RK3 w - - 0 1", "d1", "d5"), 100);
    }

    #[test]
    fn rook_takes_defended_pawn_loses() {
        // Rxd4 dxc... actually Rd8 recaptures: 100 - 500 = -400
        assert_eq!(
            run_see("3r2k1/8/8/8/3p4/8/8/3RK3 w - - 0 1", "d1", "d4"),
            -400
        );
    }

    #[test]
    fn pawn_takes_knight_with_recapture() {
        // PxN (+310), then pxP (-100): 210
        assert_eq!(
            run_see("4k3/8/2p5/3n4/4P3/8/8/4K3 w - - 0 1", "e4", "d5"),
            210
        );
    }

    #[test]
    fn undefended_rook_is_free_despite_battery() {
        // nothing defends a8; the queen simply wins the rook
        assert_eq!(
            run_see("r3k3/8/8/8/8/8/Q7/R3K3 w - - 0 1", "a2", "a8"),
            500
        );
    }

    #[test]
    fn xray_defender_behind_the_first_one_counts() {
        // RxP +100, pawn is backed by a rook on d8 behind a rook on d6:
        // RxR... the doubled black rooks answer every white capture
        // Rd1xd4 (+100), Rd6xd4 (-500), white has nothing left: -400
        assert_eq!(
            run_see("3r2k1/8/3r4/8/3p4/8/8/3RK3 w - - 0 1", "d1", "d4"),
            -400
        );
    }

    #[test]
    fn antisymmetric_under_color_swap() {
        // same exchange with colors swapped and ranks mirrored gives the
        // same balance for the side that starts it
        let white = run_see("3r2k1/8/8/8/3p4/8/8/3RK3 w - - 0 1", "d1", "d4");
        let black = run_see("3rk3/8/8/3P4/8/8/8/3R2K1 b - - 0 1", "d8", "d5");
        assert_eq!(white, black);
    }
}

//! Move ordering: TT move, promotions, MVV/LVA captures, killers,
//! near-promotion pawn pushes, then history, all folded into `Move::score`.

use crate::board::{Board, Color, Piece};
use crate::moves::types::Move;
use crate::search::eval::{is_obstructed, is_passed, is_unstoppable};
use rand::Rng;

pub const TT_MOVE: i32 = 9_999_999;
pub const PROMO_OFFSET: i32 = 999_999;
pub const CAPTURE_OFFSET: i32 = 99_999;
pub const KILLER_OFFSET: i32 = 9_999;
pub const PAWN_NEAR_PROMO_OFFSET: i32 = 999;
pub const HISTORY_MULTIPLIER: i32 = 10;

// [victim][attacker], pawn through king
const MVV_LVA: [[i32; 6]; 6] = [
    [15, 14, 13, 12, 11, 10],
    [25, 24, 23, 22, 21, 20],
    [35, 34, 33, 32, 31, 30],
    [45, 44, 43, 42, 41, 40],
    [55, 54, 53, 52, 51, 50],
    [0, 0, 0, 0, 0, 0],
];

pub type HistoryTable = [[[i32; 64]; 64]; 2];

#[allow(clippy::too_many_arguments)]
pub fn score_moves(
    board: &Board,
    moves: &mut [Move],
    tt_move: Option<&Move>,
    killers: &[Option<Move>; 2],
    history: &HistoryTable,
    history_max: i32,
    use_killers: bool,
) {
    let us = board.side_to_move;

    for mv in moves.iter_mut() {
        mv.score = 0;

        if let Some(tm) = tt_move {
            if mv.same(tm) {
                mv.score = TT_MOVE;
                continue;
            }
        }

        if let Some(victim) = mv.captured {
            let attacker = board
                .piece_type_at(mv.from)
                .expect("capture from an empty square");
            mv.score = MVV_LVA[victim as usize][attacker as usize] + CAPTURE_OFFSET;
            if let Some(promo) = mv.promotion {
                mv.score += promo.value() + PROMO_OFFSET;
            }
            continue;
        }

        if let Some(promo) = mv.promotion {
            mv.score = promo.value() + PROMO_OFFSET;
            continue;
        }

        if mv.is_castling() {
            mv.score = CAPTURE_OFFSET;
            continue;
        }

        // pawns running at the promotion rank outrank ordinary quiets
        if board.piece_type_at(mv.from) == Some(Piece::Pawn) {
            let rank = mv.from.rank();
            let near = match us {
                Color::White => rank > 4,
                Color::Black => rank < 3,
            };
            if near {
                mv.score = PAWN_NEAR_PROMO_OFFSET;
                if is_passed(board, us, mv.from) {
                    mv.score += 1;
                    if !is_obstructed(board, us, mv.from) {
                        mv.score += 1;
                        if is_unstoppable(board, us, mv.from) {
                            mv.score += 1;
                        }
                    }
                }
                continue;
            }
        }

        if use_killers {
            if let Some(k1) = &killers[0] {
                if mv.same(k1) {
                    mv.score = KILLER_OFFSET;
                    continue;
                }
            }
            if let Some(k2) = &killers[1] {
                if mv.same(k2) {
                    mv.score = KILLER_OFFSET - 1;
                    continue;
                }
            }
        }

        let h = history[us as usize][mv.from.index() as usize][mv.to.index() as usize];
        mv.score = (h as f64 / history_max.max(1) as f64 * HISTORY_MULTIPLIER as f64) as i32;
    }
}

/// Highest score first.
pub fn sort_moves(moves: &mut [Move]) {
    moves.sort_unstable_by_key(|m| std::cmp::Reverse(m.score));
}

/// Shuffle, used by SMP helper threads at the root to diversify exploration.
pub fn randomize_moves(moves: &mut [Move]) {
    let mut rng = rand::rng();
    let len = moves.len();
    for i in 0..len {
        let j = rng.random_range(0..len);
        moves.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::magic::loader::build_magic_tables;
    use crate::moves::movegen::{generate_moves, GenFilter};
    use crate::moves::types::MoveList;
    use std::str::FromStr;

    fn scored_moves(fen: &str, tt_move: Option<Move>) -> Vec<Move> {
        let board = Board::from_str(fen).unwrap();
        let tables = build_magic_tables();
        let mut moves = MoveList::new();
        generate_moves(&board, &tables, GenFilter::All, &mut moves);

        let killers = [None, None];
        let history = [[[0; 64]; 64]; 2];
        score_moves(
            &board,
            &mut moves,
            tt_move.as_ref(),
            &killers,
            &history,
            1,
            true,
        );
        sort_moves(&mut moves);
        moves.to_vec()
    }

    #[test]
    fn tt_move_sorts_first() {
        let board = Board::from_str(crate::board::START_FEN).unwrap();
        let tables = build_magic_tables();
        let mut moves = MoveList::new();
        generate_moves(&board, &tables, GenFilter::All, &mut moves);
        let chosen = *moves.iter().find(|m| m.to_uci() == "g1f3").unwrap();

        let sorted = scored_moves(crate::board::START_FEN, Some(chosen));
        assert!(sorted[0].same(&chosen));
        assert_eq!(sorted[0].score, TT_MOVE);
    }

    #[test]
    fn captures_order_by_victim_then_attacker() {
        // pawn and knight can both capture the queen; pawn takes first
        let sorted = scored_moves("4k3/8/8/3q4/4P3/2N5/8/4K3 w - - 0 1", None);
        let top = &sorted[0];
        assert_eq!(top.to_uci(), "e4d5", "pawn x queen should lead: {:?}", top);
        // knight x queen comes before anything quiet
        assert!(sorted[1].is_capture());
    }

    #[test]
    fn promotions_outrank_plain_captures() {
        let sorted = scored_moves("1r2k3/P7/8/8/8/8/8/4K3 w - - 0 1", None);
        assert!(sorted[0].is_promotion());
        // the promotion-capture to queen leads
        assert_eq!(sorted[0].promotion, Some(Piece::Queen));
        assert!(sorted[0].is_capture());
    }

    #[test]
    fn killers_beat_quiet_history() {
        let board = Board::from_str(crate::board::START_FEN).unwrap();
        let tables = build_magic_tables();
        let mut moves = MoveList::new();
        generate_moves(&board, &tables, GenFilter::All, &mut moves);
        let killer = *moves.iter().find(|m| m.to_uci() == "b1c3").unwrap();

        let killers = [Some(killer), None];
        let mut history = [[[0; 64]; 64]; 2];
        // give every quiet some history noise below the killer band
        history[0][12][28] = 500;
        score_moves(&board, &mut moves, None, &killers, &history, 500, true);
        sort_moves(&mut moves);
        assert!(moves[0].same(&killer));
    }
}

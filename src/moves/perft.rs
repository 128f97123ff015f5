use crate::board::Board;
use crate::moves::execute::{make_move, unmake_move};
use crate::moves::magic::MagicTables;
use crate::moves::movegen::{generate_moves, GenFilter};
use crate::moves::types::MoveList;
use tracing::debug;

/// Leaf-node count with bulk counting at depth 1.
pub fn perft(board: &mut Board, tables: &MagicTables, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let mut moves = MoveList::new();
    generate_moves(board, tables, GenFilter::All, &mut moves);

    if depth == 1 {
        return moves.len() as u64;
    }

    let mut total = 0;
    for mv in &moves {
        make_move(board, mv);
        total += perft(board, tables, depth - 1);
        unmake_move(board, mv);
    }
    total
}

/// Per-root-move breakdown, for tracking down generator disagreements.
pub fn perft_divide(board: &mut Board, tables: &MagicTables, depth: u32) -> Vec<(String, u64)> {
    let mut moves = MoveList::new();
    generate_moves(board, tables, GenFilter::All, &mut moves);

    let mut results = Vec::with_capacity(moves.len());
    for mv in &moves {
        make_move(board, mv);
        let nodes = if depth <= 1 {
            1
        } else {
            perft(board, tables, depth - 1)
        };
        unmake_move(board, mv);
        debug!(mv = %mv, nodes, "perft divide");
        results.push((mv.to_uci(), nodes));
    }
    results.sort();
    results
}

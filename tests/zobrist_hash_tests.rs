//! Hash integrity over random playouts: the incrementally maintained keys
//! must equal a from-scratch recompute after every make and every unmake.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::str::FromStr;
use tempo::board::Board;
use tempo::moves::execute::{make_move, unmake_move};
use tempo::moves::magic::loader::build_magic_tables;
use tempo::moves::movegen::{generate_moves, GenFilter};
use tempo::moves::types::MoveList;

#[test]
fn random_playouts_keep_hashes_in_sync() {
    let tables = build_magic_tables();
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);

    for game in 0..20 {
        let mut board = Board::new();
        let mut played: Vec<tempo::moves::types::Move> = Vec::new();

        for _ply in 0..80 {
            let mut moves = MoveList::new();
            generate_moves(&board, &tables, GenFilter::All, &mut moves);
            if moves.is_empty() {
                break;
            }
            let mv = moves[rng.random_range(0..moves.len())];
            make_move(&mut board, &mv);
            played.push(mv);

            assert_eq!(
                board.zobrist,
                board.compute_zobrist_full(),
                "game {} after {}",
                game,
                mv
            );
            assert_eq!(
                board.pawn_zobrist,
                board.compute_pawn_zobrist_full(),
                "pawn hash, game {} after {}",
                game,
                mv
            );
        }

        // unwind the whole game; the start position must come back exactly
        let reference = Board::new();
        for mv in played.iter().rev() {
            unmake_move(&mut board, mv);
        }
        assert_eq!(board, reference, "game {} did not rewind cleanly", game);
    }
}

#[test]
fn en_passant_file_is_hashed_whenever_set() {
    let tables = build_magic_tables();
    let mut board = Board::new();

    // 1. e4: the double push sets an en-passant target, which must alter
    // the hash relative to the same placement without one
    let mut moves = MoveList::new();
    generate_moves(&board, &tables, GenFilter::All, &mut moves);
    let e4 = *moves.iter().find(|m| m.to_uci() == "e2e4").unwrap();
    make_move(&mut board, &e4);

    let with_ep = board.zobrist;
    let same_placement =
        Board::from_str("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap();
    assert_ne!(with_ep, same_placement.zobrist);

    let with_ep_fen =
        Board::from_str("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1").unwrap();
    assert_eq!(with_ep, with_ep_fen.zobrist);
}

#[test]
fn castling_rights_change_the_hash() {
    let all = Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    let none = Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w - - 0 1").unwrap();
    let white_only = Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
    assert_ne!(all.zobrist, none.zobrist);
    assert_ne!(all.zobrist, white_only.zobrist);
    assert_ne!(none.zobrist, white_only.zobrist);
}

#[test]
fn side_to_move_changes_the_hash() {
    let white = Board::from_str("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
    let black = Board::from_str("4k3/8/8/8/8/8/8/4K3 b - - 0 1").unwrap();
    assert_ne!(white.zobrist, black.zobrist);
    // pawn hash ignores the side to move
    assert_eq!(white.pawn_zobrist, black.pawn_zobrist);
}

#[test]
fn pawn_hash_tracks_only_pawns_and_kings() {
    let base = Board::from_str("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
    let with_rook = Board::from_str("4k3/8/8/8/8/8/4P3/R3K3 w - - 0 1").unwrap();
    let moved_pawn = Board::from_str("4k3/8/8/8/4P3/8/8/4K3 w - - 0 1").unwrap();

    assert_eq!(base.pawn_zobrist, with_rook.pawn_zobrist);
    assert_ne!(base.pawn_zobrist, moved_pawn.pawn_zobrist);
    assert_ne!(base.zobrist, with_rook.zobrist);
}

use std::str::FromStr;
use tempo::board::Board;
use tempo::moves::magic::loader::build_magic_tables;
use tempo::moves::magic::MagicTables;
use tempo::moves::perft::{perft, perft_divide};

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const KIWIPETE_FEN: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
const ENDGAME_FEN: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
const MIDGAME_FEN: &str = "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";

fn run(fen: &str, depth: u32, expected: u64, tables: &MagicTables) {
    let mut board = Board::from_str(fen).expect("valid FEN");
    let nodes = perft(&mut board, tables, depth);
    assert_eq!(
        nodes, expected,
        "perft({}) mismatch on {}: got {}, expected {}",
        depth, fen, nodes, expected
    );
    // the position must come back untouched
    assert_eq!(board.to_fen(), Board::from_str(fen).unwrap().to_fen());
}

#[test]
fn perft_startpos_shallow() {
    let tables = build_magic_tables();
    run(START_FEN, 1, 20, &tables);
    run(START_FEN, 2, 400, &tables);
    run(START_FEN, 3, 8_902, &tables);
    run(START_FEN, 4, 197_281, &tables);
}

#[test]
fn perft_startpos_d5() {
    let tables = build_magic_tables();
    run(START_FEN, 5, 4_865_609, &tables);
}

#[test]
fn perft_kiwipete() {
    let tables = build_magic_tables();
    run(KIWIPETE_FEN, 1, 48, &tables);
    run(KIWIPETE_FEN, 2, 2_039, &tables);
    run(KIWIPETE_FEN, 3, 97_862, &tables);
}

#[test]
fn perft_kiwipete_d4() {
    let tables = build_magic_tables();
    run(KIWIPETE_FEN, 4, 4_085_603, &tables);
}

#[test]
fn perft_rook_endgame() {
    let tables = build_magic_tables();
    run(ENDGAME_FEN, 1, 14, &tables);
    run(ENDGAME_FEN, 2, 191, &tables);
    run(ENDGAME_FEN, 3, 2_812, &tables);
    run(ENDGAME_FEN, 4, 43_238, &tables);
    run(ENDGAME_FEN, 5, 674_624, &tables);
}

// heavyweight, opt-in
#[test]
#[ignore]
fn perft_midgame_d5() {
    let tables = build_magic_tables();
    run(MIDGAME_FEN, 5, 164_075_551, &tables);
}

#[test]
fn perft_midgame_shallow() {
    let tables = build_magic_tables();
    run(MIDGAME_FEN, 1, 46, &tables);
    run(MIDGAME_FEN, 2, 2_079, &tables);
    run(MIDGAME_FEN, 3, 89_890, &tables);
}

#[test]
fn divide_sums_to_perft() {
    let tables = build_magic_tables();
    let mut board = Board::from_str(KIWIPETE_FEN).unwrap();
    let breakdown = perft_divide(&mut board, &tables, 3);
    let total: u64 = breakdown.iter().map(|(_, n)| n).sum();
    assert_eq!(total, 97_862);
    assert_eq!(breakdown.len(), 48);
}

//! Tapered evaluation: material and piece-square sums maintained by the
//! board, plus pawn-structure (cached), knight, bishop, rook, and king-safety
//! terms. Every term is computed from White's perspective and the final score
//! is negated when Black is to move.

use crate::bitboard::BitboardExt;
use crate::board::{Board, Color, Piece};
use crate::moves::king::KING_ATTACKS;
use crate::moves::knight::KNIGHT_ATTACKS;
use crate::moves::magic::MagicTables;
use crate::moves::masks::{
    FILE_MASKS, NEIGHBORING_FILES, RANKS_AHEAD_BLACK, RANKS_AHEAD_WHITE, RANK_MASKS, SIDES,
};
use crate::moves::pawn::PAWN_ATTACKS;
use crate::search::params::EvalParams;
use crate::search::pawn_cache::PawnTable;
use crate::square::Square;
use crate::utils::pop_lsb;

/// Material + piece-square only, tapered. Cheap and reliable; used by the
/// futility family instead of the full evaluation.
pub fn lazy_evaluate(board: &Board) -> i32 {
    let phase = board.phase();
    let material = board.material(Color::White) - board.material(Color::Black);

    let opening = material + board.pst_opening;
    let endgame = material + board.pst_endgame;

    let score = (opening * (256 - phase) + endgame * phase) / 256;
    if board.side_to_move == Color::White {
        score
    } else {
        -score
    }
}

/// Full evaluation.
pub fn evaluate(
    board: &Board,
    tables: &MagicTables,
    params: &EvalParams,
    pawn_table: &mut PawnTable,
) -> i32 {
    let phase = board.phase();
    let material = board.material(Color::White) - board.material(Color::Black);
    let mut opening = material;
    let mut endgame = material;

    let white_king = board.king_square(Color::White);
    let black_king = board.king_square(Color::Black);

    // pawn shield and storm, scaled by the enemy's remaining material
    let white_safety = king_safety_area(Color::White, white_king);
    let black_safety = king_safety_area(Color::Black, black_king);
    opening += shield_count(board, white_safety, Color::White) * params.pawn_shield
        * board.material(Color::Black)
        / (params.pawn_shield_divisor * 100).max(1);
    opening -= shield_count(board, black_safety, Color::Black) * params.pawn_shield
        * board.material(Color::White)
        / (params.pawn_shield_divisor * 100).max(1);

    let white_danger = king_danger_area(Color::White, white_king);
    let black_danger = king_danger_area(Color::Black, black_king);
    opening -= storm_count(board, white_danger, Color::White) * params.pawn_storm
        * board.material(Color::Black)
        / (params.pawn_storm_divisor * 100).max(1);
    opening += storm_count(board, black_danger, Color::Black) * params.pawn_storm
        * board.material(Color::White)
        / (params.pawn_storm_divisor * 100).max(1);

    // attack units are counted against the full safety area
    let white_safety = white_safety | KING_ATTACKS[white_king.index() as usize];
    let black_safety = black_safety | KING_ATTACKS[black_king.index() as usize];
    let mut white_units = 0i32;
    let mut black_units = 0i32;

    white_units += queen_attack_units(board, tables, params, Color::White, black_safety);
    black_units += queen_attack_units(board, tables, params, Color::Black, white_safety);

    // bishop pair
    if board.piece_count(Color::White, Piece::Bishop) >= 2 {
        endgame += params.bishop_pair;
    }
    if board.piece_count(Color::Black, Piece::Bishop) >= 2 {
        endgame -= params.bishop_pair;
    }

    // pawn structure, cached by the pawn hash
    let (white_pawn_attacks, black_pawn_attacks);
    match pawn_table.probe(board.pawn_zobrist).copied() {
        Some(entry) => {
            opening += entry.opening;
            endgame += entry.endgame;
            white_pawn_attacks = entry.white_attacks;
            black_pawn_attacks = entry.black_attacks;
        }
        None => {
            let (wa, wo, we) = pawn_score(board, params, Color::White);
            let (ba, bo, be) = pawn_score(board, params, Color::Black);
            let opening_contrib = wo - bo;
            let endgame_contrib = we - be;
            pawn_table.store(board.pawn_zobrist, wa, ba, opening_contrib, endgame_contrib);
            opening += opening_contrib;
            endgame += endgame_contrib;
            white_pawn_attacks = wa;
            black_pawn_attacks = ba;
        }
    }

    // knights
    let (score, units) =
        knight_score(board, params, Color::White, black_pawn_attacks, black_safety);
    opening += score;
    white_units += units;
    let (score, units) =
        knight_score(board, params, Color::Black, white_pawn_attacks, white_safety);
    opening -= score;
    black_units += units;

    // bishop mobility over the attack-square count, square-root shaped
    let (mobility, units) =
        bishop_mobility(board, tables, params, Color::White, black_pawn_attacks, black_safety);
    opening += sqrt_mobility(
        mobility,
        params.bishop_mobility_multiplier,
        params.bishop_mobility_offset,
    );
    white_units += units;
    let (mobility, units) =
        bishop_mobility(board, tables, params, Color::Black, white_pawn_attacks, white_safety);
    opening -= sqrt_mobility(
        mobility,
        params.bishop_mobility_multiplier,
        params.bishop_mobility_offset,
    );
    black_units += units;

    // rooks
    let (o, e, units) =
        rook_score(board, tables, params, Color::White, black_pawn_attacks, black_safety);
    opening += o;
    endgame += e;
    white_units += units;
    let (o, e, units) =
        rook_score(board, tables, params, Color::Black, white_pawn_attacks, white_safety);
    opening -= o;
    endgame -= e;
    black_units += units;

    // king safety lookup over accumulated attack units
    opening += params.safety_table[(white_units.max(0) as usize).min(99)];
    opening -= params.safety_table[(black_units.max(0) as usize).min(99)];

    // incrementally maintained piece-square sums
    opening += board.pst_opening;
    endgame += board.pst_endgame;

    let score = (opening * (256 - phase) + endgame * phase) / 256;
    if board.side_to_move == Color::White {
        score
    } else {
        -score
    }
}

#[inline]
fn sqrt_mobility(mobility: i32, multiplier: i32, offset: i32) -> i32 {
    (multiplier as f64 * (mobility as f64).sqrt()) as i32 - offset
}

// ---------- pawns ----------

#[inline]
fn front_span(color: Color, rank: usize) -> u64 {
    match color {
        Color::White => RANKS_AHEAD_WHITE[rank],
        Color::Black => RANKS_AHEAD_BLACK[rank],
    }
}

/// No enemy pawn ahead on this or a neighboring file, and no own pawn ahead
/// on the same file.
pub fn is_passed(board: &Board, color: Color, sq: Square) -> bool {
    let rank = sq.rank() as usize;
    let file = sq.file() as usize;
    let span = front_span(color, rank);

    if span & FILE_MASKS[file] & board.bb(color, Piece::Pawn) != 0 {
        return false;
    }
    span & NEIGHBORING_FILES[file] & board.bb(color.opposite(), Piece::Pawn) == 0
}

/// Any piece ahead on the pawn's own file.
pub fn is_obstructed(board: &Board, color: Color, sq: Square) -> bool {
    let span = front_span(color, sq.rank() as usize) & FILE_MASKS[sq.file() as usize];
    span & board.occ_all != 0
}

/// Rule of the square: with only king and pawns left, the enemy king cannot
/// catch the runner. Assumes an unobstructed passed pawn.
pub fn is_unstoppable(board: &Board, color: Color, sq: Square) -> bool {
    let enemy = color.opposite();
    let enemy_non_king_pawn =
        board.occupancy(enemy) ^ board.bb(enemy, Piece::King) ^ board.bb(enemy, Piece::Pawn);
    if enemy_non_king_pawn != 0 {
        return false;
    }

    let promo_rank: i32 = if color == Color::White { 7 } else { 0 };
    let promo_file = sq.file() as i32;
    let enemy_king = board.king_square(enemy);

    let pawn_distance = (sq.rank() as i32 - promo_rank).abs();
    let king_distance = (enemy_king.rank() as i32 - promo_rank)
        .abs()
        .max((enemy_king.file() as i32 - promo_file).abs());

    // losing the tempo when the defender moves first
    let tempo = if board.side_to_move == enemy { 1 } else { 0 };
    pawn_distance.min(5) < king_distance - tempo
}

/// Free file ahead, and no square on the path is covered by more enemy pawns
/// than friendly ones.
pub fn is_candidate(board: &Board, color: Color, sq: Square) -> bool {
    let file = sq.file() as usize;
    let mut span = front_span(color, sq.rank() as usize) & FILE_MASKS[file];

    if span & (board.bb(color, Piece::Pawn) | board.bb(color.opposite(), Piece::Pawn)) != 0 {
        return false;
    }

    let enemy = color.opposite();
    while span != 0 {
        let front = pop_lsb(&mut span) as usize;
        let enemy_cover =
            (PAWN_ATTACKS[color as usize][front] & board.bb(enemy, Piece::Pawn)).popcount();
        let own_cover =
            (PAWN_ATTACKS[enemy as usize][front] & board.bb(color, Piece::Pawn)).popcount();
        if enemy_cover > own_cover {
            return false;
        }
    }
    true
}

#[inline]
fn is_defended_by_pawn(board: &Board, color: Color, sq: u8) -> bool {
    PAWN_ATTACKS[color.opposite() as usize][sq as usize] & board.bb(color, Piece::Pawn) != 0
}

pub fn is_isolated(board: &Board, color: Color, sq: Square) -> bool {
    let file = sq.file() as usize;
    let neighbors = NEIGHBORING_FILES[file] ^ FILE_MASKS[file];
    neighbors & board.bb(color, Piece::Pawn) == 0
}

/// No friendly pawn beside or behind, stop square not defendable but covered
/// by an enemy pawn.
pub fn is_backward(board: &Board, color: Color, sq: Square) -> bool {
    let rank = sq.rank() as usize;
    let file = sq.file() as usize;
    let back_span = front_span(color.opposite(), rank);
    let neighbors = NEIGHBORING_FILES[file] ^ FILE_MASKS[file];
    if back_span & neighbors & board.bb(color, Piece::Pawn) != 0 {
        return false;
    }

    let stop = match color {
        Color::White => sq.index() + 8,
        Color::Black => sq.index() - 8,
    };
    if is_defended_by_pawn(board, color, stop) {
        return false;
    }
    is_defended_by_pawn(board, color.opposite(), stop)
}

/// Per-color pawn terms: returns (attack board, opening, endgame).
fn pawn_score(board: &Board, params: &EvalParams, color: Color) -> (u64, i32, i32) {
    let mut attacks = 0u64;
    let mut opening = 0i32;
    let mut endgame = 0i32;

    let mut pawns = board.bb(color, Piece::Pawn);
    while pawns != 0 {
        let sq = Square::from_index(pop_lsb(&mut pawns));
        attacks |= PAWN_ATTACKS[color as usize][sq.index() as usize];

        if is_passed(board, color, sq) {
            if !is_obstructed(board, color, sq) {
                if is_unstoppable(board, color, sq) {
                    endgame += params.unstoppable_passer;
                } else {
                    opening += params.unobstructed_passer;
                    endgame += params.unobstructed_passer;
                }
            } else {
                opening += params.passed_pawn;
                endgame += params.passed_pawn;
            }
        } else if is_candidate(board, color, sq) {
            if !is_obstructed(board, color, sq) {
                opening += params.unobstructed_candidate;
                endgame += params.unobstructed_candidate;
            } else {
                opening += params.candidate_passer;
                endgame += params.candidate_passer;
            }
        }

        if is_isolated(board, color, sq) {
            opening -= params.isolated_pawn_penalty;
        } else if is_backward(board, color, sq) {
            opening -= params.backward_pawn_penalty;
        }
    }

    (attacks, opening, endgame)
}

// ---------- knights ----------

/// Square that no enemy pawn can ever attack: nothing on the adjacent files
/// ahead of it.
fn is_hole(board: &Board, color: Color, sq: Square) -> bool {
    let file = sq.file() as usize;
    let span = front_span(color, sq.rank() as usize)
        & (NEIGHBORING_FILES[file] ^ FILE_MASKS[file]);
    span & board.bb(color.opposite(), Piece::Pawn) == 0
}

/// Defended by a friendly pawn and standing on the enemy half.
fn is_knight_outpost(board: &Board, color: Color, sq: Square) -> bool {
    let defenders =
        PAWN_ATTACKS[color.opposite() as usize][sq.index() as usize] & board.bb(color, Piece::Pawn);
    defenders != 0 && SIDES[color.opposite() as usize] & sq.bb() != 0
}

fn knight_score(
    board: &Board,
    params: &EvalParams,
    color: Color,
    enemy_pawn_attacks: u64,
    enemy_safety: u64,
) -> (i32, i32) {
    let mut score = 0i32;
    let mut units = 0i32;

    let mut knights = board.bb(color, Piece::Knight);
    while knights != 0 {
        let sq = Square::from_index(pop_lsb(&mut knights));
        let attacks = KNIGHT_ATTACKS[sq.index() as usize];

        if is_knight_outpost(board, color, sq) {
            score += params.knight_outpost;
            if is_hole(board, color, sq) {
                score += params.knight_outpost_on_hole;
            }
        }

        let mobility = (attacks & !(enemy_pawn_attacks | board.occupancy(color))).popcount();
        score += sqrt_mobility(
            mobility as i32,
            params.knight_mobility_multiplier,
            params.knight_mobility_offset,
        );
        units += (attacks & enemy_safety).popcount() as i32 * params.minor_attack_units;
    }

    (score, units)
}

// ---------- bishops ----------

fn bishop_mobility(
    board: &Board,
    tables: &MagicTables,
    params: &EvalParams,
    color: Color,
    enemy_pawn_attacks: u64,
    enemy_safety: u64,
) -> (i32, i32) {
    let mut mobility = 0i32;
    let mut units = 0i32;

    let mut bishops = board.bb(color, Piece::Bishop);
    while bishops != 0 {
        let sq = pop_lsb(&mut bishops);
        let attack = tables
            .bishop
            .get_attacks(sq as usize, board.occ_all ^ (1u64 << sq));
        mobility += (attack & !(enemy_pawn_attacks | board.occupancy(color))).popcount() as i32;
        units += (attack & enemy_safety).popcount() as i32 * params.minor_attack_units;
    }

    (mobility, units)
}

// ---------- rooks ----------

fn open_file(board: &Board, file: usize) -> bool {
    (board.bb(Color::White, Piece::Pawn) | board.bb(Color::Black, Piece::Pawn)) & FILE_MASKS[file]
        == 0
}

/// An uncastled king trapping its own rook in the corner.
fn king_blocks_rook(board: &Board, color: Color, rook_sq: Square) -> bool {
    let king = board.king_square(color).index();
    match (color, rook_sq.index()) {
        (Color::White, 7) => king == 6 || king == 5,          // h1 rook, king g1/f1
        (Color::White, 0) => king == 1 || king == 2 || king == 3, // a1 rook, king b1/c1/d1
        (Color::Black, 63) => king == 62 || king == 61,
        (Color::Black, 56) => king == 57 || king == 58 || king == 59,
        _ => false,
    }
}

fn rook_score(
    board: &Board,
    tables: &MagicTables,
    params: &EvalParams,
    color: Color,
    enemy_pawn_attacks: u64,
    enemy_safety: u64,
) -> (i32, i32, i32) {
    let mut opening = 0i32;
    let mut endgame = 0i32;
    let mut units = 0i32;
    let mut last_attack = 0u64;

    let mut rooks = board.bb(color, Piece::Rook);
    while rooks != 0 {
        let sq = Square::from_index(pop_lsb(&mut rooks));
        let i = sq.index() as usize;

        if open_file(board, sq.file() as usize) {
            opening += params.rook_open_file;
        }
        if king_blocks_rook(board, color, sq) {
            opening -= params.king_block_rook_penalty;
        }

        let attack = tables.rook.get_attacks(i, board.occ_all ^ sq.bb());
        let free = !(enemy_pawn_attacks | board.occupancy(color));
        let horizontal = (attack & RANK_MASKS[sq.rank() as usize] & free).popcount() as i32;
        let vertical = (attack & FILE_MASKS[sq.file() as usize] & free).popcount() as i32;
        opening += sqrt_mobility(
            horizontal,
            params.rook_horizontal_mobility_multiplier,
            params.rook_horizontal_mobility_offset,
        );
        endgame += sqrt_mobility(
            vertical,
            params.rook_vertical_mobility_multiplier,
            params.rook_vertical_mobility_offset,
        );

        units += (attack & enemy_safety).popcount() as i32 * params.rook_attack_units;
        if attack & board.bb(color.opposite(), Piece::King) != 0 {
            units += params.rook_check_units;
        }

        last_attack = attack;
    }

    // connected rooks: mutual along a shared line, so checking the last one
    // against the rest suffices
    if last_attack & board.bb(color, Piece::Rook) != 0 {
        opening += params.rook_connected;
        endgame += params.rook_connected;
    }

    (opening, endgame, units)
}

// ---------- king safety ----------

fn queen_attack_units(
    board: &Board,
    tables: &MagicTables,
    params: &EvalParams,
    color: Color,
    enemy_safety: u64,
) -> i32 {
    let mut units = 0i32;
    let mut queens = board.bb(color, Piece::Queen);
    while queens != 0 {
        let sq = pop_lsb(&mut queens);
        let attack = tables.queen_attacks(sq as usize, board.occ_all ^ (1u64 << sq));
        units += (attack & enemy_safety).popcount() as i32 * params.queen_attack_units;
        if attack & board.bb(color.opposite(), Piece::King) != 0 {
            units += params.queen_check_units;
        }
    }
    units
}

/// King ring plus a pawn-shield band two ranks ahead, minus the rank behind.
pub fn king_safety_area(color: Color, king: Square) -> u64 {
    let mut area = KING_ATTACKS[king.index() as usize];
    let rank = king.rank() as usize;
    let file = king.file() as usize;

    match color {
        Color::White => {
            if rank < 6 {
                area |= RANK_MASKS[rank + 2] & NEIGHBORING_FILES[file];
            }
            if rank > 0 {
                area &= !RANK_MASKS[rank - 1];
            }
        }
        Color::Black => {
            if rank > 1 {
                area |= RANK_MASKS[rank - 2] & NEIGHBORING_FILES[file];
            }
            if rank < 7 {
                area &= !RANK_MASKS[rank + 1];
            }
        }
    }
    area
}

/// Safety area plus one extra rank toward the enemy; advancing enemy pawns
/// in here count as a storm.
pub fn king_danger_area(color: Color, king: Square) -> u64 {
    let mut area = king_safety_area(color, king);
    let rank = king.rank() as usize;
    let file = king.file() as usize;

    match color {
        Color::White => {
            if rank < 5 {
                area |= RANK_MASKS[rank + 3] & NEIGHBORING_FILES[file];
            }
        }
        Color::Black => {
            if rank > 2 {
                area |= RANK_MASKS[rank - 3] & NEIGHBORING_FILES[file];
            }
        }
    }
    area
}

#[inline]
fn shield_count(board: &Board, safety_area: u64, color: Color) -> i32 {
    (safety_area & board.bb(color, Piece::Pawn)).popcount() as i32
}

#[inline]
fn storm_count(board: &Board, danger_area: u64, color: Color) -> i32 {
    (danger_area & board.bb(color.opposite(), Piece::Pawn)).popcount() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::square::Square;
    use std::str::FromStr;

    fn sq(s: &str) -> Square {
        Square::from_str(s).unwrap()
    }

    #[test]
    fn passed_pawn_detection() {
        let board = Board::from_str("4k3/8/8/8/2Pp4/8/8/4K3 w - - 0 1").unwrap();
        assert!(is_passed(&board, Color::White, sq("c4")));
        assert!(is_passed(&board, Color::Black, sq("d4")));

        let board = Board::from_str("4k3/2p5/8/8/2P5/8/8/4K3 w - - 0 1").unwrap();
        assert!(!is_passed(&board, Color::White, sq("c4")));
        // blocked by an own pawn ahead is not passed either
        let board = Board::from_str("4k3/8/2P5/8/2P5/8/8/4K3 w - - 0 1").unwrap();
        assert!(!is_passed(&board, Color::White, sq("c4")));
        assert!(is_passed(&board, Color::White, sq("c6")));
    }

    #[test]
    fn obstruction_uses_any_piece() {
        let board = Board::from_str("4k3/8/8/2n5/2P5/8/8/4K3 w - - 0 1").unwrap();
        assert!(is_passed(&board, Color::White, sq("c4")));
        assert!(is_obstructed(&board, Color::White, sq("c4")));
    }

    #[test]
    fn unstoppable_uses_the_rule_of_the_square() {
        // white pawn a6, white to move; black king too far on h8
        let board = Board::from_str("7k/8/P7/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(is_unstoppable(&board, Color::White, sq("a6")));
        // king close enough catches it
        let board = Board::from_str("8/2k5/P7/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(!is_unstoppable(&board, Color::White, sq("a6")));
        // any enemy piece besides king and pawns disables the shortcut
        let board = Board::from_str("7k/8/P7/8/8/8/8/4K2n w - - 0 1").unwrap();
        assert!(!is_unstoppable(&board, Color::White, sq("a6")));
    }

    #[test]
    fn isolated_and_backward() {
        let board = Board::from_str("4k3/8/8/8/8/8/P1P5/4K3 w - - 0 1").unwrap();
        assert!(is_isolated(&board, Color::White, sq("a2")));
        assert!(is_isolated(&board, Color::White, sq("c2")));

        // d2 pawn lags behind its e4 neighbor while a black pawn covers d3
        let board = Board::from_str("4k3/8/8/8/2p1P3/8/3P4/4K3 w - - 0 1").unwrap();
        assert!(!is_isolated(&board, Color::White, sq("d2")));
        assert!(is_backward(&board, Color::White, sq("d2")));
    }

    #[test]
    fn safety_area_shape_for_castled_king() {
        // white king g1: ring f1,h1,f2,g2,h2 plus shield band f3,g3,h3
        let area = king_safety_area(Color::White, sq("g1"));
        for s in ["f1", "h1", "f2", "g2", "h2", "f3", "g3", "h3"] {
            assert!(area & sq(s).bb() != 0, "{} missing from safety area", s);
        }
        assert_eq!(area & sq("e1").bb(), 0);

        let danger = king_danger_area(Color::White, sq("g1"));
        for s in ["f4", "g4", "h4"] {
            assert!(danger & sq(s).bb() != 0, "{} missing from danger area", s);
        }
    }

    #[test]
    fn evaluation_is_color_symmetric() {
        use crate::moves::magic::loader::build_magic_tables;

        let tables = build_magic_tables();
        let params = EvalParams::default();

        let pairs = [
            (
                "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 0 1",
                "rnbqkb1r/pppp1ppp/5n2/4p3/4P3/2N5/PPPP1PPP/R1BQKBNR b KQkq - 0 1",
            ),
            (
                "4k3/2p5/8/8/8/8/2P2P2/4K3 w - - 0 1",
                "4k3/2p2p2/8/8/8/8/2P5/4K3 b - - 0 1",
            ),
        ];
        for (white_fen, mirrored_fen) in pairs {
            let a = Board::from_str(white_fen).unwrap();
            let b = Board::from_str(mirrored_fen).unwrap();
            let mut pt = PawnTable::new(1);
            let ea = evaluate(&a, &tables, &params, &mut pt);
            let mut pt = PawnTable::new(1);
            let eb = evaluate(&b, &tables, &params, &mut pt);
            assert_eq!(ea, eb, "{} vs {}", white_fen, mirrored_fen);
            assert_eq!(lazy_evaluate(&a), lazy_evaluate(&b));
        }
    }

    #[test]
    fn lazy_eval_prefers_material() {
        let board = Board::from_str("4k3/8/8/8/8/8/8/Q3K3 w - - 0 1").unwrap();
        assert!(lazy_evaluate(&board) > 500);
        let board = Board::from_str("4k3/8/8/8/8/8/8/Q3K3 b - - 0 1").unwrap();
        assert!(lazy_evaluate(&board) < -500);
    }
}

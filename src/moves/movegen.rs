//! Single-pass legal move generation.
//!
//! A `GenSetup` snapshot is computed once per node: the checking pieces, the
//! absolutely pinned pieces, and the check-block mask. Generation then
//! intersects every piece's pseudo-attacks with those masks, so no
//! make/undo-and-test filtering pass is needed. King moves, castling, and en
//! passant are the three cases validated by explicit attack re-queries.

use crate::bitboard::BitboardExt;
use crate::board::{Board, Color, Piece, EMPTY_SQ};
use crate::moves::king::KING_ATTACKS;
use crate::moves::knight::KNIGHT_ATTACKS;
use crate::moves::magic::MagicTables;
use crate::moves::masks::{
    anti_diag_index, diag_index, ANTI_DIAG_MASKS, DIAG_MASKS, FILE_MASKS, RANK_MASKS,
};
use crate::moves::pawn::{PAWN_ATTACKS, PAWN_PUSHES};
use crate::moves::types::{
    Move, MoveList, CAPTURE, DOUBLE_PAWN_PUSH, EN_PASSANT, KINGSIDE_CASTLE, PROMOTION,
    PROMOTION_CAPTURE, QUEENSIDE_CASTLE, QUIET_MOVE,
};
use crate::square::Square;
use crate::utils::pop_lsb;

// squares that must be empty between king and rook
const WHITE_KINGSIDE_BETWEEN: u64 = 0x0000_0000_0000_0060;
const WHITE_QUEENSIDE_BETWEEN: u64 = 0x0000_0000_0000_000E;
const BLACK_KINGSIDE_BETWEEN: u64 = 0x6000_0000_0000_0000;
const BLACK_QUEENSIDE_BETWEEN: u64 = 0x0E00_0000_0000_0000;

const PROMOS: [Piece; 4] = [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight];

/// Which subset of legal moves to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenFilter {
    All,
    /// Captures plus pawn promotions (quiescence).
    AttackOnly,
    /// Non-captures without promotions; castling and en passant are omitted.
    QuietOnly,
}

/// All pieces of `side`'s opponent giving check to a hypothetical king of
/// `side` on `king_sq`, with `occupancy` as the slider blocker set and the
/// squares in `ignore` removed from the attacker boards.
pub fn checkers_at(
    board: &Board,
    tables: &MagicTables,
    side: Color,
    king_sq: u8,
    occupancy: u64,
    ignore: u64,
) -> u64 {
    let enemy = side.opposite();
    let k = king_sq as usize;

    let knights = KNIGHT_ATTACKS[k] & board.bb(enemy, Piece::Knight);
    let pawns = PAWN_ATTACKS[side as usize][k] & board.bb(enemy, Piece::Pawn);
    let kings = KING_ATTACKS[k] & board.bb(enemy, Piece::King);

    let diag = tables.bishop.get_attacks(k, occupancy)
        & (board.bb(enemy, Piece::Bishop) | board.bb(enemy, Piece::Queen));
    let orth = tables.rook.get_attacks(k, occupancy)
        & (board.bb(enemy, Piece::Rook) | board.bb(enemy, Piece::Queen));

    (knights | pawns | kings | diag | orth) & !ignore
}

/// Is `side`'s king currently attacked?
#[inline(always)]
pub fn in_check(board: &Board, side: Color, tables: &MagicTables) -> bool {
    let k = board.king_square(side);
    checkers_at(board, tables, side, k.index(), board.occ_all, 0) != 0
}

/// Per-node generation state: checkers, pins, and the block mask.
pub struct GenSetup {
    pub checkers: u64,
    pub pinned: u64,
    block_mask: u64,
    occ_iter: u64,
}

impl GenSetup {
    pub fn new(board: &Board, tables: &MagicTables) -> Self {
        let us = board.side_to_move;
        let king = board.king_square(us);
        let k = king.index() as usize;

        let bishop_from_king = tables.bishop.get_attacks(k, board.occ_all);
        let rook_from_king = tables.rook.get_attacks(k, board.occ_all);

        let enemy = us.opposite();
        let checkers = (KNIGHT_ATTACKS[k] & board.bb(enemy, Piece::Knight))
            | (PAWN_ATTACKS[us as usize][k] & board.bb(enemy, Piece::Pawn))
            | (KING_ATTACKS[k] & board.bb(enemy, Piece::King))
            | (bishop_from_king & (board.bb(enemy, Piece::Bishop) | board.bb(enemy, Piece::Queen)))
            | (rook_from_king & (board.bb(enemy, Piece::Rook) | board.bb(enemy, Piece::Queen)));

        let mut occ_iter = board.occ[us as usize];
        let mut block_mask = u64::MAX;
        let mut pinned = 0u64;

        match checkers.count_ones() {
            // double check: only the king may move
            n if n > 1 => occ_iter = board.bb(us, Piece::King),
            1 => {
                block_mask =
                    check_block_mask(board, tables, checkers, bishop_from_king, rook_from_king)
                        | checkers;
                pinned = pinned_pieces(board, tables, king, bishop_from_king, rook_from_king);
            }
            _ => {
                pinned = pinned_pieces(board, tables, king, bishop_from_king, rook_from_king);
            }
        }

        GenSetup {
            checkers,
            pinned,
            block_mask,
            occ_iter,
        }
    }

    /// Emit the legal moves selected by `filter` into `moves`.
    pub fn generate(
        &self,
        board: &Board,
        tables: &MagicTables,
        filter: GenFilter,
        moves: &mut MoveList,
    ) {
        moves.clear();

        let us = board.side_to_move;
        let enemy_occ = board.opponent_occupancy(us);
        let own_occ = board.occupancy(us);
        let promo_rank = RANK_MASKS[if us == Color::White { 7 } else { 0 }];

        let prev_castling = board.castling_rights;
        let prev_en_passant = board.en_passant;
        let prev_halfmove = board.halfmove_clock;

        let push = |moves: &mut MoveList, from: u8, to: u8, flags: u8, promotion: Option<Piece>| {
            let occupant = board.piece_on_sq[to as usize];
            let captured = if flags == EN_PASSANT {
                Some(Piece::Pawn)
            } else if occupant != EMPTY_SQ {
                Some(Piece::from_u8(occupant & 0b111))
            } else {
                None
            };
            moves.push(Move {
                from: Square::from_index(from),
                to: Square::from_index(to),
                flags,
                promotion,
                captured,
                prev_castling,
                prev_en_passant,
                prev_halfmove,
                score: 0,
            });
        };

        let mut occ = self.occ_iter;
        while occ != 0 {
            let from = pop_lsb(&mut occ);
            let piece = Piece::from_u8(board.piece_on_sq[from as usize] & 0b111);

            let mut move_board = match piece {
                Piece::Pawn => {
                    (pawn_push_board(board, us, from)
                        | (PAWN_ATTACKS[us as usize][from as usize] & enemy_occ))
                        & self.block_mask
                }
                Piece::Knight => KNIGHT_ATTACKS[from as usize] & !own_occ & self.block_mask,
                Piece::Bishop => {
                    tables.bishop.get_attacks(from as usize, board.occ_all)
                        & !own_occ
                        & self.block_mask
                }
                Piece::Rook => {
                    tables.rook.get_attacks(from as usize, board.occ_all)
                        & !own_occ
                        & self.block_mask
                }
                Piece::Queen => {
                    tables.queen_attacks(from as usize, board.occ_all)
                        & !own_occ
                        & self.block_mask
                }
                // the king ignores the block mask; each target is verified below
                Piece::King => KING_ATTACKS[from as usize] & !own_occ,
            };

            match filter {
                GenFilter::All => {}
                GenFilter::AttackOnly => {
                    let mut attack_occ = enemy_occ;
                    if piece == Piece::Pawn {
                        attack_occ |= promo_rank;
                    }
                    move_board &= attack_occ;
                }
                GenFilter::QuietOnly => {
                    let mut quiet_occ = !enemy_occ;
                    if piece == Piece::Pawn {
                        quiet_occ &= !promo_rank;
                    }
                    move_board &= quiet_occ;
                }
            }

            if self.pinned & (1u64 << from) != 0 {
                move_board &= pinned_legal_mask(board, from);
            }

            while move_board != 0 {
                let to = pop_lsb(&mut move_board);
                let is_capture = board.piece_on_sq[to as usize] != EMPTY_SQ;
                let base = if is_capture { CAPTURE } else { QUIET_MOVE };

                match piece {
                    Piece::Pawn => {
                        let to_rank = to / 8;
                        if to_rank == 0 || to_rank == 7 {
                            let flags = if is_capture { PROMOTION_CAPTURE } else { PROMOTION };
                            for promo in PROMOS {
                                push(moves, from, to, flags, Some(promo));
                            }
                        } else if (to as i32 - from as i32).abs() == 16 {
                            push(moves, from, to, DOUBLE_PAWN_PUSH, None);
                        } else {
                            push(moves, from, to, base, None);
                        }
                    }
                    Piece::King => {
                        if is_king_move_legal(board, tables, from, to) {
                            push(moves, from, to, base, None);
                        }
                    }
                    _ => push(moves, from, to, base, None),
                }
            }
        }

        // castling: never while in check, omitted from the quiet-only filter
        if self.checkers == 0 && filter != GenFilter::QuietOnly {
            let (ks_between, qs_between, king_from) = match us {
                Color::White => (WHITE_KINGSIDE_BETWEEN, WHITE_QUEENSIDE_BETWEEN, 4u8),
                Color::Black => (BLACK_KINGSIDE_BETWEEN, BLACK_QUEENSIDE_BETWEEN, 60u8),
            };

            if board.has_kingside_castle(us) && board.occ_all & ks_between == 0 {
                let (f, g) = (king_from + 1, king_from + 2);
                if !square_attacked_as_king(board, tables, us, f)
                    && !square_attacked_as_king(board, tables, us, g)
                {
                    push(moves, king_from, g, KINGSIDE_CASTLE, None);
                }
            }
            if board.has_queenside_castle(us) && board.occ_all & qs_between == 0 {
                let (d, c) = (king_from - 1, king_from - 2);
                if !square_attacked_as_king(board, tables, us, d)
                    && !square_attacked_as_king(board, tables, us, c)
                {
                    push(moves, king_from, c, QUEENSIDE_CASTLE, None);
                }
            }
        }

        // en passant, validated by occupancy surgery
        if filter != GenFilter::QuietOnly {
            if let Some(ep) = board.en_passant {
                let enemy = us.opposite();
                let mut captors =
                    PAWN_ATTACKS[enemy as usize][ep.index() as usize] & board.bb(us, Piece::Pawn);
                while captors != 0 {
                    let from = pop_lsb(&mut captors);
                    if is_ep_legal(board, tables, from, ep.index()) {
                        push(moves, from, ep.index(), EN_PASSANT, None);
                    }
                }
            }
        }
    }
}

/// Convenience wrapper: setup plus generation in one call.
pub fn generate_moves(
    board: &Board,
    tables: &MagicTables,
    filter: GenFilter,
    moves: &mut MoveList,
) {
    GenSetup::new(board, tables).generate(board, tables, filter, moves);
}

/// Pawn pushes with blockers applied; the double push needs both squares free.
#[inline(always)]
fn pawn_push_board(board: &Board, us: Color, from: u8) -> u64 {
    let front = match us {
        Color::White => from + 8,
        Color::Black => from - 8,
    };
    if board.piece_on_sq[front as usize] != EMPTY_SQ {
        return 0;
    }
    PAWN_PUSHES[us as usize][from as usize] & !board.occ_all
}

/// Block mask for a single sliding checker: the ray between king and checker.
/// Contact checkers (pawn, knight) leave the mask empty; the caller ORs in
/// the checker square itself.
fn check_block_mask(
    board: &Board,
    tables: &MagicTables,
    checkers: u64,
    bishop_from_king: u64,
    rook_from_king: u64,
) -> u64 {
    let checker = checkers.lsb();
    let occupancy = board.occ_all ^ (1u64 << checker);
    let king = board.king_square(board.side_to_move);

    match Piece::from_u8(board.piece_on_sq[checker as usize] & 0b111) {
        Piece::Bishop => tables.bishop.get_attacks(checker as usize, occupancy) & bishop_from_king,
        Piece::Rook => tables.rook.get_attacks(checker as usize, occupancy) & rook_from_king,
        Piece::Queen => {
            let aligned_orthogonally =
                checker / 8 == king.rank() || checker % 8 == king.file();
            if aligned_orthogonally {
                tables.rook.get_attacks(checker as usize, occupancy) & rook_from_king
            } else {
                tables.bishop.get_attacks(checker as usize, occupancy) & bishop_from_king
            }
        }
        _ => 0,
    }
}

/// Absolutely pinned pieces: for each enemy slider sharing a line with the
/// king, the intersection of the slider's ray and the king's ray along that
/// line picks out the single piece in between, if any.
fn pinned_pieces(
    board: &Board,
    tables: &MagicTables,
    king: Square,
    bishop_from_king: u64,
    rook_from_king: u64,
) -> u64 {
    let us = board.side_to_move;
    let enemy = us.opposite();
    let k = king.index() as usize;
    let mut pinned = 0u64;

    let mut enemy_rooks = (board.bb(enemy, Piece::Rook) | board.bb(enemy, Piece::Queen))
        & (RANK_MASKS[k / 8] | FILE_MASKS[k % 8]);
    while enemy_rooks != 0 {
        let slider = pop_lsb(&mut enemy_rooks);
        let attack = tables
            .rook
            .get_attacks(slider as usize, board.occ_all ^ (1u64 << slider));
        let intersection = attack & rook_from_king;
        if intersection != 0 && board.piece_on_sq[intersection.lsb() as usize] != EMPTY_SQ {
            pinned |= intersection;
        }
    }

    let mut enemy_bishops = (board.bb(enemy, Piece::Bishop) | board.bb(enemy, Piece::Queen))
        & (DIAG_MASKS[diag_index(k)] | ANTI_DIAG_MASKS[anti_diag_index(k)]);
    while enemy_bishops != 0 {
        let slider = pop_lsb(&mut enemy_bishops);
        let attack = tables
            .bishop
            .get_attacks(slider as usize, board.occ_all ^ (1u64 << slider));
        let intersection = attack & bishop_from_king;
        if intersection != 0 && board.piece_on_sq[intersection.lsb() as usize] != EMPTY_SQ {
            pinned |= intersection;
        }
    }

    pinned
}

/// Line a pinned piece is confined to: the full rank/file/diagonal through
/// the king and the pinned piece.
fn pinned_legal_mask(board: &Board, pinned_sq: u8) -> u64 {
    let k = board.king_square(board.side_to_move).index();
    let (kr, kf) = (k / 8, k % 8);
    let (pr, pf) = (pinned_sq / 8, pinned_sq % 8);

    if pr == kr {
        RANK_MASKS[pr as usize]
    } else if pf == kf {
        FILE_MASKS[pf as usize]
    } else if (pr > kr && pf > kf) || (pr < kr && pf < kf) {
        DIAG_MASKS[diag_index(k as usize)]
    } else {
        ANTI_DIAG_MASKS[anti_diag_index(k as usize)]
    }
}

/// King step legality: re-run the attack query with the king moved, so rays
/// through the vacated square count.
fn is_king_move_legal(board: &Board, tables: &MagicTables, from: u8, to: u8) -> bool {
    let us = board.side_to_move;
    let occupancy = (board.occ_all ^ (1u64 << from)) & !(1u64 << to);
    checkers_at(board, tables, us, to, occupancy, 0) == 0
}

/// Would the king be attacked standing on `sq` with the current occupancy?
/// Used for the castling transit squares.
fn square_attacked_as_king(board: &Board, tables: &MagicTables, us: Color, sq: u8) -> bool {
    checkers_at(board, tables, us, sq, board.occ_all, 0) != 0
}

/// En-passant legality: remove captor and captured pawn from the occupancy,
/// place the captor on the target, and test the king. Catches the exposed
/// rank pin that no other path sees.
fn is_ep_legal(board: &Board, tables: &MagicTables, from: u8, to: u8) -> bool {
    let us = board.side_to_move;
    let cap_sq = match us {
        Color::White => to - 8,
        Color::Black => to + 8,
    };
    let king = board.king_square(us).index();
    let occupancy = (board.occ_all ^ (1u64 << from) ^ (1u64 << cap_sq)) | (1u64 << to);
    checkers_at(board, tables, us, king, occupancy, 1u64 << cap_sq) == 0
}

use super::{Board, Color, Piece, CASTLE_BK, CASTLE_BQ, CASTLE_WK, CASTLE_WQ};
use crate::hash::zobrist::{xor_castling_rights_delta, zobrist_keys};
use crate::square::Square;
use std::str::FromStr;

fn piece_from_glyph(c: char) -> Option<(Color, Piece)> {
    let color = if c.is_ascii_uppercase() {
        Color::White
    } else {
        Color::Black
    };
    let piece = match c.to_ascii_lowercase() {
        'p' => Piece::Pawn,
        'n' => Piece::Knight,
        'b' => Piece::Bishop,
        'r' => Piece::Rook,
        'q' => Piece::Queen,
        'k' => Piece::King,
        _ => return None,
    };
    Some((color, piece))
}

impl Board {
    /// Load a FEN string, replacing the whole position. The halfmove and
    /// fullmove counters are accepted when present.
    pub fn set_fen(&mut self, fen: &str) -> Result<(), String> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(format!("FEN needs at least 4 fields: {:?}", fen));
        }

        *self = Board::new_empty();

        // 1) piece placement, rank 8 first
        let mut rank: i32 = 7;
        let mut file: i32 = 0;
        for c in fields[0].chars() {
            match c {
                '/' => {
                    rank -= 1;
                    file = 0;
                    if rank < 0 {
                        return Err("too many ranks in FEN".into());
                    }
                }
                '1'..='8' => {
                    file += c as i32 - '0' as i32;
                }
                _ => {
                    let (color, piece) =
                        piece_from_glyph(c).ok_or_else(|| format!("bad FEN glyph: {:?}", c))?;
                    if file > 7 {
                        return Err("too many files in FEN rank".into());
                    }
                    let sq = Square::from_coords(rank as u8, file as u8);
                    self.toggle_piece(color, piece, sq);
                    file += 1;
                }
            }
            if file > 8 {
                return Err("too many files in FEN rank".into());
            }
        }

        for color in [Color::White, Color::Black] {
            if self.bb(color, Piece::King).count_ones() != 1 {
                return Err(format!("{:?} must have exactly one king", color));
            }
        }

        // 2) side to move
        self.side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(format!("bad side-to-move field: {:?}", other)),
        };

        // 3) castling rights
        if fields[2] != "-" {
            for c in fields[2].chars() {
                self.castling_rights |= match c {
                    'K' => CASTLE_WK,
                    'Q' => CASTLE_WQ,
                    'k' => CASTLE_BK,
                    'q' => CASTLE_BQ,
                    other => return Err(format!("bad castling glyph: {:?}", other)),
                };
            }
        }

        // 4) en passant target
        if fields[3] != "-" {
            self.en_passant = Some(Square::from_str(fields[3])?);
        }

        // 5-6) counters, optional
        if let Some(half) = fields.get(4) {
            self.halfmove_clock = half.parse().unwrap_or(0);
        }
        if let Some(full) = fields.get(5) {
            self.fullmove_number = full.parse().unwrap_or(1);
        }

        // fold in the non-piece hash contributions (pieces were hashed by
        // toggle_piece during placement)
        let keys = zobrist_keys();
        if self.side_to_move == Color::Black {
            self.zobrist ^= keys.side_to_move;
        }
        xor_castling_rights_delta(&mut self.zobrist, keys, 0, self.castling_rights);
        if let Some(ep) = self.en_passant {
            self.zobrist ^= keys.ep_file[ep.file() as usize];
        }

        self.repetitions.clear();
        self.repetitions.increment(self.zobrist);

        #[cfg(debug_assertions)]
        self.assert_hash();

        Ok(())
    }

    /// Serialize to FEN. The move counters are written as "0 1".
    pub fn to_fen(&self) -> String {
        let mut fen = String::new();

        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                let sq = Square::from_coords(rank, file);
                match self.piece_at(sq) {
                    None => empty += 1,
                    Some((color, piece)) => {
                        if empty > 0 {
                            fen.push_str(&empty.to_string());
                            empty = 0;
                        }
                        fen.push(piece.glyph(color));
                    }
                }
            }
            if empty > 0 {
                fen.push_str(&empty.to_string());
            }
            if rank != 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(if self.side_to_move == Color::White {
            'w'
        } else {
            'b'
        });

        fen.push(' ');
        if self.castling_rights == 0 {
            fen.push('-');
        } else {
            if self.castling_rights & CASTLE_WK != 0 {
                fen.push('K');
            }
            if self.castling_rights & CASTLE_WQ != 0 {
                fen.push('Q');
            }
            if self.castling_rights & CASTLE_BK != 0 {
                fen.push('k');
            }
            if self.castling_rights & CASTLE_BQ != 0 {
                fen.push('q');
            }
        }

        fen.push(' ');
        match self.en_passant {
            Some(ep) => fen.push_str(&ep.to_string()),
            None => fen.push('-'),
        }

        fen.push_str(" 0 1");
        fen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_round_trip() {
        let board = Board::new();
        assert_eq!(board.to_fen(), super::super::START_FEN);
        assert_eq!(board.side_to_move, Color::White);
        assert_eq!(board.castling_rights, 0b1111);
        assert_eq!(board.material(Color::White), board.material(Color::Black));
        assert_eq!(board.king_square(Color::White).to_string(), "e1");
        assert_eq!(board.king_square(Color::Black).to_string(), "e8");
        board.validate().unwrap();
    }

    #[test]
    fn kiwipete_round_trip() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let board = Board::from_str(fen).unwrap();
        assert_eq!(board.to_fen(), fen);
        board.validate().unwrap();
    }

    #[test]
    fn en_passant_field_parses() {
        let fen = "rnbqkbnr/pppp1ppp/8/4p3/8/8/PPPPPPPP/RNBQKBNR w KQkq e6 0 2";
        let board = Board::from_str(fen).unwrap();
        assert_eq!(board.en_passant.unwrap().to_string(), "e6");
        // counters accepted on input, emitted as 0 1
        assert!(board.to_fen().ends_with("e6 0 1"));
    }

    #[test]
    fn rejects_malformed_fens() {
        assert!(Board::from_str("").is_err());
        assert!(Board::from_str("8/8/8/8/8/8/8/8 w - -").is_err()); // no kings
        assert!(Board::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq -").is_err());
        assert!(Board::from_str("9/8/8/8/8/8/8/4K2k w - -").is_err());
    }

    #[test]
    fn phase_bounds() {
        let start = Board::new();
        assert_eq!(start.phase(), 0);
        let bare = Board::from_str("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(bare.phase(), 256);
    }

    #[test]
    fn insufficient_material_predicate() {
        let cases = [
            ("4k3/8/8/8/8/8/8/4K3 w - - 0 1", true, true),
            // lone knight / lone bishop: insufficient
            ("4k3/8/8/8/8/8/8/2N1K3 w - - 0 1", true, true),
            ("4k3/8/8/8/8/8/8/2B1K3 w - - 0 1", true, true),
            // two knights: still insufficient by the predicate
            ("4k3/8/8/8/8/8/8/1NN1K3 w - - 0 1", true, true),
            // bishop + knight: sufficient
            ("4k3/8/8/8/8/8/8/1BN1K3 w - - 0 1", false, true),
            // pawn, rook, queen: sufficient
            ("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1", false, true),
            ("4k3/8/8/8/8/8/8/R3K3 w - - 0 1", false, true),
            ("4k3/8/8/8/8/8/8/Q3K3 w - - 0 1", false, true),
        ];
        for (fen, white_insufficient, black_insufficient) in cases {
            let board = Board::from_str(fen).unwrap();
            assert_eq!(
                board.insufficient_material(Color::White),
                white_insufficient,
                "white: {}",
                fen
            );
            assert_eq!(
                board.insufficient_material(Color::Black),
                black_insufficient,
                "black: {}",
                fen
            );
        }
    }
}

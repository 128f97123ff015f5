use crate::board::castle_bits::*;
use once_cell::sync::OnceCell;
use rand::{rngs::StdRng, RngCore, SeedableRng};

#[cfg(feature = "deterministic_zobrist")]
const ZOBRIST_SEED: u64 = 0x9E37_79B9_AAAC_5C87;

fn make_zobrist_rng() -> StdRng {
    #[cfg(feature = "deterministic_zobrist")]
    {
        StdRng::seed_from_u64(ZOBRIST_SEED)
    }
    #[cfg(not(feature = "deterministic_zobrist"))]
    {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        StdRng::from_seed(seed)
    }
}

pub struct ZobristKeys {
    /// [color][piece][square] with {White=0, Black=1} and {P,N,B,R,Q,K}={0..5}.
    /// The pawn hash folds the same keys for pawns and kings only.
    pub piece: [[[u64; 64]; 6]; 2],
    pub side_to_move: u64,
    /// [0]=K, [1]=Q, [2]=k, [3]=q (bit order matches the castling bitfield)
    pub castling: [u64; 4],
    /// a..h => 0..7; hashed whenever an en-passant target is set
    pub ep_file: [u64; 8],
}

/// XOR the castling keys whose bits differ between `old` and `new_` rights.
#[inline]
pub fn xor_castling_rights_delta(hash: &mut u64, keys: &ZobristKeys, old: u8, new_: u8) {
    let d = old ^ new_;
    if d & CASTLE_WK != 0 {
        *hash ^= keys.castling[0];
    }
    if d & CASTLE_WQ != 0 {
        *hash ^= keys.castling[1];
    }
    if d & CASTLE_BK != 0 {
        *hash ^= keys.castling[2];
    }
    if d & CASTLE_BQ != 0 {
        *hash ^= keys.castling[3];
    }
}

// Global keys, initialized on first use.
pub fn zobrist_keys() -> &'static ZobristKeys {
    static KEYS: OnceCell<ZobristKeys> = OnceCell::new();
    KEYS.get_or_init(|| generate_zobrist_keys_with_rng(make_zobrist_rng()))
}

fn generate_zobrist_keys_with_rng(mut rng: StdRng) -> ZobristKeys {
    #[inline]
    fn non_zero(r: &mut StdRng) -> u64 {
        // zero keys would degenerate into no-ops when XORed
        let mut v = r.next_u64();
        while v == 0 {
            v = r.next_u64();
        }
        v
    }

    let mut keys = ZobristKeys {
        piece: [[[0u64; 64]; 6]; 2],
        side_to_move: 0,
        castling: [0u64; 4],
        ep_file: [0u64; 8],
    };

    for c in 0..2 {
        for p in 0..6 {
            for sq in 0..64 {
                keys.piece[c][p][sq] = non_zero(&mut rng);
            }
        }
    }
    for i in 0..4 {
        keys.castling[i] = non_zero(&mut rng);
    }
    for f in 0..8 {
        keys.ep_file[f] = non_zero(&mut rng);
    }
    keys.side_to_move = non_zero(&mut rng);

    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_nonzero_and_stable() {
        let keys = zobrist_keys();
        assert_ne!(keys.side_to_move, 0);
        assert_ne!(keys.piece[0][0][0], 0);
        // a second call must hand back the same table
        assert_eq!(
            zobrist_keys().piece[1][5][63],
            keys.piece[1][5][63]
        );
    }

    #[test]
    fn castling_delta_is_involutive() {
        let keys = zobrist_keys();
        let mut h = 0xDEAD_BEEFu64;
        let orig = h;
        xor_castling_rights_delta(&mut h, keys, 0b1111, 0b0101);
        xor_castling_rights_delta(&mut h, keys, 0b0101, 0b1111);
        assert_eq!(h, orig);
    }
}

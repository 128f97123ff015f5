//! Tunable evaluation weights.
//!
//! The scalar weights, the king-safety table, and the twelve piece-square
//! tables persist as one flat comma-separated integer file in a fixed
//! canonical order. Piece-square tables are stored half-width (files a-d of
//! each rank) and mirrored to the full 8 files at load time; file-asymmetric
//! tables are therefore unrepresentable in the file format.
//!
//! The PST set is process-wide and frozen after startup because the board
//! maintains its piece-square sums incrementally on every toggle. The scalar
//! weights travel by reference through search and evaluation.

use once_cell::sync::OnceCell;
use std::fmt::Write as _;
use std::path::Path;

/// Per-piece, per-square additive terms from White's perspective, rank 1
/// first (index = rank * 8 + file). Black uses the vertically mirrored square.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PstSet {
    pub opening: [[i32; 64]; 6],
    pub endgame: [[i32; 64]; 6],
}

/// Scalar evaluation weights plus the king-safety lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalParams {
    // pawn structure
    pub passed_pawn: i32,
    pub unobstructed_passer: i32,
    pub unstoppable_passer: i32,
    pub candidate_passer: i32,
    pub unobstructed_candidate: i32,
    pub backward_pawn_penalty: i32,
    pub isolated_pawn_penalty: i32,
    // knights
    pub knight_outpost: i32,
    pub knight_outpost_on_hole: i32,
    pub knight_mobility_multiplier: i32,
    pub knight_mobility_offset: i32,
    // bishops
    pub bishop_pair: i32,
    pub bishop_mobility_multiplier: i32,
    pub bishop_mobility_offset: i32,
    // rooks
    pub rook_open_file: i32,
    pub rook_horizontal_mobility_multiplier: i32,
    pub rook_horizontal_mobility_offset: i32,
    pub rook_vertical_mobility_multiplier: i32,
    pub rook_vertical_mobility_offset: i32,
    pub rook_connected: i32,
    // king safety
    pub king_block_rook_penalty: i32,
    pub minor_attack_units: i32,
    pub rook_attack_units: i32,
    pub queen_attack_units: i32,
    pub rook_check_units: i32,
    pub queen_check_units: i32,
    pub pawn_shield: i32,
    pub pawn_storm: i32,
    pub pawn_shield_divisor: i32,
    pub pawn_storm_divisor: i32,
    pub safety_table: [i32; 100],
}

const SCALAR_COUNT: usize = 30;
const FILE_VALUE_COUNT: usize = SCALAR_COUNT + 100 + 12 * 32;

impl Default for EvalParams {
    fn default() -> Self {
        EvalParams {
            passed_pawn: 20,
            unobstructed_passer: 30,
            unstoppable_passer: 600,
            candidate_passer: 10,
            unobstructed_candidate: 15,
            backward_pawn_penalty: 10,
            isolated_pawn_penalty: 15,
            knight_outpost: 15,
            knight_outpost_on_hole: 20,
            knight_mobility_multiplier: 12,
            knight_mobility_offset: 20,
            bishop_pair: 40,
            bishop_mobility_multiplier: 10,
            bishop_mobility_offset: 20,
            rook_open_file: 25,
            rook_horizontal_mobility_multiplier: 8,
            rook_horizontal_mobility_offset: 10,
            rook_vertical_mobility_multiplier: 10,
            rook_vertical_mobility_offset: 12,
            rook_connected: 15,
            king_block_rook_penalty: 25,
            minor_attack_units: 2,
            rook_attack_units: 3,
            queen_attack_units: 5,
            rook_check_units: 3,
            queen_check_units: 6,
            pawn_shield: 6,
            pawn_storm: 4,
            pawn_shield_divisor: 40,
            pawn_storm_divisor: 40,
            safety_table: SAFETY_TABLE,
        }
    }
}

#[rustfmt::skip]
const SAFETY_TABLE: [i32; 100] = [
      0,   0,   1,   2,   3,   5,   7,   9,  12,  15,
     18,  22,  26,  30,  35,  39,  44,  50,  56,  62,
     68,  75,  82,  85,  89,  97, 105, 113, 122, 131,
    140, 150, 169, 180, 191, 202, 213, 225, 237, 248,
    260, 272, 283, 295, 307, 319, 330, 342, 354, 366,
    377, 389, 401, 412, 424, 436, 448, 459, 471, 483,
    494, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
];

// All tables rank 1 first; Black is handled by vertical mirroring.

#[rustfmt::skip]
const PAWN_OPENING: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
      5,  10,  10, -20, -20,  10,  10,   5,
      5,  -5, -10,   0,   0, -10,  -5,   5,
      0,   0,   0,  20,  20,   0,   0,   0,
      5,   5,  10,  25,  25,  10,   5,   5,
     10,  10,  20,  30,  30,  20,  10,  10,
     50,  50,  50,  50,  50,  50,  50,  50,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const PAWN_ENDGAME: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
      5,   5,   5,   5,   5,   5,   5,   5,
     10,  10,  10,  10,  10,  10,  10,  10,
     20,  20,  20,  20,  20,  20,  20,  20,
     35,  35,  35,  35,  35,  35,  35,  35,
     60,  60,  60,  60,  60,  60,  60,  60,
    100, 100, 100, 100, 100, 100, 100, 100,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const KNIGHT_OPENING: [i32; 64] = [
    -50, -40, -30, -30, -30, -30, -40, -50,
    -40, -20,   0,   5,   5,   0, -20, -40,
    -30,   5,  10,  15,  15,  10,   5, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   5,  15,  20,  20,  15,   5, -30,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
const KNIGHT_ENDGAME: [i32; 64] = [
    -50, -40, -30, -30, -30, -30, -40, -50,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
const BISHOP_OPENING: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
    -10,   5,   0,   0,   0,   0,   5, -10,
    -10,  10,  10,  10,  10,  10,  10, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,   5,   5,  10,  10,   5,   5, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
const BISHOP_ENDGAME: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
const ROOK_OPENING: [i32; 64] = [
      0,   0,   0,   5,   5,   0,   0,   0,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
      5,  10,  10,  10,  10,  10,  10,   5,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const ROOK_ENDGAME: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,
     10,  10,  10,  10,  10,  10,  10,  10,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const QUEEN_OPENING: [i32; 64] = [
    -20, -10, -10,  -5,  -5, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,   5,   5,   5,   0, -10,
     -5,   0,   5,   5,   5,   5,   0,  -5,
     -5,   0,   5,   5,   5,   5,   0,  -5,
    -10,   0,   5,   5,   5,   5,   0, -10,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -20, -10, -10,  -5,  -5, -10, -10, -20,
];

#[rustfmt::skip]
const QUEEN_ENDGAME: [i32; 64] = [
    -20, -10, -10,  -5,  -5, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,   5,   5,   5,   0, -10,
     -5,   0,   5,  10,  10,   5,   0,  -5,
     -5,   0,   5,  10,  10,   5,   0,  -5,
    -10,   0,   5,   5,   5,   5,   0, -10,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -20, -10, -10,  -5,  -5, -10, -10, -20,
];

#[rustfmt::skip]
const KING_OPENING: [i32; 64] = [
     20,  30,  10,   0,   0,  10,  30,  20,
     20,  20,   0,   0,   0,   0,  20,  20,
    -10, -20, -20, -20, -20, -20, -20, -10,
    -20, -30, -30, -40, -40, -30, -30, -20,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
];

#[rustfmt::skip]
const KING_ENDGAME: [i32; 64] = [
    -50, -30, -30, -30, -30, -30, -30, -50,
    -30, -30,   0,   0,   0,   0, -30, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -20, -10,   0,   0, -10, -20, -30,
    -50, -40, -30, -20, -20, -30, -40, -50,
];

impl Default for PstSet {
    fn default() -> Self {
        PstSet {
            opening: [
                PAWN_OPENING,
                KNIGHT_OPENING,
                BISHOP_OPENING,
                ROOK_OPENING,
                QUEEN_OPENING,
                KING_OPENING,
            ],
            endgame: [
                PAWN_ENDGAME,
                KNIGHT_ENDGAME,
                BISHOP_ENDGAME,
                ROOK_ENDGAME,
                QUEEN_ENDGAME,
                KING_ENDGAME,
            ],
        }
    }
}

static PSQT: OnceCell<PstSet> = OnceCell::new();
static PARAMS: OnceCell<EvalParams> = OnceCell::new();

/// Process-wide piece-square tables. Frozen on first access; install a loaded
/// set with [`install`] before constructing any `Board`.
pub fn psqt() -> &'static PstSet {
    PSQT.get_or_init(PstSet::default)
}

/// Process-wide scalar weights (compiled defaults unless [`install`] ran).
pub fn params() -> &'static EvalParams {
    PARAMS.get_or_init(EvalParams::default)
}

/// Install loaded weights. Fails if either global was already used, since
/// boards built with the old tables would keep stale accumulators.
pub fn install(params: EvalParams, pst: PstSet) -> Result<(), String> {
    PARAMS
        .set(params)
        .map_err(|_| "evaluation weights already initialized".to_string())?;
    PSQT.set(pst)
        .map_err(|_| "piece-square tables already initialized".to_string())?;
    Ok(())
}

fn mirror_half_table(half: &[i32]) -> [i32; 64] {
    debug_assert_eq!(half.len(), 32);
    let mut full = [0i32; 64];
    for rank in 0..8 {
        for file in 0..8 {
            let half_file = if file < 4 { file } else { 7 - file };
            full[rank * 8 + file] = half[rank * 4 + half_file];
        }
    }
    full
}

fn half_table(full: &[i32; 64]) -> [i32; 32] {
    let mut half = [0i32; 32];
    for rank in 0..8 {
        for file in 0..4 {
            half[rank * 4 + file] = full[rank * 8 + file];
        }
    }
    half
}

/// Parse a parameter file: scalars, safety table, then the twelve half-width
/// piece-square tables in opening/endgame pairs, pawn through king.
pub fn load_parameter_file<P: AsRef<Path>>(path: P) -> Result<(EvalParams, PstSet), String> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| format!("cannot read {}: {}", path.as_ref().display(), e))?;

    let mut values = Vec::with_capacity(FILE_VALUE_COUNT);
    for token in text.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        values.push(
            token
                .parse::<i32>()
                .map_err(|e| format!("bad parameter value {:?}: {}", token, e))?,
        );
    }
    if values.len() != FILE_VALUE_COUNT {
        return Err(format!(
            "parameter file has {} values, expected {}",
            values.len(),
            FILE_VALUE_COUNT
        ));
    }

    let mut it = values.into_iter();
    let mut next = || it.next().expect("length checked above");

    let mut p = EvalParams {
        passed_pawn: next(),
        unobstructed_passer: next(),
        unstoppable_passer: next(),
        candidate_passer: next(),
        unobstructed_candidate: next(),
        backward_pawn_penalty: next(),
        isolated_pawn_penalty: next(),
        knight_outpost: next(),
        knight_outpost_on_hole: next(),
        knight_mobility_multiplier: next(),
        knight_mobility_offset: next(),
        bishop_pair: next(),
        bishop_mobility_multiplier: next(),
        bishop_mobility_offset: next(),
        rook_open_file: next(),
        rook_horizontal_mobility_multiplier: next(),
        rook_horizontal_mobility_offset: next(),
        rook_vertical_mobility_multiplier: next(),
        rook_vertical_mobility_offset: next(),
        rook_connected: next(),
        king_block_rook_penalty: next(),
        minor_attack_units: next(),
        rook_attack_units: next(),
        queen_attack_units: next(),
        rook_check_units: next(),
        queen_check_units: next(),
        pawn_shield: next(),
        pawn_storm: next(),
        pawn_shield_divisor: next(),
        pawn_storm_divisor: next(),
        safety_table: [0; 100],
    };
    for slot in p.safety_table.iter_mut() {
        *slot = next();
    }

    let mut pst = PstSet {
        opening: [[0; 64]; 6],
        endgame: [[0; 64]; 6],
    };
    for piece in 0..6 {
        let half: Vec<i32> = (0..32).map(|_| next()).collect();
        pst.opening[piece] = mirror_half_table(&half);
        let half: Vec<i32> = (0..32).map(|_| next()).collect();
        pst.endgame[piece] = mirror_half_table(&half);
    }

    Ok((p, pst))
}

/// Write weights in the canonical comma-separated order.
pub fn save_parameter_file<P: AsRef<Path>>(
    path: P,
    params: &EvalParams,
    pst: &PstSet,
) -> Result<(), String> {
    let mut out = String::new();
    let scalars = [
        params.passed_pawn,
        params.unobstructed_passer,
        params.unstoppable_passer,
        params.candidate_passer,
        params.unobstructed_candidate,
        params.backward_pawn_penalty,
        params.isolated_pawn_penalty,
        params.knight_outpost,
        params.knight_outpost_on_hole,
        params.knight_mobility_multiplier,
        params.knight_mobility_offset,
        params.bishop_pair,
        params.bishop_mobility_multiplier,
        params.bishop_mobility_offset,
        params.rook_open_file,
        params.rook_horizontal_mobility_multiplier,
        params.rook_horizontal_mobility_offset,
        params.rook_vertical_mobility_multiplier,
        params.rook_vertical_mobility_offset,
        params.rook_connected,
        params.king_block_rook_penalty,
        params.minor_attack_units,
        params.rook_attack_units,
        params.queen_attack_units,
        params.rook_check_units,
        params.queen_check_units,
        params.pawn_shield,
        params.pawn_storm,
        params.pawn_shield_divisor,
        params.pawn_storm_divisor,
    ];
    debug_assert_eq!(scalars.len(), SCALAR_COUNT);

    for v in scalars {
        let _ = write!(out, "{},", v);
    }
    for v in params.safety_table {
        let _ = write!(out, "{},", v);
    }
    for piece in 0..6 {
        for v in half_table(&pst.opening[piece]) {
            let _ = write!(out, "{},", v);
        }
        for v in half_table(&pst.endgame[piece]) {
            let _ = write!(out, "{},", v);
        }
    }

    std::fs::write(path.as_ref(), out)
        .map_err(|e| format!("cannot write {}: {}", path.as_ref().display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_are_file_symmetric() {
        // the half-width file format can only represent mirrored tables;
        // the compiled defaults must round-trip through it
        let pst = PstSet::default();
        for piece in 0..6 {
            for table in [&pst.opening[piece], &pst.endgame[piece]] {
                for rank in 0..8 {
                    for file in 0..4 {
                        assert_eq!(
                            table[rank * 8 + file],
                            table[rank * 8 + (7 - file)],
                            "piece {} rank {} file {}",
                            piece,
                            rank,
                            file
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn mirror_round_trip() {
        let pst = PstSet::default();
        for piece in 0..6 {
            let half = half_table(&pst.opening[piece]);
            assert_eq!(mirror_half_table(&half), pst.opening[piece]);
        }
    }

    #[test]
    fn file_round_trip() {
        let params = EvalParams::default();
        let pst = PstSet::default();
        let path = std::env::temp_dir().join("tempo_params_test.txt");

        save_parameter_file(&path, &params, &pst).unwrap();
        let (loaded_params, loaded_pst) = load_parameter_file(&path).unwrap();
        assert_eq!(loaded_params, params);
        assert_eq!(loaded_pst, pst);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn load_rejects_wrong_length() {
        let path = std::env::temp_dir().join("tempo_params_short_test.txt");
        std::fs::write(&path, "1,2,3,").unwrap();
        assert!(load_parameter_file(&path).is_err());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn pawn_table_rewards_advancement() {
        let pst = PstSet::default();
        // e2 < e4 < e7 in the endgame pawn table
        let pawn = &pst.endgame[0];
        assert!(pawn[12] < pawn[28]);
        assert!(pawn[28] < pawn[52]);
    }
}

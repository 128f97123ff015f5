//! Construction and persistence of the sliding-attack tables.
//!
//! Two sources are supported: rebuilding the tables from the compiled-in
//! magic constants (default), and the canonical text files consumed by the
//! `load_magic` startup path. Each file is a single line of comma-separated
//! unsigned 64-bit decimals, square-major: 64 * 16384 rook values or
//! 64 * 2048 bishop values.

use crate::moves::magic::attacks::{bishop_attacks_per_square, rook_attacks_per_square};
use crate::moves::magic::magics::{
    magic_index, BISHOP_INDEX_BITS, BISHOP_MAGIC_NUMBERS, BISHOP_MASKS, BISHOP_TABLE_SIZE,
    ROOK_INDEX_BITS, ROOK_MAGIC_NUMBERS, ROOK_MASKS, ROOK_TABLE_SIZE,
};
use crate::moves::magic::structs::{BishopMagicTables, MagicTables, RookMagicTables};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

fn fill_square(
    table: &mut [u64],
    square: usize,
    mask: u64,
    magic: u64,
    bits: u32,
    scan: impl Fn(usize, u64) -> u64,
) {
    // carry-rippler over every subset of the relevant-occupancy mask
    let mut subset = 0u64;
    loop {
        let index = magic_index(subset, magic, bits);
        table[index] = scan(square, subset);
        subset = subset.wrapping_sub(mask) & mask;
        if subset == 0 {
            break;
        }
    }
}

/// Build both attack tables from the compiled-in magic constants.
pub fn build_magic_tables() -> MagicTables {
    let mut rook = vec![0u64; 64 * ROOK_TABLE_SIZE];
    let mut bishop = vec![0u64; 64 * BISHOP_TABLE_SIZE];

    #[cfg(feature = "cli")]
    let bar = indicatif::ProgressBar::new(64).with_message("building attack tables");

    for sq in 0..64 {
        fill_square(
            &mut rook[sq * ROOK_TABLE_SIZE..(sq + 1) * ROOK_TABLE_SIZE],
            sq,
            ROOK_MASKS[sq],
            ROOK_MAGIC_NUMBERS[sq],
            ROOK_INDEX_BITS,
            rook_attacks_per_square,
        );
        fill_square(
            &mut bishop[sq * BISHOP_TABLE_SIZE..(sq + 1) * BISHOP_TABLE_SIZE],
            sq,
            BISHOP_MASKS[sq],
            BISHOP_MAGIC_NUMBERS[sq],
            BISHOP_INDEX_BITS,
            bishop_attacks_per_square,
        );
        #[cfg(feature = "cli")]
        bar.inc(1);
    }
    #[cfg(feature = "cli")]
    bar.finish_and_clear();

    MagicTables {
        rook: RookMagicTables {
            table: rook.into_boxed_slice(),
        },
        bishop: BishopMagicTables {
            table: bishop.into_boxed_slice(),
        },
    }
}

fn parse_table(text: &str, expected_len: usize, what: &str) -> Result<Box<[u64]>, String> {
    let mut values = Vec::with_capacity(expected_len);
    for token in text.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue; // tolerate the trailing comma the writer emits
        }
        let value: u64 = token
            .parse()
            .map_err(|e| format!("bad value in {} table: {:?} ({})", what, token, e))?;
        values.push(value);
    }
    if values.len() != expected_len {
        return Err(format!(
            "{} table has {} values, expected {}",
            what,
            values.len(),
            expected_len
        ));
    }
    Ok(values.into_boxed_slice())
}

/// Load both tables from the canonical comma-separated text files.
/// A missing or malformed file is a startup error.
pub fn load_magic_tables<P: AsRef<Path>>(rook_path: P, bishop_path: P) -> Result<MagicTables, String> {
    let rook_text = std::fs::read_to_string(rook_path.as_ref())
        .map_err(|e| format!("cannot read {}: {}", rook_path.as_ref().display(), e))?;
    let bishop_text = std::fs::read_to_string(bishop_path.as_ref())
        .map_err(|e| format!("cannot read {}: {}", bishop_path.as_ref().display(), e))?;

    let rook = parse_table(&rook_text, 64 * ROOK_TABLE_SIZE, "rook")?;
    let bishop = parse_table(&bishop_text, 64 * BISHOP_TABLE_SIZE, "bishop")?;

    info!(
        rook_entries = rook.len(),
        bishop_entries = bishop.len(),
        "attack tables loaded"
    );

    Ok(MagicTables {
        rook: RookMagicTables { table: rook },
        bishop: BishopMagicTables { table: bishop },
    })
}

/// Write both tables in the canonical text format, so a `load_magic` build
/// can consume them on the next startup.
pub fn save_magic_tables<P: AsRef<Path>>(
    tables: &MagicTables,
    rook_path: P,
    bishop_path: P,
) -> Result<(), String> {
    fn render(values: &[u64]) -> String {
        let mut out = String::with_capacity(values.len() * 8);
        for v in values {
            let _ = write!(out, "{},", v);
        }
        out
    }

    std::fs::write(rook_path.as_ref(), render(&tables.rook.table))
        .map_err(|e| format!("cannot write {}: {}", rook_path.as_ref().display(), e))?;
    std::fs::write(bishop_path.as_ref(), render(&tables.bishop.table))
        .map_err(|e| format!("cannot write {}: {}", bishop_path.as_ref().display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load_round_trip() {
        let tables = build_magic_tables();
        let dir = std::env::temp_dir();
        let rook_path = dir.join("tempo_rook_table_test.txt");
        let bishop_path = dir.join("tempo_bishop_table_test.txt");

        save_magic_tables(&tables, &rook_path, &bishop_path).unwrap();
        let loaded = load_magic_tables(&rook_path, &bishop_path).unwrap();

        assert_eq!(&*tables.rook.table, &*loaded.rook.table);
        assert_eq!(&*tables.bishop.table, &*loaded.bishop.table);

        let _ = std::fs::remove_file(rook_path);
        let _ = std::fs::remove_file(bishop_path);
    }

    #[test]
    fn load_rejects_short_files() {
        let dir = std::env::temp_dir();
        let rook_path = dir.join("tempo_rook_short_test.txt");
        let bishop_path = dir.join("tempo_bishop_short_test.txt");
        std::fs::write(&rook_path, "1,2,3,").unwrap();
        std::fs::write(&bishop_path, "1,2,3,").unwrap();

        assert!(load_magic_tables(&rook_path, &bishop_path).is_err());

        let _ = std::fs::remove_file(rook_path);
        let _ = std::fs::remove_file(bishop_path);
    }
}

use std::io::{self, BufRead};
use std::process::ExitCode;
use std::time::Duration;

use tempo::board::{Board, Color};
use tempo::logger::init_logging;
use tempo::moves::execute::make_move;
use tempo::moves::magic::MagicTables;
use tempo::moves::movegen::{generate_moves, GenFilter};
use tempo::moves::types::{Move, MoveList};
use tempo::search::params;
use tempo::search::search::{SearchLimits, Searcher, MAX_DEPTH};
use tempo::search::tt::TranspositionTable;
use tracing::{info, warn};

const ENGINE_NAME: &str = "Tempo 1.0";
const ENGINE_AUTHOR: &str = "the Tempo authors";

const TT_SIZE_MB: usize = 32;
const PARAMETER_FILE: &str = "parameters.txt";

fn load_tables() -> Result<MagicTables, String> {
    #[cfg(feature = "load_magic")]
    {
        tempo::moves::magic::loader::load_magic_tables("rookAttackTable.txt", "bishopAttackTable.txt")
    }
    #[cfg(not(feature = "load_magic"))]
    {
        Ok(tempo::moves::magic::loader::build_magic_tables())
    }
}

fn main() -> ExitCode {
    init_logging("logs/tempo.log", "tempo=info");

    // optional tuned weights; compiled defaults otherwise
    if std::path::Path::new(PARAMETER_FILE).exists() {
        match params::load_parameter_file(PARAMETER_FILE) {
            Ok((p, pst)) => {
                if let Err(e) = params::install(p, pst) {
                    eprintln!("cannot install parameters: {}", e);
                    return ExitCode::FAILURE;
                }
                info!(file = PARAMETER_FILE, "evaluation weights loaded");
            }
            Err(e) => {
                eprintln!("bad parameter file: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let tables = match load_tables() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("cannot initialize attack tables: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let eval_params = params::params();

    let helper_threads: usize = std::env::var("TEMPO_THREADS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let tt = TranspositionTable::new(TT_SIZE_MB);
    let mut board = Board::new();
    let mut searcher = Searcher::new(&tables, eval_params, &tt, SearchLimits::default());
    let mut debug_mode = false;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = parts.first() else {
            continue;
        };

        match command {
            "uci" => {
                println!("id name {}", ENGINE_NAME);
                println!("id author {}", ENGINE_AUTHOR);
                println!("uciok");
            }
            "isready" => println!("readyok"),
            "ucinewgame" => {
                board = Board::new();
                tt.clear();
                searcher = Searcher::new(&tables, eval_params, &tt, SearchLimits::default());
            }
            "position" => {
                if let Some(new_board) = handle_position(&parts, &tables) {
                    board = new_board;
                }
            }
            "go" => {
                searcher.limits = parse_go(&parts, &board);
                info!(limits = ?searcher.limits, debug = debug_mode, "go");
                let (_score, best) = searcher.threaded_best_move(&board, helper_threads);
                match best {
                    Some(mv) => println!("bestmove {}", mv.to_uci()),
                    None => println!("bestmove 0000"),
                }
            }
            "d" => print!("{}", board.render()),
            "debug" => {
                debug_mode = parts.get(1) == Some(&"on");
                info!(debug_mode, "debug toggled");
            }
            "quit" => break,
            // unknown tokens are ignored per protocol
            _ => {}
        }
    }

    ExitCode::SUCCESS
}

fn handle_position(parts: &[&str], tables: &MagicTables) -> Option<Board> {
    let moves_idx = parts.iter().position(|&p| p == "moves");

    let mut board = match parts.get(1) {
        Some(&"startpos") => Board::new(),
        Some(&"fen") => {
            let fen_end = moves_idx.unwrap_or(parts.len());
            let fen = parts[2..fen_end].join(" ");
            match fen.parse::<Board>() {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "rejecting position command");
                    return None;
                }
            }
        }
        _ => Board::new(),
    };

    if let Some(idx) = moves_idx {
        for move_str in &parts[idx + 1..] {
            match find_legal_move(&board, tables, move_str) {
                Some(mv) => make_move(&mut board, &mv),
                // an unmatchable move is dropped; the rest still apply
                None => warn!(mv = move_str, "dropping unplayable move"),
            }
        }
    }

    Some(board)
}

/// Match a UCI move string against the generated legal moves. The promotion
/// character takes part in the match, so an underpromotion is never silently
/// replaced by a different piece.
fn find_legal_move(board: &Board, tables: &MagicTables, move_str: &str) -> Option<Move> {
    if move_str.len() < 4 {
        return None;
    }
    let bytes = move_str.as_bytes();
    let from_file = bytes[0].wrapping_sub(b'a');
    let from_rank = bytes[1].wrapping_sub(b'1');
    let to_file = bytes[2].wrapping_sub(b'a');
    let to_rank = bytes[3].wrapping_sub(b'1');
    if from_file > 7 || from_rank > 7 || to_file > 7 || to_rank > 7 {
        return None;
    }
    let from = from_rank * 8 + from_file;
    let to = to_rank * 8 + to_file;

    let promotion = match bytes.get(4) {
        Some(b'q') => Some(tempo::board::Piece::Queen),
        Some(b'r') => Some(tempo::board::Piece::Rook),
        Some(b'b') => Some(tempo::board::Piece::Bishop),
        Some(b'n') => Some(tempo::board::Piece::Knight),
        Some(_) => return None,
        None => None,
    };

    let mut moves = MoveList::new();
    generate_moves(board, tables, GenFilter::All, &mut moves);
    moves
        .iter()
        .find(|m| m.from.index() == from && m.to.index() == to && m.promotion == promotion)
        .copied()
}

fn parse_go(parts: &[&str], board: &Board) -> SearchLimits {
    let mut wtime: Option<u64> = None;
    let mut btime: Option<u64> = None;
    let mut winc: u64 = 0;
    let mut binc: u64 = 0;
    let mut movetime: Option<u64> = None;
    let mut infinite = false;

    let mut i = 1;
    while i < parts.len() {
        let value = parts.get(i + 1).and_then(|v| v.parse::<u64>().ok());
        match parts[i] {
            "wtime" => wtime = value,
            "btime" => btime = value,
            "winc" => winc = value.unwrap_or(0),
            "binc" => binc = value.unwrap_or(0),
            "movetime" => movetime = value,
            "movestogo" => {} // clock formula below keys on the move number
            "infinite" => {
                infinite = true;
                i += 1;
                continue;
            }
            _ => {
                i += 1;
                continue;
            }
        }
        i += 2;
    }

    let max_time = if infinite {
        Duration::from_secs(60 * 60 * 24)
    } else if let Some(ms) = movetime {
        Duration::from_millis(ms)
    } else {
        let (time_left, inc) = match board.side_to_move {
            Color::White => (wtime, winc),
            Color::Black => (btime, binc),
        };
        match time_left {
            Some(t) => {
                // spend a larger slice as the game gets older
                let divisor = 20u64.max(45u64.saturating_sub(board.fullmove_number as u64));
                Duration::from_millis(t / divisor + inc)
            }
            None => Duration::from_secs(3),
        }
    };

    SearchLimits {
        max_time,
        max_depth: MAX_DEPTH,
    }
}

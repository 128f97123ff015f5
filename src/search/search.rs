//! Iterative-deepening alpha-beta with aspiration windows, a quiescence
//! tail, and the pruning family: reverse futility, null move, internal
//! iterative deepening, late move pruning, futility, singular extensions
//! with multi-cut, and late move reductions under PVS re-search rules.
//!
//! Time is cooperative: every node samples the clock, sets `abort`, and the
//! stack unwinds with a throwaway score; the driver discards the unfinished
//! iteration and keeps the last completed best move.

use crate::board::{Board, Color, Piece};
use crate::moves::execute::{make_move, make_null_move, unmake_move, unmake_null_move};
use crate::moves::knight::KNIGHT_ATTACKS;
use crate::moves::magic::MagicTables;
use crate::moves::movegen::{GenFilter, GenSetup};
use crate::moves::pawn::PAWN_ATTACKS;
use crate::moves::types::{Move, MoveList};
use crate::search::context::{SearchContext, SearchStats};
use crate::search::eval::{evaluate, is_passed, lazy_evaluate};
use crate::search::ordering::{randomize_moves, score_moves, sort_moves};
use crate::search::params::EvalParams;
use crate::search::pawn_cache::PawnTable;
use crate::search::see::see;
use crate::search::tt::{Bound, TranspositionTable};
use crate::bitboard::BitboardExt;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::info;

pub const POS_INF: i32 = 50_000;
pub const MATE: i32 = 32_000;
pub const MATE_BUFFER: i32 = 1_000;
pub const DRAW: i32 = 0;
pub const MAX_DEPTH: i32 = 64;

const PAWN_HASH_MB: usize = 16;

// aspiration window escalation per consecutive fail in one direction
const ASPIRATION_WINDOW: [i32; 4] = [50, 300, 600, 100_000];

// late move pruning: quiet-move count cap per depth
const LMP_MAX_DEPTH: i32 = 3;
const LMP_MAX_MOVES: [usize; 4] = [0, 7, 15, 25];

// futility margins per depth
const FUTILE_MAX_DEPTH: i32 = 3;
const FUTILE_MARGINS: [i32; 4] = [0, 125, 250, 500];

// reverse futility margins per depth
const REVERSE_FUTILE_MAX_DEPTH: i32 = 3;
const REVERSE_FUTILE_MARGINS: [i32; 4] = [0, 250, 450, 700];

// null move reductions
const NULL_MIN_DEPTH: i32 = 4;
const NULL_MIN_R: i32 = 3;
const NULL_MAX_R: i32 = 4;

// internal iterative deepening
const MIN_IID_DEPTH: i32 = 5;
const IID_REDUCTION: i32 = 3;

#[derive(Clone, Copy, Debug)]
pub struct SearchLimits {
    pub max_time: Duration,
    pub max_depth: i32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            max_time: Duration::from_secs(3),
            max_depth: MAX_DEPTH,
        }
    }
}

/// One searcher: heuristic tables, a private pawn cache, and a borrowed view
/// of the shared transposition table. Lives across `go` commands so killers
/// and history carry over; helper threads get clones of the heuristics.
pub struct Searcher<'a> {
    tables: &'a MagicTables,
    params: &'a EvalParams,
    tt: &'a TranspositionTable,
    pub ctx: SearchContext,
    pub limits: SearchLimits,
    pub shuffle_root: bool,
    pawn_table: PawnTable,
    stats: SearchStats,
    start: Instant,
    abort: bool,
}

impl<'a> Searcher<'a> {
    pub fn new(
        tables: &'a MagicTables,
        params: &'a EvalParams,
        tt: &'a TranspositionTable,
        limits: SearchLimits,
    ) -> Self {
        Searcher {
            tables,
            params,
            tt,
            ctx: SearchContext::new(),
            limits,
            shuffle_root: false,
            pawn_table: PawnTable::new(PAWN_HASH_MB),
            stats: SearchStats::default(),
            start: Instant::now(),
            abort: false,
        }
    }

    fn out_of_time(&self) -> bool {
        self.start.elapsed() >= self.limits.max_time
    }

    fn search(&mut self, board: &mut Board, depth: i32, ply: i32, mut alpha: i32, mut beta: i32) -> i32 {
        let pv_node = beta - alpha > 1;
        self.stats.nodes += 1;

        if ply > 0 {
            if self.out_of_time() {
                self.abort = true;
                return DRAW;
            }

            if board.insufficient_material(Color::White)
                && board.insufficient_material(Color::Black)
            {
                return DRAW;
            }
            if board.repetition_count() > 1 {
                return DRAW;
            }
            if board.halfmove_clock >= 100 {
                return DRAW;
            }

            // mate distance pruning
            alpha = alpha.max(-MATE + ply);
            beta = beta.min(MATE - ply);
            if alpha >= beta {
                return alpha;
            }
        }

        if depth <= 0 {
            return self.quiesce(board, alpha, beta, ply);
        }

        // transposition probe, with mate scores shifted back to this ply
        let hash = board.zobrist;
        let mut tt_move: Option<Move> = None;
        let mut tt_score: Option<i32> = None;
        let mut tt_depth = 0i32;
        let mut tt_bound = Bound::Exact;
        if let Some(hit) = self.tt.probe(hash) {
            tt_move = Some(hit.mv);
            tt_depth = hit.depth;
            tt_bound = hit.bound;
            let corrected = TranspositionTable::score_from_tt(hit.score, ply);
            tt_score = Some(corrected);

            // no cutoffs while a singular test is excluding a move, the
            // stored entry describes the unrestricted node
            if hit.depth >= depth && self.ctx.excluded.is_none() {
                match hit.bound {
                    Bound::Exact => {
                        self.stats.tt_hits += 1;
                        return corrected;
                    }
                    Bound::Lower => alpha = alpha.max(corrected),
                    Bound::Upper => beta = beta.min(corrected),
                }
                if alpha >= beta {
                    self.stats.tt_hits += 1;
                    return corrected;
                }
            }
        }

        let setup = GenSetup::new(board, self.tables);
        let mut moves = MoveList::new();
        setup.generate(board, self.tables, GenFilter::All, &mut moves);
        let in_check_now = setup.checkers != 0;

        let mut extension = 0;
        if in_check_now {
            self.stats.extensions += 1;
            extension = 1;
        }

        if !in_check_now && !pv_node && extension == 0 && self.ctx.excluded.is_none() {
            let reliable_eval = evaluate(board, self.tables, self.params, &mut self.pawn_table);

            // reverse futility: hopeless for the opponent even with a margin
            if depth <= REVERSE_FUTILE_MAX_DEPTH && beta.abs() < MATE - MATE_BUFFER {
                let margin = REVERSE_FUTILE_MARGINS[depth as usize];
                if reliable_eval - margin >= beta {
                    self.stats.reverse_futile_pruned += 1;
                    return beta;
                }
            }

            // null move: hand over the move and search reduced
            if depth >= NULL_MIN_DEPTH && board.has_non_pawn_material(board.side_to_move) {
                let r = if depth > 6 { NULL_MAX_R } else { NULL_MIN_R };
                let undo = make_null_move(board);
                let score = -self.search(board, depth - r - 1, ply + 1, -beta, -beta + 1);
                unmake_null_move(board, undo);
                if self.abort {
                    return DRAW;
                }
                if score >= beta {
                    self.stats.null_reductions += 1;
                    return beta;
                }
            }
        }

        // internal iterative deepening when the table has no move for us
        if tt_score.is_none() && depth > MIN_IID_DEPTH {
            self.search(board, depth - IID_REDUCTION, ply, alpha, beta);
            if self.abort {
                return DRAW;
            }
            if let Some(hit) = self.tt.probe(hash) {
                tt_move = Some(hit.mv);
                tt_depth = hit.depth;
                tt_bound = hit.bound;
                tt_score = Some(TranspositionTable::score_from_tt(hit.score, ply));
                self.stats.iid_hits += 1;
            }
        }

        if ply == 0 && self.shuffle_root {
            randomize_moves(&mut moves);
        } else {
            score_moves(
                board,
                &mut moves,
                tt_move.as_ref(),
                &self.ctx.killers_at(ply as usize),
                &self.ctx.history,
                self.ctx.history_max,
                true,
            );
            sort_moves(&mut moves);
        }

        let mut flag = Bound::Upper;
        let mut best_move: Option<Move> = None;

        for i in 0..moves.len() {
            let mv = moves[i];

            if let Some(excluded) = self.ctx.excluded {
                if mv.same(&excluded) {
                    continue;
                }
            }

            let causes_check = move_gives_check(board, self.tables, &mv);
            let mut pruning_ok = !causes_check && !in_check_now && !pv_node && extension == 0;

            // late move pruning: deep quiet tails rarely rescue the node
            if pruning_ok
                && depth <= LMP_MAX_DEPTH
                && mv.is_quiet()
                && i >= LMP_MAX_MOVES[depth as usize]
            {
                self.stats.lmp_pruned += 1;
                continue;
            }

            if pruning_ok && self.futile(board, &mv, i, depth, alpha, beta) {
                self.stats.futile_pruned += 1;
                continue;
            }

            // singular extension: if every other move fails well below the
            // table score, the table move is forced enough to deserve an
            // extra ply; if the restricted search still beats beta, multi-cut
            let mut other_extensions = 0;
            if ply > 0
                && depth >= 4 + 2 * pv_node as i32
                && self.ctx.excluded.is_none()
                && tt_move.is_some_and(|tm| mv.same(&tm))
                && tt_bound == Bound::Lower
                && tt_depth >= depth - 3
            {
                if let Some(tts) = tt_score {
                    let singular_depth = (depth - 1) / 2;
                    self.ctx.excluded = Some(mv);
                    let score = self.search(board, singular_depth, ply + 1, tts - 1, tts);
                    self.ctx.excluded = None;
                    if self.abort {
                        return DRAW;
                    }
                    if score < tts {
                        other_extensions = 1;
                        self.stats.singular_extensions += 1;
                    } else if score >= beta {
                        self.stats.multi_cut_pruned += 1;
                        return beta;
                    }
                }
            }
            pruning_ok = pruning_ok && other_extensions == 0;

            make_move(board, &mv);
            let mut score;

            if i == 0 {
                score = -self.search(
                    board,
                    depth - 1 + extension + other_extensions,
                    ply + 1,
                    -beta,
                    -alpha,
                );
            } else {
                // late move reduction on quiet non-checking latecomers
                let mut reduction = 0;
                if pruning_ok && depth >= 3 && i > 3 && mv.is_quiet() {
                    reduction = if i < 6 { 1 } else { depth / 3 };
                    self.stats.lmr_reductions += 1;
                }

                score = -self.search(
                    board,
                    depth - 1 - reduction + extension + other_extensions,
                    ply + 1,
                    -alpha - 1,
                    -alpha,
                );

                if score > alpha && reduction > 0 {
                    score = -self.search(
                        board,
                        depth - 1 + extension + other_extensions,
                        ply + 1,
                        -beta,
                        -alpha,
                    );
                    self.stats.re_searches += 1;
                } else if score > alpha && score < beta {
                    score = -self.search(
                        board,
                        depth - 1 + extension + other_extensions,
                        ply + 1,
                        -beta,
                        -alpha,
                    );
                    self.stats.re_searches += 1;
                }
            }

            unmake_move(board, &mv);

            if self.abort {
                return DRAW;
            }

            if score >= beta {
                self.tt.store(hash, Bound::Lower, depth, ply, score, &mv);
                if mv.is_quiet_or_castle() {
                    self.ctx.update_killer(ply as usize, mv);
                    self.stats.killers_stored += 1;
                    self.ctx.update_history(board.side_to_move, mv, depth);
                }
                self.stats.cutoffs += 1;
                return beta;
            }

            if score > alpha {
                alpha = score;
                flag = Bound::Exact;
                best_move = Some(mv);
            }
        }

        if moves.is_empty() {
            return if in_check_now { -MATE + ply } else { DRAW };
        }

        let best = best_move.or(tt_move).unwrap_or(moves[0]);
        self.tt.store(hash, flag, depth, ply, alpha, &best);
        alpha
    }

    fn quiesce(&mut self, board: &mut Board, mut alpha: i32, beta: i32, ply: i32) -> i32 {
        self.stats.qnodes += 1;

        if self.out_of_time() {
            self.abort = true;
            return DRAW;
        }

        let stand_pat = evaluate(board, self.tables, self.params, &mut self.pawn_table);
        if stand_pat >= beta {
            self.stats.qcutoffs += 1;
            return beta;
        }

        // delta pruning: not even a free queen would help
        if stand_pat + Piece::Queen.value() < alpha {
            self.stats.delta_pruned += 1;
            return alpha;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }

        let setup = GenSetup::new(board, self.tables);
        let mut moves = MoveList::new();
        setup.generate(board, self.tables, GenFilter::AttackOnly, &mut moves);
        score_moves(
            board,
            &mut moves,
            None,
            &[None, None],
            &self.ctx.history,
            self.ctx.history_max,
            false,
        );
        sort_moves(&mut moves);

        for mv in &moves {
            // losing exchanges are not worth a node; promotions and en
            // passant are exempt from the exchange estimate
            if !mv.is_promotion() && !mv.is_en_passant() {
                if see(board, self.tables, mv.from, mv.to) < 0 {
                    self.stats.see_pruned += 1;
                    continue;
                }
            }

            make_move(board, mv);
            let score = -self.quiesce(board, -beta, -alpha, ply + 1);
            unmake_move(board, mv);

            if self.abort {
                return DRAW;
            }
            if score >= beta {
                self.stats.qcutoffs += 1;
                return beta;
            }
            if score > alpha {
                alpha = score;
            }
        }

        alpha
    }

    fn futile(&self, board: &Board, mv: &Move, index: usize, depth: i32, alpha: i32, beta: i32) -> bool {
        if depth > FUTILE_MAX_DEPTH || index == 0 || mv.is_promotion() {
            return false;
        }
        // a running passed pawn can outgrow any margin
        if board.piece_type_at(mv.from) == Some(Piece::Pawn)
            && is_passed(board, board.side_to_move, mv.from)
        {
            return false;
        }
        if alpha.abs() > MATE - MATE_BUFFER || beta.abs() > MATE - MATE_BUFFER {
            return false;
        }

        let mut margin = FUTILE_MARGINS[depth as usize];
        if let Some(captured) = mv.captured {
            margin += captured.value();
        }
        lazy_evaluate(board) + margin <= alpha
    }

    /// Iterative deepening from `start_depth` stepping by `increment`,
    /// re-searching around the previous score with the widening aspiration
    /// schedule. Returns the last fully completed result.
    pub fn best_move(
        &mut self,
        board: &mut Board,
        start_depth: i32,
        increment: i32,
        verbose: bool,
    ) -> (i32, Option<Move>) {
        let mut best_move: Option<Move> = None;
        let mut best_score = 0;
        let mut depth = start_depth;
        let mut alpha = -POS_INF;
        let mut beta = POS_INF;
        let mut window_alpha = 0usize;
        let mut window_beta = 0usize;

        self.ctx.age_history();
        self.stats.clear();
        self.start = Instant::now();
        self.abort = false;

        let max_depth = self.limits.max_depth.min(MAX_DEPTH);
        while depth <= max_depth {
            let eval = self.search(board, depth, 0, alpha, beta);

            if self.abort || self.out_of_time() {
                break;
            }

            // widen the broken side of the window and repeat this depth
            if eval <= alpha {
                window_alpha = (window_alpha + 1).min(ASPIRATION_WINDOW.len() - 1);
                alpha = best_score - ASPIRATION_WINDOW[window_alpha];
                self.stats.re_searches += 1;
                continue;
            }
            if eval >= beta {
                window_beta = (window_beta + 1).min(ASPIRATION_WINDOW.len() - 1);
                beta = best_score + ASPIRATION_WINDOW[window_beta];
                self.stats.re_searches += 1;
                continue;
            }

            window_alpha = 0;
            window_beta = 0;
            if let Some(hit) = self.tt.probe(board.zobrist) {
                best_move = Some(hit.mv);
            }
            best_score = eval;
            alpha = best_score - ASPIRATION_WINDOW[0];
            beta = best_score + ASPIRATION_WINDOW[0];

            if verbose {
                if let Some(mv) = best_move {
                    let millis = self.start.elapsed().as_millis().max(1);
                    let nps = self.stats.nodes as u128 * 1000 / millis;
                    println!(
                        "info depth {} time {} nodes {} pv {} score cp {} nps {}",
                        depth, millis, self.stats.nodes, mv.to_uci(), best_score, nps
                    );
                }
            }

            // a proven mate cannot improve with more depth
            if best_score >= MATE - MAX_DEPTH || best_score <= -MATE + MAX_DEPTH {
                break;
            }

            depth += increment;
        }

        self.stats.log();
        (best_score, best_move)
    }

    /// Counters from the most recent `best_move` call.
    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Lazy SMP: helper threads share the transposition table and nothing
    /// else, each starting from a randomized depth and increment with a
    /// shuffled root so they explore different subtrees.
    pub fn threaded_best_move(
        &mut self,
        board: &Board,
        helper_threads: usize,
    ) -> (i32, Option<Move>) {
        if helper_threads == 0 {
            let mut main_board = board.clone();
            return self.best_move(&mut main_board, 1, 1, true);
        }

        let tables = self.tables;
        let params = self.params;
        let tt = self.tt;
        let limits = self.limits;
        let ctx = self.ctx.clone();

        std::thread::scope(|scope| {
            for _ in 0..helper_threads {
                let worker_ctx = ctx.clone();
                let mut worker_board = board.clone();
                scope.spawn(move || {
                    let mut rng = rand::rng();
                    let start_depth = rng.random_range(1..=3);
                    let increment = rng.random_range(1..=2);
                    let mut worker = Searcher::new(tables, params, tt, limits);
                    worker.ctx = worker_ctx;
                    worker.shuffle_root = true;
                    worker.best_move(&mut worker_board, start_depth, increment, false);
                });
            }

            let mut main_board = board.clone();
            let result = self.best_move(&mut main_board, 1, 1, true);
            info!(helpers = helper_threads, "smp search joined");
            result
        })
    }
}

/// Does this move give check, without making it? Knight and pawn checks by
/// attack table, everything else by slider rays from the enemy king over the
/// post-move occupancy (which also catches discovered checks).
pub fn move_gives_check(board: &Board, tables: &MagicTables, mv: &Move) -> bool {
    let us = board.side_to_move;
    let enemy = us.opposite();
    let piece = match board.piece_type_at(mv.from) {
        Some(p) => p,
        None => return false,
    };
    let enemy_king = board.bb(enemy, Piece::King);
    let ek = enemy_king.lsb() as usize;

    if piece == Piece::Knight && KNIGHT_ATTACKS[mv.to.index() as usize] & enemy_king != 0 {
        return true;
    }
    if piece == Piece::Pawn && PAWN_ATTACKS[us as usize][mv.to.index() as usize] & enemy_king != 0 {
        return true;
    }

    let occupancy = board.occ_all ^ mv.from.bb() ^ mv.to.bb() ^ enemy_king;
    let bishop_rays = tables.bishop.get_attacks(ek, occupancy);
    let rook_rays = tables.rook.get_attacks(ek, occupancy);

    if bishop_rays & (board.bb(us, Piece::Bishop) | board.bb(us, Piece::Queen)) != 0 {
        return true;
    }
    if rook_rays & (board.bb(us, Piece::Rook) | board.bb(us, Piece::Queen)) != 0 {
        return true;
    }
    if bishop_rays & mv.to.bb() != 0 && matches!(piece, Piece::Bishop | Piece::Queen) {
        return true;
    }
    if rook_rays & mv.to.bb() != 0 && matches!(piece, Piece::Rook | Piece::Queen) {
        return true;
    }
    false
}

#![allow(dead_code)]

use sable_engine_lib::board::Pos;
use sable_engine_lib::explore::{Explorer, IterationInfo, SearchResult};
use sable_engine_lib::options::EngineConfig;
use sable_engine_lib::timer::{compute_time_budget, SearchLimits};
use sable_engine_lib::types::*;

use crossbeam::channel::{unbounded, Receiver};
use log::{debug, info, warn, LevelFilter};
use parking_lot::Mutex;
use simplelog::{Config as LogConfig, WriteLogger};

use std::io::BufRead;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

// ----------------- score formatting -----------------

/// Mate distance in moves for the UCI `score mate` field:
/// positive = we mate in k moves, negative = we are mated in |k|.
fn score_to_mate_moves(score: Score) -> Option<i32> {
    if score > MATE_BOUND {
        let plies = (MATE_SCORE - score) as i64;
        return Some(((plies + 1) / 2) as i32);
    }
    if score < -MATE_BOUND {
        let plies = (MATE_SCORE + score) as i64;
        return Some(-(((plies + 1) / 2) as i32));
    }
    None
}

fn format_uci_score(score: Score) -> String {
    match score_to_mate_moves(score) {
        Some(k) => format!("score mate {}", k),
        None    => format!("score cp {}", score),
    }
}

// ----------------- thread-safe output -----------------

/// Replies go to stdout under one lock; diagnostics go through `log` to
/// stderr and must never reach stdout.
struct UciIo {
    out: Mutex<()>,
}

impl UciIo {
    fn new() -> Self {
        Self { out: Mutex::new(()) }
    }

    fn send(&self, line: &str) {
        let _guard = self.out.lock();
        println!("{}", line);
    }
}

fn print_iteration_info(io: &UciIo, ii: &IterationInfo) {
    let mut line = format!(
        "info depth {} {} nodes {} time {} nps {}",
        ii.depth,
        format_uci_score(ii.score),
        ii.nodes,
        (ii.time_seconds * 1000.0).round() as i64,
        ii.nps.round() as i64,
    );
    if !ii.pv.is_empty() {
        use itertools::Itertools;
        line.push_str(" pv ");
        line.push_str(&ii.pv.iter().map(|m| m.to_string()).join(" "));
    }
    io.send(&line);
}

// ----------------- option handling -----------------

fn parse_bool_option(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_spin(v: &str, min: i64, max: i64) -> Option<i64> {
    v.parse::<i64>().ok().map(|x| x.clamp(min, max))
}

fn handle_setoption(line: &str, config: &mut EngineConfig, engine: &Arc<Mutex<Explorer>>) {
    let rest = line.trim_start_matches("setoption").trim();
    let rest = match rest.strip_prefix("name ") {
        Some(r) => r,
        None    => return,
    };

    let (name, value) = match rest.find(" value ") {
        Some(idx) => (rest[..idx].trim(), rest[idx + 7..].trim()),
        None      => (rest.trim(), ""),
    };

    match name {
        "SearchDepth" => {
            if let Some(v) = parse_spin(value, 1, 20) {
                config.search_depth = v as Depth;
            }
        },
        "MaxDepthTimed" => {
            if let Some(v) = parse_spin(value, 1, 128) {
                config.max_depth_timed = v as Depth;
            }
        },
        "MoveOverhead" => {
            if let Some(v) = parse_spin(value, 0, 2000) {
                config.move_overhead_ms = v;
            }
        },
        "Ponder" => config.ponder = parse_bool_option(value),
        "Hash" => {
            if let Some(v) = parse_spin(value, 1, 4096) {
                config.hash_mb = v as usize;
                engine.lock().resize_tt_mb(v as usize);
            }
        },

        "KingCrowdingScale" => {
            if let Some(v) = parse_spin(value, 0, 100) {
                config.king_crowding_scale = v as f64 / 100.0;
            }
        },
        "MobilityScale" => {
            if let Some(v) = parse_spin(value, 0, 100) {
                config.mobility_scale = v as f64 / 100.0;
            }
        },
        "XRayScale" => {
            if let Some(v) = parse_spin(value, 0, 30) {
                config.xray_scale = v as f64 / 100.0;
            }
        },
        "PSTScale" => {
            if let Some(v) = parse_spin(value, 0, 150) {
                config.pst_scale = v as f64 / 100.0;
            }
        },
        "ThreatTerm" => {
            if let Some(v) = parse_spin(value, 0, 300) {
                config.threat_term = v as f64 / 100.0;
            }
        },

        "UseQuiescence" => config.use_quiescence = parse_bool_option(value),
        "UseRazoring" => config.use_razoring = parse_bool_option(value),
        "RazorMarginD2" => {
            if let Some(v) = parse_spin(value, 0, 1000) {
                config.razor_margin_d2 = v as Score;
            }
        },
        "RazorMarginD3" => {
            if let Some(v) = parse_spin(value, 0, 2000) {
                config.razor_margin_d3 = v as Score;
            }
        },

        "UseHistoryHeuristic" => config.use_history_heuristic = parse_bool_option(value),
        "UseCaptureHistory" => config.use_capture_history = parse_bool_option(value),
        "UseContinuationHistory" => config.use_continuation_history = parse_bool_option(value),
        "UseProbCut" => config.use_probcut = parse_bool_option(value),
        "UseNullMovePruning" => config.use_null_move_pruning = parse_bool_option(value),
        "UseMoveCountPruning" => config.use_move_count_pruning = parse_bool_option(value),
        "UseCorrectionHistory" => config.use_correction_history = parse_bool_option(value),
        "CorrectionHistoryScale" => {
            if let Some(v) = parse_spin(value, 0, 200) {
                config.correction_history_scale = v as f64 / 100.0;
            }
        },

        "GoodCaptureSEEThreshold" => {
            if let Some(v) = parse_spin(value, -100, 100) {
                config.good_capture_see_threshold_cp = v as Score;
            }
        },
        "BadCapturePenalty" => {
            if let Some(v) = parse_spin(value, 0, 250) {
                config.bad_capture_penalty_cp = v as Score;
            }
        },
        "KillerBonus1" => {
            if let Some(v) = parse_spin(value, 0, 150_000) {
                config.killer_bonus_1 = v as i32;
            }
        },
        "KillerBonus2" => {
            if let Some(v) = parse_spin(value, 0, 150_000) {
                config.killer_bonus_2 = v as i32;
            }
        },
        "CounterMoveBonus" => {
            if let Some(v) = parse_spin(value, 0, 30_000) {
                config.counter_move_bonus = v as i32;
            }
        },
        "HistoryBonusMult" => {
            if let Some(v) = parse_spin(value, 0, 3) {
                config.history_ordering_mult = v as f64;
            }
        },
        "ContinuationBonusMult" => {
            if let Some(v) = parse_spin(value, 0, 3) {
                config.continuation_ordering_mult = v as f64;
            }
        },
        "CaptureHistoryMult" => {
            if let Some(v) = parse_spin(value, 0, 3) {
                config.capture_history_ordering_mult = v as i32;
            }
        },

        _ => debug!("ignoring unknown option {:?}", name),
    }

    engine.lock().set_config(config.clone());
}

fn print_uci_options(io: &UciIo, config: &EngineConfig) {
    let to_cp = |x: f64| (x * 100.0).round() as i64;
    let as_bool = |b: bool| if b { "true" } else { "false" };

    io.send("id name Sable 1");
    io.send("id author sable");

    io.send(&format!(
        "option name SearchDepth type spin default {} min 1 max 20",
        config.search_depth
    ));
    io.send(&format!(
        "option name MaxDepthTimed type spin default {} min 1 max 128",
        config.max_depth_timed
    ));
    io.send(&format!(
        "option name MoveOverhead type spin default {} min 0 max 2000",
        config.move_overhead_ms
    ));
    io.send(&format!("option name Ponder type check default {}", as_bool(config.ponder)));

    io.send(&format!(
        "option name KingCrowdingScale type spin default {} min 0 max 100",
        to_cp(config.king_crowding_scale)
    ));
    io.send(&format!(
        "option name MobilityScale type spin default {} min 0 max 100",
        to_cp(config.mobility_scale)
    ));
    io.send(&format!(
        "option name XRayScale type spin default {} min 0 max 30",
        to_cp(config.xray_scale)
    ));
    io.send(&format!(
        "option name PSTScale type spin default {} min 0 max 150",
        to_cp(config.pst_scale)
    ));
    io.send(&format!(
        "option name Hash type spin default {} min 1 max 4096",
        config.hash_mb
    ));
    io.send(&format!(
        "option name ThreatTerm type spin default {} min 0 max 300",
        to_cp(config.threat_term)
    ));

    io.send(&format!(
        "option name UseQuiescence type check default {}",
        as_bool(config.use_quiescence)
    ));
    io.send(&format!(
        "option name UseRazoring type check default {}",
        as_bool(config.use_razoring)
    ));
    io.send(&format!(
        "option name RazorMarginD2 type spin default {} min 0 max 1000",
        config.razor_margin_d2
    ));
    io.send(&format!(
        "option name RazorMarginD3 type spin default {} min 0 max 2000",
        config.razor_margin_d3
    ));

    io.send(&format!(
        "option name UseHistoryHeuristic type check default {}",
        as_bool(config.use_history_heuristic)
    ));
    io.send(&format!(
        "option name UseCaptureHistory type check default {}",
        as_bool(config.use_capture_history)
    ));
    io.send(&format!(
        "option name UseContinuationHistory type check default {}",
        as_bool(config.use_continuation_history)
    ));
    io.send(&format!(
        "option name UseProbCut type check default {}",
        as_bool(config.use_probcut)
    ));
    io.send(&format!(
        "option name GoodCaptureSEEThreshold type spin default {} min -100 max 100",
        config.good_capture_see_threshold_cp
    ));
    io.send(&format!(
        "option name BadCapturePenalty type spin default {} min 0 max 250",
        config.bad_capture_penalty_cp
    ));
    io.send(&format!(
        "option name KillerBonus1 type spin default {} min 0 max 150000",
        config.killer_bonus_1
    ));
    io.send(&format!(
        "option name KillerBonus2 type spin default {} min 0 max 150000",
        config.killer_bonus_2
    ));
    io.send(&format!(
        "option name CounterMoveBonus type spin default {} min 0 max 30000",
        config.counter_move_bonus
    ));
    io.send(&format!(
        "option name HistoryBonusMult type spin default {} min 0 max 3",
        config.history_ordering_mult.round() as i64
    ));
    io.send(&format!(
        "option name ContinuationBonusMult type spin default {} min 0 max 3",
        config.continuation_ordering_mult.round() as i64
    ));
    io.send(&format!(
        "option name CaptureHistoryMult type spin default {} min 0 max 3",
        config.capture_history_ordering_mult
    ));
    io.send(&format!(
        "option name UseNullMovePruning type check default {}",
        as_bool(config.use_null_move_pruning)
    ));
    io.send(&format!(
        "option name UseMoveCountPruning type check default {}",
        as_bool(config.use_move_count_pruning)
    ));
    io.send(&format!(
        "option name UseCorrectionHistory type check default {}",
        as_bool(config.use_correction_history)
    ));
    io.send(&format!(
        "option name CorrectionHistoryScale type spin default {} min 0 max 200",
        (config.correction_history_scale * 100.0).round() as i64
    ));

    io.send("uciok");
}

// ----------------- position / go parsing -----------------

/// Replays `position ...`; stops at the first illegal move. An invalid FEN
/// leaves the board unchanged.
fn handle_position(line: &str, board: &mut Pos) {
    let rest = line.trim_start_matches("position").trim();
    let mut tokens = rest.split_whitespace().peekable();

    let new_board = match tokens.next() {
        Some("startpos") => Pos::startpos(),
        Some("fen") => {
            let fields: Vec<&str> = tokens.by_ref().take(6).collect();
            if fields.len() != 6 {
                return;
            }
            match Pos::from_fen(&fields.join(" ")) {
                Some(p) => p,
                None    => return,
            }
        },
        _ => return,
    };
    *board = new_board;

    if tokens.next() != Some("moves") {
        return;
    }
    for tok in tokens {
        let mv = match ChessMove::from_str(tok) {
            Ok(mv) => mv,
            Err(_) => break,
        };
        if !board.is_legal(mv) {
            warn!("illegal move {:?} in position command", tok);
            break;
        }
        board.make_move(mv);
    }
}

fn parse_go_limits(line: &str) -> SearchLimits {
    fn next_i64<'a>(it: &mut impl Iterator<Item = &'a str>) -> Option<i64> {
        it.next().and_then(|t| t.parse::<i64>().ok())
    }

    let mut limits = SearchLimits::default();
    let mut tokens = line.trim_start_matches("go").split_whitespace();

    while let Some(tok) = tokens.next() {
        match tok {
            "depth" => {
                if let Some(v) = next_i64(&mut tokens) {
                    limits.depth = v.clamp(0, 128) as Depth;
                }
            },
            "movetime" => {
                if let Some(v) = next_i64(&mut tokens) {
                    limits.movetime_ms = v;
                }
            },
            "wtime" => {
                if let Some(v) = next_i64(&mut tokens) {
                    limits.wtime_ms = v;
                }
            },
            "btime" => {
                if let Some(v) = next_i64(&mut tokens) {
                    limits.btime_ms = v;
                }
            },
            "winc" => {
                if let Some(v) = next_i64(&mut tokens) {
                    limits.winc_ms = v;
                }
            },
            "binc" => {
                if let Some(v) = next_i64(&mut tokens) {
                    limits.binc_ms = v;
                }
            },
            "movestogo" => {
                if let Some(v) = next_i64(&mut tokens) {
                    limits.movestogo = v;
                }
            },
            "infinite"  => limits.infinite = true,
            "ponder"    => limits.ponder = true,
            // searchmoves, mate, nodes are not supported
            _           => {},
        }
    }
    limits
}

// ----------------- search worker -----------------

const REASON_NONE: u8 = 0;
const REASON_STOP_CMD: u8 = 1;
const REASON_PONDERHIT: u8 = 2;
const REASON_INTERNAL: u8 = 3;

#[derive(Default)]
struct WorkerState {
    running:            bool,
    pondering:          bool,
    ponder_limits:      Option<SearchLimits>,
    last_ponder_move:   Option<ChessMove>,
}

struct SearchWorker {
    stop:         Arc<AtomicBool>,
    stop_reason:  Arc<AtomicU8>,
    suppress:     Arc<AtomicBool>,
    state:        Arc<Mutex<WorkerState>>,
    handle:       Option<JoinHandle<()>>,
}

impl SearchWorker {
    fn new() -> Self {
        Self {
            stop:         Arc::new(AtomicBool::new(false)),
            stop_reason:  Arc::new(AtomicU8::new(REASON_NONE)),
            suppress:     Arc::new(AtomicBool::new(false)),
            state:        Arc::new(Mutex::new(WorkerState::default())),
            handle:       None,
        }
    }
}

/// Stop-and-join. `suppress` silences the bestmove the worker would emit;
/// internal stops (reconfig, new position) always suppress.
fn handle_stop(worker: &mut SearchWorker, reason: u8, suppress: bool) {
    if let Some(handle) = worker.handle.take() {
        worker.stop_reason.store(reason, Ordering::Relaxed);
        worker.suppress.store(suppress, Ordering::Relaxed);
        worker.stop.store(true, Ordering::Relaxed);
        let _ = handle.join();
    }
    worker.stop.store(false, Ordering::Relaxed);
    worker.stop_reason.store(REASON_NONE, Ordering::Relaxed);
    worker.suppress.store(false, Ordering::Relaxed);
    let mut st = worker.state.lock();
    st.running = false;
    st.pondering = false;
}

fn pick_fallback_legal_move(pos: &Pos) -> Option<ChessMove> {
    pos.legal_moves().first().copied()
}

/// TT collisions can hand back a move that is illegal here; fall back to
/// any legal move rather than forfeit.
fn ensure_legal_or_fallback(pos: &Pos, candidate: Option<ChessMove>) -> Option<ChessMove> {
    match candidate {
        Some(mv) if pos.is_legal(mv) => Some(mv),
        _                            => pick_fallback_legal_move(pos),
    }
}

fn compute_ponder_move_depth1(engine: &mut Explorer, root: &Pos, best: ChessMove) -> Option<ChessMove> {
    let mut pos = root.clone();
    pos.make_move(best);
    let r = engine.search_position_depth(&pos, 1, None, None);
    r.best_move
}

fn log_search_result(result: &SearchResult) {
    info!(
        "[GO] depth={} score={} nodes={} time={:.2}s nps={:.0} is_mate={} is_draw={} \
         tt_hit_rate={:.1}% pvchg10={} pvlast={}d",
        result.depth_reached,
        result.score,
        result.nodes,
        result.time_seconds,
        result.nps,
        result.is_mate as u8,
        result.is_draw as u8,
        result.tt_hit_rate,
        result.pv_firstmove_changes_ge10,
        result.pv_last_change_depth,
    );
    result
        .stats
        .log_summary(std::time::Duration::from_secs_f64(result.time_seconds));
}

#[allow(clippy::too_many_arguments)]
fn start_search_async(
    worker:          &mut SearchWorker,
    io:              Arc<UciIo>,
    engine:          Arc<Mutex<Explorer>>,
    config:          &EngineConfig,
    board:           &Pos,
    limits:          SearchLimits,
    pondering_mode:  bool,
    ponder_move:     Option<ChessMove>,
) {
    // normal UCI flow never overlaps searches, but stay robust
    handle_stop(worker, REASON_INTERNAL, true);

    {
        let mut st = worker.state.lock();
        st.running = true;
        st.pondering = pondering_mode;
        if pondering_mode {
            st.ponder_limits = Some(limits);
        }
    }

    let mut search_board = board.clone();
    if pondering_mode {
        if let Some(mv) = ponder_move {
            if search_board.is_legal(mv) {
                search_board.make_move(mv);
            }
        }
    }

    {
        let stm = search_board.side_to_move();
        let tb = compute_time_budget(&limits, stm, config);
        info!(
            "[TM] stm={:?} wtime={} btime={} winc={} binc={} movestogo={} movetime={} \
             soft={} hard={} overhead={} ponderOpt={} goPonder={} infinite={}",
            stm,
            limits.wtime_ms,
            limits.btime_ms,
            limits.winc_ms,
            limits.binc_ms,
            limits.movestogo,
            limits.movetime_ms,
            if tb.enabled { tb.soft_ms } else { 0 },
            if tb.enabled { tb.hard_ms } else { 0 },
            tb.overhead_ms,
            config.ponder as u8,
            limits.ponder as u8,
            limits.infinite as u8,
        );
    }

    let stop = worker.stop.clone();
    let stop_reason = worker.stop_reason.clone();
    let suppress = worker.suppress.clone();
    let state = worker.state.clone();
    let config = config.clone();

    worker.handle = Some(std::thread::spawn(move || {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let io2 = io.clone();
        let engine2 = engine.clone();
        let board2 = search_board.clone();
        let outcome = catch_unwind(AssertUnwindSafe(move || {
            let mut on_iter = |ii: &IterationInfo| {
                print_iteration_info(&io2, ii);
            };
            let mut engine = engine2.lock();
            let result =
                engine.search_position(&board2, &limits, Some(stop), Some(&mut on_iter));
            let ponder = if !pondering_mode && config.ponder {
                match ensure_legal_or_fallback(&board2, result.best_move) {
                    Some(best) => compute_ponder_move_depth1(&mut engine, &board2, best),
                    None       => None,
                }
            } else {
                None
            };
            (result, ponder)
        }));

        // a crashed search must not forfeit the game: reply with any
        // legal move instead
        let (result, ponder) = match outcome {
            Ok(x) => x,
            Err(_) => {
                warn!("search worker panicked, falling back to the first legal move");
                if !pondering_mode && !suppress.load(Ordering::Relaxed) {
                    match pick_fallback_legal_move(&search_board) {
                        Some(mv) => io.send(&format!("bestmove {}", mv)),
                        None     => io.send("bestmove 0000"),
                    }
                }
                return;
            },
        };

        // UCI requires a bestmove after "stop", even while pondering;
        // every other ponder exit stays silent
        if pondering_mode {
            let reason = stop_reason.load(Ordering::Relaxed);
            if reason == REASON_STOP_CMD && !suppress.load(Ordering::Relaxed) {
                match ensure_legal_or_fallback(&search_board, result.best_move) {
                    Some(best) => io.send(&format!("bestmove {}", best)),
                    None       => io.send("bestmove 0000"),
                }
            }
            return;
        }

        if suppress.load(Ordering::Relaxed) {
            return;
        }

        log_search_result(&result);

        let best = match ensure_legal_or_fallback(&search_board, result.best_move) {
            Some(best) => best,
            None => {
                io.send("bestmove 0000");
                return;
            },
        };

        state.lock().last_ponder_move = ponder;

        match ponder {
            Some(p) => io.send(&format!("bestmove {} ponder {}", best, p)),
            None    => io.send(&format!("bestmove {}", best)),
        }
    }));
}

/// `ponderhit`: the opponent played the predicted reply. Convert the
/// running ponder search into a normal timed one with the original limits.
fn handle_ponderhit(
    worker:  &mut SearchWorker,
    io:      &Arc<UciIo>,
    engine:  &Arc<Mutex<Explorer>>,
    config:  &EngineConfig,
    board:   &mut Pos,
) {
    let (was_pondering, saved_limits, ponder_move) = {
        let st = worker.state.lock();
        (
            st.pondering && worker.handle.is_some() && st.ponder_limits.is_some(),
            st.ponder_limits,
            st.last_ponder_move,
        )
    };
    if !was_pondering {
        return;
    }

    handle_stop(worker, REASON_PONDERHIT, true);

    // sync the authoritative board with the predicted reply
    if let Some(mv) = ponder_move {
        if board.is_legal(mv) {
            board.make_move(mv);
        }
    }

    let mut limits = saved_limits.unwrap_or_default();
    limits.ponder = false;
    limits.infinite = false;

    start_search_async(worker, io.clone(), engine.clone(), config, board, limits, false, None);
}

// ----------------- stdin pump -----------------

fn spawn_stdin_channel() -> Receiver<String> {
    let (tx, rx) = unbounded::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                },
                Err(_) => break,
            }
        }
    });
    rx
}

fn main() {
    let _ = WriteLogger::init(LevelFilter::Debug, LogConfig::default(), std::io::stderr());

    let io = Arc::new(UciIo::new());
    let mut config = EngineConfig::default();
    let engine = Arc::new(Mutex::new(Explorer::new(config.clone())));
    let mut board = Pos::startpos();
    let mut worker = SearchWorker::new();

    let lines = spawn_stdin_channel();

    while let Ok(line) = lines.recv() {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if line == "uci" {
            print_uci_options(&io, &config);
        } else if line == "isready" {
            io.send("readyok");
        } else if line.starts_with("setoption") {
            // never reconfigure mid-search
            handle_stop(&mut worker, REASON_INTERNAL, true);
            handle_setoption(&line, &mut config, &engine);
        } else if line == "ucinewgame" {
            handle_stop(&mut worker, REASON_INTERNAL, true);
            board = Pos::startpos();
            // one generation bump for the TT, full reset for the
            // ordering heuristics and eval cache
            engine.lock().new_game();
        } else if line.starts_with("position") {
            handle_stop(&mut worker, REASON_INTERNAL, true);
            handle_position(&line, &mut board);
        } else if line.starts_with("go") {
            let mut limits = parse_go_limits(&line);

            // some GUIs send "go ponder" with the Ponder option off;
            // treat it as a normal timed search or we would never reply
            if limits.ponder && !config.ponder {
                limits.ponder = false;
            }

            if limits.ponder {
                let ponder_move = {
                    let st = worker.state.lock();
                    st.last_ponder_move
                };
                let ponder_move = match ponder_move {
                    Some(mv) => Some(mv),
                    // no stored prediction: guess with a depth-1 probe
                    None => {
                        let r = engine.lock().search_position_depth(&board, 1, None, None);
                        r.best_move
                    },
                };
                start_search_async(
                    &mut worker, io.clone(), engine.clone(), &config, &board,
                    limits, true, ponder_move,
                );
            } else {
                start_search_async(
                    &mut worker, io.clone(), engine.clone(), &config, &board,
                    limits, false, None,
                );
            }
        } else if line == "stop" {
            handle_stop(&mut worker, REASON_STOP_CMD, false);
        } else if line == "ponderhit" {
            handle_ponderhit(&mut worker, &io, &engine, &config, &mut board);
        } else if line == "quit" {
            handle_stop(&mut worker, REASON_INTERNAL, true);
            break;
        }
        // anything else is silently ignored
    }

    handle_stop(&mut worker, REASON_INTERNAL, true);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_encoding_round_trips() {
        // mate in n plies formats as mate ceil(n/2), sign by winner
        assert_eq!(score_to_mate_moves(mate_in(1)), Some(1));
        assert_eq!(score_to_mate_moves(mate_in(2)), Some(1));
        assert_eq!(score_to_mate_moves(mate_in(3)), Some(2));
        assert_eq!(score_to_mate_moves(mate_in(7)), Some(4));
        assert_eq!(score_to_mate_moves(mated_in(1)), Some(-1));
        assert_eq!(score_to_mate_moves(mated_in(4)), Some(-2));
        assert_eq!(score_to_mate_moves(250), None);
        assert_eq!(score_to_mate_moves(-MATE_BOUND + 1), None);

        for plies in 1..40i16 {
            for sign in [1, -1] {
                let score = sign * mate_in(plies);
                let k = score_to_mate_moves(score).unwrap();
                assert_eq!(k.signum() as i32, sign as i32);
                assert_eq!(k.abs() as i64, (plies as i64 + 1) / 2);
            }
        }
    }

    #[test]
    fn go_limits_parse_all_fields() {
        let limits = parse_go_limits(
            "go depth 9 movetime 250 wtime 1000 btime 2000 winc 10 binc 20 movestogo 30",
        );
        assert_eq!(limits.depth, 9);
        assert_eq!(limits.movetime_ms, 250);
        assert_eq!(limits.wtime_ms, 1000);
        assert_eq!(limits.btime_ms, 2000);
        assert_eq!(limits.winc_ms, 10);
        assert_eq!(limits.binc_ms, 20);
        assert_eq!(limits.movestogo, 30);
        assert!(!limits.infinite);
        assert!(!limits.ponder);

        let limits = parse_go_limits("go infinite");
        assert!(limits.infinite);
        let limits = parse_go_limits("go ponder wtime 1000 btime 1000");
        assert!(limits.ponder);
    }

    #[test]
    fn position_startpos_with_moves() {
        let mut board = Pos::startpos();
        handle_position("position startpos moves e2e4 e7e5 g1f3", &mut board);
        assert_eq!(board.side_to_move(), Black);
    }

    #[test]
    fn position_stops_at_first_illegal_move() {
        let mut board = Pos::startpos();
        handle_position("position startpos moves e2e4 e2e4 e7e5", &mut board);
        // the second e2e4 is illegal: replay stops after one move
        assert_eq!(board.side_to_move(), Black);
        let h_after_one = {
            let mut b = Pos::startpos();
            b.make_move("e2e4".parse().unwrap());
            b.hash()
        };
        assert_eq!(board.hash(), h_after_one);
    }

    #[test]
    fn bad_fen_leaves_the_board_unchanged() {
        let mut board = Pos::startpos();
        let h0 = board.hash();
        handle_position("position fen not a real fen at all", &mut board);
        assert_eq!(board.hash(), h0);
    }

    #[test]
    fn setoption_clamps_to_documented_ranges() {
        let mut config = EngineConfig { hash_mb: 4, ..EngineConfig::default() };
        let engine = Arc::new(Mutex::new(Explorer::new(config.clone())));
        handle_setoption("setoption name SearchDepth value 99", &mut config, &engine);
        assert_eq!(config.search_depth, 20);
        handle_setoption("setoption name RazorMarginD2 value -5", &mut config, &engine);
        assert_eq!(config.razor_margin_d2, 0);
        handle_setoption(
            "setoption name CorrectionHistoryScale value 150",
            &mut config,
            &engine,
        );
        assert!((config.correction_history_scale - 1.5).abs() < 1e-9);
        handle_setoption("setoption name UseRazoring value false", &mut config, &engine);
        assert!(!config.use_razoring);
    }

    #[test]
    fn hash_zero_clamps_to_one_mb() {
        let mut config = EngineConfig { hash_mb: 4, ..EngineConfig::default() };
        let engine = Arc::new(Mutex::new(Explorer::new(config.clone())));
        handle_setoption("setoption name Hash value 0", &mut config, &engine);
        assert_eq!(config.hash_mb, 1);
    }

    #[test]
    fn bool_options_accept_the_usual_spellings() {
        for v in ["1", "true", "True", "YES", "on"] {
            assert!(parse_bool_option(v));
        }
        for v in ["0", "false", "off", "nope"] {
            assert!(!parse_bool_option(v));
        }
    }
}

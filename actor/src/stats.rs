//! Run statistics tracking and persistence.
//!
//! This module provides statistics tracking for self-play runs, including:
//! - Game counts and outcomes
//! - Game lengths
//! - Datapoints written to the dataset
//!
//! Stats are written to `<data_dir>/run_stats.json`.

use games_gomoku::GameResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Aggregated run statistics, designed for lock-free updates.
#[derive(Debug)]
pub struct RunStats {
    /// Finished games
    games: AtomicU32,
    black_wins: AtomicU32,
    white_wins: AtomicU32,
    draws: AtomicU32,
    /// Stones placed across all finished games
    total_moves: AtomicU64,
    /// Datapoints appended to the dataset
    datapoints: AtomicU64,
    /// Completed self-play iterations
    iterations: AtomicU32,
    start_time: Instant,
    stats_path: PathBuf,
}

/// Serializable stats for JSON output.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunStatsSnapshot {
    pub games: u32,
    pub black_wins: u32,
    pub white_wins: u32,
    pub draws: u32,
    pub total_moves: u64,
    pub datapoints: u64,
    pub iterations: u32,
    pub avg_game_length: f64,
    pub games_per_second: f64,
    pub runtime_seconds: f64,
    pub timestamp: u64,
}

impl RunStats {
    /// Create new stats tracker writing into `data_dir`.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref();

        // Ensure data directory exists
        if let Err(e) = fs::create_dir_all(data_dir) {
            warn!("Failed to create data directory: {}", e);
        }

        Self {
            games: AtomicU32::new(0),
            black_wins: AtomicU32::new(0),
            white_wins: AtomicU32::new(0),
            draws: AtomicU32::new(0),
            total_moves: AtomicU64::new(0),
            datapoints: AtomicU64::new(0),
            iterations: AtomicU32::new(0),
            start_time: Instant::now(),
            stats_path: data_dir.join("run_stats.json"),
        }
    }

    /// Record a game that ended with `result` after `moves` stones.
    ///
    /// Unfinished games are ignored.
    pub fn record_game(&self, result: GameResult, moves: usize) {
        let counter = match result {
            GameResult::InProgress => return,
            GameResult::BlackWin => &self.black_wins,
            GameResult::WhiteWin => &self.white_wins,
            GameResult::Draw => &self.draws,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.games.fetch_add(1, Ordering::Relaxed);
        self.total_moves.fetch_add(moves as u64, Ordering::Relaxed);
    }

    pub fn record_datapoints(&self, count: usize) {
        self.datapoints.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current stats.
    pub fn snapshot(&self) -> RunStatsSnapshot {
        let games = self.games.load(Ordering::Relaxed);
        let total_moves = self.total_moves.load(Ordering::Relaxed);
        let runtime = self.start_time.elapsed().as_secs_f64();

        let avg_game_length = if games > 0 {
            total_moves as f64 / games as f64
        } else {
            0.0
        };

        let games_per_second = if runtime > 0.0 {
            games as f64 / runtime
        } else {
            0.0
        };

        RunStatsSnapshot {
            games,
            black_wins: self.black_wins.load(Ordering::Relaxed),
            white_wins: self.white_wins.load(Ordering::Relaxed),
            draws: self.draws.load(Ordering::Relaxed),
            total_moves,
            datapoints: self.datapoints.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
            avg_game_length,
            games_per_second,
            runtime_seconds: runtime,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Write stats to JSON file (atomic write-then-rename).
    pub fn write_stats(&self) {
        let snapshot = self.snapshot();

        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(j) => j,
            Err(e) => {
                warn!("Failed to serialize run stats: {}", e);
                return;
            }
        };

        // Write to temp file then rename
        let temp_path = self.stats_path.with_extension("json.tmp");
        match fs::File::create(&temp_path) {
            Ok(mut file) => {
                if let Err(e) = file.write_all(json.as_bytes()) {
                    warn!("Failed to write run stats: {}", e);
                    return;
                }
            }
            Err(e) => {
                warn!("Failed to create temp stats file: {}", e);
                return;
            }
        }

        if let Err(e) = fs::rename(&temp_path, &self.stats_path) {
            warn!("Failed to rename stats file: {}", e);
            let _ = fs::remove_file(&temp_path);
            return;
        }

        debug!("Wrote run stats to {}", self.stats_path.display());
    }

    pub fn stats_path(&self) -> &Path {
        &self.stats_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_record_game() {
        let dir = tempdir().unwrap();
        let stats = RunStats::new(dir.path());

        stats.record_game(GameResult::BlackWin, 41);
        stats.record_game(GameResult::WhiteWin, 38);
        stats.record_game(GameResult::Draw, 225);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.games, 3);
        assert_eq!(snapshot.black_wins, 1);
        assert_eq!(snapshot.white_wins, 1);
        assert_eq!(snapshot.draws, 1);
        assert_eq!(snapshot.total_moves, 41 + 38 + 225);
    }

    #[test]
    fn test_unfinished_game_is_ignored() {
        let dir = tempdir().unwrap();
        let stats = RunStats::new(dir.path());

        stats.record_game(GameResult::InProgress, 12);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.games, 0);
        assert_eq!(snapshot.total_moves, 0);
    }

    #[test]
    fn test_average_with_zero_games() {
        let dir = tempdir().unwrap();
        let stats = RunStats::new(dir.path());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.avg_game_length, 0.0);
        assert!(!snapshot.avg_game_length.is_nan());
    }

    #[test]
    fn test_avg_game_length_calculation() {
        let dir = tempdir().unwrap();
        let stats = RunStats::new(dir.path());

        stats.record_game(GameResult::BlackWin, 20);
        stats.record_game(GameResult::WhiteWin, 30);

        let snapshot = stats.snapshot();
        assert!((snapshot.avg_game_length - 25.0).abs() < 0.01);
    }

    #[test]
    fn test_datapoints_and_iterations() {
        let dir = tempdir().unwrap();
        let stats = RunStats::new(dir.path());

        stats.record_datapoints(120);
        stats.record_datapoints(80);
        stats.record_iteration();
        stats.record_iteration();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.datapoints, 200);
        assert_eq!(snapshot.iterations, 2);
    }

    #[test]
    fn test_write_stats() {
        let dir = tempdir().unwrap();
        let stats = RunStats::new(dir.path());

        stats.record_game(GameResult::BlackWin, 9);
        stats.write_stats();

        assert_eq!(stats.stats_path(), dir.path().join("run_stats.json"));
        let content = fs::read_to_string(stats.stats_path()).unwrap();
        let parsed: RunStatsSnapshot = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.games, 1);
        assert_eq!(parsed.black_wins, 1);
        assert!(!dir.path().join("run_stats.json.tmp").exists());
    }
}

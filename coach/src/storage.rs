//! SQLite example store.
//!
//! Holds the example history of recent iterations and the gating decision of
//! every iteration, so a run can be resumed. Boards are stored as 24 signed
//! bytes and policies as little-endian f32 blobs.

use crate::samples::TrainingExample;
use anyhow::{anyhow, Result};
use engine_core::game_utils::{decode_f32_slice, encode_f32_slices};
use engine_core::{GameMetadata, Player};
use games_mill::POINT_COUNT;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

/// Outcome of one gating round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatingRecord {
    pub iteration: u32,
    pub new_wins: u32,
    pub old_wins: u32,
    pub draws: u32,
    pub capped: u32,
    pub heuristic: u32,
    pub accepted: bool,
    /// `new / (new + old)`; `None` when no game was decided.
    pub win_rate: Option<f64>,
}

/// SQLite-backed store.
///
/// Uses a Mutex since rusqlite Connection is not Sync.
pub struct ExampleStore {
    conn: Mutex<Connection>,
}

impl ExampleStore {
    /// Open or create the store, initializing the schema if needed.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    /// In-memory store, for tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS examples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                iteration INTEGER NOT NULL,
                board BLOB NOT NULL,
                mover INTEGER NOT NULL,
                policy BLOB NOT NULL,
                phase INTEGER NOT NULL,
                value REAL NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_examples_iteration ON examples(iteration)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS gating (
                iteration INTEGER PRIMARY KEY,
                new_wins INTEGER NOT NULL,
                old_wins INTEGER NOT NULL,
                draws INTEGER NOT NULL,
                capped INTEGER NOT NULL,
                heuristic INTEGER NOT NULL,
                accepted INTEGER NOT NULL,
                win_rate REAL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Makes the database self-describing for external trainers
        conn.execute(
            "CREATE TABLE IF NOT EXISTS game_metadata (
                env_id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                board_width INTEGER NOT NULL,
                board_height INTEGER NOT NULL,
                playable_points INTEGER NOT NULL,
                num_actions INTEGER NOT NULL,
                obs_size INTEGER NOT NULL,
                player_count INTEGER NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    pub fn store_metadata(&self, metadata: &GameMetadata) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO game_metadata
             (env_id, display_name, board_width, board_height, playable_points,
              num_actions, obs_size, player_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, CURRENT_TIMESTAMP)",
            params![
                metadata.env_id,
                metadata.display_name,
                metadata.board_width as i64,
                metadata.board_height as i64,
                metadata.playable_points as i64,
                metadata.num_actions as i64,
                metadata.obs_size as i64,
                metadata.player_count as i64,
            ],
        )?;
        Ok(())
    }

    pub fn metadata(&self, env_id: &str) -> Result<Option<(String, usize, usize)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT display_name, num_actions, obs_size FROM game_metadata WHERE env_id = ?1",
        )?;
        let mut rows = stmt.query(params![env_id])?;
        match rows.next()? {
            Some(row) => Ok(Some((
                row.get(0)?,
                row.get::<_, i64>(1)? as usize,
                row.get::<_, i64>(2)? as usize,
            ))),
            None => Ok(None),
        }
    }

    /// Replace the examples stored for `iteration`.
    pub fn store_iteration(&self, iteration: u32, examples: &[TrainingExample]) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM examples WHERE iteration = ?1",
            params![iteration as i64],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO examples (iteration, board, mover, policy, phase, value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            let mut policy_buf = Vec::new();
            for example in examples {
                let board: Vec<u8> = example.board.iter().map(|&c| c as u8).collect();
                policy_buf.clear();
                encode_f32_slices(&mut policy_buf, [example.policy.as_slice()]);
                stmt.execute(params![
                    iteration as i64,
                    board,
                    example.mover.number() as i64,
                    policy_buf,
                    example.phase as i64,
                    example.value as f64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Drop examples of iterations older than `oldest_kept`.
    pub fn prune_before(&self, oldest_kept: u32) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM examples WHERE iteration < ?1",
            params![oldest_kept as i64],
        )?;
        Ok(removed)
    }

    /// Load the examples of the last `window` stored iterations, oldest
    /// first.
    pub fn load_history(&self, window: usize) -> Result<Vec<(u32, Vec<TrainingExample>)>> {
        let conn = self.lock()?;
        let mut iterations: Vec<u32> = {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT iteration FROM examples ORDER BY iteration DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![window as i64], |row| row.get::<_, i64>(0))?;
            rows.map(|r| r.map(|i| i as u32))
                .collect::<rusqlite::Result<_>>()?
        };
        iterations.reverse();

        let mut stmt = conn.prepare(
            "SELECT board, mover, policy, phase, value FROM examples
             WHERE iteration = ?1 ORDER BY id",
        )?;
        let mut history = Vec::with_capacity(iterations.len());
        for iteration in iterations {
            let rows = stmt.query_map(params![iteration as i64], |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })?;
            let mut examples = Vec::new();
            for row in rows {
                let (board, mover, policy, phase, value) = row?;
                examples.push(decode_example(&board, mover, &policy, phase, value)?);
            }
            history.push((iteration, examples));
        }
        Ok(history)
    }

    pub fn count_examples(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM examples", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn store_gating(&self, record: &GatingRecord) -> Result<()> {
        let conn = self.lock()?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        conn.execute(
            "INSERT OR REPLACE INTO gating
             (iteration, new_wins, old_wins, draws, capped, heuristic, accepted, win_rate, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.iteration as i64,
                record.new_wins as i64,
                record.old_wins as i64,
                record.draws as i64,
                record.capped as i64,
                record.heuristic as i64,
                record.accepted as i64,
                record.win_rate,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn gating_records(&self) -> Result<Vec<GatingRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT iteration, new_wins, old_wins, draws, capped, heuristic, accepted, win_rate
             FROM gating ORDER BY iteration",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(GatingRecord {
                iteration: row.get::<_, i64>(0)? as u32,
                new_wins: row.get::<_, i64>(1)? as u32,
                old_wins: row.get::<_, i64>(2)? as u32,
                draws: row.get::<_, i64>(3)? as u32,
                capped: row.get::<_, i64>(4)? as u32,
                heuristic: row.get::<_, i64>(5)? as u32,
                accepted: row.get::<_, i64>(6)? != 0,
                win_rate: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Highest iteration with stored examples or a gating decision.
    pub fn last_iteration(&self) -> Result<Option<u32>> {
        let conn = self.lock()?;
        let last: Option<i64> = conn.query_row(
            "SELECT MAX(iteration) FROM (
                SELECT iteration FROM examples UNION ALL SELECT iteration FROM gating
             )",
            [],
            |row| row.get(0),
        )?;
        Ok(last.map(|i| i as u32))
    }
}

fn decode_example(
    board: &[u8],
    mover: i64,
    policy: &[u8],
    phase: i64,
    value: f64,
) -> Result<TrainingExample> {
    let cells: [i8; POINT_COUNT] = board
        .iter()
        .map(|&b| b as i8)
        .collect::<Vec<_>>()
        .try_into()
        .map_err(|_| anyhow!("stored board has {} cells", board.len()))?;
    let mover = u8::try_from(mover)
        .ok()
        .and_then(Player::from_number)
        .ok_or_else(|| anyhow!("stored mover {} is not a player", mover))?;
    let policy = decode_f32_slice(policy).ok_or_else(|| anyhow!("truncated policy blob"))?;
    Ok(TrainingExample {
        board: cells,
        mover,
        policy,
        phase: phase as u8,
        value: value as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::Game;
    use games_mill::{MillGame, NUM_ACTIONS};
    use tempfile::tempdir;

    fn example(i: usize) -> TrainingExample {
        let mut board = [0i8; POINT_COUNT];
        board[i % POINT_COUNT] = 1;
        board[(i + 5) % POINT_COUNT] = -1;
        let mut policy = vec![0.0; NUM_ACTIONS];
        policy[i % NUM_ACTIONS] = 0.75;
        policy[(i + 1) % NUM_ACTIONS] = 0.25;
        TrainingExample {
            board,
            mover: if i % 2 == 0 { Player::One } else { Player::Two },
            policy,
            phase: (i % 5) as u8,
            value: if i % 3 == 0 { 1.0 } else { -0.5 },
        }
    }

    fn gating(iteration: u32, accepted: bool) -> GatingRecord {
        GatingRecord {
            iteration,
            new_wins: 6,
            old_wins: 4,
            draws: 2,
            capped: 1,
            heuristic: 0,
            accepted,
            win_rate: Some(0.6),
        }
    }

    #[test]
    fn test_create_store() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("replay.db");
        let store = ExampleStore::new(&db_path);
        assert!(store.is_ok());
        assert!(db_path.exists());
    }

    #[test]
    fn test_store_and_load_history() {
        let store = ExampleStore::in_memory().unwrap();
        let first: Vec<_> = (0..4).map(example).collect();
        let second: Vec<_> = (10..13).map(example).collect();
        store.store_iteration(0, &first).unwrap();
        store.store_iteration(1, &second).unwrap();

        assert_eq!(store.count_examples().unwrap(), 7);
        let history = store.load_history(5).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], (0, first));
        assert_eq!(history[1], (1, second.clone()));

        let recent = store.load_history(1).unwrap();
        assert_eq!(recent, vec![(1, second)]);
    }

    #[test]
    fn test_store_iteration_replaces() {
        let store = ExampleStore::in_memory().unwrap();
        store.store_iteration(3, &[example(0), example(1)]).unwrap();
        store.store_iteration(3, &[example(2)]).unwrap();
        assert_eq!(store.count_examples().unwrap(), 1);
    }

    #[test]
    fn test_prune_before() {
        let store = ExampleStore::in_memory().unwrap();
        for iteration in 0..4 {
            store.store_iteration(iteration, &[example(iteration as usize)]).unwrap();
        }
        assert_eq!(store.prune_before(2).unwrap(), 2);
        let history = store.load_history(10).unwrap();
        let iterations: Vec<u32> = history.iter().map(|(i, _)| *i).collect();
        assert_eq!(iterations, vec![2, 3]);
    }

    #[test]
    fn test_gating_records_and_last_iteration() {
        let store = ExampleStore::in_memory().unwrap();
        assert_eq!(store.last_iteration().unwrap(), None);

        store.store_iteration(0, &[example(0)]).unwrap();
        store.store_gating(&gating(0, true)).unwrap();
        let mut rejected = gating(1, false);
        rejected.win_rate = None;
        store.store_gating(&rejected).unwrap();

        let records = store.gating_records().unwrap();
        assert_eq!(records, vec![gating(0, true), rejected]);
        assert_eq!(store.last_iteration().unwrap(), Some(1));
    }

    #[test]
    fn test_metadata_round_trip() {
        let store = ExampleStore::in_memory().unwrap();
        let metadata = MillGame::default().metadata();
        store.store_metadata(&metadata).unwrap();
        store.store_metadata(&metadata).unwrap();

        let (name, actions, obs) = store.metadata("mill").unwrap().unwrap();
        assert_eq!(name, metadata.display_name);
        assert_eq!(actions, NUM_ACTIONS);
        assert_eq!(obs, metadata.obs_size);
        assert!(store.metadata("chess").unwrap().is_none());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("replay.db");
        {
            let store = ExampleStore::new(&db_path).unwrap();
            store.store_iteration(5, &[example(1), example(2)]).unwrap();
        }
        let store = ExampleStore::new(&db_path).unwrap();
        assert_eq!(store.last_iteration().unwrap(), Some(5));
        assert_eq!(store.load_history(3).unwrap()[0].1.len(), 2);
    }
}

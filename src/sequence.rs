// Time-indexed goal sequencer
//
// Replays a recorded multi-robot choreography. Each schedule row carries a timestamp
// (H:M:S:decisecond) and one (x, y, heading_degrees) triple per robot. A row takes effect
// when the elapsed time, rounded to a decisecond, equals its timestamp. A tick that lands
// late misses the row and the cursor stays put.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::messages::Goal;

const NANOS_PER_DECISECOND: u128 = 100_000_000;

/// Error types for schedule loading
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Cannot read schedule {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schedule has no entries")]
    Empty,

    #[error("Line {line}: invalid timestamp {value:?} (expected H:M:S:decisecond)")]
    Timestamp { line: usize, value: String },

    #[error("Line {line}, column {column}: {value:?} is not an integer")]
    Field {
        line: usize,
        column: usize,
        value: String,
    },

    #[error("Line {line}: {fields} goal fields do not form (x, y, heading) triples")]
    IncompleteTriple { line: usize, fields: usize },

    #[error("Line {line}: expected {expected} goals, got {got}")]
    GoalCount {
        line: usize,
        expected: usize,
        got: usize,
    },

    #[error("Line {line}: timestamp does not come after the previous row")]
    OutOfOrder { line: usize },
}

pub type Result<T> = std::result::Result<T, ScheduleError>;

/// One row of the choreography
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    /// Time since start, in deciseconds
    pub at: u64,
    pub goals: Vec<Goal>,
}

impl ScheduleEntry {
    pub fn timestamp(&self) -> Duration {
        Duration::from_millis(self.at * 100)
    }
}

/// Parse `H:M:S:decisecond` into deciseconds
pub fn parse_timestamp(value: &str) -> Option<u64> {
    let parts: Vec<u64> = value
        .trim()
        .split(':')
        .map(|part| part.trim().parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;

    match parts.as_slice() {
        // Checked so an absurd hour field is rejected instead of overflowing
        &[h, m, s, ds] => h
            .checked_mul(3600)?
            .checked_add(m.checked_mul(60)?)?
            .checked_add(s)?
            .checked_mul(10)?
            .checked_add(ds),
        _ => None,
    }
}

/// Round elapsed time to the nearest decisecond
fn to_deciseconds(elapsed: Duration) -> u64 {
    ((elapsed.as_nanos() + NANOS_PER_DECISECOND / 2) / NANOS_PER_DECISECOND) as u64
}

/// Parse schedule text, checking each row against the robot count
pub fn parse_schedule(text: &str, robot_count: usize) -> Result<Vec<ScheduleEntry>> {
    let mut entries: Vec<ScheduleEntry> = Vec::new();

    for (index, row) in text.lines().enumerate() {
        let line = index + 1;
        if row.trim().is_empty() {
            continue;
        }

        let mut columns = row.split(',');
        let stamp = columns.next().unwrap_or_default();
        let at = parse_timestamp(stamp).ok_or_else(|| ScheduleError::Timestamp {
            line,
            value: stamp.to_string(),
        })?;

        let fields = columns
            .enumerate()
            .map(|(i, raw)| {
                raw.trim().parse::<i64>().map_err(|_| ScheduleError::Field {
                    line,
                    column: i + 1,
                    value: raw.to_string(),
                })
            })
            .collect::<Result<Vec<i64>>>()?;

        if fields.len() % 3 != 0 {
            return Err(ScheduleError::IncompleteTriple {
                line,
                fields: fields.len(),
            });
        }

        let goals: Vec<Goal> = fields
            .chunks_exact(3)
            .map(|t| Goal::from_degrees(t[0] as f64, t[1] as f64, t[2] as f64))
            .collect();

        if goals.len() != robot_count {
            return Err(ScheduleError::GoalCount {
                line,
                expected: robot_count,
                got: goals.len(),
            });
        }

        if entries.last().is_some_and(|prev| prev.at >= at) {
            return Err(ScheduleError::OutOfOrder { line });
        }

        entries.push(ScheduleEntry { at, goals });
    }

    if entries.is_empty() {
        return Err(ScheduleError::Empty);
    }

    Ok(entries)
}

/// Read and parse a schedule file
pub fn load_schedule(path: impl AsRef<Path>, robot_count: usize) -> Result<Vec<ScheduleEntry>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ScheduleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_schedule(&text, robot_count)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// Schedule parsed, clock not started
    Loaded,
    /// Clock running, rows remain
    Advancing,
    /// Every row consumed; the last goal set is held
    Exhausted,
}

pub struct GoalSequencer {
    schedule: Vec<ScheduleEntry>,
    cursor: usize,
    active: Vec<Goal>,
    started_at: Instant,
    last_decisecond: Option<u64>,
    state: SequencerState,
}

impl GoalSequencer {
    /// Build from parsed entries. The clock starts on `start` or on the first query.
    pub fn new(initial_goals: Vec<Goal>, schedule: Vec<ScheduleEntry>) -> Result<Self> {
        if schedule.is_empty() {
            return Err(ScheduleError::Empty);
        }

        Ok(Self {
            schedule,
            cursor: 0,
            active: initial_goals,
            started_at: Instant::now(),
            last_decisecond: None,
            state: SequencerState::Loaded,
        })
    }

    /// Load the schedule file and start the clock
    pub fn initialize(initial_goals: Vec<Goal>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let schedule = load_schedule(path, initial_goals.len())?;
        info!("Loaded {} schedule rows from {}", schedule.len(), path.display());

        let mut sequencer = Self::new(initial_goals, schedule)?;
        sequencer.start();
        Ok(sequencer)
    }

    /// Record the start time
    pub fn start(&mut self) {
        self.started_at = Instant::now();
        self.last_decisecond = None;
        if self.state == SequencerState::Loaded {
            self.state = SequencerState::Advancing;
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Goal set for the current wall-clock time
    pub fn next_goals(&mut self) -> &[Goal] {
        if self.state == SequencerState::Loaded {
            self.start();
        }
        let elapsed = self.started_at.elapsed();
        self.next_goals_at(elapsed)
    }

    /// Goal set for a given elapsed time since start
    pub fn next_goals_at(&mut self, elapsed: Duration) -> &[Goal] {
        if self.state == SequencerState::Loaded {
            self.state = SequencerState::Advancing;
        }

        let now = to_deciseconds(elapsed);

        // Each decisecond is evaluated once
        if self.last_decisecond == Some(now) {
            return &self.active;
        }
        self.last_decisecond = Some(now);

        if let Some(entry) = self.schedule.get(self.cursor) {
            if entry.at == now {
                self.active.clone_from(&entry.goals);
                self.cursor += 1;
                info!(
                    "Goal set {} of {} active at {:?}",
                    self.cursor,
                    self.schedule.len(),
                    entry.timestamp()
                );

                if self.cursor == self.schedule.len() {
                    self.state = SequencerState::Exhausted;
                    info!("Schedule exhausted, holding last goal set");
                }
            } else {
                debug!("No goal change at {} ds (next row at {} ds)", now, entry.at);
            }
        }

        &self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_ROWS: &str = "0:0:1:0,100,100,0,200,200,90\n\
                              0:0:2:0,110,100,0,210,200,90\n\
                              0:0:3:0,120,100,0,220,200,180\n";

    fn initial() -> Vec<Goal> {
        vec![Goal::from_degrees(500.0, 500.0, 30.0), Goal::from_degrees(600.0, 300.0, 40.0)]
    }

    fn sequencer() -> GoalSequencer {
        let schedule = parse_schedule(THREE_ROWS, 2).unwrap();
        GoalSequencer::new(initial(), schedule).unwrap()
    }

    fn at(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("0:0:1:0"), Some(10));
        assert_eq!(parse_timestamp("1:2:3:4"), Some(37234));
        assert_eq!(parse_timestamp(" 0:0:0:5 "), Some(5));
        assert_eq!(parse_timestamp("0:1:0"), None);
        assert_eq!(parse_timestamp("a:b:c:d"), None);
        assert_eq!(parse_timestamp("9999999999999999999:0:0:0"), None);
        assert_eq!(parse_timestamp("0:0:1:18446744073709551615"), None);
    }

    #[test]
    fn test_parse_schedule_groups_triples() {
        let schedule = parse_schedule(THREE_ROWS, 2).unwrap();
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule[0].at, 10);
        assert_eq!(schedule[0].goals[1], Goal::from_degrees(200.0, 200.0, 90.0));
        assert_eq!(schedule[2].timestamp(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_schedule_errors() {
        assert!(matches!(parse_schedule("", 1), Err(ScheduleError::Empty)));
        assert!(matches!(parse_schedule("\n\n", 1), Err(ScheduleError::Empty)));
        assert!(matches!(
            parse_schedule("0:0:1,1,2,3", 1),
            Err(ScheduleError::Timestamp { line: 1, .. })
        ));
        assert!(matches!(
            parse_schedule("9999999999999999999:0:0:0,1,2,3", 1),
            Err(ScheduleError::Timestamp { line: 1, .. })
        ));
        assert!(matches!(
            parse_schedule("0:0:1:0,1,x,3", 1),
            Err(ScheduleError::Field { line: 1, column: 2, .. })
        ));
        assert!(matches!(
            parse_schedule("0:0:1:0,1,2", 1),
            Err(ScheduleError::IncompleteTriple { line: 1, fields: 2 })
        ));
        assert!(matches!(
            parse_schedule("0:0:1:0,1,2,3", 2),
            Err(ScheduleError::GoalCount { line: 1, expected: 2, got: 1 })
        ));
        assert!(matches!(
            parse_schedule("0:0:2:0,1,2,3\n0:0:1:0,1,2,3", 1),
            Err(ScheduleError::OutOfOrder { line: 2 })
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = GoalSequencer::initialize(initial(), "does/not/exist.csv");
        assert!(matches!(result, Err(ScheduleError::Io { .. })));
    }

    #[test]
    fn test_initial_goals_until_first_row() {
        let mut seq = sequencer();
        assert_eq!(seq.state(), SequencerState::Loaded);
        assert_eq!(seq.next_goals_at(at(0)), initial().as_slice());
        assert_eq!(seq.next_goals_at(at(500)), initial().as_slice());
        assert_eq!(seq.state(), SequencerState::Advancing);
        assert_eq!(seq.cursor(), 0);
    }

    #[test]
    fn test_advances_on_exact_match() {
        let mut seq = sequencer();
        seq.next_goals_at(at(900));
        let goals = seq.next_goals_at(at(1020)).to_vec(); // rounds to 1.0 s
        assert_eq!(goals[0], Goal::from_degrees(100.0, 100.0, 0.0));
        assert_eq!(seq.cursor(), 1);
    }

    #[test]
    fn test_repeated_calls_are_idempotent() {
        let mut seq = sequencer();
        let first = seq.next_goals_at(at(1000)).to_vec();
        let second = seq.next_goals_at(at(1000)).to_vec();
        let third = seq.next_goals_at(at(1040)).to_vec();
        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(seq.cursor(), 1);
    }

    #[test]
    fn test_late_tick_skips_row() {
        // Jumping from 0.5 s to 2.5 s never sees 1.0 s: the cursor stays on row 0
        let mut seq = sequencer();
        seq.next_goals_at(at(500));
        let goals = seq.next_goals_at(at(2500)).to_vec();
        assert_eq!(seq.cursor(), 0);
        assert_eq!(goals, initial());

        // Row 0 is now unreachable, so later rows never fire either
        seq.next_goals_at(at(3000));
        assert_eq!(seq.cursor(), 0);
    }

    #[test]
    fn test_exhausted_holds_last_goals() {
        let mut seq = sequencer();
        for ms in [1000, 1500, 2000, 2500, 3000] {
            seq.next_goals_at(at(ms));
        }
        assert_eq!(seq.state(), SequencerState::Exhausted);
        assert_eq!(seq.cursor(), 3);

        // Same decisecond as the last row, so this only reads the held set
        let last = seq.next_goals_at(at(3000)).to_vec();
        assert_eq!(last[1], Goal::from_degrees(220.0, 200.0, 180.0));
        for ms in [3100, 10_000, 3_600_000] {
            assert_eq!(seq.next_goals_at(at(ms)), last.as_slice());
        }
        assert_eq!(seq.cursor(), 3);
    }

    #[test]
    fn test_wall_clock_query_starts_clock() {
        let mut seq = sequencer();
        let goals = seq.next_goals().to_vec();
        assert_eq!(goals, initial());
        assert_eq!(seq.state(), SequencerState::Advancing);
    }
}

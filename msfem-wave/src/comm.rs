//! Worker coordination for the distributed basis build.
//!
//! The pipeline only ever needs one collective: an all-gather of `i64`
//! buffers delivered in rank order. [`SerialComm`] implements it for the
//! single-process case; [`LocalCluster`] runs `n` workers as scoped threads
//! sharing one in-memory exchange.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crate::error::SimulationError;

/// One collective is enough for the whole pipeline: every rank contributes a
/// buffer and receives all buffers in rank order.
pub trait Communicator {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn all_gather_i64(&self, local: &[i64]) -> Result<Vec<Vec<i64>>, SimulationError>;

    /// Gather one non-negative count from every rank, in rank order.
    fn all_gather_counts(&self, local: usize) -> Result<Vec<usize>, SimulationError> {
        let gathered = self.all_gather_i64(&[local as i64])?;
        gathered
            .iter()
            .enumerate()
            .map(|(rank, buffer)| match buffer.as_slice() {
                [count] if *count >= 0 => Ok(*count as usize),
                _ => Err(SimulationError::consistency(format!(
                    "rank {} sent a malformed count frame",
                    rank
                ))),
            })
            .collect()
    }
}

/// Trivial communicator for single-process runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather_i64(&self, local: &[i64]) -> Result<Vec<Vec<i64>>, SimulationError> {
        Ok(vec![local.to_vec()])
    }
}

struct GatherState {
    slots: Vec<Option<Vec<i64>>>,
    filled: usize,
    departed: usize,
    round: u64,
}

struct Shared {
    state: Mutex<GatherState>,
    condvar: Condvar,
}

impl Shared {
    fn new(size: usize) -> Self {
        Shared {
            state: Mutex::new(GatherState {
                slots: vec![None; size],
                filled: 0,
                departed: 0,
                round: 0,
            }),
            condvar: Condvar::new(),
        }
    }
}

/// Per-worker handle into a [`LocalCluster`] exchange.
pub struct ClusterComm {
    rank: usize,
    size: usize,
    shared: Arc<Shared>,
}

fn poisoned<E>(_: E) -> SimulationError {
    SimulationError::consistency("cluster lock poisoned by a failed worker")
}

impl Communicator for ClusterComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_gather_i64(&self, local: &[i64]) -> Result<Vec<Vec<i64>>, SimulationError> {
        let mut state = self.shared.state.lock().map_err(poisoned)?;
        let round = state.round;

        state.slots[self.rank] = Some(local.to_vec());
        state.filled += 1;
        if state.filled == self.size {
            self.shared.condvar.notify_all();
        }
        while state.filled < self.size {
            state = self.shared.condvar.wait(state).map_err(poisoned)?;
        }

        let mut gathered = Vec::with_capacity(self.size);
        for (rank, slot) in state.slots.iter().enumerate() {
            match slot {
                Some(data) => gathered.push(data.clone()),
                None => {
                    return Err(SimulationError::consistency(format!(
                        "rank {} deposited nothing into the gather",
                        rank
                    )))
                }
            }
        }

        // The last rank to leave resets the exchange for the next round;
        // everyone else waits for that reset so a fast rank cannot deposit
        // into slots that are about to be cleared.
        state.departed += 1;
        if state.departed == self.size {
            for slot in state.slots.iter_mut() {
                *slot = None;
            }
            state.filled = 0;
            state.departed = 0;
            state.round = state.round.wrapping_add(1);
            self.shared.condvar.notify_all();
        } else {
            while state.round == round {
                state = self.shared.condvar.wait(state).map_err(poisoned)?;
            }
        }

        Ok(gathered)
    }
}

/// In-process cluster of scoped worker threads.
pub struct LocalCluster;

impl LocalCluster {
    /// Run `workers` copies of `task`, one per rank, and collect their
    /// results in rank order. The first error (or any worker panic) fails
    /// the whole run.
    pub fn run<T, F>(workers: usize, task: F) -> Result<Vec<T>, SimulationError>
    where
        T: Send,
        F: Fn(&ClusterComm) -> Result<T, SimulationError> + Sync,
    {
        if workers == 0 {
            return Err(SimulationError::config("cluster needs at least one worker"));
        }

        let shared = Arc::new(Shared::new(workers));
        let task = &task;

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for rank in 0..workers {
                let comm = ClusterComm {
                    rank,
                    size: workers,
                    shared: Arc::clone(&shared),
                };
                handles.push(scope.spawn(move || task(&comm)));
            }

            let mut results = Vec::with_capacity(workers);
            for handle in handles {
                match handle.join() {
                    Ok(result) => results.push(result?),
                    Err(_) => {
                        return Err(SimulationError::consistency("cluster worker panicked"))
                    }
                }
            }
            Ok(results)
        })
    }
}

//! Frame progression: phase-ordered dispatch of column systems, inline or
//! across a worker pool (§4.7, §5).
//!
//! Two execution modes:
//!
//! - **Inline** (`thread_count == 0`): every system runs on the calling
//!   thread. Mutations are buffered into a frame-scoped stage and merged
//!   once, by the caller, after the frame's systems have all run.
//! - **Parallel** (`thread_count > 0`): a pool of long-lived worker threads,
//!   each owning a [`Stage`], is spawned once up front. A column system
//!   whose matched row count clears [`Scheduler::JOB_ROW_THRESHOLD`] has its
//!   rows partitioned evenly across workers; everything else still runs on
//!   the calling thread against the frame-scoped stage, exactly as in inline
//!   mode.
//!
//! For a dispatched (parallelized) system, the calling thread blocks until
//! every worker reports its batch done, then merges each worker's stage
//! into the world — in worker-id order, so merges stay deterministic (§4.6)
//! — before moving on to the next system. This mirrors the teacher's
//! `core::tasks::Executor::scope`: job closures borrow `&World` for less
//! than `'static`, so dispatch lifetime-erases them and only returns once
//! every worker has drained the batch, which is what makes the erasure
//! sound.

use std::ptr::null_mut;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::ecs::handle::Handle;
use crate::ecs::stage::Stage;
use crate::ecs::system::{
    ColumnCallback, ColumnView, FetchDescriptor, MatchedTable, Phase, RefKind, RefSlot, RowsView,
};
use crate::ecs::world::World;

/// Below this many total matched rows, a column system just runs inline
/// rather than paying worker dispatch overhead (§9 "job batching
/// threshold").
const JOB_ROW_THRESHOLD: usize = 256;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Carries a raw pointer across the worker channel. Raw pointers are never
/// `Send`; this asserts what the scoped-borrow argument above already
/// guarantees — `batch.wait()` keeps the pointee alive for the job's whole
/// lifetime — the same way `ColumnView` asserts it for column pointers
/// (`system/record.rs`).
struct SendPtr<T>(*const T);
unsafe impl<T> Send for SendPtr<T> {}

enum Message {
    Run(Job),
    Shutdown,
}

struct Batch {
    remaining: Mutex<usize>,
    done: Condvar,
}

impl Batch {
    fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            done: Condvar::new(),
        }
    }

    fn complete_one(&self) {
        let mut remaining = self.remaining.lock().expect("batch mutex poisoned");
        *remaining -= 1;
        if *remaining == 0 {
            self.done.notify_all();
        }
    }

    fn wait(&self) {
        let mut remaining = self.remaining.lock().expect("batch mutex poisoned");
        while *remaining > 0 {
            remaining = self.done.wait(remaining).expect("batch mutex poisoned");
        }
    }
}

struct WorkerHandle {
    sender: Sender<Message>,
    stage: Stage,
    join: Option<JoinHandle<()>>,
}

/// A worker's queue blocks (via the channel's own backpressure-free recv)
/// until a job or shutdown message arrives — this is the condition-variable
/// wait the spec describes (§5 "workers block ... until a job batch is
/// signaled"), just expressed through a channel rather than a bare condvar,
/// since every job already needs one-shot delivery to a specific worker.
fn worker_loop(receiver: Receiver<Message>) {
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Run(job) => job(),
            Message::Shutdown => break,
        }
    }
}

/// Owns the worker pool (if any) and drives one frame's phase-ordered
/// column system execution.
pub struct Scheduler {
    workers: Vec<WorkerHandle>,
    last_generation: AtomicUsize,
}

impl Scheduler {
    pub fn new(thread_count: usize) -> Self {
        let workers = (0..thread_count)
            .map(|_| {
                let (sender, receiver) = unbounded();
                let join = thread::Builder::new()
                    .name("lattice-worker".to_string())
                    .spawn(move || worker_loop(receiver))
                    .expect("failed to spawn worker thread");
                WorkerHandle {
                    sender,
                    stage: Stage::new(),
                    join: Some(join),
                }
            })
            .collect();
        Self {
            workers,
            last_generation: AtomicUsize::new(0),
        }
    }

    pub fn is_parallel(&self) -> bool {
        !self.workers.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run every phase-ordered column system once, ticking each one's
    /// periodic accumulator (§4.5 step 1, §8 invariant 6). Mutations from
    /// systems that don't clear the parallel-dispatch threshold are buffered
    /// into `temp_stage`, left for the caller to merge.
    pub fn run_frame(&self, world: &World, temp_stage: &Stage, delta_time: f32) {
        let generation = world.types().generation() as usize;
        if generation != self.last_generation.swap(generation, Ordering::SeqCst) {
            log::trace!("schedule invalidated by new table; replanning this frame");
        }

        for &phase in Phase::ORDER.iter() {
            self.run_phase(world, temp_stage, phase, delta_time);
        }
    }

    fn run_phase(&self, world: &World, temp_stage: &Stage, phase: Phase, delta_time: f32) {
        let due = {
            let mut systems = world.systems().write().expect("system registry poisoned");
            let mut due = Vec::new();
            let ids: Vec<_> = systems.phase(phase).map(|record| record.id).collect();
            for id in ids {
                let record = systems.column_system_mut(id).expect("system vanished mid-phase");
                if !record.enabled || !record.tick(delta_time) {
                    continue;
                }
                let total_rows: usize = record
                    .matched_tables
                    .iter()
                    .map(|matched| world.types().with_table(matched.type_id, |table| table.len()))
                    .sum();
                due.push((record.callback(), record.matched_tables.clone(), record.refs.clone(), total_rows));
            }
            due
        };

        for (callback, matched_tables, refs, total_rows) in due {
            if self.is_parallel() && total_rows >= JOB_ROW_THRESHOLD {
                self.dispatch_parallel(world, &callback, &matched_tables, &refs, delta_time);
            } else {
                let handle = Handle::Worker(world, temp_stage);
                for matched in &matched_tables {
                    invoke_table(world, &callback, matched, &refs, delta_time, handle, None);
                }
            }
        }
    }

    /// Partition `matched_tables`' rows evenly across workers, dispatch one
    /// job per (worker, table slice), wait for the whole batch, then merge
    /// each worker's stage into `world` in worker-id order (§4.7, §4.6).
    fn dispatch_parallel(
        &self,
        world: &World,
        callback: &ColumnCallback,
        matched_tables: &[MatchedTable],
        refs: &[RefSlot],
        delta_time: f32,
    ) {
        let worker_count = self.workers.len();
        let mut jobs_per_worker: Vec<Vec<(MatchedTable, usize, usize)>> = vec![Vec::new(); worker_count];

        for matched in matched_tables {
            let row_count = world.types().with_table(matched.type_id, |table| table.len());
            if row_count == 0 {
                continue;
            }
            let chunk = row_count.div_ceil(worker_count).max(1);
            for (worker_index, chunk_start) in (0..row_count).step_by(chunk).enumerate() {
                let chunk_end = (chunk_start + chunk).min(row_count);
                jobs_per_worker[worker_index].push((matched.clone(), chunk_start, chunk_end));
            }
        }

        let total_jobs: usize = jobs_per_worker.iter().map(Vec::len).sum();
        if total_jobs == 0 {
            return;
        }
        let batch = Arc::new(Batch::new(total_jobs));

        for (worker_index, jobs) in jobs_per_worker.into_iter().enumerate() {
            if jobs.is_empty() {
                continue;
            }
            let worker = &self.workers[worker_index];
            let stage_ptr = SendPtr(&worker.stage as *const Stage);
            let world_ptr = SendPtr(world as *const World);
            let callback = callback.clone();
            let refs = refs.to_vec();
            let batch = batch.clone();

            // Safety: `dispatch_parallel` does not return until `batch.wait()`
            // below observes every job has called `complete_one`, so `world`
            // and the worker's own stage both outlive every use of these raw
            // pointers made inside the job (the teacher's `Executor::scope`
            // scoped-borrow argument, generalized from thread-join to
            // condvar rendezvous).
            let job: Job = Box::new(move || {
                let world: &World = unsafe { &*world_ptr.0 };
                let stage: &Stage = unsafe { &*stage_ptr.0 };
                let handle = Handle::Worker(world, stage);
                for (matched, start, end) in &jobs {
                    invoke_table(world, &callback, matched, &refs, delta_time, handle, Some((*start, *end)));
                }
                batch.complete_one();
            });

            worker
                .sender
                .send(Message::Run(job))
                .expect("worker thread gone");
        }

        batch.wait();

        for worker in &self.workers {
            worker.stage.merge(world);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for worker in &self.workers {
            let _ = worker.sender.send(Message::Shutdown);
        }
        for worker in &mut self.workers {
            if let Some(join) = worker.join.take() {
                let _ = join.join();
            }
        }
    }
}

/// Invoke `callback` against every one of `matched_tables`, in full (no row
/// range). Used by [`crate::ecs::world::World::run_system`] to run a
/// `Manual` system on demand, outside of [`Scheduler::run_frame`].
pub(crate) fn invoke_matched_tables(
    world: &World,
    callback: &ColumnCallback,
    matched_tables: &[MatchedTable],
    refs: &[RefSlot],
    delta_time: f32,
    handle: Handle,
) {
    for matched in matched_tables {
        invoke_table(world, callback, matched, refs, delta_time, handle, None);
    }
}

/// Build a [`RowsView`] over one matched table (or a row-range slice of it)
/// and invoke `callback` against it. `range` is `None` for a whole-table
/// inline invocation, `Some((start, end))` for one worker's job slice.
fn invoke_table(
    world: &World,
    callback: &ColumnCallback,
    matched: &MatchedTable,
    refs: &[RefSlot],
    delta_time: f32,
    handle: Handle,
    range: Option<(usize, usize)>,
) {
    let mut owned: Vec<Vec<u8>> = Vec::new();

    // Resolve every `Ref` column before taking the outer table lock below:
    // `RefKind::Entity` resolves through its own `with_table_mut` call on
    // `TypeRegistry`'s single table-wide `RwLock`, so doing this inline
    // inside the outer closure would re-enter that same non-reentrant lock
    // whenever the ref's entity happens to live in `matched.type_id` itself.
    let resolved_refs: Vec<ColumnView> =
        matched.fetches.iter().filter_map(|fetch| match *fetch {
            FetchDescriptor::Ref(index) => Some(resolve_ref(world, &refs[index], &mut owned)),
            _ => None,
        }).collect();

    let (entities_ptr, start, row_count, columns) = world.types().with_table_mut(matched.type_id, |table| {
        let total = table.len();
        let (start, end) = range.unwrap_or((0, total));
        let row_count = end.saturating_sub(start);
        let entities_ptr = table.entities().as_ptr();

        let mut resolved_refs = resolved_refs.into_iter();
        let mut columns = Vec::with_capacity(matched.fetches.len());
        for fetch in &matched.fetches {
            let view = match *fetch {
                FetchDescriptor::AbsentOptional => ColumnView {
                    ptr: null_mut(),
                    stride: 0,
                    present: false,
                },
                FetchDescriptor::Column(offset) => {
                    let column = table.column_at_mut(offset);
                    let stride = column.element_size();
                    let base = column.as_mut_ptr();
                    let ptr = if stride == 0 {
                        base
                    } else {
                        unsafe { base.add(start * stride) }
                    };
                    ColumnView { ptr, stride, present: true }
                }
                FetchDescriptor::Ref(_) => resolved_refs.next().expect("one resolved view per Ref fetch"),
            };
            columns.push(view);
        }

        (entities_ptr, start, row_count, columns)
    });

    // Safety: no structural mutation reaches this table until the next
    // `Stage::merge`, which cannot run concurrently with system execution
    // (§4.6, §5) — the pointer obtained above stays valid for the call below.
    let entities = unsafe { std::slice::from_raw_parts(entities_ptr.add(start), row_count) };

    let view = RowsView {
        entities,
        delta_time,
        columns,
        owned,
    };
    callback(handle, &view);
}

/// Resolve a `FromEntity`/`SYSTEM.`/`$.` sourced column to a pointer, fresh,
/// at invocation time (§9: only the ref's logical identity — not a physical
/// pointer — is cached across frames).
fn resolve_ref(world: &World, slot: &RefSlot, owned: &mut Vec<Vec<u8>>) -> ColumnView {
    match slot.kind {
        RefKind::Singleton => match world.singletons().get(slot.component) {
            Some(bytes) => {
                owned.push(bytes);
                let ptr = owned.last_mut().expect("just pushed").as_mut_ptr();
                ColumnView { ptr, stride: 0, present: true }
            }
            None => ColumnView { ptr: null_mut(), stride: 0, present: false },
        },
        RefKind::Entity(entity) => {
            let location = world.entity_index().read().expect("entity index poisoned").get(entity);
            let Some(location) = location else {
                return ColumnView { ptr: null_mut(), stride: 0, present: false };
            };
            world.types().with_table_mut(location.type_id, |table| {
                match table.column_offset(slot.component) {
                    Some(offset) => {
                        let column = table.column_at_mut(offset);
                        let ptr = column.get_mut(location.row).as_mut_ptr();
                        ColumnView { ptr, stride: 0, present: true }
                    }
                    None => ColumnView { ptr: null_mut(), stride: 0, present: false },
                }
            })
        }
    }
}

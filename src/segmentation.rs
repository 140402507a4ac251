//! Log segmentation engine
//!
//! Partitions an ordered sensor log into contiguous activity segments using a
//! [`TransitionModel`] as a compatibility oracle.
//!
//! Design: arena + open set
//! - Every segment ever opened lives in an arena slot addressed by a stable
//!   handle; closing a segment never invalidates other handles
//! - The open set is an ordered list of handles, scanned front to back
//! - When an event is compatible with more than one open segment, all of them
//!   are force-closed together and recorded as a B-step
//! - Segments opened after a B-step that could have continued one of its
//!   closed segments are attached to it as candidate continuations
//!
//! A segment is retained only if it reaches the noise threshold; shorter ones
//! are dropped when they close.

use crate::config::{validate_compat_threshold, validate_noise_threshold};
use crate::error::SegmentError;
use crate::model::{SensorId, TransitionModel};
use crate::schema::SensorEvent;
use crate::stats::SegmentStats;
use serde::Serialize;

/// One contiguous activity: a non-empty, ordered run of events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Segment {
    events: Vec<SensorEvent>,
}

impl Segment {
    /// Wrap a precomputed run of events; `None` if it is empty
    pub fn new(events: Vec<SensorEvent>) -> Option<Self> {
        if events.is_empty() {
            None
        } else {
            Some(Self { events })
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Always false; segments hold at least one event
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[SensorEvent] {
        &self.events
    }

    pub fn first(&self) -> &SensorEvent {
        &self.events[0]
    }

    pub fn last(&self) -> &SensorEvent {
        &self.events[self.events.len() - 1]
    }

    /// Sensor ids of the segment, in order
    pub fn sensor_ids(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(SensorEvent::sensor_id)
    }
}

/// A branch point where several open segments accepted the same event.
///
/// Segment references are indices into [`SegmentedLog::segments`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BStep {
    /// Log index of the event that triggered the branch
    pub position: usize,
    /// Segments force-closed at `position`
    pub closed_segments: Vec<usize>,
    /// Later segments whose first event is compatible with a closed segment
    pub compat_segments: Vec<usize>,
}

/// Result of a segmentation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentedLog {
    segments: Vec<Segment>,
    b_steps: Vec<BStep>,
    discarded_segments: usize,
    discarded_events: usize,
}

impl SegmentedLog {
    /// Wrap a precomputed set of segments (no B-steps)
    pub fn from_segments(segments: Vec<Segment>) -> Result<Self, SegmentError> {
        if segments.is_empty() {
            return Err(SegmentError::InvalidArgument(
                "not enough inputs provided: no segments".to_string(),
            ));
        }
        Ok(Self {
            segments,
            b_steps: Vec::new(),
            discarded_segments: 0,
            discarded_events: 0,
        })
    }

    /// Retained segments, in closing order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// B-steps, in chronological order
    pub fn b_steps(&self) -> &[BStep] {
        &self.b_steps
    }

    /// Closed segments of a B-step
    pub fn closed_segments<'a>(&'a self, step: &'a BStep) -> impl Iterator<Item = &'a Segment> {
        step.closed_segments.iter().map(|&idx| &self.segments[idx])
    }

    /// Candidate continuations of a B-step
    pub fn compat_segments<'a>(&'a self, step: &'a BStep) -> impl Iterator<Item = &'a Segment> {
        step.compat_segments.iter().map(|&idx| &self.segments[idx])
    }

    /// Segments dropped by the noise filter
    pub fn discarded_segments(&self) -> usize {
        self.discarded_segments
    }

    /// Events that ended up in dropped segments
    pub fn discarded_events(&self) -> usize {
        self.discarded_events
    }

    /// Events held by retained segments
    pub fn retained_events(&self) -> usize {
        self.segments.iter().map(Segment::len).sum()
    }

    /// Events seen by the run, retained or not
    pub fn event_count(&self) -> usize {
        self.retained_events() + self.discarded_events
    }

    /// Aggregate statistics over the retained segments
    pub fn stats(&self) -> SegmentStats {
        SegmentStats::from_segmented(self)
    }
}

/// Stable handle into the segment arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SegmentHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Open,
    /// Closed and kept; value is the index in the result list
    Retained(usize),
    Discarded,
}

#[derive(Debug)]
struct Slot {
    events: Vec<SensorEvent>,
    last: SensorId,
    state: SlotState,
}

#[derive(Debug)]
struct PendingBStep {
    position: usize,
    closed: Vec<SegmentHandle>,
    compat: Vec<SegmentHandle>,
}

/// Mutable state of a single pass; owned exclusively by [`Segmenter::run`]
#[derive(Debug, Default)]
struct RunState {
    arena: Vec<Slot>,
    open: Vec<SegmentHandle>,
    retained: Vec<SegmentHandle>,
    b_steps: Vec<PendingBStep>,
    discarded_segments: usize,
    discarded_events: usize,
}

impl RunState {
    fn open_segment(&mut self, event: SensorEvent, id: SensorId) -> SegmentHandle {
        let handle = SegmentHandle(self.arena.len());
        self.arena.push(Slot {
            events: vec![event],
            last: id,
            state: SlotState::Open,
        });
        self.open.push(handle);
        handle
    }

    fn append(&mut self, handle: SegmentHandle, event: SensorEvent, id: SensorId) {
        let slot = &mut self.arena[handle.0];
        slot.events.push(event);
        slot.last = id;
    }

    /// Closing rule: retain the segment only if it reaches `noise_threshold`
    fn close(&mut self, handle: SegmentHandle, noise_threshold: usize) -> bool {
        let slot = &mut self.arena[handle.0];
        if slot.events.len() >= noise_threshold {
            slot.state = SlotState::Retained(self.retained.len());
            self.retained.push(handle);
            true
        } else {
            slot.state = SlotState::Discarded;
            self.discarded_segments += 1;
            self.discarded_events += slot.events.len();
            false
        }
    }

    fn result_index(&self, handle: SegmentHandle) -> Option<usize> {
        match self.arena[handle.0].state {
            SlotState::Retained(idx) => Some(idx),
            SlotState::Open | SlotState::Discarded => None,
        }
    }

    fn finish(mut self) -> SegmentedLog {
        let b_steps = self
            .b_steps
            .iter()
            .map(|pending| BStep {
                position: pending.position,
                closed_segments: pending
                    .closed
                    .iter()
                    .filter_map(|&h| self.result_index(h))
                    .collect(),
                compat_segments: pending
                    .compat
                    .iter()
                    .filter_map(|&h| self.result_index(h))
                    .collect(),
            })
            .collect();

        let segments = self
            .retained
            .iter()
            .map(|&h| Segment {
                events: std::mem::take(&mut self.arena[h.0].events),
            })
            .collect();

        SegmentedLog {
            segments,
            b_steps,
            discarded_segments: self.discarded_segments,
            discarded_events: self.discarded_events,
        }
    }
}

/// Segmentation engine bound to one transition model and threshold pair
#[derive(Debug, Clone, Copy)]
pub struct Segmenter<'m> {
    model: &'m TransitionModel,
    compat_threshold: f64,
    noise_threshold: usize,
}

impl<'m> Segmenter<'m> {
    /// Create a segmenter; thresholds are validated up front
    pub fn new(
        model: &'m TransitionModel,
        compat_threshold: f64,
        noise_threshold: usize,
    ) -> Result<Self, SegmentError> {
        validate_compat_threshold(compat_threshold)?;
        validate_noise_threshold(noise_threshold)?;
        Ok(Self {
            model,
            compat_threshold,
            noise_threshold,
        })
    }

    pub fn compat_threshold(&self) -> f64 {
        self.compat_threshold
    }

    pub fn noise_threshold(&self) -> usize {
        self.noise_threshold
    }

    fn compatible(&self, from: SensorId, to: SensorId) -> bool {
        self.model.probability_by_id(from, to) >= self.compat_threshold
    }

    /// Segment an ordered event stream in a single pass.
    ///
    /// Fails with [`SegmentError::UnknownSensor`] as soon as an event carries a
    /// sensor id the model has never seen.
    pub fn run<I>(&self, events: I) -> Result<SegmentedLog, SegmentError>
    where
        I: IntoIterator<Item = SensorEvent>,
    {
        let mut state = RunState::default();
        let mut compatible: Vec<SegmentHandle> = Vec::new();

        for event in events {
            let id = self.model.resolve(event.sensor_id())?;

            compatible.clear();
            compatible.extend(
                state
                    .open
                    .iter()
                    .copied()
                    .filter(|h| self.compatible(state.arena[h.0].last, id)),
            );

            match compatible.as_slice() {
                [single] => state.append(*single, event, id),
                [] => {
                    let position = event.index;
                    let handle = state.open_segment(event, id);
                    self.register_continuation(&mut state, handle, id, position);
                }
                _ => {
                    let position = event.index;
                    state.open.retain(|h| !compatible.contains(h));

                    let closed: Vec<SegmentHandle> = compatible
                        .iter()
                        .copied()
                        .filter(|&h| state.close(h, self.noise_threshold))
                        .collect();

                    if !closed.is_empty() {
                        tracing::trace!(
                            position,
                            closed = closed.len(),
                            candidates = compatible.len(),
                            "b-step"
                        );
                        state.b_steps.push(PendingBStep {
                            position,
                            closed,
                            compat: Vec::new(),
                        });
                    }

                    state.open_segment(event, id);
                }
            }
        }

        // end of stream: flush without branching semantics
        for handle in std::mem::take(&mut state.open) {
            state.close(handle, self.noise_threshold);
        }

        let result = state.finish();
        tracing::debug!(
            segments = result.segments.len(),
            b_steps = result.b_steps.len(),
            discarded = result.discarded_segments,
            compat_threshold = self.compat_threshold,
            noise_threshold = self.noise_threshold,
            "segmented sensor log"
        );
        Ok(result)
    }

    /// Attach a freshly opened segment to the most recent B-step if it could
    /// continue one of that step's closed segments.
    fn register_continuation(
        &self,
        state: &mut RunState,
        handle: SegmentHandle,
        id: SensorId,
        position: usize,
    ) {
        let Some(step) = state.b_steps.last() else {
            return;
        };
        let continues = step
            .closed
            .iter()
            .any(|closed| self.compatible(state.arena[closed.0].last, id));

        if continues {
            tracing::trace!(position, b_step = step.position, "compat segment");
            if let Some(step) = state.b_steps.last_mut() {
                step.compat.push(handle);
            }
        }
    }
}

//! Per-event batch reconstruction.
//!
//! Runs one algorithm over every channel of an event, skipping dropped
//! channels and discarding "no hit" results. Output order follows input
//! order, both sequentially and in parallel.

use crate::hf_time_check::HfSimpleTimeCheck;
use crate::method0::SimpleHbheAlgo;
use calreco_core::{
    CalibrationProvider, ChannelCalibration, ChannelId, ChannelWaveform, Error, HbheRecHit,
    HfPreHit, HfRecHit, RecHit, Result, RunContext,
};
use rayon::prelude::*;

/// Per-channel input to a reconstruction algorithm.
pub trait ChannelInput: Sync {
    /// Channel the input belongs to.
    fn channel_id(&self) -> ChannelId;

    /// True if the channel must be skipped.
    fn is_dropped(&self) -> bool {
        false
    }
}

impl ChannelInput for ChannelWaveform {
    fn channel_id(&self) -> ChannelId {
        self.id()
    }

    fn is_dropped(&self) -> bool {
        ChannelWaveform::is_dropped(self)
    }
}

impl ChannelInput for HfPreHit {
    fn channel_id(&self) -> ChannelId {
        self.id
    }
}

/// Channel-level reconstruction contract shared by all algorithm variants.
pub trait ReconstructionAlgorithm: Sync {
    /// Per-channel input.
    type Input: ChannelInput;
    /// Reconstructed hit.
    type Output: RecHit;

    /// Reconstructs one channel. A null-id output means "no hit".
    fn reconstruct_channel(
        &self,
        input: &Self::Input,
        calib: &ChannelCalibration,
        run: &RunContext,
    ) -> Self::Output;
}

impl ReconstructionAlgorithm for SimpleHbheAlgo {
    type Input = ChannelWaveform;
    type Output = HbheRecHit;

    fn reconstruct_channel(
        &self,
        input: &ChannelWaveform,
        calib: &ChannelCalibration,
        run: &RunContext,
    ) -> HbheRecHit {
        self.reconstruct(input, calib, run)
    }
}

impl ReconstructionAlgorithm for HfSimpleTimeCheck {
    type Input = HfPreHit;
    type Output = HfRecHit;

    fn reconstruct_channel(
        &self,
        input: &HfPreHit,
        _calib: &ChannelCalibration,
        _run: &RunContext,
    ) -> HfRecHit {
        self.reconstruct(input)
    }
}

/// Channel counts for one batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStatistics {
    /// Channels offered to the reconstructor.
    pub inputs: usize,
    /// Channels skipped because they were tagged dropped.
    pub dropped: usize,
    /// Channels whose result carried a null id.
    pub rejected: usize,
    /// Hits written to the output.
    pub produced: usize,
}

impl BatchStatistics {
    /// Adds the counts of `other`.
    pub fn merge(&mut self, other: &Self) {
        self.inputs += other.inputs;
        self.dropped += other.dropped;
        self.rejected += other.rejected;
        self.produced += other.produced;
    }
}

/// Hits of one batch with their statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchOutput<H> {
    /// Valid hits, in input order.
    pub hits: Vec<H>,
    /// Channel counts.
    pub stats: BatchStatistics,
}

enum Outcome<H> {
    Dropped,
    Rejected,
    Produced(H),
}

/// Applies an algorithm to every channel of an event.
pub struct BatchReconstructor<'a, A, C: ?Sized> {
    algorithm: &'a A,
    calibrations: &'a C,
}

impl<'a, A, C> BatchReconstructor<'a, A, C>
where
    A: ReconstructionAlgorithm,
    C: CalibrationProvider + ?Sized,
{
    /// Creates a reconstructor for one run.
    pub fn new(algorithm: &'a A, calibrations: &'a C) -> Self {
        Self {
            algorithm,
            calibrations,
        }
    }

    fn outcome(&self, input: &A::Input, run: &RunContext) -> Outcome<A::Output> {
        if input.is_dropped() {
            return Outcome::Dropped;
        }
        let calib = self.calibrations.calibration(input.channel_id());
        let hit = self.algorithm.reconstruct_channel(input, &calib, run);
        if hit.is_valid() {
            Outcome::Produced(hit)
        } else {
            Outcome::Rejected
        }
    }

    fn assemble(
        outcomes: impl Iterator<Item = Outcome<A::Output>>,
        inputs: usize,
    ) -> BatchOutput<A::Output> {
        let mut hits = Vec::with_capacity(inputs);
        let mut stats = BatchStatistics {
            inputs,
            ..BatchStatistics::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Dropped => stats.dropped += 1,
                Outcome::Rejected => stats.rejected += 1,
                Outcome::Produced(hit) => hits.push(hit),
            }
        }
        stats.produced = hits.len();
        BatchOutput { hits, stats }
    }

    /// Reconstructs every channel sequentially.
    pub fn reconstruct_all(
        &self,
        inputs: &[A::Input],
        run: &RunContext,
    ) -> BatchOutput<A::Output> {
        Self::assemble(
            inputs.iter().map(|input| self.outcome(input, run)),
            inputs.len(),
        )
    }

    /// Reconstructs every channel in parallel. The output equals that of
    /// [`Self::reconstruct_all`].
    pub fn reconstruct_all_parallel(
        &self,
        inputs: &[A::Input],
        run: &RunContext,
    ) -> BatchOutput<A::Output> {
        let outcomes: Vec<_> = inputs
            .par_iter()
            .map(|input| self.outcome(input, run))
            .collect();
        Self::assemble(outcomes.into_iter(), inputs.len())
    }

    /// Reconstructs an event whose input collection may be absent.
    ///
    /// # Errors
    /// Returns [`Error::MissingInput`] when `inputs` is `None`.
    pub fn reconstruct_event(
        &self,
        inputs: Option<&[A::Input]>,
        run: &RunContext,
        parallel: bool,
    ) -> Result<BatchOutput<A::Output>> {
        let inputs = inputs.ok_or_else(|| {
            Error::MissingInput(format!(
                "{} channel collection",
                std::any::type_name::<A::Input>()
                    .rsplit("::")
                    .next()
                    .unwrap_or("input")
            ))
        })?;
        let output = if parallel {
            self.reconstruct_all_parallel(inputs, run)
        } else {
            self.reconstruct_all(inputs, run)
        };
        log::trace!("batch statistics: {:?}", output.stats);
        Ok(output)
    }
}

use super::parser::{DelaySpec, FaultProfile};
use super::FaultDimension;
use http::StatusCode;
use log::info;
use rand::rngs::ThreadRng;
use rand::Rng;
use std::time::Duration;

/// Source of the uniform draws behind every fault decision.
pub trait DrawSource {
    /// Uniform integer in `[0, 100)`.
    fn percent(&mut self) -> u8;

    /// Uniform integer in `[0, bound)`. `bound` is never zero.
    fn below(&mut self, bound: u64) -> u64;
}

/// Draws backed by any `rand` generator.
pub struct RandomDraws<R>(pub R);

impl RandomDraws<ThreadRng> {
    pub fn thread_local() -> Self {
        Self(rand::thread_rng())
    }
}

impl<R: Rng> DrawSource for RandomDraws<R> {
    fn percent(&mut self) -> u8 {
        self.0.gen_range(0..100)
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.0.gen_range(0..bound)
    }
}

/// Concrete outcome of one request's fault draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedProfile {
    pub status: StatusCode,
    pub connect_delay: Duration,
    pub inter_byte_delay: Duration,
    pub reset: bool,
    /// False when the request named no fault at all.
    pub faulted: bool,
}

/// Decides, dimension by dimension, whether the faulty variant applies.
///
/// A draw `d` uniform over `[0, 100)` fires when `d <= probability`. So 100
/// always fires, and 0 still fires on `d == 0`.
pub struct ProbabilisticGate<D> {
    draws: D,
}

impl<D: DrawSource> ProbabilisticGate<D> {
    pub fn new(draws: D) -> Self {
        Self { draws }
    }

    pub fn fires(&mut self, dimension: FaultDimension, probability: u8) -> bool {
        let draw = self.draws.percent();
        let fired = draw <= probability;
        info!(
            "Fault gate - Dimension: {}, Draw: {}, Threshold: {}, Fired: {}",
            dimension, draw, probability, fired
        );
        fired
    }

    /// `base`, plus `uniform(0, span)` when the jitter draw fires.
    pub fn delay(&mut self, dimension: FaultDimension, spec: &DelaySpec) -> Duration {
        let base = Duration::from_millis(spec.base_ms);
        if !spec.has_jitter() || !self.fires(dimension, spec.probability) {
            return base;
        }
        base + Duration::from_millis(self.draws.below(spec.jitter_span_ms))
    }

    pub fn resolve(&mut self, profile: &FaultProfile) -> ResolvedProfile {
        let code = match profile.status_fault {
            Some(code) if self.fires(FaultDimension::Status, profile.status_fault_probability) => {
                code
            }
            _ => profile.target_status,
        };

        let connect_delay = self.delay(FaultDimension::ConnectDelay, &profile.connect_delay);
        let inter_byte_delay = self.delay(FaultDimension::InterByteDelay, &profile.inter_byte_delay);

        let reset = profile.reset_requested
            && self.fires(FaultDimension::Reset, profile.reset_probability);

        ResolvedProfile {
            status: StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            connect_delay,
            inter_byte_delay,
            reset,
            faulted: profile.supplied,
        }
    }
}

/// Resolve `profile` with fresh thread-local randomness.
pub fn resolve(profile: &FaultProfile) -> ResolvedProfile {
    ProbabilisticGate::new(RandomDraws::thread_local()).resolve(profile)
}

use crate::core::event::{Event, EventKind, Histories, History};
use crate::core::mfp::{Direction, MfpTable};
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp1};
use rayon::prelude::*;

/// Generator-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Maximum number of transitions a single particle may take within one
    /// call. `None` leaves the walk unbounded.
    pub max_steps: Option<u64>,
}

/// Starting charge for a fresh run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialCharge {
    /// Same charge for every particle.
    Uniform(i32),
    /// One charge per particle; length must equal the population.
    PerParticle(Vec<i32>),
}

impl InitialCharge {
    fn resolve(&self, population: usize) -> Result<Vec<i32>> {
        match self {
            InitialCharge::Uniform(q) => Ok(vec![*q; population]),
            InitialCharge::PerParticle(qs) if qs.len() == population => Ok(qs.clone()),
            InitialCharge::PerParticle(qs) => Err(Error::config(format!(
                "{} initial charges given for a population of {}",
                qs.len(),
                population
            ))),
        }
    }
}

impl From<i32> for InitialCharge {
    fn from(q: i32) -> Self {
        InitialCharge::Uniform(q)
    }
}

impl From<Vec<i32>> for InitialCharge {
    fn from(qs: Vec<i32>) -> Self {
        InitialCharge::PerParticle(qs)
    }
}

/// Where a particle's next segment begins.
#[derive(Debug, Clone, Copy)]
struct SegmentStart {
    charge: i32,
    length: f64,
    fresh: bool,
}

/// Outcome of one pair of draws.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Stop,
    Move(Direction, f64),
}

/// Pick the next step from the upward draw `lp` and downward draw `lm`.
///
/// Stops when both candidates land beyond `stop_at`. Otherwise the shorter
/// draw wins; `lp > lm` is strict, so equal draws go upward.
#[inline]
fn choose_step(current: f64, lp: f64, lm: f64, stop_at: f64) -> Step {
    if current + lp > stop_at && current + lm > stop_at {
        Step::Stop
    } else if lp > lm {
        Step::Move(Direction::Down, lm)
    } else {
        Step::Move(Direction::Up, lp)
    }
}

/// Exponential distance with mean `mfp`. Always consumes one draw.
#[inline]
fn draw_distance<R: Rng + ?Sized>(rng: &mut R, mfp: f64) -> f64 {
    let unit: f64 = Exp1.sample(rng);
    if mfp.is_infinite() {
        f64::INFINITY
    } else {
        unit * mfp
    }
}

fn check_target_length(target_length: f64) -> Result<()> {
    if !target_length.is_finite() || target_length < 0.0 {
        return Err(Error::InvalidParam(format!(
            "target_length must be finite and >= 0, got {target_length}"
        )));
    }
    Ok(())
}

fn resume_starts(histories: &Histories) -> Result<Vec<SegmentStart>> {
    histories
        .iter()
        .enumerate()
        .map(|(n, history)| {
            history
                .last()
                .map(|e| SegmentStart {
                    charge: e.charge,
                    length: e.length,
                    fresh: false,
                })
                .ok_or_else(|| Error::config(format!("history {n} is empty; nothing to resume")))
        })
        .collect()
}

fn append_segments(histories: &mut Histories, segments: Vec<History>) {
    for (history, segment) in histories.iter_mut().zip(segments) {
        history.extend(segment);
    }
}

/// Monte Carlo charge-state history generator.
///
/// Each particle performs a nearest-neighbour walk over charge states. From
/// charge `q` two exponential distances are drawn, upward then downward, with
/// means equal to the MFPs of `q->q+1` and `q->q-1`. The shorter one fires
/// unless both overshoot the stopping length, in which case the segment ends
/// with a `post` event pinned exactly at the stopping length.
#[derive(Debug, Clone)]
pub struct ChargeHistoryGenerator {
    table: MfpTable,
    config: GeneratorConfig,
}

impl ChargeHistoryGenerator {
    /// Create a generator with the default (unbounded) configuration.
    pub fn new(table: MfpTable) -> Self {
        Self {
            table,
            config: GeneratorConfig::default(),
        }
    }

    /// Create a generator with explicit settings.
    ///
    /// Errors: `Error::InvalidParam` if `max_steps` is `Some(0)`.
    pub fn with_config(table: MfpTable, config: GeneratorConfig) -> Result<Self> {
        if config.max_steps == Some(0) {
            return Err(Error::InvalidParam("max_steps must be > 0".into()));
        }
        Ok(Self { table, config })
    }

    pub fn table(&self) -> &MfpTable {
        &self.table
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Simulate `population` particles for `target_length` more distance.
    ///
    /// Without `existing`, every particle starts at length 0 from `initial`.
    /// With `existing`, each particle resumes from its last recorded event,
    /// `initial` is ignored, and the same collection is returned with one new
    /// segment appended per particle. With `ignore_extension`, each segment is
    /// collapsed to its `pre` event plus an `ignored` event carrying the final
    /// charge at the prior length.
    ///
    /// Draws are taken from `rng` particle by particle, two per step.
    ///
    /// `existing` is consumed: on error it is dropped together with everything
    /// it held. Use [`extend`](Self::extend) to keep histories intact when a
    /// resume fails.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        initial: &InitialCharge,
        target_length: f64,
        population: usize,
        rng: &mut R,
        existing: Option<Histories>,
        ignore_extension: bool,
    ) -> Result<Histories> {
        check_target_length(target_length)?;
        let starts = self.starts_for(initial, population, existing.as_ref())?;
        let segments = starts
            .iter()
            .enumerate()
            .map(|(n, &start)| {
                self.simulate_segment(n, start, target_length, ignore_extension, &mut *rng)
            })
            .collect::<Result<Vec<_>>>()?;
        self.log_summary(&segments, ignore_extension);
        Ok(attach(existing, segments))
    }

    /// Resume every history in place by `target_length`.
    ///
    /// On error `histories` is left untouched.
    pub fn extend<R: Rng + ?Sized>(
        &self,
        histories: &mut Histories,
        target_length: f64,
        rng: &mut R,
        ignore_extension: bool,
    ) -> Result<()> {
        check_target_length(target_length)?;
        if histories.is_empty() {
            return Err(Error::InvalidParam("population must be > 0".into()));
        }
        let starts = resume_starts(histories)?;
        let segments = starts
            .iter()
            .enumerate()
            .map(|(n, &start)| {
                self.simulate_segment(n, start, target_length, ignore_extension, &mut *rng)
            })
            .collect::<Result<Vec<_>>>()?;
        self.log_summary(&segments, ignore_extension);
        append_segments(histories, segments);
        Ok(())
    }

    /// Same contract as [`generate`](Self::generate), with particles spread
    /// over the rayon pool.
    ///
    /// Particle `n` draws from `StdRng::seed_from_u64(seed.wrapping_add(n))`,
    /// so results depend on `seed` only, not on the number of threads.
    pub fn generate_parallel(
        &self,
        initial: &InitialCharge,
        target_length: f64,
        population: usize,
        seed: u64,
        existing: Option<Histories>,
        ignore_extension: bool,
    ) -> Result<Histories> {
        check_target_length(target_length)?;
        let starts = self.starts_for(initial, population, existing.as_ref())?;
        let segments = starts
            .par_iter()
            .enumerate()
            .map(|(n, &start)| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(n as u64));
                self.simulate_segment(n, start, target_length, ignore_extension, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;
        self.log_summary(&segments, ignore_extension);
        Ok(attach(existing, segments))
    }

    fn starts_for(
        &self,
        initial: &InitialCharge,
        population: usize,
        existing: Option<&Histories>,
    ) -> Result<Vec<SegmentStart>> {
        if population == 0 {
            return Err(Error::InvalidParam("population must be > 0".into()));
        }
        match existing {
            Some(histories) if histories.len() != population => Err(Error::config(format!(
                "existing histories hold {} particles, expected {}",
                histories.len(),
                population
            ))),
            Some(histories) => resume_starts(histories),
            None => Ok(initial
                .resolve(population)?
                .into_iter()
                .map(|charge| SegmentStart {
                    charge,
                    length: 0.0,
                    fresh: true,
                })
                .collect()),
        }
    }

    /// Run one particle from `start` until `start.length + target_length`.
    fn simulate_segment<R: Rng + ?Sized>(
        &self,
        particle: usize,
        start: SegmentStart,
        target_length: f64,
        ignore_extension: bool,
        rng: &mut R,
    ) -> Result<History> {
        let stop_at = start.length + target_length;
        let mut pre = Event::at(start.charge, start.length, EventKind::Pre);
        if start.fresh {
            pre = pre.with_zp(self.table.reference_charge());
        }
        let mut segment = vec![pre];
        let mut q = start.charge;
        let mut current = start.length;
        let mut steps: u64 = 0;

        loop {
            let mfp_up = self.table.mean_free_path(q, Direction::Up)?;
            let mfp_down = self.table.mean_free_path(q, Direction::Down)?;
            let lp = draw_distance(rng, mfp_up);
            let lm = draw_distance(rng, mfp_down);

            match choose_step(current, lp, lm, stop_at) {
                Step::Stop => {
                    segment.push(Event::at(q, stop_at, EventKind::Post));
                    break;
                }
                Step::Move(direction, distance) => {
                    steps += 1;
                    if let Some(cap) = self.config.max_steps {
                        if steps > cap {
                            return Err(Error::SimulationDiverged {
                                particle,
                                steps: cap,
                            });
                        }
                    }
                    current += distance;
                    q += direction.step();
                    let kind = match direction {
                        Direction::Up => EventKind::Plus,
                        Direction::Down => EventKind::Minus,
                    };
                    segment.push(Event::at(q, current, kind));
                }
            }
        }

        log::trace!(
            "particle {particle}: {steps} transitions, final charge {q} at {stop_at}"
        );

        if ignore_extension {
            if let Some(mut last) = segment.last().copied() {
                last.length = start.length;
                last.kind = EventKind::Ignored;
                segment.truncate(1);
                segment.push(last);
            }
        }
        Ok(segment)
    }

    fn log_summary(&self, segments: &[History], ignore_extension: bool) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        let transitions: usize = segments
            .iter()
            .map(|s| s.iter().filter(|e| e.kind.charge_delta() != 0).count())
            .sum();
        log::debug!(
            "simulated {} particles ({} transitions recorded, ignore_extension={})",
            segments.len(),
            transitions,
            ignore_extension
        );
    }
}

fn attach(existing: Option<Histories>, segments: Vec<History>) -> Histories {
    match existing {
        Some(mut histories) => {
            append_segments(&mut histories, segments);
            histories
        }
        None => segments,
    }
}

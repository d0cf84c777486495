use crate::config::{CleaningConfig, SearchConfig};
use crate::models::{Confidence, ScoredCandidate};
use crate::processing::ocr::{DecodeInput, MrzDecoder};
use crate::processing::variants::{ImageVariant, TransformKind};
use crate::utils::Workspace;
use log::{debug, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoResultReason {
    NotFound,
    EngineFailure(String),
}

/// Result of a single decode attempt on one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Decoded(ScoredCandidate),
    NoResult(NoResultReason),
}

impl DecodeOutcome {
    pub fn score(&self) -> Option<Confidence> {
        match self {
            DecodeOutcome::Decoded(candidate) => Some(candidate.score),
            DecodeOutcome::NoResult(_) => None,
        }
    }
}

/// Highest-scoring candidate seen so far.
///
/// A candidate only replaces the current one when its score is strictly
/// greater, so the held score never decreases.
#[derive(Debug, Default)]
pub struct BestCandidate {
    best: Option<ScoredCandidate>,
}

impl BestCandidate {
    pub fn new() -> Self {
        BestCandidate { best: None }
    }

    /// Returns true when `candidate` became the new best.
    pub fn offer(&mut self, candidate: ScoredCandidate) -> bool {
        match &self.best {
            Some(current) if candidate.score <= current.score => false,
            _ => {
                self.best = Some(candidate);
                true
            }
        }
    }

    pub fn score(&self) -> Option<Confidence> {
        self.best.as_ref().map(|c| c.score)
    }

    pub fn get(&self) -> Option<&ScoredCandidate> {
        self.best.as_ref()
    }

    pub fn into_inner(self) -> Option<ScoredCandidate> {
        self.best
    }
}

/// One decode attempt as recorded in the search trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub transform: TransformKind,
    pub cleaned: bool,
    pub score: Option<Confidence>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A result reached the early-exit score.
    EarlyExit,
    /// Every variant was tried.
    Exhausted,
    /// The configured wall-clock budget ran out.
    TimeBudget,
}

#[derive(Debug)]
pub struct SearchReport {
    pub best: Option<ScoredCandidate>,
    pub attempts: Vec<Attempt>,
    pub stop: StopReason,
    pub elapsed: Duration,
}

struct SearchState {
    best: BestCandidate,
    attempts: Vec<Attempt>,
    started: Instant,
}

impl SearchState {
    fn finish(self, stop: StopReason) -> SearchReport {
        SearchReport {
            best: self.best.into_inner(),
            attempts: self.attempts,
            stop,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Greedy best-first walk over image variants.
///
/// Each variant gets a raw decode and then a decode of its cleaned
/// derivative. The first result at or above the early-exit score ends the
/// search; otherwise the best result over all attempts wins. At most
/// two attempts are made per variant.
pub struct CandidateSearch<'a, D: ?Sized> {
    decoder: &'a D,
    search: &'a SearchConfig,
    cleaning: &'a CleaningConfig,
}

impl<'a, D: MrzDecoder + ?Sized> CandidateSearch<'a, D> {
    pub fn new(decoder: &'a D, search: &'a SearchConfig, cleaning: &'a CleaningConfig) -> Self {
        CandidateSearch {
            decoder,
            search,
            cleaning,
        }
    }

    pub fn run<I>(&self, variants: I, workspace: &mut Workspace) -> SearchReport
    where
        I: IntoIterator<Item = ImageVariant>,
    {
        let threshold = Confidence::new(self.search.early_exit_score);
        let budget = self.search.time_budget();
        let mut state = SearchState {
            best: BestCandidate::new(),
            attempts: Vec::new(),
            started: Instant::now(),
        };

        for variant in variants {
            if self.out_of_time(&state, budget) {
                return state.finish(StopReason::TimeBudget);
            }
            if self.step(&variant, workspace, &mut state, threshold) {
                return state.finish(StopReason::EarlyExit);
            }

            let Some(cleaned) = variant.cleaned_derivative(self.cleaning) else {
                continue;
            };
            if self.out_of_time(&state, budget) {
                return state.finish(StopReason::TimeBudget);
            }
            if self.step(&cleaned, workspace, &mut state, threshold) {
                return state.finish(StopReason::EarlyExit);
            }
        }

        info!(
            "Search exhausted after {} attempts, best score {:?}",
            state.attempts.len(),
            state.best.score().map(Confidence::value)
        );
        state.finish(StopReason::Exhausted)
    }

    /// Decode one image and fold the outcome into the state. Returns true
    /// when the search should stop.
    fn step(
        &self,
        variant: &ImageVariant,
        workspace: &mut Workspace,
        state: &mut SearchState,
        threshold: Confidence,
    ) -> bool {
        let outcome = self.attempt(variant, workspace);
        state.attempts.push(Attempt {
            transform: variant.kind,
            cleaned: variant.cleaned,
            score: outcome.score(),
        });

        match outcome {
            DecodeOutcome::Decoded(candidate) => {
                let score = candidate.score;
                if state.best.offer(candidate) {
                    debug!("New best score {} from {}", score, variant.label());
                } else {
                    debug!("Score {} from {} does not beat the current best", score, variant.label());
                }
                if score >= threshold {
                    info!("Early exit on {} with score {}", variant.label(), score);
                    return true;
                }
            }
            DecodeOutcome::NoResult(NoResultReason::NotFound) => {
                debug!("No MRZ in {}", variant.label());
            }
            DecodeOutcome::NoResult(NoResultReason::EngineFailure(reason)) => {
                warn!("Decode failed on {}: {}", variant.label(), reason);
            }
        }
        false
    }

    fn attempt(&self, variant: &ImageVariant, workspace: &mut Workspace) -> DecodeOutcome {
        let path = match workspace.save_image(&variant.label(), &variant.image) {
            Ok(path) => path,
            Err(e) => return DecodeOutcome::NoResult(NoResultReason::EngineFailure(e.to_string())),
        };
        let input = DecodeInput {
            image: &variant.image,
            path: &path,
            transform: variant.kind,
            cleaned: variant.cleaned,
        };

        // The engine is a black box; a panic inside it only costs this attempt
        match panic::catch_unwind(AssertUnwindSafe(|| self.decoder.decode(&input))) {
            Ok(Ok(Some(candidate))) => DecodeOutcome::Decoded(candidate),
            Ok(Ok(None)) => DecodeOutcome::NoResult(NoResultReason::NotFound),
            Ok(Err(e)) => DecodeOutcome::NoResult(NoResultReason::EngineFailure(e.to_string())),
            Err(_) => DecodeOutcome::NoResult(NoResultReason::EngineFailure(
                "decode engine panicked".to_string(),
            )),
        }
    }

    fn out_of_time(&self, state: &SearchState, budget: Option<Duration>) -> bool {
        match budget {
            Some(limit) if state.started.elapsed() >= limit => {
                warn!(
                    "Search budget of {:?} spent after {} attempts",
                    limit,
                    state.attempts.len()
                );
                true
            }
            _ => false,
        }
    }
}

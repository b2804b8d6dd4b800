#[cfg(test)]
#[path = "tests/resolution.rs"]
mod tests;

use core::cmp::max;

use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ResolutionError {
    /// Not enough peers have answered yet; keep waiting.
    #[error("too few entries to resolve")]
    TooFewEntriesToResolve,

    /// No further answer can produce agreement; the round is over.
    #[error("failed to resolve")]
    FailedToResolve,
}

/// Distinct peers that must agree: `⌈(group_size + 1) / 2⌉`.
#[must_use]
pub const fn quorum(group_size: usize) -> usize {
    group_size.saturating_add(1).div_ceil(2)
}

/// Folds the values submitted by several peers into one canonical value.
pub trait Resolve: Sized {
    fn resolve(values: &[Self], group_size: usize) -> Result<Self, ResolutionError>;
}

/// Majority vote over whole values.
///
/// Succeeds only when the most common value has been seen exactly
/// [`quorum`] times. Once `group_size - 1` values are in without that
/// happening, the round has failed.
pub fn resolve_by_majority<V>(values: &[V], group_size: usize) -> Result<V, ResolutionError>
where
    V: Clone + PartialEq,
{
    let mut best: Option<(&V, usize)> = None;

    for candidate in values {
        let count = values.iter().filter(|value| *value == candidate).count();

        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((candidate, count));
        }
    }

    let Some((value, count)) = best else {
        return Err(ResolutionError::TooFewEntriesToResolve);
    };

    let quorum = quorum(group_size);

    if count == quorum {
        return Ok(value.clone());
    }

    if values.len() >= max(group_size.saturating_sub(1), quorum) {
        return Err(ResolutionError::FailedToResolve);
    }

    Err(ResolutionError::TooFewEntriesToResolve)
}

/// Median of one numeric field across peer submissions.
///
/// Needs at least [`quorum`] samples. With an even number of samples the
/// upper of the two middle values is taken, so the result is always one of
/// the reported values.
pub fn median<T, I>(samples: I, group_size: usize) -> Result<T, ResolutionError>
where
    T: Copy + Ord,
    I: IntoIterator<Item = T>,
{
    let mut samples: Vec<T> = samples.into_iter().collect();

    if samples.is_empty() || samples.len() < quorum(group_size) {
        return Err(ResolutionError::TooFewEntriesToResolve);
    }

    let mid = samples.len().div_euclid(2);
    let (_, median, _) = samples.select_nth_unstable(mid);

    Ok(*median)
}

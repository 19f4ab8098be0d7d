use rayon::prelude::*;

use crate::error::{CatalogError, CatalogResult};

/// Apply `f` to every item with at most `parallelism` calls in flight.
///
/// Results keep the order of `items`. With a parallelism of one the items
/// are processed in order and the first error stops the run; otherwise every
/// item is attempted and the error of the lowest-indexed failure is returned.
pub(crate) fn map_bounded<T, R, F>(items: &[T], parallelism: usize, f: F) -> CatalogResult<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> CatalogResult<R> + Sync,
{
    if parallelism <= 1 || items.len() <= 1 {
        return items.iter().map(f).collect();
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallelism.min(items.len()))
        .build()
        .map_err(|e| CatalogError::Io(std::io::Error::other(e)))?;
    let results: Vec<CatalogResult<R>> = pool.install(|| items.par_iter().map(&f).collect());
    results.into_iter().collect()
}

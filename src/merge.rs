//! Iterative pairwise merging of overlapping CNV calls.
//!
//! The engine works in rounds over an [`IntervalPool`]. In each round every active
//! interval is compared with the active intervals that existed when the round
//! started and have a larger id; the first overlapping partner is merged with it
//! right away. Intervals created during a round only become candidates in the next
//! one. Rounds repeat until one of them produces no merge.

use crate::bed::{interval_from_fields, ParseErr};
use crate::interval::{CnvInterval, Source, SourceMask};
use crate::overlap::{overlaps, DEFAULT_OVERLAP_RATE};
use crate::pool::IntervalPool;
use coitrees::{BasicCOITree, Interval, IntervalTree};
use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::io;
use std::str::FromStr;

/// How each round searches for overlapping partners
#[derive(Default, PartialEq, Eq, Clone, Copy, Debug)]
pub enum ScanStrategy {
    /// Compare every candidate pair in id order
    Linear,
    /// Query per-chromosome interval trees built at the start of each round
    #[default]
    Indexed,
}

impl FromStr for ScanStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(ScanStrategy::Linear),
            "indexed" => Ok(ScanStrategy::Indexed),
            _ => Err(format!(
                "Unknown scan strategy '{}', expected 'linear' or 'indexed'",
                s
            )),
        }
    }
}

/// Parameters of a merge run
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    /// Minimum shared fraction of either interval's length, in (0, 1]
    pub threshold: f64,
    /// Mask assigned to raw calls of each source, indexed by [`Source::index`]
    pub source_masks: [SourceMask; 3],
    pub strategy: ScanStrategy,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_OVERLAP_RATE,
            source_masks: [SourceMask::PROBAND, SourceMask::FATHER, SourceMask::MOTHER],
            strategy: ScanStrategy::default(),
        }
    }
}

impl MergeConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_strategy(mut self, strategy: ScanStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn mask_for(&self, source: Source) -> SourceMask {
        self.source_masks[source.index()]
    }

    pub fn validate(&self) -> io::Result<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Overlap rate must be in (0, 1], got {}",
                    self.threshold
                ),
            ));
        }

        let mut seen = SourceMask::default();
        for source in Source::ALL {
            let mask = self.mask_for(source);
            if mask.bits() == 0 || !SourceMask::ALL.contains(mask) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Invalid source mask {:#b} for {}", mask.bits(), source),
                ));
            }
            if seen.intersects(mask) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Source mask {} for {} overlaps another source", mask, source),
                ));
            }
            seen |= mask;
        }
        Ok(())
    }
}

/// Summary of a merge run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Rounds scanned, including the final unproductive one
    pub rounds: usize,
    pub merges: usize,
    pub raw_count: usize,
    pub active_count: usize,
}

pub struct MergeEngine {
    config: MergeConfig,
}

type ChromTrees = FxHashMap<String, BasicCOITree<usize, u32>>;

impl MergeEngine {
    pub fn new(config: MergeConfig) -> io::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge the pool to a fixpoint, where no two active intervals overlap
    pub fn run(&self, pool: &mut IntervalPool) -> MergeStats {
        let mut stats = MergeStats {
            raw_count: pool.len(),
            ..Default::default()
        };

        // Intervals below `scanned` were already compared with each other in an
        // earlier round, so only pairs involving newer ids need a look.
        let mut scanned = 0;
        loop {
            let boundary = pool.len();
            stats.rounds += 1;
            debug!(
                "Round {}: candidates {}..{} ({} active)",
                stats.rounds,
                scanned,
                boundary,
                pool.active_count()
            );

            let merges = match self.config.strategy {
                ScanStrategy::Linear => self.linear_round(pool, scanned, boundary),
                ScanStrategy::Indexed => self.indexed_round(pool, scanned, boundary),
            };
            stats.merges += merges;
            scanned = boundary;

            if merges == 0 {
                break;
            }
            debug!("Round {} merged {} pairs", stats.rounds, merges);
        }

        stats.active_count = pool.active_count();
        info!(
            "Merged {} raw intervals into {} active intervals ({} merges in {} rounds)",
            stats.raw_count, stats.active_count, stats.merges, stats.rounds
        );
        stats
    }

    fn linear_round(&self, pool: &mut IntervalPool, scanned: usize, boundary: usize) -> usize {
        let mut merges = 0;
        for i in 0..boundary {
            let partner = {
                let intervals = pool.as_slice();
                let a = &intervals[i];
                if a.is_retired() {
                    continue;
                }
                ((i + 1).max(scanned)..boundary).find(|&j| {
                    let b = &intervals[j];
                    !b.is_retired() && overlaps(a, b, self.config.threshold)
                })
            };

            if let Some(j) = partner {
                merge_pair(pool, i, j);
                merges += 1;
            }
        }
        merges
    }

    fn indexed_round(&self, pool: &mut IntervalPool, scanned: usize, boundary: usize) -> usize {
        let trees = build_trees(&pool.as_slice()[scanned..boundary]);
        let mut merges = 0;
        let mut hits = Vec::new();

        for i in 0..boundary {
            let partner = {
                let intervals = pool.as_slice();
                let a = &intervals[i];
                if a.is_retired() || a.is_empty() {
                    continue;
                }
                let Some(tree) = trees.get(a.chromosome()) else {
                    continue;
                };

                hits.clear();
                tree.query(a.start(), a.end() - 1, |node| {
                    let id: usize = node.metadata.clone();
                    if id > i {
                        hits.push(id);
                    }
                });
                hits.sort_unstable();
                hits.iter().copied().find(|&j| {
                    let b = &intervals[j];
                    !b.is_retired() && overlaps(a, b, self.config.threshold)
                })
            };

            if let Some(j) = partner {
                merge_pair(pool, i, j);
                merges += 1;
            }
        }
        merges
    }
}

/// Build one tree per chromosome over the active, non-empty candidates.
/// Tree intervals are end-inclusive, so `[start, end)` is stored as `start..=end-1`.
fn build_trees(candidates: &[CnvInterval]) -> ChromTrees {
    let mut by_chrom: FxHashMap<String, Vec<Interval<usize>>> = FxHashMap::default();
    for interval in candidates {
        if interval.is_retired() || interval.is_empty() {
            continue;
        }
        by_chrom
            .entry(interval.chromosome().to_string())
            .or_default()
            .push(Interval::new(interval.start(), interval.end() - 1, interval.id()));
    }

    by_chrom
        .into_par_iter()
        .map(|(chrom, nodes)| (chrom, BasicCOITree::new(nodes.as_slice())))
        .collect()
}

/// Replace `a` and `b` with the interval covering both
fn merge_pair(pool: &mut IntervalPool, a: usize, b: usize) -> usize {
    let merged = {
        let intervals = pool.as_slice();
        CnvInterval::merged(&intervals[a], &intervals[b])
    };
    let id = pool.append(merged);
    pool.retire_into(a, id);
    pool.retire_into(b, id);
    id
}

/// Tag the rows of each source with its mask, in proband, father, mother order,
/// and merge them to a fixpoint.
pub fn merge_trio<R: AsRef<str>>(
    config: &MergeConfig,
    proband: &[Vec<R>],
    father: &[Vec<R>],
    mother: &[Vec<R>],
) -> io::Result<(IntervalPool, MergeStats)> {
    let engine = MergeEngine::new(config.clone())?;

    let mut pool = IntervalPool::with_capacity(2 * (proband.len() + father.len() + mother.len()));
    for (source, rows) in Source::ALL.into_iter().zip([proband, father, mother]) {
        let mask = config.mask_for(source);
        for row in rows {
            let fields: Vec<&str> = row.iter().map(AsRef::as_ref).collect();
            let interval = interval_from_fields(&fields, mask).map_err(|e: ParseErr| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid {} row '{}': {}", source, fields.join("\t"), e),
                )
            })?;
            pool.append(interval);
        }
    }

    let stats = engine.run(&mut pool);
    Ok((pool, stats))
}

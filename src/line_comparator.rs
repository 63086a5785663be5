use std::cmp::Ordering;

use crate::comparison_cache::ComparisonCache;
use crate::line_record::LineRecord;

/// Orders [LineRecord]s by field first, then by prefix.
///
/// Fields are compared character by character, a field that is a strict prefix of the other
/// sorts first. Equal fields fall back to the prefix: the shorter prefix sorts first and
/// prefixes of equal length are compared character by character. The prefix rule is applied
/// to the text as written, so numeric prefixes of different width do not compare numerically
/// ("-5" < "12" but "3" < "-5").
///
/// Field outcomes are memoized in a [ComparisonCache] shared by every worker of a run.
pub(crate) struct LineComparator {
    cache: ComparisonCache,
}

impl LineComparator {
    pub(crate) fn new(cache_capacity: usize) -> LineComparator {
        LineComparator {
            cache: ComparisonCache::new(cache_capacity),
        }
    }

    pub(crate) fn compare(&self, a: &LineRecord, b: &LineRecord) -> Ordering {
        match self.compare_fields(a.field(), b.field()) {
            Ordering::Equal => Self::compare_prefixes(a, b),
            ordering => ordering,
        }
    }

    fn compare_fields(&self, a: &str, b: &str) -> Ordering {
        let digest = ComparisonCache::digest(a, b);
        if let Some(cached) = self.cache.get(digest) {
            return cached;
        }

        let mut left = a.chars();
        let mut right = b.chars();
        let ordering = loop {
            match (left.next(), right.next()) {
                (Some(l), Some(r)) => {
                    if l != r {
                        break l.cmp(&r);
                    }
                }
                (None, Some(_)) => break Ordering::Less,
                (Some(_), None) => break Ordering::Greater,
                (None, None) => break Ordering::Equal,
            }
        };
        self.cache.insert(digest, ordering);
        ordering
    }

    fn compare_prefixes(a: &LineRecord, b: &LineRecord) -> Ordering {
        a.prefix_len()
            .cmp(&b.prefix_len())
            .then_with(|| a.prefix().chars().cmp(b.prefix().chars()))
    }

    #[cfg(test)]
    pub(crate) fn cached(&self) -> usize {
        self.cache.len()
    }
}

use crate::encoder::EncodedBlob;

/// Replaces the dynamically-typed result maps a looser implementation
/// would reach for (per the Design Notes): a search either found a
/// candidate or it didn't, nothing else.
#[derive(Clone, Debug)]
pub enum SearchOutcome {
    Found(EncodedBlob),
    NotFound,
}

impl SearchOutcome {
    pub fn into_option(self) -> Option<EncodedBlob> {
        match self {
            SearchOutcome::Found(blob) => Some(blob),
            SearchOutcome::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found(_))
    }
}

/// Tracks the two accumulators every tier shares: the largest candidate
/// still at-or-under the target, and the smallest candidate seen overall
/// (which may exceed the target).
#[derive(Default)]
pub struct Accumulators {
    best_under: Option<EncodedBlob>,
    smallest_overall: Option<EncodedBlob>,
}

impl Accumulators {
    pub fn observe(&mut self, blob: EncodedBlob, target: u64) {
        if blob.len() <= target {
            let replace = match &self.best_under {
                Some(existing) => blob.len() > existing.len(),
                None => true,
            };
            if replace {
                self.best_under = Some(blob.clone());
            }
        }
        let replace = match &self.smallest_overall {
            Some(existing) => blob.len() < existing.len(),
            None => true,
        };
        if replace {
            self.smallest_overall = Some(blob);
        }
    }

    pub fn best_under(&self) -> Option<&EncodedBlob> {
        self.best_under.as_ref()
    }

    pub fn smallest_overall(&self) -> Option<&EncodedBlob> {
        self.smallest_overall.as_ref()
    }

    pub fn in_early_stop_band(&self, low: u64, high: u64) -> bool {
        self.best_under
            .as_ref()
            .is_some_and(|b| b.len() >= low && b.len() <= high)
    }

    pub fn into_best_under(self) -> Option<EncodedBlob> {
        self.best_under
    }

    pub fn into_smallest_overall(self) -> Option<EncodedBlob> {
        self.smallest_overall
    }
}

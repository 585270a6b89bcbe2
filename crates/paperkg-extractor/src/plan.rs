//! Batch planning
//!
//! The run is split into up to three batches so the first few results can
//! be inspected before spending quota on the rest.

use crate::corpus::Corpus;
use paperkg_domain::DocumentSource;
use std::fmt;

/// Kind of batch, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    /// The first priority documents
    Trial,

    /// The remaining in-scope priority documents
    Priority,

    /// Out-of-scope priority documents followed by general documents
    General,
}

impl BatchKind {
    /// Name used in logs and the plan listing
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::Trial => "trial",
            BatchKind::Priority => "priority",
            BatchKind::General => "general",
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One batch of documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 1-based position in the plan
    pub index: usize,

    /// Batch kind
    pub kind: BatchKind,

    /// Documents in processing order
    pub documents: Vec<DocumentSource>,
}

/// Ordered, non-empty batches for a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    batches: Vec<Batch>,
}

impl BatchPlan {
    /// Split a corpus into batches
    ///
    /// - trial: `priority[..first_batch_size]`
    /// - priority: `priority[first_batch_size..in_scope_limit]`
    /// - general: `priority[in_scope_limit..]` followed by all general documents
    ///
    /// Empty batches are omitted; indices stay contiguous.
    ///
    /// # Examples
    ///
    /// ```
    /// use paperkg_extractor::corpus::Corpus;
    /// use paperkg_extractor::plan::BatchPlan;
    ///
    /// let plan = BatchPlan::new(&Corpus::default(), 10, 50);
    /// assert!(plan.is_empty());
    /// ```
    pub fn new(corpus: &Corpus, first_batch_size: usize, in_scope_limit: usize) -> Self {
        let priority = &corpus.priority;
        let first_end = first_batch_size.min(priority.len());
        let scope_end = in_scope_limit.max(first_end).min(priority.len());

        let trial = priority[..first_end].to_vec();
        let in_scope = priority[first_end..scope_end].to_vec();
        let mut rest = priority[scope_end..].to_vec();
        rest.extend(corpus.general.iter().cloned());

        let batches = [
            (BatchKind::Trial, trial),
            (BatchKind::Priority, in_scope),
            (BatchKind::General, rest),
        ]
        .into_iter()
        .filter(|(_, docs)| !docs.is_empty())
        .enumerate()
        .map(|(i, (kind, documents))| Batch {
            index: i + 1,
            kind,
            documents,
        })
        .collect();

        Self { batches }
    }

    /// Batches in execution order
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Total number of documents across batches
    pub fn document_count(&self) -> usize {
        self.batches.iter().map(|b| b.documents.len()).sum()
    }

    /// Whether the plan has no batches
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperkg_domain::Category;

    fn sources(prefix: &str, n: usize, category: Category) -> Vec<DocumentSource> {
        (0..n)
            .map(|i| {
                let path = format!("{}/{}{:03}.md", category.as_str(), prefix, i);
                DocumentSource::from_path(path, category).unwrap()
            })
            .collect()
    }

    fn corpus(priority: usize, general: usize) -> Corpus {
        Corpus {
            priority: sources("p", priority, Category::Priority),
            general: sources("g", general, Category::General),
        }
    }

    fn sizes(plan: &BatchPlan) -> Vec<(BatchKind, usize)> {
        plan.batches().iter().map(|b| (b.kind, b.documents.len())).collect()
    }

    #[test]
    fn test_three_batches() {
        let plan = BatchPlan::new(&corpus(60, 5), 10, 50);
        assert_eq!(
            sizes(&plan),
            vec![(BatchKind::Trial, 10), (BatchKind::Priority, 40), (BatchKind::General, 15)]
        );
        assert_eq!(plan.document_count(), 65);

        // Out-of-scope priority documents come before general ones
        let general = &plan.batches()[2];
        assert_eq!(general.documents[0].id, "p050");
        assert_eq!(general.documents[10].id, "g000");
    }

    #[test]
    fn test_small_corpus_only_trial() {
        let plan = BatchPlan::new(&corpus(3, 0), 10, 50);
        assert_eq!(sizes(&plan), vec![(BatchKind::Trial, 3)]);
        assert_eq!(plan.batches()[0].index, 1);
    }

    #[test]
    fn test_empty_batches_skipped_and_reindexed() {
        let plan = BatchPlan::new(&corpus(0, 4), 10, 50);
        assert_eq!(sizes(&plan), vec![(BatchKind::General, 4)]);
        assert_eq!(plan.batches()[0].index, 1);
    }

    #[test]
    fn test_in_scope_equal_to_first_batch() {
        let plan = BatchPlan::new(&corpus(12, 1), 10, 10);
        assert_eq!(sizes(&plan), vec![(BatchKind::Trial, 10), (BatchKind::General, 3)]);
        assert_eq!(plan.batches()[1].index, 2);
    }

    #[test]
    fn test_empty_corpus() {
        let plan = BatchPlan::new(&Corpus::default(), 10, 50);
        assert!(plan.is_empty());
        assert_eq!(plan.document_count(), 0);
    }
}

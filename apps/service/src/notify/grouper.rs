/// How to notify about endpoints that changed state in one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingDecision {
    /// One alert covering every affected endpoint
    Grouped,
    /// One alert per affected endpoint
    Individual,
}

#[derive(Debug, Clone, Copy)]
pub struct OutageGrouper {
    threshold: usize,
}

impl Default for OutageGrouper {
    fn default() -> Self {
        Self { threshold: 2 }
    }
}

impl OutageGrouper {
    pub fn decide<T>(&self, newly_affected: &[T]) -> GroupingDecision {
        if newly_affected.len() >= self.threshold {
            GroupingDecision::Grouped
        } else {
            GroupingDecision::Individual
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping_threshold() {
        let grouper = OutageGrouper::default();
        assert_eq!(grouper.decide::<&str>(&[]), GroupingDecision::Individual);
        assert_eq!(grouper.decide(&["api"]), GroupingDecision::Individual);
        assert_eq!(grouper.decide(&["api", "web"]), GroupingDecision::Grouped);
        assert_eq!(grouper.decide(&["a", "b", "c", "d", "e"]), GroupingDecision::Grouped);
    }
}

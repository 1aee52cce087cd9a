//! Multi-pass execution plan and the single work queue that drives it.

use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanEntry {
    /// Emitted before every pass after the first.
    Separator { pass: u32 },
    Run {
        pass: u32,
        test: usize,
        final_pass: bool,
    },
}

/// `passes` sequential groups, each holding every test in registration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    entries: Vec<PlanEntry>,
}

impl ExecutionPlan {
    pub fn build(test_count: usize, passes: u32) -> Self {
        let mut entries = Vec::with_capacity(test_count * passes as usize + passes as usize);
        for pass in 1..=passes {
            if pass > 1 {
                entries.push(PlanEntry::Separator { pass });
            }
            entries.extend((0..test_count).map(|test| PlanEntry::Run {
                pass,
                test,
                final_pass: pass == passes,
            }));
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Work<T> {
    /// A pending continuation of the active phase.
    Resume(T),
    /// The next plan entry; only handed out once nothing is pending.
    Start(PlanEntry),
}

/// Pending continuations first, then the plan cursor.
#[derive(Debug)]
pub struct WorkQueue<T> {
    plan: ExecutionPlan,
    cursor: usize,
    pending: VecDeque<T>,
}

impl<T> WorkQueue<T> {
    pub fn new(plan: ExecutionPlan) -> Self {
        Self {
            plan,
            cursor: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn push(&mut self, continuation: T) {
        self.pending.push_back(continuation);
    }

    pub fn next(&mut self) -> Option<Work<T>> {
        if let Some(task) = self.pending.pop_front() {
            return Some(Work::Resume(task));
        }
        let entry = self.plan.entries.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(Work::Start(entry))
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.cursor >= self.plan.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pass_is_final() {
        let plan = ExecutionPlan::build(2, 1);
        assert_eq!(
            plan.entries(),
            &[
                PlanEntry::Run {
                    pass: 1,
                    test: 0,
                    final_pass: true
                },
                PlanEntry::Run {
                    pass: 1,
                    test: 1,
                    final_pass: true
                },
            ]
        );
    }

    #[test]
    fn test_only_last_pass_is_final() {
        let plan = ExecutionPlan::build(2, 3);
        assert_eq!(plan.len(), 8);
        let separators: Vec<u32> = plan
            .entries()
            .iter()
            .filter_map(|e| match e {
                PlanEntry::Separator { pass } => Some(*pass),
                _ => None,
            })
            .collect();
        assert_eq!(separators, vec![2, 3]);
        for entry in plan.entries() {
            if let PlanEntry::Run {
                pass, final_pass, ..
            } = entry
            {
                assert_eq!(*final_pass, *pass == 3);
            }
        }
    }

    #[test]
    fn test_empty_suite_still_has_separators() {
        let plan = ExecutionPlan::build(0, 2);
        assert_eq!(plan.entries(), &[PlanEntry::Separator { pass: 2 }]);
    }

    #[test]
    fn test_queue_drains_continuations_before_advancing() {
        let mut queue: WorkQueue<&str> = WorkQueue::new(ExecutionPlan::build(2, 1));
        let first = queue.next();
        assert!(matches!(first, Some(Work::Start(PlanEntry::Run { test: 0, .. }))));
        queue.push("step-1");
        assert_eq!(queue.next(), Some(Work::Resume("step-1")));
        queue.push("step-2");
        assert_eq!(queue.next(), Some(Work::Resume("step-2")));
        assert_eq!(queue.cursor(), 1);
        assert!(matches!(
            queue.next(),
            Some(Work::Start(PlanEntry::Run { test: 1, .. }))
        ));
        assert!(queue.is_drained());
        assert_eq!(queue.next(), None);
    }
}

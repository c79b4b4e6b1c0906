//! Instrumentation shared by the test modules

use std::cell::Cell;
use std::rc::Rc;

/// Counts constructions and drops of [`Tracked`] values
#[derive(Debug, Clone, Default)]
pub struct Census {
    counts: Rc<Counts>,
}

#[derive(Debug, Default)]
struct Counts {
    constructed: Cell<usize>,
    destroyed: Cell<usize>,
}

impl Census {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, label: &'static str) -> Tracked {
        self.counts.constructed.set(self.counts.constructed.get() + 1);
        Tracked {
            census: self.clone(),
            label,
        }
    }

    pub fn constructed(&self) -> usize {
        self.counts.constructed.get()
    }

    pub fn destroyed(&self) -> usize {
        self.counts.destroyed.get()
    }

    pub fn live(&self) -> usize {
        self.constructed() - self.destroyed()
    }
}

#[derive(Debug)]
pub struct Tracked {
    census: Census,
    pub label: &'static str,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        let counts = &self.census.counts;
        counts.destroyed.set(counts.destroyed.get() + 1);
    }
}

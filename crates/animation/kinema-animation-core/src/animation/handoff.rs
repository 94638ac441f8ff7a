//! Continuity with animations started before the engine took over an element.

use std::cell::RefCell;

use hashbrown::HashMap;

/// Supplies the start time of an animation already running for
/// `(appear_id, value_name)`, so the engine can continue it seamlessly.
pub trait HandoffSource {
    /// Start time in engine milliseconds, or `None` when nothing is running.
    fn start_time(&self, appear_id: &str, value_name: &str) -> Option<f64>;

    /// The engine has taken over `value_name`; stop the original animation.
    fn release(&self, _appear_id: &str, _value_name: &str) {}
}

/// Start times recorded up front, released once claimed.
#[derive(Debug, Default)]
pub struct HandoffTable {
    entries: RefCell<HashMap<(String, String), f64>>,
}

impl HandoffTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, appear_id: &str, value_name: &str, start_time: f64) {
        self.entries
            .borrow_mut()
            .insert((appear_id.to_string(), value_name.to_string()), start_time);
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl HandoffSource for HandoffTable {
    fn start_time(&self, appear_id: &str, value_name: &str) -> Option<f64> {
        self.entries
            .borrow()
            .get(&(appear_id.to_string(), value_name.to_string()))
            .copied()
    }

    fn release(&self, appear_id: &str, value_name: &str) {
        self.entries
            .borrow_mut()
            .remove(&(appear_id.to_string(), value_name.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claimed_entries_are_released() {
        let table = HandoffTable::new();
        table.record("hero", "opacity", 120.0);
        assert_eq!(table.start_time("hero", "opacity"), Some(120.0));
        assert_eq!(table.start_time("hero", "x"), None);
        table.release("hero", "opacity");
        assert!(table.is_empty());
    }
}

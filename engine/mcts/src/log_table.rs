//! Natural-log lookup table for the selection hot path.
//!
//! Indexed by visit count. The batcher owns one table and grows it before
//! each round so every visit count reachable during that round is covered;
//! workers only ever read it.

/// Grow-only table of `ln(n)`.
#[derive(Debug, Clone)]
pub struct LogTable {
    values: Vec<f32>,
}

impl Default for LogTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LogTable {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Table covering visit counts `0..=max_visits`.
    pub fn with_capacity(max_visits: u32) -> Self {
        let mut table = Self { values: Vec::new() };
        table.ensure(max_visits);
        table
    }

    /// Extend the table so `max_visits` is covered. Never shrinks.
    pub fn ensure(&mut self, max_visits: u32) {
        let wanted = max_visits as usize + 1;
        if wanted <= self.values.len() {
            return;
        }
        self.values.reserve(wanted - self.values.len());
        for n in self.values.len()..wanted {
            // ln(0) is never read by selection; keep it finite
            let value = if n == 0 { 0.0 } else { (n as f32).ln() };
            self.values.push(value);
        }
    }

    /// `ln(n)`, computed directly when `n` is past the end of the table.
    #[inline]
    pub fn ln(&self, n: u32) -> f32 {
        match self.values.get(n as usize) {
            Some(&v) => v,
            None if n == 0 => 0.0,
            None => (n as f32).ln(),
        }
    }

    /// Number of covered visit counts.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

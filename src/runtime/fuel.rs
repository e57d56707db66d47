//! Fuel for the machine

/// Execution budget. Every executed instruction burns one unit, so a bounded amount of
/// fuel bounds any run, including runaway recursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fuel {
    remaining: u32,
}

impl Fuel {
    pub fn with(units: u32) -> Self {
        Self { remaining: units }
    }

    /// Tops the tank up by `units`, never past `max`. The REPL does this before each run.
    pub fn refill(&mut self, units: u32, max: u32) {
        self.remaining = self.remaining.saturating_add(units).min(max);
    }

    pub fn consume(&mut self, units: u32) {
        self.remaining = self.remaining.saturating_sub(units);
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn should_continue(&self) -> bool {
        self.remaining > 0
    }
}

impl Default for Fuel {
    fn default() -> Self {
        Self::with(1_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::Fuel;
    use assert2::check;

    #[test]
    fn consume_and_refill() {
        let mut fuel = Fuel::with(3);
        fuel.consume(2);
        check!(fuel.remaining() == 1);
        check!(fuel.should_continue());
        fuel.consume(5);
        check!(fuel.remaining() == 0);
        check!(!fuel.should_continue());

        fuel.refill(10, 5);
        check!(fuel.remaining() == 5);
        fuel.refill(u32::MAX, u32::MAX);
        check!(fuel.remaining() == u32::MAX);
    }
}

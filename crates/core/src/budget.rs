//! Size governance for tool outputs.

/// Default number of output bytes a turn may send back to the service.
pub const DEFAULT_OUTPUT_BUDGET: usize = 510 * 1024;

/// Default headroom above the budget, reserved for markers.
pub const DEFAULT_MARKER_RESERVE: usize = 2 * 1024;

/// Appended to an output that was cut to fit the budget.
pub const TRUNCATION_MARKER: &str = " ... [trimmed]";

/// Replaces an output when the budget is already used up.
pub const BUDGET_EXHAUSTED_MARKER: &str = "[Total output size exceeded. \
     Skipping. You can repeat the call separately.]";

/// A tool output after it has been fitted into the budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admitted {
    /// The text to persist and return.
    pub text: String,
    /// Whether the original output was cut or replaced.
    pub truncated: bool,
}

/// A cumulative byte counter for the outputs of one turn.
///
/// Bytes counted are the bytes actually returned, markers included. The
/// counter never exceeds `limit + reserve`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputBudget {
    limit: usize,
    reserve: usize,
    used: usize,
}

impl OutputBudget {
    /// Creates a budget of `limit` bytes with `reserve` bytes of headroom
    /// for markers.
    ///
    /// The reserve is never smaller than [`TRUNCATION_MARKER`].
    #[inline]
    pub fn new(limit: usize, reserve: usize) -> Self {
        Self {
            limit,
            reserve: reserve.max(TRUNCATION_MARKER.len()),
            used: 0,
        }
    }

    /// Returns the configured limit.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the marker headroom.
    #[inline]
    pub fn reserve(&self) -> usize {
        self.reserve
    }

    /// Returns the bytes admitted since the last reset.
    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Returns how many more output bytes fit under the limit.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.used)
    }

    /// Starts counting from zero again.
    #[inline]
    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Fits an output into the remaining budget and counts it.
    ///
    /// - An output that fits is returned unmodified.
    /// - An output that doesn't fit is cut to the remaining bytes, on a
    ///   character boundary, and gets [`TRUNCATION_MARKER`] appended.
    /// - If nothing remains, the output is replaced by
    ///   [`BUDGET_EXHAUSTED_MARKER`], or by an empty string once the
    ///   reserve can't hold that marker either.
    pub fn admit(&mut self, output: String) -> Admitted {
        let remaining = self.remaining();
        if output.len() <= remaining {
            self.used += output.len();
            return Admitted {
                text: output,
                truncated: false,
            };
        }

        if remaining == 0 {
            let ceiling = self.limit + self.reserve;
            let text = if self.used + BUDGET_EXHAUSTED_MARKER.len() <= ceiling
            {
                BUDGET_EXHAUSTED_MARKER.to_owned()
            } else {
                String::new()
            };
            self.used += text.len();
            return Admitted {
                text,
                truncated: true,
            };
        }

        let mut text = output;
        text.truncate(floor_char_boundary(&text, remaining));
        text.push_str(TRUNCATION_MARKER);
        self.used += text.len();
        Admitted {
            text,
            truncated: true,
        }
    }
}

impl Default for OutputBudget {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_BUDGET, DEFAULT_MARKER_RESERVE)
    }
}

/// Returns the largest index not greater than `index` that starts a
/// character, so a partial trailing sequence is dropped.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut index = index;
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_within_budget_is_unmodified() {
        let mut budget = OutputBudget::new(10, DEFAULT_MARKER_RESERVE);
        let admitted = budget.admit("0123456789".to_owned());
        assert_eq!(admitted.text, "0123456789");
        assert!(!admitted.truncated);
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_output_over_budget_is_cut() {
        let mut budget = OutputBudget::new(5, DEFAULT_MARKER_RESERVE);
        let admitted = budget.admit("0123456789".to_owned());
        assert_eq!(admitted.text, format!("01234{TRUNCATION_MARKER}"));
        assert!(admitted.truncated);
        assert_eq!(budget.used(), 5 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_cut_drops_partial_characters() {
        // "é" takes two bytes, the cut falls in the middle of the second.
        let mut budget = OutputBudget::new(4, DEFAULT_MARKER_RESERVE);
        let admitted = budget.admit("aééé".to_owned());
        assert_eq!(admitted.text, format!("aé{TRUNCATION_MARKER}"));
    }

    #[test]
    fn test_exhausted_budget_replaces_output() {
        let mut budget = OutputBudget::new(8, DEFAULT_MARKER_RESERVE);
        budget.admit("12345678".to_owned());

        let admitted = budget.admit("more".to_owned());
        assert_eq!(admitted.text, BUDGET_EXHAUSTED_MARKER);
        assert!(admitted.truncated);

        // Empty outputs still fit.
        let admitted = budget.admit(String::new());
        assert_eq!(admitted.text, "");
        assert!(!admitted.truncated);
    }

    #[test]
    fn test_counter_stays_under_ceiling() {
        let mut budget = OutputBudget::new(100, 200);
        for _ in 0..50 {
            let admitted = budget.admit("x".repeat(30));
            assert!(budget.used() <= budget.limit() + budget.reserve());
            assert!(admitted.text.len() <= BUDGET_EXHAUSTED_MARKER.len());
        }
        // The reserve has been filled by markers, further outputs are
        // dropped entirely.
        assert_eq!(budget.admit("y".to_owned()).text, "");
    }

    #[test]
    fn test_reset() {
        let mut budget = OutputBudget::new(4, 0);
        assert_eq!(budget.reserve(), TRUNCATION_MARKER.len());
        budget.admit("abcdef".to_owned());
        assert_eq!(budget.remaining(), 0);
        budget.reset();
        assert_eq!(budget.remaining(), 4);
        assert_eq!(budget.admit("abcd".to_owned()).text, "abcd");
    }
}

//! Token usage value object

/// Token counts reported by a vendor for one completion
///
/// Vendors that do not report usage produce `None` at the call site rather
/// than a zeroed value, so "unknown" and "zero" stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt
    pub prompt: u64,

    /// Tokens produced in the completion
    pub completion: u64,

    /// Total tokens billed
    pub total: u64,
}

impl TokenUsage {
    /// Create a usage record, deriving `total` when the vendor omitted it
    ///
    /// # Examples
    ///
    /// ```
    /// use paperkg_domain::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 20, None);
    /// assert_eq!(usage.total, 120);
    /// ```
    pub fn new(prompt: u64, completion: u64, total: Option<u64>) -> Self {
        Self {
            prompt,
            completion,
            total: total.unwrap_or(prompt + completion),
        }
    }

    /// Add another usage record to this one
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt += other.prompt;
        self.completion += other.completion;
        self.total += other.total;
    }
}

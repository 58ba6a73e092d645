/// Page size bounds for history reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default: u32,
    pub max: u32,
}

impl PageLimits {
    pub const DEFAULT: Self = Self { default: 50, max: 100 };

    /// Effective limit for a request: absent (or zero) falls back to the
    /// default, anything above the maximum is capped.
    pub fn resolve(&self, requested: Option<u32>) -> u32 {
        match requested {
            None | Some(0) => self.default,
            Some(n) => n.min(self.max),
        }
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Bounds on message content, counted in Unicode scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLimits {
    pub max_chars: usize,
}

impl ContentLimits {
    pub const DEFAULT: Self = Self { max_chars: 2000 };

    /// Client-facing description of the accepted length range.
    pub fn bounds_message(&self) -> String {
        format!("content length 1..{}", self.max_chars)
    }
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults_and_caps() {
        let limits = PageLimits::DEFAULT;
        assert_eq!(limits.resolve(None), 50);
        assert_eq!(limits.resolve(Some(0)), 50);
        assert_eq!(limits.resolve(Some(7)), 7);
        assert_eq!(limits.resolve(Some(100)), 100);
        assert_eq!(limits.resolve(Some(101)), 100);
    }
}

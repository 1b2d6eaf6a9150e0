use std::fmt;

/// Lifecycle of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StageState {
    /// Created, no geometry yet.
    #[default]
    Uninitialized,
    /// Geometry known, kernels and tables being built.
    Configuring,
    /// Processing frames.
    Ready,
    /// Shutdown requested, waiting for in-flight buffers.
    Draining,
    /// All buffers released. Terminal.
    Closed,
}

impl StageState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Configuring => "configuring",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Closed => "closed",
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_become(self, next: StageState) -> bool {
        use StageState::*;
        matches!(
            (self, next),
            (Uninitialized, Configuring)
                | (Configuring, Ready)
                | (Configuring, Uninitialized)
                | (Uninitialized | Configuring | Ready, Draining)
                | (Draining, Closed)
        )
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        use StageState::*;
        let path = [Uninitialized, Configuring, Ready, Draining, Closed];
        for w in path.windows(2) {
            assert!(w[0].can_become(w[1]), "{} -> {}", w[0], w[1]);
        }
    }

    #[test]
    fn test_illegal_transitions() {
        use StageState::*;
        assert!(!Ready.can_become(Configuring));
        assert!(!Uninitialized.can_become(Ready));
        assert!(!Closed.can_become(Uninitialized));
        assert!(!Closed.can_become(Draining));
        assert!(!Draining.can_become(Ready));
    }

    #[test]
    fn test_failed_configure_returns() {
        assert!(StageState::Configuring.can_become(StageState::Uninitialized));
    }
}

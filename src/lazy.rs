//! One-shot lazily computed values

/// A value computed at most once until explicitly invalidated
///
/// A failed computation is remembered as [`Cached::Failed`] so it is not
/// retried on every query; only [`Cached::invalidate`] re-arms it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Cached<T> {
    #[default]
    NotComputed,
    Computed(T),
    Failed,
}

impl<T> Cached<T> {
    /// Compute the value on first use and return it
    pub fn get_or_compute(&mut self, compute: impl FnOnce() -> Option<T>) -> Option<&T> {
        if matches!(self, Self::NotComputed) {
            *self = match compute() {
                Some(value) => Self::Computed(value),
                None => Self::Failed,
            };
        }
        self.get()
    }

    /// The computed value, if any
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Computed(value) => Some(value),
            _ => None,
        }
    }

    /// Take the computed value out, leaving the cell attempted but empty
    pub fn take(&mut self) -> Option<T> {
        match std::mem::replace(self, Self::Failed) {
            Self::Computed(value) => Some(value),
            Self::NotComputed => {
                *self = Self::NotComputed;
                None
            }
            Self::Failed => None,
        }
    }

    /// Forget any result so the next query recomputes
    pub fn invalidate(&mut self) {
        *self = Self::NotComputed;
    }
}

//! Snapshot bookkeeping shared by the cart and wishlist sections.

/// How a remote mutation ended, as seen by the local snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T> {
    /// The API accepted the mutation and returned its authoritative state.
    Confirmed(T),
    /// The mutation failed; the optimistic value can no longer be trusted.
    Failed,
}

/// Last-known-good server state plus the markers that say how far to trust it.
///
/// `pending` counts mutations applied optimistically but not yet settled.
/// `stale` is set when a mutation failed; a stale snapshot is never served
/// as ground truth and the next read refetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    value: Option<T>,
    pending: u32,
    stale: bool,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            value: None,
            pending: 0,
            stale: false,
        }
    }
}

impl<T> Snapshot<T> {
    /// The current value, optimistic or confirmed. `None` until first load.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Number of unsettled optimistic mutations.
    #[must_use]
    pub const fn pending(&self) -> u32 {
        self.pending
    }

    /// Whether a failed mutation left an untrusted value behind.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.stale
    }

    /// Whether the next read has to go to the network.
    #[must_use]
    pub const fn needs_refresh(&self) -> bool {
        self.value.is_none() || self.stale
    }

    /// Whether the value equals what the server last confirmed.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.value.is_some() && self.pending == 0 && !self.stale
    }

    /// Apply an optimistic change and mark one mutation as pending.
    pub fn begin(&mut self, apply: impl FnOnce(&mut T))
    where
        T: Default,
    {
        apply(self.value.get_or_insert_with(T::default));
        self.pending += 1;
    }

    /// Settle one pending mutation.
    ///
    /// A confirmed payload replaces the local value outright, including any
    /// optimistic edits from mutations that are still in flight: the last
    /// settled response wins.
    pub fn settle<R: Into<T>>(&mut self, settlement: Settlement<R>) {
        self.pending = self.pending.saturating_sub(1);
        match settlement {
            Settlement::Confirmed(remote) => {
                self.value = Some(remote.into());
                self.stale = false;
            }
            Settlement::Failed => self.stale = true,
        }
    }

    /// Replace the value with a freshly fetched one.
    ///
    /// Pending mutations stay counted; their responses will settle later.
    pub fn replace<R: Into<T>>(&mut self, remote: R) {
        self.value = Some(remote.into());
        self.stale = false;
    }

    /// Flag the value as untrusted without touching it.
    pub const fn invalidate(&mut self) {
        self.stale = true;
    }
}

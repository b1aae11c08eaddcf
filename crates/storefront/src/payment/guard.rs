//! Critical section for in-flight payment submissions.
//!
//! While a section is entered, the storefront renders the checkout as in
//! flight: the submit button is disabled and the page installs its
//! unload/back-navigation guard. Entering is exclusive, so a second
//! submission is refused rather than queued.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

type Hook = Box<dyn Fn() + Send + Sync>;

/// An exclusive section with enter/exit hooks.
#[derive(Default)]
pub struct CriticalSection {
    active: AtomicBool,
    on_enter: Option<Hook>,
    on_exit: Option<Hook>,
}

impl fmt::Debug for CriticalSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CriticalSection")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl CriticalSection {
    /// Create an inactive section without hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` every time the section is entered.
    #[must_use]
    pub fn on_enter(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_enter = Some(Box::new(hook));
        self
    }

    /// Run `hook` every time the section is left.
    #[must_use]
    pub fn on_exit(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_exit = Some(Box::new(hook));
        self
    }

    /// Enter the section, or return `None` if it is already held.
    #[must_use]
    pub fn try_enter(&self) -> Option<SectionGuard<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        if let Some(hook) = &self.on_enter {
            hook();
        }
        Some(SectionGuard { section: self })
    }

    /// Whether the section is currently held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn exit(&self) {
        if let Some(hook) = &self.on_exit {
            hook();
        }
        self.active.store(false, Ordering::Release);
    }
}

/// Holds a [`CriticalSection`]; leaving scope exits it.
#[must_use = "the section is exited as soon as the guard is dropped"]
pub struct SectionGuard<'a> {
    section: &'a CriticalSection,
}

impl Drop for SectionGuard<'_> {
    fn drop(&mut self) {
        self.section.exit();
    }
}

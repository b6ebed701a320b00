//! Owned engine resources and the copy-on-write box that gives them value semantics.
//!
//! A [`NativeHandle`] is created by its constructor, released by `Drop`, and can be
//! duplicated into an independent resource. [`CowBox`] shares one handle between any
//! number of value copies and duplicates it the first time a shared copy is mutated.
//!
//! # Example
//!
//! ```ignore
//! use mongolayer_core::write_concern::WriteConcern;
//!
//! let a = WriteConcern::new();
//! let mut b = a.clone();      // shares the handle
//! b.set_journal(true);        // duplicates, then mutates
//!
//! assert!(!a.journal());
//! assert!(b.journal());
//! ```

use std::{fmt::Debug, sync::Arc};

/// An exclusively owned resource in the underlying engine.
pub trait NativeHandle: Send + Sync + Debug {
    /// Creates an independent resource with the same contents.
    fn duplicate(&self) -> Self
    where
        Self: Sized;
}

/// Whether a [`CowBox`] is the only holder of its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Exclusive,
    Shared,
}

/// Reference-counted box around a [`NativeHandle`] with copy-on-write mutation.
///
/// Cloning the box only bumps the reference count. Reads go through [`CowBox::get`] and
/// never duplicate. [`CowBox::make_mut`] decides between mutating in place and
/// duplicating first, before handing out the mutable reference.
#[derive(Debug)]
pub struct CowBox<T: NativeHandle> {
    inner: Arc<Slot<T>>,
}

/// Lets `Arc::make_mut` duplicate a handle through [`NativeHandle::duplicate`].
#[derive(Debug)]
struct Slot<T>(T);

impl<T: NativeHandle> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Slot(self.0.duplicate())
    }
}

impl<T: NativeHandle> CowBox<T> {
    pub fn new(handle: T) -> Self {
        Self {
            inner: Arc::new(Slot(handle)),
        }
    }

    pub fn get(&self) -> &T {
        &self.inner.0
    }

    /// Number of value copies currently sharing the handle.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn ownership(&self) -> Ownership {
        if self.ref_count() == 1 {
            Ownership::Exclusive
        } else {
            Ownership::Shared
        }
    }

    /// Returns `true` if both boxes point at the same handle.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns a mutable reference to a handle owned by this box alone.
    ///
    /// A shared handle is duplicated into a fresh box first and this value is rebound to
    /// it, leaving the other copies untouched.
    pub fn make_mut(&mut self) -> &mut T {
        if self.ownership() == Ownership::Shared {
            tracing::trace!(ref_count = self.ref_count(), "duplicating shared native handle");
        }

        &mut Arc::make_mut(&mut self.inner).0
    }
}

impl<T: NativeHandle> Clone for CowBox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

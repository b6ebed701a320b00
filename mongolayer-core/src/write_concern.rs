//! Write acknowledgment settings.
//!
//! A [`WriteConcern`] tells the engine what level of acknowledgment to await from the
//! server before a write is reported as successful. It can be set on a client, a
//! database, a collection, or passed per operation.
//!
//! `WriteConcern` is a value type: copies share one handle until one of them is
//! mutated, see [`crate::handle::CowBox`].

use bson::{Bson, Document};

use crate::handle::{CowBox, NativeHandle};

/// The `w` component of a write concern.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Acknowledgment {
    /// Let the server apply its default.
    #[default]
    Default,
    /// Wait for this many nodes. `Nodes(0)` disables acknowledgment.
    Nodes(u32),
    /// Wait for a majority of voting nodes.
    Majority,
    /// Wait for the nodes matching a server-side tag set.
    Tag(String),
}

impl Acknowledgment {
    fn to_bson(&self) -> Option<Bson> {
        match self {
            Acknowledgment::Default => None,
            Acknowledgment::Nodes(n) => Some(Bson::Int32(i32::try_from(*n).unwrap_or(i32::MAX))),
            Acknowledgment::Majority => Some(Bson::String("majority".into())),
            Acknowledgment::Tag(tag) => Some(Bson::String(tag.clone())),
        }
    }
}

/// Engine-side write concern resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteConcernHandle {
    fsync: Option<bool>,
    journal: Option<bool>,
    w: Acknowledgment,
    wtimeout_ms: u32,
}

impl NativeHandle for WriteConcernHandle {
    fn duplicate(&self) -> Self {
        self.clone()
    }
}

/// Level of acknowledgment required from the server for a write.
#[derive(Debug, Clone)]
pub struct WriteConcern {
    storage: CowBox<WriteConcernHandle>,
}

impl WriteConcern {
    /// Creates a write concern with the server defaults.
    pub fn new() -> Self {
        Self {
            storage: CowBox::new(WriteConcernHandle::default()),
        }
    }

    /// Creates a write concern that does not wait for any acknowledgment.
    pub fn unacknowledged() -> Self {
        let mut write_concern = Self::new();
        write_concern.set_write(Acknowledgment::Nodes(0));
        write_concern
    }

    /// Creates a write concern that waits for a majority, with `timeout_ms` (0 = none).
    pub fn majority(timeout_ms: u32) -> Self {
        let mut write_concern = Self::new();
        write_concern.set_write_majority(timeout_ms);
        write_concern
    }

    /// If an fsync should be performed before returning success on a write.
    pub fn fsync(&self) -> bool {
        self.storage.get().fsync.unwrap_or(false)
    }

    pub fn set_fsync(&mut self, fsync: bool) {
        self.storage.make_mut().fsync = Some(fsync);
    }

    /// If the write should be journaled before indicating success.
    pub fn journal(&self) -> bool {
        self.storage.get().journal.unwrap_or(false)
    }

    /// The journal setting, or `None` if it was never set.
    pub fn journal_option(&self) -> Option<bool> {
        self.storage.get().journal
    }

    pub fn set_journal(&mut self, journal: bool) {
        self.storage.make_mut().journal = Some(journal);
    }

    /// The `w` parameter of the write concern.
    pub fn write(&self) -> &Acknowledgment {
        &self.storage.get().w
    }

    pub fn set_write(&mut self, w: Acknowledgment) {
        self.storage.make_mut().w = w;
    }

    /// `true` if the write must reach a majority of nodes.
    pub fn write_majority(&self) -> bool {
        matches!(self.storage.get().w, Acknowledgment::Majority)
    }

    /// Requires the write to reach a majority of nodes, failing after `timeout_ms`
    /// milliseconds. A timeout of zero waits indefinitely.
    pub fn set_write_majority(&mut self, timeout_ms: u32) {
        let handle = self.storage.make_mut();
        handle.w = Acknowledgment::Majority;
        handle.wtimeout_ms = timeout_ms;
    }

    /// The tag set that must acknowledge the write, or `""` when none is set.
    pub fn write_tag(&self) -> &str {
        match &self.storage.get().w {
            Acknowledgment::Tag(tag) => tag,
            _ => "",
        }
    }

    pub fn set_write_tag(&mut self, tag: impl Into<String>) {
        self.storage.make_mut().w = Acknowledgment::Tag(tag.into());
    }

    /// How long, in milliseconds, the server waits for acknowledgment before failing the
    /// write. This is not a socket timeout. Zero means no timeout.
    pub fn write_timeout(&self) -> u32 {
        self.storage.get().wtimeout_ms
    }

    pub fn set_write_timeout(&mut self, timeout_ms: u32) {
        self.storage.make_mut().wtimeout_ms = timeout_ms;
    }

    /// `false` only when the write is fire-and-forget.
    pub fn is_acknowledged(&self) -> bool {
        let handle = self.storage.get();

        handle.w != Acknowledgment::Nodes(0)
            || handle.fsync == Some(true)
            || handle.journal == Some(true)
    }

    /// Journal or fsync cannot be requested without acknowledgment.
    pub fn is_valid(&self) -> bool {
        let handle = self.storage.get();

        !(handle.w == Acknowledgment::Nodes(0)
            && (handle.journal == Some(true) || handle.fsync == Some(true)))
    }

    /// The `writeConcern` document sent along with write commands.
    ///
    /// Only explicitly set fields are included; a default write concern yields an empty
    /// document.
    pub fn to_document(&self) -> Document {
        let handle = self.storage.get();
        let mut document = Document::new();

        if let Some(w) = handle.w.to_bson() {
            document.insert("w", w);
        }
        if let Some(journal) = handle.journal {
            document.insert("j", journal);
        }
        if let Some(fsync) = handle.fsync {
            document.insert("fsync", fsync);
        }
        if handle.wtimeout_ms > 0 {
            document.insert("wtimeout", i64::from(handle.wtimeout_ms));
        }

        document
    }
}

impl Default for WriteConcern {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for WriteConcern {
    fn eq(&self, other: &Self) -> bool {
        self.storage.ptr_eq(&other.storage) || self.storage.get() == other.storage.get()
    }
}

impl Eq for WriteConcern {}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_defaults() {
        let write_concern = WriteConcern::new();

        assert!(!write_concern.fsync());
        assert!(!write_concern.journal());
        assert_eq!(write_concern.write(), &Acknowledgment::Default);
        assert!(!write_concern.write_majority());
        assert_eq!(write_concern.write_tag(), "");
        assert_eq!(write_concern.write_timeout(), 0);
        assert!(write_concern.is_acknowledged());
        assert!(write_concern.to_document().is_empty());
    }

    #[test]
    fn test_copy_is_independent_after_mutation() {
        let original = WriteConcern::new();
        let mut copy = original.clone();

        assert_eq!(original, copy);

        copy.set_journal(true);
        copy.set_fsync(true);
        copy.set_write(Acknowledgment::Nodes(3));
        copy.set_write_timeout(500);

        assert!(!original.journal());
        assert!(!original.fsync());
        assert_eq!(original.write(), &Acknowledgment::Default);
        assert_eq!(original.write_timeout(), 0);

        assert!(copy.journal());
        assert!(copy.fsync());
        assert_eq!(copy.write(), &Acknowledgment::Nodes(3));
        assert_eq!(copy.write_timeout(), 500);
        assert_ne!(original, copy);
    }

    #[test]
    fn test_set_write_majority_sets_timeout() {
        let mut write_concern = WriteConcern::new();
        write_concern.set_write_majority(1000);

        assert!(write_concern.write_majority());
        assert_eq!(write_concern.write(), &Acknowledgment::Majority);
        assert_eq!(write_concern.write_timeout(), 1000);
        assert_eq!(
            write_concern.to_document(),
            doc! { "w": "majority", "wtimeout": 1000_i64 }
        );
    }

    #[test]
    fn test_write_tag() {
        let mut write_concern = WriteConcern::new();
        write_concern.set_write_tag("east-coast");

        assert_eq!(write_concern.write_tag(), "east-coast");
        assert!(!write_concern.write_majority());

        write_concern.set_write(Acknowledgment::Nodes(1));
        assert_eq!(write_concern.write_tag(), "");
    }

    #[test]
    fn test_unacknowledged_validity() {
        let mut write_concern = WriteConcern::unacknowledged();

        assert!(!write_concern.is_acknowledged());
        assert!(write_concern.is_valid());

        write_concern.set_journal(true);
        assert!(!write_concern.is_valid());
    }

    #[test]
    fn test_to_document_includes_explicit_false() {
        let mut write_concern = WriteConcern::new();
        write_concern.set_journal(false);
        write_concern.set_write(Acknowledgment::Nodes(2));

        assert_eq!(write_concern.to_document(), doc! { "w": 2, "j": false });
    }
}

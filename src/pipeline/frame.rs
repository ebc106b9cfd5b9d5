//! Frames: bounded batches of encoded records passed between stages.

use crate::record::RoutingKey;

/// One encoded record and where it goes.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameEntry {
    pub key: RoutingKey,
    pub payload: Vec<u8>,
}

/// A non-empty batch of at most `frame_size` entries, in line order.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    entries: Vec<FrameEntry>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for frames produced by [`FrameBuilder`]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FrameEntry] {
        &self.entries
    }
}

impl IntoIterator for Frame {
    type Item = FrameEntry;
    type IntoIter = std::vec::IntoIter<FrameEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Accumulates entries and cuts a [`Frame`] every `frame_size` entries.
#[derive(Debug)]
pub struct FrameBuilder {
    frame_size: usize,
    pending: Vec<FrameEntry>,
}

impl FrameBuilder {
    /// `frame_size` is clamped to at least 1.
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            pending: Vec::with_capacity(frame_size),
        }
    }

    /// Add an entry; returns a full frame once `frame_size` entries are pending.
    pub fn push(&mut self, entry: FrameEntry) -> Option<Frame> {
        self.pending.push(entry);
        if self.pending.len() >= self.frame_size {
            let entries =
                std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_size));
            Some(Frame { entries })
        } else {
            None
        }
    }

    /// Flush the partial last frame, if any.
    pub fn finish(self) -> Option<Frame> {
        (!self.pending.is_empty()).then_some(Frame {
            entries: self.pending,
        })
    }
}

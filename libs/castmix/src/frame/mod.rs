// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The frame tree handed to the mixers each tick.
//!
//! Producers deliver a [`Frame`]: either a pixel-carrying leaf
//! ([`DataFrame`]) or a group of child frames under a shared transform.
//! Mixers consume the tree through [`FrameVisitor`]; traversal is
//! iterative with an explicit stack so arbitrarily nested groups cannot
//! recurse the mixer thread.

mod data_frame;

pub use data_frame::DataFrame;

use std::sync::Arc;

use crate::format::FieldMode;
use crate::transform::FrameTransform;

/// Receiver side of the frame-tree traversal. `begin`/`end` bracket
/// every node; `visit` fires for leaves between their bracket calls.
pub trait FrameVisitor {
    fn begin(&mut self, transform: &FrameTransform);
    fn visit(&mut self, frame: &DataFrame);
    fn end(&mut self);
}

#[derive(Clone)]
pub enum Frame {
    /// Nothing to draw or hear.
    Empty,
    /// A leaf carrying pixel planes and audio.
    Data(Arc<DataFrame>),
    /// Child frames composed under one transform.
    Group {
        transform: FrameTransform,
        children: Vec<Frame>,
    },
}

impl Frame {
    pub fn empty() -> Self {
        Frame::Empty
    }

    /// Wrap `frame` under an additional transform.
    pub fn with_transform(frame: Frame, transform: FrameTransform) -> Self {
        Frame::Group {
            transform,
            children: vec![frame],
        }
    }

    /// Combine two temporal fields into one interlaced frame: the first
    /// field is masked to the scanlines `field_mode` names and the second
    /// to the opposite set. A progressive source under either side still
    /// contributes to both passes of an interlaced render through the
    /// bitwise field intersection.
    pub fn interlace(first: Frame, second: Frame, field_mode: FieldMode) -> Self {
        let (first_mask, second_mask) = if field_mode == FieldMode::UPPER {
            (FieldMode::UPPER, FieldMode::LOWER)
        } else {
            (FieldMode::LOWER, FieldMode::UPPER)
        };

        let mask = |frame: Frame, field_mode: FieldMode| {
            let mut transform = FrameTransform::default();
            transform.field_mode = field_mode;
            Frame::with_transform(frame, transform)
        };

        Frame::Group {
            transform: FrameTransform::default(),
            children: vec![mask(first, first_mask), mask(second, second_mask)],
        }
    }

    /// Drive a visitor over the tree in document order.
    pub fn accept(&self, visitor: &mut dyn FrameVisitor) {
        enum Step<'a> {
            Enter(&'a Frame),
            Leave,
        }

        let mut stack = vec![Step::Enter(self)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(Frame::Empty) => {}
                Step::Enter(Frame::Data(data)) => {
                    visitor.begin(data.transform());
                    visitor.visit(data);
                    visitor.end();
                }
                Step::Enter(Frame::Group {
                    transform,
                    children,
                }) => {
                    visitor.begin(transform);
                    stack.push(Step::Leave);
                    for child in children.iter().rev() {
                        stack.push(Step::Enter(child));
                    }
                }
                Step::Leave => visitor.end(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::PixelFormatDesc;
    use crate::pixel::PixelFormat;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        stack: Vec<FrameTransform>,
    }

    impl FrameVisitor for Recorder {
        fn begin(&mut self, transform: &FrameTransform) {
            let top = self.stack.last().copied().unwrap_or_default();
            self.stack.push(top * *transform);
            self.events.push("begin".into());
        }
        fn visit(&mut self, frame: &DataFrame) {
            self.events.push(format!("visit:{}", frame.tag()));
        }
        fn end(&mut self) {
            self.stack.pop();
            self.events.push("end".into());
        }
    }

    fn leaf(tag: u64) -> Frame {
        Frame::Data(Arc::new(DataFrame::new(
            tag,
            PixelFormatDesc::new(PixelFormat::Invalid),
            Vec::new(),
        )))
    }

    #[test]
    fn test_traversal_order() {
        let tree = Frame::Group {
            transform: FrameTransform::default(),
            children: vec![leaf(1), leaf(2)],
        };
        let mut rec = Recorder::default();
        tree.accept(&mut rec);
        assert_eq!(
            rec.events,
            vec![
                "begin", "begin", "visit:1", "end", "begin", "visit:2", "end", "end"
            ]
        );
        assert!(rec.stack.is_empty());
    }

    #[test]
    fn test_empty_frame_is_silent() {
        let mut rec = Recorder::default();
        Frame::empty().accept(&mut rec);
        assert!(rec.events.is_empty());
    }

    #[test]
    fn test_interlace_masks_fields() {
        struct FieldProbe {
            stack: Vec<FrameTransform>,
            seen: Vec<(u64, FieldMode)>,
        }
        impl FrameVisitor for FieldProbe {
            fn begin(&mut self, transform: &FrameTransform) {
                let top = self.stack.last().copied().unwrap_or_default();
                self.stack.push(top * *transform);
            }
            fn visit(&mut self, frame: &DataFrame) {
                self.seen
                    .push((frame.tag(), self.stack.last().unwrap().field_mode));
            }
            fn end(&mut self) {
                self.stack.pop();
            }
        }

        let tree = Frame::interlace(leaf(1), leaf(2), FieldMode::UPPER);
        let mut probe = FieldProbe {
            stack: Vec::new(),
            seen: Vec::new(),
        };
        tree.accept(&mut probe);
        assert_eq!(probe.seen, vec![(1, FieldMode::UPPER), (2, FieldMode::LOWER)]);

        let tree = Frame::interlace(leaf(1), leaf(2), FieldMode::LOWER);
        probe.seen.clear();
        tree.accept(&mut probe);
        assert_eq!(probe.seen, vec![(1, FieldMode::LOWER), (2, FieldMode::UPPER)]);
    }
}

//! Frame kinds

use crate::notify::ChangeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Written = 0x01,
    Removed = 0x02,
    Imported = 0x03,
    Cleared = 0x04,
}

impl FrameKind {
    pub fn of(event: &ChangeEvent) -> Self {
        match event {
            ChangeEvent::Written { .. } => FrameKind::Written,
            ChangeEvent::Removed { .. } => FrameKind::Removed,
            ChangeEvent::Imported { .. } => FrameKind::Imported,
            ChangeEvent::Cleared { .. } => FrameKind::Cleared,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(FrameKind::Written),
            0x02 => Some(FrameKind::Removed),
            0x03 => Some(FrameKind::Imported),
            0x04 => Some(FrameKind::Cleared),
            _ => None,
        }
    }
}

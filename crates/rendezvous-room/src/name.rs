//! Room naming rules.

use std::fmt;

use crate::RoomError;

/// Prefix that keeps media rooms apart from call rooms of the same name.
const MEDIA_PREFIX: &str = "media-";

/// Rejects names that are empty after trimming.
pub fn validate_room_name(name: &str) -> Result<(), RoomError> {
    if name.trim().is_empty() {
        return Err(RoomError::InvalidName);
    }
    Ok(())
}

/// Registry key of a media room.
///
/// Clients address media rooms by the plain room name; internally the
/// name is namespaced so a media room "r1" and a call room "r1" are
/// never the same thing, even in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaRoomKey(String);

impl MediaRoomKey {
    /// Namespaces a client-supplied room name.
    pub fn new(room_name: &str) -> Self {
        Self(format!("{MEDIA_PREFIX}{room_name}"))
    }

    /// The name clients use for this room.
    pub fn room_name(&self) -> &str {
        self.0.strip_prefix(MEDIA_PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for MediaRoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

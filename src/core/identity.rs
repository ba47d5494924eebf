//! Game name and boot header extraction from the first track of a GD-ROM dump.
//!
//! `track01.bin` is stored as raw 2352-byte sectors. The first sector carries a
//! 16-byte sync/header block followed by the boot header (IP.BIN), whose title
//! field therefore starts at byte 144 of the file.

use crate::error::SyncError;
use crate::models::GameIdentity;
use crate::storage::Storage;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// Start of the title window in the track file
pub const IDENTITY_OFFSET: u64 = 144;
/// Length of the title window
pub const IDENTITY_LENGTH: u64 = 140;

/// Raw sector header preceding the boot header
const SECTOR_HEADER_LEN: usize = 16;
/// Boot header size up to the end of the title field
const BOOT_HEADER_LEN: usize = 0x100;

/// Decoded boot header fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscHeader {
    pub hardware_id: String,
    pub maker_id: String,
    pub crc: String,
    pub disc: String,
    pub region: String,
    pub peripherals: String,
    pub product_number: String,
    pub product_version: String,
    pub release_date: String,
    pub boot_file: String,
    pub producer: String,
    pub title: String,
}

impl DiscHeader {
    /// Bytes needed from the start of the track
    pub const READ_LEN: u64 = (SECTOR_HEADER_LEN + BOOT_HEADER_LEN) as u64;

    /// Parse from the first bytes of the track. `None` if the buffer is short.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < Self::READ_LEN as usize {
            return None;
        }
        let ip = &raw[SECTOR_HEADER_LEN..SECTOR_HEADER_LEN + BOOT_HEADER_LEN];
        let field = |start: usize, len: usize| decode_text(&ip[start..start + len]);

        Some(Self {
            hardware_id: field(0x00, 16),
            maker_id: field(0x10, 16),
            crc: field(0x20, 4),
            disc: field(0x2B, 3),
            region: field(0x30, 8),
            peripherals: field(0x38, 8),
            product_number: field(0x40, 10),
            product_version: field(0x4A, 6),
            release_date: field(0x50, 16),
            boot_file: field(0x60, 16),
            producer: field(0x70, 16),
            title: field(0x80, 128),
        })
    }
}

/// Lossy text decode with NUL mapped to space, then trimmed
fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .replace('\0', " ")
        .trim()
        .to_string()
}

/// Decode the identity window. Invalid UTF-8 sequences become U+FFFD, so the
/// same bytes always give the same name on the library and on the card.
pub fn identity_from_window(window: &[u8]) -> Result<GameIdentity, String> {
    if window.len() < IDENTITY_LENGTH as usize {
        return Err(format!(
            "header too short ({} of {} bytes)",
            window.len(),
            IDENTITY_LENGTH
        ));
    }

    let text = String::from_utf8_lossy(window);
    match GameIdentity::from_title(&text.replace('\0', " ")) {
        GameIdentity::Unknown => Err("empty game name".to_string()),
        known => Ok(known),
    }
}

/// Reads game names out of primary track files
pub struct DiscIdentityReader<'a> {
    storage: &'a dyn Storage,
}

impl<'a> DiscIdentityReader<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// Read the identity window of `track`
    pub async fn read_identity(&self, track: &Path) -> Result<GameIdentity, SyncError> {
        let window = self
            .storage
            .read_range(track, IDENTITY_OFFSET, IDENTITY_LENGTH)
            .await
            .map_err(|e| SyncError::IdentityUnreadable {
                path: track.to_path_buf(),
                reason: e.to_string(),
            })?;

        identity_from_window(&window).map_err(|reason| SyncError::IdentityUnreadable {
            path: track.to_path_buf(),
            reason,
        })
    }

    /// Like `read_identity` but degrades to `Unknown`; `None` track means no track file
    pub async fn identity_or_unknown(&self, track: Option<&Path>) -> GameIdentity {
        let Some(track) = track else {
            return GameIdentity::Unknown;
        };

        match self.read_identity(track).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!("{}", e);
                GameIdentity::Unknown
            }
        }
    }

    /// Full boot header, for display only
    pub async fn read_header(&self, track: &Path) -> Option<DiscHeader> {
        match self.storage.read_range(track, 0, DiscHeader::READ_LEN).await {
            Ok(raw) => DiscHeader::parse(&raw),
            Err(e) => {
                debug!("cannot read boot header of {}: {}", track.display(), e);
                None
            }
        }
    }
}

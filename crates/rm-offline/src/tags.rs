//! Export tag metadata (encoder + creation time)

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use lofty::{ItemKey, Probe, Tag, TagExt, TaggedFileExt};

use crate::error::{MasterError, MasterResult};

/// Metadata written into every exported master
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTags {
    /// Stored as the encoder/software field
    pub creator: String,
    /// Stored as the recording date, RFC 3339
    pub created_at: DateTime<Utc>,
}

impl ExportTags {
    pub fn now(creator: impl Into<String>) -> Self {
        Self {
            creator: creator.into(),
            created_at: Utc::now(),
        }
    }

    pub fn timestamp(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

fn tag_error(path: &Path, e: impl std::fmt::Display) -> MasterError {
    MasterError::Write(format!("{}: tag write failed: {}", path.display(), e))
}

/// Write `tags` into the primary tag of an already-exported file
pub fn write_tags(path: &Path, tags: &ExportTags) -> MasterResult<()> {
    let mut tagged_file = Probe::open(path)
        .and_then(|probe| probe.read())
        .map_err(|e| tag_error(path, e))?;

    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .tag_mut(tag_type)
        .ok_or_else(|| tag_error(path, "no writable tag"))?;

    tag.insert_text(ItemKey::EncoderSoftware, tags.creator.clone());
    tag.insert_text(ItemKey::RecordingDate, tags.timestamp());
    tag.save_to_path(path).map_err(|e| tag_error(path, e))?;

    log::debug!(
        "Tagged {} ({:?}): {} @ {}",
        path.display(),
        tag_type,
        tags.creator,
        tags.timestamp()
    );
    Ok(())
}

/// Encoder field of the primary tag, if present
pub fn read_creator(path: &Path) -> MasterResult<Option<String>> {
    let tagged_file = Probe::open(path)
        .and_then(|probe| probe.read())
        .map_err(|e| MasterError::Decode(format!("{}: {}", path.display(), e)))?;

    Ok(tagged_file
        .primary_tag()
        .and_then(|tag| tag.get_string(&ItemKey::EncoderSoftware))
        .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::export;
    use crate::formats::ExportFormat;
    use rm_core::{AudioBuffer, BitDepth};

    #[test]
    fn test_timestamp_is_rfc3339() {
        let tags = ExportTags::now("ReelMaster");
        let parsed = DateTime::parse_from_rfc3339(&tags.timestamp()).unwrap();
        assert_eq!(parsed.timestamp(), tags.created_at.timestamp());
    }

    #[test]
    fn test_tags_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let plane: Vec<i32> = (0..4410).map(|i| ((i % 100) as i32 - 50) * 100).collect();
        let buffer = AudioBuffer::new(vec![plane; 2], 44100, BitDepth::Bits16).unwrap();

        for format in [ExportFormat::Wav, ExportFormat::Flac, ExportFormat::Mp3] {
            let path = dir.path().join(format!("tagged.{}", format.extension()));
            export(&buffer, &path, format).unwrap();
            write_tags(&path, &ExportTags::now("ReelMaster")).unwrap();
            assert_eq!(read_creator(&path).unwrap().as_deref(), Some("ReelMaster"));
        }
    }

    #[test]
    fn test_tagging_garbage_fails_as_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.wav");
        std::fs::write(&path, b"RIFF????").unwrap();
        let err = write_tags(&path, &ExportTags::now("x")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Export);
    }
}

use std::io::{Read, Seek};

use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::FormatError;

/// Maximum uncompressed size permitted for any single ZIP part inflated into
/// memory. Guardrail against ZIP bombs and forged size metadata.
pub(crate) const MAX_ZIP_PART_BYTES: u64 = 64 * 1024 * 1024; // 64 MiB

/// Open a ZIP entry by name, tolerating common producer mistakes:
/// - leading `/` mismatch
/// - Windows-style `\` path separators
/// - ASCII case differences
///
/// An exact name match always wins over a tolerant one. `ZipFile` borrows
/// the archive, so we pick the entry index first and call `by_index` once.
pub(crate) fn open_zip_part<'a, R: Read + Seek>(
    archive: &'a mut ZipArchive<R>,
    name: &str,
) -> Result<ZipFile<'a>, ZipError> {
    fn normalized_eq(entry: &str, name: &str) -> bool {
        let a = entry.trim_start_matches(['/', '\\']);
        let b = name.trim_start_matches(['/', '\\']);
        a.len() == b.len()
            && a.bytes().zip(b.bytes()).all(|(x, y)| {
                let x = if x == b'\\' { b'/' } else { x.to_ascii_lowercase() };
                let y = if y == b'\\' { b'/' } else { y.to_ascii_lowercase() };
                x == y
            })
    }

    let mut candidate = None::<usize>;
    for (idx, entry) in archive.file_names().enumerate() {
        if entry == name {
            candidate = Some(idx);
            break;
        }
        if candidate.is_none() && normalized_eq(entry, name) {
            candidate = Some(idx);
        }
    }

    match candidate {
        Some(idx) => archive.by_index(idx),
        None => Err(ZipError::FileNotFound),
    }
}

/// Read a ZIP part into memory, enforcing [`MAX_ZIP_PART_BYTES`] against the
/// observed byte count rather than trusting ZIP metadata.
pub(crate) fn read_zip_part_optional<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, FormatError> {
    match open_zip_part(archive, name) {
        Ok(mut file) => {
            if file.is_dir() {
                return Ok(None);
            }
            let mut buf = Vec::new();
            let mut limited = (&mut file).take(MAX_ZIP_PART_BYTES + 1);
            limited.read_to_end(&mut buf)?;
            if buf.len() as u64 > MAX_ZIP_PART_BYTES {
                return Err(FormatError::PartTooLarge {
                    part: name.to_string(),
                    size: buf.len() as u64,
                    max: MAX_ZIP_PART_BYTES,
                });
            }
            Ok(Some(buf))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn read_zip_part_required<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &'static str,
) -> Result<Vec<u8>, FormatError> {
    read_zip_part_optional(archive, name)?.ok_or(FormatError::MissingPart(name))
}

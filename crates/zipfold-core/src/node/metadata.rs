//! Synthetic files that exist only in the virtual tree.

use std::sync::LazyLock;

use super::FileAttributes;
use crate::large_file::copy_range;

/// Name of the Explorer folder-settings file added to archive roots.
pub const DESKTOP_INI_NAME: &str = "desktop.ini";

const DESKTOP_INI_LINES: &[&str] = &[
    "[.ShellClassInfo]",
    "IconResource=%SystemRoot%\\system32\\imageres.dll,165",
    "[ViewState]",
    "Mode=",
    "Vid=",
    "FolderType=Generic",
];

static DESKTOP_INI: LazyLock<Vec<u8>> = LazyLock::new(|| {
    let mut bytes = vec![0xFF, 0xFE];
    for line in DESKTOP_INI_LINES {
        for unit in line.encode_utf16().chain("\r\n".encode_utf16()) {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
    }
    bytes
});

/// `desktop.ini` content: UTF-16LE with byte-order mark, CRLF line endings.
///
/// Gives archive folders the zip icon and a generic folder view.
pub fn desktop_ini() -> &'static [u8] {
    &DESKTOP_INI
}

/// A read-only file with fixed content.
#[derive(Debug)]
pub struct MetadataFile {
    content: &'static [u8],
    attributes: FileAttributes,
}

impl MetadataFile {
    /// What Explorer expects on `desktop.ini`.
    pub const SHELL_ATTRIBUTES: FileAttributes = FileAttributes {
        read_only: true,
        hidden: true,
        system: true,
        archive: true,
    };

    pub fn new(content: &'static [u8], attributes: FileAttributes) -> Self {
        Self { content, attributes }
    }

    pub fn len(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn attributes(&self) -> FileAttributes {
        self.attributes
    }

    pub(crate) fn read(&self, offset: u64, buf: &mut [u8]) -> usize {
        copy_range(self.content, offset, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_ini_encoding() {
        let bytes = desktop_ini();
        assert_eq!(&bytes[..2], &[0xFF, 0xFE]);
        assert_eq!(bytes.len() % 2, 0);

        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let text = String::from_utf16(&units).unwrap();
        assert!(text.starts_with("[.ShellClassInfo]\r\n"));
        assert!(text.contains("imageres.dll,165\r\n"));
        assert!(text.ends_with("FolderType=Generic\r\n"));
    }

    #[test]
    fn test_metadata_file_reads() {
        let file = MetadataFile::new(b"fixed", MetadataFile::SHELL_ATTRIBUTES);
        let mut buf = [0u8; 3];
        assert_eq!(file.read(3, &mut buf), 2);
        assert_eq!(&buf[..2], b"ed");
        assert_eq!(file.read(9, &mut buf), 0);
        assert!(file.attributes().hidden);
    }
}

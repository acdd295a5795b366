use std::io::{Read, Seek, SeekFrom};

use crate::reader::{self, read_exact_at};
use crate::types::*;

/// Random-access reader over a metadata store ("ldc" file).
///
/// Every lookup seeks to its own offset and rewinds afterwards; entries are
/// re-read from storage on each call rather than cached.
pub struct MetadataStore<R> {
    reader: R,
    header: LdcHeader,
}

impl<R: Read + Seek> MetadataStore<R> {
    /// Read the store header. The store is not validated until [`verify`].
    ///
    /// [`verify`]: MetadataStore::verify
    pub fn open(mut reader: R) -> Result<Self, ParseError> {
        reader.rewind()?;
        let header = reader::read_ldc_header(&mut reader)?;
        reader.rewind()?;
        log::debug!(
            "ldc header: base 0x{:08x} length {} offset {} fw {}",
            header.base_address,
            header.data_length,
            header.data_offset,
            header.version
        );
        Ok(Self { reader, header })
    }

    pub fn header(&self) -> &LdcHeader {
        &self.header
    }

    /// One-time gate run before any record is decoded.
    ///
    /// Checks the signature, then the optional reference descriptor (byte
    /// equality and its own ABI), then the store's ABI.
    pub fn verify(&self, reference: Option<&FwVersion>) -> Result<(), ParseError> {
        if &self.header.signature != LDC_SIGNATURE {
            return Err(ParseError::InvalidSignature(self.header.signature));
        }

        if let Some(reference) = reference {
            if reference.raw != self.header.version.raw {
                return Err(ParseError::FwVersionMismatch);
            }
            check_abi("version file", reference.abi_version)?;
        }

        check_abi("ldc file", self.header.version.abi_version)
    }

    /// Read the entry starting at `offset` bytes into the store.
    pub fn read_entry(&mut self, offset: u64) -> Result<LdcEntry, ParseError> {
        let result = self.read_entry_at(offset);
        self.reader.rewind()?;
        result
    }

    fn read_entry_at(&mut self, offset: u64) -> Result<LdcEntry, ParseError> {
        self.reader.seek(SeekFrom::Start(offset))?;

        let mut buf = [0u8; EntryHeader::SIZE];
        read_exact_at(&mut self.reader, &mut buf, "entry header", offset)?;
        let header = reader::decode_entry_header(&buf);

        // Lengths are validated before allocating so a corrupt header cannot
        // request an arbitrary buffer.
        if header.file_name_len > MAX_FILENAME_LEN {
            return Err(ParseError::Structural {
                field: "file name length",
                value: header.file_name_len,
                max: MAX_FILENAME_LEN,
                offset,
            });
        }
        let mut file_name = vec![0u8; header.file_name_len as usize];
        read_exact_at(&mut self.reader, &mut file_name, "entry file name", offset)?;

        if header.text_len > MAX_TEXT_LEN {
            return Err(ParseError::Structural {
                field: "text length",
                value: header.text_len,
                max: MAX_TEXT_LEN,
                offset,
            });
        }
        let mut text = vec![0u8; header.text_len as usize];
        read_exact_at(&mut self.reader, &mut text, "entry text", offset)?;

        Ok(LdcEntry {
            header,
            file_name,
            text,
        })
    }

    /// Current position of the underlying reader.
    #[cfg(test)]
    fn position(&mut self) -> u64 {
        self.reader.stream_position().unwrap()
    }
}

fn check_abi(source_name: &'static str, found: AbiVersion) -> Result<(), ParseError> {
    if found.is_compatible_with(CONVERTER_ABI_VERSION) {
        Ok(())
    } else {
        Err(ParseError::AbiIncompatible {
            source_name,
            found,
            expected: CONVERTER_ABI_VERSION,
        })
    }
}

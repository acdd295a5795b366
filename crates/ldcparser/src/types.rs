use std::fmt;

// === Limits ===

/// Maximum number of parameters a single log call can carry.
pub const MAX_PARAMS: u32 = 4;
/// Maximum length of an entry's format text, in bytes.
pub const MAX_TEXT_LEN: u32 = 1024;
/// Maximum length of an entry's source filename, in bytes.
pub const MAX_FILENAME_LEN: u32 = 128;
/// Default width of the trace identifier fields, in bits.
pub const DEFAULT_ID_BITS: u32 = 12;

/// Signature at the start of every metadata store.
pub const LDC_SIGNATURE: &[u8; 4] = b"Logs";

// === Error types ===

/// Errors that can occur while decoding a trace stream.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Reached end of input at a clean record boundary.
    #[error("end of stream")]
    EndOfStream,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short read of {stage} at offset {offset}: {source}")]
    ShortRead {
        stage: &'static str,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {field} {value} in entry at offset {offset} (max {max})")]
    Structural {
        field: &'static str,
        value: u32,
        max: u32,
        offset: u64,
    },

    #[error("invalid ldc file signature: {0:02x?}")]
    InvalidSignature([u8; 4]),

    #[error("abi version {found} in {source_name} is incompatible with converter abi version {expected}")]
    AbiIncompatible {
        source_name: &'static str,
        found: AbiVersion,
        expected: AbiVersion,
    },

    #[error("fw version in the reference file does not match the fw version in the ldc file")]
    FwVersionMismatch,

    #[error("cancelled")]
    Cancelled,
}

impl ParseError {
    /// Whether the error must terminate the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ParseError::EndOfStream | ParseError::Cancelled)
    }
}

// === Versioning ===

/// Packed firmware ABI version (`major:8 minor:12 patch:12`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbiVersion(pub u32);

impl AbiVersion {
    const MAJOR_SHIFT: u32 = 24;
    const MAJOR_MASK: u32 = 0xff;
    const MINOR_SHIFT: u32 = 12;
    const MINOR_MASK: u32 = 0xfff;
    const PATCH_MASK: u32 = 0xfff;

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        AbiVersion(
            ((major & Self::MAJOR_MASK) << Self::MAJOR_SHIFT)
                | ((minor & Self::MINOR_MASK) << Self::MINOR_SHIFT)
                | (patch & Self::PATCH_MASK),
        )
    }

    pub fn major(self) -> u32 {
        (self.0 >> Self::MAJOR_SHIFT) & Self::MAJOR_MASK
    }

    pub fn minor(self) -> u32 {
        (self.0 >> Self::MINOR_SHIFT) & Self::MINOR_MASK
    }

    pub fn patch(self) -> u32 {
        self.0 & Self::PATCH_MASK
    }

    /// Only the major number has to agree; minor and patch skew is allowed.
    pub fn is_compatible_with(self, other: AbiVersion) -> bool {
        self.major() == other.major()
    }
}

impl fmt::Display for AbiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.major(), self.minor(), self.patch())
    }
}

/// ABI version this converter understands.
pub const CONVERTER_ABI_VERSION: AbiVersion = AbiVersion::new(3, 0, 0);

/// Firmware version descriptor embedded in the metadata store.
///
/// The raw bytes are kept so the descriptor can be compared byte for byte
/// against a reference descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FwVersion {
    pub major: u16,
    pub minor: u16,
    pub micro: u16,
    pub build: u16,
    pub tag: String,
    pub abi_version: AbiVersion,
    pub raw: [u8; FwVersion::SIZE],
}

impl FwVersion {
    pub const SIZE: usize = 60;
}

impl fmt::Display for FwVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}-{}",
            self.major, self.minor, self.micro, self.build
        )?;
        if !self.tag.is_empty() {
            write!(f, " ({})", self.tag)?;
        }
        Ok(())
    }
}

// === Metadata store ===

/// Header at the start of the metadata store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdcHeader {
    pub signature: [u8; 4],
    /// Firmware address of the first log entry.
    pub base_address: u32,
    /// Number of entry bytes following the header.
    pub data_length: u32,
    /// File offset of the first log entry.
    pub data_offset: u32,
    pub version: FwVersion,
}

impl LdcHeader {
    pub const SIZE: usize = 16 + FwVersion::SIZE;

    pub fn address_range(&self) -> AddressRange {
        AddressRange {
            base: self.base_address,
            len: self.data_length,
        }
    }
}

/// Range of firmware addresses covered by the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub base: u32,
    pub len: u32,
}

impl AddressRange {
    /// Inclusive on both ends, and never overflows for bases near `u32::MAX`.
    pub fn contains(&self, address: u32) -> bool {
        address >= self.base && address - self.base <= self.len
    }
}

/// Fixed-size header of a single metadata entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryHeader {
    pub level: u32,
    pub component_class: u32,
    pub has_ids: u32,
    pub params_num: u32,
    pub line_idx: u32,
    pub file_name_len: u32,
    pub text_len: u32,
}

impl EntryHeader {
    pub const SIZE: usize = 28;
}

/// A fully read metadata entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdcEntry {
    pub header: EntryHeader,
    pub file_name: Vec<u8>,
    pub text: Vec<u8>,
}

impl LdcEntry {
    pub fn has_ids(&self) -> bool {
        self.header.has_ids != 0
    }

    pub fn file_name(&self) -> String {
        c_string(&self.file_name)
    }

    pub fn text(&self) -> String {
        c_string(&self.text)
    }
}

/// Decode a NUL-terminated byte string, replacing invalid UTF-8.
pub(crate) fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

// === Trace stream ===

/// A single trace record as emitted by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraceRecord {
    pub core_id: u32,
    pub id_0: u32,
    pub id_1: u32,
    /// Hardware clock ticks.
    pub timestamp: u64,
    /// Firmware address of the entry describing this record.
    pub log_entry_address: u32,
}

impl TraceRecord {
    pub const SIZE: usize = 24;
    /// Offset of the address field within the record.
    pub const ADDRESS_OFFSET: usize = 20;
}

/// Parameter words trailing a trace record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Params {
    values: [u32; MAX_PARAMS as usize],
    len: usize,
}

impl Params {
    /// Build from a slice; anything beyond `MAX_PARAMS` is dropped.
    pub fn from_slice(values: &[u32]) -> Self {
        let mut p = Params::default();
        for (slot, v) in p.values.iter_mut().zip(values) {
            *slot = *v;
            p.len += 1;
        }
        p
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.values[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// === Levels and component classes ===

/// Firmware log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LogLevel {
    Critical = 1,
    Warning = 2,
    Info = 3,
    Debug = 4,
    Verbose = 5,
}

impl LogLevel {
    pub fn from_raw(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::Critical),
            2 => Some(Self::Warning),
            3 => Some(Self::Info),
            4 => Some(Self::Debug),
            5 => Some(Self::Verbose),
            _ => None,
        }
    }
}

/// Firmware component classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentClass {
    Irq,
    Ipc,
    Pipe,
    Host,
    Dai,
    Dma,
    Ssp,
    Comp,
    Wait,
    Lock,
    Mem,
    Mixer,
    Buffer,
    Volume,
    Switch,
    Mux,
    Src,
    Tone,
    EqFir,
    EqIir,
    Sa,
    Dmic,
    Power,
    Schedule,
    KeydetectDummy,
    Unknown,
}

impl ComponentClass {
    /// Older firmware stores the class as a tag in the top byte (`n << 24`).
    pub fn from_raw(raw: u32) -> Self {
        let ordinal = if raw >= 1 << 24 && raw & 0x00ff_ffff == 0 {
            raw >> 24
        } else {
            raw
        };
        match ordinal {
            1 => Self::Irq,
            2 => Self::Ipc,
            3 => Self::Pipe,
            4 => Self::Host,
            5 => Self::Dai,
            6 => Self::Dma,
            7 => Self::Ssp,
            8 => Self::Comp,
            9 => Self::Wait,
            10 => Self::Lock,
            11 => Self::Mem,
            12 => Self::Mixer,
            13 => Self::Buffer,
            14 => Self::Volume,
            15 => Self::Switch,
            16 => Self::Mux,
            17 => Self::Src,
            18 => Self::Tone,
            19 => Self::EqFir,
            20 => Self::EqIir,
            21 => Self::Sa,
            22 => Self::Dmic,
            23 => Self::Power,
            24 => Self::Schedule,
            25 => Self::KeydetectDummy,
            _ => Self::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Irq => "IRQ",
            Self::Ipc => "IPC",
            Self::Pipe => "PIPE",
            Self::Host => "HOST",
            Self::Dai => "DAI",
            Self::Dma => "DMA",
            Self::Ssp => "SSP",
            Self::Comp => "COMP",
            Self::Wait => "WAIT",
            Self::Lock => "LOCK",
            Self::Mem => "MEM",
            Self::Mixer => "MIXER",
            Self::Buffer => "BUFFER",
            Self::Volume => "VOLUME",
            Self::Switch => "SWITCH",
            Self::Mux => "MUX",
            Self::Src => "SRC",
            Self::Tone => "TONE",
            Self::EqFir => "EQ_FIR",
            Self::EqIir => "EQ_IIR",
            Self::Sa => "SA",
            Self::Dmic => "DMIC",
            Self::Power => "POWER",
            Self::Schedule => "SCHEDULE",
            Self::KeydetectDummy => "KEYDETECT_DUMMY",
            Self::Unknown => "unknown",
        }
    }
}

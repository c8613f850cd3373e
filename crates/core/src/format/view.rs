//! Typed, zero-copy accessors over a snapshot buffer.
//!
//! Every read is bounds-checked: a field outside the buffer reads as zero and
//! a vector running past the end is clamped, so an unverified buffer yields
//! garbage values but never a panic.

use std::fmt;
use std::marker::PhantomData;

use crate::format::{
    read_u16, read_u32, read_u64, read_u8, FormatError, FORMAT_VERSION, HDR_SLOTS, HDR_STRINGS,
    HDR_VERSION, HEADER_SIZE, IDENTIFIER, NO_STRING, NO_STRING_TYPE, REC_ADDRESS, REC_ATTRIBUTES,
    REC_BLOBS, REC_COMMENTS, REC_FLAGS, REC_HEADER_NONREPEATABLE, REC_HEADER_REPEATABLE,
    REC_HIDDENAREAS, REC_OBJECT_ID, REC_PARENT_ID, REC_PROTOTYPE, REC_REGISTERVIEWS, REC_SIGNATURES,
    REC_SIZE, REC_STRING_TYPE, REC_USERNAME, REC_USERNAME_FLAGS, REC_VALUEVIEWS, REC_XREFS,
    SLOT_SIZE,
};
use crate::model::{CommentType, ObjectId, ObjectType, Offset, Operand, SignatureAlgo, SignatureMethod};

/// Byte range of a string inside the snapshot buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrRef {
    pub offset: u32,
    pub len: u32,
}

impl StrRef {
    pub const EMPTY: StrRef = StrRef { offset: 0, len: 0 };

    /// Resolve against the buffer the reference was taken from.
    pub fn resolve<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        let start = self.offset as usize;
        let end = start.saturating_add(self.len as usize);
        bytes.get(start..end).unwrap_or(&[])
    }
}

/// Root of a snapshot buffer.
#[derive(Clone, Copy)]
pub struct RootView<'a> {
    bytes: &'a [u8],
}

impl fmt::Debug for RootView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootView").field("len", &self.bytes.len()).finish()
    }
}

impl<'a> RootView<'a> {
    /// Whether the buffer is large enough for a header and carries the identifier.
    pub fn has_identifier(bytes: &[u8]) -> bool {
        bytes.len() >= HEADER_SIZE && bytes[..IDENTIFIER.len()] == IDENTIFIER
    }

    /// Check the identifier and format version, then expose the buffer.
    pub fn new(bytes: &'a [u8]) -> Result<Self, FormatError> {
        if !Self::has_identifier(bytes) {
            return Err(FormatError::MissingIdentifier);
        }
        let root = Self { bytes };
        let found = root.format_version();
        if found != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion { found, expected: FORMAT_VERSION });
        }
        Ok(root)
    }

    /// Wrap a buffer whose header was already checked by `new`.
    pub(crate) fn new_unchecked(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn format_version(&self) -> u16 {
        read_u16(self.bytes, HDR_VERSION)
    }

    pub(crate) fn strings_offset(&self) -> usize {
        read_u32(self.bytes, HDR_STRINGS) as usize
    }

    /// Records of one kind. `Unknown` has no array and yields an empty one.
    pub fn versions(&self, object_type: ObjectType) -> VersionArray<'a> {
        let code = object_type.code() as usize;
        if code == 0 {
            return VersionArray { root: *self, start: 0, count: 0 };
        }
        let slot = HDR_SLOTS + (code - 1) * SLOT_SIZE;
        let start = read_u32(self.bytes, slot) as usize;
        let count = read_u32(self.bytes, slot + 4) as usize;
        let available = self.bytes.len().saturating_sub(start) / 4;
        VersionArray { root: *self, start, count: count.min(available) }
    }

    pub fn num_strings(&self) -> u32 {
        read_u32(self.bytes, self.strings_offset())
    }

    /// Byte range of string `index`, or `None` when absent or out of range.
    pub fn string_ref(&self, index: u32) -> Option<StrRef> {
        if index == NO_STRING || index >= self.num_strings() {
            return None;
        }
        let entry = self.strings_offset().saturating_add(4).saturating_add(index as usize * 8);
        Some(StrRef { offset: read_u32(self.bytes, entry), len: read_u32(self.bytes, entry + 4) })
    }

    /// String `index`, or `None` when absent, out of range, or not UTF-8.
    pub fn string(&self, index: u32) -> Option<&'a str> {
        let range = self.string_ref(index)?;
        std::str::from_utf8(range.resolve(self.bytes)).ok()
    }

    pub(crate) fn entries<T: Entry<'a>>(&self, vector_offset: u32) -> Entries<'a, T> {
        Entries::at(*self, vector_offset)
    }
}

/// Array of records of one kind.
#[derive(Debug, Clone, Copy)]
pub struct VersionArray<'a> {
    root: RootView<'a>,
    start: usize,
    count: usize,
}

impl<'a> VersionArray<'a> {
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, i: usize) -> Option<VersionView<'a>> {
        if i >= self.count {
            return None;
        }
        let pos = read_u32(self.root.bytes, self.start + i * 4) as usize;
        Some(VersionView { root: self.root, pos })
    }

    pub fn iter(&self) -> impl Iterator<Item = VersionView<'a>> + 'a {
        let array = *self;
        (0..array.count).filter_map(move |i| array.get(i))
    }
}

/// Typed accessor for one record.
#[derive(Debug, Clone, Copy)]
pub struct VersionView<'a> {
    root: RootView<'a>,
    pos: usize,
}

impl<'a> VersionView<'a> {
    pub(crate) fn at(root: RootView<'a>, pos: usize) -> Self {
        Self { root, pos }
    }

    /// Absolute offset of the record header.
    pub fn pos(&self) -> usize {
        self.pos
    }

    fn u32_at(&self, field: usize) -> u32 {
        read_u32(self.root.bytes, self.pos + field)
    }

    fn u64_at(&self, field: usize) -> u64 {
        read_u64(self.root.bytes, self.pos + field)
    }

    pub fn object_id(&self) -> ObjectId {
        self.u64_at(REC_OBJECT_ID)
    }

    pub fn parent_id(&self) -> ObjectId {
        self.u64_at(REC_PARENT_ID)
    }

    pub fn address(&self) -> Offset {
        self.u64_at(REC_ADDRESS)
    }

    pub fn size(&self) -> Offset {
        self.u64_at(REC_SIZE)
    }

    pub fn flags(&self) -> u32 {
        self.u32_at(REC_FLAGS)
    }

    pub fn username(&self) -> Option<&'a str> {
        self.root.string(self.u32_at(REC_USERNAME))
    }

    pub fn username_flags(&self) -> u32 {
        self.u32_at(REC_USERNAME_FLAGS)
    }

    pub fn prototype(&self) -> Option<&'a str> {
        self.root.string(self.u32_at(REC_PROTOTYPE))
    }

    pub fn header_comment(&self, repeatable: bool) -> Option<&'a str> {
        let field = if repeatable { REC_HEADER_REPEATABLE } else { REC_HEADER_NONREPEATABLE };
        self.root.string(self.u32_at(field))
    }

    pub fn string_type(&self) -> Option<u8> {
        match read_u8(self.root.bytes, self.pos + REC_STRING_TYPE) {
            NO_STRING_TYPE => None,
            value => Some(value),
        }
    }

    pub fn signatures(&self) -> Entries<'a, SignatureEntry<'a>> {
        self.root.entries(self.u32_at(REC_SIGNATURES))
    }

    pub fn xrefs(&self) -> Entries<'a, XrefEntry<'a>> {
        self.root.entries(self.u32_at(REC_XREFS))
    }

    pub fn comments(&self) -> Entries<'a, CommentEntry<'a>> {
        self.root.entries(self.u32_at(REC_COMMENTS))
    }

    pub fn value_views(&self) -> Entries<'a, ValueViewEntry<'a>> {
        self.root.entries(self.u32_at(REC_VALUEVIEWS))
    }

    pub fn register_views(&self) -> Entries<'a, RegisterViewEntry<'a>> {
        self.root.entries(self.u32_at(REC_REGISTERVIEWS))
    }

    pub fn hidden_areas(&self) -> Entries<'a, HiddenAreaEntry<'a>> {
        self.root.entries(self.u32_at(REC_HIDDENAREAS))
    }

    pub fn attributes(&self) -> Entries<'a, AttributeEntry<'a>> {
        self.root.entries(self.u32_at(REC_ATTRIBUTES))
    }

    pub fn blobs(&self) -> Entries<'a, BlobEntry<'a>> {
        self.root.entries(self.u32_at(REC_BLOBS))
    }
}

/// Fixed-size vector entry.
pub trait Entry<'a>: Copy {
    /// Encoded size in bytes.
    const SIZE: usize;

    fn at(root: RootView<'a>, pos: usize) -> Self;
}

/// Length-prefixed vector of fixed-size entries.
pub struct Entries<'a, T> {
    root: RootView<'a>,
    start: usize,
    count: usize,
    _entry: PhantomData<T>,
}

impl<T> Clone for Entries<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Entries<'_, T> {}

impl<'a, T: Entry<'a>> Entries<'a, T> {
    fn at(root: RootView<'a>, vector_offset: u32) -> Self {
        if vector_offset == 0 {
            return Self { root, start: 0, count: 0, _entry: PhantomData };
        }
        let pos = vector_offset as usize;
        let count = read_u32(root.bytes, pos) as usize;
        let start = pos.saturating_add(4);
        let available = root.bytes.len().saturating_sub(start) / T::SIZE;
        Self { root, start, count: count.min(available), _entry: PhantomData }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, i: usize) -> Option<T> {
        (i < self.count).then(|| T::at(self.root, self.start + i * T::SIZE))
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + 'a {
        let entries = *self;
        (0..entries.count).map(move |i| T::at(entries.root, entries.start + i * T::SIZE))
    }
}

macro_rules! entry_view {
    ($(#[$meta:meta])* $name:ident, $size:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name<'a> {
            root: RootView<'a>,
            pos: usize,
        }

        impl<'a> Entry<'a> for $name<'a> {
            const SIZE: usize = $size;

            fn at(root: RootView<'a>, pos: usize) -> Self {
                Self { root, pos }
            }
        }

        impl<'a> $name<'a> {
            /// Absolute offset of the entry.
            pub fn pos(&self) -> usize {
                self.pos
            }

            #[allow(dead_code)]
            fn u8_at(&self, field: usize) -> u8 {
                read_u8(self.root.bytes, self.pos + field)
            }

            #[allow(dead_code)]
            fn u32_at(&self, field: usize) -> u32 {
                read_u32(self.root.bytes, self.pos + field)
            }

            #[allow(dead_code)]
            fn u64_at(&self, field: usize) -> u64 {
                read_u64(self.root.bytes, self.pos + field)
            }
        }
    };
}

entry_view!(
    /// `method u8 | algo u8 | pad u16 | value u32`
    SignatureEntry,
    8
);
entry_view!(
    /// `offset u64 | target id u64 | operand u32 | attributes u32`
    XrefEntry,
    24
);
entry_view!(
    /// `offset u64 | type u8 | pad [u8; 3] | value u32`
    CommentEntry,
    16
);
entry_view!(
    /// `offset u64 | operand u32 | value u32`
    ValueViewEntry,
    16
);
entry_view!(
    /// `offset u64 | end offset u64 | name u32 | new name u32`
    RegisterViewEntry,
    24
);
entry_view!(
    /// `offset u64 | area size u64 | value u32 | pad u32`
    HiddenAreaEntry,
    24
);
entry_view!(
    /// `key u32 | value u32`
    AttributeEntry,
    8
);
entry_view!(
    /// `offset u64 | data offset u32 | data len u32`
    BlobEntry,
    16
);

impl<'a> SignatureEntry<'a> {
    pub fn method(&self) -> SignatureMethod {
        SignatureMethod::from_u8(self.u8_at(0))
    }

    pub fn algo(&self) -> SignatureAlgo {
        SignatureAlgo::from_u8(self.u8_at(1))
    }

    pub fn value(&self) -> Option<&'a str> {
        self.root.string(self.u32_at(4))
    }

    /// Byte range of the value, used as the index key.
    pub fn value_ref(&self) -> Option<StrRef> {
        self.root.string_ref(self.u32_at(4))
    }
}

impl<'a> XrefEntry<'a> {
    pub fn offset(&self) -> Offset {
        self.u64_at(0)
    }

    pub fn target_id(&self) -> ObjectId {
        self.u64_at(8)
    }

    pub fn operand(&self) -> Operand {
        self.u32_at(16)
    }

    pub fn attributes(&self) -> Entries<'a, AttributeEntry<'a>> {
        self.root.entries(self.u32_at(20))
    }
}

impl<'a> CommentEntry<'a> {
    pub fn offset(&self) -> Offset {
        self.u64_at(0)
    }

    pub fn comment_type(&self) -> CommentType {
        CommentType::from_u8(self.u8_at(8))
    }

    pub fn value(&self) -> Option<&'a str> {
        self.root.string(self.u32_at(12))
    }
}

impl<'a> ValueViewEntry<'a> {
    pub fn offset(&self) -> Offset {
        self.u64_at(0)
    }

    pub fn operand(&self) -> Operand {
        self.u32_at(8)
    }

    pub fn value(&self) -> Option<&'a str> {
        self.root.string(self.u32_at(12))
    }
}

impl<'a> RegisterViewEntry<'a> {
    pub fn offset(&self) -> Offset {
        self.u64_at(0)
    }

    pub fn end_offset(&self) -> Offset {
        self.u64_at(8)
    }

    pub fn register_name(&self) -> Option<&'a str> {
        self.root.string(self.u32_at(16))
    }

    pub fn register_new_name(&self) -> Option<&'a str> {
        self.root.string(self.u32_at(20))
    }
}

impl<'a> HiddenAreaEntry<'a> {
    pub fn offset(&self) -> Offset {
        self.u64_at(0)
    }

    pub fn area_size(&self) -> Offset {
        self.u64_at(8)
    }

    pub fn value(&self) -> Option<&'a str> {
        self.root.string(self.u32_at(16))
    }
}

impl<'a> AttributeEntry<'a> {
    pub fn key(&self) -> Option<&'a str> {
        self.root.string(self.u32_at(0))
    }

    pub fn value(&self) -> Option<&'a str> {
        self.root.string(self.u32_at(4))
    }
}

impl<'a> BlobEntry<'a> {
    pub fn offset(&self) -> Offset {
        self.u64_at(0)
    }

    pub fn data(&self) -> &'a [u8] {
        let range = StrRef { offset: self.u32_at(8), len: self.u32_at(12) };
        range.resolve(self.root.bytes)
    }
}

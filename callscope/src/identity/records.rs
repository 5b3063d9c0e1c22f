//! Interned identity records
//!
//! Records are created once and live for the whole session; they are only
//! ever referred to by id. Each level owns a fixed bucket table for the
//! level below it (objects own file buckets, files own function buckets).

use crate::classification::FunctionClass;
use crate::domain::{CxtId, FileId, FnId, ObjId};

use super::{N_FILE_ENTRIES, N_FN_ENTRIES};

/// One loaded binary object (executable or shared library)
#[derive(Debug)]
pub struct ObjectRecord {
    pub(super) name: String,
    pub(super) number: ObjId,
    pub(super) text_avma: u64,
    pub(super) text_size: u64,
    pub(super) text_bias: i64,
    pub(super) last_slash_pos: usize,
    pub(super) files: Box<[Vec<FileId>]>,
}

impl ObjectRecord {
    pub(super) fn new(
        name: String,
        number: ObjId,
        text_avma: u64,
        text_size: u64,
        text_bias: i64,
    ) -> Self {
        let last_slash_pos = name.rfind('/').map_or(0, |pos| pos + 1);
        Self {
            name,
            number,
            text_avma,
            text_size,
            text_bias,
            last_slash_pos,
            files: vec![Vec::new(); N_FILE_ENTRIES].into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name without its directory, for compact display
    #[must_use]
    pub fn short_name(&self) -> &str {
        &self.name[self.last_slash_pos..]
    }

    #[must_use]
    pub fn number(&self) -> ObjId {
        self.number
    }

    /// Start address of the text segment in the profiled address space
    #[must_use]
    pub fn text_avma(&self) -> u64 {
        self.text_avma
    }

    #[must_use]
    pub fn text_size(&self) -> u64 {
        self.text_size
    }

    /// Difference between runtime and link-time addresses
    #[must_use]
    pub fn text_bias(&self) -> i64 {
        self.text_bias
    }
}

/// One source file inside an object
#[derive(Debug)]
pub struct FileRecord {
    pub(super) name: String,
    pub(super) number: FileId,
    pub(super) object: ObjId,
    pub(super) functions: Box<[Vec<FnId>]>,
}

impl FileRecord {
    pub(super) fn new(name: String, number: FileId, object: ObjId) -> Self {
        Self {
            name,
            number,
            object,
            functions: vec![Vec::new(); N_FN_ENTRIES].into_boxed_slice(),
        }
    }

    /// Absolute path (directory and file joined by `/` when a directory is known)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn number(&self) -> FileId {
        self.number
    }

    /// Owning object
    #[must_use]
    pub fn object(&self) -> ObjId {
        self.object
    }
}

/// One distinct function name inside a file
#[derive(Debug)]
pub struct FunctionRecord {
    pub(super) name: String,
    pub(super) number: FnId,
    pub(super) file: FileId,
    pub(super) class: FunctionClass,
    pub(super) pure_context: Option<CxtId>,
    /// Last context this function resolved to. A hint, never authoritative.
    pub(super) last_context: Option<CxtId>,
}

impl FunctionRecord {
    pub(super) fn new(name: String, number: FnId, file: FileId) -> Self {
        Self {
            name,
            number,
            file,
            class: FunctionClass::default(),
            pure_context: None,
            last_context: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn number(&self) -> FnId {
        self.number
    }

    #[must_use]
    pub fn file(&self) -> FileId {
        self.file
    }

    #[must_use]
    pub fn class(&self) -> FunctionClass {
        self.class
    }

    #[must_use]
    pub fn is_malloc(&self) -> bool {
        self.class.is_malloc
    }

    #[must_use]
    pub fn is_realloc(&self) -> bool {
        self.class.is_realloc
    }

    #[must_use]
    pub fn is_free(&self) -> bool {
        self.class.is_free
    }

    /// The depth-1 context containing only this function
    ///
    /// `None` until the function has been seen through the session.
    #[must_use]
    pub fn pure_context(&self) -> Option<CxtId> {
        self.pure_context
    }

    /// Front-cache hint (validated by the context table before use)
    #[must_use]
    pub fn last_context(&self) -> Option<CxtId> {
        self.last_context
    }

    pub(crate) fn front_cache_mut(&mut self) -> &mut Option<CxtId> {
        &mut self.last_context
    }

    /// Freeze the attributes computed at first sight.
    pub(crate) fn freeze_first_sight(&mut self, pure_context: Option<CxtId>, class: FunctionClass) {
        assert!(self.pure_context.is_none(), "first-sight attributes of '{}' already fixed", self.name);
        self.pure_context = pure_context;
        self.class = class;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name_strips_directory() {
        let obj = ObjectRecord::new("/usr/lib/libc.so.6".to_string(), ObjId(1), 0, 0, 0);
        assert_eq!(obj.short_name(), "libc.so.6");

        let anon = ObjectRecord::new("???".to_string(), ObjId(2), 0, 0, 0);
        assert_eq!(anon.short_name(), "???");
    }

    #[test]
    #[should_panic(expected = "already fixed")]
    fn test_first_sight_attributes_are_frozen() {
        let mut f = FunctionRecord::new("main".to_string(), FnId(1), FileId(1));
        f.freeze_first_sight(Some(CxtId(0)), FunctionClass::default());
        f.freeze_first_sight(Some(CxtId(1)), FunctionClass::default());
    }
}

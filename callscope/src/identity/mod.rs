//! # Identity Tables
//!
//! Interns binary objects, source files and functions so that every distinct
//! function observed during a run maps to exactly one long-lived
//! [`FunctionRecord`] with a unique sequence number.
//!
//! ```text
//!  object buckets (47)
//!  ┌────┐
//!  │ 12 │──▶ ObjectRecord "/usr/bin/app"
//!  └────┘        │ file buckets (53)
//!                ▼
//!           FileRecord "src/main.c"
//!                │ function buckets (87)
//!                ▼
//!           FunctionRecord "main"  (FnId = sequence number)
//! ```
//!
//! Table sizes are fixed: the tables are sized generously for typical
//! programs and collisions are chained. Keys are hashed with a polynomial
//! rolling hash (`hash = (256 * hash + byte) mod size`).
//!
//! Records are stored in per-level arenas and referenced by id; nothing is
//! ever removed during a session.

pub mod records;

pub use records::{FileRecord, FunctionRecord, ObjectRecord};

use log::trace;

use crate::domain::{FileId, FnId, ObjId};
use crate::symbolization::ModuleInfo;

/// Bucket count of the object table
pub const N_OBJ_ENTRIES: usize = 47;
/// Bucket count of each object's file table
pub const N_FILE_ENTRIES: usize = 53;
/// Bucket count of each file's function table
pub const N_FN_ENTRIES: usize = 87;

/// Name shared by all objects without debug information
pub const ANONYMOUS_OBJ: &str = "???";

const HASH_CONSTANT: usize = 256;

/// Polynomial rolling hash of `s`, reduced modulo `table_size` at every step.
pub(crate) fn str_hash(s: &str, table_size: usize) -> usize {
    s.bytes().fold(0, |hash, byte| (HASH_CONSTANT * hash + usize::from(byte)) % table_size)
}

/// Join a directory and a file name into one path; an empty directory is allowed.
#[must_use]
pub fn file_path(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}

/// Object, file and function interning tables
///
/// Functions are only interned through
/// [`Session::intern_function`](crate::session::Session::intern_function),
/// which also fixes their first-sight attributes:
///
/// ```compile_fail
/// use callscope::identity::IdentityTables;
///
/// let mut tables = IdentityTables::new();
/// let obj = tables.intern_object(None);
/// let file = tables.intern_file(obj, "", "main.c");
/// tables.intern_function_entry(file, "main");
/// ```
#[derive(Debug)]
pub struct IdentityTables {
    objects: Vec<ObjectRecord>,
    obj_buckets: Box<[Vec<ObjId>]>,
    files: Vec<FileRecord>,
    functions: Vec<FunctionRecord>,
}

impl IdentityTables {
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            obj_buckets: vec![Vec::new(); N_OBJ_ENTRIES].into_boxed_slice(),
            files: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Intern the object described by `module` (`None` = no debug info).
    pub fn intern_object(&mut self, module: Option<&ModuleInfo>) -> ObjId {
        self.intern_object_entry(module).0
    }

    /// Intern a source file of `object`; `dir` may be empty.
    pub fn intern_file(&mut self, object: ObjId, dir: &str, file: &str) -> FileId {
        let path = file_path(dir, file);
        let bucket = str_hash(&path, N_FILE_ENTRIES);

        let obj = &self.objects[object.index()];
        if let Some(&id) = obj.files[bucket].iter().find(|&&id| self.files[id.index()].name == path)
        {
            return id;
        }

        let id = FileId(next_number(self.files.len()));
        trace!("new file {id}: '{path}' in {object}");
        self.files.push(FileRecord::new(path, id, object));
        self.objects[object.index()].files[bucket].push(id);
        id
    }

    /// Like [`intern_object`](Self::intern_object), also reporting whether the
    /// record is new or has just received its text addresses.
    ///
    /// An object first interned by name only (zero text size) takes the
    /// addresses of the first descriptor that has them.
    pub(crate) fn intern_object_entry(&mut self, module: Option<&ModuleInfo>) -> (ObjId, bool) {
        let name = module.map_or(ANONYMOUS_OBJ, |m| m.name.as_str());
        let bucket = str_hash(name, N_OBJ_ENTRIES);

        if let Some(&id) =
            self.obj_buckets[bucket].iter().find(|&&id| self.objects[id.index()].name == name)
        {
            let record = &mut self.objects[id.index()];
            let described = match module {
                Some(m) if record.text_size == 0 && m.text_size != 0 => {
                    record.text_avma = m.text_avma;
                    record.text_size = m.text_size;
                    record.text_bias = m.text_bias;
                    trace!("object {id}: text at 0x{:x} ({} bytes)", m.text_avma, m.text_size);
                    true
                }
                _ => false,
            };
            return (id, described);
        }

        let id = ObjId(next_number(self.objects.len()));
        let record = match module {
            Some(m) => ObjectRecord::new(m.name.clone(), id, m.text_avma, m.text_size, m.text_bias),
            None => ObjectRecord::new(ANONYMOUS_OBJ.to_string(), id, 0, 0, 0),
        };
        trace!("new object {id}: '{}'", record.name);
        self.objects.push(record);
        self.obj_buckets[bucket].push(id);
        (id, true)
    }

    /// Intern a function of `file`, also reporting whether the record is new.
    ///
    /// This only creates the record. First-sight attributes (pure context,
    /// allocator flags) are filled in by
    /// [`Session::intern_function`](crate::session::Session::intern_function).
    pub(crate) fn intern_function_entry(&mut self, file: FileId, name: &str) -> (FnId, bool) {
        let bucket = str_hash(name, N_FN_ENTRIES);

        let rec = &self.files[file.index()];
        if let Some(&id) =
            rec.functions[bucket].iter().find(|&&id| self.functions[id.index()].name == name)
        {
            return (id, false);
        }

        let id = FnId(next_number(self.functions.len()));
        trace!("new function {id}: '{name}' in {file}");
        self.functions.push(FunctionRecord::new(name.to_string(), id, file));
        self.files[file.index()].functions[bucket].push(id);
        (id, true)
    }

    #[must_use]
    pub fn object(&self, id: ObjId) -> &ObjectRecord {
        &self.objects[id.index()]
    }

    #[must_use]
    pub fn file(&self, id: FileId) -> &FileRecord {
        &self.files[id.index()]
    }

    #[must_use]
    pub fn function(&self, id: FnId) -> &FunctionRecord {
        &self.functions[id.index()]
    }

    pub(crate) fn function_mut(&mut self, id: FnId) -> &mut FunctionRecord {
        &mut self.functions[id.index()]
    }

    /// Object that (through its file) owns function `id`
    #[must_use]
    pub fn object_of(&self, id: FnId) -> &ObjectRecord {
        self.object(self.file(self.function(id).file).object)
    }

    /// All functions in sequence-number order
    pub fn functions(&self) -> impl Iterator<Item = &FunctionRecord> {
        self.functions.iter()
    }

    #[must_use]
    pub fn distinct_objects(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn distinct_files(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn distinct_functions(&self) -> usize {
        self.functions.len()
    }
}

impl Default for IdentityTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Sequence number for the next record of an arena currently holding `len` records.
fn next_number(len: usize) -> u32 {
    u32::try_from(len + 1).unwrap_or_else(|_| panic!("identity table overflow at {len} records"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str) -> ModuleInfo {
        ModuleInfo { name: name.to_string(), text_avma: 0x1000, text_size: 0x200, text_bias: 0 }
    }

    #[test]
    fn test_str_hash_matches_rolling_formula() {
        // ((0*256 + 'a') * 256 + 'b') mod 47
        let expected = ((usize::from(b'a') % 47) * 256 + usize::from(b'b')) % 47;
        assert_eq!(str_hash("ab", 47), expected);
        assert_eq!(str_hash("", 47), 0);
        assert!(str_hash("/usr/lib/x86_64-linux-gnu/libc.so.6", N_OBJ_ENTRIES) < N_OBJ_ENTRIES);
    }

    #[test]
    fn test_file_path_joins_directory() {
        assert_eq!(file_path("/src", "main.c"), "/src/main.c");
        assert_eq!(file_path("", "main.c"), "main.c");
    }

    #[test]
    fn test_intern_object_is_idempotent() {
        let mut tables = IdentityTables::new();
        let app = module("/usr/bin/app");

        let a = tables.intern_object(Some(&app));
        let b = tables.intern_object(Some(&app));
        assert_eq!(a, b);
        assert_eq!(a, ObjId(1));
        assert_eq!(tables.object(a).text_avma(), 0x1000);
        assert_eq!(tables.distinct_objects(), 1);
    }

    #[test]
    fn test_name_only_object_takes_later_addresses() {
        let mut tables = IdentityTables::new();
        let bare = ModuleInfo { name: "/usr/bin/app".into(), text_avma: 0, text_size: 0, text_bias: 0 };

        let (id, created) = tables.intern_object_entry(Some(&bare));
        assert!(created);
        let (same, described) = tables.intern_object_entry(Some(&module("/usr/bin/app")));
        assert_eq!(same, id);
        assert!(described);
        assert_eq!(tables.object(id).text_avma(), 0x1000);
        assert_eq!(tables.object(id).text_size(), 0x200);

        // Once described, later descriptors do not change it
        let moved = ModuleInfo { text_avma: 0x9000, ..module("/usr/bin/app") };
        assert_eq!(tables.intern_object_entry(Some(&moved)), (id, false));
        assert_eq!(tables.intern_object_entry(Some(&bare)), (id, false));
        assert_eq!(tables.object(id).text_avma(), 0x1000);
    }

    #[test]
    fn test_anonymous_objects_are_shared() {
        let mut tables = IdentityTables::new();
        let a = tables.intern_object(None);
        let b = tables.intern_object(None);
        assert_eq!(a, b);
        assert_eq!(tables.object(a).name(), ANONYMOUS_OBJ);
        assert_eq!(tables.object(a).text_size(), 0);
    }

    #[test]
    fn test_same_file_name_in_different_objects() {
        let mut tables = IdentityTables::new();
        let app = tables.intern_object(Some(&module("/usr/bin/app")));
        let lib = tables.intern_object(Some(&module("/usr/lib/libfoo.so")));

        let f1 = tables.intern_file(app, "src", "util.c");
        let f2 = tables.intern_file(lib, "src", "util.c");
        assert_ne!(f1, f2);
        assert_eq!(tables.intern_file(app, "src", "util.c"), f1);
        assert_eq!(tables.file(f2).name(), "src/util.c");
        assert_eq!(tables.file(f2).object(), lib);
    }

    #[test]
    fn test_function_sequence_numbers_increase() {
        let mut tables = IdentityTables::new();
        let obj = tables.intern_object(None);
        let file = tables.intern_file(obj, "", "main.c");

        let ids: Vec<FnId> =
            ["main", "foo", "bar"].iter().map(|n| tables.intern_function_entry(file, n).0).collect();
        assert_eq!(ids, vec![FnId(1), FnId(2), FnId(3)]);
        assert_eq!(tables.intern_function_entry(file, "foo"), (FnId(2), false));
        assert_eq!(tables.distinct_functions(), 3);
        assert_eq!(tables.object_of(FnId(3)).number(), obj);
    }

    #[test]
    fn test_colliding_names_are_chained() {
        let mut tables = IdentityTables::new();
        let obj = tables.intern_object(None);
        let file = tables.intern_file(obj, "", "gen.c");

        // Far more names than buckets forces collisions
        let ids: Vec<FnId> =
            (0..500).map(|i| tables.intern_function_entry(file, &format!("fn_{i}")).0).collect();
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(tables.intern_function_entry(file, &format!("fn_{i}")), (*id, false));
            assert_eq!(tables.function(*id).name(), format!("fn_{i}"));
        }
    }
}

//! Flat-file record storage.
//!
//! Each entity lives in its own newline-delimited file. Records are only ever
//! created by [`RecordStore::append`] and only ever changed through the
//! scan-rewrite protocol in [`RecordStore::rewrite`]: every line is copied to a
//! temporary file in the same directory, the selected records are replaced or
//! dropped on the way, and the temporary file is promoted over the original with
//! a single rename once it is completely written and synced. Nothing touches the
//! original file before that rename, so a failed or abandoned rewrite leaves it
//! byte-for-byte intact.
//!
//! Lookups are linear scans. The [`RecordStore`] trait keeps that contract
//! behind an interface so an indexed backend can replace [`FlatFileStore`]
//! without changing the services built on top of it.

pub mod codec;

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::iter;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::{Result, ServiceError};
use codec::{FieldError, RawRecord};

/// An entity that is persisted as one line of its own file.
pub trait Record: Clone + Sized {
    /// File name inside the data directory.
    const FILE_NAME: &'static str;

    fn id(&self) -> u32;

    /// Field values in on-disk order.
    fn to_fields(&self) -> Vec<String>;

    fn from_raw(raw: &RawRecord) -> std::result::Result<Self, FieldError>;
}

/// What a rewrite does with one decoded record.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<R> {
    Keep,
    Replace(R),
    Remove,
}

/// File-level access for one entity type.
pub trait RecordStore<R: Record> {
    /// Appends one record, creating the file if needed. Existing lines are never rewritten.
    fn append(&self, record: &R) -> Result<()>;

    /// Decoded records in file order. Every call reopens the file from the start;
    /// lines that do not decode are skipped.
    fn scan(&self) -> Result<Box<dyn Iterator<Item = Result<R>> + '_>>;

    /// Applies `decide` to every decoded record and atomically replaces the file
    /// with the result. Returns the number of records replaced or removed;
    /// `NotFound` when that number would be zero, in which case the file is left
    /// untouched.
    fn rewrite<F>(&self, decide: F) -> Result<usize>
    where
        F: FnMut(&R) -> Change<R>;

    /// `max(existing ids) + 1`, or 1 for an absent or empty file.
    fn next_id(&self) -> Result<u32>;

    /// True once the backing storage has been created.
    fn exists(&self) -> bool;

    fn find_by_id(&self, id: u32) -> Result<Option<R>> {
        for record in self.scan()? {
            let record = record?;
            if record.id() == id {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn find_first<P>(&self, mut predicate: P) -> Result<Option<R>>
    where
        P: FnMut(&R) -> bool,
    {
        for record in self.scan()? {
            let record = record?;
            if predicate(&record) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn load_all(&self) -> Result<Vec<R>> {
        self.scan()?.collect()
    }

    /// Replaces every record matching `predicate` with `transform(record)`.
    fn mutate_all<P, T>(&self, mut predicate: P, mut transform: T) -> Result<usize>
    where
        P: FnMut(&R) -> bool,
        T: FnMut(R) -> R,
    {
        self.rewrite(|record| {
            if predicate(record) {
                Change::Replace(transform(record.clone()))
            } else {
                Change::Keep
            }
        })
    }

    /// Replaces the record with `id` by `transform(record)` and returns the
    /// stored result.
    fn update_by_id<T>(&self, id: u32, mut transform: T) -> Result<R>
    where
        T: FnMut(R) -> R,
    {
        let mut updated = None;
        self.mutate_all(
            |record| record.id() == id,
            |record| {
                let record = transform(record);
                updated = Some(record.clone());
                record
            },
        )?;
        updated.ok_or_else(|| ServiceError::NotFound(format!("record {} not found", id)))
    }

    /// Drops every record matching `predicate` from the file.
    fn remove_where<P>(&self, mut predicate: P) -> Result<usize>
    where
        P: FnMut(&R) -> bool,
    {
        self.rewrite(|record| {
            if predicate(record) {
                Change::Remove
            } else {
                Change::Keep
            }
        })
    }
}

/// [`RecordStore`] over a single newline-delimited file.
#[derive(Debug)]
pub struct FlatFileStore<R> {
    path: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for FlatFileStore<R> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> FlatFileStore<R> {
    /// Store for `R::FILE_NAME` inside `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self::at_path(data_dir.as_ref().join(R::FILE_NAME))
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_existing(&self) -> Result<Option<File>> {
        match File::open(&self.path) {
            Ok(file) => Ok(Some(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn not_matched(&self) -> ServiceError {
        ServiceError::NotFound(format!("no matching record in {}", self.path.display()))
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

/// Decodes one raw line, logging and returning `None` for lines that cannot be
/// read as an `R`.
fn decode_line<R: Record>(path: &Path, line_no: usize, line: &[u8]) -> Option<R> {
    if is_blank(line) {
        return None;
    }
    let text = match std::str::from_utf8(line) {
        Ok(text) => text,
        Err(err) => {
            warn!(file = %path.display(), line = line_no, error = %err, "skipping non-UTF-8 record");
            return None;
        }
    };
    match R::from_raw(&RawRecord::parse(text)) {
        Ok(record) => Some(record),
        Err(err) => {
            let err = ServiceError::MalformedRecord {
                path: path.to_path_buf(),
                reason: format!("line {line_no}: {err}"),
            };
            warn!(error = %err, "skipping malformed record");
            None
        }
    }
}

/// True when the file is non-empty and its last byte is not a newline.
fn lacks_final_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

impl<R: Record> RecordStore<R> for FlatFileStore<R> {
    fn append(&self, record: &R) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut line = String::new();
        if lacks_final_newline(&mut file)? {
            line.push('\n');
        }
        line.push_str(&codec::encode_record(record.to_fields()));
        line.push('\n');
        file.write_all(line.as_bytes())?;

        debug!(file = %self.path.display(), id = record.id(), "appended record");
        Ok(())
    }

    fn scan(&self) -> Result<Box<dyn Iterator<Item = Result<R>> + '_>> {
        let Some(file) = self.open_existing()? else {
            return Ok(Box::new(iter::empty()));
        };

        let lines = BufReader::new(file).split(b'\n').enumerate();
        Ok(Box::new(lines.filter_map(move |(index, line)| match line {
            Ok(line) => decode_line::<R>(&self.path, index + 1, &line).map(Ok),
            Err(err) => Some(Err(err.into())),
        })))
    }

    fn rewrite<F>(&self, mut decide: F) -> Result<usize>
    where
        F: FnMut(&R) -> Change<R>,
    {
        let Some(source) = self.open_existing()? else {
            return Err(self.not_matched());
        };
        let permissions = source.metadata()?.permissions();

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "records".to_string());
        let mut staged = tempfile::Builder::new()
            .prefix(&format!(".{}_", stem))
            .suffix(".tmp")
            .tempfile_in(dir)?;

        let mut changed = 0usize;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            for (index, line) in BufReader::new(source).split(b'\n').enumerate() {
                let line = line?;
                let Some(record) = decode_line::<R>(&self.path, index + 1, &line) else {
                    // Lines we cannot decode are carried over unchanged.
                    if !is_blank(&line) {
                        writer.write_all(&line)?;
                        writer.write_all(b"\n")?;
                    }
                    continue;
                };

                match decide(&record) {
                    Change::Keep => {
                        writer.write_all(&line)?;
                        writer.write_all(b"\n")?;
                    }
                    Change::Replace(updated) => {
                        changed += 1;
                        writer.write_all(codec::encode_record(updated.to_fields()).as_bytes())?;
                        writer.write_all(b"\n")?;
                    }
                    Change::Remove => changed += 1,
                }
            }
            writer.flush()?;
        }

        if changed == 0 {
            debug!(file = %self.path.display(), "no record matched; discarding staged rewrite");
            return Err(self.not_matched());
        }

        staged.as_file().sync_all()?;
        fs::set_permissions(staged.path(), permissions)?;
        staged
            .persist(&self.path)
            .map_err(|err| ServiceError::Io(err.error))?;

        info!(file = %self.path.display(), changed, "rewrote record file");
        Ok(changed)
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn next_id(&self) -> Result<u32> {
        let Some(file) = self.open_existing()? else {
            return Ok(1);
        };

        let mut max_id = 0u32;
        for line in BufReader::new(file).split(b'\n') {
            let line = line?;
            let id = std::str::from_utf8(&line)
                .ok()
                .and_then(|text| codec::decode_field(text, 0))
                .and_then(|field| field.trim().parse::<u32>().ok());
            if let Some(id) = id {
                max_id = max_id.max(id);
            }
        }
        max_id.checked_add(1).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "id space exhausted in {}",
                self.path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: u32,
        body: String,
    }

    impl Record for Note {
        const FILE_NAME: &'static str = "notes.csv";

        fn id(&self) -> u32 {
            self.id
        }

        fn to_fields(&self) -> Vec<String> {
            vec![self.id.to_string(), self.body.clone()]
        }

        fn from_raw(raw: &RawRecord) -> std::result::Result<Self, FieldError> {
            Ok(Self {
                id: raw.parse_field(0)?,
                body: raw.text(1)?.to_string(),
            })
        }
    }

    fn note(id: u32, body: &str) -> Note {
        Note {
            id,
            body: body.to_string(),
        }
    }

    fn store() -> (TempDir, FlatFileStore<Note>) {
        let dir = TempDir::new().unwrap();
        let store = FlatFileStore::new(dir.path());
        (dir, store)
    }

    fn leftover_temp_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn scan_of_absent_file_is_empty() {
        let (_dir, store) = store();
        assert_eq!(store.scan().unwrap().count(), 0);
        assert_eq!(store.next_id().unwrap(), 1);
        assert_eq!(store.find_by_id(1).unwrap(), None);
    }

    #[test]
    fn append_then_scan_preserves_order_and_content() {
        let (_dir, store) = store();
        let notes = vec![note(1, "first"), note(2, "has, comma"), note(3, "\"quoted\"")];
        for n in &notes {
            store.append(n).unwrap();
        }
        assert_eq!(store.load_all().unwrap(), notes);

        // A second scan starts from the beginning again.
        assert_eq!(store.scan().unwrap().count(), 3);
    }

    #[test]
    fn append_creates_missing_data_directory() {
        let dir = TempDir::new().unwrap();
        let store: FlatFileStore<Note> = FlatFileStore::new(dir.path().join("nested/data"));
        store.append(&note(1, "x")).unwrap();
        assert!(store.exists());
    }

    #[test]
    fn append_starts_new_line_when_file_lacks_trailing_newline() {
        let (_dir, store) = store();
        fs::write(store.path(), "1,first").unwrap();
        store.append(&note(2, "second")).unwrap();
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "1,first\n2,second\n"
        );
    }

    #[test]
    fn next_id_is_max_plus_one() {
        let (_dir, store) = store();
        for id in [1, 3, 7] {
            store.append(&note(id, "n")).unwrap();
        }
        assert_eq!(store.next_id().unwrap(), 8);
    }

    #[test]
    fn next_id_counts_rows_whose_other_fields_are_malformed() {
        let (_dir, store) = store();
        fs::write(store.path(), "1,a\n9\n").unwrap();
        assert_eq!(store.next_id().unwrap(), 10);
    }

    #[test]
    fn next_id_refuses_to_wrap_past_the_largest_id() {
        let (_dir, store) = store();
        fs::write(store.path(), "4294967295,a\n").unwrap();
        assert_matches!(
            store.next_id(),
            Err(ServiceError::ValidationError(msg)) if msg.contains("id space exhausted")
        );
    }

    #[test]
    fn scan_skips_malformed_lines_without_aborting() {
        let (_dir, store) = store();
        fs::write(store.path(), "1,a\nnot-an-id,b\n\n3\n4,d\n").unwrap();
        let ids: Vec<u32> = store
            .scan()
            .unwrap()
            .map(|n| n.unwrap().id)
            .collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn find_by_id_returns_first_match() {
        let (_dir, store) = store();
        fs::write(store.path(), "2,first\n2,second\n").unwrap();
        assert_eq!(store.find_by_id(2).unwrap(), Some(note(2, "first")));
    }

    #[test]
    fn mutate_all_rewrites_matching_records_in_place() {
        let (dir, store) = store();
        for (id, body) in [(1, "a"), (2, "b"), (3, "c")] {
            store.append(&note(id, body)).unwrap();
        }

        let changed = store
            .mutate_all(|n| n.id == 2, |mut n| {
                n.body = "b, revised".into();
                n
            })
            .unwrap();

        assert_eq!(changed, 1);
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "1,a\n2,\"b, revised\"\n3,c\n"
        );
        assert!(leftover_temp_files(dir.path()).is_empty());
    }

    #[test]
    fn mutate_all_without_match_leaves_file_byte_identical() {
        let (dir, store) = store();
        let original = "1,\"legacy\"\r\n2,b\n\nbroken line\n";
        fs::write(store.path(), original).unwrap();

        let result = store.mutate_all(|n| n.id == 99, |n| n);

        assert_matches!(result, Err(ServiceError::NotFound(_)));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), original);
        assert!(leftover_temp_files(dir.path()).is_empty());
    }

    #[test]
    fn rewrite_of_absent_file_reports_not_found() {
        let (_dir, store) = store();
        assert_matches!(
            store.mutate_all(|_| true, |n| n),
            Err(ServiceError::NotFound(_))
        );
        assert!(!store.exists());
    }

    #[test]
    fn rewrite_carries_undecodable_lines_through() {
        let (_dir, store) = store();
        fs::write(store.path(), "1,a\ngarbage\n2,b\n").unwrap();

        store.remove_where(|n| n.id == 1).unwrap();

        assert_eq!(fs::read_to_string(store.path()).unwrap(), "garbage\n2,b\n");
    }

    #[test]
    fn update_by_id_returns_stored_value() {
        let (_dir, store) = store();
        store.append(&note(1, "a")).unwrap();
        store.append(&note(2, "b")).unwrap();

        let updated = store
            .update_by_id(2, |mut n| {
                n.body.push_str(", edited");
                n
            })
            .unwrap();
        assert_eq!(updated, note(2, "b, edited"));
        assert_eq!(store.find_by_id(2).unwrap(), Some(updated));
        assert_matches!(
            store.update_by_id(5, |n| n),
            Err(ServiceError::NotFound(_))
        );
    }

    #[test]
    fn remove_where_omits_matching_records() {
        let (_dir, store) = store();
        for id in 1..=3 {
            store.append(&note(id, "x")).unwrap();
        }
        assert_eq!(store.remove_where(|n| n.id != 2).unwrap(), 2);
        assert_eq!(store.load_all().unwrap(), vec![note(2, "x")]);
        // Allocation only sees the rows that remain.
        assert_eq!(store.next_id().unwrap(), 3);
    }

    #[test]
    fn rewrite_mixes_replace_and_keep() {
        let (_dir, store) = store();
        for id in 1..=4 {
            store.append(&note(id, "x")).unwrap();
        }
        let changed = store
            .rewrite(|n| match n.id {
                1 => Change::Remove,
                3 => Change::Replace(note(3, "y")),
                _ => Change::Keep,
            })
            .unwrap();
        assert_eq!(changed, 2);
        assert_eq!(
            store.load_all().unwrap(),
            vec![note(2, "x"), note(3, "y"), note(4, "x")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store();
        store.append(&note(1, "x")).unwrap();
        fs::set_permissions(store.path(), fs::Permissions::from_mode(0o640)).unwrap();

        store.mutate_all(|_| true, |n| n).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_in_read_only_directory_fails_and_keeps_original() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, store) = store();
        store.append(&note(1, "keep")).unwrap();
        let before = fs::read(store.path()).unwrap();

        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o555)).unwrap();
        // Root ignores directory permissions.
        if tempfile::tempfile_in(dir.path()).is_ok() {
            fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = store.mutate_all(|_| true, |n| Note { body: "lost".into(), ..n });
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();

        assert_matches!(result, Err(ServiceError::Io(_)));
        assert_eq!(fs::read(store.path()).unwrap(), before);
        assert!(leftover_temp_files(dir.path()).is_empty());
    }
}

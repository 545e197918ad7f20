//! Authoring-service seam: the operations the copier needs from the tool
//! that owns the document format, plus a file-backed text adapter.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::conf::{C_MARKER_PROPERTY_LINE, C_MARKER_REFERENCE_LINE};

/// Opaque handle of an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(pub u64);

#[derive(Debug, Error)]
pub enum AuthoringError {
    #[error("authoring service is not connected")]
    NotConnected,
    #[error("authoring service connection failed: {message}")]
    ConnectFailed { message: String },
    #[error("failed to open document {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to save document {}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unknown document handle {}", handle.0)]
    UnknownHandle { handle: DocumentHandle },
    #[error("reference {} not found in document", path.display())]
    ReferenceNotFound { path: PathBuf },
    #[error("{message}")]
    Other { message: String },
}

pub type AuthoringResult<T> = Result<T, AuthoringError>;

/// Document operations used by the reference-aware copier.
///
/// Calls are made sequentially from one thread; implementations may hold
/// process-wide state such as an automation session.
pub trait DocumentAuthoringService {
    /// Attach to the authoring tool. Failure aborts the whole run.
    fn connect(&mut self) -> AuthoringResult<()> {
        Ok(())
    }

    fn open(&mut self, path: &Path) -> AuthoringResult<DocumentHandle>;

    /// Write the open document to `path_new`; the handle stays valid.
    fn save_as(&mut self, handle: DocumentHandle, path_new: &Path) -> AuthoringResult<()>;

    fn save(&mut self, handle: DocumentHandle) -> AuthoringResult<()>;

    fn close(&mut self, handle: DocumentHandle) -> AuthoringResult<()>;

    /// Full paths of every document referenced by `handle`.
    fn enumerate_references(&mut self, handle: DocumentHandle) -> AuthoringResult<Vec<PathBuf>>;

    fn repoint_reference(
        &mut self,
        handle: DocumentHandle,
        path_old: &Path,
        path_new: &Path,
    ) -> AuthoringResult<()>;

    /// Set or create document properties; the document still needs a save.
    ///
    /// Services without document properties ignore the call.
    fn set_properties(
        &mut self,
        _handle: DocumentHandle,
        _properties: &[(String, String)],
    ) -> AuthoringResult<()> {
        Ok(())
    }

    fn set_silent_mode(&mut self, enabled: bool) -> AuthoringResult<()>;

    fn set_user_interaction_disabled(&mut self, disabled: bool) -> AuthoringResult<()>;
}

////////////////////////////////////////////////////////////////////////////////
// #region SilentSession

/// Silent mode on and user interaction off for the guard's lifetime.
///
/// Both settings are restored on drop, including on early return.
pub struct SilentSession<'a, S: DocumentAuthoringService + ?Sized> {
    service: &'a mut S,
}

impl<'a, S: DocumentAuthoringService + ?Sized> SilentSession<'a, S> {
    pub fn enter(service: &'a mut S) -> AuthoringResult<Self> {
        service.set_silent_mode(true)?;
        if let Err(e) = service.set_user_interaction_disabled(true) {
            if let Err(e_restore) = service.set_silent_mode(false) {
                warn!(error = %e_restore, "failed to restore silent mode");
            }
            return Err(e);
        }
        Ok(Self { service })
    }
}

impl<S: DocumentAuthoringService + ?Sized> Deref for SilentSession<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.service
    }
}

impl<S: DocumentAuthoringService + ?Sized> DerefMut for SilentSession<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.service
    }
}

impl<S: DocumentAuthoringService + ?Sized> Drop for SilentSession<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.service.set_user_interaction_disabled(false) {
            warn!(error = %e, "failed to restore user interaction");
        }
        if let Err(e) = self.service.set_silent_mode(false) {
            warn!(error = %e, "failed to restore silent mode");
        }
    }
}

/// Open `path`, run `f`, and close the document whatever `f` returned.
pub fn with_document<S, T, F>(service: &mut S, path: &Path, f: F) -> AuthoringResult<T>
where
    S: DocumentAuthoringService + ?Sized,
    F: FnOnce(&mut S, DocumentHandle) -> AuthoringResult<T>,
{
    let handle = service.open(path)?;
    let res = f(&mut *service, handle);
    if let Err(e) = service.close(handle) {
        warn!(path = %path.display(), error = %e, "failed to close document");
    }
    res
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TextLinkDocuments

#[derive(Debug, Clone)]
enum TypeLinkLine {
    Verbatim(Vec<u8>),
    Reference {
        head: Vec<u8>,
        path_text: String,
        tail: Vec<u8>,
    },
    Property {
        raw: Vec<u8>,
        name: String,
        value: String,
    },
}

impl TypeLinkLine {
    fn raw_tail_mut(&mut self) -> &mut Vec<u8> {
        match self {
            Self::Verbatim(raw) | Self::Property { raw, .. } => raw,
            Self::Reference { tail, .. } => tail,
        }
    }

    fn property(name: &str, value: &str, c_eol: &str) -> Self {
        Self::Property {
            raw: format!("{C_MARKER_PROPERTY_LINE} {name}={value}{c_eol}").into_bytes(),
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct SpecLinkDocument {
    path: PathBuf,
    l_lines: Vec<TypeLinkLine>,
}

impl SpecLinkDocument {
    fn parse(path: &Path, raw: &[u8]) -> Self {
        let l_lines = raw
            .split_inclusive(|b| *b == b'\n')
            .map(_parse_line)
            .collect();
        Self {
            path: path.to_path_buf(),
            l_lines,
        }
    }

    fn render(&self) -> Vec<u8> {
        let mut raw = Vec::new();
        for line in &self.l_lines {
            match line {
                TypeLinkLine::Verbatim(v) | TypeLinkLine::Property { raw: v, .. } => {
                    raw.extend_from_slice(v)
                }
                TypeLinkLine::Reference {
                    head,
                    path_text,
                    tail,
                } => {
                    raw.extend_from_slice(head);
                    raw.extend_from_slice(path_text.as_bytes());
                    raw.extend_from_slice(tail);
                }
            }
        }
        raw
    }

    fn references(&self) -> Vec<PathBuf> {
        self.l_lines
            .iter()
            .filter_map(|line| match line {
                TypeLinkLine::Reference { path_text, .. } => Some(PathBuf::from(path_text)),
                _ => None,
            })
            .collect()
    }

    fn properties(&self) -> Vec<(String, String)> {
        self.l_lines
            .iter()
            .filter_map(|line| match line {
                TypeLinkLine::Property { name, value, .. } => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Rewrite the line of an existing property, or append a new one.
    fn set_property(&mut self, name: &str, value: &str) {
        let idx_existing = self.l_lines.iter().position(|line| {
            matches!(line, TypeLinkLine::Property { name: name_line, .. } if name_line.as_str() == name)
        });
        if let Some(idx) = idx_existing {
            let raw = self.l_lines[idx].raw_tail_mut();
            let c_eol = if raw.ends_with(b"\r\n") {
                "\r\n"
            } else if raw.ends_with(b"\n") {
                "\n"
            } else {
                ""
            };
            self.l_lines[idx] = TypeLinkLine::property(name, value, c_eol);
            return;
        }
        if let Some(line_last) = self.l_lines.last_mut() {
            let raw_tail = line_last.raw_tail_mut();
            if !raw_tail.ends_with(b"\n") {
                raw_tail.push(b'\n');
            }
        }
        self.l_lines.push(TypeLinkLine::property(name, value, "\n"));
    }
}

/// Split one raw line into marker head, path text and trailing bytes.
fn _parse_line(raw_line: &[u8]) -> TypeLinkLine {
    let verbatim = || TypeLinkLine::Verbatim(raw_line.to_vec());
    let Ok(c_line) = std::str::from_utf8(raw_line) else {
        return verbatim();
    };
    let c_body = c_line.trim_end_matches(['\r', '\n']);
    let n_indent = c_body.len() - c_body.trim_start().len();
    if let Some(c_after_marker) = c_body[n_indent..].strip_prefix(C_MARKER_PROPERTY_LINE) {
        return _parse_property(raw_line, c_after_marker).unwrap_or_else(verbatim);
    }
    let Some(c_after_marker) = c_body[n_indent..].strip_prefix(C_MARKER_REFERENCE_LINE) else {
        return verbatim();
    };
    if !c_after_marker.starts_with([' ', '\t']) {
        return verbatim();
    }
    let c_path_and_tail = c_after_marker.trim_start();
    let c_path = c_path_and_tail.trim_end();
    if c_path.is_empty() {
        return verbatim();
    }
    let n_head = c_body.len() - c_path_and_tail.len();
    let n_tail = n_head + c_path.len();
    TypeLinkLine::Reference {
        head: raw_line[..n_head].to_vec(),
        path_text: c_path.to_string(),
        tail: raw_line[n_tail..].to_vec(),
    }
}

fn _parse_property(raw_line: &[u8], c_after_marker: &str) -> Option<TypeLinkLine> {
    if !c_after_marker.starts_with([' ', '\t']) {
        return None;
    }
    let (c_name, c_value) = c_after_marker.trim().split_once('=')?;
    let c_name = c_name.trim_end();
    if c_name.is_empty() {
        return None;
    }
    Some(TypeLinkLine::Property {
        raw: raw_line.to_vec(),
        name: c_name.to_string(),
        value: c_value.trim_start().to_string(),
    })
}

/// File-backed adapter for plain-text link documents.
///
/// A link document is any text file; lines of the form `@ref <path>` are its
/// references, `@prop <name>=<value>` lines its properties, and every other
/// byte is carried through unchanged.
#[derive(Debug, Default)]
pub struct TextLinkDocumentService {
    if_connected: bool,
    if_silent: bool,
    if_interaction_disabled: bool,
    n_handle_next: u64,
    dict_open: HashMap<DocumentHandle, SpecLinkDocument>,
}

impl TextLinkDocumentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_silent(&self) -> bool {
        self.if_silent
    }

    pub fn is_interaction_disabled(&self) -> bool {
        self.if_interaction_disabled
    }

    pub fn cnt_open_documents(&self) -> usize {
        self.dict_open.len()
    }

    /// References of a link document on disk.
    pub fn read_references(path: &Path) -> io::Result<Vec<PathBuf>> {
        let raw = fs::read(path)?;
        Ok(SpecLinkDocument::parse(path, &raw).references())
    }

    /// Properties of a link document on disk, in file order.
    pub fn read_properties(path: &Path) -> io::Result<Vec<(String, String)>> {
        let raw = fs::read(path)?;
        Ok(SpecLinkDocument::parse(path, &raw).properties())
    }

    fn document_mut(&mut self, handle: DocumentHandle) -> AuthoringResult<&mut SpecLinkDocument> {
        self.dict_open
            .get_mut(&handle)
            .ok_or(AuthoringError::UnknownHandle { handle })
    }

    fn ensure_connected(&self) -> AuthoringResult<()> {
        if self.if_connected {
            Ok(())
        } else {
            Err(AuthoringError::NotConnected)
        }
    }
}

impl DocumentAuthoringService for TextLinkDocumentService {
    fn connect(&mut self) -> AuthoringResult<()> {
        self.if_connected = true;
        Ok(())
    }

    fn open(&mut self, path: &Path) -> AuthoringResult<DocumentHandle> {
        self.ensure_connected()?;
        let raw = fs::read(path).map_err(|source| AuthoringError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.n_handle_next += 1;
        let handle = DocumentHandle(self.n_handle_next);
        self.dict_open
            .insert(handle, SpecLinkDocument::parse(path, &raw));
        debug!(path = %path.display(), handle = handle.0, "document opened");
        Ok(handle)
    }

    fn save_as(&mut self, handle: DocumentHandle, path_new: &Path) -> AuthoringResult<()> {
        let spec_doc = self.document_mut(handle)?;
        fs::write(path_new, spec_doc.render()).map_err(|source| AuthoringError::Save {
            path: path_new.to_path_buf(),
            source,
        })?;
        spec_doc.path = path_new.to_path_buf();
        Ok(())
    }

    fn save(&mut self, handle: DocumentHandle) -> AuthoringResult<()> {
        let spec_doc = self.document_mut(handle)?;
        fs::write(&spec_doc.path, spec_doc.render()).map_err(|source| AuthoringError::Save {
            path: spec_doc.path.clone(),
            source,
        })
    }

    fn close(&mut self, handle: DocumentHandle) -> AuthoringResult<()> {
        self.dict_open
            .remove(&handle)
            .map(|_| ())
            .ok_or(AuthoringError::UnknownHandle { handle })
    }

    fn enumerate_references(&mut self, handle: DocumentHandle) -> AuthoringResult<Vec<PathBuf>> {
        Ok(self.document_mut(handle)?.references())
    }

    fn repoint_reference(
        &mut self,
        handle: DocumentHandle,
        path_old: &Path,
        path_new: &Path,
    ) -> AuthoringResult<()> {
        let spec_doc = self.document_mut(handle)?;
        let mut b_found = false;
        for line in &mut spec_doc.l_lines {
            if let TypeLinkLine::Reference { path_text, .. } = line {
                if Path::new(path_text.as_str()) == path_old {
                    *path_text = path_new.to_string_lossy().to_string();
                    b_found = true;
                }
            }
        }
        if b_found {
            Ok(())
        } else {
            Err(AuthoringError::ReferenceNotFound {
                path: path_old.to_path_buf(),
            })
        }
    }

    fn set_properties(
        &mut self,
        handle: DocumentHandle,
        properties: &[(String, String)],
    ) -> AuthoringResult<()> {
        let spec_doc = self.document_mut(handle)?;
        for (name, value) in properties {
            spec_doc.set_property(name, value);
        }
        Ok(())
    }

    fn set_silent_mode(&mut self, enabled: bool) -> AuthoringResult<()> {
        self.if_silent = enabled;
        Ok(())
    }

    fn set_user_interaction_disabled(&mut self, disabled: bool) -> AuthoringResult<()> {
        self.if_interaction_disabled = disabled;
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use super::{
        AuthoringError, AuthoringResult, DocumentAuthoringService, DocumentHandle, SilentSession,
        TextLinkDocumentService, with_document,
    };
    use crate::test_util::TestDir;

    /// Service whose interaction toggle and silent-mode restore both fail.
    #[derive(Default)]
    struct LockedService {
        n_restore_attempts: usize,
    }

    impl DocumentAuthoringService for LockedService {
        fn open(&mut self, _path: &Path) -> AuthoringResult<DocumentHandle> {
            Err(AuthoringError::NotConnected)
        }

        fn save_as(&mut self, _handle: DocumentHandle, _path_new: &Path) -> AuthoringResult<()> {
            Err(AuthoringError::NotConnected)
        }

        fn save(&mut self, _handle: DocumentHandle) -> AuthoringResult<()> {
            Err(AuthoringError::NotConnected)
        }

        fn close(&mut self, _handle: DocumentHandle) -> AuthoringResult<()> {
            Err(AuthoringError::NotConnected)
        }

        fn enumerate_references(
            &mut self,
            _handle: DocumentHandle,
        ) -> AuthoringResult<Vec<PathBuf>> {
            Err(AuthoringError::NotConnected)
        }

        fn repoint_reference(
            &mut self,
            _handle: DocumentHandle,
            _path_old: &Path,
            _path_new: &Path,
        ) -> AuthoringResult<()> {
            Err(AuthoringError::NotConnected)
        }

        fn set_silent_mode(&mut self, enabled: bool) -> AuthoringResult<()> {
            if enabled {
                return Ok(());
            }
            self.n_restore_attempts += 1;
            Err(AuthoringError::Other {
                message: "silent mode locked".to_string(),
            })
        }

        fn set_user_interaction_disabled(&mut self, _disabled: bool) -> AuthoringResult<()> {
            Err(AuthoringError::Other {
                message: "interaction locked".to_string(),
            })
        }
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn link_document_round_trips_untouched_bytes() {
        let tmp = TestDir::new();
        let path_doc = tmp.path().join("Top.iam");
        let c_text = "header\r\n  @ref /lib/Bolt.ipt  \r\n@reference not a link\n@ref\tC:\\x\\Nut.ipt\nlast";
        std::fs::write(&path_doc, c_text).expect("write");

        let mut service = TextLinkDocumentService::new();
        service.connect().expect("connect");
        let path_copy = tmp.path().join("Copy.iam");
        with_document(&mut service, &path_doc, |svc, handle| {
            assert_eq!(
                svc.enumerate_references(handle)?,
                vec![PathBuf::from("/lib/Bolt.ipt"), PathBuf::from("C:\\x\\Nut.ipt")]
            );
            svc.save_as(handle, &path_copy)
        })
        .expect("copy document");

        assert_eq!(std::fs::read_to_string(&path_copy).expect("read"), c_text);
        assert_eq!(service.cnt_open_documents(), 0);
    }

    #[test]
    fn repoint_changes_only_the_target_reference() {
        let tmp = TestDir::new();
        let path_doc = tmp.path().join("Top.iam");
        std::fs::write(&path_doc, "@ref /src/A.ipt\n@ref /lib/B.ipt\n").expect("write");

        let mut service = TextLinkDocumentService::new();
        service.connect().expect("connect");
        with_document(&mut service, &path_doc, |svc, handle| {
            svc.repoint_reference(handle, Path::new("/src/A.ipt"), Path::new("/dst/X.ipt"))?;
            let err = svc
                .repoint_reference(handle, Path::new("/src/Missing.ipt"), Path::new("/dst/M.ipt"))
                .expect_err("missing reference");
            assert!(matches!(err, AuthoringError::ReferenceNotFound { .. }));
            svc.save(handle)
        })
        .expect("repoint");

        assert_eq!(
            std::fs::read_to_string(&path_doc).expect("read"),
            "@ref /dst/X.ipt\n@ref /lib/B.ipt\n"
        );
    }

    #[test]
    fn open_requires_connection() {
        let tmp = TestDir::new();
        let path_doc = tmp.path().join("A.ipt");
        std::fs::write(&path_doc, "x").expect("write");
        let mut service = TextLinkDocumentService::new();
        assert!(matches!(
            service.open(&path_doc),
            Err(AuthoringError::NotConnected)
        ));
    }

    #[test]
    fn properties_are_updated_in_place_or_appended() {
        let tmp = TestDir::new();
        let path_doc = tmp.path().join("Top.iam");
        std::fs::write(&path_doc, "header\n@prop Part Number=OLD\r\n@ref /lib/B.ipt").expect("write");

        let mut service = TextLinkDocumentService::new();
        service.connect().expect("connect");
        let l_props = vec![
            ("Part Number".to_string(), "123450102".to_string()),
            ("Project".to_string(), "12345".to_string()),
        ];
        with_document(&mut service, &path_doc, |svc, handle| {
            svc.set_properties(handle, &l_props)?;
            svc.save(handle)
        })
        .expect("stamp");

        assert_eq!(
            std::fs::read_to_string(&path_doc).expect("read"),
            "header\n@prop Part Number=123450102\r\n@ref /lib/B.ipt\n@prop Project=12345\n"
        );
        assert_eq!(
            TextLinkDocumentService::read_properties(&path_doc).expect("props"),
            l_props
        );
        assert_eq!(
            TextLinkDocumentService::read_references(&path_doc).expect("refs"),
            vec![PathBuf::from("/lib/B.ipt")]
        );
    }

    #[test]
    fn failed_session_entry_logs_restore_failure() {
        let buffer = LogBuffer::default();
        let buffer_writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || buffer_writer.clone())
            .with_ansi(false)
            .finish();

        let mut service = LockedService::default();
        let err = tracing::subscriber::with_default(subscriber, || {
            SilentSession::enter(&mut service).err()
        })
        .expect("entry fails");

        assert!(err.to_string().contains("interaction locked"));
        assert_eq!(service.n_restore_attempts, 1);
        let c_log = String::from_utf8(buffer.0.lock().expect("log buffer").clone()).expect("utf8");
        assert!(c_log.contains("failed to restore silent mode"), "{c_log}");
        assert!(c_log.contains("silent mode locked"), "{c_log}");
    }

    #[test]
    fn silent_session_restores_on_drop() {
        let mut service = TextLinkDocumentService::new();
        {
            let session = SilentSession::enter(&mut service).expect("enter");
            assert!(session.is_silent());
            assert!(session.is_interaction_disabled());
        }
        assert!(!service.is_silent());
        assert!(!service.is_interaction_disabled());
    }
}

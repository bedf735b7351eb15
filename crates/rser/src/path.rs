//! Path values and path collections.
//!
//! A [`Path`] is an immutable, cheaply cloned handle over its parsed form.
//! Clones share identity, which the encoder uses to emit repeated paths as
//! back-references. Equality and hashing compare content.
//!
//! Parsing path strings is not handled here; paths are built from parts.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::codes::{PathCollectionKind, PathFormKind};
use crate::value::Value;

/// Components of a URL path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UrlParts {
    pub protocol: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub hostname: String,
    pub port: Option<u16>,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

/// Form-specific fields of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathForm {
    AbsoluteUnix,
    AbsoluteWindowsDrive { letter: char },
    AbsoluteWindowsUnc { servername: String },
    Relative { explicit_relative: bool },
    Url(UrlParts),
    Uid,
    DataUri { mime: String, data: Vec<u8> },
}

impl PathForm {
    pub fn kind(&self) -> PathFormKind {
        match self {
            PathForm::AbsoluteUnix => PathFormKind::AbsoluteUnix,
            PathForm::AbsoluteWindowsDrive { .. } => PathFormKind::AbsoluteWindowsDrive,
            PathForm::AbsoluteWindowsUnc { .. } => PathFormKind::AbsoluteWindowsUnc,
            PathForm::Relative { .. } => PathFormKind::Relative,
            PathForm::Url(_) => PathFormKind::Url,
            PathForm::Uid => PathFormKind::Uid,
            PathForm::DataUri { .. } => PathFormKind::DataUri,
        }
    }
}

/// Wire flag bits of a path.
pub(crate) const FLAG_EXPLICIT_DIRECTORY: u8 = 0b01;
pub(crate) const FLAG_EXPLICIT_RELATIVE: u8 = 0b10;

#[derive(Debug, PartialEq, Eq, Hash)]
struct PathData {
    form: PathForm,
    segments: Vec<String>,
    explicit_directory: bool,
}

/// A parsed path.
///
/// ```
/// use rser::Path;
///
/// let path = Path::absolute_unix(["usr", "lib"]).with_explicit_directory(true);
/// assert_eq!(path.to_string(), "/usr/lib/");
/// assert_eq!(path.clone(), path);
/// ```
#[derive(Clone)]
pub struct Path(Rc<PathData>);

impl Path {
    pub fn new<I, S>(form: PathForm, segments: I, explicit_directory: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Path(Rc::new(PathData {
            form,
            segments: segments.into_iter().map(Into::into).collect(),
            explicit_directory,
        }))
    }

    pub fn absolute_unix<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(PathForm::AbsoluteUnix, segments, false)
    }

    pub fn windows_drive<I, S>(letter: char, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(PathForm::AbsoluteWindowsDrive { letter }, segments, false)
    }

    pub fn windows_unc<I, S>(servername: impl Into<String>, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            PathForm::AbsoluteWindowsUnc {
                servername: servername.into(),
            },
            segments,
            false,
        )
    }

    pub fn relative<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            PathForm::Relative {
                explicit_relative: false,
            },
            segments,
            false,
        )
    }

    pub fn url<I, S>(parts: UrlParts, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(PathForm::Url(parts), segments, false)
    }

    pub fn uid<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(PathForm::Uid, segments, false)
    }

    pub fn data_uri(mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(
            PathForm::DataUri {
                mime: mime.into(),
                data,
            },
            Vec::<String>::new(),
            false,
        )
    }

    /// Returns a new path with the explicit-directory flag set to `flag`.
    pub fn with_explicit_directory(&self, flag: bool) -> Self {
        Path(Rc::new(PathData {
            form: self.0.form.clone(),
            segments: self.0.segments.clone(),
            explicit_directory: flag,
        }))
    }

    /// Returns a new relative path marked as explicitly relative (`./x`).
    ///
    /// Non-relative paths are returned unchanged.
    pub fn with_explicit_relative(&self, flag: bool) -> Self {
        match self.0.form {
            PathForm::Relative { .. } => Path(Rc::new(PathData {
                form: PathForm::Relative {
                    explicit_relative: flag,
                },
                segments: self.0.segments.clone(),
                explicit_directory: self.0.explicit_directory,
            })),
            _ => self.clone(),
        }
    }

    pub fn form(&self) -> &PathForm {
        &self.0.form
    }

    pub fn kind(&self) -> PathFormKind {
        self.0.form.kind()
    }

    pub fn collection_kind(&self) -> PathCollectionKind {
        self.kind().collection_kind()
    }

    pub fn segments(&self) -> &[String] {
        &self.0.segments
    }

    pub fn is_explicit_directory(&self) -> bool {
        self.0.explicit_directory
    }

    pub fn is_explicit_relative(&self) -> bool {
        matches!(
            self.0.form,
            PathForm::Relative {
                explicit_relative: true
            }
        )
    }

    /// Returns `true` when both handles point at the same path object.
    pub fn ptr_eq(&self, other: &Path) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segments = self.0.segments.join("/");
        match &self.0.form {
            PathForm::AbsoluteUnix => write!(f, "/{segments}")?,
            PathForm::AbsoluteWindowsDrive { letter } => write!(f, "{letter}:/{segments}")?,
            PathForm::AbsoluteWindowsUnc { servername } => write!(f, "//{servername}/{segments}")?,
            PathForm::Relative { explicit_relative } => {
                if *explicit_relative {
                    f.write_str("./")?;
                } else if segments.is_empty() {
                    f.write_str(".")?;
                }
                f.write_str(&segments)?;
            }
            PathForm::Url(url) => {
                write!(f, "{}://", url.protocol)?;
                if let Some(username) = &url.username {
                    f.write_str(username)?;
                    if let Some(password) = &url.password {
                        write!(f, ":{password}")?;
                    }
                    f.write_str("@")?;
                }
                f.write_str(&url.hostname)?;
                if let Some(port) = url.port {
                    write!(f, ":{port}")?;
                }
                write!(f, "/{segments}")?;
                if let Some(query) = &url.query {
                    write!(f, "?{query}")?;
                }
                if let Some(fragment) = &url.fragment {
                    write!(f, "#{fragment}")?;
                }
                return Ok(());
            }
            PathForm::Uid => write!(f, "uid://{segments}")?,
            PathForm::DataUri { mime, data } => {
                return write!(f, "data:{mime};base64,{}", STANDARD.encode(data));
            }
        }
        if self.0.explicit_directory && !self.0.segments.is_empty() {
            f.write_str("/")?;
        }
        Ok(())
    }
}

/// Error raised when a path does not belong in a homogeneous collection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("{found:?} path cannot join a {expected:?} path collection")]
    KindMismatch {
        expected: PathCollectionKind,
        found: PathCollectionKind,
    },
}

fn check_kind(expected: Option<PathCollectionKind>, path: &Path) -> Result<(), PathError> {
    match expected {
        Some(expected) if expected != path.collection_kind() => Err(PathError::KindMismatch {
            expected,
            found: path.collection_kind(),
        }),
        _ => Ok(()),
    }
}

/// An insertion-ordered set of paths.
///
/// A set created with [`PathSet::new`] only accepts paths of one collection
/// kind; [`PathSet::mixed`] accepts any path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSet {
    kind: Option<PathCollectionKind>,
    members: IndexSet<Path>,
}

impl PathSet {
    pub fn new(kind: PathCollectionKind) -> Self {
        Self {
            kind: Some(kind),
            members: IndexSet::new(),
        }
    }

    pub fn mixed() -> Self {
        Self {
            kind: None,
            members: IndexSet::new(),
        }
    }

    /// Kind shared by all members, `None` for a mixed set.
    pub fn kind(&self) -> Option<PathCollectionKind> {
        self.kind
    }

    pub fn is_mixed(&self) -> bool {
        self.kind.is_none()
    }

    /// Adds a path. Returns `Ok(false)` if it was already present.
    pub fn insert(&mut self, path: Path) -> Result<bool, PathError> {
        check_kind(self.kind, &path)?;
        Ok(self.members.insert(path))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.members.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// An insertion-ordered map keyed by paths.
#[derive(Debug, Clone)]
pub struct PathMap {
    kind: Option<PathCollectionKind>,
    entries: IndexMap<Path, Value>,
}

impl PathMap {
    pub fn new(kind: PathCollectionKind) -> Self {
        Self {
            kind: Some(kind),
            entries: IndexMap::new(),
        }
    }

    pub fn mixed() -> Self {
        Self {
            kind: None,
            entries: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> Option<PathCollectionKind> {
        self.kind
    }

    pub fn is_mixed(&self) -> bool {
        self.kind.is_none()
    }

    /// Inserts an entry, returning the previous value for that path.
    pub fn insert(&mut self, path: Path, value: Value) -> Result<Option<Value>, PathError> {
        check_kind(self.kind, &path)?;
        Ok(self.entries.insert(path, value))
    }

    pub fn get(&self, path: &Path) -> Option<&Value> {
        self.entries.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

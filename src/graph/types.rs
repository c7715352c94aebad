//! Core types for the sextant code graph.
//!
//! Defines the supported language set, normalized entity and relation kinds,
//! the entity data model, and the stable key codec used on the wire.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Path token used in keys of external/unresolved references.
pub const EXTERNAL_PATH_TOKEN: &str = "unknown";

/// Source languages the extractor family covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    Java,
    CSharp,
    Ruby,
    Cpp,
    Swift,
}

impl Language {
    /// Display name for humans.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Rust => "Rust",
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Tsx => "TSX",
            Language::Go => "Go",
            Language::Java => "Java",
            Language::CSharp => "C#",
            Language::Ruby => "Ruby",
            Language::Cpp => "C++",
            Language::Swift => "Swift",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Go => "go",
            Language::Java => "java",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Cpp => "cpp",
            Language::Swift => "swift",
        };
        write!(f, "{}", token)
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rust" => Ok(Language::Rust),
            "python" => Ok(Language::Python),
            "javascript" => Ok(Language::JavaScript),
            "typescript" => Ok(Language::TypeScript),
            "tsx" => Ok(Language::Tsx),
            "go" => Ok(Language::Go),
            "java" => Ok(Language::Java),
            "csharp" => Ok(Language::CSharp),
            "ruby" => Ok(Language::Ruby),
            "cpp" => Ok(Language::Cpp),
            "swift" => Ok(Language::Swift),
            other => Err(Error::InvalidParameter(format!(
                "unknown language: {}",
                other
            ))),
        }
    }
}

/// Normalized kind of a code entity, language-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Function,
    Method,
    Struct,
    Class,
    Interface,
    Enum,
    Trait,
    Type,
    Constant,
    Module,
}

impl EntityKind {
    /// Map a raw language construct name to a normalized kind.
    ///
    /// Extractors report constructs in their own vocabulary ("fn", "def",
    /// "protocol", ...); ranking and search only ever see the normalized
    /// kind.
    pub fn normalize(language: Language, raw: &str) -> Option<EntityKind> {
        // Language-specific spellings first.
        match (language, raw) {
            (Language::Rust, "fn") => return Some(EntityKind::Function),
            (Language::Rust, "trait") => return Some(EntityKind::Trait),
            (Language::Rust, "mod") => return Some(EntityKind::Module),
            (Language::Python, "def") => return Some(EntityKind::Function),
            (Language::Go, "func") => return Some(EntityKind::Function),
            (Language::Swift, "protocol") => return Some(EntityKind::Interface),
            (Language::Ruby, "def") => return Some(EntityKind::Method),
            _ => {}
        }
        // Shared vocabulary across the family.
        match raw {
            "function" => Some(EntityKind::Function),
            "method" => Some(EntityKind::Method),
            "struct" => Some(EntityKind::Struct),
            "class" => Some(EntityKind::Class),
            "interface" => Some(EntityKind::Interface),
            "enum" => Some(EntityKind::Enum),
            "trait" => Some(EntityKind::Trait),
            "type" | "type_alias" | "typedef" => Some(EntityKind::Type),
            "const" | "constant" | "static" => Some(EntityKind::Constant),
            "module" | "namespace" | "package" => Some(EntityKind::Module),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            EntityKind::Function => "function",
            EntityKind::Method => "method",
            EntityKind::Struct => "struct",
            EntityKind::Class => "class",
            EntityKind::Interface => "interface",
            EntityKind::Enum => "enum",
            EntityKind::Trait => "trait",
            EntityKind::Type => "type",
            EntityKind::Constant => "constant",
            EntityKind::Module => "module",
        };
        write!(f, "{}", token)
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "function" => Ok(EntityKind::Function),
            "method" => Ok(EntityKind::Method),
            "struct" => Ok(EntityKind::Struct),
            "class" => Ok(EntityKind::Class),
            "interface" => Ok(EntityKind::Interface),
            "enum" => Ok(EntityKind::Enum),
            "trait" => Ok(EntityKind::Trait),
            "type" => Ok(EntityKind::Type),
            "constant" => Ok(EntityKind::Constant),
            "module" => Ok(EntityKind::Module),
            other => Err(Error::InvalidParameter(format!(
                "unknown entity kind: {}",
                other
            ))),
        }
    }
}

/// The kind of a directed relation between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Calls,
    Imports,
    Contains,
    UsesType,
    Implements,
    Extends,
    References,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            RelationKind::Calls => "calls",
            RelationKind::Imports => "imports",
            RelationKind::Contains => "contains",
            RelationKind::UsesType => "uses_type",
            RelationKind::Implements => "implements",
            RelationKind::Extends => "extends",
            RelationKind::References => "references",
        };
        write!(f, "{}", token)
    }
}

impl FromStr for RelationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "calls" => Ok(RelationKind::Calls),
            "imports" => Ok(RelationKind::Imports),
            "contains" => Ok(RelationKind::Contains),
            "uses_type" => Ok(RelationKind::UsesType),
            "implements" => Ok(RelationKind::Implements),
            "extends" => Ok(RelationKind::Extends),
            "references" => Ok(RelationKind::References),
            other => Err(Error::InvalidParameter(format!(
                "unknown relation kind: {}",
                other
            ))),
        }
    }
}

/// Inclusive line span of an entity in its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    /// The span used by external references.
    pub const ZERO: LineRange = LineRange { start: 0, end: 0 };

    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// Where an entity lives.
///
/// External references (stdlib calls, unresolved imports) have no source
/// location. Modeling them as a variant keeps a real zero-length entity
/// distinguishable from an unresolved one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Defined inside the indexed source tree.
    Source { file_path: String, span: LineRange },
    /// Unresolved reference outside the indexed codebase.
    External,
}

/// One named code construct in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub language: Language,
    pub kind: EntityKind,
    pub name: String,
    pub origin: Origin,
}

impl Entity {
    /// Create an entity defined in the source tree.
    pub fn source(
        language: Language,
        kind: EntityKind,
        name: impl Into<String>,
        file_path: impl Into<String>,
        span: LineRange,
    ) -> Self {
        Self {
            language,
            kind,
            name: name.into(),
            origin: Origin::Source {
                file_path: file_path.into(),
                span,
            },
        }
    }

    /// Create an external/unresolved reference entity.
    pub fn external(language: Language, kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            language,
            kind,
            name: name.into(),
            origin: Origin::External,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.origin, Origin::External)
    }

    /// The source path, if this entity has one.
    pub fn file_path(&self) -> Option<&str> {
        match &self.origin {
            Origin::Source { file_path, .. } => Some(file_path),
            Origin::External => None,
        }
    }

    /// The source span, if this entity has one.
    pub fn span(&self) -> Option<LineRange> {
        match &self.origin {
            Origin::Source { span, .. } => Some(*span),
            Origin::External => None,
        }
    }

    /// Derive the canonical key for this entity.
    pub fn key(&self) -> EntityKey {
        match &self.origin {
            Origin::Source { file_path, span } => EntityKey {
                language: self.language,
                kind: self.kind,
                name: self.name.clone(),
                path_token: flatten_path(file_path),
                span: *span,
            },
            Origin::External => EntityKey {
                language: self.language,
                kind: self.kind,
                name: self.name.clone(),
                path_token: EXTERNAL_PATH_TOKEN.to_string(),
                span: LineRange::ZERO,
            },
        }
    }
}

/// Replace path separators with underscores so paths embed in a key token.
fn flatten_path(path: &str) -> String {
    path.replace(['/', '\\'], "_")
}

/// Canonical, globally unique entity identity within one snapshot.
///
/// Structured rather than a bare string, but round-trippable through the
/// wire format `language:kind:name:path_token:start-end`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub language: Language,
    pub kind: EntityKind,
    pub name: String,
    /// Source path with separators flattened to `_`, or `unknown`.
    pub path_token: String,
    /// Source span, or 0-0 for external references.
    pub span: LineRange,
}

impl EntityKey {
    /// Whether this key denotes an external/unresolved reference.
    pub fn is_external(&self) -> bool {
        self.path_token == EXTERNAL_PATH_TOKEN && self.span == LineRange::ZERO
    }

    /// Stable 64-bit hash used for map lookups inside a snapshot.
    ///
    /// Collisions are guarded by a full key comparison at the lookup site.
    pub fn stable_hash(&self) -> KeyHash {
        let mut hasher = DefaultHasher::new();
        self.language.hash(&mut hasher);
        self.kind.hash(&mut hasher);
        self.name.hash(&mut hasher);
        self.path_token.hash(&mut hasher);
        self.span.hash(&mut hasher);
        KeyHash(hasher.finish())
    }

    /// Parse a key from its wire form.
    ///
    /// Entity names may themselves contain `:` (e.g. `std::vec::Vec`), so
    /// language and kind anchor from the front while path and span anchor
    /// from the back; everything between is the name.
    pub fn parse(s: &str) -> Result<EntityKey> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 5 {
            return Err(Error::InvalidParameter(format!("malformed key: {}", s)));
        }

        let language: Language = parts[0].parse()?;
        let kind: EntityKind = parts[1].parse()?;
        let path_token = parts[parts.len() - 2];
        let span_token = parts[parts.len() - 1];
        let name = parts[2..parts.len() - 2].join(":");
        if name.is_empty() || path_token.is_empty() {
            return Err(Error::InvalidParameter(format!("malformed key: {}", s)));
        }

        let (start, end) = span_token
            .split_once('-')
            .ok_or_else(|| Error::InvalidParameter(format!("malformed key span: {}", s)))?;
        let start: u32 = start
            .parse()
            .map_err(|_| Error::InvalidParameter(format!("malformed key span: {}", s)))?;
        let end: u32 = end
            .parse()
            .map_err(|_| Error::InvalidParameter(format!("malformed key span: {}", s)))?;

        Ok(EntityKey {
            language,
            kind,
            name,
            path_token: path_token.to_string(),
            span: LineRange::new(start, end),
        })
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}-{}",
            self.language, self.kind, self.name, self.path_token, self.span.start, self.span.end
        )
    }
}

/// Cached stable hash of an [`EntityKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyHash(pub u64);

/// A directed, typed relation between two entity keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: EntityKey,
    pub target: EntityKey,
    pub relation: RelationKind,
}

impl Edge {
    pub fn new(source: EntityKey, target: EntityKey, relation: RelationKind) -> Self {
        Self {
            source,
            target,
            relation,
        }
    }
}

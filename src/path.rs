use std::fmt;

/// A segment in a location inside a template document.
///
/// Paths are built while the processor and the merge engine walk a
/// document, and end up in error messages so a failure can be traced back
/// to the key that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object field access by name
    ///
    /// # Examples
    /// - `{"name": ...}` → `Field("name")`
    /// - `{"{{#items}}": ...}` → `Field("{{#items}}")`
    Field(String),

    /// Array element access by position
    Index(usize),
}

/// A sequence of path segments from the document root.
///
/// Rendered as a JSON pointer fragment:
///
/// ```
/// use jsonte::path::Path;
///
/// let path = Path::root().field("items").index(0).field("a/b");
/// assert_eq!(path.to_string(), "#/items/0/a~1b");
/// assert_eq!(Path::root().to_string(), "#");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    pub fn root() -> Self {
        Path::default()
    }

    /// This path extended by an object field.
    pub fn field(&self, name: impl Into<String>) -> Path {
        self.with(PathSegment::Field(name.into()))
    }

    /// This path extended by an array position.
    pub fn index(&self, index: usize) -> Path {
        self.with(PathSegment::Index(index))
    }

    fn with(&self, segment: PathSegment) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Path { segments }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, "{}", name.replace('~', "~0").replace('/', "~1")),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#")?;
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

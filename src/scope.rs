use std::fmt;

/// Tracks the position of a traversal inside a document and renders it as
/// a dotted json-path (`$.components.schemas.User`, `properties.address`).
#[derive(Clone, Debug, Default)]
pub struct SchemaScope {
    scope: Vec<ScopePart>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum ScopePart {
    Property(String),
    Index(usize),
}

impl SchemaScope {
    pub fn property(&mut self, property: &str) -> &mut Self {
        self.scope.push(ScopePart::Property(property.to_string()));
        self
    }

    pub fn index(&mut self, index: usize) -> &mut Self {
        self.scope.push(ScopePart::Index(index));
        self
    }

    pub fn pop(&mut self) -> &mut Self {
        self.scope.pop();
        self
    }

    pub fn len(&self) -> usize {
        self.scope.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scope.is_empty()
    }

    /// Absolute json-path rooted at the document.
    pub fn path(&self) -> String {
        format!("${}", self.render())
    }

    /// Path relative to the node the scope was started at, without the
    /// leading root marker.
    pub fn relative(&self) -> String {
        self.render().trim_start_matches('.').to_string()
    }

    fn render(&self) -> String {
        let mut out = String::new();

        for part in &self.scope {
            match part {
                ScopePart::Property(p) => {
                    out.push('.');
                    out.push_str(p);
                }
                ScopePart::Index(i) => {
                    out.push_str(&format!("[{i}]"));
                }
            }
        }

        out
    }
}

impl fmt::Display for SchemaScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.path())
    }
}

/// Shortcut for the usual `$.<section>.<name>` collision paths.
pub fn section_path(section: &str, name: &str) -> String {
    format!("$.{section}.{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_rendering() {
        let mut scope = SchemaScope::default();
        scope.property("components").property("schemas").property("User");

        assert_eq!(scope.path(), "$.components.schemas.User");

        scope.pop();
        assert_eq!(scope.path(), "$.components.schemas");
    }

    #[test]
    fn test_relative_rendering_with_indexes() {
        let mut scope = SchemaScope::default();
        scope.property("allOf").index(0);

        assert_eq!(scope.relative(), "allOf[0]");

        scope.pop().pop();
        scope.property("properties").property("name");

        assert_eq!(scope.relative(), "properties.name");
    }

    #[test]
    fn test_section_path() {
        assert_eq!(section_path("paths", "/users"), "$.paths./users");
        assert_eq!(
            section_path("components.schemas", "User"),
            "$.components.schemas.User"
        );
    }
}

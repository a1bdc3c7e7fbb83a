//! Hierarchical administrative locations (country > state > district > ward)
//! with fuzzy name lookup for the location router tests.

use serde::{Deserialize, Serialize};

/// Depth in the hierarchy: the root country is level 0, states level 1,
/// districts level 2, wards level 3.
pub type LocationLevel = usize;

/// A single location and its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Location>,
}

impl Location {
    fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        std::iter::once(&self.name)
            .chain(self.aliases.iter())
            .any(|name| {
                let name = name.to_lowercase();
                text == name || text.contains(&name)
            })
    }
}

/// The location tree for an environment's country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationHierarchy {
    pub root: Location,
}

impl LocationHierarchy {
    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }

    fn collect<'a>(&self, node: &'a Location, depth: usize, level: usize, out: &mut Vec<&'a Location>) {
        if depth == level {
            out.push(node);
            return;
        }
        for child in &node.children {
            self.collect(child, depth + 1, level, out);
        }
    }

    /// All locations at the given level, optionally restricted to the
    /// subtree under `scope`.
    pub fn at_level<'a>(&'a self, level: LocationLevel, scope: Option<&'a Location>) -> Vec<&'a Location> {
        let mut out = Vec::new();
        match scope {
            Some(scope) => {
                // scope sits one or more levels above the requested one; we
                // only ever scope by the immediate parent level
                for child in &scope.children {
                    out.push(child);
                }
            }
            None => self.collect(&self.root, 0, level, &mut out),
        }
        out
    }

    /// Finds locations at the given level whose name or alias appears in the
    /// text, case-insensitively.
    pub fn find_fuzzy<'a>(
        &'a self,
        text: &str,
        level: LocationLevel,
        scope: Option<&'a Location>,
    ) -> Vec<&'a Location> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        self.at_level(level, scope)
            .into_iter()
            .filter(|loc| loc.matches(text))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> LocationHierarchy {
        LocationHierarchy::from_json(
            r#"{
                "name": "Rwanda",
                "children": [
                    {
                        "name": "Kigali City",
                        "aliases": ["Kigali"],
                        "children": [
                            {
                                "name": "Gasabo",
                                "children": [
                                    {"name": "Gisozi"},
                                    {"name": "Ndera"}
                                ]
                            },
                            {"name": "Nyarugenge", "children": [{"name": "Gitega"}]}
                        ]
                    },
                    {
                        "name": "Eastern Province",
                        "children": [{"name": "Gatsibo", "children": [{"name": "Kageyo"}]}]
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_find_fuzzy() {
        let tree = hierarchy();

        assert_eq!(1, tree.find_fuzzy("Kigali", 1, None).len());
        assert_eq!(1, tree.find_fuzzy("I live in Kigali", 1, None).len());
        assert_eq!(1, tree.find_fuzzy("¡Kigali!", 1, None).len());
        assert_eq!(0, tree.find_fuzzy("Boston", 1, None).len());
        assert_eq!(0, tree.find_fuzzy("", 1, None).len());

        // districts can be scoped by their state
        let kigali = tree.find_fuzzy("Kigali", 1, None)[0];
        assert_eq!(1, tree.find_fuzzy("Gasabo", 2, Some(kigali)).len());
        assert_eq!(0, tree.find_fuzzy("Gatsibo", 2, Some(kigali)).len());

        // unscoped lookup walks the whole tree
        assert_eq!(1, tree.find_fuzzy("Gisozi", 3, None).len());
    }
}

//! Ordered collection of resolved projects.
//!
//! Declaration order matters: standalone builds run in this order, so a
//! native library is always listed before the managed project that loads it.

use colored::Colorize;

use super::Project;

/// An ordered list of resolved projects with lookup helpers.
#[derive(Clone, Debug, Default)]
pub struct Projects(Vec<Project>);

impl From<Vec<Project>> for Projects {
    fn from(projects: Vec<Project>) -> Self {
        Self(projects)
    }
}

impl<'a> IntoIterator for &'a Projects {
    type Item = &'a Project;
    type IntoIter = std::slice::Iter<'a, Project>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Projects {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Project] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Project> {
        self.0.iter()
    }

    /// Look a project up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Project> {
        self.0.iter().find(|p| p.name == name)
    }

    pub fn managed(&self) -> impl Iterator<Item = &Project> {
        self.0.iter().filter(|p| p.kind.is_managed())
    }

    pub fn native(&self) -> impl Iterator<Item = &Project> {
        self.0.iter().filter(|p| p.kind.is_native())
    }

    /// Projects the test phase runs.
    pub fn tests(&self) -> impl Iterator<Item = &Project> {
        self.0.iter().filter(|p| p.is_test)
    }

    /// Print the project list, one line per project.
    pub fn print_summary(&self) {
        for project in &self.0 {
            let role = if project.is_test {
                "test".yellow()
            } else {
                "lib".bright_black()
            };

            println!("  {project} {} [{role}]", project.kind.to_string().cyan());
        }
    }
}

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Target language selected for code generation.
///
/// The set is closed: the compiler module only ships these backends, so any
/// other alias is rejected before an invocation is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generator {
    CSharp,
    Cpp,
    Rust,
    Python,
    TypeScript,
    Dart,
}

impl Generator {
    /// Every supported generator, in alias order.
    pub const ALL: [Generator; 6] = [
        Generator::CSharp,
        Generator::Cpp,
        Generator::Rust,
        Generator::Python,
        Generator::TypeScript,
        Generator::Dart,
    ];

    /// The short alias used on the wire and on the compiler command line.
    #[must_use]
    pub const fn alias(self) -> &'static str {
        match self {
            Generator::CSharp => "cs",
            Generator::Cpp => "cpp",
            Generator::Rust => "rust",
            Generator::Python => "py",
            Generator::TypeScript => "ts",
            Generator::Dart => "dart",
        }
    }

    /// The compiler flag selecting this generator, e.g. `--ts`.
    #[must_use]
    pub fn flag(self) -> String {
        format!("--{}", self.alias())
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alias())
    }
}

impl FromStr for Generator {
    type Err = CoreError;

    /// Exact, case-sensitive alias lookup.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.alias() == s)
            .ok_or(CoreError::InvalidGenerator)
    }
}

//! Compiler argument-vector construction.

use crate::request::CompilationRequest;

/// Default `argv[0]` handed to the compiler module.
pub const DEFAULT_PROGRAM_NAME: &str = "bebopc";

/// Ordered argument vector for one compiler invocation.
///
/// Layout: `[program, --<generator>, <outFile>, --in, --out]`, followed by
/// `--namespace <ns>` only when a non-empty namespace was supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationArguments(Vec<String>);

impl InvocationArguments {
    /// Derive the argument vector for `request`.
    #[must_use]
    pub fn build(program: &str, request: &CompilationRequest) -> Self {
        let mut args = vec![
            program.to_owned(),
            request.generator.flag(),
            request.out_file.clone(),
            "--in".to_owned(),
            "--out".to_owned(),
        ];
        if let Some(namespace) = request.effective_namespace() {
            args.push("--namespace".to_owned());
            args.push(namespace.to_owned());
        }
        Self(args)
    }

    /// Borrow the arguments as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of arguments, including the program name.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: the program name is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the arguments in order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl From<InvocationArguments> for Vec<String> {
    fn from(args: InvocationArguments) -> Self {
        args.0
    }
}

impl<'a> IntoIterator for &'a InvocationArguments {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

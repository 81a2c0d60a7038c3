/// Settings of one compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Name of the produced LLVM module
    pub module_name: String,
    /// File name attached to diagnostics
    pub file_name: String,
    /// Diagnostics kept before the pass stops
    pub error_limit: usize,
    /// Run the LLVM verifier on the finished module
    pub verify: bool,
    /// Namespaces that are always looked up verbatim
    pub external_namespaces: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            module_name: String::from("main"),
            file_name: String::from("main.lang"),
            error_limit: 10,
            verify: true,
            external_namespaces: ["vec", "set", "map", "string", "math", "ray"]
                .iter()
                .map(|namespace| String::from(*namespace))
                .collect(),
        }
    }
}

impl CompileOptions {
    pub fn with_module_name(mut self, module_name: &str) -> Self {
        self.module_name = String::from(module_name);
        self
    }

    pub fn with_file_name(mut self, file_name: &str) -> Self {
        self.file_name = String::from(file_name);
        self
    }

    pub fn with_error_limit(mut self, error_limit: usize) -> Self {
        self.error_limit = error_limit;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_external_namespace(mut self, namespace: &str) -> Self {
        if !self.external_namespaces.iter().any(|n| n == namespace) {
            self.external_namespaces.push(String::from(namespace));
        }
        self
    }
}

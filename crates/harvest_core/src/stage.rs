use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Submit,
    Retrieve,
    Extract,
    Query,
}

impl Stage {
    /// Short label used to tag log lines.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Submit => "submit",
            Stage::Retrieve => "retrieve",
            Stage::Extract => "extract",
            Stage::Query => "query",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

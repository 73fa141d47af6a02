/// What a [`Delta`] means to the chunker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DeltaKind {
    /// Newly produced model text.
    Text,
    /// Vendor signalled a content boundary; buffered text should be shown now.
    Flush,
    /// Generation finished. Always the last delta of a query.
    End,
}

/// One canonical unit of vendor output.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Delta {
    /// Text fragment; empty for `Flush` and `End`.
    pub text: String,
    pub kind: DeltaKind,
}

impl Delta {
    /// Creates a text delta.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: DeltaKind::Text,
        }
    }

    /// Creates a flush marker.
    pub fn flush() -> Self {
        Self {
            text: String::new(),
            kind: DeltaKind::Flush,
        }
    }

    /// Creates the end-of-generation marker.
    pub fn end() -> Self {
        Self {
            text: String::new(),
            kind: DeltaKind::End,
        }
    }

    pub fn is_end(&self) -> bool {
        self.kind == DeltaKind::End
    }
}

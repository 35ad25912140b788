//! The closed set of supported engines.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidInput;

/// Supported compilation engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    Tectonic,
    Pdflatex,
    PdflatexFast,
    Xelatex,
    Lualatex,
}

/// Static facts about an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineDescriptor {
    /// Engine this descriptor belongs to.
    pub kind: EngineKind,
    /// Executable name resolved from `PATH`.
    pub program: &'static str,
    /// Whether the engine runs against a precompiled environment.
    pub requires_environment: bool,
    /// Engine to try once if this one fails.
    pub fallback: Option<EngineKind>,
}

static DESCRIPTORS: [EngineDescriptor; 5] = [
    EngineDescriptor {
        kind: EngineKind::Tectonic,
        program: "tectonic",
        requires_environment: false,
        fallback: None,
    },
    EngineDescriptor {
        kind: EngineKind::Pdflatex,
        program: "pdflatex",
        requires_environment: false,
        fallback: None,
    },
    EngineDescriptor {
        kind: EngineKind::PdflatexFast,
        program: "pdflatex",
        requires_environment: true,
        fallback: Some(EngineKind::Tectonic),
    },
    EngineDescriptor {
        kind: EngineKind::Xelatex,
        program: "xelatex",
        requires_environment: false,
        fallback: None,
    },
    EngineDescriptor {
        kind: EngineKind::Lualatex,
        program: "lualatex",
        requires_environment: false,
        fallback: None,
    },
];

impl EngineKind {
    /// Every supported engine, in descriptor order.
    pub const ALL: [EngineKind; 5] = [
        EngineKind::Tectonic,
        EngineKind::Pdflatex,
        EngineKind::PdflatexFast,
        EngineKind::Xelatex,
        EngineKind::Lualatex,
    ];

    /// Engine used when a request names none.
    pub const DEFAULT: EngineKind = EngineKind::Tectonic;

    /// Wire name of the engine.
    pub fn name(self) -> &'static str {
        match self {
            Self::Tectonic => "tectonic",
            Self::Pdflatex => "pdflatex",
            Self::PdflatexFast => "pdflatex-fast",
            Self::Xelatex => "xelatex",
            Self::Lualatex => "lualatex",
        }
    }

    /// Static descriptor for this engine.
    pub fn descriptor(self) -> &'static EngineDescriptor {
        &DESCRIPTORS[self as usize]
    }

    /// Comma-separated list of accepted names.
    pub fn allowed_names() -> String {
        Self::ALL
            .iter()
            .map(|kind| kind.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EngineKind {
    type Err = InvalidInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| InvalidInput::UnsupportedEngine {
                requested: s.to_string(),
                allowed: Self::allowed_names(),
            })
    }
}

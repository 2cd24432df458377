//! Bundle composition: collected packages, hidden imports and data mappings.

use serde::Deserialize;
use std::path::PathBuf;

/// One data directory copied into `Contents/Resources`.
///
/// # Configuration
///
/// ```toml
/// [[bundle.data]]
/// source = "frontend/dist"
/// dest = "frontend/dist"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataMappingSettings {
    /// Source directory, relative to the project root.
    pub source: PathBuf,
    /// Destination, relative to `Contents/Resources`.
    pub dest: PathBuf,
}

/// What goes into the bundle besides the frozen entry point.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BundleSettings {
    /// Packages whose data files and submodules are collected wholesale.
    pub packages: Vec<String>,

    /// Modules loaded dynamically that static analysis cannot see.
    pub hidden_imports: Vec<String>,

    /// Data directories copied with their contents.
    pub data: Vec<DataMappingSettings>,

    /// User-writable directories created empty at fixed paths.
    ///
    /// The launcher redirects these to user space at runtime; the bundle only
    /// carries the skeleton.
    pub placeholders: Vec<PathBuf>,
}

impl Default for BundleSettings {
    fn default() -> Self {
        Self {
            packages: ["fastapi", "pydantic", "transformers", "tokenizers", "heartlib"]
                .into_iter()
                .map(String::from)
                .collect(),
            hidden_imports: [
                "uvicorn.logging",
                "uvicorn.loops.auto",
                "uvicorn.protocols.http.auto",
                "uvicorn.protocols.websockets.auto",
                "uvicorn.lifespan.on",
                "transformers",
                "transformers.models",
                "transformers.models.auto",
                "torch",
                "torch.nn",
                "torch.optim",
                "torchaudio",
                "webview",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            data: vec![
                DataMappingSettings {
                    source: "frontend/dist".into(),
                    dest: "frontend/dist".into(),
                },
                DataMappingSettings {
                    source: "backend".into(),
                    dest: "backend".into(),
                },
            ],
            placeholders: vec!["models".into(), "generated_audio".into(), "ref_audio".into()],
        }
    }
}

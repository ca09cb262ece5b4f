//! Declarative target-config synthesis.
//!
//! Turns a classified proxy (dispositions, bundles, custom artifacts) into a
//! deployable decK-style document:
//!
//! - [`document`]: the document model (`_format_version: "3.0"` header,
//!   services with nested routes, scoped plugin entries)
//! - [`translate`]: per-construct config translation from source policy
//!   settings to target plugin config
//! - [`synthesizer`]: document assembly with phase-monotone plugin priorities

pub mod document;
pub mod synthesizer;
pub mod translate;

pub use document::{DeckDocument, PluginEntry, RouteEntry, ServiceEntry, FORMAT_VERSION};
pub use synthesizer::{
    SynthError, SynthesisInput, SynthesisOutput, Synthesizer, DEFAULT_PRIORITY_CEILING,
    DEFAULT_PRIORITY_STEP, INSTALLATION_PENDING_TAG,
};
pub use translate::{merge_configs, translate_config, PluginConfig, Translation};

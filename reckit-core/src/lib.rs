//! # reckit-core — component registry, parameter validation & configuration
//!
//! The generic heart of the reckit experimentation harness:
//!
//! - **Parameters** — typed, self-describing tunables with defaults and a
//!   validation pipeline that corrects instead of aborting.
//! - **Registry** — a tree of named component factories behind a capability
//!   seam, read-only after start-up and safe to share across runs.
//! - **Resolution** — raw `{name, params}` configurations merged over
//!   schema defaults with precise diagnostics through an injected sink.
//! - **Configuration** — the declarative experiment model (datasets x
//!   models x evaluation) loaded from YAML or JSON.
//!
//! The core is silent and embeddable: it never prints, never owns a
//! cancellation flag, and leaves every policy decision to its callers.

pub mod config;
pub mod error;
pub mod events;
pub mod params;
pub mod persistence;
pub mod registry;
pub mod resolve;

pub use config::{DatasetConfig, ExperimentConfig, ExperimentKind};
pub use error::{AlgorithmError, ConfigError, CoreError, RegistryError, Result};
pub use events::{Event, EventContext, EventSink, MemorySink, NoopSink, Severity, TracingSink};
pub use params::{NumberType, ParamSpec, ParameterSet, Validation};
pub use registry::{ComponentFactory, CreateContext, RegistryNode};
pub use resolve::{ObjectConfig, resolve_object, resolve_object_list};

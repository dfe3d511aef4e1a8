//! Split Settings - compose one settings namespace from many files
//!
//! A root settings file pulls in fragments through glob patterns with
//! `include(...)`. Fragments run in order against a shared [`Scope`], so a
//! later fragment sees and may override what earlier ones defined. Each
//! file is merged at most once per scope.
//!
//! ```no_run
//! use split_settings::{entry, include, optional, Scope};
//!
//! let mut scope = Scope::new("/srv/app/settings.conf");
//! include(
//!     &[
//!         entry("components/base.conf")?,
//!         entry("components/database.conf")?,
//!         optional("local_settings.conf")?,
//!     ],
//!     &mut scope,
//! )?;
//! # Ok::<(), split_settings::IncludeError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod locator;
pub mod registry;
pub mod resolve;
pub mod scope;
pub mod spec;

pub use config::{ConfigError, ToolConfig};
pub use engine::Engine;
pub use error::{IncludeError, Result};
pub use fragment::{Fragment, FragmentKind};
pub use locator::{ChainLocator, MapLocator, NoLocator, PackageLocator, SearchPathLocator};
pub use registry::{MemoryRegistry, ModuleRegistry, NoopRegistry};
pub use resolve::{resolve, ResolvedFile};
pub use scope::Scope;
pub use spec::{compiled, entry, one_of, optional, resource, IntoSpec, Spec};

/// Merge the files selected by `specs` into `scope` with a default engine
///
/// Resources need a locator; build an [`Engine`] with one for those.
pub fn include(specs: &[Spec], scope: &mut Scope) -> Result<()> {
    Engine::default().include(specs, scope)
}

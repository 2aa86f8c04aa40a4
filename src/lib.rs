//! # vershape
//!
//! A library for parsing version strings against a shape you declare.
//!
//! Instead of conforming to a specific versioning scheme, this library lets you declare the
//! *parts* a version is made of and a *template* describing how they compose, then parse version
//! strings into named, typed values.
//!
//! ## Examples
//!
//! Use the built-in definition for semantic versions:
//!
//! ```
//! use vershape::prelude::*;
//!
//! let semver = VersionDefinition::semver().unwrap();
//! let version = semver.parse("1.2.3-alpha.7+20240101").unwrap();
//!
//! assert_eq!(Some(&Value::Number(3)), version.get("patch"));
//! assert_eq!(Some(&Value::list(["alpha", "7"])), version.get("prerelease"));
//! assert_eq!(Some(&Value::list(["20240101"])), version.get("build"));
//! assert!(semver.parse("1.2").is_err());
//! ```
//!
//! Or declare your own:
//!
//! ```
//! use vershape::prelude::*;
//!
//! let definition = VersionDefinition::new(
//!     [
//!         ("year", PartSpec::numeric()),
//!         ("release", PartSpec::numeric()),
//!         ("channel", PartSpec::alphanumeric()),
//!         ("dot", PartSpec::literal(".")),
//!         ("tilde", PartSpec::literal("~")),
//!     ],
//!     |v| {
//!         v.elements(&["year", "dot", "release"])?;
//!         v.optional(|o| {
//!             o.elements(&["tilde", "channel"])?;
//!             Ok(())
//!         })?;
//!         Ok(())
//!     },
//! )
//! .unwrap();
//!
//! let version = definition.parse("2024.3~beta").unwrap();
//! assert_eq!(Some(&Value::from("beta")), version.get("channel"));
//! assert_eq!(None, definition.parse("2024.3").unwrap().get("channel"));
//! ```
//!
//! ## Important Terms
//!
//! - **Part**: An atomic token of a version. See the [table](#parts).
//! - **Template**: How parts compose. Built with a [`Composer`] from three combinators:
//!   - *sequence*: parts expected one after the other (each [`Composer::element`] call),
//!   - *optional*: a sub-sequence that may be absent as a whole ([`Composer::optional`]),
//!   - *recursive*: a separator-delimited list, declared as a `first` repetition followed by any
//!     number of `rest` repetitions ([`Composer::recursive`]).
//! - **Version**: The immutable result of a successful parse, modeled by [`Version`].
//!
//! ## Parts
//!
//! | Type | Matches | Value |
//! |---|---|---|
//! | `numeric` | `0` or digits without a leading zero | [`Value::Number`] |
//! | `alphanumeric` | `[a-zA-Z0-9]+` | [`Value::Text`] |
//! | `alphanumeric_or_hyphen` | `[a-zA-Z0-9-]+` | [`Value::Text`] |
//! | `static` | its literal value, exactly | *(not captured)* |
//!
//! A part declared `multivalued` accumulates every repetition of a recursive section into a
//! [`Value::List`], in order. Without it, the last repetition wins.
//!
//! ### Adjacent Parts
//!
//! The order of a template is the only thing used to split a version string. If two variable
//! length parts follow each other without a static part in between, the former consumes as much
//! as it can. *This is probably not what you want.* Separate them with a static part.
//!
//! ## Prelude
//!
//! vershape provides a prelude module for convenience. Use it with:
//!
//! ```
//! use vershape::prelude::*;
//! ```
#![warn(missing_docs)]

mod definition;
mod error;
mod extract;
mod matcher;
mod part;
mod source;
mod template;
mod version;

pub use crate::definition::{
    DefinitionDocument, OptionalEntry, RecursiveEntry, RecursiveSection, TemplateEntry,
    VersionDefinition,
};
pub use crate::error::{DefinitionError, SourceError, VersionError};
pub use crate::part::{Part, PartCatalog, PartSpec, PartTrait, PartType};
pub use crate::source::VersionSource;
pub use crate::template::{Composer, Node, RecursiveComposer, Template};
pub use crate::version::{Value, Version};

/// A convenience module appropriate for glob imports (`use vershape::prelude::*;`).
pub mod prelude {
    #[doc(no_inline)]
    pub use crate::Composer;
    #[doc(no_inline)]
    pub use crate::DefinitionError;
    #[doc(no_inline)]
    pub use crate::PartSpec;
    #[doc(no_inline)]
    pub use crate::Value;
    #[doc(no_inline)]
    pub use crate::Version;
    #[doc(no_inline)]
    pub use crate::VersionDefinition;
    #[doc(no_inline)]
    pub use crate::VersionError;
    #[doc(no_inline)]
    pub use crate::VersionSource;
}

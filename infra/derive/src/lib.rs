#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the save-system crates.
//!
//! * [`macro@yoki_error`] turns an enum into a `thiserror` error with attachable context.
//! * [`macro@save_module`] turns a struct or enum into a persistable save module.
//!
//! Both macros emit absolute paths (`::thiserror`, `::yoki_archive`) so the consuming crate
//! must depend on the referenced crate directly.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Attribute macro that defines a domain error enum.
///
/// # Features
///
/// * **Automatic Derives**: Injects `Debug` and `thiserror::Error` unless already derived.
/// * **Context Support**: Generates a companion `<Name>Ext` trait that adds `.context(...)`
///   to `Result<T, Name>` and to `Result<T, Source>` for every variant wrapping a source error.
/// * **Standard Conversions**: Implements `From<Source>` for variants whose only fields are a
///   `source` (or a field marked `#[source]`/`#[from]`) and `context`, enabling the `?`
///   operator. Variants carrying more data are built explicitly.
/// * **Internal Fallback**: `From<&'static str>` and `From<String>` when an `Internal`
///   variant with a `message` field exists.
/// * **Accessor**: `Name::context_message()` returns the attached context, if any.
///
/// # Requirements
///
/// 1. Only enums are accepted.
/// 2. Every variant uses named fields (tuple and unit variants are rejected).
/// 3. Variants with a source must carry `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use std::borrow::Cow;
///
/// #[yoki_derive::yoki_error]
/// pub enum StoreError {
///     #[error("I/O failure{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn read() -> Result<Vec<u8>, StoreError> {
///     std::fs::read("save_0.yoki").context("Reading slot 0")
/// }
/// ```
#[proc_macro_attribute]
pub fn yoki_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand(input).into()
}

/// Attribute macro that declares a save module type.
///
/// Adds `Serialize`/`Deserialize` (routed through `::yoki_archive::serde`), `Debug`, `Clone`
/// and `PartialEq` unless the type already derives them, and implements
/// `yoki_archive::Module` with the given stable tag. Without `tag = "..."` the type name
/// is used, which ties stored data to the Rust identifier, so an explicit tag is recommended.
///
/// The tag is hashed into the module key stored on disk: changing it orphans existing saves.
///
/// # Errors
///
/// Emits a compile-time error on unions, unknown arguments, duplicate or non-string tags,
/// and empty tags.
///
/// # Example
///
/// ```rust,ignore
/// use yoki_archive::save_module;
///
/// #[save_module(tag = "player.stats")]
/// pub struct PlayerStats {
///     pub level: u32,
///     pub gold: u64,
/// }
/// ```
#[proc_macro_attribute]
pub fn save_module(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::module::expand(args.into(), input).into()
}

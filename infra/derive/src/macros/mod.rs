pub mod error;
pub mod module;

use fxhash::FxHashSet;
use syn::DeriveInput;

/// Collects the last path segment of every trait named in `#[derive(...)]` attributes.
pub fn derived_traits(input: &DeriveInput) -> FxHashSet<String> {
    let mut traits = FxHashSet::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("derive") {
            continue;
        }

        let _ = attr.parse_nested_meta(|meta| {
            if let Some(segment) = meta.path.segments.last() {
                traits.insert(segment.ident.to_string());
            }
            Ok(())
        });
    }

    traits
}

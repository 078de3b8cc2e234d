mod record;

use proc_macro::TokenStream;

/// Implements `optimist::Record` and generates a sparse `<Name>Patch` type.
///
/// Exactly one field must be marked `#[record(key)]`. Fields marked
/// `#[record(skip)]` are left out of the patch and never merged.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream { record::derive_record_impl(input) }

use serde::Deserialize;

/// An enum tag as found in stored or imported documents: the variant name,
/// or its position for documents that wrote enums as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum EnumTag {
    Index(u64),
    Name(String),
}

impl EnumTag {
    /// Resolve the tag against `variants` (in declaration order), matching
    /// names with `parse`.
    pub(crate) fn resolve<T: Copy>(
        self,
        kind: &str,
        variants: &[T],
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, String> {
        match self {
            EnumTag::Index(index) => usize::try_from(index)
                .ok()
                .and_then(|i| variants.get(i).copied())
                .ok_or_else(|| format!("unknown {} index {}", kind, index)),
            EnumTag::Name(name) => {
                parse(&name).ok_or_else(|| format!("unknown {} '{}'", kind, name))
            }
        }
    }
}

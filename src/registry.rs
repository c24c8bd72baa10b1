//! Variant registry
//!
//! Maps stable discriminator tags to the notification variants declared by
//! the consuming application, and back. The table is populated once at
//! startup; nothing here touches the store.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::{NotificationSettings, TypeFormat, VariantSpec};
use crate::error::{NotificationError, Result};

/// Suffix appended to every normalized variant name.
pub const VARIANT_SUFFIX: &str = "Notification";

const NAMESPACE_SEPARATOR: &str = "::";

/// A notification kind declared at compile time.
///
/// ```
/// use notifications::registry::Variant;
///
/// struct Liked;
///
/// impl Variant for Liked {
///     const NAME: &'static str = "liked";
///     const CODE: i32 = 1;
/// }
/// ```
pub trait Variant: Send + Sync + 'static {
    /// Short name; normalized the same way as runtime tags (`liked` -> `LikedNotification`).
    const NAME: &'static str;
    /// Numeric discriminator used when `type_format = integer`. Must never change once persisted.
    const CODE: i32;
}

/// Registered identity of one variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantDescriptor {
    name: String,
    tag: String,
    code: i32,
}

impl VariantDescriptor {
    /// Canonical name, e.g. `LikedNotification`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified tag, e.g. `app::notifications::LikedNotification`.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    /// Value written to the `type` column under the given storage format.
    pub fn discriminator(&self, format: TypeFormat) -> String {
        match format {
            TypeFormat::Class => self.tag.clone(),
            TypeFormat::Integer => self.code.to_string(),
        }
    }
}

impl fmt::Display for VariantDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

/// Lookup table between tags, numeric codes and variant descriptors.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    namespace: String,
    type_format: TypeFormat,
    by_tag: HashMap<String, Arc<VariantDescriptor>>,
    by_code: HashMap<i32, Arc<VariantDescriptor>>,
}

impl TypeRegistry {
    /// Create an empty registry for the given settings.
    pub fn new(settings: &NotificationSettings) -> Self {
        Self {
            namespace: settings
                .namespace
                .trim()
                .trim_end_matches(NAMESPACE_SEPARATOR)
                .to_string(),
            type_format: settings.type_format,
            by_tag: HashMap::new(),
            by_code: HashMap::new(),
        }
    }

    /// Create a registry pre-populated with variants declared in configuration.
    pub fn from_specs(settings: &NotificationSettings, specs: &[VariantSpec]) -> Result<Self> {
        let mut registry = Self::new(settings);
        for spec in specs {
            registry.register_named(&spec.tag, spec.code)?;
        }
        Ok(registry)
    }

    pub fn type_format(&self) -> TypeFormat {
        self.type_format
    }

    /// Register a compile-time variant.
    pub fn register<V: Variant>(&mut self) -> Result<Arc<VariantDescriptor>> {
        self.register_named(V::NAME, V::CODE)
    }

    /// Register a variant by short name and numeric code.
    pub fn register_named(&mut self, name: &str, code: i32) -> Result<Arc<VariantDescriptor>> {
        let canonical = canonical_name(name).ok_or_else(|| NotificationError::unknown_type(name))?;
        let tag = self.qualify_canonical(&canonical);

        if self.by_tag.contains_key(&tag) {
            return Err(NotificationError::DuplicateVariant {
                name: canonical,
                detail: format!("tag '{tag}' already registered"),
            });
        }
        if let Some(existing) = self.by_code.get(&code) {
            return Err(NotificationError::DuplicateVariant {
                name: canonical,
                detail: format!("code {code} already used by '{}'", existing.tag),
            });
        }

        let descriptor = Arc::new(VariantDescriptor {
            name: canonical,
            tag: tag.clone(),
            code,
        });
        self.by_tag.insert(tag, descriptor.clone());
        self.by_code.insert(code, descriptor.clone());
        debug!(tag = %descriptor.tag, code, "Registered notification variant");
        Ok(descriptor)
    }

    /// Turn a human, kebab or snake tag into its fully qualified variant tag.
    ///
    /// `liked` becomes `<namespace>::LikedNotification`. Pure: does not consult
    /// the registered variants.
    pub fn qualify(&self, tag: &str) -> Result<String> {
        let canonical = canonical_name(tag).ok_or_else(|| NotificationError::unknown_type(tag))?;
        Ok(self.qualify_canonical(&canonical))
    }

    fn qualify_canonical(&self, canonical: &str) -> String {
        if self.namespace.is_empty() {
            canonical.to_string()
        } else {
            format!("{}{}{}", self.namespace, NAMESPACE_SEPARATOR, canonical)
        }
    }

    /// Resolve a tag to its variant.
    ///
    /// Accepts an already qualified tag as stored in the `type` column, or a
    /// short tag that is normalized through [`TypeRegistry::qualify`].
    pub fn resolve(&self, tag: &str) -> Result<Arc<VariantDescriptor>> {
        if tag.trim().is_empty() {
            return Err(NotificationError::unknown_type(tag));
        }
        if let Some(descriptor) = self.by_tag.get(tag) {
            return Ok(descriptor.clone());
        }
        let qualified = self.qualify(tag)?;
        self.by_tag
            .get(&qualified)
            .cloned()
            .ok_or_else(|| NotificationError::unknown_type(tag))
    }

    /// Resolve a compile-time variant.
    pub fn resolve_variant<V: Variant>(&self) -> Result<Arc<VariantDescriptor>> {
        self.resolve(V::NAME)
    }

    /// Look up the variant owning a stored discriminator under the configured format.
    pub fn by_discriminator(&self, discriminator: &str) -> Option<Arc<VariantDescriptor>> {
        match self.type_format {
            TypeFormat::Class => self.by_tag.get(discriminator).cloned(),
            TypeFormat::Integer => discriminator
                .trim()
                .parse::<i32>()
                .ok()
                .and_then(|code| self.by_code.get(&code).cloned()),
        }
    }

    /// All registered variants, sorted by tag for stable ordering.
    pub fn variants(&self) -> Vec<Arc<VariantDescriptor>> {
        let mut variants: Vec<_> = self.by_tag.values().cloned().collect();
        variants.sort_by(|a, b| a.tag.cmp(&b.tag));
        variants
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

/// Normalize to the canonical variant name: split on spaces, dashes and
/// underscores, upper-case the first letter of each word, join, append the
/// suffix. Returns `None` when nothing usable remains.
pub fn canonical_name(input: &str) -> Option<String> {
    let studly: String = input
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();

    if studly.is_empty() || !studly.chars().all(|c| c.is_alphanumeric()) {
        return None;
    }

    Some(format!("{studly}{VARIANT_SUFFIX}"))
}

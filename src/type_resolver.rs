use crate::config::KnownTypes;
use crate::error::{Error, Result};
use crate::metadata::{normalize_name, ClassDescriptor, MetadataProvider};
use indexmap::IndexMap;
use log::debug;
use std::collections::HashSet;

/// Naming context a type expression is read in.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Namespace of the declaring class or closure
    pub namespace: String,
    /// `use` imports: alias → fully qualified name
    pub imports: IndexMap<String, String>,
    /// Class `self`/`static` refer to
    pub owner: Option<String>,
}

impl Scope {
    pub fn of_class(class: &ClassDescriptor) -> Self {
        Self {
            namespace: class.namespace().to_string(),
            imports: class.imports.clone(),
            owner: Some(class.name.clone()),
        }
    }

    pub fn global() -> Self {
        Self::default()
    }
}

/// Type resolver - maps class names to identities and answers "kind of" queries
pub struct TypeResolver<'p> {
    /// Source of class metadata
    provider: &'p dyn MetadataProvider,
    /// Framework identities
    known: &'p KnownTypes,
}

impl<'p> TypeResolver<'p> {
    pub fn new(provider: &'p dyn MetadataProvider, known: &'p KnownTypes) -> Self {
        Self { provider, known }
    }

    pub fn provider(&self) -> &'p dyn MetadataProvider {
        self.provider
    }

    pub fn known(&self) -> &'p KnownTypes {
        self.known
    }

    /// Whether `fq` is described by the manifest or is a known framework type.
    pub fn class_exists(&self, fq: &str) -> bool {
        let fq = normalize_name(fq);
        self.provider.class(fq).is_some() || self.known.is_known(fq)
    }

    /// Resolves a class name as written in `scope` to its fully qualified identity.
    ///
    /// A leading `\` marks an already qualified name. Otherwise the first
    /// segment is looked up in the imports, then the name is tried as is, then
    /// relative to the scope's namespace.
    pub fn resolve_class_name(&self, name: &str, scope: &Scope, context: &str) -> Result<String> {
        if let Some(qualified) = name.strip_prefix('\\') {
            if self.class_exists(qualified) {
                return Ok(qualified.to_string());
            }
            return Err(self.unlocatable(name, context));
        }

        let (head, tail) = match name.split_once('\\') {
            Some((head, tail)) => (head, Some(tail)),
            None => (name, None),
        };
        if let Some(imported) = scope.imports.get(head) {
            let imported = normalize_name(imported);
            let resolved = match tail {
                Some(tail) => format!("{}\\{}", imported, tail),
                None => imported.to_string(),
            };
            debug!("Resolved {} to {} through imports", name, resolved);
            return Ok(resolved);
        }

        if self.class_exists(name) {
            return Ok(name.to_string());
        }
        if !scope.namespace.is_empty() {
            let relative = format!("{}\\{}", scope.namespace, name);
            if self.class_exists(&relative) {
                return Ok(relative);
            }
        }
        Err(self.unlocatable(name, context))
    }

    fn unlocatable(&self, name: &str, context: &str) -> Error {
        Error::UnlocatableClass {
            name: name.to_string(),
            context: context.to_string(),
        }
    }

    /// Whether `fq` is `target` or has it among its recorded ancestors.
    pub fn is_kind_of(&self, fq: &str, target: &str) -> bool {
        let mut seen = HashSet::new();
        self.is_kind_of_inner(normalize_name(fq), normalize_name(target), &mut seen)
    }

    fn is_kind_of_inner<'a>(&'a self, fq: &'a str, target: &str, seen: &mut HashSet<&'a str>) -> bool {
        if fq == target {
            return true;
        }
        if !seen.insert(fq) {
            return false;
        }
        match self.provider.class(fq) {
            Some(class) => class
                .parents
                .iter()
                .any(|parent| self.is_kind_of_inner(normalize_name(parent), target, seen)),
            None => false,
        }
    }

    pub fn is_kind_of_any<'t>(&self, fq: &str, targets: impl IntoIterator<Item = &'t String>) -> bool {
        targets.into_iter().any(|target| self.is_kind_of(fq, target))
    }

    /// Whether `fq` is literally one of `identities` (not a subclass).
    pub fn is_one_of<'t>(&self, fq: &str, identities: impl IntoIterator<Item = &'t String>) -> bool {
        let fq = normalize_name(fq);
        identities.into_iter().any(|identity| normalize_name(identity) == fq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ManifestFragment, ProjectManifest};
    use pretty_assertions::assert_eq;

    fn manifest() -> ProjectManifest {
        let fragment: ManifestFragment = serde_yaml::from_str(
            r#"
classes:
  - name: App\Models\User
    parents: [App\Models\Base]
  - name: App\Models\Base
    parents: [Illuminate\Database\Eloquent\Model]
  - name: App\Http\Controllers\UserController
    imports:
      User: App\Models\User
      Models: App\Models
  - name: App\Http\Controllers\Looping
    parents: [App\Http\Controllers\Looping]
"#,
        )
        .unwrap();
        let mut manifest = ProjectManifest::new();
        manifest.merge(fragment);
        manifest
    }

    fn controller_scope(manifest: &ProjectManifest) -> Scope {
        Scope::of_class(manifest.class("App\\Http\\Controllers\\UserController").unwrap())
    }

    #[test]
    fn test_resolve_through_imports() {
        let manifest = manifest();
        let known = KnownTypes::default();
        let resolver = TypeResolver::new(&manifest, &known);
        let scope = controller_scope(&manifest);

        assert_eq!(resolver.resolve_class_name("User", &scope, "test").unwrap(), "App\\Models\\User");
        assert_eq!(
            resolver.resolve_class_name("Models\\Base", &scope, "test").unwrap(),
            "App\\Models\\Base"
        );
    }

    #[test]
    fn test_resolve_relative_and_qualified() {
        let manifest = manifest();
        let known = KnownTypes::default();
        let resolver = TypeResolver::new(&manifest, &known);
        let scope = Scope {
            namespace: "App\\Models".to_string(),
            ..Scope::default()
        };

        assert_eq!(resolver.resolve_class_name("Base", &scope, "test").unwrap(), "App\\Models\\Base");
        assert_eq!(
            resolver.resolve_class_name("\\App\\Models\\User", &Scope::global(), "test").unwrap(),
            "App\\Models\\User"
        );
        assert_eq!(
            resolver
                .resolve_class_name("\\Illuminate\\Support\\Collection", &Scope::global(), "test")
                .unwrap(),
            "Illuminate\\Support\\Collection"
        );
    }

    #[test]
    fn test_unlocatable_class() {
        let manifest = manifest();
        let known = KnownTypes::default();
        let resolver = TypeResolver::new(&manifest, &known);

        let err = resolver
            .resolve_class_name("Ghost", &controller_scope(&manifest), "UserController::show")
            .unwrap_err();
        assert!(matches!(err, Error::UnlocatableClass { ref name, .. } if name == "Ghost"));
    }

    #[test]
    fn test_is_kind_of_transitive() {
        let manifest = manifest();
        let known = KnownTypes::default();
        let resolver = TypeResolver::new(&manifest, &known);

        assert!(resolver.is_kind_of("App\\Models\\User", "Illuminate\\Database\\Eloquent\\Model"));
        assert!(resolver.is_kind_of_any("\\App\\Models\\User", &known.entity));
        assert!(!resolver.is_kind_of("App\\Models\\Base", "App\\Models\\User"));
        assert!(!resolver.is_kind_of("App\\Http\\Controllers\\Looping", "App\\Models\\User"));
        assert!(!resolver.is_one_of("App\\Models\\User", &known.entity));
    }
}

//! Object schemas of persisted entities.
//!
//! Columns come from the backing table's catalogue, relationships from the
//! entity's accessor methods. Every surfaced column is required; relationships
//! never are, since they are only present when loaded.

use crate::config::RelationArity;
use crate::docblock::TypeDescriptor;
use crate::error::Result;
use crate::metadata::{ClassDescriptor, MethodDescriptor, Visibility};
use crate::schema::{ObjectNode, SchemaNode};
use crate::schema_generator::SchemaGenerator;
use crate::source_query::{assoc_pairs, string_values, Expr};
use crate::type_resolver::Scope;
use indexmap::IndexMap;
use log::{debug, warn};
use std::collections::HashSet;

/// Storage settings of one entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedEntity {
    pub table: String,
    pub connection: Option<String>,
    pub hidden: Vec<String>,
    pub casts: IndexMap<String, String>,
}

/// Builds the object schema of a persisted entity.
pub fn resolve_entity(
    gen: &mut SchemaGenerator<'_>,
    class: &ClassDescriptor,
    nullable: bool,
) -> Result<SchemaNode> {
    let settings = entity_settings(gen, class);
    debug!(
        "Resolving entity {} from table {}",
        class.name, settings.table
    );

    let mut object = ObjectNode::new();
    match gen.provider().columns(settings.connection.as_deref(), &settings.table) {
        Some(columns) => {
            for column in columns {
                if settings.hidden.contains(&column.name) {
                    continue;
                }
                let storage_type = settings.casts.get(&column.name).unwrap_or(&column.type_name);
                match storage_type_schema(storage_type) {
                    Some(schema) => object.insert(&column.name, schema.with_nullable(column.nullable), true),
                    None => debug!(
                        "Skipping column {}.{} of unknown type {}",
                        settings.table, column.name, storage_type
                    ),
                }
            }
        }
        None => warn!("Table {} of {} not found, no columns surfaced", settings.table, class.name),
    }

    for method in &class.methods {
        if !is_accessor(method, &settings.hidden) {
            continue;
        }
        if let Some(schema) = relationship_schema(gen, class, method)? {
            object.insert(&method.name, schema, false);
        }
    }

    object.nullable = nullable;
    Ok(object.into_node())
}

/// Table, connection, hidden fields and casts, from explicit settings first
/// and the class source second.
pub fn entity_settings(gen: &SchemaGenerator<'_>, class: &ClassDescriptor) -> ResolvedEntity {
    let source = gen.source();
    let explicit = class.entity.clone().unwrap_or_default();

    let field_expr = |name: &str| {
        class
            .field(name)
            .and_then(|field| field.default.as_deref())
            .and_then(|text| source.initializer(text))
    };
    let method_body = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| class.method(name))
            .map(|method| method.body().to_string())
    };

    let table = explicit
        .table
        .or_else(|| match field_expr("table") {
            Some(Expr::Str(table)) => Some(table),
            _ => None,
        })
        .or_else(|| method_body(&["getTable"]).and_then(|body| source.returned_string(&body)))
        .unwrap_or_else(|| default_table_name(class.short_name()));

    let connection = explicit
        .connection
        .or_else(|| match field_expr("connection") {
            Some(Expr::Str(connection)) => Some(connection),
            _ => None,
        })
        .or_else(|| method_body(&["getConnectionName"]).and_then(|body| source.returned_string(&body)));

    // the field, the method and the explicit setting all add to the hidden set
    let mut hidden = match field_expr("hidden") {
        Some(Expr::Array(items)) => string_values(&items),
        _ => Vec::new(),
    };
    if let Some(body) = method_body(&["getHidden", "hidden"]) {
        hidden.extend(source.returned_literal_values(&body));
    }
    hidden.extend(explicit.hidden);
    let mut seen = HashSet::new();
    hidden.retain(|name| seen.insert(name.clone()));

    let mut casts = match field_expr("casts") {
        Some(Expr::Array(items)) => assoc_pairs(&items),
        _ => IndexMap::new(),
    };
    if let Some(body) = method_body(&["casts", "getCasts"]) {
        casts.extend(source.returned_assoc(&body));
    }
    casts.extend(explicit.casts);

    ResolvedEntity {
        table,
        connection,
        hidden,
        casts,
    }
}

/// Zero-parameter public instance methods that are not framework hooks.
fn is_accessor(method: &MethodDescriptor, hidden: &[String]) -> bool {
    method.visibility == Visibility::Public
        && !method.is_static
        && method.params.is_empty()
        && !["get", "set", "scope", "__"]
            .iter()
            .any(|prefix| method.name.starts_with(prefix))
        && !matches!(method.name.as_str(), "casts" | "hidden" | "toArray" | "toJson")
        && !hidden.contains(&method.name)
}

/// Schema of a relationship accessor, if `method` defines one.
fn relationship_schema(
    gen: &mut SchemaGenerator<'_>,
    class: &ClassDescriptor,
    method: &MethodDescriptor,
) -> Result<Option<SchemaNode>> {
    let scope = Scope::of_class(class);
    let site = format!("{}::{}", class.name, method.name);
    let known = gen.known();

    // `@return HasMany<Post, $this>` wins over body scanning
    if let Some(text) = method.doc_block().return_type() {
        if let Ok(TypeDescriptor::Generic { base, args }) = TypeDescriptor::parse(text) {
            let relation = gen.types.resolve_class_name(&base, &scope, &site).ok().and_then(|fq| {
                known
                    .relations
                    .iter()
                    .find(|(relation, _)| gen.types.is_kind_of(&fq, relation))
                    .map(|(_, arity)| *arity)
            });
            let related = args.iter().find_map(|arg| match arg {
                TypeDescriptor::Named(name) if !name.starts_with('$') => Some(name.clone()),
                _ => None,
            });
            if let (Some(arity), Some(related)) = (relation, related) {
                let fq = gen.types.resolve_class_name(&related, &scope, &site)?;
                return relation_reference(gen, &fq, arity).map(Some);
            }
        }
    }

    let call = gen
        .source()
        .self_method_calls(method.body())
        .into_iter()
        .find_map(|call| known.relation_calls.get(&call.name).map(|arity| (call, *arity)));
    let Some((call, arity)) = call else {
        return Ok(None);
    };
    let Some(related) = call.arg_literals.first().filter(|arg| *arg != "unknown" && !arg.starts_with('$')) else {
        debug!("Relation {} has no literal target, skipping", site);
        return Ok(None);
    };
    let fq = gen.types.resolve_class_name(related, &scope, &site)?;
    relation_reference(gen, &fq, arity).map(Some)
}

fn relation_reference(gen: &mut SchemaGenerator<'_>, fq: &str, arity: RelationArity) -> Result<SchemaNode> {
    let reference = gen.class_reference(fq)?;
    Ok(match arity {
        RelationArity::Single => reference.with_nullable(true),
        RelationArity::Multiple => SchemaNode::array(reference).with_nullable(true),
    })
}

/// Maps a column storage type or cast to its schema. Parameters after `:` or
/// `(` are ignored, except for `tinyint(1)` and encrypted structures.
pub fn storage_type_schema(storage_type: &str) -> Option<SchemaNode> {
    let normalized = storage_type.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "tinyint(1)" => return Some(SchemaNode::boolean()),
        "encrypted:array" | "encrypted:collection" | "encrypted:object" => {
            return Some(SchemaNode::array(SchemaNode::any_object()))
        }
        _ => {}
    }
    let base = normalized
        .split([':', '(', ' '])
        .next()
        .unwrap_or(normalized.as_str());

    let schema = match base {
        "string" | "char" | "varchar" | "text" | "tinytext" | "mediumtext" | "longtext" | "uuid" | "ulid"
        | "enum" | "set" | "encrypted" | "binary" | "varbinary" | "blob" | "inet" | "citext" => SchemaNode::string(),
        "int" | "integer" | "tinyint" | "smallint" | "mediumint" | "bigint" | "int2" | "int4" | "int8"
        | "serial" | "bigserial" | "unsignedinteger" | "unsignedbiginteger" | "timestamp_epoch" => {
            SchemaNode::integer()
        }
        "decimal" | "numeric" | "double" | "float" | "real" | "float4" | "float8" => SchemaNode::number(),
        "bool" | "boolean" | "bit" => SchemaNode::boolean(),
        "date" | "datetime" | "datetimetz" | "timestamp" | "timestamptz" | "time" | "timetz" | "year"
        | "immutable_date" | "immutable_datetime" => SchemaNode::string_format("date-time"),
        "json" | "jsonb" | "array" | "collection" => SchemaNode::array(SchemaNode::any_object()),
        "object" => SchemaNode::any_object(),
        _ => return None,
    };
    Some(schema)
}

/// Default table name: the pluralized snake case of the class short name.
pub fn default_table_name(short_name: &str) -> String {
    let snake = snake_case(short_name);
    match snake.rsplit_once('_') {
        Some((head, last)) => format!("{}_{}", head, pluralize(last)),
        None => pluralize(&snake),
    }
}

fn snake_case(name: &str) -> String {
    let mut snake = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let after_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let before_lower = i > 0 && chars.get(i + 1).is_some_and(|next| next.is_lowercase());
            if after_lower || (before_lower && chars[i - 1].is_uppercase()) {
                snake.push('_');
            }
            snake.extend(c.to_lowercase());
        } else {
            snake.push(*c);
        }
    }
    snake
}

const UNCOUNTABLE: &[&str] = &[
    "audio", "data", "equipment", "feedback", "fish", "information", "media", "metadata", "money",
    "news", "rice", "series", "sheep", "species", "staff",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("man", "men"),
    ("mouse", "mice"),
    ("ox", "oxen"),
    ("person", "people"),
    ("tooth", "teeth"),
    ("woman", "women"),
];

fn pluralize(word: &str) -> String {
    if UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return plural.to_string();
    }
    let consonant_before = |suffix_len: usize| {
        word.chars()
            .rev()
            .nth(suffix_len)
            .is_some_and(|c| !"aeiou".contains(c))
    };
    if word.ends_with('y') && consonant_before(1) {
        return format!("{}ies", &word[..word.len() - 1]);
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| word.ends_with(suffix)) {
        return format!("{}es", word);
    }
    if word.ends_with("fe") {
        return format!("{}ves", &word[..word.len() - 2]);
    }
    if word.ends_with("lf") || word.ends_with("af") {
        return format!("{}ves", &word[..word.len() - 1]);
    }
    format!("{}s", word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KnownTypes;
    use crate::metadata::manifest_from_yaml;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"
classes:
  - name: App\Models\User
    parents: [Illuminate\Database\Eloquent\Model]
    imports:
      HasMany: Illuminate\Database\Eloquent\Relations\HasMany
    fields:
      - name: hidden
        visibility: protected
        default: "['password', 'remember_token']"
      - name: casts
        visibility: protected
        default: "['balance' => 'decimal:2', 'password' => 'hashed']"
    methods:
      - name: posts
        doc: "/** @return HasMany<Post, $this> */"
        body: "return $this->hasMany(Post::class);"
      - name: team
        body: "return $this->belongsTo(Team::class);"
      - name: getNameAttribute
        body: "return ucfirst($this->name);"
      - name: scopeActive
        params: [{name: query}]
        body: "return $query->where('active', true);"
      - name: helper
        static: true
        body: "return $this->hasOne(Post::class);"
  - name: App\Models\Post
    parents: [Illuminate\Database\Eloquent\Model]
    methods:
      - name: getTable
        body: "return 'articles';"
      - name: author
        body: "return $this->belongsTo(\\App\\Models\\User::class, 'user_id');"
  - name: App\Models\Team
    parents: [Illuminate\Database\Eloquent\Model]
    entity:
      connection: teams
tables:
  - name: users
    columns:
      - {name: id, type_name: bigint}
      - {name: name, type_name: varchar(255)}
      - {name: password, type_name: varchar(255)}
      - {name: remember_token, type_name: varchar(100), nullable: true}
      - {name: balance, type_name: varchar(32)}
      - {name: settings, type_name: jsonb, nullable: true}
      - {name: is_admin, type_name: tinyint(1)}
      - {name: created_at, type_name: timestamp, nullable: true}
      - {name: location, type_name: geometry}
  - name: articles
    columns:
      - {name: id, type_name: bigint}
  - connection: teams
    name: teams
    columns:
      - {name: id, type_name: uuid}
"#;

    #[test]
    fn test_entity_columns() {
        let manifest = manifest_from_yaml(MANIFEST);
        let known = KnownTypes::default();
        let mut gen = SchemaGenerator::new(&manifest, &known);
        let class = manifest.classes.get("App\\Models\\User").unwrap();

        let schema = resolve_entity(&mut gen, class, false).unwrap();
        let object = schema.as_object().unwrap();

        assert_eq!(
            object.properties.keys().collect::<Vec<_>>(),
            vec!["id", "name", "balance", "settings", "is_admin", "created_at", "posts", "team"]
        );
        assert_eq!(object.properties["id"], SchemaNode::integer());
        assert_eq!(object.properties["balance"], SchemaNode::number(), "cast overrides column type");
        assert_eq!(
            object.properties["settings"],
            SchemaNode::array(SchemaNode::any_object()).with_nullable(true)
        );
        assert_eq!(object.properties["is_admin"], SchemaNode::boolean());
        assert_eq!(
            object.properties["created_at"],
            SchemaNode::string_format("date-time").with_nullable(true)
        );
        assert_eq!(
            object.required.iter().collect::<Vec<_>>(),
            vec!["id", "name", "balance", "settings", "is_admin", "created_at"]
        );
    }

    #[test]
    fn test_hidden_columns_never_surface() {
        let manifest = manifest_from_yaml(MANIFEST);
        let known = KnownTypes::default();
        let mut gen = SchemaGenerator::new(&manifest, &known);
        let class = manifest.classes.get("App\\Models\\User").unwrap();

        let schema = resolve_entity(&mut gen, class, false).unwrap();
        let object = schema.as_object().unwrap();
        assert!(!object.properties.contains_key("password"));
        assert!(!object.properties.contains_key("remember_token"));
    }

    #[test]
    fn test_relationships() {
        let manifest = manifest_from_yaml(MANIFEST);
        let known = KnownTypes::default();
        let mut gen = SchemaGenerator::new(&manifest, &known);
        let class = manifest.classes.get("App\\Models\\User").unwrap();

        let schema = resolve_entity(&mut gen, class, false).unwrap();
        let object = schema.as_object().unwrap();
        assert_eq!(
            object.properties["posts"],
            SchemaNode::array(SchemaNode::reference("Post")).with_nullable(true)
        );
        assert_eq!(
            object.properties["team"],
            SchemaNode::reference("Team").with_nullable(true)
        );

        let components = gen.finish().unwrap();
        let post = components["Post"].as_object().unwrap();
        assert_eq!(post.properties["author"], SchemaNode::reference("User").with_nullable(true));
        let team = components["Team"].as_object().unwrap();
        assert_eq!(team.properties["id"], SchemaNode::string());
    }

    #[test]
    fn test_entity_settings_from_source() {
        let manifest = manifest_from_yaml(MANIFEST);
        let known = KnownTypes::default();
        let gen = SchemaGenerator::new(&manifest, &known);

        let user = entity_settings(&gen, manifest.classes.get("App\\Models\\User").unwrap());
        assert_eq!(user.table, "users");
        assert_eq!(user.hidden, vec!["password", "remember_token"]);
        assert_eq!(user.casts["balance"], "decimal:2");

        let post = entity_settings(&gen, manifest.classes.get("App\\Models\\Post").unwrap());
        assert_eq!(post.table, "articles");

        let team = entity_settings(&gen, manifest.classes.get("App\\Models\\Team").unwrap());
        assert_eq!(team.connection.as_deref(), Some("teams"));
    }

    #[test]
    fn test_hidden_lists_are_merged() {
        let manifest = manifest_from_yaml(
            r#"
classes:
  - name: App\Models\Account
    parents: [Illuminate\Database\Eloquent\Model]
    entity:
      hidden: [pin]
    fields:
      - name: hidden
        visibility: protected
        default: "['secret']"
    methods:
      - name: getHidden
        body: "return ['token', 'secret'];"
"#,
        );
        let known = KnownTypes::default();
        let gen = SchemaGenerator::new(&manifest, &known);

        let account = entity_settings(&gen, manifest.classes.get("App\\Models\\Account").unwrap());
        assert_eq!(account.hidden, vec!["secret", "token", "pin"]);
    }

    #[test]
    fn test_storage_types() {
        assert_eq!(storage_type_schema("VARCHAR(255)"), Some(SchemaNode::string()));
        assert_eq!(storage_type_schema("decimal:2"), Some(SchemaNode::number()));
        assert_eq!(storage_type_schema("immutable_datetime"), Some(SchemaNode::string_format("date-time")));
        assert_eq!(storage_type_schema("boolean"), Some(SchemaNode::boolean()));
        assert_eq!(storage_type_schema("point"), None);
    }

    #[test]
    fn test_default_table_name() {
        assert_eq!(default_table_name("User"), "users");
        assert_eq!(default_table_name("UserProfile"), "user_profiles");
        assert_eq!(default_table_name("Category"), "categories");
        assert_eq!(default_table_name("Address"), "addresses");
        assert_eq!(default_table_name("Person"), "people");
        assert_eq!(default_table_name("HTTPLog"), "http_logs");
        assert_eq!(default_table_name("Key"), "keys");
    }
}
